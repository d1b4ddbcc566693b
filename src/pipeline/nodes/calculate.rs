//! Calculate operator: appends columns computed from arithmetic expressions.
//!
//! Each expression sees the input row only, never columns computed earlier
//! in the same node. A failed parse or evaluation nulls that one cell.

use crate::expression::{ExprError, Expression};
use crate::pipeline::error::OperatorResult;
use crate::pipeline::node_type::NodeType;
use crate::types::{format_number, ColumnType, Dataset, Provenance, Row, Value};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// One computed column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calculation {
    pub name: String,
    pub expression: String,
    /// Declared result type; the number is converted on output.
    #[serde(rename = "type")]
    pub result_type: ColumnType,
}

impl Default for Calculation {
    fn default() -> Self {
        Self {
            name: String::new(),
            expression: String::new(),
            result_type: ColumnType::Number,
        }
    }
}

impl Calculation {
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            result_type: ColumnType::Number,
        }
    }

    pub fn with_type(mut self, result_type: ColumnType) -> Self {
        self.result_type = result_type;
        self
    }

    fn convert(&self, n: f64) -> Value {
        match self.result_type {
            ColumnType::String => Value::String(format_number(n)),
            ColumnType::Boolean => Value::Bool(n != 0.0),
            ColumnType::Number | ColumnType::Date => Value::Number(n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculateConfig {
    pub calculations: Vec<Calculation>,
}

impl CalculateConfig {
    pub fn new(calculations: Vec<Calculation>) -> Self {
        Self { calculations }
    }

    pub(crate) fn template() -> Self {
        Self::new(vec![Calculation::default()])
    }

    pub fn apply(&self, input: &Dataset) -> OperatorResult<Dataset> {
        // Unnamed calculations are skipped
        let compiled: Vec<(&Calculation, Result<Expression, ExprError>)> = self
            .calculations
            .iter()
            .filter(|calc| !calc.name.is_empty())
            .map(|calc| (calc, Expression::parse(&calc.expression)))
            .collect();

        for (calc, parsed) in &compiled {
            if let Err(e) = parsed {
                trace!(column = %calc.name, expression = %calc.expression, "Parse failed: {}", e);
            }
        }

        let rows = input
            .rows
            .iter()
            .map(|row| {
                let mut out = row.clone();
                for (calc, parsed) in &compiled {
                    let value = match parsed {
                        Ok(expr) => evaluate_cell(calc, expr, row),
                        Err(_) => Value::Null,
                    };
                    out.insert(calc.name.clone(), value);
                }
                out
            })
            .collect();

        Ok(input.derive(Provenance::Operator(NodeType::Calculate), rows))
    }
}

fn evaluate_cell(calc: &Calculation, expr: &Expression, row: &Row) -> Value {
    match expr.evaluate(row) {
        Ok(n) => calc.convert(n),
        Err(e) => {
            trace!(column = %calc.name, "Evaluation failed: {}", e);
            Value::Null
        }
    }
}
