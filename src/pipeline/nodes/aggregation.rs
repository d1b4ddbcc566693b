//! Aggregation functions shared by group, aggregate and pivot.

use crate::types::{cell, Row, Value};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Reduction applied to a column of numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    #[default]
    Sum,
    #[serde(alias = "average")]
    Avg,
    Min,
    Max,
    Count,
}

impl AggregateFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Count => "count",
        }
    }

    /// Reduce `values`.
    ///
    /// Over an empty set `sum` and `count` are 0; `avg`, `min` and `max` are
    /// `NaN`, which serializes as null.
    pub fn apply(&self, values: &[f64]) -> f64 {
        match self {
            AggregateFunction::Sum => values.iter().sum(),
            AggregateFunction::Count => values.len() as f64,
            _ if values.is_empty() => f64::NAN,
            AggregateFunction::Avg => values.iter().sum::<f64>() / values.len() as f64,
            AggregateFunction::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            AggregateFunction::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

impl std::fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One aggregation column: `function(column) AS alias`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Aggregation {
    pub column: String,
    pub function: AggregateFunction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Aggregation {
    pub fn new(function: AggregateFunction, column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            function,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Output column name; an empty alias counts as no alias.
    pub fn output_name(&self) -> String {
        match self.alias.as_deref() {
            Some(alias) if !alias.is_empty() => alias.to_string(),
            _ => format!("{}_{}", self.function, self.column),
        }
    }

    /// Aggregate `column` over `rows`, coercing each cell to a number.
    pub fn evaluate<'a>(&self, rows: impl IntoIterator<Item = &'a Row>) -> Value {
        let values: Vec<f64> = rows
            .into_iter()
            .map(|row| coerce_cell(row, &self.column))
            .collect();
        Value::Number(self.function.apply(&values))
    }
}

/// Numeric value of a cell; unparseable cells count as 0.
pub(crate) fn coerce_cell(row: &Row, column: &str) -> f64 {
    let value = cell(row, column);
    let n = value.parse_float();
    if n.is_nan() {
        trace!(column, value = %value, "non-numeric aggregation input coerced to 0");
        0.0
    } else {
        n
    }
}

/// Stringified composite key over `columns`.
pub(crate) fn composite_key(row: &Row, columns: &[String], separator: &str) -> String {
    let mut key = String::new();
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            key.push_str(separator);
        }
        key.push_str(&cell(row, column).to_text());
    }
    key
}
