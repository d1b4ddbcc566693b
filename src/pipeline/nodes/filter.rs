//! Filter operator: keeps rows matching every condition.
//!
//! An empty condition list passes every row through unchanged.

use crate::pipeline::error::OperatorResult;
use crate::pipeline::node_type::NodeType;
use crate::types::{cell, Dataset, Provenance, Row, Value};
use serde::{Deserialize, Serialize};

/// Comparison applied by a single condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// Loose equality with numeric/string/boolean coercion
    #[default]
    #[serde(alias = "eq")]
    Equals,
    #[serde(alias = "not-equals", alias = "ne")]
    NotEquals,
    /// Both sides parsed as numbers; a failed parse never matches
    #[serde(alias = "greater-than", alias = "gt")]
    GreaterThan,
    #[serde(alias = "less-than", alias = "lt")]
    LessThan,
    /// Stringified containment
    Contains,
    #[serde(alias = "starts-with")]
    StartsWith,
    #[serde(alias = "ends-with")]
    EndsWith,
    /// Null, absent or empty string
    #[serde(alias = "is-null")]
    IsNull,
    #[serde(alias = "is-not-null")]
    IsNotNull,
}

/// `column <operator> value`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Condition {
    pub column: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        let actual = cell(row, &self.column);
        let expected = &self.value;
        match self.operator {
            FilterOperator::Equals => actual.loose_eq(expected),
            FilterOperator::NotEquals => !actual.loose_eq(expected),
            FilterOperator::GreaterThan => actual.parse_float() > expected.parse_float(),
            FilterOperator::LessThan => actual.parse_float() < expected.parse_float(),
            FilterOperator::Contains => actual.to_text().contains(expected.to_text().as_ref()),
            FilterOperator::StartsWith => actual.to_text().starts_with(expected.to_text().as_ref()),
            FilterOperator::EndsWith => actual.to_text().ends_with(expected.to_text().as_ref()),
            FilterOperator::IsNull => actual.is_null_like(),
            FilterOperator::IsNotNull => !actual.is_null_like(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub conditions: Vec<Condition>,
}

impl FilterConfig {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub(crate) fn template() -> Self {
        Self::new(vec![Condition::new("", FilterOperator::Equals, "")])
    }

    pub fn apply(&self, input: &Dataset) -> OperatorResult<Dataset> {
        let rows = input
            .rows
            .iter()
            .filter(|row| self.conditions.iter().all(|c| c.matches(row)))
            .cloned()
            .collect();
        Ok(input.derive(Provenance::Operator(NodeType::Filter), rows))
    }
}
