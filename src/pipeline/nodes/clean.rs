//! Clean operator: ordered null removal, de-duplication and trimming.
//!
//! Sub-operations run in the configured order, each on the output of the
//! previous one. Operations scoped to no columns are no-ops, except
//! `remove-duplicates`, which then compares whole rows.
//!
//! Keying an empty column list literally would give every row the same
//! empty tuple and keep only the first row. Whole-row comparison is used
//! instead, so `remove-duplicates` with no columns drops exact duplicates
//! only.

use crate::pipeline::error::OperatorResult;
use crate::pipeline::node::NodeContext;
use crate::pipeline::node_type::NodeType;
use crate::pipeline::nodes::aggregation::composite_key;
use crate::types::{cell, Dataset, Provenance, Row, Value};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CleanOperation {
    /// Drop rows where any listed column is null, absent or empty
    #[serde(alias = "removeNulls")]
    RemoveNulls {
        #[serde(default)]
        columns: Vec<String>,
    },
    /// Keep the first row of each distinct key tuple
    #[serde(alias = "removeDuplicates")]
    RemoveDuplicates {
        #[serde(default)]
        columns: Vec<String>,
    },
    /// Trim leading and trailing whitespace of string cells
    #[serde(alias = "trimWhitespace")]
    TrimWhitespace {
        #[serde(default)]
        columns: Vec<String>,
    },
}

impl CleanOperation {
    pub fn remove_nulls<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        CleanOperation::RemoveNulls {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remove_duplicates<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        CleanOperation::RemoveDuplicates {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn trim_whitespace<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        CleanOperation::TrimWhitespace {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    fn run(&self, rows: Vec<Row>, separator: &str) -> Vec<Row> {
        match self {
            CleanOperation::RemoveNulls { columns } => rows
                .into_iter()
                .filter(|row| columns.iter().all(|c| !cell(row, c).is_null_like()))
                .collect(),
            CleanOperation::RemoveDuplicates { columns } => {
                let mut seen = IndexSet::new();
                rows.into_iter()
                    .filter(|row| seen.insert(dedup_key(row, columns, separator)))
                    .collect()
            }
            CleanOperation::TrimWhitespace { columns } => rows
                .into_iter()
                .map(|mut row| {
                    for column in columns {
                        if let Some(Value::String(s)) = row.get_mut(column) {
                            let trimmed = s.trim();
                            if trimmed.len() != s.len() {
                                *s = trimmed.to_string();
                            }
                        }
                    }
                    row
                })
                .collect(),
        }
    }
}

fn dedup_key(row: &Row, columns: &[String], separator: &str) -> String {
    if columns.is_empty() {
        // Whole-row identity: column names and typed values, in order.
        serde_json::to_string(row).unwrap_or_default()
    } else {
        composite_key(row, columns, separator)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    pub operations: Vec<CleanOperation>,
}

impl CleanConfig {
    pub fn new(operations: Vec<CleanOperation>) -> Self {
        Self { operations }
    }

    pub(crate) fn template() -> Self {
        Self::new(vec![
            CleanOperation::remove_nulls(Vec::<String>::new()),
            CleanOperation::remove_duplicates(Vec::<String>::new()),
            CleanOperation::trim_whitespace(Vec::<String>::new()),
        ])
    }

    pub fn apply(&self, input: &Dataset, ctx: &NodeContext<'_>) -> OperatorResult<Dataset> {
        let rows = self
            .operations
            .iter()
            .fold(input.rows.clone(), |rows, op| op.run(rows, ctx.key_separator));
        Ok(input.derive(Provenance::Operator(NodeType::Clean), rows))
    }
}
