//! Join operator: nested-loop equality join of `left` and `right`.
//!
//! Key comparison is strict: values of different types never match. A null
//! key, or a key column absent from the row, matches only another null. On
//! column-name collisions the right row's value wins.

use crate::pipeline::error::{OperatorError, OperatorResult};
use crate::pipeline::node_type::NodeType;
use crate::types::{cell, Dataset, Provenance, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    #[default]
    Inner,
    /// Inner rows plus every left row without a match, unmerged
    Left,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JoinConfig {
    pub join_type: JoinType,
    pub left_column: String,
    pub right_column: String,
}

impl JoinConfig {
    pub fn new(join_type: JoinType, left_column: impl Into<String>, right_column: impl Into<String>) -> Self {
        Self {
            join_type,
            left_column: left_column.into(),
            right_column: right_column.into(),
        }
    }

    pub fn inner(left_column: impl Into<String>, right_column: impl Into<String>) -> Self {
        Self::new(JoinType::Inner, left_column, right_column)
    }

    pub fn left(left_column: impl Into<String>, right_column: impl Into<String>) -> Self {
        Self::new(JoinType::Left, left_column, right_column)
    }

    pub fn apply(&self, left: &Dataset, right: &Dataset) -> OperatorResult<Dataset> {
        if self.left_column.is_empty() {
            return Err(OperatorError::MissingConfig("leftColumn"));
        }
        if self.right_column.is_empty() {
            return Err(OperatorError::MissingConfig("rightColumn"));
        }

        let mut rows = Vec::new();
        for left_row in &left.rows {
            let key = cell(left_row, &self.left_column);
            let mut matched = false;
            for right_row in &right.rows {
                if key.join_eq(cell(right_row, &self.right_column)) {
                    matched = true;
                    rows.push(merge(left_row, right_row));
                }
            }
            if !matched && self.join_type == JoinType::Left {
                rows.push(left_row.clone());
            }
        }

        Ok(Dataset::new(
            format!("joined_{}_{}", left.id, right.id),
            format!("{} \u{22c8} {}", left.name, right.name),
            Provenance::Operator(NodeType::Join),
            rows,
        ))
    }
}

fn merge(left: &Row, right: &Row) -> Row {
    let mut out = left.clone();
    for (column, value) in right {
        out.insert(column.clone(), value.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{row, Value};

    fn orders() -> Dataset {
        Dataset::new(
            "orders",
            "Orders",
            Provenance::Csv,
            vec![
                row([("id", Value::from(1)), ("cust", Value::from("a")), ("note", Value::from("left"))]),
                row([("id", Value::from(2)), ("cust", Value::from("b")), ("note", Value::from("left"))]),
                row([("id", Value::from(3)), ("cust", Value::Null), ("note", Value::from("left"))]),
            ],
        )
    }

    fn customers() -> Dataset {
        Dataset::new(
            "customers",
            "Customers",
            Provenance::Json,
            vec![
                row([("key", Value::from("a")), ("note", Value::from("right"))]),
                row([("key", Value::from("a")), ("note", Value::from("again"))]),
                row([("key", Value::Null), ("note", Value::from("null"))]),
            ],
        )
    }

    #[test]
    fn test_inner_join() {
        let out = JoinConfig::inner("cust", "key").apply(&orders(), &customers()).unwrap();
        assert_eq!(out.row_count(), 3);
        assert_eq!(out.rows[0]["id"], Value::from(1));
        assert_eq!(out.rows[0]["note"], Value::from("right"));
        assert_eq!(out.rows[1]["note"], Value::from("again"));
        assert_eq!(out.rows[2]["id"], Value::from(3));
        assert_eq!(out.id, "joined_orders_customers");
        assert_eq!(out.name, "Orders \u{22c8} Customers");
        assert_eq!(out.provenance, Provenance::Operator(NodeType::Join));
    }

    #[test]
    fn test_left_join_keeps_unmatched() {
        let out = JoinConfig::left("cust", "key").apply(&orders(), &customers()).unwrap();
        assert_eq!(out.row_count(), 4);
        assert_eq!(out.rows[2], orders().rows[1]);
        assert_eq!(out.rows[3]["id"], Value::from(3));
        assert_eq!(out.rows[3]["note"], Value::from("null"));
    }

    #[test]
    fn test_null_keys_match_each_other() {
        let left = Dataset::new("l", "L", Provenance::Manual, vec![row([("k", Value::Null)])]);
        let right = Dataset::new(
            "r",
            "R",
            Provenance::Manual,
            vec![row([("k", Value::Null), ("side", Value::from("right"))])],
        );
        let out = JoinConfig::inner("k", "k").apply(&left, &right).unwrap();
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.rows[0]["side"], Value::from("right"));
    }

    #[test]
    fn test_absent_key_columns_match() {
        let left = Dataset::new("l", "L", Provenance::Manual, vec![row([("a", 1)])]);
        let right = Dataset::new("r", "R", Provenance::Manual, vec![row([("b", 2)])]);
        let out = JoinConfig::inner("k", "k").apply(&left, &right).unwrap();
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.rows[0]["a"], Value::from(1));
        assert_eq!(out.rows[0]["b"], Value::from(2));

        let present = Dataset::new("r", "R", Provenance::Manual, vec![row([("k", 0)])]);
        assert!(JoinConfig::inner("k", "k").apply(&left, &present).unwrap().is_empty());
    }

    #[test]
    fn test_strict_key_types() {
        let left = Dataset::new("l", "L", Provenance::Manual, vec![row([("k", 1)])]);
        let right = Dataset::new("r", "R", Provenance::Manual, vec![row([("k", "1")])]);
        let out = JoinConfig::inner("k", "k").apply(&left, &right).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_missing_columns() {
        let err = JoinConfig::default().apply(&orders(), &customers()).unwrap_err();
        assert_eq!(err, OperatorError::MissingConfig("leftColumn"));
        let err = JoinConfig::inner("cust", "").apply(&orders(), &customers()).unwrap_err();
        assert_eq!(err, OperatorError::MissingConfig("rightColumn"));
    }

    #[test]
    fn test_deserialize() {
        let config: JoinConfig = serde_json::from_str(
            r#"{"joinType":"left","leftColumn":"cust","rightColumn":"key"}"#,
        )
        .unwrap();
        assert_eq!(config, JoinConfig::left("cust", "key"));
    }
}
