//! Sort operator: stable multi-key sort.

use crate::pipeline::error::OperatorResult;
use crate::pipeline::node_type::NodeType;
use crate::types::{cell, Dataset, Provenance, Row};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }

    fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let ord = cell(a, &self.column).sort_cmp(cell(b, &self.column));
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SortConfig {
    pub sort_by: Vec<SortKey>,
}

impl SortConfig {
    pub fn new(sort_by: Vec<SortKey>) -> Self {
        Self { sort_by }
    }

    pub(crate) fn template() -> Self {
        Self::new(vec![SortKey::asc("")])
    }

    /// Compare two rows key by key; ties fall through to the next key.
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        self.sort_by
            .iter()
            .map(|key| key.compare(a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    pub fn apply(&self, input: &Dataset) -> OperatorResult<Dataset> {
        let mut rows = input.rows.clone();
        // `sort_by` is stable, so full ties keep input order
        rows.sort_by(|a, b| self.compare(a, b));
        Ok(input.derive(Provenance::Operator(NodeType::Sort), rows))
    }
}
