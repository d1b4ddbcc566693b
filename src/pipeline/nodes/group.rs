//! Group operator: partitions rows by key columns and aggregates each group.
//!
//! The group key is the stringified key values joined with the configured
//! separator, so `("a|b", "c")` and `("a", "b|c")` collide under the default
//! `|`. Group columns in the output keep the values (and types) of the first
//! row of each group.

use crate::pipeline::error::OperatorResult;
use crate::pipeline::node::NodeContext;
use crate::pipeline::node_type::NodeType;
use crate::pipeline::nodes::aggregation::{composite_key, Aggregation};
use crate::types::{cell, Dataset, Provenance, Row};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroupConfig {
    pub group_by: Vec<String>,
    pub aggregations: Vec<Aggregation>,
}

impl GroupConfig {
    pub fn new(group_by: Vec<String>, aggregations: Vec<Aggregation>) -> Self {
        Self {
            group_by,
            aggregations,
        }
    }

    pub fn apply(&self, input: &Dataset, ctx: &NodeContext<'_>) -> OperatorResult<Dataset> {
        let mut groups: IndexMap<String, Vec<&Row>> = IndexMap::new();
        for row in &input.rows {
            let key = composite_key(row, &self.group_by, ctx.key_separator);
            groups.entry(key).or_default().push(row);
        }

        let rows = groups
            .values()
            .map(|members| {
                let first = members[0];
                let mut out = Row::with_capacity(self.group_by.len() + self.aggregations.len());
                for column in &self.group_by {
                    out.insert(column.clone(), cell(first, column).clone());
                }
                for agg in &self.aggregations {
                    out.insert(agg.output_name(), agg.evaluate(members.iter().copied()));
                }
                out
            })
            .collect();

        Ok(input.derive(Provenance::Operator(NodeType::Group), rows))
    }
}
