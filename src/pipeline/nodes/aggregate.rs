//! Aggregate operator: collapses the whole input into a single row.

use crate::pipeline::error::OperatorResult;
use crate::pipeline::node_type::NodeType;
use crate::pipeline::nodes::aggregation::{AggregateFunction, Aggregation};
use crate::types::{Dataset, Provenance, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    pub aggregations: Vec<Aggregation>,
}

impl AggregateConfig {
    pub fn new(aggregations: Vec<Aggregation>) -> Self {
        Self { aggregations }
    }

    pub(crate) fn template() -> Self {
        Self::new(vec![Aggregation::new(AggregateFunction::Sum, "").with_alias("")])
    }

    /// Always yields exactly one row, even for an empty input.
    pub fn apply(&self, input: &Dataset) -> OperatorResult<Dataset> {
        let mut out = Row::with_capacity(self.aggregations.len());
        for agg in &self.aggregations {
            out.insert(agg.output_name(), agg.evaluate(&input.rows));
        }
        Ok(input.derive(Provenance::Operator(NodeType::Aggregate), vec![out]))
    }
}
