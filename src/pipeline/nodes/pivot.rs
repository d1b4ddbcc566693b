//! Pivot operator: long-to-wide reshape.
//!
//! Rows are grouped by `rowFields`; every distinct `columnFields` tuple found
//! anywhere in the input becomes one output column, in first-appearance
//! order. Each cell aggregates the `valueFields` of the rows in that
//! row-group and column-group. With several value fields, their values are
//! pooled into one list before aggregating.
//!
//! Output column names are the stringified column keys. A key equal to one
//! of the `rowFields` names (a `q` value of `"region"` when pivoting by
//! `region`) replaces that field's value in the output row, in the same way
//! composite keys can collide on the separator.

use crate::pipeline::error::OperatorResult;
use crate::pipeline::node::NodeContext;
use crate::pipeline::node_type::NodeType;
use crate::pipeline::nodes::aggregation::{coerce_cell, composite_key, AggregateFunction};
use crate::types::{cell, Dataset, Provenance, Row, Value};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PivotConfig {
    pub row_fields: Vec<String>,
    pub column_fields: Vec<String>,
    pub value_fields: Vec<String>,
    pub aggregate_function: AggregateFunction,
}

struct RowGroup<'a> {
    first: &'a Row,
    cells: IndexMap<String, Vec<f64>>,
}

impl PivotConfig {
    pub fn new(
        row_fields: Vec<String>,
        column_fields: Vec<String>,
        value_fields: Vec<String>,
        aggregate_function: AggregateFunction,
    ) -> Self {
        Self {
            row_fields,
            column_fields,
            value_fields,
            aggregate_function,
        }
    }

    pub fn apply(&self, input: &Dataset, ctx: &NodeContext<'_>) -> OperatorResult<Dataset> {
        let separator = ctx.key_separator;
        let mut column_keys: IndexSet<String> = IndexSet::new();
        let mut groups: IndexMap<String, RowGroup<'_>> = IndexMap::new();

        for row in &input.rows {
            let row_key = composite_key(row, &self.row_fields, separator);
            let column_key = composite_key(row, &self.column_fields, separator);
            column_keys.insert(column_key.clone());

            let group = groups.entry(row_key).or_insert_with(|| RowGroup {
                first: row,
                cells: IndexMap::new(),
            });
            let values = group.cells.entry(column_key).or_default();
            values.extend(self.value_fields.iter().map(|field| coerce_cell(row, field)));
        }

        let rows = groups
            .values()
            .map(|group| {
                let mut out = Row::with_capacity(self.row_fields.len() + column_keys.len());
                for field in &self.row_fields {
                    out.insert(field.clone(), cell(group.first, field).clone());
                }
                for key in &column_keys {
                    let values = group.cells.get(key).map(Vec::as_slice).unwrap_or(&[]);
                    out.insert(key.clone(), Value::Number(self.aggregate_function.apply(values)));
                }
                out
            })
            .collect();

        Ok(input.derive(Provenance::Operator(NodeType::Pivot), rows))
    }
}
