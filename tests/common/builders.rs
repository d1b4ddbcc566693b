//! Test data builders for creating test objects

use dataforge_rs::pipeline::{NodeConfig, NodeId, Pipeline, TransformNode};
use dataforge_rs::types::{row, Provenance};
use dataforge_rs::{Dataset, EngineSettings, Row, Value};

/// Builder for creating test Datasets
pub struct DatasetBuilder {
    id: String,
    name: String,
    provenance: Provenance,
    rows: Vec<Row>,
}

impl DatasetBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            provenance: Provenance::Manual,
            rows: Vec::new(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn row<const N: usize>(mut self, cells: [(&str, Value); N]) -> Self {
        self.rows.push(row(cells));
        self
    }

    pub fn build(self) -> Dataset {
        Dataset::new(self.id, self.name, self.provenance, self.rows)
    }
}

/// The three-row staff table used throughout the tests
pub fn staff() -> Dataset {
    DatasetBuilder::new("staff")
        .name("Staff")
        .provenance(Provenance::Csv)
        .row([("dept", Value::from("eng")), ("sal", Value::from(100))])
        .row([("dept", Value::from("eng")), ("sal", Value::from(200))])
        .row([("dept", Value::from("sales")), ("sal", Value::from(50))])
        .build()
}

/// Builder for linear pipelines with a seeded first node
pub struct PipelineBuilder {
    pipeline: Pipeline,
    last: Option<NodeId>,
    ids: Vec<NodeId>,
}

impl PipelineBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            pipeline: Pipeline::new(name, name),
            last: None,
            ids: Vec::new(),
        }
    }

    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.pipeline.set_settings(settings);
        self
    }

    /// Append a node fed by the previous one.
    pub fn then(mut self, name: &str, config: NodeConfig) -> Self {
        let id = self.pipeline.add_node(TransformNode::new(name, config));
        if let Some(prev) = self.last {
            self.pipeline.add_edge(prev, id).unwrap();
        }
        self.last = Some(id);
        self.ids.push(id);
        self
    }

    /// Seed the first node's input.
    pub fn seed(mut self, dataset: Dataset) -> Self {
        let first = *self.ids.first().expect("add a node before seeding");
        self.pipeline.attach_input(first, dataset).unwrap();
        self
    }

    pub fn build(self) -> (Pipeline, Vec<NodeId>) {
        (self.pipeline, self.ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_builder() {
        let dataset = DatasetBuilder::new("t")
            .row([("a", Value::from(1))])
            .build();

        assert_eq!(dataset.id, "t");
        assert_eq!(dataset.row_count(), 1);
        assert_eq!(dataset.columns.len(), 1);
    }
}
