//! # DataForge-RS: tabular dataflow engine
//!
//! A pipeline engine for in-memory tables. Users assemble a directed graph of
//! transformation nodes (filter, sort, group, join, aggregate, clean,
//! calculate, pivot), bind seed datasets to its inputs, and execute it to get
//! one output dataset per node.
//!
//! ## Architecture
//!
//! - **Types**: scalar `Value`s, ordered rows and `Dataset`s with columns
//!   inferred from the first row
//! - **Expression**: a restricted arithmetic language for calculated columns
//! - **Pipeline**: node graph, compiler, executor and background worker
//! - **Config**: JSON project files and TOML engine settings
//!
//! ## Example
//!
//! ```
//! use dataforge_rs::pipeline::nodes::{AggregateFunction, Aggregation, GroupConfig};
//! use dataforge_rs::pipeline::{NodeConfig, Pipeline, TransformNode};
//! use dataforge_rs::types::{row, Dataset, Provenance, Value};
//!
//! let staff = Dataset::new(
//!     "staff",
//!     "Staff",
//!     Provenance::Manual,
//!     vec![
//!         row([("dept", Value::from("eng")), ("sal", Value::from(100))]),
//!         row([("dept", Value::from("eng")), ("sal", Value::from(200))]),
//!         row([("dept", Value::from("sales")), ("sal", Value::from(50))]),
//!     ],
//! );
//!
//! let mut pipeline = Pipeline::new("example", "Salaries");
//! let group = pipeline.add_node(TransformNode::new(
//!     "by dept",
//!     NodeConfig::Group(GroupConfig::new(
//!         vec!["dept".to_string()],
//!         vec![Aggregation::new(AggregateFunction::Sum, "sal")],
//!     )),
//! ));
//! pipeline.attach_input(group, staff).unwrap();
//!
//! let outputs = pipeline.execute().unwrap();
//! assert_eq!(outputs[&group].rows[0]["sum_sal"], Value::from(300));
//! ```

pub mod config;
pub mod error;
pub mod expression;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use config::{EngineSettings, ProjectFile};
pub use error::{DataForgeError, Result, ResultExt};
pub use pipeline::{NodeId, NodeType, Pipeline, PipelineBridge, PipelineError};
pub use types::{Column, ColumnType, Dataset, Row, Value};
