//! Node-based dataflow pipelines over tabular datasets.
//!
//! Datasets flow through typed transform nodes connected by port-to-port
//! edges. Seed datasets are bound to input ports that no edge feeds. A run
//! compiles the graph into a topological plan, then invokes each node's
//! operator with its upstream outputs.
//!
//! # Architecture
//!
//! ```text
//! seed ──► [Filter] ──► [Sort] ──────────► left  ┐
//!                                                [Join] ──► [Pivot]
//! seed ──► [Clean] ──► [Calculate] ──────► right ┘
//! ```
//!
//! # Design
//!
//! - **Enum dispatch**: `NodeConfig` is a closed enum over the eight kinds.
//! - **Arena storage**: nodes in a `Vec` indexed by `NodeId`; deleted nodes
//!   leave tombstones so ids stay valid.
//! - **Compiled plans**: recompiled only when the graph generation changes.
//! - **Structural errors first**: cycles and unbound ports abort before any
//!   operator runs.
//! - **Background runs**: `PipelineBridge` executes pipelines on a worker
//!   thread and reports over crossbeam channels.

pub mod bridge;
pub mod compiled_plan;
pub mod compiler;
pub mod error;
pub mod executor;
pub mod id;
pub mod node;
pub mod node_type;
pub mod nodes;
pub mod port;

pub use bridge::{PipelineBridge, PipelineCommand, PipelineMessage, RunHandle};
pub use compiled_plan::{CompiledPlan, InputSource, PlanStats, PlanStep, PortBinding};
pub use compiler::PipelineCompiler;
pub use error::{OperatorError, OperatorResult, PipelineError, PipelineResult};
pub use executor::{CancelToken, Edge, NodeSlot, Pipeline, RunOutput, SeedBinding};
pub use id::{EdgeId, NodeId};
pub use node::{NodeConfig, NodeContext, NodeInputs, TransformNode, DEFAULT_KEY_SEPARATOR};
pub use node_type::NodeType;
pub use port::{PortDescriptor, PortDirection, INPUT_PORT, LEFT_PORT, OUTPUT_PORT, RIGHT_PORT};
