//! Pipeline-specific error types.
//!
//! Structural errors (cycles, missing inputs, bad edges, unknown kinds) are
//! raised while compiling the graph, before any operator runs. An operator
//! error aborts the run at the failing node and carries the outputs of the
//! nodes that had already completed.

use crate::pipeline::executor::RunOutput;
use crate::pipeline::id::{EdgeId, NodeId};
use crate::pipeline::node_type::NodeType;
use thiserror::Error;

/// Errors raised by a single operator invocation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperatorError {
    #[error("missing required configuration '{0}'")]
    MissingConfig(&'static str),

    #[error("input port '{0}' has no dataset")]
    MissingPort(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type OperatorResult<T> = std::result::Result<T, OperatorError>;

/// Errors that can occur within the pipeline system.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Cycle detected in pipeline graph through {}", format_cycle(.cycle))]
    Cycle { cycle: Vec<NodeId> },

    #[error("Node {node_id} ({kind}) has no input bound to port '{port}'")]
    MissingInput {
        node_id: NodeId,
        kind: NodeType,
        port: &'static str,
    },

    #[error("Unknown node kind '{0}'")]
    UnknownNodeKind(String),

    #[error("Invalid edge: {0}")]
    InvalidEdge(String),

    #[error("Port mismatch: {0}")]
    PortMismatch(String),

    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Unknown edge {0}")]
    UnknownEdge(EdgeId),

    #[error("Invalid configuration for node '{node}': {message}")]
    InvalidConfig { node: String, message: String },

    #[error("Node {node_id} ({kind}) failed: {source}")]
    Operator {
        node_id: NodeId,
        kind: NodeType,
        #[source]
        source: OperatorError,
        /// Outputs of nodes that completed before the failure.
        partial: RunOutput,
    },

    #[error("Pipeline run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// True for errors detected before any operator executed.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            PipelineError::Operator { .. } | PipelineError::Cancelled
        )
    }

    /// Partial results attached to an operator failure.
    pub fn partial_results(&self) -> Option<&RunOutput> {
        match self {
            PipelineError::Operator { partial, .. } => Some(partial),
            _ => None,
        }
    }

    /// The node an error points at, if any.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            PipelineError::Cycle { cycle } => cycle.first().copied(),
            PipelineError::MissingInput { node_id, .. }
            | PipelineError::Operator { node_id, .. } => Some(*node_id),
            PipelineError::UnknownNode(id) => Some(*id),
            _ => None,
        }
    }
}

fn format_cycle(cycle: &[NodeId]) -> String {
    cycle
        .iter()
        .map(|id| id.0.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
