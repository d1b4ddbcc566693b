//! Node type enumeration.
//!
//! This module defines the closed set of transformation kinds a pipeline
//! node can have, along with the template data (display name, description,
//! ports) used when a node is created from scratch.

use crate::pipeline::error::PipelineError;
use crate::pipeline::port::{PortDescriptor, JOIN_PORTS, SINGLE_INPUT_PORTS};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Types of transformation nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Keeps rows matching every condition.
    Filter,
    /// Stable multi-key sort.
    Sort,
    /// Partition by key columns and aggregate each partition.
    Group,
    /// Equality join of two inputs.
    Join,
    /// Collapse the whole input to one row of aggregates.
    Aggregate,
    /// Null removal, de-duplication and whitespace trimming.
    Clean,
    /// Adds columns computed from arithmetic expressions.
    Calculate,
    /// Long-to-wide reshape.
    Pivot,
}

impl NodeType {
    /// Identifier used in project files.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Filter => "filter",
            NodeType::Sort => "sort",
            NodeType::Group => "group",
            NodeType::Join => "join",
            NodeType::Aggregate => "aggregate",
            NodeType::Clean => "clean",
            NodeType::Calculate => "calculate",
            NodeType::Pivot => "pivot",
        }
    }

    /// Get the display name for this node type.
    pub fn display_name(&self) -> &'static str {
        match self {
            NodeType::Filter => "Filter Rows",
            NodeType::Sort => "Sort Data",
            NodeType::Group => "Group By",
            NodeType::Join => "Join Data",
            NodeType::Aggregate => "Aggregate",
            NodeType::Clean => "Clean Data",
            NodeType::Calculate => "Calculate Column",
            NodeType::Pivot => "Pivot Table",
        }
    }

    /// Get all available node types.
    pub fn all() -> &'static [NodeType] {
        &[
            NodeType::Filter,
            NodeType::Sort,
            NodeType::Group,
            NodeType::Join,
            NodeType::Aggregate,
            NodeType::Clean,
            NodeType::Calculate,
            NodeType::Pivot,
        ]
    }

    /// Port descriptors for this kind.
    pub fn ports(self) -> &'static [PortDescriptor] {
        match self {
            NodeType::Join => JOIN_PORTS,
            _ => SINGLE_INPUT_PORTS,
        }
    }

    /// Input ports in declaration order.
    pub fn input_ports(self) -> impl Iterator<Item = &'static PortDescriptor> {
        self.ports().iter().filter(|p| p.is_input())
    }

    /// Get a detailed description of what this node does.
    pub fn description(&self) -> &'static str {
        match self {
            NodeType::Filter => "Filter data based on conditions",
            NodeType::Sort => "Sort rows by one or more columns",
            NodeType::Group => "Group data by columns",
            NodeType::Join => "Join two datasets",
            NodeType::Aggregate => "Calculate aggregations",
            NodeType::Clean => "Clean and validate data",
            NodeType::Calculate => "Add calculated columns",
            NodeType::Pivot => "Pivot data into a cross-tab format",
        }
    }
}

impl FromStr for NodeType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PipelineError::UnknownNodeKind(s.to_string()))
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
