//! Node abstraction for the pipeline.
//!
//! Every node carries a [`NodeConfig`], a closed enum over the eight built-in
//! transformation kinds. Dispatch is an exhaustive `match`, so adding a kind
//! is a compile error everywhere it must be handled.
//!
//! Operators are pure: they read their inputs through [`NodeInputs`] and
//! return a freshly allocated [`Dataset`].

use crate::pipeline::error::{OperatorError, OperatorResult};
use crate::pipeline::id::NodeId;
use crate::pipeline::node_type::NodeType;
use crate::pipeline::nodes::{
    AggregateConfig, CalculateConfig, CleanConfig, FilterConfig, GroupConfig, JoinConfig,
    PivotConfig, SortConfig,
};
use crate::pipeline::port::{PortDescriptor, INPUT_PORT, LEFT_PORT, RIGHT_PORT};
use crate::types::Dataset;
use serde::{Deserialize, Serialize};

/// Default separator for composite group and pivot keys.
pub const DEFAULT_KEY_SEPARATOR: &str = "|";

/// Per-invocation context handed to operators.
#[derive(Debug, Clone, Copy)]
pub struct NodeContext<'a> {
    /// Node being executed.
    pub node_id: NodeId,
    /// Separator used when stringifying composite keys.
    pub key_separator: &'a str,
}

impl Default for NodeContext<'_> {
    fn default() -> Self {
        Self {
            node_id: NodeId::default(),
            key_separator: DEFAULT_KEY_SEPARATOR,
        }
    }
}

/// Input datasets of one node invocation, keyed by port name.
#[derive(Debug, Default, Clone)]
pub struct NodeInputs<'a> {
    ports: Vec<(&'static str, &'a Dataset)>,
}

impl<'a> NodeInputs<'a> {
    pub fn new() -> Self {
        Self { ports: Vec::new() }
    }

    /// Inputs of a single-input node.
    pub fn single(dataset: &'a Dataset) -> Self {
        Self::new().with(INPUT_PORT, dataset)
    }

    /// Inputs of a join.
    pub fn pair(left: &'a Dataset, right: &'a Dataset) -> Self {
        Self::new().with(LEFT_PORT, left).with(RIGHT_PORT, right)
    }

    pub fn with(mut self, port: &'static str, dataset: &'a Dataset) -> Self {
        self.insert(port, dataset);
        self
    }

    /// Bind `dataset` to `port`, replacing any previous binding.
    pub fn insert(&mut self, port: &'static str, dataset: &'a Dataset) {
        match self.ports.iter_mut().find(|(name, _)| *name == port) {
            Some(slot) => slot.1 = dataset,
            None => self.ports.push((port, dataset)),
        }
    }

    pub fn get(&self, port: &str) -> Option<&'a Dataset> {
        self.ports
            .iter()
            .find(|(name, _)| *name == port)
            .map(|(_, ds)| *ds)
    }

    /// Look up a port, failing if nothing is bound to it.
    pub fn require(&self, port: &'static str) -> OperatorResult<&'a Dataset> {
        self.get(port).ok_or(OperatorError::MissingPort(port))
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

/// Kind-specific configuration of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum NodeConfig {
    Filter(FilterConfig),
    Sort(SortConfig),
    Group(GroupConfig),
    Join(JoinConfig),
    Aggregate(AggregateConfig),
    Clean(CleanConfig),
    Calculate(CalculateConfig),
    Pivot(PivotConfig),
}

impl NodeConfig {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeConfig::Filter(_) => NodeType::Filter,
            NodeConfig::Sort(_) => NodeType::Sort,
            NodeConfig::Group(_) => NodeType::Group,
            NodeConfig::Join(_) => NodeType::Join,
            NodeConfig::Aggregate(_) => NodeType::Aggregate,
            NodeConfig::Clean(_) => NodeType::Clean,
            NodeConfig::Calculate(_) => NodeType::Calculate,
            NodeConfig::Pivot(_) => NodeType::Pivot,
        }
    }

    /// Template configuration for a freshly created node.
    pub fn default_for(kind: NodeType) -> Self {
        match kind {
            NodeType::Filter => NodeConfig::Filter(FilterConfig::template()),
            NodeType::Sort => NodeConfig::Sort(SortConfig::template()),
            NodeType::Group => NodeConfig::Group(GroupConfig::default()),
            NodeType::Join => NodeConfig::Join(JoinConfig::default()),
            NodeType::Aggregate => NodeConfig::Aggregate(AggregateConfig::template()),
            NodeType::Clean => NodeConfig::Clean(CleanConfig::template()),
            NodeType::Calculate => NodeConfig::Calculate(CalculateConfig::template()),
            NodeType::Pivot => NodeConfig::Pivot(PivotConfig::default()),
        }
    }

    /// Decode the config payload of a node of the given kind.
    ///
    /// A `null` payload yields the kind's template.
    pub fn from_json(kind: NodeType, value: serde_json::Value) -> serde_json::Result<Self> {
        if value.is_null() {
            return Ok(Self::default_for(kind));
        }
        Ok(match kind {
            NodeType::Filter => NodeConfig::Filter(serde_json::from_value(value)?),
            NodeType::Sort => NodeConfig::Sort(serde_json::from_value(value)?),
            NodeType::Group => NodeConfig::Group(serde_json::from_value(value)?),
            NodeType::Join => NodeConfig::Join(serde_json::from_value(value)?),
            NodeType::Aggregate => NodeConfig::Aggregate(serde_json::from_value(value)?),
            NodeType::Clean => NodeConfig::Clean(serde_json::from_value(value)?),
            NodeType::Calculate => NodeConfig::Calculate(serde_json::from_value(value)?),
            NodeType::Pivot => NodeConfig::Pivot(serde_json::from_value(value)?),
        })
    }

    /// Encode the config payload without the kind tag.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            NodeConfig::Filter(c) => serde_json::to_value(c),
            NodeConfig::Sort(c) => serde_json::to_value(c),
            NodeConfig::Group(c) => serde_json::to_value(c),
            NodeConfig::Join(c) => serde_json::to_value(c),
            NodeConfig::Aggregate(c) => serde_json::to_value(c),
            NodeConfig::Clean(c) => serde_json::to_value(c),
            NodeConfig::Calculate(c) => serde_json::to_value(c),
            NodeConfig::Pivot(c) => serde_json::to_value(c),
        }
    }

    pub fn ports(&self) -> &'static [PortDescriptor] {
        self.node_type().ports()
    }

    /// Run the operator for this kind.
    pub fn execute(&self, inputs: &NodeInputs<'_>, ctx: &NodeContext<'_>) -> OperatorResult<Dataset> {
        match self {
            NodeConfig::Filter(c) => c.apply(inputs.require(INPUT_PORT)?),
            NodeConfig::Sort(c) => c.apply(inputs.require(INPUT_PORT)?),
            NodeConfig::Group(c) => c.apply(inputs.require(INPUT_PORT)?, ctx),
            NodeConfig::Join(c) => c.apply(inputs.require(LEFT_PORT)?, inputs.require(RIGHT_PORT)?),
            NodeConfig::Aggregate(c) => c.apply(inputs.require(INPUT_PORT)?),
            NodeConfig::Clean(c) => c.apply(inputs.require(INPUT_PORT)?, ctx),
            NodeConfig::Calculate(c) => c.apply(inputs.require(INPUT_PORT)?),
            NodeConfig::Pivot(c) => c.apply(inputs.require(INPUT_PORT)?, ctx),
        }
    }
}

/// A node as stored in the pipeline arena.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformNode {
    pub name: String,
    pub description: String,
    pub config: NodeConfig,
}

impl TransformNode {
    pub fn new(name: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            config,
        }
    }

    /// Instantiate a node of `kind` from its template.
    pub fn from_template(kind: NodeType) -> Self {
        Self {
            name: kind.display_name().to_string(),
            description: kind.description().to_string(),
            config: NodeConfig::default_for(kind),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn kind(&self) -> NodeType {
        self.config.node_type()
    }

    pub fn ports(&self) -> &'static [PortDescriptor] {
        self.config.ports()
    }
}
