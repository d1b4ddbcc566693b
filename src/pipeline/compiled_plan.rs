use crate::pipeline::id::NodeId;

/// Where a node input port reads its dataset from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// Output of an upstream node
    Node(NodeId),
    /// Seed binding, by index into the pipeline's seed list
    Seed(usize),
}

/// Resolved binding of one input port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub port: &'static str,
    pub source: InputSource,
}

/// One node of the plan with its resolved inputs.
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub node: NodeId,
    /// Input bindings in port declaration order
    pub inputs: Vec<PortBinding>,
    /// Dependency depth: 0 for nodes fed only by seeds
    pub level: usize,
}

/// Compiled execution plan for a pipeline graph.
#[derive(Debug, Clone, Default)]
pub struct CompiledPlan {
    /// Every live node in topological order
    pub steps: Vec<PlanStep>,

    /// Step indices grouped by dependency level; nodes of one level are
    /// independent of each other
    pub levels: Vec<Vec<usize>>,

    /// Graph generation this plan was compiled from
    pub generation: u64,

    /// Compilation statistics
    pub stats: PlanStats,
}

/// Statistics about the compiled plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanStats {
    /// Live nodes in the graph
    pub total_nodes: usize,

    /// Nodes whose inputs are all seeds
    pub source_nodes: usize,

    /// Nodes with no downstream edges
    pub sink_nodes: usize,

    /// Number of dependency levels
    pub levels: usize,

    /// Compilation time in microseconds
    pub compile_time_us: u64,
}

impl CompiledPlan {
    /// Check if the plan has any nodes
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Node ids in execution order.
    pub fn order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.steps.iter().map(|step| step.node)
    }

    /// Position of `node` in the execution order.
    pub fn position(&self, node: NodeId) -> Option<usize> {
        self.steps.iter().position(|step| step.node == node)
    }
}
