//! Pipeline executor: the graph model and its scheduler.
//!
//! A [`Pipeline`] owns a node arena, the edges between node ports and the
//! seed datasets bound to input ports. Each execution:
//! 1. Recompiles the plan if the graph changed since the last run.
//! 2. Executes nodes in topological order (or level by level when
//!    `parallel_branches` is enabled).
//! 3. Hands each output to every downstream port reading from it.
//!
//! Runs are independent: outputs are freshly allocated per run and inputs
//! are shared read-only through `Arc`.

use crate::config::EngineSettings;
use crate::pipeline::compiled_plan::{CompiledPlan, InputSource, PlanStep};
use crate::pipeline::compiler::PipelineCompiler;
use crate::pipeline::error::{OperatorError, OperatorResult, PipelineError, PipelineResult};
use crate::pipeline::id::{EdgeId, NodeId};
use crate::pipeline::node::{NodeConfig, NodeContext, NodeInputs, TransformNode};
use crate::pipeline::node_type::NodeType;
use crate::pipeline::port::{find_port, PortDirection, INPUT_PORT, OUTPUT_PORT};
use crate::types::Dataset;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Node outputs of one run, keyed by node id in execution order.
pub type RunOutput = IndexMap<NodeId, Arc<Dataset>>;

/// An edge connecting an output port of one node to an input port of another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub from_node: NodeId,
    pub from_port: &'static str,
    pub to_node: NodeId,
    pub to_port: &'static str,
}

/// A slot in the node arena.
#[derive(Debug, Clone)]
pub struct NodeSlot {
    pub node: TransformNode,
    /// Whether this node has been deleted (slot is a tombstone).
    pub deleted: bool,
}

impl NodeSlot {
    pub fn new(node: TransformNode) -> Self {
        Self {
            node,
            deleted: false,
        }
    }
}

/// A seed dataset bound to a node input port.
#[derive(Debug, Clone)]
pub struct SeedBinding {
    pub node: NodeId,
    pub port: &'static str,
    pub dataset: Arc<Dataset>,
}

/// Whole-run cancellation flag, checked between nodes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Why a run stopped early.
enum RunInterrupt {
    Cancelled,
    Failed { node_id: NodeId, source: OperatorError },
}

/// The pipeline graph and executor.
#[derive(Debug, Clone)]
pub struct Pipeline {
    id: String,
    name: String,
    description: String,
    nodes: Vec<NodeSlot>,
    edges: Vec<Edge>,
    seeds: Vec<SeedBinding>,
    next_edge_id: u32,
    /// Cached compiled execution plan
    compiled_plan: Option<CompiledPlan>,
    /// Generation counter, bumped on every graph mutation
    graph_generation: u64,
    settings: EngineSettings,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Pipeline {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            seeds: Vec::new(),
            next_edge_id: 0,
            compiled_plan: None,
            graph_generation: 0,
            settings: EngineSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: EngineSettings) {
        self.settings = settings;
        self.updated_at = Utc::now();
    }

    pub fn generation(&self) -> u64 {
        self.graph_generation
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // ── Graph building ──

    /// Add a node to the pipeline. Returns its NodeId.
    pub fn add_node(&mut self, node: TransformNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        tracing::debug!("Added node {} '{}' ({})", id, node.name, node.kind());
        self.nodes.push(NodeSlot::new(node));
        self.invalidate_compiled_plan();
        id
    }

    /// Add a node of `kind` built from its template.
    pub fn add_transform_node(&mut self, kind: NodeType) -> NodeId {
        self.add_node(TransformNode::from_template(kind))
    }

    /// Get a live node.
    pub fn node(&self, id: NodeId) -> Option<&TransformNode> {
        self.live_slot(id).map(|slot| &slot.node)
    }

    /// Live nodes with their ids, in id order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &TransformNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.deleted)
            .map(|(i, slot)| (NodeId(i as u32), &slot.node))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| !slot.deleted).count()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn seeds(&self) -> &[SeedBinding] {
        &self.seeds
    }

    /// Connect the `output` port of `from` to the `input` port of `to`.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> PipelineResult<EdgeId> {
        self.connect(from, OUTPUT_PORT, to, INPUT_PORT)
    }

    /// Connect a named output port to a named input port.
    ///
    /// Fails if either node is missing, a port does not exist, or the input
    /// port is already fed by another edge. Cycles are not rejected here;
    /// use [`would_create_cycle`](Self::would_create_cycle) to check first.
    pub fn connect(
        &mut self,
        from: NodeId,
        from_port: &str,
        to: NodeId,
        to_port: &str,
    ) -> PipelineResult<EdgeId> {
        let from_port = self.resolve_port(from, from_port, PortDirection::Output)?;
        let to_port = self.resolve_port(to, to_port, PortDirection::Input)?;

        if let Some(existing) = self
            .edges
            .iter()
            .find(|e| e.to_node == to && e.to_port == to_port)
        {
            return Err(PipelineError::InvalidEdge(format!(
                "port '{}' of {} is already fed by {}",
                to_port, to, existing.id
            )));
        }

        let id = EdgeId(self.next_edge_id);
        self.next_edge_id += 1;
        self.edges.push(Edge {
            id,
            from_node: from,
            from_port,
            to_node: to,
            to_port,
        });
        self.invalidate_compiled_plan();
        tracing::debug!("Added edge {}: {}.{} -> {}.{}", id, from, from_port, to, to_port);
        Ok(id)
    }

    /// Bind a seed dataset to the `input` port of `node`.
    pub fn attach_input(
        &mut self,
        node: NodeId,
        dataset: impl Into<Arc<Dataset>>,
    ) -> PipelineResult<()> {
        self.attach_seed(node, INPUT_PORT, dataset)
    }

    /// Bind a seed dataset to an input port, replacing any previous seed on
    /// that port. An edge into the same port takes precedence at run time.
    pub fn attach_seed(
        &mut self,
        node: NodeId,
        port: &str,
        dataset: impl Into<Arc<Dataset>>,
    ) -> PipelineResult<()> {
        let port = self.resolve_port(node, port, PortDirection::Input)?;
        let dataset = dataset.into();
        match self
            .seeds
            .iter_mut()
            .find(|s| s.node == node && s.port == port)
        {
            Some(existing) => existing.dataset = dataset,
            None => self.seeds.push(SeedBinding {
                node,
                port,
                dataset,
            }),
        }
        self.invalidate_compiled_plan();
        Ok(())
    }

    /// Rename a node and/or replace its configuration.
    ///
    /// A replacement configuration must be of the node's existing kind.
    pub fn update_node(
        &mut self,
        id: NodeId,
        name: Option<String>,
        config: Option<NodeConfig>,
    ) -> PipelineResult<()> {
        let slot = self
            .nodes
            .get_mut(id.index())
            .filter(|slot| !slot.deleted)
            .ok_or(PipelineError::UnknownNode(id))?;

        if let Some(config) = &config {
            if config.node_type() != slot.node.kind() {
                return Err(PipelineError::InvalidConfig {
                    node: slot.node.name.clone(),
                    message: format!(
                        "cannot replace a {} configuration with a {} configuration",
                        slot.node.kind(),
                        config.node_type()
                    ),
                });
            }
        }

        if let Some(name) = name {
            slot.node.name = name;
        }
        if let Some(config) = config {
            slot.node.config = config;
        }
        self.invalidate_compiled_plan();
        Ok(())
    }

    /// Delete a node along with its edges and seed bindings.
    ///
    /// The slot becomes a tombstone so other node ids stay valid.
    pub fn remove_node(&mut self, id: NodeId) -> PipelineResult<TransformNode> {
        let slot = self
            .nodes
            .get_mut(id.index())
            .filter(|slot| !slot.deleted)
            .ok_or(PipelineError::UnknownNode(id))?;
        slot.deleted = true;
        let removed = slot.node.clone();

        self.edges.retain(|e| e.from_node != id && e.to_node != id);
        self.seeds.retain(|s| s.node != id);
        self.invalidate_compiled_plan();
        tracing::info!("Removed node {} '{}'", id, removed.name);
        Ok(removed)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> PipelineResult<Edge> {
        let idx = self
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or(PipelineError::UnknownEdge(id))?;
        let edge = self.edges.remove(idx);
        self.invalidate_compiled_plan();
        tracing::debug!("Removed edge {}", id);
        Ok(edge)
    }

    /// Check if adding an edge from `from` to `to` would create a cycle.
    pub fn would_create_cycle(&self, from: NodeId, to: NodeId) -> bool {
        // If `to` can reach `from` through existing edges, adding from->to creates a cycle.
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![to];

        while let Some(current) = stack.pop() {
            if current == from {
                return true;
            }
            let idx = current.index();
            if idx >= self.nodes.len() || visited[idx] {
                continue;
            }
            visited[idx] = true;

            for edge in &self.edges {
                if edge.from_node == current && !self.nodes[edge.to_node.index()].deleted {
                    stack.push(edge.to_node);
                }
            }
        }
        false
    }

    fn live_slot(&self, id: NodeId) -> Option<&NodeSlot> {
        self.nodes.get(id.index()).filter(|slot| !slot.deleted)
    }

    fn resolve_port(
        &self,
        node: NodeId,
        port: &str,
        direction: PortDirection,
    ) -> PipelineResult<&'static str> {
        let slot = self.live_slot(node).ok_or(PipelineError::UnknownNode(node))?;
        find_port(slot.node.ports(), port, direction)
            .map(|p| p.name)
            .ok_or_else(|| {
                PipelineError::PortMismatch(format!(
                    "{} ({}) has no {} port '{}'",
                    node,
                    slot.node.kind(),
                    match direction {
                        PortDirection::Input => "input",
                        PortDirection::Output => "output",
                    },
                    port
                ))
            })
    }

    /// Invalidate the compiled execution plan (called when the graph changes).
    fn invalidate_compiled_plan(&mut self) {
        self.graph_generation += 1;
        self.updated_at = Utc::now();
    }

    // ── Compilation ──

    /// Compile the graph, reusing the cached plan if nothing changed.
    pub fn compile(&mut self) -> PipelineResult<&CompiledPlan> {
        let plan = match self.compiled_plan.take() {
            Some(plan) if plan.generation == self.graph_generation => plan,
            _ => {
                let plan = PipelineCompiler::compile(
                    &self.nodes,
                    &self.edges,
                    &self.seeds,
                    self.graph_generation,
                )?;
                tracing::info!(
                    "Pipeline '{}' compiled: {} nodes, {} levels (gen {}, {}us)",
                    self.name,
                    plan.stats.total_nodes,
                    plan.stats.levels,
                    plan.generation,
                    plan.stats.compile_time_us,
                );
                plan
            }
        };
        let plan: &CompiledPlan = self.compiled_plan.insert(plan);
        Ok(plan)
    }

    // ── Execution ──

    /// Execute every node and return its output dataset.
    pub fn execute(&mut self) -> PipelineResult<RunOutput> {
        self.execute_with_cancel(&CancelToken::new())
    }

    /// Execute, checking `cancel` before each node (or each level when
    /// running parallel branches). A cancelled run discards its results.
    pub fn execute_with_cancel(&mut self, cancel: &CancelToken) -> PipelineResult<RunOutput> {
        self.compile()?;
        let Some(plan) = self.compiled_plan.as_ref() else {
            return Ok(RunOutput::new());
        };
        self.run_plan(plan, cancel)
    }

    fn run_plan(&self, plan: &CompiledPlan, cancel: &CancelToken) -> PipelineResult<RunOutput> {
        let started = Instant::now();
        tracing::info!(
            "Executing pipeline '{}' ({} nodes{})",
            self.name,
            plan.steps.len(),
            if self.settings.parallel_branches {
                ", parallel branches"
            } else {
                ""
            }
        );

        let mut results: Vec<Option<Arc<Dataset>>> = vec![None; self.nodes.len()];
        let outcome = if self.settings.parallel_branches {
            self.run_levels(plan, cancel, &mut results)
        } else {
            self.run_sequential(plan, cancel, &mut results)
        };

        match outcome {
            Ok(()) => {
                let output = Self::collect_outputs(plan, &mut results);
                tracing::info!(
                    "Pipeline '{}' finished in {:?}",
                    self.name,
                    started.elapsed()
                );
                Ok(output)
            }
            Err(RunInterrupt::Cancelled) => {
                tracing::warn!("Pipeline '{}' cancelled", self.name);
                Err(PipelineError::Cancelled)
            }
            Err(RunInterrupt::Failed { node_id, source }) => {
                let kind = self.nodes[node_id.index()].node.kind();
                tracing::warn!("Node {} ({}) failed: {}", node_id, kind, source);
                Err(PipelineError::Operator {
                    node_id,
                    kind,
                    source,
                    partial: Self::collect_outputs(plan, &mut results),
                })
            }
        }
    }

    fn run_sequential(
        &self,
        plan: &CompiledPlan,
        cancel: &CancelToken,
        results: &mut [Option<Arc<Dataset>>],
    ) -> Result<(), RunInterrupt> {
        for step in &plan.steps {
            if cancel.is_cancelled() {
                return Err(RunInterrupt::Cancelled);
            }
            let output = self
                .run_step(step, results)
                .map_err(|source| RunInterrupt::Failed {
                    node_id: step.node,
                    source,
                })?;
            results[step.node.index()] = Some(Arc::new(output));
        }
        Ok(())
    }

    /// Run each dependency level's nodes on scoped threads, at most one
    /// thread per available core.
    fn run_levels(
        &self,
        plan: &CompiledPlan,
        cancel: &CancelToken,
        results: &mut [Option<Arc<Dataset>>],
    ) -> Result<(), RunInterrupt> {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        tracing::debug!("Running {} levels on up to {} threads", plan.levels.len(), workers);

        for level in &plan.levels {
            if cancel.is_cancelled() {
                return Err(RunInterrupt::Cancelled);
            }

            let shared: &[Option<Arc<Dataset>>] = results;
            let run_chunk = |chunk: &[usize]| -> Vec<(usize, OperatorResult<Dataset>)> {
                chunk
                    .iter()
                    .map(|&i| (i, self.run_step(&plan.steps[i], shared)))
                    .collect()
            };
            let chunk = level_chunk_size(level.len(), workers);
            let outcomes: Vec<(usize, OperatorResult<Dataset>)> = if chunk >= level.len() {
                run_chunk(level)
            } else {
                std::thread::scope(|scope| {
                    let handles: Vec<_> = level
                        .chunks(chunk)
                        .map(|part| scope.spawn(move || run_chunk(part)))
                        .collect();
                    handles
                        .into_iter()
                        .flat_map(|handle| {
                            handle
                                .join()
                                .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
                        })
                        .collect()
                })
            };

            // Merge in plan order; the first failure in plan order wins.
            let mut failure = None;
            for (i, outcome) in outcomes {
                let node_id = plan.steps[i].node;
                match outcome {
                    Ok(output) => results[node_id.index()] = Some(Arc::new(output)),
                    Err(source) => {
                        failure.get_or_insert(RunInterrupt::Failed { node_id, source });
                    }
                }
            }
            if let Some(failure) = failure {
                return Err(failure);
            }
        }
        Ok(())
    }

    fn run_step(
        &self,
        step: &PlanStep,
        results: &[Option<Arc<Dataset>>],
    ) -> OperatorResult<Dataset> {
        let node = &self.nodes[step.node.index()].node;

        let mut inputs = NodeInputs::new();
        for binding in &step.inputs {
            let dataset = match binding.source {
                InputSource::Node(upstream) => results[upstream.index()].as_deref(),
                InputSource::Seed(i) => self.seeds.get(i).map(|seed| seed.dataset.as_ref()),
            };
            inputs.insert(
                binding.port,
                dataset.ok_or(OperatorError::MissingPort(binding.port))?,
            );
        }

        let ctx = NodeContext {
            node_id: step.node,
            key_separator: &self.settings.key_separator,
        };
        let started = Instant::now();
        let output = node.config.execute(&inputs, &ctx)?;
        tracing::debug!(
            "Node {} '{}' ({}): {} rows in {:?}",
            step.node,
            node.name,
            node.kind(),
            output.row_count(),
            started.elapsed()
        );
        Ok(output)
    }

    fn collect_outputs(plan: &CompiledPlan, results: &mut [Option<Arc<Dataset>>]) -> RunOutput {
        plan.steps
            .iter()
            .filter_map(|step| {
                results[step.node.index()]
                    .take()
                    .map(|dataset| (step.node, dataset))
            })
            .collect()
    }
}

/// Nodes per thread when a level of `len` nodes is spread over `workers`.
fn level_chunk_size(len: usize, workers: usize) -> usize {
    len.div_ceil(workers.max(1)).max(1)
}
