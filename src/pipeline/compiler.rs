use super::compiled_plan::{CompiledPlan, InputSource, PlanStats, PlanStep, PortBinding};
use super::error::{PipelineError, PipelineResult};
use super::executor::{Edge, NodeSlot, SeedBinding};
use super::id::NodeId;
use super::port::{find_port, PortDirection};

/// Traversal state of a node during the depth-first sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    Open,
    Done,
}

/// Edges and seeds feeding each node, keyed by target node index.
///
/// A node has at most two input ports, so each per-node list is tiny and
/// port lookups stay constant time.
struct InputIndex {
    edges: Vec<Vec<(&'static str, usize)>>,
    seeds: Vec<Vec<(&'static str, usize)>>,
}

/// Compiles a pipeline graph into an execution plan
pub struct PipelineCompiler;

impl PipelineCompiler {
    /// Compile a pipeline graph into an execution plan.
    ///
    /// Validates every edge and seed binding, orders the live nodes so each
    /// node follows everything it depends on, and resolves the source of
    /// every input port. Nothing is executed; every structural problem is
    /// reported here.
    ///
    /// # Arguments
    /// * `nodes` - The node arena (deleted slots are skipped)
    /// * `edges` - All edges in the graph
    /// * `seeds` - Seed datasets bound to input ports
    /// * `generation` - Generation counter for cache invalidation
    pub fn compile(
        nodes: &[NodeSlot],
        edges: &[Edge],
        seeds: &[SeedBinding],
        generation: u64,
    ) -> PipelineResult<CompiledPlan> {
        let start_time = std::time::Instant::now();

        for edge in edges {
            Self::validate_edge(nodes, edge)?;
        }
        for seed in seeds {
            Self::validate_seed(nodes, seed)?;
        }
        let index = Self::index_inputs(nodes.len(), edges, seeds)?;

        let deps = Self::build_dependencies(nodes, edges);
        let order = Self::topological_sort(nodes, &deps)?;

        let mut steps = Vec::with_capacity(order.len());
        let mut level_of = vec![0usize; nodes.len()];
        for &idx in &order {
            let inputs = Self::bind_inputs(nodes, edges, &index, idx)?;
            let level = inputs
                .iter()
                .filter_map(|binding| match binding.source {
                    InputSource::Node(up) => Some(level_of[up.index()] + 1),
                    InputSource::Seed(_) => None,
                })
                .max()
                .unwrap_or(0);
            level_of[idx] = level;
            steps.push(PlanStep {
                node: NodeId(idx as u32),
                inputs,
                level,
            });
        }

        let level_count = steps.iter().map(|s| s.level + 1).max().unwrap_or(0);
        let mut levels = vec![Vec::new(); level_count];
        for (i, step) in steps.iter().enumerate() {
            levels[step.level].push(i);
        }

        let source_nodes = steps
            .iter()
            .filter(|s| {
                s.inputs
                    .iter()
                    .all(|b| matches!(b.source, InputSource::Seed(_)))
            })
            .count();
        let mut has_downstream = vec![false; nodes.len()];
        for edge in edges {
            has_downstream[edge.from_node.index()] = true;
        }
        let sink_nodes = steps
            .iter()
            .filter(|s| !has_downstream[s.node.index()])
            .count();

        let stats = PlanStats {
            total_nodes: steps.len(),
            source_nodes,
            sink_nodes,
            levels: levels.len(),
            compile_time_us: start_time.elapsed().as_micros() as u64,
        };

        Ok(CompiledPlan {
            steps,
            levels,
            generation,
            stats,
        })
    }

    /// Check that both endpoints are live and both ports exist with the
    /// right direction.
    fn validate_edge(nodes: &[NodeSlot], edge: &Edge) -> PipelineResult<()> {
        let from = Self::live_slot(nodes, edge.from_node).ok_or_else(|| {
            PipelineError::InvalidEdge(format!(
                "{} references missing source node {}",
                edge.id, edge.from_node
            ))
        })?;
        let to = Self::live_slot(nodes, edge.to_node).ok_or_else(|| {
            PipelineError::InvalidEdge(format!(
                "{} references missing target node {}",
                edge.id, edge.to_node
            ))
        })?;

        if find_port(from.node.ports(), edge.from_port, PortDirection::Output).is_none() {
            return Err(PipelineError::PortMismatch(format!(
                "{} ({}) has no output port '{}'",
                edge.from_node,
                from.node.kind(),
                edge.from_port
            )));
        }
        if find_port(to.node.ports(), edge.to_port, PortDirection::Input).is_none() {
            return Err(PipelineError::PortMismatch(format!(
                "{} ({}) has no input port '{}'",
                edge.to_node,
                to.node.kind(),
                edge.to_port
            )));
        }
        Ok(())
    }

    /// Group edges and seeds by target node in one pass, rejecting a port
    /// fed by two edges. The first seed bound to a port is kept.
    fn index_inputs(
        node_count: usize,
        edges: &[Edge],
        seeds: &[SeedBinding],
    ) -> PipelineResult<InputIndex> {
        let mut by_edge: Vec<Vec<(&'static str, usize)>> = vec![Vec::new(); node_count];
        for (i, edge) in edges.iter().enumerate() {
            let fed = &mut by_edge[edge.to_node.index()];
            if let Some(&(_, other)) = fed.iter().find(|(port, _)| *port == edge.to_port) {
                return Err(PipelineError::InvalidEdge(format!(
                    "{} and {} both feed port '{}' of {}",
                    edges[other].id, edge.id, edge.to_port, edge.to_node
                )));
            }
            fed.push((edge.to_port, i));
        }

        let mut by_seed: Vec<Vec<(&'static str, usize)>> = vec![Vec::new(); node_count];
        for (i, seed) in seeds.iter().enumerate() {
            let bound = &mut by_seed[seed.node.index()];
            if !bound.iter().any(|(port, _)| *port == seed.port) {
                bound.push((seed.port, i));
            }
        }

        Ok(InputIndex {
            edges: by_edge,
            seeds: by_seed,
        })
    }

    fn validate_seed(nodes: &[NodeSlot], seed: &SeedBinding) -> PipelineResult<()> {
        let slot = Self::live_slot(nodes, seed.node).ok_or(PipelineError::UnknownNode(seed.node))?;
        if find_port(slot.node.ports(), seed.port, PortDirection::Input).is_none() {
            return Err(PipelineError::PortMismatch(format!(
                "seed '{}' bound to {} ({}) which has no input port '{}'",
                seed.dataset.id,
                seed.node,
                slot.node.kind(),
                seed.port
            )));
        }
        Ok(())
    }

    fn live_slot(nodes: &[NodeSlot], id: NodeId) -> Option<&NodeSlot> {
        nodes.get(id.index()).filter(|slot| !slot.deleted)
    }

    /// Upstream nodes of every node, in edge order.
    fn build_dependencies(nodes: &[NodeSlot], edges: &[Edge]) -> Vec<Vec<usize>> {
        let mut deps = vec![Vec::new(); nodes.len()];
        for edge in edges {
            deps[edge.to_node.index()].push(edge.from_node.index());
        }
        deps
    }

    /// Depth-first topological sort.
    ///
    /// Roots are visited in node index order and dependencies in edge order,
    /// so the result is deterministic. Each node is emitted after all of its
    /// dependencies; meeting a node that is still open is a cycle.
    fn topological_sort(nodes: &[NodeSlot], deps: &[Vec<usize>]) -> PipelineResult<Vec<usize>> {
        let n = nodes.len();
        let mut state = vec![Visit::Unvisited; n];
        let mut order = Vec::with_capacity(n);
        // (node, index of the next dependency to visit)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..n {
            if nodes[root].deleted || state[root] != Visit::Unvisited {
                continue;
            }
            state[root] = Visit::Open;
            stack.push((root, 0));

            while let Some(top) = stack.last_mut() {
                let node = top.0;
                match deps[node].get(top.1).copied() {
                    Some(dep) => {
                        top.1 += 1;
                        match state[dep] {
                            Visit::Unvisited => {
                                state[dep] = Visit::Open;
                                stack.push((dep, 0));
                            }
                            Visit::Open => return Err(Self::cycle_error(&stack, dep)),
                            Visit::Done => {}
                        }
                    }
                    None => {
                        state[node] = Visit::Done;
                        order.push(node);
                        stack.pop();
                    }
                }
            }
        }

        Ok(order)
    }

    /// Build the cycle path, in edge direction, from the open stack.
    fn cycle_error(stack: &[(usize, usize)], reentered: usize) -> PipelineError {
        let start = stack
            .iter()
            .position(|&(node, _)| node == reentered)
            .unwrap_or(0);
        // The stack runs against edge direction (each entry is a dependency
        // of the one below it), so reverse it.
        let mut cycle: Vec<NodeId> = stack[start..]
            .iter()
            .map(|&(node, _)| node)
            .chain(std::iter::once(reentered))
            .map(|idx| NodeId(idx as u32))
            .collect();
        cycle.reverse();
        PipelineError::Cycle { cycle }
    }

    /// Resolve every input port of a node: an edge wins over a seed.
    fn bind_inputs(
        nodes: &[NodeSlot],
        edges: &[Edge],
        index: &InputIndex,
        idx: usize,
    ) -> PipelineResult<Vec<PortBinding>> {
        let node_id = NodeId(idx as u32);
        let node = &nodes[idx].node;
        node.kind()
            .input_ports()
            .map(|port| {
                let from_edge = index.edges[idx]
                    .iter()
                    .find(|(name, _)| *name == port.name)
                    .map(|&(_, e)| InputSource::Node(edges[e].from_node));
                let from_seed = || {
                    index.seeds[idx]
                        .iter()
                        .find(|(name, _)| *name == port.name)
                        .map(|&(_, s)| InputSource::Seed(s))
                };
                from_edge
                    .or_else(from_seed)
                    .map(|source| PortBinding {
                        port: port.name,
                        source,
                    })
                    .ok_or(PipelineError::MissingInput {
                        node_id,
                        kind: node.kind(),
                        port: port.name,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::id::EdgeId;
    use crate::pipeline::node::TransformNode;
    use crate::pipeline::node_type::NodeType;
    use crate::pipeline::port::{INPUT_PORT, LEFT_PORT, OUTPUT_PORT, RIGHT_PORT};
    use crate::types::{Dataset, Provenance};
    use std::sync::Arc;

    fn slot(kind: NodeType) -> NodeSlot {
        NodeSlot::new(TransformNode::from_template(kind))
    }

    fn edge(id: u32, from: u32, to: u32, to_port: &'static str) -> Edge {
        Edge {
            id: EdgeId(id),
            from_node: NodeId(from),
            from_port: OUTPUT_PORT,
            to_node: NodeId(to),
            to_port,
        }
    }

    fn seed(node: u32, port: &'static str) -> SeedBinding {
        SeedBinding {
            node: NodeId(node),
            port,
            dataset: Arc::new(Dataset::new("s", "S", Provenance::Manual, vec![])),
        }
    }

    #[test]
    fn test_compile_chain() {
        let nodes = vec![slot(NodeType::Filter), slot(NodeType::Sort), slot(NodeType::Group)];
        let edges = vec![edge(0, 1, 2, INPUT_PORT), edge(1, 0, 1, INPUT_PORT)];
        let seeds = vec![seed(0, INPUT_PORT)];

        let plan = PipelineCompiler::compile(&nodes, &edges, &seeds, 1).unwrap();
        assert_eq!(plan.order().collect::<Vec<_>>(), vec![NodeId(0), NodeId(1), NodeId(2)]);
        assert_eq!(plan.steps[0].inputs[0].source, InputSource::Seed(0));
        assert_eq!(plan.steps[2].inputs[0].source, InputSource::Node(NodeId(1)));
        assert_eq!(plan.levels, vec![vec![0], vec![1], vec![2]]);
        assert_eq!(plan.stats.total_nodes, 3);
        assert_eq!(plan.stats.source_nodes, 1);
        assert_eq!(plan.stats.sink_nodes, 1);
        assert_eq!(plan.generation, 1);
    }

    #[test]
    fn test_compile_diamond_levels() {
        // 0 -> 1 (left), 0 -> 2 -> 3, 3 -> 1 (right)
        let nodes = vec![
            slot(NodeType::Clean),
            slot(NodeType::Join),
            slot(NodeType::Filter),
            slot(NodeType::Sort),
        ];
        let edges = vec![
            edge(0, 0, 1, LEFT_PORT),
            edge(1, 0, 2, INPUT_PORT),
            edge(2, 2, 3, INPUT_PORT),
            edge(3, 3, 1, RIGHT_PORT),
        ];
        let plan = PipelineCompiler::compile(&nodes, &edges, &[seed(0, INPUT_PORT)], 0).unwrap();
        let pos = |n: u32| plan.position(NodeId(n)).unwrap();
        assert!(pos(0) < pos(2));
        assert!(pos(2) < pos(3));
        assert!(pos(3) < pos(1));
        assert_eq!(plan.steps[pos(1)].level, 3);
        assert_eq!(plan.stats.levels, 4);
    }

    #[test]
    fn test_cycle_detected() {
        let nodes = vec![slot(NodeType::Filter), slot(NodeType::Sort)];
        let edges = vec![edge(0, 0, 1, INPUT_PORT), edge(1, 1, 0, INPUT_PORT)];
        let err = PipelineCompiler::compile(&nodes, &edges, &[], 0).unwrap_err();
        match err {
            PipelineError::Cycle { cycle } => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 3);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_path_in_edge_direction() {
        let nodes = vec![slot(NodeType::Filter), slot(NodeType::Sort), slot(NodeType::Clean)];
        // 0 -> 1 -> 2 -> 0
        let edges = vec![
            edge(0, 0, 1, INPUT_PORT),
            edge(1, 1, 2, INPUT_PORT),
            edge(2, 2, 0, INPUT_PORT),
        ];
        let err = PipelineCompiler::compile(&nodes, &edges, &[], 0).unwrap_err();
        match err {
            PipelineError::Cycle { cycle } => {
                assert_eq!(cycle, vec![NodeId(0), NodeId(1), NodeId(2), NodeId(0)]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_loop_is_cycle() {
        let nodes = vec![slot(NodeType::Filter)];
        let edges = vec![edge(0, 0, 0, INPUT_PORT)];
        let err = PipelineCompiler::compile(&nodes, &edges, &[], 0).unwrap_err();
        assert!(matches!(err, PipelineError::Cycle { .. }));
    }

    #[test]
    fn test_missing_input() {
        let nodes = vec![slot(NodeType::Join)];
        let err = PipelineCompiler::compile(&nodes, &[], &[seed(0, LEFT_PORT)], 0).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingInput { node_id: NodeId(0), port: "right", .. }
        ));
    }

    #[test]
    fn test_edge_wins_over_seed() {
        let nodes = vec![slot(NodeType::Filter), slot(NodeType::Sort)];
        let edges = vec![edge(0, 0, 1, INPUT_PORT)];
        let seeds = vec![seed(0, INPUT_PORT), seed(1, INPUT_PORT)];
        let plan = PipelineCompiler::compile(&nodes, &edges, &seeds, 0).unwrap();
        let sort = &plan.steps[plan.position(NodeId(1)).unwrap()];
        assert_eq!(sort.inputs[0].source, InputSource::Node(NodeId(0)));
    }

    #[test]
    fn test_port_validation() {
        let nodes = vec![slot(NodeType::Filter), slot(NodeType::Sort)];
        let err = PipelineCompiler::compile(&nodes, &[edge(0, 0, 1, LEFT_PORT)], &[], 0).unwrap_err();
        assert!(matches!(err, PipelineError::PortMismatch(_)));

        let err = PipelineCompiler::compile(&nodes, &[], &[seed(1, RIGHT_PORT)], 0).unwrap_err();
        assert!(matches!(err, PipelineError::PortMismatch(_)));

        let err = PipelineCompiler::compile(&nodes, &[], &[seed(7, INPUT_PORT)], 0).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownNode(NodeId(7))));
    }

    #[test]
    fn test_duplicate_port_edges() {
        let nodes = vec![slot(NodeType::Filter), slot(NodeType::Sort), slot(NodeType::Clean)];
        let edges = vec![edge(0, 0, 2, INPUT_PORT), edge(1, 1, 2, INPUT_PORT)];
        let err = PipelineCompiler::compile(&nodes, &edges, &[], 0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidEdge(_)));
    }

    #[test]
    fn test_duplicate_port_error_names_both_edges() {
        let nodes = vec![slot(NodeType::Filter), slot(NodeType::Sort), slot(NodeType::Join)];
        let edges = vec![
            edge(4, 0, 2, LEFT_PORT),
            edge(5, 1, 2, RIGHT_PORT),
            edge(6, 1, 2, LEFT_PORT),
        ];
        match PipelineCompiler::compile(&nodes, &edges, &[], 0) {
            Err(PipelineError::InvalidEdge(msg)) => {
                assert!(msg.contains(&EdgeId(4).to_string()));
                assert!(msg.contains(&EdgeId(6).to_string()));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_long_chain_binds_every_node() {
        let n = 5_000u32;
        let nodes: Vec<_> = (0..n).map(|_| slot(NodeType::Sort)).collect();
        let edges: Vec<_> = (1..n).map(|i| edge(i, i - 1, i, INPUT_PORT)).collect();
        let seeds = vec![seed(0, INPUT_PORT), seed(0, INPUT_PORT)];

        let plan = PipelineCompiler::compile(&nodes, &edges, &seeds, 0).unwrap();
        assert_eq!(plan.steps.len(), n as usize);
        assert_eq!(plan.steps[0].inputs[0].source, InputSource::Seed(0));
        for (i, step) in plan.steps.iter().enumerate().skip(1) {
            assert_eq!(step.inputs[0].source, InputSource::Node(NodeId(i as u32 - 1)));
        }
        assert_eq!(plan.stats.levels, n as usize);
        assert_eq!(plan.stats.sink_nodes, 1);
    }

    #[test]
    fn test_deleted_nodes_skipped() {
        let mut nodes = vec![slot(NodeType::Filter), slot(NodeType::Sort)];
        nodes[0].deleted = true;
        let plan = PipelineCompiler::compile(&nodes, &[], &[seed(1, INPUT_PORT)], 3).unwrap();
        assert_eq!(plan.order().collect::<Vec<_>>(), vec![NodeId(1)]);
        assert_eq!(plan.stats.total_nodes, 1);
    }

    #[test]
    fn test_edge_to_deleted_node() {
        let mut nodes = vec![slot(NodeType::Filter), slot(NodeType::Sort)];
        nodes[1].deleted = true;
        let err = PipelineCompiler::compile(&nodes, &[edge(0, 0, 1, INPUT_PORT)], &[], 0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidEdge(_)));
    }
}
