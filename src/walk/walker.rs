// src/walk/walker.rs

//! Single-pass attribution of nodes to worker, stage and parallel branch.
//!
//! Nodes arrive in reverse topological order, so every scope is entered at
//! its block-end and left at its boundary block-start. One tracker per scope
//! kind remembers the boundary id and the label captured on entry.

use std::collections::BTreeMap;

use tracing::debug;

use crate::attribution::Attribution;
use crate::config::WalkerConfig;
use crate::errors::{FlowscopeError, Result};
use crate::graph::{ExecutionNode, FlowGraph, NodeId};
use crate::walk::{TraversalContext, Visitor};

/// The graph producer numbers the block enclosing a parallel start marker
/// exactly one above the marker. This is a structural guarantee of the
/// producer's id assignment, not something derivable from the graph.
pub const PARALLEL_BLOCK_ID_OFFSET: i64 = 1;

/// Parallel-block id for a parallel start id.
///
/// Non-numeric ids give `Ok(None)`: no block id can be derived for them.
pub fn derive_parallel_block_id(start_id: &str) -> Result<Option<NodeId>> {
    let Ok(start) = start_id.parse::<i64>() else {
        return Ok(None);
    };
    start
        .checked_add(PARALLEL_BLOCK_ID_OFFSET)
        .map(|id| Some(id.to_string()))
        .ok_or_else(|| FlowscopeError::ParallelBlockIdOverflow(start_id.to_string()))
}

/// One nested scope kind (worker or stage) during the walk.
///
/// At most one scope of a kind is open at a time. It closes when the walk
/// reaches the block-start whose id equals the recorded boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeTracker {
    boundary: Option<NodeId>,
    label: Option<String>,
}

impl ScopeTracker {
    pub fn is_open(&self) -> bool {
        self.label.is_some()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    pub fn open(&mut self, boundary: &str, label: String) {
        self.boundary = Some(boundary.to_string());
        self.label = Some(label);
    }

    /// Close the scope if `node` is its boundary block-start.
    pub fn close_if_boundary(&mut self, node: &ExecutionNode) -> bool {
        if node.is_block_start() && self.boundary.as_deref() == Some(node.id.as_str()) {
            self.boundary = None;
            self.label = None;
            true
        } else {
            false
        }
    }
}

/// Attributes visited nodes to workers, and parallel blocks to stages.
///
/// Not safe to share between traversals: create one per run and call
/// [`GraphWalker::into_attribution`] when the driver is done.
#[derive(Debug)]
pub struct GraphWalker<'g> {
    graph: &'g FlowGraph,
    config: &'g WalkerConfig,
    worker: ScopeTracker,
    stage: ScopeTracker,
    last_parallel_start: Option<NodeId>,
    /// node id -> worker label
    workspace: BTreeMap<NodeId, String>,
    /// derived parallel-block id -> enclosing stage name
    parallel: BTreeMap<NodeId, String>,
}

impl<'g> GraphWalker<'g> {
    pub fn new(graph: &'g FlowGraph, config: &'g WalkerConfig) -> Self {
        Self {
            graph,
            config,
            worker: ScopeTracker::default(),
            stage: ScopeTracker::default(),
            last_parallel_start: None,
            workspace: BTreeMap::new(),
            parallel: BTreeMap::new(),
        }
    }

    /// Process one node. Must be called in reverse topological order.
    ///
    /// An error leaves everything recorded so far untouched; the caller can
    /// carry on with the next node.
    pub fn visit(&mut self, node: &ExecutionNode, ctx: &dyn TraversalContext) -> Result<()> {
        self.record_worker_node(node);
        self.record_stage_node(node);
        self.record_parallel_node(ctx)
    }

    /// node id -> worker label, for every node visited inside a worker scope.
    pub fn workspace_attribution(&self) -> &BTreeMap<NodeId, String> {
        &self.workspace
    }

    /// derived parallel-block id -> stage name (empty outside any stage).
    pub fn parallel_attribution(&self) -> &BTreeMap<NodeId, String> {
        &self.parallel
    }

    pub fn worker_scope(&self) -> &ScopeTracker {
        &self.worker
    }

    pub fn stage_scope(&self) -> &ScopeTracker {
        &self.stage
    }

    pub fn into_attribution(self) -> Attribution {
        Attribution::new(self.workspace, self.parallel)
    }

    fn record_worker_node(&mut self, node: &ExecutionNode) {
        if !self.worker.is_open() {
            let boundary = self
                .graph
                .block_boundary_start(node, &self.config.worker_function);
            // The allocation is recorded on the boundary; without it this is
            // not the block that acquired the worker.
            if let Some((boundary, workspace)) =
                boundary.and_then(|b| b.workspace().map(|ws| (b, ws)))
            {
                let label = workspace
                    .worker()
                    .unwrap_or(self.config.default_worker.as_str())
                    .to_string();
                debug!(boundary = %boundary.id, worker = %label, "entering worker scope");
                self.worker.open(&boundary.id, label);
            }
        } else if self.worker.close_if_boundary(node) {
            debug!(boundary = %node.id, "leaving worker scope");
        }

        if let Some(label) = self.worker.label() {
            // First write wins; a node is visited once per walk.
            self.workspace
                .entry(node.id.clone())
                .or_insert_with(|| label.to_string());
        }
    }

    fn record_stage_node(&mut self, node: &ExecutionNode) {
        if !self.stage.is_open() {
            if let Some(boundary) = self
                .graph
                .block_boundary_start(node, &self.config.stage_function)
            {
                let name = boundary
                    .argument_string(&self.config.stage_name_argument)
                    .unwrap_or_default();
                debug!(boundary = %boundary.id, stage = %name, "entering stage scope");
                self.stage.open(&boundary.id, name);
            }
        } else if self.stage.close_if_boundary(node) {
            debug!(boundary = %node.id, "leaving stage scope");
        }
    }

    fn record_parallel_node(&mut self, ctx: &dyn TraversalContext) -> Result<()> {
        let Some(start_id) = ctx.current_parallel_start()? else {
            return Ok(());
        };
        if self.last_parallel_start.as_deref() == Some(start_id.as_str()) {
            return Ok(());
        }
        self.last_parallel_start = Some(start_id.clone());

        match derive_parallel_block_id(&start_id)? {
            Some(block_id) => {
                let stage = self.stage.label().unwrap_or_default().to_string();
                debug!(parallel_start = %start_id, block = %block_id, stage = %stage, "recording parallel block");
                self.parallel.insert(block_id, stage);
            }
            None => {
                debug!(parallel_start = %start_id, "non-numeric parallel start id; skipping");
            }
        }
        Ok(())
    }
}

impl Visitor for GraphWalker<'_> {
    fn atom_node(&mut self, node: &ExecutionNode, ctx: &dyn TraversalContext) -> Result<()> {
        self.visit(node, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeAction, NodeKind, Workspace};

    struct Outside;

    impl TraversalContext for Outside {
        fn current_parallel_start(&self) -> Result<Option<NodeId>> {
            Ok(None)
        }
    }

    struct Inside(&'static str);

    impl TraversalContext for Inside {
        fn current_parallel_start(&self) -> Result<Option<NodeId>> {
            Ok(Some(self.0.to_string()))
        }
    }

    fn start(id: &str, parent: &str, function: &str) -> ExecutionNode {
        ExecutionNode::new(id, NodeKind::BlockStart, vec![parent.into()]).with_action(NodeAction {
            function: Some(function.into()),
            ..NodeAction::default()
        })
    }

    fn allocated(id: &str, parent: &str, worker: Option<&str>) -> ExecutionNode {
        ExecutionNode::new(id, NodeKind::BlockStart, vec![parent.into()]).with_action(NodeAction {
            function: Some("node".into()),
            workspace: Some(Workspace {
                worker: worker.map(str::to_string),
            }),
            ..NodeAction::default()
        })
    }

    fn end(id: &str, parent: &str, start: &str) -> ExecutionNode {
        ExecutionNode::new(id, NodeKind::BlockEnd { start: start.into() }, vec![parent.into()])
    }

    fn worker_graph(worker: Option<&str>) -> FlowGraph {
        FlowGraph::from_nodes(vec![
            ExecutionNode::new("1", NodeKind::FlowStart, vec![]),
            allocated("2", "1", worker),
            start("3", "2", "node"),
            ExecutionNode::new("4", NodeKind::Atom, vec!["3".into()]),
            end("5", "4", "3"),
            end("6", "5", "2"),
        ])
        .unwrap()
    }

    fn walk_reverse<'g>(
        graph: &'g FlowGraph,
        config: &'g WalkerConfig,
        ids: &[&str],
    ) -> GraphWalker<'g> {
        let mut walker = GraphWalker::new(graph, config);
        for id in ids {
            walker.visit(graph.node(id).unwrap(), &Outside).unwrap();
        }
        walker
    }

    #[test]
    fn derive_adds_offset() {
        assert_eq!(derive_parallel_block_id("15").unwrap().as_deref(), Some("16"));
        assert_eq!(derive_parallel_block_id("0").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn derive_skips_non_numeric() {
        assert_eq!(derive_parallel_block_id("abc").unwrap(), None);
        assert_eq!(derive_parallel_block_id("").unwrap(), None);
    }

    #[test]
    fn derive_reports_overflow() {
        let max = i64::MAX.to_string();
        assert!(matches!(
            derive_parallel_block_id(&max),
            Err(FlowscopeError::ParallelBlockIdOverflow(id)) if id == max
        ));
    }

    #[test]
    fn tracker_closes_only_at_boundary_start() {
        let mut tracker = ScopeTracker::default();
        tracker.open("2", "agent".into());

        let atom = ExecutionNode::new("2", NodeKind::Atom, vec![]);
        assert!(!tracker.close_if_boundary(&atom));
        let other = start("3", "1", "node");
        assert!(!tracker.close_if_boundary(&other));
        assert!(tracker.is_open());

        let boundary = start("2", "1", "node");
        assert!(tracker.close_if_boundary(&boundary));
        assert!(!tracker.is_open());
        assert_eq!(tracker.boundary(), None);
    }

    #[test]
    fn worker_scope_covers_nodes_until_boundary() {
        let graph = worker_graph(Some("agent-1"));
        let config = WalkerConfig::default();
        let walker = walk_reverse(&graph, &config, &["6", "5", "4", "3", "2", "1"]);

        let expected: BTreeMap<NodeId, String> = ["6", "5", "4", "3"]
            .iter()
            .map(|id| (id.to_string(), "agent-1".to_string()))
            .collect();
        assert_eq!(walker.workspace_attribution(), &expected);
        assert!(!walker.worker_scope().is_open());
    }

    #[test]
    fn missing_worker_uses_default_label() {
        let graph = worker_graph(None);
        let config = WalkerConfig {
            default_worker: "controller".into(),
            ..WalkerConfig::default()
        };
        let walker = walk_reverse(&graph, &config, &["6", "5", "4"]);

        assert_eq!(walker.workspace_attribution().get("4").map(String::as_str), Some("controller"));
        assert!(walker.worker_scope().is_open());
    }

    #[test]
    fn empty_worker_uses_default_label() {
        let graph = worker_graph(Some(""));
        let config = WalkerConfig::default();
        let walker = walk_reverse(&graph, &config, &["6", "5", "4"]);

        assert!(
            walker
                .workspace_attribution()
                .values()
                .all(|w| w == crate::config::model::BUILT_IN_WORKER)
        );
    }

    #[test]
    fn boundary_without_allocation_does_not_open() {
        // 1 start, 2 stage, 3 node (no allocation recorded), 4 atom, 5 end(3)
        let graph = FlowGraph::from_nodes(vec![
            ExecutionNode::new("1", NodeKind::FlowStart, vec![]),
            start("2", "1", "stage"),
            start("3", "2", "node"),
            ExecutionNode::new("4", NodeKind::Atom, vec!["3".into()]),
            end("5", "4", "3"),
        ])
        .unwrap();
        let config = WalkerConfig::default();
        let walker = walk_reverse(&graph, &config, &["5", "4"]);

        assert!(!walker.worker_scope().is_open());
        assert!(walker.workspace_attribution().is_empty());
    }

    #[test]
    fn stage_name_defaults_to_empty_without_arguments() {
        let graph = FlowGraph::from_nodes(vec![
            ExecutionNode::new("1", NodeKind::FlowStart, vec![]),
            start("2", "1", "stage"),
            ExecutionNode::new("3", NodeKind::Atom, vec!["2".into()]),
            end("4", "3", "2"),
        ])
        .unwrap();
        let config = WalkerConfig::default();
        let mut walker = GraphWalker::new(&graph, &config);

        walker.visit(graph.node("4").unwrap(), &Outside).unwrap();
        assert_eq!(walker.stage_scope().label(), Some(""));
        assert_eq!(walker.stage_scope().boundary(), Some("2"));

        walker.visit(graph.node("3").unwrap(), &Inside("7")).unwrap();
        assert_eq!(walker.parallel_attribution().get("8").map(String::as_str), Some(""));

        walker.visit(graph.node("2").unwrap(), &Outside).unwrap();
        assert!(!walker.stage_scope().is_open());
        assert!(walker.workspace_attribution().is_empty());
    }

    #[test]
    fn stage_name_defaults_to_empty_when_arguments_lack_name() {
        let mut arguments = BTreeMap::new();
        arguments.insert("label".to_string(), toml::Value::String("build".into()));
        let stage = ExecutionNode::new("2", NodeKind::BlockStart, vec!["1".into()]).with_action(
            NodeAction {
                function: Some("stage".into()),
                arguments: Some(arguments),
                ..NodeAction::default()
            },
        );
        let graph = FlowGraph::from_nodes(vec![
            ExecutionNode::new("1", NodeKind::FlowStart, vec![]),
            stage,
            ExecutionNode::new("3", NodeKind::Atom, vec!["2".into()]),
            end("4", "3", "2"),
        ])
        .unwrap();
        let config = WalkerConfig::default();
        let mut walker = GraphWalker::new(&graph, &config);

        walker.visit(graph.node("4").unwrap(), &Outside).unwrap();
        assert_eq!(walker.stage_scope().label(), Some(""));

        walker.visit(graph.node("3").unwrap(), &Inside("7")).unwrap();
        assert_eq!(walker.parallel_attribution().get("8").map(String::as_str), Some(""));
    }

    #[test]
    fn repeated_parallel_start_is_recorded_once() {
        let graph = worker_graph(None);
        let config = WalkerConfig::default();
        let mut walker = GraphWalker::new(&graph, &config);

        walker.visit(graph.node("6").unwrap(), &Inside("5")).unwrap();
        walker.visit(graph.node("5").unwrap(), &Inside("5")).unwrap();
        walker.visit(graph.node("4").unwrap(), &Inside("9")).unwrap();

        assert_eq!(walker.parallel_attribution().len(), 2);
        assert!(walker.parallel_attribution().contains_key("6"));
        assert!(walker.parallel_attribution().contains_key("10"));
    }

    #[test]
    fn failing_context_keeps_earlier_state() {
        struct Broken;

        impl TraversalContext for Broken {
            fn current_parallel_start(&self) -> Result<Option<NodeId>> {
                Err(FlowscopeError::Traversal {
                    node: "5".into(),
                    reason: "lost".into(),
                })
            }
        }

        let graph = worker_graph(Some("agent-1"));
        let config = WalkerConfig::default();
        let mut walker = GraphWalker::new(&graph, &config);

        walker.visit(graph.node("6").unwrap(), &Outside).unwrap();
        assert!(walker.visit(graph.node("5").unwrap(), &Broken).is_err());
        walker.visit(graph.node("4").unwrap(), &Outside).unwrap();

        let attribution = walker.into_attribution();
        assert_eq!(attribution.worker_of("6"), Some("agent-1"));
        assert_eq!(attribution.worker_of("5"), Some("agent-1"));
        assert_eq!(attribution.worker_of("4"), Some("agent-1"));
    }
}
