// src/walk/scanner.rs

//! Reverse traversal driver.
//!
//! Orders nodes with a depth-first post-order over parent -> child edges:
//! every node comes after all of its descendants, and each parallel branch is
//! visited as one contiguous run. Enclosing blocks and parallel forks are
//! resolved once per node up front, so the walk itself is linear.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::DfsPostOrder;
use tracing::{debug, warn};

use crate::config::WalkerConfig;
use crate::errors::{FlowscopeError, Result};
use crate::graph::{ExecutionNode, FlowGraph, NodeId, NodeKind};
use crate::walk::{TraversalContext, Visitor};

/// Outcome counters of one [`ReverseScanner::walk`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub visited: usize,
    /// Nodes whose visit returned an error.
    pub failed: usize,
}

/// Resolved lookup, or the reason it failed.
type Resolved<'g> = std::result::Result<Option<&'g ExecutionNode>, String>;

pub struct ReverseScanner<'g> {
    graph: &'g FlowGraph,
    parallel_function: String,
    order: Vec<&'g ExecutionNode>,
    /// node id -> fork of the innermost enclosing parallel
    forks: HashMap<&'g str, Resolved<'g>>,
}

impl<'g> ReverseScanner<'g> {
    pub fn new(graph: &'g FlowGraph, config: &WalkerConfig) -> Self {
        let mut dag: DiGraphMap<&str, ()> = DiGraphMap::new();
        for node in graph.nodes() {
            dag.add_node(node.id.as_str());
        }
        for node in graph.nodes() {
            for parent in &node.parents {
                // Dangling parents are dropped; the child then starts its own walk.
                if graph.node(parent).is_some() {
                    dag.add_edge(parent.as_str(), node.id.as_str(), ());
                }
            }
        }

        let roots: Vec<&str> = graph
            .nodes()
            .map(|n| n.id.as_str())
            .filter(|id| dag.neighbors_directed(*id, Direction::Incoming).next().is_none())
            .collect();

        let mut order = Vec::with_capacity(graph.len());
        let mut dfs = DfsPostOrder::empty(&dag);
        for root in roots {
            dfs.move_to(root);
            while let Some(id) = dfs.next(&dag) {
                if let Some(node) = graph.node(id) {
                    order.push(node);
                }
            }
        }

        let forks = BlockIndex::build(graph, &order, &config.parallel_function).forks;

        debug!(nodes = graph.len(), ordered = order.len(), "computed reverse visitation order");

        Self {
            graph,
            parallel_function: config.parallel_function.clone(),
            order,
            forks,
        }
    }

    /// Node ids in visitation order, latest first.
    pub fn order(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|n| n.id.as_str())
    }

    /// Feed every node to `visitor`. A failing node is logged and counted;
    /// the walk always runs to the end.
    pub fn walk<V: Visitor + ?Sized>(&self, visitor: &mut V) -> WalkSummary {
        let mut summary = WalkSummary::default();

        for node in &self.order {
            let position = ScanPosition {
                scanner: self,
                node,
            };

            summary.visited += 1;
            if let Err(err) = visitor.atom_node(node, &position) {
                summary.failed += 1;
                warn!(node = %node.id, error = %err, "failed to extract pipeline info");
            }
        }

        debug!(
            visited = summary.visited,
            failed = summary.failed,
            "reverse walk complete"
        );
        summary
    }

    /// Fork node of the innermost parallel enclosing `node`.
    ///
    /// A fork is a block-start declaring the parallel function without a
    /// branch name; its branches are block-starts of the same function that
    /// carry one.
    pub fn parallel_start_of(&self, node: &ExecutionNode) -> Result<Option<NodeId>> {
        let resolved = match self.forks.get(node.id.as_str()) {
            Some(resolved) => resolved.clone(),
            None => climb_to_fork(self.graph, node, &self.parallel_function),
        };
        resolved
            .map(|fork| fork.map(|f| f.id.clone()))
            .map_err(|reason| FlowscopeError::Traversal {
                node: node.id.clone(),
                reason,
            })
    }
}

struct ScanPosition<'a, 'g> {
    scanner: &'a ReverseScanner<'g>,
    node: &'a ExecutionNode,
}

impl TraversalContext for ScanPosition<'_, '_> {
    fn current_parallel_start(&self) -> Result<Option<NodeId>> {
        self.scanner.parallel_start_of(self.node)
    }
}

/// Per-node enclosing block-start and parallel fork.
///
/// Filled in topological order, so a node's answer is derived from the
/// already resolved answer of its first parent (or of its block's start).
/// Lookups that miss the index, which only happens on malformed graphs,
/// fall back to climbing the graph.
struct BlockIndex<'g> {
    graph: &'g FlowGraph,
    enclosing: HashMap<&'g str, Resolved<'g>>,
    forks: HashMap<&'g str, Resolved<'g>>,
}

impl<'g> BlockIndex<'g> {
    fn build(graph: &'g FlowGraph, reverse_order: &[&'g ExecutionNode], parallel_function: &str) -> Self {
        let mut index = BlockIndex {
            graph,
            enclosing: HashMap::with_capacity(reverse_order.len()),
            forks: HashMap::with_capacity(reverse_order.len()),
        };

        for node in reverse_order.iter().rev() {
            let enclosing = index.resolve_enclosing(node);
            index.enclosing.insert(node.id.as_str(), enclosing);

            let fork = index.resolve_fork(node, parallel_function);
            index.forks.insert(node.id.as_str(), fork);
        }

        index
    }

    fn enclosing_of(&self, id: &str) -> Resolved<'g> {
        match self.enclosing.get(id) {
            Some(resolved) => resolved.clone(),
            None => self.graph.enclosing_block_start(id).map_err(reason_of),
        }
    }

    fn resolve_enclosing(&self, node: &'g ExecutionNode) -> Resolved<'g> {
        // A block-end shares the enclosure of its start.
        if let Some(start) = node.block_start_id() {
            return self.enclosing_of(start);
        }

        let Some(parent_id) = node.parents.first() else {
            return Ok(None);
        };
        let parent = self
            .graph
            .node(parent_id)
            .ok_or_else(|| format!("unknown node '{}'", parent_id))?;
        match &parent.kind {
            NodeKind::BlockStart => Ok(Some(parent)),
            NodeKind::BlockEnd { start } => self.enclosing_of(start),
            NodeKind::Atom | NodeKind::FlowStart => self.enclosing_of(parent_id),
        }
    }

    fn resolve_fork(&self, node: &'g ExecutionNode, parallel_function: &str) -> Resolved<'g> {
        let Some(start) = self.enclosing_of(&node.id)? else {
            return Ok(None);
        };
        if is_fork(start, parallel_function) {
            return Ok(Some(start));
        }
        match self.forks.get(start.id.as_str()) {
            Some(resolved) => resolved.clone(),
            None => climb_to_fork(self.graph, start, parallel_function),
        }
    }
}

fn is_fork(node: &ExecutionNode, parallel_function: &str) -> bool {
    node.declares_function(parallel_function) && node.branch().is_none()
}

fn reason_of(err: FlowscopeError) -> String {
    match err {
        FlowscopeError::Traversal { reason, .. } => reason,
        other => other.to_string(),
    }
}

/// Unindexed fork lookup: climb enclosing blocks until a fork.
fn climb_to_fork<'g>(
    graph: &'g FlowGraph,
    node: &ExecutionNode,
    parallel_function: &str,
) -> Resolved<'g> {
    let mut enclosing = graph.enclosing_block_start(&node.id).map_err(reason_of)?;

    for _ in 0..=graph.len() {
        let Some(start) = enclosing else {
            return Ok(None);
        };
        if is_fork(start, parallel_function) {
            return Ok(Some(start));
        }
        enclosing = graph.enclosing_block_start(&start.id).map_err(reason_of)?;
    }

    Err("parallel start search did not terminate".to_string())
}
