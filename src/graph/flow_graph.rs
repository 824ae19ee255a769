// src/graph/flow_graph.rs

use std::collections::HashMap;

use crate::errors::{FlowscopeError, Result};
use crate::graph::node::{ExecutionNode, NodeKind};

/// Recorded execution graph, indexed by node id.
///
/// Nodes are kept in the order they were supplied so that anything iterating
/// the graph is deterministic. No structural validation happens here: the
/// producer guarantees acyclicity, and malformed shapes are tolerated by the
/// readers below.
#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    nodes: HashMap<String, ExecutionNode>,
    order: Vec<String>,
}

impl FlowGraph {
    /// Index `nodes`. Fails only on a duplicate id.
    pub fn from_nodes(nodes: Vec<ExecutionNode>) -> Result<Self> {
        let mut graph = FlowGraph::default();

        for node in nodes {
            if graph.nodes.contains_key(&node.id) {
                return Err(FlowscopeError::GraphError(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
            graph.order.push(node.id.clone());
            graph.nodes.insert(node.id.clone(), node);
        }

        Ok(graph)
    }

    pub fn node(&self, id: &str) -> Option<&ExecutionNode> {
        self.nodes.get(id)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &ExecutionNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn parents_of(&self, id: &str) -> &[String] {
        self.nodes
            .get(id)
            .map(|n| n.parents.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve the boundary node of the block that `node` closes.
    ///
    /// Returns `Some` only if `node` is a block-end whose start exists, is a
    /// block-start declaring `function`, and has at least one parent. The
    /// boundary is that first parent when it is a block-start, or the start
    /// itself when the first parent is the flow start (a top-level block has
    /// no wrapping step). Any other shape yields `None`.
    pub fn block_boundary_start(
        &self,
        node: &ExecutionNode,
        function: &str,
    ) -> Option<&ExecutionNode> {
        let start = self.node(node.block_start_id()?)?;
        if !start.is_block_start() || !start.declares_function(function) {
            return None;
        }

        let boundary = self.node(start.parents.first()?)?;
        match boundary.kind {
            NodeKind::BlockStart => Some(boundary),
            NodeKind::FlowStart => Some(start),
            NodeKind::Atom | NodeKind::BlockEnd { .. } => None,
        }
    }

    /// Innermost block-start enclosing node `id`.
    ///
    /// A block-end shares the enclosure of its start. Climbing follows first
    /// parents and hops over completed blocks by jumping from their end to
    /// their start.
    pub fn enclosing_block_start(&self, id: &str) -> Result<Option<&ExecutionNode>> {
        let mut current = self.require(id, id)?;
        if let Some(start) = current.block_start_id() {
            current = self.require(start, id)?;
        }

        // Each hop moves strictly towards the flow start on an acyclic graph.
        for _ in 0..=self.len() {
            let Some(parent_id) = current.parents.first() else {
                return Ok(None);
            };
            let parent = self.require(parent_id, id)?;
            match &parent.kind {
                NodeKind::BlockStart => return Ok(Some(parent)),
                NodeKind::BlockEnd { start } => current = self.require(start, id)?,
                NodeKind::Atom | NodeKind::FlowStart => current = parent,
            }
        }

        Err(FlowscopeError::Traversal {
            node: id.to_string(),
            reason: "enclosing block search did not terminate".to_string(),
        })
    }

    fn require(&self, id: &str, origin: &str) -> Result<&ExecutionNode> {
        self.node(id).ok_or_else(|| FlowscopeError::Traversal {
            node: origin.to_string(),
            reason: format!("unknown node '{}'", id),
        })
    }
}
