#![allow(dead_code)]

use std::collections::BTreeMap;

use flowscope::graph::{ExecutionNode, FlowGraph, NodeAction, NodeKind, Workspace};

/// Builder for `FlowGraph` to simplify test setup.
///
/// Every helper takes the node id first and its (single) parent second.
pub struct GraphBuilder {
    nodes: Vec<ExecutionNode>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn flow_start(self, id: &str) -> Self {
        self.node(ExecutionNode::new(id, NodeKind::FlowStart, vec![]))
    }

    pub fn atom(self, id: &str, parent: &str) -> Self {
        self.node(ExecutionNode::new(id, NodeKind::Atom, vec![parent.to_string()]))
    }

    pub fn block_start(self, id: &str, parent: &str, function: &str) -> Self {
        self.node(block_start(id, parent, function, NodeAction::default()))
    }

    /// Worker allocation block-start. `None` records the allocation without a
    /// worker name.
    pub fn worker_block(self, id: &str, parent: &str, worker: Option<&str>) -> Self {
        self.node(block_start(
            id,
            parent,
            "node",
            NodeAction {
                workspace: Some(Workspace {
                    worker: worker.map(str::to_string),
                }),
                ..NodeAction::default()
            },
        ))
    }

    /// Body block-start of a worker allocation; carries no allocation itself.
    pub fn worker_body(self, id: &str, parent: &str) -> Self {
        self.block_start(id, parent, "node")
    }

    pub fn stage_block(self, id: &str, parent: &str, name: &str) -> Self {
        let mut args = BTreeMap::new();
        args.insert("name".to_string(), toml::Value::String(name.to_string()));
        self.node(block_start(
            id,
            parent,
            "stage",
            NodeAction {
                arguments: Some(args),
                ..NodeAction::default()
            },
        ))
    }

    pub fn parallel_fork(self, id: &str, parent: &str) -> Self {
        self.block_start(id, parent, "parallel")
    }

    pub fn parallel_branch(self, id: &str, parent: &str, branch: &str) -> Self {
        self.node(block_start(
            id,
            parent,
            "parallel",
            NodeAction {
                branch: Some(branch.to_string()),
                ..NodeAction::default()
            },
        ))
    }

    pub fn block_end(self, id: &str, parent: &str, start: &str) -> Self {
        self.join_end(id, &[parent], start)
    }

    /// Block-end with several parents, as where parallel branches join.
    pub fn join_end(self, id: &str, parents: &[&str], start: &str) -> Self {
        self.node(ExecutionNode::new(
            id,
            NodeKind::BlockEnd {
                start: start.to_string(),
            },
            parents.iter().map(|p| p.to_string()).collect(),
        ))
    }

    pub fn node(mut self, node: ExecutionNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn build(self) -> FlowGraph {
        FlowGraph::from_nodes(self.nodes).expect("Failed to build graph from builder")
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn block_start(id: &str, parent: &str, function: &str, action: NodeAction) -> ExecutionNode {
    ExecutionNode::new(id, NodeKind::BlockStart, vec![parent.to_string()]).with_action(NodeAction {
        function: Some(function.to_string()),
        ..action
    })
}
