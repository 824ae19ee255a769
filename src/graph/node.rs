// src/graph/node.rs

//! Immutable execution graph nodes.

use std::collections::BTreeMap;

/// Node identifiers are opaque strings; the producer numbers them in practice.
pub type NodeId = String;

/// Structural role of a node in the execution graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The single root of a run.
    FlowStart,
    /// A step with no body.
    Atom,
    /// Opens a block (worker allocation, stage, parallel fork or branch, ...).
    BlockStart,
    /// Closes the block opened by `start`.
    BlockEnd { start: NodeId },
}

/// Metadata recorded on a node by the step that produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeAction {
    /// Step function name, e.g. `node`, `stage` or `parallel`.
    pub function: Option<String>,
    /// Arguments the step was invoked with.
    pub arguments: Option<BTreeMap<String, toml::Value>>,
    /// Worker allocation recorded by the block. Block-starts only.
    pub workspace: Option<Workspace>,
    /// Branch name. Set on the per-branch block-starts of a parallel fork.
    pub branch: Option<String>,
}

/// Worker allocation recorded on the block-start that acquired a worker.
///
/// Its presence marks the allocation; `worker` may still be missing or empty
/// when the step ran on the built-in executor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workspace {
    pub worker: Option<String>,
}

impl Workspace {
    pub fn on(worker: impl Into<String>) -> Self {
        Self {
            worker: Some(worker.into()),
        }
    }

    /// Worker name, if recorded and non-empty.
    pub fn worker(&self) -> Option<&str> {
        self.worker.as_deref().filter(|w| !w.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionNode {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Ordered; more than one parent only where parallel branches join.
    pub parents: Vec<NodeId>,
    pub action: NodeAction,
}

impl ExecutionNode {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, parents: Vec<NodeId>) -> Self {
        Self {
            id: id.into(),
            kind,
            parents,
            action: NodeAction::default(),
        }
    }

    pub fn with_action(mut self, action: NodeAction) -> Self {
        self.action = action;
        self
    }

    pub fn is_block_start(&self) -> bool {
        matches!(self.kind, NodeKind::BlockStart)
    }

    pub fn is_flow_start(&self) -> bool {
        matches!(self.kind, NodeKind::FlowStart)
    }

    /// Id of the matching block-start, for block-end nodes.
    pub fn block_start_id(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::BlockEnd { start } => Some(start.as_str()),
            _ => None,
        }
    }

    pub fn function_name(&self) -> Option<&str> {
        self.action.function.as_deref()
    }

    pub fn declares_function(&self, function: &str) -> bool {
        self.function_name() == Some(function)
    }

    pub fn has_arguments(&self) -> bool {
        self.action.arguments.is_some()
    }

    /// Argument `key` rendered as a string.
    ///
    /// Strings are returned verbatim; other values use their TOML rendering.
    pub fn argument_string(&self, key: &str) -> Option<String> {
        let value = self.action.arguments.as_ref()?.get(key)?;
        Some(match value {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn workspace(&self) -> Option<&Workspace> {
        self.action.workspace.as_ref()
    }

    pub fn branch(&self) -> Option<&str> {
        self.action.branch.as_deref()
    }
}
