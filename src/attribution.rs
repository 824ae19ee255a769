// src/attribution.rs

//! Read-only result of a walk.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::graph::NodeId;

/// The two maps a walk produces.
///
/// - `workspace`: node id -> worker label, for every node that ran inside a
///   worker allocation.
/// - `parallel`: derived parallel-block id -> name of the enclosing stage
///   (empty when the parallel is not inside a stage).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attribution {
    workspace: BTreeMap<NodeId, String>,
    parallel: BTreeMap<NodeId, String>,
}

impl Attribution {
    pub fn new(workspace: BTreeMap<NodeId, String>, parallel: BTreeMap<NodeId, String>) -> Self {
        Self {
            workspace,
            parallel,
        }
    }

    pub fn workspace(&self) -> &BTreeMap<NodeId, String> {
        &self.workspace
    }

    pub fn parallel(&self) -> &BTreeMap<NodeId, String> {
        &self.parallel
    }

    pub fn worker_of(&self, node: &str) -> Option<&str> {
        self.workspace.get(node).map(String::as_str)
    }

    pub fn stage_of_parallel(&self, block: &str) -> Option<&str> {
        self.parallel.get(block).map(String::as_str)
    }
}
