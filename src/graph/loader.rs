// src/graph/loader.rs

//! Decode a recorded execution graph from TOML.
//!
//! ```toml
//! [[node]]
//! id = "1"
//! kind = "flow-start"
//!
//! [[node]]
//! id = "2"
//! kind = "block-start"
//! parents = ["1"]
//! function = "node"
//! workspace = { worker = "agent-1" }
//!
//! [[node]]
//! id = "3"
//! kind = "block-end"
//! parents = ["2"]
//! start = "2"
//! ```
//!
//! Only per-node decoding is checked here (field/kind agreement, duplicate
//! ids). Dangling references are left for the readers to tolerate.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::errors::{FlowscopeError, Result};
use crate::graph::flow_graph::FlowGraph;
use crate::graph::node::{ExecutionNode, NodeAction, NodeKind, Workspace};

#[derive(Debug, Deserialize)]
struct RawGraphFile {
    #[serde(default)]
    node: Vec<RawNode>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum RawKind {
    FlowStart,
    Atom,
    BlockStart,
    BlockEnd,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWorkspace {
    #[serde(default)]
    worker: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNode {
    id: String,
    kind: RawKind,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    function: Option<String>,
    #[serde(default)]
    args: Option<BTreeMap<String, toml::Value>>,
    #[serde(default)]
    workspace: Option<RawWorkspace>,
    #[serde(default)]
    branch: Option<String>,
}

impl TryFrom<RawNode> for ExecutionNode {
    type Error = FlowscopeError;

    fn try_from(raw: RawNode) -> std::result::Result<Self, Self::Error> {
        let kind = match (raw.kind, raw.start) {
            (RawKind::BlockEnd, Some(start)) => NodeKind::BlockEnd { start },
            (RawKind::BlockEnd, None) => {
                return Err(graph_error(&raw.id, "block-end node requires `start`"));
            }
            (_, Some(_)) => {
                return Err(graph_error(&raw.id, "`start` is only valid on block-end nodes"));
            }
            (RawKind::FlowStart, None) => NodeKind::FlowStart,
            (RawKind::Atom, None) => NodeKind::Atom,
            (RawKind::BlockStart, None) => NodeKind::BlockStart,
        };

        let is_block_start = matches!(kind, NodeKind::BlockStart);
        if !is_block_start && raw.workspace.is_some() {
            return Err(graph_error(&raw.id, "`workspace` is only valid on block-start nodes"));
        }
        if !is_block_start && raw.branch.is_some() {
            return Err(graph_error(&raw.id, "`branch` is only valid on block-start nodes"));
        }

        Ok(ExecutionNode::new(raw.id, kind, raw.parents).with_action(NodeAction {
            function: raw.function,
            arguments: raw.args,
            workspace: raw.workspace.map(|ws| Workspace { worker: ws.worker }),
            branch: raw.branch,
        }))
    }
}

fn graph_error(id: &str, msg: &str) -> FlowscopeError {
    FlowscopeError::GraphError(format!("node '{}': {}", id, msg))
}

/// Decode a graph from TOML text.
pub fn parse_graph(contents: &str) -> Result<FlowGraph> {
    let raw: RawGraphFile = toml::from_str(contents)?;
    let nodes = raw
        .node
        .into_iter()
        .map(ExecutionNode::try_from)
        .collect::<Result<Vec<_>>>()?;
    FlowGraph::from_nodes(nodes)
}

/// Read and decode a graph file.
pub fn load_graph_from_path(path: impl AsRef<Path>) -> Result<FlowGraph> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading graph file {:?}", path))?;
    parse_graph(&contents)
}
