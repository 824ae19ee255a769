// src/graph/mod.rs

//! Execution graph model.
//!
//! - [`node`] holds the immutable node type and its kind/metadata.
//! - [`flow_graph`] indexes nodes by id and resolves block structure.
//! - [`loader`] decodes a recorded graph from TOML.

pub mod flow_graph;
pub mod loader;
pub mod node;

pub use flow_graph::FlowGraph;
pub use loader::{load_graph_from_path, parse_graph};
pub use node::{ExecutionNode, NodeAction, NodeId, NodeKind, Workspace};
