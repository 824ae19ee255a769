// src/walk/mod.rs

//! Reverse traversal of an execution graph.
//!
//! - [`walker`] holds [`GraphWalker`], which attributes each visited node to
//!   its enclosing worker, stage and parallel branch.
//! - [`scanner`] holds [`ReverseScanner`], a driver that feeds every node of a
//!   [`FlowGraph`](crate::graph::FlowGraph) to a [`Visitor`] end-first.
//!
//! The two meet at the traits below: a driver owns visitation order and the
//! "where am I" questions, a visitor only reacts to nodes.

pub mod scanner;
pub mod walker;

pub use scanner::{ReverseScanner, WalkSummary};
pub use walker::{
    GraphWalker, PARALLEL_BLOCK_ID_OFFSET, ScopeTracker, derive_parallel_block_id,
};

use crate::errors::Result;
use crate::graph::{ExecutionNode, NodeId};

/// What a driver knows about the current point of the walk.
pub trait TraversalContext {
    /// Fork node of the parallel the walk is currently inside, or `None`
    /// outside any parallel.
    fn current_parallel_start(&self) -> Result<Option<NodeId>>;
}

/// Receives nodes from a driver, latest first.
///
/// An `Err` concerns only `node`; drivers log it and keep going.
pub trait Visitor {
    fn atom_node(&mut self, node: &ExecutionNode, ctx: &dyn TraversalContext) -> Result<()>;
}
