// src/lib.rs

//! Attribute the nodes of a recorded pipeline execution graph to the worker
//! they ran on, and parallel blocks to the stage that encloses them.

pub mod attribution;
pub mod config;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod walk;

use tracing::{info, warn};

pub use crate::attribution::Attribution;
pub use crate::config::WalkerConfig;
pub use crate::graph::FlowGraph;
pub use crate::walk::{GraphWalker, ReverseScanner};

/// Walk `graph` end-first once and collect its attribution.
///
/// Per-node failures are logged and skipped; the result covers every node
/// that could be attributed.
pub fn attribute(graph: &FlowGraph, config: &WalkerConfig) -> Attribution {
    let scanner = ReverseScanner::new(graph, config);
    let mut walker = GraphWalker::new(graph, config);

    let summary = scanner.walk(&mut walker);
    if summary.failed > 0 {
        warn!(
            failed = summary.failed,
            visited = summary.visited,
            "some nodes could not be attributed"
        );
    }

    let attribution = walker.into_attribution();
    info!(
        nodes = summary.visited,
        workspace = attribution.workspace().len(),
        parallel = attribution.parallel().len(),
        "attribution complete"
    );
    attribution
}
