#![allow(dead_code)]

use flowscope::errors::{FlowscopeError, Result};
use flowscope::graph::{FlowGraph, NodeId};
use flowscope::walk::{TraversalContext, Visitor};
use tracing::warn;

/// Traversal context that answers with a fixed parallel start.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTraversal {
    parallel_start: Option<NodeId>,
}

impl ScriptedTraversal {
    pub fn outside() -> Self {
        Self::default()
    }

    pub fn inside(parallel_start: &str) -> Self {
        Self {
            parallel_start: Some(parallel_start.to_string()),
        }
    }
}

impl TraversalContext for ScriptedTraversal {
    fn current_parallel_start(&self) -> Result<Option<NodeId>> {
        Ok(self.parallel_start.clone())
    }
}

/// Traversal context that always fails, standing in for a driver that lost
/// track of its position.
#[derive(Debug, Clone, Default)]
pub struct BrokenTraversal;

impl TraversalContext for BrokenTraversal {
    fn current_parallel_start(&self) -> Result<Option<NodeId>> {
        Err(FlowscopeError::Traversal {
            node: "?".to_string(),
            reason: "scripted failure".to_string(),
        })
    }
}

/// One recorded step: node id plus the parallel start the driver reported.
pub type Step<'a> = (&'a str, Option<&'a str>);

/// Replay a recorded visitation against `visitor`, logging and skipping
/// failures the way a driver loop does. Returns the number of failed steps.
///
/// A step naming a node that is not in `graph` counts as failed.
pub fn replay<V: Visitor + ?Sized>(graph: &FlowGraph, visitor: &mut V, steps: &[Step<'_>]) -> usize {
    let mut failed = 0;

    for (id, parallel_start) in steps {
        let Some(node) = graph.node(id) else {
            warn!(node = %id, "scripted step names unknown node");
            failed += 1;
            continue;
        };
        let ctx = match parallel_start {
            Some(start) => ScriptedTraversal::inside(start),
            None => ScriptedTraversal::outside(),
        };
        if let Err(err) = visitor.atom_node(node, &ctx) {
            warn!(node = %id, error = %err, "scripted step failed");
            failed += 1;
        }
    }

    failed
}

/// Replay with a failing context at the given step indices.
///
/// Unknown nodes count as failed whether or not their step is failing.
pub fn replay_with_failures<V: Visitor + ?Sized>(
    graph: &FlowGraph,
    visitor: &mut V,
    steps: &[Step<'_>],
    failing: &[usize],
) -> usize {
    let mut failed = 0;

    for (index, step) in steps.iter().enumerate() {
        if failing.contains(&index) {
            let Some(node) = graph.node(step.0) else {
                warn!(node = %step.0, "scripted step names unknown node");
                failed += 1;
                continue;
            };
            if let Err(err) = visitor.atom_node(node, &BrokenTraversal) {
                warn!(node = %step.0, error = %err, "scripted step failed");
                failed += 1;
            }
            continue;
        }
        failed += replay(graph, visitor, std::slice::from_ref(step));
    }

    failed
}
