// tests/walker_properties.rs

use std::collections::BTreeMap;

use flowscope::config::model::BUILT_IN_WORKER;
use flowscope::graph::FlowGraph;
use flowscope::walk::derive_parallel_block_id;
use flowscope::{WalkerConfig, attribute};
use flowscope_test_utils::builders::GraphBuilder;
use proptest::prelude::*;

/// One top-level piece of a linear pipeline.
#[derive(Debug, Clone)]
enum Segment {
    /// Plain steps outside any worker.
    Steps(usize),
    /// A worker allocation (outer start + body start) around `steps` steps.
    Worker { label: Option<String>, steps: usize },
}

fn segment_strategy() -> impl Strategy<Value = Segment> {
    prop_oneof![
        (1..4usize).prop_map(Segment::Steps),
        (proptest::option::of("[a-z]{0,6}"), 0..4usize)
            .prop_map(|(label, steps)| Segment::Worker { label, steps }),
    ]
}

/// Build the pipeline and the workspace attribution it must produce.
fn build(segments: &[Segment]) -> (FlowGraph, BTreeMap<String, String>) {
    let mut builder = GraphBuilder::new().flow_start("1");
    let mut expected = BTreeMap::new();
    let mut next = 2u32;
    let mut id = || {
        let s = next.to_string();
        next += 1;
        s
    };
    let mut last = "1".to_string();

    for (index, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Steps(n) => {
                for _ in 0..*n {
                    let atom = id();
                    builder = builder.atom(&atom, &last);
                    last = atom;
                }
            }
            Segment::Worker { label, steps } => {
                let want = label
                    .clone()
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| BUILT_IN_WORKER.to_string());

                let outer = id();
                builder = builder.worker_block(&outer, &last, label.as_deref());
                let body = id();
                builder = builder.worker_body(&body, &outer);
                expected.insert(body.clone(), want.clone());

                let mut prev = body.clone();
                for _ in 0..*steps {
                    let atom = id();
                    builder = builder.atom(&atom, &prev);
                    expected.insert(atom.clone(), want.clone());
                    prev = atom;
                }

                let body_end = id();
                builder = builder.block_end(&body_end, &prev, &body);
                expected.insert(body_end.clone(), want.clone());

                let outer_end = id();
                builder = builder.block_end(&outer_end, &body_end, &outer);
                // Only a block hanging directly off the flow start is its own
                // boundary, so only then does the outer end open the scope.
                if index == 0 {
                    expected.insert(outer_end.clone(), want.clone());
                }
                last = outer_end;
            }
        }
    }

    (builder.build(), expected)
}

proptest! {
    #[test]
    fn worker_attribution_matches_enclosing_allocation(
        segments in proptest::collection::vec(segment_strategy(), 1..8)
    ) {
        let (graph, expected) = build(&segments);
        let config = WalkerConfig::default();

        let attribution = attribute(&graph, &config);

        prop_assert_eq!(attribution.workspace(), &expected);
        prop_assert!(attribution.parallel().is_empty());
    }

    #[test]
    fn derived_block_id_is_start_plus_one(start in 0u32..=u32::MAX) {
        let derived = derive_parallel_block_id(&start.to_string()).unwrap();
        prop_assert_eq!(derived, Some((u64::from(start) + 1).to_string()));
    }

    #[test]
    fn non_numeric_start_never_derives(start in "[a-z_][a-z0-9_-]{0,8}") {
        prop_assert_eq!(derive_parallel_block_id(&start).unwrap(), None);
    }
}
