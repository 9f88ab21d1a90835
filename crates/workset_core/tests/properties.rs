//! Property tests for tracker and walker invariants.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use workset_core::{EntityRecord, EntityState, EntityTracker, GraphNode, GraphWalker};
use workset_model::{EntityName, Identity, ValueMap};

fn entity() -> EntityName {
    EntityName::new("nodes")
}

/// Builds `count` nodes and wires the given directed edges, cycles and
/// self-loops included.
fn build_graph(count: usize, edges: &[(usize, usize)]) -> Vec<Arc<GraphNode>> {
    let nodes: Vec<Arc<GraphNode>> = (0..count)
        .map(|i| {
            let values = ValueMap::new().with("index", i as i64);
            if i % 2 == 0 {
                GraphNode::with_key(entity(), (i + 1) as u64, values)
            } else {
                GraphNode::new(entity(), values)
            }
        })
        .collect();
    for &(from, to) in edges {
        nodes[from % count].link(&nodes[to % count]);
    }
    nodes
}

/// Reachable node indices from node 0, following the same links the
/// walker follows.
fn reachable(count: usize, edges: &[(usize, usize)]) -> HashSet<usize> {
    let mut seen = HashSet::new();
    let mut stack = vec![0usize];
    while let Some(index) = stack.pop() {
        if !seen.insert(index) {
            continue;
        }
        for &(from, to) in edges {
            if from % count == index {
                stack.push(to % count);
            }
        }
    }
    seen
}

proptest! {
    #[test]
    fn walker_terminates_and_visits_each_reference_once(
        count in 1usize..10,
        edges in prop::collection::vec((0usize..10, 0usize..10), 0..40),
    ) {
        let nodes = build_graph(count, &edges);
        let mut tracker = EntityTracker::new();

        let report = GraphWalker::new(&mut tracker)
            .walk(&nodes[0], EntityState::Unchanged)
            .unwrap();

        let expected = reachable(count, &edges);
        prop_assert_eq!(report.visited, expected.len());
        prop_assert_eq!(tracker.len(), expected.len());
    }

    #[test]
    fn tracker_never_holds_two_records_for_one_identity(
        ops in prop::collection::vec((1u64..6, 0u8..5), 1..40),
    ) {
        let mut tracker = EntityTracker::new();
        for (key, op) in ops {
            let identity = Identity::Key(key);
            match op {
                0 => {
                    let _ = tracker.attach(
                        EntityRecord::new(entity(), identity, ValueMap::new()),
                        EntityState::Unchanged,
                    );
                }
                1 => {
                    let _ = tracker.attach(
                        EntityRecord::new(entity(), identity, ValueMap::new()),
                        EntityState::Modified,
                    );
                }
                2 => {
                    let _ = tracker.attach(
                        EntityRecord::new(entity(), identity, ValueMap::new()),
                        EntityState::Deleted,
                    );
                }
                3 => {
                    let _ = tracker.detach(&entity(), identity);
                }
                _ => {
                    let _ = tracker.set_state(&entity(), identity, EntityState::Deleted);
                }
            }

            let mut seen = HashSet::new();
            for record in tracker.iter() {
                prop_assert!(
                    seen.insert((record.entity().clone(), record.identity())),
                    "identity tracked twice"
                );
                prop_assert_ne!(record.state(), EntityState::Detached);
            }
            prop_assert_eq!(seen.len(), tracker.len());
        }
    }
}
