//! Property-based test generators using proptest.

use proptest::prelude::*;
use std::sync::Arc;
use workset_core::{EntityState, GraphNode};
use workset_model::{PropertyValue, ValueMap};

/// Strategy for arbitrary scalar property values.
pub fn property_value() -> impl Strategy<Value = PropertyValue> {
    prop_oneof![
        Just(PropertyValue::Null),
        any::<bool>().prop_map(PropertyValue::Bool),
        any::<i64>().prop_map(PropertyValue::Integer),
        "[a-z]{0,12}".prop_map(PropertyValue::Text),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(PropertyValue::Bytes),
    ]
}

/// Strategy for value maps with up to `max` properties.
pub fn value_map(max: usize) -> impl Strategy<Value = ValueMap> {
    prop::collection::btree_map("[a-z]{1,8}", property_value(), 0..max)
        .prop_map(|entries| entries.into_iter().collect())
}

/// Strategy for the states a record can be attached in.
pub fn attachable_state() -> impl Strategy<Value = EntityState> {
    prop_oneof![
        Just(EntityState::Unchanged),
        Just(EntityState::Added),
        Just(EntityState::Modified),
        Just(EntityState::Deleted),
    ]
}

/// A generated graph shape: node count plus directed edges by index.
///
/// Edges may form cycles, self-loops, and diamonds. Feed it to
/// [`build_graph`] to realize nodes.
#[derive(Debug, Clone)]
pub struct GraphShape {
    /// Number of nodes.
    pub count: usize,
    /// Directed edges as (from, to) indices, modulo `count`.
    pub edges: Vec<(usize, usize)>,
}

/// Strategy for graph shapes with up to `max_nodes` nodes.
pub fn graph_shape(max_nodes: usize) -> impl Strategy<Value = GraphShape> {
    (1..max_nodes.max(2)).prop_flat_map(|count| {
        prop::collection::vec((0..count, 0..count), 0..count * 4)
            .prop_map(move |edges| GraphShape { count, edges })
    })
}

/// Realizes a graph shape into linked nodes, each with a unique key.
#[must_use]
pub fn build_graph(shape: &GraphShape) -> Vec<Arc<GraphNode>> {
    let nodes: Vec<Arc<GraphNode>> = (0..shape.count)
        .map(|i| {
            GraphNode::with_key(
                "nodes",
                (i + 1) as u64,
                ValueMap::new().with("index", i as i64),
            )
        })
        .collect();
    for &(from, to) in &shape.edges {
        nodes[from % shape.count].link(&nodes[to % shape.count]);
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use workset_core::{EntityTracker, GraphWalker};

    proptest! {
        #[test]
        fn generated_maps_stay_within_bounds(map in value_map(6)) {
            prop_assert!(map.len() < 6);
        }

        #[test]
        fn generated_graphs_always_walk_to_completion(shape in graph_shape(9)) {
            let nodes = build_graph(&shape);
            let mut tracker = EntityTracker::new();

            let report = GraphWalker::new(&mut tracker)
                .walk(&nodes[0], EntityState::Unchanged)
                .unwrap();

            // Termination plus the one-visit bound.
            prop_assert!(report.visited >= 1);
            prop_assert!(report.visited <= shape.count);
            prop_assert_eq!(tracker.len(), report.visited);
        }

        #[test]
        fn walking_twice_attaches_nothing_new(shape in graph_shape(7)) {
            let nodes = build_graph(&shape);
            let mut tracker = EntityTracker::new();

            GraphWalker::new(&mut tracker)
                .walk(&nodes[0], EntityState::Unchanged)
                .unwrap();
            let tracked = tracker.len();

            let second = GraphWalker::new(&mut tracker)
                .walk(&nodes[0], EntityState::Unchanged)
                .unwrap();
            prop_assert_eq!(second.attached, 0);
            prop_assert_eq!(tracker.len(), tracked);
        }
    }
}
