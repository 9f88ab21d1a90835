//! Object graphs and graph-walking attachment.

use crate::error::{TrackError, TrackResult};
use crate::record::{EntityRecord, EntityState};
use crate::tracker::EntityTracker;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use workset_model::{EntityName, Identity, PropertyValue, ValueMap};

/// A caller-side object in an entity graph.
///
/// Nodes are shared by `Arc` so the same object can appear under several
/// parents; traversal deduplicates by reference identity, which also makes
/// cyclic graphs safe. A node starts with a placeholder identity unless it
/// was built from a known key, and learns its store-assigned key when the
/// record discovered on it is inserted.
pub struct GraphNode {
    entity: EntityName,
    identity: RwLock<Identity>,
    values: RwLock<ValueMap>,
    links: RwLock<Vec<Arc<GraphNode>>>,
}

impl GraphNode {
    /// Creates a new node with a placeholder identity.
    #[must_use]
    pub fn new(entity: impl Into<EntityName>, values: ValueMap) -> Arc<Self> {
        Arc::new(Self {
            entity: entity.into(),
            identity: RwLock::new(Identity::local()),
            values: RwLock::new(values),
            links: RwLock::new(Vec::new()),
        })
    }

    /// Creates a node for a row the store already knows.
    #[must_use]
    pub fn with_key(entity: impl Into<EntityName>, key: u64, values: ValueMap) -> Arc<Self> {
        Arc::new(Self {
            entity: entity.into(),
            identity: RwLock::new(Identity::Key(key)),
            values: RwLock::new(values),
            links: RwLock::new(Vec::new()),
        })
    }

    /// Returns the entity family name.
    #[must_use]
    pub fn entity(&self) -> &EntityName {
        &self.entity
    }

    /// Returns the node's identity.
    #[must_use]
    pub fn identity(&self) -> Identity {
        *self.identity.read()
    }

    pub(crate) fn assign_key(&self, identity: Identity) {
        *self.identity.write() = identity;
    }

    /// Returns a copy of the node's property values.
    #[must_use]
    pub fn values(&self) -> ValueMap {
        self.values.read().clone()
    }

    /// Sets a property value on the node.
    pub fn set_value(&self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.values.write().set(name, value);
    }

    /// Links a related node. Links are directed; link both ways for a
    /// bidirectional navigation.
    pub fn link(&self, other: &Arc<GraphNode>) {
        self.links.write().push(Arc::clone(other));
    }

    /// Returns the linked nodes.
    #[must_use]
    pub fn links(&self) -> Vec<Arc<GraphNode>> {
        self.links.read().clone()
    }
}

// Manual impl: deriving Debug would recurse through cyclic links.
impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("entity", &self.entity)
            .field("identity", &self.identity())
            .field("links", &self.links.read().len())
            .finish_non_exhaustive()
    }
}

/// What a walk policy sees for each newly discovered node.
pub struct WalkContext<'a> {
    node: &'a Arc<GraphNode>,
    is_root: bool,
    tracked: Option<&'a EntityRecord>,
}

impl WalkContext<'_> {
    /// The node being classified.
    #[must_use]
    pub fn node(&self) -> &Arc<GraphNode> {
        self.node
    }

    /// True when this is the walk's root object.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// The record already tracked for this node's identity, if any.
    #[must_use]
    pub fn tracked(&self) -> Option<&EntityRecord> {
        self.tracked
    }

    /// The node's identity.
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.node.identity()
    }

    /// The node's entity family name.
    #[must_use]
    pub fn entity(&self) -> &EntityName {
        self.node.entity()
    }
}

/// How the walker treats two distinct objects claiming one persisted key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateNodes {
    /// Fail the walk with [`TrackError::AmbiguousIdentity`] when the
    /// duplicates disagree on values.
    #[default]
    Reject,
    /// Keep the first object encountered and skip the rest.
    KeepFirst,
}

/// Summary of one graph walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkReport {
    /// Objects visited (each reference exactly once).
    pub visited: usize,
    /// Records newly attached by this walk.
    pub attached: usize,
}

/// Walks an object graph, assigning a persistence intent to every
/// reachable node in one pass.
///
/// Traversal is depth-first over node links, visiting each object at most
/// once by reference identity, so cyclic graphs terminate. For every node
/// the policy decides the state to assign; nodes it declines stay exactly
/// as they are.
pub struct GraphWalker<'t> {
    tracker: &'t mut EntityTracker,
    duplicates: DuplicateNodes,
}

impl<'t> GraphWalker<'t> {
    /// Creates a walker over the given tracker.
    pub fn new(tracker: &'t mut EntityTracker) -> Self {
        Self {
            tracker,
            duplicates: DuplicateNodes::Reject,
        }
    }

    /// Sets the duplicate-key policy.
    #[must_use]
    pub fn with_duplicates(mut self, duplicates: DuplicateNodes) -> Self {
        self.duplicates = duplicates;
        self
    }

    /// Walks with the default policy.
    ///
    /// The root takes `root_state`; every other reachable, not-yet-tracked
    /// node is attached as `Added` when its identity is a placeholder and
    /// `Unchanged` otherwise. Already-tracked nodes are left alone.
    pub fn walk(
        &mut self,
        root: &Arc<GraphNode>,
        root_state: EntityState,
    ) -> TrackResult<WalkReport> {
        self.walk_with(root, |ctx| {
            if ctx.is_root() {
                Some(root_state)
            } else if ctx.tracked().is_some() {
                None
            } else if ctx.identity().is_persistent() {
                Some(EntityState::Unchanged)
            } else {
                Some(EntityState::Added)
            }
        })
    }

    /// Walks with a caller-supplied policy.
    ///
    /// The policy returns the state each node should have, or `None` to
    /// leave the node untracked (or tracked as-is). Nodes the policy
    /// attaches remember their source node and its links, so assigned keys
    /// flow back after commit.
    pub fn walk_with<F>(&mut self, root: &Arc<GraphNode>, mut policy: F) -> TrackResult<WalkReport>
    where
        F: FnMut(&WalkContext<'_>) -> Option<EntityState>,
    {
        let mut visited: HashSet<*const GraphNode> = HashSet::new();
        let mut first_claim: HashMap<(EntityName, Identity), Arc<GraphNode>> = HashMap::new();
        let mut stack: Vec<Arc<GraphNode>> = vec![Arc::clone(root)];
        let root_ptr = Arc::as_ptr(root);
        let mut report = WalkReport::default();

        while let Some(node) = stack.pop() {
            let ptr = Arc::as_ptr(&node);
            if !visited.insert(ptr) {
                continue;
            }

            let identity = node.identity();
            if identity.is_persistent() {
                let key = (node.entity().clone(), identity);
                if let Some(first) = first_claim.get(&key) {
                    if first.values() != node.values()
                        && self.duplicates == DuplicateNodes::Reject
                    {
                        return Err(TrackError::AmbiguousIdentity {
                            entity: key.0,
                            identity,
                        });
                    }
                    // Same logical entity seen through another object: keep
                    // the first, but still follow its links.
                    push_links(&mut stack, &node);
                    continue;
                }
                first_claim.insert(key, Arc::clone(&node));
            }

            report.visited += 1;
            let decision = {
                let ctx = WalkContext {
                    node: &node,
                    is_root: ptr == root_ptr,
                    tracked: self.tracker.get(node.entity(), identity),
                };
                policy(&ctx)
            };

            if let Some(state) = decision {
                let existing = self
                    .tracker
                    .get(node.entity(), identity)
                    .map(EntityRecord::state);
                match existing {
                    Some(current) if current == state => {}
                    Some(_) => {
                        let entity = node.entity().clone();
                        self.tracker.set_state(&entity, identity, state)?;
                    }
                    None => {
                        let mut record =
                            EntityRecord::new(node.entity().clone(), identity, node.values());
                        let nav = node.links().iter().map(Arc::downgrade).collect();
                        record.set_graph_refs(Arc::downgrade(&node), nav);
                        self.tracker.attach(record, state)?;
                        report.attached += 1;
                    }
                }
            }

            push_links(&mut stack, &node);
        }

        Ok(report)
    }
}

// Reversed so the stack pops links in declaration order.
fn push_links(stack: &mut Vec<Arc<GraphNode>>, node: &Arc<GraphNode>) {
    let mut links = node.links();
    links.reverse();
    stack.append(&mut links);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author_node(key: u64) -> Arc<GraphNode> {
        GraphNode::with_key("authors", key, ValueMap::new().with("last", "Herbert"))
    }

    fn book_node(title: &str) -> Arc<GraphNode> {
        GraphNode::new("books", ValueMap::new().with("title", title))
    }

    #[test]
    fn default_policy_attaches_children_as_added() {
        let mut tracker = EntityTracker::new();
        let author = author_node(1);
        let dune = book_node("Dune");
        let messiah = book_node("Dune Messiah");
        author.link(&dune);
        author.link(&messiah);

        let report = GraphWalker::new(&mut tracker)
            .walk(&author, EntityState::Unchanged)
            .unwrap();

        assert_eq!(report.visited, 3);
        assert_eq!(report.attached, 3);
        assert_eq!(
            tracker.get(&"authors".into(), Identity::Key(1)).unwrap().state(),
            EntityState::Unchanged
        );
        for book in [&dune, &messiah] {
            assert_eq!(
                tracker.get(&"books".into(), book.identity()).unwrap().state(),
                EntityState::Added
            );
        }
    }

    #[test]
    fn persisted_children_attach_as_unchanged() {
        let mut tracker = EntityTracker::new();
        let author = author_node(1);
        let book = GraphNode::with_key("books", 7, ValueMap::new().with("title", "Dune"));
        author.link(&book);

        GraphWalker::new(&mut tracker)
            .walk(&author, EntityState::Unchanged)
            .unwrap();

        assert_eq!(
            tracker.get(&"books".into(), Identity::Key(7)).unwrap().state(),
            EntityState::Unchanged
        );
    }

    #[test]
    fn cyclic_graphs_terminate_and_visit_once() {
        let mut tracker = EntityTracker::new();
        let author = author_node(1);
        let book = book_node("Dune");
        author.link(&book);
        book.link(&author); // cycle

        let report = GraphWalker::new(&mut tracker)
            .walk(&author, EntityState::Unchanged)
            .unwrap();

        assert_eq!(report.visited, 2);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn shared_node_is_visited_once() {
        let mut tracker = EntityTracker::new();
        let author = author_node(1);
        let publisher = GraphNode::with_key("publishers", 3, ValueMap::new());
        let book1 = book_node("Dune");
        let book2 = book_node("Dune Messiah");
        author.link(&book1);
        author.link(&book2);
        book1.link(&publisher);
        book2.link(&publisher); // diamond

        let report = GraphWalker::new(&mut tracker)
            .walk(&author, EntityState::Unchanged)
            .unwrap();

        assert_eq!(report.visited, 4);
        assert_eq!(tracker.len(), 4);
    }

    #[test]
    fn already_tracked_nodes_are_not_reclassified() {
        let mut tracker = EntityTracker::new();
        let author = author_node(1);
        tracker
            .attach(
                EntityRecord::new("authors", Identity::Key(1), author.values()),
                EntityState::Modified,
            )
            .unwrap();

        let report = GraphWalker::new(&mut tracker)
            .walk_with(&author, |ctx| {
                if ctx.tracked().is_some() {
                    None
                } else {
                    Some(EntityState::Unchanged)
                }
            })
            .unwrap();

        assert_eq!(report.attached, 0);
        assert_eq!(
            tracker.get(&"authors".into(), Identity::Key(1)).unwrap().state(),
            EntityState::Modified
        );
    }

    #[test]
    fn ambiguous_identity_is_rejected() {
        let mut tracker = EntityTracker::new();
        let author = author_node(1);
        let twin_a = GraphNode::with_key("books", 5, ValueMap::new().with("title", "Dune"));
        let twin_b = GraphNode::with_key("books", 5, ValueMap::new().with("title", "Not Dune"));
        author.link(&twin_a);
        author.link(&twin_b);

        let result = GraphWalker::new(&mut tracker).walk(&author, EntityState::Unchanged);
        assert!(matches!(result, Err(TrackError::AmbiguousIdentity { .. })));
    }

    #[test]
    fn identical_duplicates_are_merged_silently() {
        let mut tracker = EntityTracker::new();
        let author = author_node(1);
        let twin_a = GraphNode::with_key("books", 5, ValueMap::new().with("title", "Dune"));
        let twin_b = GraphNode::with_key("books", 5, ValueMap::new().with("title", "Dune"));
        author.link(&twin_a);
        author.link(&twin_b);

        let report = GraphWalker::new(&mut tracker)
            .walk(&author, EntityState::Unchanged)
            .unwrap();
        assert_eq!(report.visited, 2);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn keep_first_tolerates_disagreeing_duplicates() {
        let mut tracker = EntityTracker::new();
        let author = author_node(1);
        let twin_a = GraphNode::with_key("books", 5, ValueMap::new().with("title", "Dune"));
        let twin_b = GraphNode::with_key("books", 5, ValueMap::new().with("title", "Not Dune"));
        author.link(&twin_a);
        author.link(&twin_b);

        let report = GraphWalker::new(&mut tracker)
            .with_duplicates(DuplicateNodes::KeepFirst)
            .walk(&author, EntityState::Unchanged)
            .unwrap();

        assert_eq!(tracker.len(), 2);
        let record = tracker.get(&"books".into(), Identity::Key(5)).unwrap();
        assert_eq!(
            record.current().get("title").and_then(|v| v.as_text()),
            Some("Dune")
        );
        assert_eq!(report.visited, 2);
    }

    #[test]
    fn custom_policy_marks_one_property_per_node() {
        let mut tracker = EntityTracker::new();
        let author = author_node(1);
        let book = GraphNode::with_key("books", 2, ValueMap::new().with("title", "Dune"));
        author.link(&book);

        GraphWalker::new(&mut tracker)
            .walk_with(&author, |_| Some(EntityState::Unchanged))
            .unwrap();
        for (entity, key) in [("authors", 1u64), ("books", 2)] {
            let entity = EntityName::new(entity);
            tracker
                .mark_modified(&entity, Identity::Key(key), "touched")
                .unwrap();
            assert_eq!(
                tracker.get(&entity, Identity::Key(key)).unwrap().state(),
                EntityState::Modified
            );
        }
    }

    #[test]
    fn attached_records_remember_their_nodes() {
        let mut tracker = EntityTracker::new();
        let author = author_node(1);
        let book = book_node("Dune");
        author.link(&book);

        GraphWalker::new(&mut tracker)
            .walk(&author, EntityState::Unchanged)
            .unwrap();

        let record = tracker.get(&"authors".into(), Identity::Key(1)).unwrap();
        let source = record.source().unwrap();
        assert!(Arc::ptr_eq(&source, &author));
        assert_eq!(record.navigation().len(), 1);
        let nav = record.navigation()[0].upgrade().unwrap();
        assert!(Arc::ptr_eq(&nav, &book));
    }
}
