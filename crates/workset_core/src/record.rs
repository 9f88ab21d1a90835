//! Tracked entity records.

use crate::graph::GraphNode;
use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use workset_model::{EntityName, EntitySnapshot, Identity, PropertyValue, ValueMap, VersionTag};

/// Well-known shadow property names for audit stamps.
pub mod audit {
    /// Set once, when a record is first inserted.
    pub const CREATED_AT: &str = "created_at";
    /// Refreshed on every insert or update.
    pub const UPDATED_AT: &str = "updated_at";
}

/// Lifecycle state of a tracked record relative to the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// Not tracked; invisible to lookups and commits.
    Detached,
    /// Believed identical to the stored row.
    Unchanged,
    /// New; will be inserted on commit.
    Added,
    /// Locally edited; will be updated on commit.
    Modified,
    /// Marked for removal; will be deleted on commit.
    Deleted,
}

impl EntityState {
    /// Returns true if a commit would write this record.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Added | Self::Modified | Self::Deleted)
    }
}

/// A tracked record: one entity's values, flags, and lifecycle state.
///
/// A record keeps two value maps the caller sees through separate doors:
/// `current` holds the business properties, `shadow` holds properties that
/// are persisted but never exposed on the business object (audit stamps,
/// bookkeeping columns). `original` mirrors the row as last confirmed
/// present in the store, flat, shadow values included, together with the
/// version tag the store handed out for it.
#[derive(Debug)]
pub struct EntityRecord {
    entity: EntityName,
    identity: Identity,
    state: EntityState,
    current: ValueMap,
    shadow: ValueMap,
    original: ValueMap,
    original_token: Option<VersionTag>,
    modified: BTreeSet<String>,
    source: Option<Weak<GraphNode>>,
    nav: Vec<Weak<GraphNode>>,
}

impl EntityRecord {
    /// Creates a detached record from business values.
    ///
    /// The record becomes live once attached to a tracker.
    #[must_use]
    pub fn new(entity: impl Into<EntityName>, identity: Identity, values: ValueMap) -> Self {
        Self {
            entity: entity.into(),
            identity,
            state: EntityState::Detached,
            current: values,
            shadow: ValueMap::new(),
            original: ValueMap::new(),
            original_token: None,
            modified: BTreeSet::new(),
            source: None,
            nav: Vec::new(),
        }
    }

    /// Creates a record mirroring a store snapshot.
    ///
    /// Audit stamp names are routed into the shadow map; everything else
    /// lands in the business values. `original` is the snapshot verbatim.
    #[must_use]
    pub fn from_snapshot(entity: EntityName, identity: Identity, snapshot: &EntitySnapshot) -> Self {
        let mut record = Self::new(entity, identity, ValueMap::new());
        let (current, shadow) = record.split_flat(&snapshot.values);
        record.current = current;
        record.shadow = shadow;
        record.original = snapshot.values.clone();
        record.original_token = snapshot.token;
        record
    }

    /// Builder-style: sets the concurrency token last confirmed by the store.
    #[must_use]
    pub fn with_token(mut self, token: VersionTag) -> Self {
        self.original_token = Some(token);
        self
    }

    /// Builder-style: seeds shadow properties.
    #[must_use]
    pub fn with_shadow(mut self, shadow: ValueMap) -> Self {
        self.shadow = shadow;
        self
    }

    /// Returns the entity family name.
    #[must_use]
    pub fn entity(&self) -> &EntityName {
        &self.entity
    }

    /// Returns the record's identity.
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Returns the business property values.
    #[must_use]
    pub fn current(&self) -> &ValueMap {
        &self.current
    }

    /// Returns the shadow property values.
    #[must_use]
    pub fn shadow(&self) -> &ValueMap {
        &self.shadow
    }

    /// Returns the values as last confirmed present in the store.
    #[must_use]
    pub fn original(&self) -> &ValueMap {
        &self.original
    }

    /// Returns the concurrency token guarding this record's writes.
    #[must_use]
    pub fn token(&self) -> Option<&VersionTag> {
        self.original_token.as_ref()
    }

    /// Returns the explicitly flagged property names.
    #[must_use]
    pub fn modified_names(&self) -> &BTreeSet<String> {
        &self.modified
    }

    /// Checks whether a property is explicitly flagged.
    #[must_use]
    pub fn is_modified(&self, name: &str) -> bool {
        self.modified.contains(name)
    }

    /// Sets a business property value.
    ///
    /// Does not flag the property; use the tracker's mark operation to
    /// request a partial update.
    pub fn set_value(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.current.set(name, value);
    }

    /// Sets a shadow property value.
    pub fn set_shadow(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.shadow.set(name, value);
    }

    /// Flags a property as dirty. Idempotent.
    pub(crate) fn mark_modified(&mut self, name: impl Into<String>) {
        self.modified.insert(name.into());
    }

    /// The flat row this record would insert: business plus shadow values.
    #[must_use]
    pub fn values_for_write(&self) -> ValueMap {
        let mut values = self.current.clone();
        values.merge_from(&self.shadow);
        values
    }

    /// The values an update dispatch sends.
    ///
    /// Flagged properties only; the full flat row when nothing was flagged.
    #[must_use]
    pub fn changed_values(&self) -> ValueMap {
        if self.modified.is_empty() {
            return self.values_for_write();
        }
        let mut changed = ValueMap::new();
        for name in &self.modified {
            if let Some(value) = self.shadow.get(name).or_else(|| self.current.get(name)) {
                changed.set(name.clone(), value.clone());
            }
        }
        changed
    }

    /// Splits a flat row into (business, shadow) by this record's shadow
    /// names plus the audit stamp names.
    fn split_flat(&self, values: &ValueMap) -> (ValueMap, ValueMap) {
        let mut current = ValueMap::new();
        let mut shadow = ValueMap::new();
        for (name, value) in values.iter() {
            if name == audit::CREATED_AT || name == audit::UPDATED_AT || self.shadow.contains(name)
            {
                shadow.set(name, value.clone());
            } else {
                current.set(name, value.clone());
            }
        }
        (current, shadow)
    }

    pub(crate) fn assign_state(&mut self, state: EntityState) {
        self.state = state;
    }

    pub(crate) fn rekey(&mut self, identity: Identity) {
        self.identity = identity;
    }

    /// Replaces the caller-intent half of this record from a re-attach.
    ///
    /// Current values, shadow values, and flags are adopted; the store-facing
    /// half (original values, token) stays untouched.
    pub(crate) fn adopt(&mut self, other: Self) {
        self.current = other.current;
        self.shadow.merge_from(&other.shadow);
        self.modified = other.modified;
        if other.source.is_some() {
            self.source = other.source;
            self.nav = other.nav;
        }
    }

    /// Records what the store now holds after an accepted write.
    pub(crate) fn promote_clean(&mut self, token: Option<VersionTag>) {
        self.original = self.values_for_write();
        self.original_token = token;
        self.modified.clear();
        self.state = EntityState::Unchanged;
    }

    /// Seeds `original` from the current values at attach time.
    pub(crate) fn seed_original(&mut self) {
        if self.original.is_empty() {
            self.original = self.values_for_write();
        }
    }

    /// Discards local edits, restoring the current values from `original`.
    pub(crate) fn revert_to_original(&mut self) {
        let original = self.original.clone();
        let (current, shadow) = self.split_flat(&original);
        self.current = current;
        self.shadow = shadow;
        self.modified.clear();
    }

    /// Database-wins resolution: the store snapshot replaces everything
    /// local and the record settles as `Unchanged`.
    pub(crate) fn resolve_database_wins(&mut self, snapshot: &EntitySnapshot) {
        let (current, shadow) = self.split_flat(&snapshot.values);
        self.current = current;
        self.shadow = shadow;
        self.original = snapshot.values.clone();
        self.original_token = snapshot.token;
        self.modified.clear();
        self.state = EntityState::Unchanged;
    }

    /// Client-wins resolution: only the store-facing half is refreshed, so
    /// the next dispatch reapplies the local edits on the latest tag.
    pub(crate) fn resolve_client_wins(&mut self, snapshot: &EntitySnapshot) {
        self.original = snapshot.values.clone();
        self.original_token = snapshot.token;
    }

    /// Merge resolution: start from the store snapshot, overlay exactly the
    /// flagged properties with their local values.
    pub(crate) fn resolve_merge(&mut self, snapshot: &EntitySnapshot) {
        let mut resolved = snapshot.values.clone();
        for name in &self.modified {
            if let Some(value) = self.shadow.get(name).or_else(|| self.current.get(name)) {
                resolved.set(name.clone(), value.clone());
            }
        }
        let (current, shadow) = self.split_flat(&resolved);
        self.current = current;
        self.shadow = shadow;
        self.original = snapshot.values.clone();
        self.original_token = snapshot.token;
    }

    /// Returns the graph node this record was discovered on, if it is
    /// still alive.
    #[must_use]
    pub fn source(&self) -> Option<Arc<GraphNode>> {
        self.source.as_ref().and_then(Weak::upgrade)
    }

    /// Returns the ownership-free references to related graph nodes.
    ///
    /// Only graph traversal reads these; the commit path never does.
    #[must_use]
    pub fn navigation(&self) -> &[Weak<GraphNode>] {
        &self.nav
    }

    pub(crate) fn set_graph_refs(&mut self, source: Weak<GraphNode>, nav: Vec<Weak<GraphNode>>) {
        self.source = Some(source);
        self.nav = nav;
    }
}
