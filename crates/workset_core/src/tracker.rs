//! Per-session entity registry.

use crate::error::{TrackError, TrackResult};
use crate::record::{EntityRecord, EntityState};
use std::collections::HashMap;
use workset_model::{EntityName, Identity};

/// The key a tracker registers records under.
pub type RecordKey = (EntityName, Identity);

/// The single source of truth for what a session believes about its
/// entities.
///
/// A tracker maps `(entity, identity)` to exactly one record and remembers
/// attach order, so commits dispatch writes in a stable, reproducible
/// sequence. No tracker operation performs I/O.
///
/// Trackers are single-writer data structures: one logical unit of work
/// owns the tracker, and concurrent mutation requires external
/// synchronization.
#[derive(Debug, Default)]
pub struct EntityTracker {
    records: HashMap<RecordKey, EntityRecord>,
    order: Vec<RecordKey>,
}

impl EntityTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record in the given state.
    ///
    /// `Added` records may carry a placeholder identity; every other state
    /// requires a store-assigned key. Re-attaching an identity already
    /// tracked in the *same* state replaces its current values and flags
    /// (caller intent preserved); a conflicting state is a
    /// [`TrackError::DuplicateIdentity`].
    pub fn attach(&mut self, mut record: EntityRecord, state: EntityState) -> TrackResult<()> {
        match state {
            EntityState::Detached => {
                return Err(TrackError::validation("cannot attach a record as Detached"));
            }
            EntityState::Added => {}
            EntityState::Unchanged | EntityState::Modified | EntityState::Deleted => {
                if !record.identity().is_persistent() {
                    return Err(TrackError::validation(format!(
                        "cannot attach {state:?} record with placeholder identity {}",
                        record.identity()
                    )));
                }
            }
        }

        let key = (record.entity().clone(), record.identity());
        if let Some(existing) = self.records.get_mut(&key) {
            if existing.state() != state {
                return Err(TrackError::DuplicateIdentity {
                    entity: key.0,
                    identity: key.1,
                    existing: existing.state(),
                });
            }
            existing.adopt(record);
            return Ok(());
        }

        record.assign_state(state);
        if state != EntityState::Added {
            record.seed_original();
        }
        self.order.push(key.clone());
        self.records.insert(key, record);
        Ok(())
    }

    /// Transitions a tracked record to a new state.
    ///
    /// The transition graph has no edge into `Detached` (use
    /// [`EntityTracker::detach`]) and no edge from a persisted state into
    /// `Added`. Setting `Modified` back to `Unchanged` discards local edits.
    pub fn set_state(
        &mut self,
        entity: &EntityName,
        identity: Identity,
        state: EntityState,
    ) -> TrackResult<()> {
        let record = self
            .records
            .get_mut(&(entity.clone(), identity))
            .ok_or_else(|| not_tracked(entity, identity))?;
        let old = record.state();
        if old == state {
            return Ok(());
        }
        match (old, state) {
            (_, EntityState::Detached) => Err(TrackError::validation(
                "state cannot be set to Detached; use detach",
            )),
            (_, EntityState::Added) => Err(TrackError::validation(format!(
                "{identity} in {entity} is already tracked as {old:?}; it cannot become Added"
            ))),
            (EntityState::Added, EntityState::Deleted) => Err(TrackError::validation(format!(
                "{identity} in {entity} was never persisted; detach it instead of deleting"
            ))),
            (EntityState::Added, EntityState::Unchanged | EntityState::Modified) => {
                if !record.identity().is_persistent() {
                    return Err(TrackError::validation(format!(
                        "{identity} in {entity} has no store-assigned key"
                    )));
                }
                record.assign_state(state);
                record.seed_original();
                Ok(())
            }
            (EntityState::Modified, EntityState::Unchanged) => {
                record.revert_to_original();
                record.assign_state(state);
                Ok(())
            }
            (
                EntityState::Unchanged | EntityState::Modified,
                EntityState::Modified | EntityState::Deleted,
            )
            | (EntityState::Deleted, EntityState::Unchanged | EntityState::Modified) => {
                record.assign_state(state);
                Ok(())
            }
            _ => Err(TrackError::validation(format!(
                "invalid state transition {old:?} -> {state:?} for {identity} in {entity}"
            ))),
        }
    }

    /// Flags a property as dirty on a tracked record. Idempotent.
    ///
    /// Promotes an `Unchanged` record to `Modified` on the first flag.
    pub fn mark_modified(
        &mut self,
        entity: &EntityName,
        identity: Identity,
        name: impl Into<String>,
    ) -> TrackResult<()> {
        let record = self
            .records
            .get_mut(&(entity.clone(), identity))
            .ok_or_else(|| not_tracked(entity, identity))?;
        match record.state() {
            EntityState::Unchanged => {
                record.assign_state(EntityState::Modified);
                record.mark_modified(name);
                Ok(())
            }
            EntityState::Modified => {
                record.mark_modified(name);
                Ok(())
            }
            other => Err(TrackError::validation(format!(
                "cannot mark property modified on {other:?} record {identity} in {entity}"
            ))),
        }
    }

    /// Removes a record from the tracker.
    ///
    /// Subsequent operations against the identity observe no tracked record.
    pub fn detach(&mut self, entity: &EntityName, identity: Identity) -> TrackResult<()> {
        let key = (entity.clone(), identity);
        if self.records.remove(&key).is_none() {
            return Err(not_tracked(entity, identity));
        }
        self.order.retain(|k| k != &key);
        Ok(())
    }

    /// Detaches everything.
    pub fn clear(&mut self) {
        self.records.clear();
        self.order.clear();
    }

    /// Looks up a tracked record.
    #[must_use]
    pub fn get(&self, entity: &EntityName, identity: Identity) -> Option<&EntityRecord> {
        self.records.get(&(entity.clone(), identity))
    }

    /// Looks up a tracked record mutably.
    pub fn get_mut(&mut self, entity: &EntityName, identity: Identity) -> Option<&mut EntityRecord> {
        self.records.get_mut(&(entity.clone(), identity))
    }

    /// Returns the number of tracked records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Checks if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over tracked records in attach order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        self.order.iter().filter_map(|key| self.records.get(key))
    }

    /// Returns the keys of records a commit would write, in attach order.
    #[must_use]
    pub fn pending_keys(&self) -> Vec<RecordKey> {
        self.order
            .iter()
            .filter(|key| {
                self.records
                    .get(*key)
                    .is_some_and(|r| r.state().is_pending())
            })
            .cloned()
            .collect()
    }

    /// Re-registers a record under its store-assigned key, preserving its
    /// attach-order slot.
    pub(crate) fn rekey(
        &mut self,
        entity: &EntityName,
        old: Identity,
        new: Identity,
    ) -> TrackResult<()> {
        let old_key = (entity.clone(), old);
        let mut record = self
            .records
            .remove(&old_key)
            .ok_or_else(|| not_tracked(entity, old))?;
        record.rekey(new);
        let new_key = (entity.clone(), new);
        for slot in &mut self.order {
            if *slot == old_key {
                *slot = new_key.clone();
            }
        }
        self.records.insert(new_key, record);
        Ok(())
    }

    /// Drops a record without the detach bookkeeping checks.
    pub(crate) fn remove(&mut self, entity: &EntityName, identity: Identity) {
        let key = (entity.clone(), identity);
        self.records.remove(&key);
        self.order.retain(|k| k != &key);
    }
}

fn not_tracked(entity: &EntityName, identity: Identity) -> TrackError {
    TrackError::validation(format!("{identity} in {entity} is not tracked"))
}
