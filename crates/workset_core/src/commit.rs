//! Commit pipeline: turn tracked state into store writes.

use crate::error::TrackResult;
use crate::record::{audit, EntityState};
use crate::tracker::EntityTracker;
use tracing::{debug, warn};
use workset_model::{EntityName, EntitySnapshot, Identity};
use workset_store::{Clock, Store, WriteOutcome};

/// One entity whose write was rejected by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEntry {
    /// The entity family.
    pub entity: EntityName,
    /// The conflicted identity.
    pub identity: Identity,
    /// The row as the store currently holds it.
    pub snapshot: EntitySnapshot,
}

/// The set of entities that kept a commit attempt from applying.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictSet {
    entries: Vec<ConflictEntry>,
}

impl ConflictSet {
    /// Returns the number of conflicted entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if there are no conflicts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the conflicted entities.
    pub fn iter(&self) -> impl Iterator<Item = &ConflictEntry> {
        self.entries.iter()
    }

    pub(crate) fn push(&mut self, entry: ConflictEntry) {
        self.entries.push(entry);
    }
}

/// Receipt for a commit attempt that applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Rows written (inserted, updated, or deleted).
    pub entities_affected: usize,
    /// Keys the store assigned to inserted records, in dispatch order.
    pub inserted: Vec<(EntityName, Identity)>,
}

/// Result of one commit attempt.
#[derive(Debug)]
pub enum CommitOutcome {
    /// Every pending record was written.
    Applied(CommitReceipt),
    /// The attempt was aborted; nothing conflicting was written.
    Conflicted(ConflictSet),
}

/// Computes and dispatches the pending writes of a tracker.
///
/// A commit attempt runs in phases: collect pending records in attach
/// order, stamp audit timestamps, validate concurrency tokens against the
/// store, then dispatch. Any token mismatch found during validation aborts
/// the attempt before the first write; the attempt is all-or-nothing. The
/// dispatch phase is the only place the pipeline performs I/O.
pub struct CommitPipeline<'a> {
    store: &'a dyn Store,
    clock: &'a dyn Clock,
}

impl<'a> CommitPipeline<'a> {
    /// Creates a pipeline over a store and a clock.
    pub fn new(store: &'a dyn Store, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Runs one commit attempt.
    ///
    /// Conflicts are reported as [`CommitOutcome::Conflicted`]; only store
    /// failures (a vanished row, for instance) are errors. On success,
    /// surviving records are promoted to `Unchanged` with refreshed tokens
    /// and deleted records leave the tracker.
    ///
    /// # Errors
    ///
    /// Returns `TrackError::Store` when the store reports a fatal failure;
    /// `NotFound` is never retried.
    pub fn commit_once(&self, tracker: &mut EntityTracker) -> TrackResult<CommitOutcome> {
        let pending = tracker.pending_keys();
        if pending.is_empty() {
            return Ok(CommitOutcome::Applied(CommitReceipt::default()));
        }
        debug!(pending = pending.len(), "commit attempt");

        self.stamp(tracker, &pending);

        // Validate every guarded write up front so a conflicted attempt
        // aborts with zero rows written.
        let conflicts = self.preflight(tracker, &pending)?;
        if !conflicts.is_empty() {
            debug!(
                conflicts = conflicts.len(),
                "commit attempt aborted before dispatch"
            );
            return Ok(CommitOutcome::Conflicted(conflicts));
        }

        self.dispatch(tracker, &pending)
    }

    fn stamp(&self, tracker: &mut EntityTracker, pending: &[(EntityName, Identity)]) {
        let now = self.clock.now();
        for (entity, identity) in pending {
            let Some(record) = tracker.get_mut(entity, *identity) else {
                continue;
            };
            match record.state() {
                EntityState::Added => {
                    record.set_shadow(audit::CREATED_AT, now);
                    record.set_shadow(audit::UPDATED_AT, now);
                }
                EntityState::Modified => {
                    record.set_shadow(audit::UPDATED_AT, now);
                    // Partial updates must still carry the refreshed stamp.
                    if !record.modified_names().is_empty() {
                        record.mark_modified(audit::UPDATED_AT);
                    }
                }
                _ => {}
            }
        }
    }

    fn preflight(
        &self,
        tracker: &EntityTracker,
        pending: &[(EntityName, Identity)],
    ) -> TrackResult<ConflictSet> {
        let mut conflicts = ConflictSet::default();
        for (entity, identity) in pending {
            let Some(record) = tracker.get(entity, *identity) else {
                continue;
            };
            if !matches!(record.state(), EntityState::Modified | EntityState::Deleted) {
                continue;
            }
            let snapshot = self.store.get(entity, *identity)?;
            if snapshot.token.is_some() && snapshot.token.as_ref() != record.token() {
                conflicts.push(ConflictEntry {
                    entity: entity.clone(),
                    identity: *identity,
                    snapshot,
                });
            }
        }
        Ok(conflicts)
    }

    fn dispatch(
        &self,
        tracker: &mut EntityTracker,
        pending: &[(EntityName, Identity)],
    ) -> TrackResult<CommitOutcome> {
        let mut receipt = CommitReceipt::default();
        let mut conflicts = ConflictSet::default();

        for (entity, identity) in pending {
            let Some(record) = tracker.get(entity, *identity) else {
                continue;
            };
            match record.state() {
                EntityState::Added => {
                    let values = record.values_for_write();
                    let (assigned, token) = self.store.insert(entity, values)?;
                    tracker.rekey(entity, *identity, assigned)?;
                    if let Some(record) = tracker.get_mut(entity, assigned) {
                        record.promote_clean(token);
                        if let Some(node) = record.source() {
                            node.assign_key(assigned);
                        }
                    }
                    receipt.inserted.push((entity.clone(), assigned));
                    receipt.entities_affected += 1;
                }
                EntityState::Modified => {
                    let changed = record.changed_values();
                    let token = record.token().copied();
                    match self.store.update(entity, *identity, token.as_ref(), changed)? {
                        WriteOutcome::Applied { token } => {
                            if let Some(record) = tracker.get_mut(entity, *identity) {
                                record.promote_clean(token);
                            }
                            receipt.entities_affected += 1;
                        }
                        WriteOutcome::Conflict { snapshot } => {
                            // A writer slipped in between validation and
                            // dispatch. Abort the rest of the attempt.
                            warn!(%entity, %identity, "write conflicted after validation");
                            conflicts.push(ConflictEntry {
                                entity: entity.clone(),
                                identity: *identity,
                                snapshot,
                            });
                            break;
                        }
                    }
                }
                EntityState::Deleted => {
                    let token = record.token().copied();
                    match self.store.delete(entity, *identity, token.as_ref())? {
                        WriteOutcome::Applied { .. } => {
                            tracker.remove(entity, *identity);
                            receipt.entities_affected += 1;
                        }
                        WriteOutcome::Conflict { snapshot } => {
                            warn!(%entity, %identity, "delete conflicted after validation");
                            conflicts.push(ConflictEntry {
                                entity: entity.clone(),
                                identity: *identity,
                                snapshot,
                            });
                            break;
                        }
                    }
                }
                _ => {}
            }
        }

        if conflicts.is_empty() {
            debug!(affected = receipt.entities_affected, "commit applied");
            Ok(CommitOutcome::Applied(receipt))
        } else {
            Ok(CommitOutcome::Conflicted(conflicts))
        }
    }
}
