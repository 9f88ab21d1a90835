//! Session facade: one unit of work over a store.

use crate::commit::CommitReceipt;
use crate::error::{TrackError, TrackResult};
use crate::graph::{GraphNode, GraphWalker, WalkContext, WalkReport};
use crate::record::{EntityRecord, EntityState};
use crate::resolve::{ConcurrencyResolver, RetryBudget, RetryStrategy};
use crate::tracker::EntityTracker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use workset_model::{EntityName, Identity, PropertyValue, ValueMap};
use workset_store::{Clock, Store};

/// A clonable handle that cancels a session's commit loop.
///
/// Raising the flag is sticky; call [`Session::reset_cancel`] to commit
/// again afterwards.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Requests cancellation of the session's next or current commit loop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Checks whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One logical unit of work: a tracker bound to a store and a clock.
///
/// A session is a single-writer object; it is owned by exactly one unit of
/// work and is not meant for concurrent mutation. Any number of sessions
/// may share one store, which is where conflicting writes get serialized.
pub struct Session {
    tracker: EntityTracker,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    cancelled: Arc<AtomicBool>,
}

impl Session {
    /// Creates a session over a store and a clock.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            tracker: EntityTracker::new(),
            store,
            clock,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the tracker for read-only inspection.
    #[must_use]
    pub fn tracker(&self) -> &EntityTracker {
        &self.tracker
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Returns a handle that can cancel this session's commit loop from
    /// another thread.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancelled))
    }

    /// Clears a previously raised cancellation flag.
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Registers a record in the given state.
    ///
    /// # Errors
    ///
    /// See [`EntityTracker::attach`].
    pub fn attach(&mut self, record: EntityRecord, state: EntityState) -> TrackResult<()> {
        self.tracker.attach(record, state)
    }

    /// Tracks a brand-new entity for insertion and returns its placeholder
    /// identity.
    ///
    /// # Errors
    ///
    /// See [`EntityTracker::attach`].
    pub fn attach_new(
        &mut self,
        entity: impl Into<EntityName>,
        values: ValueMap,
    ) -> TrackResult<Identity> {
        let record = EntityRecord::new(entity, Identity::local(), values);
        let identity = record.identity();
        self.tracker.attach(record, EntityState::Added)?;
        Ok(identity)
    }

    /// Loads a row from the store and tracks it as `Unchanged`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the store has no such row.
    pub fn fetch(&mut self, entity: &EntityName, identity: Identity) -> TrackResult<()> {
        let snapshot = self.store.get(entity, identity)?;
        let record = EntityRecord::from_snapshot(entity.clone(), identity, &snapshot);
        self.tracker.attach(record, EntityState::Unchanged)
    }

    /// Transitions a tracked record's state.
    ///
    /// # Errors
    ///
    /// See [`EntityTracker::set_state`].
    pub fn set_state(
        &mut self,
        entity: &EntityName,
        identity: Identity,
        state: EntityState,
    ) -> TrackResult<()> {
        self.tracker.set_state(entity, identity, state)
    }

    /// Flags a property as dirty on a tracked record.
    ///
    /// # Errors
    ///
    /// See [`EntityTracker::mark_modified`].
    pub fn mark_modified(
        &mut self,
        entity: &EntityName,
        identity: Identity,
        name: impl Into<String>,
    ) -> TrackResult<()> {
        self.tracker.mark_modified(entity, identity, name)
    }

    /// Sets a business property value on a tracked record.
    ///
    /// Does not flag the property; pair with [`Session::mark_modified`]
    /// for a partial update.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the record is not tracked.
    pub fn set_value(
        &mut self,
        entity: &EntityName,
        identity: Identity,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> TrackResult<()> {
        let record = self
            .tracker
            .get_mut(entity, identity)
            .ok_or_else(|| TrackError::validation(format!("{identity} in {entity} is not tracked")))?;
        record.set_value(name, value);
        Ok(())
    }

    /// Looks up a tracked record.
    #[must_use]
    pub fn get(&self, entity: &EntityName, identity: Identity) -> Option<&EntityRecord> {
        self.tracker.get(entity, identity)
    }

    /// Detaches a record.
    ///
    /// # Errors
    ///
    /// See [`EntityTracker::detach`].
    pub fn detach(&mut self, entity: &EntityName, identity: Identity) -> TrackResult<()> {
        self.tracker.detach(entity, identity)
    }

    /// Detaches everything, readying the session for the next unit of work.
    pub fn clear(&mut self) {
        self.tracker.clear();
    }

    /// Walks an object graph with the default policy.
    ///
    /// # Errors
    ///
    /// See [`GraphWalker::walk`].
    pub fn walk(&mut self, root: &Arc<GraphNode>, root_state: EntityState) -> TrackResult<WalkReport> {
        GraphWalker::new(&mut self.tracker).walk(root, root_state)
    }

    /// Walks an object graph with a caller-supplied policy.
    ///
    /// # Errors
    ///
    /// See [`GraphWalker::walk_with`].
    pub fn walk_with<F>(&mut self, root: &Arc<GraphNode>, policy: F) -> TrackResult<WalkReport>
    where
        F: FnMut(&WalkContext<'_>) -> Option<EntityState>,
    {
        GraphWalker::new(&mut self.tracker).walk_with(root, policy)
    }

    /// Commits the unit of work, resolving conflicts with the given
    /// strategy until success or an exhausted budget.
    ///
    /// # Errors
    ///
    /// See [`ConcurrencyResolver::commit_with_cancel`].
    pub fn commit(
        &mut self,
        strategy: RetryStrategy,
        budget: RetryBudget,
    ) -> TrackResult<CommitReceipt> {
        let resolver = ConcurrencyResolver::new(self.store.as_ref(), self.clock.as_ref());
        resolver.commit_with_cancel(&mut self.tracker, strategy, budget, &self.cancelled)
    }

    /// Refreshes a tracked record from the store, discarding local edits.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the row vanished, or a validation error
    /// when the record is not tracked.
    pub fn reload(&mut self, entity: &EntityName, identity: Identity) -> TrackResult<()> {
        let snapshot = self.store.get(entity, identity)?;
        let record = self
            .tracker
            .get_mut(entity, identity)
            .ok_or_else(|| TrackError::validation(format!("{identity} in {entity} is not tracked")))?;
        record.resolve_database_wins(&snapshot);
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("tracked", &self.tracker.len())
            .field("cancelled", &self.cancelled.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
