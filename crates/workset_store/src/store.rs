//! Store trait definition.

use crate::error::StoreResult;
use workset_model::{EntityName, EntitySnapshot, Identity, ValueMap, VersionTag};

/// The outcome of a guarded write.
///
/// Conflicts are values, not errors: a rejected write carries the store's
/// current snapshot so the caller can resolve and retry without a second
/// round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write was accepted.
    Applied {
        /// The row's fresh version tag (`None` for unversioned collections).
        token: Option<VersionTag>,
    },
    /// The supplied tag no longer matches the stored row.
    Conflict {
        /// The row as the store currently holds it.
        snapshot: EntitySnapshot,
    },
}

impl WriteOutcome {
    /// Returns true if the write was rejected.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// A backing store for tracked entities.
///
/// Stores are **row stores with guarded writes**. They answer point
/// lookups, assign primary keys on insert, and accept updates and deletes
/// only when the supplied version tag matches the stored row. The store is
/// the only resource shared between sessions; it is responsible for
/// serializing conflicting writes.
///
/// # Invariants
///
/// - `insert` assigns a key the store has never handed out before
/// - Every accepted write to a versioned row produces a fresh tag
/// - A tag mismatch yields [`WriteOutcome::Conflict`], never silent success
/// - A missing row yields [`crate::StoreError::NotFound`], never a conflict
/// - Implementations must be `Send + Sync`; each call is atomic
///
/// # Implementors
///
/// - [`crate::MemoryStore`] - in-memory reference store
pub trait Store: Send + Sync {
    /// Reads the current snapshot of a row.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the row does not exist.
    fn get(&self, entity: &EntityName, identity: Identity) -> StoreResult<EntitySnapshot>;

    /// Inserts a new row and returns its assigned identity and tag.
    ///
    /// The tag is `None` when the collection is not versioned.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert cannot be performed.
    fn insert(
        &self,
        entity: &EntityName,
        values: ValueMap,
    ) -> StoreResult<(Identity, Option<VersionTag>)>;

    /// Updates a row if `token` matches the stored tag.
    ///
    /// Only the supplied `changed` properties are written; the rest of the
    /// row is left as stored. Unversioned collections ignore `token`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the row does not exist, `MissingKey` if the
    /// identity is a local placeholder.
    fn update(
        &self,
        entity: &EntityName,
        identity: Identity,
        token: Option<&VersionTag>,
        changed: ValueMap,
    ) -> StoreResult<WriteOutcome>;

    /// Deletes a row if `token` matches the stored tag.
    ///
    /// Unversioned collections ignore `token`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the row does not exist, `MissingKey` if the
    /// identity is a local placeholder.
    fn delete(
        &self,
        entity: &EntityName,
        identity: Identity,
        token: Option<&VersionTag>,
    ) -> StoreResult<WriteOutcome>;
}
