//! Error types for the tracking core.

use crate::commit::ConflictSet;
use thiserror::Error;
use workset_model::{EntityName, Identity};
use workset_store::StoreError;

/// Result type for tracking operations.
pub type TrackResult<T> = Result<T, TrackError>;

/// Errors that can occur while tracking or committing a unit of work.
///
/// Token mismatches are deliberately absent: a conflicting write is a value
/// the resolver handles, and it only becomes an error once the retry budget
/// runs out.
#[derive(Debug, Error)]
pub enum TrackError {
    /// An identity is already tracked in a conflicting state.
    #[error("duplicate identity: {identity} in {entity} is already tracked as {existing:?}")]
    DuplicateIdentity {
        /// The entity family.
        entity: EntityName,
        /// The identity attached twice.
        identity: Identity,
        /// The state the existing record is in.
        existing: crate::record::EntityState,
    },

    /// One graph contained two distinct objects claiming the same key.
    #[error("ambiguous identity: {identity} in {entity} appears twice in one graph with different values")]
    AmbiguousIdentity {
        /// The entity family.
        entity: EntityName,
        /// The contested identity.
        identity: Identity,
    },

    /// The store could not complete an operation.
    ///
    /// Wraps `NotFound` for rows the store no longer has; such failures are
    /// fatal and never retried.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Conflicts survived every permitted resolution round.
    #[error("retry budget exhausted after {attempts} resolution round(s); {} entity(ies) still conflicted", .conflicts.len())]
    RetryBudgetExhausted {
        /// Resolution rounds performed before giving up.
        attempts: u32,
        /// The final set of unresolved conflicts.
        conflicts: ConflictSet,
    },

    /// The caller supplied bad input.
    #[error("invalid operation: {message}")]
    Validation {
        /// Description of what was wrong.
        message: String,
    },

    /// The commit was cancelled before dispatch began.
    #[error("commit cancelled")]
    Cancelled,
}

impl TrackError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
