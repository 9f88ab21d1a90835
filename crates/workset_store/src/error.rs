//! Error types for store operations.

use thiserror::Error;
use workset_model::{EntityName, Identity};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors a store can report.
///
/// Version-tag mismatches are not errors; they are reported through
/// [`crate::WriteOutcome::Conflict`] so callers can resolve and retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The row does not exist (or no longer exists).
    #[error("row not found: {identity} in {entity}")]
    NotFound {
        /// The collection searched.
        entity: EntityName,
        /// The identity that was not found.
        identity: Identity,
    },

    /// A write referenced an identity the store never assigned.
    #[error("write requires a store-assigned key, got {identity} in {entity}")]
    MissingKey {
        /// The collection addressed.
        entity: EntityName,
        /// The placeholder identity that was supplied.
        identity: Identity,
    },
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(entity: &EntityName, identity: Identity) -> Self {
        Self::NotFound {
            entity: entity.clone(),
            identity,
        }
    }

    /// Creates a missing-key error.
    pub fn missing_key(entity: &EntityName, identity: Identity) -> Self {
        Self::MissingKey {
            entity: entity.clone(),
            identity,
        }
    }
}
