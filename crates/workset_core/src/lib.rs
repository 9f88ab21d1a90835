//! # WorkSet Core
//!
//! Unit-of-work change tracking and optimistic-concurrency resolution.
//!
//! This crate provides:
//! - Tracked entity records with lifecycle states and dirty flags
//! - A per-session tracker registry with stable dispatch ordering
//! - Graph walking that assigns persistence intent to whole object graphs
//! - A commit pipeline that stamps audit times and dispatches guarded writes
//! - Conflict resolution strategies wrapped in a retry loop
//!
//! The core performs I/O only through the [`workset_store::Store`] and
//! [`workset_store::Clock`] traits; everything else is in-memory state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod commit;
mod error;
mod graph;
mod record;
mod resolve;
mod session;
mod tracker;

pub use commit::{CommitOutcome, CommitPipeline, CommitReceipt, ConflictEntry, ConflictSet};
pub use workset_model::{
    EntityName, EntitySnapshot, Identity, PropertyValue, Timestamp, ValueMap, VersionTag,
};
pub use error::{TrackError, TrackResult};
pub use graph::{DuplicateNodes, GraphNode, GraphWalker, WalkContext, WalkReport};
pub use record::{audit, EntityRecord, EntityState};
pub use resolve::{ConcurrencyResolver, RetryBudget, RetryStrategy};
pub use session::{CancelHandle, Session};
pub use tracker::{EntityTracker, RecordKey};
