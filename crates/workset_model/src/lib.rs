//! # WorkSet Model
//!
//! Shared value vocabulary for WorkSet.
//!
//! This crate provides the leaf types every other WorkSet crate speaks:
//! - Scalar property values and name-keyed value maps
//! - Entity identities (store-assigned keys and session-local placeholders)
//! - Opaque row-version tags for optimistic concurrency
//! - Entity family names and timestamps

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod identity;
mod map;
mod name;
mod snapshot;
mod tag;
mod time;
mod value;

pub use identity::{Identity, LocalId};
pub use map::ValueMap;
pub use name::EntityName;
pub use snapshot::EntitySnapshot;
pub use tag::VersionTag;
pub use time::Timestamp;
pub use value::PropertyValue;
