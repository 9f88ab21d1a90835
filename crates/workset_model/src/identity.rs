//! Entity identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A session-local placeholder identifier.
///
/// Local ids are 128-bit UUIDs that are:
/// - Unique within a process
/// - Immutable once assigned
/// - Never sent to a store
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalId([u8; 16]);

impl LocalId {
    /// Creates a new random local id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    /// Creates a local id from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalId({})", Uuid::from_bytes(self.0))
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Uuid::from_bytes(self.0))
    }
}

/// The identity of a tracked entity.
///
/// An identity is either a primary key the store has assigned, or a
/// locally-unique placeholder for a record the store has not seen yet.
/// Placeholders are replaced by keys when an insert is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Identity {
    /// Primary key assigned by the store.
    Key(u64),
    /// Session-local placeholder, valid until the store assigns a key.
    Local(LocalId),
}

impl Identity {
    /// Creates a fresh placeholder identity.
    #[must_use]
    pub fn local() -> Self {
        Self::Local(LocalId::new())
    }

    /// Returns true if the store can resolve this identity.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Key(_))
    }

    /// Returns the store-assigned key, if any.
    #[must_use]
    pub fn as_key(&self) -> Option<u64> {
        match self {
            Self::Key(k) => Some(*k),
            Self::Local(_) => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => write!(f, "#{k}"),
            Self::Local(id) => write!(f, "local:{id}"),
        }
    }
}

impl From<u64> for Identity {
    fn from(key: u64) -> Self {
        Self::Key(key)
    }
}
