//! Opaque row-version tag.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque row-version marker compared on write to detect lost updates.
///
/// Tags are 32 opaque bytes. The core never interprets them; it only checks
/// equality against the store's current tag. A store must produce a fresh
/// tag for every accepted write to a versioned row.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionTag([u8; 32]);

impl VersionTag {
    /// Creates a tag from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Leading 8 bytes are enough to tell tags apart in test output.
        write!(f, "VersionTag(")?;
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}
