//! Store-side row snapshots.

use crate::map::ValueMap;
use crate::tag::VersionTag;
use serde::{Deserialize, Serialize};

/// A point-in-time copy of a stored row.
///
/// Snapshots answer point lookups and ride along with conflict reports so
/// resolution strategies can see what the store currently holds. The token
/// is `None` for rows in collections that opted out of versioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// The row's property values, shadow properties included.
    pub values: ValueMap,
    /// The row's current version tag, if the collection is versioned.
    pub token: Option<VersionTag>,
}

impl EntitySnapshot {
    /// Creates a snapshot.
    #[must_use]
    pub fn new(values: ValueMap, token: Option<VersionTag>) -> Self {
        Self { values, token }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction() {
        let snap = EntitySnapshot::new(ValueMap::new().with("a", 1i64), None);
        assert_eq!(snap.values.len(), 1);
        assert!(snap.token.is_none());
    }

    #[test]
    fn serde_roundtrip() {
        let snap = EntitySnapshot::new(
            ValueMap::new().with("name", "Herbert"),
            Some(VersionTag::from_bytes([3u8; 32])),
        );
        let json = serde_json::to_string(&snap).unwrap();
        let back: EntitySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
