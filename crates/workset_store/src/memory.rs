//! In-memory store for testing and embedding.

use crate::error::{StoreError, StoreResult};
use crate::store::{Store, WriteOutcome};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use workset_model::{EntityName, EntitySnapshot, Identity, ValueMap, VersionTag};

/// Whether a collection carries row-version tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Versioning {
    /// Rows carry tags; guarded writes are enforced.
    Enabled,
    /// Rows carry no tags; writes always apply.
    Disabled,
}

#[derive(Debug, Clone)]
struct Row {
    values: ValueMap,
    token: Option<VersionTag>,
}

#[derive(Debug, Default)]
struct Collection {
    versioned: bool,
    rows: BTreeMap<u64, Row>,
}

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, Collection>,
    next_key: u64,
    next_seq: u64,
}

/// An in-memory [`Store`].
///
/// Suitable for unit tests, integration tests, and ephemeral sessions that
/// never touch disk. Keys are assigned from one monotone counter across all
/// collections, and every accepted write to a versioned row derives a fresh
/// tag by hashing the row key with a store-wide sequence number.
///
/// # Thread Safety
///
/// The store is thread-safe; each operation takes the state lock once, so
/// individual calls are atomic with respect to each other.
///
/// # Example
///
/// ```rust
/// use workset_store::{MemoryStore, Store};
/// use workset_model::{EntityName, ValueMap};
///
/// let store = MemoryStore::new();
/// let authors = EntityName::new("authors");
/// let (id, token) = store
///     .insert(&authors, ValueMap::new().with("last_name", "Herbert"))
///     .unwrap();
/// assert!(id.is_persistent());
/// assert!(token.is_some());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                collections: HashMap::new(),
                next_key: 1,
                next_seq: 1,
            }),
        }
    }

    /// Registers a collection with explicit versioning.
    ///
    /// Collections touched by `insert` without prior registration default
    /// to [`Versioning::Enabled`].
    pub fn collection(&self, entity: &EntityName, versioning: Versioning) {
        let mut state = self.state.write();
        let collection = state
            .collections
            .entry(entity.as_str().to_owned())
            .or_default();
        collection.versioned = versioning == Versioning::Enabled;
    }

    /// Returns the number of rows in a collection.
    #[must_use]
    pub fn row_count(&self, entity: &EntityName) -> usize {
        self.state
            .read()
            .collections
            .get(entity.as_str())
            .map_or(0, |c| c.rows.len())
    }

    fn derive_tag(entity: &EntityName, key: u64, seq: u64) -> VersionTag {
        let mut hasher = Sha256::new();
        hasher.update(entity.as_str().as_bytes());
        hasher.update(key.to_be_bytes());
        hasher.update(seq.to_be_bytes());
        VersionTag::from_bytes(hasher.finalize().into())
    }

    fn require_key(entity: &EntityName, identity: Identity) -> StoreResult<u64> {
        identity
            .as_key()
            .ok_or_else(|| StoreError::missing_key(entity, identity))
    }
}

impl Store for MemoryStore {
    fn get(&self, entity: &EntityName, identity: Identity) -> StoreResult<EntitySnapshot> {
        let key = match identity.as_key() {
            Some(key) => key,
            // Local placeholders cannot name a stored row.
            None => return Err(StoreError::not_found(entity, identity)),
        };
        let state = self.state.read();
        state
            .collections
            .get(entity.as_str())
            .and_then(|c| c.rows.get(&key))
            .map(|row| EntitySnapshot::new(row.values.clone(), row.token))
            .ok_or_else(|| StoreError::not_found(entity, identity))
    }

    fn insert(
        &self,
        entity: &EntityName,
        values: ValueMap,
    ) -> StoreResult<(Identity, Option<VersionTag>)> {
        let mut state = self.state.write();
        let key = state.next_key;
        state.next_key += 1;
        let seq = state.next_seq;
        state.next_seq += 1;

        let collection = state
            .collections
            .entry(entity.as_str().to_owned())
            .or_insert_with(|| Collection {
                versioned: true,
                rows: BTreeMap::new(),
            });
        let token = collection
            .versioned
            .then(|| Self::derive_tag(entity, key, seq));
        collection.rows.insert(key, Row { values, token });
        Ok((Identity::Key(key), token))
    }

    fn update(
        &self,
        entity: &EntityName,
        identity: Identity,
        token: Option<&VersionTag>,
        changed: ValueMap,
    ) -> StoreResult<WriteOutcome> {
        let key = Self::require_key(entity, identity)?;
        let mut state = self.state.write();
        let seq = state.next_seq;
        let collection = state
            .collections
            .get_mut(entity.as_str())
            .ok_or_else(|| StoreError::not_found(entity, identity))?;
        let versioned = collection.versioned;
        let row = collection
            .rows
            .get_mut(&key)
            .ok_or_else(|| StoreError::not_found(entity, identity))?;

        if versioned && token != row.token.as_ref() {
            return Ok(WriteOutcome::Conflict {
                snapshot: EntitySnapshot::new(row.values.clone(), row.token),
            });
        }

        row.values.merge_from(&changed);
        let fresh = versioned.then(|| Self::derive_tag(entity, key, seq));
        row.token = fresh;
        state.next_seq += 1;
        Ok(WriteOutcome::Applied { token: fresh })
    }

    fn delete(
        &self,
        entity: &EntityName,
        identity: Identity,
        token: Option<&VersionTag>,
    ) -> StoreResult<WriteOutcome> {
        let key = Self::require_key(entity, identity)?;
        let mut state = self.state.write();
        let collection = state
            .collections
            .get_mut(entity.as_str())
            .ok_or_else(|| StoreError::not_found(entity, identity))?;
        let versioned = collection.versioned;
        let row = collection
            .rows
            .get(&key)
            .ok_or_else(|| StoreError::not_found(entity, identity))?;

        if versioned && token != row.token.as_ref() {
            return Ok(WriteOutcome::Conflict {
                snapshot: EntitySnapshot::new(row.values.clone(), row.token),
            });
        }

        collection.rows.remove(&key);
        Ok(WriteOutcome::Applied { token: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workset_model::PropertyValue;

    fn authors() -> EntityName {
        EntityName::new("authors")
    }

    #[test]
    fn insert_assigns_fresh_keys() {
        let store = MemoryStore::new();
        let (id1, _) = store.insert(&authors(), ValueMap::new()).unwrap();
        let (id2, _) = store.insert(&authors(), ValueMap::new()).unwrap();
        assert_ne!(id1, id2);
        assert!(id1.is_persistent());
        assert_eq!(store.row_count(&authors()), 2);
    }

    #[test]
    fn get_returns_inserted_values() {
        let store = MemoryStore::new();
        let values = ValueMap::new().with("last_name", "Herbert");
        let (id, token) = store.insert(&authors(), values.clone()).unwrap();

        let snap = store.get(&authors(), id).unwrap();
        assert_eq!(snap.values, values);
        assert_eq!(snap.token, token);
    }

    #[test]
    fn get_missing_row_is_not_found() {
        let store = MemoryStore::new();
        let result = store.get(&authors(), Identity::Key(99));
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn get_local_identity_is_not_found() {
        let store = MemoryStore::new();
        let result = store.get(&authors(), Identity::local());
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn update_with_matching_tag_applies_partially() {
        let store = MemoryStore::new();
        let values = ValueMap::new().with("first", "Frank").with("last", "Herbert");
        let (id, token) = store.insert(&authors(), values).unwrap();

        let outcome = store
            .update(
                &authors(),
                id,
                token.as_ref(),
                ValueMap::new().with("first", "F."),
            )
            .unwrap();
        assert!(!outcome.is_conflict());

        let snap = store.get(&authors(), id).unwrap();
        assert_eq!(snap.values.get("first"), Some(&PropertyValue::Text("F.".into())));
        // Untouched column survives the partial update.
        assert_eq!(
            snap.values.get("last"),
            Some(&PropertyValue::Text("Herbert".into()))
        );
    }

    #[test]
    fn update_with_stale_tag_conflicts_with_snapshot() {
        let store = MemoryStore::new();
        let (id, stale) = store
            .insert(&authors(), ValueMap::new().with("n", 1i64))
            .unwrap();

        // Another writer bumps the row.
        store
            .update(&authors(), id, stale.as_ref(), ValueMap::new().with("n", 2i64))
            .unwrap();

        let outcome = store
            .update(&authors(), id, stale.as_ref(), ValueMap::new().with("n", 3i64))
            .unwrap();
        match outcome {
            WriteOutcome::Conflict { snapshot } => {
                assert_eq!(snapshot.values.get("n"), Some(&PropertyValue::Integer(2)));
                assert_ne!(snapshot.token, stale);
            }
            WriteOutcome::Applied { .. } => panic!("expected conflict"),
        }
        // The conflicting write must not have been applied.
        let snap = store.get(&authors(), id).unwrap();
        assert_eq!(snap.values.get("n"), Some(&PropertyValue::Integer(2)));
    }

    #[test]
    fn every_accepted_write_produces_a_fresh_tag() {
        let store = MemoryStore::new();
        let (id, t0) = store
            .insert(&authors(), ValueMap::new().with("n", 0i64))
            .unwrap();

        let t1 = match store
            .update(&authors(), id, t0.as_ref(), ValueMap::new().with("n", 1i64))
            .unwrap()
        {
            WriteOutcome::Applied { token } => token,
            WriteOutcome::Conflict { .. } => panic!("unexpected conflict"),
        };
        assert_ne!(t0, t1);
        assert!(t1.is_some());
    }

    #[test]
    fn unversioned_collection_never_conflicts() {
        let store = MemoryStore::new();
        let logs = EntityName::new("logs");
        store.collection(&logs, Versioning::Disabled);

        let (id, token) = store.insert(&logs, ValueMap::new().with("n", 1i64)).unwrap();
        assert!(token.is_none());

        // No tag supplied, no tag stored, write still lands.
        let outcome = store
            .update(&logs, id, None, ValueMap::new().with("n", 2i64))
            .unwrap();
        assert!(!outcome.is_conflict());

        let outcome = store.delete(&logs, id, None).unwrap();
        assert!(!outcome.is_conflict());
        assert_eq!(store.row_count(&logs), 0);
    }

    #[test]
    fn missing_tag_on_versioned_row_is_a_conflict() {
        let store = MemoryStore::new();
        let (id, _) = store.insert(&authors(), ValueMap::new()).unwrap();

        let outcome = store
            .update(&authors(), id, None, ValueMap::new().with("n", 1i64))
            .unwrap();
        assert!(outcome.is_conflict());
    }

    #[test]
    fn delete_with_matching_tag_removes_row() {
        let store = MemoryStore::new();
        let (id, token) = store.insert(&authors(), ValueMap::new()).unwrap();

        let outcome = store.delete(&authors(), id, token.as_ref()).unwrap();
        assert!(!outcome.is_conflict());
        assert!(matches!(
            store.get(&authors(), id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn delete_with_stale_tag_conflicts() {
        let store = MemoryStore::new();
        let (id, stale) = store
            .insert(&authors(), ValueMap::new().with("n", 1i64))
            .unwrap();
        store
            .update(&authors(), id, stale.as_ref(), ValueMap::new().with("n", 2i64))
            .unwrap();

        let outcome = store.delete(&authors(), id, stale.as_ref()).unwrap();
        assert!(outcome.is_conflict());
        assert_eq!(store.row_count(&authors()), 1);
    }

    #[test]
    fn update_missing_row_is_not_found() {
        let store = MemoryStore::new();
        store.insert(&authors(), ValueMap::new()).unwrap();
        let result = store.update(&authors(), Identity::Key(99), None, ValueMap::new());
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn writes_with_local_identity_are_rejected() {
        let store = MemoryStore::new();
        let local = Identity::local();
        assert!(matches!(
            store.update(&authors(), local, None, ValueMap::new()),
            Err(StoreError::MissingKey { .. })
        ));
        assert!(matches!(
            store.delete(&authors(), local, None),
            Err(StoreError::MissingKey { .. })
        ));
    }
}
