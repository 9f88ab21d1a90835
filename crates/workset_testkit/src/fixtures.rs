//! Session fixtures and scenario helpers.
//!
//! Provides convenience builders for sessions over a shared in-memory
//! store, plus a small library domain (authors, books, contracts) used
//! throughout the test suites.

use std::sync::Arc;
use workset_core::{EntityState, GraphNode, Session};
use workset_model::{EntityName, Identity, PropertyValue, ValueMap};
use workset_store::{ManualClock, MemoryStore, Store};

/// A session bound to its own store and settable clock.
pub struct TestSession {
    /// The session under test.
    pub session: Session,
    /// The shared store, for seeding rows and asserting outcomes.
    pub store: Arc<MemoryStore>,
    /// The clock the session stamps audit times from.
    pub clock: Arc<ManualClock>,
}

impl TestSession {
    /// Creates a session over a fresh store.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new());
        let session = Session::new(store.clone(), clock.clone());
        Self {
            session,
            store,
            clock,
        }
    }

    /// Opens another independent session over the same store and clock.
    ///
    /// The sibling starts empty; use it to play the concurrent writer in
    /// conflict scenarios.
    #[must_use]
    pub fn sibling(&self) -> Session {
        Session::new(self.store.clone(), self.clock.clone())
    }
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a session over a fresh in-memory store.
pub fn with_session<F, R>(f: F) -> R
where
    F: FnOnce(&mut Session, &Arc<MemoryStore>) -> R,
{
    let mut fixture = TestSession::new();
    f(&mut fixture.session, &fixture.store)
}

/// The author collection name.
#[must_use]
pub fn authors() -> EntityName {
    EntityName::new("authors")
}

/// The book collection name.
#[must_use]
pub fn books() -> EntityName {
    EntityName::new("books")
}

/// The contract collection name (one collection, discriminated variants).
#[must_use]
pub fn contracts() -> EntityName {
    EntityName::new("contracts")
}

/// Builds author property values.
#[must_use]
pub fn author_values(first: &str, last: &str) -> ValueMap {
    ValueMap::new().with("first_name", first).with("last_name", last)
}

/// Builds book property values.
#[must_use]
pub fn book_values(title: &str, isbn: &str) -> ValueMap {
    ValueMap::new().with("title", title).with("isbn", isbn)
}

/// Builds contract values for one discriminated variant.
///
/// The variant tag rides along as the `contract_type` property; variant
/// columns are just properties the other variants never set.
#[must_use]
pub fn contract_values(kind: &str, months: i64, extra: (&str, PropertyValue)) -> ValueMap {
    ValueMap::new()
        .with("contract_type", kind)
        .with("months", months)
        .with(extra.0, extra.1)
}

/// Builds an author graph: a root with two not-yet-persisted books.
///
/// The author carries a store key; the books have placeholder identities,
/// so the default walk policy classifies them as `Added`.
#[must_use]
pub fn author_with_new_books(author_key: u64) -> Arc<GraphNode> {
    let author = GraphNode::with_key(authors(), author_key, author_values("Frank", "Herbert"));
    let dune = GraphNode::new(books(), book_values("Dune", "978-0441013593"));
    let messiah = GraphNode::new(books(), book_values("Dune Messiah", "978-0593098233"));
    author.link(&dune);
    author.link(&messiah);
    author
}

/// Scenario helpers for multi-session conflict tests.
pub mod scenarios {
    use super::*;

    /// Seeds a row and returns two sessions both tracking it `Unchanged`,
    /// plus the row's identity.
    ///
    /// Commit a change through one session to leave the other holding a
    /// stale token.
    #[must_use]
    pub fn contended_row(values: ValueMap) -> (TestSession, Session, Identity) {
        let mut fixture = TestSession::new();
        let (id, _) = fixture
            .store
            .insert(&authors(), values)
            .expect("seed insert failed");

        fixture
            .session
            .fetch(&authors(), id)
            .expect("first fetch failed");
        let mut rival = fixture.sibling();
        rival.fetch(&authors(), id).expect("rival fetch failed");
        (fixture, rival, id)
    }

    /// Makes `rival` win the race on the given property.
    pub fn rival_overwrites(rival: &mut Session, id: Identity, name: &str, value: PropertyValue) {
        rival
            .set_value(&authors(), id, name, value)
            .expect("rival edit failed");
        rival
            .set_state(&authors(), id, EntityState::Modified)
            .expect("rival state change failed");
        rival
            .commit(
                workset_core::RetryStrategy::ClientWins,
                workset_core::RetryBudget::Attempts(1),
            )
            .expect("rival commit failed");
    }
}
