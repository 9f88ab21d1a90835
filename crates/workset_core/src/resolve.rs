//! Conflict resolution strategies and the commit retry loop.

use crate::commit::{CommitOutcome, CommitPipeline, CommitReceipt, ConflictSet};
use crate::error::{TrackError, TrackResult};
use crate::tracker::EntityTracker;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use workset_store::{Clock, Store};

/// How conflicted entities are resolved between commit attempts.
///
/// The strategy is chosen per commit invocation, not per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// The store's row replaces the local record entirely; the local change
    /// is abandoned and the retried commit is a no-op for that entity.
    DatabaseWins,
    /// Only the record's store-facing half is refreshed, so the retried
    /// commit reapplies the local edits over the store's concurrent change.
    ClientWins,
    /// The store's row is taken as the base and exactly the flagged
    /// properties are overlaid with their local values.
    MergeClientModifies,
}

/// How many resolution rounds a commit may spend before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBudget {
    /// Retry until the commit applies.
    ///
    /// Under sustained contention this loop has no upper bound; callers
    /// who cannot tolerate that must pick [`RetryBudget::Attempts`].
    Unbounded,
    /// Give up after this many resolution rounds.
    Attempts(u32),
}

impl RetryBudget {
    fn allows_retry(&self, used: u32) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Attempts(limit) => used < *limit,
        }
    }
}

/// Wraps the commit pipeline in a conflict-resolving retry loop.
///
/// Each resolver call is bound to one tracker and runs attempts
/// sequentially: commit, and on conflict resolve every conflicted record
/// with the chosen strategy, then commit again. The loop ends when an
/// attempt applies, the budget runs out, the store fails fatally, or the
/// caller cancels.
pub struct ConcurrencyResolver<'a> {
    store: &'a dyn Store,
    clock: &'a dyn Clock,
}

impl<'a> ConcurrencyResolver<'a> {
    /// Creates a resolver over a store and a clock.
    pub fn new(store: &'a dyn Store, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Commits with retries until success or an exhausted budget.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::RetryBudgetExhausted`] wrapping the final
    /// conflict set when the budget runs out, or any fatal store error.
    pub fn commit(
        &self,
        tracker: &mut EntityTracker,
        strategy: RetryStrategy,
        budget: RetryBudget,
    ) -> TrackResult<CommitReceipt> {
        let never = AtomicBool::new(false);
        self.commit_with_cancel(tracker, strategy, budget, &never)
    }

    /// Commits with retries, checking `cancel` before every attempt.
    ///
    /// Cancellation is observed at round boundaries, before dispatch
    /// begins; an attempt already dispatching runs to completion.
    ///
    /// # Errors
    ///
    /// As [`ConcurrencyResolver::commit`], plus [`TrackError::Cancelled`]
    /// when the flag is raised.
    pub fn commit_with_cancel(
        &self,
        tracker: &mut EntityTracker,
        strategy: RetryStrategy,
        budget: RetryBudget,
        cancel: &AtomicBool,
    ) -> TrackResult<CommitReceipt> {
        let pipeline = CommitPipeline::new(self.store, self.clock);
        let mut rounds = 0u32;
        loop {
            if cancel.load(Ordering::SeqCst) {
                return Err(TrackError::Cancelled);
            }
            match pipeline.commit_once(tracker)? {
                CommitOutcome::Applied(receipt) => {
                    if rounds > 0 {
                        debug!(rounds, "commit applied after conflict resolution");
                    }
                    return Ok(receipt);
                }
                CommitOutcome::Conflicted(conflicts) => {
                    if !budget.allows_retry(rounds) {
                        warn!(
                            rounds,
                            conflicts = conflicts.len(),
                            "retry budget exhausted"
                        );
                        return Err(TrackError::RetryBudgetExhausted {
                            attempts: rounds,
                            conflicts,
                        });
                    }
                    rounds += 1;
                    debug!(
                        round = rounds,
                        conflicts = conflicts.len(),
                        ?strategy,
                        "resolving conflicts"
                    );
                    Self::apply_strategy(tracker, strategy, &conflicts);
                }
            }
        }
    }

    fn apply_strategy(tracker: &mut EntityTracker, strategy: RetryStrategy, conflicts: &ConflictSet) {
        for entry in conflicts.iter() {
            let Some(record) = tracker.get_mut(&entry.entity, entry.identity) else {
                continue;
            };
            match strategy {
                RetryStrategy::DatabaseWins => record.resolve_database_wins(&entry.snapshot),
                RetryStrategy::ClientWins => record.resolve_client_wins(&entry.snapshot),
                RetryStrategy::MergeClientModifies => record.resolve_merge(&entry.snapshot),
            }
        }
    }
}
