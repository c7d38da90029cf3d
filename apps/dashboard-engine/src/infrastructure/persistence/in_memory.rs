//! In-memory idempotency ledger.
//!
//! Keys are spread over a fixed number of shards, each behind its own lock,
//! so reservations for different request IDs rarely contend. A reservation
//! is a single check-and-set under the owning shard's lock.

use std::collections::HashMap;
use std::hash::{BuildHasher, RandomState};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::domain::execution::ExecutionOutcome;
use crate::domain::idempotency::{
    LedgerEntry, LedgerError, LedgerState, LedgerStats, LedgerStore, Reservation,
};
use crate::domain::shared::{RequestId, Timestamp};

/// Ledger retention settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// How long terminal entries are kept after completion.
    pub retention: Duration,
    /// Cap on total entries. Terminal entries are evicted oldest-first
    /// beyond it; pending entries are never evicted.
    pub max_entries: Option<usize>,
    /// Number of lock shards.
    pub shards: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(24 * 60 * 60),
            max_entries: Some(100_000),
            shards: 16,
        }
    }
}

type Shard = Mutex<HashMap<RequestId, LedgerEntry>>;

/// Sharded in-memory implementation of [`LedgerStore`].
#[derive(Debug)]
pub struct InMemoryLedger {
    shards: Vec<Shard>,
    hasher: RandomState,
    config: LedgerConfig,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl InMemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new(config: LedgerConfig) -> Self {
        let shards = (0..config.shards.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect();

        Self {
            shards,
            hasher: RandomState::new(),
            config,
        }
    }

    /// Retention settings.
    #[must_use]
    pub const fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn shard(&self, request_id: &RequestId) -> &Shard {
        let hash = self.hasher.hash_one(request_id);
        #[allow(clippy::cast_possible_truncation)]
        let index = (hash % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    /// Remove terminal entries beyond `max_entries`, oldest completion first.
    fn evict_over_capacity(&self, max_entries: usize) -> usize {
        let total = self.len();
        if total <= max_entries {
            return 0;
        }

        let mut terminal: Vec<(Timestamp, RequestId)> = self
            .shards
            .iter()
            .flat_map(|shard| {
                shard
                    .lock()
                    .values()
                    .filter_map(|e| e.completed_at.map(|at| (at, e.request_id.clone())))
                    .collect::<Vec<_>>()
            })
            .collect();
        terminal.sort();

        let mut removed = 0;
        for (_, request_id) in terminal.into_iter().take(total - max_entries) {
            let mut shard = self.shard(&request_id).lock();
            if shard
                .get(&request_id)
                .is_some_and(|entry| entry.state.is_terminal())
            {
                shard.remove(&request_id);
                removed += 1;
            }
        }
        removed
    }
}

impl LedgerStore for InMemoryLedger {
    fn lookup_or_reserve(&self, request_id: &RequestId) -> Reservation {
        let mut shard = self.shard(request_id).lock();

        match shard.get(request_id) {
            None => {
                shard.insert(request_id.clone(), LedgerEntry::reserve(request_id.clone()));
                Reservation::Fresh
            }
            Some(entry) => match (entry.state, &entry.outcome) {
                (LedgerState::Completed, Some(outcome)) => Reservation::Completed(Arc::clone(outcome)),
                (LedgerState::Failed, Some(outcome)) => Reservation::Failed(Arc::clone(outcome)),
                _ => Reservation::Pending,
            },
        }
    }

    fn complete(
        &self,
        request_id: &RequestId,
        outcome: Arc<ExecutionOutcome>,
    ) -> Result<LedgerState, LedgerError> {
        let mut shard = self.shard(request_id).lock();

        let entry = shard
            .get_mut(request_id)
            .ok_or_else(|| LedgerError::UnknownRequest(request_id.clone()))?;

        entry
            .complete(outcome)
            .map_err(|_| LedgerError::AlreadyTerminal {
                request_id: request_id.clone(),
                state: entry.state,
            })
    }

    fn get(&self, request_id: &RequestId) -> Option<LedgerEntry> {
        self.shard(request_id).lock().get(request_id).cloned()
    }

    fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    fn stats(&self) -> LedgerStats {
        let mut stats = LedgerStats::default();
        for shard in &self.shards {
            for entry in shard.lock().values() {
                match entry.state {
                    LedgerState::Pending => stats.pending += 1,
                    LedgerState::Completed => stats.completed += 1,
                    LedgerState::Failed => stats.failed += 1,
                }
            }
        }
        stats
    }

    fn evict_expired(&self, now: Timestamp) -> usize {
        let retention = self.config.retention;
        let mut removed = 0;

        for shard in &self.shards {
            let mut shard = shard.lock();
            let before = shard.len();
            shard.retain(|_, entry| !entry.is_expired(now, retention));
            removed += before - shard.len();
        }

        if let Some(max_entries) = self.config.max_entries {
            removed += self.evict_over_capacity(max_entries);
        }

        if removed > 0 {
            tracing::debug!(removed, remaining = self.len(), "Evicted ledger entries");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::{OrderResult, OrderResultStatus, OrderSide, OrderSpec};
    use rust_decimal_macros::dec;

    fn completed(id: &str) -> Arc<ExecutionOutcome> {
        let request_id = RequestId::new(id);
        let order = OrderSpec::market("SPY", OrderSide::Buy, dec!(1));
        let result =
            OrderResult::pending_for(&request_id, 0, &order, OrderResultStatus::SimulatedFill);
        Arc::new(ExecutionOutcome::from_results(
            request_id,
            true,
            vec![result],
            Timestamp::now(),
        ))
    }

    fn failed(id: &str) -> Arc<ExecutionOutcome> {
        Arc::new(ExecutionOutcome::aborted(RequestId::new(id), false, "boom"))
    }

    #[test]
    fn reserve_then_pending_then_terminal() {
        let ledger = InMemoryLedger::default();
        let id = RequestId::new("r1");

        assert_eq!(ledger.lookup_or_reserve(&id), Reservation::Fresh);
        assert_eq!(ledger.lookup_or_reserve(&id), Reservation::Pending);

        let outcome = completed("r1");
        assert_eq!(
            ledger.complete(&id, Arc::clone(&outcome)),
            Ok(LedgerState::Completed)
        );

        let Reservation::Completed(stored) = ledger.lookup_or_reserve(&id) else {
            panic!("expected a completed reservation");
        };
        assert!(Arc::ptr_eq(&stored, &outcome));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn failed_outcome_lands_in_failed_state() {
        let ledger = InMemoryLedger::default();
        let id = RequestId::new("r2");
        ledger.lookup_or_reserve(&id);

        assert_eq!(ledger.complete(&id, failed("r2")), Ok(LedgerState::Failed));
        assert!(matches!(ledger.lookup_or_reserve(&id), Reservation::Failed(_)));
    }

    #[test]
    fn complete_twice_is_rejected_and_keeps_first_outcome() {
        let ledger = InMemoryLedger::default();
        let id = RequestId::new("r3");
        ledger.lookup_or_reserve(&id);

        let first = completed("r3");
        ledger.complete(&id, Arc::clone(&first)).unwrap();

        let Err(err) = ledger.complete(&id, failed("r3")) else {
            panic!("second completion must fail");
        };
        assert_eq!(
            err,
            LedgerError::AlreadyTerminal {
                request_id: id.clone(),
                state: LedgerState::Completed,
            }
        );
        assert_eq!(ledger.get(&id).unwrap().outcome, Some(first));
    }

    #[test]
    fn complete_unknown_request_errors() {
        let ledger = InMemoryLedger::default();
        let id = RequestId::new("ghost");
        assert_eq!(
            ledger.complete(&id, completed("ghost")),
            Err(LedgerError::UnknownRequest(id))
        );
    }

    #[test]
    fn stats_count_by_state() {
        let ledger = InMemoryLedger::default();
        for id in ["a", "b", "c"] {
            ledger.lookup_or_reserve(&RequestId::new(id));
        }
        ledger.complete(&RequestId::new("a"), completed("a")).unwrap();
        ledger.complete(&RequestId::new("b"), failed("b")).unwrap();

        let stats = ledger.stats();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn eviction_honors_retention_and_spares_pending() {
        let ledger = InMemoryLedger::new(LedgerConfig {
            retention: Duration::from_secs(60),
            max_entries: None,
            shards: 4,
        });
        let done = RequestId::new("done");
        let open = RequestId::new("open");
        ledger.lookup_or_reserve(&done);
        ledger.lookup_or_reserve(&open);
        ledger.complete(&done, completed("done")).unwrap();

        assert_eq!(ledger.evict_expired(Timestamp::now()), 0);

        let later = Timestamp::now().saturating_add(Duration::from_secs(3600));
        assert_eq!(ledger.evict_expired(later), 1);
        assert!(ledger.get(&done).is_none());
        assert_eq!(ledger.get(&open).unwrap().state, LedgerState::Pending);

        // An evicted ID is fresh again.
        assert_eq!(ledger.lookup_or_reserve(&done), Reservation::Fresh);
    }

    #[test]
    fn capacity_eviction_removes_oldest_terminal_first() {
        let ledger = InMemoryLedger::new(LedgerConfig {
            retention: Duration::from_secs(3600),
            max_entries: Some(2),
            shards: 2,
        });

        for id in ["old", "mid", "new"] {
            let request_id = RequestId::new(id);
            ledger.lookup_or_reserve(&request_id);
            ledger.complete(&request_id, completed(id)).unwrap();
            std::thread::sleep(Duration::from_millis(2));
        }
        ledger.lookup_or_reserve(&RequestId::new("inflight"));

        assert_eq!(ledger.evict_expired(Timestamp::now()), 2);
        assert!(ledger.get(&RequestId::new("old")).is_none());
        assert!(ledger.get(&RequestId::new("mid")).is_none());
        assert!(ledger.get(&RequestId::new("new")).is_some());
        assert!(ledger.get(&RequestId::new("inflight")).is_some());
    }

    #[test]
    fn concurrent_reservations_produce_one_fresh() {
        let ledger = Arc::new(InMemoryLedger::default());
        let id = RequestId::new("contended");

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let id = id.clone();
                std::thread::spawn(move || ledger.lookup_or_reserve(&id))
            })
            .collect();

        let fresh = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| *r == Reservation::Fresh)
            .count();

        assert_eq!(fresh, 1);
        assert_eq!(ledger.len(), 1);
    }
}
