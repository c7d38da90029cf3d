//! Built-in jobs.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{JobError, JobHandler};
use crate::application::ports::{BrokerPort, EventPublisherPort};
use crate::application::services::{SnapshotError, SnapshotService};
use crate::domain::idempotency::LedgerStore;
use crate::domain::shared::{Symbol, Timestamp};
use crate::observability::metrics;

/// Name of the quote refresh job.
pub const QUOTE_REFRESH: &str = "quote-refresh";
/// Name of the account refresh job.
pub const ACCOUNT_REFRESH: &str = "account-refresh";
/// Name of the ledger sweep job.
pub const LEDGER_SWEEP: &str = "ledger-sweep";
/// Name of the daily account summary job.
pub const DAILY_ACCOUNT_SUMMARY: &str = "daily-account-summary";

impl From<SnapshotError> for JobError {
    fn from(e: SnapshotError) -> Self {
        if e.is_transient() {
            Self::Transient(e.to_string())
        } else {
            Self::Fatal(e.to_string())
        }
    }
}

/// Refreshes quotes for the watchlist plus every held symbol.
pub struct QuoteRefreshJob<B: BrokerPort, E: EventPublisherPort> {
    snapshots: Arc<SnapshotService<B, E>>,
    watchlist: Vec<Symbol>,
}

impl<B: BrokerPort, E: EventPublisherPort> QuoteRefreshJob<B, E> {
    /// Create the job.
    pub const fn new(snapshots: Arc<SnapshotService<B, E>>, watchlist: Vec<Symbol>) -> Self {
        Self {
            snapshots,
            watchlist,
        }
    }

    fn symbols(&self) -> Vec<Symbol> {
        self.watchlist
            .iter()
            .cloned()
            .chain(self.snapshots.held_symbols())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[async_trait]
impl<B: BrokerPort, E: EventPublisherPort> JobHandler for QuoteRefreshJob<B, E> {
    async fn run(&self) -> Result<(), JobError> {
        let symbols = self.symbols();
        if symbols.is_empty() {
            return Ok(());
        }

        let quotes = self.snapshots.refresh_quotes(&symbols).await?;
        tracing::debug!(requested = symbols.len(), received = quotes.len(), "Quotes refreshed");
        Ok(())
    }
}

/// Refreshes the account and positions snapshots.
pub struct AccountRefreshJob<B: BrokerPort, E: EventPublisherPort> {
    snapshots: Arc<SnapshotService<B, E>>,
}

impl<B: BrokerPort, E: EventPublisherPort> AccountRefreshJob<B, E> {
    /// Create the job.
    pub const fn new(snapshots: Arc<SnapshotService<B, E>>) -> Self {
        Self { snapshots }
    }
}

#[async_trait]
impl<B: BrokerPort, E: EventPublisherPort> JobHandler for AccountRefreshJob<B, E> {
    async fn run(&self) -> Result<(), JobError> {
        let (account, positions) = tokio::join!(
            self.snapshots.refresh_account(),
            self.snapshots.refresh_positions()
        );
        account?;
        positions?;
        Ok(())
    }
}

/// Evicts expired idempotency ledger entries.
pub struct LedgerSweepJob<L: LedgerStore> {
    ledger: Arc<L>,
}

impl<L: LedgerStore> LedgerSweepJob<L> {
    /// Create the job.
    pub const fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl<L: LedgerStore> JobHandler for LedgerSweepJob<L> {
    async fn run(&self) -> Result<(), JobError> {
        let removed = self.ledger.evict_expired(Timestamp::now());
        let stats = self.ledger.stats();
        metrics::set_ledger_size(stats.total());

        if removed > 0 {
            tracing::info!(
                removed,
                pending = stats.pending,
                completed = stats.completed,
                failed = stats.failed,
                "Ledger sweep evicted entries"
            );
        }
        Ok(())
    }
}

/// End-of-day routine: refresh account and positions, then log a summary.
pub struct DailyAccountSummaryJob<B: BrokerPort, E: EventPublisherPort> {
    snapshots: Arc<SnapshotService<B, E>>,
}

impl<B: BrokerPort, E: EventPublisherPort> DailyAccountSummaryJob<B, E> {
    /// Create the job.
    pub const fn new(snapshots: Arc<SnapshotService<B, E>>) -> Self {
        Self { snapshots }
    }
}

#[async_trait]
impl<B: BrokerPort, E: EventPublisherPort> JobHandler for DailyAccountSummaryJob<B, E> {
    async fn run(&self) -> Result<(), JobError> {
        let account = self.snapshots.refresh_account().await?;
        let positions = self.snapshots.refresh_positions().await?;

        let unrealized: Decimal = positions.data.iter().map(|p| p.unrealized_pl).sum();
        let exposure: Decimal = positions.data.iter().map(|p| p.market_value.abs()).sum();

        tracing::info!(
            account_id = %account.data.account_id,
            status = %account.data.status,
            equity = %account.data.equity,
            cash = %account.data.cash,
            buying_power = %account.data.buying_power,
            positions = positions.data.len(),
            exposure = %exposure,
            unrealized_pl = %unrealized,
            daytrade_count = account.data.daytrade_count,
            "Daily account summary"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{BrokerError, NoOpEventPublisher};
    use crate::application::services::SnapshotConfig;
    use crate::domain::idempotency::Reservation;
    use crate::domain::execution::ExecutionOutcome;
    use crate::domain::shared::RequestId;
    use crate::infrastructure::broker::simulated::{SimulatedBroker, SimulatedBrokerConfig};
    use crate::infrastructure::persistence::{InMemoryLedger, LedgerConfig};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn snapshots(broker: SimulatedBroker) -> Arc<SnapshotService<SimulatedBroker, NoOpEventPublisher>> {
        Arc::new(SnapshotService::new(
            Arc::new(broker),
            Arc::new(NoOpEventPublisher),
            SnapshotConfig::default(),
        ))
    }

    #[tokio::test]
    async fn quote_refresh_covers_watchlist_and_held_symbols() {
        let broker = SimulatedBroker::new(SimulatedBrokerConfig::default())
            .with_position(Symbol::new("AAPL"), dec!(10), dec!(190));
        let snapshots = snapshots(broker);
        snapshots.refresh_positions().await.unwrap();

        let job = QuoteRefreshJob::new(Arc::clone(&snapshots), vec![Symbol::new("SPY"), Symbol::new("AAPL")]);
        job.run().await.unwrap();

        let cached: Vec<_> = snapshots
            .cached_quotes()
            .iter()
            .map(|q| q.data.symbol.as_str().to_string())
            .collect();
        assert_eq!(cached, vec!["AAPL", "SPY"]);
    }

    #[tokio::test]
    async fn quote_refresh_with_nothing_to_watch_is_a_no_op() {
        let snapshots = snapshots(SimulatedBroker::default());
        QuoteRefreshJob::new(Arc::clone(&snapshots), vec![]).run().await.unwrap();
        assert!(snapshots.cached_quotes().is_empty());
    }

    #[tokio::test]
    async fn account_refresh_maps_transient_errors() {
        let broker = SimulatedBroker::default();
        broker.set_failing(true);
        let job = AccountRefreshJob::new(snapshots(broker));

        let Err(err) = job.run().await else {
            panic!("expected failure while the broker is down");
        };
        assert!(matches!(err, JobError::Transient(_)));
    }

    #[test]
    fn non_transient_snapshot_errors_are_fatal() {
        let err: JobError = SnapshotError::Broker(BrokerError::AuthenticationFailed).into();
        assert!(matches!(err, JobError::Fatal(_)));

        let err: JobError = SnapshotError::Timeout(Duration::from_secs(1)).into();
        assert!(matches!(err, JobError::Transient(_)));
    }

    #[tokio::test]
    async fn ledger_sweep_evicts_expired_entries() {
        let ledger = Arc::new(InMemoryLedger::new(LedgerConfig {
            retention: Duration::ZERO,
            max_entries: None,
            shards: 2,
        }));
        let id = RequestId::new("old");
        assert_eq!(ledger.lookup_or_reserve(&id), Reservation::Fresh);
        ledger
            .complete(&id, Arc::new(ExecutionOutcome::aborted(id.clone(), true, "x")))
            .unwrap();

        LedgerSweepJob::new(Arc::clone(&ledger)).run().await.unwrap();
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn daily_summary_refreshes_snapshots() {
        let snapshots = snapshots(SimulatedBroker::default());
        DailyAccountSummaryJob::new(Arc::clone(&snapshots)).run().await.unwrap();

        assert!(snapshots.cached_account().is_some());
        assert!(snapshots.cached_positions().is_some());
    }
}
