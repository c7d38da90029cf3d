//! Snapshot Service
//!
//! Caches the latest account, position and quote snapshots fetched from the
//! broker. A snapshot is stamped with the time its fetch started and only
//! replaces an older cached one, so the cache never moves backwards when
//! fetches overlap. Installed snapshots are published to observers; cached
//! snapshots themselves are never mutated.
//!
//! Read-through callers that find a resource stale queue on one fetch lock
//! per resource, so a burst of readers costs one broker call.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::application::ports::{BrokerError, BrokerPort, EventPublisherPort, StateEvent};
use crate::domain::execution::ExecutionOutcome;
use crate::domain::market::{AccountSnapshot, PositionSnapshot, QuoteSnapshot, Snapshot};
use crate::domain::shared::{Symbol, Timestamp};
use crate::observability::metrics;

/// Snapshot cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotConfig {
    /// Cached snapshots younger than this are served without a fetch.
    pub max_staleness: Duration,
    /// Upper bound on one broker read.
    pub fetch_timeout: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_staleness: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Snapshot fetch errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// Broker call failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Broker did not answer in time.
    #[error("broker did not answer within {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl SnapshotError {
    /// Whether a later attempt may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Broker(e) => e.is_transient(),
            Self::Timeout(_) => true,
        }
    }
}

#[derive(Debug, Default)]
struct Cache {
    account: Option<Arc<AccountSnapshot>>,
    positions: Option<Arc<PositionSnapshot>>,
    quotes: HashMap<Symbol, Arc<QuoteSnapshot>>,
}

#[derive(Debug, Default)]
struct FetchLocks {
    account: Mutex<()>,
    positions: Mutex<()>,
    quotes: Mutex<()>,
}

/// Read-through cache in front of the broker's read endpoints.
pub struct SnapshotService<B, E>
where
    B: BrokerPort,
    E: EventPublisherPort,
{
    broker: Arc<B>,
    publisher: Arc<E>,
    config: SnapshotConfig,
    cache: RwLock<Cache>,
    fetching: FetchLocks,
}

impl<B, E> SnapshotService<B, E>
where
    B: BrokerPort,
    E: EventPublisherPort,
{
    /// Create a service with an empty cache.
    pub fn new(broker: Arc<B>, publisher: Arc<E>, config: SnapshotConfig) -> Self {
        Self {
            broker,
            publisher,
            config,
            cache: RwLock::new(Cache::default()),
            fetching: FetchLocks::default(),
        }
    }

    /// Cache settings.
    #[must_use]
    pub const fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    // =========================================================================
    // Read-through accessors
    // =========================================================================

    /// Account snapshot, fetched if the cached one is missing or stale.
    ///
    /// On fetch failure a stale cached snapshot is returned instead of the error.
    pub async fn account(&self) -> Result<Arc<AccountSnapshot>, SnapshotError> {
        if let Some(cached) = self.fresh(self.cached_account()) {
            return Ok(cached);
        }

        let _fetching = self.fetching.account.lock().await;
        // Whoever held the lock may have just refreshed it.
        if let Some(cached) = self.fresh(self.cached_account()) {
            return Ok(cached);
        }

        match self.refresh_account().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => self.stale_or(self.cached_account(), e, "account"),
        }
    }

    /// Positions snapshot, fetched if the cached one is missing or stale.
    pub async fn positions(&self) -> Result<Arc<PositionSnapshot>, SnapshotError> {
        if let Some(cached) = self.fresh(self.cached_positions()) {
            return Ok(cached);
        }

        let _fetching = self.fetching.positions.lock().await;
        if let Some(cached) = self.fresh(self.cached_positions()) {
            return Ok(cached);
        }

        match self.refresh_positions().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => self.stale_or(self.cached_positions(), e, "positions"),
        }
    }

    /// Quote snapshots for `symbols`, in request order.
    ///
    /// Only missing or stale symbols are fetched. Symbols the venue does not
    /// know are omitted.
    pub async fn quotes(&self, symbols: &[Symbol]) -> Result<Vec<Arc<QuoteSnapshot>>, SnapshotError> {
        let symbols = dedup(symbols);
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        if !self.stale_quotes(&symbols).is_empty() {
            let _fetching = self.fetching.quotes.lock().await;
            let stale = self.stale_quotes(&symbols);

            if !stale.is_empty()
                && let Err(e) = self.refresh_quotes(&stale).await
            {
                let cache = self.cache.read();
                if !symbols.iter().any(|s| cache.quotes.contains_key(s)) {
                    return Err(e);
                }
                tracing::warn!(error = %e, symbols = stale.len(), "Quote fetch failed, serving cached quotes");
            }
        }

        let cache = self.cache.read();
        Ok(symbols
            .iter()
            .filter_map(|s| cache.quotes.get(s).cloned())
            .collect())
    }

    // =========================================================================
    // Unconditional refresh (used by jobs)
    // =========================================================================

    /// Fetch, store and publish the account.
    ///
    /// Returns the cached snapshot, which is a newer one than this fetch if
    /// an overlapping fetch started later and finished first.
    pub async fn refresh_account(&self) -> Result<Arc<AccountSnapshot>, SnapshotError> {
        let started = Timestamp::now();
        let account = self.fetch("account", self.broker.get_account()).await?;
        let fresh = Arc::new(Snapshot::at(account, started));

        let (current, installed) = install(&mut self.cache.write().account, fresh);
        if installed {
            self.publisher.publish(StateEvent::Account(Arc::clone(&current)));
        } else {
            tracing::debug!("Account fetch superseded by a newer one");
        }
        Ok(current)
    }

    /// Fetch, store and publish positions.
    pub async fn refresh_positions(&self) -> Result<Arc<PositionSnapshot>, SnapshotError> {
        let started = Timestamp::now();
        let positions = self.fetch("positions", self.broker.get_positions()).await?;
        let fresh = Arc::new(Snapshot::at(positions, started));

        let (current, installed) = install(&mut self.cache.write().positions, fresh);
        if installed {
            self.publisher
                .publish(StateEvent::Positions(Arc::clone(&current)));
        } else {
            tracing::debug!("Positions fetch superseded by a newer one");
        }
        Ok(current)
    }

    /// Fetch, store and publish quotes for `symbols`. Only quotes that
    /// replaced an older cached one are published.
    pub async fn refresh_quotes(&self, symbols: &[Symbol]) -> Result<Vec<Arc<QuoteSnapshot>>, SnapshotError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let started = Timestamp::now();
        let quotes = self.fetch("quotes", self.broker.get_quotes(symbols)).await?;

        let mut current = Vec::with_capacity(quotes.len());
        let mut installed = Vec::new();
        {
            let mut cache = self.cache.write();
            for quote in quotes {
                let fresh = Arc::new(Snapshot::at(quote, started));
                if let Some(cached) = cache.quotes.get(&fresh.data.symbol)
                    && !fresh.supersedes(Some(&**cached))
                {
                    current.push(Arc::clone(cached));
                    continue;
                }
                cache
                    .quotes
                    .insert(fresh.data.symbol.clone(), Arc::clone(&fresh));
                installed.push(Arc::clone(&fresh));
                current.push(fresh);
            }
        }

        if !installed.is_empty() {
            self.publisher.publish(StateEvent::Quotes(installed));
        }
        Ok(current)
    }

    /// Refresh account and positions after an execution that reached the venue.
    pub async fn on_execution(&self, outcome: &ExecutionOutcome) {
        if !outcome.touched_venue() {
            return;
        }

        let (account, positions) = tokio::join!(self.refresh_account(), self.refresh_positions());
        if let Err(e) = account {
            tracing::warn!(request_id = %outcome.request_id, error = %e, "Post-execution account refresh failed");
        }
        if let Err(e) = positions {
            tracing::warn!(request_id = %outcome.request_id, error = %e, "Post-execution positions refresh failed");
        }
    }

    // =========================================================================
    // Cache accessors
    // =========================================================================

    /// Cached account snapshot, whatever its age.
    #[must_use]
    pub fn cached_account(&self) -> Option<Arc<AccountSnapshot>> {
        self.cache.read().account.clone()
    }

    /// Cached positions snapshot, whatever its age.
    #[must_use]
    pub fn cached_positions(&self) -> Option<Arc<PositionSnapshot>> {
        self.cache.read().positions.clone()
    }

    /// All cached quote snapshots, sorted by symbol.
    #[must_use]
    pub fn cached_quotes(&self) -> Vec<Arc<QuoteSnapshot>> {
        let mut quotes: Vec<_> = self.cache.read().quotes.values().cloned().collect();
        quotes.sort_by(|a, b| a.data.symbol.cmp(&b.data.symbol));
        quotes
    }

    /// Symbols of currently held positions, from the cache.
    #[must_use]
    pub fn held_symbols(&self) -> Vec<Symbol> {
        self.cache
            .read()
            .positions
            .as_ref()
            .map(|p| p.data.iter().map(|pos| pos.symbol.clone()).collect())
            .unwrap_or_default()
    }

    fn fresh<T>(&self, cached: Option<Arc<Snapshot<T>>>) -> Option<Arc<Snapshot<T>>> {
        cached.filter(|c| c.is_fresh(Timestamp::now(), self.config.max_staleness))
    }

    fn stale_quotes(&self, symbols: &[Symbol]) -> Vec<Symbol> {
        let now = Timestamp::now();
        let cache = self.cache.read();
        symbols
            .iter()
            .filter(|s| {
                cache
                    .quotes
                    .get(*s)
                    .is_none_or(|q| !q.is_fresh(now, self.config.max_staleness))
            })
            .cloned()
            .collect()
    }

    fn stale_or<T>(
        &self,
        cached: Option<Arc<T>>,
        error: SnapshotError,
        what: &'static str,
    ) -> Result<Arc<T>, SnapshotError> {
        match cached {
            Some(stale) => {
                tracing::warn!(error = %error, what, "Fetch failed, serving stale snapshot");
                Ok(stale)
            }
            None => Err(error),
        }
    }

    async fn fetch<T>(
        &self,
        what: &'static str,
        call: impl Future<Output = Result<T, BrokerError>>,
    ) -> Result<T, SnapshotError> {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.config.fetch_timeout, call).await {
            Ok(result) => result.map_err(SnapshotError::from),
            Err(_) => Err(SnapshotError::Timeout(self.config.fetch_timeout)),
        };

        metrics::record_snapshot_fetch(
            self.broker.name(),
            what,
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        if let Err(e) = &result {
            tracing::debug!(what, error = %e, "Snapshot fetch failed");
        }
        result
    }
}

/// Store `fresh` unless `slot` holds a newer snapshot. Returns the snapshot
/// now cached and whether it is `fresh`.
fn install<T>(
    slot: &mut Option<Arc<Snapshot<T>>>,
    fresh: Arc<Snapshot<T>>,
) -> (Arc<Snapshot<T>>, bool) {
    if let Some(current) = slot.as_ref()
        && !fresh.supersedes(Some(&**current))
    {
        return (Arc::clone(current), false);
    }
    *slot = Some(Arc::clone(&fresh));
    (fresh, true)
}

fn dedup(symbols: &[Symbol]) -> Vec<Symbol> {
    let mut seen = std::collections::HashSet::with_capacity(symbols.len());
    symbols
        .iter()
        .filter(|s| seen.insert((*s).clone()))
        .cloned()
        .collect()
}
