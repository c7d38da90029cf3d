//! Dispatch Execution Use Case
//!
//! Validates an execution request, enforces the trading mode, reserves the
//! request ID in the idempotency ledger and runs the broker calls on a
//! worker task. The ledger entry is always completed, even when the caller
//! goes away or the worker dies.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::application::dto::DispatchResponse;
use crate::application::ports::{
    AckStatus, BrokerError, BrokerPort, EventPublisherPort, StateEvent, SubmitOrderRequest,
};
use crate::domain::execution::{
    ExecutionOutcome, ExecutionRequest, OrderResult, OrderResultStatus, OrderSpec, TradingMode,
};
use crate::domain::idempotency::{LedgerError, LedgerStore, Reservation};
use crate::domain::shared::{DomainError, RequestId, Timestamp};
use crate::observability::metrics;

/// Dispatcher tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Upper bound on a single `submit_order` call.
    pub adapter_timeout: Duration,
    /// Mark remaining orders `skipped` after the first unsuccessful one.
    pub stop_on_first_failure: bool,
    /// Maximum requests talking to the broker at once.
    pub max_concurrent_executions: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            adapter_timeout: Duration::from_secs(10),
            stop_on_first_failure: false,
            max_concurrent_executions: 16,
        }
    }
}

/// Errors returned synchronously. None of these touch the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Malformed request.
    #[error("{0}")]
    Validation(#[from] DomainError),

    /// Trading-mode violation. Never retried.
    #[error("{0}")]
    Configuration(String),

    /// The supervising task died, typically during runtime shutdown. The
    /// ledger entry has already been completed as Failed.
    #[error("execution interrupted: {0}")]
    Internal(String),
}

/// Use case: execute each logical request at most once.
pub struct ExecutionDispatcher<B, L, E>
where
    B: BrokerPort,
    L: LedgerStore,
    E: EventPublisherPort,
{
    worker: ExecutionWorker<B, L, E>,
    mode: TradingMode,
}

impl<B, L, E> ExecutionDispatcher<B, L, E>
where
    B: BrokerPort + 'static,
    L: LedgerStore + 'static,
    E: EventPublisherPort + 'static,
{
    /// Create a dispatcher bound to one broker and one trading mode.
    pub fn new(
        broker: Arc<B>,
        ledger: Arc<L>,
        publisher: Arc<E>,
        mode: TradingMode,
        config: DispatcherConfig,
    ) -> Self {
        if !mode.permits(broker.venue()) {
            tracing::warn!(
                mode = %mode,
                venue = %broker.venue(),
                "Broker venue is not permitted in this trading mode; every order will be refused"
            );
        }

        Self {
            worker: ExecutionWorker {
                broker,
                ledger,
                publisher,
                config,
                permits: Arc::new(Semaphore::new(config.max_concurrent_executions.max(1))),
            },
            mode,
        }
    }

    /// Trading mode fixed at construction.
    #[must_use]
    pub const fn mode(&self) -> TradingMode {
        self.mode
    }

    /// Submit an execution request.
    ///
    /// Validation and mode checks fail synchronously without reserving. A
    /// fresh request runs on a worker task; the caller awaits its join
    /// handle without blocking a thread.
    #[tracing::instrument(skip_all, fields(request_id = %request.request_id, orders = request.orders.len(), dry_run = request.dry_run))]
    pub async fn submit(&self, request: ExecutionRequest) -> Result<DispatchResponse, DispatchError> {
        if let Err(e) = request.validate() {
            metrics::record_dispatch_rejection("validation");
            tracing::info!(error = %e, "Execution request failed validation");
            return Err(e.into());
        }

        if let Err(e) = self.enforce_trading_mode(&request) {
            metrics::record_dispatch_rejection("configuration");
            tracing::warn!(error = %e, mode = %self.mode, "Execution request refused by trading mode");
            return Err(e);
        }

        match self.worker.ledger.lookup_or_reserve(&request.request_id) {
            Reservation::Fresh => {}
            Reservation::Pending => {
                metrics::record_duplicate("pending");
                tracing::info!("Request already in flight");
                return Ok(DispatchResponse::pending(request.request_id));
            }
            Reservation::Completed(outcome) | Reservation::Failed(outcome) => {
                metrics::record_duplicate("terminal");
                tracing::info!(status = outcome.status.as_str(), "Duplicate request, returning prior outcome");
                return Ok(DispatchResponse::duplicate(outcome));
            }
        }

        let request_id = request.request_id.clone();
        let dry_run = request.dry_run;
        let worker = self.worker.clone();
        let supervisor = tokio::spawn(async move { worker.supervise(request).await });

        match supervisor.await {
            Ok(outcome) => Ok(DispatchResponse::accepted(outcome)),
            Err(e) => {
                tracing::error!(error = %e, "Execution supervisor aborted");
                self.worker.finish(Arc::new(ExecutionOutcome::aborted(
                    request_id,
                    dry_run,
                    "execution worker aborted",
                )));
                Err(DispatchError::Internal(e.to_string()))
            }
        }
    }

    /// Refuse any order that would reach a venue the mode forbids, or a
    /// venue other than the one the adapter is bound to.
    fn enforce_trading_mode(&self, request: &ExecutionRequest) -> Result<(), DispatchError> {
        let bound = self.worker.broker.venue();

        for (index, spec) in request.orders.iter().enumerate() {
            if let Some(target) = spec.venue
                && target != bound
            {
                return Err(DispatchError::Configuration(format!(
                    "orders[{index}] targets the {target} venue but the broker is bound to {bound}"
                )));
            }

            let target = spec.venue.unwrap_or(bound);
            if !self.mode.permits(target) {
                return Err(DispatchError::Configuration(format!(
                    "orders[{index}] targets the {target} venue while trading mode is {}",
                    self.mode
                )));
            }
        }

        Ok(())
    }
}

/// The part of the dispatcher that moves onto worker tasks.
struct ExecutionWorker<B, L, E> {
    broker: Arc<B>,
    ledger: Arc<L>,
    publisher: Arc<E>,
    config: DispatcherConfig,
    permits: Arc<Semaphore>,
}

impl<B, L, E> Clone for ExecutionWorker<B, L, E> {
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            ledger: Arc::clone(&self.ledger),
            publisher: Arc::clone(&self.publisher),
            config: self.config,
            permits: Arc::clone(&self.permits),
        }
    }
}

impl<B, L, E> ExecutionWorker<B, L, E>
where
    B: BrokerPort + 'static,
    L: LedgerStore + 'static,
    E: EventPublisherPort + 'static,
{
    /// Run the request on its own task and complete the ledger whatever happens to it.
    async fn supervise(self, request: ExecutionRequest) -> Arc<ExecutionOutcome> {
        let request_id = request.request_id.clone();
        let dry_run = request.dry_run;

        let runner = self.clone();
        let run = tokio::spawn(async move { runner.execute(request).await });

        let outcome = match run.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let reason = if e.is_panic() {
                    "execution worker panicked"
                } else {
                    "execution worker cancelled"
                };
                tracing::error!(request_id = %request_id, error = %e, reason, "Execution worker aborted");
                ExecutionOutcome::aborted(request_id, dry_run, reason)
            }
        };

        self.finish(Arc::new(outcome))
    }

    /// Execute all orders in input order.
    async fn execute(&self, request: ExecutionRequest) -> ExecutionOutcome {
        let started_at = Timestamp::now();

        if request.dry_run {
            let results = request
                .orders
                .iter()
                .enumerate()
                .map(|(index, spec)| simulate_fill(&request.request_id, index, spec))
                .collect();
            return ExecutionOutcome::from_results(request.request_id, true, results, started_at);
        }

        let Ok(_permit) = Arc::clone(&self.permits).acquire_owned().await else {
            return ExecutionOutcome::aborted(request.request_id, false, "dispatcher is shutting down");
        };

        let mut results = Vec::with_capacity(request.orders.len());
        let mut halted = false;

        for (index, spec) in request.orders.iter().enumerate() {
            if halted {
                results.push(
                    OrderResult::pending_for(&request.request_id, index, spec, OrderResultStatus::Skipped)
                        .with_reason("not submitted: an earlier order in the batch failed"),
                );
                continue;
            }

            let result = self.submit_one(&request.request_id, index, spec).await;
            if !result.status.is_success() && self.config.stop_on_first_failure {
                halted = true;
            }
            results.push(result);
        }

        ExecutionOutcome::from_results(request.request_id, false, results, started_at)
    }

    /// One adapter call under the per-order timeout. Never retried.
    async fn submit_one(&self, request_id: &RequestId, index: usize, spec: &OrderSpec) -> OrderResult {
        let venue_request = SubmitOrderRequest::from_spec(request_id, index, spec);
        let base = OrderResult::pending_for(request_id, index, spec, OrderResultStatus::Failed);
        let started = Instant::now();

        let submission = tokio::time::timeout(
            self.config.adapter_timeout,
            self.broker.submit_order(venue_request),
        )
        .await;

        let result = match submission {
            Ok(Ok(ack)) => {
                let (status, reason) = match ack.status {
                    AckStatus::Accepted => (OrderResultStatus::Accepted, None),
                    AckStatus::PartiallyFilled => (OrderResultStatus::PartiallyFilled, None),
                    AckStatus::Filled => (OrderResultStatus::Filled, None),
                    AckStatus::Canceled => (
                        OrderResultStatus::Rejected,
                        Some("venue canceled the order on acknowledgment".to_string()),
                    ),
                    AckStatus::Rejected => (
                        OrderResultStatus::Rejected,
                        Some("venue rejected the order on acknowledgment".to_string()),
                    ),
                };
                OrderResult {
                    status,
                    broker_order_id: Some(ack.broker_order_id),
                    filled_qty: ack.filled_qty,
                    avg_fill_price: ack.avg_fill_price,
                    reason,
                    ..base
                }
            }
            Ok(Err(e)) => match e {
                BrokerError::OrderRejected { reason } => OrderResult {
                    status: OrderResultStatus::Rejected,
                    reason: Some(reason),
                    ..base
                },
                other => base.with_reason(other.to_string()),
            },
            Err(_) => OrderResult {
                status: OrderResultStatus::TimedOut,
                reason: Some(format!(
                    "adapter call timed out after {}ms",
                    self.config.adapter_timeout.as_millis()
                )),
                ..base
            },
        };

        metrics::record_order_submission(
            self.broker.name(),
            result.status.as_str(),
            spec.order_type.as_str(),
            started.elapsed().as_secs_f64(),
        );

        if result.status.is_success() {
            tracing::info!(
                request_id = %request_id,
                index,
                symbol = %spec.symbol,
                status = result.status.as_str(),
                broker_order_id = ?result.broker_order_id,
                "Order submitted"
            );
        } else {
            tracing::warn!(
                request_id = %request_id,
                index,
                symbol = %spec.symbol,
                status = result.status.as_str(),
                reason = ?result.reason,
                "Order did not succeed"
            );
        }

        result
    }

    /// Complete the ledger entry and publish. Returns the outcome that the
    /// ledger holds for this request.
    fn finish(&self, outcome: Arc<ExecutionOutcome>) -> Arc<ExecutionOutcome> {
        match self.ledger.complete(&outcome.request_id, Arc::clone(&outcome)) {
            Ok(state) => {
                metrics::record_execution(outcome.status.as_str(), outcome.dry_run);
                metrics::set_ledger_size(self.ledger.len());
                tracing::info!(
                    request_id = %outcome.request_id,
                    ledger_state = %state,
                    status = outcome.status.as_str(),
                    "Execution completed"
                );
                self.publisher
                    .publish(StateEvent::Execution(Arc::clone(&outcome)));
                outcome
            }
            Err(LedgerError::AlreadyTerminal { request_id, state }) => {
                tracing::error!(
                    request_id = %request_id,
                    state = %state,
                    "BUG: ledger entry completed twice; keeping the first outcome"
                );
                self.ledger
                    .get(&request_id)
                    .and_then(|entry| entry.outcome)
                    .unwrap_or(outcome)
            }
            Err(e @ LedgerError::UnknownRequest(_)) => {
                tracing::error!(error = %e, "BUG: completing a request that was never reserved");
                outcome
            }
        }
    }
}

/// Dry-run result: a full fill at no price, never sent anywhere.
fn simulate_fill(request_id: &RequestId, index: usize, spec: &OrderSpec) -> OrderResult {
    OrderResult {
        filled_qty: spec.quantity,
        avg_fill_price: spec.limit_price,
        ..OrderResult::pending_for(request_id, index, spec, OrderResultStatus::SimulatedFill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{NoOpEventPublisher, OrderAck};
    use crate::domain::execution::{OrderSide, OutcomeStatus, Venue};
    use crate::domain::idempotency::LedgerState;
    use crate::domain::market::{Account, Position, Quote};
    use crate::domain::shared::{BrokerOrderId, Symbol};
    use crate::infrastructure::persistence::InMemoryLedger;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Scripted broker: rejects `REJECT`, panics on `PANIC`, sleeps on `SLOW`,
    /// and optionally waits on a gate before answering.
    struct MockBroker {
        venue: Venue,
        calls: AtomicUsize,
        submitted: Mutex<Vec<String>>,
        gate: Option<Arc<Notify>>,
    }

    impl MockBroker {
        fn new(venue: Venue) -> Self {
            Self {
                venue,
                calls: AtomicUsize::new(0),
                submitted: Mutex::new(Vec::new()),
                gate: None,
            }
        }

        fn gated(venue: Venue, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new(venue)
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BrokerPort for MockBroker {
        fn venue(&self) -> Venue {
            self.venue
        }

        fn name(&self) -> &'static str {
            "mock"
        }

        async fn get_account(&self) -> Result<Account, BrokerError> {
            Err(BrokerError::Unknown {
                message: "unused".to_string(),
            })
        }

        async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
            Ok(vec![])
        }

        async fn get_quotes(&self, _symbols: &[Symbol]) -> Result<Vec<Quote>, BrokerError> {
            Ok(vec![])
        }

        async fn submit_order(&self, request: SubmitOrderRequest) -> Result<OrderAck, BrokerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.submitted.lock().push(request.client_order_id.clone());

            if let Some(gate) = &self.gate {
                gate.notified().await;
            }

            match request.symbol.as_str() {
                "REJECT" => Err(BrokerError::OrderRejected {
                    reason: "insufficient buying power".to_string(),
                }),
                "PANIC" => panic!("adapter blew up"),
                "SLOW" => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    unreachable!("timeout fires first")
                }
                _ => Ok(OrderAck {
                    broker_order_id: BrokerOrderId::new(format!("b-{}", request.client_order_id)),
                    client_order_id: request.client_order_id,
                    status: AckStatus::Filled,
                    filled_qty: request.quantity,
                    avg_fill_price: Some(dec!(100)),
                }),
            }
        }
    }

    type TestDispatcher = ExecutionDispatcher<MockBroker, InMemoryLedger, NoOpEventPublisher>;

    fn dispatcher_with(
        broker: MockBroker,
        mode: TradingMode,
        config: DispatcherConfig,
    ) -> (TestDispatcher, Arc<MockBroker>, Arc<InMemoryLedger>) {
        let broker = Arc::new(broker);
        let ledger = Arc::new(InMemoryLedger::default());
        let dispatcher = ExecutionDispatcher::new(
            Arc::clone(&broker),
            Arc::clone(&ledger),
            Arc::new(NoOpEventPublisher),
            mode,
            config,
        );
        (dispatcher, broker, ledger)
    }

    fn dispatcher() -> (TestDispatcher, Arc<MockBroker>, Arc<InMemoryLedger>) {
        dispatcher_with(
            MockBroker::new(Venue::Paper),
            TradingMode::Paper,
            DispatcherConfig::default(),
        )
    }

    fn buy(symbol: &str) -> OrderSpec {
        OrderSpec::market(symbol, OrderSide::Buy, dec!(1))
    }

    #[tokio::test]
    async fn dry_run_then_duplicate_returns_identical_results() {
        let (dispatcher, broker, ledger) = dispatcher();
        let request = ExecutionRequest::new("r1", vec![buy("SPY")], true);

        let first = dispatcher.submit(request.clone()).await.unwrap();
        assert!(first.accepted);
        assert!(!first.duplicate);
        let first_outcome = first.outcome.unwrap();
        assert_eq!(first_outcome.results.len(), 1);
        assert_eq!(first_outcome.results[0].symbol.as_str(), "SPY");
        assert_eq!(first_outcome.results[0].status, OrderResultStatus::SimulatedFill);

        let second = dispatcher.submit(request).await.unwrap();
        assert!(!second.accepted);
        assert!(second.duplicate);
        assert_eq!(second.outcome.unwrap().results, first_outcome.results);

        assert_eq!(broker.calls(), 0);
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn blank_request_id_never_touches_ledger() {
        let (dispatcher, broker, ledger) = dispatcher();
        let err = dispatcher
            .submit(ExecutionRequest::new("", vec![buy("SPY")], false))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Validation(_)));
        assert_eq!(ledger.len(), 0);
        assert_eq!(broker.calls(), 0);
    }

    #[tokio::test]
    async fn paper_mode_refuses_live_venue_orders() {
        let (dispatcher, broker, ledger) = dispatcher();
        let request = ExecutionRequest::new("r-live", vec![buy("SPY").with_venue(Venue::Live)], false);

        let err = dispatcher.submit(request).await.unwrap_err();
        assert!(matches!(err, DispatchError::Configuration(_)));
        assert_eq!(broker.calls(), 0);
        assert_eq!(ledger.len(), 0);
    }

    #[tokio::test]
    async fn paper_mode_refuses_live_bound_broker_even_for_dry_runs() {
        let (dispatcher, broker, ledger) = dispatcher_with(
            MockBroker::new(Venue::Live),
            TradingMode::Paper,
            DispatcherConfig::default(),
        );

        let err = dispatcher
            .submit(ExecutionRequest::new("r1", vec![buy("SPY")], true))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Configuration(_)));
        assert_eq!(broker.calls(), 0);
        assert_eq!(ledger.len(), 0);
    }

    #[tokio::test]
    async fn live_mode_refuses_venue_other_than_bound() {
        let (dispatcher, broker, _) = dispatcher_with(
            MockBroker::new(Venue::Live),
            TradingMode::Live,
            DispatcherConfig::default(),
        );

        let err = dispatcher
            .submit(ExecutionRequest::new(
                "r1",
                vec![buy("SPY").with_venue(Venue::Paper)],
                false,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Configuration(_)));
        assert_eq!(broker.calls(), 0);
    }

    #[tokio::test]
    async fn orders_are_submitted_in_sequence_with_deterministic_client_ids() {
        let (dispatcher, broker, ledger) = dispatcher();
        let request = ExecutionRequest::new("batch-7", vec![buy("SPY"), buy("AAPL"), buy("MSFT")], false);

        let response = dispatcher.submit(request).await.unwrap();
        let outcome = response.outcome.unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Completed);
        assert_eq!(
            *broker.submitted.lock(),
            vec!["batch-7-0", "batch-7-1", "batch-7-2"]
        );
        assert_eq!(
            ledger.get(&RequestId::new("batch-7")).unwrap().state,
            LedgerState::Completed
        );
    }

    #[tokio::test]
    async fn rejection_is_recorded_per_order_and_remaining_orders_continue() {
        let (dispatcher, broker, ledger) = dispatcher();
        let request = ExecutionRequest::new("r2", vec![buy("REJECT"), buy("SPY")], false);

        let outcome = dispatcher.submit(request).await.unwrap().outcome.unwrap();

        assert_eq!(broker.calls(), 2);
        assert_eq!(outcome.status, OutcomeStatus::PartiallyCompleted);
        assert_eq!(outcome.results[0].status, OrderResultStatus::Rejected);
        assert_eq!(
            outcome.results[0].reason.as_deref(),
            Some("insufficient buying power")
        );
        assert_eq!(outcome.results[1].status, OrderResultStatus::Filled);
        assert_eq!(
            ledger.get(&RequestId::new("r2")).unwrap().state,
            LedgerState::Failed
        );
    }

    #[tokio::test]
    async fn stop_on_first_failure_skips_the_rest() {
        let config = DispatcherConfig {
            stop_on_first_failure: true,
            ..DispatcherConfig::default()
        };
        let (dispatcher, broker, _) =
            dispatcher_with(MockBroker::new(Venue::Paper), TradingMode::Paper, config);

        let request = ExecutionRequest::new("r3", vec![buy("REJECT"), buy("SPY"), buy("AAPL")], false);
        let outcome = dispatcher.submit(request).await.unwrap().outcome.unwrap();

        assert_eq!(broker.calls(), 1);
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.results[1].status, OrderResultStatus::Skipped);
        assert_eq!(outcome.results[2].status, OrderResultStatus::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn adapter_timeout_marks_entry_failed() {
        let config = DispatcherConfig {
            adapter_timeout: Duration::from_millis(250),
            ..DispatcherConfig::default()
        };
        let (dispatcher, _, ledger) =
            dispatcher_with(MockBroker::new(Venue::Paper), TradingMode::Paper, config);

        let outcome = dispatcher
            .submit(ExecutionRequest::new("r4", vec![buy("SLOW")], false))
            .await
            .unwrap()
            .outcome
            .unwrap();

        assert_eq!(outcome.results[0].status, OrderResultStatus::TimedOut);
        assert!(outcome.results[0].reason.as_deref().unwrap().contains("250ms"));
        assert_eq!(
            ledger.get(&RequestId::new("r4")).unwrap().state,
            LedgerState::Failed
        );
    }

    #[tokio::test]
    async fn panicking_worker_never_leaves_entry_pending() {
        let (dispatcher, _, ledger) = dispatcher();

        let response = dispatcher
            .submit(ExecutionRequest::new("r5", vec![buy("PANIC")], false))
            .await
            .unwrap();

        let outcome = response.outcome.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.failure_reason.as_deref(), Some("execution worker panicked"));
        assert_eq!(
            ledger.get(&RequestId::new("r5")).unwrap().state,
            LedgerState::Failed
        );
    }

    #[tokio::test]
    async fn in_flight_duplicate_reports_pending_then_duplicate() {
        let gate = Arc::new(Notify::new());
        let (dispatcher, broker, _) = dispatcher_with(
            MockBroker::gated(Venue::Paper, Arc::clone(&gate)),
            TradingMode::Paper,
            DispatcherConfig::default(),
        );
        let dispatcher = Arc::new(dispatcher);
        let request = ExecutionRequest::new("r6", vec![buy("SPY")], false);

        let first = {
            let dispatcher = Arc::clone(&dispatcher);
            let request = request.clone();
            tokio::spawn(async move { dispatcher.submit(request).await })
        };

        while broker.calls() == 0 {
            tokio::task::yield_now().await;
        }

        let second = dispatcher.submit(request.clone()).await.unwrap();
        assert!(second.pending);
        assert!(!second.accepted && !second.duplicate);

        gate.notify_one();
        let first = first.await.unwrap().unwrap();
        assert!(first.accepted);

        let third = dispatcher.submit(request).await.unwrap();
        assert!(third.duplicate);
        assert_eq!(third.outcome, first.outcome);
        assert_eq!(broker.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_same_id_reaches_broker_once() {
        let (dispatcher, broker, ledger) = dispatcher();
        let dispatcher = Arc::new(dispatcher);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    dispatcher
                        .submit(ExecutionRequest::new("same", vec![buy("SPY")], false))
                        .await
                })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            let response = handle.await.unwrap().unwrap();
            if response.accepted {
                accepted += 1;
            } else {
                assert!(response.pending || response.duplicate);
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(broker.calls(), 1);
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_distinct_ids_each_execute() {
        let (dispatcher, broker, ledger) = dispatcher();
        let dispatcher = Arc::new(dispatcher);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    dispatcher
                        .submit(ExecutionRequest::new(format!("id-{i}"), vec![buy("SPY")], false))
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().unwrap().accepted);
        }

        assert_eq!(broker.calls(), 16);
        assert_eq!(ledger.len(), 16);
    }

    #[tokio::test]
    async fn empty_order_set_is_a_completed_probe() {
        let (dispatcher, broker, _) = dispatcher();
        let outcome = dispatcher
            .submit(ExecutionRequest::new("probe", vec![], false))
            .await
            .unwrap()
            .outcome
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Completed);
        assert!(outcome.results.is_empty());
        assert_eq!(broker.calls(), 0);
    }
}
