//! Post-execution refresh.
//!
//! Listens on the execution topic and refreshes account and positions after
//! every execution that reached the venue, so observers see the new state
//! without waiting for the next scheduled refresh.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{StateBroadcaster, Topic};
use crate::application::ports::{BrokerPort, StateEvent};
use crate::application::services::SnapshotService;

/// Spawn the execution listener. The subscription is registered before this
/// returns, so no outcome published afterwards is missed.
pub fn spawn_execution_listener<B>(
    broadcaster: &StateBroadcaster,
    snapshots: Arc<SnapshotService<B, StateBroadcaster>>,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    B: BrokerPort + 'static,
{
    let mut subscription = broadcaster.subscribe(Topic::Executions);

    tokio::spawn(async move {
        tracing::info!(session_id = %subscription.id(), "Execution listener started");

        loop {
            let delivery = tokio::select! {
                () = cancel.cancelled() => break,
                delivery = subscription.recv() => delivery,
            };

            let Some(delivery) = delivery else {
                break;
            };

            if delivery.lagged() {
                // Missed outcomes only delay a refresh; the next one catches up.
                tracing::warn!(dropped = delivery.dropped, "Execution listener lagged");
            }

            if let StateEvent::Execution(outcome) = &delivery.envelope.event {
                snapshots.on_execution(outcome).await;
            }
        }

        tracing::info!("Execution listener stopped");
    })
}
