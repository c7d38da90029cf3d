//! WebSocket session.
//!
//! Subscribes first, then sends the cached snapshots, then forwards live
//! envelopes. Subscribing before reading the cache means an update that
//! lands in between is delivered twice rather than lost.

use axum::extract::ws::{Message, WebSocket};

use crate::application::ports::{BrokerPort, EventPublisherPort, StateEvent};
use crate::application::services::SnapshotService;
use crate::domain::idempotency::LedgerStore;
use crate::infrastructure::broadcast::Topic;

use super::controller::AppState;
use super::response::StreamMessage;

pub(super) async fn handle_socket<B, L>(mut socket: WebSocket, state: AppState<B, L>, topics: Vec<Topic>)
where
    B: BrokerPort + 'static,
    L: LedgerStore + 'static,
{
    let mut subscription = state.broadcaster.subscribe_topics(&topics);
    let session_id = subscription.id().clone();
    tracing::info!(session_id = %session_id, topics = ?subscription.topics(), "WebSocket client connected");

    for event in cached_state(&state.snapshots, &subscription.topics()) {
        if !send(&mut socket, &StreamMessage::Snapshot { event }).await {
            return;
        }
    }

    loop {
        tokio::select! {
            delivery = subscription.recv() => {
                let Some(delivery) = delivery else {
                    break;
                };
                if delivery.lagged()
                    && !send(&mut socket, &StreamMessage::Lagged { dropped: delivery.dropped }).await
                {
                    break;
                }
                if !send(&mut socket, &StreamMessage::Event { envelope: delivery.envelope }).await {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                    break;
                }
                // Client messages carry no commands.
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!(session_id = %session_id, "WebSocket client disconnected");
}

/// Cached snapshots for the subscribed topics. Executions have no snapshot.
fn cached_state<B, E>(snapshots: &SnapshotService<B, E>, topics: &[Topic]) -> Vec<StateEvent>
where
    B: BrokerPort,
    E: EventPublisherPort,
{
    let mut events = Vec::new();
    for topic in topics {
        match topic {
            Topic::Account => events.extend(snapshots.cached_account().map(StateEvent::Account)),
            Topic::Positions => {
                events.extend(snapshots.cached_positions().map(StateEvent::Positions));
            }
            Topic::Quotes => {
                let quotes = snapshots.cached_quotes();
                if !quotes.is_empty() {
                    events.push(StateEvent::Quotes(quotes));
                }
            }
            Topic::Executions => {}
        }
    }
    events
}

/// Serialize and send. Returns false once the client is gone.
async fn send(socket: &mut WebSocket, message: &StreamMessage) -> bool {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize stream message");
            return true;
        }
    };
    socket.send(Message::Text(text.into())).await.is_ok()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::ports::NoOpEventPublisher;
    use crate::application::services::SnapshotConfig;
    use crate::domain::shared::Symbol;
    use crate::infrastructure::broker::SimulatedBroker;

    fn snapshots() -> SnapshotService<SimulatedBroker, NoOpEventPublisher> {
        SnapshotService::new(
            Arc::new(SimulatedBroker::default()),
            Arc::new(NoOpEventPublisher),
            SnapshotConfig::default(),
        )
    }

    fn kinds(events: &[StateEvent]) -> Vec<&'static str> {
        events.iter().map(StateEvent::kind).collect()
    }

    #[tokio::test]
    async fn cached_state_follows_topic_order() {
        let service = snapshots();
        service.refresh_account().await.unwrap();
        service
            .refresh_quotes(&[Symbol::new("SPY"), Symbol::new("AAPL")])
            .await
            .unwrap();

        let events = cached_state(&service, &[Topic::Quotes, Topic::Executions, Topic::Account]);
        assert_eq!(kinds(&events), vec!["quotes", "account"]);

        let StateEvent::Quotes(quotes) = &events[0] else {
            panic!("expected quotes first");
        };
        let symbols: Vec<_> = quotes.iter().map(|q| q.data.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "SPY"]);
    }

    #[tokio::test]
    async fn cached_state_skips_topics_with_nothing_cached() {
        let service = snapshots();
        assert!(cached_state(&service, &Topic::ALL).is_empty());

        service.refresh_positions().await.unwrap();
        assert_eq!(kinds(&cached_state(&service, &Topic::ALL)), vec!["positions"]);
    }
}
