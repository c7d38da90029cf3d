//! WebSocket Integration Tests
//!
//! Serves the router on a loopback port and talks to `/ws` with a real
//! client: cached snapshots first, then live envelopes, and a lag notice
//! when the session falls behind.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dashboard_engine::application::services::SnapshotConfig;
use dashboard_engine::infrastructure::persistence::LedgerConfig;
use dashboard_engine::{
    AppState, BrokerPort, DispatcherConfig, ExecutionDispatcher, InMemoryLedger, SimulatedBroker,
    SnapshotService, StateBroadcaster, StateEvent, TradingMode, create_router,
};
use futures::StreamExt;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Snapshots = SnapshotService<SimulatedBroker, StateBroadcaster>;

struct Server {
    addr: SocketAddr,
    broadcaster: StateBroadcaster,
    snapshots: Arc<Snapshots>,
}

async fn serve(queue_capacity: usize) -> Server {
    let broker = Arc::new(SimulatedBroker::default());
    let broadcaster = StateBroadcaster::new(queue_capacity);
    let publisher = Arc::new(broadcaster.clone());
    let snapshots = Arc::new(SnapshotService::new(
        Arc::clone(&broker),
        Arc::clone(&publisher),
        SnapshotConfig::default(),
    ));
    let dispatcher = Arc::new(ExecutionDispatcher::new(
        Arc::clone(&broker),
        Arc::new(InMemoryLedger::new(LedgerConfig::default())),
        publisher,
        TradingMode::Paper,
        DispatcherConfig::default(),
    ));

    let state = AppState {
        dispatcher,
        snapshots: Arc::clone(&snapshots),
        broadcaster: broadcaster.clone(),
        ledger: Arc::new(InMemoryLedger::new(LedgerConfig::default())),
        venue: broker.venue(),
        broker: "simulated",
        version: "test".to_string(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });

    Server {
        addr,
        broadcaster,
        snapshots,
    }
}

async fn connect(addr: SocketAddr, topics: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws?topics={topics}"))
        .await
        .unwrap();
    client
}

/// The session subscribes after the handshake completes.
async fn wait_for_subscribers(broadcaster: &StateBroadcaster, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while broadcaster.stats().subscribers < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("session subscribed");
}

async fn next_frame(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("frame within timeout")
            .expect("socket open")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_session_sends_snapshot_then_events_then_lag_notice() {
    let server = serve(2).await;
    server.snapshots.refresh_account().await.unwrap();

    let mut client = connect(server.addr, "account").await;

    let snapshot = next_frame(&mut client).await;
    assert_eq!(snapshot["type"], "snapshot");
    assert_eq!(snapshot["event"]["topic"], "account");
    assert!(snapshot["event"]["data"]["fetchedAt"].is_string());

    let refreshed = server.snapshots.refresh_account().await.unwrap();
    let event = next_frame(&mut client).await;
    assert_eq!(event["type"], "event");
    assert_eq!(event["envelope"]["topic"], "account");
    let live_sequence = event["envelope"]["sequence"].as_u64().unwrap();

    // Five envelopes with no await in between overrun the two-slot channel.
    for _ in 0..5 {
        server
            .broadcaster
            .publish_event(StateEvent::Account(Arc::clone(&refreshed)));
    }

    let lagged = next_frame(&mut client).await;
    assert_eq!(lagged["type"], "lagged");
    assert_eq!(lagged["dropped"], 3);

    let first = next_frame(&mut client).await;
    let second = next_frame(&mut client).await;
    assert_eq!(first["type"], "event");
    assert_eq!(first["envelope"]["sequence"].as_u64().unwrap(), live_sequence + 4);
    assert_eq!(second["envelope"]["sequence"].as_u64().unwrap(), live_sequence + 5);
}

#[tokio::test]
async fn test_session_without_cached_state_starts_with_live_events() {
    let server = serve(16).await;
    let mut client = connect(server.addr, "account,positions").await;
    wait_for_subscribers(&server.broadcaster, 1).await;

    // Nothing is cached, so the first frame is the live positions update.
    server.snapshots.refresh_positions().await.unwrap();

    let frame = next_frame(&mut client).await;
    assert_eq!(frame["type"], "event");
    assert_eq!(frame["envelope"]["topic"], "positions");
}

#[tokio::test]
async fn test_close_all_ends_sessions() {
    let server = serve(16).await;
    server.snapshots.refresh_account().await.unwrap();
    let mut client = connect(server.addr, "account").await;
    assert_eq!(next_frame(&mut client).await["type"], "snapshot");

    server.broadcaster.close_all();

    let end = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                None | Some(Ok(Message::Close(_)) | Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(end.is_ok(), "session should end after close_all");
}
