//! State Broadcaster
//!
//! Fan-out of state updates to connected observers over one bounded
//! `tokio::sync::broadcast` channel per topic. A subscriber that falls more
//! than the channel capacity behind loses the oldest envelopes and learns
//! how many on its next receive. Publishing never awaits, so a slow
//! observer can never stall a producer or another observer.
//!
//! There is no replay: a subscription only sees envelopes published after
//! it was registered.

mod listener;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{EventPublisherPort, StateEvent};
use crate::domain::shared::{SessionId, Timestamp};
use crate::observability::metrics;

pub use listener::spawn_execution_listener;

/// Default per-topic channel capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

// ============================================================================
// Topics and envelopes
// ============================================================================

/// Subscription topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Account snapshots.
    Account,
    /// Position snapshots.
    Positions,
    /// Quote snapshots.
    Quotes,
    /// Execution outcomes.
    Executions,
}

impl Topic {
    /// Every topic.
    pub const ALL: [Self; 4] = [Self::Account, Self::Positions, Self::Quotes, Self::Executions];

    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Positions => "positions",
            Self::Quotes => "quotes",
            Self::Executions => "executions",
        }
    }

    /// Topic an event is published on.
    #[must_use]
    pub const fn of(event: &StateEvent) -> Self {
        match event {
            StateEvent::Account(_) => Self::Account,
            StateEvent::Positions(_) => Self::Positions,
            StateEvent::Quotes(_) => Self::Quotes,
            StateEvent::Execution(_) => Self::Executions,
        }
    }

    /// Parse a comma-separated topic list. Empty input means every topic.
    pub fn parse_list(input: &str) -> Result<Vec<Self>, UnknownTopic> {
        let topics = input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(if topics.is_empty() {
            Self::ALL.to_vec()
        } else {
            topics
        })
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topic name that matched nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown topic: {0}")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "account" => Ok(Self::Account),
            "positions" => Ok(Self::Positions),
            "quotes" => Ok(Self::Quotes),
            "executions" | "execution" => Ok(Self::Executions),
            _ => Err(UnknownTopic(s.to_string())),
        }
    }
}

/// One published event, shared by every subscriber that receives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Monotonic publication sequence.
    pub sequence: u64,
    /// Topic.
    pub topic: Topic,
    /// Publication time.
    pub published_at: Timestamp,
    /// Payload.
    pub event: StateEvent,
}

/// An envelope handed to one subscriber.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// The envelope.
    pub envelope: Arc<Envelope>,
    /// Envelopes dropped for this subscriber since its previous receive.
    pub dropped: u64,
}

impl Delivery {
    /// Whether envelopes were lost before this one.
    #[must_use]
    pub const fn lagged(&self) -> bool {
        self.dropped > 0
    }
}

// ============================================================================
// Subscribers
// ============================================================================

/// Registry-side view of a subscriber.
#[derive(Debug)]
struct SubscriberState {
    closed: CancellationToken,
    lagging: AtomicBool,
}

/// One topic channel receiver plus at most one buffered envelope, so
/// several topics can be merged in sequence order.
#[derive(Debug)]
struct TopicReceiver {
    topic: Topic,
    rx: broadcast::Receiver<Arc<Envelope>>,
    head: Option<Arc<Envelope>>,
}

impl TopicReceiver {
    /// Buffer the next envelope if none is held. Returns envelopes lost to lag.
    fn fill(&mut self) -> u64 {
        let mut lost = 0;
        while self.head.is_none() {
            match self.rx.try_recv() {
                Ok(envelope) => self.head = Some(envelope),
                Err(TryRecvError::Lagged(n)) => lost += n,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        lost
    }

    fn is_drained(&self) -> bool {
        self.head.is_none() && self.rx.is_empty()
    }
}

/// Handle to one registered subscriber. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: SessionId,
    receivers: Vec<TopicReceiver>,
    state: Arc<SubscriberState>,
    inner: Arc<Inner>,
    dropped: u64,
}

impl Subscription {
    /// Session ID of this subscriber.
    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// Topics this subscriber receives.
    #[must_use]
    pub fn topics(&self) -> Vec<Topic> {
        self.receivers.iter().map(|r| r.topic).collect()
    }

    /// Wait for the next envelope. Returns `None` once unsubscribed or the
    /// broadcaster has shut down. Cancel safe.
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            if let Some(delivery) = self.try_recv() {
                return Some(delivery);
            }
            if self.state.closed.is_cancelled() {
                return None;
            }

            let closed = self.state.closed.clone();
            if self.receivers.is_empty() {
                closed.cancelled().await;
                return None;
            }

            let (index, result) = {
                let pending = self
                    .receivers
                    .iter_mut()
                    .map(|receiver| Box::pin(receiver.rx.recv()));
                tokio::select! {
                    () = closed.cancelled() => return None,
                    (result, index, _) = futures::future::select_all(pending) => (index, result),
                }
            };

            match result {
                Ok(envelope) => self.receivers[index].head = Some(envelope),
                Err(RecvError::Lagged(n)) => self.record_lag(n),
                // Senders live as long as the broadcaster this handle points at.
                Err(RecvError::Closed) => self.state.closed.cancel(),
            }
        }
    }

    /// Take the next envelope if one is queued. Across topics the lowest
    /// sequence goes first.
    pub fn try_recv(&mut self) -> Option<Delivery> {
        if self.state.closed.is_cancelled() {
            return None;
        }

        let lost: u64 = self.receivers.iter_mut().map(TopicReceiver::fill).sum();
        if lost > 0 {
            self.record_lag(lost);
        }

        let index = self
            .receivers
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.head.as_ref().map(|e| (i, e.sequence)))
            .min_by_key(|&(_, sequence)| sequence)
            .map(|(i, _)| i)?;
        let envelope = self.receivers[index].head.take()?;
        let dropped = std::mem::take(&mut self.dropped);

        if self.receivers.iter().all(TopicReceiver::is_drained) {
            self.state.lagging.store(false, Ordering::Relaxed);
        }
        Some(Delivery { envelope, dropped })
    }

    fn record_lag(&mut self, lost: u64) {
        self.dropped += lost;
        self.state.lagging.store(true, Ordering::Relaxed);
        self.inner.dropped.fetch_add(lost, Ordering::Relaxed);
        metrics::record_broadcast_drop(lost);
        tracing::debug!(session_id = %self.id, dropped = lost, "Subscriber lagged");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.inner.remove(&self.id);
    }
}

// ============================================================================
// Broadcaster
// ============================================================================

/// Broadcaster statistics.
///
/// Lag is counted when a subscriber next receives, so a subscriber that
/// never reads again is not reported as lagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastStats {
    /// Registered subscribers.
    pub subscribers: usize,
    /// Subscribers that lost envelopes and have not caught up yet.
    pub lagging: usize,
    /// Envelopes published.
    pub published: u64,
    /// Envelopes dropped across all subscribers.
    pub dropped: u64,
}

#[derive(Debug)]
struct Inner {
    channels: HashMap<Topic, broadcast::Sender<Arc<Envelope>>>,
    subscribers: RwLock<HashMap<SessionId, Arc<SubscriberState>>>,
    capacity: usize,
    sequence: AtomicU64,
    dropped: AtomicU64,
}

impl Inner {
    fn remove(&self, id: &SessionId) -> bool {
        let (removed, remaining) = {
            let mut subscribers = self.subscribers.write();
            let removed = subscribers.remove(id);
            (removed, subscribers.len())
        };

        match removed {
            Some(state) => {
                state.closed.cancel();
                metrics::set_subscribers(remaining);
                tracing::debug!(session_id = %id, remaining, "Subscriber removed");
                true
            }
            None => false,
        }
    }
}

/// Fan-out hub for state updates: one broadcast channel per [`Topic`].
#[derive(Debug, Clone)]
pub struct StateBroadcaster {
    inner: Arc<Inner>,
}

impl Default for StateBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl StateBroadcaster {
    /// Create a broadcaster. Each topic channel holds `queue_capacity`
    /// envelopes, rounded up to a power of two.
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        let capacity = queue_capacity.max(1).next_power_of_two();
        let channels = Topic::ALL
            .into_iter()
            .map(|topic| (topic, broadcast::channel(capacity).0))
            .collect();

        Self {
            inner: Arc::new(Inner {
                channels,
                subscribers: RwLock::new(HashMap::new()),
                capacity,
                sequence: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Per-topic channel capacity.
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Subscribe to one topic.
    #[must_use]
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        self.subscribe_topics(&[topic])
    }

    /// Subscribe to several topics. An empty slice subscribes to all of them.
    #[must_use]
    pub fn subscribe_topics(&self, topics: &[Topic]) -> Subscription {
        let topics: BTreeSet<Topic> = if topics.is_empty() {
            Topic::ALL.into_iter().collect()
        } else {
            topics.iter().copied().collect()
        };

        let receivers = topics
            .into_iter()
            .filter_map(|topic| {
                self.inner.channels.get(&topic).map(|tx| TopicReceiver {
                    topic,
                    rx: tx.subscribe(),
                    head: None,
                })
            })
            .collect();

        let id = SessionId::generate();
        let state = Arc::new(SubscriberState {
            closed: CancellationToken::new(),
            lagging: AtomicBool::new(false),
        });

        let count = {
            let mut subscribers = self.inner.subscribers.write();
            subscribers.insert(id.clone(), Arc::clone(&state));
            subscribers.len()
        };
        metrics::set_subscribers(count);
        tracing::debug!(session_id = %id, subscribers = count, "Subscriber added");

        Subscription {
            id,
            receivers,
            state,
            inner: Arc::clone(&self.inner),
            dropped: 0,
        }
    }

    /// Remove a subscriber by session ID. Its pending `recv` returns `None`.
    pub fn unsubscribe(&self, id: &SessionId) -> bool {
        self.inner.remove(id)
    }

    /// Publish an event to every subscriber of its topic. Never waits on a
    /// subscriber.
    ///
    /// Returns the envelope's sequence number.
    pub fn publish_event(&self, event: StateEvent) -> u64 {
        let topic = Topic::of(&event);
        let sequence = self.inner.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let envelope = Arc::new(Envelope {
            sequence,
            topic,
            published_at: Timestamp::now(),
            event,
        });

        // No receivers is not an error.
        let receivers = self
            .inner
            .channels
            .get(&topic)
            .and_then(|tx| tx.send(envelope).ok())
            .unwrap_or(0);
        tracing::trace!(topic = %topic, sequence, receivers, "Envelope published");

        sequence
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> BroadcastStats {
        let subscribers = self.inner.subscribers.read();
        BroadcastStats {
            subscribers: subscribers.len(),
            lagging: subscribers
                .values()
                .filter(|s| s.lagging.load(Ordering::Relaxed))
                .count(),
            published: self.inner.sequence.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
        }
    }

    /// Close every subscription. Used on shutdown.
    pub fn close_all(&self) {
        let drained: Vec<_> = self.inner.subscribers.write().drain().collect();
        for (_, state) in &drained {
            state.closed.cancel();
        }
        metrics::set_subscribers(0);
        tracing::info!(closed = drained.len(), "Broadcaster closed all subscriptions");
    }
}

impl EventPublisherPort for StateBroadcaster {
    fn publish(&self, event: StateEvent) {
        self.publish_event(event);
    }
}
