//! Broker seam between the matchmaking worker and the signaling relay.
//!
//! All cross-process coordination goes through one shared broker: a FIFO
//! list of pending match requests, a set of "processing" markers, and three
//! pub/sub channels (request ingestion, match announcements, and the
//! downstream notification fan-out). The worker and relay never share
//! memory; this crate is the only coupling between them.
//!
//! [`RedisBroker`] is the production implementation; [`MemoryBroker`]
//! backs tests and single-process deployments.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use tokio::sync::mpsc;

use vibecall_core::{MatchEvent, MatchRequest};

/// Fixed pub/sub channel names; part of the compatibility surface.
pub mod channels {
    /// New match requests entering the system.
    pub const MATCH_REQUESTS: &str = "match-requests";
    /// Match announcements published by the worker.
    pub const MATCHES: &str = "matches";
    /// Downstream fan-out consumed by the relay.
    pub const MATCH_NOTIFICATIONS: &str = "match-notifications";
}

/// Fixed storage key names; part of the compatibility surface.
pub mod keys {
    /// FIFO list of serialized pending match requests.
    pub const MATCH_QUEUE: &str = "match:queue";
    /// Set of user ids currently being processed by a worker.
    pub const PROCESSING_SET: &str = "match:processing";
}

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Broker connection error: {0}")]
    Connection(String),

    #[error("Broker command error: {0}")]
    Command(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A live subscription to one pub/sub channel.
///
/// Yields raw payload strings until the underlying connection closes.
pub struct Subscription {
    rx: mpsc::Receiver<String>,
}

impl Subscription {
    pub(crate) const fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx }
    }

    /// Receive the next payload, or `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Queue and pub/sub operations the matchmaking core needs from the broker.
///
/// Queue orientation matches the original deployment: new requests are
/// pushed onto the HEAD of the list and the worker pops from the TAIL, so
/// the list drains oldest-first.
#[async_trait]
pub trait MatchBroker: Send + Sync {
    /// Push a new request onto the head of the queue.
    async fn enqueue_request(&self, request: &MatchRequest) -> Result<(), BrokerError>;

    /// Pop the oldest request from the tail of the queue.
    ///
    /// Malformed entries are logged and swallowed (the tick treats them as
    /// an empty pop), never surfaced as errors.
    async fn pop_request(&self) -> Result<Option<MatchRequest>, BrokerError>;

    /// Return a popped-but-unmatched request to the HEAD of the queue.
    ///
    /// Deliberate policy: the entry re-enters at the newest position, so
    /// every request that arrived while it was being considered gets
    /// popped (and first pick of partners) before it is seen again.
    async fn restore_unmatched(&self, request: &MatchRequest) -> Result<(), BrokerError>;

    /// Read-only snapshot of the queue, head to tail, skipping malformed
    /// entries.
    async fn waiting_requests(&self) -> Result<Vec<MatchRequest>, BrokerError>;

    /// Remove the queue entry with the given request id.
    ///
    /// Returns `false` when no entry matched (it was already drained by
    /// another worker or never existed).
    async fn remove_request(&self, request_id: &str) -> Result<bool, BrokerError>;

    /// Best-effort visibility marker: the user is being matched right now.
    async fn mark_processing(&self, user_id: &str) -> Result<(), BrokerError>;

    /// Clear the processing marker for a user.
    async fn clear_processing(&self, user_id: &str) -> Result<(), BrokerError>;

    /// Publish a raw payload on a channel.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError>;

    /// Subscribe to a channel.
    async fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError>;

    /// Publish a match announcement on the `matches` channel.
    async fn publish_match(&self, event: &MatchEvent) -> Result<(), BrokerError> {
        let payload = serde_json::to_string(event)?;
        self.publish(channels::MATCHES, &payload).await
    }
}

pub use self::memory::MemoryBroker;
pub use self::redis::RedisBroker;
