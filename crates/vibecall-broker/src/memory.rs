//! In-memory broker for tests and single-process deployments.
//!
//! Mirrors the Redis list/set/pub-sub semantics closely enough that the
//! worker and relay behave identically against either implementation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use vibecall_core::MatchRequest;

use crate::{BrokerError, MatchBroker, Subscription};

/// Broker held entirely in process memory.
///
/// The queue front corresponds to the Redis list head: pushes go to the
/// front, pops come from the back.
#[derive(Default)]
pub struct MemoryBroker {
    queue: Mutex<VecDeque<String>>,
    processing: Mutex<HashSet<String>>,
    topics: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
        m.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// User ids currently carrying a processing marker (test visibility).
    pub fn processing_markers(&self) -> HashSet<String> {
        Self::lock(&self.processing).clone()
    }

    fn parse_request(raw: &str) -> Option<MatchRequest> {
        match serde_json::from_str::<MatchRequest>(raw) {
            Ok(req) => Some(req),
            Err(e) => {
                warn!(error = %e, "Skipping malformed queue entry");
                None
            }
        }
    }
}

#[async_trait]
impl MatchBroker for MemoryBroker {
    async fn enqueue_request(&self, request: &MatchRequest) -> Result<(), BrokerError> {
        let payload = serde_json::to_string(request)?;
        Self::lock(&self.queue).push_front(payload);
        Ok(())
    }

    async fn pop_request(&self) -> Result<Option<MatchRequest>, BrokerError> {
        let raw = Self::lock(&self.queue).pop_back();
        Ok(raw.as_deref().and_then(Self::parse_request))
    }

    async fn restore_unmatched(&self, request: &MatchRequest) -> Result<(), BrokerError> {
        self.enqueue_request(request).await
    }

    async fn waiting_requests(&self) -> Result<Vec<MatchRequest>, BrokerError> {
        let snapshot: Vec<String> = Self::lock(&self.queue).iter().cloned().collect();
        Ok(snapshot
            .iter()
            .filter_map(|item| Self::parse_request(item))
            .collect())
    }

    async fn remove_request(&self, request_id: &str) -> Result<bool, BrokerError> {
        let mut queue = Self::lock(&self.queue);
        let position = queue.iter().position(|item| {
            Self::parse_request(item).is_some_and(|req| req.request_id == request_id)
        });
        Ok(position.and_then(|idx| queue.remove(idx)).is_some())
    }

    async fn mark_processing(&self, user_id: &str) -> Result<(), BrokerError> {
        Self::lock(&self.processing).insert(user_id.to_string());
        Ok(())
    }

    async fn clear_processing(&self, user_id: &str) -> Result<(), BrokerError> {
        Self::lock(&self.processing).remove(user_id);
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError> {
        let sender = {
            let mut topics = Self::lock(&self.topics);
            topics
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(64).0)
                .clone()
        };
        // No subscribers is fine; the payload just vanishes.
        let _ = sender.send(payload.to_string());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError> {
        let mut topic_rx = {
            let mut topics = Self::lock(&self.topics);
            topics
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(64).0)
                .subscribe()
        };

        let (tx, rx) = mpsc::channel::<String>(64);
        tokio::spawn(async move {
            loop {
                match topic_rx.recv().await {
                    Ok(payload) => {
                        if tx.send(payload).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "In-memory subscription lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(rx))
    }
}
