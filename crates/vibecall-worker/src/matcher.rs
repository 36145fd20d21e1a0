//! Queue drain and pairing logic.

use std::sync::Arc;

use rand::{Rng, distributions::Alphanumeric};
use tracing::{info, warn};

use vibecall_broker::{BrokerError, MatchBroker};
use vibecall_core::time::{unix_timestamp, unix_timestamp_millis};
use vibecall_core::{MIN_MATCH_SCORE, MatchEvent, MatchRequest, score};
use vibecall_store::ProfileStore;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Generate a call identifier.
///
/// Epoch-millisecond prefix plus a random suffix keeps ids collision
/// resistant across concurrent workers without any coordination.
pub fn generate_call_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("call_{}_{}", unix_timestamp_millis(), suffix.to_lowercase())
}

/// Drains the match queue and publishes pairings.
pub struct MatchWorker {
    broker: Arc<dyn MatchBroker>,
    store: Arc<dyn ProfileStore>,
}

impl MatchWorker {
    pub fn new(broker: Arc<dyn MatchBroker>, store: Arc<dyn ProfileStore>) -> Self {
        Self { broker, store }
    }

    /// Run one tick of the drain loop, swallowing any error.
    ///
    /// The worker never dies to a bad tick; whatever went wrong is logged
    /// and the next interval gets a fresh attempt.
    pub async fn tick(&self) {
        match self.process_once().await {
            Ok(Some(event)) => {
                info!(
                    user1 = %event.user1,
                    user2 = %event.user2,
                    call_id = %event.call_id,
                    score = event.score,
                    "Match found"
                );
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Match tick failed");
            }
        }
    }

    /// Pop one request and try to pair it against the waiting queue.
    ///
    /// Returns the published event when a pair was made.
    pub async fn process_once(&self) -> Result<Option<MatchEvent>, WorkerError> {
        let Some(request) = self.broker.pop_request().await? else {
            return Ok(None);
        };

        // Visibility only; matching proceeds even if the marker fails.
        if let Err(e) = self.broker.mark_processing(&request.user_id).await {
            warn!(user_id = %request.user_id, error = %e, "Failed to set processing marker");
        }

        let waiting = self.broker.waiting_requests().await?;
        let Some((candidate, best_score)) = best_candidate(&request, &waiting) else {
            // Nobody clears the bar: back onto the queue head, so everyone
            // who arrived in the meantime gets considered first.
            self.broker.restore_unmatched(&request).await?;
            self.clear_marker(&request.user_id).await;
            return Ok(None);
        };

        if !self.broker.remove_request(&candidate.request_id).await? {
            // The candidate vanished between the snapshot and the removal
            // (drained by a concurrent worker). Requeue and retry next tick.
            warn!(
                request_id = %candidate.request_id,
                user_id = %candidate.user_id,
                "Best candidate no longer queued; requeueing requester"
            );
            self.broker.restore_unmatched(&request).await?;
            self.clear_marker(&request.user_id).await;
            return Ok(None);
        }

        if let Err(e) = self.broker.mark_processing(&candidate.user_id).await {
            warn!(user_id = %candidate.user_id, error = %e, "Failed to set processing marker");
        }

        let event = MatchEvent {
            user1: request.user_id.clone(),
            user2: candidate.user_id.clone(),
            call_id: generate_call_id(),
            score: best_score,
            timestamp: unix_timestamp(),
        };
        self.broker.publish_match(&event).await?;

        self.clear_marker(&request.user_id).await;
        self.clear_marker(&candidate.user_id).await;

        // The queue state is authoritative; persisted waitlist rows are
        // cleaned up detached so the announcement never waits on storage.
        let store = Arc::clone(&self.store);
        let users = [event.user1.clone(), event.user2.clone()];
        tokio::spawn(async move {
            for user_id in users {
                if let Err(e) = store.remove_from_waitlist(&user_id).await {
                    warn!(user_id = %user_id, error = %e, "Failed to remove persisted waitlist row");
                }
            }
        });

        Ok(Some(event))
    }

    async fn clear_marker(&self, user_id: &str) {
        if let Err(e) = self.broker.clear_processing(user_id).await {
            warn!(user_id = %user_id, error = %e, "Failed to clear processing marker");
        }
    }
}

/// Pick the highest-scoring candidate at or above [`MIN_MATCH_SCORE`].
///
/// Candidates sharing the requester's user id are skipped. Ties go to the
/// first candidate encountered in snapshot (head-to-tail) order.
fn best_candidate<'a>(
    request: &MatchRequest,
    waiting: &'a [MatchRequest],
) -> Option<(&'a MatchRequest, i32)> {
    let mut best: Option<(&MatchRequest, i32)> = None;
    for candidate in waiting.iter().filter(|c| c.user_id != request.user_id) {
        let s = score(&request.preferences, &candidate.preferences);
        if best.is_none_or(|(_, b)| s > b) {
            best = Some((candidate, s));
        }
    }
    best.filter(|(_, s)| *s >= MIN_MATCH_SCORE)
}
