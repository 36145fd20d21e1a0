//! Broker subscription loops feeding and fanning out the queue.
//!
//! Two long-lived tasks run beside the drain loop: one ingests new match
//! requests from the `match-requests` channel into the queue, the other
//! re-publishes `matches` announcements onto `match-notifications` for
//! the relay (and any other downstream consumer).

use std::sync::Arc;

use tracing::{info, warn};

use vibecall_broker::{MatchBroker, Subscription, channels};
use vibecall_core::{MatchEvent, MatchRequest};

/// Drain the `match-requests` subscription into the queue.
///
/// Runs until the subscription closes. Malformed payloads are logged and
/// dropped; they never stop the loop.
pub async fn run_request_ingest(broker: Arc<dyn MatchBroker>, mut sub: Subscription) {
    while let Some(payload) = sub.recv().await {
        match serde_json::from_str::<MatchRequest>(&payload) {
            Ok(request) => {
                info!(user_id = %request.user_id, request_id = %request.request_id, "New match request");
                if let Err(e) = broker.enqueue_request(&request).await {
                    warn!(user_id = %request.user_id, error = %e, "Failed to enqueue match request");
                }
            }
            Err(e) => {
                warn!(error = %e, "Ignoring malformed match request payload");
            }
        }
    }
    warn!("match-requests subscription closed");
}

/// Re-publish `matches` payloads verbatim onto `match-notifications`.
///
/// Payloads that do not parse as a [`MatchEvent`] are dropped at this
/// boundary rather than forwarded downstream.
pub async fn run_match_forwarder(broker: Arc<dyn MatchBroker>, mut sub: Subscription) {
    while let Some(payload) = sub.recv().await {
        if let Err(e) = serde_json::from_str::<MatchEvent>(&payload) {
            warn!(error = %e, "Ignoring malformed match announcement");
            continue;
        }
        if let Err(e) = broker.publish(channels::MATCH_NOTIFICATIONS, &payload).await {
            warn!(error = %e, "Failed to forward match notification");
        }
    }
    warn!("matches subscription closed");
}
