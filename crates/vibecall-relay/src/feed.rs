//! Match-notification fan-in from the broker.
//!
//! The worker announces matches on the broker; the relay consumes the
//! `match-notifications` channel and hands each event to the hub. Losing
//! the broker degrades matching (no new calls start) but never takes the
//! relay down; the outer loop keeps reconnecting.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use vibecall_broker::{MatchBroker, RedisBroker, Subscription, channels};
use vibecall_core::MatchEvent;

use crate::hub::SignalingHub;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Consume one subscription until it closes.
pub async fn pump_notifications(hub: Arc<SignalingHub>, mut sub: Subscription) {
    while let Some(payload) = sub.recv().await {
        match serde_json::from_str::<MatchEvent>(&payload) {
            Ok(event) => hub.match_found(&event).await,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed match notification");
            }
        }
    }
}

/// Keep a `match-notifications` subscription alive forever, reconnecting
/// with a fixed delay whenever the broker drops.
pub async fn run_match_feed(hub: Arc<SignalingHub>, broker_url: String) {
    loop {
        match RedisBroker::connect(&broker_url).await {
            Ok(broker) => match broker.subscribe(channels::MATCH_NOTIFICATIONS).await {
                Ok(sub) => {
                    info!("Subscribed to match notifications");
                    pump_notifications(Arc::clone(&hub), sub).await;
                    warn!("Match notification subscription closed; reconnecting");
                }
                Err(e) => {
                    warn!(error = %e, "Failed to subscribe to match notifications");
                }
            },
            Err(e) => {
                warn!(error = %e, "Broker unreachable; match notifications suspended");
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}
