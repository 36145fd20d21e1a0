//! Wire-level data model shared by the worker and the relay.
//!
//! Field names serialize as camelCase to stay compatible with the browser
//! clients; every payload that crosses the broker or a WebSocket goes
//! through these types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::time::unix_timestamp;

/// A user's stated preferences for who they want to be paired with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingPreferences {
    pub mood: String,
    pub intent: String,
    #[serde(default)]
    pub interests: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefer_nearby: Option<bool>,
}

/// A queued request to be paired for a call.
///
/// `request_id` is assigned when the request enters the system and is the
/// stable identity used to remove the entry from the shared queue. Two
/// requests from the same user are two distinct queue entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub request_id: String,
    pub user_id: String,
    pub preferences: MatchingPreferences,
    pub timestamp: i64,
}

impl MatchRequest {
    /// Create a request with a fresh id and the current timestamp.
    pub fn new(user_id: impl Into<String>, preferences: MatchingPreferences) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            preferences,
            timestamp: unix_timestamp(),
        }
    }
}

/// A successful pairing, published on the `matches` channel.
///
/// Exists only as a message payload; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    pub user1: String,
    pub user2: String,
    pub call_id: String,
    pub score: i32,
    pub timestamp: i64,
}

/// Kind of a relayed signaling payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
    Ready,
    Leave,
}

/// An opaque offer/answer/ICE payload relayed between exactly two peers.
///
/// The relay forwards `data` verbatim and never inspects it; delivery is
/// at-most-once with no buffering for offline targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalingMessage {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub data: serde_json::Value,
    pub from: String,
    pub to: String,
}
