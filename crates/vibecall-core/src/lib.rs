//! VibeCall Core Library
//!
//! Shared building blocks for the matchmaking worker and signaling relay:
//! - Wire-level data model (match requests, match events, signaling messages)
//! - Compatibility scoring between match requests
//! - Tracing initialisation and epoch time helpers

pub mod scorer;
pub mod time;
pub mod tracing_init;
pub mod types;

pub use scorer::{MIN_MATCH_SCORE, score};
pub use types::{MatchEvent, MatchRequest, MatchingPreferences, SignalKind, SignalingMessage};
