//! VibeCall Matchmaking Worker Library
//!
//! The worker drains one shared FIFO queue of match requests on a fixed
//! interval, scores every waiting candidate against the popped request,
//! and announces pairs on the broker's `matches` channel. It also feeds
//! the queue from the `match-requests` channel and fans announcements out
//! to `match-notifications` for the signaling relay.

pub mod feeds;
pub mod matcher;

pub use matcher::{MatchWorker, WorkerError, generate_call_id};
