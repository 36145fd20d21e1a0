//! Boundary to the application's persistent profile store.
//!
//! The matchmaking core treats this store as an eventually-consistent side
//! channel: online flags and waitlist cleanup are best-effort, and the ban
//! check fails open when the store is unreachable. Nothing here is on the
//! critical path of matching or signaling.

pub mod db;
pub mod models;
mod queries;

use async_trait::async_trait;
use tracing::debug;

pub use db::{SqliteProfileStore, StoreError};
pub use models::Profile;

/// The profile-store operations the core needs.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Flip the user's online flag. Missing profiles are a silent no-op.
    async fn set_online(&self, user_id: &str, online: bool) -> Result<(), StoreError>;

    /// Look up the user's ban flag.
    ///
    /// `Ok(None)` means the profile (or the flag) does not exist; callers
    /// must treat that the same as "not banned".
    async fn is_banned(&self, user_id: &str) -> Result<Option<bool>, StoreError>;

    /// Delete the user's persisted waiting records after a match.
    async fn remove_from_waitlist(&self, user_id: &str) -> Result<(), StoreError>;
}

/// Stand-in used when no store is reachable at startup.
///
/// Every operation succeeds without doing anything, which matches the
/// degradation contract: the core keeps matching and signaling even with
/// the store gone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProfileStore;

#[async_trait]
impl ProfileStore for NullProfileStore {
    async fn set_online(&self, user_id: &str, online: bool) -> Result<(), StoreError> {
        debug!(user_id = %user_id, online, "Profile store absent; online flag not persisted");
        Ok(())
    }

    async fn is_banned(&self, _user_id: &str) -> Result<Option<bool>, StoreError> {
        Ok(None)
    }

    async fn remove_from_waitlist(&self, user_id: &str) -> Result<(), StoreError> {
        debug!(user_id = %user_id, "Profile store absent; waitlist row not removed");
        Ok(())
    }
}
