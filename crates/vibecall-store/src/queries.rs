//! Queries against the profile store.

use async_trait::async_trait;

use vibecall_core::time::unix_timestamp;

use crate::ProfileStore;
use crate::db::{SqliteProfileStore, StoreError};
use crate::models::Profile;

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn set_online(&self, user_id: &str, online: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE profiles SET is_online = ?, updated_at = ? WHERE user_id = ?")
            .bind(online)
            .bind(unix_timestamp())
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn is_banned(&self, user_id: &str) -> Result<Option<bool>, StoreError> {
        let profile = self.get_profile(user_id).await?;
        Ok(profile.map(|p| p.is_banned))
    }

    async fn remove_from_waitlist(&self, user_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM match_waitlist WHERE user_id = ?")
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

impl SqliteProfileStore {
    /// Fetch a profile row, if one exists.
    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let profile =
            sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(profile)
    }

    /// Create or replace a profile row.
    pub async fn upsert_profile(&self, user_id: &str, banned: bool) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO profiles (user_id, is_online, is_banned, updated_at) VALUES (?, 0, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET is_banned = excluded.is_banned, updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(banned)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Record a user on the persisted waitlist.
    pub async fn add_to_waitlist(&self, user_id: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO match_waitlist (user_id, enqueued_at) VALUES (?, ?)")
            .bind(user_id)
            .bind(unix_timestamp())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Whether any waitlist row exists for the user.
    pub async fn waitlist_contains(&self, user_id: &str) -> Result<bool, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM match_waitlist WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(self.pool())
                .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn online_flag_roundtrips() {
        let store = SqliteProfileStore::open_in_memory().await.unwrap();
        store.upsert_profile("u1", false).await.unwrap();

        store.set_online("u1", true).await.unwrap();
        assert!(store.get_profile("u1").await.unwrap().unwrap().is_online);

        store.set_online("u1", false).await.unwrap();
        assert!(!store.get_profile("u1").await.unwrap().unwrap().is_online);
    }

    #[tokio::test]
    async fn set_online_for_unknown_user_is_noop() {
        let store = SqliteProfileStore::open_in_memory().await.unwrap();
        store.set_online("ghost", true).await.unwrap();
        assert!(store.get_profile("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ban_flag_unknown_user_is_none() {
        let store = SqliteProfileStore::open_in_memory().await.unwrap();
        assert!(store.is_banned("nobody").await.unwrap().is_none());

        store.upsert_profile("u1", true).await.unwrap();
        assert_eq!(store.is_banned("u1").await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn waitlist_rows_removed() {
        let store = SqliteProfileStore::open_in_memory().await.unwrap();
        store.add_to_waitlist("u1").await.unwrap();
        store.add_to_waitlist("u1").await.unwrap();
        assert!(store.waitlist_contains("u1").await.unwrap());

        store.remove_from_waitlist("u1").await.unwrap();
        assert!(!store.waitlist_contains("u1").await.unwrap());
    }
}
