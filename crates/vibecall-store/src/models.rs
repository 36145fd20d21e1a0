//! Row types for the profile store.

use sqlx::FromRow;

/// The slice of a profile row the core reads and writes.
#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub user_id: String,
    pub is_online: bool,
    pub is_banned: bool,
    pub updated_at: i64,
}
