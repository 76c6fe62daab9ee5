//! Server-side login sessions referenced by the session cookie

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{to_millis, users::User, Database};
use crate::error::Result;

impl Database {
    /// Open a session for `user_id` and return its token
    pub async fn create_session(&self, user_id: i64, now: DateTime<Utc>, ttl: Duration) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
            .bind(&token)
            .bind(user_id)
            .bind(to_millis(now))
            .bind(to_millis(now + ttl))
            .execute(self.pool())
            .await?;
        Ok(token)
    }

    /// Resolve a live session token to its user
    pub async fn session_user(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT user_id FROM sessions WHERE token = ? AND expires_at > ?")
                .bind(token)
                .bind(to_millis(now))
                .fetch_optional(self.pool())
                .await?;

        match row {
            Some((user_id,)) => self.find_user_by_id(user_id).await,
            None => Ok(None),
        }
    }

    pub async fn delete_session(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Drop expired sessions, returning how many were removed
    pub async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(to_millis(now))
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
