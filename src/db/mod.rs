//! Database module

mod schema;

pub mod history;
pub mod sessions;
pub mod tickets;
pub mod users;

#[cfg(test)]
pub(crate) mod test_utils;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite, Transaction};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::AppError;

pub use history::{HistoryRecord, TrackedField};
pub use tickets::{NewTicket, Ticket, TicketFields, TicketState};
pub use users::{Role, User, UserUpdate};

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let in_memory = config.url == ":memory:";
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.url))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        // WAL lets the stats readers run alongside ticket writes
        let options = if in_memory {
            options
        } else {
            options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
        if in_memory {
            // sqlx shares one named in-memory database across the pool; it lives
            // only while a connection is open, so keep one open for good
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }

        let pool = pool_options.connect_with(options).await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        for statement in schema::MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Start a write transaction. `BEGIN IMMEDIATE` takes the write lock up
    /// front so concurrent writers wait on `busy_timeout` instead of failing
    /// when a read inside the transaction is later upgraded to a write.
    pub async fn begin(&self) -> crate::error::Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> crate::error::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| AppError::Internal(format!("stored timestamp {ms} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() -> anyhow::Result<()> {
        let db = test_utils::setup_test_db().await?;
        db.run_migrations().await?;

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await?;
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(names, vec!["sessions", "ticket_history", "tickets", "users"]);
        Ok(())
    }

    #[test]
    fn test_millis_conversion() {
        let ts = DateTime::from_timestamp_millis(1_760_400_000_123).unwrap();
        assert_eq!(from_millis(to_millis(ts)).unwrap(), ts);
    }

    #[test]
    fn test_out_of_range_millis_is_an_error() {
        let err = from_millis(i64::MAX).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
