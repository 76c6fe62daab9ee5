#![allow(dead_code)]
use chrono::{DateTime, Utc};
use tracing_subscriber::EnvFilter;

use super::{Database, NewTicket, Role, User};
use crate::config::test_config;

pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

/// Fresh in-memory database with the schema applied
pub(crate) async fn setup_test_db() -> anyhow::Result<Database> {
    init_test_tracing();
    let db = Database::new(&test_config().database).await?;
    db.run_migrations().await?;
    Ok(db)
}

/// WAL database file under `dir` with a multi-connection pool
pub(crate) async fn setup_file_db(dir: &tempfile::TempDir) -> anyhow::Result<Database> {
    init_test_tracing();
    let mut config = test_config().database;
    config.url = dir.path().join("tickets.db").to_string_lossy().into_owned();
    config.max_connections = 8;
    let db = Database::new(&config).await?;
    db.run_migrations().await?;
    Ok(db)
}

pub(crate) fn test_time(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .expect("valid RFC 3339 timestamp")
        .with_timezone(&Utc)
}

/// Insert a client account with a placeholder hash
pub(crate) async fn seed_user(db: &Database, username: &str) -> anyhow::Result<User> {
    Ok(db
        .create_user(username, "not-a-real-hash", Role::Client, test_time("2025-01-01T00:00:00Z"))
        .await?)
}

pub(crate) fn new_ticket(owner: &User, title: &str) -> NewTicket {
    NewTicket {
        title: title.to_string(),
        description: String::new(),
        priority: String::new(),
        owner_id: owner.id,
        owner_username: owner.username.clone(),
    }
}
