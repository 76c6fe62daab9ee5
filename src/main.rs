//! ticketdesk - internal support ticketing service
//!
//! Users register, submit tickets and follow them; administrators triage them.
//! - Field-level audit history for every ticket edit
//! - Dashboard statistics (summary, time series, per-user ranking)
//! - JSON API with cookie sessions

mod audit;
mod config;
mod credentials;
mod db;
mod error;
mod stats;
mod web;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{BootstrapConfig, Config};
use crate::db::{Database, Role};

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.to_lowercase()));

    // LOG_FORMAT=gcp overrides the file setting for Cloud Logging deployments
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| config.logging.format.clone());
    if log_format == "gcp" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Create the configured admin account unless an admin already exists
async fn bootstrap_admin(db: &Database, bootstrap: &BootstrapConfig) -> Result<()> {
    if !bootstrap.is_configured() {
        return Ok(());
    }
    if db.admin_exists().await? {
        info!("Admin account present, skipping bootstrap");
        return Ok(());
    }
    if db.username_exists(&bootstrap.admin_username).await? {
        warn!(
            "Bootstrap admin '{}' exists as a non-admin account, leaving it untouched",
            bootstrap.admin_username
        );
        return Ok(());
    }

    credentials::validate_password(&bootstrap.admin_password)?;
    let hash = credentials::hash_password(bootstrap.admin_password.clone()).await?;
    db.create_user(&bootstrap.admin_username, &hash, Role::Admin, Utc::now())
        .await?;
    info!("Created bootstrap admin '{}'", bootstrap.admin_username);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;
    init_logging(&config);
    info!("Starting ticketdesk...");

    let db = Database::new(&config.database).await?;
    db.run_migrations().await?;
    info!("Database initialized");

    bootstrap_admin(&db, &config.bootstrap).await?;

    // Blocks until the server stops
    web::start_server(&config, db).await?;

    Ok(())
}
