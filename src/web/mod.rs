//! Web server module

mod admin;
mod auth;
mod middleware;
mod routes;
mod tickets;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue},
    routing::{get, post, put},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer};
use tracing::info;

use crate::config::{Config, SessionConfig};
use crate::db::Database;
use crate::stats::StatsEngine;

pub use auth::{AdminUser, CurrentUser};

pub struct AppState {
    pub db: Database,
    pub stats: StatsEngine,
    pub session: SessionConfig,
    /// Mark the session cookie `Secure` (TLS deployments)
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(config: &Config, db: Database) -> Self {
        let stats = StatsEngine::new(db.clone(), Duration::from_millis(config.stats.query_timeout_ms));
        Self {
            db,
            stats,
            session: config.session.clone(),
            secure_cookies: config.tls_enabled(),
        }
    }
}

pub fn router(state: Arc<AppState>, static_dir: &str) -> Router {
    let api = Router::new()
        // Session
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        // Tickets (owner or admin)
        .route("/tickets", get(tickets::list).post(tickets::create))
        .route(
            "/tickets/:id",
            get(tickets::show).put(tickets::update).delete(tickets::remove),
        )
        .route("/tickets/:id/history", get(tickets::history))
        // Administration
        .route("/admin/users", get(admin::list_users).post(admin::create_user))
        .route("/admin/users/:id", put(admin::update_user).delete(admin::delete_user))
        .route("/admin/tickets", post(admin::create_ticket))
        // Statistics (admin)
        .route("/stats/summary", get(routes::stats_summary))
        .route("/stats/timeseries", get(routes::stats_time_series))
        .route("/stats/users", get(routes::stats_by_user));

    let mut app = Router::new()
        .route("/health", get(routes::health))
        .nest("/api", api);

    if !static_dir.is_empty() {
        app = app.nest_service("/static", ServeDir::new(static_dir));
    }

    app.layer(SetResponseHeaderLayer::overriding(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    ))
    .layer(middleware::RequestLoggingLayer::new())
    .with_state(state)
}

pub async fn start_server(config: &Config, db: Database) -> Result<()> {
    let state = Arc::new(AppState::new(config, db));
    let app = router(state, &config.server.static_dir);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.http_port).parse()?;

    if config.tls_enabled() {
        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            &config.server.tls_cert,
            &config.server.tls_key,
        )
        .await?;
        info!("Web server starting on https://{}", addr);
        axum_server::bind_rustls(addr, tls)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;
    } else {
        info!("Web server starting on http://{}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
    }

    Ok(())
}
