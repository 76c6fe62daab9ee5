//! Health and statistics API routes

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{AdminUser, AppState};
use crate::error::Result;
use crate::stats::{DateKind, Granularity, Summary, TimePoint, UserCount};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    /// "created" | "closed"
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    /// "day" | "week" | "month"
    #[serde(default = "default_period")]
    pub period: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RankingQuery {
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    pub limit: Option<i64>,
}

fn default_type() -> String {
    "created".to_string()
}

fn default_period() -> String {
    "day".to_string()
}

/// API: ticket totals and mean resolution time
pub async fn stats_summary(State(state): State<Arc<AppState>>, _admin: AdminUser) -> Result<Json<Summary>> {
    Ok(Json(state.stats.summary().await?))
}

/// API: ticket counts per day/week/month
pub async fn stats_time_series(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<SeriesQuery>,
) -> Result<Json<Vec<TimePoint>>> {
    let kind: DateKind = query.kind.parse()?;
    let granularity: Granularity = query.period.parse()?;
    Ok(Json(state.stats.time_series(kind, granularity, query.limit).await?))
}

/// API: users with the most tickets
pub async fn stats_by_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<RankingQuery>,
) -> Result<Json<Vec<UserCount>>> {
    let kind: DateKind = query.kind.parse()?;
    Ok(Json(state.stats.user_ranking(kind, query.limit).await?))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::db::test_utils::{new_ticket, test_time};
    use crate::db::Role;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_stats_endpoints_for_admin() -> anyhow::Result<()> {
        let (app, db) = test_app().await?;
        seed_account(&db, "root", Role::Admin).await?;
        seed_account(&db, "alice", Role::Client).await?;
        let alice = db.find_user_by_username("alice").await?.expect("alice");
        db.create_ticket(&new_ticket(&alice, "A"), test_time("2025-10-14T08:00:00Z")).await?;
        db.create_ticket(&new_ticket(&alice, "B"), test_time("2025-10-14T12:00:00Z")).await?;
        let cookie = login(&app, "root").await?;

        let (status, _, summary) = send(&app, Method::GET, "/api/stats/summary", Some(&cookie), None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            summary,
            json!({
                "total": 2,
                "open": 2,
                "closed": 0,
                "avg_resolution_minutes": 0.0
            })
        );

        let (status, _, series) = send(
            &app,
            Method::GET,
            "/api/stats/timeseries?type=created&period=day",
            Some(&cookie),
            None,
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(series, json!([{ "x": "2025-10-14", "y": 2 }]));

        let (status, _, ranking) = send(&app, Method::GET, "/api/stats/users?limit=1", Some(&cookie), None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ranking, json!([{ "user_id": alice.id, "name": "alice", "count": 2 }]));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_period_is_bad_request() -> anyhow::Result<()> {
        let (app, db) = test_app().await?;
        seed_account(&db, "root", Role::Admin).await?;
        let cookie = login(&app, "root").await?;

        let (status, _, body) = send(
            &app,
            Method::GET,
            "/api/stats/timeseries?period=fortnight",
            Some(&cookie),
            None,
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap_or_default().contains("fortnight"));

        let (status, _, _) = send(&app, Method::GET, "/api/stats/users?type=opened", Some(&cookie), None).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn test_stats_require_admin() -> anyhow::Result<()> {
        let (app, db) = test_app().await?;
        seed_account(&db, "alice", Role::Client).await?;
        let cookie = login(&app, "alice").await?;

        let (status, _, _) = send(&app, Method::GET, "/api/stats/timeseries", Some(&cookie), None).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }
}
