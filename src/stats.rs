//! Ticket statistics: summary counts, time-bucketed series and per-user ranking
//!
//! All queries are read-only and run on the shared pool without taking write
//! locks, so a dashboard refresh can race a ticket edit and still return a
//! valid snapshot. Each query runs under a deadline.

use serde::Serialize;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use crate::db::Database;
use crate::error::{AppError, Result};

pub const DEFAULT_RANKING_LIMIT: i64 = 10;

/// Which ticket timestamp a series or ranking is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    Created,
    Closed,
}

impl DateKind {
    fn column(&self) -> &'static str {
        match self {
            DateKind::Created => "created_at",
            DateKind::Closed => "closed_at",
        }
    }
}

impl FromStr for DateKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "created" => Ok(DateKind::Created),
            "closed" => Ok(DateKind::Closed),
            other => Err(AppError::validation(format!(
                "unknown date type '{}', expected 'created' or 'closed'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    pub fn default_limit(&self) -> i64 {
        match self {
            Granularity::Day => 30,
            Granularity::Week => 26,
            Granularity::Month => 12,
        }
    }

    /// SQL expression labelling a millisecond timestamp column with its bucket.
    /// Weeks are labelled with the Monday that starts them.
    fn bucket_expr(&self, column: &str) -> String {
        match self {
            Granularity::Day => format!("strftime('%Y-%m-%d', {} / 1000, 'unixepoch')", column),
            Granularity::Week => format!("date({} / 1000, 'unixepoch', '-6 days', 'weekday 1')", column),
            Granularity::Month => format!("strftime('%Y-%m-01', {} / 1000, 'unixepoch')", column),
        }
    }
}

impl FromStr for Granularity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            other => Err(AppError::validation(format!(
                "unknown period '{}', expected 'day', 'week' or 'month'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total: i64,
    /// Open or in progress
    pub open: i64,
    pub closed: i64,
    pub avg_resolution_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimePoint {
    /// Bucket label, e.g. "2025-10-14"
    pub x: String,
    pub y: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserCount {
    pub user_id: i64,
    pub name: String,
    pub count: i64,
}

fn resolve_limit(requested: Option<i64>, default: i64) -> i64 {
    match requested {
        Some(n) if n > 0 => n,
        _ => default,
    }
}

async fn with_deadline<T, F>(deadline: Duration, query: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(deadline, query)
        .await
        .map_err(|_| AppError::Timeout)?
}

#[derive(Clone)]
pub struct StatsEngine {
    db: Database,
    deadline: Duration,
}

impl StatsEngine {
    pub fn new(db: Database, deadline: Duration) -> Self {
        Self { db, deadline }
    }

    /// Totals plus mean resolution time of closed tickets (0 when none are closed)
    pub async fn summary(&self) -> Result<Summary> {
        with_deadline(self.deadline, async {
            let (total, open, closed, avg_resolution_minutes): (i64, i64, i64, f64) = sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN state IN ('open', 'in_progress') THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN state = 'closed' THEN 1 ELSE 0 END), 0),
                    COALESCE(AVG(CASE WHEN state = 'closed' AND closed_at IS NOT NULL
                                      THEN (closed_at - created_at) / 60000.0 END), 0.0)
                FROM tickets
                "#,
            )
            .fetch_one(self.db.pool())
            .await?;

            Ok::<_, AppError>(Summary {
                total,
                open,
                closed,
                avg_resolution_minutes,
            })
        })
        .await
    }

    /// Ticket counts per bucket, ascending. Keeps the `limit` most recent
    /// buckets (granularity default when absent or non-positive); older
    /// dashboards truncated to the oldest buckets instead.
    pub async fn time_series(
        &self,
        kind: DateKind,
        granularity: Granularity,
        limit: Option<i64>,
    ) -> Result<Vec<TimePoint>> {
        let limit = resolve_limit(limit, granularity.default_limit());
        let column = kind.column();
        let query = format!(
            r#"
            SELECT x, y FROM (
                SELECT {bucket} AS x, COUNT(*) AS y
                FROM tickets
                WHERE {column} IS NOT NULL
                GROUP BY x
                ORDER BY x DESC
                LIMIT ?
            )
            ORDER BY x ASC
            "#,
            bucket = granularity.bucket_expr(column),
            column = column,
        );

        with_deadline(self.deadline, async {
            let rows: Vec<(String, i64)> = sqlx::query_as(&query)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?;
            Ok::<_, AppError>(rows.into_iter().map(|(x, y)| TimePoint { x, y }).collect())
        })
        .await
    }

    /// Users ranked by how many of their tickets have the chosen timestamp set
    pub async fn user_ranking(&self, kind: DateKind, limit: Option<i64>) -> Result<Vec<UserCount>> {
        let limit = resolve_limit(limit, DEFAULT_RANKING_LIMIT);
        let query = format!(
            r#"
            SELECT u.id, u.username, COUNT(*) AS count
            FROM tickets t
            JOIN users u ON u.id = t.owner_id
            WHERE t.{} IS NOT NULL
            GROUP BY u.id, u.username
            ORDER BY count DESC, u.username ASC
            LIMIT ?
            "#,
            kind.column()
        );

        with_deadline(self.deadline, async {
            let rows: Vec<(i64, String, i64)> = sqlx::query_as(&query)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?;
            Ok::<_, AppError>(rows
                .into_iter()
                .map(|(user_id, name, count)| UserCount { user_id, name, count })
                .collect())
        })
        .await
    }
}
