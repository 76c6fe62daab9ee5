//! Append-only ticket history

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteExecutor;
use std::fmt;
use std::str::FromStr;

use super::{from_millis, to_millis, Database};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackedField {
    Title,
    Description,
    Priority,
    State,
}

impl TrackedField {
    pub const ALL: [TrackedField; 4] = [
        TrackedField::Title,
        TrackedField::Description,
        TrackedField::Priority,
        TrackedField::State,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedField::Title => "Title",
            TrackedField::Description => "Description",
            TrackedField::Priority => "Priority",
            TrackedField::State => "State",
        }
    }
}

impl fmt::Display for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackedField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        TrackedField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("unknown history field '{}'", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub ticket_id: i64,
    pub changed_by: String,
    pub field_name: TrackedField,
    pub old_value: String,
    pub new_value: String,
    pub changed_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: i64,
    ticket_id: i64,
    changed_by: String,
    field_name: String,
    old_value: String,
    new_value: String,
    changed_at: i64,
}

impl TryFrom<HistoryRow> for HistoryRecord {
    type Error = AppError;

    fn try_from(row: HistoryRow) -> Result<Self> {
        Ok(HistoryRecord {
            id: row.id,
            ticket_id: row.ticket_id,
            changed_by: row.changed_by,
            field_name: row.field_name.parse()?,
            old_value: row.old_value,
            new_value: row.new_value,
            changed_at: from_millis(row.changed_at)?,
        })
    }
}

/// Append one history row and return it as stored
pub async fn insert_history<'e, E>(
    executor: E,
    ticket_id: i64,
    changed_by: &str,
    field: TrackedField,
    old_value: &str,
    new_value: &str,
    changed_at: DateTime<Utc>,
) -> Result<HistoryRecord>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO ticket_history (ticket_id, changed_by, field_name, old_value, new_value, changed_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(ticket_id)
    .bind(changed_by)
    .bind(field.as_str())
    .bind(old_value)
    .bind(new_value)
    .bind(to_millis(changed_at))
    .execute(executor)
    .await?;

    Ok(HistoryRecord {
        id: result.last_insert_rowid(),
        ticket_id,
        changed_by: changed_by.to_string(),
        field_name: field,
        old_value: old_value.to_string(),
        new_value: new_value.to_string(),
        changed_at,
    })
}

impl Database {
    /// History of one ticket, most recent first
    pub async fn ticket_history(&self, ticket_id: i64) -> Result<Vec<HistoryRecord>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r#"
            SELECT id, ticket_id, changed_by, field_name, old_value, new_value, changed_at
            FROM ticket_history
            WHERE ticket_id = ?
            ORDER BY changed_at DESC, id DESC
            "#,
        )
        .bind(ticket_id)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(HistoryRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::{new_ticket, seed_user, setup_test_db, test_time};

    #[test]
    fn test_field_names_round_trip_through_storage_form() {
        for field in TrackedField::ALL {
            assert_eq!(field.as_str().parse::<TrackedField>().unwrap(), field);
        }
        assert!("title".parse::<TrackedField>().is_err());
    }

    #[tokio::test]
    async fn test_history_is_listed_newest_first() -> anyhow::Result<()> {
        let db = setup_test_db().await?;
        let user = seed_user(&db, "alice").await?;
        let ticket = db
            .create_ticket(&new_ticket(&user, "Laptop"), test_time("2025-10-14T09:00:00Z"))
            .await?;

        insert_history(
            db.pool(),
            ticket.id,
            "alice",
            TrackedField::Priority,
            "",
            "low",
            test_time("2025-10-14T10:00:00Z"),
        )
        .await?;
        insert_history(
            db.pool(),
            ticket.id,
            "admin",
            TrackedField::Priority,
            "low",
            "high",
            test_time("2025-10-15T10:00:00Z"),
        )
        .await?;

        let history = db.ticket_history(ticket.id).await?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].new_value, "high");
        assert_eq!(history[0].changed_by, "admin");
        assert_eq!(history[1].new_value, "low");
        Ok(())
    }

    #[tokio::test]
    async fn test_history_cascades_with_ticket() -> anyhow::Result<()> {
        let db = setup_test_db().await?;
        let user = seed_user(&db, "alice").await?;
        let ticket = db
            .create_ticket(&new_ticket(&user, "Laptop"), test_time("2025-10-14T09:00:00Z"))
            .await?;
        insert_history(
            db.pool(),
            ticket.id,
            "alice",
            TrackedField::Title,
            "Laptop",
            "Laptop broken",
            test_time("2025-10-14T10:00:00Z"),
        )
        .await?;

        db.delete_ticket(ticket.id).await?;

        let remaining: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ticket_history WHERE ticket_id = ?")
            .bind(ticket.id)
            .fetch_one(db.pool())
            .await?;
        assert_eq!(remaining.0, 0);
        Ok(())
    }
}
