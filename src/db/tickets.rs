//! Tickets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteExecutor;
use std::fmt;
use std::str::FromStr;

use super::{from_millis, to_millis, Database};
use crate::error::{AppError, Result};

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 10_000;
const MAX_PRIORITY_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    Open,
    InProgress,
    Closed,
}

impl TicketState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketState::Open => "open",
            TicketState::InProgress => "in_progress",
            TicketState::Closed => "closed",
        }
    }
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(TicketState::Open),
            "in_progress" => Ok(TicketState::InProgress),
            "closed" => Ok(TicketState::Closed),
            other => Err(AppError::validation(format!("unknown ticket state '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub owner_id: Option<i64>,
    pub owner_username: String,
    pub state: TicketState,
    pub priority: String,
    pub created_at: DateTime<Utc>,
    /// Set iff `state == Closed`
    pub closed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn fields(&self) -> TicketFields {
        TicketFields {
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority.clone(),
            state: self.state,
        }
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.owner_id == Some(user_id)
    }
}

/// The editable, audited part of a ticket
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TicketFields {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: String,
    pub state: TicketState,
}

impl TicketFields {
    pub fn validate(&self) -> Result<()> {
        validate_content(&self.title, &self.description, &self.priority)
    }
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub owner_id: i64,
    pub owner_username: String,
}

pub fn validate_content(title: &str, description: &str, priority: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(AppError::validation("title is required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::validation(format!("title must be at most {} characters", MAX_TITLE_LEN)));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(AppError::validation(format!(
            "description must be at most {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    if priority.chars().count() > MAX_PRIORITY_LEN {
        return Err(AppError::validation(format!(
            "priority must be at most {} characters",
            MAX_PRIORITY_LEN
        )));
    }
    Ok(())
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: i64,
    title: String,
    description: String,
    owner_id: Option<i64>,
    owner_username: String,
    state: String,
    priority: String,
    created_at: i64,
    closed_at: Option<i64>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = AppError;

    fn try_from(row: TicketRow) -> Result<Self> {
        Ok(Ticket {
            id: row.id,
            title: row.title,
            description: row.description,
            owner_id: row.owner_id,
            owner_username: row.owner_username,
            state: row.state.parse()?,
            priority: row.priority,
            created_at: from_millis(row.created_at)?,
            closed_at: row.closed_at.map(from_millis).transpose()?,
        })
    }
}

const SELECT_TICKET: &str = r#"
SELECT id, title, description, owner_id, owner_username, state, priority, created_at, closed_at
FROM tickets
"#;

/// Load one ticket through any executor (pool or open transaction)
pub async fn fetch_ticket<'e, E>(executor: E, id: i64) -> Result<Option<Ticket>>
where
    E: SqliteExecutor<'e>,
{
    let row: Option<TicketRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_TICKET))
        .bind(id)
        .fetch_optional(executor)
        .await?;
    row.map(Ticket::try_from).transpose()
}

/// Overwrite the audited fields and the closure timestamp
pub async fn store_fields<'e, E>(
    executor: E,
    id: i64,
    fields: &TicketFields,
    closed_at: Option<DateTime<Utc>>,
) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE tickets
        SET title = ?, description = ?, priority = ?, state = ?, closed_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(&fields.priority)
    .bind(fields.state.as_str())
    .bind(closed_at.map(to_millis))
    .bind(id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("ticket", id));
    }
    Ok(())
}

impl Database {
    /// Insert a ticket in state `open`
    pub async fn create_ticket(&self, ticket: &NewTicket, now: DateTime<Utc>) -> Result<Ticket> {
        validate_content(&ticket.title, &ticket.description, &ticket.priority)?;

        let result = sqlx::query(
            r#"
            INSERT INTO tickets (title, description, owner_id, owner_username, state, priority, created_at, closed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(&ticket.title)
        .bind(&ticket.description)
        .bind(ticket.owner_id)
        .bind(&ticket.owner_username)
        .bind(TicketState::Open.as_str())
        .bind(&ticket.priority)
        .bind(to_millis(now))
        .execute(self.pool())
        .await?;

        self.get_ticket(result.last_insert_rowid()).await
    }

    pub async fn get_ticket(&self, id: i64) -> Result<Ticket> {
        fetch_ticket(self.pool(), id)
            .await?
            .ok_or_else(|| AppError::not_found("ticket", id))
    }

    pub async fn list_tickets(&self) -> Result<Vec<Ticket>> {
        let rows: Vec<TicketRow> =
            sqlx::query_as(&format!("{} ORDER BY created_at DESC, id DESC", SELECT_TICKET))
                .fetch_all(self.pool())
                .await?;
        rows.into_iter().map(Ticket::try_from).collect()
    }

    pub async fn list_tickets_for_owner(&self, owner_id: i64) -> Result<Vec<Ticket>> {
        let rows: Vec<TicketRow> = sqlx::query_as(&format!(
            "{} WHERE owner_id = ? ORDER BY created_at DESC, id DESC",
            SELECT_TICKET
        ))
        .bind(owner_id)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(Ticket::try_from).collect()
    }

    /// Delete a ticket; its history rows cascade
    pub async fn delete_ticket(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM tickets WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("ticket", id));
        }
        tracing::info!("Deleted ticket {}", id);
        Ok(())
    }
}
