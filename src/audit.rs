//! Ticket audit engine
//!
//! Every edit of a ticket is diffed field by field against the stored row.
//! Each differing field produces one history record, and the history inserts
//! plus the ticket update commit together or not at all.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::db::history::insert_history;
use crate::db::tickets::{fetch_ticket, store_fields};
use crate::db::{Database, HistoryRecord, Ticket, TicketFields, TicketState, TrackedField};
use crate::error::{AppError, Result};

/// One field whose value differs between the stored and the proposed ticket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: TrackedField,
    pub old_value: String,
    pub new_value: String,
}

/// Result of a committed edit
#[derive(Debug, Clone, Serialize)]
pub struct EditOutcome {
    pub ticket: Ticket,
    pub history: Vec<HistoryRecord>,
}

fn field_value(fields: &TicketFields, field: TrackedField) -> &str {
    match field {
        TrackedField::Title => &fields.title,
        TrackedField::Description => &fields.description,
        TrackedField::Priority => &fields.priority,
        TrackedField::State => fields.state.as_str(),
    }
}

/// Compare the four tracked fields as strings, in a fixed order
pub fn diff_fields(old: &TicketFields, new: &TicketFields) -> Vec<FieldChange> {
    TrackedField::ALL
        .into_iter()
        .filter_map(|field| {
            let old_value = field_value(old, field);
            let new_value = field_value(new, field);
            (old_value != new_value).then(|| FieldChange {
                field,
                old_value: old_value.to_string(),
                new_value: new_value.to_string(),
            })
        })
        .collect()
}

/// Closure timestamp the ticket must carry once it moves to `new_state`.
///
/// A ticket that stays closed keeps its original closure time.
pub fn closed_at_after(current: &Ticket, new_state: TicketState, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match new_state {
        TicketState::Closed => match (current.state, current.closed_at) {
            (TicketState::Closed, Some(closed_at)) => Some(closed_at),
            _ => Some(now),
        },
        TicketState::Open | TicketState::InProgress => None,
    }
}

/// Apply `new_fields` to ticket `ticket_id` on behalf of `editor`, writing one
/// history row per changed field. Nothing is written when the ticket does not
/// exist or the fields fail validation.
pub async fn record_ticket_edit(
    db: &Database,
    ticket_id: i64,
    editor: &str,
    new_fields: &TicketFields,
    now: DateTime<Utc>,
) -> Result<EditOutcome> {
    new_fields.validate()?;

    let mut tx = db.begin().await?;

    let current = fetch_ticket(&mut *tx, ticket_id)
        .await?
        .ok_or_else(|| AppError::not_found("ticket", ticket_id))?;

    let changes = diff_fields(&current.fields(), new_fields);
    let mut history = Vec::with_capacity(changes.len());
    for change in &changes {
        let record = insert_history(
            &mut *tx,
            ticket_id,
            editor,
            change.field,
            &change.old_value,
            &change.new_value,
            now,
        )
        .await?;
        debug!("Ticket {} {}: '{}' -> '{}'", ticket_id, change.field, change.old_value, change.new_value);
        history.push(record);
    }

    let closed_at = closed_at_after(&current, new_fields.state, now);
    store_fields(&mut *tx, ticket_id, new_fields, closed_at).await?;

    let ticket = fetch_ticket(&mut *tx, ticket_id)
        .await?
        .ok_or_else(|| AppError::not_found("ticket", ticket_id))?;

    tx.commit().await?;

    info!("Ticket {} edited by {} ({} field(s) changed)", ticket_id, editor, history.len());

    Ok(EditOutcome { ticket, history })
}
