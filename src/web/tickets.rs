//! Ticket endpoints for owners and admins

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use super::{AppState, CurrentUser};
use crate::audit::{record_ticket_edit, EditOutcome};
use crate::db::{HistoryRecord, NewTicket, Ticket, TicketFields, User};
use crate::error::{AppError, Result};

/// Admins see every ticket, clients only their own
fn ensure_can_access(user: &User, ticket: &Ticket) -> Result<()> {
    if user.is_admin() || ticket.is_owned_by(user.id) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

async fn load_accessible(state: &AppState, user: &User, id: i64) -> Result<Ticket> {
    let ticket = state.db.get_ticket(id).await?;
    ensure_can_access(user, &ticket)?;
    Ok(ticket)
}

#[derive(Debug, Deserialize)]
pub struct SubmitTicket {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: String,
}

pub async fn list(State(state): State<Arc<AppState>>, current: CurrentUser) -> Result<Json<Vec<Ticket>>> {
    let tickets = if current.user.is_admin() {
        state.db.list_tickets().await?
    } else {
        state.db.list_tickets_for_owner(current.user.id).await?
    };
    Ok(Json(tickets))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(form): Json<SubmitTicket>,
) -> Result<(StatusCode, Json<Ticket>)> {
    let new = NewTicket {
        title: form.title,
        description: form.description,
        priority: form.priority,
        owner_id: current.user.id,
        owner_username: current.user.username.clone(),
    };
    let ticket = state.db.create_ticket(&new, Utc::now()).await?;
    tracing::info!("Ticket {} submitted by {}", ticket.id, current.user.username);
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn show(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Ticket>> {
    Ok(Json(load_accessible(&state, &current.user, id).await?))
}

/// Edit the audited fields; every change lands in the ticket history
pub async fn update(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(fields): Json<TicketFields>,
) -> Result<Json<EditOutcome>> {
    load_accessible(&state, &current.user, id).await?;
    let outcome = record_ticket_edit(&state.db, id, &current.user.username, &fields, Utc::now()).await?;
    Ok(Json(outcome))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    load_accessible(&state, &current.user, id).await?;
    state.db.delete_ticket(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<HistoryRecord>>> {
    load_accessible(&state, &current.user, id).await?;
    Ok(Json(state.db.ticket_history(id).await?))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::db::Role;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_submit_edit_and_read_history() -> anyhow::Result<()> {
        let (app, db) = test_app().await?;
        seed_account(&db, "alice", Role::Client).await?;
        let cookie = login(&app, "alice").await?;

        let (status, _, ticket) = send(
            &app,
            Method::POST,
            "/api/tickets",
            Some(&cookie),
            Some(json!({ "title": "Monitor flickers" })),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(ticket["state"], "open");
        assert_eq!(ticket["owner_username"], "alice");
        let id = ticket["id"].as_i64().expect("ticket id");

        let (status, _, outcome) = send(
            &app,
            Method::PUT,
            &format!("/api/tickets/{id}"),
            Some(&cookie),
            Some(json!({
                "title": "Monitor flickers constantly",
                "description": "Since Monday",
                "priority": "high",
                "state": "open"
            })),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["history"].as_array().map(Vec::len), Some(3));
        assert_eq!(outcome["ticket"]["priority"], "high");

        let (status, _, history) = send(
            &app,
            Method::GET,
            &format!("/api/tickets/{id}/history"),
            Some(&cookie),
            None,
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        let fields: Vec<&str> = history
            .as_array()
            .expect("history list")
            .iter()
            .filter_map(|h| h["field_name"].as_str())
            .collect();
        assert_eq!(fields, vec!["Priority", "Description", "Title"]);
        assert_eq!(history[2]["old_value"], "Monitor flickers");
        assert_eq!(history[2]["changed_by"], "alice");
        Ok(())
    }

    #[tokio::test]
    async fn test_closing_through_api_sets_closed_at() -> anyhow::Result<()> {
        let (app, db) = test_app().await?;
        seed_account(&db, "alice", Role::Client).await?;
        let cookie = login(&app, "alice").await?;

        let (_, _, ticket) = send(
            &app,
            Method::POST,
            "/api/tickets",
            Some(&cookie),
            Some(json!({ "title": "Badge reader" })),
        )
        .await?;
        let id = ticket["id"].as_i64().expect("ticket id");
        assert!(ticket["closed_at"].is_null());

        let (_, _, outcome) = send(
            &app,
            Method::PUT,
            &format!("/api/tickets/{id}"),
            Some(&cookie),
            Some(json!({ "title": "Badge reader", "state": "closed" })),
        )
        .await?;
        assert!(outcome["ticket"]["closed_at"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_state_is_rejected() -> anyhow::Result<()> {
        let (app, db) = test_app().await?;
        seed_account(&db, "alice", Role::Client).await?;
        let cookie = login(&app, "alice").await?;
        let (_, _, ticket) = send(
            &app,
            Method::POST,
            "/api/tickets",
            Some(&cookie),
            Some(json!({ "title": "Keyboard" })),
        )
        .await?;
        let id = ticket["id"].as_i64().expect("ticket id");

        let (status, _, _) = send(
            &app,
            Method::PUT,
            &format!("/api/tickets/{id}"),
            Some(&cookie),
            Some(json!({ "title": "Keyboard", "state": "resolved" })),
        )
        .await?;
        assert!(status.is_client_error());
        assert!(db.ticket_history(id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_clients_cannot_touch_other_tickets() -> anyhow::Result<()> {
        let (app, db) = test_app().await?;
        seed_account(&db, "alice", Role::Client).await?;
        seed_account(&db, "mallory", Role::Client).await?;
        let alice = login(&app, "alice").await?;
        let mallory = login(&app, "mallory").await?;

        let (_, _, ticket) = send(
            &app,
            Method::POST,
            "/api/tickets",
            Some(&alice),
            Some(json!({ "title": "Private" })),
        )
        .await?;
        let id = ticket["id"].as_i64().expect("ticket id");

        for (method, uri) in [
            (Method::GET, format!("/api/tickets/{id}")),
            (Method::GET, format!("/api/tickets/{id}/history")),
            (Method::DELETE, format!("/api/tickets/{id}")),
        ] {
            let (status, _, _) = send(&app, method, &uri, Some(&mallory), None).await?;
            assert_eq!(status, StatusCode::FORBIDDEN);
        }

        let (_, _, listed) = send(&app, Method::GET, "/api/tickets", Some(&mallory), None).await?;
        assert_eq!(listed.as_array().map(Vec::len), Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn test_owner_can_delete_and_missing_is_not_found() -> anyhow::Result<()> {
        let (app, db) = test_app().await?;
        seed_account(&db, "alice", Role::Client).await?;
        let cookie = login(&app, "alice").await?;
        let (_, _, ticket) = send(
            &app,
            Method::POST,
            "/api/tickets",
            Some(&cookie),
            Some(json!({ "title": "Old laptop" })),
        )
        .await?;
        let id = ticket["id"].as_i64().expect("ticket id");

        let (status, _, _) = send(&app, Method::DELETE, &format!("/api/tickets/{id}"), Some(&cookie), None).await?;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _, _) = send(&app, Method::GET, &format!("/api/tickets/{id}"), Some(&cookie), None).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }
}
