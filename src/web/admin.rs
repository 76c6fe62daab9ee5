//! Administration: user management and tickets filed on behalf of users

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::{AdminUser, AppState};
use crate::credentials::{hash_password, validate_password};
use crate::db::users::{validate_username, UserUpdate};
use crate::db::{NewTicket, Role, Ticket, User};
use crate::error::{AppError, Result};

#[derive(Debug, Deserialize)]
pub struct NewUserForm {
    pub username: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Client
}

#[derive(Debug, Deserialize)]
pub struct EditUserForm {
    pub username: String,
    pub role: Role,
    /// Empty or absent keeps the current password
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminTicketForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: String,
    /// Username of the account the ticket is filed for
    pub user: String,
}

pub async fn list_users(State(state): State<Arc<AppState>>, _admin: AdminUser) -> Result<Json<Vec<User>>> {
    Ok(Json(state.db.list_users().await?))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(form): Json<NewUserForm>,
) -> Result<(StatusCode, Json<User>)> {
    validate_username(&form.username)?;
    validate_password(&form.password)?;

    let hash = hash_password(form.password).await?;
    let user = state
        .db
        .create_user(&form.username, &hash, form.role, Utc::now())
        .await?;

    info!("Admin {} created user {} ({})", admin.username, user.username, user.role);
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(form): Json<EditUserForm>,
) -> Result<Json<User>> {
    let password_hash = match form.password.filter(|p| !p.is_empty()) {
        Some(password) => {
            validate_password(&password)?;
            Some(hash_password(password).await?)
        }
        None => None,
    };

    let update = UserUpdate {
        username: form.username,
        role: form.role,
        password_hash,
    };
    let user = state.db.update_user(id, &update).await?;

    info!("Admin {} updated user {}", admin.username, id);
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    if admin.id == id {
        return Err(AppError::validation("admins cannot delete their own account"));
    }
    state.db.delete_user(id).await?;

    info!("Admin {} deleted user {}", admin.username, id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(form): Json<AdminTicketForm>,
) -> Result<(StatusCode, Json<Ticket>)> {
    let owner = state
        .db
        .find_user_by_username(&form.user)
        .await?
        .ok_or_else(|| AppError::validation(format!("unknown user '{}'", form.user)))?;

    let new = NewTicket {
        title: form.title,
        description: form.description,
        priority: form.priority,
        owner_id: owner.id,
        owner_username: owner.username,
    };
    let ticket = state.db.create_ticket(&new, Utc::now()).await?;

    info!("Admin {} filed ticket {} for {}", admin.username, ticket.id, ticket.owner_username);
    Ok((StatusCode::CREATED, Json(ticket)))
}
