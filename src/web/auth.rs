//! Session gate: cookie → request-scoped user, plus register/login/logout

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{headers::Cookie, TypedHeader};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::AppState;
use crate::credentials::{hash_password, validate_password, verify_password};
use crate::db::users::validate_username;
use crate::db::{Role, User};
use crate::error::{AppError, Result};

/// The authenticated caller, reloaded from storage on every request so role
/// changes apply immediately
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self> {
        let TypedHeader(cookies) = TypedHeader::<Cookie>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Unauthorized)?;
        let token = cookies
            .get(&state.session.cookie_name)
            .ok_or(AppError::Unauthorized)?
            .to_string();

        let user = state
            .db
            .session_user(&token, Utc::now())
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(CurrentUser { user, token })
    }
}

/// An authenticated caller with the admin role
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self> {
        let CurrentUser { user, .. } = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

fn session_cookie(state: &AppState, token: &str, max_age_secs: i64) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        state.session.cookie_name, token, max_age_secs
    );
    if state.secure_cookies {
        cookie.push_str("; Secure");
    }
    cookie
}

#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}

/// Self-service registration, always as a client
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(form): Json<CredentialsForm>,
) -> Result<(StatusCode, Json<User>)> {
    validate_username(&form.username)?;
    validate_password(&form.password)?;

    if state.db.username_exists(&form.username).await? {
        return Err(AppError::Conflict(format!("username '{}' is already taken", form.username)));
    }

    let hash = hash_password(form.password).await?;
    let user = state
        .db
        .create_user(&form.username, &hash, Role::Client, Utc::now())
        .await?;

    info!("Registered user {}", user.username);
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(form): Json<CredentialsForm>,
) -> Result<Response> {
    let user = state
        .db
        .find_user_by_username(&form.username)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(form.password, user.password_hash.clone()).await? {
        info!("Rejected login for {}", form.username);
        return Err(AppError::Unauthorized);
    }

    let now = Utc::now();
    let ttl = Duration::hours(state.session.ttl_hours);
    state.db.purge_expired_sessions(now).await?;
    let token = state.db.create_session(user.id, now, ttl).await?;

    info!("User {} logged in", user.username);
    let cookie = session_cookie(&state, &token, ttl.num_seconds());
    Ok(([(header::SET_COOKIE, cookie)], Json(user)).into_response())
}

pub async fn logout(State(state): State<Arc<AppState>>, current: CurrentUser) -> Result<Response> {
    state.db.delete_session(&current.token).await?;
    let cookie = session_cookie(&state, "", 0);
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response())
}

pub async fn me(current: CurrentUser) -> Json<User> {
    Json(current.user)
}
