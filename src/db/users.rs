//! User accounts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{from_millis, to_millis, Database};
use crate::error::{AppError, Result};

const MAX_USERNAME_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    // Older rows were written as "Admin" / "Client"
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "client" => Ok(Role::Client),
            other => Err(AppError::validation(format!("unknown role '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    role: String,
    created_at: i64,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            role: row.role.parse()?,
            created_at: from_millis(row.created_at)?,
        })
    }
}

/// Admin edit of an account. `password_hash: None` keeps the current hash.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub username: String,
    pub role: Role,
    pub password_hash: Option<String>,
}

pub fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(AppError::validation("username is required"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::validation(format!(
            "username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(AppError::validation("username cannot contain whitespace"));
    }
    Ok(())
}

fn map_unique_violation(err: sqlx::Error, username: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(format!("username '{}' is already taken", username))
        }
        _ => AppError::Storage(err),
    }
}

const SELECT_USER: &str = "SELECT id, username, password_hash, role, created_at FROM users";

impl Database {
    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<User> {
        validate_username(username)?;

        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(to_millis(now))
        .execute(self.pool())
        .await
        .map_err(|e| map_unique_violation(e, username))?;

        let id = result.last_insert_rowid();
        self.find_user_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("user", id))
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_USER))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(User::try_from).transpose()
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{} WHERE username = ?", SELECT_USER))
            .bind(username)
            .fetch_optional(self.pool())
            .await?;
        row.map(User::try_from).transpose()
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(self.pool())
            .await?;
        Ok(row.0 > 0)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!("{} ORDER BY id", SELECT_USER))
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    pub async fn admin_exists(&self) -> Result<bool> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE lower(role) = 'admin'")
            .fetch_one(self.pool())
            .await?;
        Ok(row.0 > 0)
    }

    /// Apply an admin edit. A rename is copied onto the tickets the user owns
    /// in the same transaction.
    pub async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User> {
        validate_username(&update.username)?;

        let mut tx = self.begin().await?;

        let result = match &update.password_hash {
            Some(hash) => {
                sqlx::query("UPDATE users SET username = ?, role = ?, password_hash = ? WHERE id = ?")
                    .bind(&update.username)
                    .bind(update.role.as_str())
                    .bind(hash)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
            }
            None => {
                sqlx::query("UPDATE users SET username = ?, role = ? WHERE id = ?")
                    .bind(&update.username)
                    .bind(update.role.as_str())
                    .bind(id)
                    .execute(&mut *tx)
                    .await
            }
        }
        .map_err(|e| map_unique_violation(e, &update.username))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("user", id));
        }

        sqlx::query("UPDATE tickets SET owner_username = ? WHERE owner_id = ?")
            .bind(&update.username)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.find_user_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("user", id))
    }

    /// Delete an account. Its sessions go with it; its tickets keep the
    /// display name but lose the owner reference.
    pub async fn delete_user(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("user", id));
        }
        Ok(())
    }
}
