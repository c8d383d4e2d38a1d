use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;

use super::guard::{guard_mutation, require_session};
use crate::db;
use crate::error::{AppError, AppResult, OptionExt};
use crate::middleware::{
    ip::ClientKey,
    session::{AdminSession, MaybeAdminSession},
};
use crate::password;
use crate::state::AppState;
use crate::types::{
    CredentialsRequest, OkResponse, PasswordChangeRequest, UserDto, UserRecord, UserResponse, UsersResponse,
};

const INSERT_USER: &str = "INSERT INTO users (id, username, password_hash) VALUES (?, ?, ?)";
const INSERT_FIRST_USER: &str =
    "INSERT INTO users (id, username, password_hash) SELECT ?, ?, ? WHERE NOT EXISTS (SELECT 1 FROM users)";

const MAX_USERNAME_LEN: usize = 64;
// Argon2 cost grows with input; keep attacker-supplied passwords bounded.
const MAX_PASSWORD_LEN: usize = 1024;

fn validate_username(username: &str) -> AppResult<()> {
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::ValidationError {
            field: "username".to_string(),
            message: format!("must be at most {} characters", MAX_USERNAME_LEN),
        });
    }
    if username.chars().any(|c| c.is_control()) {
        return Err(AppError::ValidationError {
            field: "username".to_string(),
            message: "must not contain control characters".to_string(),
        });
    }
    Ok(())
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::ValidationError {
            field: "password".to_string(),
            message: format!("must be at most {} bytes", MAX_PASSWORD_LEN),
        });
    }
    Ok(())
}

/// `GET /api/admin/users`
pub async fn list_users(State(state): State<AppState>, _session: AdminSession) -> AppResult<Json<UsersResponse>> {
    let users = sqlx::query_as::<_, UserRecord>(
        "SELECT id, username, password_hash, created_at FROM users ORDER BY username ASC",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(UsersResponse { users: users.into_iter().map(UserDto::from).collect() }))
}

/// `POST /api/admin/users`
///
/// Needs a session, except while no account exists yet so a fresh deployment can create its
/// first administrator.
pub async fn create_user(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    MaybeAdminSession(session): MaybeAdminSession,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    guard_mutation(&state, "usercreate", state.config.rate_limits.user_create, &client, &headers).await?;

    let bootstrap = session.is_none();
    let actor = match session {
        Some(claims) => claims.username,
        None => {
            if db::count_users(&state.db).await? > 0 {
                return Err(AppError::Unauthorized("Not authenticated".to_string()));
            }
            "<bootstrap>".to_string()
        }
    };

    let req: CredentialsRequest = serde_json::from_slice(&body).unwrap_or_default();
    let username = req.username.trim().to_string();
    if username.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest("Missing fields".to_string()));
    }
    validate_username(&username)?;
    validate_password(&req.password)?;

    let password_hash = password::hash_password(req.password).await?;
    let id = Uuid::new_v4().to_string();
    // Without a session the emptiness check and the insert must be one statement; the count
    // above only skips hashing for the common case.
    let insert = if bootstrap { INSERT_FIRST_USER } else { INSERT_USER };
    let result = sqlx::query(insert)
        .bind(&id)
        .bind(&username)
        .bind(&password_hash)
        .execute(&state.db)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict("Username already exists".to_string()),
            other => other,
        })?;
    if result.rows_affected() == 0 {
        tracing::warn!(%client, "Bootstrap account creation lost the race; an account already exists");
        return Err(AppError::Unauthorized("Not authenticated".to_string()));
    }
    if bootstrap {
        tracing::warn!(%client, user = %username, "Created first admin account without a session (bootstrap)");
    }

    tracing::info!(%actor, user = %username, "Admin account created");
    Ok((StatusCode::CREATED, Json(UserResponse { user: UserDto { id, username, created_at: None } })))
}

/// `PATCH /api/admin/users/{id}`: sets a new password.
pub async fn update_password(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ClientKey(client): ClientKey,
    MaybeAdminSession(session): MaybeAdminSession,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<OkResponse>> {
    guard_mutation(&state, "userpw", state.config.rate_limits.user_update, &client, &headers).await?;
    let actor = require_session(session)?;

    let req: PasswordChangeRequest = serde_json::from_slice(&body).unwrap_or_default();
    if req.password.is_empty() {
        return Err(AppError::BadRequest("Missing password".to_string()));
    }
    validate_password(&req.password)?;

    let password_hash = password::hash_password(req.password).await?;
    let result = sqlx::query(
        "UPDATE users SET password_hash = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now') WHERE id = ?",
    )
    .bind(&password_hash)
    .bind(&id)
    .execute(&state.db)
    .await?;
    (result.rows_affected() > 0).then_some(()).ok_or_not_found("User")?;

    tracing::info!(actor = %actor.username, user_id = %id, "Admin password changed");
    Ok(Json(OkResponse::ok()))
}

/// `DELETE /api/admin/users/{id}`
///
/// The last remaining account cannot be deleted; an empty table would reopen sessionless
/// bootstrap. Sessions already issued to a deleted account stay valid until they expire.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ClientKey(client): ClientKey,
    MaybeAdminSession(session): MaybeAdminSession,
    headers: HeaderMap,
) -> AppResult<Json<OkResponse>> {
    guard_mutation(&state, "userdel", state.config.rate_limits.user_delete, &client, &headers).await?;
    let actor = require_session(session)?;

    let result = sqlx::query("DELETE FROM users WHERE id = ? AND (SELECT COUNT(*) FROM users) > 1")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        let exists = sqlx::query_scalar::<_, i64>("SELECT 1 FROM users WHERE id = ?")
            .bind(&id)
            .fetch_optional(&state.db)
            .await?;
        exists.ok_or_not_found("User")?;
        return Err(AppError::Conflict("Cannot delete the last admin account".to_string()));
    }

    tracing::info!(actor = %actor.username, user_id = %id, "Admin account deleted");
    Ok(Json(OkResponse::ok()))
}
