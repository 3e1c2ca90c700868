//! User profile endpoints.
//!
//! - GET `/me` - The authenticated user's profile
//! - GET `/` - All users (admin only)
//! - GET `/{id}` - One user's profile
//! - PUT `/{id}` - Edit nickname and name (the user themselves only)
//! - DELETE `/{id}` - Delete an account and its session (the user themselves or an admin)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::{MAX_NAME_LENGTH, MAX_NICKNAME_LENGTH, validate_field};
use super::error::{ApiError, ResultExt};
use crate::auth::{AdminOnly, Auth, HasDatabase, LoginUser};
use crate::db::{Database, User, UserRole};

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
}

impl HasDatabase for UsersState {
    fn db(&self) -> &Database {
        &self.db
    }
}

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/me", get(me))
        .route("/{id}", get(get_user).put(edit_user).delete(delete_user))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    id: i64,
    username: String,
    nickname: String,
    name: String,
    role: UserRole,
    created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            nickname: user.nickname,
            name: user.name,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditUserRequest {
    nickname: String,
    name: String,
}

async fn find_user(db: &Database, id: i64) -> Result<User, ApiError> {
    db.users()
        .get_by_id(id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

async fn me(LoginUser(user): LoginUser) -> Json<UserResponse> {
    Json(user.into())
}

async fn list_users(
    State(state): State<UsersState>,
    AdminOnly(_admin): AdminOnly,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.db.users().list().await.db_err("Failed to list users")?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

async fn get_user(
    State(state): State<UsersState>,
    Auth(_principal): Auth,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = find_user(&state.db, id).await?;
    Ok(Json(user.into()))
}

async fn edit_user(
    State(state): State<UsersState>,
    Auth(principal): Auth,
    Path(id): Path<i64>,
    Json(payload): Json<EditUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = find_user(&state.db, id).await?;
    if user.username != principal.subject() {
        return Err(ApiError::forbidden("You can only edit your own account"));
    }

    validate_field(&payload.nickname, "Nickname", MAX_NICKNAME_LENGTH)?;
    validate_field(&payload.name, "Name", MAX_NAME_LENGTH)?;

    let updated = state
        .db
        .users()
        .update_profile(id, payload.nickname.trim(), payload.name.trim())
        .await
        .map_err(|e| ApiError::user_write_error("Failed to update user", e))?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    info!(username = %user.username, "User profile updated");
    let user = find_user(&state.db, id).await?;
    Ok(Json(user.into()))
}

async fn delete_user(
    State(state): State<UsersState>,
    Auth(principal): Auth,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user = find_user(&state.db, id).await?;

    let is_self = user.username == principal.subject();
    let is_admin = principal.has_authority(UserRole::Admin.as_str());
    if !is_self && !is_admin {
        return Err(ApiError::forbidden("You can only delete your own account"));
    }

    let deleted = state
        .db
        .users()
        .delete(user.id)
        .await
        .db_err("Failed to delete user")?;
    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    // After the user row is gone, sign-in can no longer recreate it
    state
        .db
        .refresh_tokens()
        .delete(&user.username)
        .await
        .db_err("Failed to delete refresh token")?;

    info!(
        username = %user.username,
        deleted_by = %principal.subject(),
        "User deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}
