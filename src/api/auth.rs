//! Credential and token endpoints.
//!
//! - POST `/sign-up` - Create a user
//! - POST `/sign-in` - Exchange credentials for a token pair
//! - POST `/reissue` - Exchange an expired access token and the current refresh token for a new pair
//! - POST `/logout` - Drop the caller's refresh token

use axum::{
    Json, Router, extract::State, http::StatusCode, middleware, response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{ApiError, ResultExt};
use crate::auth::{Argon2Passwords, Auth, PasswordVerifier, Principal, ReissueProtocol};
use crate::db::{Database, NewUser, RefreshTokenRecord, UserRole};
use crate::jwt::{JwtConfig, TokenPair};
use crate::rate_limit::{RateLimitConfig, rate_limit_credentials};

/// Grant type reported with every token pair.
pub const GRANT_TYPE: &str = "bearer";

const MAX_USERNAME_LENGTH: usize = 32;
pub(super) const MAX_NICKNAME_LENGTH: usize = 32;
pub(super) const MAX_NAME_LENGTH: usize = 64;
const MAX_PASSWORD_LENGTH: usize = 128;

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub passwords: Argon2Passwords,
    pub reissue: ReissueProtocol,
}

pub fn router(state: AuthState, rate_limit_config: Arc<RateLimitConfig>) -> Router {
    let credentials = Router::new()
        .route("/sign-up", post(sign_up))
        .route("/sign-in", post(sign_in))
        .route("/reissue", post(reissue))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            rate_limit_config,
            rate_limit_credentials,
        ));

    let session = Router::new()
        .route("/logout", post(logout))
        .with_state(state);

    Router::new().merge(credentials).merge(session)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpRequest {
    username: String,
    password: String,
    nickname: String,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReissueRequest {
    access_token: String,
    refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub grant_type: &'static str,
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires_in: u64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            grant_type: GRANT_TYPE,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            access_token_expires_in: pair.access_token_expires_in,
        }
    }
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

pub(super) fn validate_field(value: &str, field: &str, max: usize) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} cannot be empty", field)));
    }
    if value.chars().count() > max {
        return Err(ApiError::bad_request(format!(
            "{} cannot be longer than {} characters",
            field, max
        )));
    }
    Ok(())
}

fn validate_sign_up(payload: &SignUpRequest) -> Result<(), ApiError> {
    validate_field(&payload.username, "Username", MAX_USERNAME_LENGTH)?;
    if !payload
        .username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ApiError::bad_request(
            "Username can only contain letters, numbers, and underscores",
        ));
    }
    validate_field(&payload.password, "Password", MAX_PASSWORD_LENGTH)?;
    validate_field(&payload.nickname, "Nickname", MAX_NICKNAME_LENGTH)?;
    validate_field(&payload.name, "Name", MAX_NAME_LENGTH)?;
    Ok(())
}

async fn sign_up(
    State(state): State<AuthState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_sign_up(&payload)?;
    let nickname = payload.nickname.trim();
    let name = payload.name.trim();

    // Fast path; concurrent sign-ups are caught by the UNIQUE constraints below
    let users = state.db.users();
    if users
        .exists_by_username(&payload.username)
        .await
        .db_err("Failed to check username availability")?
    {
        return Err(ApiError::conflict("Username is already taken"));
    }
    if users
        .exists_by_nickname(nickname)
        .await
        .db_err("Failed to check nickname availability")?
    {
        return Err(ApiError::conflict("Nickname is already taken"));
    }

    let password_hash = state
        .passwords
        .hash(&payload.password)
        .map_err(|e| ApiError::internal_error("Failed to hash password", e))?;

    users
        .create(&NewUser {
            username: &payload.username,
            password_hash: &password_hash,
            nickname,
            name,
            role: UserRole::User,
        })
        .await
        .map_err(|e| ApiError::user_write_error("Failed to create user", e))?;

    info!(username = %payload.username, "User signed up");
    Ok((StatusCode::CREATED, Json(SuccessResponse { success: true })))
}

async fn sign_in(
    State(state): State<AuthState>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let rejected = || ApiError::unauthorized("Invalid username or password");

    let Some(user) = state
        .db
        .users()
        .get_by_username(&payload.username)
        .await
        .db_err("Failed to get user")?
    else {
        state.passwords.verify_unknown_user(&payload.password);
        warn!(username = %payload.username, "Sign-in for unknown user");
        return Err(rejected());
    };

    let matches = state
        .passwords
        .matches(&payload.password, &user.password_hash)
        .map_err(|e| ApiError::internal_error("Failed to verify password", e))?;
    if !matches {
        warn!(username = %user.username, "Sign-in with wrong password");
        return Err(rejected());
    }

    let principal = Principal::from(&user);
    let pair = state
        .jwt
        .issuer()
        .issue(&principal)
        .map_err(|e| ApiError::internal_error("Failed to issue tokens", e))?;

    // Replaces any previous session of this user
    state
        .db
        .refresh_tokens()
        .put(&RefreshTokenRecord {
            subject: principal.subject().to_string(),
            value: pair.refresh_token.clone(),
            expires_at: pair.refresh_token_expires_at,
        })
        .await
        .db_err("Failed to store refresh token")?;

    info!(username = %user.username, "User signed in");
    Ok(Json(pair.into()))
}

async fn reissue(
    State(state): State<AuthState>,
    Json(payload): Json<ReissueRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let pair = state
        .reissue
        .reissue(&payload.access_token, &payload.refresh_token)
        .await
        .inspect_err(|e| warn!(error = %e, code = e.code(), "Reissue rejected"))?;
    Ok(Json(pair.into()))
}

async fn logout(
    State(state): State<AuthState>,
    Auth(principal): Auth,
) -> Result<Json<SuccessResponse>, ApiError> {
    let deleted = state
        .db
        .refresh_tokens()
        .delete(principal.subject())
        .await
        .db_err("Failed to delete refresh token")?;

    info!(subject = %principal.subject(), had_session = deleted, "User logged out");
    Ok(Json(SuccessResponse { success: true }))
}
