mod auth;
mod error;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::auth::{Argon2Passwords, ReissueProtocol};
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

pub use auth::{GRANT_TYPE, TokenResponse};
pub use error::ApiError;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        jwt: jwt.clone(),
        passwords: Argon2Passwords,
        reissue: ReissueProtocol::new(jwt, db.clone()),
    };

    let users_state = users::UsersState { db };

    Router::new()
        .merge(auth::router(auth_state, rate_limit_config))
        .nest("/users", users::router(users_state))
}
