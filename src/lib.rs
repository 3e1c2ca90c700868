pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod rate_limit;

use api::create_api_router;
use auth::authentication_filter;
use axum::{Router, middleware};
use cli::ClientIpHeader;
use db::Database;
use jwt::{JwtConfig, SigningKey, TokenLifetimes};
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// HS512 key for signing tokens
    pub signing_key: SigningKey,
    /// Access and refresh token lifetimes
    pub lifetimes: TokenLifetimes,
    /// Requests per minute per IP on credential endpoints
    pub sign_in_rate_limit: NonZeroU32,
    /// Trusted proxy header for the client IP, None to use the peer address
    pub ip_header: Option<ClientIpHeader>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.signing_key, config.lifetimes));
    let rate_limit_config = Arc::new(RateLimitConfig::new(
        config.sign_in_rate_limit,
        config.ip_header,
    ));

    let api_router = create_api_router(config.db.clone(), jwt.clone(), rate_limit_config)
        .layer(middleware::from_fn_with_state(jwt, authentication_filter));

    Router::new().nest("/api", api_router)
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
