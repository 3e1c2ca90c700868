//! Per-request bearer token authentication.
//!
//! Runs once per request. A valid access token puts its `Principal` into the
//! request extensions; anything else leaves the request anonymous. The filter
//! never rejects a request itself, that is left to the extractors.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::jwt::JwtConfig;

/// Case-sensitive scheme prefix of the Authorization header.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Extract the bearer token from the Authorization header.
/// A header with any other scheme, or an empty token, counts as absent.
pub fn resolve_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?.trim();
    (!token.is_empty()).then_some(token)
}

/// Middleware that authenticates the request from its bearer token.
pub async fn authentication_filter(
    State(jwt): State<Arc<JwtConfig>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = resolve_token(request.headers()) {
        let validator = jwt.validator();
        if validator.is_valid(token) {
            match validator.authenticate(token) {
                Ok(principal) => {
                    request.extensions_mut().insert(principal);
                }
                Err(e) => debug!(error = %e, "Valid token carries no principal"),
            }
        }
    }

    next.run(request).await
}
