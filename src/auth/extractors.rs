//! Axum extractors for authentication.
//!
//! These read the `Principal` that the authentication filter placed in the
//! request extensions. They never look at the Authorization header themselves.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::{ApiAuthError, AuthErrorKind};
use super::types::Principal;
use crate::db::{Database, User, UserRole};

/// Router state that can look up user records.
pub trait HasDatabase {
    fn db(&self) -> &Database;
}

fn principal_from(parts: &Parts) -> Result<Principal, AuthErrorKind> {
    parts
        .extensions
        .get::<Principal>()
        .cloned()
        .ok_or(AuthErrorKind::NotAuthenticated)
}

/// Extractor for endpoints that require authentication.
pub struct Auth(pub Principal);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from(parts).map(Auth).map_err(ApiAuthError::from)
    }
}

/// Extractor for endpoints restricted to `ROLE_ADMIN`.
pub struct AdminOnly(pub Principal);

impl<S> FromRequestParts<S> for AdminOnly
where
    S: Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = principal_from(parts)?;
        if !principal.has_authority(UserRole::Admin.as_str()) {
            return Err(AuthErrorKind::InsufficientRole.into());
        }
        Ok(AdminOnly(principal))
    }
}

/// Resolves the full user record of the authenticated principal.
pub struct LoginUser(pub User);

impl<S> FromRequestParts<S> for LoginUser
where
    S: HasDatabase + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = principal_from(parts)?;

        let user = state
            .db()
            .users()
            .get_by_username(principal.subject())
            .await
            .map_err(|e| {
                tracing::error!("Failed to get user: {}", e);
                AuthErrorKind::DatabaseError
            })?
            .ok_or(AuthErrorKind::UserNotFound)?;

        Ok(LoginUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;

    fn parts(principal: Option<Principal>) -> Parts {
        let (mut parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        if let Some(principal) = principal {
            parts.extensions.insert(principal);
        }
        parts
    }

    #[tokio::test]
    async fn test_auth_requires_principal() {
        let alice = Principal::new("alice", ["ROLE_USER"]);

        let Auth(found) = Auth::from_request_parts(&mut parts(Some(alice.clone())), &())
            .await
            .unwrap();
        assert_eq!(found, alice);

        let rejection = Auth::from_request_parts(&mut parts(None), &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection.kind(), AuthErrorKind::NotAuthenticated);
        assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_only_checks_authority() {
        let admin = Principal::new("root", ["ROLE_ADMIN"]);
        let user = Principal::new("alice", ["ROLE_USER"]);

        assert!(
            AdminOnly::from_request_parts(&mut parts(Some(admin)), &())
                .await
                .is_ok()
        );

        let rejection = AdminOnly::from_request_parts(&mut parts(Some(user)), &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection.kind(), AuthErrorKind::InsufficientRole);
        assert_eq!(rejection.into_response().status(), StatusCode::FORBIDDEN);

        let rejection = AdminOnly::from_request_parts(&mut parts(None), &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection.kind(), AuthErrorKind::NotAuthenticated);
    }
}
