//! Refresh token rotation.
//!
//! Exchanges an (optionally expired) access token plus the subject's current
//! refresh token for a fresh pair. The stored refresh token is replaced in the
//! same step, so each refresh token can be redeemed at most once.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::types::Principal;
use crate::db::Database;
use crate::jwt::{JwtConfig, TokenError, TokenPair};

#[derive(Debug, Error)]
pub enum ReissueError {
    #[error("refresh token is invalid")]
    RefreshTokenInvalid,
    #[error("access token is invalid: {0}")]
    AccessTokenInvalid(#[source] TokenError),
    #[error("no active session for subject")]
    SessionNotFound,
    #[error("refresh token does not match the active session")]
    RefreshTokenMismatch,
    #[error("failed to issue tokens: {0}")]
    Token(#[source] TokenError),
    #[error("refresh token store failed: {0}")]
    Store(#[from] sqlx::Error),
}

impl ReissueError {
    /// Stable identifier for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            ReissueError::RefreshTokenInvalid => "REFRESH_TOKEN_INVALID",
            ReissueError::AccessTokenInvalid(_) => "ACCESS_TOKEN_INVALID",
            ReissueError::SessionNotFound => "SESSION_NOT_FOUND",
            ReissueError::RefreshTokenMismatch => "REFRESH_TOKEN_MISMATCH",
            ReissueError::Token(_) => "TOKEN_ISSUE_FAILED",
            ReissueError::Store(_) => "STORE_ERROR",
        }
    }
}

#[derive(Clone)]
pub struct ReissueProtocol {
    jwt: Arc<JwtConfig>,
    db: Database,
}

impl ReissueProtocol {
    pub fn new(jwt: Arc<JwtConfig>, db: Database) -> Self {
        Self { jwt, db }
    }

    /// Rotate the subject's refresh token and return a new pair.
    ///
    /// Checks run in order and the first failure is returned. The only write
    /// is the final compare-and-rotate.
    pub async fn reissue(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<TokenPair, ReissueError> {
        let validator = self.jwt.validator();

        if !validator.is_valid(refresh_token) {
            return Err(ReissueError::RefreshTokenInvalid);
        }

        let principal: Principal = validator
            .authenticate(access_token)
            .map_err(ReissueError::AccessTokenInvalid)?;

        let store = self.db.refresh_tokens();
        let record = store
            .get(principal.subject())
            .await?
            .ok_or(ReissueError::SessionNotFound)?;

        if record.value.as_bytes() != refresh_token.as_bytes() {
            warn!(subject = %principal.subject(), "Refresh token does not match session");
            return Err(ReissueError::RefreshTokenMismatch);
        }

        let pair = self
            .jwt
            .issuer()
            .issue(&principal)
            .map_err(ReissueError::Token)?;

        let rotated = store
            .compare_and_rotate(
                principal.subject(),
                refresh_token,
                &pair.refresh_token,
                pair.refresh_token_expires_at,
            )
            .await?;

        if !rotated {
            warn!(subject = %principal.subject(), "Lost refresh token rotation race");
            return Err(ReissueError::RefreshTokenMismatch);
        }

        info!(subject = %principal.subject(), "Tokens reissued");
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RefreshTokenRecord;
    use crate::jwt::{SigningKey, TokenLifetimes};

    async fn setup() -> (ReissueProtocol, Arc<JwtConfig>, Database) {
        let db = Database::open(":memory:").await.unwrap();
        let jwt = Arc::new(JwtConfig::new(
            &SigningKey::new(vec![9u8; 64]).unwrap(),
            TokenLifetimes::default(),
        ));
        (ReissueProtocol::new(jwt.clone(), db.clone()), jwt, db)
    }

    /// Issue a pair the way sign-in does and store its refresh token.
    async fn sign_in(jwt: &JwtConfig, db: &Database, principal: &Principal, now: u64) -> TokenPair {
        let pair = jwt.issuer().issue_at(principal, now).unwrap();
        db.refresh_tokens()
            .put(&RefreshTokenRecord {
                subject: principal.subject().to_string(),
                value: pair.refresh_token.clone(),
                expires_at: pair.refresh_token_expires_at,
            })
            .await
            .unwrap();
        pair
    }

    fn now() -> u64 {
        jsonwebtoken::get_current_timestamp()
    }

    #[tokio::test]
    async fn test_reissue_with_expired_access_token_rotates() {
        let (protocol, jwt, db) = setup().await;
        let principal = Principal::new("alice", ["ROLE_USER"]);

        // Signed in 25 hours ago: access token expired, refresh token still valid
        let first = sign_in(&jwt, &db, &principal, now() - 25 * 60 * 60).await;
        assert!(!jwt.validator().is_valid(&first.access_token));

        let second = protocol
            .reissue(&first.access_token, &first.refresh_token)
            .await
            .unwrap();

        assert_ne!(second.refresh_token, first.refresh_token);
        assert!(jwt.validator().is_valid(&second.access_token));
        assert_eq!(
            jwt.validator().authenticate(&second.access_token).unwrap(),
            principal
        );

        let stored = db.refresh_tokens().get("alice").await.unwrap().unwrap();
        assert_eq!(stored.value, second.refresh_token);
        assert_eq!(stored.expires_at, second.refresh_token_expires_at);

        // Replaying the original pair is rejected
        assert!(matches!(
            protocol
                .reissue(&first.access_token, &first.refresh_token)
                .await,
            Err(ReissueError::RefreshTokenMismatch)
        ));

        // The rotated pair keeps working
        protocol
            .reissue(&second.access_token, &second.refresh_token)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let (protocol, jwt, _db) = setup().await;
        let pair = jwt
            .issuer()
            .issue(&Principal::new("ghost", ["ROLE_USER"]))
            .unwrap();

        let result = protocol.reissue(&pair.access_token, &pair.refresh_token).await;
        assert!(matches!(result, Err(ReissueError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_invalid_refresh_token() {
        let (protocol, jwt, db) = setup().await;
        let principal = Principal::new("alice", ["ROLE_USER"]);
        let pair = sign_in(&jwt, &db, &principal, now()).await;

        let result = protocol.reissue(&pair.access_token, "not-a-token").await;
        assert!(matches!(result, Err(ReissueError::RefreshTokenInvalid)));

        // Expired refresh token fails the first gate too
        let old = sign_in(&jwt, &db, &principal, now() - 8 * 24 * 60 * 60).await;
        let result = protocol.reissue(&old.access_token, &old.refresh_token).await;
        assert!(matches!(result, Err(ReissueError::RefreshTokenInvalid)));
    }

    #[tokio::test]
    async fn test_tampered_access_token() {
        let (protocol, jwt, db) = setup().await;
        let principal = Principal::new("alice", ["ROLE_USER"]);
        let pair = sign_in(&jwt, &db, &principal, now()).await;

        let mut tampered = pair.access_token.clone();
        tampered.push('x');

        let result = protocol.reissue(&tampered, &pair.refresh_token).await;
        assert!(matches!(result, Err(ReissueError::AccessTokenInvalid(_))));

        // A refresh token in the access slot has no authority claim
        let result = protocol
            .reissue(&pair.refresh_token, &pair.refresh_token)
            .await;
        assert!(matches!(
            result,
            Err(ReissueError::AccessTokenInvalid(
                TokenError::MissingAuthorityClaim
            ))
        ));

        // Nothing was rotated
        let stored = db.refresh_tokens().get("alice").await.unwrap().unwrap();
        assert_eq!(stored.value, pair.refresh_token);
    }

    #[tokio::test]
    async fn test_refresh_token_of_another_session() {
        let (protocol, jwt, db) = setup().await;
        let alice = sign_in(&jwt, &db, &Principal::new("alice", ["ROLE_USER"]), now()).await;
        let bob = sign_in(&jwt, &db, &Principal::new("bob", ["ROLE_USER"]), now()).await;

        let result = protocol.reissue(&alice.access_token, &bob.refresh_token).await;
        assert!(matches!(result, Err(ReissueError::RefreshTokenMismatch)));
    }

    #[tokio::test]
    async fn test_concurrent_reissue_single_winner() {
        let (protocol, jwt, db) = setup().await;
        let principal = Principal::new("alice", ["ROLE_USER"]);
        let pair = sign_in(&jwt, &db, &principal, now()).await;

        let (a, b) = tokio::join!(
            protocol.reissue(&pair.access_token, &pair.refresh_token),
            protocol.reissue(&pair.access_token, &pair.refresh_token),
        );

        let (winner, loser) = match (a, b) {
            (Ok(pair), Err(e)) | (Err(e), Ok(pair)) => (pair, e),
            (a, b) => panic!("expected exactly one success, got {:?} and {:?}", a, b),
        };
        assert!(matches!(loser, ReissueError::RefreshTokenMismatch));

        let stored = db.refresh_tokens().get("alice").await.unwrap().unwrap();
        assert_eq!(stored.value, winner.refresh_token);
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let codes = [
            ReissueError::RefreshTokenInvalid.code(),
            ReissueError::AccessTokenInvalid(TokenError::TokenMalformed).code(),
            ReissueError::SessionNotFound.code(),
            ReissueError::RefreshTokenMismatch.code(),
        ];
        let unique: std::collections::BTreeSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}
