//! Token validation.
//!
//! `is_valid` answers the yes/no question the per-request filter needs and
//! never fails. `authenticate` recovers the principal from a well-signed
//! access token even after it expired, which the reissue flow relies on.

use std::sync::Arc;

use tracing::debug;

use super::codec::{Claims, ClaimsCodec, Decoded};
use super::error::TokenError;
use crate::auth::Principal;

#[derive(Clone)]
pub struct TokenValidator {
    codec: Arc<ClaimsCodec>,
}

impl TokenValidator {
    pub fn new(codec: Arc<ClaimsCodec>) -> Self {
        Self { codec }
    }

    /// Strict validation: signature must verify and expiry must be in the future.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_at(token, jsonwebtoken::get_current_timestamp())
    }

    pub fn validate_at(&self, token: &str, now: u64) -> Result<Claims, TokenError> {
        match self.codec.decode(token, now)? {
            Decoded::Valid(claims) => Ok(claims),
            Decoded::Expired(_) => Err(TokenError::TokenExpired),
        }
    }

    /// True iff the token is correctly signed and unexpired.
    pub fn is_valid(&self, token: &str) -> bool {
        self.is_valid_at(token, jsonwebtoken::get_current_timestamp())
    }

    pub fn is_valid_at(&self, token: &str, now: u64) -> bool {
        match self.validate_at(token, now) {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Token rejected");
                false
            }
        }
    }

    /// Principal embedded in a correctly signed access token, expired or not.
    pub fn authenticate(&self, token: &str) -> Result<Principal, TokenError> {
        let claims = self
            .codec
            .decode(token, jsonwebtoken::get_current_timestamp())?
            .into_claims();

        let authorities = claims.auth.ok_or(TokenError::MissingAuthorityClaim)?;
        let subject = claims.sub.ok_or(TokenError::TokenMalformed)?;

        Ok(Principal::from_authority_claim(subject, &authorities))
    }
}
