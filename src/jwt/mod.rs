//! JWT token generation and validation.
//!
//! Dual-token system:
//! - Access tokens: stateless, carry subject and authorities (24h default)
//! - Refresh tokens: carry only an expiry, bound to a subject through the
//!   refresh token store (7 days default)

mod codec;
mod error;
mod issuer;
mod validator;

use std::sync::Arc;

pub use codec::{ALGORITHM, Claims, ClaimsCodec, Decoded, MIN_KEY_LENGTH, SigningKey};
pub use error::{KeyTooShort, TokenError};
pub use issuer::{
    ACCESS_TOKEN_DURATION, MAX_TOKEN_LIFETIME, REFRESH_TOKEN_DURATION, TokenIssuer,
    TokenLifetimes, TokenPair,
};
pub use validator::TokenValidator;

/// Issuer and validator sharing one codec, built once at startup.
#[derive(Clone)]
pub struct JwtConfig {
    issuer: TokenIssuer,
    validator: TokenValidator,
}

impl JwtConfig {
    pub fn new(key: &SigningKey, lifetimes: TokenLifetimes) -> Self {
        let codec = Arc::new(ClaimsCodec::new(key));
        Self {
            issuer: TokenIssuer::new(codec.clone(), lifetimes),
            validator: TokenValidator::new(codec),
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }
}
