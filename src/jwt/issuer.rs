//! Access/refresh token pair issuance.

use std::sync::Arc;
use std::time::Duration;

use super::codec::{ClaimsCodec, expiry};
use super::error::TokenError;
use crate::auth::Principal;

/// Access token lifetime: 24 hours
pub const ACCESS_TOKEN_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Refresh token lifetime: 7 days
pub const REFRESH_TOKEN_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Longest accepted lifetime for either token kind: 365 days
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// How long each kind of token stays valid after issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: ACCESS_TOKEN_DURATION,
            refresh: REFRESH_TOKEN_DURATION,
        }
    }
}

/// A freshly issued access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry in Unix milliseconds
    pub access_token_expires_in: u64,
    /// Refresh token expiry (Unix timestamp)
    pub refresh_token_expires_at: u64,
}

/// Builds token pairs for authenticated principals.
#[derive(Clone)]
pub struct TokenIssuer {
    codec: Arc<ClaimsCodec>,
    lifetimes: TokenLifetimes,
}

impl TokenIssuer {
    pub fn new(codec: Arc<ClaimsCodec>, lifetimes: TokenLifetimes) -> Self {
        Self { codec, lifetimes }
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// Issue a pair for `principal` starting now.
    pub fn issue(&self, principal: &Principal) -> Result<TokenPair, TokenError> {
        self.issue_at(principal, jsonwebtoken::get_current_timestamp())
    }

    /// Issue a pair as if the current time were `now` (Unix seconds).
    pub fn issue_at(&self, principal: &Principal, now: u64) -> Result<TokenPair, TokenError> {
        let access_token_expires_in = expiry(now, self.lifetimes.access)?
            .checked_mul(1000)
            .ok_or(TokenError::ExpiryOutOfRange)?;
        let refresh_token_expires_at = expiry(now, self.lifetimes.refresh)?;

        let access_token = self
            .codec
            .encode_access(principal, now, self.lifetimes.access)?;
        let refresh_token = self.codec.encode_refresh(now, self.lifetimes.refresh)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_token_expires_in,
            refresh_token_expires_at,
        })
    }
}
