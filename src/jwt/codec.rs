//! Signed claims encoding and decoding.
//!
//! Access tokens carry the subject and its authorities. Refresh tokens carry
//! only an expiry and a random id; which subject they belong to is recorded
//! in the refresh token store, never in the token.

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::error::{KeyTooShort, TokenError};
use crate::auth::Principal;

/// Minimum signing key length in bytes (512 bits).
pub const MIN_KEY_LENGTH: usize = 64;

/// The only algorithm tokens are signed and accepted with.
pub const ALGORITHM: Algorithm = Algorithm::HS512;

/// HMAC key material, length-checked once at startup.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, KeyTooShort> {
        let bytes = bytes.into();
        if bytes.len() < MIN_KEY_LENGTH {
            return Err(KeyTooShort {
                actual: bytes.len(),
                required: MIN_KEY_LENGTH,
            });
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey(<{} bytes>)", self.0.len())
    }
}

/// Claims carried by either kind of token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username), access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Comma-joined authorities, access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    /// Issued at (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Random id, refresh tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// A token whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Valid(Claims),
    /// Well-signed but `exp` is not in the future.
    Expired(Claims),
}

impl Decoded {
    pub fn claims(&self) -> &Claims {
        match self {
            Decoded::Valid(claims) | Decoded::Expired(claims) => claims,
        }
    }

    pub fn into_claims(self) -> Claims {
        match self {
            Decoded::Valid(claims) | Decoded::Expired(claims) => claims,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Decoded::Expired(_))
    }
}

/// `issued_at + ttl` in Unix seconds.
pub(super) fn expiry(issued_at: u64, ttl: Duration) -> Result<u64, TokenError> {
    issued_at
        .checked_add(ttl.as_secs())
        .ok_or(TokenError::ExpiryOutOfRange)
}

/// Encodes and decodes HS512-signed claims with a single process-wide key.
#[derive(Clone)]
pub struct ClaimsCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl ClaimsCodec {
    pub fn new(key: &SigningKey) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        // Expiry is classified in `decode` so expired claims stay readable.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(key.as_bytes()),
            decoding_key: DecodingKey::from_secret(key.as_bytes()),
            validation,
        }
    }

    /// Encode an access token for `principal`.
    pub fn encode_access(
        &self,
        principal: &Principal,
        issued_at: u64,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: Some(principal.subject().to_string()),
            auth: Some(principal.authority_claim()),
            iat: Some(issued_at),
            exp: expiry(issued_at, ttl)?,
            jti: None,
        };
        self.sign(&claims)
    }

    /// Encode a refresh token. It names no subject.
    pub fn encode_refresh(&self, issued_at: u64, ttl: Duration) -> Result<String, TokenError> {
        let claims = Claims {
            sub: None,
            auth: None,
            iat: None,
            exp: expiry(issued_at, ttl)?,
            jti: Some(uuid::Uuid::new_v4().to_string()),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(ALGORITHM), claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Verify the signature of `token` and classify its expiry against `now`.
    pub fn decode(&self, token: &str, now: u64) -> Result<Decoded, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)?;

        if data.claims.exp <= now {
            Ok(Decoded::Expired(data.claims))
        } else {
            Ok(Decoded::Valid(data.claims))
        }
    }
}
