//! Token error types.

use jsonwebtoken::errors::ErrorKind;

/// Errors produced while encoding, decoding or interpreting a token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The signature does not match the configured key
    #[error("token signature is invalid")]
    SignatureInvalid,
    /// Not a compact JWS, or the payload is not the expected JSON
    #[error("token is malformed")]
    TokenMalformed,
    /// Well-signed but past its expiry
    #[error("token has expired")]
    TokenExpired,
    /// Signed with an algorithm other than the configured one
    #[error("unsupported token format")]
    UnsupportedTokenFormat,
    /// Well-signed token without the authorities claim
    #[error("token carries no authority claim")]
    MissingAuthorityClaim,
    /// Issue time plus lifetime does not fit in a Unix timestamp
    #[error("token expiry is out of range")]
    ExpiryOutOfRange,
    /// Signing failed inside the JWT library
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::UnsupportedTokenFormat
            }
            ErrorKind::ExpiredSignature => TokenError::TokenExpired,
            _ => TokenError::TokenMalformed,
        }
    }
}

/// The configured signing key is shorter than the HS512 minimum.
///
/// Only ever raised at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("signing key is {actual} bytes, at least {required} bytes are required")]
pub struct KeyTooShort {
    pub actual: usize,
    pub required: usize,
}
