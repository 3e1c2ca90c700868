//! Bearer token authentication with role-based access control.
//!
//! The filter authenticates each request from its `Authorization` header and
//! stores the `Principal` in the request extensions. Extractors read it back
//! in handlers. Expired access tokens are exchanged for a fresh pair through
//! the reissue protocol, which rotates the subject's single refresh token.

mod errors;
mod extractors;
mod filter;
mod password;
mod reissue;
mod types;

pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{AdminOnly, Auth, HasDatabase, LoginUser};
pub use filter::{BEARER_PREFIX, authentication_filter, resolve_token};
pub use password::{Argon2Passwords, PasswordError, PasswordVerifier};
pub use reissue::{ReissueError, ReissueProtocol};
pub use types::Principal;
