//! Rate limiting for credential endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing and refresh token brute forcing.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::cli::ClientIpHeader;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Default requests per minute per IP for sign-up, sign-in and reissue.
pub const DEFAULT_CREDENTIALS_PER_MINUTE: u32 = 20;

/// Rate limiting configuration for credential endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Shared per-IP limiter for sign-up, sign-in and reissue
    pub credentials: Arc<IpLimiter>,
    /// Trusted proxy header carrying the client IP, if any
    pub ip_header: Option<ClientIpHeader>,
}

impl RateLimitConfig {
    pub fn new(per_minute: NonZeroU32, ip_header: Option<ClientIpHeader>) -> Self {
        Self {
            credentials: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            ip_header,
        }
    }
}

/// Resolve the rate limit key for a request.
///
/// With `ip_header` set, the address must come from that header and there is
/// no fallback. Otherwise request headers are ignored and the peer address is
/// used, or "unknown" when the service runs without connection info.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<&ConnectInfo<SocketAddr>>,
    ip_header: Option<ClientIpHeader>,
) -> Result<String, &'static str> {
    match ip_header {
        Some(header) => {
            let value = headers
                .get(header.header_name())
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            header.extract(value)
        }
        None => Ok(peer
            .map(|ci| ci.0.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())),
    }
}

/// Middleware for rate limiting credential endpoints.
pub async fn rate_limit_credentials(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match client_ip(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
        config.ip_header,
    ) {
        Ok(ip) => ip,
        Err(reason) => {
            warn!(reason, "Unable to determine client IP");
            return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
        }
    };

    match config.credentials.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, "Rate limit exceeded on credential endpoint");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Please try again later.",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_client_ip_ignores_headers_by_default() {
        let headers = forwarded("203.0.113.7");
        let peer = ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000)));

        assert_eq!(client_ip(&headers, Some(&peer), None).unwrap(), "127.0.0.1");
        assert_eq!(client_ip(&headers, None, None).unwrap(), "unknown");
    }

    #[test]
    fn test_client_ip_from_configured_header() {
        let headers = forwarded("203.0.113.7, 10.0.0.1");
        let peer = ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000)));
        let header = Some(ClientIpHeader::XForwardedFor);

        assert_eq!(client_ip(&headers, Some(&peer), header).unwrap(), "203.0.113.7");

        // No fallback to the peer address once a header is configured
        assert!(client_ip(&HeaderMap::new(), Some(&peer), header).is_err());
        assert!(client_ip(&forwarded("garbage"), Some(&peer), header).is_err());
        assert!(client_ip(&headers, Some(&peer), Some(ClientIpHeader::XRealIp)).is_err());
    }

    #[test]
    fn test_limiter_is_per_ip() {
        let config = RateLimitConfig::new(NonZeroU32::new(2).unwrap(), None);

        assert!(config.credentials.check_key(&"a".to_string()).is_ok());
        assert!(config.credentials.check_key(&"a".to_string()).is_ok());
        assert!(config.credentials.check_key(&"a".to_string()).is_err());

        assert!(config.credentials.check_key(&"b".to_string()).is_ok());
    }
}
