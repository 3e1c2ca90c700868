//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::{Database, UserRole};
use crate::jwt::{MAX_TOKEN_LIFETIME, SigningKey, TokenLifetimes};
use crate::rate_limit::DEFAULT_CREDENTIALS_PER_MINUTE;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::Parser;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Header set by a trusted reverse proxy to carry the client address.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientIpHeader {
    /// `CF-Connecting-IP` (Cloudflare)
    CfConnectingIp,
    /// `X-Real-IP` (nginx)
    XRealIp,
    /// First entry of `X-Forwarded-For`
    XForwardedFor,
}

impl ClientIpHeader {
    pub fn header_name(self) -> &'static str {
        match self {
            ClientIpHeader::CfConnectingIp => "cf-connecting-ip",
            ClientIpHeader::XRealIp => "x-real-ip",
            ClientIpHeader::XForwardedFor => "x-forwarded-for",
        }
    }

    /// Parse the client address out of a header value.
    pub fn extract(self, value: &str) -> Result<String, &'static str> {
        let candidate = match self {
            ClientIpHeader::XForwardedFor => value.split(',').next().unwrap_or(value),
            _ => value,
        };
        candidate
            .trim()
            .parse::<IpAddr>()
            .map(|ip| ip.to_string())
            .map_err(|_| "IP header does not contain an IP address")
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "community",
    about = "Forum backend with bearer token authentication"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE", default_value = "community.db")]
    pub database: String,

    /// Path to file containing the base64 signing key. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Access token lifetime in seconds (1 to 365 days)
    #[arg(
        long,
        env = "ACCESS_TOKEN_TTL",
        default_value_t = crate::jwt::ACCESS_TOKEN_DURATION.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_LIFETIME.as_secs())
    )]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds (1 to 365 days)
    #[arg(
        long,
        env = "REFRESH_TOKEN_TTL",
        default_value_t = crate::jwt::REFRESH_TOKEN_DURATION.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_LIFETIME.as_secs())
    )]
    pub refresh_token_ttl: u64,

    /// Requests per minute per IP on sign-up, sign-in and reissue
    #[arg(long, env = "SIGN_IN_RATE_LIMIT", default_value_t = NonZeroU32::new(DEFAULT_CREDENTIALS_PER_MINUTE).unwrap_or(NonZeroU32::MIN))]
    pub sign_in_rate_limit: NonZeroU32,

    /// Read the client IP for rate limiting from this proxy header.
    /// Only set this behind a proxy that overwrites the header; without it the
    /// peer address is used.
    #[arg(long, env = "IP_HEADER")]
    pub ip_header: Option<ClientIpHeader>,

    /// Grant ROLE_ADMIN to this existing user at startup
    #[arg(long, env = "ADMIN_USERNAME")]
    pub admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

impl Args {
    pub fn lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            access: Duration::from_secs(self.access_token_ttl),
            refresh: Duration::from_secs(self.refresh_token_ttl),
        }
    }
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Decode a base64 signing key and check its length.
/// Returns None and logs an error if the key is unusable.
pub fn parse_signing_key(encoded: &str) -> Option<SigningKey> {
    let bytes = match STANDARD.decode(encoded.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "JWT secret is not valid base64");
            return None;
        }
    };

    match SigningKey::new(bytes) {
        Ok(key) => Some(key),
        Err(e) => {
            error!(error = %e, "JWT secret is too short for HS512");
            None
        }
    }
}

/// Load the signing key from environment variable or file.
/// Returns None and logs an error if the key cannot be loaded.
pub fn load_signing_key(jwt_secret_file: Option<&str>) -> Option<SigningKey> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    parse_signing_key(&secret)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, signing_key: SigningKey) -> ServerConfig {
    ServerConfig {
        db,
        signing_key,
        lifetimes: args.lifetimes(),
        sign_in_rate_limit: args.sign_in_rate_limit,
        ip_header: args.ip_header,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

/// Grant `ROLE_ADMIN` to an existing user. Returns false and logs if it could not be granted.
pub async fn grant_admin(db: &Database, username: &str) -> bool {
    let user = match db.users().get_by_username(username).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(username = %username, "Admin user does not exist, sign up first");
            return false;
        }
        Err(e) => {
            error!(username = %username, error = %e, "Failed to look up admin user");
            return false;
        }
    };

    match db.users().set_role(user.id, UserRole::Admin).await {
        Ok(granted) => {
            info!(username = %username, "Granted ROLE_ADMIN");
            granted
        }
        Err(e) => {
            error!(username = %username, error = %e, "Failed to grant ROLE_ADMIN");
            false
        }
    }
}
