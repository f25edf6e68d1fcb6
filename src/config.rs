//! Authentication Configuration
//!
//! All configuration values are loaded from environment variables once at
//! startup. The resulting structs are immutable and shared by reference.

use crate::error::AuthError;
use chrono::Duration;
use std::env;

/// Minimum signing secret length in bytes for HS256
pub const MIN_SECRET_BYTES: usize = 32;

/// Upper bound for JWT_ACCESS_TOKEN_MINUTES (one day)
pub const MAX_ACCESS_TOKEN_MINUTES: i64 = 24 * 60;

/// Upper bound for REFRESH_TOKEN_DAYS
pub const MAX_REFRESH_TOKEN_DAYS: i64 = 365;

/// Authentication configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for signing access tokens (from JWT_SECRET env var)
    pub jwt_secret: String,

    /// Issuer claim written into and required from access tokens (from JWT_ISSUER env var)
    pub jwt_issuer: String,

    /// Access token lifetime in minutes (from JWT_ACCESS_TOKEN_MINUTES env var)
    pub access_token_minutes: i64,

    /// Refresh token lifetime in days (from REFRESH_TOKEN_DAYS env var)
    pub refresh_token_days: i64,

    /// Argon2 memory cost in KiB (from ARGON2_MEMORY_COST env var)
    pub argon2_memory_cost: u32,

    /// Argon2 time cost (iterations) (from ARGON2_TIME_COST env var)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (from ARGON2_PARALLELISM env var)
    pub argon2_parallelism: u32,

    /// Prefix of the auth routes, also the refresh cookie path (from AUTH_PATH env var)
    pub auth_path: String,

    /// Whether the refresh cookie carries the Secure attribute (from AUTH_COOKIE_SECURE env var)
    pub cookie_secure: bool,

    /// Expired refresh token sweep interval in seconds, 0 disables (from REFRESH_TOKEN_SWEEP_SECONDS env var)
    pub sweep_interval_seconds: u64,

    /// Create demo accounts on an empty database (from SEED_DEMO_USERS env var)
    pub seed_demo_users: bool,
}

impl AuthConfig {
    /// Load configuration from environment variables
    ///
    /// Fails if JWT_SECRET is not set. Call [`AuthConfig::validate`] before use.
    pub fn from_env() -> Result<Self, AuthError> {
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AuthError::Config("JWT_SECRET environment variable must be set".into()))?;

        Ok(Self {
            jwt_secret,

            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "lms".to_string()),

            access_token_minutes: parse_var("JWT_ACCESS_TOKEN_MINUTES").unwrap_or(30),

            refresh_token_days: parse_var("REFRESH_TOKEN_DAYS").unwrap_or(7),

            argon2_memory_cost: parse_var("ARGON2_MEMORY_COST").unwrap_or(19456), // 19 MiB

            argon2_time_cost: parse_var("ARGON2_TIME_COST").unwrap_or(2),

            argon2_parallelism: parse_var("ARGON2_PARALLELISM").unwrap_or(1),

            auth_path: env::var("AUTH_PATH").unwrap_or_else(|_| "/api/auth".to_string()),

            cookie_secure: env::var("AUTH_COOKIE_SECURE")
                .ok()
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(true),

            sweep_interval_seconds: parse_var("REFRESH_TOKEN_SWEEP_SECONDS").unwrap_or(0),

            seed_demo_users: env::var("SEED_DEMO_USERS")
                .ok()
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.jwt_secret.as_bytes().len() < MIN_SECRET_BYTES {
            return Err(AuthError::Config(format!(
                "JWT_SECRET must be at least {} bytes for HS256",
                MIN_SECRET_BYTES
            )));
        }

        if !(1..=MAX_ACCESS_TOKEN_MINUTES).contains(&self.access_token_minutes) {
            return Err(AuthError::Config(format!(
                "JWT_ACCESS_TOKEN_MINUTES must be between 1 and {}",
                MAX_ACCESS_TOKEN_MINUTES
            )));
        }

        if !(1..=MAX_REFRESH_TOKEN_DAYS).contains(&self.refresh_token_days) {
            return Err(AuthError::Config(format!(
                "REFRESH_TOKEN_DAYS must be between 1 and {}",
                MAX_REFRESH_TOKEN_DAYS
            )));
        }

        if self.refresh_token_ttl() <= self.access_token_ttl() {
            return Err(AuthError::Config(
                "REFRESH_TOKEN_DAYS must outlive the access token".to_string(),
            ));
        }

        if !self.auth_path.starts_with('/') || self.auth_path.len() < 2 || self.auth_path.ends_with('/') {
            return Err(AuthError::Config(
                "AUTH_PATH must look like /segment and not end with a slash".to_string(),
            ));
        }

        if argon2::Params::new(
            self.argon2_memory_cost,
            self.argon2_time_cost,
            self.argon2_parallelism,
            None,
        )
        .is_err()
        {
            return Err(AuthError::Config(
                "ARGON2_* parameters are out of range".to_string(),
            ));
        }

        Ok(())
    }

    /// Access token lifetime, clamped to the range `validate` accepts
    pub fn access_token_ttl(&self) -> Duration {
        Duration::minutes(self.access_token_minutes.clamp(0, MAX_ACCESS_TOKEN_MINUTES))
    }

    /// Refresh token lifetime, clamped to the range `validate` accepts
    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::days(self.refresh_token_days.clamp(0, MAX_REFRESH_TOKEN_DAYS))
    }
}

/// Server settings for the standalone binary
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PostgreSQL connection string (from DATABASE_URL env var)
    pub database_url: String,

    /// Listen address (from BIND_ADDR env var)
    pub bind_addr: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, AuthError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| AuthError::Config("DATABASE_URL environment variable must be set".into()))?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Configuration with cheap Argon2 parameters for unit tests
#[cfg(test)]
pub(crate) fn test_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
        jwt_issuer: "lms".to_string(),
        access_token_minutes: 30,
        refresh_token_days: 7,
        argon2_memory_cost: 1024,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        auth_path: "/api/auth".to_string(),
        cookie_secure: true,
        sweep_interval_seconds: 0,
        seed_demo_users: false,
    }
}
