//! LMS Authentication
//!
//! Session-token lifecycle for the LMS providing:
//! - User registration and login by username or email
//! - Short-lived HS256 access tokens
//! - Opaque refresh tokens, stored only as SHA-256 hashes
//! - Single-use refresh token rotation, safe under concurrent refresh
//! - Argon2id password hashing
//! - A fail-open request authenticator with identity and role extractors
//!
//! # Configuration
//!
//! All configuration is loaded from environment variables:
//! - `JWT_SECRET` - Secret key for signing access tokens (required, min 32 bytes)
//! - `JWT_ISSUER` - Issuer claim (default: "lms")
//! - `JWT_ACCESS_TOKEN_MINUTES` - Access token lifetime (default: 30)
//! - `REFRESH_TOKEN_DAYS` - Refresh token lifetime (default: 7)
//! - `ARGON2_MEMORY_COST`, `ARGON2_TIME_COST`, `ARGON2_PARALLELISM` - Hashing cost
//! - `AUTH_PATH` - Route prefix and refresh cookie path (default: "/api/auth")
//! - `AUTH_COOKIE_SECURE` - Secure attribute on the refresh cookie (default: true)
//! - `REFRESH_TOKEN_SWEEP_SECONDS` - Expired token sweep interval, 0 disables (default: 0)
//! - `SEED_DEMO_USERS` - Create demo accounts on an empty database (default: false)
//! - `DATABASE_URL` - PostgreSQL connection string (binary only)
//!
//! # Usage
//!
//! ```rust,ignore
//! use lms_auth::{initialize, postgres_service, AuthConfig};
//!
//! let service = Arc::new(postgres_service(pool, AuthConfig::from_env()?)?);
//! initialize(&pool, &service).await?;
//!
//! let app = lms_auth::handlers::create_routes(service);
//! ```

pub mod authenticator;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod password;
pub mod seed;
pub mod service;
pub mod signer;
pub mod store;
pub mod sweep;

// Re-export commonly used types
pub use authenticator::{Authentication, Identity};
pub use config::{AuthConfig, ServerConfig};
pub use error::AuthError;
pub use extractors::{AuthRejection, CurrentUser, MaybeUser};
pub use handlers::AuthState;
pub use models::*;
pub use service::SessionService;
pub use store::postgres::run_migrations;

use password::Argon2PasswordHasher;
use signer::TokenSigner;
use sqlx::PgPool;
use std::sync::Arc;
use store::{
    CredentialStore, InMemoryCredentialStore, InMemoryRefreshTokenStore, PgCredentialStore,
    PgRefreshTokenStore, RefreshTokenStore,
};

// ============================================
// Service Construction
// ============================================

/// Validate `config` and wire the signer and password hasher around the given stores
pub fn build_service(
    users: Arc<dyn CredentialStore>,
    tokens: Arc<dyn RefreshTokenStore>,
    config: AuthConfig,
) -> Result<SessionService, AuthError> {
    config.validate()?;

    let config = Arc::new(config);
    let passwords = Arc::new(Argon2PasswordHasher::new(&config)?);
    let signer = Arc::new(TokenSigner::new(&config)?);

    Ok(SessionService::new(users, tokens, passwords, signer, config))
}

/// Session service backed by PostgreSQL
pub fn postgres_service(db: PgPool, config: AuthConfig) -> Result<SessionService, AuthError> {
    build_service(
        Arc::new(PgCredentialStore::new(db.clone())),
        Arc::new(PgRefreshTokenStore::new(db)),
        config,
    )
}

/// Session service backed by process memory. Nothing survives a restart.
pub fn in_memory_service(config: AuthConfig) -> Result<SessionService, AuthError> {
    build_service(
        Arc::new(InMemoryCredentialStore::new()),
        Arc::new(InMemoryRefreshTokenStore::new()),
        config,
    )
}

/// Run migrations, create role records and, when enabled, the demo accounts
pub async fn initialize(db: &PgPool, service: &SessionService) -> Result<(), AuthError> {
    run_migrations(db).await?;
    seed::seed_roles(service.users().as_ref()).await?;

    if service.config().seed_demo_users {
        seed::seed_demo_users(service.users().as_ref(), service.passwords().as_ref()).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn test_build_service_validates_config() {
        let config = AuthConfig {
            jwt_secret: "too-short".into(),
            ..test_config()
        };

        assert!(matches!(
            in_memory_service(config),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn test_build_service_rejects_overflowing_refresh_ttl() {
        for days in [100_000_000, i64::MAX / 2] {
            let config = AuthConfig {
                refresh_token_days: days,
                ..test_config()
            };

            assert!(matches!(
                in_memory_service(config),
                Err(AuthError::Config(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_in_memory_service_round_trip() {
        let service = in_memory_service(test_config()).unwrap();

        let tokens = service
            .register(RegisterRequest {
                email: "a@b.com".into(),
                username: "alice".into(),
                password: "Passw0rd!".into(),
            })
            .await
            .unwrap();

        let claims = service
            .signer()
            .verify_access_token(&tokens.access_token)
            .unwrap();
        assert_eq!(claims.username, "alice");
    }
}
