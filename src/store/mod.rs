//! Persistence contracts
//!
//! The session service only talks to storage through these traits. Each has
//! a PostgreSQL implementation and an in-memory one.

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryCredentialStore, InMemoryRefreshTokenStore};
pub use postgres::{PgCredentialStore, PgRefreshTokenStore};

use crate::error::AuthError;
use crate::models::{NewRefreshToken, NewUser, RefreshToken, Role, User};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// User records and their roles
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look a user up by username or email in a single query
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    async fn exists_by_username(&self, username: &str) -> Result<bool, AuthError>;

    async fn exists_by_email(&self, email: &str) -> Result<bool, AuthError>;

    /// Create the role record if it does not exist yet
    async fn ensure_role(&self, role: Role) -> Result<(), AuthError>;

    async fn save(&self, user: NewUser) -> Result<User, AuthError>;

    async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<(), AuthError>;

    async fn count(&self) -> Result<u64, AuthError>;
}

/// Hashed refresh tokens
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, AuthError>;

    /// Delete by hash and report how many rows went away.
    ///
    /// Must be a single atomic operation: of two concurrent calls for the
    /// same hash at most one may observe `1`.
    async fn delete_by_hash(&self, token_hash: &str) -> Result<u64, AuthError>;

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthError>;

    async fn delete_by_id(&self, id: Uuid) -> Result<(), AuthError>;

    async fn save(&self, token: NewRefreshToken) -> Result<RefreshToken, AuthError>;

    /// Remove rows whose expiry lies before `now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}
