//! Session Service
//!
//! Register, login, refresh and logout. This is the only writer of
//! refresh-token rows.

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::*;
use crate::password::PasswordHasher;
use crate::signer::TokenSigner;
use crate::store::{CredentialStore, RefreshTokenStore};

use chrono::{Duration, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Role granted to every self-registered account
pub const DEFAULT_ROLE: Role = Role::Student;

/// Session service
pub struct SessionService {
    users: Arc<dyn CredentialStore>,
    tokens: Arc<dyn RefreshTokenStore>,
    passwords: Arc<dyn PasswordHasher>,
    signer: Arc<TokenSigner>,
    config: Arc<AuthConfig>,
}

impl SessionService {
    pub fn new(
        users: Arc<dyn CredentialStore>,
        tokens: Arc<dyn RefreshTokenStore>,
        passwords: Arc<dyn PasswordHasher>,
        signer: Arc<TokenSigner>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            users,
            tokens,
            passwords,
            signer,
            config,
        }
    }

    /// Get reference to the signer
    pub fn signer(&self) -> &Arc<TokenSigner> {
        &self.signer
    }

    /// Get reference to config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn users(&self) -> &Arc<dyn CredentialStore> {
        &self.users
    }

    pub fn refresh_tokens(&self) -> &Arc<dyn RefreshTokenStore> {
        &self.tokens
    }

    pub fn passwords(&self) -> &Arc<dyn PasswordHasher> {
        &self.passwords
    }

    /// Lifetime of a refresh token, also used as the cookie max-age
    pub fn refresh_token_expiration(&self) -> Duration {
        self.config.refresh_token_ttl()
    }

    // ============================================
    // Registration
    // ============================================

    /// Register a new student account and open its first session
    pub async fn register(&self, req: RegisterRequest) -> Result<FullTokenInformation, AuthError> {
        if self.users.exists_by_email(&req.email).await? {
            return Err(AuthError::EmailTaken);
        }
        if self.users.exists_by_username(&req.username).await? {
            return Err(AuthError::UsernameTaken);
        }

        let password_hash = self.passwords.hash_password(&req.password)?;

        self.users.ensure_role(DEFAULT_ROLE).await?;

        let user = self
            .users
            .save(NewUser {
                username: req.username,
                email: req.email,
                password_hash,
                enabled: true,
                roles: BTreeSet::from([DEFAULT_ROLE]),
            })
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");

        self.issue_tokens(&user).await
    }

    // ============================================
    // Login / Logout
    // ============================================

    /// Authenticate by username or email.
    ///
    /// A successful login deletes every refresh token the user held before.
    pub async fn login(&self, req: LoginRequest) -> Result<FullTokenInformation, AuthError> {
        // Unknown user and wrong password produce the same error
        let user = self
            .users
            .find_by_identifier(&req.identifier)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self
            .passwords
            .verify_password(&req.password, &user.password_hash)
        {
            tracing::info!(user_id = %user.id, "Login rejected: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.enabled {
            tracing::warn!(user_id = %user.id, "Login attempt on disabled account");
            return Err(AuthError::AccountDisabled);
        }

        let revoked = self.tokens.delete_all_for_user(user.id).await?;
        tracing::info!(user_id = %user.id, revoked, "User logged in");

        self.issue_tokens(&user).await
    }

    /// Delete the presented refresh token. Unknown tokens are not an error.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let token_hash = self.signer.hash_token(refresh_token);
        let deleted = self.tokens.delete_by_hash(&token_hash).await?;

        tracing::debug!(deleted, "Logout");
        Ok(())
    }

    // ============================================
    // Token Refresh
    // ============================================

    /// Exchange a refresh token for a new pair (rotation).
    ///
    /// The presented token is consumed with one atomic delete; when two
    /// requests race on the same token only one of them sees the row go away.
    pub async fn refresh(&self, refresh_token: &str) -> Result<FullTokenInformation, AuthError> {
        let token_hash = self.signer.hash_token(refresh_token);

        let stored = self
            .tokens
            .find_by_hash(&token_hash)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        if stored.is_expired_at(Utc::now()) {
            self.tokens.delete_by_id(stored.id).await?;
            tracing::info!(user_id = %stored.user_id, "Expired refresh token removed");
            return Err(AuthError::RefreshTokenExpired);
        }

        let consumed = self.tokens.delete_by_hash(&token_hash).await?;
        if consumed == 0 {
            tracing::warn!(
                user_id = %stored.user_id,
                "Refresh token consumed concurrently, rejecting reuse"
            );
            return Err(AuthError::TokenReuse);
        }

        let user = self
            .users
            .find_by_id(stored.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.enabled {
            return Err(AuthError::AccountDisabled);
        }

        self.issue_tokens(&user).await
    }

    // ============================================
    // Token Issuance
    // ============================================

    /// Sign an access token and persist the hash of a fresh refresh secret
    async fn issue_tokens(&self, user: &User) -> Result<FullTokenInformation, AuthError> {
        let access_token = self.signer.issue_access_token(user)?;
        let refresh_token = self.signer.generate_refresh_secret();
        let expires_at = Utc::now()
            .checked_add_signed(self.refresh_token_expiration())
            .ok_or(AuthError::Internal)?;

        self.tokens
            .save(NewRefreshToken {
                user_id: user.id,
                token_hash: self.signer.hash_token(&refresh_token),
                expires_at,
            })
            .await?;

        Ok(FullTokenInformation {
            access_token,
            refresh_token,
            expires_in: self.signer.access_token_ttl_seconds(),
        })
    }
}
