//! In-memory stores
//!
//! Same contracts as the PostgreSQL stores. Every mutation happens under a
//! single write lock, which makes `delete_by_hash` atomic.

use super::{CredentialStore, RefreshTokenStore};
use crate::error::AuthError;
use crate::models::{NewRefreshToken, NewUser, RefreshToken, Role, User};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<HashMap<Uuid, User>>,
    roles: RwLock<BTreeSet<Role>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Role records created so far
    pub async fn roles(&self) -> BTreeSet<Role> {
        self.roles.read().await.clone()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, AuthError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.username == identifier || u.email == identifier)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, AuthError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .any(|u| u.username == username))
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, AuthError> {
        Ok(self.users.read().await.values().any(|u| u.email == email))
    }

    async fn ensure_role(&self, role: Role) -> Result<(), AuthError> {
        self.roles.write().await.insert(role);
        Ok(())
    }

    async fn save(&self, user: NewUser) -> Result<User, AuthError> {
        let mut users = self.users.write().await;

        // Mirror the unique constraints of the users table
        if users.values().any(|u| u.email == user.email) {
            return Err(AuthError::EmailTaken);
        }
        if users.values().any(|u| u.username == user.username) {
            return Err(AuthError::UsernameTaken);
        }

        let stored = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            enabled: user.enabled,
            roles: user.roles,
        };
        users.insert(stored.id, stored.clone());

        Ok(stored)
    }

    async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<(), AuthError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(AuthError::UserNotFound)?;
        user.enabled = enabled;
        Ok(())
    }

    async fn count(&self) -> Result<u64, AuthError> {
        Ok(self.users.read().await.len() as u64)
    }
}

#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: RwLock<HashMap<Uuid, RefreshToken>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows
    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }

    /// Rows owned by `user_id`
    #[cfg(test)]
    pub(crate) async fn tokens_for_user(&self, user_id: Uuid) -> Vec<RefreshToken> {
        self.tokens
            .read()
            .await
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, AuthError> {
        Ok(self
            .tokens
            .read()
            .await
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn delete_by_hash(&self, token_hash: &str) -> Result<u64, AuthError> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| t.token_hash != token_hash);
        Ok((before - tokens.len()) as u64)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - tokens.len()) as u64)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), AuthError> {
        self.tokens.write().await.remove(&id);
        Ok(())
    }

    async fn save(&self, token: NewRefreshToken) -> Result<RefreshToken, AuthError> {
        let mut tokens = self.tokens.write().await;

        // token_hash is unique in the refresh_tokens table
        if tokens.values().any(|t| t.token_hash == token.token_hash) {
            return Err(AuthError::Database(
                "duplicate refresh token hash".to_string(),
            ));
        }

        let stored = RefreshToken {
            id: Uuid::new_v4(),
            user_id: token.user_id,
            token_hash: token.token_hash,
            expires_at: token.expires_at,
            created_at: Utc::now(),
        };
        tokens.insert(stored.id, stored.clone());

        Ok(stored)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired_at(now));
        Ok((before - tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn new_token(user_id: Uuid, hash: &str, expires_at: DateTime<Utc>) -> NewRefreshToken {
        NewRefreshToken {
            user_id,
            token_hash: hash.to_string(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_delete_by_hash_reports_rows() {
        let store = InMemoryRefreshTokenStore::new();
        let user_id = Uuid::new_v4();
        store
            .save(new_token(user_id, "h1", Utc::now() + Duration::days(1)))
            .await
            .unwrap();

        assert_eq!(store.delete_by_hash("h1").await.unwrap(), 1);
        assert_eq!(store.delete_by_hash("h1").await.unwrap(), 0);
        assert!(store.find_by_hash("h1").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consume_has_one_winner() {
        let store = Arc::new(InMemoryRefreshTokenStore::new());
        store
            .save(new_token(Uuid::new_v4(), "contested", Utc::now() + Duration::days(1)))
            .await
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.delete_by_hash("contested").await.unwrap() })
            })
            .collect();

        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_delete_all_for_user() {
        let store = InMemoryRefreshTokenStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let later = Utc::now() + Duration::days(1);
        store.save(new_token(alice, "a1", later)).await.unwrap();
        store.save(new_token(alice, "a2", later)).await.unwrap();
        store.save(new_token(bob, "b1", later)).await.unwrap();

        assert_eq!(store.delete_all_for_user(alice).await.unwrap(), 2);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.tokens_for_user(bob).await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let store = InMemoryRefreshTokenStore::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        store
            .save(new_token(user_id, "old", now - Duration::seconds(1)))
            .await
            .unwrap();
        store
            .save(new_token(user_id, "fresh", now + Duration::days(1)))
            .await
            .unwrap();

        assert_eq!(store.delete_expired(now).await.unwrap(), 1);
        assert!(store.find_by_hash("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_user_uniqueness() {
        let store = InMemoryCredentialStore::new();
        let user = NewUser {
            username: "alice".into(),
            email: "a@b.com".into(),
            password_hash: "x".into(),
            enabled: true,
            roles: BTreeSet::from([Role::Student]),
        };
        let saved = store.save(user.clone()).await.unwrap();

        assert!(matches!(
            store.save(user.clone()).await,
            Err(AuthError::EmailTaken)
        ));
        assert!(matches!(
            store
                .save(NewUser {
                    email: "other@b.com".into(),
                    ..user
                })
                .await,
            Err(AuthError::UsernameTaken)
        ));

        let by_email = store.find_by_identifier("a@b.com").await.unwrap().unwrap();
        let by_name = store.find_by_identifier("alice").await.unwrap().unwrap();
        assert_eq!(by_email.id, saved.id);
        assert_eq!(by_name.id, saved.id);
        assert!(store.find_by_identifier("nobody").await.unwrap().is_none());
    }
}
