//! Expired Refresh Token Sweep
//!
//! Refresh rows past their expiry are only removed when somebody presents
//! them. This background task deletes the rest periodically.

use crate::error::AuthError;
use crate::store::RefreshTokenStore;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Delete every refresh token that expired before now
pub async fn sweep_expired_refresh_tokens(
    store: &dyn RefreshTokenStore,
) -> Result<u64, AuthError> {
    let removed = store.delete_expired(Utc::now()).await?;
    if removed > 0 {
        tracing::info!(removed, "Swept expired refresh tokens");
    }
    Ok(removed)
}

/// Spawn the periodic sweep. Returns `None` when `every` is zero.
///
/// Failures are logged and the loop keeps running.
pub fn spawn_refresh_token_sweep(
    store: Arc<dyn RefreshTokenStore>,
    every: Duration,
) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        tracing::debug!("Refresh token sweep disabled");
        return None;
    }

    tracing::info!(interval_secs = every.as_secs_f64(), "Starting refresh token sweep");

    Some(tokio::spawn(async move {
        let mut tick = interval(every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;

            if let Err(e) = sweep_expired_refresh_tokens(store.as_ref()).await {
                tracing::warn!(kind = e.kind(), error = %e, "Refresh token sweep failed");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewRefreshToken;
    use crate::store::InMemoryRefreshTokenStore;
    use uuid::Uuid;

    async fn seed(store: &InMemoryRefreshTokenStore) {
        let user_id = Uuid::new_v4();
        for (hash, offset) in [("old-1", -60), ("old-2", -1), ("live", 3600)] {
            store
                .save(NewRefreshToken {
                    user_id,
                    token_hash: hash.to_string(),
                    expires_at: Utc::now() + chrono::Duration::seconds(offset),
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = InMemoryRefreshTokenStore::new();
        seed(&store).await;

        let removed = sweep_expired_refresh_tokens(&store).await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(store.len().await, 1);
        assert!(store.find_by_hash("live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_zero_interval_disables_sweep() {
        let store = Arc::new(InMemoryRefreshTokenStore::new());
        assert!(spawn_refresh_token_sweep(store, Duration::ZERO).is_none());
    }

    #[tokio::test]
    async fn test_spawned_sweep_runs() {
        let store = Arc::new(InMemoryRefreshTokenStore::new());
        seed(&store).await;

        let handle = spawn_refresh_token_sweep(store.clone(), Duration::from_millis(10))
            .expect("sweep should be enabled");

        // First tick fires immediately
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(store.len().await, 1);
    }
}
