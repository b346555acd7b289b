//! Revoked-token registry.
//!
//! Entries are keyed by the token `jti` and remember the token's own expiry.
//! Once that expiry passes the token is rejected as expired anyway, so the
//! entry can be dropped; `sweep` does that off the request path.

use async_trait::async_trait;
use rand::Rng;
use std::collections::{hash_map::Entry, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::{clock::Clock, error::StoreError};

#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Mark `token_id` as revoked until `expires_at`.
    ///
    /// Returns `true` only for the call that first revoked `token_id`, so
    /// callers can use it to claim a token exactly once.
    async fn revoke(&self, token_id: &str, expires_at: i64) -> Result<bool, StoreError>;

    async fn is_revoked(&self, token_id: &str) -> Result<bool, StoreError>;

    /// Drop entries whose `expires_at <= now`; returns how many were removed.
    async fn sweep(&self, now: i64) -> Result<usize, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    entries: RwLock<HashMap<String, i64>>,
}

impl InMemoryRevocationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked entries, swept or not.
    ///
    /// # Errors
    /// Returns `StoreError::Poisoned` if a writer panicked.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entries.read().map_err(|_| StoreError::Poisoned)?.len())
    }

    /// # Errors
    /// Returns `StoreError::Poisoned` if a writer panicked.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|len| len == 0)
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn revoke(&self, token_id: &str, expires_at: i64) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        match entries.entry(token_id.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                Ok(true)
            }
            // Keep the later expiry if the same id is revoked twice.
            Entry::Occupied(mut slot) => {
                let kept = (*slot.get()).max(expires_at);
                slot.insert(kept);
                Ok(false)
            }
        }
    }

    async fn is_revoked(&self, token_id: &str) -> Result<bool, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.contains_key(token_id))
    }

    async fn sweep(&self, now: i64) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        Ok(before - entries.len())
    }
}

/// Periodically sweep `store`, with up to 10% jitter on each interval.
pub fn spawn_sweeper(
    store: Arc<dyn RevocationStore>,
    clock: Arc<dyn Clock>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let jittered = every.mul_f64(rand::thread_rng().gen_range(0.9..1.1));
            tokio::time::sleep(jittered).await;

            match store.sweep(clock.now()).await {
                Ok(0) => {}
                Ok(removed) => debug!("Swept {} expired revocation entries", removed),
                Err(err) => error!("Failed to sweep revocation store: {err}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;

    #[tokio::test]
    async fn revoked_until_swept_after_expiry() -> Result<(), StoreError> {
        let store = InMemoryRevocationStore::new();
        store.revoke("jti-1", 200).await?;
        store.revoke("jti-2", 500).await?;

        assert!(store.is_revoked("jti-1").await?);
        assert!(!store.is_revoked("jti-3").await?);

        assert_eq!(store.sweep(199).await?, 0);
        assert!(store.is_revoked("jti-1").await?);

        assert_eq!(store.sweep(200).await?, 1);
        assert!(!store.is_revoked("jti-1").await?);
        assert!(store.is_revoked("jti-2").await?);
        assert_eq!(store.len()?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn revoking_twice_keeps_latest_expiry() -> Result<(), StoreError> {
        let store = InMemoryRevocationStore::new();
        assert!(store.revoke("jti", 300).await?);
        assert!(!store.revoke("jti", 100).await?);
        assert_eq!(store.sweep(200).await?, 0);
        assert!(store.is_revoked("jti").await?);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_revokes_claim_once() -> Result<(), StoreError> {
        let store = Arc::new(InMemoryRevocationStore::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.revoke("jti", 300).await }));
        }
        let mut claimed = 0;
        for handle in handles {
            let first = handle
                .await
                .map_err(|err| StoreError::Other(err.to_string()))??;
            if first {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_removes_expired_entries() -> Result<(), StoreError> {
        let store = Arc::new(InMemoryRevocationStore::new());
        let clock = Arc::new(ManualClock::new(1_000));
        store.revoke("old", 1_010).await?;
        store.revoke("new", 5_000).await?;

        let handle = spawn_sweeper(store.clone(), clock.clone(), Duration::from_secs(60));
        clock.set(2_000);
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert!(!store.is_revoked("old").await?);
        assert!(store.is_revoked("new").await?);
        handle.abort();
        Ok(())
    }
}
