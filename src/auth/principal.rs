//! Principals and the store that owns them.
//!
//! Flow Overview: the gate and the login path only read principals, except
//! for the lockout fields, which are changed through
//! [`PrincipalStore::update_lock_state`] so that concurrent attempts against
//! one account never lose an increment.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use super::{error::StoreError, lockout::LockState};

/// Role that may perform administrative actions such as unlocking accounts.
pub const ADMIN_ROLE: &str = "ADMIN";

#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    /// Stable identifier, the normalized email address.
    pub subject: String,
    /// Argon2 PHC string.
    pub credential_hash: String,
    pub roles: Vec<String>,
    pub enabled: bool,
    pub lock: LockState,
    pub credentials_non_expired: bool,
    /// Tokens issued before this instant are stale.
    pub credentials_changed_at: Option<i64>,
}

impl Principal {
    #[must_use]
    pub fn new(subject: impl Into<String>, credential_hash: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            credential_hash: credential_hash.into(),
            roles: Vec::new(),
            enabled: true,
            lock: LockState::default(),
            credentials_non_expired: true,
            credentials_changed_at: None,
        }
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_credentials_changed_at(mut self, at: i64) -> Self {
        self.credentials_changed_at = Some(at);
        self
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Whether a token issued at `issued_at` still reflects the current credentials.
    #[must_use]
    pub fn credentials_fresh_for(&self, issued_at: i64) -> bool {
        self.credentials_non_expired
            && self
                .credentials_changed_at
                .map_or(true, |changed_at| issued_at >= changed_at)
    }
}

impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Principal")
            .field("subject", &self.subject)
            .field("credential_hash", &"***")
            .field("roles", &self.roles)
            .field("enabled", &self.enabled)
            .field("lock", &self.lock)
            .field("credentials_non_expired", &self.credentials_non_expired)
            .field("credentials_changed_at", &self.credentials_changed_at)
            .finish()
    }
}

#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn load_by_subject(&self, subject: &str) -> Result<Option<Principal>, StoreError>;

    /// Insert or replace a principal.
    async fn save(&self, principal: &Principal) -> Result<(), StoreError>;

    /// Apply `update` to the lock state of `subject` as one atomic step and
    /// return the new state, or `None` if the subject is unknown.
    ///
    /// `update` runs exactly once per call that finds the subject.
    async fn update_lock_state(
        &self,
        subject: &str,
        update: &mut (dyn for<'s> FnMut(&'s mut LockState) + Send),
    ) -> Result<Option<LockState>, StoreError>;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Principal store kept in process memory.
///
/// Each principal sits behind its own mutex; the outer map lock is only held
/// long enough to find or insert an entry.
#[derive(Debug, Default)]
pub struct InMemoryPrincipalStore {
    principals: RwLock<HashMap<String, Arc<Mutex<Principal>>>>,
}

impl InMemoryPrincipalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, subject: &str) -> Result<Option<Arc<Mutex<Principal>>>, StoreError> {
        let principals = self.principals.read().map_err(|_| StoreError::Poisoned)?;
        Ok(principals.get(subject).cloned())
    }
}

#[async_trait]
impl PrincipalStore for InMemoryPrincipalStore {
    async fn load_by_subject(&self, subject: &str) -> Result<Option<Principal>, StoreError> {
        let Some(entry) = self.entry(subject)? else {
            return Ok(None);
        };
        let principal = entry.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(Some(principal.clone()))
    }

    async fn save(&self, principal: &Principal) -> Result<(), StoreError> {
        if let Some(entry) = self.entry(&principal.subject)? {
            *entry.lock().map_err(|_| StoreError::Poisoned)? = principal.clone();
            return Ok(());
        }
        let mut principals = self.principals.write().map_err(|_| StoreError::Poisoned)?;
        principals.insert(
            principal.subject.clone(),
            Arc::new(Mutex::new(principal.clone())),
        );
        Ok(())
    }

    async fn update_lock_state(
        &self,
        subject: &str,
        update: &mut (dyn for<'s> FnMut(&'s mut LockState) + Send),
    ) -> Result<Option<LockState>, StoreError> {
        let Some(entry) = self.entry(subject)? else {
            return Ok(None);
        };
        let mut principal = entry.lock().map_err(|_| StoreError::Poisoned)?;
        update(&mut principal.lock);
        Ok(Some(principal.lock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::lockout::LockoutPolicy;
    use anyhow::Result;

    #[tokio::test]
    async fn save_then_load_round_trips() -> Result<()> {
        let store = InMemoryPrincipalStore::new();
        let alice = Principal::new("alice@example.com", "$argon2id$fake").with_roles(["USER"]);
        store.save(&alice).await?;

        assert_eq!(store.load_by_subject("alice@example.com").await?, Some(alice));
        assert_eq!(store.load_by_subject("bob@example.com").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn save_replaces_existing_principal() -> Result<()> {
        let store = InMemoryPrincipalStore::new();
        store.save(&Principal::new("alice@example.com", "h1")).await?;
        store
            .save(&Principal::new("alice@example.com", "h2").with_enabled(false))
            .await?;
        let loaded = store.load_by_subject("alice@example.com").await?;
        assert_eq!(loaded.map(|p| (p.credential_hash, p.enabled)), Some(("h2".into(), false)));
        Ok(())
    }

    #[tokio::test]
    async fn update_lock_state_unknown_subject() -> Result<()> {
        let store = InMemoryPrincipalStore::new();
        let mut calls = 0;
        let updated = store
            .update_lock_state("ghost@example.com", &mut |_: &mut LockState| calls += 1)
            .await?;
        assert_eq!(updated, None);
        assert_eq!(calls, 0);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_failures_are_all_counted() -> Result<()> {
        const ATTEMPTS: u32 = 64;
        let store = Arc::new(InMemoryPrincipalStore::new());
        store.save(&Principal::new("alice@example.com", "h")).await?;
        let policy = LockoutPolicy::new(5, 60);

        let mut handles = Vec::new();
        for _ in 0..ATTEMPTS {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update_lock_state("alice@example.com", &mut |state: &mut LockState| {
                        policy.record_failure(state, 100);
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await??;
        }

        let lock = store
            .load_by_subject("alice@example.com")
            .await?
            .map(|p| p.lock);
        assert_eq!(
            lock,
            Some(LockState {
                account_non_locked: false,
                failed_attempts: ATTEMPTS,
                lock_time: Some(100),
            })
        );
        Ok(())
    }

    #[test]
    fn credentials_freshness() {
        let principal = Principal::new("a@example.com", "h").with_credentials_changed_at(50);
        assert!(principal.credentials_fresh_for(50));
        assert!(!principal.credentials_fresh_for(49));

        let mut expired = Principal::new("a@example.com", "h");
        expired.credentials_non_expired = false;
        assert!(!expired.credentials_fresh_for(0));
    }

    #[test]
    fn debug_redacts_hash() {
        let principal = Principal::new("a@example.com", "$argon2id$secret");
        assert!(!format!("{principal:?}").contains("secret"));
    }
}
