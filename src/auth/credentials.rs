//! Password login gated by the lockout policy.
//!
//! Flow Overview:
//! 1) Normalize the subject and load the principal.
//! 2) Reject disabled accounts, then resolve the lock (lazy cooldown expiry).
//! 3) Verify the Argon2 hash on the blocking pool.
//! 4) Record the failure or success through the store's atomic lock update.
//!
//! Unknown subjects and wrong passwords both surface as `InvalidCredentials`.

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use super::{
    clock::Clock,
    error::AuthError,
    lockout::{LockState, LockStatus, LockoutPolicy},
    principal::{Principal, PrincipalStore},
};

/// Normalize a subject for lookups: trimmed and lowercased.
#[must_use]
pub fn normalize_subject(subject: &str) -> String {
    subject.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Hash a password into a PHC string with the default Argon2id parameters.
///
/// # Errors
/// Returns an error if hashing fails.
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    hash_password_with(&Argon2::default(), password)
}

/// Hash a password with explicit Argon2 settings.
///
/// # Errors
/// Returns an error if hashing fails.
pub fn hash_password_with(
    argon2: &Argon2<'_>,
    password: &str,
) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(argon2
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Checks passwords and keeps the lockout counters in step.
#[derive(Clone)]
pub struct Authenticator {
    principals: Arc<dyn PrincipalStore>,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
}

impl Authenticator {
    #[must_use]
    pub fn new(
        principals: Arc<dyn PrincipalStore>,
        policy: LockoutPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            principals,
            policy,
            clock,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    /// Verify `password` for `subject`.
    ///
    /// # Errors
    /// `InvalidCredentials`, `AccountDisabled`, `AccountLocked`, or
    /// `InternalError` when the store or the hasher fails.
    #[instrument(skip(self, password))]
    pub async fn login(&self, subject: &str, password: &str) -> Result<Principal, AuthError> {
        let subject = normalize_subject(subject);
        let mut principal = match self.principals.load_by_subject(&subject).await {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                debug!("Login for unknown subject");
                // Pay the same hashing cost as a wrong password.
                let _ = verify_password(
                    UNKNOWN_PRINCIPAL_HASH.to_string(),
                    SecretString::from(password.to_string()),
                )
                .await;
                return Err(AuthError::InvalidCredentials);
            }
            Err(err) => {
                error!(subject = %subject, "Failed to load principal: {err}");
                return Err(AuthError::InternalError);
            }
        };

        if !principal.enabled {
            debug!(subject = %subject, "Login for disabled account");
            return Err(AuthError::AccountDisabled);
        }

        let policy = self.policy;
        let now = self.clock.now();
        let (status, _) = self
            .apply_lock(&subject, move |state| policy.resolve(state, now))
            .await?;
        if status.is_locked() {
            debug!(subject = %subject, "Login while account is locked");
            return Err(AuthError::AccountLocked);
        }

        let verified = verify_password(
            principal.credential_hash.clone(),
            SecretString::from(password.to_string()),
        )
        .await
        .map_err(|err| {
            error!(subject = %subject, "Failed to verify password: {err}");
            AuthError::InternalError
        })?;

        let now = self.clock.now();
        if !verified {
            let (status, state) = self
                .apply_lock(&subject, move |state| policy.record_failure(state, now))
                .await?;
            if let LockStatus::Locked { until } = status {
                if state.lock_time == Some(now) && state.failed_attempts == policy.threshold() {
                    warn!(
                        subject = %subject,
                        failed_attempts = state.failed_attempts,
                        ?until,
                        "Account locked after repeated failures"
                    );
                }
            }
            return Err(AuthError::InvalidCredentials);
        }

        let (status, state) = self
            .apply_lock(&subject, move |state| policy.record_success(state, now))
            .await?;
        if status.is_locked() {
            // A concurrent failure reached the threshold first.
            debug!(subject = %subject, "Account locked during login");
            return Err(AuthError::AccountLocked);
        }

        principal.lock = state;
        Ok(principal)
    }

    /// Administrative unlock; returns `false` when the subject is unknown.
    ///
    /// # Errors
    /// `InternalError` when the store fails.
    #[instrument(skip(self))]
    pub async fn unlock(&self, subject: &str) -> Result<bool, AuthError> {
        let subject = normalize_subject(subject);
        let policy = self.policy;
        match self
            .principals
            .update_lock_state(&subject, &mut |state: &mut LockState| policy.unlock(state))
            .await
        {
            Ok(updated) => Ok(updated.is_some()),
            Err(err) => {
                error!(subject = %subject, "Failed to unlock principal: {err}");
                Err(AuthError::InternalError)
            }
        }
    }

    async fn apply_lock<F>(
        &self,
        subject: &str,
        mut step: F,
    ) -> Result<(LockStatus, LockState), AuthError>
    where
        F: FnMut(&mut LockState) -> LockStatus + Send,
    {
        let mut status = LockStatus::Open;
        let updated = self
            .principals
            .update_lock_state(subject, &mut |state: &mut LockState| status = step(state))
            .await;
        match updated {
            Ok(Some(state)) => Ok((status, state)),
            // Deleted between load and update.
            Ok(None) => Err(AuthError::InvalidCredentials),
            Err(err) => {
                error!(subject = %subject, "Failed to update lock state: {err}");
                Err(AuthError::InternalError)
            }
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Argon2 hash with default parameters that matches no password.
const UNKNOWN_PRINCIPAL_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$GfHhjuTGgR4IC/1t/bT2QA$zbXGLJ47jzcd2p1XjyuqLUeKSCdWtdmp7nAUuIphh7w";

#[derive(Debug, thiserror::Error)]
enum VerifyError {
    #[error("invalid password hash: {0}")]
    Hash(password_hash::Error),
    #[error("verification task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

async fn verify_password(hash: String, password: SecretString) -> Result<bool, VerifyError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash).map_err(VerifyError::Hash)?;
        match Argon2::default().verify_password(password.expose_secret().as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => Err(VerifyError::Hash(err)),
        }
    })
    .await?
}
