//! Account lockout after repeated credential failures.
//!
//! Flow Overview:
//! 1) Each failed credential check increments `failed_attempts`.
//! 2) Reaching the threshold locks the account and stamps `lock_time = now`.
//! 3) While locked, attempts are rejected without checking credentials.
//! 4) The lock is lifted lazily: the first attempt at or after
//!    `lock_time + cooldown` resets the counter and proceeds as open.
//! 5) A successful check while open resets the counter.
//!
//! The policy only transforms a [`LockState`]; stores apply it as one atomic
//! read-modify-write per principal (see `PrincipalStore::update_lock_state`).
//! The cooldown is fixed, repeated lockouts do not escalate.

use serde::{Deserialize, Serialize};

const DEFAULT_THRESHOLD: u32 = 5;
const DEFAULT_COOLDOWN_SECONDS: i64 = 30 * 60;

/// Lock-related fields of a principal.
///
/// `account_non_locked == false` implies `lock_time.is_some()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    pub account_non_locked: bool,
    pub failed_attempts: u32,
    pub lock_time: Option<i64>,
}

impl Default for LockState {
    fn default() -> Self {
        Self {
            account_non_locked: true,
            failed_attempts: 0,
            lock_time: None,
        }
    }
}

impl LockState {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockStatus {
    Open,
    /// `until` is `None` when the lock has no timestamp and needs an administrative unlock.
    Locked { until: Option<i64> },
}

impl LockStatus {
    #[must_use]
    pub const fn is_locked(self) -> bool {
        matches!(self, Self::Locked { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockoutPolicy {
    threshold: u32,
    cooldown_seconds: i64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
        }
    }
}

impl LockoutPolicy {
    #[must_use]
    pub fn new(threshold: u32, cooldown_seconds: i64) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown_seconds: cooldown_seconds.max(1),
        }
    }

    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    #[must_use]
    pub const fn cooldown_seconds(&self) -> i64 {
        self.cooldown_seconds
    }

    /// Evaluate `state` at `now` without changing it.
    ///
    /// A lock whose cooldown has elapsed already reads as `Open`.
    #[must_use]
    pub fn status(&self, state: &LockState, now: i64) -> LockStatus {
        if state.account_non_locked {
            return LockStatus::Open;
        }
        match state.lock_time {
            Some(locked_at) => {
                let until = locked_at.saturating_add(self.cooldown_seconds);
                if now >= until {
                    LockStatus::Open
                } else {
                    LockStatus::Locked { until: Some(until) }
                }
            }
            None => LockStatus::Locked { until: None },
        }
    }

    /// Apply the lazy `LOCKED -> OPEN` transition if the cooldown has elapsed.
    pub fn resolve(&self, state: &mut LockState, now: i64) -> LockStatus {
        if !state.account_non_locked && self.status(state, now) == LockStatus::Open {
            state.reset();
        }
        self.status(state, now)
    }

    /// Count one failed credential check.
    ///
    /// The counter always increments; the lock timestamp is only set on the
    /// `OPEN -> LOCKED` transition, never refreshed by later failures.
    pub fn record_failure(&self, state: &mut LockState, now: i64) -> LockStatus {
        let before = self.resolve(state, now);
        state.failed_attempts = state.failed_attempts.saturating_add(1);
        if before == LockStatus::Open && state.failed_attempts >= self.threshold {
            state.account_non_locked = false;
            state.lock_time = Some(now);
        }
        self.status(state, now)
    }

    /// Record a successful credential check; resets the counter when open.
    pub fn record_success(&self, state: &mut LockState, now: i64) -> LockStatus {
        let status = self.resolve(state, now);
        if status == LockStatus::Open {
            state.failed_attempts = 0;
        }
        status
    }

    /// Administrative unlock: clears the lock and the counter unconditionally.
    pub fn unlock(&self, state: &mut LockState) {
        state.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_login_policy() {
        let policy = LockoutPolicy::default();
        assert_eq!(policy.threshold(), 5);
        assert_eq!(policy.cooldown_seconds(), 1800);
        assert_eq!(LockoutPolicy::new(0, 0).threshold(), 1);
    }

    #[test]
    fn locks_on_threshold_and_rejects_until_cooldown() {
        let policy = LockoutPolicy::new(5, 60);
        let mut state = LockState::default();

        for attempt in 1..5 {
            assert_eq!(policy.record_failure(&mut state, 100), LockStatus::Open);
            assert_eq!(state.failed_attempts, attempt);
        }
        assert_eq!(
            policy.record_failure(&mut state, 100),
            LockStatus::Locked { until: Some(160) }
        );
        assert!(!state.account_non_locked);
        assert_eq!(state.lock_time, Some(100));

        // A correct password does not get through while locked.
        assert!(policy.record_success(&mut state, 101).is_locked());
        assert_eq!(state.failed_attempts, 5);
    }

    #[test]
    fn failures_while_locked_count_but_keep_lock_time() {
        let policy = LockoutPolicy::new(2, 60);
        let mut state = LockState::default();
        policy.record_failure(&mut state, 10);
        policy.record_failure(&mut state, 11);
        policy.record_failure(&mut state, 12);
        assert_eq!(state.failed_attempts, 3);
        assert_eq!(state.lock_time, Some(11));
    }

    #[test]
    fn scenario_threshold_three_cooldown_sixty() {
        let policy = LockoutPolicy::new(3, 60);
        let mut state = LockState::default();

        policy.record_failure(&mut state, 0);
        policy.record_failure(&mut state, 1);
        assert_eq!(
            policy.record_failure(&mut state, 2),
            LockStatus::Locked { until: Some(62) }
        );
        assert_eq!(state.lock_time, Some(2));

        assert!(policy.resolve(&mut state, 10).is_locked());

        assert_eq!(policy.record_success(&mut state, 65), LockStatus::Open);
        assert_eq!(state, LockState::default());
    }

    #[test]
    fn failure_after_cooldown_starts_a_fresh_count() {
        let policy = LockoutPolicy::new(2, 60);
        let mut state = LockState::default();
        policy.record_failure(&mut state, 0);
        policy.record_failure(&mut state, 0);
        assert_eq!(policy.record_failure(&mut state, 60), LockStatus::Open);
        assert_eq!(state.failed_attempts, 1);
        assert!(state.account_non_locked);
    }

    #[test]
    fn success_while_open_resets_counter() {
        let policy = LockoutPolicy::new(5, 60);
        let mut state = LockState::default();
        policy.record_failure(&mut state, 0);
        policy.record_failure(&mut state, 0);
        assert_eq!(policy.record_success(&mut state, 1), LockStatus::Open);
        assert_eq!(state.failed_attempts, 0);
    }

    #[test]
    fn status_does_not_mutate_and_untimed_lock_stays_locked() {
        let policy = LockoutPolicy::new(1, 60);
        let state = LockState {
            account_non_locked: false,
            failed_attempts: 1,
            lock_time: Some(0),
        };
        assert_eq!(policy.status(&state, 60), LockStatus::Open);
        assert!(!state.account_non_locked);

        let untimed = LockState {
            account_non_locked: false,
            failed_attempts: 0,
            lock_time: None,
        };
        assert_eq!(
            policy.status(&untimed, i64::MAX),
            LockStatus::Locked { until: None }
        );
    }

    #[test]
    fn unlock_clears_everything() {
        let policy = LockoutPolicy::new(1, 3600);
        let mut state = LockState::default();
        policy.record_failure(&mut state, 0);
        policy.unlock(&mut state);
        assert_eq!(state, LockState::default());
        assert_eq!(policy.status(&state, 1), LockStatus::Open);
    }
}
