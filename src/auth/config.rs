//! Auth configuration: token lifetimes, lockout, refresh trigger, cookies, public paths.

use thiserror::Error;

use super::{codec::TokenLifetimes, lockout::LockoutPolicy};

const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 5 * 60 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_LOCKOUT_THRESHOLD: u32 = 5;
const DEFAULT_LOCKOUT_COOLDOWN_SECONDS: i64 = 30 * 60;
const DEFAULT_REFRESH_FRACTION: f64 = 0.2;
const DEFAULT_REVOCATION_SWEEP_SECONDS: u64 = 60;
const DEFAULT_COOKIE_NAME: &str = "jwt";
const DEFAULT_REFRESH_COOKIE_NAME: &str = "refresh_token";
pub const DEFAULT_PUBLIC_PATHS: &str =
    "/health,/api/auth/login,/api/auth/refresh,/api/auth/logout,/api/public/";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("access token lifetime must be positive, got {0}s")]
    AccessTtl(i64),
    #[error("refresh token lifetime ({refresh}s) must exceed access token lifetime ({access}s)")]
    RefreshTtl { access: i64, refresh: i64 },
    #[error("refresh fraction must be between 0 and 1 (exclusive), got {0}")]
    RefreshFraction(f64),
    #[error("lockout threshold must be at least 1")]
    LockoutThreshold,
    #[error("lockout cooldown must be at least 1s, got {0}s")]
    LockoutCooldown(i64),
    #[error("cookie name must not be empty")]
    CookieName,
}

/// Cookie attributes shared by the access and refresh cookies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieSettings {
    name: String,
    refresh_name: String,
    secure: bool,
    http_only: bool,
    domain: Option<String>,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            refresh_name: DEFAULT_REFRESH_COOKIE_NAME.to_string(),
            secure: true,
            http_only: true,
            domain: None,
        }
    }
}

impl CookieSettings {
    #[must_use]
    pub fn with_name(mut self, name: String) -> Self {
        self.name = name;
        self
    }

    #[must_use]
    pub fn with_refresh_name(mut self, name: String) -> Self {
        self.refresh_name = name;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain.filter(|d| !d.trim().is_empty());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn refresh_name(&self) -> &str {
        &self.refresh_name
    }

    #[must_use]
    pub fn secure(&self) -> bool {
        self.secure
    }

    #[must_use]
    pub fn http_only(&self) -> bool {
        self.http_only
    }

    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// `None` is only accepted by browsers on secure cookies.
    #[must_use]
    pub fn same_site(&self) -> &'static str {
        if self.secure {
            "None"
        } else {
            "Lax"
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    lockout_threshold: u32,
    lockout_cooldown_seconds: i64,
    refresh_fraction: f64,
    revocation_sweep_seconds: u64,
    cookies: CookieSettings,
    public_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            lockout_threshold: DEFAULT_LOCKOUT_THRESHOLD,
            lockout_cooldown_seconds: DEFAULT_LOCKOUT_COOLDOWN_SECONDS,
            refresh_fraction: DEFAULT_REFRESH_FRACTION,
            revocation_sweep_seconds: DEFAULT_REVOCATION_SWEEP_SECONDS,
            cookies: CookieSettings::default(),
            public_paths: parse_public_paths(DEFAULT_PUBLIC_PATHS),
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_lockout_threshold(mut self, threshold: u32) -> Self {
        self.lockout_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_lockout_cooldown_seconds(mut self, seconds: i64) -> Self {
        self.lockout_cooldown_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_fraction(mut self, fraction: f64) -> Self {
        self.refresh_fraction = fraction;
        self
    }

    #[must_use]
    pub fn with_revocation_sweep_seconds(mut self, seconds: u64) -> Self {
        self.revocation_sweep_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cookies(mut self, cookies: CookieSettings) -> Self {
        self.cookies = cookies;
        self
    }

    #[must_use]
    pub fn with_public_paths(mut self, paths: Vec<String>) -> Self {
        self.public_paths = paths;
        self
    }

    #[must_use]
    pub fn token_lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            access_seconds: self.access_token_ttl_seconds,
            refresh_seconds: self.refresh_token_ttl_seconds,
        }
    }

    #[must_use]
    pub fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy::new(self.lockout_threshold, self.lockout_cooldown_seconds)
    }

    #[must_use]
    pub fn refresh_fraction(&self) -> f64 {
        self.refresh_fraction
    }

    #[must_use]
    pub fn revocation_sweep_seconds(&self) -> u64 {
        self.revocation_sweep_seconds
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieSettings {
        &self.cookies
    }

    #[must_use]
    pub fn public_paths(&self) -> &[String] {
        &self.public_paths
    }

    /// Whether `path` skips authentication.
    ///
    /// Entries ending in `/` match as prefixes; others match exactly or as a
    /// parent segment (`/health` matches `/health/live`).
    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|entry| {
            if entry.ends_with('/') {
                path.starts_with(entry.as_str())
            } else {
                path == entry
                    || path
                        .strip_prefix(entry.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        })
    }

    /// Reject settings the server must not start with.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token_ttl_seconds <= 0 {
            return Err(ConfigError::AccessTtl(self.access_token_ttl_seconds));
        }
        if self.refresh_token_ttl_seconds <= self.access_token_ttl_seconds {
            return Err(ConfigError::RefreshTtl {
                access: self.access_token_ttl_seconds,
                refresh: self.refresh_token_ttl_seconds,
            });
        }
        if !(self.refresh_fraction > 0.0 && self.refresh_fraction < 1.0) {
            return Err(ConfigError::RefreshFraction(self.refresh_fraction));
        }
        if self.lockout_threshold < 1 {
            return Err(ConfigError::LockoutThreshold);
        }
        if self.lockout_cooldown_seconds < 1 {
            return Err(ConfigError::LockoutCooldown(self.lockout_cooldown_seconds));
        }
        if self.cookies.name.trim().is_empty() || self.cookies.refresh_name.trim().is_empty() {
            return Err(ConfigError::CookieName);
        }
        Ok(())
    }
}

/// Split a comma-separated path list, dropping blanks.
#[must_use]
pub fn parse_public_paths(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(str::to_string)
        .collect()
}
