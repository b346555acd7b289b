//! Per-request authentication.
//!
//! Flow Overview:
//! 1) Allow-listed paths are anonymous and skip everything else.
//! 2) Take the bearer header, else the access cookie; neither is `MissingToken`.
//! 3) Decode as an access token (any decode failure keeps its own kind).
//! 4) Reject revoked token ids.
//! 5) Load the principal; check enabled, lock (resolving an elapsed cooldown),
//!    and credential freshness.
//! 6) Authenticated: when little validity is left, reissue an access token
//!    with the same subject and roles. Reissue failures never fail the request.
//!
//! Store failures become `InternalError` and are logged with the subject,
//! never with the token.

use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::{
    clock::Clock,
    codec::{IssuedToken, TokenClaims, TokenKind},
    config::AuthConfig,
    cookie::extract_access_token,
    error::AuthError,
    issuer::TokenIssuer,
    lockout::{LockState, LockoutPolicy},
    principal::{Principal, PrincipalStore},
    revocation::RevocationStore,
};

/// Identity attached to an authenticated request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    pub subject: String,
    pub roles: Vec<String>,
    pub claims: TokenClaims,
}

impl AuthenticatedPrincipal {
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Result of authenticating one request. Lives for that request only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthenticationDecision {
    /// Allow-listed path; no token was looked at.
    Anonymous,
    Authenticated(AuthenticatedPrincipal),
    Rejected(AuthError),
}

#[derive(Clone, Debug)]
pub struct GateOutcome {
    pub decision: AuthenticationDecision,
    /// Replacement access token to hand back with the response.
    pub refreshed: Option<IssuedToken>,
}

impl GateOutcome {
    fn decided(decision: AuthenticationDecision) -> Self {
        Self {
            decision,
            refreshed: None,
        }
    }
}

pub struct AuthenticationGate {
    issuer: TokenIssuer,
    revocations: Arc<dyn RevocationStore>,
    principals: Arc<dyn PrincipalStore>,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
    config: Arc<AuthConfig>,
}

impl AuthenticationGate {
    #[must_use]
    pub fn new(
        issuer: TokenIssuer,
        revocations: Arc<dyn RevocationStore>,
        principals: Arc<dyn PrincipalStore>,
        clock: Arc<dyn Clock>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            issuer,
            revocations,
            principals,
            policy: config.lockout_policy(),
            clock,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticate a request given its path and headers.
    pub async fn authenticate(&self, path: &str, headers: &HeaderMap) -> GateOutcome {
        if self.config.is_public(path) {
            return GateOutcome::decided(AuthenticationDecision::Anonymous);
        }
        let Some(token) = extract_access_token(headers, self.config.cookies()) else {
            debug!(path, "No token on protected path");
            return GateOutcome::decided(AuthenticationDecision::Rejected(
                AuthError::MissingToken,
            ));
        };

        let now = self.clock.now();
        let (claims, principal) = match self.validate(&token, TokenKind::Access, now).await {
            Ok(validated) => validated,
            Err(err) => return GateOutcome::decided(AuthenticationDecision::Rejected(err)),
        };

        let refreshed = self.proactive_refresh(&claims, now);
        GateOutcome {
            decision: AuthenticationDecision::Authenticated(AuthenticatedPrincipal {
                subject: principal.subject,
                roles: claims.roles.clone(),
                claims,
            }),
            refreshed,
        }
    }

    /// Run the token and principal checks for a token of `kind`.
    ///
    /// # Errors
    /// The first failing check.
    pub async fn validate(
        &self,
        token: &str,
        kind: TokenKind,
        now: i64,
    ) -> Result<(TokenClaims, Principal), AuthError> {
        let claims = self
            .issuer
            .codec()
            .decode_expecting(token, kind, now)
            .map_err(|err| {
                let err = AuthError::from(err);
                if err == AuthError::BadSignature {
                    warn!("Rejected token with invalid signature");
                } else {
                    debug!("Rejected token: {err}");
                }
                err
            })?;

        match self.revocations.is_revoked(&claims.jti).await {
            Ok(false) => {}
            Ok(true) => {
                debug!(subject = %claims.sub, "Rejected revoked token");
                return Err(AuthError::Revoked);
            }
            Err(err) => {
                error!(subject = %claims.sub, "Failed to check revocation: {err}");
                return Err(AuthError::InternalError);
            }
        }

        let principal = match self.principals.load_by_subject(&claims.sub).await {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                debug!(subject = %claims.sub, "Token subject no longer exists");
                return Err(AuthError::PrincipalNotFound);
            }
            Err(err) => {
                error!(subject = %claims.sub, "Failed to load principal: {err}");
                return Err(AuthError::InternalError);
            }
        };

        self.check_principal(&principal, &claims, now).await?;
        Ok((claims, principal))
    }

    async fn check_principal(
        &self,
        principal: &Principal,
        claims: &TokenClaims,
        now: i64,
    ) -> Result<(), AuthError> {
        if !principal.enabled {
            debug!(subject = %principal.subject, "Rejected token for disabled account");
            return Err(AuthError::AccountDisabled);
        }

        if !principal.lock.account_non_locked {
            let policy = self.policy;
            let mut locked = true;
            let updated = self
                .principals
                .update_lock_state(&principal.subject, &mut |state: &mut LockState| {
                    locked = policy.resolve(state, now).is_locked();
                })
                .await;
            match updated {
                Ok(Some(_)) if locked => {
                    debug!(subject = %principal.subject, "Rejected token for locked account");
                    return Err(AuthError::AccountLocked);
                }
                Ok(Some(_)) => {}
                Ok(None) => return Err(AuthError::PrincipalNotFound),
                Err(err) => {
                    error!(subject = %principal.subject, "Failed to resolve lock state: {err}");
                    return Err(AuthError::InternalError);
                }
            }
        }

        if !principal.credentials_fresh_for(claims.iat) {
            debug!(subject = %principal.subject, "Rejected token with stale credentials");
            return Err(AuthError::CredentialsStale);
        }
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn proactive_refresh(&self, claims: &TokenClaims, now: i64) -> Option<IssuedToken> {
        let remaining = claims.remaining(now) as f64;
        let trigger = claims.lifetime() as f64 * self.config.refresh_fraction();
        if remaining >= trigger {
            return None;
        }
        match self.issuer.reissue_access(claims, now) {
            Ok(issued) => {
                debug!(subject = %claims.sub, "Issued proactive access token refresh");
                Some(issued)
            }
            Err(err) => {
                warn!(subject = %claims.sub, "Failed to refresh access token: {err}");
                None
            }
        }
    }
}

impl std::fmt::Debug for AuthenticationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationGate")
            .field("issuer", &self.issuer)
            .field("policy", &self.policy)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
