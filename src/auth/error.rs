//! Closed set of authentication outcomes that reject a request.
//!
//! Every variant maps to a stable HTTP status and a short machine-readable
//! code. These are expected results, returned as values up to the HTTP
//! boundary; none of them is a fault of the request-handling task.

use axum::http::StatusCode;
use thiserror::Error;

use super::codec::DecodeError;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum AuthError {
    #[error("Malformed token")]
    Malformed,
    #[error("Unsupported token")]
    Unsupported,
    #[error("Invalid token signature")]
    BadSignature,
    #[error("Token expired")]
    Expired,
    #[error("Token revoked")]
    Revoked,
    #[error("Principal not found")]
    PrincipalNotFound,
    #[error("Account disabled")]
    AccountDisabled,
    #[error("Account locked")]
    AccountLocked,
    #[error("Credentials are stale")]
    CredentialsStale,
    #[error("Internal error")]
    InternalError,
    #[error("Missing token")]
    MissingToken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Forbidden")]
    Forbidden,
}

impl AuthError {
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::Malformed | Self::Unsupported => StatusCode::BAD_REQUEST,
            Self::BadSignature | Self::AccountDisabled | Self::AccountLocked | Self::Forbidden => {
                StatusCode::FORBIDDEN
            }
            Self::Expired
            | Self::Revoked
            | Self::PrincipalNotFound
            | Self::CredentialsStale
            | Self::MissingToken
            | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Malformed => "malformed_token",
            Self::Unsupported => "unsupported_token",
            Self::BadSignature => "bad_signature",
            Self::Expired => "token_expired",
            Self::Revoked => "token_revoked",
            Self::PrincipalNotFound => "principal_not_found",
            Self::AccountDisabled => "account_disabled",
            Self::AccountLocked => "account_locked",
            Self::CredentialsStale => "credentials_stale",
            Self::InternalError => "internal_error",
            Self::MissingToken => "missing_token",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Forbidden => "forbidden",
        }
    }
}

impl From<DecodeError> for AuthError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Malformed => Self::Malformed,
            DecodeError::Unsupported => Self::Unsupported,
            DecodeError::BadSignature => Self::BadSignature,
            DecodeError::Expired => Self::Expired,
        }
    }
}

/// Failure reported by a principal or revocation store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("{0}")]
    Other(String),
}
