//! Signed bearer tokens (compact JWS, HS512).
//!
//! Wire format: `base64url(header).base64url(claims).base64url(signature)`,
//! unpadded, with the HMAC-SHA512 computed over `header.claims`.
//!
//! Decoding reports *why* a token is unusable. Callers map each outcome to a
//! distinct status, so an expired token is never confused with a forged one:
//!
//! 1. wrong segment count, undecodable header: `Malformed`
//! 2. header names another algorithm or type: `Unsupported`
//! 3. signature segment differs from the expected one: `BadSignature`
//! 4. undecodable claims: `Malformed`; unknown `kind`: `Unsupported`
//! 5. `exp <= now`: `Expired`

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use super::key::SigningKey;

type HmacSha512 = Hmac<Sha512>;

pub const TOKEN_ALG: &str = "HS512";
pub const TOKEN_TYP: &str = "JWT";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "access" => Some(Self::Access),
            "refresh" => Some(Self::Refresh),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs512() -> Self {
        Self {
            alg: TOKEN_ALG.to_string(),
            typ: TOKEN_TYP.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub sub: String,
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub kind: TokenKind,
}

impl TokenClaims {
    /// Seconds of validity left at `now` (never negative).
    #[must_use]
    pub fn remaining(&self, now: i64) -> i64 {
        (self.exp - now).max(0)
    }

    /// Total lifetime the token was issued with.
    #[must_use]
    pub fn lifetime(&self) -> i64 {
        self.exp - self.iat
    }
}

// `kind` is decoded as a plain string so an unknown kind is reported as
// unsupported rather than malformed.
#[derive(Deserialize)]
struct RawClaims {
    sub: String,
    #[serde(default)]
    roles: Vec<String>,
    iat: i64,
    exp: i64,
    jti: String,
    kind: String,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed token")]
    Malformed,
    #[error("unsupported token")]
    Unsupported,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("failed to encode token: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid signing key length")]
    KeyLength,
}

/// Per-kind token lifetimes in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access_seconds: i64,
    pub refresh_seconds: i64,
}

impl TokenLifetimes {
    #[must_use]
    pub const fn for_kind(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_seconds,
            TokenKind::Refresh => self.refresh_seconds,
        }
    }
}

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

#[derive(Clone)]
pub struct TokenCodec {
    key: Arc<SigningKey>,
    lifetimes: TokenLifetimes,
}

impl TokenCodec {
    #[must_use]
    pub fn new(key: Arc<SigningKey>, lifetimes: TokenLifetimes) -> Self {
        Self { key, lifetimes }
    }

    #[must_use]
    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// Sign a new token for `subject`, valid from `now` for the lifetime of `kind`.
    ///
    /// # Errors
    /// Returns an error if the header or claims cannot be serialized.
    pub fn issue(
        &self,
        subject: &str,
        roles: &[String],
        kind: TokenKind,
        now: i64,
    ) -> Result<IssuedToken, IssueError> {
        let claims = TokenClaims {
            sub: subject.to_string(),
            roles: roles.to_vec(),
            iat: now,
            exp: now.saturating_add(self.lifetimes.for_kind(kind)),
            jti: Uuid::new_v4().to_string(),
            kind,
        };
        let token = self.encode(&claims)?;
        Ok(IssuedToken { token, claims })
    }

    fn encode(&self, claims: &TokenClaims) -> Result<String, IssueError> {
        let header_b64 = b64e_json(&TokenHeader::hs512())?;
        let claims_b64 = b64e_json(claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");
        let signature_b64 = self.sign(&signing_input)?;
        Ok(format!("{signing_input}.{signature_b64}"))
    }

    fn sign(&self, signing_input: &str) -> Result<String, IssueError> {
        let mut mac =
            HmacSha512::new_from_slice(self.key.expose()).map_err(|_| IssueError::KeyLength)?;
        mac.update(signing_input.as_bytes());
        Ok(Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes()))
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    /// Returns the first failing check, see the module docs for the order.
    pub fn decode(&self, token: &str, now: i64) -> Result<TokenClaims, DecodeError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(DecodeError::Malformed)?;
        let claims_b64 = parts.next().ok_or(DecodeError::Malformed)?;
        let sig_b64 = parts.next().ok_or(DecodeError::Malformed)?;
        if parts.next().is_some()
            || header_b64.is_empty()
            || claims_b64.is_empty()
            || sig_b64.is_empty()
        {
            return Err(DecodeError::Malformed);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != TOKEN_ALG || !header.typ.eq_ignore_ascii_case(TOKEN_TYP) {
            return Err(DecodeError::Unsupported);
        }

        // Compare encoded segments so any altered character fails, including
        // ones that would not survive base64 decoding.
        let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
        let expected = self
            .sign(signing_input)
            .map_err(|_| DecodeError::BadSignature)?;
        if expected.as_bytes().ct_eq(sig_b64.as_bytes()).unwrap_u8() != 1 {
            return Err(DecodeError::BadSignature);
        }

        let raw: RawClaims = b64d_json(claims_b64)?;
        let kind = TokenKind::parse(&raw.kind).ok_or(DecodeError::Unsupported)?;
        if raw.exp <= raw.iat {
            return Err(DecodeError::Malformed);
        }
        if raw.exp <= now {
            return Err(DecodeError::Expired);
        }

        Ok(TokenClaims {
            sub: raw.sub,
            roles: raw.roles,
            iat: raw.iat,
            exp: raw.exp,
            jti: raw.jti,
            kind,
        })
    }

    /// Decode and require a specific token kind.
    ///
    /// # Errors
    /// As [`TokenCodec::decode`]; a token of the other kind is `Unsupported`.
    pub fn decode_expecting(
        &self,
        token: &str,
        kind: TokenKind,
        now: i64,
    ) -> Result<TokenClaims, DecodeError> {
        let claims = self.decode(token, now)?;
        if claims.kind == kind {
            Ok(claims)
        } else {
            Err(DecodeError::Unsupported)
        }
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("alg", &TOKEN_ALG)
            .field("lifetimes", &self.lifetimes)
            .finish_non_exhaustive()
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, IssueError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, DecodeError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| DecodeError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| DecodeError::Malformed)
}
