//! # Tessera (bearer token authentication)
//!
//! `tessera` authenticates HTTP requests with signed, short-lived access
//! tokens and issues them in exchange for passwords.
//!
//! ## Tokens
//!
//! Access and refresh tokens are compact HS512 tokens carrying the subject,
//! roles, issue and expiry times, a unique id and the token kind. Refresh
//! tokens never authorize resource access; they are rotated on use.
//!
//! ## Request Gate
//!
//! Every request on a protected path passes through the gate: decode, check
//! revocation, then check the principal (enabled, not locked, credentials
//! fresh). Tokens close to expiry are reissued transparently on the response.
//!
//! ## Lockout
//!
//! Repeated failed logins lock an account for a fixed cooldown. Lock state
//! changes are applied atomically through the principal store, so concurrent
//! failures are never lost.

pub mod api;
pub mod auth;
pub mod cli;
pub mod vault;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
