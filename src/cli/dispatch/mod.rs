//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action to run, currently always the
//! API server with its full authentication configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, vault};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    // A signing key must come from the flag or from Vault
    crate::cli::commands::validate(matches).map_err(|e| anyhow::anyhow!(e))?;

    let vault_opts = vault::Options::parse(matches)?;
    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        signing_key: auth_opts.token.signing_key,
        vault: vault_opts,
        access_ttl_seconds: auth_opts.token.access_ttl_seconds,
        refresh_ttl_seconds: auth_opts.token.refresh_ttl_seconds,
        refresh_fraction: auth_opts.token.refresh_fraction,
        revocation_sweep_seconds: auth_opts.token.revocation_sweep_seconds,
        lockout_threshold: auth_opts.lockout.threshold,
        lockout_cooldown_seconds: auth_opts.lockout.cooldown_seconds,
        cookie_name: auth_opts.cookie.name,
        refresh_cookie_name: auth_opts.cookie.refresh_name,
        cookie_secure: auth_opts.cookie.secure,
        cookie_http_only: auth_opts.cookie.http_only,
        cookie_domain: auth_opts.cookie.domain,
        public_paths: auth_opts.public_paths,
    }))
}
