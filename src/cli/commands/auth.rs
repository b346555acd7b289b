use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::auth::config::{parse_public_paths, DEFAULT_PUBLIC_PATHS};

pub const ARG_SIGNING_KEY: &str = "signing-key";
pub const ARG_ACCESS_TOKEN_TTL_SECONDS: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL_SECONDS: &str = "refresh-token-ttl-seconds";
pub const ARG_LOCKOUT_THRESHOLD: &str = "lockout-threshold";
pub const ARG_LOCKOUT_COOLDOWN_SECONDS: &str = "lockout-cooldown-seconds";
pub const ARG_REFRESH_FRACTION: &str = "refresh-fraction";
pub const ARG_COOKIE_NAME: &str = "cookie-name";
pub const ARG_REFRESH_COOKIE_NAME: &str = "refresh-cookie-name";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_COOKIE_HTTP_ONLY: &str = "cookie-http-only";
pub const ARG_COOKIE_DOMAIN: &str = "cookie-domain";
pub const ARG_PUBLIC_PATHS: &str = "public-paths";
pub const ARG_REVOCATION_SWEEP_SECONDS: &str = "revocation-sweep-seconds";

#[derive(Debug)]
pub struct TokenOptions {
    pub signing_key: Option<SecretString>,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub refresh_fraction: f64,
    pub revocation_sweep_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutOptions {
    pub threshold: u32,
    pub cooldown_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub name: String,
    pub refresh_name: String,
    pub secure: bool,
    pub http_only: bool,
    pub domain: Option<String>,
}

#[derive(Debug)]
pub struct Options {
    pub token: TokenOptions,
    pub lockout: LockoutOptions,
    pub cookie: CookieOptions,
    pub public_paths: Vec<String>,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a value with a default is unexpectedly absent.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        fn read<T: Clone + Send + Sync + 'static>(
            matches: &ArgMatches,
            id: &str,
        ) -> anyhow::Result<T> {
            matches
                .get_one::<T>(id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        }
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        Ok(Self {
            token: TokenOptions {
                signing_key: get_non_empty(ARG_SIGNING_KEY).map(SecretString::from),
                access_ttl_seconds: read(matches, ARG_ACCESS_TOKEN_TTL_SECONDS)?,
                refresh_ttl_seconds: read(matches, ARG_REFRESH_TOKEN_TTL_SECONDS)?,
                refresh_fraction: read(matches, ARG_REFRESH_FRACTION)?,
                revocation_sweep_seconds: read(matches, ARG_REVOCATION_SWEEP_SECONDS)?,
            },
            lockout: LockoutOptions {
                threshold: read(matches, ARG_LOCKOUT_THRESHOLD)?,
                cooldown_seconds: read(matches, ARG_LOCKOUT_COOLDOWN_SECONDS)?,
            },
            cookie: CookieOptions {
                name: read(matches, ARG_COOKIE_NAME)?,
                refresh_name: read(matches, ARG_REFRESH_COOKIE_NAME)?,
                secure: read(matches, ARG_COOKIE_SECURE)?,
                http_only: read(matches, ARG_COOKIE_HTTP_ONLY)?,
                domain: get_non_empty(ARG_COOKIE_DOMAIN),
            },
            public_paths: parse_public_paths(&read::<String>(matches, ARG_PUBLIC_PATHS)?),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_lockout_args(command);
    with_cookie_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SIGNING_KEY)
                .long(ARG_SIGNING_KEY)
                .help("Base64 HS512 signing key, at least 32 bytes decoded")
                .long_help(
                    "Base64 HS512 signing key, at least 32 bytes decoded. When absent the key is read from Vault.",
                )
                .env("TESSERA_SIGNING_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .long(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .help("Access token lifetime in seconds")
                .env("TESSERA_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("18000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .long(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .help("Refresh token lifetime in seconds")
                .env("TESSERA_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_FRACTION)
                .long(ARG_REFRESH_FRACTION)
                .help("Reissue access tokens once less than this fraction of their lifetime is left")
                .env("TESSERA_REFRESH_FRACTION")
                .default_value("0.2")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new(ARG_REVOCATION_SWEEP_SECONDS)
                .long(ARG_REVOCATION_SWEEP_SECONDS)
                .help("Interval between sweeps of expired revocation entries")
                .env("TESSERA_REVOCATION_SWEEP_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

fn with_lockout_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LOCKOUT_THRESHOLD)
                .long(ARG_LOCKOUT_THRESHOLD)
                .help("Failed logins before an account is locked")
                .env("TESSERA_LOCKOUT_THRESHOLD")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_COOLDOWN_SECONDS)
                .long(ARG_LOCKOUT_COOLDOWN_SECONDS)
                .help("Seconds an account stays locked")
                .env("TESSERA_LOCKOUT_COOLDOWN_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_cookie_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_COOKIE_NAME)
                .long(ARG_COOKIE_NAME)
                .help("Access token cookie name")
                .env("TESSERA_COOKIE_NAME")
                .default_value("jwt"),
        )
        .arg(
            Arg::new(ARG_REFRESH_COOKIE_NAME)
                .long(ARG_REFRESH_COOKIE_NAME)
                .help("Refresh token cookie name")
                .env("TESSERA_REFRESH_COOKIE_NAME")
                .default_value("refresh_token"),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark cookies Secure (SameSite=None); false uses SameSite=Lax")
                .env("TESSERA_COOKIE_SECURE")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_COOKIE_HTTP_ONLY)
                .long(ARG_COOKIE_HTTP_ONLY)
                .help("Mark cookies HttpOnly")
                .env("TESSERA_COOKIE_HTTP_ONLY")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_COOKIE_DOMAIN)
                .long(ARG_COOKIE_DOMAIN)
                .help("Cookie Domain attribute")
                .env("TESSERA_COOKIE_DOMAIN"),
        )
        .arg(
            Arg::new(ARG_PUBLIC_PATHS)
                .long(ARG_PUBLIC_PATHS)
                .help("Comma-separated paths served without authentication; a trailing / matches a prefix")
                .env("TESSERA_PUBLIC_PATHS")
                .default_value(DEFAULT_PUBLIC_PATHS),
        )
}
