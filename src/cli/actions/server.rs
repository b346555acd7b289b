use crate::{
    api,
    auth::{AuthConfig, CookieSettings, KeyError, SigningKey},
    cli::{commands::vault::Options as VaultOptions, globals::GlobalArgs},
    vault,
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub signing_key: Option<SecretString>,
    pub vault: Option<VaultOptions>,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub refresh_fraction: f64,
    pub revocation_sweep_seconds: u64,
    pub lockout_threshold: u32,
    pub lockout_cooldown_seconds: i64,
    pub cookie_name: String,
    pub refresh_cookie_name: String,
    pub cookie_secure: bool,
    pub cookie_http_only: bool,
    pub cookie_domain: Option<String>,
    pub public_paths: Vec<String>,
}

impl Args {
    /// Assemble and validate the authentication settings.
    ///
    /// # Errors
    /// Returns an error if any setting is out of range.
    pub fn auth_config(&self) -> Result<AuthConfig> {
        let cookies = CookieSettings::default()
            .with_name(self.cookie_name.clone())
            .with_refresh_name(self.refresh_cookie_name.clone())
            .with_secure(self.cookie_secure)
            .with_http_only(self.cookie_http_only)
            .with_domain(self.cookie_domain.clone());

        let config = AuthConfig::default()
            .with_access_token_ttl_seconds(self.access_ttl_seconds)
            .with_refresh_token_ttl_seconds(self.refresh_ttl_seconds)
            .with_refresh_fraction(self.refresh_fraction)
            .with_revocation_sweep_seconds(self.revocation_sweep_seconds)
            .with_lockout_threshold(self.lockout_threshold)
            .with_lockout_cooldown_seconds(self.lockout_cooldown_seconds)
            .with_cookies(cookies)
            .with_public_paths(self.public_paths.clone());

        config.validate().context("Invalid authentication settings")?;
        Ok(config)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid, the signing key cannot be
/// resolved, the database is unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = args.auth_config()?;
    let key = resolve_signing_key(&args).await?;

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    debug!("Auth config: {:?}", auth_config);

    let state = api::AppState::new(
        key,
        auth_config,
        Arc::new(crate::auth::PgPrincipalStore::new(pool)),
        Arc::new(crate::auth::InMemoryRevocationStore::new()),
        Arc::new(crate::auth::SystemClock),
    );

    api::serve(args.port, Arc::new(state)).await
}

async fn resolve_signing_key(args: &Args) -> Result<SigningKey> {
    if let Some(encoded) = &args.signing_key {
        info!("Using signing key from configuration");
        return SigningKey::from_base64(encoded.expose_secret())
            .context("Invalid --signing-key");
    }

    let Some(opts) = &args.vault else {
        return Err(KeyError::Missing).context("No signing key configured");
    };

    let mut globals = GlobalArgs::new(opts.url.clone());
    let (token, _) = vault::approle_login(&globals.vault_url, &opts.secret_id, &opts.role_id)
        .await
        .context("Vault AppRole login failed")?;
    globals.set_token(token);

    let key = vault::kv::read_signing_key(&globals, &opts.kv_mount, &opts.kv_path)
        .await
        .context("Failed to load signing key from Vault")?;
    info!("Using signing key from Vault");
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            port: 8080,
            dsn: "postgres://localhost/tessera".to_string(),
            signing_key: None,
            vault: None,
            access_ttl_seconds: 18_000,
            refresh_ttl_seconds: 604_800,
            refresh_fraction: 0.2,
            revocation_sweep_seconds: 60,
            lockout_threshold: 5,
            lockout_cooldown_seconds: 1800,
            cookie_name: "jwt".to_string(),
            refresh_cookie_name: "refresh_token".to_string(),
            cookie_secure: false,
            cookie_http_only: true,
            cookie_domain: Some("tessera.dev".to_string()),
            public_paths: vec!["/health".to_string()],
        }
    }

    #[test]
    fn builds_auth_config() -> Result<()> {
        let config = args().auth_config()?;
        assert_eq!(config.token_lifetimes().access_seconds, 18_000);
        assert_eq!(config.lockout_policy().threshold(), 5);
        assert_eq!(config.cookies().same_site(), "Lax");
        assert_eq!(config.cookies().domain(), Some("tessera.dev"));
        assert!(config.is_public("/health"));
        Ok(())
    }

    #[test]
    fn rejects_refresh_shorter_than_access() {
        let mut args = args();
        args.refresh_ttl_seconds = args.access_ttl_seconds;
        assert!(args.auth_config().is_err());
    }

    #[tokio::test]
    async fn missing_key_source_aborts() {
        let result = resolve_signing_key(&args()).await;
        let message = result.err().map(|e| format!("{e:#}"));
        assert!(message.is_some_and(|m| m.contains("No signing key configured")));
    }

    #[tokio::test]
    async fn short_signing_key_aborts() {
        let mut args = args();
        args.signing_key = Some(SecretString::from("c2hvcnQ=".to_string()));
        let message = resolve_signing_key(&args).await.err().map(|e| format!("{e:#}"));
        assert!(message.is_some_and(|m| m.contains("256 bits")));
    }
}
