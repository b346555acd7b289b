//! Minimal Vault client: `AppRole` login and KV-v2 reads.

pub mod kv;

use crate::APP_USER_AGENT;
use anyhow::{anyhow, Result};
use reqwest::Client;
use secrecy::SecretString;
use serde_json::{json, Value};
use tracing::{debug, info_span, instrument, Instrument};
use url::Url;

/// Build `scheme://host:port<endpoint>` from the configured Vault URL.
///
/// # Errors
/// Returns an error if the URL has no host or an unsupported scheme.
#[instrument]
pub fn endpoint_url(vault_url: &str, endpoint: &str) -> Result<String> {
    let url = Url::parse(vault_url)?;

    let scheme = url.scheme();

    let host = url
        .host()
        .ok_or_else(|| anyhow!("Error parsing URL: no host specified"))?
        .to_owned();

    let port = match url.port() {
        Some(p) => p,
        None => match scheme {
            "http" => 80,
            "https" => 443,
            _ => return Err(anyhow!("Error parsing URL: unsupported scheme {}", scheme)),
        },
    };

    let endpoint_url = format!("{scheme}://{host}:{port}{endpoint}");

    debug!("endpoint URL: {}", endpoint_url);

    Ok(endpoint_url)
}

/// Login to Vault using `AppRole`; `vault_url` is the full login URL.
/// Create a secret ID with:
/// vault write -f auth/approle/role/tessera/secret-id
///
/// # Errors
/// Returns an error if the request fails or Vault does not return a token.
#[instrument(skip(secret_id))]
pub async fn approle_login(
    vault_url: &str,
    secret_id: &str,
    role_id: &str,
) -> Result<(SecretString, u64)> {
    let client = Client::builder().user_agent(APP_USER_AGENT).build()?;

    let login_payload = json!({
        "role_id": role_id,
        "secret_id": secret_id
    });

    let span = info_span!("vault.approle.login", http.method = "POST", url = %vault_url);
    let response = client
        .post(vault_url)
        .json(&login_payload)
        .send()
        .instrument(span)
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let json_response: Value = response.json().await.unwrap_or_default();

        return Err(anyhow!(
            "{} - {}, {}",
            vault_url,
            status,
            json_response["errors"][0].as_str().unwrap_or("")
        ));
    }

    let json_response: Value = response.json().await?;
    let token = json_response["auth"]["client_token"]
        .as_str()
        .ok_or_else(|| anyhow!("Error parsing JSON response: no client_token found"))?;
    let lease_duration = json_response["auth"]["lease_duration"]
        .as_u64()
        .unwrap_or(1800);

    Ok((SecretString::from(token.to_string()), lease_duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_uses_default_ports() -> Result<()> {
        assert_eq!(
            endpoint_url("https://vault.tld/v1/auth/approle/login", "/v1/secret/data/x")?,
            "https://vault.tld:443/v1/secret/data/x"
        );
        assert_eq!(
            endpoint_url("http://127.0.0.1:8200/v1/auth/approle/login", "/v1/kv")?,
            "http://127.0.0.1:8200/v1/kv"
        );
        Ok(())
    }

    #[test]
    fn endpoint_url_rejects_unknown_scheme() {
        assert!(endpoint_url("ftp://vault.tld/", "/v1/kv").is_err());
        assert!(endpoint_url("not a url", "/v1/kv").is_err());
    }
}
