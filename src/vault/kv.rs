use crate::{auth::SigningKey, cli::globals::GlobalArgs, vault, APP_USER_AGENT};
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{info_span, instrument, Instrument};

const SIGNING_KEY_FIELD: &str = "signing_key_b64";

/// Read the token signing key from a KV-v2 secret.
///
/// # Errors
/// Returns an error if the Vault request fails, the field is missing, or the
/// key is not valid base64 of at least 256 bits.
#[instrument(skip(globals))]
pub async fn read_signing_key(
    globals: &GlobalArgs,
    kv_mount: &str,
    kv_path: &str,
) -> Result<SigningKey> {
    let client = Client::builder().user_agent(APP_USER_AGENT).build()?;
    let path = format!("/v1/{kv_mount}/data/{kv_path}");
    let url = vault::endpoint_url(&globals.vault_url, &path)?;

    let span = info_span!(
        "vault.kv.read",
        http.method = "GET",
        url = %url
    );
    let response = client
        .get(&url)
        .header("X-Vault-Token", globals.vault_token.expose_secret())
        .send()
        .instrument(span)
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("vault kv read failed: {status} {body}"));
    }

    let json: Value = response.json().await?;
    signing_key_from_response(&json)
}

fn signing_key_from_response(json: &Value) -> Result<SigningKey> {
    let key_b64 = json
        .get("data")
        .and_then(|data| data.get("data"))
        .and_then(|data| data.get(SIGNING_KEY_FIELD))
        .and_then(Value::as_str)
        .context("signing key missing from vault response")?;

    SigningKey::from_base64(key_b64).context("invalid signing key in vault")
}
