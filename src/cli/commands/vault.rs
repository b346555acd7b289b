use clap::{Arg, ArgMatches, Command};

pub const ARG_VAULT_URL: &str = "vault-url";
pub const ARG_VAULT_ROLE_ID: &str = "vault-role-id";
pub const ARG_VAULT_SECRET_ID: &str = "vault-secret-id";
pub const ARG_VAULT_KV_MOUNT: &str = "vault-kv-mount";
pub const ARG_VAULT_KV_PATH: &str = "vault-kv-path";

/// Vault settings, present only when `--vault-url` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub url: String,
    pub role_id: String,
    pub secret_id: String,
    pub kv_mount: String,
    pub kv_path: String,
}

impl Options {
    /// Parse Vault arguments from matches.
    ///
    /// # Errors
    /// Returns an error if `--vault-url` is set without role and secret ids.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Option<Self>> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let Some(url) = get_non_empty(ARG_VAULT_URL) else {
            return Ok(None);
        };
        let role_id = get_non_empty(ARG_VAULT_ROLE_ID)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_VAULT_ROLE_ID}"))?;
        let secret_id = get_non_empty(ARG_VAULT_SECRET_ID).ok_or_else(|| {
            anyhow::anyhow!("missing required argument: --{ARG_VAULT_SECRET_ID}")
        })?;

        Ok(Some(Self {
            url,
            role_id,
            secret_id,
            kv_mount: get_non_empty(ARG_VAULT_KV_MOUNT).unwrap_or_else(|| "secret".to_string()),
            kv_path: get_non_empty(ARG_VAULT_KV_PATH).unwrap_or_else(|| "tessera".to_string()),
        }))
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VAULT_URL)
                .long(ARG_VAULT_URL)
                .help("Vault AppRole login URL, used to fetch the signing key when --signing-key is not set")
                .env("TESSERA_VAULT_URL"),
        )
        .arg(
            Arg::new(ARG_VAULT_ROLE_ID)
                .long(ARG_VAULT_ROLE_ID)
                .help("Vault role id")
                .env("TESSERA_VAULT_ROLE_ID")
                .requires(ARG_VAULT_URL),
        )
        .arg(
            Arg::new(ARG_VAULT_SECRET_ID)
                .long(ARG_VAULT_SECRET_ID)
                .help("Vault secret id")
                .env("TESSERA_VAULT_SECRET_ID")
                .requires(ARG_VAULT_URL),
        )
        .arg(
            Arg::new(ARG_VAULT_KV_MOUNT)
                .long(ARG_VAULT_KV_MOUNT)
                .help("Vault KV-v2 mount holding the signing key")
                .env("TESSERA_VAULT_KV_MOUNT")
                .default_value("secret"),
        )
        .arg(
            Arg::new(ARG_VAULT_KV_PATH)
                .long(ARG_VAULT_KV_PATH)
                .help("Vault KV-v2 secret path holding the signing key (field signing_key_b64)")
                .env("TESSERA_VAULT_KV_PATH")
                .default_value("tessera"),
        )
}
