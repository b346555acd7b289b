use secrecy::SecretString;

/// Vault session shared by startup steps that talk to Vault.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub vault_url: String,
    pub vault_token: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(vurl: String) -> Self {
        Self {
            vault_url: vurl,
            vault_token: SecretString::default(),
        }
    }

    pub fn set_token(&mut self, token: SecretString) {
        self.vault_token = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let mut args = GlobalArgs::new("https://localhost:8200".to_string());
        assert_eq!(args.vault_url, "https://localhost:8200");
        assert_eq!(args.vault_token.expose_secret(), "");

        args.set_token(SecretString::from("s.token".to_string()));
        assert_eq!(args.vault_token.expose_secret(), "s.token");
        assert!(!format!("{args:?}").contains("s.token"));
    }
}
