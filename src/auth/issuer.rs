//! Token pairs for successful logins, and access-token reissue for refresh.

use super::{
    codec::{IssueError, IssuedToken, TokenClaims, TokenCodec, TokenKind},
    principal::Principal,
};

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

#[derive(Debug, Clone)]
pub struct TokenIssuer {
    codec: TokenCodec,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Issue an access token carrying the principal's roles and a refresh
    /// token carrying none.
    ///
    /// # Errors
    /// Returns an error if either token cannot be encoded.
    pub fn issue_access_and_refresh(
        &self,
        principal: &Principal,
        now: i64,
    ) -> Result<TokenPair, IssueError> {
        let access = self
            .codec
            .issue(&principal.subject, &principal.roles, TokenKind::Access, now)?;
        let refresh = self
            .codec
            .issue(&principal.subject, &[], TokenKind::Refresh, now)?;
        Ok(TokenPair { access, refresh })
    }

    /// Issue a replacement access token with the same subject and roles as `claims`.
    ///
    /// # Errors
    /// Returns an error if the token cannot be encoded.
    pub fn reissue_access(&self, claims: &TokenClaims, now: i64) -> Result<IssuedToken, IssueError> {
        self.codec
            .issue(&claims.sub, &claims.roles, TokenKind::Access, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{codec::TokenLifetimes, key::SigningKey};
    use anyhow::Result;
    use std::sync::Arc;

    fn issuer() -> Result<TokenIssuer> {
        let key = SigningKey::from_bytes(vec![7u8; 64])?;
        Ok(TokenIssuer::new(TokenCodec::new(
            Arc::new(key),
            TokenLifetimes {
                access_seconds: 300,
                refresh_seconds: 3_600,
            },
        )))
    }

    #[test]
    fn pair_has_roles_only_on_access() -> Result<()> {
        let issuer = issuer()?;
        let principal = Principal::new("alice@example.com", "h").with_roles(["USER", "ADMIN"]);
        let pair = issuer.issue_access_and_refresh(&principal, 1_000)?;

        let access = issuer
            .codec()
            .decode_expecting(&pair.access.token, TokenKind::Access, 1_000)?;
        assert_eq!(access.sub, "alice@example.com");
        assert_eq!(access.roles, vec!["USER".to_string(), "ADMIN".to_string()]);
        assert_eq!(access.exp, 1_300);

        let refresh = issuer
            .codec()
            .decode_expecting(&pair.refresh.token, TokenKind::Refresh, 1_000)?;
        assert!(refresh.roles.is_empty());
        assert_eq!(refresh.exp, 4_600);
        assert_ne!(access.jti, refresh.jti);
        Ok(())
    }

    #[test]
    fn reissue_keeps_identity_and_extends_expiry() -> Result<()> {
        let issuer = issuer()?;
        let principal = Principal::new("alice@example.com", "h").with_roles(["USER"]);
        let original = issuer.issue_access_and_refresh(&principal, 1_000)?.access;

        let refreshed = issuer.reissue_access(&original.claims, 1_250)?;
        let decoded = issuer.codec().decode(&refreshed.token, 1_250)?;
        assert_eq!(decoded.sub, original.claims.sub);
        assert_eq!(decoded.roles, original.claims.roles);
        assert!(decoded.exp > original.claims.exp);
        assert_ne!(decoded.jti, original.claims.jti);
        Ok(())
    }
}
