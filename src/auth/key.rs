//! Symmetric signing key for HS512 tokens.
//!
//! A missing, undecodable, or short key is a configuration error: the server
//! refuses to start instead of issuing weak tokens.

use base64ct::{Base64, Encoding};
use secrecy::{ExposeSecret, SecretSlice};
use thiserror::Error;

/// Minimum decoded key length (256 bits).
pub const MIN_KEY_BYTES: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("signing key is not configured")]
    Missing,
    #[error("signing key is not valid base64")]
    InvalidBase64,
    #[error("signing key must be at least 256 bits, got {bits} bits")]
    TooShort { bits: usize },
}

pub struct SigningKey {
    bytes: SecretSlice<u8>,
}

impl SigningKey {
    /// Decode a standard (padded) base64 key.
    ///
    /// # Errors
    /// Returns `KeyError` if the value is empty, not base64, or decodes to
    /// fewer than 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let trimmed = encoded.trim();
        if trimmed.is_empty() {
            return Err(KeyError::Missing);
        }
        let decoded = Base64::decode_vec(trimmed).map_err(|_| KeyError::InvalidBase64)?;
        Self::from_bytes(decoded)
    }

    /// # Errors
    /// Returns `KeyError::TooShort` for keys under 32 bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, KeyError> {
        if bytes.is_empty() {
            return Err(KeyError::Missing);
        }
        if bytes.len() < MIN_KEY_BYTES {
            return Err(KeyError::TooShort {
                bits: bytes.len() * 8,
            });
        }
        Ok(Self {
            bytes: SecretSlice::from(bytes),
        })
    }

    pub(crate) fn expose(&self) -> &[u8] {
        self.bytes.expose_secret()
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("bits", &(self.expose().len() * 8))
            .field("bytes", &"***")
            .finish()
    }
}
