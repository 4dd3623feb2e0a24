//! Purpose-bound authenticated encryption.
//!
//! [`PrivateCookieCipher`] uses the `cookie` crate's private cookies. The
//! payload is encrypted with an AEAD and the cookie name is bound in as
//! associated data; the cipher passes the purpose string as that name, so a
//! token sealed for one purpose never opens under another.

use crate::error::{ImpersonationError, Result};
use crate::session::ImpersonationConfig;
use cookie::{Cookie, CookieJar, Key};
use std::sync::Arc;

/// Why a token could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecryptionError {
    #[error("token is empty")]
    Empty,

    /// Wrong key, wrong purpose, truncated, or tampered.
    #[error("token failed integrity verification")]
    Rejected,

    #[error("credential payload is malformed: {0}")]
    Malformed(String),
}

/// Authenticated encryption bound to a purpose string.
///
/// Implementations must be safe to share between request tasks; key
/// rotation is the implementation's concern.
pub trait KeyedCipher: Send + Sync {
    fn seal(&self, purpose: &str, plaintext: &str) -> Result<String>;

    fn open(&self, purpose: &str, token: &str) -> std::result::Result<String, DecryptionError>;
}

/// [`KeyedCipher`] backed by `cookie` private jars.
#[derive(Clone)]
pub struct PrivateCookieCipher {
    key: Arc<Key>,
}

impl PrivateCookieCipher {
    /// Wrap an existing key.
    pub fn new(key: Key) -> Self {
        Self { key: Arc::new(key) }
    }

    /// Build from a 128-character hex string (64 bytes).
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not valid hex or not exactly 64 bytes.
    pub fn from_hex(key_str: &str) -> Result<Self> {
        let key_bytes = hex::decode(key_str).map_err(|e| {
            ImpersonationError::internal(format!("Invalid encryption key format: {}", e))
        })?;

        if key_bytes.len() != 64 {
            return Err(ImpersonationError::internal(
                "Encryption key must be 64 bytes (128 hex characters). Generate with: openssl rand -hex 64",
            ));
        }

        Ok(Self::new(Key::from(&key_bytes)))
    }

    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No `encryption_key` is configured and `allow_insecure_key` is `false`
    /// - The `encryption_key` is not valid hex or not exactly 64 bytes
    pub fn from_config(config: &ImpersonationConfig) -> Result<Self> {
        if let Some(ref key_str) = config.encryption_key {
            return Self::from_hex(key_str);
        }

        if config.allow_insecure_key {
            tracing::error!(
                "SECURITY WARNING: using a randomly generated impersonation key. \
                Impersonation sessions will not survive a restart and will not work across instances. \
                Set IMPERSONATION_ENCRYPTION_KEY (generate with: openssl rand -hex 64)."
            );
            return Ok(Self::new(Key::generate()));
        }

        Err(ImpersonationError::internal(
            "Impersonation requires an encryption key. \
            Set IMPERSONATION_ENCRYPTION_KEY or config.impersonation.encryption_key. \
            Generate a key with: openssl rand -hex 64. \
            For development only, set IMPERSONATION_ALLOW_INSECURE_KEY=true.",
        ))
    }
}

impl KeyedCipher for PrivateCookieCipher {
    fn seal(&self, purpose: &str, plaintext: &str) -> Result<String> {
        let mut jar = CookieJar::new();
        jar.private_mut(&self.key)
            .add(Cookie::new(purpose.to_string(), plaintext.to_string()));

        let sealed = jar
            .get(purpose)
            .ok_or_else(|| ImpersonationError::internal("Failed to encrypt impersonation token"))?;

        Ok(sealed.value().to_string())
    }

    fn open(&self, purpose: &str, token: &str) -> std::result::Result<String, DecryptionError> {
        if token.trim().is_empty() {
            return Err(DecryptionError::Empty);
        }

        let mut jar = CookieJar::new();
        jar.add_original(Cookie::new(purpose.to_string(), token.to_string()));

        jar.private(&self.key)
            .get(purpose)
            .map(|cookie| cookie.value().to_string())
            .ok_or(DecryptionError::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TEST_KEY_HEX, test_cipher};

    #[test]
    fn test_seal_open_roundtrip() {
        let cipher = test_cipher();
        let token = cipher.seal("purpose-a", "payload").unwrap();

        assert!(!token.contains("payload"));
        assert_eq!(cipher.open("purpose-a", &token).unwrap(), "payload");
    }

    #[test]
    fn test_purpose_is_bound() {
        let cipher = test_cipher();
        let token = cipher.seal("purpose-a", "payload").unwrap();

        assert_eq!(
            cipher.open("purpose-b", &token),
            Err(DecryptionError::Rejected)
        );
    }

    #[test]
    fn test_different_key_cannot_open() {
        let cipher1 = test_cipher();
        let cipher2 = PrivateCookieCipher::from_hex(
            "fedcba9876543210fedcba9876543210fedcba9876543210fedcba9876543210fedcba9876543210fedcba9876543210fedcba9876543210fedcba9876543210",
        )
        .unwrap();

        let token = cipher1.seal("p", "secret").unwrap();
        assert_eq!(cipher2.open("p", &token), Err(DecryptionError::Rejected));
    }

    #[test]
    fn test_garbage_and_empty_rejected() {
        let cipher = test_cipher();
        assert_eq!(
            cipher.open("p", "not_a_valid_token"),
            Err(DecryptionError::Rejected)
        );
        assert_eq!(cipher.open("p", ""), Err(DecryptionError::Empty));
    }

    #[test]
    fn test_invalid_key_length_rejected() {
        assert!(PrivateCookieCipher::from_hex("too_short").is_err());
        assert!(PrivateCookieCipher::from_hex(&TEST_KEY_HEX[..64]).is_err());
    }

    #[test]
    fn test_config_without_key_rejected() {
        let config = ImpersonationConfig::default();
        assert!(PrivateCookieCipher::from_config(&config).is_err());
    }

    #[test]
    fn test_config_insecure_key_allowed() {
        let config = ImpersonationConfig::default().allow_insecure_key(true);
        let cipher = PrivateCookieCipher::from_config(&config).unwrap();
        let token = cipher.seal("p", "x").unwrap();
        assert_eq!(cipher.open("p", &token).unwrap(), "x");
    }
}
