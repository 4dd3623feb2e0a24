use crate::error::{ImpersonationError, Result};
use crate::session::cipher::{DecryptionError, KeyedCipher};
use crate::session::credential::ImpersonationCredential;
use std::sync::Arc;

/// Purpose string the credential is sealed under.
///
/// No other token in the application may use it.
pub const CREDENTIAL_PURPOSE: &str = "masquerade.impersonation";

/// Serializes and seals impersonation credentials.
///
/// The only component that fails on cryptographic grounds. Callers treat
/// every [`DecryptionError`] as "no credential".
#[derive(Clone)]
pub struct CredentialCodec {
    cipher: Arc<dyn KeyedCipher>,
}

impl CredentialCodec {
    pub fn new(cipher: Arc<dyn KeyedCipher>) -> Self {
        Self { cipher }
    }

    /// Seal a credential into an opaque token.
    ///
    /// Each call produces a different token for the same credential.
    pub fn encrypt(&self, credential: &ImpersonationCredential) -> Result<String> {
        let json = serde_json::to_string(credential).map_err(|e| {
            ImpersonationError::internal(format!("Failed to serialize credential: {}", e))
        })?;
        self.cipher.seal(CREDENTIAL_PURPOSE, &json)
    }

    /// Open a token produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(
        &self,
        token: &str,
    ) -> std::result::Result<ImpersonationCredential, DecryptionError> {
        let json = self.cipher.open(CREDENTIAL_PURPOSE, token)?;
        serde_json::from_str(&json).map_err(|e| DecryptionError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_cipher;
    use chrono::{Duration, Utc};

    fn codec() -> CredentialCodec {
        CredentialCodec::new(Arc::new(test_cipher()))
    }

    fn credential() -> ImpersonationCredential {
        ImpersonationCredential::new("Alice", "Bob", Utc::now() + Duration::minutes(60))
    }

    #[test]
    fn test_roundtrip() {
        let codec = codec();
        let credential = credential();

        let token = codec.encrypt(&credential).unwrap();
        assert!(!token.contains("Alice"));
        assert_eq!(codec.decrypt(&token).unwrap(), credential);
    }

    #[test]
    fn test_ciphertext_not_deterministic() {
        let codec = codec();
        let credential = credential();

        let first = codec.encrypt(&credential).unwrap();
        let second = codec.encrypt(&credential).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_every_flipped_byte_rejected() {
        let codec = codec();
        let token = codec.encrypt(&credential()).unwrap();

        for index in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert!(
                codec.decrypt(&tampered).is_err(),
                "tampered byte {index} was accepted"
            );
        }
    }

    #[test]
    fn test_other_purpose_rejected() {
        let cipher = test_cipher();
        let foreign = cipher
            .seal("session", &serde_json::to_string(&credential()).unwrap())
            .unwrap();

        let codec = CredentialCodec::new(Arc::new(cipher));
        assert_eq!(codec.decrypt(&foreign), Err(DecryptionError::Rejected));
    }

    #[test]
    fn test_malformed_payload() {
        let cipher = test_cipher();
        let token = cipher.seal(CREDENTIAL_PURPOSE, "{\"nope\": 1}").unwrap();

        let codec = CredentialCodec::new(Arc::new(cipher));
        assert!(matches!(
            codec.decrypt(&token),
            Err(DecryptionError::Malformed(_))
        ));
    }
}
