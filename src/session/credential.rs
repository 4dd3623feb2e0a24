use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The impersonation claim carried (encrypted) by the client.
///
/// Serialized as `{"Authenticated": .., "Impersonated": .., "Expires": ..}`
/// with an RFC 3339 timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImpersonationCredential {
    /// User who started the impersonation.
    pub authenticated: String,
    /// User being impersonated.
    pub impersonated: String,
    pub expires: DateTime<Utc>,
}

impl ImpersonationCredential {
    pub fn new(
        authenticated: impl Into<String>,
        impersonated: impl Into<String>,
        expires: DateTime<Utc>,
    ) -> Self {
        Self {
            authenticated: authenticated.into(),
            impersonated: impersonated.into(),
            expires,
        }
    }

    /// Both user names are present.
    pub fn is_complete(&self) -> bool {
        !self.authenticated.trim().is_empty() && !self.impersonated.trim().is_empty()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires
    }

    /// When the credential was issued, given the configured lifetime.
    pub fn issued_at(&self, lifetime: chrono::Duration) -> DateTime<Utc> {
        self.expires - lifetime
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_json_shape() {
        let expires = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
        let credential = ImpersonationCredential::new("Alice", "Bob", expires);

        let json = serde_json::to_value(&credential).unwrap();
        assert_eq!(json["Authenticated"], "Alice");
        assert_eq!(json["Impersonated"], "Bob");
        assert_eq!(json["Expires"], "2030-01-02T03:04:05Z");
    }

    #[test]
    fn test_expiry_is_strict() {
        let expires = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let credential = ImpersonationCredential::new("Alice", "Bob", expires);

        assert!(!credential.is_expired(expires));
        assert!(credential.is_expired(expires + chrono::Duration::seconds(1)));
        assert!(!credential.is_expired(expires - chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_incomplete_credential() {
        let expires = Utc::now();
        assert!(!ImpersonationCredential::new("", "Bob", expires).is_complete());
        assert!(!ImpersonationCredential::new("Alice", " ", expires).is_complete());
        assert!(ImpersonationCredential::new("Alice", "Bob", expires).is_complete());
    }
}
