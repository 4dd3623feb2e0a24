use crate::error::{ImpersonationError, Result};
use crate::utils::{get_env_parsed, get_env_with_prefix};
use serde::{Deserialize, Serialize};

/// Longest accepted credential lifetime (30 days).
pub const MAX_COOKIE_DURATION_MINUTES: u64 = 30 * 24 * 60;

/// Impersonation session configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImpersonationConfig {
    /// Lifetime of an impersonation credential (in minutes).
    ///
    /// Credentials are renewed once more than half of this has elapsed.
    #[serde(default = "default_cookie_duration_minutes")]
    pub cookie_duration_minutes: u64,

    /// Cookie name
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Cookie path
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,

    /// Cookie secure flag (HTTPS only)
    #[serde(default = "default_secure")]
    pub cookie_secure: bool,

    /// Cookie http_only flag
    #[serde(default = "default_http_only")]
    pub cookie_http_only: bool,

    /// Encryption key for the credential cookie (64 bytes hex-encoded)
    ///
    /// **REQUIRED** in production.
    /// Generate a secure key with: `openssl rand -hex 64`
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Allow a random per-process key (FOR DEVELOPMENT ONLY)
    ///
    /// Credentials issued under a random key stop decrypting after a restart
    /// and are not shared between instances.
    #[serde(default)]
    pub allow_insecure_key: bool,

    /// Allow starting impersonation while already impersonating.
    #[serde(default)]
    pub allow_nested_impersonation: bool,
}

impl Default for ImpersonationConfig {
    fn default() -> Self {
        Self {
            cookie_duration_minutes: default_cookie_duration_minutes(),
            cookie_name: default_cookie_name(),
            cookie_path: default_cookie_path(),
            cookie_secure: default_secure(),
            cookie_http_only: default_http_only(),
            encryption_key: None,
            allow_insecure_key: false,
            allow_nested_impersonation: false,
        }
    }
}

impl ImpersonationConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load impersonation configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(minutes) = get_env_parsed("IMPERSONATION_COOKIE_DURATION_MINUTES") {
            config.cookie_duration_minutes = minutes;
        }

        if let Some(name) = get_env_with_prefix("IMPERSONATION_COOKIE_NAME") {
            config.cookie_name = name;
        }

        if let Some(path) = get_env_with_prefix("IMPERSONATION_COOKIE_PATH") {
            config.cookie_path = path;
        }

        if let Some(secure) = get_env_parsed("IMPERSONATION_COOKIE_SECURE") {
            config.cookie_secure = secure;
        }

        if let Some(http_only) = get_env_parsed("IMPERSONATION_COOKIE_HTTP_ONLY") {
            config.cookie_http_only = http_only;
        }

        if let Some(key) = get_env_with_prefix("IMPERSONATION_ENCRYPTION_KEY") {
            config.encryption_key = Some(key);
        }

        if let Some(allow) = get_env_parsed("IMPERSONATION_ALLOW_INSECURE_KEY") {
            config.allow_insecure_key = allow;
        }

        if let Some(allow) = get_env_parsed("IMPERSONATION_ALLOW_NESTED") {
            config.allow_nested_impersonation = allow;
        }

        config
    }

    /// Credential lifetime as a chrono duration.
    ///
    /// Clamped to `1..=MAX_COOKIE_DURATION_MINUTES`; [`validate`](Self::validate)
    /// rejects values outside that range.
    pub fn cookie_duration(&self) -> chrono::Duration {
        let minutes = self
            .cookie_duration_minutes
            .clamp(1, MAX_COOKIE_DURATION_MINUTES);
        chrono::Duration::minutes(minutes as i64)
    }

    /// Check the values a session manager relies on.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential lifetime is zero or longer than
    /// [`MAX_COOKIE_DURATION_MINUTES`], or the cookie name is empty.
    pub fn validate(&self) -> Result<()> {
        if self.cookie_duration_minutes == 0
            || self.cookie_duration_minutes > MAX_COOKIE_DURATION_MINUTES
        {
            return Err(ImpersonationError::bad_request(format!(
                "Impersonation cookie duration must be between 1 and {} minutes, got {}",
                MAX_COOKIE_DURATION_MINUTES, self.cookie_duration_minutes
            )));
        }

        if self.cookie_name.trim().is_empty() {
            return Err(ImpersonationError::bad_request(
                "Impersonation cookie name must not be empty",
            ));
        }

        Ok(())
    }

    /// Set the credential lifetime in minutes.
    #[must_use]
    pub fn cookie_duration_minutes(mut self, minutes: u64) -> Self {
        self.cookie_duration_minutes = minutes;
        self
    }

    /// Set the cookie name.
    #[must_use]
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set the secure flag.
    #[must_use]
    pub fn cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    /// Set the hex-encoded encryption key.
    #[must_use]
    pub fn encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    /// Set whether a random development key is acceptable.
    #[must_use]
    pub fn allow_insecure_key(mut self, allow: bool) -> Self {
        self.allow_insecure_key = allow;
        self
    }

    /// Set whether nested impersonation is allowed.
    #[must_use]
    pub fn allow_nested_impersonation(mut self, allow: bool) -> Self {
        self.allow_nested_impersonation = allow;
        self
    }
}

fn default_cookie_duration_minutes() -> u64 {
    60
}

fn default_cookie_name() -> String {
    "Impersonation".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_secure() -> bool {
    true
}

fn default_http_only() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ImpersonationConfig::new();
        assert_eq!(config.cookie_duration_minutes, 60);
        assert_eq!(config.cookie_name, "Impersonation");
        assert_eq!(config.cookie_path, "/");
        assert!(config.cookie_secure);
        assert!(config.cookie_http_only);
        assert!(config.encryption_key.is_none());
        assert!(!config.allow_insecure_key);
        assert!(!config.allow_nested_impersonation);
    }

    #[test]
    fn test_builder_setters() {
        let config = ImpersonationConfig::new()
            .cookie_duration_minutes(3)
            .cookie_name("Imp")
            .cookie_secure(false)
            .allow_nested_impersonation(true);

        assert_eq!(config.cookie_duration(), chrono::Duration::minutes(3));
        assert_eq!(config.cookie_name, "Imp");
        assert!(!config.cookie_secure);
        assert!(config.allow_nested_impersonation);
    }

    #[test]
    fn test_oversized_duration_rejected_and_clamped() {
        let config = ImpersonationConfig::new().cookie_duration_minutes(u64::MAX);

        assert!(config.validate().is_err());
        assert_eq!(
            config.cookie_duration(),
            chrono::Duration::minutes(MAX_COOKIE_DURATION_MINUTES as i64)
        );
        assert!(config.cookie_duration() > chrono::Duration::zero());
    }

    #[test]
    fn test_validate_bounds() {
        assert!(ImpersonationConfig::new().validate().is_ok());
        assert!(
            ImpersonationConfig::new()
                .cookie_duration_minutes(MAX_COOKIE_DURATION_MINUTES)
                .validate()
                .is_ok()
        );
        assert!(
            ImpersonationConfig::new()
                .cookie_duration_minutes(MAX_COOKIE_DURATION_MINUTES + 1)
                .validate()
                .is_err()
        );
        assert!(
            ImpersonationConfig::new()
                .cookie_duration_minutes(0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: ImpersonationConfig =
            serde_json::from_str(r#"{"cookie_duration_minutes": 15}"#).unwrap();
        assert_eq!(config.cookie_duration_minutes, 15);
        assert_eq!(config.cookie_name, "Impersonation");
        assert!(config.cookie_http_only);
    }

    #[test]
    fn test_from_env() {
        unsafe {
            std::env::set_var("MASQUERADE_IMPERSONATION_COOKIE_DURATION_MINUTES", "5");
            std::env::set_var("MASQUERADE_IMPERSONATION_ALLOW_NESTED", "true");
        }

        let config = ImpersonationConfig::from_env();
        assert_eq!(config.cookie_duration_minutes, 5);
        assert!(config.allow_nested_impersonation);

        unsafe {
            std::env::remove_var("MASQUERADE_IMPERSONATION_COOKIE_DURATION_MINUTES");
            std::env::remove_var("MASQUERADE_IMPERSONATION_ALLOW_NESTED");
        }
    }
}
