use serde::{Deserialize, Serialize};

use crate::error::{ImpersonationError, Result};
use crate::session::ImpersonationConfig;
use crate::utils::{get_env_parsed, get_env_with_prefix};

/// Top-level configuration for the impersonation service
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub impersonation: ImpersonationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Shorthand for `ConfigBuilder::new().from_env().build()`.
    pub fn from_env() -> Result<Self> {
        ConfigBuilder::new().from_env().build()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_impersonation(mut self, impersonation: ImpersonationConfig) -> Self {
        self.config.impersonation = impersonation;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    /// Load configuration from environment variables with MASQUERADE_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_parsed("LOG_JSON") {
            self.config.logging.json = json;
        }

        self.config.impersonation = ImpersonationConfig::from_env();

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns an error if the log level is unknown or
    /// [`ImpersonationConfig::validate`] fails.
    pub fn build(self) -> Result<Config> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(ImpersonationError::bad_request(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        self.config.impersonation.validate()?;

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
