use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::Config;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Config {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/console-state/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("console-state").join("config.toml")
    }

    /// Loads configuration from the default config file.
    ///
    /// - If the file doesn't exist, returns `Config::default()`.
    /// - Otherwise behaves like [`Config::load_from`].
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Config::default());
        }

        Self::load_from(&path)
    }

    /// Loads, parses and validates the configuration at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - The base URL is an http(s) URL
    /// - Both timeouts are non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.server.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "server.base_url must not be empty".to_string(),
            });
        }

        let parsed = reqwest::Url::parse(base_url).map_err(|e| ConfigError::ValidationError {
            message: format!("server.base_url '{}' is not a valid URL: {}", base_url, e),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "server.base_url '{}' must use http or https",
                    base_url
                ),
            });
        }

        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "server.timeout_seconds must be greater than zero".to_string(),
            });
        }

        if self.server.connect_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "server.connect_timeout_seconds must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn config_path_ends_with_crate_dir() {
        let path = Config::config_path();
        assert!(path.ends_with("console-state/config.toml"));
    }

    #[test]
    fn non_http_scheme_rejected() {
        let mut config = Config::default();
        config.server.base_url = "ftp://example.com".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { .. })
        ));
    }
}
