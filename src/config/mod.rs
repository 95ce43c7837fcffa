//! Configuration management for qrstash
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use qrstash::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `QRSTASH__<section>__<key>`
//!
//! Examples:
//! - `QRSTASH__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `QRSTASH__STORAGE__PROVIDER=memory`
//! - `QRSTASH__WORKERS__COUNT=8`
//!
//! `AZURE_KEY_VAULT_NAME` is read from the environment only and is required
//! while the Key Vault secret provider is selected.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/qrstash.toml`.
//! This can be overridden using the `QRSTASH_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{
    Config, SecretProviderKind, SecretsConfig, ServerConfig, StorageConfig, StorageProvider,
    WorkerConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or
    /// validation fails (for example `AZURE_KEY_VAULT_NAME` is missing).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path, without environment-only values
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_vault_name_fails_startup() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("absent.toml");

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::MissingKeyVaultName)
        ));
    }

    #[test]
    fn test_load_development_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("dev.toml");

        let toml_content = r#"
[storage]
provider = "memory"

[secrets]
provider = "environment"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.storage.provider, StorageProvider::Memory);
        assert_eq!(config.secrets.provider, SecretProviderKind::Environment);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.toml");

        let toml_content = r#"
[secrets]
provider = "environment"

[workers]
count = 0
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::InvalidWorkerSetting { .. })
        ));
    }
}
