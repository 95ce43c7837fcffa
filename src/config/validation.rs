use super::models::{Config, SecretProviderKind, StorageProvider};
use crate::qr::QrError;
use axum::http::HeaderValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("AZURE_KEY_VAULT_NAME environment variable not set")]
    MissingKeyVaultName,

    #[error("Invalid Key Vault name '{0}' (3-24 alphanumerics or hyphens, starting with a letter)")]
    InvalidKeyVaultName(String),

    #[error("At least one CORS origin is required")]
    NoCorsOrigins,

    #[error("Invalid CORS origin '{0}'")]
    InvalidCorsOrigin(String),

    #[error("max_request_bytes must be positive")]
    InvalidMaxRequestBytes,

    #[error("QR {0}")]
    InvalidQr(#[from] QrError),

    #[error("Worker {field} must be positive")]
    InvalidWorkerSetting { field: &'static str },

    #[error("Storage provider is local but local_root is not set")]
    MissingLocalRoot,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_secrets(config)?;
    validate_server(config)?;
    validate_qr(config)?;
    validate_workers(config)?;
    validate_storage(config)?;
    Ok(())
}

/// Key Vault needs a vault to talk to, either by name or by explicit URL
fn validate_secrets(config: &Config) -> Result<(), ValidationError> {
    if config.secrets.provider != SecretProviderKind::KeyVault {
        return Ok(());
    }

    match (&config.secrets.key_vault_name, &config.secrets.vault_url) {
        (Some(name), _) if !is_valid_vault_name(name) => {
            Err(ValidationError::InvalidKeyVaultName(name.clone()))
        }
        (None, None) => Err(ValidationError::MissingKeyVaultName),
        _ => Ok(()),
    }
}

fn is_valid_vault_name(name: &str) -> bool {
    (3..=24).contains(&name.len())
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && !name.ends_with('-')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !name.contains("--")
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.max_request_bytes == 0 {
        return Err(ValidationError::InvalidMaxRequestBytes);
    }

    if config.server.cors_origins.is_empty() {
        return Err(ValidationError::NoCorsOrigins);
    }

    for origin in &config.server.cors_origins {
        if origin == "*" || HeaderValue::from_str(origin).is_err() {
            return Err(ValidationError::InvalidCorsOrigin(origin.clone()));
        }
    }

    Ok(())
}

fn validate_qr(config: &Config) -> Result<(), ValidationError> {
    config.qr.validate()?;
    Ok(())
}

fn validate_workers(config: &Config) -> Result<(), ValidationError> {
    if config.workers.count == 0 {
        return Err(ValidationError::InvalidWorkerSetting { field: "count" });
    }

    if config.workers.channel_size == 0 {
        return Err(ValidationError::InvalidWorkerSetting {
            field: "channel_size",
        });
    }

    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.provider == StorageProvider::Local && config.storage.local_root.is_none() {
        return Err(ValidationError::MissingLocalRoot);
    }

    Ok(())
}
