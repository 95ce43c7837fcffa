//! Startup secrets
//!
//! The storage connection string and container name are resolved once, before
//! the server binds, from either Azure Key Vault or the process environment.

pub mod credential;
mod env;
mod key_vault;

pub use credential::{AccessToken, ClientSecretCredential, DefaultCredential, ManagedIdentityCredential, TokenCredential};
pub use env::EnvironmentSecretProvider;
pub use key_vault::{KeyVaultSecretProvider, SECRET_REQUEST_TIMEOUT};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{SecretProviderKind, SecretsConfig};

pub const CONNECTION_STRING_SECRET: &str = "AZURE-STORAGE-CONNECTION-STRING";
pub const CONTAINER_NAME_SECRET: &str = "AZURE-CONTAINER-NAME";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret '{0}' not found")]
    NotFound(String),

    #[error("secret '{0}' has no value")]
    Empty(String),

    #[error("secret request for '{name}' failed with HTTP {status}: {message}")]
    Request {
        name: String,
        status: u16,
        message: String,
    },

    #[error("credential unavailable: {0}")]
    Credential(String),

    #[error("no Key Vault configured (set AZURE_KEY_VAULT_NAME)")]
    MissingVault,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves named secrets
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String>;

    /// Short label for logs
    fn name(&self) -> &'static str;
}

/// Secrets needed to reach object storage
#[derive(Clone)]
pub struct StorageSecrets {
    pub connection_string: String,
    pub container: String,
}

impl fmt::Debug for StorageSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSecrets")
            .field("connection_string", &"<redacted>")
            .field("container", &self.container)
            .finish()
    }
}

/// Fetch both storage secrets; either one missing is a startup failure
pub async fn load_storage_secrets(
    provider: &dyn SecretProvider,
    config: &SecretsConfig,
) -> Result<StorageSecrets> {
    tracing::info!(provider = provider.name(), "Loading storage secrets");

    let connection_string = provider.get_secret(&config.connection_string_secret).await?;
    let container = provider.get_secret(&config.container_secret).await?;

    tracing::info!(container = %container, "Storage secrets loaded");

    Ok(StorageSecrets {
        connection_string,
        container,
    })
}

/// Build the provider selected in configuration
pub fn provider_from_config(config: &SecretsConfig) -> Result<Arc<dyn SecretProvider>> {
    match config.provider {
        SecretProviderKind::KeyVault => {
            let vault_url = config.resolved_vault_url().ok_or(SecretError::MissingVault)?;
            let http = reqwest::Client::builder()
                .timeout(SECRET_REQUEST_TIMEOUT)
                .build()?;
            let credential = DefaultCredential::from_env(http.clone());
            tracing::info!(vault_url = %vault_url, credential = credential.kind(), "Using Azure Key Vault");

            Ok(Arc::new(
                KeyVaultSecretProvider::builder()
                    .vault_url(vault_url)
                    .credential(Arc::new(credential))
                    .http(http)
                    .build(),
            ))
        }
        SecretProviderKind::Environment => Ok(Arc::new(EnvironmentSecretProvider::from_env())),
    }
}
