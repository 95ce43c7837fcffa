use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::qr::QrOptions;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub qr: QrOptions,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Upper bound for a `POST /generate-qr/` body
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
    /// Origins allowed by the CORS layer (any method, any header)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_request_bytes: default_max_request_bytes(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_max_request_bytes() -> usize {
    64 * 1024
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

/// Object storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    /// Azure Blob Storage, built from the connection string secret
    #[default]
    Azure,
    /// Local filesystem under `local_root/<container>`
    Local,
    /// Process memory; uploads vanish on exit
    Memory,
}

/// Storage configuration
///
/// Credentials never live here: the connection string and container name
/// come from the secret provider at startup.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    pub local_root: Option<PathBuf>,
}

/// Where startup secrets come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecretProviderKind {
    #[default]
    KeyVault,
    /// Read secrets from environment variables (local development)
    Environment,
}

/// Secret provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecretsConfig {
    #[serde(default)]
    pub provider: SecretProviderKind,
    /// Vault name (loaded from `AZURE_KEY_VAULT_NAME`, never from config files)
    #[serde(skip)]
    pub key_vault_name: Option<String>,
    /// Full vault URL; overrides the URL derived from the vault name
    pub vault_url: Option<String>,
    #[serde(default = "default_connection_string_secret")]
    pub connection_string_secret: String,
    #[serde(default = "default_container_secret")]
    pub container_secret: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            provider: SecretProviderKind::default(),
            key_vault_name: None,
            vault_url: None,
            connection_string_secret: default_connection_string_secret(),
            container_secret: default_container_secret(),
        }
    }
}

impl SecretsConfig {
    /// Vault URL to query: explicit override, else derived from the vault name
    pub fn resolved_vault_url(&self) -> Option<String> {
        self.vault_url.clone().or_else(|| {
            self.key_vault_name
                .as_ref()
                .map(|name| format!("https://{name}.vault.azure.net"))
        })
    }
}

fn default_connection_string_secret() -> String {
    crate::secrets::CONNECTION_STRING_SECRET.to_string()
}

fn default_container_secret() -> String {
    crate::secrets::CONTAINER_NAME_SECRET.to_string()
}

/// Background upload worker pool
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_count")]
    pub count: usize,
    /// Bounded channel capacity per worker
    #[serde(default = "default_channel_size")]
    pub channel_size: usize,
    /// How long shutdown waits for queued uploads to finish
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            channel_size: default_channel_size(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

fn default_worker_count() -> usize {
    4
}

fn default_channel_size() -> usize {
    256
}

fn default_drain_timeout_secs() -> u64 {
    10
}
