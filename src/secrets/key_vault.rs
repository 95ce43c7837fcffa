use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::credential::{AccessToken, TokenCredential};
use super::{Result, SecretError, SecretProvider};

const API_VERSION: &str = "7.4";

/// Upper bound for one secret GET, connect included
pub const SECRET_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: Option<String>,
}

/// Azure Key Vault secrets over the REST API
#[derive(bon::Builder)]
pub struct KeyVaultSecretProvider {
    /// e.g. `https://my-vault.vault.azure.net`
    #[builder(into)]
    vault_url: String,
    credential: Arc<dyn TokenCredential>,
    #[builder(default)]
    http: reqwest::Client,
    #[builder(default = SECRET_REQUEST_TIMEOUT)]
    request_timeout: Duration,
    #[builder(skip)]
    token: Mutex<Option<AccessToken>>,
}

impl KeyVaultSecretProvider {
    async fn bearer_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if !token.is_expired(Utc::now()) {
                return Ok(token.token.clone());
            }
        }

        let token = self.credential.get_token().await?;
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }

    fn secret_url(&self, name: &str) -> String {
        format!(
            "{}/secrets/{}?api-version={}",
            self.vault_url.trim_end_matches('/'),
            name,
            API_VERSION
        )
    }
}

#[async_trait]
impl SecretProvider for KeyVaultSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<String> {
        let token = self.bearer_token().await?;

        let response = self
            .http
            .get(self.secret_url(name))
            .bearer_auth(token)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SecretError::NotFound(name.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SecretError::Request {
                name: name.to_string(),
                status: status.as_u16(),
                message: message.trim().to_string(),
            });
        }

        let bundle: SecretBundle = response.json().await?;
        tracing::debug!(secret = name, "Fetched secret from Key Vault");

        bundle
            .value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| SecretError::Empty(name.to_string()))
    }

    fn name(&self) -> &'static str {
        "key_vault"
    }
}
