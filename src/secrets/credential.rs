//! Azure AD token acquisition for Key Vault
//!
//! [`DefaultCredential`] picks a client-secret credential when
//! `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET` are set and
//! falls back to managed identity otherwise.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use super::{Result, SecretError};

pub const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";
pub const KEY_VAULT_RESOURCE: &str = "https://vault.azure.net";

const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Expired, or within a minute of expiring
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_on
            .is_some_and(|expires_on| expires_on - ChronoDuration::seconds(60) <= now)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Source of bearer tokens for the Key Vault resource
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self) -> Result<AccessToken>;
}

/// Token endpoints disagree on number vs. string for expiry fields
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(i64),
    Text(String),
}

impl Seconds {
    fn value(&self) -> Option<i64> {
        match self {
            Seconds::Number(n) => Some(*n),
            Seconds::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<Seconds>,
    #[serde(default)]
    expires_on: Option<Seconds>,
}

impl TokenResponse {
    fn into_token(self) -> AccessToken {
        let absolute = self
            .expires_on
            .as_ref()
            .and_then(Seconds::value)
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        let relative = self
            .expires_in
            .as_ref()
            .and_then(Seconds::value)
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs));

        AccessToken {
            token: self.access_token,
            expires_on: absolute.or(relative),
        }
    }
}

async fn parse_token_response(response: reqwest::Response, source: &str) -> Result<AccessToken> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SecretError::Credential(format!(
            "{source} returned HTTP {}: {}",
            status.as_u16(),
            body.trim()
        )));
    }

    let parsed: TokenResponse = response
        .json()
        .await
        .map_err(|e| SecretError::Credential(format!("{source} returned an invalid token: {e}")))?;

    Ok(parsed.into_token())
}

/// OAuth2 client-credentials grant against Azure AD
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    pub fn new(
        http: reqwest::Client,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn with_authority_host(mut self, authority_host: impl Into<String>) -> Self {
        self.authority_host = authority_host.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self) -> Result<AccessToken> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host, self.tenant_id
        );
        tracing::debug!(tenant_id = %self.tenant_id, client_id = %self.client_id, "Requesting client-secret token");

        let response = self
            .http
            .post(url)
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", KEY_VAULT_SCOPE),
            ])
            .send()
            .await?;

        parse_token_response(response, "Azure AD token endpoint").await
    }
}

/// Where a managed identity token comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedIdentitySource {
    /// App Service / Container Apps local identity endpoint
    AppService { endpoint: String, header: String },
    /// Instance metadata service (VMs, AKS)
    Imds { endpoint: String },
}

pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    source: ManagedIdentitySource,
    /// User-assigned identity; `None` selects the system-assigned one
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    pub fn new(http: reqwest::Client, source: ManagedIdentitySource, client_id: Option<String>) -> Self {
        Self {
            http,
            source,
            client_id,
        }
    }

    pub fn source(&self) -> &ManagedIdentitySource {
        &self.source
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self) -> Result<AccessToken> {
        let (request, label) = match &self.source {
            ManagedIdentitySource::AppService { endpoint, header } => (
                self.http
                    .get(endpoint)
                    .query(&[("api-version", APP_SERVICE_API_VERSION), ("resource", KEY_VAULT_RESOURCE)])
                    .header("X-IDENTITY-HEADER", header),
                "managed identity endpoint",
            ),
            ManagedIdentitySource::Imds { endpoint } => (
                self.http
                    .get(endpoint)
                    .query(&[("api-version", IMDS_API_VERSION), ("resource", KEY_VAULT_RESOURCE)])
                    .header("Metadata", "true"),
                "instance metadata service",
            ),
        };

        let request = match &self.client_id {
            Some(client_id) => request.query(&[("client_id", client_id.as_str())]),
            None => request,
        };

        tracing::debug!(source = label, "Requesting managed identity token");

        let response = request
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| SecretError::Credential(format!("{label} unreachable: {e}")))?;

        parse_token_response(response, label).await
    }
}

/// Credential chain chosen from the environment
pub enum DefaultCredential {
    ClientSecret(ClientSecretCredential),
    ManagedIdentity(ManagedIdentityCredential),
}

impl DefaultCredential {
    pub fn from_env(http: reqwest::Client) -> Self {
        Self::from_lookup(http, |name| std::env::var(name).ok())
    }

    pub fn from_lookup(http: reqwest::Client, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let (Some(tenant_id), Some(client_id), Some(client_secret)) = (
            var("AZURE_TENANT_ID"),
            var("AZURE_CLIENT_ID"),
            var("AZURE_CLIENT_SECRET"),
        ) {
            let credential = ClientSecretCredential::new(http, tenant_id, client_id, client_secret);
            return match var("AZURE_AUTHORITY_HOST") {
                Some(host) => Self::ClientSecret(credential.with_authority_host(host)),
                None => Self::ClientSecret(credential),
            };
        }

        let source = match (var("IDENTITY_ENDPOINT"), var("IDENTITY_HEADER")) {
            (Some(endpoint), Some(header)) => ManagedIdentitySource::AppService { endpoint, header },
            _ => ManagedIdentitySource::Imds {
                endpoint: IMDS_ENDPOINT.to_string(),
            },
        };

        Self::ManagedIdentity(ManagedIdentityCredential::new(
            http,
            source,
            var("AZURE_CLIENT_ID"),
        ))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClientSecret(_) => "client_secret",
            Self::ManagedIdentity(_) => "managed_identity",
        }
    }
}

#[async_trait]
impl TokenCredential for DefaultCredential {
    async fn get_token(&self) -> Result<AccessToken> {
        match self {
            Self::ClientSecret(credential) => credential.get_token().await,
            Self::ManagedIdentity(credential) => credential.get_token().await,
        }
    }
}
