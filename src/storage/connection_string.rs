//! Azure Storage connection string parsing
//!
//! Format: `Key1=Value1;Key2=Value2;...`. Keys are matched case-insensitively;
//! values may themselves contain `=` (base64 account keys do).

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionStringError {
    #[error("segment '{0}' is not a Key=Value pair")]
    MalformedSegment(String),

    #[error("missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("unsupported DefaultEndpointsProtocol '{0}'")]
    UnsupportedProtocol(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct AzureConnectionString {
    pub use_development_storage: bool,
    pub protocol: String,
    pub account_name: String,
    pub account_key: String,
    pub endpoint_suffix: String,
    /// Explicit blob service endpoint, e.g. an Azurite or private-link URL
    pub blob_endpoint: Option<String>,
}

impl AzureConnectionString {
    pub fn parse(raw: &str) -> Result<Self, ConnectionStringError> {
        let mut pairs = HashMap::new();
        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| ConnectionStringError::MalformedSegment(segment.to_string()))?;
            pairs.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        let use_development_storage = pairs
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let protocol = pairs
            .get("defaultendpointsprotocol")
            .map(|p| p.to_ascii_lowercase())
            .unwrap_or_else(|| "https".to_string());
        if protocol != "https" && protocol != "http" {
            return Err(ConnectionStringError::UnsupportedProtocol(protocol));
        }

        let blob_endpoint = pairs
            .get("blobendpoint")
            .map(|e| e.trim_end_matches('/').to_string());
        let endpoint_suffix = pairs
            .get("endpointsuffix")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ENDPOINT_SUFFIX.to_string());

        if use_development_storage {
            return Ok(Self {
                use_development_storage,
                protocol: "http".to_string(),
                account_name: pairs.get("accountname").cloned().unwrap_or_default(),
                account_key: pairs.get("accountkey").cloned().unwrap_or_default(),
                endpoint_suffix,
                blob_endpoint,
            });
        }

        let account_name = pairs
            .get("accountname")
            .cloned()
            .filter(|v| !v.is_empty())
            .ok_or(ConnectionStringError::MissingKey("AccountName"))?;
        let account_key = pairs
            .get("accountkey")
            .cloned()
            .filter(|v| !v.is_empty())
            .ok_or(ConnectionStringError::MissingKey("AccountKey"))?;

        Ok(Self {
            use_development_storage,
            protocol,
            account_name,
            account_key,
            endpoint_suffix,
            blob_endpoint,
        })
    }

    /// Blob endpoint to use when it differs from the public-cloud default
    pub fn custom_blob_endpoint(&self) -> Option<String> {
        if let Some(endpoint) = &self.blob_endpoint {
            return Some(endpoint.clone());
        }

        if self.endpoint_suffix != DEFAULT_ENDPOINT_SUFFIX || self.protocol == "http" {
            return Some(format!(
                "{}://{}.blob.{}",
                self.protocol, self.account_name, self.endpoint_suffix
            ));
        }

        None
    }
}

impl fmt::Debug for AzureConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConnectionString")
            .field("use_development_storage", &self.use_development_storage)
            .field("protocol", &self.protocol)
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("endpoint_suffix", &self.endpoint_suffix)
            .field("blob_endpoint", &self.blob_endpoint)
            .finish()
    }
}
