use async_trait::async_trait;

use super::{Result, SecretError, SecretProvider};

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads secrets from environment variables for local development.
///
/// `AZURE-STORAGE-CONNECTION-STRING` is looked up as
/// `AZURE_STORAGE_CONNECTION_STRING`.
pub struct EnvironmentSecretProvider {
    lookup: Lookup,
}

impl EnvironmentSecretProvider {
    pub fn from_env() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }
}

/// Environment variable name for a vault-style secret name
pub fn secret_env_var(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

#[async_trait]
impl SecretProvider for EnvironmentSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<String> {
        let var = secret_env_var(name);
        match (self.lookup)(&var) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            Some(_) => Err(SecretError::Empty(name.to_string())),
            None => Err(SecretError::NotFound(name.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "environment"
    }
}
