use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "QRSTASH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/qrstash.toml";
const ENV_PREFIX: &str = "QRSTASH";
const ENV_SEPARATOR: &str = "__";
const KEY_VAULT_NAME_ENV: &str = "AZURE_KEY_VAULT_NAME";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;

    apply_environment_only(&mut config, |key| env::var(key).ok());

    Ok(config)
}

/// Values that are only ever taken from the process environment
fn apply_environment_only(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(name) = lookup(KEY_VAULT_NAME_ENV) {
        let name = name.trim();
        if !name.is_empty() {
            config.secrets.key_vault_name = Some(name.to_string());
        }
    }
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // QRSTASH__SERVER__BIND_ADDR -> server.bind_addr
    // QRSTASH__SERVER__CORS_ORIGINS=http://a,http://b -> server.cors_origins
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .list_separator(",")
            .with_list_parse_key("server.cors_origins")
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
