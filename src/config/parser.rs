use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable that overrides `[apify] api-token`
pub const TOKEN_ENV_VAR: &str = "APIFY_API_TOKEN";

/// Loads and parses a configuration file from the given path
///
/// The Apify token is taken from `APIFY_API_TOKEN` when that variable is set
/// and non-empty, so the file can be committed without secrets.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use instapress::config::load_config;
///
/// let config = load_config(Path::new("instapress.toml")).unwrap();
/// println!("Actor: {}", config.apify.actor_id);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let token = std::env::var(TOKEN_ENV_VAR).ok();
    parse_config(&content, token.as_deref())
}

/// Parses configuration text, applying an optional token override
pub fn parse_config(content: &str, token_override: Option<&str>) -> Result<Config, ConfigError> {
    let mut config: Config = toml::from_str(content)?;

    if let Some(token) = token_override.filter(|t| !t.trim().is_empty()) {
        config.apify.api_token = token.trim().to_string();
    }

    validate(&config)?;

    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Recorded on every import run so the ledger shows which settings produced
/// which imports.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
