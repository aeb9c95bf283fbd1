use crate::config::types::{ApifyConfig, CacheConfig, Config, LedgerConfig, WordPressConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_apify_config(&config.apify)?;
    validate_cache_config(&config.cache)?;
    validate_wordpress_config(&config.wordpress)?;
    validate_ledger_config(&config.ledger)?;
    Ok(())
}

/// Validates the job-runner section
fn validate_apify_config(config: &ApifyConfig) -> Result<(), ConfigError> {
    if config.api_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "api_token cannot be empty (set it in the file or via APIFY_API_TOKEN)".to_string(),
        ));
    }

    validate_http_url("apify base_url", &config.base_url)?;

    if config.actor_id.is_empty() || config.actor_id.contains('/') {
        return Err(ConfigError::Validation(format!(
            "actor_id must be non-empty and use the 'owner~name' form, got '{}'",
            config.actor_id
        )));
    }

    if config.poll_interval_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "poll_interval_secs must be >= 1, got {}",
            config.poll_interval_secs
        )));
    }

    if config.poll_budget_secs <= config.poll_interval_secs {
        return Err(ConfigError::Validation(format!(
            "poll_budget_secs ({}) must exceed poll_interval_secs ({})",
            config.poll_budget_secs, config.poll_interval_secs
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    Ok(())
}

/// Validates cache TTLs and location
fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "cache directory cannot be empty".to_string(),
        ));
    }

    if config.default_ttl_secs == 0 || config.profile_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "cache TTLs must be greater than zero".to_string(),
        ));
    }

    // Profiles change less often than timelines
    if config.profile_ttl_secs < config.default_ttl_secs {
        return Err(ConfigError::Validation(format!(
            "profile_ttl_secs ({}) must be >= default_ttl_secs ({})",
            config.profile_ttl_secs, config.default_ttl_secs
        )));
    }

    Ok(())
}

/// Validates the destination site section
fn validate_wordpress_config(config: &WordPressConfig) -> Result<(), ConfigError> {
    validate_http_url("wordpress base_url", &config.base_url)?;

    if config.username.is_empty() {
        return Err(ConfigError::Validation(
            "wordpress username cannot be empty".to_string(),
        ));
    }

    if config.application_password.is_empty() {
        return Err(ConfigError::Validation(
            "wordpress application_password cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_ledger_config(config: &LedgerConfig) -> Result<(), ConfigError> {
    if config.database_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Requires an absolute http(s) URL
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", field, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field,
            url.scheme()
        )));
    }

    Ok(())
}
