use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Instapress
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub apify: ApifyConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub wordpress: WordPressConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Apify job-runner configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApifyConfig {
    /// API token; `APIFY_API_TOKEN` in the environment overrides it
    #[serde(rename = "api-token", default)]
    pub api_token: String,

    /// Base URL of the Apify v2 API
    #[serde(rename = "base-url", default = "default_apify_base_url")]
    pub base_url: String,

    /// Actor to run, in `owner~name` form
    #[serde(rename = "actor-id", default = "default_actor_id")]
    pub actor_id: String,

    /// Fixed delay between run status polls (seconds)
    #[serde(rename = "poll-interval-secs", default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Wall-clock budget for a run to reach a terminal status (seconds)
    #[serde(rename = "poll-budget-secs", default = "default_poll_budget")]
    pub poll_budget_secs: u64,

    /// Per-request timeout for every HTTP call (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl ApifyConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_budget(&self) -> Duration {
        Duration::from_secs(self.poll_budget_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Scrape result cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Root directory of the on-disk cache
    #[serde(default = "default_cache_dir")]
    pub directory: PathBuf,

    /// TTL for timeline and URL-batch results (seconds)
    #[serde(rename = "default-ttl-secs", default = "default_ttl")]
    pub default_ttl_secs: u64,

    /// TTL for profile lookups (seconds)
    #[serde(rename = "profile-ttl-secs", default = "default_profile_ttl")]
    pub profile_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_dir(),
            default_ttl_secs: default_ttl(),
            profile_ttl_secs: default_profile_ttl(),
        }
    }
}

/// WordPress destination configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WordPressConfig {
    /// Site root, e.g. `https://blog.example.com`
    #[serde(rename = "base-url")]
    pub base_url: String,

    pub username: String,

    /// Application password used for basic auth
    #[serde(rename = "application-password")]
    pub application_password: String,

    /// Publish imported posts immediately instead of leaving drafts
    #[serde(default)]
    pub publish: bool,
}

/// Local import ledger configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_apify_base_url() -> String {
    "https://api.apify.com/v2".to_string()
}

fn default_actor_id() -> String {
    "apify~instagram-scraper".to_string()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_poll_budget() -> u64 {
    300
}

fn default_request_timeout() -> u64 {
    30
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache/apify")
}

fn default_ttl() -> u64 {
    3600
}

fn default_profile_ttl() -> u64 {
    21600
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/post_tracker.db")
}
