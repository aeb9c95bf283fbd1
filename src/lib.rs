//! Instapress: social content import pipeline
//!
//! This crate scrapes Instagram content through an external Apify actor,
//! caches scrape results on disk to control cost and latency, and republishes
//! each post into a content-management backend while reporting live progress.

pub mod apify;
pub mod cache;
pub mod config;
pub mod import;
pub mod media;
pub mod output;
pub mod progress;
pub mod scraper;
pub mod storage;
pub mod store;
pub mod url;

use thiserror::Error;

/// Main error type for Instapress operations
#[derive(Debug, Error)]
pub enum InstapressError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scrape error: {0}")]
    Scrape(#[from] apify::ScrapeError),

    #[error("Content store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] storage::LedgerError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Progress session not found: {0}")]
    SessionNotFound(uuid::Uuid),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Instapress operations
pub type Result<T> = std::result::Result<T, InstapressError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use apify::{ApifyClient, ProfileRecord, ResultRecord, ScrapeRequest};
pub use cache::{CacheKind, ResultCache};
pub use config::Config;
pub use import::{BulkImporter, ImportOptions, ImportOutcome, ImportReport};
pub use progress::{ProgressRegistry, ProgressStatus};
pub use scraper::CachedScraper;
