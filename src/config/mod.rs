//! Configuration module for Instapress
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use instapress::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("instapress.toml")).unwrap();
//! println!("Polling every {}s", config.apify.poll_interval_secs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApifyConfig, CacheConfig, Config, LedgerConfig, WordPressConfig};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config, TOKEN_ENV_VAR,
};
