//! Scrape result cache
//!
//! Memoizes external scrape results on local disk keyed by operation kind and
//! canonical parameters, so repeated requests inside the freshness window
//! skip the paid actor run entirely.

mod entry;
mod key;
mod store;

pub use entry::CacheEntry;
pub use key::{cache_key, canonical_json};
pub use store::ResultCache;

use crate::config::CacheConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Operation kind a cache entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    UserPosts,
    PostUrls,
    Profile,
}

impl CacheKind {
    /// Stable name used in keys and stats
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::UserPosts => "user_posts",
            CacheKind::PostUrls => "post_urls",
            CacheKind::Profile => "profile",
        }
    }

    /// Subdirectory holding entries of this kind
    pub fn dir_name(&self) -> &'static str {
        match self {
            CacheKind::UserPosts => "user_posts",
            CacheKind::PostUrls => "post_urls",
            CacheKind::Profile => "profiles",
        }
    }

    pub fn all() -> [CacheKind; 3] {
        [CacheKind::UserPosts, CacheKind::PostUrls, CacheKind::Profile]
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default time-to-live per kind, applied when a write gives no override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub default_ttl: Duration,
    pub profile_ttl: Duration,
}

impl TtlPolicy {
    pub fn ttl_for(&self, kind: CacheKind) -> Duration {
        match kind {
            CacheKind::Profile => self.profile_ttl,
            CacheKind::UserPosts | CacheKind::PostUrls => self.default_ttl,
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            profile_ttl: Duration::from_secs(21600),
        }
    }
}

impl From<&CacheConfig> for TtlPolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            default_ttl: Duration::from_secs(config.default_ttl_secs),
            profile_ttl: Duration::from_secs(config.profile_ttl_secs),
        }
    }
}

/// Per-kind file counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KindStats {
    pub files: u64,
    pub size_bytes: u64,
    pub expired: u64,
}

/// Snapshot of cache contents
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub total_files: u64,
    pub total_size_bytes: u64,
    pub by_kind: BTreeMap<String, KindStats>,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

impl CacheStats {
    pub fn total_size_mb(&self) -> f64 {
        self.total_size_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn total_expired(&self) -> u64 {
        self.by_kind.values().map(|k| k.expired).sum()
    }
}
