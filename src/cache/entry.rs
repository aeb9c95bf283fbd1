//! On-disk cache entry envelope

use crate::cache::CacheKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// A persisted scrape result with its freshness metadata
///
/// Serialized as `{timestamp, kind, params, ttl, payload}`; `ttl` is in
/// seconds and may be fractional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// When the entry was written
    pub timestamp: DateTime<Utc>,

    /// Operation kind the entry belongs to
    pub kind: CacheKind,

    /// Canonical parameters the key was derived from
    pub params: Value,

    /// Time-to-live recorded at write time (seconds)
    pub ttl: f64,

    /// The cached result
    pub payload: Value,
}

impl CacheEntry {
    pub fn new(
        kind: CacheKind,
        params: Value,
        payload: Value,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp: now,
            kind,
            params,
            ttl: ttl.as_secs_f64(),
            payload,
        }
    }

    /// Age of the entry at `now`; clock skew into the past counts as zero
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).to_std().unwrap_or(Duration::ZERO)
    }

    /// The TTL stored with the entry, or `None` if it is not a finite,
    /// non-negative number of seconds
    pub fn stored_ttl(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.ttl).ok()
    }

    /// An entry is valid iff `now - timestamp < ttl`
    ///
    /// `ttl_override` replaces the stored TTL as the threshold for this read.
    pub fn is_valid_at(&self, now: DateTime<Utc>, ttl_override: Option<Duration>) -> bool {
        match ttl_override.or_else(|| self.stored_ttl()) {
            Some(ttl) => self.age(now) < ttl,
            None => false,
        }
    }
}
