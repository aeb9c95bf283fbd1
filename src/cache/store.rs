//! Filesystem-backed result cache

use crate::cache::entry::CacheEntry;
use crate::cache::key::cache_key;
use crate::cache::{CacheKind, CacheStats, KindStats, TtlPolicy};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Result of reading one entry file
enum Probe {
    Missing,
    Corrupt,
    Found(CacheEntry),
}

/// TTL cache for scrape results, one JSON file per entry
///
/// Entries live at `{root}/{kind dir}/{key}.json`. All operations serialize
/// on an internal lock so a `set` is visible to every later `get` on the
/// same key, across threads and tasks sharing the cache through an `Arc`.
#[derive(Debug)]
pub struct ResultCache {
    root: PathBuf,
    policy: TtlPolicy,
    lock: Mutex<()>,
}

impl ResultCache {
    /// Opens (creating if needed) a cache rooted at `root`
    pub fn open(root: impl Into<PathBuf>, policy: TtlPolicy) -> io::Result<Self> {
        let root = root.into();
        for kind in CacheKind::all() {
            fs::create_dir_all(root.join(kind.dir_name()))?;
        }
        tracing::info!("Result cache ready at {}", root.display());
        Ok(Self {
            root,
            policy,
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    /// Returns the cached payload if present and still valid
    ///
    /// `ttl_override`, when given, is the validity threshold for this read
    /// instead of the TTL stored with the entry. Expired and corrupt entries
    /// are deleted and reported as a miss.
    pub fn get<T: DeserializeOwned>(
        &self,
        kind: CacheKind,
        params: &Value,
        ttl_override: Option<Duration>,
    ) -> Option<T> {
        self.get_at(kind, params, ttl_override, Utc::now())
    }

    pub(crate) fn get_at<T: DeserializeOwned>(
        &self,
        kind: CacheKind,
        params: &Value,
        ttl_override: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Option<T> {
        let key = cache_key(kind, params);
        let path = self.entry_path(kind, &key);
        let _guard = self.guard();

        let entry = match read_entry(&path) {
            Probe::Missing => {
                tracing::debug!("Cache miss: {} (not found)", key);
                return None;
            }
            Probe::Corrupt => {
                tracing::warn!("Cache entry {} is corrupt, removing", key);
                remove_quietly(&path);
                return None;
            }
            Probe::Found(entry) => entry,
        };

        if !entry.is_valid_at(now, ttl_override) {
            tracing::debug!(
                "Cache expired: {} (age: {}s)",
                key,
                entry.age(now).as_secs()
            );
            remove_quietly(&path);
            return None;
        }

        match serde_json::from_value::<T>(entry.payload) {
            Ok(payload) => {
                tracing::info!(
                    "Cache hit: {} {} (age: {}s)",
                    kind,
                    key,
                    (now - entry.timestamp).num_seconds().max(0)
                );
                Some(payload)
            }
            Err(e) => {
                tracing::warn!("Cache entry {} has an unreadable payload ({}), removing", key, e);
                remove_quietly(&path);
                None
            }
        }
    }

    /// Stores a payload, replacing any entry with the same key
    ///
    /// Returns `false` instead of failing when the payload cannot be
    /// serialized or the file cannot be written.
    pub fn set<T: Serialize + ?Sized>(
        &self,
        kind: CacheKind,
        params: &Value,
        payload: &T,
        ttl_override: Option<Duration>,
    ) -> bool {
        self.set_at(kind, params, payload, ttl_override, Utc::now())
    }

    pub(crate) fn set_at<T: Serialize + ?Sized>(
        &self,
        kind: CacheKind,
        params: &Value,
        payload: &T,
        ttl_override: Option<Duration>,
        now: DateTime<Utc>,
    ) -> bool {
        let key = cache_key(kind, params);

        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Cannot serialize payload for cache entry {}: {}", key, e);
                return false;
            }
        };

        let ttl = ttl_override.unwrap_or_else(|| self.policy.ttl_for(kind));
        let entry = CacheEntry::new(kind, params.clone(), payload, ttl, now);
        let body = match serde_json::to_vec_pretty(&entry) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Cannot encode cache entry {}: {}", key, e);
                return false;
            }
        };

        let path = self.entry_path(kind, &key);
        let _guard = self.guard();

        match write_atomically(&path, &body) {
            Ok(()) => {
                tracing::info!("Cached result: {} {} ({} bytes)", kind, key, body.len());
                true
            }
            Err(e) => {
                tracing::error!("Error writing cache entry {}: {}", key, e);
                false
            }
        }
    }

    /// Removes one entry; returns whether anything was removed
    pub fn invalidate(&self, kind: CacheKind, params: &Value) -> bool {
        let key = cache_key(kind, params);
        let path = self.entry_path(kind, &key);
        let _guard = self.guard();

        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Invalidated cache: {}", key);
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::error!("Error removing cache entry {}: {}", key, e);
                false
            }
        }
    }

    /// Removes every entry, of any kind, whose params name `username`
    pub fn invalidate_user(&self, username: &str) -> usize {
        let wanted = crate::apify::canonical_username(username);
        let _guard = self.guard();

        let mut removed = 0;
        for (_, path) in self.entry_files() {
            if let Probe::Found(entry) = read_entry(&path) {
                let matches = entry
                    .params
                    .get("username")
                    .and_then(Value::as_str)
                    .map(|u| u == wanted)
                    .unwrap_or(false);
                if matches && fs::remove_file(&path).is_ok() {
                    removed += 1;
                }
            }
        }

        tracing::info!("Cleared {} cache entries for @{}", removed, wanted);
        removed
    }

    /// Removes expired and corrupt entries; returns how many were removed
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    pub(crate) fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let _guard = self.guard();

        let mut removed = 0;
        for (_, path) in self.entry_files() {
            let stale = match read_entry(&path) {
                Probe::Found(entry) => !entry.is_valid_at(now, None),
                Probe::Corrupt => true,
                Probe::Missing => false,
            };
            if stale && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!("Cleared {} expired cache entries", removed);
        }
        removed
    }

    /// Removes every entry; returns how many were removed
    pub fn sweep_all(&self) -> usize {
        let _guard = self.guard();

        let removed = self
            .entry_files()
            .into_iter()
            .filter(|(_, path)| fs::remove_file(path).is_ok())
            .count();

        tracing::info!("Cleared all cache: {} entries removed", removed);
        removed
    }

    /// Summarizes entry counts, sizes and ages
    pub fn stats(&self) -> CacheStats {
        self.stats_at(Utc::now())
    }

    pub(crate) fn stats_at(&self, now: DateTime<Utc>) -> CacheStats {
        let _guard = self.guard();
        let mut stats = CacheStats::default();

        for (kind, path) in self.entry_files() {
            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            let kind_stats = stats
                .by_kind
                .entry(kind.as_str().to_string())
                .or_insert_with(KindStats::default);

            stats.total_files += 1;
            stats.total_size_bytes += size;
            kind_stats.files += 1;
            kind_stats.size_bytes += size;

            if let Probe::Found(entry) = read_entry(&path) {
                if !entry.is_valid_at(now, None) {
                    kind_stats.expired += 1;
                }
                stats.oldest_entry = Some(match stats.oldest_entry {
                    Some(t) if t <= entry.timestamp => t,
                    _ => entry.timestamp,
                });
                stats.newest_entry = Some(match stats.newest_entry {
                    Some(t) if t >= entry.timestamp => t,
                    _ => entry.timestamp,
                });
            }
        }

        stats
    }

    fn entry_path(&self, kind: CacheKind, key: &str) -> PathBuf {
        self.root.join(kind.dir_name()).join(format!("{}.json", key))
    }

    /// Lists every `.json` entry file across all kind directories
    fn entry_files(&self) -> Vec<(CacheKind, PathBuf)> {
        let mut files = Vec::new();
        for kind in CacheKind::all() {
            let dir = self.root.join(kind.dir_name());
            let Ok(read_dir) = fs::read_dir(&dir) else {
                continue;
            };
            for dir_entry in read_dir.flatten() {
                let path = dir_entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    files.push((kind, path));
                }
            }
        }
        files
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The lock guards no data, so a poisoned lock is still usable
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn read_entry(path: &Path) -> Probe {
    match fs::read(path) {
        Ok(bytes) => match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) => Probe::Found(entry),
            Err(_) => Probe::Corrupt,
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => Probe::Missing,
        Err(_) => Probe::Corrupt,
    }
}

fn write_atomically(path: &Path, body: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension(format!("{}.tmp", std::process::id()));
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path).inspect_err(|_| remove_quietly(&tmp))
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn open_cache() -> (TempDir, ResultCache) {
        let dir = TempDir::new().unwrap();
        let cache = ResultCache::open(dir.path(), TtlPolicy::default()).unwrap();
        (dir, cache)
    }

    fn params() -> Value {
        json!({"username": "acme", "limit": 3, "include_stories": false})
    }

    #[test]
    fn test_open_creates_kind_directories() {
        let (dir, _cache) = open_cache();
        for name in ["user_posts", "post_urls", "profiles"] {
            assert!(dir.path().join(name).is_dir(), "{} missing", name);
        }
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let (_dir, cache) = open_cache();
        assert!(cache.set(CacheKind::UserPosts, &params(), &vec!["a", "b"], None));

        let hit: Option<Vec<String>> = cache.get(CacheKind::UserPosts, &params(), None);
        assert_eq!(hit, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_miss_on_unknown_key() {
        let (_dir, cache) = open_cache();
        let hit: Option<Vec<String>> = cache.get(CacheKind::UserPosts, &params(), None);
        assert!(hit.is_none());
    }

    #[test]
    fn test_ttl_boundary_and_lazy_removal() {
        let (_dir, cache) = open_cache();
        let t0 = Utc::now();
        let ttl = Some(Duration::from_secs(100));
        cache.set_at(CacheKind::UserPosts, &params(), &json!([1]), ttl, t0);

        let before: Option<Value> =
            cache.get_at(CacheKind::UserPosts, &params(), None, t0 + chrono::Duration::seconds(99));
        assert!(before.is_some());

        let at: Option<Value> =
            cache.get_at(CacheKind::UserPosts, &params(), None, t0 + chrono::Duration::seconds(100));
        assert!(at.is_none());

        // The expired read deleted the file
        assert_eq!(cache.stats().total_files, 0);
    }

    #[test]
    fn test_read_override_is_the_threshold() {
        let (_dir, cache) = open_cache();
        let t0 = Utc::now();
        cache.set_at(CacheKind::UserPosts, &params(), &json!([1]), None, t0);
        let later = t0 + chrono::Duration::seconds(30);

        let hit: Option<Value> = cache.get_at(
            CacheKind::UserPosts,
            &params(),
            Some(Duration::from_secs(10)),
            later,
        );
        assert!(hit.is_none());
    }

    #[test]
    fn test_profile_kind_gets_longer_default_ttl() {
        let (_dir, cache) = open_cache();
        let t0 = Utc::now();
        let two_hours = t0 + chrono::Duration::hours(2);
        let p = json!({"username": "acme"});

        cache.set_at(CacheKind::Profile, &p, &json!({"username": "acme"}), None, t0);
        cache.set_at(CacheKind::UserPosts, &p, &json!([1]), None, t0);

        let profile: Option<Value> = cache.get_at(CacheKind::Profile, &p, None, two_hours);
        let posts: Option<Value> = cache.get_at(CacheKind::UserPosts, &p, None, two_hours);
        assert!(profile.is_some());
        assert!(posts.is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let (_dir, cache) = open_cache();
        cache.set(CacheKind::UserPosts, &params(), &json!(["old"]), None);
        cache.set(CacheKind::UserPosts, &params(), &json!(["new"]), None);

        let hit: Option<Vec<String>> = cache.get(CacheKind::UserPosts, &params(), None);
        assert_eq!(hit, Some(vec!["new".to_string()]));
        assert_eq!(cache.stats().total_files, 1);
    }

    #[test]
    fn test_corrupt_entry_is_a_miss_and_removed() {
        let (dir, cache) = open_cache();
        let key = cache_key(CacheKind::UserPosts, &params());
        let path = dir.path().join("user_posts").join(format!("{}.json", key));
        fs::write(&path, b"{ not json").unwrap();

        let hit: Option<Value> = cache.get(CacheKind::UserPosts, &params(), None);
        assert!(hit.is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_payload_of_wrong_shape_is_a_miss() {
        let (_dir, cache) = open_cache();
        cache.set(CacheKind::UserPosts, &params(), &json!({"not": "a list"}), None);

        let hit: Option<Vec<String>> = cache.get(CacheKind::UserPosts, &params(), None);
        assert!(hit.is_none());
        assert_eq!(cache.stats().total_files, 0);
    }

    #[test]
    fn test_invalidate() {
        let (_dir, cache) = open_cache();
        cache.set(CacheKind::UserPosts, &params(), &json!([1]), None);

        assert!(cache.invalidate(CacheKind::UserPosts, &params()));
        assert!(!cache.invalidate(CacheKind::UserPosts, &params()));
    }

    #[test]
    fn test_invalidate_user_spans_kinds() {
        let (_dir, cache) = open_cache();
        cache.set(CacheKind::UserPosts, &params(), &json!([1]), None);
        cache.set(CacheKind::Profile, &json!({"username": "acme"}), &json!({}), None);
        cache.set(CacheKind::Profile, &json!({"username": "other"}), &json!({}), None);

        assert_eq!(cache.invalidate_user("@Acme"), 2);
        assert_eq!(cache.stats().total_files, 1);
    }

    #[test]
    fn test_sweep_expired_keeps_fresh_entries() {
        let (dir, cache) = open_cache();
        let t0 = Utc::now();
        cache.set_at(CacheKind::UserPosts, &params(), &json!([1]), Some(Duration::from_secs(10)), t0);
        cache.set_at(CacheKind::Profile, &json!({"username": "acme"}), &json!({}), None, t0);
        fs::write(dir.path().join("post_urls").join("broken.json"), b"nope").unwrap();

        let removed = cache.sweep_expired_at(t0 + chrono::Duration::seconds(60));
        assert_eq!(removed, 2);
        assert_eq!(cache.stats().total_files, 1);
    }

    #[test]
    fn test_sweep_all() {
        let (_dir, cache) = open_cache();
        cache.set(CacheKind::UserPosts, &params(), &json!([1]), None);
        cache.set(CacheKind::PostUrls, &json!({"urls": ["u"]}), &json!([1]), None);

        assert_eq!(cache.sweep_all(), 2);
        assert_eq!(cache.stats().total_files, 0);
    }

    #[test]
    fn test_stats_breakdown() {
        let (_dir, cache) = open_cache();
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(5);
        cache.set_at(CacheKind::UserPosts, &params(), &json!([1]), Some(Duration::from_secs(1)), t0);
        cache.set_at(CacheKind::Profile, &json!({"username": "acme"}), &json!({}), None, t1);

        let stats = cache.stats_at(t1);
        assert_eq!(stats.total_files, 2);
        assert!(stats.total_size_bytes > 0);
        assert_eq!(stats.by_kind["user_posts"].files, 1);
        assert_eq!(stats.by_kind["user_posts"].expired, 1);
        assert_eq!(stats.by_kind["profile"].expired, 0);
        assert_eq!(stats.oldest_entry, Some(t0));
        assert_eq!(stats.newest_entry, Some(t1));
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let (_dir, cache) = open_cache();
        let cache = Arc::new(cache);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let p = json!({"username": format!("user{}", i % 2)});
                    assert!(cache.set(CacheKind::UserPosts, &p, &json!([i]), None));
                    let hit: Option<Vec<i64>> = cache.get(CacheKind::UserPosts, &p, None);
                    assert!(hit.is_some());
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.stats().total_files, 2);
    }
}
