//! Deterministic cache key derivation

use crate::cache::CacheKind;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Computes the cache key for an operation kind and its parameters
///
/// The key is the hex SHA-256 of `"{kind}:{canonical params}"`. Object keys
/// are sorted recursively, so two parameter maps that differ only in field
/// order hash identically. Lists are hashed in the order given; callers
/// that treat a list as a set must sort it first (see
/// [`crate::url::canonical_url_batch`]).
pub fn cache_key(kind: CacheKind, params: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(canonical_json(params).as_bytes());
    hex::encode(hasher.finalize())
}

/// Serializes JSON with object keys in sorted order at every depth
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
