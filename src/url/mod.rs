//! URL handling module for Instapress
//!
//! Post URL normalization (used to canonicalize URL-batch scrape requests)
//! and account-name extraction from Instagram links.

mod normalize;

pub use normalize::{normalize_post_url, username_from_post_url};

/// Canonicalizes a batch of post URLs into a sorted, de-duplicated list
///
/// URLs that fail to normalize are kept verbatim (trimmed) so the batch is
/// never silently shortened; the actor reports them as unscrapeable.
pub fn canonical_url_batch<S: AsRef<str>>(urls: &[S]) -> Vec<String> {
    let mut canonical: Vec<String> = urls
        .iter()
        .map(|u| {
            let raw = u.as_ref();
            normalize_post_url(raw)
                .map(|n| n.to_string())
                .unwrap_or_else(|_| raw.trim().to_string())
        })
        .collect();

    canonical.sort();
    canonical.dedup();
    canonical
}
