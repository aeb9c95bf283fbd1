use crate::UrlError;
use url::Url;

/// Path prefixes that are post or feature routes rather than usernames
const RESERVED_SEGMENTS: &[&str] = &[
    "p", "reel", "reels", "tv", "stories", "explore", "accounts", "direct",
];

/// Normalizes an Instagram post URL so equivalent links compare equal
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not http(s)
/// 2. Upgrade http:// to https://
/// 3. Lowercase the host and remove a `www.` prefix
/// 4. Remove dot segments, duplicate and trailing slashes
/// 5. Drop the fragment and the whole query string (share links carry
///    per-viewer `igsh`/`img_index` parameters that never change the post)
///
/// # Examples
///
/// ```
/// use instapress::url::normalize_post_url;
///
/// let url = normalize_post_url("http://WWW.Instagram.com/p/Cx1/?igsh=abc").unwrap();
/// assert_eq!(url.as_str(), "https://instagram.com/p/Cx1");
/// ```
pub fn normalize_post_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.scheme() == "http" {
        url.set_scheme("https")
            .map_err(|_| UrlError::InvalidScheme("cannot upgrade to https".to_string()))?;
    }

    let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);
    url.set_query(None);

    Ok(url)
}

/// Extracts the account name from a profile or `/{user}/p/{code}` URL
///
/// Returns `None` for bare `/p/{code}` links, which do not name their owner.
pub fn username_from_post_url(url_str: &str) -> Option<String> {
    let url = Url::parse(url_str).ok()?;
    let host = url.host_str()?.to_lowercase();
    if !host.ends_with("instagram.com") {
        return None;
    }

    let first = url.path_segments()?.find(|s| !s.is_empty())?;
    if RESERVED_SEGMENTS.contains(&first) {
        return None;
    }

    Some(first.to_lowercase())
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}
