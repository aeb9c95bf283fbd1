//! Mapping of raw actor dataset items into typed records

use crate::url::username_from_post_url;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("hashtag pattern is valid"));

/// Author used when no other source names one
const UNKNOWN_AUTHOR: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub likes: i64,
    pub comments: i64,
    pub views: Option<i64>,
}

/// One scraped post
///
/// `media_url` is a signed, expiring CDN link. It is valid when the record
/// is produced and must be fetched promptly; it is not a durable reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: String,
    pub short_code: String,
    pub author: String,
    pub caption: String,
    pub media_url: Option<String>,
    pub post_url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub hashtags: Vec<String>,
    pub engagement: Engagement,
    pub media_kind: MediaKind,
    /// Upstream item as received, kept for diagnostics
    pub raw: Value,
}

/// Account details from a profile lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub username: String,
    pub full_name: Option<String>,
    pub biography: Option<String>,
    pub followers_count: Option<i64>,
    pub following_count: Option<i64>,
    pub posts_count: Option<i64>,
    pub profile_pic_url: Option<String>,
    pub is_verified: bool,
    pub is_private: bool,
}

/// Post fields the normalizer reads; everything is optional upstream
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPost {
    pub id: Option<Value>,
    pub short_code: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub caption: Option<String>,
    pub display_url: Option<String>,
    pub images: Option<Vec<Value>>,
    pub url: Option<String>,
    pub owner_username: Option<String>,
    pub timestamp: Option<String>,
    pub likes_count: Option<i64>,
    pub comments_count: Option<i64>,
    pub video_view_count: Option<i64>,
    pub is_video: Option<bool>,
}

/// Shape of a dataset item after defensive decoding
#[derive(Debug, Clone)]
pub enum RawItem {
    Image(RawPost),
    Video(RawPost),
    Unknown,
}

impl RawItem {
    pub fn decode(value: &Value) -> Self {
        let Ok(post) = RawPost::deserialize(value) else {
            return RawItem::Unknown;
        };
        if post.id.as_ref().and_then(id_string).is_none() && non_empty(&post.short_code).is_none()
        {
            return RawItem::Unknown;
        }

        let item_type = post.item_type.as_deref().unwrap_or_default();
        let is_image_type = ["Image", "Sidecar", "GraphImage", "GraphSidecar", "post"]
            .iter()
            .any(|t| t.eq_ignore_ascii_case(item_type));
        let is_video_type = ["Video", "GraphVideo"]
            .iter()
            .any(|t| t.eq_ignore_ascii_case(item_type));

        if is_video_type || (is_image_type && post.is_video.unwrap_or(false)) {
            RawItem::Video(post)
        } else if is_image_type {
            RawItem::Image(post)
        } else {
            RawItem::Unknown
        }
    }
}

/// Normalizes dataset items into records, dropping unrecognized shapes
///
/// `identity` is the account the request was about, used as the author
/// when an item does not name one.
pub fn normalize_items(items: &[Value], identity: Option<&str>) -> Vec<ResultRecord> {
    let records: Vec<ResultRecord> = items
        .iter()
        .filter_map(|item| match RawItem::decode(item) {
            RawItem::Image(post) => Some(into_record(post, MediaKind::Image, identity, item)),
            RawItem::Video(post) => Some(into_record(post, MediaKind::Video, identity, item)),
            RawItem::Unknown => None,
        })
        .collect();

    let dropped = items.len() - records.len();
    if dropped > 0 {
        tracing::debug!("Dropped {} unrecognized dataset items", dropped);
    }
    records
}

/// Finds the profile item for `username` (case-insensitive)
pub fn find_profile(items: &[Value], username: &str) -> Option<ProfileRecord> {
    items.iter().find_map(|item| {
        let found = item.get("username")?.as_str()?;
        if !found.eq_ignore_ascii_case(username) {
            return None;
        }
        let text = |field: &str| item.get(field).and_then(Value::as_str).map(str::to_string);
        let count = |field: &str| item.get(field).and_then(Value::as_i64);
        let flag = |field: &str| item.get(field).and_then(Value::as_bool).unwrap_or(false);

        Some(ProfileRecord {
            username: found.to_string(),
            full_name: text("fullName"),
            biography: text("biography"),
            followers_count: count("followersCount"),
            following_count: count("followsCount").or_else(|| count("followingCount")),
            posts_count: count("postsCount"),
            profile_pic_url: text("profilePicUrlHD").or_else(|| text("profilePicUrl")),
            is_verified: flag("verified"),
            is_private: flag("private"),
        })
    })
}

/// Every `#word` in a caption, without the `#`
pub fn extract_hashtags(caption: &str) -> Vec<String> {
    HASHTAG_RE
        .captures_iter(caption)
        .map(|c| c[1].to_string())
        .collect()
}

fn into_record(
    post: RawPost,
    media_kind: MediaKind,
    identity: Option<&str>,
    raw: &Value,
) -> ResultRecord {
    let short_code = non_empty(&post.short_code).unwrap_or_default().to_string();
    let id = post
        .id
        .as_ref()
        .and_then(id_string)
        .unwrap_or_else(|| short_code.clone());
    let caption = post.caption.clone().unwrap_or_default();

    let post_url = if short_code.is_empty() {
        post.url.clone().unwrap_or_default()
    } else {
        format!("https://www.instagram.com/p/{}/", short_code)
    };

    let author = non_empty(&post.owner_username)
        .map(str::to_string)
        .or_else(|| post.url.as_deref().and_then(username_from_post_url))
        .or_else(|| identity.map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    let published_at = post
        .timestamp
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc));

    ResultRecord {
        id,
        short_code,
        author,
        hashtags: extract_hashtags(&caption),
        caption,
        media_url: primary_media_url(&post),
        post_url,
        published_at,
        engagement: Engagement {
            likes: post.likes_count.unwrap_or(0),
            comments: post.comments_count.unwrap_or(0),
            views: post.video_view_count,
        },
        media_kind,
        raw: raw.clone(),
    }
}

/// `displayUrl`, else the largest entry of `images`
fn primary_media_url(post: &RawPost) -> Option<String> {
    let from_display = non_empty(&post.display_url).map(str::to_string);
    let from_images = || {
        post.images
            .as_ref()?
            .iter()
            .filter_map(|img| match img {
                Value::String(s) => Some((0, s.clone())),
                Value::Object(obj) => {
                    let url = obj.get("url")?.as_str()?.to_string();
                    let w = obj.get("width").and_then(Value::as_u64).unwrap_or(0);
                    let h = obj.get("height").and_then(Value::as_u64).unwrap_or(0);
                    Some((w.saturating_mul(h), url))
                }
                _ => None,
            })
            // max_by_key keeps the last maximum; reverse so ties favor the first
            .rev()
            .max_by_key(|(area, _)| *area)
            .map(|(_, url)| url)
    };

    from_display
        .or_else(from_images)
        .filter(|u| is_absolute_http(u))
}

fn is_absolute_http(s: &str) -> bool {
    url::Url::parse(s)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
