use crate::apify::types::{ActorInput, ProfileInput, TimelineInput, UrlBatchInput};
use crate::cache::CacheKind;
use crate::url::canonical_url_batch;
use serde_json::{json, Value};

/// Stories requested alongside a timeline when stories are enabled
const STORIES_LIMIT: u32 = 10;

/// Canonical account name: trimmed, without a leading `@`, lowercased
pub fn canonical_username(raw: &str) -> String {
    raw.trim().trim_start_matches('@').trim().to_lowercase()
}

/// A normalized scrape request
///
/// Construct through [`ScrapeRequest::user_timeline`],
/// [`ScrapeRequest::url_batch`] or [`ScrapeRequest::profile`] so parameters
/// are canonical; two logically identical requests then compare equal and
/// share a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeRequest {
    UserTimeline {
        username: String,
        limit: u32,
        include_stories: bool,
    },
    UrlBatch {
        urls: Vec<String>,
    },
    Profile {
        username: String,
    },
}

impl ScrapeRequest {
    pub fn user_timeline(username: &str, limit: u32, include_stories: bool) -> Self {
        ScrapeRequest::UserTimeline {
            username: canonical_username(username),
            limit,
            include_stories,
        }
    }

    pub fn url_batch<S: AsRef<str>>(urls: &[S]) -> Self {
        ScrapeRequest::UrlBatch {
            urls: canonical_url_batch(urls),
        }
    }

    pub fn profile(username: &str) -> Self {
        ScrapeRequest::Profile {
            username: canonical_username(username),
        }
    }

    pub fn kind(&self) -> CacheKind {
        match self {
            ScrapeRequest::UserTimeline { .. } => CacheKind::UserPosts,
            ScrapeRequest::UrlBatch { .. } => CacheKind::PostUrls,
            ScrapeRequest::Profile { .. } => CacheKind::Profile,
        }
    }

    /// The account this request is about, if it names one
    pub fn identity(&self) -> Option<&str> {
        match self {
            ScrapeRequest::UserTimeline { username, .. } | ScrapeRequest::Profile { username } => {
                Some(username)
            }
            ScrapeRequest::UrlBatch { .. } => None,
        }
    }

    /// Parameters the cache key is derived from
    pub fn cache_params(&self) -> Value {
        match self {
            ScrapeRequest::UserTimeline {
                username,
                limit,
                include_stories,
            } => json!({
                "username": username,
                "limit": limit,
                "include_stories": include_stories,
            }),
            ScrapeRequest::UrlBatch { urls } => json!({ "urls": urls }),
            ScrapeRequest::Profile { username } => json!({ "username": username }),
        }
    }

    /// Input document for the actor run
    pub fn actor_input(&self) -> ActorInput {
        match self {
            ScrapeRequest::UserTimeline {
                username,
                limit,
                include_stories,
            } => ActorInput::Timeline(TimelineInput {
                usernames: vec![username.clone()],
                results_limit: *limit,
                results_type: "posts",
                search_type: "user",
                add_parent_data: true,
                include_stories: *include_stories,
                stories_limit: if *include_stories { STORIES_LIMIT } else { 0 },
            }),
            ScrapeRequest::UrlBatch { urls } => ActorInput::UrlBatch(UrlBatchInput {
                direct_urls: urls.clone(),
                results_type: "posts",
                search_type: "url",
                add_parent_data: true,
            }),
            ScrapeRequest::Profile { username } => ActorInput::Profile(ProfileInput {
                usernames: vec![username.clone()],
                results_type: "details",
                search_type: "user",
                add_parent_data: true,
            }),
        }
    }
}
