//! External scrape job runner
//!
//! Submits Instagram scrape runs to an Apify actor, waits for them to finish
//! under a wall-clock budget, and normalizes the heterogeneous dataset items
//! into [`ResultRecord`]s.

mod client;
mod error;
mod normalize;
mod request;
mod types;

pub use client::ApifyClient;
pub use error::{ScrapeError, ScrapeResult};
pub use normalize::{
    extract_hashtags, find_profile, normalize_items, Engagement, MediaKind, ProfileRecord,
    RawItem, RawPost, ResultRecord,
};
pub use request::{canonical_username, ScrapeRequest};
pub use types::{AccountUsage, ActorInput, ActorRun, RunStatus};
