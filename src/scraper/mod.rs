//! Cache-fronted scraping
//!
//! [`CachedScraper`] answers scrape requests from the result cache when it
//! can and runs the actor otherwise, writing successful non-empty results
//! back so the next identical request is free.

use crate::apify::{ApifyClient, ProfileRecord, ResultRecord, ScrapeRequest, ScrapeResult};
use crate::cache::ResultCache;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Options for one cached fetch
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Read the cache before scraping; writes happen either way
    pub use_cache: bool,

    /// TTL applied to this read and to the entry written on a miss
    pub ttl_override: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            ttl_override: None,
        }
    }
}

impl FetchOptions {
    /// Skips the cache read; a successful scrape still refreshes the entry
    pub fn refresh() -> Self {
        Self {
            use_cache: false,
            ttl_override: None,
        }
    }
}

/// Scraper that memoizes actor results in a [`ResultCache`]
pub struct CachedScraper {
    client: Arc<ApifyClient>,
    cache: Arc<ResultCache>,
}

impl CachedScraper {
    pub fn new(client: Arc<ApifyClient>, cache: Arc<ResultCache>) -> Self {
        Self { client, cache }
    }

    pub fn client(&self) -> &ApifyClient {
        &self.client
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Fetches posts for a timeline or URL-batch request
    ///
    /// Failed and empty scrapes are never cached.
    pub async fn fetch_posts(
        &self,
        request: &ScrapeRequest,
        options: FetchOptions,
        cancel: &CancellationToken,
    ) -> ScrapeResult<Vec<ResultRecord>> {
        let kind = request.kind();
        let params = request.cache_params();

        if options.use_cache {
            if let Some(records) =
                self.cache
                    .get::<Vec<ResultRecord>>(kind, &params, options.ttl_override)
            {
                tracing::info!("Using cached {} results ({} records)", kind, records.len());
                return Ok(records);
            }
        }

        let records = self.client.scrape_posts(request, cancel).await?;

        if records.is_empty() {
            tracing::info!("Scrape returned no records; not caching");
        } else {
            self.cache
                .set(kind, &params, &records, options.ttl_override);
        }

        Ok(records)
    }

    /// Fetches profile details for one account
    ///
    /// A run that finds no matching profile returns `Ok(None)` and is not
    /// cached.
    pub async fn fetch_profile(
        &self,
        username: &str,
        options: FetchOptions,
        cancel: &CancellationToken,
    ) -> ScrapeResult<Option<ProfileRecord>> {
        let request = ScrapeRequest::profile(username);
        let kind = request.kind();
        let params = request.cache_params();

        if options.use_cache {
            if let Some(profile) =
                self.cache
                    .get::<ProfileRecord>(kind, &params, options.ttl_override)
            {
                tracing::info!("Using cached profile for @{}", profile.username);
                return Ok(Some(profile));
            }
        }

        let profile = self.client.scrape_profile(username, cancel).await?;
        if let Some(profile) = &profile {
            self.cache.set(kind, &params, profile, options.ttl_override);
        }
        Ok(profile)
    }
}
