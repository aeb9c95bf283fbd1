use crate::apify::error::{ScrapeError, ScrapeResult};
use crate::apify::normalize::{find_profile, normalize_items, ProfileRecord, ResultRecord};
use crate::apify::request::ScrapeRequest;
use crate::apify::types::{AccountUsage, ActorRun, ApiResponse, RunData, RunStatus};
use crate::config::ApifyConfig;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Client for the Apify v2 actor-run API
///
/// A scrape is three calls: submit a run, poll its status on a fixed
/// interval until it is terminal, then fetch the run's dataset.
pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
    actor_id: String,
    poll_interval: Duration,
    poll_budget: Duration,
}

impl ApifyClient {
    /// Creates a client from configuration
    ///
    /// Every HTTP call made by the client is bounded by
    /// `request-timeout-secs`.
    pub fn new(config: &ApifyConfig) -> ScrapeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("instapress/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            token: config.api_token.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            actor_id: config.actor_id.clone(),
            poll_interval: config.poll_interval(),
            poll_budget: config.poll_budget(),
        })
    }

    /// Default wall-clock budget for [`ApifyClient::await_completion`]
    pub fn poll_budget(&self) -> Duration {
        self.poll_budget
    }

    /// Starts an actor run for `request`
    ///
    /// Any failure, including a non-success HTTP status, is reported as
    /// [`ScrapeError::SubmissionFailed`]. Nothing is retried.
    pub async fn submit(&self, request: &ScrapeRequest) -> ScrapeResult<ActorRun> {
        let url = format!("{}/acts/{}/runs", self.base_url, self.actor_id);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&request.actor_input())
            .send()
            .await
            .map_err(|e| ScrapeError::SubmissionFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScrapeError::SubmissionFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let api_resp: ApiResponse<RunData> = resp
            .json()
            .await
            .map_err(|e| ScrapeError::SubmissionFailed(format!("unreadable response: {}", e)))?;

        let run = ActorRun::from(api_resp.data);
        tracing::info!(run_id = %run.run_id, kind = %request.kind(), "Apify run started");
        Ok(run)
    }

    /// Fetches the current status and status message of a run
    pub async fn run_status(&self, run_id: &str) -> ScrapeResult<(RunStatus, Option<String>)> {
        let url = format!("{}/actor-runs/{}", self.base_url, run_id);
        let api_resp: ApiResponse<RunData> = self.get_json(&url).await?;
        Ok((
            RunStatus::from_api_str(&api_resp.data.status),
            api_resp.data.status_message,
        ))
    }

    /// Polls a run until it finishes, then returns its dataset items
    ///
    /// # Arguments
    ///
    /// * `run_id` - Run to wait for
    /// * `budget` - Hard wall-clock deadline covering the polls and the
    ///   dataset fetch
    /// * `cancel` - Interrupts the wait between polls
    ///
    /// # Returns
    ///
    /// The raw dataset items on success. A failed, aborted or timed-out run
    /// yields [`ScrapeError::JobFailed`]; exceeding `budget` yields
    /// [`ScrapeError::PollTimeout`] and no items.
    pub async fn await_completion(
        &self,
        run_id: &str,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> ScrapeResult<Vec<Value>> {
        let poll = async {
            loop {
                if cancel.is_cancelled() {
                    return Err(ScrapeError::Cancelled);
                }

                let (status, message) = self.run_status(run_id).await?;
                tracing::debug!(run_id, %status, "Polled Apify run");

                if status == RunStatus::Succeeded {
                    return self.dataset_items(run_id).await;
                }
                if status.is_failure() {
                    let message = message.unwrap_or_else(|| "Unknown error".to_string());
                    tracing::error!(run_id, %status, "Apify run failed: {}", message);
                    return Err(ScrapeError::JobFailed { status, message });
                }

                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                }
            }
        };

        match tokio::time::timeout(budget, poll).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(run_id, "Apify run exceeded poll budget of {:?}", budget);
                Err(ScrapeError::PollTimeout {
                    run_id: run_id.to_string(),
                    budget,
                })
            }
        }
    }

    /// Fetches the dataset items of a finished run
    pub async fn dataset_items(&self, run_id: &str) -> ScrapeResult<Vec<Value>> {
        let url = format!(
            "{}/actor-runs/{}/dataset/items?format=json",
            self.base_url, run_id
        );
        let items: Vec<Value> = self.get_json(&url).await?;
        tracing::info!(run_id, count = items.len(), "Fetched dataset items");
        Ok(items)
    }

    /// Submits, waits within the configured budget, and returns raw items
    pub async fn run(
        &self,
        request: &ScrapeRequest,
        cancel: &CancellationToken,
    ) -> ScrapeResult<Vec<Value>> {
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }
        let run = self.submit(request).await?;
        self.await_completion(&run.run_id, self.poll_budget, cancel)
            .await
    }

    /// Runs a timeline or URL-batch scrape and normalizes the results
    pub async fn scrape_posts(
        &self,
        request: &ScrapeRequest,
        cancel: &CancellationToken,
    ) -> ScrapeResult<Vec<ResultRecord>> {
        let items = self.run(request, cancel).await?;
        let records = normalize_items(&items, request.identity());
        tracing::info!(
            "Normalized {} of {} scraped items ({})",
            records.len(),
            items.len(),
            request.kind()
        );
        Ok(records)
    }

    /// Looks up profile details for one account
    ///
    /// Returns `Ok(None)` if the run succeeded but returned no matching
    /// profile.
    pub async fn scrape_profile(
        &self,
        username: &str,
        cancel: &CancellationToken,
    ) -> ScrapeResult<Option<ProfileRecord>> {
        let request = ScrapeRequest::profile(username);
        let Some(identity) = request.identity().map(str::to_string) else {
            return Ok(None);
        };

        let items = self.run(&request, cancel).await?;
        let profile = find_profile(&items, &identity);
        if profile.is_none() {
            tracing::warn!("Profile not found for @{}", identity);
        }
        Ok(profile)
    }

    /// Reports plan, monthly usage and limits of the token's account
    pub async fn account_usage(&self) -> ScrapeResult<AccountUsage> {
        let url = format!("{}/users/me", self.base_url);
        let api_resp: ApiResponse<AccountUsage> = self.get_json(&url).await?;
        Ok(api_resp.data)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ScrapeResult<T> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScrapeError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
