use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Wrapper for Apify API responses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Run metadata as returned by the runs endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub default_dataset_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

/// Lifecycle status of an actor run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Aborted,
    TimedOut,
}

impl RunStatus {
    /// Maps the remote status string; unrecognized values count as running
    pub fn from_api_str(s: &str) -> Self {
        match s {
            "READY" => RunStatus::Queued,
            "RUNNING" | "ABORTING" | "TIMING-OUT" => RunStatus::Running,
            "SUCCEEDED" => RunStatus::Succeeded,
            "FAILED" => RunStatus::Failed,
            "ABORTED" => RunStatus::Aborted,
            "TIMED-OUT" => RunStatus::TimedOut,
            other => {
                tracing::debug!("Unrecognized run status {:?}, treating as running", other);
                RunStatus::Running
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Aborted | RunStatus::TimedOut
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RunStatus::Failed | RunStatus::Aborted | RunStatus::TimedOut
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Aborted => "aborted",
            RunStatus::TimedOut => "timed-out",
        };
        f.write_str(s)
    }
}

/// Handle for a submitted run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorRun {
    pub run_id: String,
    pub status: RunStatus,
    pub submitted_at: DateTime<Utc>,
}

impl From<RunData> for ActorRun {
    fn from(data: RunData) -> Self {
        Self {
            status: RunStatus::from_api_str(&data.status),
            submitted_at: data.started_at.unwrap_or_else(Utc::now),
            run_id: data.id,
        }
    }
}

/// Account plan and consumption as reported by `/users/me`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUsage {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub plan: Value,
    #[serde(default)]
    pub monthly_usage: Value,
    #[serde(default)]
    pub limits: Value,
}

/// Input for a timeline scrape of one account
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineInput {
    pub usernames: Vec<String>,
    pub results_limit: u32,
    pub results_type: &'static str,
    pub search_type: &'static str,
    pub add_parent_data: bool,
    pub include_stories: bool,
    pub stories_limit: u32,
}

/// Input for scraping an explicit list of post URLs
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlBatchInput {
    pub direct_urls: Vec<String>,
    pub results_type: &'static str,
    pub search_type: &'static str,
    pub add_parent_data: bool,
}

/// Input for a profile details lookup
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    pub usernames: Vec<String>,
    pub results_type: &'static str,
    pub search_type: &'static str,
    pub add_parent_data: bool,
}

/// Actor input payload, serialized as the bare input object
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ActorInput {
    Timeline(TimelineInput),
    UrlBatch(UrlBatchInput),
    Profile(ProfileInput),
}
