use crate::apify::RunStatus;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while running a scrape on the external job runner
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The run could not be started at all
    #[error("Failed to submit actor run: {0}")]
    SubmissionFailed(String),

    /// The run reached a terminal failure status
    #[error("Actor run {status}: {message}")]
    JobFailed { status: RunStatus, message: String },

    /// The run did not reach a terminal status within the caller's budget
    #[error("Actor run {run_id} did not finish within {}s", budget.as_secs())]
    PollTimeout { run_id: String, budget: Duration },

    /// The owning progress session was cancelled while waiting
    #[error("Scrape cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        ScrapeError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(err: serde_json::Error) -> Self {
        ScrapeError::Parse(err.to_string())
    }
}

pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;
