use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Lifecycle status of a progress session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Starting,
    Running,
    Complete,
    Error,
    Cancelled,
}

impl ProgressStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressStatus::Complete | ProgressStatus::Error | ProgressStatus::Cancelled
        )
    }
}

/// Partial update to a session; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub step: Option<u64>,
    pub message: Option<String>,
    pub details: Option<Map<String, Value>>,
    pub status: Option<ProgressStatus>,
}

impl ProgressUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: u64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn status(mut self, status: ProgressStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Computed view of a session at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub session_id: Uuid,
    pub operation: String,
    pub status: ProgressStatus,
    pub current_step: u64,
    pub total_steps: u64,
    pub percentage: f64,
    pub message: String,
    pub details: Map<String, Value>,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
}

impl ProgressSnapshot {
    /// Equal in everything but elapsed time
    pub fn same_state(&self, other: &ProgressSnapshot) -> bool {
        self.status == other.status
            && self.current_step == other.current_step
            && self.total_steps == other.total_steps
            && self.message == other.message
            && self.details == other.details
    }
}

/// `min(100, 100 * current / total)`, zero for an empty total
pub fn percentage(current: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (100.0 * current as f64 / total as f64).min(100.0)
}

/// One frame of the push stream
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressFrame {
    Connected { session_id: Uuid },
    Progress(ProgressSnapshot),
    Complete(ProgressSnapshot),
    /// Terminal `Error` or `Cancelled` session
    Error(ProgressSnapshot),
}

impl ProgressFrame {
    pub fn snapshot(&self) -> Option<&ProgressSnapshot> {
        match self {
            ProgressFrame::Connected { .. } => None,
            ProgressFrame::Progress(s) | ProgressFrame::Complete(s) | ProgressFrame::Error(s) => {
                Some(s)
            }
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, ProgressFrame::Complete(_) | ProgressFrame::Error(_))
    }
}
