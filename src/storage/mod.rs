//! Storage module for the import ledger
//!
//! This module keeps local bookkeeping of bulk imports:
//! - SQLite database initialization and schema management
//! - Import run history with counts and outcome
//! - Mapping of source posts to the records created for them, used to skip
//!   posts that were already imported

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteLedger;
pub use traits::{Ledger, LedgerError, LedgerResult};

/// Represents a bulk import run
#[derive(Debug, Clone)]
pub struct ImportRunRecord {
    pub id: i64,
    pub username: String,
    pub config_hash: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub outcome: RunOutcome,
    pub scraped_count: usize,
    pub imported_count: usize,
    pub message: Option<String>,
}

/// Represents an imported post and the record created for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedPost {
    pub short_code: String,
    pub username: String,
    pub post_url: String,
    pub record_id: u64,
    pub title: String,
    pub status: String,
    pub import_method: String,
    pub imported_at: String,
    pub run_id: Option<i64>,
}

/// Outcome of an import run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunOutcome {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
