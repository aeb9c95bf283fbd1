use crate::apify::ResultRecord;
use serde::Serialize;
use uuid::Uuid;

/// Outcome of one record's import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportOutcome {
    /// Not reached; the run stopped before this item
    Pending,
    Imported,
    /// Already imported by an earlier run
    Skipped,
    Failed,
}

/// Result of attaching one metadata field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataOutcome {
    pub key: String,
    pub error: Option<String>,
}

impl MetadataOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-record state of a bulk import
#[derive(Debug, Clone, Serialize)]
pub struct ImportItem {
    pub record: ResultRecord,
    pub title: Option<String>,
    pub media_id: Option<u64>,
    /// Why the media step produced no handle, if it was attempted
    pub media_failure: Option<String>,
    pub primary_media_set: bool,
    pub record_id: Option<u64>,
    pub outcome: ImportOutcome,
    pub failure_reason: Option<String>,
    pub metadata: Vec<MetadataOutcome>,
}

impl ImportItem {
    pub fn new(record: ResultRecord) -> Self {
        Self {
            record,
            title: None,
            media_id: None,
            media_failure: None,
            primary_media_set: false,
            record_id: None,
            outcome: ImportOutcome::Pending,
            failure_reason: None,
            metadata: Vec::new(),
        }
    }

    pub fn metadata_failures(&self) -> usize {
        self.metadata.iter().filter(|m| !m.is_ok()).count()
    }
}

/// Aggregate result of one bulk import run
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub session_id: Uuid,
    pub username: String,
    /// False only when the scrape itself failed
    pub success: bool,
    pub cancelled: bool,
    pub scraped_count: usize,
    pub imported_count: usize,
    pub message: String,
    pub items: Vec<ImportItem>,
}

impl ImportReport {
    pub fn count(&self, outcome: ImportOutcome) -> usize {
        self.items.iter().filter(|i| i.outcome == outcome).count()
    }

    pub fn failed_count(&self) -> usize {
        self.count(ImportOutcome::Failed)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(ImportOutcome::Skipped)
    }
}
