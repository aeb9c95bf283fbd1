//! Ledger trait and error types

use crate::storage::{ImportRunRecord, ImportedPost, RunOutcome};
use thiserror::Error;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Import run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Local bookkeeping of import runs and of which source posts were imported
pub trait Ledger {
    // ===== Run Management =====

    /// Records the start of an import run
    ///
    /// # Arguments
    ///
    /// * `username` - Account being imported
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn start_run(&mut self, username: &str, config_hash: &str) -> LedgerResult<i64>;

    /// Records the end of an import run with its counts
    fn finish_run(
        &mut self,
        run_id: i64,
        outcome: RunOutcome,
        scraped_count: usize,
        imported_count: usize,
        message: &str,
    ) -> LedgerResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> LedgerResult<ImportRunRecord>;

    /// Most recent runs first
    fn list_runs(&self, limit: usize) -> LedgerResult<Vec<ImportRunRecord>>;

    // ===== Post Mappings =====

    /// Whether a post with this short code was already imported
    fn is_imported(&self, short_code: &str) -> LedgerResult<bool>;

    /// Records a successful import, replacing any previous mapping
    fn record_import(&mut self, post: &ImportedPost) -> LedgerResult<()>;

    /// Imported posts, newest first, optionally for one account
    fn list_imported(&self, username: Option<&str>) -> LedgerResult<Vec<ImportedPost>>;

    /// Forgets a mapping so the post can be imported again
    fn remove_mapping(&mut self, short_code: &str) -> LedgerResult<bool>;
}
