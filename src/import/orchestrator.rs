use crate::apify::{ResultRecord, ScrapeError, ScrapeRequest};
use crate::import::content::{build_body, derive_title, metadata_fields, IMPORT_METHOD};
use crate::import::report::{ImportItem, ImportOutcome, ImportReport, MetadataOutcome};
use crate::media::{MediaOutcome, MediaPublisher};
use crate::progress::{ProgressRegistry, ProgressUpdate};
use crate::scraper::{CachedScraper, FetchOptions};
use crate::storage::{ImportedPost, Ledger, RunOutcome};
use crate::store::{ContentStore, RecordDraft, RecordStatus};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Total progress steps of an import session
pub const TOTAL_STEPS: u64 = 100;

/// Steps reserved for the scraping phase; importing fills the rest
pub const SCRAPE_STEPS: u64 = 10;

/// Shared handle to a ledger
pub type SharedLedger = Arc<Mutex<dyn Ledger + Send>>;

/// Phase of a bulk import run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    Scraping,
    Importing,
    Done,
}

impl ImportPhase {
    fn as_str(&self) -> &'static str {
        match self {
            ImportPhase::Scraping => "scraping",
            ImportPhase::Importing => "importing",
            ImportPhase::Done => "done",
        }
    }
}

/// Options for one bulk import
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub username: String,
    pub limit: u32,
    pub include_stories: bool,
    /// Publish records immediately instead of leaving drafts
    pub publish: bool,
    pub fetch: FetchOptions,
}

impl ImportOptions {
    pub fn new(username: &str, limit: u32) -> Self {
        Self {
            username: username.to_string(),
            limit,
            include_stories: false,
            publish: false,
            fetch: FetchOptions::default(),
        }
    }
}

/// Step value after `done` of `total` items have been processed
fn import_step(done: usize, total: usize) -> u64 {
    if total == 0 {
        return TOTAL_STEPS;
    }
    SCRAPE_STEPS + (TOTAL_STEPS - SCRAPE_STEPS) * done as u64 / total as u64
}

/// Drives scrape-then-import runs for one account at a time
///
/// Items are processed strictly in scrape order, one at a time. A failure
/// in one item is recorded on that item and the run moves on; only a
/// failed scrape fails the whole run.
pub struct BulkImporter {
    scraper: Arc<CachedScraper>,
    store: Arc<dyn ContentStore>,
    media: MediaPublisher,
    progress: ProgressRegistry,
    ledger: Option<SharedLedger>,
    config_hash: String,
}

impl BulkImporter {
    pub fn new(
        scraper: Arc<CachedScraper>,
        store: Arc<dyn ContentStore>,
        media: MediaPublisher,
        progress: ProgressRegistry,
    ) -> Self {
        Self {
            scraper,
            store,
            media,
            progress,
            ledger: None,
            config_hash: String::new(),
        }
    }

    /// Records runs and imported posts in `ledger`, and skips posts it
    /// already lists
    pub fn with_ledger(mut self, ledger: SharedLedger, config_hash: &str) -> Self {
        self.ledger = Some(ledger);
        self.config_hash = config_hash.to_string();
        self
    }

    pub fn progress(&self) -> &ProgressRegistry {
        &self.progress
    }

    /// Opens the progress session an import for `username` reports to
    pub fn start_session(&self, username: &str) -> Uuid {
        self.progress
            .create_session(&format!("Import @{}", username), TOTAL_STEPS)
    }

    /// Opens a session and runs the import to completion
    pub async fn import(&self, options: &ImportOptions) -> ImportReport {
        let session = self.start_session(&options.username);
        self.run(session, options).await
    }

    /// Runs an import reporting to an existing session
    ///
    /// Cancelling the session stops the run at the next item boundary; an
    /// in-flight store call is allowed to finish.
    pub async fn run(&self, session: Uuid, options: &ImportOptions) -> ImportReport {
        let username = crate::apify::canonical_username(&options.username);
        let cancel = self
            .progress
            .cancellation_token(session)
            .unwrap_or_else(|_| CancellationToken::new());

        let mut report = ImportReport {
            session_id: session,
            username: username.clone(),
            success: false,
            cancelled: false,
            scraped_count: 0,
            imported_count: 0,
            message: String::new(),
            items: Vec::new(),
        };

        if username.is_empty() {
            report.message = format!("Invalid username {:?}", options.username);
            tracing::error!("{}", report.message);
            if let Err(e) = self.progress.fail(session, &report.message) {
                tracing::debug!("Could not mark session failed: {}", e);
            }
            return report;
        }

        let run_id = self.ledger_start(&username);

        // Scraping
        self.report_progress(
            session,
            ProgressUpdate::new()
                .step(0)
                .status(crate::progress::ProgressStatus::Running)
                .message(format!("Scraping @{} via Apify...", username))
                .detail("phase", ImportPhase::Scraping.as_str()),
        );

        let request =
            ScrapeRequest::user_timeline(&username, options.limit, options.include_stories);
        let records = match self
            .scraper
            .fetch_posts(&request, options.fetch, &cancel)
            .await
        {
            Ok(records) => records,
            Err(ScrapeError::Cancelled) => {
                report.cancelled = true;
                report.message = format!("Import of @{} cancelled while scraping", username);
                tracing::info!("{}", report.message);
                self.ledger_finish(run_id, RunOutcome::Cancelled, &report);
                return report;
            }
            Err(e) => {
                report.message = format!("Scrape of @{} failed: {}", username, e);
                tracing::error!("{}", report.message);
                if let Err(e) = self.progress.fail(session, &report.message) {
                    tracing::debug!("Could not mark session failed: {}", e);
                }
                self.ledger_finish(run_id, RunOutcome::Failed, &report);
                return report;
            }
        };

        report.success = true;
        report.scraped_count = records.len();

        if records.is_empty() {
            report.message = format!("No posts found for @{}", username);
            self.finish(session, run_id, &mut report);
            return report;
        }

        // Importing
        let total = records.len();
        self.report_progress(
            session,
            ProgressUpdate::new()
                .step(SCRAPE_STEPS)
                .message(format!("Scraped {} posts, importing...", total))
                .detail("phase", ImportPhase::Importing.as_str())
                .detail("scraped", total),
        );

        report.items = records.into_iter().map(ImportItem::new).collect();
        let status = if options.publish {
            RecordStatus::Publish
        } else {
            RecordStatus::Draft
        };

        for index in 0..total {
            if cancel.is_cancelled() || self.progress.is_cancelled(session) {
                report.cancelled = true;
                tracing::info!(
                    "Import of @{} cancelled after {} of {} items",
                    username,
                    index,
                    total
                );
                break;
            }

            let item = &mut report.items[index];
            if self.already_imported(&item.record.short_code) {
                tracing::info!("Skipping {}: already imported", item.record.short_code);
                item.outcome = ImportOutcome::Skipped;
            } else {
                self.import_item(item, &username, status, run_id).await;
            }

            report.imported_count = report.count(ImportOutcome::Imported);
            let failed = report.failed_count();
            self.report_progress(
                session,
                ProgressUpdate::new()
                    .step(import_step(index + 1, total))
                    .message(format!(
                        "Imported {} of {} posts ({} failed)",
                        report.imported_count, total, failed
                    ))
                    .detail("processed", index + 1)
                    .detail("imported", report.imported_count)
                    .detail("failed", failed),
            );
        }

        report.message = if report.cancelled {
            format!(
                "Cancelled after importing {} of {} posts from @{}",
                report.imported_count, report.scraped_count, username
            )
        } else {
            format!(
                "Successfully imported {} of {} posts from @{}",
                report.imported_count, report.scraped_count, username
            )
        };
        self.finish(session, run_id, &mut report);
        report
    }

    /// Runs the pipeline for one item, recording every step on it
    async fn import_item(
        &self,
        item: &mut ImportItem,
        username: &str,
        status: RecordStatus,
        run_id: Option<i64>,
    ) {
        let record = &item.record;

        match self.media.publish(record, self.store.as_ref()).await {
            MediaOutcome::Uploaded(id) => item.media_id = Some(id),
            MediaOutcome::NoMedia => {}
            MediaOutcome::Failed(reason) => item.media_failure = Some(reason),
        }

        let draft = RecordDraft {
            title: derive_title(record, Utc::now().date_naive()),
            body: build_body(record),
            status,
        };

        let record_id = match self.store.create_record(&draft).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Failed to create record for {}: {}", record.short_code, e);
                item.title = Some(draft.title);
                item.outcome = ImportOutcome::Failed;
                item.failure_reason = Some(e.to_string());
                return;
            }
        };

        item.metadata = self.attach_metadata(record, username, record_id).await;

        if let Some(media_id) = item.media_id {
            match self.store.set_primary_media(record_id, media_id).await {
                Ok(()) => item.primary_media_set = true,
                Err(e) => tracing::warn!(
                    "Could not set primary media {} on record {}: {}",
                    media_id,
                    record_id,
                    e
                ),
            }
        }

        tracing::info!(
            "Imported {} as record {} ({})",
            record.short_code,
            record_id,
            status.as_str()
        );
        self.ledger_record(record, username, record_id, &draft.title, status, run_id);

        item.record_id = Some(record_id);
        item.title = Some(draft.title);
        item.outcome = ImportOutcome::Imported;
    }

    /// Attaches every metadata field, collecting a per-field outcome
    async fn attach_metadata(
        &self,
        record: &ResultRecord,
        username: &str,
        record_id: u64,
    ) -> Vec<MetadataOutcome> {
        let mut outcomes = Vec::new();
        for (key, value) in metadata_fields(record, username, Utc::now()) {
            let error = match self.store.set_metadata(record_id, key, &value).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!("Could not add meta field {} to {}: {}", key, record_id, e);
                    Some(e.to_string())
                }
            };
            outcomes.push(MetadataOutcome {
                key: key.to_string(),
                error,
            });
        }
        outcomes
    }

    /// Closes the session and the ledger run for a scrape that succeeded
    fn finish(&self, session: Uuid, run_id: Option<i64>, report: &mut ImportReport) {
        report.imported_count = report.count(ImportOutcome::Imported);

        if report.cancelled {
            self.ledger_finish(run_id, RunOutcome::Cancelled, report);
            return;
        }

        self.report_progress(
            session,
            ProgressUpdate::new().detail("phase", ImportPhase::Done.as_str()),
        );
        if let Err(e) = self.progress.complete(session, Some(&report.message)) {
            tracing::debug!("Could not complete session: {}", e);
        }
        tracing::info!("{}", report.message);
        self.ledger_finish(run_id, RunOutcome::Completed, report);
    }

    fn report_progress(&self, session: Uuid, update: ProgressUpdate) {
        if let Err(e) = self.progress.update(session, update) {
            tracing::debug!("Progress update dropped: {}", e);
        }
    }

    fn already_imported(&self, short_code: &str) -> bool {
        let Some(ledger) = &self.ledger else {
            return false;
        };
        if short_code.is_empty() {
            return false;
        }
        let guard = ledger.lock().unwrap_or_else(|p| p.into_inner());
        match guard.is_imported(short_code) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Ledger lookup failed for {}: {}", short_code, e);
                false
            }
        }
    }

    fn ledger_start(&self, username: &str) -> Option<i64> {
        let ledger = self.ledger.as_ref()?;
        let mut guard = ledger.lock().unwrap_or_else(|p| p.into_inner());
        match guard.start_run(username, &self.config_hash) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Could not record import run start: {}", e);
                None
            }
        }
    }

    fn ledger_finish(&self, run_id: Option<i64>, outcome: RunOutcome, report: &ImportReport) {
        let (Some(ledger), Some(run_id)) = (&self.ledger, run_id) else {
            return;
        };
        let mut guard = ledger.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = guard.finish_run(
            run_id,
            outcome,
            report.scraped_count,
            report.imported_count,
            &report.message,
        ) {
            tracing::warn!("Could not record import run end: {}", e);
        }
    }

    fn ledger_record(
        &self,
        record: &ResultRecord,
        username: &str,
        record_id: u64,
        title: &str,
        status: RecordStatus,
        run_id: Option<i64>,
    ) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        if record.short_code.is_empty() {
            return;
        }
        let post = ImportedPost {
            short_code: record.short_code.clone(),
            username: username.to_string(),
            post_url: record.post_url.clone(),
            record_id,
            title: title.to_string(),
            status: status.as_str().to_string(),
            import_method: IMPORT_METHOD.to_string(),
            imported_at: Utc::now().to_rfc3339(),
            run_id,
        };
        let mut guard = ledger.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = guard.record_import(&post) {
            tracing::warn!("Could not record import of {}: {}", record.short_code, e);
        }
    }
}
