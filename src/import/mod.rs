//! Bulk import of scraped posts into the content store
//!
//! This module handles:
//! - Scraping an account through the cached scraper
//! - Creating one record per post with media, metadata and a primary image
//! - Reporting progress for the whole run and an outcome per item

mod content;
mod orchestrator;
mod report;

pub use content::{build_body, derive_title, metadata_fields, IMPORT_METHOD, TITLE_MAX_CHARS};
pub use orchestrator::{
    BulkImporter, ImportOptions, ImportPhase, SharedLedger, SCRAPE_STEPS, TOTAL_STEPS,
};
pub use report::{ImportItem, ImportOutcome, ImportReport, MetadataOutcome};
