//! Terminal reports for imports, cache contents and the ledger
//!
//! Everything here prints to stdout; logging goes through `tracing`.

use crate::apify::{ProfileRecord, ResultRecord};
use crate::cache::CacheStats;
use crate::import::{ImportOutcome, ImportReport};
use crate::media::truncate_chars;
use crate::storage::{ImportRunRecord, ImportedPost};

/// Item counts of an import report by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeSummary {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    pub pending: usize,
    /// Imported items whose media step produced no handle
    pub media_failures: usize,
    /// Metadata fields that could not be attached, across all items
    pub metadata_failures: usize,
}

impl OutcomeSummary {
    pub fn from_report(report: &ImportReport) -> Self {
        let mut summary = Self::default();
        for item in &report.items {
            match item.outcome {
                ImportOutcome::Imported => summary.imported += 1,
                ImportOutcome::Skipped => summary.skipped += 1,
                ImportOutcome::Failed => summary.failed += 1,
                ImportOutcome::Pending => summary.pending += 1,
            }
            if item.media_failure.is_some() {
                summary.media_failures += 1;
            }
            summary.metadata_failures += item.metadata_failures();
        }
        summary
    }
}

/// Prints an import report
///
/// # Arguments
///
/// * `report` - The finished import
/// * `verbose` - Also list every item with its outcome
pub fn print_import_report(report: &ImportReport, verbose: bool) {
    println!("=== Import Report: @{} ===\n", report.username);

    let summary = OutcomeSummary::from_report(report);
    let state = if report.cancelled {
        "cancelled"
    } else if report.success {
        "succeeded"
    } else {
        "failed"
    };

    println!("Overview:");
    println!("  Session: {}", report.session_id);
    println!("  Result: {}", state);
    println!("  Posts scraped: {}", report.scraped_count);
    println!("  Posts imported: {}", report.imported_count);
    println!("  Skipped (already imported): {}", summary.skipped);
    println!("  Failed: {}", summary.failed);
    if summary.pending > 0 {
        println!("  Not reached: {}", summary.pending);
    }
    println!();

    if summary.media_failures > 0 || summary.metadata_failures > 0 {
        println!("Warnings:");
        println!("  Media not uploaded: {}", summary.media_failures);
        println!("  Metadata fields not attached: {}", summary.metadata_failures);
        println!();
    }

    let failures: Vec<_> = report
        .items
        .iter()
        .filter(|i| i.outcome == ImportOutcome::Failed)
        .collect();
    if !failures.is_empty() {
        println!("Failures ({}):", failures.len());
        for item in failures {
            println!(
                "  - {}: {}",
                item.record.post_url,
                item.failure_reason.as_deref().unwrap_or("unknown error")
            );
        }
        println!();
    }

    if verbose && !report.items.is_empty() {
        println!("Items:");
        for (i, item) in report.items.iter().enumerate() {
            let record_id = item
                .record_id
                .map(|id| format!("#{}", id))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:>3}. {:?} {} {}",
                i + 1,
                item.outcome,
                record_id,
                item.title.as_deref().unwrap_or(&item.record.short_code)
            );
        }
        println!();
    }

    println!("{}", report.message);
}

/// Prints cache usage per kind
pub fn print_cache_stats(stats: &CacheStats) {
    println!("=== Cache Statistics ===\n");

    println!("Overview:");
    println!("  Entries: {}", stats.total_files);
    println!("  Size: {:.2} MB", stats.total_size_mb());
    println!("  Expired: {}", stats.total_expired());
    if let Some(oldest) = stats.oldest_entry {
        println!("  Oldest entry: {}", oldest.to_rfc3339());
    }
    if let Some(newest) = stats.newest_entry {
        println!("  Newest entry: {}", newest.to_rfc3339());
    }
    println!();

    println!("By Kind:");
    for (kind, k) in &stats.by_kind {
        println!(
            "  {}: {} entries, {} bytes, {} expired",
            kind, k.files, k.size_bytes, k.expired
        );
    }
}

/// Prints normalized posts one per line
pub fn print_records(records: &[ResultRecord]) {
    println!("=== {} posts ===\n", records.len());
    for record in records {
        let caption = record.caption.lines().next().unwrap_or("");
        println!(
            "  {} @{} ({} likes, {} comments) {}",
            record.short_code,
            record.author,
            record.engagement.likes,
            record.engagement.comments,
            truncate_chars(caption, 60)
        );
    }
}

pub fn print_profile(profile: &ProfileRecord) {
    println!("=== @{} ===\n", profile.username);
    if let Some(name) = &profile.full_name {
        println!("  Name: {}", name);
    }
    if let Some(bio) = &profile.biography {
        println!("  Bio: {}", bio.replace('\n', " "));
    }
    let count = |n: Option<i64>| n.map(|n| n.to_string()).unwrap_or_else(|| "?".into());
    println!("  Followers: {}", count(profile.followers_count));
    println!("  Following: {}", count(profile.following_count));
    println!("  Posts: {}", count(profile.posts_count));
    println!("  Verified: {}", profile.is_verified);
    println!("  Private: {}", profile.is_private);
}

/// Prints import runs, newest first
pub fn print_runs(runs: &[ImportRunRecord]) {
    println!("=== Import Runs ({}) ===\n", runs.len());
    for run in runs {
        println!(
            "  #{} @{} {} scraped={} imported={} started={}",
            run.id,
            run.username,
            run.outcome.to_db_string(),
            run.scraped_count,
            run.imported_count,
            run.started_at
        );
        if let Some(message) = &run.message {
            println!("      {}", message);
        }
    }
}

/// Prints ledger mappings from source posts to records
pub fn print_imported_posts(posts: &[ImportedPost]) {
    println!("=== Imported Posts ({}) ===\n", posts.len());
    for post in posts {
        println!(
            "  {} -> record {} [{}] {}",
            post.short_code, post.record_id, post.status, post.title
        );
    }
}
