//! Output module for printing reports to the terminal
//!
//! This module handles:
//! - Import run reports with per-item outcomes
//! - Cache statistics
//! - Ledger listings of runs and imported posts

pub mod stats;

pub use stats::{
    print_cache_stats, print_import_report, print_imported_posts, print_profile, print_records,
    print_runs, OutcomeSummary,
};
