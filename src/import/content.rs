//! Record content derived from a scraped post

use crate::apify::ResultRecord;
use crate::media::truncate_chars;
use chrono::{DateTime, NaiveDate, Utc};

/// Longest title taken from a caption line
pub const TITLE_MAX_CHARS: usize = 50;

/// Value of the `import_method` metadata field
pub const IMPORT_METHOD: &str = "apify_bulk_import";

/// Derives a record title from the caption
///
/// Uses the first non-empty line that is not made only of hashtags,
/// truncated to [`TITLE_MAX_CHARS`]. Falls back to `@{author} - {date}`.
pub fn derive_title(record: &ResultRecord, today: NaiveDate) -> String {
    record
        .caption
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !is_hashtag_only(line))
        .map(|line| truncate_chars(line, TITLE_MAX_CHARS).trim_end().to_string())
        .unwrap_or_else(|| format!("@{} - {}", record.author, today.format("%Y-%m-%d")))
}

fn is_hashtag_only(line: &str) -> bool {
    line.split_whitespace().all(|word| word.starts_with('#'))
}

/// Caption followed by an engagement footer linking back to the post
pub fn build_body(record: &ResultRecord) -> String {
    let posted = record
        .published_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let mut body = record.caption.clone();
    body.push_str("\n\n---\n");
    body.push_str(&format!(
        "📊 {} likes • {} comments\n",
        record.engagement.likes, record.engagement.comments
    ));
    body.push_str(&format!("📅 Posted: {}\n", posted));
    body.push_str(&format!(
        "🔗 <a href=\"{}\">View on Instagram</a>",
        record.post_url
    ));
    body
}

/// Metadata fields attached to each imported record, in attach order
///
/// `username` is the account the import was requested for, which can
/// differ from the author decoded from the item.
pub fn metadata_fields(
    record: &ResultRecord,
    username: &str,
    imported_at: DateTime<Utc>,
) -> Vec<(&'static str, String)> {
    vec![
        ("instagram_username", username.to_string()),
        ("instagram_shortcode", record.short_code.clone()),
        ("instagram_likes", record.engagement.likes.to_string()),
        ("instagram_comments", record.engagement.comments.to_string()),
        ("instagram_hashtags", record.hashtags.join(",")),
        ("instagram_post_url", record.post_url.clone()),
        ("import_method", IMPORT_METHOD.to_string()),
        ("import_date", imported_at.to_rfc3339()),
    ]
}
