//! Database schema definitions
//!
//! This module contains the SQL schema for the import ledger database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track bulk import runs
CREATE TABLE IF NOT EXISTS import_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL,
    scraped_count INTEGER NOT NULL DEFAULT 0,
    imported_count INTEGER NOT NULL DEFAULT 0,
    message TEXT
);

CREATE INDEX IF NOT EXISTS idx_import_runs_username ON import_runs(username);

-- Map source posts to the records created for them
CREATE TABLE IF NOT EXISTS imported_posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    short_code TEXT NOT NULL UNIQUE,
    username TEXT NOT NULL,
    post_url TEXT NOT NULL,
    record_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    status TEXT NOT NULL,
    import_method TEXT NOT NULL,
    imported_at TEXT NOT NULL,
    run_id INTEGER REFERENCES import_runs(id)
);

CREATE INDEX IF NOT EXISTS idx_imported_posts_username ON imported_posts(username);
CREATE INDEX IF NOT EXISTS idx_imported_posts_record ON imported_posts(record_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
