//! SQLite ledger implementation
//!
//! This module provides a SQLite-based implementation of the Ledger trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Ledger, LedgerError, LedgerResult};
use crate::storage::{ImportRunRecord, ImportedPost, RunOutcome};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, username, config_hash, started_at, finished_at, status, \
     scraped_count, imported_count, message";

const POST_COLUMNS: &str = "short_code, username, post_url, record_id, title, status, \
     import_method, imported_at, run_id";

/// SQLite ledger backend
pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    /// Opens or creates the ledger database, creating parent directories
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn open(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory ledger
    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<ImportRunRecord> {
    Ok(ImportRunRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        config_hash: row.get(2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        outcome: RunOutcome::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunOutcome::Running),
        scraped_count: row.get::<_, i64>(6)? as usize,
        imported_count: row.get::<_, i64>(7)? as usize,
        message: row.get(8)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<ImportedPost> {
    Ok(ImportedPost {
        short_code: row.get(0)?,
        username: row.get(1)?,
        post_url: row.get(2)?,
        record_id: row.get::<_, i64>(3)? as u64,
        title: row.get(4)?,
        status: row.get(5)?,
        import_method: row.get(6)?,
        imported_at: row.get(7)?,
        run_id: row.get(8)?,
    })
}

impl Ledger for SqliteLedger {
    // ===== Run Management =====

    fn start_run(&mut self, username: &str, config_hash: &str) -> LedgerResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO import_runs (username, config_hash, started_at, status) VALUES (?1, ?2, ?3, ?4)",
            params![username, config_hash, now, RunOutcome::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        outcome: RunOutcome,
        scraped_count: usize,
        imported_count: usize,
        message: &str,
    ) -> LedgerResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE import_runs SET status = ?1, finished_at = ?2, scraped_count = ?3,
             imported_count = ?4, message = ?5 WHERE id = ?6",
            params![
                outcome.to_db_string(),
                now,
                scraped_count as i64,
                imported_count as i64,
                message,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(LedgerError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> LedgerResult<ImportRunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM import_runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(LedgerError::RunNotFound(run_id))
    }

    fn list_runs(&self, limit: usize) -> LedgerResult<Vec<ImportRunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM import_runs ORDER BY id DESC LIMIT ?1",
            RUN_COLUMNS
        ))?;
        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    // ===== Post Mappings =====

    fn is_imported(&self, short_code: &str) -> LedgerResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM imported_posts WHERE short_code = ?1",
            params![short_code],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn record_import(&mut self, post: &ImportedPost) -> LedgerResult<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO imported_posts ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                POST_COLUMNS
            ),
            params![
                post.short_code,
                post.username,
                post.post_url,
                post.record_id as i64,
                post.title,
                post.status,
                post.import_method,
                post.imported_at,
                post.run_id
            ],
        )?;
        Ok(())
    }

    fn list_imported(&self, username: Option<&str>) -> LedgerResult<Vec<ImportedPost>> {
        let posts = match username {
            Some(username) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM imported_posts WHERE username = ?1 ORDER BY id DESC",
                    POST_COLUMNS
                ))?;
                let rows = stmt.query_map(params![username], post_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM imported_posts ORDER BY id DESC",
                    POST_COLUMNS
                ))?;
                let rows = stmt.query_map([], post_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(posts)
    }

    fn remove_mapping(&mut self, short_code: &str) -> LedgerResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM imported_posts WHERE short_code = ?1",
            params![short_code],
        )?;
        Ok(removed > 0)
    }
}
