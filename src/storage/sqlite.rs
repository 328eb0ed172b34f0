//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CrawlStore trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CrawlStore, StorageError, StorageResult};
use crate::storage::{FetchLogRecord, LinkRecord, PageRecord, UpsertedPage, Validators};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const PAGE_COLUMNS: &str =
    "id, url, first_seen, last_seen, last_status, etag, last_modified, content_hash, depth";

/// Current time as an RFC 3339 UTC timestamp
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// SQLite storage backend
///
/// One instance wraps one connection; workers each open their own.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path`
    ///
    /// The connection runs in WAL mode with a bounded busy timeout so several
    /// workers can write without hard lock failures.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(journal_mode = %mode, "database is not in WAL mode");
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn validators(&self, url: &str) -> StorageResult<Option<UpsertedPage>> {
        let page = self
            .conn
            .query_row(
                "SELECT id, etag, last_modified FROM pages WHERE url = ?1",
                params![url],
                |row| {
                    Ok(UpsertedPage {
                        id: row.get(0)?,
                        validators: Validators {
                            etag: row.get(1)?,
                            last_modified: row.get(2)?,
                        },
                    })
                },
            )
            .optional()?;
        Ok(page)
    }
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        first_seen: row.get(2)?,
        last_seen: row.get(3)?,
        last_status: row.get(4)?,
        etag: row.get(5)?,
        last_modified: row.get(6)?,
        content_hash: row.get(7)?,
        depth: row.get(8)?,
    })
}

impl CrawlStore for SqliteStore {
    // ===== Page Management =====

    fn upsert_page(&mut self, url: &str, depth: u32) -> StorageResult<UpsertedPage> {
        self.conn.execute(
            "INSERT INTO pages (url, first_seen, depth) VALUES (?1, ?2, ?3)
             ON CONFLICT(url) DO NOTHING",
            params![url, now_timestamp(), depth],
        )?;

        self.validators(url)?
            .ok_or_else(|| StorageError::PageNotFound(url.to_string()))
    }

    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord> {
        let sql = format!("SELECT {} FROM pages WHERE id = ?1", PAGE_COLUMNS);
        self.conn
            .query_row(&sql, params![page_id], page_from_row)
            .optional()?
            .ok_or_else(|| StorageError::PageNotFound(format!("Page ID {}", page_id)))
    }

    fn get_page_by_url(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        let sql = format!("SELECT {} FROM pages WHERE url = ?1", PAGE_COLUMNS);
        let page = self
            .conn
            .query_row(&sql, params![url], page_from_row)
            .optional()?;
        Ok(page)
    }

    fn touch_page(&mut self, page_id: i64, status: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE pages SET last_seen = ?1, last_status = ?2 WHERE id = ?3",
            params![now_timestamp(), status, page_id],
        )?;
        Ok(())
    }

    fn record_content(
        &mut self,
        page_id: i64,
        status: i64,
        validators: &Validators,
        content_hash: &str,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE pages
             SET last_seen = ?1, last_status = ?2, etag = ?3, last_modified = ?4, content_hash = ?5
             WHERE id = ?6",
            params![
                now_timestamp(),
                status,
                validators.etag,
                validators.last_modified,
                content_hash,
                page_id
            ],
        )?;
        Ok(())
    }

    // ===== Fetch Log =====

    fn save_fetch_log(
        &mut self,
        page_id: i64,
        status: i64,
        bytes: u64,
        error: Option<&str>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO fetch_log (page_id, fetched_at, status, bytes, error)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![page_id, now_timestamp(), status, bytes as i64, error],
        )?;
        Ok(())
    }

    fn get_fetch_log(&self, page_id: i64) -> StorageResult<Vec<FetchLogRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, page_id, fetched_at, status, bytes, error
             FROM fetch_log WHERE page_id = ?1 ORDER BY id",
        )?;

        let entries = stmt
            .query_map(params![page_id], |row| {
                Ok(FetchLogRecord {
                    id: row.get(0)?,
                    page_id: row.get(1)?,
                    fetched_at: row.get(2)?,
                    status: row.get(3)?,
                    bytes: row.get::<_, i64>(4)?.max(0) as u64,
                    error: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    // ===== Link Management =====

    fn insert_link(&mut self, from_page: i64, to_url: &str, anchor: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO links (from_page, to_url, anchor) VALUES (?1, ?2, ?3)",
            params![from_page, to_url, anchor],
        )?;
        Ok(())
    }

    fn insert_links(&mut self, from_page: i64, links: &[(String, String)]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO links (from_page, to_url, anchor) VALUES (?1, ?2, ?3)",
            )?;
            for (to_url, anchor) in links {
                stmt.execute(params![from_page, to_url, anchor])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_outgoing_links(&self, from_page: i64) -> StorageResult<Vec<LinkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT from_page, to_url, anchor FROM links WHERE from_page = ?1 ORDER BY rowid",
        )?;

        let links = stmt
            .query_map(params![from_page], |row| {
                Ok(LinkRecord {
                    from_page: row.get(0)?,
                    to_url: row.get(1)?,
                    anchor: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(links)
    }

    // ===== Statistics =====

    fn count_pages(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_fetches(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM fetch_log", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_fetches_by_status(&self, status: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM fetch_log WHERE status = ?1",
            params![status],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_stored_fetches(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM fetch_log WHERE status = 200 AND error IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_links(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn get_status_breakdown(&self) -> StorageResult<BTreeMap<Option<i64>, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT last_status, COUNT(*) FROM pages GROUP BY last_status")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, Option<i64>>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut breakdown = BTreeMap::new();
        for row in rows {
            let (status, count) = row?;
            breakdown.insert(status, count as u64);
        }
        Ok(breakdown)
    }

    fn get_depth_breakdown(&self) -> StorageResult<BTreeMap<u32, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT depth, COUNT(*) FROM pages WHERE depth IS NOT NULL GROUP BY depth",
        )?;

        let rows = stmt.query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?)))?;

        let mut breakdown = BTreeMap::new();
        for row in rows {
            let (depth, count) = row?;
            breakdown.insert(depth, count as u64);
        }
        Ok(breakdown)
    }
}
