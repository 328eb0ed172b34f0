//! Storage traits and error types
//!
//! This module defines the repository interface the crawl engine writes
//! through, and the associated error types.

use crate::storage::{FetchLogRecord, LinkRecord, PageRecord, UpsertedPage, Validators};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Page not found: {0}")]
    PageNotFound(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for crawl state repositories
///
/// Every worker owns one implementation instance. Each call commits on its
/// own; all writes are idempotent or append-only, so a crash between two
/// calls leaves the store consistent.
pub trait CrawlStore {
    // ===== Page Management =====

    /// Inserts a page row for `url` unless one exists
    ///
    /// An existing row keeps its id, depth and validators; a new row gets
    /// `first_seen = now` and empty validators.
    fn upsert_page(&mut self, url: &str, depth: u32) -> StorageResult<UpsertedPage>;

    /// Gets a page by ID
    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord>;

    /// Gets a page by URL
    fn get_page_by_url(&self, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Updates `last_seen` and `last_status` after a fetch attempt
    fn touch_page(&mut self, page_id: i64, status: i64) -> StorageResult<()>;

    /// Stores the validators and content hash of a fresh 200 response
    fn record_content(
        &mut self,
        page_id: i64,
        status: i64,
        validators: &Validators,
        content_hash: &str,
    ) -> StorageResult<()>;

    // ===== Fetch Log =====

    /// Appends a fetch attempt to the audit log
    fn save_fetch_log(
        &mut self,
        page_id: i64,
        status: i64,
        bytes: u64,
        error: Option<&str>,
    ) -> StorageResult<()>;

    /// Gets the fetch log for a page, oldest first
    fn get_fetch_log(&self, page_id: i64) -> StorageResult<Vec<FetchLogRecord>>;

    // ===== Link Management =====

    /// Records an edge unless `(from_page, to_url)` is already present
    fn insert_link(&mut self, from_page: i64, to_url: &str, anchor: &str) -> StorageResult<()>;

    /// Records several edges from one page in a single transaction
    fn insert_links(&mut self, from_page: i64, links: &[(String, String)]) -> StorageResult<()>;

    /// Gets all outgoing edges of a page
    fn get_outgoing_links(&self, from_page: i64) -> StorageResult<Vec<LinkRecord>>;

    // ===== Statistics =====

    /// Gets total page count
    fn count_pages(&self) -> StorageResult<u64>;

    /// Gets total number of fetch attempts
    fn count_fetches(&self) -> StorageResult<u64>;

    /// Counts fetch attempts with the given status
    fn count_fetches_by_status(&self, status: i64) -> StorageResult<u64>;

    /// Counts 200 responses whose body was stored
    ///
    /// Discarded 200s (non-HTML, past the quota) carry a diagnostic and are
    /// excluded.
    fn count_stored_fetches(&self) -> StorageResult<u64>;

    /// Counts the total number of links
    fn count_links(&self) -> StorageResult<u64>;

    /// Gets page count breakdown by last status (`None` = never fetched)
    fn get_status_breakdown(&self) -> StorageResult<BTreeMap<Option<i64>, u64>>;

    /// Gets page count breakdown by discovery depth
    fn get_depth_breakdown(&self) -> StorageResult<BTreeMap<u32, u64>>;
}
