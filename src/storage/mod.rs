//! Storage module for persisting crawl data
//!
//! This module handles all durable state for the crawler, including:
//! - SQLite database initialization and schema management
//! - Page, fetch-log and link-graph persistence
//! - Atomic raw artifact files

mod artifacts;
mod schema;
mod sqlite;
mod traits;

pub use artifacts::{content_hash, ArtifactMeta, ArtifactStore};
pub use sqlite::SqliteStore;
pub use traits::{CrawlStore, StorageError, StorageResult};

use std::path::{Path, PathBuf};

/// Database file name under the data directory
pub const DATABASE_FILE: &str = "wiki.sqlite";

/// Raw artifact directory name under the data directory
pub const RAW_DIR: &str = "raw";

/// HTTP cache validators stored for a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl Validators {
    /// Returns true if no validator is known
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// Identity and validators returned by [`CrawlStore::upsert_page`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertedPage {
    pub id: i64,
    pub validators: Validators,
}

/// Represents a page in the database
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub url: String,
    pub first_seen: Option<String>,
    pub last_seen: Option<String>,
    pub last_status: Option<i64>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_hash: Option<String>,
    pub depth: Option<u32>,
}

/// Represents one fetch attempt
#[derive(Debug, Clone)]
pub struct FetchLogRecord {
    pub id: i64,
    pub page_id: i64,
    pub fetched_at: String,
    pub status: i64,
    pub bytes: u64,
    pub error: Option<String>,
}

/// Represents an observed link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub from_page: i64,
    pub to_url: String,
    pub anchor: Option<String>,
}

/// On-disk layout of the data directory
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/wiki.sqlite`
    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    /// `{root}/raw`
    pub fn raw_dir(&self) -> PathBuf {
        self.root.join(RAW_DIR)
    }

    /// Creates the root and raw directories if they are missing
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.raw_dir())
    }
}
