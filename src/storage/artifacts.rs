//! Raw artifact files
//!
//! A fresh 200 response is stored as `{raw}/{id}.html` plus a JSON sidecar
//! `{raw}/{id}.meta.json`. Both are written to a temporary file in the same
//! directory, synced, and renamed into place, so a reader never sees a
//! partially written file at the final path.

use crate::storage::StorageResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Per-fetch metadata written next to the raw HTML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub url: String,
    pub depth: u32,
    pub status: u16,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_hash: String,
    pub fetched_at: String,
}

/// Returns the lowercase hex SHA-256 of a response body
pub fn content_hash(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}

/// Writer for the raw artifact directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Uses `dir` as the raw directory, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the raw HTML for a page
    pub fn html_path(&self, page_id: i64) -> PathBuf {
        self.dir.join(format!("{}.html", page_id))
    }

    /// Path of the metadata sidecar for a page
    pub fn meta_path(&self, page_id: i64) -> PathBuf {
        self.dir.join(format!("{}.meta.json", page_id))
    }

    /// Writes the body, then its sidecar, replacing any previous revision
    pub fn write(&self, page_id: i64, body: &[u8], meta: &ArtifactMeta) -> StorageResult<()> {
        self.write_atomic(&self.html_path(page_id), body)?;
        let json = serde_json::to_vec(meta)?;
        self.write_atomic(&self.meta_path(page_id), &json)?;
        Ok(())
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}
