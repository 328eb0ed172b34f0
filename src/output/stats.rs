//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::crawler::TRANSPORT_ERROR_STATUS;
use crate::storage::{CrawlStore, StorageResult};
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Total number of page rows
    pub total_pages: u64,

    /// Count of pages by last status (`None` = never fetched)
    pub pages_by_status: BTreeMap<Option<i64>, u64>,

    /// Count of pages by discovery depth
    pub pages_by_depth: BTreeMap<u32, u64>,

    /// Total fetch attempts
    pub total_fetches: u64,

    /// Fetch attempts that returned 200
    pub fetches_ok: u64,

    /// Fetch attempts answered with 304
    pub fetches_not_modified: u64,

    /// Fetch attempts that failed at the transport level
    pub fetches_failed: u64,

    /// Total number of recorded link edges
    pub total_links: u64,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
pub fn load_statistics(storage: &dyn CrawlStore) -> StorageResult<CrawlStatistics> {
    Ok(CrawlStatistics {
        total_pages: storage.count_pages()?,
        pages_by_status: storage.get_status_breakdown()?,
        pages_by_depth: storage.get_depth_breakdown()?,
        total_fetches: storage.count_fetches()?,
        fetches_ok: storage.count_stored_fetches()?,
        fetches_not_modified: storage.count_fetches_by_status(304)?,
        fetches_failed: storage.count_fetches_by_status(TRANSPORT_ERROR_STATUS)?,
        total_links: storage.count_links()?,
    })
}

fn status_label(status: Option<i64>) -> String {
    match status {
        None => "never fetched".to_string(),
        Some(TRANSPORT_ERROR_STATUS) => "transport error".to_string(),
        Some(code) => code.to_string(),
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Total pages: {}", stats.total_pages);
    println!("  Total links: {}", stats.total_links);
    println!();

    println!("Fetch Attempts: {}", stats.total_fetches);
    println!("  200 OK: {}", stats.fetches_ok);
    println!("  304 Not Modified: {}", stats.fetches_not_modified);
    println!("  Transport errors: {}", stats.fetches_failed);
    println!();

    println!("Pages by Last Status:");
    for (status, count) in &stats.pages_by_status {
        let percentage = if stats.total_pages > 0 {
            (*count as f64 / stats.total_pages as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status_label(*status), count, percentage);
    }
    println!();

    println!("Pages by Depth:");
    for (depth, count) in &stats.pages_by_depth {
        println!("  {}: {}", depth, count);
    }
}
