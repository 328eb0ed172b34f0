//! Output module for reporting on the crawl database
//!
//! This module handles:
//! - Recording crawl statistics from the persistent store
//! - Printing them for the `--stats` command

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
