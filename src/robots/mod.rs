//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! The crawl engine only sees the [`RobotsPolicy`] trait.

mod cache;
mod parser;

pub use cache::{fetch_robots, HostRobots, RobotsCache};
pub use parser::ParsedRobots;

use async_trait::async_trait;
use url::Url;

/// Decides whether a URL may be fetched
#[async_trait]
pub trait RobotsPolicy: Send + Sync {
    /// Returns true if the URL may be fetched
    async fn can_fetch(&self, url: &Url) -> bool;
}

/// Policy used when robots.txt is not respected
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl RobotsPolicy for AllowAll {
    async fn can_fetch(&self, _url: &Url) -> bool {
        true
    }
}
