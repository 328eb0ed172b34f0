//! Crawler module for page fetching and processing
//!
//! This module contains the core crawl engine, including:
//! - Conditional HTTP fetching
//! - Category and article link extraction
//! - The shared frontier with quota tracking
//! - Per-host rate limiting
//! - The worker pool that ties them together

mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod rate_limiter;

pub use coordinator::{filter_seeds, CrawlReport, Crawler, QUOTA_REACHED};
pub use extractor::{extract_links, is_category_page, ExtractedLink, PAGINATION_ANCHOR};
pub use fetcher::{
    build_http_client, conditional_get, is_html, FetchOutcome, TRANSPORT_ERROR_STATUS,
};
pub use frontier::{Frontier, FrontierItem, FrontierLease, QuotaClaim};
pub use rate_limiter::RateLimiter;
