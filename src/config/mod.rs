//! Configuration module for the crawler
//!
//! This module handles loading, parsing, and validating the TOML crawl policy.
//!
//! # Example
//!
//! ```no_run
//! use anjso_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("whitelist.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.limits.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FetchConfig, LimitsConfig, RateLimitConfig, TopicConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
