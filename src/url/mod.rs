//! URL handling module
//!
//! This module provides the pure URL functions the crawl engine is built on:
//! canonicalization, host keys for per-host bookkeeping, topic scoping and
//! include/exclude pattern policy. None of them perform I/O.

mod canonical;
mod policy;
mod topic;

pub use canonical::{canonicalize, host_key};
pub use policy::{matches_policy, PatternPolicy};
pub use topic::TopicScope;
