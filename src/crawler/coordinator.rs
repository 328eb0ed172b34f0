//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the worker pool that drains the frontier. Each
//! worker owns its own database connection and, per item:
//! 1. Checks robots.txt
//! 2. Upserts the page row and reads its validators
//! 3. Waits for the host's rate-limit slot
//! 4. Issues a conditional GET
//! 5. Persists the outcome (fetch log, page row, raw artifact)
//! 6. Extracts links and re-seeds the frontier while depth and quota allow
//!
//! Errors are contained per item; only startup failures abort a run.

use crate::config::Config;
use crate::crawler::extractor::extract_links;
use crate::crawler::fetcher::{
    build_http_client, conditional_get, FetchOutcome, TRANSPORT_ERROR_STATUS,
};
use crate::crawler::frontier::{Frontier, FrontierItem};
use crate::crawler::rate_limiter::RateLimiter;
use crate::robots::{AllowAll, RobotsCache, RobotsPolicy};
use crate::storage::{
    content_hash, ArtifactMeta, ArtifactStore, CrawlStore, DataLayout, SqliteStore,
    UpsertedPage, Validators,
};
use crate::url::{canonicalize, host_key, PatternPolicy, TopicScope};
use crate::{CrawlError, UrlError};
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Fetch-log diagnostic for a 200 that arrived after the quota was spent
pub const QUOTA_REACHED: &str = "quota reached";

/// Successful fetches between two progress lines
const PROGRESS_INTERVAL: u64 = 25;

/// Summary of a finished crawl run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    /// Seeds that entered the frontier
    pub seeded: usize,
    /// Successful 200-path fetches
    pub fetched: u64,
    /// Distinct URLs handed to workers
    pub visited: usize,
    /// Queued items dropped after the quota was reached
    pub discarded: u64,
    /// True if the page budget was exhausted
    pub quota_reached: bool,
    /// True if the run was cancelled before the frontier drained
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Everything a worker needs, shared read-only across the pool
struct CrawlContext {
    config: Config,
    client: Client,
    robots: Arc<dyn RobotsPolicy>,
    limiter: RateLimiter,
    scope: TopicScope,
    policy: PatternPolicy,
    artifacts: ArtifactStore,
}

/// Main crawler structure
pub struct Crawler {
    ctx: Arc<CrawlContext>,
    layout: DataLayout,
}

impl Crawler {
    /// Creates a crawler for `config`, storing its output under `layout`
    ///
    /// Creates the data directories and opens the database once so an
    /// unusable store fails here rather than inside the workers.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the data directory
    /// cannot be created, the database cannot be opened or the HTTP client
    /// cannot be built.
    pub fn new(config: Config, layout: DataLayout) -> Result<Self, CrawlError> {
        crate::config::validate(&config)?;

        layout.ensure()?;
        SqliteStore::open(&layout.database_path())?;

        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.fetch.request_timeout_secs),
        )?;

        let robots: Arc<dyn RobotsPolicy> = if config.respect_robots {
            Arc::new(RobotsCache::new(
                client.clone(),
                Duration::from_secs(config.fetch.robots_timeout_secs),
            ))
        } else {
            Arc::new(AllowAll)
        };

        let ctx = CrawlContext {
            limiter: RateLimiter::new(config.rate_limit.per_host_rps),
            scope: TopicScope::from_config(&config.topic)?,
            policy: PatternPolicy::new(&config.include_patterns, &config.exclude_patterns)?,
            artifacts: ArtifactStore::new(layout.raw_dir())?,
            client,
            robots,
            config,
        };

        Ok(Self {
            ctx: Arc::new(ctx),
            layout,
        })
    }

    /// The effective configuration
    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    /// Canonicalized seeds that pass the include/exclude policy, in order
    pub fn seed_urls(&self) -> Vec<String> {
        filter_seeds(&self.ctx.config.seeds, &self.ctx.policy)
    }

    /// Runs the crawl until the frontier drains, the quota is reached, or
    /// `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) -> Result<CrawlReport, CrawlError> {
        let config = &self.ctx.config;
        let start = Instant::now();

        tracing::info!(
            max_pages = config.limits.max_pages,
            max_depth = config.limits.max_depth,
            workers = config.rate_limit.max_parallel,
            per_host_rps = config.rate_limit.per_host_rps,
            robots = config.respect_robots,
            "crawl policy"
        );

        let frontier = Arc::new(Frontier::new(config.limits.max_pages));
        let seeded = frontier.seed(self.seed_urls());
        tracing::info!(enqueued = seeded, "seeded frontier");

        let mut workers = JoinSet::new();
        for worker_id in 0..config.rate_limit.max_parallel {
            let store = SqliteStore::open(&self.layout.database_path())?;
            workers.spawn(run_worker(
                worker_id,
                Arc::clone(&self.ctx),
                Arc::clone(&frontier),
                store,
                cancel.clone(),
            ));
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "worker task failed");
            }
        }

        let report = CrawlReport {
            seeded,
            fetched: frontier.fetched(),
            visited: frontier.seen_count(),
            discarded: frontier.discarded(),
            quota_reached: frontier.is_stopped(),
            cancelled: cancel.is_cancelled(),
            elapsed: start.elapsed(),
        };

        tracing::info!(
            fetched = report.fetched,
            visited = report.visited,
            discarded = report.discarded,
            raw_dir = %self.layout.raw_dir().display(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "done"
        );

        Ok(report)
    }
}

/// Canonicalizes seeds and keeps those the policy allows, dropping duplicates
pub fn filter_seeds(seeds: &[String], policy: &PatternPolicy) -> Vec<String> {
    let mut accepted = Vec::new();
    for seed in seeds {
        match canonicalize(seed) {
            Some(url) if policy.matches(&url) => {
                if !accepted.contains(&url) {
                    accepted.push(url);
                }
            }
            _ => tracing::info!(seed = %seed, "seed-skip"),
        }
    }
    accepted
}

async fn run_worker<S: CrawlStore + Send>(
    worker_id: usize,
    ctx: Arc<CrawlContext>,
    frontier: Arc<Frontier>,
    mut store: S,
    cancel: CancellationToken,
) {
    let mut processed = 0u64;
    while let Some(lease) = frontier.next(&cancel).await {
        process_item(&ctx, &frontier, &mut store, &lease).await;
        processed += 1;
    }
    tracing::debug!(worker = worker_id, processed, "worker finished");
}

/// Processes one frontier item; never returns an error
async fn process_item<S: CrawlStore>(
    ctx: &CrawlContext,
    frontier: &Frontier,
    store: &mut S,
    item: &FrontierItem,
) {
    let url = match Url::parse(&item.url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(url = %item.url, error = %e, "unparseable frontier url");
            return;
        }
    };

    if !ctx.robots.can_fetch(&url).await {
        tracing::info!(url = %item.url, "skip: robots disallow");
        return;
    }

    let page = match store.upsert_page(&item.url, item.depth) {
        Ok(page) => page,
        Err(e) => {
            tracing::error!(url = %item.url, error = %e, "page upsert failed");
            return;
        }
    };

    if let Err(e) = fetch_page(ctx, frontier, store, item, &url, &page).await {
        tracing::error!(page_id = page.id, url = %item.url, error = %e, "item failed");
        if let Err(log_err) =
            store.save_fetch_log(page.id, TRANSPORT_ERROR_STATUS, 0, Some(&e.to_string()))
        {
            tracing::debug!(page_id = page.id, error = %log_err, "could not record failure");
        }
    }
}

async fn fetch_page<S: CrawlStore>(
    ctx: &CrawlContext,
    frontier: &Frontier,
    store: &mut S,
    item: &FrontierItem,
    url: &Url,
    page: &UpsertedPage,
) -> Result<(), CrawlError> {
    let host = host_key(url).ok_or(UrlError::MissingHost)?;
    ctx.limiter.wait(&host).await;

    let outcome = conditional_get(&ctx.client, url.as_str(), &page.validators).await;
    let status = outcome.status();

    match outcome {
        FetchOutcome::NotModified => {
            store.save_fetch_log(page.id, status, 0, None)?;
            store.touch_page(page.id, status)?;
            tracing::info!(page_id = page.id, url = %item.url, "not-modified");
        }

        FetchOutcome::Rejected { content_type, .. } => {
            let diagnostic = format!("ctype={}", content_type.to_lowercase());
            store.save_fetch_log(page.id, status, 0, Some(&diagnostic))?;
            store.touch_page(page.id, status)?;
            tracing::info!(
                page_id = page.id,
                status,
                content_type = %content_type,
                url = %item.url,
                "skip: not an html 200"
            );
        }

        FetchOutcome::TransportError { error } => {
            store.save_fetch_log(page.id, status, 0, Some(&error))?;
            store.touch_page(page.id, status)?;
            tracing::warn!(page_id = page.id, url = %item.url, error = %error, "fetch failed");
        }

        FetchOutcome::Fetched {
            etag,
            last_modified,
            body,
            ..
        } => {
            let Some(claim) = frontier.claim_quota() else {
                store.save_fetch_log(page.id, status, 0, Some(QUOTA_REACHED))?;
                store.touch_page(page.id, status)?;
                tracing::debug!(
                    page_id = page.id,
                    url = %item.url,
                    "quota reached; response discarded"
                );
                return Ok(());
            };

            let validators = Validators {
                etag,
                last_modified,
            };
            let hash = content_hash(&body);
            let meta = ArtifactMeta {
                url: item.url.clone(),
                depth: item.depth,
                status: status as u16,
                etag: validators.etag.clone(),
                last_modified: validators.last_modified.clone(),
                content_hash: hash.clone(),
                fetched_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            };

            ctx.artifacts.write(page.id, &body, &meta)?;
            store.record_content(page.id, status, &validators, &hash)?;
            let count = claim.commit();
            store.save_fetch_log(page.id, status, body.len() as u64, None)?;

            tracing::info!(
                page_id = page.id,
                bytes = body.len(),
                depth = item.depth,
                url = %item.url,
                "ok"
            );

            if count % PROGRESS_INTERVAL == 0 {
                tracing::info!(fetched = count, frontier = frontier.len(), "progress");
            }
            if frontier.is_stopped() {
                tracing::info!(fetched = count, "quota reached; draining frontier");
            }

            if item.depth < ctx.config.limits.max_depth && !frontier.is_stopped() {
                enqueue_links(ctx, frontier, store, item, url, page.id, &body)?;
            }
        }
    }

    Ok(())
}

/// Records every extracted edge, then queues the ones the policy allows
fn enqueue_links<S: CrawlStore>(
    ctx: &CrawlContext,
    frontier: &Frontier,
    store: &mut S,
    item: &FrontierItem,
    url: &Url,
    page_id: i64,
    body: &[u8],
) -> Result<(), CrawlError> {
    let html = String::from_utf8_lossy(body);
    let links = extract_links(url, &html, &ctx.scope);

    let edges: Vec<(String, String)> = links
        .iter()
        .map(|link| (link.url.clone(), link.anchor.clone()))
        .collect();
    store.insert_links(page_id, &edges)?;

    let mut queued = 0usize;
    for link in links {
        if ctx.policy.matches(&link.url)
            && frontier.push(FrontierItem::new(link.url, item.depth + 1))
        {
            queued += 1;
        }
    }

    tracing::debug!(page_id, found = edges.len(), queued, "links extracted");
    Ok(())
}
