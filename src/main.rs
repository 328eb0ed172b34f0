//! ANJSO wiki crawler entry point
//!
//! This is the command-line interface for the topic-scoped encyclopedia crawler.

use anjso_crawler::config::{load_config_with_hash, validate, Config};
use anjso_crawler::crawler::{filter_seeds, Crawler};
use anjso_crawler::output::{load_statistics, print_statistics};
use anjso_crawler::storage::{DataLayout, SqliteStore};
use anjso_crawler::url::PatternPolicy;
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// ANJSO wiki crawler
///
/// Crawls a narrow, topic-scoped slice of a public encyclopedia while
/// respecting robots.txt, per-host rate limits and a page quota, and stores
/// raw pages plus the observed link graph for offline processing.
#[derive(Parser, Debug)]
#[command(name = "anjso-crawler")]
#[command(version)]
#[command(about = "A polite topic-scoped wiki crawler", long_about = None)]
struct Cli {
    /// Path to TOML crawl policy
    #[arg(long, env = "CRAWL_CFG", default_value = "/config/whitelist.toml")]
    config: PathBuf,

    /// Directory holding wiki.sqlite and raw/
    #[arg(long, env = "DATA_DIR", default_value = "/data")]
    data_dir: PathBuf,

    /// Override limits.max_pages
    #[arg(long, env = "CRAWL_MAX_PAGES")]
    max_pages: Option<u64>,

    /// Override limits.max_depth
    #[arg(long, env = "CRAWL_MAX_DEPTH")]
    max_depth: Option<u32>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Exit after the crawl instead of idling until a signal
    #[arg(long)]
    once: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let layout = DataLayout::new(&cli.data_dir);

    if cli.stats {
        return handle_stats(&layout);
    }

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    config.apply_overrides(cli.max_pages, cli.max_depth);
    tracing::info!(
        hash = %config_hash,
        seeds = config.seeds.len(),
        max_pages = config.limits.max_pages,
        max_depth = config.limits.max_depth,
        "configuration loaded"
    );

    if cli.dry_run {
        return handle_dry_run(&config, &layout);
    }

    handle_crawl(config, layout, cli.once).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG`, when set, takes precedence over the flags.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("anjso_crawler=info,warn"),
                1 => EnvFilter::new("anjso_crawler=debug,info"),
                2 => EnvFilter::new("anjso_crawler=trace,debug"),
                _ => EnvFilter::new("trace"),
            }
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, layout: &DataLayout) -> anyhow::Result<()> {
    println!("=== ANJSO Crawler Dry Run ===\n");

    println!("Limits:");
    println!("  Max pages: {}", config.limits.max_pages);
    println!("  Max depth: {}", config.limits.max_depth);
    println!("  Workers: {}", config.rate_limit.max_parallel);
    println!("  Requests/sec per host: {}", config.rate_limit.per_host_rps);
    println!("  Respect robots.txt: {}", config.respect_robots);

    println!("\nTopic:");
    println!("  Name: {}", config.topic.name);
    println!("  Wiki base: {}", config.topic.wiki_base);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nPatterns:");
    for pattern in &config.include_patterns {
        println!("  + {}", pattern);
    }
    for pattern in &config.exclude_patterns {
        println!("  - {}", pattern);
    }

    println!("\nOutput:");
    println!("  Database: {}", layout.database_path().display());
    println!("  Raw files: {}", layout.raw_dir().display());

    validate(&config)?;
    let policy = PatternPolicy::new(&config.include_patterns, &config.exclude_patterns)?;
    let seeds = filter_seeds(&config.seeds, &policy);

    println!("\nSeeds ({} of {} accepted):", seeds.len(), config.seeds.len());
    for seed in &seeds {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(layout: &DataLayout) -> anyhow::Result<()> {
    let path = layout.database_path();
    println!("Database: {}\n", path.display());

    anyhow::ensure!(path.exists(), "no crawl database at {}", path.display());

    let store = SqliteStore::open(&path)?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, layout: DataLayout, once: bool) -> anyhow::Result<()> {
    let crawler = Crawler::new(config, layout)?;
    let cancel = CancellationToken::new();

    tracing::info!("Crawler service running");

    tokio::select! {
        report = crawler.run(cancel.clone()) => {
            let report = report?;
            tracing::info!(
                fetched = report.fetched,
                quota_reached = report.quota_reached,
                "crawl completed"
            );
        }
        _ = shutdown_signal() => {
            cancel.cancel();
            tracing::info!("Crawler shutting down");
            return Ok(());
        }
    }

    if once {
        return Ok(());
    }

    shutdown_signal().await;
    tracing::info!("Crawler shutting down");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
