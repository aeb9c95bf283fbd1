//! Instapress main entry point
//!
//! This is the command-line interface for the Instapress import pipeline.

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use instapress::apify::{canonical_username, ApifyClient};
use instapress::cache::{ResultCache, TtlPolicy};
use instapress::config::{load_config_with_hash, Config};
use instapress::import::{BulkImporter, ImportOptions, SharedLedger};
use instapress::media::MediaPublisher;
use instapress::output;
use instapress::progress::{ProgressFrame, ProgressRegistry};
use instapress::scraper::{CachedScraper, FetchOptions};
use instapress::storage::{Ledger, SqliteLedger};
use instapress::store::WordPressClient;
use instapress::ScrapeRequest;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Instapress: import Instagram posts into WordPress
///
/// Instapress scrapes an account through an Apify actor, caches the results
/// on disk, and creates one WordPress post per scraped post with its image,
/// caption and engagement metadata.
#[derive(Parser, Debug)]
#[command(name = "instapress")]
#[command(version)]
#[command(about = "Import Instagram posts into WordPress via Apify", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

/// Cache controls shared by scraping commands
#[derive(clap::Args, Debug)]
struct CacheArgs {
    /// Ignore cached results and run the actor
    #[arg(long)]
    refresh: bool,

    /// Cache TTL override in seconds
    #[arg(long, value_name = "SECS")]
    ttl: Option<u64>,
}

impl CacheArgs {
    fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            use_cache: !self.refresh,
            ttl_override: self.ttl.map(Duration::from_secs),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape an account and import its posts
    Import {
        username: String,

        /// Maximum number of posts to scrape
        #[arg(short, long, default_value_t = 12)]
        limit: u32,

        /// Include stories in the scrape
        #[arg(long)]
        stories: bool,

        /// Publish records instead of leaving drafts
        #[arg(long)]
        publish: bool,

        /// List every item in the final report
        #[arg(long)]
        details: bool,

        #[command(flatten)]
        cache: CacheArgs,
    },

    /// Scrape an account's timeline and print the posts
    Scrape {
        username: String,

        #[arg(short, long, default_value_t = 12)]
        limit: u32,

        #[arg(long)]
        stories: bool,

        #[command(flatten)]
        cache: CacheArgs,
    },

    /// Scrape specific post URLs and print them
    ScrapeUrls {
        #[arg(required = true)]
        urls: Vec<String>,

        #[command(flatten)]
        cache: CacheArgs,
    },

    /// Look up an account's profile
    Profile {
        username: String,

        #[command(flatten)]
        cache: CacheArgs,
    },

    /// Show Apify account usage
    Usage,

    /// Show cache statistics
    CacheStats,

    /// Delete expired cache entries
    CacheSweep {
        /// Delete every entry, expired or not
        #[arg(long)]
        all: bool,
    },

    /// Delete every cached result for one account
    CacheInvalidate { username: String },

    /// List imported posts and recent import runs
    Imported {
        /// Only posts from this account
        #[arg(long)]
        username: Option<String>,

        /// Number of recent runs to show
        #[arg(long, default_value_t = 10)]
        runs: usize,
    },

    /// Forget an imported post so the next import creates it again
    Forget { short_code: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Import {
            username,
            limit,
            stories,
            publish,
            details,
            cache,
        } => {
            require_username(&username)?;
            let mut options = ImportOptions::new(&username, limit);
            options.include_stories = stories;
            options.publish = publish || config.wordpress.publish;
            options.fetch = cache.fetch_options();
            handle_import(&config, &config_hash, options, details).await
        }
        Command::Scrape {
            username,
            limit,
            stories,
            cache,
        } => {
            require_username(&username)?;
            let request = ScrapeRequest::user_timeline(&username, limit, stories);
            handle_scrape(&config, request, cache.fetch_options()).await
        }
        Command::ScrapeUrls { urls, cache } => {
            let request = ScrapeRequest::url_batch(&urls[..]);
            handle_scrape(&config, request, cache.fetch_options()).await
        }
        Command::Profile { username, cache } => {
            require_username(&username)?;
            handle_profile(&config, &username, cache.fetch_options()).await
        }
        Command::Usage => handle_usage(&config).await,
        Command::CacheStats => {
            let cache = open_cache(&config)?;
            output::print_cache_stats(&cache.stats());
            Ok(())
        }
        Command::CacheSweep { all } => {
            let cache = open_cache(&config)?;
            let removed = if all {
                cache.sweep_all()
            } else {
                cache.sweep_expired()
            };
            println!("✓ Removed {} cache entries", removed);
            Ok(())
        }
        Command::CacheInvalidate { username } => {
            let cache = open_cache(&config)?;
            let removed = cache.invalidate_user(&username);
            println!("✓ Removed {} cache entries for @{}", removed, username);
            Ok(())
        }
        Command::Imported { username, runs } => {
            let ledger = SqliteLedger::open(&config.ledger.database_path)?;
            println!("Database: {}\n", config.ledger.database_path.display());
            output::print_runs(&ledger.list_runs(runs)?);
            println!();
            output::print_imported_posts(&ledger.list_imported(username.as_deref())?);
            Ok(())
        }
        Command::Forget { short_code } => {
            let mut ledger = SqliteLedger::open(&config.ledger.database_path)?;
            if ledger.remove_mapping(&short_code)? {
                println!("✓ Forgot {}", short_code);
            } else {
                println!("{} was not in the ledger", short_code);
            }
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("instapress=info,warn"),
            1 => EnvFilter::new("instapress=debug,info"),
            2 => EnvFilter::new("instapress=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Rejects a username that is blank once trimmed of spaces and `@`
fn require_username(raw: &str) -> anyhow::Result<()> {
    if canonical_username(raw).is_empty() {
        anyhow::bail!("Invalid username {:?}", raw);
    }
    Ok(())
}

fn open_cache(config: &Config) -> anyhow::Result<ResultCache> {
    ResultCache::open(&config.cache.directory, TtlPolicy::from(&config.cache)).with_context(|| {
        format!(
            "Failed to open cache directory {}",
            config.cache.directory.display()
        )
    })
}

fn build_scraper(config: &Config) -> instapress::Result<Arc<CachedScraper>> {
    let client = ApifyClient::new(&config.apify)?;
    let cache = ResultCache::open(&config.cache.directory, TtlPolicy::from(&config.cache))?;
    Ok(Arc::new(CachedScraper::new(Arc::new(client), Arc::new(cache))))
}

/// Wires the scraper, WordPress client, media step and ledger together
fn build_importer(
    config: &Config,
    config_hash: &str,
    progress: ProgressRegistry,
) -> instapress::Result<BulkImporter> {
    let scraper = build_scraper(config)?;
    let timeout = config.apify.request_timeout();
    let store = Arc::new(WordPressClient::new(&config.wordpress, timeout)?);
    let media = MediaPublisher::new(timeout)?;
    let ledger: SharedLedger = Arc::new(Mutex::new(SqliteLedger::open(
        &config.ledger.database_path,
    )?));

    Ok(BulkImporter::new(scraper, store, media, progress).with_ledger(ledger, config_hash))
}

/// Cancels `token` on Ctrl-C
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling...");
            token.cancel();
        }
    });
}

/// Handles the import command: scrapes, imports and prints a report
async fn handle_import(
    config: &Config,
    config_hash: &str,
    options: ImportOptions,
    details: bool,
) -> anyhow::Result<()> {
    let progress = ProgressRegistry::new();
    let importer = build_importer(config, config_hash, progress.clone())?;

    let session = importer.start_session(&options.username);

    let interrupt = CancellationToken::new();
    cancel_on_interrupt(interrupt.clone());
    {
        let progress = progress.clone();
        tokio::spawn(async move {
            interrupt.cancelled().await;
            if let Err(e) = progress.cancel(session) {
                tracing::debug!("Could not cancel session: {}", e);
            }
        });
    }

    // Follow the push stream until the session ends
    let watcher = progress.subscribe(session).map(|mut frames| {
        tokio::spawn(async move {
            while let Some(frame) = frames.next().await {
                match &frame {
                    ProgressFrame::Connected { session_id } => {
                        tracing::debug!("Following session {}", session_id)
                    }
                    ProgressFrame::Progress(s) => {
                        tracing::info!("[{:>5.1}%] {}", s.percentage, s.message)
                    }
                    ProgressFrame::Complete(s) => tracing::info!("[done] {}", s.message),
                    ProgressFrame::Error(s) => tracing::warn!("[{:?}] {}", s.status, s.message),
                }
            }
        })
    });

    let report = importer.run(session, &options).await;

    if let Some(watcher) = watcher {
        let _ = tokio::time::timeout(Duration::from_secs(5), watcher).await;
    }

    println!();
    output::print_import_report(&report, details);

    if !report.success {
        anyhow::bail!("Import of @{} failed: {}", report.username, report.message);
    }
    Ok(())
}

/// Handles the scrape commands: fetches posts and prints them
async fn handle_scrape(
    config: &Config,
    request: ScrapeRequest,
    fetch: FetchOptions,
) -> anyhow::Result<()> {
    let scraper = build_scraper(config)?;
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let records = scraper.fetch_posts(&request, fetch, &cancel).await?;
    output::print_records(&records);
    Ok(())
}

/// Handles the profile command
async fn handle_profile(config: &Config, username: &str, fetch: FetchOptions) -> anyhow::Result<()> {
    let scraper = build_scraper(config)?;
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    match scraper.fetch_profile(username, fetch, &cancel).await? {
        Some(profile) => output::print_profile(&profile),
        None => println!("No profile found for @{}", username),
    }
    Ok(())
}

/// Handles the usage command
async fn handle_usage(config: &Config) -> anyhow::Result<()> {
    let client = ApifyClient::new(&config.apify)?;
    let usage = client.account_usage().await?;

    println!("=== Apify Account ===\n");
    if let Some(username) = &usage.username {
        println!("  User: {}", username);
    }
    println!("  Plan: {}", usage.plan);
    println!("  Monthly usage: {}", usage.monthly_usage);
    println!("  Limits: {}", usage.limits);
    Ok(())
}
