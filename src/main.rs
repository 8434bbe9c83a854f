//! Arbor main entry point
//!
//! This is the command-line interface for the Arbor crawl-and-classify engine.

use arbor::catalog::open_catalog;
use arbor::classify::{HttpOracle, ProgressiveClassifier};
use arbor::config::{load_config_with_hash, Config};
use arbor::fetch::{build_http_client, Fetcher, RateLimiter, SnapshotStore};
use arbor::graph::LinkGraphBuilder;
use arbor::url::{canonicalize, Scope};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Arbor: a crawl-and-classify engine
///
/// Arbor builds a deduplicated link tree of a site into SQLite, stores
/// content-addressed page snapshots, and classifies the tree leaf-to-root
/// through an external oracle under a resumable token budget.
#[derive(Parser, Debug)]
#[command(name = "arbor")]
#[command(version)]
#[command(about = "A crawl-and-classify engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to the catalog database (overrides config)
    #[arg(long, value_name = "PATH")]
    database: Option<String>,

    /// Directory for page snapshots (overrides config)
    #[arg(long, value_name = "DIR")]
    snapshots: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Builds (or resumes) the link graph from a seed URL
    BuildGraph {
        /// Seed URL; the crawl scope defaults to its host
        seed: String,

        /// Maximum crawl depth (overrides config)
        #[arg(long)]
        max_depth: Option<u32>,

        /// Maximum URLs to discover (overrides config)
        #[arg(long)]
        max_urls: Option<u64>,

        /// Minimum delay between requests in milliseconds (overrides config)
        #[arg(long)]
        crawl_delay_ms: Option<u64>,
    },
    /// Classifies a crawl run's tree leaf-to-root
    Classify {
        /// The crawl run whose tree to classify
        crawl_run_id: i64,

        /// Token budget for this run (overrides config)
        #[arg(long)]
        budget_tokens: Option<u64>,

        /// Maximum pages per oracle call (overrides config)
        #[arg(long)]
        max_nodes_per_call: Option<usize>,

        /// Send bare descriptors without page excerpts
        #[arg(long)]
        no_excerpts: bool,

        /// Oracle endpoint URL (overrides config)
        #[arg(long)]
        oracle_endpoint: Option<String>,
    },
    /// Shows statistics from the catalog and exits
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((cfg, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    (cfg, hash)
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => (Config::default(), "default".to_string()),
    };

    if let Some(database) = cli.database {
        config.output.database_path = database;
    }
    if let Some(snapshots) = cli.snapshots {
        config.output.snapshot_dir = snapshots;
    }

    match cli.command {
        Command::BuildGraph {
            seed,
            max_depth,
            max_urls,
            crawl_delay_ms,
        } => {
            if let Some(max_depth) = max_depth {
                config.crawl.max_depth = max_depth;
            }
            if let Some(max_urls) = max_urls {
                config.crawl.max_urls = max_urls;
            }
            if let Some(crawl_delay_ms) = crawl_delay_ms {
                config.crawl.crawl_delay_ms = crawl_delay_ms;
            }
            handle_build_graph(config, &config_hash, &seed).await?;
        }
        Command::Classify {
            crawl_run_id,
            budget_tokens,
            max_nodes_per_call,
            no_excerpts,
            oracle_endpoint,
        } => {
            if let Some(budget_tokens) = budget_tokens {
                config.classify.budget_tokens = budget_tokens;
            }
            if let Some(max_nodes_per_call) = max_nodes_per_call {
                config.classify.max_nodes_per_call = max_nodes_per_call;
            }
            if no_excerpts {
                config.classify.include_excerpts = false;
            }
            if let Some(oracle_endpoint) = oracle_endpoint {
                config.oracle.endpoint = oracle_endpoint;
            }
            handle_classify(config, crawl_run_id).await?;
        }
        Command::Stats => handle_stats(&config)?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("arbor=info,warn"),
            1 => EnvFilter::new("arbor=debug,info"),
            2 => EnvFilter::new("arbor=trace,debug"),
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

/// Installs a Ctrl-C handler that requests a graceful stop
///
/// Both the builder and the classifier check the flag between units of
/// work; all progress up to that point is already in the catalog.
fn install_interrupt_handler() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; checkpointing and stopping");
            flag.store(true, Ordering::Relaxed);
        }
    });
    cancel
}

/// Handles the build-graph subcommand
async fn handle_build_graph(
    config: Config,
    config_hash: &str,
    seed: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let seed_canonical = canonicalize(seed)?;
    let scope = match config.scope.clone() {
        Some(scope) => scope,
        None => Scope::from_seed(&seed_canonical)
            .ok_or_else(|| format!("Cannot derive a crawl scope from '{}'", seed_canonical))?,
    };
    tracing::info!("Crawl scope: hosts {:?}", scope.hosts);

    let mut catalog = open_catalog(Path::new(&config.output.database_path))?;
    let snapshots = SnapshotStore::new(Path::new(&config.output.snapshot_dir))?;
    let client = build_http_client(&config.http)?;
    let limiter = RateLimiter::new(config.crawl.crawl_delay_ms);
    let fetcher = Fetcher::new(client, limiter, snapshots, config.retry.clone());

    let cancel = install_interrupt_handler();
    let mut builder = LinkGraphBuilder::new(
        &mut catalog,
        &fetcher,
        scope,
        config.crawl.clone(),
        cancel,
    );

    let summary = builder.run(&seed_canonical, config_hash).await?;

    println!("Crawl run: {}", summary.crawl_run_id);
    println!("Status: {}", summary.status.to_db_string());
    println!("URLs discovered: {}", summary.urls_discovered);
    println!("URLs fetched: {}", summary.urls_fetched);
    println!("URLs failed: {}", summary.urls_failed);
    if summary.cancelled {
        println!("Interrupted; rerun build-graph with the same seed to resume");
    }

    Ok(())
}

/// Handles the classify subcommand
async fn handle_classify(
    config: Config,
    crawl_run_id: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut catalog = open_catalog(Path::new(&config.output.database_path))?;
    let snapshots = SnapshotStore::new(Path::new(&config.output.snapshot_dir))?;
    let oracle = HttpOracle::new(&config.oracle)?;
    tracing::info!("Oracle endpoint: {}", config.oracle.endpoint);

    let cancel = install_interrupt_handler();
    let mut classifier = ProgressiveClassifier::new(
        &mut catalog,
        &oracle,
        &snapshots,
        config.classify.clone(),
        config.retry.clone(),
        cancel,
    );

    let summary = classifier.run(crawl_run_id).await?;

    println!("Classification run: {}", summary.classification_run_id);
    println!("Status: {}", summary.status.to_db_string());
    println!("URLs classified: {}", summary.urls_classified);
    println!("Errors: {}", summary.errors);
    println!(
        "Tokens used: {} / {}",
        summary.tokens_used, config.classify.budget_tokens
    );
    if summary.cancelled {
        println!("Interrupted; rerun classify {} to resume", crawl_run_id);
    }

    Ok(())
}

/// Handles the stats subcommand
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use arbor::report::{load_statistics, print_statistics};

    println!("Database: {}\n", config.output.database_path);

    let catalog = open_catalog(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&catalog)?;
    print_statistics(&stats);

    Ok(())
}
