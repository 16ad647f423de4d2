//! rulecrawl main entry point
//!
//! This is the command-line interface for the rulecrawl crawler.

use clap::{Args, Parser, Subcommand};
use rulecrawl::config::{compute_config_hash, load_config_or_default, Config, FrontierBackend};
use rulecrawl::crawler::{print_summary, Coordinator, CrawlOptions, CrawlSummary, OutputLayout};
use rulecrawl::frontier::{Frontier, MemoryFrontier, SqliteFrontier};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_DIR: &str = "logs";

/// rulecrawl: a rule-driven web crawler
///
/// Crawls the seed URLs of a collection, following and extracting what the
/// task file describes, and resumes where it left off when restarted.
#[derive(Parser, Debug)]
#[command(name = "rulecrawl")]
#[command(version)]
#[command(about = "A rule-driven web crawler", long_about = None)]
struct Cli {
    /// Collection name; output goes to <OUTPUT>/<COLL_NAME>
    #[arg(long, global = true, default_value = "default_host_name")]
    coll_name: String,

    /// Output directory
    #[arg(long, global = true, default_value = "./output")]
    output: PathBuf,

    /// Path to the JSON task file
    #[arg(long, global = true, default_value = "tasks/sample_task.json")]
    task: PathBuf,

    /// Newline-delimited seed URLs
    #[arg(long, global = true, default_value = "your_links_file.txt")]
    links: PathBuf,

    /// Path to a TOML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the collection until its frontier is empty
    Crawl(CrawlArgs),

    /// Show frontier statistics for the collection and exit
    Stats,
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Download linked PDFs (accepted, not supported)
    #[arg(long)]
    download_pdf: bool,

    /// Check open access (accepted, not supported)
    #[arg(long)]
    open_access: bool,

    /// Route traffic through Tor and rotate the IP when blocked
    #[arg(long)]
    use_tor: bool,

    /// Upload results over SSH (accepted, not supported)
    #[arg(long)]
    upload_ssh: bool,

    /// Delay between requests in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 0)]
    delay: u64,

    /// Start a fresh crawl, clearing the collection's frontier
    #[arg(long)]
    fresh: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let _log_guard = setup_logging(cli.verbose, cli.quiet);

    if let Some(path) = &cli.config {
        tracing::info!("Loading configuration from: {}", path.display());
    }
    let config = match load_config_or_default(cli.config.as_deref()) {
        Ok(config) => {
            if let Some(path) = &cli.config {
                let hash = compute_config_hash(path)?;
                tracing::info!("Configuration loaded successfully (hash: {})", hash);
            }
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match &cli.command {
        Command::Crawl(args) => handle_crawl(config, &cli, args).await?,
        Command::Stats => handle_stats(&config, &cli)?,
    }

    Ok(())
}

/// Sets up console logging plus a per-run log file under `logs/`
///
/// The returned guard flushes the file writer on drop and must live as long
/// as the process logs.
fn setup_logging(verbose: u8, quiet: bool) -> Option<WorkerGuard> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("rulecrawl=info,warn"),
            1 => EnvFilter::new("rulecrawl=debug,info"),
            2 => EnvFilter::new("rulecrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let (file_layer, guard) = match log_file_writer(Path::new(LOG_DIR)) {
        Ok((writer, guard)) => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("Cannot create log directory {}: {}", LOG_DIR, e);
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false),
        )
        .with(file_layer)
        .init();

    guard
}

/// Opens a non-blocking writer for `log_<timestamp>.log` in `dir`
fn log_file_writer(dir: &Path) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let appender = tracing_appender::rolling::never(dir, format!("log_{}.log", timestamp));
    Ok(tracing_appender::non_blocking(appender))
}

/// Handles the `crawl` command
async fn handle_crawl(
    config: Config,
    cli: &Cli,
    args: &CrawlArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = CrawlOptions {
        collection: cli.coll_name.clone(),
        output_dir: cli.output.clone(),
        task_path: cli.task.clone(),
        links_path: cli.links.clone(),
        download_pdf: args.download_pdf,
        open_access: args.open_access,
        use_tor: args.use_tor,
        upload_ssh: args.upload_ssh,
        delay: Duration::from_millis(args.delay),
        fresh: args.fresh,
    };

    tracing::info!(
        "Starting crawl of '{}' (output: {}, task: {})",
        options.collection,
        options.output_dir.display(),
        options.task_path.display()
    );

    let mut coordinator = match Coordinator::new(config, options).await {
        Ok(coordinator) => coordinator,
        Err(e) => {
            tracing::error!("Crawl setup failed: {}", e);
            return Err(e.into());
        }
    };

    match coordinator.run().await {
        Ok(summary) => {
            tracing::info!(
                "Crawl completed: {} visited, {} failed, {} queued",
                summary.visited,
                summary.failed,
                summary.queued
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the `stats` command: prints frontier statistics for the collection
fn handle_stats(config: &Config, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let layout = OutputLayout::new(&cli.output, &cli.coll_name);

    let frontier: Box<dyn Frontier> = match config.frontier.backend {
        FrontierBackend::Sqlite => {
            let path = layout.frontier_db();
            if !path.exists() {
                return Err(format!("No frontier database at {}", path.display()).into());
            }
            println!("Database: {}\n", path.display());
            Box::new(SqliteFrontier::open(&path, &cli.coll_name)?)
        }
        FrontierBackend::Memory => {
            let path = layout.frontier_snapshot();
            if !path.exists() {
                return Err(format!("No frontier snapshot at {}", path.display()).into());
            }
            println!("Snapshot: {}\n", path.display());
            Box::new(MemoryFrontier::open(&path, &cli.coll_name)?)
        }
    };

    let summary = CrawlSummary::from_frontier(frontier.as_ref())?;
    print_summary(&summary);

    Ok(())
}
