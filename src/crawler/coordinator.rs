//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties every component together:
//! - Loading the task and seeding the frontier
//! - Loading each URL through the navigator
//! - Running interactions, following links and extracting metadata
//! - Handling interrupts and guaranteed cleanup

use crate::config::{Config, FrontierBackend};
use crate::crawler::layout::{read_seeds, OutputLayout};
use crate::crawler::summary::{CrawlSummary, RunStats};
use crate::driver::{HttpPageDriver, MouseSimulator, PageDriver};
use crate::extract::Extractor;
use crate::frontier::{EntryStatus, Frontier, MemoryFrontier, SqliteFrontier};
use crate::interaction::{InteractionEngine, PageStateCache};
use crate::navigator::{IpRotator, NavigationOutcome, Navigator, TorController};
use crate::sink::{create_sink, MetadataSink};
use crate::task::{load_task_with_hash, select_links, TaskConfig};
use crate::{CrawlError, Result};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Per-run options, usually taken from the command line
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub collection: String,
    pub output_dir: PathBuf,
    pub task_path: PathBuf,
    pub links_path: PathBuf,
    pub download_pdf: bool,
    pub open_access: bool,
    pub use_tor: bool,
    pub upload_ssh: bool,
    /// Pause after every processed URL
    pub delay: Duration,
    /// Clear the collection's frontier before seeding
    pub fresh: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            collection: "default_host_name".to_string(),
            output_dir: PathBuf::from("./output"),
            task_path: PathBuf::from("tasks/sample_task.json"),
            links_path: PathBuf::from("your_links_file.txt"),
            download_pdf: false,
            open_access: false,
            use_tor: false,
            upload_ssh: false,
            delay: Duration::ZERO,
            fresh: false,
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    options: CrawlOptions,
    task: TaskConfig,
    layout: OutputLayout,
    frontier: Box<dyn Frontier>,
    driver: Arc<dyn PageDriver>,
    navigator: Navigator,
    interactions: InteractionEngine,
    extractor: Extractor,
    sink: Option<Arc<dyn MetadataSink>>,
    mouse: Option<MouseSimulator>,
    stats: RunStats,
    closed: bool,
}

impl Coordinator {
    /// Sets up a crawl run with the built-in HTTP page driver
    pub async fn new(config: Config, options: CrawlOptions) -> Result<Self> {
        Self::setup(config, options, None).await
    }

    /// Sets up a crawl run on a caller-provided driver
    pub async fn with_driver(
        config: Config,
        options: CrawlOptions,
        driver: Arc<dyn PageDriver>,
    ) -> Result<Self> {
        Self::setup(config, options, Some(driver)).await
    }

    /// Loads the task, prepares the output directory and frontier, checks Tor
    /// and connects the sink
    ///
    /// Any error here is fatal for the run.
    async fn setup(
        config: Config,
        options: CrawlOptions,
        driver: Option<Arc<dyn PageDriver>>,
    ) -> Result<Self> {
        let (task, task_hash) = load_task_with_hash(&options.task_path)?;
        tracing::info!(
            task = %options.task_path.display(),
            hash = %task_hash,
            crawl_rules = task.crawl_rules.len(),
            metadata_rules = task.metadata_extraction.len(),
            interactions = task.interaction_rules.len(),
            "Task loaded"
        );

        warn_unsupported_flags(&options);

        let layout = OutputLayout::new(&options.output_dir, &options.collection);
        layout.create()?;

        let mut frontier = open_frontier(&config, &layout, &options.collection)?;
        if options.fresh {
            tracing::info!(collection = %options.collection, "Starting fresh crawl, clearing frontier");
            frontier.clear_collection()?;
        }

        let seeds_path = layout.prepare_seed_file(&options.links_path)?;
        let seeds = read_seeds(&seeds_path)?;
        let added = frontier.add_urls(&seeds)?;
        tracing::info!(seeds = seeds.len(), added, "Frontier initialized");

        let (rotator, proxy) = if options.use_tor {
            check_tor(&config).await
        } else {
            (None, None)
        };

        let sink = create_sink(&config.sink, layout.collection_dir())?;
        if let Some(sink) = &sink {
            sink.connect().await?;
        }

        let driver: Arc<dyn PageDriver> = match driver {
            Some(driver) => driver,
            None => match HttpPageDriver::new(&config.driver.user_agent, proxy.as_deref()) {
                Ok(driver) => Arc::new(driver),
                Err(e) => {
                    if let Some(sink) = &sink {
                        if let Err(e) = sink.disconnect().await {
                            tracing::warn!(error = %e, "Failed to disconnect sink");
                        }
                    }
                    return Err(e.into());
                }
            },
        };
        tracing::info!("Page driver initialized");

        let mut navigator = Navigator::new(Arc::clone(&driver), config.navigation_settings());
        if let Some(rotator) = rotator {
            navigator = navigator.with_rotator(rotator);
        }

        let interactions = InteractionEngine::new(
            Arc::clone(&driver),
            PageStateCache::with_capacity(config.interaction.cache_capacity),
            config.interaction.retry_backoff(),
        );

        let mut extractor = Extractor::new(layout.jsons_dir(), layout.htmls_dir());
        if let Some(sink) = &sink {
            extractor = extractor.with_sink(Arc::clone(sink), config.sink.table.clone());
        }

        let mouse = config
            .mouse
            .enabled
            .then(|| MouseSimulator::new(Arc::clone(&driver), config.mouse_settings()));

        Ok(Self {
            config,
            options,
            task,
            layout,
            frontier,
            driver,
            navigator,
            interactions,
            extractor,
            sink,
            mouse,
            stats: RunStats::default(),
            closed: false,
        })
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn frontier(&self) -> &dyn Frontier {
        self.frontier.as_ref()
    }

    pub fn page_cache(&self) -> &PageStateCache {
        self.interactions.cache()
    }

    /// Runs the crawl until the frontier is drained or Ctrl-C is pressed
    pub async fn run(&mut self) -> Result<CrawlSummary> {
        self.run_until(shutdown_signal()).await
    }

    /// Runs the crawl until the frontier is drained or `shutdown` completes
    ///
    /// Cleanup always runs, whether the loop finished, failed or was
    /// interrupted. A URL interrupted mid-processing stays claimed and is
    /// reclaimed once the stall timeout passes.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<CrawlSummary>
    where
        F: Future<Output = ()>,
    {
        let span = tracing::info_span!("crawl", collection = %self.options.collection);
        self.run_in_span(shutdown).instrument(span).await
    }

    async fn run_in_span<F>(&mut self, shutdown: F) -> Result<CrawlSummary>
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();

        if let Some(mouse) = &mut self.mouse {
            mouse.start().await;
        }

        let result = tokio::select! {
            biased;
            _ = shutdown => {
                tracing::warn!("Interrupted, stopping crawl");
                Ok(())
            }
            result = self.crawl_loop() => result,
        };

        self.shutdown().await;

        if let Err(e) = &result {
            tracing::error!(error = %e, "Crawl aborted");
        }
        result?;

        let summary =
            CrawlSummary::from_frontier(self.frontier.as_ref())?.with_run(self.stats, started.elapsed());
        summary.log();
        Ok(summary)
    }

    async fn crawl_loop(&mut self) -> Result<()> {
        let stall_timeout = self.config.frontier.stall_timeout();
        let max_retries = self.config.frontier.max_retries;
        let started = Instant::now();
        let mut pages = 0u64;

        while let Some(url) = self.frontier.get_next_url(stall_timeout)? {
            tracing::debug!(url = %url, "Processing URL");

            match self.process_url(&url).await {
                Ok(()) => {
                    self.frontier.mark_completed(&url)?;
                    self.stats.processed += 1;
                    tracing::info!(url = %url, "Successfully processed");
                }
                Err(e) => {
                    self.stats.failures += 1;
                    let status = self.frontier.mark_failed(&url, max_retries)?;
                    if status == EntryStatus::Failed {
                        tracing::error!(url = %url, error = %e, "Giving up on URL");
                    } else {
                        tracing::warn!(url = %url, error = %e, "Failed to process URL, requeued");
                    }
                }
            }

            pages += 1;
            if pages % 10 == 0 {
                let rate = pages as f64 / started.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {} URLs processed, {} failures, {:.2} URLs/sec",
                    self.stats.processed,
                    self.stats.failures,
                    rate
                );
                if let Err(e) = self.frontier.persist() {
                    tracing::error!(error = %e, "Failed to persist frontier");
                }
            }

            if !self.options.delay.is_zero() {
                tokio::time::sleep(self.options.delay).await;
            }
        }

        tracing::info!("Frontier is empty, crawl complete");
        Ok(())
    }

    /// Processes a single URL
    ///
    /// This method:
    /// 1. Loads the page with the matching crawl rule's wait and block rules
    /// 2. Runs the matching interactions
    /// 3. Adds the selected links to the frontier
    /// 4. Extracts metadata with the first matching metadata rule
    async fn process_url(&mut self, url: &str) -> Result<()> {
        let selection = self.task.select(url);
        if selection.is_empty() {
            tracing::debug!(url = %url, "No rules match URL");
        }

        let outcome = self
            .navigator
            .navigate(url, selection.wait_for(), selection.block_rule())
            .await;
        if let NavigationOutcome::Failed {
            attempts,
            last_error,
        } = outcome
        {
            return Err(CrawlError::Navigation {
                url: url.to_string(),
                attempts,
                message: last_error,
            });
        }

        self.interactions.record_page_state().await;

        if !selection.interactions.is_empty() {
            let report = self
                .interactions
                .run_interactions(&selection.interactions)
                .await;
            tracing::info!(
                url = %url,
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "Interactions finished"
            );
        }

        if !selection.crawl_rules.is_empty() {
            let page_url = self
                .driver
                .current_url()
                .await
                .unwrap_or_else(|_| url.to_string());
            let links = select_links(
                self.driver.as_ref(),
                &page_url,
                &selection.crawl_rules,
                &self.task.links_transformation,
            )
            .await?;
            let added = self.frontier.add_urls(&links)?;
            self.stats.links_added += added as u64;
            tracing::debug!(url = %url, found = links.len(), added, "Links selected");
        }

        if let Some(rule) = selection.metadata_rule() {
            match self.extractor.extract(self.driver.as_ref(), rule, url).await {
                Ok(Some(_)) => self.stats.records_saved += 1,
                Ok(None) => {}
                Err(e) => tracing::error!(url = %url, error = %e, "Failed to save metadata"),
            }
        }

        Ok(())
    }

    /// Stops the mouse simulation, closes the driver, disconnects the sink
    /// and persists the frontier; safe to call more than once
    pub async fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(mouse) = &mut self.mouse {
            mouse.stop().await;
        }

        tracing::info!("Closing page driver");
        if let Err(e) = self.driver.close().await {
            tracing::warn!(error = %e, "Failed to close page driver");
        }

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.disconnect().await {
                tracing::warn!(sink = sink.name(), error = %e, "Failed to disconnect sink");
            }
        }

        if let Err(e) = self.frontier.persist() {
            tracing::error!(error = %e, "Failed to persist frontier");
        }
    }
}

fn open_frontier(
    config: &Config,
    layout: &OutputLayout,
    collection: &str,
) -> Result<Box<dyn Frontier>> {
    let frontier: Box<dyn Frontier> = match config.frontier.backend {
        FrontierBackend::Sqlite => {
            let path = layout.frontier_db();
            tracing::info!(path = %path.display(), "Opening SQLite frontier");
            Box::new(SqliteFrontier::open(&path, collection)?)
        }
        FrontierBackend::Memory => {
            let path = layout.frontier_snapshot();
            tracing::info!(path = %path.display(), "Opening in-memory frontier");
            Box::new(MemoryFrontier::open(&path, collection)?)
        }
    };
    Ok(frontier)
}

/// Rotates the Tor identity once to check the control port
///
/// On failure the run continues without Tor.
async fn check_tor(config: &Config) -> (Option<Arc<dyn IpRotator>>, Option<String>) {
    let controller = TorController::new(config.tor_settings());

    match controller.new_identity().await {
        Ok(()) => {
            tracing::info!(proxy = %config.tor.proxy, "Tor is enabled");
            let rotator: Arc<dyn IpRotator> = Arc::new(controller);
            (Some(rotator), Some(config.tor.proxy.clone()))
        }
        Err(e) => {
            tracing::error!(error = %e, "Tor is not enabled, switching to normal mode");
            (None, None)
        }
    }
}

fn warn_unsupported_flags(options: &CrawlOptions) {
    for (enabled, flag) in [
        (options.download_pdf, "--download-pdf"),
        (options.open_access, "--open-access"),
        (options.upload_ssh, "--upload-ssh"),
    ] {
        if enabled {
            tracing::warn!(flag, "Flag is not supported and will be ignored");
        }
    }
}

/// Completes on Ctrl-C; never completes if the signal cannot be installed
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
