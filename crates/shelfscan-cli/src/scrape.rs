//! The `scrape` command: one run over a listing, then export.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use shelfscan_core::AppConfig;
use shelfscan_scraper::export::default_file_name;
use shelfscan_scraper::{
    summarize, write_csv, write_json, CancelFlag, ChatClient, HttpFetcher, OpenAiOracle, PageFetcher,
    ScrapeAgent, ScrapeOptions,
};

#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// First listing page to scrape
    pub url: String,

    /// Maximum number of pages to follow
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Use rule-based extraction instead of the language model
    #[arg(long)]
    pub rules: bool,

    /// Ignore robots.txt
    #[arg(long)]
    pub no_robots: bool,

    /// Write CSV to this path
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Write JSON to this path
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Directory for default-named output when neither --csv nor --json is given
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// CSS selector for product containers
    #[arg(long)]
    pub container: Option<String>,

    /// CSS selector for the product name inside a container
    #[arg(long)]
    pub name_selector: Option<String>,

    /// CSS selector for the price inside a container
    #[arg(long)]
    pub price_selector: Option<String>,

    /// CSS selector for the product link inside a container
    #[arg(long)]
    pub url_selector: Option<String>,

    /// CSS selector for the product image inside a container
    #[arg(long)]
    pub image_selector: Option<String>,

    /// CSS selector for the stock status inside a container
    #[arg(long)]
    pub availability_selector: Option<String>,

    /// CSS selector for the next-page link
    #[arg(long)]
    pub next_selector: Option<String>,
}

impl ScrapeArgs {
    /// Command-line flags override environment configuration.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        if self.rules {
            config.use_oracle = false;
        }
        if self.no_robots {
            config.respect_robots = false;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }

        let selectors = &mut config.selectors;
        let overrides = [
            (&mut selectors.container, &self.container),
            (&mut selectors.name, &self.name_selector),
            (&mut selectors.price, &self.price_selector),
            (&mut selectors.url, &self.url_selector),
            (&mut selectors.image, &self.image_selector),
            (&mut selectors.availability, &self.availability_selector),
            (&mut selectors.next_page, &self.next_selector),
        ];
        for (slot, value) in overrides {
            if value.is_some() {
                slot.clone_from(value);
            }
        }
    }

    /// Output files to write: the explicit paths, or a timestamped CSV in
    /// `output_dir`.
    pub(crate) fn outputs(&self, output_dir: &Path) -> (Option<PathBuf>, Option<PathBuf>) {
        if self.csv.is_none() && self.json.is_none() {
            let name = default_file_name("csv", chrono::Utc::now());
            return (Some(output_dir.join(name)), None);
        }
        (self.csv.clone(), self.json.clone())
    }
}

/// # Errors
///
/// Returns an error if the HTTP client or oracle cannot be configured, or if
/// writing an output file fails. A run that stops early is not an error.
pub async fn run_scrape(
    config: &AppConfig,
    args: &ScrapeArgs,
    cancel: &CancelFlag,
) -> anyhow::Result<()> {
    let fetcher = Arc::new(HttpFetcher::from_app_config(config)?);
    let mut agent = ScrapeAgent::new(
        ScrapeOptions::from_app_config(config),
        Arc::clone(&fetcher) as Arc<dyn PageFetcher>,
    );
    if config.use_oracle {
        let chat = ChatClient::from_app_config(fetcher.client().clone(), config)?;
        tracing::info!(model = chat.model(), "using language-model extraction");
        agent = agent.with_oracle(Arc::new(OpenAiOracle::new(chat)));
    }

    let report = agent.run(&args.url, cancel).await?;
    for error in &report.errors {
        tracing::warn!(error = %error, "run error");
    }

    let summary = summarize(&report.products);
    tracing::info!(
        products = summary.count,
        raw = report.raw_count,
        pages = report.pages_visited,
        stop_reason = %report.stop_reason,
        engine = %report.engine,
        min_price = ?summary.min_price,
        max_price = ?summary.max_price,
        mean_price = ?summary.mean_price,
        with_images = summary.with_images,
        with_urls = summary.with_urls,
        "scrape summary"
    );
    for (availability, count) in &summary.availability {
        tracing::info!(%availability, count, "availability");
    }

    if report.products.is_empty() {
        tracing::warn!("no products extracted; nothing written");
        return Ok(());
    }

    let (csv_path, json_path) = args.outputs(&config.output_dir);
    if let Some(path) = csv_path {
        write_csv(&path, &report.products)?;
        println!("wrote {} products to {}", report.products.len(), path.display());
    }
    if let Some(path) = json_path {
        write_json(&path, &report.products)?;
        println!("wrote {} products to {}", report.products.len(), path.display());
    }
    Ok(())
}
