//! The page loop: fetch, extract, paginate, clean.
//!
//! A run walks one pagination chain sequentially. Every page is fetched
//! through the active [`PageFetcher`], turned into raw records either by the
//! [`ExtractionOracle`] or by the rule-based locator and extractor, and the
//! next URL is read from the same document. Parsed documents never live
//! across an `.await`.

mod report;

use std::sync::Arc;

use scraper::Html;
use shelfscan_core::{AppConfig, CustomSelectors, RawProductRecord};
use url::Url;

use crate::detect::{detect_site, SiteType};
use crate::error::ScraperError;
use crate::extract::FieldExtractor;
use crate::fetch::PageFetcher;
use crate::locator::{locate_containers, price_anchored_fallback};
use crate::normalize::clean_products;
use crate::oracle::ExtractionOracle;
use crate::pagination::PaginationHandler;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::robots::RobotsChecker;

pub use report::{CancelFlag, ScrapeReport, StopReason};

/// Two empty pages in a row end the run.
const MAX_CONSECUTIVE_EMPTY_PAGES: usize = 2;

/// Run-level settings.
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub max_pages: usize,
    pub respect_robots: bool,
    /// Extract with the oracle instead of the rule-based pipeline.
    pub use_oracle: bool,
    /// User agent matched against robots.txt groups.
    pub user_agent: String,
    pub selectors: CustomSelectors,
    pub rate_limit: RateLimitConfig,
    /// Skip site detection and use this engine.
    pub force_engine: Option<SiteType>,
}

impl ScrapeOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            respect_robots: config.respect_robots,
            use_oracle: config.use_oracle,
            user_agent: config.user_agent.clone(),
            selectors: config.selectors.clone(),
            rate_limit: RateLimitConfig::from_app_config(config),
            force_engine: None,
        }
    }
}

/// Scrapes a paginated product listing.
pub struct ScrapeAgent {
    options: ScrapeOptions,
    fetcher: Arc<dyn PageFetcher>,
    renderer: Option<Arc<dyn PageFetcher>>,
    oracle: Option<Arc<dyn ExtractionOracle>>,
}

impl ScrapeAgent {
    /// `fetcher` is the plain HTTP engine, also used for robots.txt.
    #[must_use]
    pub fn new(options: ScrapeOptions, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            options,
            fetcher,
            renderer: None,
            oracle: None,
        }
    }

    /// Engine used for pages classified as JavaScript-rendered.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn PageFetcher>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    #[must_use]
    pub fn with_oracle(mut self, oracle: Arc<dyn ExtractionOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    #[must_use]
    pub fn options(&self) -> &ScrapeOptions {
        &self.options
    }

    /// Scrapes from `start_url` until the chain ends, the page cap is hit,
    /// a fetch fails twice, or `cancel` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Configuration`] when oracle extraction is
    /// requested without an oracle. Nothing has been fetched at that point.
    /// Every other problem ends the run with a [`StopReason`] and whatever
    /// products were collected.
    pub async fn run(&self, start_url: &str, cancel: &CancelFlag) -> Result<ScrapeReport, ScraperError> {
        let oracle = if self.options.use_oracle {
            Some(self.oracle.clone().ok_or_else(|| {
                ScraperError::Configuration(
                    "oracle extraction requested but no oracle is configured (is OPENAI_API_KEY set?)"
                        .to_string(),
                )
            })?)
        } else {
            None
        };

        if let Err(reason) = validate_start_url(start_url) {
            tracing::error!(url = start_url, reason = %reason, "invalid start URL");
            let mut report = ScrapeReport::stopped(StopReason::InvalidUrl);
            report.errors.push(format!("{start_url}: {reason}"));
            return Ok(report);
        }

        let mode = if oracle.is_some() { "oracle" } else { "rules" };
        tracing::info!(
            url = start_url,
            mode,
            max_pages = self.options.max_pages,
            "starting scrape"
        );

        let mut limiter = RateLimiter::new(self.options.rate_limit.clone());
        let mut robots = self
            .options
            .respect_robots
            .then(|| RobotsChecker::new(Arc::clone(&self.fetcher), &self.options.user_agent));

        if let Some(checker) = robots.as_mut() {
            if !checker.can_fetch(start_url).await {
                tracing::error!(url = start_url, "robots.txt disallows the start URL");
                return Ok(ScrapeReport::stopped(StopReason::RobotsDisallowed));
            }
            if let Some(delay) = checker.crawl_delay(start_url).await {
                tracing::info!(delay_secs = delay.as_secs_f64(), "honouring robots.txt crawl-delay");
                limiter.raise_min_delay(delay);
            }
        }

        let mut report = ScrapeReport::stopped(StopReason::NoNextPage);
        let (mut active, mut engine_decided) = self.initial_engine(&mut report);
        let mut pagination =
            PaginationHandler::new(self.options.max_pages, self.options.selectors.next_page.as_deref());
        let mut raw: Vec<RawProductRecord> = Vec::new();
        let mut current = start_url.to_string();
        let mut speculative = false;
        let mut consecutive_empty = 0usize;

        let stop_reason = loop {
            if cancel.is_cancelled() {
                tracing::warn!("cancellation requested, stopping");
                break StopReason::Cancelled;
            }

            let page = report.pages_visited + 1;
            tracing::info!(page, url = %current, "scraping page");

            limiter.wait().await;
            let mut html = match active.fetch(&current).await {
                Ok(html) => html,
                Err(err) if speculative && err.is_not_found() => {
                    tracing::info!(url = %current, "inferred next page does not exist");
                    break StopReason::NoNextPage;
                }
                Err(err) => {
                    tracing::warn!(url = %current, error = %err, "fetch failed");
                    report.errors.push(format!("{current}: {err}"));
                    limiter.report_error();
                    if !limiter.should_retry() {
                        break StopReason::FetchFailed;
                    }
                    limiter.wait().await;
                    match active.fetch(&current).await {
                        Ok(html) => html,
                        Err(err) => {
                            tracing::error!(url = %current, error = %err, "fetch failed again, stopping");
                            report.errors.push(format!("{current}: {err}"));
                            break StopReason::FetchFailed;
                        }
                    }
                }
            };
            limiter.report_success();
            report.pages_visited += 1;

            if !engine_decided {
                engine_decided = true;
                if let Some(rendered) = self.detect_engine(&current, &html, &mut active, &mut report).await {
                    html = rendered;
                }
            }

            let oracle_products = match &oracle {
                Some(oracle) => Some(match oracle.extract_products(&html, &current).await {
                    Ok(products) => products,
                    Err(err) => {
                        tracing::warn!(url = %current, error = %err, "oracle extraction failed");
                        report.errors.push(format!("{current}: {err}"));
                        Vec::new()
                    }
                }),
                None => None,
            };

            let (page_products, next) = {
                let doc = Html::parse_document(&html);
                let products =
                    oracle_products.unwrap_or_else(|| self.extract_with_rules(&doc, &current, page == 1));
                let next = pagination.next_page(&doc, &current);
                (products, next)
            };

            tracing::info!(page, products = page_products.len(), "page extracted");
            if page_products.is_empty() {
                consecutive_empty += 1;
                if consecutive_empty >= MAX_CONSECUTIVE_EMPTY_PAGES {
                    break StopReason::ConsecutiveEmptyPages;
                }
            } else {
                consecutive_empty = 0;
                raw.extend(page_products);
            }

            let Some(next) = next else {
                break if pagination.current_page() >= pagination.max_pages() {
                    StopReason::PageCap
                } else {
                    StopReason::NoNextPage
                };
            };

            if let Some(checker) = robots.as_mut() {
                if !checker.can_fetch(&next.url).await {
                    break StopReason::RobotsDisallowed;
                }
            }

            speculative = next.is_speculative();
            current = next.url;
        };

        report.raw_count = raw.len();
        report.products = clean_products(&raw);
        report.stop_reason = stop_reason;

        tracing::info!(
            pages = report.pages_visited,
            raw = report.raw_count,
            products = report.products.len(),
            stop_reason = %report.stop_reason,
            "scrape finished"
        );
        Ok(report)
    }

    /// Engine for the first page, and whether detection is already settled.
    fn initial_engine(&self, report: &mut ScrapeReport) -> (Arc<dyn PageFetcher>, bool) {
        match (self.options.force_engine, &self.renderer) {
            (Some(SiteType::Dynamic), Some(renderer)) => {
                report.engine = SiteType::Dynamic;
                (Arc::clone(renderer), true)
            }
            (Some(SiteType::Dynamic), None) => {
                tracing::warn!("dynamic engine forced but no renderer configured, using HTTP");
                (Arc::clone(&self.fetcher), true)
            }
            (Some(SiteType::Static), _) => (Arc::clone(&self.fetcher), true),
            (None, _) => (Arc::clone(&self.fetcher), false),
        }
    }

    /// Classifies the first page and switches to the renderer when it looks
    /// JavaScript-rendered. Returns the re-rendered HTML when the switch
    /// happened.
    async fn detect_engine(
        &self,
        url: &str,
        html: &str,
        active: &mut Arc<dyn PageFetcher>,
        report: &mut ScrapeReport,
    ) -> Option<String> {
        let analysis = detect_site(html);
        let dynamic = analysis.site_type == SiteType::Dynamic;
        report.site_analysis = Some(analysis);
        if !dynamic {
            return None;
        }

        let Some(renderer) = &self.renderer else {
            tracing::warn!(url, "page looks JavaScript-rendered but no renderer is configured, continuing over HTTP");
            return None;
        };

        match renderer.fetch(url).await {
            Ok(rendered) => {
                tracing::info!(url, "switched to rendering engine");
                *active = Arc::clone(renderer);
                report.engine = SiteType::Dynamic;
                Some(rendered)
            }
            Err(err) => {
                tracing::warn!(url, error = %err, "rendering engine failed, continuing over HTTP");
                report.errors.push(format!("{url}: {err}"));
                None
            }
        }
    }

    fn extract_with_rules(&self, doc: &Html, page_url: &str, first_page: bool) -> Vec<RawProductRecord> {
        let mut containers = locate_containers(doc, self.options.selectors.container.as_deref());
        if containers.is_empty() && first_page {
            containers = price_anchored_fallback(doc);
        }
        if containers.is_empty() {
            tracing::info!(url = page_url, "no product containers found");
            return Vec::new();
        }

        let Ok(base) = Url::parse(page_url) else {
            return Vec::new();
        };
        FieldExtractor::new(base, &self.options.selectors).extract_all(&containers)
    }
}

/// Accepts only absolute `http`/`https` URLs with a host.
fn validate_start_url(url: &str) -> Result<(), String> {
    let parsed = Url::parse(url).map_err(|e| e.to_string())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme \"{}\"", parsed.scheme()));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err("missing host".to_string());
    }
    Ok(())
}

#[cfg(test)]
#[path = "../agent_test.rs"]
mod tests;
