use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use shelfscan_core::Availability;

use super::*;
use crate::error::{FetchError, OracleError};

const BASE: &str = "https://shop.example.com";

// -----------------------------------------------------------------------
// Fakes
// -----------------------------------------------------------------------

/// In-memory site: unknown URLs answer 404, and URLs can be made to fail
/// with 503 a fixed number of times first.
#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, String>,
    failures: Mutex<HashMap<String, usize>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeSite {
    fn page(mut self, path: &str, html: String) -> Self {
        self.pages.insert(format!("{BASE}{path}"), html);
        self
    }

    fn failing(self, path: &str, times: usize) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(format!("{BASE}{path}"), times);
        self
    }

    fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeSite {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.fetched.lock().unwrap().push(url.to_owned());
        if let Some(remaining) = self.failures.lock().unwrap().get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FetchError::Status {
                    status: 503,
                    url: url.to_owned(),
                });
            }
        }
        self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
            status: 404,
            url: url.to_owned(),
        })
    }
}

struct FakeOracle {
    fail_on: Option<String>,
}

#[async_trait]
impl ExtractionOracle for FakeOracle {
    async fn extract_products(
        &self,
        _html: &str,
        page_url: &str,
    ) -> Result<Vec<RawProductRecord>, OracleError> {
        if self.fail_on.as_deref() == Some(page_url) {
            return Err(OracleError::EmptyResponse);
        }
        Ok(vec![RawProductRecord {
            name: Some(format!("Oracle item from {page_url}")),
            price: Some("$5.00".to_owned()),
            availability: Some("In Stock".to_owned()),
            source_url: page_url.to_owned(),
            ..RawProductRecord::default()
        }])
    }
}

// -----------------------------------------------------------------------
// Fixtures
// -----------------------------------------------------------------------

fn options(max_pages: usize) -> ScrapeOptions {
    ScrapeOptions {
        max_pages,
        respect_robots: false,
        use_oracle: false,
        user_agent: "shelfscan-test".to_owned(),
        selectors: CustomSelectors::default(),
        rate_limit: RateLimitConfig::unthrottled(),
        force_engine: None,
    }
}

fn listing(names: &[&str], next: Option<&str>) -> String {
    let cards: String = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            format!(
                r#"<div class="product-card"><h3>{name}</h3><span class="price">$1{i}.00</span><a href="/p/{i}">View</a></div>"#
            )
        })
        .collect();
    let next = next.map_or_else(String::new, |href| format!(r#"<a rel="next" href="{href}">Next</a>"#));
    format!("<html><body><main>{cards}</main>{next}</body></html>")
}

fn empty_page(next: Option<&str>) -> String {
    let next = next.map_or_else(String::new, |href| format!(r#"<a rel="next" href="{href}">Next</a>"#));
    format!("<html><body><p>Nothing to see here.</p>{next}</body></html>")
}

async fn run(agent: &ScrapeAgent, path: &str) -> ScrapeReport {
    agent
        .run(&format!("{BASE}{path}"), &CancelFlag::new())
        .await
        .expect("run should not fail")
}

// -----------------------------------------------------------------------
// Start-of-run checks
// -----------------------------------------------------------------------

#[tokio::test]
async fn oracle_mode_without_oracle_is_a_configuration_error() {
    let site = Arc::new(FakeSite::default().page("/c/1", listing(&["Mug", "Cup"], None)));
    let agent = ScrapeAgent::new(
        ScrapeOptions {
            use_oracle: true,
            ..options(5)
        },
        site.clone(),
    );

    let result = agent.run(&format!("{BASE}/c/1"), &CancelFlag::new()).await;
    assert!(matches!(result, Err(ScraperError::Configuration(_))));
    assert!(site.fetched().is_empty(), "no fetch before configuration checks");
}

#[tokio::test]
async fn invalid_start_url_stops_immediately() {
    let site = Arc::new(FakeSite::default());
    let agent = ScrapeAgent::new(options(5), site.clone());

    for url in ["ftp://shop.example.com/c", "not a url", "https://"] {
        let report = agent.run(url, &CancelFlag::new()).await.unwrap();
        assert_eq!(report.stop_reason, StopReason::InvalidUrl, "{url}");
        assert_eq!(report.pages_visited, 0);
    }
    assert!(site.fetched().is_empty());
}

#[tokio::test]
async fn cancelled_before_start_fetches_nothing() {
    let site = Arc::new(FakeSite::default().page("/c/1", listing(&["Mug", "Cup"], None)));
    let agent = ScrapeAgent::new(options(5), site.clone());
    let cancel = CancelFlag::new();
    cancel.cancel();

    let report = agent.run(&format!("{BASE}/c/1"), &cancel).await.unwrap();
    assert_eq!(report.stop_reason, StopReason::Cancelled);
    assert_eq!(report.pages_visited, 0);
    assert!(site.fetched().is_empty());
}

// -----------------------------------------------------------------------
// Pagination outcomes
// -----------------------------------------------------------------------

#[tokio::test]
async fn follows_next_links_until_chain_ends() {
    let site = Arc::new(
        FakeSite::default()
            .page("/c/1", listing(&["Mug A", "Mug B"], Some("/c/2")))
            .page("/c/2", listing(&["Cup A", "Cup B"], Some("/c/3")))
            .page("/c/3", listing(&["Bowl A", "Bowl B"], None)),
    );
    let agent = ScrapeAgent::new(options(10), site);

    let report = run(&agent, "/c/1").await;
    assert_eq!(report.stop_reason, StopReason::NoNextPage);
    assert_eq!(report.pages_visited, 3);
    assert_eq!(report.products.len(), 6);
    assert!(report.errors.is_empty());

    let bowl = report.products.iter().find(|p| p.name == "Bowl A").unwrap();
    assert_eq!(bowl.source_url, format!("{BASE}/c/3"));
    assert_eq!(bowl.product_url.as_deref(), Some("https://shop.example.com/p/0"));
    assert_eq!(bowl.price_numeric, Some(10.0));
}

#[tokio::test]
async fn page_cap_ends_the_run() {
    let site = Arc::new(
        FakeSite::default()
            .page("/c/1", listing(&["Mug A", "Mug B"], Some("/c/2")))
            .page("/c/2", listing(&["Cup A", "Cup B"], Some("/c/3")))
            .page("/c/3", listing(&["Bowl A", "Bowl B"], None)),
    );
    let agent = ScrapeAgent::new(options(2), site.clone());

    let report = run(&agent, "/c/1").await;
    assert_eq!(report.stop_reason, StopReason::PageCap);
    assert_eq!(report.pages_visited, 2);
    assert!(!site.fetched().contains(&format!("{BASE}/c/3")));
}

#[tokio::test]
async fn two_empty_pages_in_a_row_end_the_run() {
    let site = Arc::new(
        FakeSite::default()
            .page("/c/1", empty_page(Some("/c/2")))
            .page("/c/2", empty_page(Some("/c/3")))
            .page("/c/3", listing(&["Never", "Reached"], None)),
    );
    let agent = ScrapeAgent::new(options(10), site);

    let report = run(&agent, "/c/1").await;
    assert_eq!(report.stop_reason, StopReason::ConsecutiveEmptyPages);
    assert_eq!(report.pages_visited, 2);
    assert!(report.products.is_empty());
}

#[tokio::test]
async fn missing_inferred_page_is_the_end_of_the_chain() {
    let site = Arc::new(FakeSite::default().page("/list?page=1", listing(&["Mug", "Cup"], None)));
    let agent = ScrapeAgent::new(options(10), site.clone());

    let report = run(&agent, "/list?page=1").await;
    assert_eq!(report.stop_reason, StopReason::NoNextPage);
    assert_eq!(report.pages_visited, 1);
    assert_eq!(report.products.len(), 2);
    assert!(report.errors.is_empty());
    assert!(site.fetched().contains(&format!("{BASE}/list?page=2")));
}

#[tokio::test]
async fn duplicates_across_pages_are_removed() {
    let site = Arc::new(
        FakeSite::default()
            .page("/c/1", listing(&["Mug", "Cup"], Some("/c/2")))
            .page("/c/2", listing(&["Mug", "Cup"], None)),
    );
    let agent = ScrapeAgent::new(options(10), site);

    let report = run(&agent, "/c/1").await;
    assert_eq!(report.raw_count, 4);
    assert_eq!(report.products.len(), 2);
    assert_eq!(report.products[0].source_url, format!("{BASE}/c/1"));
}

// -----------------------------------------------------------------------
// Failures
// -----------------------------------------------------------------------

#[tokio::test]
async fn transient_fetch_failure_is_retried_once() {
    let site = Arc::new(
        FakeSite::default()
            .page("/c/1", listing(&["Mug", "Cup"], None))
            .failing("/c/1", 1),
    );
    let agent = ScrapeAgent::new(options(10), site.clone());

    let report = run(&agent, "/c/1").await;
    assert_eq!(report.stop_reason, StopReason::NoNextPage);
    assert_eq!(report.products.len(), 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(site.fetched().len(), 2);
}

#[tokio::test]
async fn second_fetch_failure_keeps_earlier_products() {
    let site = Arc::new(
        FakeSite::default()
            .page("/c/1", listing(&["Mug", "Cup"], Some("/c/2")))
            .page("/c/2", listing(&["Bowl", "Plate"], None))
            .failing("/c/2", 5),
    );
    let agent = ScrapeAgent::new(options(10), site);

    let report = run(&agent, "/c/1").await;
    assert_eq!(report.stop_reason, StopReason::FetchFailed);
    assert_eq!(report.pages_visited, 1);
    assert_eq!(report.products.len(), 2);
    assert_eq!(report.errors.len(), 2);
}

#[tokio::test]
async fn linked_page_that_is_missing_is_a_fetch_failure() {
    let site = Arc::new(FakeSite::default().page("/c/1", listing(&["Mug", "Cup"], Some("/c/2"))));
    let agent = ScrapeAgent::new(options(10), site);

    let report = run(&agent, "/c/1").await;
    assert_eq!(report.stop_reason, StopReason::FetchFailed);
    assert_eq!(report.products.len(), 2);
}

// -----------------------------------------------------------------------
// Robots
// -----------------------------------------------------------------------

#[tokio::test]
async fn robots_disallowed_next_page_stops_the_run() {
    let site = Arc::new(
        FakeSite::default()
            .page("/robots.txt", "User-agent: *\nDisallow: /c/2\n".to_owned())
            .page("/c/1", listing(&["Mug", "Cup"], Some("/c/2")))
            .page("/c/2", listing(&["Bowl", "Plate"], None)),
    );
    let agent = ScrapeAgent::new(
        ScrapeOptions {
            respect_robots: true,
            ..options(10)
        },
        site.clone(),
    );

    let report = run(&agent, "/c/1").await;
    assert_eq!(report.stop_reason, StopReason::RobotsDisallowed);
    assert_eq!(report.products.len(), 2);
    assert!(!site.fetched().contains(&format!("{BASE}/c/2")));
}

#[tokio::test]
async fn robots_disallowed_start_url_fetches_no_page() {
    let site = Arc::new(
        FakeSite::default()
            .page("/robots.txt", "User-agent: *\nDisallow: /\n".to_owned())
            .page("/c/1", listing(&["Mug", "Cup"], None)),
    );
    let agent = ScrapeAgent::new(
        ScrapeOptions {
            respect_robots: true,
            ..options(10)
        },
        site.clone(),
    );

    let report = run(&agent, "/c/1").await;
    assert_eq!(report.stop_reason, StopReason::RobotsDisallowed);
    assert_eq!(report.pages_visited, 0);
    assert_eq!(site.fetched(), vec![format!("{BASE}/robots.txt")]);
}

// -----------------------------------------------------------------------
// Oracle and engines
// -----------------------------------------------------------------------

#[tokio::test]
async fn oracle_errors_count_as_empty_pages() {
    let site = Arc::new(
        FakeSite::default()
            .page("/c/1", listing(&[], Some("/c/2")))
            .page("/c/2", listing(&[], Some("/c/3")))
            .page("/c/3", listing(&[], None)),
    );
    let agent = ScrapeAgent::new(
        ScrapeOptions {
            use_oracle: true,
            ..options(10)
        },
        site,
    )
    .with_oracle(Arc::new(FakeOracle {
        fail_on: Some(format!("{BASE}/c/2")),
    }));

    let report = run(&agent, "/c/1").await;
    assert_eq!(report.stop_reason, StopReason::NoNextPage);
    assert_eq!(report.pages_visited, 3);
    assert_eq!(report.products.len(), 2);
    assert_eq!(report.errors.len(), 1);
    assert!(report
        .products
        .iter()
        .all(|p| p.availability == Availability::InStock));
}

#[tokio::test]
async fn javascript_shell_switches_to_renderer() {
    let shell = r#"<html><body><div id="root"></div><script src="/static/bundle.js"></script></body></html>"#;
    let http = Arc::new(FakeSite::default().page("/c/1", shell.to_owned()));
    let renderer = Arc::new(FakeSite::default().page("/c/1", listing(&["Mug", "Cup"], None)));
    let agent = ScrapeAgent::new(options(10), http).with_renderer(renderer.clone());

    let report = run(&agent, "/c/1").await;
    assert_eq!(report.engine, SiteType::Dynamic);
    assert_eq!(
        report.site_analysis.as_ref().map(|a| a.site_type),
        Some(SiteType::Dynamic)
    );
    assert_eq!(report.products.len(), 2);
    assert_eq!(renderer.fetched().first(), Some(&format!("{BASE}/c/1")));
}

#[tokio::test]
async fn javascript_shell_without_renderer_continues_over_http() {
    let shell = r#"<html><body><div id="root"></div><script src="/static/bundle.js"></script></body></html>"#;
    let http = Arc::new(FakeSite::default().page("/c/1", shell.to_owned()));
    let agent = ScrapeAgent::new(options(10), http);

    let report = run(&agent, "/c/1").await;
    assert_eq!(report.engine, SiteType::Static);
    assert_eq!(report.pages_visited, 1);
    assert!(report.products.is_empty());
}
