//! Next-page discovery for multi-page product listings.
//!
//! The handler is a small state machine: every call to
//! [`PaginationHandler::next_page`] marks the current URL as visited and
//! advances the page counter, then tries, in order:
//!
//! 1. the caller's custom next-page selector,
//! 2. a ladder of common pagination selectors,
//! 3. anchors whose text (or `aria-label`) reads like "next",
//! 4. inference from the URL itself (`?page=N`, `/page/N`, `?start=N`).
//!
//! A URL that was already visited is never returned, so link cycles end the
//! chain instead of looping.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::dom::{attr, compile_ladder, element_text, parse_selector};

const NEXT_PAGE_SELECTORS: [&str; 17] = [
    "a.next",
    "a.next-page",
    "li.next a",
    "li.next-page a",
    ".pagination a.next",
    ".pagination .next a",
    ".pager .next a",
    "a[rel='next']",
    "link[rel='next']",
    "[aria-label='Next']",
    "[aria-label='Next page']",
    "a[data-testid='next-page']",
    "button.next",
    ".pagination-next a",
    "nav[aria-label='pagination'] a:last-child",
    // Amazon
    ".s-pagination-next",
    ".a-last a",
];

const NEXT_PAGE_TEXT: [&str; 11] = [
    "next",
    "next page",
    "next →",
    "next »",
    "→",
    "»",
    "›",
    ">>",
    "load more",
    "show more",
    "view more",
];

const PAGINATION_BAR_SELECTORS: [&str; 6] = [
    ".pagination",
    ".pager",
    ".page-numbers",
    "nav[aria-label*='pagination']",
    ".paginator",
    "[class*='pagination']",
];

const PAGE_PARAMS: [&str; 6] = ["page", "p", "pg", "pagenum", "page_num", "pagenumber"];
const OFFSET_PARAMS: [&str; 4] = ["start", "offset", "from", "begin"];
const PAGE_SIZES: [u64; 8] = [24, 20, 12, 10, 48, 36, 25, 50];

static NEXT_PAGE_LADDER: LazyLock<Vec<(&'static str, Selector)>> =
    LazyLock::new(|| compile_ladder(&NEXT_PAGE_SELECTORS));
static PAGINATION_BARS: LazyLock<Vec<(&'static str, Selector)>> =
    LazyLock::new(|| compile_ladder(&PAGINATION_BAR_SELECTORS));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid link selector"));
static PATH_PAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/page/(\d+)").expect("valid path page regex"));

/// Which discovery strategy produced a next-page URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPageSource {
    Custom,
    Standard,
    LinkText,
    UrlPattern,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextPage {
    pub url: String,
    pub source: NextPageSource,
}

impl NextPage {
    /// `true` when the URL was synthesized from the current URL rather than
    /// read from a link on the page, so the page may not exist.
    #[must_use]
    pub fn is_speculative(&self) -> bool {
        self.source == NextPageSource::UrlPattern
    }
}

/// Pagination state for one run.
#[derive(Debug)]
pub struct PaginationHandler {
    max_pages: usize,
    custom_next: Option<Selector>,
    visited: HashSet<String>,
    current_page: usize,
}

impl PaginationHandler {
    /// `custom_next_selector` is tried before any built-in strategy; an
    /// unparseable selector is ignored.
    #[must_use]
    pub fn new(max_pages: usize, custom_next_selector: Option<&str>) -> Self {
        Self {
            max_pages,
            custom_next: custom_next_selector.and_then(parse_selector),
            visited: HashSet::new(),
            current_page: 0,
        }
    }

    /// Number of pages handed to [`next_page`](Self::next_page) so far.
    #[must_use]
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    #[must_use]
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    #[must_use]
    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(&visit_key(url))
    }

    /// Finds the URL of the page after `current_url`, or `None` when the
    /// page cap is reached or nothing unvisited is found.
    pub fn next_page(&mut self, doc: &Html, current_url: &str) -> Option<NextPage> {
        self.visited.insert(visit_key(current_url));
        self.current_page += 1;

        if self.current_page >= self.max_pages {
            tracing::info!(max_pages = self.max_pages, "reached maximum page limit");
            return None;
        }

        let Ok(base) = Url::parse(current_url) else {
            tracing::warn!(url = current_url, "cannot paginate from unparseable URL");
            return None;
        };

        let found = self
            .find_by_custom(doc, &base)
            .or_else(|| self.find_by_standard_selectors(doc, &base))
            .or_else(|| self.find_by_text(doc, &base))
            .or_else(|| self.find_by_url_pattern(&base));

        match &found {
            Some(next) => {
                tracing::debug!(url = %next.url, source = ?next.source, "found next page");
            }
            None => tracing::info!("no more pages found"),
        }
        found
    }

    /// All unvisited links in the first pagination bar that has any.
    #[must_use]
    pub fn page_urls(&self, doc: &Html, current_url: &str) -> Vec<String> {
        let Ok(base) = Url::parse(current_url) else {
            return Vec::new();
        };

        let mut urls: Vec<String> = Vec::new();
        for (_, selector) in PAGINATION_BARS.iter() {
            let Some(bar) = doc.select(selector).next() else {
                continue;
            };
            for link in bar.select(&LINK) {
                let Some(url) = attr(link, "href")
                    .filter(|href| *href != "#")
                    .and_then(|href| self.unvisited(&base, href))
                else {
                    continue;
                };
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
            if !urls.is_empty() {
                tracing::info!(count = urls.len(), "found page URLs in pagination bar");
                break;
            }
        }
        urls
    }

    /// Clears visited URLs and the page counter.
    pub fn reset(&mut self) {
        self.visited.clear();
        self.current_page = 0;
    }

    fn unvisited(&self, base: &Url, href: &str) -> Option<String> {
        let mut url = base.join(href.trim()).ok()?;
        url.set_fragment(None);
        let url = url.to_string();
        (!self.visited.contains(&url)).then_some(url)
    }

    fn href_from(&self, doc: &Html, selector: &Selector, base: &Url) -> Option<String> {
        let el = doc.select(selector).next()?;
        self.unvisited(base, attr(el, "href")?)
    }

    fn find_by_custom(&self, doc: &Html, base: &Url) -> Option<NextPage> {
        let url = self.href_from(doc, self.custom_next.as_ref()?, base)?;
        Some(NextPage {
            url,
            source: NextPageSource::Custom,
        })
    }

    fn find_by_standard_selectors(&self, doc: &Html, base: &Url) -> Option<NextPage> {
        NEXT_PAGE_LADDER.iter().find_map(|(_, selector)| {
            self.href_from(doc, selector, base).map(|url| NextPage {
                url,
                source: NextPageSource::Standard,
            })
        })
    }

    fn find_by_text(&self, doc: &Html, base: &Url) -> Option<NextPage> {
        let url = NEXT_PAGE_TEXT.iter().find_map(|pattern| {
            let by_text = doc.select(&LINK).find_map(|link| {
                let text = element_text(link).to_lowercase();
                if text != *pattern && !text.starts_with(pattern) {
                    return None;
                }
                self.link_target(link, base)
            });
            by_text.or_else(|| {
                doc.select(&LINK).find_map(|link| {
                    let label = attr(link, "aria-label")?.to_lowercase();
                    if label.contains(pattern) {
                        self.link_target(link, base)
                    } else {
                        None
                    }
                })
            })
        })?;
        Some(NextPage {
            url,
            source: NextPageSource::LinkText,
        })
    }

    fn link_target(&self, link: scraper::ElementRef<'_>, base: &Url) -> Option<String> {
        let href = attr(link, "href").filter(|href| *href != "#")?;
        self.unvisited(base, href)
    }

    /// Synthesizes the next URL from page-number, path, or offset patterns.
    fn find_by_url_pattern(&self, base: &Url) -> Option<NextPage> {
        let pairs: Vec<(String, String)> = base.query_pairs().into_owned().collect();
        let accept = |url: Url| {
            let url = url.to_string();
            (!self.visited.contains(&url)).then_some(url)
        };

        let by_page = PAGE_PARAMS.iter().find_map(|param| {
            let next = query_number(&pairs, param)?.checked_add(1)?;
            accept(with_query_value(base, &pairs, param, next))
        });

        let by_path = || {
            let caps = PATH_PAGE_RE.captures(base.path())?;
            let current: u64 = caps[1].parse().ok()?;
            let next = current.checked_add(1)?;
            let path = base
                .path()
                .replace(&format!("/page/{current}"), &format!("/page/{next}"));
            let mut url = base.clone();
            url.set_path(&path);
            url.set_fragment(None);
            accept(url)
        };

        let by_offset = || {
            OFFSET_PARAMS.iter().find_map(|param| {
                let current = query_number(&pairs, param)?;
                PAGE_SIZES.iter().find_map(|size| {
                    let next = current.checked_add(*size)?;
                    accept(with_query_value(base, &pairs, param, next))
                })
            })
        };

        let url = by_page.or_else(by_path).or_else(by_offset)?;
        Some(NextPage {
            url,
            source: NextPageSource::UrlPattern,
        })
    }
}

/// Visited-set key: the parsed URL without its fragment, or the raw string
/// when it does not parse.
fn visit_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

fn query_number(pairs: &[(String, String)], name: &str) -> Option<u64> {
    pairs
        .iter()
        .find(|(key, _)| key == name)
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// Rebuilds `base` with `name` set to `value`, keeping other parameters in
/// their original order.
fn with_query_value(base: &Url, pairs: &[(String, String)], name: &str, value: u64) -> Url {
    let value = value.to_string();
    let mut replaced = false;
    let mut url = base.clone();
    url.set_fragment(None);
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (key, current) in pairs {
            if key != name {
                query.append_pair(key, current);
            } else if !replaced {
                query.append_pair(key, &value);
                replaced = true;
            }
        }
    }
    url
}
