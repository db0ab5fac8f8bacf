//! Static-vs-dynamic site classification.
//!
//! Looks at the HTML of the first page only. A page is "dynamic" when it
//! appears to need JavaScript to render its product grid, which means the
//! plain HTTP engine will likely see an empty shell.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::Serialize;

const JS_FRAMEWORK_INDICATORS: [&str; 19] = [
    "react",
    "angular",
    "vue",
    "__NEXT_DATA__",
    "__NUXT__",
    "window.__INITIAL_STATE__",
    "window.__PRELOADED_STATE__",
    "data-reactroot",
    "data-reactid",
    "ng-app",
    "ng-controller",
    "v-app",
    "v-cloak",
    "data-v-",
    "_app.js",
    "_buildManifest.js",
    "webpack",
    "bundle.js",
    "chunk.js",
];

const PRODUCT_CLASS_INDICATORS: [&str; 8] = [
    "product",
    "item",
    "listing",
    "card",
    "goods",
    "price",
    "add-to-cart",
    "buy-now",
];

const NOSCRIPT_PHRASES: [&str; 2] = ["enable javascript", "requires javascript"];

/// Body text shorter than this (with few children) reads as an empty shell.
const MIN_BODY_TEXT_CHARS: usize = 200;
const MIN_BODY_CHILDREN: usize = 10;

static CLASSED: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[class]").expect("valid class selector"));
static NOSCRIPT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("noscript").expect("valid noscript selector"));
static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid body selector"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteType {
    Static,
    Dynamic,
}

impl std::fmt::Display for SiteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SiteType::Static => "static",
            SiteType::Dynamic => "dynamic",
        })
    }
}

/// Evidence behind a [`SiteType`] decision.
#[derive(Debug, Clone, Serialize)]
pub struct SiteAnalysis {
    pub site_type: SiteType,
    pub confidence: f64,
    pub js_frameworks_found: Vec<&'static str>,
    /// `(class substring, element count)` for each product indicator seen.
    pub product_indicators_found: Vec<(&'static str, usize)>,
    pub noscript_fallback: bool,
}

/// Classifies a page from its HTML.
#[must_use]
pub fn detect_site(html: &str) -> SiteAnalysis {
    let html_lower = html.to_lowercase();
    let js_frameworks_found: Vec<&'static str> = JS_FRAMEWORK_INDICATORS
        .into_iter()
        .filter(|indicator| html_lower.contains(&indicator.to_lowercase()))
        .collect();

    let doc = Html::parse_document(html);

    let classes: Vec<String> = doc
        .select(&CLASSED)
        .filter_map(|el| el.value().attr("class"))
        .map(str::to_lowercase)
        .collect();
    let product_indicators_found: Vec<(&'static str, usize)> = PRODUCT_CLASS_INDICATORS
        .into_iter()
        .filter_map(|indicator| {
            let count = classes.iter().filter(|c| c.contains(indicator)).count();
            (count > 0).then_some((indicator, count))
        })
        .collect();

    let noscript_text = doc
        .select(&NOSCRIPT)
        .flat_map(|el| el.text())
        .collect::<String>()
        .to_lowercase();
    let noscript_fallback = NOSCRIPT_PHRASES.iter().any(|p| noscript_text.contains(p));

    let (body_text_chars, body_children) = doc.select(&BODY).next().map_or((0, 0), |body| {
        let text_chars: usize = body.text().map(|t| t.trim().chars().count()).sum();
        (text_chars, body.children().count())
    });

    let js_score = js_frameworks_found.len();
    let content_score = product_indicators_found.len();

    let (site_type, confidence) = if js_score >= 3 {
        (SiteType::Dynamic, 0.9)
    } else if js_score >= 1 && content_score == 0 {
        (SiteType::Dynamic, 0.8)
    } else if body_text_chars < MIN_BODY_TEXT_CHARS && body_children < MIN_BODY_CHILDREN {
        (SiteType::Dynamic, 0.7)
    } else if noscript_fallback {
        (SiteType::Dynamic, 0.6)
    } else if content_score > 0 {
        (SiteType::Static, 0.9)
    } else {
        (SiteType::Static, 0.5)
    };

    tracing::info!(%site_type, confidence, "site type detected");
    tracing::debug!(?js_frameworks_found, ?product_indicators_found, "site detection evidence");

    SiteAnalysis {
        site_type,
        confidence,
        js_frameworks_found,
        product_indicators_found,
        noscript_fallback,
    }
}
