//! Small helpers over `scraper`'s DOM shared by the locator, extractor, and
//! pagination handler.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};
use url::Url;

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Parses a CSS selector, logging and discarding ones the engine rejects.
pub(crate) fn parse_selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::debug!(selector = css, error = %e, "skipping unparseable selector");
            None
        }
    }
}

/// Compiles a static selector ladder, preserving order and dropping entries
/// that fail to parse.
pub(crate) fn compile_ladder(patterns: &[&'static str]) -> Vec<(&'static str, Selector)> {
    patterns
        .iter()
        .filter_map(|css| parse_selector(css).map(|sel| (*css, sel)))
        .collect()
}

/// Collapses runs of whitespace to single spaces and trims.
#[must_use]
pub fn clean_text(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Concatenated text of an element and its descendants, whitespace-collapsed.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<String>())
}

/// Raw concatenated text, without whitespace normalization.
pub(crate) fn raw_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Direct element children of `el`, skipping text and comment nodes.
pub(crate) fn element_children(el: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    el.children().filter_map(ElementRef::wrap).collect()
}

/// A non-empty, trimmed attribute value.
pub(crate) fn attr<'a>(el: ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolves `href` against `base`, returning an absolute URL string.
pub(crate) fn resolve_url(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(String::from)
}
