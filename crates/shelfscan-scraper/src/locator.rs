//! Product container locator.
//!
//! Finds the repeated elements that each hold one product on a listing page,
//! without any per-site schema. Three tiers, first hit wins:
//!
//! 1. A caller-supplied selector, accepted with a single match.
//! 2. A fixed specificity ladder: precise data attributes and schema.org
//!    markup first, generic class-name substrings last. A pattern must match
//!    at least two elements to count as a listing.
//! 3. A structural heuristic over list-like parents whose children look like
//!    priced, linked items.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::dom::{compile_ladder, element_children, parse_selector, raw_text};

/// A listing needs at least this many matches from a ladder pattern.
pub const MIN_LISTING_MATCHES: usize = 2;

const CONTAINER_PATTERNS: [&str; 38] = [
    // Data attributes
    "[data-component-type='s-search-result']",
    "[data-testid='product-card']",
    "[data-product-id]",
    "[data-item-id]",
    "[data-pid]",
    "[data-sku]",
    // Schema.org markup
    "[itemtype*='schema.org/Product']",
    "[typeof='Product']",
    // Common class patterns
    ".product-card",
    ".product-item",
    ".product-tile",
    ".product-grid-item",
    ".product-listing",
    ".product",
    ".s-result-item",
    ".grid-item",
    ".listing-item",
    ".search-result",
    // Platform specific
    ".shopify-section product",
    ".woocommerce-loop-product",
    "li.product",
    ".col .product-miniature",
    // Class substrings in the usual casings
    "[class*='product-card']",
    "[class*='product-item']",
    "[class*='ProductCard']",
    "[class*='productCard']",
    "[class*='product_card']",
    "[class*='product_pod']",
    "[class*='product_item']",
    "[class*='productItem']",
    "[class*='ProductItem']",
    // Article-based
    "article.product_pod",
    "article.product",
    "article[class*='product']",
    // Div-based
    "div[class*='product']",
    "div[class*='Product']",
    // List-based
    "li[class*='product']",
    "li[class*='Product']",
];

static CONTAINER_LADDER: LazyLock<Vec<(&'static str, Selector)>> =
    LazyLock::new(|| compile_ladder(&CONTAINER_PATTERNS));

static LIST_PARENTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul, ol, div, section").expect("valid list parent selector"));

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("valid anchor selector"));

static PRICE_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\$€£¥₹]\s*\d+|[\d,]+\.\d{2}").expect("valid price anchor regex")
});

const CURRENCY_MARKERS: [&str; 6] = ["$", "€", "£", "¥", "₹", "price"];

/// Locates product containers on a parsed listing page.
///
/// Returns an empty list when nothing plausible is found; that is a normal
/// outcome, not an error.
#[must_use]
pub fn locate_containers<'a>(doc: &'a Html, custom_selector: Option<&str>) -> Vec<ElementRef<'a>> {
    if let Some(selector) = custom_selector.and_then(parse_selector) {
        let found: Vec<ElementRef<'a>> = doc.select(&selector).collect();
        if !found.is_empty() {
            tracing::debug!(count = found.len(), "containers found via custom selector");
            return found;
        }
    }

    for (pattern, selector) in CONTAINER_LADDER.iter() {
        let found: Vec<ElementRef<'a>> = doc.select(selector).collect();
        if found.len() >= MIN_LISTING_MATCHES {
            tracing::info!(count = found.len(), selector = pattern, "found product containers");
            return found;
        }
    }

    tracing::warn!("no standard product containers found, trying structural heuristic");
    heuristic_containers(doc)
}

/// Scans list-like parents in document order and returns the children of the
/// first one whose children look like a product grid.
fn heuristic_containers(doc: &Html) -> Vec<ElementRef<'_>> {
    for parent in doc.select(&LIST_PARENTS) {
        let children = element_children(parent);
        if looks_like_listing(&children) {
            tracing::info!(count = children.len(), "heuristic found potential product containers");
            return children;
        }
    }
    Vec::new()
}

fn looks_like_listing(children: &[ElementRef<'_>]) -> bool {
    if children.len() < 3 {
        return false;
    }

    let tags: HashSet<&str> = children.iter().map(|c| c.value().name()).collect();
    if tags.len() > 2 {
        return false;
    }

    let priced = children
        .iter()
        .filter(|c| {
            let text = raw_text(**c);
            CURRENCY_MARKERS.iter().any(|m| text.contains(m))
        })
        .count();
    let linked = children
        .iter()
        .filter(|c| c.select(&ANCHOR).next().is_some())
        .count();

    priced * 2 >= children.len() && linked * 2 >= children.len()
}

/// Last-resort container search anchored on the first price-looking text.
///
/// Walks from the first matching text node to its nearest
/// `div`/`li`/`article`/`section`, then to that element's nearest
/// `div`/`li`/`article`/`section`/`ul` ancestor, and returns the latter's
/// element children when there are at least two.
#[must_use]
pub fn price_anchored_fallback(doc: &Html) -> Vec<ElementRef<'_>> {
    const ITEM_TAGS: [&str; 4] = ["div", "li", "article", "section"];
    const GROUP_TAGS: [&str; 5] = ["div", "li", "article", "section", "ul"];

    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        if !PRICE_ANCHOR_RE.is_match(text) {
            continue;
        }
        let in_code = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| matches!(a.value().name(), "script" | "style" | "noscript"));
        if in_code {
            continue;
        }

        let Some(item) = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| ITEM_TAGS.contains(&a.value().name()))
        else {
            continue;
        };
        let Some(group) = item
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| GROUP_TAGS.contains(&a.value().name()))
        else {
            continue;
        };

        let children = element_children(group);
        if children.len() >= MIN_LISTING_MATCHES {
            tracing::info!(count = children.len(), "price-anchored fallback found containers");
            return children;
        }
        return Vec::new();
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(found: &[ElementRef<'_>]) -> Vec<String> {
        found
            .iter()
            .map(|e| e.value().attr("id").unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn single_match_is_not_a_listing() {
        let html = r#"<html><body>
            <div class="product-card" id="a">Mug $5</div>
            <p>nothing else</p>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let found = locate_containers(&doc, None);
        assert!(
            found.iter().all(|e| e.value().attr("id") != Some("a")),
            "a single .product-card must not be accepted"
        );
    }

    #[test]
    fn two_matches_form_a_listing() {
        let html = r#"<html><body>
            <div class="product-card" id="a">Mug $5</div>
            <div class="product-card" id="b">Cup $6</div>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let found = locate_containers(&doc, None);
        assert_eq!(names(&found), vec!["a", "b"]);
    }

    #[test]
    fn specific_patterns_beat_generic_ones() {
        let html = r#"<html><body>
            <nav class="product-nav"><div class="product-menu">x</div><div class="product-menu">y</div></nav>
            <div data-product-id="1" id="p1">Mug</div>
            <div data-product-id="2" id="p2">Cup</div>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let found = locate_containers(&doc, None);
        assert_eq!(names(&found), vec!["p1", "p2"]);
    }

    #[test]
    fn custom_selector_accepts_single_match() {
        let html = r#"<html><body><section class="tile" id="only">Mug $5</section></body></html>"#;
        let doc = Html::parse_document(html);
        let found = locate_containers(&doc, Some("section.tile"));
        assert_eq!(names(&found), vec!["only"]);
    }

    #[test]
    fn invalid_custom_selector_falls_through() {
        let html = r#"<html><body>
            <li class="product" id="a"><a href="/a">A</a> $1</li>
            <li class="product" id="b"><a href="/b">B</a> $2</li>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let found = locate_containers(&doc, Some("li[[["));
        assert_eq!(names(&found), vec!["a", "b"]);
    }

    #[test]
    fn heuristic_finds_priced_linked_grid() {
        let html = r#"<html><body>
            <ul id="menu"><li>Home</li><li>About</li><li>Contact</li></ul>
            <ul id="grid">
                <li id="g1"><a href="/g1">Lamp</a><span>$10.00</span></li>
                <li id="g2"><a href="/g2">Desk</a><span>$99.00</span></li>
                <li id="g3"><a href="/g3">Chair</a><span>$45.00</span></li>
            </ul>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let found = locate_containers(&doc, None);
        assert_eq!(names(&found), vec!["g1", "g2", "g3"]);
    }

    #[test]
    fn heuristic_rejects_mixed_tags_and_missing_links() {
        let mixed = Html::parse_fragment(
            r#"<div><p><a href="/">a</a>$1</p><span><a href="/">b</a>$2</span><em><a href="/">c</a>$3</em></div>"#,
        );
        let div = mixed
            .select(&Selector::parse("div").unwrap())
            .next()
            .unwrap();
        assert!(!looks_like_listing(&element_children(div)));

        let unlinked = Html::parse_fragment("<ul><li>$1</li><li>$2</li><li>$3</li></ul>");
        let ul = unlinked
            .select(&Selector::parse("ul").unwrap())
            .next()
            .unwrap();
        assert!(!looks_like_listing(&element_children(ul)));
    }

    #[test]
    fn returns_empty_when_nothing_matches() {
        let doc = Html::parse_document("<html><body><p>About us</p></body></html>");
        assert!(locate_containers(&doc, None).is_empty());
    }

    #[test]
    fn price_anchored_fallback_uses_grandparent_children() {
        let html = r#"<html><body>
            <section id="wrap">
                <div id="c1"><span>Lamp</span><div><b>$10.00</b></div></div>
                <div id="c2"><span>Desk</span><div><b>$20.00</b></div></div>
            </section>
        </body></html>"#;
        let doc = Html::parse_document(html);
        // <b> → nearest div is the inner <div>, its nearest group ancestor is c1,
        // whose element children are the <span> and the inner <div>.
        let found = price_anchored_fallback(&doc);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].value().name(), "span");
    }

    #[test]
    fn price_anchored_fallback_empty_without_prices() {
        let doc = Html::parse_document("<html><body><div><p>No prices</p></div></body></html>");
        assert!(price_anchored_fallback(&doc).is_empty());
    }
}
