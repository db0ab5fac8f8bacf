//! Per-container field extraction.
//!
//! Each field is an ordered list of strategies `(&FieldExtractor, container)
//! -> Option<T>`, evaluated left to right; the first `Some` wins. Custom
//! selectors always come first, schema.org microdata second, then named
//! selector ladders, then whole-container text heuristics.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};
use shelfscan_core::{Availability, CustomSelectors, RawProductRecord};
use url::Url;

use crate::dom::{attr, compile_ladder, element_text, parse_selector, raw_text, resolve_url};

type Strategy<T> = fn(&FieldExtractor, ElementRef<'_>) -> Option<T>;

const NAME_SELECTORS: [&str; 20] = [
    "[data-testid='product-name']",
    "[data-testid='product-title']",
    ".product-name",
    ".product-title",
    ".product-heading",
    ".item-name",
    ".item-title",
    "h2 a",
    "h3 a",
    "h4 a",
    "h2",
    "h3",
    "h4",
    ".title a",
    ".name a",
    "[class*='product-name']",
    "[class*='product-title']",
    "[class*='productName']",
    "[class*='productTitle']",
    "a.product-link",
];

const PRICE_SELECTORS: [&str; 16] = [
    "[data-testid='product-price']",
    "[data-testid='price']",
    ".price",
    ".product-price",
    ".item-price",
    ".sale-price",
    ".current-price",
    ".a-price .a-offscreen",
    ".a-price",
    "span[data-price]",
    "[class*='price']",
    "[class*='Price']",
    ".cost",
    ".amount",
    "ins .amount",
    ".special-price",
];

const AVAILABILITY_SELECTORS: [&str; 7] = [
    ".availability",
    ".stock-status",
    ".stock",
    "[data-testid='availability']",
    "[class*='availability']",
    "[class*='stock']",
    ".product-availability",
];

const IMAGE_SELECTORS: [&str; 10] = [
    ".product-image img",
    ".product-img img",
    ".item-image img",
    ".thumbnail img",
    "[data-testid='product-image'] img",
    "img.product-image",
    "img.product-img",
    "[class*='product-image'] img",
    "[class*='productImage'] img",
    "img",
];

/// Lazy-loading aware attribute cascade for image sources.
const IMAGE_SOURCE_ATTRS: [&str; 8] = [
    "src",
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-srcset",
    "srcset",
    "data-image",
    "data-zoom-image",
];

const IMAGE_SKIP_MARKERS: [&str; 11] = [
    "icon",
    "logo",
    "badge",
    "placeholder",
    "blank",
    "pixel",
    "spacer",
    "loading",
    "spinner",
    "1x1",
    "transparent",
];

const PRODUCT_PATH_MARKERS: [&str; 5] = ["/product", "/item", "/p/", "/dp/", "/pd/"];

const IN_STOCK_MARKERS: [&str; 7] = [
    "in stock",
    "available",
    "add to cart",
    "buy now",
    "add to bag",
    "in-stock",
    "ships from",
];

const OUT_OF_STOCK_MARKERS: [&str; 7] = [
    "out of stock",
    "sold out",
    "unavailable",
    "not available",
    "out-of-stock",
    "currently unavailable",
    "notify me",
];

/// Price shapes tried in order over free text; the first pattern with any
/// match wins.
static PRICE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"[\$€£¥₹]\s*[\d,]+\.?\d*",
        r"[\d,]+\.?\d*\s*[\$€£¥₹]",
        r"[\d,]+\.\d{2}",
        r"(?:USD|EUR|GBP|INR)\s*[\d,]+\.?\d*",
        r"[\d,]+\.?\d*\s*(?:USD|EUR|GBP|INR)",
        r"Price:\s*[\$€£¥₹]?\s*[\d,]+\.?\d*",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid price regex"))
    .collect()
});

static NAME_LADDER: LazyLock<Vec<(&'static str, Selector)>> =
    LazyLock::new(|| compile_ladder(&NAME_SELECTORS));
static PRICE_LADDER: LazyLock<Vec<(&'static str, Selector)>> =
    LazyLock::new(|| compile_ladder(&PRICE_SELECTORS));
static AVAILABILITY_LADDER: LazyLock<Vec<(&'static str, Selector)>> =
    LazyLock::new(|| compile_ladder(&AVAILABILITY_SELECTORS));
static IMAGE_LADDER: LazyLock<Vec<(&'static str, Selector)>> =
    LazyLock::new(|| compile_ladder(&IMAGE_SELECTORS));

static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid link selector"));
static NAME_LINKS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h2 a, h3 a, h4 a, .product-name a, .product-title a")
        .expect("valid name link selector")
});
static ITEMPROP_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop='name']").expect("valid itemprop selector"));
static ITEMPROP_PRICE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop='price']").expect("valid itemprop selector"));
static ITEMPROP_AVAILABILITY: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[itemprop='availability']").expect("valid itemprop selector")
});
static ITEMPROP_URL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop='url']").expect("valid itemprop selector"));
static ITEMPROP_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop='image']").expect("valid itemprop selector"));

/// Finds the first price-shaped substring in `text`.
#[must_use]
pub fn extract_price_text(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    PRICE_PATTERNS
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| crate::dom::clean_text(m.as_str()))
}

/// Classifies free text into a stock status.
///
/// Out-of-stock markers are checked before in-stock ones, so text carrying
/// both ("in stock at other stores, out of stock here") reads as out of stock.
#[must_use]
pub fn classify_availability(text: &str) -> Availability {
    let lowered = text.to_lowercase();
    if OUT_OF_STOCK_MARKERS.iter().any(|m| lowered.contains(m)) {
        Availability::OutOfStock
    } else if IN_STOCK_MARKERS.iter().any(|m| lowered.contains(m)) {
        Availability::InStock
    } else {
        Availability::Unknown
    }
}

/// Custom selectors compiled once per run.
#[derive(Debug, Default)]
struct CompiledCustom {
    name: Option<Selector>,
    price: Option<Selector>,
    availability: Option<Selector>,
    url: Option<Selector>,
    image: Option<Selector>,
}

/// Extracts [`RawProductRecord`]s from product containers of one page.
#[derive(Debug)]
pub struct FieldExtractor {
    base_url: Url,
    custom: CompiledCustom,
}

impl FieldExtractor {
    /// `base_url` is the page the containers came from; relative links and
    /// image sources are resolved against it.
    #[must_use]
    pub fn new(base_url: Url, selectors: &CustomSelectors) -> Self {
        let compile = |css: &Option<String>| css.as_deref().and_then(parse_selector);
        Self {
            base_url,
            custom: CompiledCustom {
                name: compile(&selectors.name),
                price: compile(&selectors.price),
                availability: compile(&selectors.availability),
                url: compile(&selectors.url),
                image: compile(&selectors.image),
            },
        }
    }

    /// Extracts one record, or `None` when the container has neither a name
    /// nor a price.
    #[must_use]
    pub fn extract_fields(&self, container: ElementRef<'_>) -> Option<RawProductRecord> {
        let record = RawProductRecord {
            name: self.run(NAME_STRATEGIES, container),
            price: self.run(PRICE_STRATEGIES, container),
            availability: Some(
                self.run(AVAILABILITY_STRATEGIES, container)
                    .unwrap_or_default()
                    .as_str()
                    .to_string(),
            ),
            product_url: self.run(URL_STRATEGIES, container),
            image_url: self.run(IMAGE_STRATEGIES, container),
            source_url: self.base_url.to_string(),
        };

        if record.has_identity() {
            Some(record)
        } else {
            tracing::trace!("skipping container without name or price");
            None
        }
    }

    /// Extracts every container independently; containers that yield nothing
    /// are dropped without affecting the rest.
    #[must_use]
    pub fn extract_all(&self, containers: &[ElementRef<'_>]) -> Vec<RawProductRecord> {
        let records: Vec<RawProductRecord> = containers
            .iter()
            .filter_map(|c| self.extract_fields(*c))
            .collect();
        tracing::info!(
            products = records.len(),
            containers = containers.len(),
            "parsed products from containers"
        );
        records
    }

    fn run<T>(&self, strategies: &[Strategy<T>], container: ElementRef<'_>) -> Option<T> {
        strategies.iter().find_map(|strategy| strategy(self, container))
    }

    fn resolve(&self, href: &str) -> Option<String> {
        resolve_url(&self.base_url, href)
    }
}

// ----- name -----

const NAME_STRATEGIES: &[Strategy<String>] =
    &[name_custom, name_itemprop, name_selectors, name_link_text];

fn name_custom(fx: &FieldExtractor, c: ElementRef<'_>) -> Option<String> {
    let el = c.select(fx.custom.name.as_ref()?).next()?;
    Some(element_text(el)).filter(|t| !t.is_empty())
}

fn name_itemprop(_: &FieldExtractor, c: ElementRef<'_>) -> Option<String> {
    let el = c.select(&ITEMPROP_NAME).next()?;
    let text = attr(el, "content").map_or_else(|| element_text(el), crate::dom::clean_text);
    Some(text).filter(|t| !t.is_empty())
}

fn name_selectors(_: &FieldExtractor, c: ElementRef<'_>) -> Option<String> {
    NAME_LADDER.iter().find_map(|(_, selector)| {
        let el = c.select(selector).next()?;
        let text = element_text(el);
        (text.chars().count() > 2).then_some(text)
    })
}

fn name_link_text(_: &FieldExtractor, c: ElementRef<'_>) -> Option<String> {
    c.select(&LINK).map(element_text).find(|text| {
        text.chars().count() > 5 && !text.starts_with("http") && !text.starts_with("www")
    })
}

// ----- price -----

const PRICE_STRATEGIES: &[Strategy<String>] =
    &[price_custom, price_itemprop, price_selectors, price_full_text];

fn price_custom(fx: &FieldExtractor, c: ElementRef<'_>) -> Option<String> {
    let el = c.select(fx.custom.price.as_ref()?).next()?;
    extract_price_text(&raw_text(el))
}

fn price_itemprop(_: &FieldExtractor, c: ElementRef<'_>) -> Option<String> {
    let el = c.select(&ITEMPROP_PRICE).next()?;
    let value = attr(el, "content").map_or_else(|| element_text(el), crate::dom::clean_text);
    Some(value).filter(|v| !v.is_empty())
}

fn price_selectors(_: &FieldExtractor, c: ElementRef<'_>) -> Option<String> {
    PRICE_LADDER.iter().find_map(|(_, selector)| {
        let el = c.select(selector).next()?;
        if let Some(embedded) = attr(el, "data-price").or_else(|| attr(el, "content")) {
            return Some(crate::dom::clean_text(embedded));
        }
        extract_price_text(&raw_text(el))
    })
}

fn price_full_text(_: &FieldExtractor, c: ElementRef<'_>) -> Option<String> {
    extract_price_text(&raw_text(c))
}

// ----- availability -----

const AVAILABILITY_STRATEGIES: &[Strategy<Availability>] = &[
    availability_custom,
    availability_itemprop,
    availability_selectors,
    availability_full_text,
];

fn availability_custom(fx: &FieldExtractor, c: ElementRef<'_>) -> Option<Availability> {
    let el = c.select(fx.custom.availability.as_ref()?).next()?;
    Some(classify_availability(&raw_text(el)))
}

/// schema.org `InStock` / `OutOfStock` tokens in `content` or `href`.
fn availability_itemprop(_: &FieldExtractor, c: ElementRef<'_>) -> Option<Availability> {
    let el = c.select(&ITEMPROP_AVAILABILITY).next()?;
    let token = attr(el, "content").or_else(|| attr(el, "href"))?.to_lowercase();
    if token.contains("instock") {
        Some(Availability::InStock)
    } else if token.contains("outofstock") {
        Some(Availability::OutOfStock)
    } else {
        None
    }
}

fn availability_selectors(_: &FieldExtractor, c: ElementRef<'_>) -> Option<Availability> {
    AVAILABILITY_LADDER
        .iter()
        .find_map(|(_, selector)| c.select(selector).next())
        .map(|el| classify_availability(&raw_text(el)))
}

fn availability_full_text(_: &FieldExtractor, c: ElementRef<'_>) -> Option<Availability> {
    Some(classify_availability(&raw_text(c)))
}

// ----- product url -----

const URL_STRATEGIES: &[Strategy<String>] = &[
    url_custom,
    url_itemprop,
    url_name_link,
    url_product_path,
    url_first_link,
];

fn url_custom(fx: &FieldExtractor, c: ElementRef<'_>) -> Option<String> {
    let el = c.select(fx.custom.url.as_ref()?).next()?;
    fx.resolve(attr(el, "href")?)
}

fn url_itemprop(fx: &FieldExtractor, c: ElementRef<'_>) -> Option<String> {
    let el = c.select(&ITEMPROP_URL).next()?;
    fx.resolve(attr(el, "href").or_else(|| attr(el, "content"))?)
}

fn url_name_link(fx: &FieldExtractor, c: ElementRef<'_>) -> Option<String> {
    let el = c.select(&NAME_LINKS).next()?;
    fx.resolve(attr(el, "href")?)
}

fn url_product_path(fx: &FieldExtractor, c: ElementRef<'_>) -> Option<String> {
    c.select(&LINK)
        .filter_map(|a| attr(a, "href"))
        .find(|href| {
            let lowered = href.to_lowercase();
            PRODUCT_PATH_MARKERS.iter().any(|m| lowered.contains(m))
        })
        .and_then(|href| fx.resolve(href))
}

fn url_first_link(fx: &FieldExtractor, c: ElementRef<'_>) -> Option<String> {
    let first = c.select(&LINK).next()?;
    let href = attr(first, "href")?;
    if href == "#" {
        return None;
    }
    fx.resolve(href)
}

// ----- image url -----

const IMAGE_STRATEGIES: &[Strategy<String>] = &[image_custom, image_itemprop, image_selectors];

fn image_custom(fx: &FieldExtractor, c: ElementRef<'_>) -> Option<String> {
    let el = c.select(fx.custom.image.as_ref()?).next()?;
    fx.resolve(&image_source(el)?)
}

fn image_itemprop(fx: &FieldExtractor, c: ElementRef<'_>) -> Option<String> {
    let el = c.select(&ITEMPROP_IMAGE).next()?;
    let src = image_source(el).or_else(|| attr(el, "content").map(str::to_string))?;
    fx.resolve(&src)
}

fn image_selectors(fx: &FieldExtractor, c: ElementRef<'_>) -> Option<String> {
    IMAGE_LADDER.iter().find_map(|(_, selector)| {
        let el = c.select(selector).next()?;
        let src = image_source(el)?;
        if is_icon_or_placeholder(&src) {
            return None;
        }
        fx.resolve(&src)
    })
}

/// Best image source on an element, following lazy-load attributes and
/// taking the first URL of a `srcset`-style list. `data:` URIs are skipped.
fn image_source(el: ElementRef<'_>) -> Option<String> {
    IMAGE_SOURCE_ATTRS.iter().find_map(|name| {
        let value = attr(el, name)?;
        let candidate = if value.contains(',') || name.ends_with("srcset") {
            value
                .split(',')
                .next()
                .unwrap_or_default()
                .split_whitespace()
                .next()
                .unwrap_or_default()
        } else {
            value
        };
        (!candidate.is_empty() && !candidate.starts_with("data:")).then(|| candidate.to_string())
    })
}

fn is_icon_or_placeholder(src: &str) -> bool {
    let lowered = src.to_lowercase();
    IMAGE_SKIP_MARKERS.iter().any(|m| lowered.contains(m))
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
