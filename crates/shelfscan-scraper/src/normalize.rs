//! Cleaning and de-duplication from [`RawProductRecord`] to
//! [`CleanedProductRecord`].
//!
//! Every function here is idempotent: cleaning an already-cleaned record
//! yields the same record.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use shelfscan_core::{Availability, CleanedProductRecord, RawProductRecord};
use url::Url;

use crate::dom::clean_text;

/// Names longer than this are truncated with a `...` suffix.
const MAX_NAME_CHARS: usize = 300;
const MIN_NAME_CHARS: usize = 2;

const OUT_OF_STOCK_WORDS: [&str; 5] = [
    "out of stock",
    "sold out",
    "unavailable",
    "not available",
    "out-of-stock",
];
const IN_STOCK_WORDS: [&str; 3] = ["in stock", "available", "in-stock"];
const PRE_ORDER_WORDS: [&str; 3] = ["pre-order", "preorder", "coming soon"];
const LIMITED_WORDS: [&str; 3] = ["limited", "few left", "low stock"];

static NAME_JUNK: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^(New|Sale|Hot|Best Seller|Trending)[\s!:|-]+",
        r"(?i)\s*\(?\d+\s*reviews?\)?$",
        r"\s*-\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid name junk regex"))
    .collect()
});

static PRICE_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\$€£¥₹]?\s*\d(?:[\d.,]*\d)?\s*[\$€£¥₹]?").expect("valid price text regex")
});

/// Cleans every record and removes duplicates, keeping first occurrences.
#[must_use]
pub fn clean_products(raw: &[RawProductRecord]) -> Vec<CleanedProductRecord> {
    let cleaned: Vec<CleanedProductRecord> = raw.iter().filter_map(clean_record).collect();
    let before = cleaned.len();
    let unique = dedupe(cleaned);

    let removed = before - unique.len();
    if removed > 0 {
        tracing::info!(removed, "removed duplicate products");
    }
    tracing::info!(retained = unique.len(), dropped = raw.len() - before, "cleaned products");
    unique
}

/// Cleans a single record. Returns `None` when no usable name survives.
#[must_use]
pub fn clean_record(raw: &RawProductRecord) -> Option<CleanedProductRecord> {
    let name = raw.name.as_deref().map(clean_name)?;
    if name.chars().count() < MIN_NAME_CHARS {
        return None;
    }

    let price = raw.price.as_deref().and_then(clean_price);
    let price_numeric = price.as_deref().and_then(parse_price_numeric);

    Some(CleanedProductRecord {
        name,
        price,
        price_numeric,
        availability: normalize_availability(raw.availability.as_deref()),
        product_url: raw.product_url.as_deref().and_then(clean_url),
        image_url: raw.image_url.as_deref().and_then(clean_url),
        source_url: raw.source_url.clone(),
    })
}

/// Drops records whose `(name, price)` key was already seen.
#[must_use]
pub fn dedupe(records: Vec<CleanedProductRecord>) -> Vec<CleanedProductRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.dedup_key()))
        .collect()
}

/// Collapses whitespace, strips promotional prefixes and review-count or
/// dangling-dash suffixes, and truncates very long names.
#[must_use]
pub fn clean_name(name: &str) -> String {
    let mut current = clean_text(name);
    // Stripping one junk piece can expose another ("Widget (3 reviews) -").
    loop {
        let next = NAME_JUNK
            .iter()
            .fold(current.clone(), |acc, re| re.replace(&acc, "").trim().to_string());
        if next == current {
            break;
        }
        current = next;
    }

    if current.chars().count() > MAX_NAME_CHARS {
        let mut truncated: String = current.chars().take(MAX_NAME_CHARS - 3).collect();
        truncated.push_str("...");
        return truncated;
    }
    current
}

/// Reduces price text to its price-shaped part, e.g. `"Now $1,299.00!"` to
/// `"$1,299.00"`.
#[must_use]
pub fn clean_price(price: &str) -> Option<String> {
    let price = price.trim();
    if price.is_empty() {
        return None;
    }
    PRICE_TEXT_RE
        .find(price)
        .map(|m| m.as_str().trim().to_string())
}

/// Parses a price string to a number, accepting both `1,234.56` and
/// `1.234,56` conventions. A lone comma followed by exactly two digits is a
/// decimal separator; otherwise commas separate thousands.
#[must_use]
pub fn parse_price_numeric(price: &str) -> Option<f64> {
    let digits: String = price
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    let normalized = match (digits.find(','), digits.find('.')) {
        (Some(comma), Some(dot)) if comma > dot => digits.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => digits.replace(',', ""),
        (Some(_), None) => {
            let tail = digits.rsplit(',').next().unwrap_or_default();
            if tail.len() == 2 {
                digits.replace(',', ".")
            } else {
                digits.replace(',', "")
            }
        }
        _ => digits,
    };

    let value: f64 = normalized.parse().ok()?;
    value
        .is_finite()
        .then(|| (value * 100.0).round() / 100.0)
}

/// Maps free availability text onto [`Availability`].
///
/// Canonical labels map to themselves. Out-of-stock wording is checked
/// before in-stock wording so `"unavailable"` never reads as `"available"`.
#[must_use]
pub fn normalize_availability(text: Option<&str>) -> Availability {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return Availability::Unknown;
    };
    if let Some(exact) = Availability::from_label(text) {
        return exact;
    }

    let lowered = text.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lowered.contains(w));
    if has_any(&OUT_OF_STOCK_WORDS) {
        Availability::OutOfStock
    } else if has_any(&IN_STOCK_WORDS) {
        Availability::InStock
    } else if has_any(&PRE_ORDER_WORDS) {
        Availability::PreOrder
    } else if has_any(&LIMITED_WORDS) {
        Availability::LimitedStock
    } else {
        Availability::Unknown
    }
}

/// Keeps only absolute `http(s)` URLs, promoting protocol-relative ones to
/// `https:` and removing `utm_*`, `ref` and `tag` query parameters.
#[must_use]
pub fn clean_url(url: &str) -> Option<String> {
    let url = url.trim();
    let candidate = if url.starts_with("//") {
        format!("https:{url}")
    } else if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        return None;
    };

    let mut parsed = Url::parse(&candidate).ok()?;
    let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
    let kept: Vec<&(String, String)> = pairs.iter().filter(|(key, _)| !is_tracking_param(key)).collect();

    if kept.len() != pairs.len() {
        if kept.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.query_pairs_mut().clear().extend_pairs(kept);
        }
    }
    Some(parsed.to_string())
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || key == "ref" || key == "tag"
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
