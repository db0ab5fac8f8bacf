//! Deterministic brand-color extraction.
//!
//! Colors are gathered from meta tags, CSS custom properties, `<style>`
//! blocks, inline `style` attributes and linked stylesheets into a weighted
//! multiset, normalized to `#rrggbb`, ranked, and narrowed to three visually
//! distinct picks.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use scraper::{Html, Selector};
use shelfscan_scraper::PageFetcher;
use url::Url;

/// Colors considered for selection after ranking.
pub const RANKED_POOL_SIZE: usize = 40;
pub const BRAND_COLOR_COUNT: usize = 3;
/// Minimum RGB distance between two picks during diversity selection.
pub const MIN_COLOR_DISTANCE: f64 = 60.0;
/// Minimum RGB distance between a padding color and existing picks.
const MIN_FALLBACK_DISTANCE: f64 = 40.0;
/// Channel spread below which a color reads as gray.
const NEUTRAL_SPREAD: u8 = 15;

const META_WEIGHT: u32 = 30;
const INLINE_CSS_WEIGHT: u32 = 2;
const STYLESHEET_WEIGHT: u32 = 1;
const CUSTOM_PROPERTY_MULTIPLIER: u32 = 5;

const META_COLOR_NAMES: [&str; 2] = ["theme-color", "msapplication-TileColor"];
const FALLBACK_COLORS: [&str; 3] = ["#1a1a2e", "#16213e", "#0f3460"];

const GENERIC_NEUTRALS: [&str; 23] = [
    "ffffff", "000000", "f5f5f5", "f8f8f8", "fafafa", "eeeeee", "e5e5e5", "dddddd", "cccccc",
    "f0f0f0", "e0e0e0", "d0d0d0", "333333", "111111", "222222", "444444", "555555", "666666",
    "777777", "888888", "999999", "aaaaaa", "bbbbbb",
];

static HEX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})\b").expect("valid hex color regex")
});
static RGB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)rgba?\s*\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})")
        .expect("valid rgb color regex")
});
static HSL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)hsla?\s*\(\s*(\d+)\s*,\s*(\d+)%?\s*,\s*(\d+)%?").expect("valid hsl color regex")
});
static CUSTOM_PROPERTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)--(?:primary|brand|accent|main|theme|color)[^:]*:\s*(#[0-9a-fA-F]{3,8}\b|rgba?\([^)]+\)|hsla?\([^)]+\))",
    )
    .expect("valid custom property regex")
});

static STYLE_BLOCKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("style").expect("valid style selector"));
static STYLED: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[style]").expect("valid style attribute selector"));
static STYLESHEET_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link[rel][href]").expect("valid link selector"));
static META_NAMED: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[name][content]").expect("valid meta selector"));

/// Weighted multiset of `#rrggbb` colors that remembers first-seen order.
#[derive(Debug, Clone, Default)]
pub struct ColorCounts {
    entries: Vec<(String, u32)>,
    index: HashMap<String, usize>,
}

impl ColorCounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `weight` to `hex`. Empty strings are ignored.
    pub fn add(&mut self, hex: &str, weight: u32) {
        if hex.is_empty() {
            return;
        }
        if let Some(&i) = self.index.get(hex) {
            self.entries[i].1 = self.entries[i].1.saturating_add(weight);
        } else {
            self.index.insert(hex.to_string(), self.entries.len());
            self.entries.push((hex.to_string(), weight));
        }
    }

    #[must_use]
    pub fn weight(&self, hex: &str) -> u32 {
        self.index.get(hex).map_or(0, |&i| self.entries[i].1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `limit` heaviest colors; ties keep first-seen order.
    #[must_use]
    pub fn ranked(&self, limit: usize) -> Vec<String> {
        let mut sorted: Vec<&(String, u32)> = self.entries.iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted.into_iter().take(limit).map(|(c, _)| c.clone()).collect()
    }
}

/// Normalizes a 3-, 6- or 8-digit hex color to lowercase `#rrggbb`.
/// Other lengths yield `None`.
#[must_use]
pub fn normalize_hex(raw: &str) -> Option<String> {
    let digits = raw.trim().trim_start_matches('#').to_ascii_lowercase();
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match digits.len() {
        3 => Some(format!(
            "#{}",
            digits.chars().flat_map(|c| [c, c]).collect::<String>()
        )),
        6 => Some(format!("#{digits}")),
        8 => Some(format!("#{}", &digits[..6])),
        _ => None,
    }
}

#[must_use]
pub fn rgb_to_hex(r: u16, g: u16, b: u16) -> String {
    let clamp = |v: u16| v.min(255);
    format!("#{:02x}{:02x}{:02x}", clamp(r), clamp(g), clamp(b))
}

/// Sector-based HSL conversion; saturation and lightness are percentages.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::many_single_char_names
)]
pub fn hsl_to_hex(h: u64, s: u64, l: u64) -> String {
    let h = h % 360;
    let s = s.min(100) as f64 / 100.0;
    let l = l.min(100) as f64 / 100.0;
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h as f64 / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;
    let (r, g, b) = match h {
        0..60 => (c, x, 0.0),
        60..120 => (x, c, 0.0),
        120..180 => (0.0, c, x),
        180..240 => (0.0, x, c),
        240..300 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let channel = |v: f64| ((v + m) * 255.0) as u16;
    rgb_to_hex(channel(r), channel(g), channel(b))
}

fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Euclidean distance in RGB space. Malformed colors are infinitely far apart.
#[must_use]
pub fn color_distance(a: &str, b: &str) -> f64 {
    let (Some((r1, g1, b1)), Some((r2, g2, b2))) = (hex_to_rgb(a), hex_to_rgb(b)) else {
        return f64::INFINITY;
    };
    let d = |x: u8, y: u8| (f64::from(x) - f64::from(y)).powi(2);
    (d(r1, r2) + d(g1, g2) + d(b1, b2)).sqrt()
}

/// Whites, blacks, grays, and anything whose channels barely differ.
#[must_use]
pub fn is_neutral(hex: &str) -> bool {
    let digits = hex.trim_start_matches('#').to_ascii_lowercase();
    if GENERIC_NEUTRALS.contains(&digits.as_str()) {
        return true;
    }
    let Some((r, g, b)) = hex_to_rgb(&digits) else {
        return false;
    };
    r.max(g).max(b) - r.min(g).min(b) < NEUTRAL_SPREAD
}

fn rgb_from(caps: &Captures<'_>) -> Option<String> {
    let channel = |i: usize| caps.get(i)?.as_str().parse::<u16>().ok();
    Some(rgb_to_hex(channel(1)?, channel(2)?, channel(3)?))
}

fn hsl_from(caps: &Captures<'_>) -> Option<String> {
    let part = |i: usize| caps.get(i)?.as_str().parse::<u64>().ok();
    Some(hsl_to_hex(part(1)?, part(2)?, part(3)?))
}

/// Any supported color notation to `#rrggbb`.
fn parse_color_value(value: &str) -> Option<String> {
    let value = value.trim();
    let lower = value.to_ascii_lowercase();
    if value.starts_with('#') {
        normalize_hex(value)
    } else if lower.starts_with("rgb") {
        RGB_RE.captures(value).as_ref().and_then(rgb_from)
    } else if lower.starts_with("hsl") {
        HSL_RE.captures(value).as_ref().and_then(hsl_from)
    } else {
        None
    }
}

/// Adds every color in `css` to `counts`. Brand-named custom properties
/// count five times the base `weight`; every literal counts once more.
pub fn collect_css_colors(css: &str, counts: &mut ColorCounts, weight: u32) {
    for caps in CUSTOM_PROPERTY_RE.captures_iter(css) {
        if let Some(color) = parse_color_value(&caps[1]) {
            counts.add(&color, weight * CUSTOM_PROPERTY_MULTIPLIER);
        }
    }
    for caps in HEX_RE.captures_iter(css) {
        if let Some(color) = normalize_hex(&caps[1]) {
            counts.add(&color, weight);
        }
    }
    for caps in RGB_RE.captures_iter(css) {
        if let Some(color) = rgb_from(&caps) {
            counts.add(&color, weight);
        }
    }
    for caps in HSL_RE.captures_iter(css) {
        if let Some(color) = hsl_from(&caps) {
            counts.add(&color, weight);
        }
    }
}

/// Colors found in the page itself plus the `href`s of its linked
/// stylesheets, in document order.
#[must_use]
pub fn collect_page_colors(html: &str) -> (ColorCounts, Vec<String>) {
    let doc = Html::parse_document(html);
    let mut counts = ColorCounts::new();

    for name in META_COLOR_NAMES {
        let content = doc
            .select(&META_NAMED)
            .find(|el| el.value().attr("name") == Some(name))
            .and_then(|el| el.value().attr("content"));
        let color = content.and_then(|value| {
            let value = value.trim();
            if value.starts_with('#') || value.to_ascii_lowercase().starts_with("rgb") {
                parse_color_value(value)
            } else {
                None
            }
        });
        if let Some(color) = color {
            counts.add(&color, META_WEIGHT);
        }
    }

    for block in doc.select(&STYLE_BLOCKS) {
        let css: String = block.text().collect();
        if !css.is_empty() {
            collect_css_colors(&css, &mut counts, INLINE_CSS_WEIGHT);
        }
    }
    for el in doc.select(&STYLED) {
        if let Some(style) = el.value().attr("style") {
            collect_css_colors(style, &mut counts, INLINE_CSS_WEIGHT);
        }
    }

    let stylesheets = doc
        .select(&STYLESHEET_LINKS)
        .filter(|el| {
            el.value()
                .attr("rel")
                .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")))
        })
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
        .collect();

    (counts, stylesheets)
}

/// Greedy diversity selection over `ranked` (best first).
///
/// Accepts the top color, then each later color at least `min_dist` away
/// from every pick so far. Short results are backfilled in rank order
/// regardless of distance.
#[must_use]
pub fn pick_top_diverse(ranked: &[String], n: usize, min_dist: f64) -> Vec<String> {
    if ranked.len() <= n {
        return ranked.to_vec();
    }
    let Some(first) = ranked.first() else {
        return Vec::new();
    };

    let mut selected = vec![first.clone()];
    for candidate in &ranked[1..] {
        if selected.len() >= n {
            break;
        }
        if selected
            .iter()
            .all(|s| color_distance(candidate, s) >= min_dist)
        {
            selected.push(candidate.clone());
        }
    }

    for candidate in ranked {
        if selected.len() >= n {
            break;
        }
        if !selected.contains(candidate) {
            selected.push(candidate.clone());
        }
    }
    selected
}

/// Ranks `counts` and picks three brand colors, preferring non-neutrals and
/// padding short results with dark fallbacks. Fallbacks at least
/// `MIN_FALLBACK_DISTANCE` from every pick go first. Empty evidence gives an
/// empty result.
#[must_use]
pub fn select_brand_colors(counts: &ColorCounts) -> Vec<String> {
    let ranked = counts.ranked(RANKED_POOL_SIZE);
    if ranked.is_empty() {
        return Vec::new();
    }
    let non_neutral: Vec<String> = ranked.iter().filter(|c| !is_neutral(c)).cloned().collect();

    let pool = if non_neutral.len() >= BRAND_COLOR_COUNT {
        non_neutral
    } else if non_neutral.is_empty() {
        ranked
    } else {
        let mut pool = non_neutral;
        for color in ranked {
            if !pool.contains(&color) {
                pool.push(color);
            }
        }
        pool
    };

    let mut result = pick_top_diverse(&pool, BRAND_COLOR_COUNT, MIN_COLOR_DISTANCE);
    for fallback in FALLBACK_COLORS {
        if result.len() >= BRAND_COLOR_COUNT {
            break;
        }
        let fallback = fallback.to_string();
        if !result.contains(&fallback)
            && result
                .iter()
                .all(|c| color_distance(&fallback, c) >= MIN_FALLBACK_DISTANCE)
        {
            result.push(fallback);
        }
    }
    // picks crowding the fallbacks still end with three colors
    for fallback in FALLBACK_COLORS {
        if result.len() >= BRAND_COLOR_COUNT {
            break;
        }
        let fallback = fallback.to_string();
        if !result.contains(&fallback) {
            result.push(fallback);
        }
    }
    result.truncate(BRAND_COLOR_COUNT);
    result
}

/// Full pipeline for one page: page-level sources, then each linked
/// stylesheet fetched in turn through `fetcher`. A stylesheet that cannot
/// be fetched is skipped.
pub async fn extract_brand_colors(
    html: &str,
    base_url: &str,
    fetcher: &dyn PageFetcher,
) -> Vec<String> {
    let (mut counts, stylesheets) = collect_page_colors(html);
    let base = Url::parse(base_url).ok();

    for href in stylesheets {
        let css_url = match &base {
            Some(base) => match base.join(&href) {
                Ok(url) => url.to_string(),
                Err(_) => continue,
            },
            None => href,
        };
        match fetcher.fetch(&css_url).await {
            Ok(css) => collect_css_colors(&css, &mut counts, STYLESHEET_WEIGHT),
            Err(e) => tracing::debug!(css_url = %css_url, error = %e, "skipping unreadable stylesheet"),
        }
    }

    let colors = select_brand_colors(&counts);
    tracing::info!(candidates = counts.len(), ?colors, "brand colors extracted");
    colors
}

#[cfg(test)]
#[path = "colors_test.rs"]
mod tests;
