//! The brand profile and the rules that turn a model answer into one.
//!
//! [`parse_profile_response`] accepts whatever shape the model produced and
//! coerces it into a [`BrandProfile`]. [`post_validate`] then grounds it:
//! deterministic colors win, generic copy is replaced with evidence-based
//! text, and list fields are capped.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shelfscan_scraper::oracle::strip_code_fences;
use url::Url;

use crate::colors::{normalize_hex, BRAND_COLOR_COUNT};
use crate::error::BrandError;
use crate::evidence::PageEvidence;

const MIN_SCOPE_LINES: usize = 3;
const MAX_SCOPE_LINES: usize = 5;
const MAX_LIST_ITEMS: usize = 10;
const MAX_ABOUT_ITEMS: usize = 5;
const MAX_FAQ_ITEMS: usize = 12;
const MAX_POSITIONING_ITEMS: usize = 12;

const GENERIC_PHRASES: [&str; 4] = [
    "welcome to our website",
    "we are here to help",
    "your trusted partner",
    "innovative solutions for your business",
];

const DEFAULT_SCOPE: [&str; 3] = [
    "Answer questions about offerings",
    "Provide basic guidance and navigation",
    "Point visitors to the right page or contact option",
];

const DEFAULT_OUT_OF_SCOPE: [&str; 3] = [
    "No legal, medical, or financial advice",
    "No account-specific actions without verification",
    "No commitments beyond published company policies",
];

static LINE_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\n;•]+").expect("valid line split regex"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub about: Vec<String>,
    pub faqs: Vec<String>,
    pub positioning: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandProfile {
    pub website_url: String,
    pub domain: String,
    pub title: String,
    pub welcome_message: String,
    pub role: String,
    /// Newline-separated lines.
    pub scope: String,
    /// Newline-separated lines.
    pub out_of_scope: String,
    pub brand_colors: Vec<String>,
    pub brand_tone: Vec<String>,
    pub products_and_services: Vec<String>,
    pub target_audience: Vec<String>,
    pub brand_description: String,
    pub knowledge_base: KnowledgeBase,
    /// Set when analysis failed; the other fields are then empty.
    pub error: Option<String>,
}

/// Host (with port, when present) of `url`, falling back to `url` itself.
#[must_use]
pub fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            let host = u.host_str()?.to_string();
            Some(match u.port() {
                Some(port) => format!("{host}:{port}"),
                None => host,
            })
        })
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| url.to_string())
}

/// An empty profile for `url` carrying `error`.
#[must_use]
pub fn default_profile(url: &str, error: &str) -> BrandProfile {
    BrandProfile {
        website_url: url.to_string(),
        domain: domain_of(url),
        error: Some(error.to_string()),
        ..BrandProfile::default()
    }
}

/// Splits free text on newlines, semicolons and bullets, trimming list
/// markers from each line.
#[must_use]
pub fn lines_from_text(text: &str) -> Vec<String> {
    LINE_SPLIT_RE
        .split(text)
        .map(|part| part.trim_matches(|c| c == '-' || c == ' ').trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Empty text, or text containing boilerplate that says nothing about the brand.
#[must_use]
pub fn is_too_generic(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    lowered.is_empty() || GENERIC_PHRASES.iter().any(|g| lowered.contains(g))
}

/// A scalar as display text; `null`, `false` and empty values become "".
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "true".to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
        Value::Null | Value::Bool(false) => String::new(),
    }
}

/// Text field; arrays are joined one item per line.
fn text_field(data: &Value, key: &str) -> String {
    match data.get(key) {
        Some(Value::Array(items)) => items.iter().map(value_text).collect::<Vec<_>>().join("\n"),
        Some(value) => value_text(value).trim().to_string(),
        None => String::new(),
    }
}

/// List field; a plain string is split into lines. Items are trimmed,
/// empties dropped, and the result capped at `max`.
fn list_field(data: Option<&Value>, max: usize) -> Vec<String> {
    let items: Vec<String> = match data {
        Some(Value::Array(items)) => items.iter().map(value_text).collect(),
        Some(Value::String(text)) => lines_from_text(text),
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .take(max)
        .collect()
}

/// Keeps the first occurrence of each line, up to `max`, joined by newlines.
fn unique_lines(lines: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for line in lines {
        if !unique.contains(&line) {
            unique.push(line);
        }
    }
    unique
}

/// Appends defaults not already present until there are `MIN_SCOPE_LINES`.
fn pad_lines(lines: &mut Vec<String>, defaults: &[&str]) {
    for default in defaults {
        if lines.len() >= MIN_SCOPE_LINES {
            break;
        }
        if !lines.iter().any(|line| line == default) {
            lines.push((*default).to_string());
        }
    }
}

/// Parses the model's answer for `url`.
///
/// # Errors
///
/// Returns [`BrandError::InvalidJson`] when the content is not JSON and
/// [`BrandError::InvalidShape`] when it is not a JSON object.
pub fn parse_profile_response(content: &str, url: &str) -> Result<BrandProfile, BrandError> {
    let data: Value = serde_json::from_str(&strip_code_fences(content)).map_err(BrandError::InvalidJson)?;
    if !data.is_object() {
        return Err(BrandError::InvalidShape);
    }

    let domain = text_field(&data, "domain");
    let kb = data.get("knowledge_base");

    Ok(BrandProfile {
        website_url: url.to_string(),
        domain: if domain.is_empty() { domain_of(url) } else { domain },
        title: text_field(&data, "title"),
        welcome_message: text_field(&data, "welcome_message"),
        role: text_field(&data, "role"),
        scope: text_field(&data, "scope"),
        out_of_scope: text_field(&data, "out_of_scope"),
        brand_colors: list_field(data.get("brand_colors"), usize::MAX),
        brand_tone: list_field(data.get("brand_tone"), MAX_LIST_ITEMS),
        products_and_services: list_field(data.get("products_and_services"), MAX_LIST_ITEMS),
        target_audience: list_field(data.get("target_audience"), MAX_LIST_ITEMS),
        brand_description: text_field(&data, "brand_description"),
        knowledge_base: KnowledgeBase {
            about: list_field(kb.and_then(|kb| kb.get("about")), MAX_ABOUT_ITEMS),
            faqs: list_field(kb.and_then(|kb| kb.get("faqs")), MAX_FAQ_ITEMS),
            positioning: list_field(kb.and_then(|kb| kb.get("positioning")), MAX_POSITIONING_ITEMS),
        },
        error: None,
    })
}

/// Grounds a parsed profile in the page evidence and deterministic colors.
#[must_use]
pub fn post_validate(
    mut profile: BrandProfile,
    evidence: &PageEvidence,
    deterministic_colors: &[String],
    url: &str,
) -> BrandProfile {
    let title = [profile.title.trim(), evidence.title.trim()]
        .into_iter()
        .find(|t| !t.is_empty())
        .map_or_else(
            || {
                let domain = domain_of(url);
                if domain == url { "our brand".to_string() } else { domain }
            },
            str::to_string,
        );
    let description = if profile.brand_description.trim().is_empty() {
        evidence.meta_description.trim().to_string()
    } else {
        profile.brand_description.trim().to_string()
    };

    let colors = if deterministic_colors.is_empty() {
        profile.brand_colors.as_slice()
    } else {
        deterministic_colors
    };
    profile.brand_colors = colors
        .iter()
        .filter(|c| c.starts_with('#'))
        .filter_map(|c| normalize_hex(c))
        .take(BRAND_COLOR_COUNT)
        .collect();

    if is_too_generic(&profile.welcome_message) {
        profile.welcome_message = match description.split('.').next().map(str::trim) {
            Some(first) if !description.is_empty() => format!("Welcome to {title}. {first}."),
            _ => format!("Welcome to {title}. We're here to help you quickly find what you need."),
        };
    } else {
        profile.welcome_message = profile.welcome_message.trim().to_string();
    }

    if is_too_generic(&profile.role) {
        profile.role = match profile.products_and_services.first() {
            Some(offering) => format!("{offering} assistant"),
            None => "Brand support assistant".to_string(),
        };
    } else {
        profile.role = profile.role.trim().to_string();
    }

    let mut scope = unique_lines(lines_from_text(&profile.scope));
    if scope.len() < MIN_SCOPE_LINES {
        let seed = if profile.products_and_services.is_empty() {
            &evidence.nav_items
        } else {
            &profile.products_and_services
        };
        scope = unique_lines(
            seed.iter()
                .take(MAX_SCOPE_LINES)
                .map(|item| format!("Help with {item}"))
                .chain(DEFAULT_SCOPE[..2].iter().map(|s| (*s).to_string())),
        );
        pad_lines(&mut scope, &DEFAULT_SCOPE);
    }
    scope.truncate(MAX_SCOPE_LINES);
    profile.scope = scope.join("\n");

    let mut out_of_scope = unique_lines(lines_from_text(&profile.out_of_scope));
    if out_of_scope.len() < MIN_SCOPE_LINES {
        out_of_scope = DEFAULT_OUT_OF_SCOPE.iter().map(|s| (*s).to_string()).collect();
    }
    out_of_scope.truncate(MAX_SCOPE_LINES);
    profile.out_of_scope = out_of_scope.join("\n");

    if profile.knowledge_base.about.is_empty() && !description.is_empty() {
        profile.knowledge_base.about = vec![description.clone()];
    }

    profile.title = title;
    if profile.domain.is_empty() {
        profile.domain = domain_of(url);
    }
    if profile.website_url.is_empty() {
        profile.website_url = url.to_string();
    }
    profile.brand_description = description;
    profile.error = None;
    profile
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
