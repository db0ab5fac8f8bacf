//! Structured extraction through a chat-completions language model.
//!
//! [`ChatClient`] is the bare request/response plumbing (also used by the
//! brand analyzer). [`ExtractionOracle`] is the narrow seam the orchestrator
//! depends on; [`OpenAiOracle`] implements it with a fixed prompt.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use shelfscan_core::{AppConfig, RawProductRecord};

use crate::error::{OracleError, ScraperError};

/// Maximum HTML characters sent for product extraction.
pub const MAX_PRODUCT_HTML_CHARS: usize = 42_000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);
const MAX_AVAILABILITY_CHARS: usize = 50;

const PRODUCT_SYSTEM_PROMPT: &str = r#"Extract product listing data from HTML. For each product return: name, price (e.g. "$19.99"), availability ("In Stock"/"Out of Stock"/"Unknown"), product_url, image_url. Use null if missing. Return ONLY a JSON array, no markdown. Example: [{"name":"Product A","price":"$10.99","availability":"In Stock","product_url":"https://...","image_url":"https://..."}]"#;

static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:script|style|noscript)[^>]*>.*?</(?:script|style|noscript)>")
        .expect("valid script/style regex")
});
static FENCE_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```(?:json)?\s*").expect("valid fence regex"));
static FENCE_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*```\s*$").expect("valid fence regex"));

/// Removes `script`/`style`/`noscript` blocks and truncates to `max_chars`
/// characters, marking the cut with `... [truncated]`.
#[must_use]
pub fn trim_html(html: &str, max_chars: usize) -> String {
    let stripped = SCRIPT_STYLE_RE.replace_all(html, "");
    match stripped.char_indices().nth(max_chars) {
        None => stripped.into_owned(),
        Some((cut, _)) => format!("{}\n... [truncated]", &stripped[..cut]),
    }
}

/// Strips a surrounding Markdown code fence (optionally tagged `json`).
#[must_use]
pub fn strip_code_fences(content: &str) -> String {
    let content = content.trim();
    let content = FENCE_OPEN_RE.replace(content, "");
    FENCE_CLOSE_RE.replace(&content, "").into_owned()
}

/// Turns a model answer into raw records.
///
/// Anything that is not a JSON array yields an empty list; non-object items
/// and items with neither name nor price are skipped.
#[must_use]
pub fn parse_products_response(content: &str, page_url: &str) -> Vec<RawProductRecord> {
    let cleaned = strip_code_fences(content);
    let data: Value = match serde_json::from_str(&cleaned) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(error = %e, "oracle returned invalid JSON");
            return Vec::new();
        }
    };
    let Some(items) = data.as_array() else {
        tracing::warn!("oracle response is not a JSON array");
        return Vec::new();
    };

    items
        .iter()
        .filter(|item| item.is_object())
        .map(|item| RawProductRecord {
            name: string_field(item, "name"),
            price: string_field(item, "price"),
            availability: Some(
                string_field(item, "availability")
                    .map_or_else(
                        || "Unknown".to_string(),
                        |a| a.chars().take(MAX_AVAILABILITY_CHARS).collect(),
                    ),
            ),
            product_url: string_field(item, "product_url"),
            image_url: string_field(item, "image_url"),
            source_url: page_url.to_string(),
        })
        .filter(RawProductRecord::has_identity)
        .collect()
}

/// A trimmed, non-empty string (numbers are rendered as text).
fn string_field(item: &Value, key: &str) -> Option<String> {
    let text = match item.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

/// Minimal chat-completions client.
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[redacted]")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::Configuration`] when no API key is configured.
    pub fn from_app_config(client: reqwest::Client, config: &AppConfig) -> Result<Self, ScraperError> {
        let api_key = config.openai_api_key.as_deref().ok_or_else(|| {
            ScraperError::Configuration(
                "OPENAI_API_KEY is required for oracle extraction".to_string(),
            )
        })?;
        Ok(Self::new(
            client,
            &config.openai_base_url,
            api_key,
            &config.openai_model,
        ))
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one system + user exchange at temperature 0 and returns the
    /// first choice's message content, trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Http`] on transport failure,
    /// [`OracleError::Status`] on a non-2xx answer, and
    /// [`OracleError::EmptyResponse`] when no content is present.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, OracleError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let body: Value = response.json().await?;
        let content = body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(OracleError::EmptyResponse)?;

        Ok(content.to_string())
    }
}

/// Something that can read products straight out of page HTML.
#[async_trait]
pub trait ExtractionOracle: Send + Sync {
    /// # Errors
    ///
    /// Returns an [`OracleError`] when the oracle could not be consulted.
    /// An answer that cannot be interpreted is an empty list, not an error.
    async fn extract_products(
        &self,
        html: &str,
        page_url: &str,
    ) -> Result<Vec<RawProductRecord>, OracleError>;
}

/// [`ExtractionOracle`] backed by an OpenAI-compatible chat model.
#[derive(Debug, Clone)]
pub struct OpenAiOracle {
    chat: ChatClient,
}

impl OpenAiOracle {
    #[must_use]
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl ExtractionOracle for OpenAiOracle {
    async fn extract_products(
        &self,
        html: &str,
        page_url: &str,
    ) -> Result<Vec<RawProductRecord>, OracleError> {
        let trimmed = trim_html(html, MAX_PRODUCT_HTML_CHARS);
        let user = format!(
            "URL: {page_url}\n\nHTML:\n{trimmed}\n\nExtract all products. JSON array only."
        );
        tracing::debug!(page_url, model = self.chat.model(), chars = trimmed.len(), "asking oracle for products");

        let content = self.chat.complete(PRODUCT_SYSTEM_PROMPT, &user).await?;
        let products = parse_products_response(&content, page_url);
        tracing::info!(page_url, products = products.len(), "oracle extracted products");
        Ok(products)
    }
}
