//! Page fetching.
//!
//! [`PageFetcher`] is the one capability the rest of the crate needs from the
//! network: "give me the HTML at this URL". [`HttpFetcher`] is the plain HTTP
//! engine. A browser-rendering engine can be plugged in behind the same trait.

mod origin;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use shelfscan_core::AppConfig;
use url::Url;

use crate::error::FetchError;
use crate::rate_limit::retry_with_backoff;

pub use origin::{extract_domain, extract_origin};

/// Responses larger than this are rejected before (or while) downloading.
pub const MAX_RESPONSE_BYTES: u64 = 10 * 1024 * 1024;

/// Bodies shorter than this are checked for bot-challenge markers.
const BLOCK_PAGE_MAX_CHARS: usize = 5000;

const BOT_CHALLENGE_MARKERS: [&str; 8] = [
    "captcha",
    "cf-browser-verification",
    "challenge-platform",
    "just a moment",
    "checking your browser",
    "access denied",
    "are you a robot",
    "verify you are human",
];

/// Anything that can turn a URL into an HTML document.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url` and returns the response body as text.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] describing why no usable HTML was obtained.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Plain HTTP engine built on `reqwest`.
///
/// Sends browser-like headers, retries transient failures with exponential
/// backoff, falls back between `www.` and apex hostnames when a host is
/// unreachable, and refuses oversize responses and HTML bot-challenge pages.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl HttpFetcher {
    /// Creates an `HttpFetcher` with configured timeout, `User-Agent`, and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_ms,
        })
    }

    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the client cannot be constructed.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, FetchError> {
        Self::new(
            config.request_timeout_secs,
            &config.user_agent,
            config.max_retries,
            1000,
        )
    }

    /// The shared `reqwest` client, for callers that need raw access
    /// (robots.txt, the oracle).
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn fetch_candidate(&self, url: &Url) -> Result<String, FetchError> {
        let url_str = url.to_string();
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url_str = url_str.clone();
            async move { self.fetch_once(&url_str).await }
        })
        .await
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| map_transport_error(e, url))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(FetchError::RateLimited {
                domain: extract_domain(url),
                retry_after_secs,
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        // stylesheets and robots.txt are not challenge pages
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_none_or(|ct| ct.to_ascii_lowercase().contains("html"));

        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_BYTES {
                tracing::warn!(url, bytes = len, "response too large, skipping body");
                return Err(FetchError::TooLarge {
                    url: url.to_owned(),
                    bytes: len,
                });
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| map_transport_error(e, url))?;
        let len = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        if len > MAX_RESPONSE_BYTES {
            return Err(FetchError::TooLarge {
                url: url.to_owned(),
                bytes: len,
            });
        }

        let body = String::from_utf8_lossy(&bytes).into_owned();
        if is_html && looks_like_bot_challenge(&body) {
            tracing::warn!(url, "bot challenge detected");
            return Err(FetchError::Blocked {
                url: url.to_owned(),
            });
        }

        tracing::debug!(url, status = status.as_u16(), chars = body.len(), "fetched page");
        Ok(body)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;

        let candidates = origin::host_candidates(&parsed);
        let total = candidates.len();
        let mut last_err = None;

        for (idx, candidate) in candidates.iter().enumerate() {
            match self.fetch_candidate(candidate).await {
                Ok(body) => {
                    if idx > 0 {
                        tracing::info!(url, fallback = %candidate, "fetched via hostname fallback");
                    }
                    return Ok(body);
                }
                // Only unreachable hosts are worth retrying under the other name.
                Err(err @ (FetchError::Http(_) | FetchError::Timeout { .. })) => {
                    tracing::debug!(url = %candidate, error = %err, "host candidate failed");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        match last_err {
            Some(err) if total == 1 => Err(err),
            _ => Err(FetchError::AllCandidatesFailed {
                url: url.to_owned(),
            }),
        }
    }
}

fn map_transport_error(err: reqwest::Error, url: &str) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_owned(),
        }
    } else {
        FetchError::Http(err)
    }
}

/// A short body carrying a known challenge marker is a block page, not content.
fn looks_like_bot_challenge(body: &str) -> bool {
    if body.chars().count() >= BLOCK_PAGE_MAX_CHARS {
        return false;
    }
    let lowered = body.to_lowercase();
    BOT_CHALLENGE_MARKERS.iter().any(|m| lowered.contains(m))
}
