use std::path::PathBuf;

use thiserror::Error;

/// Failure to obtain the HTML of a page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("rate limited by {domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        retry_after_secs: u64,
    },

    #[error("bot challenge detected at {url}")]
    Blocked { url: String },

    #[error("response from {url} is too large ({bytes} bytes)")]
    TooLarge { url: String, bytes: u64 },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("every host candidate failed for {url}")]
    AllCandidatesFailed { url: String },
}

impl FetchError {
    /// Returns `true` when the server answered that the page does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Status { status, .. } if *status == 404 || *status == 410)
    }
}

/// Failure talking to the structured-extraction model.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("oracle response had no message content")]
    EmptyResponse,

    #[error("oracle response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to write {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
