use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrandError {
    #[error("OPENAI_API_KEY not set")]
    MissingApiKey,

    #[error(transparent)]
    Fetch(#[from] shelfscan_scraper::FetchError),

    #[error(transparent)]
    Oracle(#[from] shelfscan_scraper::OracleError),

    #[error("invalid JSON from the model: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("model response is not a JSON object")]
    InvalidShape,
}
