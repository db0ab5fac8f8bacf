pub mod agent;
pub mod detect;
pub(crate) mod dom;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod locator;
pub mod normalize;
pub mod oracle;
pub mod pagination;
pub mod rate_limit;
pub mod robots;

pub use agent::{CancelFlag, ScrapeAgent, ScrapeOptions, ScrapeReport, StopReason};
pub use detect::{detect_site, SiteAnalysis, SiteType};
pub use error::{FetchError, OracleError, ScraperError};
pub use export::{summarize, write_csv, write_json, ScrapeSummary};
pub use fetch::{HttpFetcher, PageFetcher};
pub use normalize::clean_products;
pub use oracle::{ChatClient, ExtractionOracle, OpenAiOracle};
pub use rate_limit::{RateLimitConfig, RateLimiter};
