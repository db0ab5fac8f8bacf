use std::path::PathBuf;

/// User-supplied CSS selectors that take precedence over the built-in
/// heuristics. Every field is optional; an unset field means "use the
/// default cascade".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomSelectors {
    pub container: Option<String>,
    pub name: Option<String>,
    pub price: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub availability: Option<String>,
    pub next_page: Option<String>,
}

impl CustomSelectors {
    /// Returns `true` when no selector has been supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.container.is_none()
            && self.name.is_none()
            && self.price.is_none()
            && self.url.is_none()
            && self.image.is_none()
            && self.availability.is_none()
            && self.next_page.is_none()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub output_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_pages: usize,
    pub respect_robots: bool,
    /// Lower bound of the randomized inter-request delay.
    pub min_delay_ms: u64,
    /// Upper bound of the randomized inter-request delay.
    pub max_delay_ms: u64,
    pub requests_per_second: f64,
    pub backoff_factor: f64,
    pub max_retries: u32,
    /// When `true`, listing pages go through the language-model extractor
    /// instead of the rule-based one.
    pub use_oracle: bool,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub selectors: CustomSelectors,
}

impl AppConfig {
    /// Returns human-readable warnings for settings that are legal but
    /// unlikely to work well. An empty list means the config looks sane.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.use_oracle && self.openai_api_key.is_none() {
            warnings.push(
                "OPENAI_API_KEY not set; oracle extraction is unavailable, use rule-based mode"
                    .to_string(),
            );
        }
        if self.request_timeout_secs < 5 {
            warnings.push(format!(
                "request timeout of {}s is very short; pages may fail to load",
                self.request_timeout_secs
            ));
        }
        if self.min_delay_ms > self.max_delay_ms {
            warnings.push(format!(
                "min delay ({}ms) exceeds max delay ({}ms); max delay will be used",
                self.min_delay_ms, self.max_delay_ms
            ));
        }
        if self.max_pages == 0 {
            warnings.push("max pages is 0; no pages will be fetched".to_string());
        }
        warnings
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("log_level", &self.log_level)
            .field("output_dir", &self.output_dir)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_pages", &self.max_pages)
            .field("respect_robots", &self.respect_robots)
            .field("min_delay_ms", &self.min_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .field("requests_per_second", &self.requests_per_second)
            .field("backoff_factor", &self.backoff_factor)
            .field("max_retries", &self.max_retries)
            .field("use_oracle", &self.use_oracle)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("openai_model", &self.openai_model)
            .field("openai_base_url", &self.openai_base_url)
            .field("selectors", &self.selectors)
            .finish()
    }
}
