use std::path::PathBuf;

use crate::app_config::{AppConfig, CustomSelectors};
use crate::ConfigError;

/// Browser-like user agent used when `SHELFSCAN_USER_AGENT` is not set.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every setting has a default, so the only failure mode is a value that is
/// present but malformed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .trim()
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if !value.is_finite() || value <= 0.0 {
            return Err(invalid(var, format!("must be a positive number, got {value}")));
        }
        Ok(value)
    };

    let parse_flag = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Ok(raw) => parse_bool(&raw).ok_or_else(|| {
                invalid(var, format!("expected true/false, got \"{raw}\""))
            }),
            Err(_) => Ok(default),
        }
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let log_level = or_default("SHELFSCAN_LOG_LEVEL", "info");
    let output_dir = PathBuf::from(or_default("SHELFSCAN_OUTPUT_DIR", "output"));
    let request_timeout_secs = parse_u64("SHELFSCAN_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("SHELFSCAN_USER_AGENT", DEFAULT_USER_AGENT);
    let max_pages = parse_usize("SHELFSCAN_MAX_PAGES", "50")?;
    let respect_robots = parse_flag("SHELFSCAN_RESPECT_ROBOTS", true)?;
    let min_delay_ms = parse_u64("SHELFSCAN_MIN_DELAY_MS", "1000")?;
    let max_delay_ms = parse_u64("SHELFSCAN_MAX_DELAY_MS", "3000")?;
    let requests_per_second = parse_positive_f64("SHELFSCAN_REQUESTS_PER_SECOND", "1.0")?;
    let backoff_factor = parse_positive_f64("SHELFSCAN_BACKOFF_FACTOR", "2.0")?;
    let max_retries = parse_u32("SHELFSCAN_MAX_RETRIES", "3")?;
    let use_oracle = parse_flag("SHELFSCAN_USE_ORACLE", true)?;
    let openai_api_key = optional("OPENAI_API_KEY");
    let openai_model = or_default("SHELFSCAN_OPENAI_MODEL", "gpt-4o-mini");
    let openai_base_url = or_default("SHELFSCAN_OPENAI_BASE_URL", "https://api.openai.com/v1")
        .trim_end_matches('/')
        .to_string();

    let selectors = CustomSelectors {
        container: optional("SHELFSCAN_SELECTOR_CONTAINER"),
        name: optional("SHELFSCAN_SELECTOR_NAME"),
        price: optional("SHELFSCAN_SELECTOR_PRICE"),
        url: optional("SHELFSCAN_SELECTOR_URL"),
        image: optional("SHELFSCAN_SELECTOR_IMAGE"),
        availability: optional("SHELFSCAN_SELECTOR_AVAILABILITY"),
        next_page: optional("SHELFSCAN_SELECTOR_NEXT_PAGE"),
    };

    Ok(AppConfig {
        log_level,
        output_dir,
        request_timeout_secs,
        user_agent,
        max_pages,
        respect_robots,
        min_delay_ms,
        max_delay_ms,
        requests_per_second,
        backoff_factor,
        max_retries,
        use_oracle,
        openai_api_key,
        openai_model,
        openai_base_url,
        selectors,
    })
}

/// Parse the boolean spellings accepted in env vars.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
