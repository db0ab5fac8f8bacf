//! The `brand` command.

use std::path::Path;

use shelfscan_core::AppConfig;
use shelfscan_scraper::{ChatClient, HttpFetcher};

/// Analyzes `url` and prints (or writes) the profile as JSON.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or the output file
/// cannot be written. A failed analysis is reported inside the profile.
pub async fn run_brand(config: &AppConfig, url: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::from_app_config(config)?;
    let chat = match ChatClient::from_app_config(fetcher.client().clone(), config) {
        Ok(chat) => Some(chat),
        Err(e) => {
            tracing::warn!(error = %e, "brand analysis needs a language model");
            None
        }
    };

    let profile = shelfscan_brand::analyze_website(url, &fetcher, chat.as_ref()).await;
    let json = serde_json::to_string_pretty(&profile)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            println!("wrote brand profile to {}", path.display());
        }
        None => println!("{json}"),
    }

    if let Some(error) = &profile.error {
        anyhow::bail!("brand analysis failed: {error}");
    }
    Ok(())
}
