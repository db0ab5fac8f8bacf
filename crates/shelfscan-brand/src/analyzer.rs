//! Landing-page brand analysis.
//!
//! Fetches the page, extracts deterministic evidence (colors, title, meta
//! description, headings, navigation), asks the chat model for a structured
//! profile, and post-validates the answer against that evidence.

use shelfscan_scraper::oracle::trim_html;
use shelfscan_scraper::{ChatClient, PageFetcher};

use crate::colors::extract_brand_colors;
use crate::error::BrandError;
use crate::evidence::{extract_evidence, PageEvidence};
use crate::profile::{default_profile, parse_profile_response, post_validate, BrandProfile};

/// Maximum HTML characters sent to the model.
pub const MAX_BRAND_HTML_CHARS: usize = 90_000;

const BRAND_SYSTEM_PROMPT: &str = "You are a strict website brand analyst.
Rules:
- Be factual and grounded in provided evidence.
- Do NOT invent claims, certifications, or audience segments.
- If uncertain, keep it concise and neutral.
- welcome_message and role must be specific to this site, not generic.
- scope and out_of_scope must each contain 3-5 concrete lines.

Return ONLY valid JSON with exact keys:
welcome_message, role, scope, out_of_scope, brand_colors, brand_tone,
products_and_services, target_audience, brand_description, knowledge_base, title, domain

knowledge_base must be object: {about:[], faqs:[], positioning:[]}.";

/// Prefixes `https://` when `url` has no http(s) scheme.
#[must_use]
pub fn with_scheme(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

fn user_prompt(url: &str, evidence: &PageEvidence, colors: &[String], html: &str) -> String {
    format!(
        "URL: {url}
Evidence:
- title: {title}
- meta_description: {meta}
- headings: {headings:?}
- nav_items: {nav:?}
- color_candidates (trust these most): {colors:?}

HTML excerpt:
{excerpt}

Build the JSON profile now.",
        title = evidence.title,
        meta = evidence.meta_description,
        headings = evidence.headings,
        nav = evidence.nav_items,
        excerpt = trim_html(html, MAX_BRAND_HTML_CHARS),
    )
}

/// Builds a brand profile for `url`.
///
/// Never fails: any problem yields [`default_profile`] with the error text
/// in [`BrandProfile::error`]. Without a `chat` client nothing is fetched.
pub async fn analyze_website(
    url: &str,
    fetcher: &dyn PageFetcher,
    chat: Option<&ChatClient>,
) -> BrandProfile {
    let url = with_scheme(url);
    match try_analyze(&url, fetcher, chat).await {
        Ok(profile) => {
            tracing::info!(url = %url, colors = ?profile.brand_colors, "brand profile built");
            profile
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "brand analysis failed");
            default_profile(&url, &e.to_string())
        }
    }
}

async fn try_analyze(
    url: &str,
    fetcher: &dyn PageFetcher,
    chat: Option<&ChatClient>,
) -> Result<BrandProfile, BrandError> {
    let chat = chat.ok_or(BrandError::MissingApiKey)?;

    let html = fetcher.fetch(url).await?;
    let colors = extract_brand_colors(&html, url, fetcher).await;
    let evidence = extract_evidence(&html);
    tracing::debug!(
        url,
        headings = evidence.headings.len(),
        nav_items = evidence.nav_items.len(),
        "page evidence extracted"
    );

    let content = chat
        .complete(BRAND_SYSTEM_PROMPT, &user_prompt(url, &evidence, &colors, &html))
        .await?;
    let profile = parse_profile_response(&content, url)?;
    Ok(post_validate(profile, &evidence, &colors, url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_hosts_get_https() {
        assert_eq!(with_scheme("shop.example.com"), "https://shop.example.com");
        assert_eq!(with_scheme(" http://a.example "), "http://a.example");
    }

    #[test]
    fn prompt_carries_evidence_and_trusted_colors() {
        let evidence = PageEvidence {
            title: "Northwind".to_string(),
            meta_description: "Beans".to_string(),
            headings: vec!["Roasts".to_string()],
            nav_items: vec!["Shop".to_string()],
        };
        let prompt = user_prompt(
            "https://northwind.example.com",
            &evidence,
            &["#e63946".to_string()],
            "<html><script>track()</script><body>Hi</body></html>",
        );
        assert!(prompt.starts_with("URL: https://northwind.example.com\n"));
        assert!(prompt.contains("- headings: [\"Roasts\"]"));
        assert!(prompt.contains("- color_candidates (trust these most): [\"#e63946\"]"));
        assert!(prompt.contains("<body>Hi</body>"));
        assert!(!prompt.contains("track()"));
    }
}
