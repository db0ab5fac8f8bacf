//! Integration tests for `analyze_website`.
//!
//! A single `wiremock` server plays both the brand's website and the
//! chat-completions API, so the whole pipeline runs without real network
//! traffic.

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shelfscan_brand::analyze_website;
use shelfscan_scraper::{ChatClient, HttpFetcher};

const LANDING: &str = r##"<html><head>
    <title>Northwind Coffee</title>
    <meta name="description" content="Fresh roasted beans shipped weekly. Since 2009.">
    <meta name="theme-color" content="#e63946">
    <link rel="stylesheet" href="/site.css">
    </head><body>
    <header><nav><a href="/shop">Shop</a><a href="/subscriptions">Subscriptions</a></nav></header>
    <h1>Small-batch coffee</h1>
    </body></html>"##;

fn test_fetcher() -> HttpFetcher {
    HttpFetcher::new(5, "shelfscan-test/0.1", 0, 0).expect("failed to build test HttpFetcher")
}

fn test_chat(server: &MockServer) -> ChatClient {
    ChatClient::new(
        reqwest::Client::new(),
        &format!("{}/v1", server.uri()),
        "test-key",
        "gpt-4o-mini",
    )
}

fn completion(content: &str) -> serde_json::Value {
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
}

async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LANDING))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/site.css"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(":root{--brand:#1d3557} .x{color:#2a9d8f}"),
        )
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// Test 1 – full pipeline with a model answer that needs grounding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn builds_grounded_profile() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let answer = json!({
        "title": "",
        "welcome_message": "Welcome to our website!",
        "role": "Coffee concierge",
        "scope": "Recommend roasts",
        "out_of_scope": ["No medical advice", "No refunds", "No wholesale quotes"],
        "brand_colors": ["#000000"],
        "brand_tone": ["warm", "expert"],
        "products_and_services": ["Whole beans", "Subscriptions"],
        "target_audience": ["Home brewers"],
        "brand_description": "",
        "knowledge_base": {"about": [], "faqs": ["Do you ship abroad?"], "positioning": []}
    });
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(&format!("```json\n{answer}\n```"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/", server.uri());
    let chat = test_chat(&server);
    let profile = analyze_website(&url, &test_fetcher(), Some(&chat)).await;

    assert_eq!(profile.error, None, "unexpected error: {:?}", profile.error);
    assert_eq!(profile.website_url, url);
    assert_eq!(profile.title, "Northwind Coffee");
    assert_eq!(profile.brand_colors, vec!["#e63946", "#1d3557", "#2a9d8f"]);
    assert_eq!(
        profile.welcome_message,
        "Welcome to Northwind Coffee. Fresh roasted beans shipped weekly."
    );
    assert_eq!(profile.role, "Coffee concierge");
    assert_eq!(
        profile.scope,
        "Help with Whole beans\nHelp with Subscriptions\nAnswer questions about offerings\nProvide basic guidance and navigation"
    );
    assert_eq!(
        profile.out_of_scope,
        "No medical advice\nNo refunds\nNo wholesale quotes"
    );
    assert_eq!(
        profile.knowledge_base.about,
        vec!["Fresh roasted beans shipped weekly. Since 2009."]
    );
    assert_eq!(profile.knowledge_base.faqs, vec!["Do you ship abroad?"]);
}

// ---------------------------------------------------------------------------
// Test 2 – model answers with prose instead of JSON
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_model_json_yields_default_profile() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("I cannot do that.")))
        .mount(&server)
        .await;

    let chat = test_chat(&server);
    let profile = analyze_website(&server.uri(), &test_fetcher(), Some(&chat)).await;

    let error = profile.error.expect("error should be set");
    assert!(error.contains("invalid JSON"), "got: {error}");
    assert!(profile.brand_colors.is_empty());
    assert!(profile.title.is_empty());
}

// ---------------------------------------------------------------------------
// Test 3 – landing page missing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_page_skips_the_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
        .expect(0)
        .mount(&server)
        .await;

    let chat = test_chat(&server);
    let url = format!("{}/gone", server.uri());
    let profile = analyze_website(&url, &test_fetcher(), Some(&chat)).await;

    let error = profile.error.expect("error should be set");
    assert!(error.contains("404"), "got: {error}");
}

// ---------------------------------------------------------------------------
// Test 4 – no API key configured
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_chat_client_fetches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LANDING))
        .expect(0)
        .mount(&server)
        .await;

    let profile = analyze_website(&server.uri(), &test_fetcher(), None).await;

    assert_eq!(profile.error.as_deref(), Some("OPENAI_API_KEY not set"));
    assert_eq!(profile.website_url, server.uri());
}

// ---------------------------------------------------------------------------
// Test 5 – chat API failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_api_error_is_reported() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let chat = test_chat(&server);
    let profile = analyze_website(&server.uri(), &test_fetcher(), Some(&chat)).await;

    let error = profile.error.expect("error should be set");
    assert!(error.contains("HTTP 500"), "got: {error}");
    assert!(error.contains("upstream exploded"), "got: {error}");
}
