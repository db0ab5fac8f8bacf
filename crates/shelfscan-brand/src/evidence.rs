//! Factual snippets pulled from a landing page to ground the model's answer.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

const MAX_TITLE_CHARS: usize = 180;
const MAX_META_DESCRIPTION_CHARS: usize = 400;
const MAX_HEADING_CHARS: usize = 120;
const MAX_HEADINGS: usize = 20;
const MAX_NAV_ITEMS: usize = 20;
/// Only the first few `nav` / `header` regions are read.
const MAX_NAV_REGIONS: usize = 2;
const BORING_NAV_ITEMS: [&str; 6] = ["home", "about", "contact", "blog", "login", "sign in"];

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid title selector"));
static META_DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("meta[name='description'][content]").expect("valid meta description selector")
});
static OG_DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("meta[property='og:description'][content]").expect("valid og selector")
});
static HEADINGS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3").expect("valid heading selector"));
static NAV_REGIONS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("nav, header").expect("valid nav selector"));
static LINKS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("valid link selector"));

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageEvidence {
    pub title: String,
    pub meta_description: String,
    pub headings: Vec<String>,
    pub nav_items: Vec<String>,
}

/// Text nodes trimmed and joined with single spaces.
fn joined_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[must_use]
pub fn extract_evidence(html: &str) -> PageEvidence {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&TITLE)
        .next()
        .map(|el| truncate_chars(el.text().collect::<String>().trim(), MAX_TITLE_CHARS))
        .unwrap_or_default();

    let meta_description = doc
        .select(&META_DESCRIPTION)
        .next()
        .or_else(|| doc.select(&OG_DESCRIPTION).next())
        .and_then(|el| el.value().attr("content"))
        .map(|content| truncate_chars(content.trim(), MAX_META_DESCRIPTION_CHARS))
        .unwrap_or_default();

    let mut headings: Vec<String> = Vec::new();
    for heading in doc.select(&HEADINGS) {
        let text = joined_text(heading);
        if !text.is_empty() && text.chars().count() < MAX_HEADING_CHARS && !headings.contains(&text) {
            headings.push(text);
        }
    }
    headings.truncate(MAX_HEADINGS);

    let mut nav_items: Vec<String> = Vec::new();
    for region in doc.select(&NAV_REGIONS).take(MAX_NAV_REGIONS) {
        for link in region.select(&LINKS) {
            let text = joined_text(link);
            let len = text.chars().count();
            if (2..40).contains(&len)
                && !BORING_NAV_ITEMS.contains(&text.to_lowercase().as_str())
                && !nav_items.contains(&text)
            {
                nav_items.push(text);
            }
        }
    }
    nav_items.truncate(MAX_NAV_ITEMS);

    PageEvidence {
        title,
        meta_description,
        headings,
        nav_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDING: &str = r#"<html><head>
        <title>  Northwind Coffee | Small-batch roasters  </title>
        <meta property="og:description" content="OG fallback">
        <meta name="description" content="  Fresh roasted beans shipped weekly.  ">
        </head><body>
        <header><nav>
            <a href="/">Home</a><a href="/shop">Shop <span>Beans</span></a>
            <a href="/subscriptions">Subscriptions</a><a href="/about">About</a>
            <a href="/x">X</a><a href="/shop">Shop Beans</a>
        </nav></header>
        <h1>Small-batch coffee</h1>
        <h2>Our roasts</h2>
        <h2>Our roasts</h2>
        <h3>   </h3>
        </body></html>"#;

    #[test]
    fn collects_title_meta_headings_and_nav() {
        let evidence = extract_evidence(LANDING);
        assert_eq!(evidence.title, "Northwind Coffee | Small-batch roasters");
        assert_eq!(evidence.meta_description, "Fresh roasted beans shipped weekly.");
        assert_eq!(evidence.headings, vec!["Small-batch coffee", "Our roasts"]);
        assert_eq!(evidence.nav_items, vec!["Shop Beans", "Subscriptions"]);
    }

    #[test]
    fn og_description_is_the_fallback() {
        let html = r#"<html><head><meta property="og:description" content="From OG"></head></html>"#;
        assert_eq!(extract_evidence(html).meta_description, "From OG");
    }

    #[test]
    fn long_values_are_capped() {
        let long_heading = "h".repeat(150);
        let html = format!(
            "<html><head><title>{}</title></head><body><h1>{long_heading}</h1><h2>Kept</h2></body></html>",
            "t".repeat(300)
        );
        let evidence = extract_evidence(&html);
        assert_eq!(evidence.title.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(evidence.headings, vec!["Kept"]);
    }

    #[test]
    fn empty_page_has_empty_evidence() {
        assert_eq!(extract_evidence(""), PageEvidence::default());
    }
}
