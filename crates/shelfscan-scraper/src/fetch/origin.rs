//! URL origin and hostname helpers for the fetch layer.

use url::Url;

/// Extracts the scheme+host origin from a URL.
///
/// Given `"https://shop.example.com/collections/all"`, returns
/// `"https://shop.example.com"`.
#[must_use]
pub fn extract_origin(url: &str) -> String {
    Url::parse(url).map_or_else(
        |e| {
            tracing::warn!(
                url,
                error = %e,
                "could not parse URL, falling back to string split for origin extraction"
            );
            url.trim_end_matches('/')
                .splitn(4, '/')
                .take(3)
                .collect::<Vec<_>>()
                .join("/")
        },
        |u| u.origin().ascii_serialization(),
    )
}

/// Extracts the hostname from a URL for use in error messages.
///
/// Falls back to the full URL string if parsing fails.
#[must_use]
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}

/// Returns the URL followed by its `www.` / apex counterpart.
///
/// `https://www.shop.com/a` yields `[https://www.shop.com/a, https://shop.com/a]`
/// and the reverse for an apex host. IP addresses, `localhost`, and single-label
/// hosts have no counterpart.
#[must_use]
pub(crate) fn host_candidates(url: &Url) -> Vec<Url> {
    let mut candidates = vec![url.clone()];
    let Some(url::Host::Domain(host)) = url.host() else {
        return candidates;
    };
    if !host.contains('.') {
        return candidates;
    }

    let alternate = match host.strip_prefix("www.") {
        Some(apex) if apex.contains('.') => apex.to_owned(),
        Some(_) => return candidates,
        None => format!("www.{host}"),
    };

    let mut swapped = url.clone();
    if swapped.set_host(Some(&alternate)).is_ok() {
        candidates.push(swapped);
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_origin_strips_path() {
        assert_eq!(
            extract_origin("https://shop.example.com/collections/all?page=2"),
            "https://shop.example.com"
        );
    }

    #[test]
    fn extract_origin_keeps_port() {
        assert_eq!(
            extract_origin("http://127.0.0.1:8080/catalog"),
            "http://127.0.0.1:8080"
        );
    }

    #[test]
    fn extract_domain_falls_back_to_input() {
        assert_eq!(extract_domain("https://shop.example.com/x"), "shop.example.com");
        assert_eq!(extract_domain("not a url"), "not a url");
    }

    #[test]
    fn host_candidates_adds_apex_for_www() {
        let url = Url::parse("https://www.shop.com/catalog?page=2").unwrap();
        let candidates: Vec<String> = host_candidates(&url)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            candidates,
            vec![
                "https://www.shop.com/catalog?page=2".to_string(),
                "https://shop.com/catalog?page=2".to_string(),
            ]
        );
    }

    #[test]
    fn host_candidates_adds_www_for_apex() {
        let url = Url::parse("https://shop.com/").unwrap();
        let candidates = host_candidates(&url);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].host_str(), Some("www.shop.com"));
    }

    #[test]
    fn host_candidates_skips_ips_and_localhost() {
        for raw in ["http://127.0.0.1:3000/", "http://localhost/", "http://www.com/"] {
            let url = Url::parse(raw).unwrap();
            assert_eq!(host_candidates(&url).len(), 1, "{raw}");
        }
    }
}
