//! robots.txt compliance.
//!
//! Rules are fetched once per origin and cached for the lifetime of the
//! checker. A robots.txt that cannot be fetched means "allow everything".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::fetch::PageFetcher;

/// Parsed robots.txt rules for one user agent.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    pub allowed: Vec<String>,
    pub disallowed: Vec<String>,
    pub crawl_delay: Option<f64>,
}

impl RobotsRules {
    /// Longest matching pattern wins; ties go to `Allow`.
    #[must_use]
    pub fn is_allowed(&self, path: &str) -> bool {
        let longest = |patterns: &[String]| {
            patterns
                .iter()
                .filter(|p| path_matches(path, p))
                .map(String::len)
                .max()
        };

        match (longest(&self.allowed), longest(&self.disallowed)) {
            (Some(allow), Some(disallow)) => allow >= disallow,
            (None, Some(_)) => false,
            _ => true,
        }
    }
}

/// One `User-agent` group: the agents it names and the rules under them.
#[derive(Debug, Default)]
struct Group {
    agents: Vec<String>,
    rules: RobotsRules,
}

impl Group {
    fn names(&self, agent_token: &str) -> bool {
        self.agents
            .iter()
            .any(|agent| !agent.is_empty() && agent != "*" && agent_token.contains(agent.as_str()))
    }
}

/// Parse a robots.txt body for a specific user agent.
///
/// Only one group applies: the first naming the agent's product token
/// (`ShelfScan` in `ShelfScan/0.1`), else the `*` group. Directives before
/// any `User-agent` line are ignored.
#[must_use]
pub fn parse_robots(txt: &str, user_agent: &str) -> RobotsRules {
    let agent_token = user_agent
        .split('/')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    let mut groups: Vec<Group> = Vec::new();
    let mut current: Option<Group> = None;
    let mut has_rules = false;

    for line in txt.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        if key == "user-agent" {
            // consecutive User-agent lines share one group
            if has_rules || current.is_none() {
                groups.extend(current.take());
                current = Some(Group::default());
                has_rules = false;
            }
            if let Some(group) = current.as_mut() {
                group.agents.push(value.to_lowercase());
            }
            continue;
        }

        let Some(group) = current.as_mut() else {
            continue;
        };
        match key.as_str() {
            "allow" => {
                has_rules = true;
                if !value.is_empty() {
                    group.rules.allowed.push(value.to_string());
                }
            }
            "disallow" => {
                has_rules = true;
                if !value.is_empty() {
                    group.rules.disallowed.push(value.to_string());
                }
            }
            "crawl-delay" => {
                has_rules = true;
                if let Ok(delay) = value.parse::<f64>() {
                    group.rules.crawl_delay = Some(delay);
                }
            }
            _ => {}
        }
    }
    groups.extend(current);

    let chosen = groups
        .iter()
        .position(|g| g.names(&agent_token))
        .or_else(|| groups.iter().position(|g| g.agents.iter().any(|a| a == "*")));
    chosen.map(|i| groups.swap_remove(i).rules).unwrap_or_default()
}

fn path_matches(path: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return path.starts_with(prefix);
    }
    if let Some(exact) = pattern.strip_suffix('$') {
        return path == exact;
    }
    path.starts_with(pattern)
}

/// Per-origin robots.txt cache.
pub struct RobotsChecker {
    fetcher: Arc<dyn PageFetcher>,
    user_agent: String,
    cache: HashMap<String, Option<RobotsRules>>,
}

impl RobotsChecker {
    #[must_use]
    pub fn new(fetcher: Arc<dyn PageFetcher>, user_agent: &str) -> Self {
        Self {
            fetcher,
            user_agent: user_agent.to_string(),
            cache: HashMap::new(),
        }
    }

    async fn rules_for(&mut self, url: &Url) -> Option<&RobotsRules> {
        let origin = url.origin().ascii_serialization();
        if !self.cache.contains_key(&origin) {
            let robots_url = format!("{origin}/robots.txt");
            let rules = match self.fetcher.fetch(&robots_url).await {
                Ok(body) => {
                    tracing::info!(robots_url, "loaded robots.txt");
                    Some(parse_robots(&body, &self.user_agent))
                }
                Err(e) => {
                    tracing::warn!(robots_url, error = %e, "could not read robots.txt, allowing all");
                    None
                }
            };
            self.cache.insert(origin.clone(), rules);
        }
        self.cache.get(&origin).and_then(Option::as_ref)
    }

    /// Whether `url` may be fetched. Unparseable URLs and unreadable
    /// robots.txt files are allowed.
    pub async fn can_fetch(&mut self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        let mut path = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }

        let allowed = self
            .rules_for(&parsed)
            .await
            .is_none_or(|rules| rules.is_allowed(&path));
        if !allowed {
            tracing::warn!(url, "robots.txt disallows fetching");
        }
        allowed
    }

    /// `Crawl-delay` for the URL's origin, if one is declared.
    pub async fn crawl_delay(&mut self, url: &str) -> Option<Duration> {
        let parsed = Url::parse(url).ok()?;
        let delay = self.rules_for(&parsed).await?.crawl_delay?;
        if delay.is_finite() && delay > 0.0 {
            Duration::try_from_secs_f64(delay).ok()
        } else {
            None
        }
    }
}
