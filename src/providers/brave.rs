//! Brave Search API client.
//!
//! Independent index with good Latin-script coverage. Honours an API key
//! supplied via configuration; when no key is configured the provider
//! reports itself disabled and is skipped upstream — never an error.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{parse_retry_after, snippet_line, CooldownGate};
use crate::cache::{SnippetCache, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECS};
use crate::error::{Result, SearchError};
use crate::provider::SearchProvider;
use crate::types::{ProviderCallResult, ProviderKind};

const DEFAULT_BASE_URL: &str = "https://api.search.brave.com";
const SEARCH_PATH: &str = "/res/v1/web/search";

/// Configuration for the Brave client.
#[derive(Debug, Clone)]
pub struct BraveConfig {
    /// Subscription token. `None` disables the provider.
    pub api_key: Option<String>,
    /// Host base URL, or a full endpoint URL including the search path.
    pub base_url: String,
    /// Config flag allowing the provider to be switched off with a key
    /// still present.
    pub enabled: bool,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Snippet cache capacity (entries).
    pub cache_capacity: u64,
    /// Snippet cache TTL.
    pub cache_ttl: Duration,
}

impl Default for BraveConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            enabled: true,
            timeout: Duration::from_secs(3),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl BraveConfig {
    /// Read the API key from the environment (`BRAVE_API_KEY` or
    /// `BRAVE_SUBSCRIPTION_TOKEN`).
    pub fn from_env() -> Self {
        let api_key = std::env::var("BRAVE_API_KEY")
            .or_else(|_| std::env::var("BRAVE_SUBSCRIPTION_TOKEN"))
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self {
            api_key,
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveDoc>,
}

#[derive(Debug, Deserialize)]
struct BraveDoc {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

/// Parse a Brave web-search response body into snippet lines.
pub(crate) fn parse_body(body: &str) -> Result<Vec<String>> {
    let response: BraveResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("brave response: {e}")))?;
    let results = response.web.map(|web| web.results).unwrap_or_default();
    Ok(results
        .iter()
        .filter(|doc| !doc.url.is_empty() || !doc.title.is_empty())
        .map(|doc| snippet_line(&doc.title, &doc.url, &doc.description))
        .collect())
}

/// Split a configured base URL into host base and endpoint path,
/// accepting either a bare host or a full endpoint URL.
fn split_endpoint(configured: &str) -> (String, String) {
    let trimmed = configured.trim().trim_end_matches('/');
    let base = if trimmed.is_empty() {
        DEFAULT_BASE_URL
    } else {
        trimmed
    };
    match base.to_lowercase().find(SEARCH_PATH) {
        Some(idx) => (base[..idx].to_string(), base[idx..].to_string()),
        None => (base.to_string(), SEARCH_PATH.to_string()),
    }
}

/// Brave Search API provider.
pub struct BraveProvider {
    config: BraveConfig,
    client: reqwest::Client,
    cache: SnippetCache,
    cooldown: CooldownGate,
}

impl BraveProvider {
    /// Build the provider and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the client cannot be constructed.
    pub fn new(config: BraveConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))?;
        let cache = SnippetCache::new(config.cache_capacity, config.cache_ttl);
        Ok(Self {
            config,
            client,
            cache,
            cooldown: CooldownGate::default(),
        })
    }

    fn request_url(&self, query: &str, count: usize) -> Result<Url> {
        let (base, path) = split_endpoint(&self.config.base_url);
        let mut url = Url::parse(&base)
            .and_then(|u| u.join(&path))
            .map_err(|e| SearchError::Config(format!("brave base_url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("count", &count.to_string());
        Ok(url)
    }
}

#[async_trait]
impl SearchProvider for BraveProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Brave
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && self.config.api_key.is_some()
    }

    fn is_cooling_down(&self) -> bool {
        self.cooldown.active()
    }

    fn cooldown_remaining_ms(&self) -> u64 {
        self.cooldown.remaining_ms()
    }

    async fn search_with_meta(&self, query: &str, top_k: usize) -> Result<ProviderCallResult> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Ok(ProviderCallResult::error("missing api key"));
        };
        let count = top_k.clamp(1, 20);
        let url = self.request_url(query, count)?;

        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .header("X-Subscription-Token", api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout(format!("brave: {e}"))
                } else {
                    SearchError::Http(format!("brave: {e}"))
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 || status.as_u16() == 503 {
            let retry_after = parse_retry_after(
                response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok()),
            );
            self.cooldown
                .set(retry_after.unwrap_or(Duration::from_secs(30)));
            return Ok(ProviderCallResult::rate_limited(
                status.as_u16(),
                format!("HTTP {}", status.as_u16()),
                retry_after,
            ));
        }
        if status.is_server_error() {
            return Ok(ProviderCallResult::server_error(
                status.as_u16(),
                format!("HTTP {}", status.as_u16()),
            ));
        }
        if !status.is_success() {
            let mut result = ProviderCallResult::error(format!("HTTP {}", status.as_u16()));
            result.http_status = Some(status.as_u16());
            return Ok(result);
        }

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Http(format!("brave body: {e}")))?;
        let snippets = parse_body(&body)?;
        let elapsed = started.elapsed();
        tracing::trace!(count = snippets.len(), elapsed_ms = elapsed.as_millis() as u64, "brave results");

        if !snippets.is_empty() {
            self.cache.insert(query, snippets.clone()).await;
        }
        Ok(ProviderCallResult::ok(snippets, elapsed))
    }

    async fn search_cache_only(&self, query: &str, top_k: usize) -> Vec<String> {
        self.cache.get(query, top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BraveProvider>();
    }

    #[test]
    fn disabled_without_api_key() {
        let provider = BraveProvider::new(BraveConfig::default()).expect("client");
        assert!(!provider.is_enabled());
    }

    #[test]
    fn enabled_with_api_key() {
        let provider = BraveProvider::new(BraveConfig {
            api_key: Some("token".into()),
            ..Default::default()
        })
        .expect("client");
        assert!(provider.is_enabled());
        assert_eq!(provider.kind(), ProviderKind::Brave);
    }

    #[test]
    fn config_flag_overrides_key() {
        let provider = BraveProvider::new(BraveConfig {
            api_key: Some("token".into()),
            enabled: false,
            ..Default::default()
        })
        .expect("client");
        assert!(!provider.is_enabled());
    }

    #[test]
    fn endpoint_split_accepts_bare_host() {
        let (base, path) = split_endpoint("https://api.search.brave.com");
        assert_eq!(base, "https://api.search.brave.com");
        assert_eq!(path, "/res/v1/web/search");
    }

    #[test]
    fn endpoint_split_accepts_full_endpoint() {
        let (base, path) = split_endpoint("https://proxy.example.com/res/v1/web/search");
        assert_eq!(base, "https://proxy.example.com");
        assert_eq!(path, "/res/v1/web/search");
    }

    #[test]
    fn endpoint_split_trims_trailing_slash() {
        let (base, _) = split_endpoint("https://api.search.brave.com/");
        assert_eq!(base, "https://api.search.brave.com");
    }

    #[test]
    fn request_url_includes_query_and_count() {
        let provider = BraveProvider::new(BraveConfig {
            api_key: Some("token".into()),
            ..Default::default()
        })
        .expect("client");
        let url = provider.request_url("rust async", 8).expect("url");
        assert!(url.as_str().starts_with("https://api.search.brave.com/res/v1/web/search"));
        assert!(url.query().unwrap().contains("q=rust+async"));
        assert!(url.query().unwrap().contains("count=8"));
    }

    #[test]
    fn parse_body_extracts_snippet_lines() {
        let body = r#"{
            "web": {
                "results": [
                    {"title": "Rust", "url": "https://rust-lang.org", "description": "A language"},
                    {"title": "Tokio", "url": "https://tokio.rs", "description": "Async runtime"}
                ]
            }
        }"#;
        let snippets = parse_body(body).expect("parse");
        assert_eq!(snippets.len(), 2);
        assert_eq!(
            snippets[0],
            "<a href=\"https://rust-lang.org\">Rust</a> A language"
        );
    }

    #[test]
    fn parse_body_handles_missing_web_section() {
        let snippets = parse_body(r#"{"type": "search"}"#).expect("parse");
        assert!(snippets.is_empty());
    }

    #[test]
    fn parse_body_skips_fully_empty_docs() {
        let body = r#"{"web": {"results": [{"title": "", "url": "", "description": "x"}]}}"#;
        let snippets = parse_body(body).expect("parse");
        assert!(snippets.is_empty());
    }

    #[test]
    fn parse_body_rejects_non_json() {
        assert!(parse_body("<html>blocked</html>").is_err());
    }
}
