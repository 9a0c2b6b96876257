//! Naver OpenAPI web-search client.
//!
//! Korean-language web documents via the `webkr` endpoint. Requires a
//! client id/secret pair; without credentials the provider reports itself
//! disabled and is skipped upstream.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{parse_retry_after, snippet_line, CooldownGate};
use crate::cache::{SnippetCache, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECS};
use crate::error::{Result, SearchError};
use crate::provider::SearchProvider;
use crate::types::{ProviderCallResult, ProviderKind};

const DEFAULT_BASE_URL: &str = "https://openapi.naver.com";
const SEARCH_PATH: &str = "/v1/search/webkr.json";

/// Configuration for the Naver client.
#[derive(Debug, Clone)]
pub struct NaverConfig {
    /// OpenAPI client id. `None` disables the provider.
    pub client_id: Option<String>,
    /// OpenAPI client secret. `None` disables the provider.
    pub client_secret: Option<String>,
    /// Host base URL.
    pub base_url: String,
    /// Config flag allowing the provider to be switched off with
    /// credentials still present.
    pub enabled: bool,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Snippet cache capacity (entries).
    pub cache_capacity: u64,
    /// Snippet cache TTL.
    pub cache_ttl: Duration,
}

impl Default for NaverConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            enabled: true,
            timeout: Duration::from_secs(3),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl NaverConfig {
    /// Read credentials from the environment (`NAVER_CLIENT_ID` /
    /// `NAVER_CLIENT_SECRET`).
    pub fn from_env() -> Self {
        let client_id = std::env::var("NAVER_CLIENT_ID")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let client_secret = std::env::var("NAVER_CLIENT_SECRET")
            .ok()
            .filter(|v| !v.trim().is_empty());
        Self {
            client_id,
            client_secret,
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct NaverResponse {
    #[serde(default)]
    items: Vec<NaverDoc>,
}

#[derive(Debug, Deserialize)]
struct NaverDoc {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    description: String,
}

/// Strip Naver's `<b>` emphasis tags and decode the entities it emits.
fn clean_text(text: &str) -> String {
    text.replace("<b>", "")
        .replace("</b>", "")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

/// Parse a Naver `webkr` response body into snippet lines.
pub(crate) fn parse_body(body: &str) -> Result<Vec<String>> {
    let response: NaverResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("naver response: {e}")))?;
    Ok(response
        .items
        .iter()
        .filter(|doc| !doc.link.is_empty() || !doc.title.is_empty())
        .map(|doc| {
            snippet_line(
                &clean_text(&doc.title),
                &doc.link,
                &clean_text(&doc.description),
            )
        })
        .collect())
}

/// Naver OpenAPI provider.
pub struct NaverProvider {
    config: NaverConfig,
    client: reqwest::Client,
    cache: SnippetCache,
    cooldown: CooldownGate,
}

impl NaverProvider {
    /// Build the provider and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the client cannot be constructed.
    pub fn new(config: NaverConfig) -> Result<Self> {
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

    fn request_url(&self, query: &str, display: usize) -> Result<Url> {
        let base = self.config.base_url.trim().trim_end_matches('/');
        let mut url = Url::parse(base)
            .and_then(|u| u.join(SEARCH_PATH))
            .map_err(|e| SearchError::Config(format!("naver base_url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("display", &display.to_string());
        Ok(url)
    }
}

#[async_trait]
impl SearchProvider for NaverProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Naver
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
            && self.config.client_id.is_some()
            && self.config.client_secret.is_some()
    }

    fn is_cooling_down(&self) -> bool {
        self.cooldown.active()
    }

    fn cooldown_remaining_ms(&self) -> u64 {
        self.cooldown.remaining_ms()
    }

    async fn search_with_meta(&self, query: &str, top_k: usize) -> Result<ProviderCallResult> {
        let (Some(client_id), Some(client_secret)) = (
            self.config.client_id.as_deref(),
            self.config.client_secret.as_deref(),
        ) else {
            return Ok(ProviderCallResult::error("missing credentials"));
        };
        let display = top_k.clamp(1, 30);
        let url = self.request_url(query, display)?;

        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .header("X-Naver-Client-Id", client_id)
            .header("X-Naver-Client-Secret", client_secret)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout(format!("naver: {e}"))
                } else {
                    SearchError::Http(format!("naver: {e}"))
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
            .map_err(|e| SearchError::Http(format!("naver body: {e}")))?;
        let snippets = parse_body(&body)?;
        let elapsed = started.elapsed();
        tracing::trace!(count = snippets.len(), elapsed_ms = elapsed.as_millis() as u64, "naver results");

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
        assert_send_sync::<NaverProvider>();
    }

    #[test]
    fn disabled_without_credentials() {
        let provider = NaverProvider::new(NaverConfig::default()).expect("client");
        assert!(!provider.is_enabled());

        let provider = NaverProvider::new(NaverConfig {
            client_id: Some("id".into()),
            ..Default::default()
        })
        .expect("client");
        assert!(!provider.is_enabled());
    }

    #[test]
    fn enabled_with_full_credentials() {
        let provider = NaverProvider::new(NaverConfig {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            ..Default::default()
        })
        .expect("client");
        assert!(provider.is_enabled());
        assert_eq!(provider.kind(), ProviderKind::Naver);
    }

    #[test]
    fn request_url_uses_webkr_endpoint() {
        let provider = NaverProvider::new(NaverConfig {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            ..Default::default()
        })
        .expect("client");
        let url = provider.request_url("갤럭시", 6).expect("url");
        assert!(url.as_str().starts_with("https://openapi.naver.com/v1/search/webkr.json"));
        assert!(url.query().unwrap().contains("display=6"));
    }

    #[test]
    fn clean_text_strips_emphasis_and_entities() {
        assert_eq!(clean_text("<b>갤럭시</b> 스펙"), "갤럭시 스펙");
        assert_eq!(clean_text("a &quot;b&quot; &amp; c"), "a \"b\" & c");
    }

    #[test]
    fn parse_body_extracts_snippet_lines() {
        let body = r#"{
            "total": 2,
            "items": [
                {"title": "<b>갤럭시</b> 공식", "link": "https://samsung.com", "description": "스펙 <b>정보</b>"},
                {"title": "리뷰", "link": "https://review.example", "description": "상세 리뷰"}
            ]
        }"#;
        let snippets = parse_body(body).expect("parse");
        assert_eq!(snippets.len(), 2);
        assert_eq!(
            snippets[0],
            "<a href=\"https://samsung.com\">갤럭시 공식</a> 스펙 정보"
        );
    }

    #[test]
    fn parse_body_handles_empty_items() {
        let snippets = parse_body(r#"{"total": 0, "items": []}"#).expect("parse");
        assert!(snippets.is_empty());
    }

    #[test]
    fn parse_body_rejects_non_json() {
        assert!(parse_body("not json").is_err());
    }
}
