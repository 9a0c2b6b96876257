//! In-memory snippet cache backing the cache-only accessor.
//!
//! Each provider owns one [`SnippetCache`] keyed by the normalised query.
//! Live calls write through on success; cache-only reads (skips, the
//! rescue ladder) never touch the network. Uses [`moka`] for
//! async-friendly caching with TTL and automatic eviction.

use std::time::Duration;

use moka::future::Cache;

/// Default maximum number of cached snippet sets per provider.
pub const DEFAULT_CACHE_CAPACITY: u64 = 100;

/// Default snippet TTL in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;

/// Normalise a query into a stable cache key.
///
/// Collapses whitespace, trims, lowercases, and bounds the key length so
/// pathological inputs cannot bloat the cache.
pub fn normalize_query_key(query: &str) -> String {
    let mut key = query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if key.len() > 512 {
        // Truncate on a char boundary.
        let mut end = 512;
        while !key.is_char_boundary(end) {
            end -= 1;
        }
        key.truncate(end);
    }
    key
}

/// Per-provider snippet cache.
///
/// One instance per provider, owned by the provider client — not a
/// process-wide singleton, so unit tests stay isolated.
pub struct SnippetCache {
    cache: Cache<String, Vec<String>>,
}

impl std::fmt::Debug for SnippetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnippetCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl SnippetCache {
    /// Create a cache with the given capacity and TTL.
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Look up cached snippets, truncated to `top_k`.
    ///
    /// Returns an empty list on a miss.
    pub async fn get(&self, query: &str, top_k: usize) -> Vec<String> {
        let mut snippets = self
            .cache
            .get(&normalize_query_key(query))
            .await
            .unwrap_or_default();
        if top_k > 0 {
            snippets.truncate(top_k);
        }
        snippets
    }

    /// Insert snippets for a query, replacing any previous entry.
    pub async fn insert(&self, query: &str, snippets: Vec<String>) {
        self.cache.insert(normalize_query_key(query), snippets).await;
    }
}

impl Default for SnippetCache {
    fn default() -> Self {
        Self::new(
            DEFAULT_CACHE_CAPACITY,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_normalises_case_and_whitespace() {
        assert_eq!(
            normalize_query_key("  Rust   Programming  "),
            "rust programming"
        );
        assert_eq!(
            normalize_query_key("RUST programming"),
            normalize_query_key("rust Programming")
        );
    }

    #[test]
    fn key_bounded_for_long_queries() {
        let long = "word ".repeat(200);
        assert!(normalize_query_key(&long).len() <= 512);
    }

    #[test]
    fn key_truncation_respects_char_boundaries() {
        let hangul = "한글".repeat(200);
        let key = normalize_query_key(&hangul);
        assert!(key.len() <= 512);
        // Must still be valid UTF-8 content (no panic, chars intact).
        assert!(key.chars().all(|c| c == '한' || c == '글'));
    }

    #[tokio::test]
    async fn miss_returns_empty() {
        let cache = SnippetCache::default();
        assert!(cache.get("nothing here", 5).await.is_empty());
    }

    #[tokio::test]
    async fn insert_and_retrieve() {
        let cache = SnippetCache::default();
        cache
            .insert("rust programming", vec!["a".into(), "b".into()])
            .await;
        let snippets = cache.get("Rust   Programming", 5).await;
        assert_eq!(snippets, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn get_truncates_to_top_k() {
        let cache = SnippetCache::default();
        cache
            .insert("query", vec!["a".into(), "b".into(), "c".into()])
            .await;
        assert_eq!(cache.get("query", 2).await.len(), 2);
    }

    #[tokio::test]
    async fn overwrite_replaces_previous_entry() {
        let cache = SnippetCache::default();
        cache.insert("query", vec!["old".into()]).await;
        cache.insert("query", vec!["new".into()]).await;
        assert_eq!(cache.get("query", 5).await, vec!["new".to_string()]);
    }

    #[tokio::test]
    async fn instances_are_isolated() {
        let one = SnippetCache::default();
        let two = SnippetCache::default();
        one.insert("query", vec!["hit".into()]).await;
        assert!(two.get("query", 5).await.is_empty());
    }
}
