//! Trait definition for pluggable search provider backends.
//!
//! Each provider (Brave, Naver) implements [`SearchProvider`] to give the
//! orchestrator a uniform interface for live queries, cache-only reads,
//! and health introspection.

use async_trait::async_trait;

use crate::error::SearchError;
use crate::types::{ProviderCallResult, ProviderKind};

/// A pluggable search provider backend.
///
/// Implementors own their HTTP client, response parsing, local snippet
/// cache, and provider-local cooldown tracking. All implementations must
/// be `Send + Sync`; the orchestrator holds them behind `Arc<dyn …>` and
/// calls them from spawned tasks.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Which provider this implementation represents.
    fn kind(&self) -> ProviderKind;

    /// Whether this provider may be called at all (config flag and
    /// credentials present).
    fn is_enabled(&self) -> bool;

    /// Whether a provider-local cooldown window is currently running.
    fn is_cooling_down(&self) -> bool {
        false
    }

    /// Remaining cooldown in milliseconds, zero when not cooling down.
    fn cooldown_remaining_ms(&self) -> u64 {
        0
    }

    /// Perform a live search, normalising the response (including non-OK
    /// HTTP statuses) into a [`ProviderCallResult`].
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] only for transport-level failures (connect
    /// errors, timeouts) and unparseable bodies; rate limits and server
    /// errors are data, not errors.
    async fn search_with_meta(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<ProviderCallResult, SearchError>;

    /// Perform a live search and return just the snippet lines.
    ///
    /// # Errors
    ///
    /// Same as [`SearchProvider::search_with_meta`].
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>, SearchError> {
        Ok(self.search_with_meta(query, top_k).await?.snippets)
    }

    /// Read snippets for this query from the local cache only.
    ///
    /// Must never perform network I/O. Returns an empty list on a miss.
    async fn search_cache_only(&self, query: &str, top_k: usize) -> Vec<String>;
}
