//! Error types for the hybrid-search crate.
//!
//! All errors use stable string messages suitable for display and
//! programmatic handling. No API keys or credentials appear in error
//! messages. Note that the orchestrator's public entry point never
//! surfaces these — every failure mode degrades to an empty snippet
//! list; `SearchError` is for configuration and provider-client code.

/// Errors that can occur inside provider clients and configuration.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Invalid orchestrator or provider configuration.
    #[error("config error: {0}")]
    Config(String),

    /// An HTTP request to a provider failed at the transport level.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A provider call exceeded its per-call timeout.
    #[error("provider timed out: {0}")]
    Timeout(String),

    /// Failed to parse a provider response body.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Convenience type alias for hybrid-search results.
pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_config() {
        let err = SearchError::Config("overall_timeout_ms must be > 0".into());
        assert_eq!(
            err.to_string(),
            "config error: overall_timeout_ms must be > 0"
        );
    }

    #[test]
    fn display_http() {
        let err = SearchError::Http("connection refused".into());
        assert_eq!(err.to_string(), "HTTP error: connection refused");
    }

    #[test]
    fn display_timeout() {
        let err = SearchError::Timeout("brave exceeded 3000ms".into());
        assert_eq!(err.to_string(), "provider timed out: brave exceeded 3000ms");
    }

    #[test]
    fn display_parse() {
        let err = SearchError::Parse("unexpected response shape".into());
        assert_eq!(err.to_string(), "parse error: unexpected response shape");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SearchError>();
    }
}
