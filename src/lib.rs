//! # hybrid-search
//!
//! Resilient two-provider web search orchestration.
//!
//! This crate answers a query by fanning it out to two independent,
//! unreliable search backends (Brave Search API, Naver OpenAPI), bounding
//! total latency with a shared deadline, tolerating partial or total
//! provider failure, and returning a deduplicated, trust-filtered snippet
//! list.
//!
//! ## Design
//!
//! - One monotonic deadline budget per request, threaded through every
//!   nested await; completed work is always collected even at zero budget
//! - Hedged scheduling: the secondary provider starts only when the
//!   primary is slow or insufficient (bypassed in official mode, where
//!   evidence diversity wins)
//! - Circuit-breaker-gated provider calls with uniform cache-only results
//!   for every skip reason
//! - Order-preserving merge with a minimum-output floor and a strict-mode
//!   low-trust filter
//! - Cache-only rescue ladder and a single backup-query retry for
//!   transient empty results
//! - Every failure degrades to an empty list; the entry point never fails
//!
//! ## Security
//!
//! - API credentials never appear in errors, events, or logs
//! - Search queries are logged only at trace level
//! - No network listeners — this is a library, not a server
//!
//! ## Example
//!
//! ```no_run
//! # async fn example() -> hybrid_search::Result<()> {
//! use std::sync::Arc;
//! use hybrid_search::{
//!     BraveConfig, BraveProvider, CircuitBreaker, NaverConfig, NaverProvider,
//!     RequestContext, SearchConfig, SearchOrchestrator, TracingRecorder,
//! };
//!
//! let orchestrator = SearchOrchestrator::new(
//!     Arc::new(BraveProvider::new(BraveConfig::from_env())?),
//!     Arc::new(NaverProvider::new(NaverConfig::from_env())?),
//!     Arc::new(CircuitBreaker::default()),
//!     Arc::new(TracingRecorder),
//!     SearchConfig::default(),
//! )?;
//!
//! let snippets = orchestrator
//!     .search("갤럭시 s26 스펙", 5, &RequestContext::new())
//!     .await;
//! for snippet in &snippets {
//!     println!("{snippet}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod budget;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod invoker;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod query;
pub mod telemetry;
pub mod tuner;
pub mod types;

pub use budget::DeadlineBudget;
pub use config::SearchConfig;
pub use context::RequestContext;
pub use error::{Result, SearchError};
pub use health::{BreakerConfig, CircuitBreaker, CircuitState, FailureKind, ProviderHealth};
pub use orchestrator::backup::BackupQueryBuilder;
pub use orchestrator::search::SearchOrchestrator;
pub use provider::SearchProvider;
pub use providers::{BraveConfig, BraveProvider, NaverConfig, NaverProvider};
pub use telemetry::{TelemetryLevel, TelemetryRecorder, TracingRecorder};
pub use types::{
    AwaitCause, AwaitOutcome, CallStatus, MergeResult, ProviderCallResult, ProviderKind,
    SkipReason,
};
