//! Core types for provider calls, await outcomes, and merge results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The two search backends this orchestrator coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Brave Search API — independent index, Latin-script strengths.
    Brave,
    /// Naver OpenAPI — Korean-language web documents.
    Naver,
}

impl ProviderKind {
    /// Returns the human-readable name of this provider.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Brave => "Brave",
            Self::Naver => "Naver",
        }
    }

    /// Returns the stable key used for breaker state and telemetry.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Brave => "websearch.brave",
            Self::Naver => "websearch.naver",
        }
    }

    /// Returns the sibling provider in the pair.
    pub fn sibling(&self) -> ProviderKind {
        match self {
            Self::Brave => Self::Naver,
            Self::Naver => Self::Brave,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome classification of a single provider invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallStatus {
    /// The provider answered normally (possibly with zero snippets).
    Ok,
    /// HTTP 429/503 — the provider asked us to back off.
    RateLimited,
    /// HTTP 5xx — the provider is failing on its side.
    ServerError,
    /// The call was not made because the provider is cooling down.
    Cooldown,
    /// Any other failure (transport, parse, rejection).
    Error,
}

/// Uniform result of one provider invocation.
///
/// Produced exactly once per scheduled call — including deliberate skips,
/// which yield a cache-only result so downstream code never handles a
/// missing value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCallResult {
    /// Outcome classification.
    pub status: CallStatus,
    /// Ordered snippet lines (`<a href="URL">TITLE</a> DESCRIPTION`).
    pub snippets: Vec<String>,
    /// Time the provider call took (zero for skips and cache reads).
    pub elapsed: Duration,
    /// Diagnostic message; empty on success.
    pub message: String,
    /// HTTP status of the upstream response, when one was received.
    pub http_status: Option<u16>,
    /// Parsed `Retry-After` hint on rate-limit responses.
    pub retry_after: Option<Duration>,
}

impl ProviderCallResult {
    /// A successful call result.
    pub fn ok(snippets: Vec<String>, elapsed: Duration) -> Self {
        Self {
            status: CallStatus::Ok,
            snippets,
            elapsed,
            message: String::new(),
            http_status: Some(200),
            retry_after: None,
        }
    }

    /// An empty successful result (the universal fallback value).
    pub fn empty() -> Self {
        Self::ok(Vec::new(), Duration::ZERO)
    }

    /// A rate-limited result carrying the provider's backoff hint.
    pub fn rate_limited(
        http_status: u16,
        message: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        Self {
            status: CallStatus::RateLimited,
            snippets: Vec::new(),
            elapsed: Duration::ZERO,
            message: message.into(),
            http_status: Some(http_status),
            retry_after,
        }
    }

    /// A 5xx server-side failure.
    pub fn server_error(http_status: u16, message: impl Into<String>) -> Self {
        Self {
            status: CallStatus::ServerError,
            snippets: Vec::new(),
            elapsed: Duration::ZERO,
            message: message.into(),
            http_status: Some(http_status),
            retry_after: None,
        }
    }

    /// A generic failure result.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: CallStatus::Error,
            snippets: Vec::new(),
            elapsed: Duration::ZERO,
            message: message.into(),
            http_status: None,
            retry_after: None,
        }
    }

    /// A cache-only result standing in for a skipped call.
    ///
    /// Hedge skips are scheduling outcomes, not failures, so they stay
    /// `Ok`; breaker/cooldown skips report `Cooldown`; the rest report
    /// `Error`.
    pub fn cache_only(snippets: Vec<String>, reason: SkipReason) -> Self {
        let status = match reason {
            SkipReason::HedgeSkip => CallStatus::Ok,
            SkipReason::BreakerOpen | SkipReason::Cooldown => CallStatus::Cooldown,
            SkipReason::Disabled | SkipReason::SubmitFailed => CallStatus::Error,
        };
        Self {
            status,
            snippets,
            elapsed: Duration::ZERO,
            message: format!("cache_only:{}", reason.as_str()),
            http_status: None,
            retry_after: None,
        }
    }
}

/// Why a provider call was deliberately not submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Provider disabled by configuration or missing credentials.
    Disabled,
    /// Circuit breaker reported the provider open.
    BreakerOpen,
    /// Provider-local cooldown window still running.
    Cooldown,
    /// Hedging decided the sibling already satisfied the request.
    HedgeSkip,
    /// The bounded executor rejected the submission.
    SubmitFailed,
}

impl SkipReason {
    /// Stable lowercase token for telemetry attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::BreakerOpen => "breaker_open",
            Self::Cooldown => "cooldown",
            Self::HedgeSkip => "hedge_skip",
            Self::SubmitFailed => "submit_failed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a bounded wait on a scheduled call ended.
///
/// Used only for telemetry and backoff decisions — never surfaced to the
/// caller of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwaitCause {
    /// The call completed within the wait.
    Ok,
    /// An opportunistic (non-cancelling) wait expired.
    TimeoutSoft,
    /// A deadline-driven wait expired.
    TimeoutHard,
    /// The shared budget was exhausted before waiting at all.
    BudgetExhausted,
    /// The task was cancelled out from under us.
    Interrupted,
    /// The task panicked.
    ExecutionError,
    /// The call was never submitted.
    Skipped(SkipReason),
}

impl AwaitCause {
    /// Stable lowercase token for telemetry attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::TimeoutSoft => "timeout_soft",
            Self::TimeoutHard => "timeout_hard",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Interrupted => "interrupted",
            Self::ExecutionError => "execution_error",
            Self::Skipped(_) => "skipped",
        }
    }

    /// Scheduling outcomes and completions are "okish" — they must not
    /// pollute failure counters.
    pub fn is_okish(&self) -> bool {
        matches!(self, Self::Ok | Self::Skipped(_))
    }

    /// True for both soft and hard timeout classifications.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::TimeoutSoft | Self::TimeoutHard | Self::BudgetExhausted
        )
    }
}

/// Tagged result of waiting on a scheduled call.
#[derive(Debug, Clone, Copy)]
pub struct AwaitOutcome {
    /// Why the wait ended.
    pub cause: AwaitCause,
    /// How long we actually waited.
    pub waited: Duration,
}

/// Ordered, deduplicated merge output with provenance counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// Deduplicated snippets, primary provider's results first.
    pub snippets: Vec<String>,
    /// How many kept snippets came from the primary list (first-seen wins,
    /// so overlap counts here).
    pub from_primary: usize,
    /// How many kept snippets came only from the secondary list.
    pub from_secondary: usize,
}

impl MergeResult {
    /// True when the merge produced nothing.
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}
