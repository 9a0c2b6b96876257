//! Provider invocation: preflight checks, bounded submission, and the
//! scheduled-call handle the await primitives operate on.
//!
//! Turning "call provider X" into a uniform [`ScheduledCall`] keeps the
//! orchestrator free of wiring concerns: a provider that cannot be called
//! (disabled, breaker open, cooling down, executor saturated) still
//! yields a cache-only result with a recorded [`SkipReason`], never a
//! missing value.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::SearchError;
use crate::health::{FailureKind, ProviderHealth};
use crate::provider::SearchProvider;
use crate::telemetry::RequestStats;
use crate::types::{CallStatus, ProviderCallResult, ProviderKind, SkipReason};

/// Why joining a scheduled call did not yield a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinFailure {
    /// The wait expired; the call may still complete later.
    Timeout,
    /// The task was cancelled out from under us.
    Cancelled,
    /// The task panicked.
    Panicked,
}

/// A scheduled provider call.
///
/// Wraps the spawned task plus a memoised outcome so the call can be
/// peeked during hedging and collected again later without re-polling a
/// completed future. Skipped calls are constructed already-complete with
/// their cache-only result.
pub struct ScheduledCall {
    provider: ProviderKind,
    handle: Option<JoinHandle<ProviderCallResult>>,
    done: Option<ProviderCallResult>,
    failed: Option<JoinFailure>,
    live: bool,
    skip: Option<SkipReason>,
}

impl ScheduledCall {
    /// A live call backed by a spawned task.
    pub(crate) fn live(provider: ProviderKind, handle: JoinHandle<ProviderCallResult>) -> Self {
        Self {
            provider,
            handle: Some(handle),
            done: None,
            failed: None,
            live: true,
            skip: None,
        }
    }

    /// An already-complete call (deliberate skip with cache-only result).
    pub(crate) fn ready(
        provider: ProviderKind,
        result: ProviderCallResult,
        skip: Option<SkipReason>,
    ) -> Self {
        Self {
            provider,
            handle: None,
            done: Some(result),
            failed: None,
            live: false,
            skip,
        }
    }

    /// Which provider this call targets.
    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// True when this call actually hit the network.
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// The skip reason, when this call was never submitted.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        self.skip
    }

    /// True when a result (or terminal failure) is already available.
    pub fn is_finished(&self) -> bool {
        self.done.is_some()
            || self.failed.is_some()
            || self.handle.as_ref().is_some_and(|h| h.is_finished())
    }

    /// Wait up to `wait` for the call to complete.
    ///
    /// A completed result is memoised: later joins return it instantly.
    /// A zero `wait` still collects an already-completed task. On timeout
    /// the task keeps running — it is never aborted, so a late completion
    /// can still populate the provider cache for the rescue ladder.
    pub(crate) async fn try_join(
        &mut self,
        wait: Duration,
    ) -> Result<ProviderCallResult, JoinFailure> {
        if let Some(done) = &self.done {
            return Ok(done.clone());
        }
        if let Some(failed) = self.failed {
            return Err(failed);
        }
        let Some(handle) = self.handle.as_mut() else {
            return Err(JoinFailure::Cancelled);
        };
        let joined = tokio::time::timeout(wait, handle).await;
        match joined {
            Ok(Ok(result)) => {
                self.handle = None;
                self.done = Some(result.clone());
                Ok(result)
            }
            Ok(Err(join_err)) => {
                self.handle = None;
                let failure = if join_err.is_cancelled() {
                    JoinFailure::Cancelled
                } else {
                    JoinFailure::Panicked
                };
                self.failed = Some(failure);
                Err(failure)
            }
            Err(_elapsed) => Err(JoinFailure::Timeout),
        }
    }
}

/// Submits bounded-concurrency provider calls and wires their outcomes
/// back to the health breaker.
pub struct ProviderInvoker {
    permits: Arc<Semaphore>,
    health: Arc<dyn ProviderHealth>,
}

impl ProviderInvoker {
    /// New invoker with the given submission bound.
    pub fn new(max_concurrent_calls: usize, health: Arc<dyn ProviderHealth>) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent_calls)),
            health,
        }
    }

    /// Schedule one provider call, enforcing preflight checks.
    ///
    /// Check order: enabled flag → breaker open → provider cooldown →
    /// bounded submit. Any failing check records its [`SkipReason`] and
    /// returns a cache-only [`ScheduledCall`] so telemetry distinguishes
    /// deliberate skips from wiring bugs.
    pub async fn schedule(
        &self,
        provider: Arc<dyn SearchProvider>,
        query: &str,
        top_k: usize,
        stats: &Arc<RequestStats>,
    ) -> ScheduledCall {
        let kind = provider.kind();

        let skip = if !provider.is_enabled() {
            Some((SkipReason::Disabled, 0))
        } else if self.health.is_open(kind) {
            Some((SkipReason::BreakerOpen, self.health.remaining_open_ms(kind)))
        } else if provider.is_cooling_down() {
            Some((SkipReason::Cooldown, provider.cooldown_remaining_ms()))
        } else {
            None
        };

        if let Some((reason, extra_ms)) = skip {
            tracing::warn!(provider = %kind, reason = %reason, extra_ms, "provider skipped");
            stats.record_skip(kind, reason, extra_ms);
            let cached = provider.search_cache_only(query, top_k).await;
            return ScheduledCall::ready(
                kind,
                ProviderCallResult::cache_only(cached, reason),
                Some(reason),
            );
        }

        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                // Bounded executor saturated — fail fast, never queue.
                tracing::warn!(provider = %kind, "provider submit rejected (executor saturated)");
                stats.record_skip(kind, SkipReason::SubmitFailed, 0);
                let cached = provider.search_cache_only(query, top_k).await;
                return ScheduledCall::ready(
                    kind,
                    ProviderCallResult::cache_only(cached, SkipReason::SubmitFailed),
                    Some(SkipReason::SubmitFailed),
                );
            }
        };

        let health = Arc::clone(&self.health);
        let stats = Arc::clone(stats);
        let query = query.to_string();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            match provider.search_with_meta(&query, top_k).await {
                Ok(result) => {
                    report_outcome(&*health, &stats, kind, &query, &result);
                    result
                }
                Err(err) => {
                    match &err {
                        SearchError::Timeout(msg) => health.record_timeout(kind, &query, msg),
                        SearchError::Parse(msg) => {
                            health.record_failure(kind, FailureKind::Parse, msg, &query);
                        }
                        other => {
                            health.record_failure(
                                kind,
                                FailureKind::Transport,
                                &other.to_string(),
                                &query,
                            );
                        }
                    }
                    stats.record_non_ok(kind, "error");
                    tracing::warn!(provider = %kind, error = %err, "provider call failed");
                    ProviderCallResult::error(err.to_string())
                }
            }
        });

        ScheduledCall::live(kind, handle)
    }
}

/// Report a normalised call result back to the breaker.
fn report_outcome(
    health: &dyn ProviderHealth,
    stats: &RequestStats,
    kind: ProviderKind,
    query: &str,
    result: &ProviderCallResult,
) {
    match result.status {
        CallStatus::Ok => health.record_success(kind, result.elapsed),
        CallStatus::RateLimited => {
            stats.record_rate_limited(kind);
            health.record_rate_limit(kind, query, &result.message, result.retry_after);
        }
        CallStatus::ServerError => {
            stats.record_non_ok(kind, "server_error");
            health.record_failure(kind, FailureKind::Unknown, &result.message, query);
        }
        CallStatus::Error if result.http_status == Some(403) => {
            stats.record_non_ok(kind, "rejected");
            health.record_rejected(kind, query, &result.message);
        }
        CallStatus::Error => {
            stats.record_non_ok(kind, "error");
            health.record_failure(kind, FailureKind::Unknown, &result.message, query);
        }
        // Cooldown results only come from skips, which never reach here.
        CallStatus::Cooldown => {}
    }
}
