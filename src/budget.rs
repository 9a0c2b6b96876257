//! Shared deadline budget and bounded await primitives.
//!
//! A [`DeadlineBudget`] is derived once per request from the overall
//! timeout and threaded by reference through every nested call. The await
//! primitives here are the only suspension points in the orchestrator:
//!
//! - [`await_with_deadline`] — deadline-driven wait with floor and cap
//!   handling. Completed work is always collected, even at zero budget;
//!   a timed-out call is never aborted, so its late completion can still
//!   populate the provider cache for the rescue ladder.
//! - [`await_soft`] — opportunistic, non-cancelling wait used when the
//!   sibling provider already satisfied the requested result count.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::SearchConfig;
use crate::context::RequestContext;
use crate::invoker::{JoinFailure, ScheduledCall};
use crate::telemetry::RequestStats;
use crate::types::{AwaitCause, AwaitOutcome, ProviderCallResult};

/// Monotonic shared deadline for one request.
///
/// Immutable once created; shared by reference across provider calls.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineBudget {
    deadline: Instant,
}

impl DeadlineBudget {
    /// Derive the deadline from the overall per-request timeout.
    pub fn from_millis(total_ms: u64) -> Self {
        Self {
            deadline: Instant::now() + Duration::from_millis(total_ms),
        }
    }

    /// A budget expiring at the given instant.
    pub(crate) fn until(deadline: Instant) -> Self {
        Self { deadline }
    }

    /// Remaining time in milliseconds.
    ///
    /// Millisecond conversion truncates sub-millisecond remainders to 0;
    /// a 1ms minimum keeps a positive remaining budget from being
    /// misclassified as exhausted.
    pub fn remaining_ms(&self) -> u64 {
        let now = Instant::now();
        if now >= self.deadline {
            return 0;
        }
        let ms = (self.deadline - now).as_millis() as u64;
        ms.max(1)
    }

    /// True when no budget remains.
    pub fn is_exhausted(&self) -> bool {
        self.remaining_ms() == 0
    }
}

/// Compute the first provider's per-call join timeout.
///
/// Keeps the inner block shorter than the outer await by `margin_ms`,
/// applies the per-call cap, and optionally reserves a budget slice for
/// the sibling call so the first join cannot starve it. The result never
/// drops below 250ms — a sub-250ms live join is all overhead.
pub(crate) fn resolve_block_timeout_ms(
    budget: &DeadlineBudget,
    cap_ms: u64,
    reserve_ms: u64,
    margin_ms: u64,
) -> u64 {
    let remaining = budget.remaining_ms();
    let raw = remaining.saturating_sub(margin_ms);
    let cap_effective = if cap_ms > 0 {
        cap_ms.saturating_sub(margin_ms)
    } else {
        0
    };

    let mut effective = raw;
    if cap_effective > 0 && effective > cap_effective {
        effective = cap_effective;
    }
    if reserve_ms > 0 {
        let max_allow = remaining.saturating_sub(reserve_ms);
        if max_allow > 0 && effective > max_allow {
            effective = max_allow;
        }
    }
    effective.max(250)
}

/// Collect an already-completed call.
///
/// Exists because a shared deadline can hit zero even though the call has
/// already finished — the result must be collected, not discarded.
async fn collect_now(
    call: &mut ScheduledCall,
    fallback: ProviderCallResult,
    stats: &RequestStats,
    stage: &'static str,
) -> ProviderCallResult {
    let started = Instant::now();
    match call.try_join(Duration::ZERO).await {
        Ok(result) => {
            stats.record_await(
                call.provider(),
                stage,
                AwaitOutcome {
                    cause: AwaitCause::Ok,
                    waited: started.elapsed(),
                },
                0,
            );
            result
        }
        Err(JoinFailure::Cancelled) => {
            stats.record_await(
                call.provider(),
                stage,
                AwaitOutcome {
                    cause: AwaitCause::Interrupted,
                    waited: started.elapsed(),
                },
                0,
            );
            fallback
        }
        Err(JoinFailure::Panicked) => {
            stats.record_await(
                call.provider(),
                stage,
                AwaitOutcome {
                    cause: AwaitCause::ExecutionError,
                    waited: started.elapsed(),
                },
                0,
            );
            fallback
        }
        Err(JoinFailure::Timeout) => fallback,
    }
}

/// Deadline-driven wait on a scheduled call.
///
/// - An already-completed call is collected regardless of remaining
///   budget.
/// - At zero remaining budget with no floor, returns `fallback`
///   immediately — without aborting the call, since cancellation risks
///   discarding results that complete microseconds later.
/// - A minimum live-budget floor (larger in official mode) converts a
///   would-be immediate failure into a short bounded wait when the budget
///   is exhausted (official mode only), near-exhausted, or merely tiny.
/// - `cap_ms` bounds the wait independently of the shared deadline
///   (0 = no cap).
pub(crate) async fn await_with_deadline(
    call: &mut ScheduledCall,
    budget: &DeadlineBudget,
    cap_ms: u64,
    fallback: ProviderCallResult,
    cfg: &SearchConfig,
    ctx: &RequestContext,
    stats: &RequestStats,
) -> ProviderCallResult {
    let provider = call.provider();

    if call.is_finished() {
        return collect_now(call, fallback, stats, "hard").await;
    }

    let raw_ms = budget.remaining_ms();
    let budget_exhausted = raw_ms == 0;

    let floor_ms = cfg.floor_ms(ctx.official_only);
    let near_exhausted = raw_ms > 0
        && cfg.near_exhausted_threshold_ms > 0
        && raw_ms <= cfg.near_exhausted_threshold_ms;
    let tiny_budget = raw_ms > 0 && floor_ms > 0 && raw_ms < floor_ms;

    let floor_applied = floor_ms > 0
        && (near_exhausted
            || (cfg.floor_tiny_budget && tiny_budget)
            || (budget_exhausted && ctx.official_only && cfg.floor_budget_exhausted_official));
    let floor_cause = if budget_exhausted {
        "budget_exhausted"
    } else if near_exhausted {
        "near_exhausted"
    } else if tiny_budget {
        "tiny_budget"
    } else {
        "none"
    };

    let mut timeout_ms = if floor_applied { floor_ms } else { raw_ms };
    if cap_ms > 0 && timeout_ms > cap_ms {
        timeout_ms = cap_ms;
    }

    if budget_exhausted && !floor_applied {
        // Race-safe re-check before giving up.
        if call.is_finished() {
            return collect_now(call, fallback, stats, "hard").await;
        }
        tracing::warn!(provider = %provider, "hard timeout (budget exhausted) - no cancel");
        stats.record_await(
            provider,
            "hard",
            AwaitOutcome {
                cause: AwaitCause::BudgetExhausted,
                waited: Duration::ZERO,
            },
            0,
        );
        return fallback;
    }

    let started = Instant::now();
    match call.try_join(Duration::from_millis(timeout_ms)).await {
        Ok(result) => {
            stats.record_await(
                provider,
                "hard",
                AwaitOutcome {
                    cause: AwaitCause::Ok,
                    waited: started.elapsed(),
                },
                timeout_ms,
            );
            result
        }
        Err(JoinFailure::Timeout) => {
            let waited = started.elapsed();
            if floor_applied && cfg.cancel_suppressed_when_floor {
                // One-shot late harvest: collect if it completed right
                // after the floored wait expired.
                if call.is_finished() {
                    return collect_now(call, fallback, stats, "hard").await;
                }
                tracing::warn!(
                    provider = %provider,
                    cause = floor_cause,
                    raw_ms,
                    floor_ms = timeout_ms,
                    "hard timeout - cancel suppressed"
                );
            } else {
                // The task keeps running either way; its eventual
                // completion still populates the provider cache.
                tracing::warn!(provider = %provider, timeout_ms, "hard timeout");
            }
            stats.record_await(
                provider,
                "hard",
                AwaitOutcome {
                    cause: AwaitCause::TimeoutHard,
                    waited,
                },
                timeout_ms,
            );
            fallback
        }
        Err(JoinFailure::Cancelled) => {
            stats.record_await(
                provider,
                "hard",
                AwaitOutcome {
                    cause: AwaitCause::Interrupted,
                    waited: started.elapsed(),
                },
                timeout_ms,
            );
            fallback
        }
        Err(JoinFailure::Panicked) => {
            tracing::warn!(provider = %provider, "provider task panicked");
            stats.record_await(
                provider,
                "hard",
                AwaitOutcome {
                    cause: AwaitCause::ExecutionError,
                    waited: started.elapsed(),
                },
                timeout_ms,
            );
            fallback
        }
    }
}

/// Opportunistic wait: wait at most `soft_timeout_ms`, then return
/// `fallback` quietly.
///
/// Used when another provider already produced enough results. Never
/// escalates to a hard timeout and never cancels. Returns the outcome
/// cause alongside the result so the soft-timeout tuner can react.
pub(crate) async fn await_soft(
    call: &mut ScheduledCall,
    soft_timeout_ms: u64,
    fallback: ProviderCallResult,
    stats: &RequestStats,
) -> (ProviderCallResult, AwaitOutcome) {
    let provider = call.provider();

    if call.is_finished() {
        let started = Instant::now();
        let result = collect_now(call, fallback, stats, "soft").await;
        return (
            result,
            AwaitOutcome {
                cause: AwaitCause::Ok,
                waited: started.elapsed(),
            },
        );
    }

    let started = Instant::now();
    match call.try_join(Duration::from_millis(soft_timeout_ms)).await {
        Ok(result) => {
            let outcome = AwaitOutcome {
                cause: AwaitCause::Ok,
                waited: started.elapsed(),
            };
            stats.record_await(provider, "soft", outcome, soft_timeout_ms);
            (result, outcome)
        }
        Err(JoinFailure::Timeout) => {
            tracing::debug!(provider = %provider, soft_timeout_ms, "soft timeout");
            let outcome = AwaitOutcome {
                cause: AwaitCause::TimeoutSoft,
                waited: started.elapsed(),
            };
            stats.record_await(provider, "soft", outcome, soft_timeout_ms);
            (fallback, outcome)
        }
        Err(failure) => {
            let cause = match failure {
                JoinFailure::Cancelled => AwaitCause::Interrupted,
                _ => AwaitCause::ExecutionError,
            };
            let outcome = AwaitOutcome {
                cause,
                waited: started.elapsed(),
            };
            stats.record_await(provider, "soft", outcome, soft_timeout_ms);
            (fallback, outcome)
        }
    }
}
