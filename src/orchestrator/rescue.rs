//! Cache-only rescue ladder for transient empty merges.
//!
//! When the live merge comes back empty *and* recent telemetry shows a
//! transient cause (timeout, non-OK outcome, skip, rate limit), a few
//! backoff-spaced polls re-read the provider caches — no new network
//! calls — to pick up late fills from calls that outlived their await.
//! An empty merge with no such signal is a genuine empty result and is
//! not rescued.

use std::sync::Arc;
use std::time::Duration;

use crate::config::SearchConfig;
use crate::context::RequestContext;
use crate::orchestrator::merge::merge_and_limit;
use crate::provider::SearchProvider;
use crate::telemetry::{RequestStats, TelemetryLevel};

/// Why the ladder produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescueMiss {
    /// Both provider caches were empty on every poll.
    CacheEmpty,
    /// The total wait budget was configured to zero.
    WaitBudgetZero,
    /// Caches had entries but the merge still came out empty.
    MergedEmpty,
}

impl RescueMiss {
    /// Stable lowercase token for telemetry attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheEmpty => "cache_empty",
            Self::WaitBudgetZero => "wait_budget_zero",
            Self::MergedEmpty => "cache_hit_but_merged_empty",
        }
    }
}

/// Outcome of one ladder run.
#[derive(Debug, Clone)]
pub struct RescueOutcome {
    /// Rescued snippets; empty on a miss.
    pub snippets: Vec<String>,
    /// Polls actually performed.
    pub polls: u32,
    /// Total time slept between polls.
    pub waited: Duration,
    /// Miss classification when `snippets` is empty.
    pub miss: Option<RescueMiss>,
}

impl RescueOutcome {
    fn none() -> Self {
        Self {
            snippets: Vec::new(),
            polls: 0,
            waited: Duration::ZERO,
            miss: None,
        }
    }
}

/// Run the cache-only rescue ladder once.
///
/// Idempotent and side-effect-free beyond reading caches; guarded to at
/// most one run per request via [`RequestStats::try_mark_rescue_used`].
#[allow(clippy::too_many_arguments)]
pub async fn run(
    primary: &Arc<dyn SearchProvider>,
    primary_query: &str,
    secondary: &Arc<dyn SearchProvider>,
    secondary_query: &str,
    top_k: usize,
    cfg: &SearchConfig,
    ctx: &RequestContext,
    stats: &RequestStats,
) -> RescueOutcome {
    if !cfg.rescue_enabled || primary_query.trim().is_empty() {
        return RescueOutcome::none();
    }
    if !stats.try_mark_rescue_used() {
        return RescueOutcome::none();
    }
    if !stats.saw_transient_failure() {
        // No timeout/skip/rate-limit signal: genuinely empty, not rescued.
        return RescueOutcome::none();
    }

    let polls = cfg.rescue_max_polls.clamp(1, 6);
    let max_total_wait = Duration::from_millis(cfg.rescue_max_total_wait_ms);
    let mut delay = Duration::from_millis(cfg.rescue_initial_delay_ms);

    stats.emit(
        "web.rescue.start",
        TelemetryLevel::Info,
        &[
            ("max_polls", polls.to_string()),
            ("max_total_wait_ms", cfg.rescue_max_total_wait_ms.to_string()),
            ("initial_delay_ms", cfg.rescue_initial_delay_ms.to_string()),
            ("timeouts", stats.timeouts().to_string()),
            ("non_ok", stats.non_ok().to_string()),
            ("skipped", stats.skipped().to_string()),
        ],
    );

    let mut waited = Duration::ZERO;
    let mut used_polls = 0u32;
    let mut merged: Vec<String> = Vec::new();
    let mut saw_cache_entries = false;

    for _ in 0..polls {
        if !delay.is_zero() && waited < max_total_wait {
            let sleep_for = delay.min(max_total_wait - waited);
            if !sleep_for.is_zero() {
                tokio::time::sleep(sleep_for).await;
                waited += sleep_for;
            }
        }
        used_polls += 1;

        // Cache-only re-merge: pick up late cache fills from calls that
        // outlived their await.
        let (primary_cached, secondary_cached) = futures::future::join(
            primary.search_cache_only(primary_query, top_k),
            secondary.search_cache_only(secondary_query, top_k),
        )
        .await;
        saw_cache_entries |= !primary_cached.is_empty() || !secondary_cached.is_empty();

        let result = merge_and_limit(
            &primary_cached,
            &secondary_cached,
            top_k,
            cfg.min_merged_results,
            ctx,
        );
        stats.emit(
            "web.rescue.poll",
            TelemetryLevel::Debug,
            &[
                ("poll", used_polls.to_string()),
                ("waited_ms", waited.as_millis().to_string()),
                ("primary_cached", primary_cached.len().to_string()),
                ("secondary_cached", secondary_cached.len().to_string()),
                ("merged", result.snippets.len().to_string()),
            ],
        );
        merged = result.snippets;

        if !merged.is_empty() || waited >= max_total_wait {
            break;
        }

        // Exponential backoff between polls (bounded).
        let next_ms = if delay.is_zero() {
            50
        } else {
            (delay.as_millis() as u64).saturating_mul(2)
        };
        delay = Duration::from_millis(next_ms.min(250));
    }

    let miss = if merged.is_empty() {
        Some(if max_total_wait.is_zero() {
            RescueMiss::WaitBudgetZero
        } else if saw_cache_entries {
            RescueMiss::MergedEmpty
        } else {
            RescueMiss::CacheEmpty
        })
    } else {
        None
    };

    match miss {
        None => {
            tracing::warn!(
                out_count = merged.len(),
                waited_ms = waited.as_millis() as u64,
                polls = used_polls,
                "empty merge rescued from cache"
            );
            stats.emit(
                "web.rescue.hit",
                TelemetryLevel::Info,
                &[
                    ("out_count", merged.len().to_string()),
                    ("waited_ms", waited.as_millis().to_string()),
                    ("polls", used_polls.to_string()),
                ],
            );
        }
        Some(reason) => {
            tracing::info!(
                reason = reason.as_str(),
                waited_ms = waited.as_millis() as u64,
                polls = used_polls,
                "cache-only rescue missed"
            );
            stats.emit(
                "web.rescue.miss",
                TelemetryLevel::Info,
                &[
                    ("reason", reason.as_str().to_string()),
                    ("waited_ms", waited.as_millis().to_string()),
                    ("polls", used_polls.to_string()),
                ],
            );
        }
    }

    RescueOutcome {
        snippets: merged,
        polls: used_polls,
        waited,
        miss,
    }
}
