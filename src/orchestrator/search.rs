//! The search orchestrator: one parameterized hedged pair policy.
//!
//! Control flow per request: pick the primary provider (override, mode
//! preference, health auto-switch) → schedule it → peek at its result for
//! the hedge delay → start the secondary only if needed → bounded await
//! per provider under the shared deadline → merge → if empty, cache-only
//! rescue → if still empty, one backup-query retry.
//!
//! Every failure mode degrades to an empty snippet list; nothing here
//! returns an error past the public entry point.

use std::sync::Arc;
use std::time::Duration;

use crate::budget::{await_soft, await_with_deadline, resolve_block_timeout_ms, DeadlineBudget};
use crate::config::SearchConfig;
use crate::context::RequestContext;
use crate::error::Result;
use crate::health::ProviderHealth;
use crate::invoker::{ProviderInvoker, ScheduledCall};
use crate::orchestrator::backup::BackupQueryBuilder;
use crate::orchestrator::merge::merge_and_limit;
use crate::orchestrator::rescue;
use crate::provider::SearchProvider;
use crate::query;
use crate::telemetry::{RequestStats, TelemetryLevel, TelemetryRecorder};
use crate::tuner::SoftTimeoutTuner;
use crate::types::{AwaitCause, CallStatus, ProviderCallResult, ProviderKind, SkipReason};

/// Extra join window when both providers came back empty but the
/// secondary call is still in flight.
const LATE_JOIN_GRACE_MS: u64 = 200;

/// Resilient two-provider search orchestrator.
///
/// All collaborators are injected at construction: the provider pair, the
/// health breaker, and the telemetry sink. The orchestrator owns only the
/// bounded invoker and the per-provider soft-timeout tuner.
pub struct SearchOrchestrator {
    brave: Arc<dyn SearchProvider>,
    naver: Arc<dyn SearchProvider>,
    health: Arc<dyn ProviderHealth>,
    telemetry: Arc<dyn TelemetryRecorder>,
    invoker: ProviderInvoker,
    tuner: SoftTimeoutTuner,
    backup: BackupQueryBuilder,
    config: SearchConfig,
}

impl SearchOrchestrator {
    /// Build an orchestrator over the given provider pair.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SearchError::Config`] when the configuration is
    /// invalid.
    pub fn new(
        brave: Arc<dyn SearchProvider>,
        naver: Arc<dyn SearchProvider>,
        health: Arc<dyn ProviderHealth>,
        telemetry: Arc<dyn TelemetryRecorder>,
        config: SearchConfig,
    ) -> Result<Self> {
        config.validate()?;
        let invoker = ProviderInvoker::new(config.max_concurrent_calls, Arc::clone(&health));
        Ok(Self {
            brave,
            naver,
            health,
            telemetry,
            invoker,
            tuner: SoftTimeoutTuner::new(),
            backup: BackupQueryBuilder::new(),
            config,
        })
    }

    /// Replace the backup-query builder (custom transforms).
    pub fn with_backup_builder(mut self, backup: BackupQueryBuilder) -> Self {
        self.backup = backup;
        self
    }

    fn provider(&self, kind: ProviderKind) -> &Arc<dyn SearchProvider> {
        match kind {
            ProviderKind::Brave => &self.brave,
            ProviderKind::Naver => &self.naver,
        }
    }

    /// Best-effort usability for primary selection: enabled, breaker not
    /// open or half-open, not cooling down.
    fn usable(&self, kind: ProviderKind) -> bool {
        let provider = self.provider(kind);
        provider.is_enabled()
            && !self.health.is_open_or_half_open(kind)
            && !provider.is_cooling_down()
    }

    /// Pick the primary provider: explicit override → official-mode
    /// preference → configured default, then auto-switch away from an
    /// unusable primary when the sibling is usable.
    fn pick_primary(&self, ctx: &RequestContext) -> ProviderKind {
        let want = ctx.primary_override.unwrap_or(if ctx.official_only {
            // Official mode prefers the Korean-source provider.
            ProviderKind::Naver
        } else {
            self.config.primary
        });
        let sibling = want.sibling();
        if !self.usable(want) && self.usable(sibling) {
            tracing::debug!(from = %want, to = %sibling, "primary auto-switch");
            return sibling;
        }
        want
    }

    /// Provider-specific query shaping: the Latin-script provider gets
    /// the English variant of a Hangul query.
    fn query_for(&self, kind: ProviderKind, raw: &str) -> String {
        match kind {
            ProviderKind::Brave if query::contains_hangul(raw) => query::to_english_query(raw),
            _ => raw.to_string(),
        }
    }

    /// Search both providers and return up to `top_k` merged snippets.
    ///
    /// Never fails: provider errors, timeouts, and breaker refusals all
    /// degrade to (at worst) an empty list.
    pub async fn search(&self, query: &str, top_k: usize, ctx: &RequestContext) -> Vec<String> {
        let query = query.trim();
        if query.is_empty() {
            tracing::debug!("blank query skipped");
            return Vec::new();
        }
        let stats = Arc::new(RequestStats::new(Arc::clone(&self.telemetry)));
        let primary = self.pick_primary(ctx);
        let merged = self.run_pair(primary, query, top_k, ctx, &stats).await;
        self.finish(query, top_k, merged, ctx, &stats).await
    }

    /// One hedged pair pass: schedule `first`, peek, maybe start the
    /// sibling, bounded-await both, merge.
    async fn run_pair(
        &self,
        first_kind: ProviderKind,
        raw_query: &str,
        top_k: usize,
        ctx: &RequestContext,
        stats: &Arc<RequestStats>,
    ) -> Vec<String> {
        let second_kind = first_kind.sibling();
        let first_provider = Arc::clone(self.provider(first_kind));
        let second_provider = Arc::clone(self.provider(second_kind));
        let first_query = self.query_for(first_kind, raw_query);
        let second_query = self.query_for(second_kind, raw_query);

        let budget = DeadlineBudget::from_millis(self.config.overall_timeout_ms);
        // Ask the first provider for a little extra so hedging has
        // headroom to skip the sibling.
        let first_k = top_k.clamp(5, 20);

        let mut first_call = self
            .invoker
            .schedule(Arc::clone(&first_provider), &first_query, first_k, stats)
            .await;

        // Hedge peek: wait briefly for the first provider before deciding
        // whether the second is needed at all.
        let mut first_early: Option<ProviderCallResult> = None;
        let mut early_enough = false;
        let second_worth_hedging = second_provider.is_enabled() && !self.health.is_open(second_kind);
        if first_call.is_live() && second_worth_hedging && self.config.hedge_delay_ms > 0 {
            let wait_ms = self.config.hedge_delay_ms.min(budget.remaining_ms());
            if wait_ms > 0 {
                if let Ok(result) = first_call.try_join(Duration::from_millis(wait_ms)).await {
                    early_enough = result.status == CallStatus::Ok
                        && result.snippets.len() >= self.config.skip_secondary_min_results.max(1);
                    first_early = Some(result);
                }
                // Timeout: the first provider is slow — hedge by starting
                // the second below. Early errors also fall through so the
                // sibling can cover.
            }
        }

        // Official mode bypasses the hedge skip: evidence diversity
        // outweighs the latency saving.
        let hedge_skip =
            early_enough && !self.config.force_opportunistic_secondary && !ctx.official_only;
        let opportunistic = early_enough && !hedge_skip && !ctx.official_only;

        let mut second_call = if hedge_skip {
            stats.record_skip(second_kind, SkipReason::HedgeSkip, 0);
            tracing::debug!(
                provider = %second_kind,
                hedge_delay_ms = self.config.hedge_delay_ms,
                "hedged: sibling satisfied the request, skipping start"
            );
            let cached = second_provider.search_cache_only(&second_query, top_k).await;
            ScheduledCall::ready(
                second_kind,
                ProviderCallResult::cache_only(cached, SkipReason::HedgeSkip),
                Some(SkipReason::HedgeSkip),
            )
        } else {
            // Reduced result count when the call is purely for diversity.
            let call_k = if opportunistic {
                top_k.clamp(1, 3)
            } else {
                top_k
            };
            self.invoker
                .schedule(Arc::clone(&second_provider), &second_query, call_k, stats)
                .await
        };

        if !first_call.is_live() && !second_call.is_live() {
            stats.emit(
                "web.hard_down",
                TelemetryLevel::Warn,
                &[("reason", "both_skipped".to_string())],
            );
        }

        // Collect the first provider. Its join is capped so it cannot
        // starve a still-pending sibling.
        let first_result = match first_early {
            Some(result) => result,
            None => {
                let reserve = if second_call.is_live() && !second_call.is_finished() {
                    self.config.sibling_reserve_ms(ctx.official_only)
                } else {
                    0
                };
                let cap = resolve_block_timeout_ms(
                    &budget,
                    self.config.first_call_cap_ms,
                    reserve,
                    self.config.deadline_margin_ms,
                );
                await_with_deadline(
                    &mut first_call,
                    &budget,
                    cap,
                    ProviderCallResult::empty(),
                    &self.config,
                    ctx,
                    stats,
                )
                .await
            }
        };
        let first_snippets = first_result.snippets;

        let first_enough = self.config.skip_secondary_if_sufficient
            && top_k > 0
            && first_snippets.len() >= top_k;

        // Collect the second provider.
        let second_result = if ctx.official_only {
            // Official: deadline-driven join, optionally time-capped.
            await_with_deadline(
                &mut second_call,
                &budget,
                self.config.official_full_join_cap_ms,
                ProviderCallResult::empty(),
                &self.config,
                ctx,
                stats,
            )
            .await
        } else if first_enough {
            let soft_ms = self
                .tuner
                .adjust_soft_timeout_ms(second_kind, self.config.secondary_opportunistic_ms);
            let (result, outcome) =
                await_soft(&mut second_call, soft_ms, ProviderCallResult::empty(), stats).await;
            match outcome.cause {
                AwaitCause::TimeoutSoft => self
                    .tuner
                    .on_soft_timeout(second_kind, outcome.waited.as_millis() as u64),
                AwaitCause::Ok => self
                    .tuner
                    .on_soft_success(second_kind, outcome.waited.as_millis() as u64),
                _ => {}
            }
            result
        } else {
            await_with_deadline(
                &mut second_call,
                &budget,
                0,
                ProviderCallResult::empty(),
                &self.config,
                ctx,
                stats,
            )
            .await
        };
        let mut second_snippets = second_result.snippets;

        // Late-join grace: when both came back empty but the secondary
        // call is still running, give it one short extra window.
        if first_snippets.is_empty()
            && second_snippets.is_empty()
            && second_call.is_live()
            && !second_call.is_finished()
        {
            if let Ok(result) = second_call
                .try_join(Duration::from_millis(LATE_JOIN_GRACE_MS))
                .await
            {
                second_snippets = result.snippets;
            }
        }

        // Deficit join: the secondary timed out while the first is only
        // partially filled — try a small extra window, then its cache.
        if second_snippets.is_empty()
            && !first_snippets.is_empty()
            && top_k > 0
            && first_snippets.len() < top_k
            && second_call.is_live()
        {
            if !second_call.is_finished() {
                let join_ms = self.config.secondary_opportunistic_ms.clamp(50, 200);
                let (late, _) = await_soft(
                    &mut second_call,
                    join_ms,
                    ProviderCallResult::empty(),
                    stats,
                )
                .await;
                if !late.snippets.is_empty() {
                    second_snippets = late.snippets;
                }
            }
            if second_snippets.is_empty() {
                let cached = second_provider.search_cache_only(&second_query, top_k).await;
                if !cached.is_empty() {
                    stats.emit(
                        "web.timeout_rescue",
                        TelemetryLevel::Info,
                        &[("provider", second_kind.name().to_string())],
                    );
                    second_snippets = cached;
                }
            }
        }

        let merged = merge_and_limit(
            &first_snippets,
            &second_snippets,
            top_k,
            self.config.min_merged_results,
            ctx,
        );
        stats.emit(
            "web.merge",
            TelemetryLevel::Info,
            &[
                ("first", first_kind.name().to_string()),
                ("first_count", first_snippets.len().to_string()),
                ("second_count", second_snippets.len().to_string()),
                ("merged", merged.snippets.len().to_string()),
                ("from_primary", merged.from_primary.to_string()),
                ("from_secondary", merged.from_secondary.to_string()),
                ("called_first", first_call.is_live().to_string()),
                ("called_second", second_call.is_live().to_string()),
                ("hedge_skip", hedge_skip.to_string()),
                ("first_enough", first_enough.to_string()),
            ],
        );
        tracing::info!(
            first = %first_kind,
            first_count = first_snippets.len(),
            second_count = second_snippets.len(),
            merged = merged.snippets.len(),
            "hybrid search merged"
        );
        merged.snippets
    }

    /// Empty-result recovery: cache-only rescue, then one backup-query
    /// retry.
    async fn finish(
        &self,
        raw_query: &str,
        top_k: usize,
        merged: Vec<String>,
        ctx: &RequestContext,
        stats: &Arc<RequestStats>,
    ) -> Vec<String> {
        if !merged.is_empty() {
            return merged;
        }

        // Cache-only rescue before any new network calls.
        let primary = self.pick_primary(ctx);
        let secondary = primary.sibling();
        let rescued = rescue::run(
            self.provider(primary),
            &self.query_for(primary, raw_query),
            self.provider(secondary),
            &self.query_for(secondary, raw_query),
            top_k,
            &self.config,
            ctx,
            stats,
        )
        .await;
        if !rescued.snippets.is_empty() {
            return rescued.snippets;
        }

        if !stats.try_mark_backup_used() {
            return Vec::new();
        }
        let prefer_latin = self.usable(ProviderKind::Brave) && !self.usable(ProviderKind::Naver);
        let Some(backup_query) = self.backup.build(raw_query, prefer_latin) else {
            return Vec::new();
        };
        tracing::warn!(
            prefer_latin,
            backup_len = backup_query.len(),
            "merged=0, retrying once with backup query"
        );
        stats.emit(
            "web.backup",
            TelemetryLevel::Warn,
            &[("prefer_latin", prefer_latin.to_string())],
        );

        let primary = self.pick_primary(ctx);
        self.run_pair(primary, &backup_query, top_k, ctx, stats).await
    }
}
