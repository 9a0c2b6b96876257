//! Orchestrator configuration with sensible defaults.
//!
//! [`SearchConfig`] controls the shared deadline, await floors, hedging,
//! cache-rescue behaviour, and merge limits. The defaults are tuned for a
//! 3-second interactive budget shared between two providers.

use crate::error::SearchError;
use crate::types::ProviderKind;

/// Configuration for the hybrid search orchestrator.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Which provider is primary by default (may be overridden per request
    /// or auto-switched when the primary is unhealthy).
    pub primary: ProviderKind,
    /// Overall per-request time budget in milliseconds. The shared
    /// deadline is derived once from this value.
    pub overall_timeout_ms: u64,
    /// Minimum live wait applied when the remaining budget is zero or
    /// tiny. Converts a would-be immediate failure into a short bounded
    /// wait, because many "budget exhausted" calls are about to finish.
    pub min_live_budget_ms: u64,
    /// Larger floor used in official mode, where evidence quality is
    /// prioritised over latency.
    pub min_live_budget_official_ms: u64,
    /// Safety margin keeping inner per-call timeouts shorter than the
    /// outer await so the two never race each other.
    pub deadline_margin_ms: u64,
    /// Remaining budgets at or below this are treated as near-exhausted.
    pub near_exhausted_threshold_ms: u64,
    /// Apply the floor when the remaining budget is positive but below the
    /// floor (rounding artifacts and deadline races).
    pub floor_tiny_budget: bool,
    /// In official mode, apply the floor even at zero remaining budget.
    pub floor_budget_exhausted_official: bool,
    /// When a floor was applied, a timeout leaves the call running so a
    /// later cache-only rescue can still observe its result.
    pub cancel_suppressed_when_floor: bool,
    /// Cap on how long the first provider in a pair may consume the shared
    /// budget in one blocking join, so it cannot starve the sibling.
    pub first_call_cap_ms: u64,
    /// Hedge delay: how long to peek at the first provider before deciding
    /// whether to start the second.
    pub hedge_delay_ms: u64,
    /// Minimum first-provider result count that allows skipping the
    /// second provider entirely.
    pub skip_secondary_min_results: usize,
    /// Even when the first provider is fast and sufficient, still call the
    /// second opportunistically with a reduced result count (diversity at
    /// low cost).
    pub force_opportunistic_secondary: bool,
    /// When the first provider already filled `top_k`, wait for the second
    /// only opportunistically.
    pub skip_secondary_if_sufficient: bool,
    /// Base soft wait for the opportunistic second join in milliseconds.
    pub secondary_opportunistic_ms: u64,
    /// In official mode the secondary join is deadline-driven but capped
    /// by this value. 0 means wait until the overall deadline.
    pub official_full_join_cap_ms: u64,
    /// Whether the cache-only rescue ladder runs on an empty merge.
    pub rescue_enabled: bool,
    /// Delay before the first rescue poll in milliseconds.
    pub rescue_initial_delay_ms: u64,
    /// Total wall-clock budget for the rescue ladder in milliseconds.
    pub rescue_max_total_wait_ms: u64,
    /// Maximum number of rescue polls (clamped to 1..=6 at run time).
    pub rescue_max_polls: u32,
    /// Merge keeps at least this many snippets when available, even if the
    /// caller requested fewer.
    pub min_merged_results: usize,
    /// Bounded-submit permits shared by all provider calls of this
    /// orchestrator instance. Saturation fails fast instead of queueing.
    pub max_concurrent_calls: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            primary: ProviderKind::Brave,
            overall_timeout_ms: 3_000,
            min_live_budget_ms: 600,
            min_live_budget_official_ms: 900,
            deadline_margin_ms: 120,
            near_exhausted_threshold_ms: 10,
            floor_tiny_budget: true,
            floor_budget_exhausted_official: true,
            cancel_suppressed_when_floor: true,
            first_call_cap_ms: 3_600,
            hedge_delay_ms: 450,
            skip_secondary_min_results: 6,
            force_opportunistic_secondary: true,
            skip_secondary_if_sufficient: true,
            secondary_opportunistic_ms: 250,
            official_full_join_cap_ms: 4_200,
            rescue_enabled: true,
            rescue_initial_delay_ms: 80,
            rescue_max_total_wait_ms: 350,
            rescue_max_polls: 3,
            min_merged_results: 3,
            max_concurrent_calls: 4,
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is
    /// invalid.
    ///
    /// Checks:
    /// - `overall_timeout_ms` must be greater than 0
    /// - `max_concurrent_calls` must be greater than 0
    /// - `min_merged_results` must be greater than 0
    /// - `min_live_budget_official_ms` must be >= `min_live_budget_ms`
    /// - `rescue_max_polls` must be greater than 0 when rescue is enabled
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.overall_timeout_ms == 0 {
            return Err(SearchError::Config(
                "overall_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.max_concurrent_calls == 0 {
            return Err(SearchError::Config(
                "max_concurrent_calls must be greater than 0".into(),
            ));
        }
        if self.min_merged_results == 0 {
            return Err(SearchError::Config(
                "min_merged_results must be greater than 0".into(),
            ));
        }
        if self.min_live_budget_official_ms < self.min_live_budget_ms {
            return Err(SearchError::Config(
                "min_live_budget_official_ms must be >= min_live_budget_ms".into(),
            ));
        }
        if self.rescue_enabled && self.rescue_max_polls == 0 {
            return Err(SearchError::Config(
                "rescue_max_polls must be greater than 0 when rescue is enabled".into(),
            ));
        }
        Ok(())
    }

    /// The await floor for the given mode.
    pub(crate) fn floor_ms(&self, official_only: bool) -> u64 {
        if official_only {
            self.min_live_budget_ms.max(self.min_live_budget_official_ms)
        } else {
            self.min_live_budget_ms
        }
    }

    /// Minimum budget slice reserved for the sibling call when the first
    /// provider joins. A small overhead buffer makes the reserve
    /// meaningful for the merge/log tail.
    pub(crate) fn sibling_reserve_ms(&self, official_only: bool) -> u64 {
        let reserve = self.floor_ms(official_only);
        if reserve > 0 {
            reserve + 100
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let config = SearchConfig::default();
        assert_eq!(config.primary, ProviderKind::Brave);
        assert_eq!(config.overall_timeout_ms, 3_000);
        assert_eq!(config.min_live_budget_ms, 600);
        assert_eq!(config.min_live_budget_official_ms, 900);
        assert_eq!(config.deadline_margin_ms, 120);
        assert_eq!(config.first_call_cap_ms, 3_600);
        assert_eq!(config.hedge_delay_ms, 450);
        assert_eq!(config.skip_secondary_min_results, 6);
        assert_eq!(config.rescue_max_polls, 3);
        assert_eq!(config.rescue_max_total_wait_ms, 350);
        assert_eq!(config.rescue_initial_delay_ms, 80);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = SearchConfig {
            overall_timeout_ms: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overall_timeout_ms"));
    }

    #[test]
    fn zero_permits_rejected() {
        let config = SearchConfig {
            max_concurrent_calls: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrent_calls"));
    }

    #[test]
    fn inverted_floors_rejected() {
        let config = SearchConfig {
            min_live_budget_ms: 900,
            min_live_budget_official_ms: 600,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_live_budget_official_ms"));
    }

    #[test]
    fn zero_rescue_polls_rejected_only_when_enabled() {
        let config = SearchConfig {
            rescue_max_polls: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SearchConfig {
            rescue_enabled: false,
            rescue_max_polls: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn floor_uses_official_value_in_official_mode() {
        let config = SearchConfig::default();
        assert_eq!(config.floor_ms(false), 600);
        assert_eq!(config.floor_ms(true), 900);
    }

    #[test]
    fn sibling_reserve_adds_overhead_buffer() {
        let config = SearchConfig::default();
        assert_eq!(config.sibling_reserve_ms(false), 700);
        assert_eq!(config.sibling_reserve_ms(true), 1_000);

        let config = SearchConfig {
            min_live_budget_ms: 0,
            min_live_budget_official_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.sibling_reserve_ms(false), 0);
    }
}
