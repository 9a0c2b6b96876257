//! Adaptive soft-timeout tuning.
//!
//! A provider that has recently been slow gets a longer soft wait so
//! fewer opportunistic joins are abandoned just short of completion.
//! State is scoped to one orchestrator instance (not process-wide) and
//! kept in simple atomics — a lost update only degrades tuning quality,
//! never correctness.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::types::ProviderKind;

/// Ceiling for an adjusted soft wait in milliseconds.
const SOFT_TIMEOUT_CEILING_MS: u64 = 1_500;

/// Per-streak increment in milliseconds.
const STREAK_STEP_MS: u64 = 150;

/// Streak count beyond which the increment stops growing.
const STREAK_CAP: u32 = 6;

/// Initial EWMA seed in milliseconds.
const EWMA_SEED_MS: u64 = 350;

#[derive(Debug)]
struct ProviderCell {
    streak: AtomicU32,
    ewma_ms: AtomicU64,
}

impl ProviderCell {
    fn new() -> Self {
        Self {
            streak: AtomicU32::new(0),
            ewma_ms: AtomicU64::new(EWMA_SEED_MS),
        }
    }
}

/// Per-provider exponentially-weighted wait-time average plus a
/// consecutive-soft-timeout streak counter.
#[derive(Debug)]
pub struct SoftTimeoutTuner {
    brave: ProviderCell,
    naver: ProviderCell,
}

impl SoftTimeoutTuner {
    /// New tuner with seeded averages and zero streaks.
    pub fn new() -> Self {
        Self {
            brave: ProviderCell::new(),
            naver: ProviderCell::new(),
        }
    }

    fn cell(&self, provider: ProviderKind) -> &ProviderCell {
        match provider {
            ProviderKind::Brave => &self.brave,
            ProviderKind::Naver => &self.naver,
        }
    }

    /// Adjust a base soft wait for the provider's recent behaviour.
    ///
    /// Repeated soft timeouts raise the wait toward
    /// `ewma + 150ms * streak`, bounded by a 1500ms ceiling; the base is
    /// never lowered.
    pub fn adjust_soft_timeout_ms(&self, provider: ProviderKind, base_ms: u64) -> u64 {
        let cell = self.cell(provider);
        let ewma = cell.ewma_ms.load(Ordering::Relaxed);
        let streak = cell.streak.load(Ordering::Relaxed).min(STREAK_CAP) as u64;
        base_ms.max((ewma + STREAK_STEP_MS * streak).min(SOFT_TIMEOUT_CEILING_MS))
    }

    /// Record a soft timeout: extend the streak and pull the EWMA up to
    /// at least the observed wait.
    pub fn on_soft_timeout(&self, provider: ProviderKind, waited_ms: u64) {
        let cell = self.cell(provider);
        cell.streak.fetch_add(1, Ordering::Relaxed);
        cell.ewma_ms.fetch_max(waited_ms, Ordering::Relaxed);
    }

    /// Record a soft-wait success: reset the streak and decay the EWMA
    /// toward the new observation.
    pub fn on_soft_success(&self, provider: ProviderKind, waited_ms: u64) {
        let cell = self.cell(provider);
        cell.streak.store(0, Ordering::Relaxed);
        let old = cell.ewma_ms.load(Ordering::Relaxed);
        let decayed = (old as f64 * 0.8 + waited_ms as f64 * 0.2) as u64;
        cell.ewma_ms.store(decayed, Ordering::Relaxed);
    }
}

impl Default for SoftTimeoutTuner {
    fn default() -> Self {
        Self::new()
    }
}
