//! Per-request context passed explicitly through every call.
//!
//! The context is an immutable value handed to the orchestrator per
//! request and threaded into submitted tasks as a plain parameter — no
//! thread-local propagation across executor boundaries.

use crate::types::ProviderKind;

/// Immutable per-request flags affecting hedging, floors, and filtering.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext {
    /// Official-sources mode: larger await floors, hedge-skip bypassed,
    /// low-trust snippets filtered.
    pub official_only: bool,
    /// Strict filtering mode: low-trust snippets filtered (without the
    /// official-mode timing changes).
    pub strike_mode: bool,
    /// Explicit primary-provider override for this request.
    pub primary_override: Option<ProviderKind>,
}

impl RequestContext {
    /// Context for an ordinary request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for an official-sources request.
    pub fn official() -> Self {
        Self {
            official_only: true,
            ..Self::default()
        }
    }

    /// Returns a copy with the primary provider pinned.
    pub fn with_primary(mut self, primary: ProviderKind) -> Self {
        self.primary_override = Some(primary);
        self
    }

    /// True when low-trust filtering applies to merge output.
    pub fn trust_filtering(&self) -> bool {
        self.official_only || self.strike_mode
    }
}
