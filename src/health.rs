//! Provider health: the injected breaker interface and a default
//! implementation.
//!
//! The orchestrator consumes health state only through [`ProviderHealth`];
//! the state machine itself is replaceable. The bundled
//! [`CircuitBreaker`] tracks consecutive failures per provider and
//! temporarily refuses calls after repeated failures.
//!
//! # State machine
//!
//! ```text
//! ┌────────┐  N failures   ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├──────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘               └────────┘             └────┬─────┘
//!     │                         ▲                      │
//!     │  success                │  failure             │
//!     └─────────────────────────┴──────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::types::ProviderKind;

/// Kind of generic failure reported through [`ProviderHealth::record_failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transport-level failure (connect, TLS, body read).
    Transport,
    /// Response body could not be parsed.
    Parse,
    /// A local join/await timebox expired before the provider answered.
    AwaitTimeout,
    /// Anything else.
    Unknown,
}

/// Circuit-breaker interface consumed by the orchestrator.
///
/// Implementations own all mutable health state; recorder methods take
/// `&self` and synchronise internally. All methods are best-effort — they
/// must not panic into caller code.
pub trait ProviderHealth: Send + Sync {
    /// True when calls to this provider are currently refused.
    fn is_open(&self, key: ProviderKind) -> bool;

    /// True when the provider is refused or only a probe is allowed.
    /// Used for primary-preference decisions, not for skipping probes.
    fn is_open_or_half_open(&self, key: ProviderKind) -> bool;

    /// Remaining refusal window in milliseconds, zero when not open.
    fn remaining_open_ms(&self, key: ProviderKind) -> u64;

    /// Record a successful call with its duration.
    fn record_success(&self, key: ProviderKind, elapsed: Duration);

    /// Record a rate-limit response, with the provider's backoff hint.
    fn record_rate_limit(
        &self,
        key: ProviderKind,
        query: &str,
        message: &str,
        retry_after: Option<Duration>,
    );

    /// Record a provider call timeout.
    fn record_timeout(&self, key: ProviderKind, query: &str, reason: &str);

    /// Record a rejection (e.g. HTTP 403 bot detection).
    fn record_rejected(&self, key: ProviderKind, query: &str, reason: &str);

    /// Record a generic failure.
    fn record_failure(&self, key: ProviderKind, kind: FailureKind, message: &str, query: &str);
}

/// Circuit state for a single provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Healthy — all requests allowed.
    Closed,
    /// Failed too often — requests refused until the window elapses.
    Open,
    /// Window elapsed — one probe request decides recovery or re-trip.
    HalfOpen,
}

/// Health tracking data for a single provider.
#[derive(Debug, Clone)]
struct ProviderState {
    state: CircuitState,
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            open_until: None,
        }
    }
}

/// Configuration for the default breaker.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before tripping the circuit to Open.
    pub failure_threshold: u32,
    /// Refusal window after tripping.
    pub cooldown: Duration,
    /// Cap applied to a single `Retry-After` hint.
    pub retry_after_cap: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
            retry_after_cap: Duration::from_secs(60),
        }
    }
}

/// Default per-provider circuit breaker.
///
/// Rate-limit responses open the circuit immediately for the hinted
/// window (capped); other failures trip it after
/// [`BreakerConfig::failure_threshold`] consecutive occurrences.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    providers: Mutex<HashMap<ProviderKind, ProviderState>>,
}

impl CircuitBreaker {
    /// Create a breaker with the given configuration.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            providers: Mutex::new(HashMap::new()),
        }
    }

    /// Current state for a provider, transitioning Open → HalfOpen when
    /// the refusal window has elapsed.
    pub fn state(&self, key: ProviderKind) -> CircuitState {
        let mut providers = match self.providers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = providers.entry(key).or_default();
        if entry.state == CircuitState::Open {
            let elapsed = entry.open_until.is_none_or(|until| Instant::now() >= until);
            if elapsed {
                entry.state = CircuitState::HalfOpen;
            }
        }
        entry.state
    }

    fn record_failure_inner(&self, key: ProviderKind, window: Option<Duration>) {
        let mut providers = match self.providers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = providers.entry(key).or_default();
        entry.consecutive_failures += 1;

        // A HalfOpen probe failure re-trips immediately.
        let tripped = entry.consecutive_failures >= self.config.failure_threshold
            || entry.state == CircuitState::HalfOpen;

        if let Some(window) = window {
            let capped = window.min(self.config.retry_after_cap);
            let until = Instant::now() + capped;
            entry.state = CircuitState::Open;
            entry.open_until = Some(match entry.open_until {
                Some(existing) if existing > until => existing,
                _ => until,
            });
        } else if tripped {
            entry.state = CircuitState::Open;
            entry.open_until = Some(Instant::now() + self.config.cooldown);
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

impl ProviderHealth for CircuitBreaker {
    fn is_open(&self, key: ProviderKind) -> bool {
        self.state(key) == CircuitState::Open
    }

    fn is_open_or_half_open(&self, key: ProviderKind) -> bool {
        matches!(self.state(key), CircuitState::Open | CircuitState::HalfOpen)
    }

    fn remaining_open_ms(&self, key: ProviderKind) -> u64 {
        if self.state(key) != CircuitState::Open {
            return 0;
        }
        let providers = match self.providers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        providers
            .get(&key)
            .and_then(|entry| entry.open_until)
            .map_or(0, |until| {
                until
                    .saturating_duration_since(Instant::now())
                    .as_millis() as u64
            })
    }

    fn record_success(&self, key: ProviderKind, elapsed: Duration) {
        let mut providers = match self.providers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = providers.entry(key).or_default();
        entry.state = CircuitState::Closed;
        entry.consecutive_failures = 0;
        entry.open_until = None;
        tracing::debug!(provider = %key, elapsed_ms = elapsed.as_millis() as u64, "breaker success");
    }

    fn record_rate_limit(
        &self,
        key: ProviderKind,
        _query: &str,
        message: &str,
        retry_after: Option<Duration>,
    ) {
        // No hint: open for the standard cooldown window.
        let window = retry_after.unwrap_or(self.config.cooldown);
        self.record_failure_inner(key, Some(window));
        tracing::warn!(
            provider = %key,
            retry_after_ms = retry_after.map(|d| d.as_millis() as u64),
            message,
            "breaker rate limit"
        );
    }

    fn record_timeout(&self, key: ProviderKind, _query: &str, reason: &str) {
        self.record_failure_inner(key, None);
        tracing::warn!(provider = %key, reason, "breaker timeout");
    }

    fn record_rejected(&self, key: ProviderKind, _query: &str, reason: &str) {
        self.record_failure_inner(key, None);
        tracing::warn!(provider = %key, reason, "breaker rejected");
    }

    fn record_failure(&self, key: ProviderKind, kind: FailureKind, message: &str, _query: &str) {
        self.record_failure_inner(key, None);
        tracing::warn!(provider = %key, ?kind, message, "breaker failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: threshold,
            cooldown,
            retry_after_cap: Duration::from_secs(60),
        })
    }

    fn fail(breaker: &CircuitBreaker, key: ProviderKind) {
        breaker.record_failure(key, FailureKind::Unknown, "boom", "query");
    }

    #[test]
    fn initial_state_is_closed() {
        let breaker = make_breaker(3, Duration::from_secs(60));
        assert_eq!(breaker.state(ProviderKind::Brave), CircuitState::Closed);
        assert!(!breaker.is_open(ProviderKind::Brave));
        assert!(!breaker.is_open_or_half_open(ProviderKind::Naver));
    }

    #[test]
    fn stays_closed_below_threshold() {
        let breaker = make_breaker(3, Duration::from_secs(60));
        fail(&breaker, ProviderKind::Brave);
        fail(&breaker, ProviderKind::Brave);
        assert_eq!(breaker.state(ProviderKind::Brave), CircuitState::Closed);
    }

    #[test]
    fn trips_to_open_at_threshold() {
        let breaker = make_breaker(3, Duration::from_secs(60));
        for _ in 0..3 {
            fail(&breaker, ProviderKind::Naver);
        }
        assert!(breaker.is_open(ProviderKind::Naver));
        assert!(breaker.remaining_open_ms(ProviderKind::Naver) > 0);
    }

    #[test]
    fn open_transitions_to_half_open_after_cooldown() {
        let breaker = make_breaker(3, Duration::ZERO);
        for _ in 0..3 {
            fail(&breaker, ProviderKind::Brave);
        }
        // Zero cooldown: the first state read transitions to HalfOpen.
        assert_eq!(breaker.state(ProviderKind::Brave), CircuitState::HalfOpen);
        assert!(!breaker.is_open(ProviderKind::Brave));
        assert!(breaker.is_open_or_half_open(ProviderKind::Brave));
    }

    #[test]
    fn half_open_success_restores_closed() {
        let breaker = make_breaker(3, Duration::ZERO);
        for _ in 0..3 {
            fail(&breaker, ProviderKind::Brave);
        }
        let _ = breaker.state(ProviderKind::Brave); // → HalfOpen
        breaker.record_success(ProviderKind::Brave, Duration::from_millis(40));
        assert_eq!(breaker.state(ProviderKind::Brave), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_retrips() {
        let breaker = make_breaker(3, Duration::ZERO);
        for _ in 0..3 {
            fail(&breaker, ProviderKind::Naver);
        }
        let _ = breaker.state(ProviderKind::Naver); // → HalfOpen
        breaker.record_timeout(ProviderKind::Naver, "query", "probe timeout");
        // Re-tripped, but with zero cooldown it reads back as HalfOpen.
        assert!(breaker.is_open_or_half_open(ProviderKind::Naver));
    }

    #[test]
    fn rate_limit_opens_immediately_with_hint_window() {
        let breaker = make_breaker(5, Duration::from_secs(60));
        breaker.record_rate_limit(
            ProviderKind::Brave,
            "query",
            "HTTP 429",
            Some(Duration::from_secs(5)),
        );
        assert!(breaker.is_open(ProviderKind::Brave));
        let remaining = breaker.remaining_open_ms(ProviderKind::Brave);
        assert!(remaining > 0 && remaining <= 5_000);
    }

    #[test]
    fn rate_after_hint_is_capped() {
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
            retry_after_cap: Duration::from_secs(10),
        });
        breaker.record_rate_limit(
            ProviderKind::Brave,
            "query",
            "HTTP 429",
            Some(Duration::from_secs(3_600)),
        );
        assert!(breaker.remaining_open_ms(ProviderKind::Brave) <= 10_000);
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let breaker = make_breaker(5, Duration::from_secs(60));
        fail(&breaker, ProviderKind::Brave);
        fail(&breaker, ProviderKind::Brave);
        breaker.record_success(ProviderKind::Brave, Duration::from_millis(10));
        // Four more failures must not trip (counter was reset).
        for _ in 0..4 {
            fail(&breaker, ProviderKind::Brave);
        }
        assert_eq!(breaker.state(ProviderKind::Brave), CircuitState::Closed);
    }

    #[test]
    fn providers_are_independent() {
        let breaker = make_breaker(2, Duration::from_secs(60));
        fail(&breaker, ProviderKind::Naver);
        fail(&breaker, ProviderKind::Naver);
        assert!(breaker.is_open(ProviderKind::Naver));
        assert!(!breaker.is_open(ProviderKind::Brave));
    }

    #[test]
    fn remaining_open_ms_zero_when_closed() {
        let breaker = make_breaker(3, Duration::from_secs(60));
        assert_eq!(breaker.remaining_open_ms(ProviderKind::Brave), 0);
    }

    #[test]
    fn rapid_success_failure_alternation_never_trips() {
        let breaker = make_breaker(3, Duration::from_secs(60));
        for _ in 0..10 {
            fail(&breaker, ProviderKind::Brave);
            breaker.record_success(ProviderKind::Brave, Duration::from_millis(5));
        }
        assert_eq!(breaker.state(ProviderKind::Brave), CircuitState::Closed);
    }
}
