//! Structured telemetry: the injected event sink and per-request counters.
//!
//! The orchestrator is observable through two layers: an injected
//! [`TelemetryRecorder`] receiving fire-and-forget events, and a
//! per-request [`RequestStats`] that classifies await outcomes into the
//! counters the cache-rescue trigger reads.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::{AwaitCause, AwaitOutcome, ProviderKind, SkipReason};

/// Severity attached to an emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryLevel {
    Debug,
    Info,
    Warn,
}

/// Fire-and-forget structured event sink.
///
/// Implementations must never propagate errors or panics into caller
/// code; the orchestrator additionally contains panics at the call seam.
pub trait TelemetryRecorder: Send + Sync {
    /// Record one event with its attributes.
    fn emit(&self, event: &str, level: TelemetryLevel, attributes: &[(&'static str, String)]);
}

/// Default recorder forwarding events to [`tracing`].
#[derive(Debug, Default)]
pub struct TracingRecorder;

impl TelemetryRecorder for TracingRecorder {
    fn emit(&self, event: &str, level: TelemetryLevel, attributes: &[(&'static str, String)]) {
        let attrs = attributes
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        match level {
            TelemetryLevel::Debug => tracing::debug!(event, %attrs, "telemetry"),
            TelemetryLevel::Info => tracing::info!(event, %attrs, "telemetry"),
            TelemetryLevel::Warn => tracing::warn!(event, %attrs, "telemetry"),
        }
    }
}

/// Per-request outcome counters plus the once-per-request guards.
///
/// Created fresh for every request and discarded with the response. The
/// counters feed the cache-rescue trigger: an empty merge is only rescued
/// when something transient (timeout, non-OK outcome, skip, rate limit)
/// was observed.
pub struct RequestStats {
    sink: Arc<dyn TelemetryRecorder>,
    timeout_count: AtomicU64,
    non_ok_count: AtomicU64,
    skipped_count: AtomicU64,
    rate_limited: AtomicBool,
    rescue_used: AtomicBool,
    backup_used: AtomicBool,
}

impl RequestStats {
    /// New empty stats bound to the given sink.
    pub fn new(sink: Arc<dyn TelemetryRecorder>) -> Self {
        Self {
            sink,
            timeout_count: AtomicU64::new(0),
            non_ok_count: AtomicU64::new(0),
            skipped_count: AtomicU64::new(0),
            rate_limited: AtomicBool::new(false),
            rescue_used: AtomicBool::new(false),
            backup_used: AtomicBool::new(false),
        }
    }

    /// Emit an event through the sink, containing any panic it raises.
    pub fn emit(&self, event: &str, level: TelemetryLevel, attributes: &[(&'static str, String)]) {
        let sink = &self.sink;
        let _ = catch_unwind(AssertUnwindSafe(|| sink.emit(event, level, attributes)));
    }

    /// Classify and record one await outcome.
    ///
    /// Timeouts (soft, hard, budget-exhausted) bump the timeout counter;
    /// anything that is neither a completion nor a scheduling outcome
    /// bumps the non-OK counter.
    pub fn record_await(
        &self,
        provider: ProviderKind,
        stage: &'static str,
        outcome: AwaitOutcome,
        timeout_ms: u64,
    ) {
        if outcome.cause.is_timeout() {
            self.timeout_count.fetch_add(1, Ordering::Relaxed);
        }
        if !outcome.cause.is_okish() {
            self.non_ok_count.fetch_add(1, Ordering::Relaxed);
        }
        if let AwaitCause::Skipped(_) = outcome.cause {
            self.skipped_count.fetch_add(1, Ordering::Relaxed);
        }
        let level = if outcome.cause.is_okish() {
            TelemetryLevel::Debug
        } else {
            TelemetryLevel::Warn
        };
        self.emit(
            "web.await",
            level,
            &[
                ("provider", provider.name().to_string()),
                ("stage", stage.to_string()),
                ("cause", outcome.cause.as_str().to_string()),
                ("timeout_ms", timeout_ms.to_string()),
                ("waited_ms", outcome.waited.as_millis().to_string()),
            ],
        );
    }

    /// Record a deliberate provider skip with its reason.
    pub fn record_skip(&self, provider: ProviderKind, reason: SkipReason, extra_ms: u64) {
        self.skipped_count.fetch_add(1, Ordering::Relaxed);
        if matches!(reason, SkipReason::Cooldown | SkipReason::BreakerOpen) {
            self.rate_limited.store(true, Ordering::Relaxed);
        }
        self.emit(
            "web.skip",
            TelemetryLevel::Info,
            &[
                ("provider", provider.name().to_string()),
                ("reason", reason.as_str().to_string()),
                ("extra_ms", extra_ms.to_string()),
            ],
        );
    }

    /// Record that a provider reported a rate limit this request.
    pub fn record_rate_limited(&self, provider: ProviderKind) {
        self.rate_limited.store(true, Ordering::Relaxed);
        self.emit(
            "web.rate_limited",
            TelemetryLevel::Warn,
            &[("provider", provider.name().to_string())],
        );
    }

    /// Record a non-OK provider call outcome.
    pub fn record_non_ok(&self, provider: ProviderKind, status: &str) {
        self.non_ok_count.fetch_add(1, Ordering::Relaxed);
        self.emit(
            "web.call.non_ok",
            TelemetryLevel::Warn,
            &[
                ("provider", provider.name().to_string()),
                ("status", status.to_string()),
            ],
        );
    }

    /// True when this request saw a transient failure signal — the
    /// cache-rescue trigger condition.
    pub fn saw_transient_failure(&self) -> bool {
        self.timeout_count.load(Ordering::Relaxed) > 0
            || self.non_ok_count.load(Ordering::Relaxed) > 0
            || self.skipped_count.load(Ordering::Relaxed) > 0
            || self.rate_limited.load(Ordering::Relaxed)
    }

    /// Number of timeouts recorded so far.
    pub fn timeouts(&self) -> u64 {
        self.timeout_count.load(Ordering::Relaxed)
    }

    /// Number of non-OK outcomes recorded so far.
    pub fn non_ok(&self) -> u64 {
        self.non_ok_count.load(Ordering::Relaxed)
    }

    /// Number of skips recorded so far.
    pub fn skipped(&self) -> u64 {
        self.skipped_count.load(Ordering::Relaxed)
    }

    /// Claims the once-per-request rescue slot. Returns `false` when the
    /// rescue ladder already ran for this request.
    pub fn try_mark_rescue_used(&self) -> bool {
        !self.rescue_used.swap(true, Ordering::Relaxed)
    }

    /// Claims the once-per-request backup-query slot.
    pub fn try_mark_backup_used(&self) -> bool {
        !self.backup_used.swap(true, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Sink recording all events for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub events: Mutex<Vec<(String, Vec<(&'static str, String)>)>>,
    }

    impl TelemetryRecorder for RecordingSink {
        fn emit(&self, event: &str, _level: TelemetryLevel, attributes: &[(&'static str, String)]) {
            self.events
                .lock()
                .expect("sink lock")
                .push((event.to_string(), attributes.to_vec()));
        }
    }

    struct PanickingSink;

    impl TelemetryRecorder for PanickingSink {
        fn emit(&self, _: &str, _: TelemetryLevel, _: &[(&'static str, String)]) {
            panic!("sink blew up");
        }
    }

    fn outcome(cause: AwaitCause) -> AwaitOutcome {
        AwaitOutcome {
            cause,
            waited: Duration::from_millis(10),
        }
    }

    #[test]
    fn timeouts_and_non_ok_counted() {
        let stats = RequestStats::new(Arc::new(RecordingSink::default()));
        stats.record_await(
            ProviderKind::Brave,
            "hard",
            outcome(AwaitCause::TimeoutHard),
            100,
        );
        stats.record_await(
            ProviderKind::Naver,
            "hard",
            outcome(AwaitCause::ExecutionError),
            100,
        );
        assert_eq!(stats.timeouts(), 1);
        assert_eq!(stats.non_ok(), 2);
        assert!(stats.saw_transient_failure());
    }

    #[test]
    fn ok_outcomes_do_not_trigger_rescue() {
        let stats = RequestStats::new(Arc::new(RecordingSink::default()));
        stats.record_await(ProviderKind::Brave, "hard", outcome(AwaitCause::Ok), 100);
        assert!(!stats.saw_transient_failure());
    }

    #[test]
    fn skips_counted_and_trigger_rescue() {
        let stats = RequestStats::new(Arc::new(RecordingSink::default()));
        stats.record_skip(ProviderKind::Naver, SkipReason::BreakerOpen, 1200);
        assert_eq!(stats.skipped(), 1);
        assert!(stats.saw_transient_failure());
    }

    #[test]
    fn rescue_slot_claimed_once() {
        let stats = RequestStats::new(Arc::new(RecordingSink::default()));
        assert!(stats.try_mark_rescue_used());
        assert!(!stats.try_mark_rescue_used());
    }

    #[test]
    fn backup_slot_claimed_once() {
        let stats = RequestStats::new(Arc::new(RecordingSink::default()));
        assert!(stats.try_mark_backup_used());
        assert!(!stats.try_mark_backup_used());
    }

    #[test]
    fn panicking_sink_is_contained() {
        let stats = RequestStats::new(Arc::new(PanickingSink));
        // Must not propagate the panic.
        stats.emit("web.test", TelemetryLevel::Info, &[]);
        stats.record_rate_limited(ProviderKind::Brave);
        assert!(stats.saw_transient_failure());
    }

    #[test]
    fn events_reach_the_sink() {
        let sink = Arc::new(RecordingSink::default());
        let stats = RequestStats::new(sink.clone());
        stats.record_skip(ProviderKind::Brave, SkipReason::Cooldown, 500);
        let events = sink.events.lock().expect("sink lock");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "web.skip");
        assert!(events[0]
            .1
            .iter()
            .any(|(k, v)| *k == "reason" && v == "cooldown"));
    }
}
