//! Concrete provider clients and their shared plumbing.

pub mod brave;
pub mod naver;

use std::sync::Mutex;
use std::time::{Duration, Instant};

pub use brave::{BraveConfig, BraveProvider};
pub use naver::{NaverConfig, NaverProvider};

/// Cap applied to a single `Retry-After` hint; the breaker applies its
/// own cap on top.
const RETRY_AFTER_CAP: Duration = Duration::from_secs(60);

/// Format one search hit as the snippet line format downstream consumers
/// expect: anchor with the source URL, then the description.
pub(crate) fn snippet_line(title: &str, url: &str, description: &str) -> String {
    format!("<a href=\"{url}\">{title}</a> {description}")
        .trim()
        .to_string()
}

/// Parse a `Retry-After` response header value.
///
/// Only the delta-seconds form is understood; the result is capped so a
/// single hint can't park a provider for long.
pub(crate) fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    let value = value?.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let seconds: u64 = value.parse().ok()?;
    Some(Duration::from_secs(seconds).min(RETRY_AFTER_CAP))
}

/// Provider-local cooldown window, set on rate-limit responses.
#[derive(Debug, Default)]
pub(crate) struct CooldownGate {
    until: Mutex<Option<Instant>>,
}

impl CooldownGate {
    /// Start (or extend) the cooldown window.
    pub(crate) fn set(&self, window: Duration) {
        let until = Instant::now() + window;
        let mut guard = match self.until.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(match *guard {
            Some(existing) if existing > until => existing,
            _ => until,
        });
    }

    /// True while the window is running.
    pub(crate) fn active(&self) -> bool {
        self.remaining_ms() > 0
    }

    /// Remaining window in milliseconds.
    pub(crate) fn remaining_ms(&self) -> u64 {
        let guard = match self.until.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.map_or(0, |until| {
            until.saturating_duration_since(Instant::now()).as_millis() as u64
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_line_embeds_url_and_description() {
        let line = snippet_line("Rust", "https://rust-lang.org", "A systems language");
        assert_eq!(
            line,
            "<a href=\"https://rust-lang.org\">Rust</a> A systems language"
        );
    }

    #[test]
    fn snippet_line_trims_when_description_empty() {
        let line = snippet_line("Rust", "https://rust-lang.org", "");
        assert_eq!(line, "<a href=\"https://rust-lang.org\">Rust</a>");
    }

    #[test]
    fn retry_after_delta_seconds_parsed() {
        assert_eq!(
            parse_retry_after(Some("5")),
            Some(Duration::from_secs(5))
        );
        assert_eq!(
            parse_retry_after(Some(" 12 ")),
            Some(Duration::from_secs(12))
        );
    }

    #[test]
    fn retry_after_capped_at_sixty_seconds() {
        assert_eq!(
            parse_retry_after(Some("3600")),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn retry_after_rejects_dates_and_garbage() {
        assert_eq!(parse_retry_after(Some("Wed, 21 Oct 2026 07:28:00 GMT")), None);
        assert_eq!(parse_retry_after(Some("")), None);
        assert_eq!(parse_retry_after(None), None);
    }

    #[test]
    fn cooldown_gate_reports_remaining() {
        let gate = CooldownGate::default();
        assert!(!gate.active());
        gate.set(Duration::from_secs(30));
        assert!(gate.active());
        let remaining = gate.remaining_ms();
        assert!(remaining > 0 && remaining <= 30_000);
    }

    #[test]
    fn cooldown_gate_keeps_longer_window() {
        let gate = CooldownGate::default();
        gate.set(Duration::from_secs(30));
        gate.set(Duration::from_secs(1));
        // The longer existing window survives.
        assert!(gate.remaining_ms() > 2_000);
    }
}
