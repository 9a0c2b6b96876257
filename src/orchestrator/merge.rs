//! Snippet merging: order-preserving dedup, minimum-output floor, and the
//! strict-mode trust filter.

use std::collections::HashSet;

use crate::context::RequestContext;
use crate::types::MergeResult;

/// URL markers of sources excluded in strict/official modes.
///
/// Community boards, blog platforms, and social media — useful for recall
/// in normal mode, filtered when evidence quality is prioritised.
const LOW_TRUST_URL_MARKERS: &[&str] = &[
    "namu.wiki",
    "tistory.com",
    "blog.naver.com",
    "cafe.naver.com",
    "dcinside.com",
    "ruliweb.com",
    "fmkorea.com",
    "theqoo.net",
    "ppomppu.co.kr",
    "youtube.com",
    "x.com",
    "twitter.com",
    "instagram.com",
];

/// Merge primary/secondary snippet lists while keeping ordering stable.
///
/// Every non-blank primary snippet appears before any secondary snippet
/// not already present; first occurrence wins. To avoid over-aggressive
/// truncation, at least `min_results` snippets are kept when available,
/// even if the caller requested fewer. In strict/official modes,
/// low-trust sources are filtered afterwards — unless that would empty
/// the result, in which case the unfiltered list is kept.
pub fn merge_and_limit(
    primary: &[String],
    secondary: &[String],
    top_k: usize,
    min_results: usize,
    ctx: &RequestContext,
) -> MergeResult {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged: Vec<String> = Vec::new();
    let mut from_primary = 0usize;
    let mut from_secondary = 0usize;

    for snippet in primary {
        let trimmed = snippet.trim();
        if trimmed.is_empty() || !seen.insert(snippet.as_str()) {
            continue;
        }
        merged.push(snippet.clone());
        from_primary += 1;
    }
    for snippet in secondary {
        let trimmed = snippet.trim();
        if trimmed.is_empty() || !seen.insert(snippet.as_str()) {
            continue;
        }
        merged.push(snippet.clone());
        from_secondary += 1;
    }

    let had_input = primary.iter().any(|s| !s.trim().is_empty())
        || secondary.iter().any(|s| !s.trim().is_empty());
    if had_input && merged.is_empty() {
        // Structural invariant: non-empty inputs must not merge to
        // nothing. Logged, never thrown.
        tracing::warn!("merge invariant violated: non-empty inputs produced empty merge");
    }

    let effective_top_k = if top_k == 0 {
        min_results
    } else {
        top_k.max(min_results)
    };
    if merged.len() > effective_top_k {
        merged.truncate(effective_top_k);
        // Recount provenance after truncation.
        from_primary = from_primary.min(merged.len());
        from_secondary = merged.len() - from_primary;
    }

    let snippets = apply_trust_filter_if_needed(merged, ctx);
    let from_primary = from_primary.min(snippets.len());
    let from_secondary = from_secondary.min(snippets.len() - from_primary);

    MergeResult {
        snippets,
        from_primary,
        from_secondary,
    }
}

/// Drop low-trust snippets in strict/official modes.
///
/// Keeps the unfiltered input whenever filtering would remove everything
/// — a filter must never produce a worse-than-nothing outcome.
fn apply_trust_filter_if_needed(snippets: Vec<String>, ctx: &RequestContext) -> Vec<String> {
    if snippets.is_empty() || !ctx.trust_filtering() {
        return snippets;
    }
    let filtered: Vec<String> = snippets
        .iter()
        .filter(|s| !looks_low_trust(s))
        .cloned()
        .collect();
    if filtered.is_empty() {
        snippets
    } else {
        filtered
    }
}

fn looks_low_trust(snippet: &str) -> bool {
    let lower = snippet.to_lowercase();
    LOW_TRUST_URL_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn merge(primary: &[&str], secondary: &[&str], top_k: usize) -> MergeResult {
        merge_and_limit(
            &strs(primary),
            &strs(secondary),
            top_k,
            3,
            &RequestContext::new(),
        )
    }

    #[test]
    fn primary_results_come_first() {
        let result = merge(&["a", "b"], &["c", "d"], 10);
        assert_eq!(result.snippets, strs(&["a", "b", "c", "d"]));
        assert_eq!(result.from_primary, 2);
        assert_eq!(result.from_secondary, 2);
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let result = merge(&["a", "b"], &["b", "c"], 10);
        assert_eq!(result.snippets, strs(&["a", "b", "c"]));
        assert_eq!(result.from_primary, 2);
        assert_eq!(result.from_secondary, 1);
    }

    #[test]
    fn blanks_and_whitespace_dropped() {
        let result = merge(&["a", "", "  "], &["b"], 10);
        assert_eq!(result.snippets, strs(&["a", "b"]));
    }

    #[test]
    fn merge_is_idempotent() {
        let once = merge(&["a", "b", "c"], &["b", "d"], 4);
        let twice = merge_and_limit(&once.snippets, &[], 4, 3, &RequestContext::new());
        assert_eq!(once.snippets, twice.snippets);
    }

    #[test]
    fn minimum_of_three_kept_despite_smaller_top_k() {
        let result = merge(&["a", "b", "c", "d"], &[], 1);
        assert_eq!(result.snippets.len(), 3);
    }

    #[test]
    fn zero_top_k_keeps_minimum() {
        let result = merge(&["a", "b", "c", "d"], &[], 0);
        assert_eq!(result.snippets.len(), 3);
    }

    #[test]
    fn truncates_to_top_k() {
        let result = merge(&["a", "b", "c", "d", "e"], &["f"], 4);
        assert_eq!(result.snippets, strs(&["a", "b", "c", "d"]));
        assert_eq!(result.from_primary, 4);
        assert_eq!(result.from_secondary, 0);
    }

    #[test]
    fn empty_inputs_produce_empty_merge() {
        let result = merge(&[], &[], 5);
        assert!(result.is_empty());
        assert_eq!(result.from_primary, 0);
        assert_eq!(result.from_secondary, 0);
    }

    #[test]
    fn trust_filter_inactive_in_normal_mode() {
        let snippets = [
            "<a href=\"https://namu.wiki/w/thing\">thing</a> wiki entry".to_string(),
            "<a href=\"https://example.gov\">official</a> statement".to_string(),
        ];
        let result = merge_and_limit(&snippets, &[], 5, 3, &RequestContext::new());
        assert_eq!(result.snippets.len(), 2);
    }

    #[test]
    fn trust_filter_drops_low_trust_in_official_mode() {
        let snippets = [
            "<a href=\"https://namu.wiki/w/thing\">thing</a> wiki entry".to_string(),
            "<a href=\"https://example.gov\">official</a> statement".to_string(),
        ];
        let result = merge_and_limit(&snippets, &[], 5, 3, &RequestContext::official());
        assert_eq!(result.snippets.len(), 1);
        assert!(result.snippets[0].contains("example.gov"));
    }

    #[test]
    fn trust_filter_never_empties_the_result() {
        let snippets = [
            "<a href=\"https://blog.naver.com/x\">post</a> blog".to_string(),
            "<a href=\"https://tistory.com/y\">post</a> blog".to_string(),
        ];
        let result = merge_and_limit(&snippets, &[], 5, 3, &RequestContext::official());
        assert_eq!(result.snippets.len(), 2);
    }

    #[test]
    fn strike_mode_filters_like_official() {
        let ctx = RequestContext {
            strike_mode: true,
            ..RequestContext::new()
        };
        let snippets = [
            "<a href=\"https://dcinside.com/board\">thread</a> forum".to_string(),
            "<a href=\"https://example.org\">article</a> press".to_string(),
        ];
        let result = merge_and_limit(&snippets, &[], 5, 3, &ctx);
        assert_eq!(result.snippets.len(), 1);
    }

    #[test]
    fn secondary_only_merge_counts_provenance() {
        let result = merge(&[], &["x", "y"], 5);
        assert_eq!(result.from_primary, 0);
        assert_eq!(result.from_secondary, 2);
    }
}
