//! Backup query generation for starved searches.
//!
//! When the primary query produced nothing, one reformulated query is
//! tried: advanced search operators are preserved verbatim, the free-text
//! remainder is trimmed to a small deduplicated keyword set, and
//! degenerate (pure-numeric) reformulations are discarded. The keyword
//! and language transforms are pluggable; the defaults come from
//! [`crate::query`].

use std::sync::Arc;

use crate::query;

/// A pluggable query string transform.
pub type QueryTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Advanced operators preserved verbatim in backup queries.
const ADVANCED_OPERATORS: &[&str] = &["site", "inurl", "intitle", "filetype", "ext"];

/// How many non-operator keywords an operator-preserved backup keeps.
const OPERATOR_REST_LIMIT: usize = 4;

/// Maximum tokens kept by the last-resort truncation.
const TRUNCATE_TOKEN_LIMIT: usize = 6;

/// True when the query uses any advanced search operator.
fn contains_advanced_operators(query: &str) -> bool {
    let lower = query.to_lowercase();
    ADVANCED_OPERATORS
        .iter()
        .any(|op| lower.contains(&format!("{op}:")))
}

/// True when a single token is an `operator:value` form.
fn is_operator_token(token: &str) -> bool {
    let token = token.trim();
    let Some(idx) = token.find(':') else {
        return false;
    };
    if idx == 0 || idx >= token.len() - 1 {
        return false;
    }
    let op = token[..idx].to_lowercase();
    ADVANCED_OPERATORS.contains(&op.as_str())
}

/// Strip wrapping quotes/brackets often attached in user input.
fn trim_edge_punct(token: &str) -> &str {
    let mut t = token.trim();
    loop {
        let Some(first) = t.chars().next() else {
            break;
        };
        if matches!(first, '"' | '`' | '(' | '[' | '{' | '<') {
            t = t[first.len_utf8()..].trim();
        } else {
            break;
        }
    }
    loop {
        let Some(last) = t.chars().last() else {
            break;
        };
        if matches!(last, '"' | '`' | ')' | ']' | '}' | '>' | ',' | ';' | '.') {
            t = t[..t.len() - last.len_utf8()].trim();
        } else {
            break;
        }
    }
    t
}

/// Builds a single reformulated query for an empty primary result.
pub struct BackupQueryBuilder {
    keyword_extract: QueryTransform,
    to_english: QueryTransform,
}

impl BackupQueryBuilder {
    /// Builder with the default transforms.
    pub fn new() -> Self {
        Self {
            keyword_extract: Arc::new(|q: &str| query::extract_keywords(q)),
            to_english: Arc::new(|q: &str| query::to_english_query(q)),
        }
    }

    /// Builder with custom keyword-extraction and language transforms.
    pub fn with_transforms(keyword_extract: QueryTransform, to_english: QueryTransform) -> Self {
        Self {
            keyword_extract,
            to_english,
        }
    }

    /// Keep operator tokens verbatim, but dedupe and shorten the rest.
    ///
    /// Returns an empty string when the query carries no operator token.
    fn operator_preserved(&self, q: &str) -> String {
        let mut ops: Vec<String> = Vec::new();
        let mut rest: Vec<&str> = Vec::new();

        for token in q.split_whitespace() {
            let cleaned = trim_edge_punct(token);
            if is_operator_token(cleaned) {
                if !ops.iter().any(|existing| existing == cleaned) {
                    ops.push(cleaned.to_string());
                }
            } else {
                rest.push(token);
            }
        }

        if ops.is_empty() {
            return String::new();
        }

        let rest_keywords = (self.keyword_extract)(&rest.join(" "));
        let mut seen_lower: Vec<String> = Vec::new();
        let mut kept_rest: Vec<&str> = Vec::new();
        for token in rest_keywords.split_whitespace() {
            if kept_rest.len() >= OPERATOR_REST_LIMIT {
                break;
            }
            // Degenerate remainder tokens (bare numbers) add noise, drop
            // them here too.
            if query::is_pure_numeric(token) {
                continue;
            }
            let key = token.to_lowercase();
            if seen_lower.contains(&key) {
                continue;
            }
            seen_lower.push(key);
            kept_rest.push(token);
        }

        let mut parts = ops;
        parts.extend(kept_rest.iter().map(|t| t.to_string()));
        parts.join(" ")
    }

    /// Build the backup query, or `None` when no transform produces a
    /// usable change.
    ///
    /// `prefer_latin` selects the strategy order for the case where only
    /// the Latin-script provider is usable: latin-only stripping first,
    /// then language normalisation, then keyword extraction; otherwise
    /// the reverse.
    pub fn build(&self, original: &str, prefer_latin: bool) -> Option<String> {
        let q = original.trim();
        if q.is_empty() {
            return None;
        }

        let has_ops = contains_advanced_operators(q);

        if has_ops {
            let preserved = self.operator_preserved(q);
            if !preserved.is_empty() && !preserved.eq_ignore_ascii_case(q) {
                return Some(preserved);
            }
        }

        let mut keywords = (self.keyword_extract)(q);
        let mut english = (self.to_english)(q);
        let mut latin = if has_ops {
            String::new()
        } else {
            query::latin_only(q)
        };

        // Discard degenerate backups (e.g. a bare year) that tend to
        // produce spammy or irrelevant results.
        if query::is_pure_numeric(&keywords) {
            keywords.clear();
        }
        if query::is_pure_numeric(&english) {
            english.clear();
        }
        if query::is_pure_numeric(&latin) {
            latin.clear();
        }

        let candidates: [&str; 3] = if prefer_latin {
            [&latin, &english, &keywords]
        } else {
            [&keywords, &english, &latin]
        };
        for candidate in candidates {
            if !candidate.is_empty() && !candidate.eq_ignore_ascii_case(q) {
                return Some(candidate.to_string());
            }
        }

        // Last resort: shorten overly long queries.
        let tokens: Vec<&str> = q.split_whitespace().collect();
        if tokens.len() > TRUNCATE_TOKEN_LIMIT {
            let shortened = tokens[..TRUNCATE_TOKEN_LIMIT].join(" ");
            if query::is_pure_numeric(&shortened) {
                return None;
            }
            return Some(shortened);
        }
        None
    }
}

impl Default for BackupQueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
