//! Query language helpers: script detection and the default reformulation
//! transforms.
//!
//! These are the built-in keyword-extraction / language-normalisation
//! functions the [`crate::orchestrator::backup::BackupQueryBuilder`] and
//! the provider-specific query shaping use. Both seams accept replacement
//! functions, so callers with their own translation stack can plug it in.

/// True when the string contains Hangul (syllables or jamo).
pub fn contains_hangul(text: &str) -> bool {
    text.chars().any(|ch| {
        matches!(ch,
            '\u{AC00}'..='\u{D7A3}'   // syllables
            | '\u{1100}'..='\u{11FF}' // jamo
            | '\u{3130}'..='\u{318F}' // compatibility jamo
        )
    })
}

/// Korean filler/interrogative fragments stripped during keyword
/// extraction. Longer variants first so partial forms don't shadow them.
const KOREAN_FILLERS: &[&str] = &[
    "무엇이야",
    "무슨뜻",
    "무슨의미",
    "알려줘봐",
    "알려줘요",
    "알려줘",
    "말해줘봐",
    "말해줘요",
    "말해줘",
    "검색해줘",
    "검색해봐",
    "검색해요",
    "찾아줘봐",
    "찾아줘요",
    "찾아줘",
    "설명해줘봐",
    "설명해줘요",
    "설명해줘",
    "해줘봐",
    "해줘요",
    "해줘",
    "누구야",
    "뭐야",
    "인가요?",
    "인가요",
    "캐릭터",
    "어떤",
    "사람",
    "이야",
    "좀",
];

/// Honorific forms softened to their base nouns before searching.
const HONORIFIC_SOFTENING: &[(&str, &str)] = &[
    ("의사선생님", "의사"),
    ("교수님", "교수"),
    ("선생님", "선생"),
];

/// Strip Korean filler words and soften honorifics, keeping the topical
/// tokens of a conversational query.
pub fn extract_keywords(query: &str) -> String {
    let mut out = query.to_string();
    for filler in KOREAN_FILLERS {
        out = out.replace(filler, "");
    }
    for (honorific, base) in HONORIFIC_SOFTENING {
        out = out.replace(honorific, base);
    }
    out.trim().to_string()
}

const GAME_MARKERS: &[&str] = &["원신", "genshin", "캐릭터", "스킬", "티어", "빌드"];

const TECH_MARKERS: &[&str] = &[
    "갤럭시",
    "fold",
    "flip",
    "아이폰",
    "iphone",
    "pixel",
    "snapdragon",
    "exynos",
    "rtx",
    "cpu",
    "gpu",
    "노트북",
];

const RUMOR_MARKERS: &[&str] = &["루머", "유출", "렌더", "leak", "rumor", "renders"];

const SPEC_MARKERS: &[&str] = &["스펙", "사양", "출시", "가격", "리뷰", "비교"];

/// `s` followed by two ASCII digits, e.g. the Galaxy "s25" model pattern.
fn has_model_number(normalized: &str) -> bool {
    let bytes = normalized.as_bytes();
    bytes.windows(3).any(|w| {
        w[0] == b's' && w[1].is_ascii_digit() && w[2].is_ascii_digit()
    })
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Reformulate a Korean tech query for a Latin-script index.
///
/// Focuses on consumer-hardware queries where English sources dominate;
/// game queries and anything without a tech marker pass through
/// unchanged.
pub fn to_english_query(query: &str) -> String {
    if query.trim().is_empty() {
        return query.to_string();
    }
    let normalized: String = query
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if contains_any(&normalized, GAME_MARKERS) {
        return query.to_string();
    }

    let has_tech_marker = contains_any(&normalized, TECH_MARKERS) || has_model_number(&normalized);
    let rumor = contains_any(&normalized, RUMOR_MARKERS);

    if normalized.contains("폴드7") || normalized.contains("zfold7") || normalized.contains("fold7")
    {
        return if rumor {
            "Galaxy Z Fold 7 leak rumors renders".to_string()
        } else {
            "Samsung Galaxy Z Fold7 official specs release date price".to_string()
        };
    }

    if rumor {
        return format!("{query} latest leaks rumors");
    }

    if has_tech_marker && contains_any(&normalized, SPEC_MARKERS) {
        return format!("{query} official specs release date price review");
    }

    query.to_string()
}

/// Strip everything but ASCII alphanumerics, collapsing whitespace.
pub fn latin_only(query: &str) -> String {
    let replaced: String = query
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c
            } else {
                ' '
            }
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True for degenerate queries made of digits only (e.g. a bare year).
pub fn is_pure_numeric(query: &str) -> bool {
    let trimmed = query.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hangul_detected() {
        assert!(contains_hangul("갤럭시 스펙"));
        assert!(contains_hangul("mixed 한글 text"));
        assert!(!contains_hangul("rust programming"));
        assert!(!contains_hangul(""));
    }

    #[test]
    fn keywords_strip_fillers() {
        assert_eq!(extract_keywords("아인슈타인 누구야"), "아인슈타인");
        assert_eq!(extract_keywords("갤럭시 스펙 알려줘"), "갤럭시 스펙");
    }

    #[test]
    fn keywords_soften_honorifics() {
        assert_eq!(extract_keywords("김철수 교수님"), "김철수 교수");
    }

    #[test]
    fn non_korean_query_unchanged_by_keywords() {
        assert_eq!(extract_keywords("rust async runtime"), "rust async runtime");
    }

    #[test]
    fn game_queries_pass_through_english_conversion() {
        assert_eq!(to_english_query("원신 티어 정리"), "원신 티어 정리");
    }

    #[test]
    fn fold7_maps_to_official_spec_query() {
        assert_eq!(
            to_english_query("폴드7 스펙"),
            "Samsung Galaxy Z Fold7 official specs release date price"
        );
    }

    #[test]
    fn fold7_rumor_maps_to_leak_query() {
        assert_eq!(
            to_english_query("폴드7 유출 렌더"),
            "Galaxy Z Fold 7 leak rumors renders"
        );
    }

    #[test]
    fn rumor_intent_appends_leak_terms() {
        assert_eq!(
            to_english_query("갤럭시 s26 루머"),
            "갤럭시 s26 루머 latest leaks rumors"
        );
    }

    #[test]
    fn tech_spec_query_appends_spec_terms() {
        assert_eq!(
            to_english_query("아이폰 가격"),
            "아이폰 가격 official specs release date price review"
        );
    }

    #[test]
    fn plain_query_unchanged() {
        assert_eq!(to_english_query("오늘 날씨"), "오늘 날씨");
        assert_eq!(to_english_query(""), "");
    }

    #[test]
    fn model_number_counts_as_tech_marker() {
        assert!(has_model_number("갤럭시s26사양"));
        assert!(!has_model_number("갤럭시사양"));
    }

    #[test]
    fn latin_only_strips_and_collapses() {
        assert_eq!(latin_only("한글 rust 2024!"), "rust 2024");
        assert_eq!(latin_only("  a  -  b  "), "a b");
        assert_eq!(latin_only("한글만"), "");
    }

    #[test]
    fn pure_numeric_detection() {
        assert!(is_pure_numeric("2026"));
        assert!(is_pure_numeric("  42 "));
        assert!(!is_pure_numeric("2026 leaks"));
        assert!(!is_pure_numeric(""));
        assert!(!is_pure_numeric("  "));
    }
}
