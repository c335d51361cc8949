//! Token estimation and truncation helpers

/// Marker appended to text cut by [`truncate_with_marker`].
pub const TRUNCATION_MARKER: &str = "\n... (truncated)";

/// Estimate token count for a block of telemetry text.
///
/// Telemetry is dense with digits and punctuation, so the estimate is a
/// conservative one token per three bytes, plus a fixed `baseline` reserve.
pub fn estimate_tokens(text: &str, baseline: usize) -> usize {
    baseline + text.len() / 3
}

/// Safely truncate a string at a UTF-8 boundary, keeping at most `max_bytes`.
pub fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    &s[..end]
}

/// Cut `text` to `limit` bytes and append [`TRUNCATION_MARKER`] if anything was dropped.
pub fn truncate_with_marker(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut out = safe_truncate(text, limit).to_string();
    out.push_str(TRUNCATION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_estimate_tokens_empty() {
        assert_eq!(estimate_tokens("", 100), 100);
    }

    #[test]
    fn test_estimate_tokens_integer_division() {
        assert_eq!(estimate_tokens("abcde", 100), 101);
        assert_eq!(estimate_tokens("abcdef", 0), 2);
    }

    #[test]
    fn test_safe_truncate_respects_char_boundary() {
        let s = "héllo";
        // 'é' spans bytes 1..3
        assert_eq!(safe_truncate(s, 2), "h");
        assert_eq!(safe_truncate(s, 3), "hé");
    }

    #[test]
    fn test_truncate_with_marker_short_text_unchanged() {
        assert_eq!(truncate_with_marker("diff", 2000), "diff");
    }

    #[test]
    fn test_truncate_with_marker_long_text() {
        let text = "x".repeat(2500);
        let out = truncate_with_marker(&text, 2000);
        assert!(out.starts_with(&"x".repeat(2000)));
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert_eq!(out.len(), 2000 + TRUNCATION_MARKER.len());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_token_estimate_monotonic(a in ".{0,200}", b in ".{0,200}") {
            let joined = format!("{}{}", a, b);
            prop_assert!(estimate_tokens(&joined, 100) >= estimate_tokens(&a, 100));
        }

        #[test]
        fn prop_safe_truncate_within_limit(text in ".{0,300}", limit in 0usize..400) {
            let out = safe_truncate(&text, limit);
            prop_assert!(out.len() <= limit);
            prop_assert!(text.starts_with(out));
        }
    }
}
