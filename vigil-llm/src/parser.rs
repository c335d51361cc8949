//! Tolerant parser for provider output
//!
//! Never fails. A well-formed JSON object is taken as-is; anything else becomes
//! the analysis text, with confidence, suggestions and metrics recovered from
//! `label: value` lines where present.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use vigil_core::{clamp_confidence, AnalysisResult, ParseMode, DEFAULT_CONFIDENCE};

static CONFIDENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bconfidence:?\s*([0-9]*\.?[0-9]+)").expect("Invalid confidence regex")
});
static SUGGESTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bsuggestion:\s*([^\n]+)").expect("Invalid suggestion regex")
});
static METRIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bmetric:\s*([^\n]+)").expect("Invalid metric regex"));
static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*\s*\n(.*?)\n?\s*```\s*$").expect("Invalid fence regex")
});

/// Shape expected from the provider. Only `analysis` is required; a missing
/// confidence takes the default and missing lists are empty. Extra fields are ignored.
#[derive(Debug, Deserialize)]
struct StructuredReply {
    analysis: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    relevant_metrics: Vec<String>,
}

/// Parser output plus which path produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub result: AnalysisResult,
    pub mode: ParseMode,
}

/// Parse raw provider text into an [`AnalysisResult`]. Total: never errors.
pub fn parse_response(raw: &str) -> ParsedResponse {
    if let Some(result) = parse_structured(raw) {
        return ParsedResponse {
            result,
            mode: ParseMode::Structured,
        };
    }

    ParsedResponse {
        result: parse_fallback(raw),
        mode: ParseMode::Fallback,
    }
}

fn strip_code_fence(raw: &str) -> &str {
    CODE_FENCE_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw)
}

fn parse_structured(raw: &str) -> Option<AnalysisResult> {
    let body = strip_code_fence(raw).trim();
    let reply: StructuredReply = serde_json::from_str(body).ok()?;
    Some(
        AnalysisResult {
            analysis: reply.analysis,
            confidence: reply.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            suggestions: reply.suggestions,
            relevant_metrics: reply.relevant_metrics,
        }
        .clamp_confidence(),
    )
}

fn captures(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_fallback(raw: &str) -> AnalysisResult {
    let mut result = AnalysisResult::from_text(raw);

    if let Some(value) = CONFIDENCE_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
    {
        result.confidence = clamp_confidence(value);
    }

    result.suggestions = captures(&SUGGESTION_RE, raw);
    result.relevant_metrics = captures(&METRIC_RE, raw);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_structured_reply() {
        let parsed = parse_response(
            r#"{"analysis":"ok","confidence":0.9,"suggestions":[],"relevant_metrics":[]}"#,
        );
        assert_eq!(parsed.mode, ParseMode::Structured);
        assert_eq!(parsed.result.analysis, "ok");
        assert_eq!(parsed.result.confidence, 0.9);
        assert!(parsed.result.suggestions.is_empty());
    }

    #[test]
    fn test_structured_reply_inside_code_fence() {
        let raw = "```json\n{\"analysis\":\"ok\",\"confidence\":0.5,\"suggestions\":[\"a\"],\"relevant_metrics\":[\"m\"]}\n```";
        let parsed = parse_response(raw);
        assert_eq!(parsed.mode, ParseMode::Structured);
        assert_eq!(parsed.result.suggestions, vec!["a".to_string()]);
        assert_eq!(parsed.result.relevant_metrics, vec!["m".to_string()]);
    }

    #[test]
    fn test_structured_confidence_clamped() {
        let parsed = parse_response(
            r#"{"analysis":"x","confidence":7.5,"suggestions":[],"relevant_metrics":[]}"#,
        );
        assert_eq!(parsed.result.confidence, 1.0);
    }

    #[test]
    fn test_extra_fields_ignored() {
        let parsed = parse_response(
            r#"{"analysis":"ok","confidence":0.9,"suggestions":[],"relevant_metrics":[],"severity":"low"}"#,
        );
        assert_eq!(parsed.mode, ParseMode::Structured);
    }

    #[test]
    fn test_partial_object_decodes_structured() {
        let parsed = parse_response(r#"{"analysis":"CPU saturated","confidence":0.7}"#);
        assert_eq!(parsed.mode, ParseMode::Structured);
        assert_eq!(parsed.result.analysis, "CPU saturated");
        assert_eq!(parsed.result.confidence, 0.7);
        assert!(parsed.result.suggestions.is_empty());
        assert!(parsed.result.relevant_metrics.is_empty());
    }

    #[test]
    fn test_missing_confidence_uses_default() {
        let parsed = parse_response(r#"{"analysis":"ok","suggestions":["restart"]}"#);
        assert_eq!(parsed.mode, ParseMode::Structured);
        assert_eq!(parsed.result.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(parsed.result.suggestions, vec!["restart".to_string()]);
    }

    #[test]
    fn test_object_without_analysis_falls_back() {
        let raw = r#"{"confidence":0.9}"#;
        let parsed = parse_response(raw);
        assert_eq!(parsed.mode, ParseMode::Fallback);
        assert_eq!(parsed.result.analysis, raw);
    }

    #[test]
    fn test_plain_prose_defaults() {
        let parsed = parse_response("CPU looks fine.");
        assert_eq!(parsed.mode, ParseMode::Fallback);
        assert_eq!(parsed.result.analysis, "CPU looks fine.");
        assert_eq!(parsed.result.confidence, DEFAULT_CONFIDENCE);
        assert!(parsed.result.suggestions.is_empty());
        assert!(parsed.result.relevant_metrics.is_empty());
    }

    #[test]
    fn test_fallback_extraction() {
        let raw = "Memory grows steadily.\n\
                   Confidence: 0.65\n\
                   Suggestion: check the cache eviction\n\
                   Suggestion: add a heap profile\n\
                   Metric: process_resident_memory_bytes\n";
        let parsed = parse_response(raw);
        assert_eq!(parsed.result.confidence, 0.65);
        assert_eq!(
            parsed.result.suggestions,
            vec![
                "check the cache eviction".to_string(),
                "add a heap profile".to_string()
            ]
        );
        assert_eq!(
            parsed.result.relevant_metrics,
            vec!["process_resident_memory_bytes".to_string()]
        );
    }

    #[test]
    fn test_fallback_confidence_clamped() {
        let parsed = parse_response("confidence 85");
        assert_eq!(parsed.result.confidence, 1.0);
    }

    #[test]
    fn test_empty_input() {
        let parsed = parse_response("");
        assert_eq!(parsed.result.analysis, "");
        assert_eq!(parsed.result.confidence, DEFAULT_CONFIDENCE);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_parser_never_fails(raw in any::<String>()) {
            let parsed = parse_response(&raw);
            prop_assert!((0.0..=1.0).contains(&parsed.result.confidence));
        }

        #[test]
        fn prop_fallback_keeps_raw_text(raw in "[a-zA-Z .,:\n]{0,200}") {
            let parsed = parse_response(&raw);
            if parsed.mode == ParseMode::Fallback {
                prop_assert_eq!(parsed.result.analysis, raw);
            }
        }
    }
}
