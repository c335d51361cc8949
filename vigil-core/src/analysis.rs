//! Analysis output types.

use serde::{Deserialize, Serialize};

/// Confidence used whenever the provider does not state one.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Structured outcome of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AnalysisResult {
    /// Free-form explanation
    pub analysis: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub suggestions: Vec<String>,
    pub relevant_metrics: Vec<String>,
}

impl AnalysisResult {
    /// Result carrying only free text and the default confidence.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            analysis: text.into(),
            confidence: DEFAULT_CONFIDENCE,
            suggestions: Vec::new(),
            relevant_metrics: Vec::new(),
        }
    }

    /// Force confidence into [0, 1]. NaN falls back to the default.
    pub fn clamp_confidence(mut self) -> Self {
        self.confidence = clamp_confidence(self.confidence);
        self
    }
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        DEFAULT_CONFIDENCE
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Which path of the response parser produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParseMode {
    /// Provider answered with the expected JSON object
    Structured,
    /// Free text; fields recovered by pattern extraction
    Fallback,
}

impl ParseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Fallback => "fallback",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_from_text_uses_default_confidence() {
        let r = AnalysisResult::from_text("hello");
        assert_eq!(r.confidence, DEFAULT_CONFIDENCE);
        assert!(r.suggestions.is_empty());
        assert!(r.relevant_metrics.is_empty());
    }

    #[test]
    fn test_clamp_nan() {
        assert_eq!(clamp_confidence(f64::NAN), DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_serialized_field_names() {
        let r = AnalysisResult::from_text("x");
        let json = serde_json::to_value(&r).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("analysis"));
        assert!(obj.contains_key("confidence"));
        assert!(obj.contains_key("suggestions"));
        assert!(obj.contains_key("relevant_metrics"));
        assert_eq!(obj.len(), 4);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_clamped_confidence_in_unit_interval(value in any::<f64>()) {
            let c = clamp_confidence(value);
            prop_assert!((0.0..=1.0).contains(&c));
        }
    }
}
