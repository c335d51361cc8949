//! Analysis query types and cache key derivation.

use crate::{ValidationError, VigilResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive time window a query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Build a range, rejecting `start > end`. Equal bounds are allowed.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> VigilResult<Self> {
        if start > end {
            return Err(ValidationError::InvertedTimeRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            }
            .into());
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// A single analysis request: question, window and the signals to consider.
///
/// An empty `signals` list means "use the full catalog", resolved at request time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisQuery {
    question: String,
    range: TimeRange,
    signals: Vec<String>,
}

impl AnalysisQuery {
    pub fn new(question: impl Into<String>, range: TimeRange, signals: Vec<String>) -> Self {
        Self {
            question: question.into(),
            range,
            signals,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn signals(&self) -> &[String] {
        &self.signals
    }

    /// Canonical cache key for this query.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::for_query(self)
    }
}

/// Canonical identity of a query in the result cache.
///
/// Question, start, end and each signal name are written in request order,
/// each as `<byte length>:<text>`, so no two distinct queries share a key.
/// Signal order is significant: `[a, b]` and `[b, a]` are distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_query(query: &AnalysisQuery) -> Self {
        let range = query.range();
        let start = range.start.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let end = range.end.to_rfc3339_opts(SecondsFormat::AutoSi, true);

        let mut key = String::with_capacity(
            query.question.len() + 64 + query.signals.iter().map(|s| s.len() + 4).sum::<usize>(),
        );
        let parts = [query.question.as_str(), start.as_str(), end.as_str()]
            .into_iter()
            .chain(query.signals.iter().map(String::as_str));
        for part in parts {
            push_field(&mut key, part);
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn push_field(key: &mut String, part: &str) {
    key.push_str(&part.len().to_string());
    key.push(':');
    key.push_str(part);
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn range() -> TimeRange {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        TimeRange::new(start, end).unwrap()
    }

    #[test]
    fn test_time_range_rejects_inverted_bounds() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(TimeRange::new(start, end).is_err());
    }

    #[test]
    fn test_time_range_allows_equal_bounds() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let r = TimeRange::new(t, t).unwrap();
        assert_eq!(r.start(), r.end());
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let a = AnalysisQuery::new("why?", range(), vec!["cpu".into()]);
        let b = AnalysisQuery::new("why?", range(), vec!["cpu".into()]);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_cache_key_is_order_sensitive() {
        let a = AnalysisQuery::new("q", range(), vec!["a".into(), "b".into()]);
        let b = AnalysisQuery::new("q", range(), vec!["b".into(), "a".into()]);
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_cache_key_layout() {
        let q = AnalysisQuery::new("q", range(), vec!["a".into(), "b".into()]);
        assert_eq!(
            q.cache_key().as_str(),
            "1:q20:2024-01-01T00:00:00Z20:2024-01-01T01:00:00Z1:a1:b"
        );
    }

    #[test]
    fn test_cache_key_signal_boundaries_are_distinct() {
        let a = AnalysisQuery::new("q", range(), vec!["ab".into(), "c".into()]);
        let b = AnalysisQuery::new("q", range(), vec!["a".into(), "bc".into()]);
        assert_ne!(a.cache_key(), b.cache_key());

        let merged = AnalysisQuery::new("q", range(), vec!["abc".into()]);
        assert_ne!(a.cache_key(), merged.cache_key());
    }

    #[test]
    fn test_cache_key_question_cannot_absorb_bounds() {
        let r = range();
        let stamp = r.start().to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let a = AnalysisQuery::new("q", r, vec![stamp.clone()]);
        let b = AnalysisQuery::new(format!("q{}", stamp), r, vec![]);
        assert_ne!(a.cache_key(), b.cache_key());
    }
}
