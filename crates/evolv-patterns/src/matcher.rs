//! Multi-factor scoring of signals against patterns
//!
//! Matching is a pure function of the signal and the pattern snapshot it is
//! given. Confidence updates happen in [`crate::PatternLibrary`].

use chrono::{DateTime, Utc};
use evolv_core::fail_open::fail_open;
use evolv_core::{PatternConfig, Result, Signal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::pattern::{CompiledPattern, ErrorPattern};

/// Compiled regexes keyed by pattern id
pub type CompiledPatterns = HashMap<String, Arc<CompiledPattern>>;

/// Scores are kept to nine decimal places so summed weights land exactly on
/// threshold and band edges.
const SCORE_SCALE: f64 = 1e9;

fn round_score(value: f64) -> f64 {
    (value * SCORE_SCALE).round() / SCORE_SCALE
}

/// Which of the four weighted factors matched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchFactors {
    pub error_type: bool,
    pub message: bool,
    pub stack_trace: bool,
    pub class_method: bool,
}

/// A scored candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub pattern: ErrorPattern,
    pub factors: MatchFactors,
    /// Weighted factor sum (0.0 to 1.0)
    pub raw_score: f64,
    /// `raw_score * confidence`
    pub score: f64,
}

/// Discrete band for a match score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchQuality {
    NoMatch,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl MatchQuality {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::Excellent
        } else if score >= 0.7 {
            Self::Good
        } else if score >= 0.5 {
            Self::Fair
        } else if score >= 0.3 {
            Self::Poor
        } else {
            Self::NoMatch
        }
    }
}

impl std::fmt::Display for MatchQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Excellent => write!(f, "excellent"),
            Self::Good => write!(f, "good"),
            Self::Fair => write!(f, "fair"),
            Self::Poor => write!(f, "poor"),
            Self::NoMatch => write!(f, "no_match"),
        }
    }
}

/// Scores and ranks patterns against a signal
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    config: PatternConfig,
}

impl PatternMatcher {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Score one pattern regardless of activity or threshold.
    ///
    /// Fails only if a stored regex does not compile.
    pub fn score(&self, pattern: &ErrorPattern, signal: &Signal) -> Result<PatternMatch> {
        let compiled = CompiledPattern::compile(&pattern.fields)?;
        Ok(self.score_compiled(pattern, &compiled, signal))
    }

    /// Score one pattern with regexes compiled ahead of time
    pub fn score_compiled(
        &self,
        pattern: &ErrorPattern,
        compiled: &CompiledPattern,
        signal: &Signal,
    ) -> PatternMatch {
        let factors = MatchFactors {
            error_type: compiled.error_type_matches(signal),
            message: compiled.message_matches(signal),
            stack_trace: compiled.stack_trace_matches(signal),
            class_method: compiled.class_method_matches(signal),
        };

        let c = &self.config;
        let mut raw_score = 0.0;
        if factors.error_type {
            raw_score += c.error_type_weight;
        }
        if factors.message {
            raw_score += c.message_weight;
        }
        if factors.stack_trace {
            raw_score += c.stack_trace_weight;
        }
        if factors.class_method {
            raw_score += c.class_method_weight;
        }

        let raw_score = round_score(raw_score);
        PatternMatch {
            pattern: pattern.clone(),
            factors,
            raw_score,
            score: round_score(raw_score * pattern.confidence),
        }
    }

    /// Use the cached regexes when they match the pattern's current fields,
    /// otherwise compile on the spot and skip the pattern if that fails
    fn score_cached(
        &self,
        pattern: &ErrorPattern,
        compiled: &CompiledPatterns,
        signal: &Signal,
    ) -> Option<PatternMatch> {
        match compiled.get(&pattern.id) {
            Some(cached) if cached.is_compiled_from(&pattern.fields) => {
                Some(self.score_compiled(pattern, cached, signal))
            }
            _ => fail_open(&format!("score pattern {}", pattern.id), || {
                self.score(pattern, signal)
            }),
        }
    }

    /// Active patterns scoring at or above the threshold, in input order.
    ///
    /// A pattern whose regex fails to compile is skipped.
    pub fn candidates_at(
        &self,
        signal: &Signal,
        patterns: &[ErrorPattern],
        compiled: &CompiledPatterns,
        now: DateTime<Utc>,
    ) -> Vec<PatternMatch> {
        patterns
            .iter()
            .filter(|p| p.is_active_at(now, &self.config))
            .filter_map(|p| self.score_cached(p, compiled, signal))
            .filter(|m| m.score >= self.config.match_threshold)
            .collect()
    }

    /// Highest scoring candidate; ties go to the earliest in `patterns`
    pub fn find_matching_pattern(
        &self,
        signal: &Signal,
        patterns: &[ErrorPattern],
    ) -> Option<PatternMatch> {
        self.best_match(signal, patterns, &CompiledPatterns::new())
    }

    /// [`Self::find_matching_pattern`] reusing precompiled regexes
    pub fn best_match(
        &self,
        signal: &Signal,
        patterns: &[ErrorPattern],
        compiled: &CompiledPatterns,
    ) -> Option<PatternMatch> {
        let best = self
            .candidates_at(signal, patterns, compiled, Utc::now())
            .into_iter()
            .fold(None::<PatternMatch>, |best, candidate| match best {
                Some(current) if current.score >= candidate.score => Some(current),
                _ => Some(candidate),
            });

        if let Some(ref m) = best {
            debug!("Best match {} ({:.3})", m.pattern.name, m.score);
        }
        best
    }

    /// All candidates, best first (stable for equal scores)
    pub fn find_all_matching_patterns(
        &self,
        signal: &Signal,
        patterns: &[ErrorPattern],
    ) -> Vec<PatternMatch> {
        self.ranked_matches(signal, patterns, &CompiledPatterns::new())
    }

    /// [`Self::find_all_matching_patterns`] reusing precompiled regexes
    pub fn ranked_matches(
        &self,
        signal: &Signal,
        patterns: &[ErrorPattern],
        compiled: &CompiledPatterns,
    ) -> Vec<PatternMatch> {
        let mut matches = self.candidates_at(signal, patterns, compiled, Utc::now());
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches
    }

    /// Quality band of a single pattern's score against a signal
    pub fn evaluate_match_quality(&self, pattern: &ErrorPattern, signal: &Signal) -> MatchQuality {
        fail_open(&format!("evaluate pattern {}", pattern.id), || {
            self.score(pattern, signal)
        })
        .map(|m| MatchQuality::from_score(m.score))
        .unwrap_or(MatchQuality::NoMatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternFields;

    fn npe_pattern(confidence: f64) -> ErrorPattern {
        ErrorPattern::new(
            "null pointer",
            "runtime",
            PatternFields {
                error_type: Some("NullPointerException".to_string()),
                message: Some("user id is null".to_string()),
                stack_trace: Some(r"at com\.acme\.Users".to_string()),
                class_name: Some("UserService".to_string()),
                method_name: None,
            },
            confidence,
        )
    }

    fn npe_signal() -> Signal {
        Signal {
            error_type: Some("NullPointerException".to_string()),
            message: Some("something else".to_string()),
            stack_trace: Some("at org.other.Thing".to_string()),
            class_name: Some("OrderService".to_string()),
            method_name: Some("place".to_string()),
        }
    }

    #[test]
    fn test_worked_example_error_type_only() {
        let matcher = PatternMatcher::default();
        let pattern = npe_pattern(0.8);

        let m = matcher.score(&pattern, &npe_signal()).unwrap();
        assert!(m.factors.error_type);
        assert!(!m.factors.message && !m.factors.stack_trace && !m.factors.class_method);
        assert!((m.raw_score - 0.4).abs() < 1e-12);
        assert!((m.score - 0.32).abs() < 1e-12);

        let best = matcher
            .find_matching_pattern(&npe_signal(), &[pattern.clone()])
            .unwrap();
        assert_eq!(best.pattern.id, pattern.id);
    }

    #[test]
    fn test_all_factors() {
        let matcher = PatternMatcher::default();
        let signal = Signal {
            error_type: Some("java.lang.NullPointerException".to_string()),
            message: Some("user id is null".to_string()),
            stack_trace: Some("at com.acme.Users.load(Users.java:42)".to_string()),
            class_name: Some("com.acme.UserService".to_string()),
            method_name: None,
        };

        let m = matcher.score(&npe_pattern(1.0), &signal).unwrap();
        assert!((m.raw_score - 1.0).abs() < 1e-12);
        assert_eq!(
            matcher.evaluate_match_quality(&npe_pattern(1.0), &signal),
            MatchQuality::Excellent
        );
    }

    fn full_signal() -> Signal {
        Signal {
            error_type: Some("java.lang.NullPointerException".to_string()),
            message: Some("user id is null".to_string()),
            stack_trace: Some("at com.acme.Users.load(Users.java:42)".to_string()),
            class_name: Some("com.acme.UserService".to_string()),
            method_name: None,
        }
    }

    #[test]
    fn test_full_match_scores_exactly_confidence() {
        let matcher = PatternMatcher::default();

        let m = matcher.score(&npe_pattern(0.3), &full_signal()).unwrap();
        assert_eq!(m.raw_score, 1.0);
        assert_eq!(m.score, 0.3);
        assert!(matcher
            .find_matching_pattern(&full_signal(), &[npe_pattern(0.3)])
            .is_some());

        assert_eq!(
            matcher.evaluate_match_quality(&npe_pattern(0.9), &full_signal()),
            MatchQuality::Excellent
        );
        assert_eq!(
            matcher.evaluate_match_quality(&npe_pattern(0.5), &full_signal()),
            MatchQuality::Fair
        );
        assert_eq!(
            matcher.evaluate_match_quality(&npe_pattern(0.3), &full_signal()),
            MatchQuality::Poor
        );
    }

    #[test]
    fn test_partial_weight_sums_are_exact() {
        let matcher = PatternMatcher::default();
        let mut signal = full_signal();
        signal.stack_trace = None;
        signal.class_name = None;

        // 0.4 + 0.3
        let m = matcher.score(&npe_pattern(1.0), &signal).unwrap();
        assert_eq!(m.raw_score, 0.7);
        assert_eq!(MatchQuality::from_score(m.score), MatchQuality::Good);
    }

    #[test]
    fn test_cached_regexes_are_used_only_for_matching_fields() {
        let matcher = PatternMatcher::default();
        let pattern = npe_pattern(1.0);

        let mut compiled = CompiledPatterns::new();
        compiled.insert(pattern.id.clone(), Arc::new(pattern.compile().unwrap()));
        let cached = matcher.best_match(&full_signal(), &[pattern.clone()], &compiled);
        assert_eq!(cached.unwrap().raw_score, 1.0);

        // Fields edited after compilation: the stale entry is ignored.
        let mut edited = pattern.clone();
        edited.fields.message = Some("order total".to_string());
        let m = matcher
            .best_match(&full_signal(), &[edited], &compiled)
            .unwrap();
        assert!(!m.factors.message);
        assert_eq!(m.raw_score, 0.7);
    }

    #[test]
    fn test_score_never_exceeds_confidence() {
        let matcher = PatternMatcher::default();
        let signal = Signal {
            error_type: Some("NullPointerException".to_string()),
            message: Some("user id is null".to_string()),
            stack_trace: Some("at com.acme.Users".to_string()),
            class_name: Some("UserService".to_string()),
            method_name: None,
        };

        for confidence in [0.0, 0.1, 0.35, 0.5, 0.77, 1.0] {
            let m = matcher.score(&npe_pattern(confidence), &signal).unwrap();
            assert!(m.score >= 0.0);
            assert!(m.score <= confidence + 1e-12);
        }
    }

    #[test]
    fn test_below_threshold_is_discarded() {
        let matcher = PatternMatcher::default();
        // 0.4 * 0.7 = 0.28 < 0.3
        assert!(matcher
            .find_matching_pattern(&npe_signal(), &[npe_pattern(0.7)])
            .is_none());
    }

    #[test]
    fn test_inactive_patterns_are_filtered() {
        let matcher = PatternMatcher::default();
        let mut pattern = npe_pattern(1.0);
        pattern.active = false;
        assert!(matcher
            .find_all_matching_patterns(&npe_signal(), &[pattern])
            .is_empty());
    }

    #[test]
    fn test_tie_break_prefers_first() {
        let matcher = PatternMatcher::default();
        let first = npe_pattern(0.9);
        let second = npe_pattern(0.9);

        let best = matcher
            .find_matching_pattern(&npe_signal(), &[first.clone(), second])
            .unwrap();
        assert_eq!(best.pattern.id, first.id);
    }

    #[test]
    fn test_find_all_sorted_and_idempotent() {
        let matcher = PatternMatcher::default();
        let patterns = vec![npe_pattern(0.8), npe_pattern(1.0), npe_pattern(0.9)];

        let first = matcher.find_all_matching_patterns(&npe_signal(), &patterns);
        let second = matcher.find_all_matching_patterns(&npe_signal(), &patterns);

        assert_eq!(first.len(), 3);
        assert!(first.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(first[0].pattern.id, patterns[1].id);

        let scores: Vec<u64> = first.iter().map(|m| m.score.to_bits()).collect();
        let again: Vec<u64> = second.iter().map(|m| m.score.to_bits()).collect();
        assert_eq!(scores, again);
        // Read-only ranking leaves confidence untouched.
        assert_eq!(first[0].pattern.confidence, 1.0);
    }

    #[test]
    fn test_invalid_stored_regex_is_skipped() {
        let matcher = PatternMatcher::default();
        let mut broken = npe_pattern(1.0);
        broken.fields.error_type = Some("Null(Pointer".to_string());
        let good = npe_pattern(0.9);

        let all = matcher.find_all_matching_patterns(&npe_signal(), &[broken.clone(), good.clone()]);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].pattern.id, good.id);
        assert_eq!(
            matcher.evaluate_match_quality(&broken, &npe_signal()),
            MatchQuality::NoMatch
        );
    }

    #[test]
    fn test_quality_bands() {
        assert_eq!(MatchQuality::from_score(0.95), MatchQuality::Excellent);
        assert_eq!(MatchQuality::from_score(0.9), MatchQuality::Excellent);
        assert_eq!(MatchQuality::from_score(0.7), MatchQuality::Good);
        assert_eq!(MatchQuality::from_score(0.5), MatchQuality::Fair);
        assert_eq!(MatchQuality::from_score(0.3), MatchQuality::Poor);
        assert_eq!(MatchQuality::from_score(0.29), MatchQuality::NoMatch);
    }

    #[test]
    fn test_overridden_weights() {
        let config = PatternConfig {
            error_type_weight: 0.7,
            message_weight: 0.1,
            stack_trace_weight: 0.1,
            class_method_weight: 0.1,
            ..PatternConfig::default()
        };
        let matcher = PatternMatcher::new(config);
        let m = matcher.score(&npe_pattern(1.0), &npe_signal()).unwrap();
        assert!((m.score - 0.7).abs() < 1e-12);
    }
}
