//! Learned error patterns

use chrono::{DateTime, Duration, Utc};
use evolv_core::{EvolvError, PatternConfig, Result, Signal};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Regex-style fields describing a class of problem signals.
///
/// Empty strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternFields {
    pub error_type: Option<String>,
    pub message: Option<String>,
    pub stack_trace: Option<String>,
    pub class_name: Option<String>,
    pub method_name: Option<String>,
}

impl PatternFields {
    fn normalized(self) -> Self {
        Self {
            error_type: non_empty(self.error_type),
            message: non_empty(self.message),
            stack_trace: non_empty(self.stack_trace),
            class_name: non_empty(self.class_name),
            method_name: non_empty(self.method_name),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.error_type.is_none()
            && self.message.is_none()
            && self.stack_trace.is_none()
            && self.class_name.is_none()
            && self.method_name.is_none()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// A learned problem signature with self-adjusting confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(flatten)]
    pub fields: PatternFields,
    /// Reliability of the pattern (0.0 to 1.0)
    pub confidence: f64,
    pub occurrence_count: u64,
    pub first_occurrence: DateTime<Utc>,
    pub last_occurrence: DateTime<Utc>,
    pub active: bool,
}

impl ErrorPattern {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        fields: PatternFields,
        confidence: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            category: category.into(),
            fields: fields.normalized(),
            confidence,
            occurrence_count: 0,
            first_occurrence: now,
            last_occurrence: now,
            active: true,
        }
    }

    /// Active flag set, confidence high enough, and seen recently
    pub fn is_active_at(&self, now: DateTime<Utc>, config: &PatternConfig) -> bool {
        self.active
            && self.confidence >= config.min_active_confidence
            && now - self.last_occurrence <= Duration::days(config.active_window_days)
    }

    pub fn is_active(&self, config: &PatternConfig) -> bool {
        self.is_active_at(Utc::now(), config)
    }

    /// Successful match: raise confidence and count the occurrence
    pub fn record_match(&mut self, config: &PatternConfig, now: DateTime<Utc>) {
        self.confidence = (self.confidence + config.success_boost).min(1.0);
        self.occurrence_count += 1;
        self.last_occurrence = now;
    }

    /// Caller reported the match was wrong: lower confidence
    pub fn record_failed_match(&mut self, config: &PatternConfig) {
        self.confidence = (self.confidence - config.failure_penalty).max(0.0);
    }

    /// Check the pattern can be stored and matched
    pub fn validate(&self) -> Result<()> {
        self.compile().map(|_| ())
    }

    /// Validate the pattern and compile its regexes
    pub fn compile(&self) -> Result<CompiledPattern> {
        if self.id.trim().is_empty() {
            return Err(EvolvError::validation("pattern id must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(EvolvError::validation("pattern name must not be empty"));
        }
        if !(self.confidence.is_finite() && (0.0..=1.0).contains(&self.confidence)) {
            return Err(EvolvError::validation(format!(
                "pattern confidence must be within [0, 1], got {}",
                self.confidence
            )));
        }
        CompiledPattern::compile(&self.fields)
    }
}

/// Compiled regexes for one pattern's fields
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: PatternFields,
    error_type: Option<Regex>,
    message: Option<Regex>,
    stack_trace: Option<Regex>,
    class_name: Option<Regex>,
    method_name: Option<Regex>,
}

impl CompiledPattern {
    pub fn compile(fields: &PatternFields) -> Result<Self> {
        Ok(Self {
            source: fields.clone(),
            error_type: compile_field("error_type", &fields.error_type)?,
            message: compile_field("message", &fields.message)?,
            stack_trace: compile_field("stack_trace", &fields.stack_trace)?,
            class_name: compile_field("class_name", &fields.class_name)?,
            method_name: compile_field("method_name", &fields.method_name)?,
        })
    }

    /// Whether these regexes were built from `fields`
    pub fn is_compiled_from(&self, fields: &PatternFields) -> bool {
        self.source == *fields
    }

    pub fn error_type_matches(&self, signal: &Signal) -> bool {
        field_matches(&self.error_type, &signal.error_type)
    }

    pub fn message_matches(&self, signal: &Signal) -> bool {
        field_matches(&self.message, &signal.message)
    }

    pub fn stack_trace_matches(&self, signal: &Signal) -> bool {
        field_matches(&self.stack_trace, &signal.stack_trace)
    }

    /// Every configured class/method regex matches (at least one configured)
    pub fn class_method_matches(&self, signal: &Signal) -> bool {
        if self.class_name.is_none() && self.method_name.is_none() {
            return false;
        }
        let class_ok =
            self.class_name.is_none() || field_matches(&self.class_name, &signal.class_name);
        let method_ok =
            self.method_name.is_none() || field_matches(&self.method_name, &signal.method_name);
        class_ok && method_ok
    }
}

fn compile_field(name: &str, source: &Option<String>) -> Result<Option<Regex>> {
    source
        .as_deref()
        .map(|pattern| {
            Regex::new(pattern)
                .map_err(|e| EvolvError::InvalidPattern(format!("field '{}': {}", name, e)))
        })
        .transpose()
}

fn field_matches(regex: &Option<Regex>, value: &Option<String>) -> bool {
    match (regex, value) {
        (Some(regex), Some(value)) => regex.is_match(value),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(error_type: &str) -> PatternFields {
        PatternFields {
            error_type: Some(error_type.to_string()),
            ..PatternFields::default()
        }
    }

    #[test]
    fn test_empty_fields_are_absent() {
        let pattern = ErrorPattern::new(
            "npe",
            "runtime",
            PatternFields {
                error_type: Some("NullPointerException".to_string()),
                message: Some("  ".to_string()),
                ..PatternFields::default()
            },
            0.8,
        );
        assert!(pattern.fields.message.is_none());
        assert!(!pattern.fields.is_empty());
    }

    #[test]
    fn test_activity_rules() {
        let config = PatternConfig::default();
        let now = Utc::now();
        let mut pattern = ErrorPattern::new("npe", "runtime", fields("NPE"), 0.8);
        assert!(pattern.is_active_at(now, &config));

        pattern.confidence = 0.29;
        assert!(!pattern.is_active_at(now, &config));

        pattern.confidence = 0.3;
        assert!(pattern.is_active_at(now, &config));

        pattern.last_occurrence = now - Duration::days(31);
        assert!(!pattern.is_active_at(now, &config));

        pattern.last_occurrence = now;
        pattern.active = false;
        assert!(!pattern.is_active_at(now, &config));
    }

    #[test]
    fn test_confidence_nudges_are_bounded() {
        let config = PatternConfig::default();
        let mut pattern = ErrorPattern::new("npe", "runtime", fields("NPE"), 0.98);

        pattern.record_match(&config, Utc::now());
        assert_eq!(pattern.confidence, 1.0);
        assert_eq!(pattern.occurrence_count, 1);

        pattern.confidence = 0.01;
        pattern.record_failed_match(&config);
        assert_eq!(pattern.confidence, 0.0);
    }

    #[test]
    fn test_validate_rejects_bad_regex() {
        let pattern = ErrorPattern::new("broken", "runtime", fields("Null(Pointer"), 0.8);
        assert!(matches!(
            pattern.validate(),
            Err(EvolvError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_confidence_and_name() {
        let pattern = ErrorPattern::new("npe", "runtime", fields("NPE"), 1.2);
        assert!(matches!(pattern.validate(), Err(EvolvError::Validation(_))));

        let pattern = ErrorPattern::new("", "runtime", fields("NPE"), 0.5);
        assert!(pattern.validate().is_err());
    }

    #[test]
    fn test_compiled_form_tracks_its_fields() {
        let pattern = ErrorPattern::new("npe", "runtime", fields("NPE"), 0.8);
        let compiled = pattern.compile().unwrap();
        assert!(compiled.is_compiled_from(&pattern.fields));
        assert!(!compiled.is_compiled_from(&fields("Timeout")));
    }

    #[test]
    fn test_class_method_requires_all_configured() {
        let compiled = CompiledPattern::compile(&PatternFields {
            class_name: Some("UserService".to_string()),
            method_name: Some("^load".to_string()),
            ..PatternFields::default()
        })
        .unwrap();

        let mut signal = Signal {
            class_name: Some("com.acme.UserService".to_string()),
            method_name: Some("loadUser".to_string()),
            ..Signal::default()
        };
        assert!(compiled.class_method_matches(&signal));

        signal.method_name = Some("saveUser".to_string());
        assert!(!compiled.class_method_matches(&signal));

        let unset = CompiledPattern::compile(&PatternFields::default()).unwrap();
        assert!(!unset.class_method_matches(&signal));
    }
}
