//! Configuration management for Evolv
//!
//! Every scoring weight and threshold used by the engine is a named default
//! here and can be overridden from `.evolv/config.toml` without code changes.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{EvolvError, Result};

/// Score below which a guideline needs improvement
pub const DEFAULT_IMPROVEMENT_THRESHOLD: f64 = 0.6;
/// Drop across the trend window that counts as a decline
pub const DEFAULT_TREND_DELTA: f64 = 0.1;
/// Number of most recent measurements inspected for a trend
pub const DEFAULT_TREND_WINDOW: usize = 3;
/// Extra weight applied to real-world (production) measurements
pub const DEFAULT_REAL_WORLD_MULTIPLIER: f64 = 1.5;
/// Measurements needed before a tracker is statistically meaningful
pub const DEFAULT_MIN_SIGNIFICANT_SAMPLES: usize = 5;
/// Baseline for trackers created before their guideline was registered
pub const DEFAULT_BASELINE_SCORE: f64 = 0.5;

pub const DEFAULT_ERROR_TYPE_WEIGHT: f64 = 0.4;
pub const DEFAULT_MESSAGE_WEIGHT: f64 = 0.3;
pub const DEFAULT_STACK_TRACE_WEIGHT: f64 = 0.2;
pub const DEFAULT_CLASS_METHOD_WEIGHT: f64 = 0.1;
/// Minimum final score for a pattern to count as a match
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.3;
pub const DEFAULT_SUCCESS_BOOST: f64 = 0.05;
pub const DEFAULT_FAILURE_PENALTY: f64 = 0.02;
/// Patterns below this confidence are inactive
pub const DEFAULT_MIN_ACTIVE_CONFIDENCE: f64 = 0.3;
/// Patterns unseen for longer than this are inactive
pub const DEFAULT_ACTIVE_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_INITIAL_CONFIDENCE: f64 = 0.5;

/// Guidelines untouched for longer than this are outdated
pub const DEFAULT_OUTDATED_AFTER_DAYS: i64 = 180;

/// Score at or above which an A/B measurement counts as a success
pub const DEFAULT_SUCCESS_THRESHOLD: f64 = 0.5;
/// Confidence level (1 - p) required for significance
pub const DEFAULT_SIGNIFICANCE_LEVEL: f64 = 0.95;
pub const DEFAULT_REQUIRED_SAMPLE_SIZE: usize = 30;

/// Engine-wide configuration
///
/// Loaded from `.evolv/config.toml` in the host's root directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Effectiveness tracking
    #[serde(default)]
    pub effectiveness: EffectivenessConfig,

    /// Pattern matching
    #[serde(default)]
    pub patterns: PatternConfig,

    /// Evolution decisions
    #[serde(default)]
    pub evolution: EvolutionConfig,

    /// A/B testing
    #[serde(default)]
    pub ab_test: AbTestConfig,
}

/// Recency-weighted effectiveness scoring parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectivenessConfig {
    #[serde(default = "default_improvement_threshold")]
    pub improvement_threshold: f64,

    #[serde(default = "default_trend_delta")]
    pub trend_delta: f64,

    #[serde(default = "default_trend_window")]
    pub trend_window: usize,

    #[serde(default = "default_real_world_multiplier")]
    pub real_world_multiplier: f64,

    #[serde(default = "default_min_significant_samples")]
    pub min_significant_samples: usize,

    #[serde(default = "default_baseline_score")]
    pub default_baseline: f64,
}

/// Pattern scoring and confidence adjustment parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    #[serde(default = "default_error_type_weight")]
    pub error_type_weight: f64,

    #[serde(default = "default_message_weight")]
    pub message_weight: f64,

    #[serde(default = "default_stack_trace_weight")]
    pub stack_trace_weight: f64,

    #[serde(default = "default_class_method_weight")]
    pub class_method_weight: f64,

    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    #[serde(default = "default_success_boost")]
    pub success_boost: f64,

    #[serde(default = "default_failure_penalty")]
    pub failure_penalty: f64,

    #[serde(default = "default_min_active_confidence")]
    pub min_active_confidence: f64,

    #[serde(default = "default_active_window_days")]
    pub active_window_days: i64,

    #[serde(default = "default_initial_confidence")]
    pub initial_confidence: f64,
}

/// Evolution decision parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvolutionConfig {
    #[serde(default = "default_outdated_after_days")]
    pub outdated_after_days: i64,

    /// Refuse to evolve on trackers with too few measurements
    #[serde(default = "default_true")]
    pub require_significance: bool,
}

/// A/B test parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbTestConfig {
    #[serde(default = "default_success_threshold")]
    pub success_threshold: f64,

    #[serde(default = "default_significance_level")]
    pub significance_level: f64,

    #[serde(default = "default_required_sample_size")]
    pub required_sample_size: usize,

    /// Finish a test as soon as its sample size is reached
    #[serde(default)]
    pub auto_finalize: bool,

    /// Start a test whenever an evaluation produces a candidate
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

// Default value providers
fn default_improvement_threshold() -> f64 {
    DEFAULT_IMPROVEMENT_THRESHOLD
}

fn default_trend_delta() -> f64 {
    DEFAULT_TREND_DELTA
}

fn default_trend_window() -> usize {
    DEFAULT_TREND_WINDOW
}

fn default_real_world_multiplier() -> f64 {
    DEFAULT_REAL_WORLD_MULTIPLIER
}

fn default_min_significant_samples() -> usize {
    DEFAULT_MIN_SIGNIFICANT_SAMPLES
}

fn default_baseline_score() -> f64 {
    DEFAULT_BASELINE_SCORE
}

fn default_error_type_weight() -> f64 {
    DEFAULT_ERROR_TYPE_WEIGHT
}

fn default_message_weight() -> f64 {
    DEFAULT_MESSAGE_WEIGHT
}

fn default_stack_trace_weight() -> f64 {
    DEFAULT_STACK_TRACE_WEIGHT
}

fn default_class_method_weight() -> f64 {
    DEFAULT_CLASS_METHOD_WEIGHT
}

fn default_match_threshold() -> f64 {
    DEFAULT_MATCH_THRESHOLD
}

fn default_success_boost() -> f64 {
    DEFAULT_SUCCESS_BOOST
}

fn default_failure_penalty() -> f64 {
    DEFAULT_FAILURE_PENALTY
}

fn default_min_active_confidence() -> f64 {
    DEFAULT_MIN_ACTIVE_CONFIDENCE
}

fn default_active_window_days() -> i64 {
    DEFAULT_ACTIVE_WINDOW_DAYS
}

fn default_initial_confidence() -> f64 {
    DEFAULT_INITIAL_CONFIDENCE
}

fn default_outdated_after_days() -> i64 {
    DEFAULT_OUTDATED_AFTER_DAYS
}

fn default_success_threshold() -> f64 {
    DEFAULT_SUCCESS_THRESHOLD
}

fn default_significance_level() -> f64 {
    DEFAULT_SIGNIFICANCE_LEVEL
}

fn default_required_sample_size() -> usize {
    DEFAULT_REQUIRED_SAMPLE_SIZE
}

fn default_true() -> bool {
    true
}

impl EngineConfig {
    /// Load configuration from `.evolv/config.toml` or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(".evolv/config.toml");

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml_str(&content)?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| EvolvError::Configuration(format!("Failed to parse config file: {}", e)))
    }

    /// Write default configuration to `.evolv/config.toml`
    pub fn write_default(root: &Path) -> Result<()> {
        let config_dir = root.join(".evolv");
        std::fs::create_dir_all(&config_dir)?;

        let content = toml::to_string_pretty(&Self::default()).map_err(|e| {
            EvolvError::Configuration(format!("Failed to serialize config: {}", e))
        })?;
        std::fs::write(config_dir.join("config.toml"), content)?;
        Ok(())
    }

    /// Reject tuning values the scoring formulas cannot work with
    pub fn validate(&self) -> Result<()> {
        let e = &self.effectiveness;
        check_unit("effectiveness.improvement_threshold", e.improvement_threshold)?;
        check_unit("effectiveness.trend_delta", e.trend_delta)?;
        check_unit("effectiveness.default_baseline", e.default_baseline)?;
        if e.trend_window < 2 {
            return Err(EvolvError::Configuration(
                "effectiveness.trend_window must be at least 2".to_string(),
            ));
        }
        if e.real_world_multiplier.is_nan() || e.real_world_multiplier < 1.0 {
            return Err(EvolvError::Configuration(
                "effectiveness.real_world_multiplier must be >= 1.0".to_string(),
            ));
        }

        let p = &self.patterns;
        check_unit("patterns.error_type_weight", p.error_type_weight)?;
        check_unit("patterns.message_weight", p.message_weight)?;
        check_unit("patterns.stack_trace_weight", p.stack_trace_weight)?;
        check_unit("patterns.class_method_weight", p.class_method_weight)?;
        let weight_sum =
            p.error_type_weight + p.message_weight + p.stack_trace_weight + p.class_method_weight;
        if weight_sum > 1.0 + 1e-9 {
            return Err(EvolvError::Configuration(format!(
                "pattern factor weights sum to {:.3}, must not exceed 1.0",
                weight_sum
            )));
        }
        check_unit("patterns.match_threshold", p.match_threshold)?;
        check_unit("patterns.success_boost", p.success_boost)?;
        check_unit("patterns.failure_penalty", p.failure_penalty)?;
        check_unit("patterns.min_active_confidence", p.min_active_confidence)?;
        check_unit("patterns.initial_confidence", p.initial_confidence)?;
        if p.active_window_days <= 0 {
            return Err(EvolvError::Configuration(
                "patterns.active_window_days must be positive".to_string(),
            ));
        }

        if self.evolution.outdated_after_days <= 0 {
            return Err(EvolvError::Configuration(
                "evolution.outdated_after_days must be positive".to_string(),
            ));
        }

        let a = &self.ab_test;
        check_unit("ab_test.success_threshold", a.success_threshold)?;
        check_unit("ab_test.significance_level", a.significance_level)?;
        if a.required_sample_size == 0 {
            return Err(EvolvError::Configuration(
                "ab_test.required_sample_size must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EvolvError::Configuration(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}

impl Default for EffectivenessConfig {
    fn default() -> Self {
        Self {
            improvement_threshold: default_improvement_threshold(),
            trend_delta: default_trend_delta(),
            trend_window: default_trend_window(),
            real_world_multiplier: default_real_world_multiplier(),
            min_significant_samples: default_min_significant_samples(),
            default_baseline: default_baseline_score(),
        }
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            error_type_weight: default_error_type_weight(),
            message_weight: default_message_weight(),
            stack_trace_weight: default_stack_trace_weight(),
            class_method_weight: default_class_method_weight(),
            match_threshold: default_match_threshold(),
            success_boost: default_success_boost(),
            failure_penalty: default_failure_penalty(),
            min_active_confidence: default_min_active_confidence(),
            active_window_days: default_active_window_days(),
            initial_confidence: default_initial_confidence(),
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            outdated_after_days: default_outdated_after_days(),
            require_significance: true,
        }
    }
}

impl Default for AbTestConfig {
    fn default() -> Self {
        Self {
            success_threshold: default_success_threshold(),
            significance_level: default_significance_level(),
            required_sample_size: default_required_sample_size(),
            auto_finalize: false,
            auto_start: true,
        }
    }
}
