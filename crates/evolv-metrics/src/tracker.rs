//! Recency-weighted effectiveness tracking for a single guideline

use chrono::{DateTime, Utc};
use evolv_core::{
    EffectivenessConfig, ExperienceRecord, GuidelineId, Measurement, OutcomeRecord, Result,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Direction of the most recent measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    /// Fewer measurements than the trend window
    Insufficient,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Improving => write!(f, "improving"),
            Self::Declining => write!(f, "declining"),
            Self::Stable => write!(f, "stable"),
            Self::Insufficient => write!(f, "insufficient"),
        }
    }
}

/// Read-only view of a tracker handed to collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectivenessSnapshot {
    pub guideline_id: GuidelineId,
    pub current_score: f64,
    pub needs_improvement: bool,
    pub measurement_count: usize,
    pub has_statistical_significance: bool,
    pub trend: Trend,
    pub last_measured: Option<DateTime<Utc>>,
}

/// Weight of the measurement at `index` in a sequence of `len`, before the
/// real-world multiplier. Later entries weigh more: `1 + index / len`.
pub fn recency_weight(index: usize, len: usize) -> f64 {
    if len == 0 {
        return 1.0;
    }
    1.0 + index as f64 / len as f64
}

/// Per-guideline score aggregator
///
/// `current_score` is always the weighted average of every measurement, or
/// the baseline while there are none, so it stays within the range of the
/// recorded scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectivenessTracker {
    pub guideline_id: GuidelineId,
    pub baseline_score: f64,
    measurements: Vec<Measurement>,
    current_score: f64,
    last_measured: Option<DateTime<Utc>>,
    #[serde(skip)]
    config: EffectivenessConfig,
}

impl EffectivenessTracker {
    pub fn new(
        guideline_id: impl Into<String>,
        baseline_score: f64,
        config: EffectivenessConfig,
    ) -> Self {
        Self {
            guideline_id: guideline_id.into(),
            baseline_score,
            measurements: Vec::new(),
            current_score: baseline_score,
            last_measured: None,
            config,
        }
    }

    /// Replace the scoring parameters (e.g. after loading from a store)
    pub fn with_config(mut self, config: EffectivenessConfig) -> Self {
        self.config = config;
        self.recompute();
        self
    }

    /// Record a score produced by an experience
    pub fn add_measurement(&mut self, score: f64, experience: &ExperienceRecord) -> Result<()> {
        let measurement = Measurement::from_experience(score, experience)?;
        self.record(measurement);
        Ok(())
    }

    /// Record a production outcome (weighted by the real-world multiplier)
    pub fn add_real_world_result(&mut self, outcome: &OutcomeRecord) -> Result<()> {
        let measurement = Measurement::from_outcome(outcome)?;
        self.record(measurement);
        Ok(())
    }

    /// Append an already validated measurement
    pub fn record(&mut self, measurement: Measurement) {
        self.last_measured = Some(measurement.timestamp);
        self.measurements.push(measurement);
        self.recompute();
        debug!(
            "Tracker {} now at {:.3} over {} measurements",
            self.guideline_id,
            self.current_score,
            self.measurements.len()
        );
    }

    fn recompute(&mut self) {
        let len = self.measurements.len();
        let (weighted_sum, weight_total) = self.measurements.iter().enumerate().fold(
            (0.0, 0.0),
            |(sum, total), (index, m)| {
                let mut weight = recency_weight(index, len);
                if m.is_real_world {
                    weight *= self.config.real_world_multiplier;
                }
                (sum + m.score * weight, total + weight)
            },
        );

        self.current_score = if weight_total > 0.0 {
            weighted_sum / weight_total
        } else {
            self.baseline_score
        };
    }

    pub fn current_score(&self) -> f64 {
        self.current_score
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn total_measurements(&self) -> usize {
        self.measurements.len()
    }

    pub fn last_measured(&self) -> Option<DateTime<Utc>> {
        self.last_measured
    }

    pub fn config(&self) -> &EffectivenessConfig {
        &self.config
    }

    /// Trend over the last `trend_window` measurements
    pub fn trend(&self) -> Trend {
        let window = self.config.trend_window;
        if window < 2 || self.measurements.len() < window {
            return Trend::Insufficient;
        }

        let recent = &self.measurements[self.measurements.len() - window..];
        let first = recent[0].score;
        let last = recent[window - 1].score;

        if first - last > self.config.trend_delta {
            Trend::Declining
        } else if last - first > self.config.trend_delta {
            Trend::Improving
        } else {
            Trend::Stable
        }
    }

    /// Low absolute score, or a decline across the trend window
    pub fn needs_improvement(&self) -> bool {
        self.current_score < self.config.improvement_threshold || self.trend() == Trend::Declining
    }

    pub fn has_statistical_significance(&self) -> bool {
        self.measurements.len() >= self.config.min_significant_samples
    }

    pub fn snapshot(&self) -> EffectivenessSnapshot {
        EffectivenessSnapshot {
            guideline_id: self.guideline_id.clone(),
            current_score: self.current_score,
            needs_improvement: self.needs_improvement(),
            measurement_count: self.measurements.len(),
            has_statistical_significance: self.has_statistical_significance(),
            trend: self.trend(),
            last_measured: self.last_measured,
        }
    }
}
