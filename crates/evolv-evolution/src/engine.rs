//! Evolution decisions for tracked guidelines

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evolv_core::{
    EvolutionConfig, EvolvError, EvolvedGuideline, Guideline, GuidelineId, Repository, Result,
};
use evolv_metrics::{EffectivenessTracker, TrackerRegistry, Trend};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::review::{EvolutionReview, ReviewItem};

/// Produces candidate content for a guideline that needs improvement.
///
/// How content is rewritten is up to the host; the engine only decides when
/// to ask and packages the answer.
#[async_trait]
pub trait EvolutionStrategy: Send + Sync {
    async fn evolve(
        &self,
        guideline: &Guideline,
        tracker: &EffectivenessTracker,
    ) -> Result<EvolvedGuideline>;
}

/// What an evaluation decided
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvolutionOutcome {
    /// A candidate was produced
    Improved {
        original: Guideline,
        evolved: EvolvedGuideline,
        before: f64,
        after: f64,
        improvement_rate: f64,
    },
    NoChangeNeeded { current_score: f64 },
    NotFound,
}

/// Timestamped evaluation result with a human-readable reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionResult {
    pub guideline_id: GuidelineId,
    pub outcome: EvolutionOutcome,
    /// Current effectiveness (0.0 when no tracker exists)
    pub effectiveness: f64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    /// A/B test started for the candidate, if any
    #[serde(default)]
    pub ab_test_id: Option<String>,
}

impl EvolutionResult {
    fn new(
        guideline_id: &str,
        outcome: EvolutionOutcome,
        effectiveness: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            guideline_id: guideline_id.to_string(),
            outcome,
            effectiveness,
            reason: reason.into(),
            timestamp: Utc::now(),
            ab_test_id: None,
        }
    }

    pub fn is_improved(&self) -> bool {
        matches!(self.outcome, EvolutionOutcome::Improved { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.outcome, EvolutionOutcome::NotFound)
    }

    pub fn improvement_rate(&self) -> Option<f64> {
        match self.outcome {
            EvolutionOutcome::Improved {
                improvement_rate, ..
            } => Some(improvement_rate),
            _ => None,
        }
    }
}

/// Decides when a guideline should evolve and packages candidates
pub struct EvolutionEngine {
    trackers: Arc<TrackerRegistry>,
    guidelines: Arc<dyn Repository<Guideline>>,
    strategy: Arc<dyn EvolutionStrategy>,
    config: EvolutionConfig,
}

impl EvolutionEngine {
    pub fn new(
        trackers: Arc<TrackerRegistry>,
        guidelines: Arc<dyn Repository<Guideline>>,
        strategy: Arc<dyn EvolutionStrategy>,
        config: EvolutionConfig,
    ) -> Self {
        Self {
            trackers,
            guidelines,
            strategy,
            config,
        }
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Evaluate whether a guideline needs a new candidate
    #[instrument(skip(self))]
    pub async fn evaluate(&self, guideline_id: &str) -> Result<EvolutionResult> {
        let Some(tracker) = self.trackers.get(guideline_id).await? else {
            return Ok(EvolutionResult::new(
                guideline_id,
                EvolutionOutcome::NotFound,
                0.0,
                "guideline tracker absent",
            ));
        };

        let current_score = tracker.current_score();
        if !tracker.needs_improvement() {
            return Ok(EvolutionResult::new(
                guideline_id,
                EvolutionOutcome::NoChangeNeeded { current_score },
                current_score,
                "guideline remains effective",
            ));
        }

        let Some(guideline) = self.guidelines.get(guideline_id).await? else {
            return Ok(EvolutionResult::new(
                guideline_id,
                EvolutionOutcome::NotFound,
                current_score,
                "guideline absent from store",
            ));
        };

        if !guideline.evolvable {
            return Ok(EvolutionResult::new(
                guideline_id,
                EvolutionOutcome::NoChangeNeeded { current_score },
                current_score,
                "guideline is not evolvable",
            ));
        }

        if self.config.require_significance && !tracker.has_statistical_significance() {
            debug!(
                "Deferring evolution of {}: {} measurements",
                guideline_id,
                tracker.total_measurements()
            );
            return Ok(EvolutionResult::new(
                guideline_id,
                EvolutionOutcome::NoChangeNeeded { current_score },
                current_score,
                format!(
                    "insufficient measurements ({} of {}) to justify evolution",
                    tracker.total_measurements(),
                    tracker.config().min_significant_samples
                ),
            ));
        }

        let reason = if tracker.trend() == Trend::Declining {
            "declining trend over recent measurements".to_string()
        } else {
            format!(
                "effectiveness {:.2} below threshold {:.2}",
                current_score,
                tracker.config().improvement_threshold
            )
        };

        let evolved = self.strategy.evolve(&guideline, &tracker).await?;
        check_candidate(&guideline, &evolved)?;

        let before = guideline.original_effectiveness;
        let after = evolved.effectiveness_score;
        let improvement_rate = after - before;
        info!(
            "Proposed evolution {} for {} ({:.2} -> {:.2}): {}",
            evolved.id, guideline_id, before, after, reason
        );

        Ok(EvolutionResult::new(
            guideline_id,
            EvolutionOutcome::Improved {
                original: guideline,
                evolved,
                before,
                after,
                improvement_rate,
            },
            current_score,
            reason,
        ))
    }

    /// Older than the configured age, regardless of effectiveness
    pub fn is_outdated(&self, guideline: &Guideline) -> bool {
        guideline.is_outdated_at(Utc::now(), self.config.outdated_after_days)
    }

    /// Heuristic substring match of a domain against category or content
    pub fn is_applicable_to(&self, guideline: &Guideline, domain: &str) -> bool {
        guideline.is_applicable_to(domain)
    }

    /// Guidelines in the store that are due for an evolution review
    pub async fn review_queue(&self) -> Result<Vec<ReviewItem>> {
        let guidelines = self.guidelines.list().await?;
        EvolutionReview::new(self.config)
            .collect_due(&guidelines, &self.trackers, Utc::now())
            .await
    }
}

fn check_candidate(guideline: &Guideline, evolved: &EvolvedGuideline) -> Result<()> {
    if evolved.guideline_id != guideline.id {
        return Err(EvolvError::Strategy(format!(
            "candidate {} targets {} instead of {}",
            evolved.id, evolved.guideline_id, guideline.id
        )));
    }
    let score = evolved.effectiveness_score;
    if !(score.is_finite() && (0.0..=1.0).contains(&score)) {
        return Err(EvolvError::Strategy(format!(
            "candidate {} has effectiveness {} outside [0, 1]",
            evolved.id, score
        )));
    }
    Ok(())
}
