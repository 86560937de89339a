//! Review queue for guidelines due for evolution

use chrono::{DateTime, Utc};
use evolv_core::{EvolutionConfig, Guideline, GuidelineId, Result};
use evolv_metrics::{EffectivenessTracker, TrackerRegistry, Trend};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Why a guideline was queued for review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ReviewReason {
    /// Not updated within the configured age
    Outdated { age_days: i64 },
    /// Current score below the improvement threshold
    Ineffective { current_score: f64 },
    /// Recent measurements are falling
    DecliningTrend,
}

/// A guideline with every reason it is due
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub guideline_id: GuidelineId,
    pub reasons: Vec<ReviewReason>,
}

/// Collects evolvable guidelines that should be looked at again
pub struct EvolutionReview {
    config: EvolutionConfig,
}

impl EvolutionReview {
    pub fn new(config: EvolutionConfig) -> Self {
        Self { config }
    }

    /// Reasons one guideline is due; empty when it is fine or not evolvable
    pub fn review(
        &self,
        guideline: &Guideline,
        tracker: Option<&EffectivenessTracker>,
        now: DateTime<Utc>,
    ) -> Vec<ReviewReason> {
        let mut reasons = Vec::new();
        if !guideline.evolvable {
            return reasons;
        }

        if guideline.is_outdated_at(now, self.config.outdated_after_days) {
            reasons.push(ReviewReason::Outdated {
                age_days: guideline.age_days_at(now),
            });
        }

        if let Some(tracker) = tracker {
            let current_score = tracker.current_score();
            if current_score < tracker.config().improvement_threshold {
                reasons.push(ReviewReason::Ineffective { current_score });
            }
            if tracker.trend() == Trend::Declining {
                reasons.push(ReviewReason::DecliningTrend);
            }
        }

        reasons
    }

    /// Review every guideline, most reasons first, then by id
    pub async fn collect_due(
        &self,
        guidelines: &[Guideline],
        trackers: &TrackerRegistry,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReviewItem>> {
        let mut due = Vec::new();
        for guideline in guidelines {
            let tracker = trackers.get(&guideline.id).await?;
            let reasons = self.review(guideline, tracker.as_ref(), now);
            if !reasons.is_empty() {
                due.push(ReviewItem {
                    guideline_id: guideline.id.clone(),
                    reasons,
                });
            }
        }

        due.sort_by(|a, b| {
            b.reasons
                .len()
                .cmp(&a.reasons.len())
                .then_with(|| a.guideline_id.cmp(&b.guideline_id))
        });

        if !due.is_empty() {
            info!("{} guidelines due for review", due.len());
        }
        Ok(due)
    }
}

impl Default for EvolutionReview {
    fn default() -> Self {
        Self::new(EvolutionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use evolv_core::{EffectivenessConfig, ExperienceRecord};

    fn experience(i: usize, guideline_id: &str, score: f64) -> ExperienceRecord {
        ExperienceRecord {
            id: format!("exp-{}", i),
            guideline_id: guideline_id.to_string(),
            success_rate: score,
            time_efficiency: 0.5,
            code_quality_score: 0.5,
            project_size: "medium".to_string(),
            complexity: "medium".to_string(),
        }
    }

    fn tracker(scores: &[f64]) -> EffectivenessTracker {
        let mut tracker = EffectivenessTracker::new("g-1", 0.5, EffectivenessConfig::default());
        for (i, score) in scores.iter().enumerate() {
            tracker
                .add_measurement(*score, &experience(i, "g-1", *score))
                .unwrap();
        }
        tracker
    }

    #[test]
    fn test_healthy_guideline_is_not_due() {
        let review = EvolutionReview::default();
        let guideline = Guideline::new("g-1", "testing", "Write tests", 0.8);
        let reasons = review.review(&guideline, Some(&tracker(&[0.9, 0.9, 0.9])), Utc::now());
        assert!(reasons.is_empty());
    }

    #[test]
    fn test_collects_every_reason() {
        let review = EvolutionReview::default();
        let now = Utc::now();
        let mut guideline = Guideline::new("g-1", "testing", "Write tests", 0.8);
        guideline.last_updated = now - Duration::days(181);

        let reasons = review.review(&guideline, Some(&tracker(&[0.7, 0.5, 0.3])), now);
        assert_eq!(reasons.len(), 3);
        assert_eq!(reasons[0], ReviewReason::Outdated { age_days: 181 });
        assert!(matches!(reasons[1], ReviewReason::Ineffective { .. }));
        assert_eq!(reasons[2], ReviewReason::DecliningTrend);
    }

    #[test]
    fn test_non_evolvable_is_skipped() {
        let review = EvolutionReview::default();
        let mut guideline = Guideline::new("g-1", "testing", "Write tests", 0.8);
        guideline.evolvable = false;
        assert!(review
            .review(&guideline, Some(&tracker(&[0.1])), Utc::now())
            .is_empty());
    }

    #[tokio::test]
    async fn test_collect_due_ordering() {
        let registry = TrackerRegistry::default();
        let now = Utc::now();

        let mut stale = Guideline::new("b-stale", "docs", "Keep docs current", 0.7);
        stale.last_updated = now - Duration::days(365);
        let weak = Guideline::new("a-weak", "testing", "Mock everything", 0.7);
        let healthy = Guideline::new("c-ok", "testing", "Write tests", 0.7);

        registry
            .record_experience(&experience(0, "b-stale", 0.2))
            .await
            .unwrap();
        registry
            .record_experience(&experience(1, "a-weak", 0.2))
            .await
            .unwrap();
        registry
            .record_experience(&experience(2, "c-ok", 0.9))
            .await
            .unwrap();

        let due = EvolutionReview::default()
            .collect_due(&[healthy, weak, stale], &registry, now)
            .await
            .unwrap();

        let ids: Vec<_> = due.iter().map(|item| item.guideline_id.as_str()).collect();
        assert_eq!(ids, vec!["b-stale", "a-weak"]);
        assert_eq!(due[0].reasons.len(), 2);
    }
}
