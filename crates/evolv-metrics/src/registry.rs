//! Repository-backed registry of effectiveness trackers

use evolv_core::{
    EffectivenessConfig, EvolvError, ExperienceRecord, Guideline, InMemoryRepository, KeyedLocks,
    Measurement, OutcomeRecord, Repository, Result,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::tracker::{EffectivenessSnapshot, EffectivenessTracker};

/// Owns every guideline's tracker
///
/// Writes to one guideline are serialized through a per-id lock; readers
/// load from the repository directly and may observe a slightly stale
/// snapshot. Trackers are never removed, so the lock arena holds one slot
/// per guideline that has been written to.
pub struct TrackerRegistry {
    repository: Arc<dyn Repository<EffectivenessTracker>>,
    locks: KeyedLocks,
    config: EffectivenessConfig,
}

impl TrackerRegistry {
    /// Registry backed by an in-memory repository
    pub fn new(config: EffectivenessConfig) -> Self {
        Self::with_repository(Arc::new(InMemoryRepository::new()), config)
    }

    pub fn with_repository(
        repository: Arc<dyn Repository<EffectivenessTracker>>,
        config: EffectivenessConfig,
    ) -> Self {
        Self {
            repository,
            locks: KeyedLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> &EffectivenessConfig {
        &self.config
    }

    /// Create a tracker seeded with the guideline's original effectiveness.
    ///
    /// An existing tracker is returned unchanged.
    #[instrument(skip(self, guideline), fields(guideline = %guideline.id))]
    pub async fn register_guideline(&self, guideline: &Guideline) -> Result<EffectivenessTracker> {
        check_id(&guideline.id)?;
        evolv_core::validate_score(guideline.original_effectiveness)?;

        let _guard = self.locks.lock(&guideline.id).await;
        if let Some(existing) = self.load(&guideline.id).await? {
            return Ok(existing);
        }

        let tracker = EffectivenessTracker::new(
            guideline.id.clone(),
            guideline.original_effectiveness,
            self.config,
        );
        self.repository.put(&guideline.id, tracker.clone()).await?;
        info!(
            "Registered tracker for {} (baseline {:.2})",
            guideline.id, guideline.original_effectiveness
        );
        Ok(tracker)
    }

    /// Record a measurement for a guideline, creating its tracker on first use
    pub async fn add_measurement(
        &self,
        guideline_id: &str,
        score: f64,
        experience: &ExperienceRecord,
    ) -> Result<EffectivenessSnapshot> {
        check_id(guideline_id)?;
        let measurement = Measurement::from_experience(score, experience)?;
        self.append(guideline_id, measurement).await
    }

    /// Record an experience using its success rate as the score
    pub async fn record_experience(
        &self,
        experience: &ExperienceRecord,
    ) -> Result<EffectivenessSnapshot> {
        self.add_measurement(&experience.guideline_id, experience.success_rate, experience)
            .await
    }

    /// Record a production outcome for a guideline
    pub async fn add_real_world_result(
        &self,
        guideline_id: &str,
        outcome: &OutcomeRecord,
    ) -> Result<EffectivenessSnapshot> {
        check_id(guideline_id)?;
        let measurement = Measurement::from_outcome(outcome)?;
        self.append(guideline_id, measurement).await
    }

    #[instrument(skip(self, measurement))]
    async fn append(
        &self,
        guideline_id: &str,
        measurement: Measurement,
    ) -> Result<EffectivenessSnapshot> {
        let _guard = self.locks.lock(guideline_id).await;

        let mut tracker = match self.load(guideline_id).await? {
            Some(tracker) => tracker,
            None => {
                info!("Creating tracker for {} on first measurement", guideline_id);
                EffectivenessTracker::new(guideline_id, self.config.default_baseline, self.config)
            }
        };

        tracker.record(measurement);
        let snapshot = tracker.snapshot();
        self.repository.put(guideline_id, tracker).await?;

        debug!(
            "Guideline {} effectiveness {:.3} (needs improvement: {})",
            guideline_id, snapshot.current_score, snapshot.needs_improvement
        );
        Ok(snapshot)
    }

    async fn load(&self, guideline_id: &str) -> Result<Option<EffectivenessTracker>> {
        Ok(self
            .repository
            .get(guideline_id)
            .await?
            .map(|tracker| tracker.with_config(self.config)))
    }

    /// Full tracker for a guideline
    pub async fn get(&self, guideline_id: &str) -> Result<Option<EffectivenessTracker>> {
        self.load(guideline_id).await
    }

    /// Current score and improvement flag for a guideline
    pub async fn effectiveness(&self, guideline_id: &str) -> Result<Option<EffectivenessSnapshot>> {
        Ok(self.load(guideline_id).await?.map(|t| t.snapshot()))
    }

    /// Snapshots of all trackers, sorted by guideline id
    pub async fn snapshots(&self) -> Result<Vec<EffectivenessSnapshot>> {
        let mut snapshots: Vec<EffectivenessSnapshot> = self
            .repository
            .list()
            .await?
            .into_iter()
            .map(|t| t.with_config(self.config).snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.guideline_id.cmp(&b.guideline_id));
        Ok(snapshots)
    }

    /// Snapshots of guidelines currently needing improvement
    pub async fn needing_improvement(&self) -> Result<Vec<EffectivenessSnapshot>> {
        Ok(self
            .snapshots()
            .await?
            .into_iter()
            .filter(|s| s.needs_improvement)
            .collect())
    }
}

impl Default for TrackerRegistry {
    fn default() -> Self {
        Self::new(EffectivenessConfig::default())
    }
}

fn check_id(guideline_id: &str) -> Result<()> {
    if guideline_id.trim().is_empty() {
        return Err(EvolvError::validation("guideline id must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use evolv_core::OutcomeCategory;

    fn experience(id: &str, guideline_id: &str, success_rate: f64) -> ExperienceRecord {
        ExperienceRecord {
            id: id.to_string(),
            guideline_id: guideline_id.to_string(),
            success_rate,
            time_efficiency: 0.6,
            code_quality_score: 0.7,
            project_size: "medium".to_string(),
            complexity: "medium".to_string(),
        }
    }

    #[tokio::test]
    async fn test_lazy_creation_on_first_measurement() {
        let registry = TrackerRegistry::default();
        assert!(registry.get("g-1").await.unwrap().is_none());

        let snapshot = registry
            .record_experience(&experience("exp-1", "g-1", 0.8))
            .await
            .unwrap();

        assert_eq!(snapshot.measurement_count, 1);
        assert_eq!(snapshot.current_score, 0.8);
        assert!(registry.get("g-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_register_guideline_seeds_baseline() {
        let registry = TrackerRegistry::default();
        let guideline = Guideline::new("g-2", "testing", "Test the edges", 0.85);

        let tracker = registry.register_guideline(&guideline).await.unwrap();
        assert_eq!(tracker.current_score(), 0.85);

        // Second registration keeps existing measurements.
        registry
            .record_experience(&experience("exp-1", "g-2", 0.4))
            .await
            .unwrap();
        let again = registry.register_guideline(&guideline).await.unwrap();
        assert_eq!(again.total_measurements(), 1);
    }

    #[tokio::test]
    async fn test_validation_rejects_without_creating() {
        let registry = TrackerRegistry::default();

        let result = registry
            .add_measurement("g-1", 1.4, &experience("exp-1", "g-1", 0.5))
            .await;
        assert!(matches!(result, Err(EvolvError::Validation(_))));

        let result = registry
            .record_experience(&experience("exp-1", "", 0.5))
            .await;
        assert!(result.is_err());

        assert!(registry.get("g-1").await.unwrap().is_none());
        assert!(registry.locks.is_empty().await);
    }

    #[tokio::test]
    async fn test_real_world_result() {
        let registry = TrackerRegistry::default();
        let outcome = OutcomeRecord {
            experience_id: "exp-9".to_string(),
            overall_score: 0.3,
            category: OutcomeCategory::Failure,
            months_in_production: 2,
            production_stability: 0.4,
            project_size: String::new(),
            complexity: String::new(),
        };

        let snapshot = registry.add_real_world_result("g-3", &outcome).await.unwrap();
        assert!(snapshot.needs_improvement);

        let tracker = registry.get("g-3").await.unwrap().unwrap();
        assert!(tracker.measurements()[0].is_real_world);
    }

    #[tokio::test]
    async fn test_concurrent_measurements_are_not_lost() {
        let registry = Arc::new(TrackerRegistry::default());

        let mut handles = Vec::new();
        for i in 0..50 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let guideline = if i % 2 == 0 { "g-even" } else { "g-odd" };
                registry
                    .record_experience(&experience(&format!("exp-{}", i), guideline, 0.7))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let even = registry.effectiveness("g-even").await.unwrap().unwrap();
        let odd = registry.effectiveness("g-odd").await.unwrap().unwrap();
        assert_eq!(even.measurement_count, 25);
        assert_eq!(odd.measurement_count, 25);
        // One lock slot per guideline, not per write
        assert_eq!(registry.locks.len().await, 2);
    }

    #[tokio::test]
    async fn test_needing_improvement_filter() {
        let registry = TrackerRegistry::default();
        registry
            .record_experience(&experience("exp-1", "g-good", 0.9))
            .await
            .unwrap();
        registry
            .record_experience(&experience("exp-2", "g-bad", 0.2))
            .await
            .unwrap();

        let all = registry.snapshots().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].guideline_id, "g-bad");

        let flagged = registry.needing_improvement().await.unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].guideline_id, "g-bad");
    }
}
