//! Repository-backed coordination of running A/B tests

use chrono::Utc;
use evolv_core::{
    AbTestConfig, EvolvError, EvolvedGuideline, Guideline, InMemoryRepository, KeyedLocks,
    Measurement, Repository, Result,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::ab_test::{ABTest, ABTestStatus, Arm};

/// Starts, feeds and settles A/B tests
///
/// Unknown test ids yield `Ok(None)`. A test's lock slot is released once it
/// is finalized, so the lock arena only holds running tests.
pub struct ABTestCoordinator {
    repository: Arc<dyn Repository<ABTest>>,
    locks: KeyedLocks,
    config: AbTestConfig,
}

impl ABTestCoordinator {
    pub fn new(config: AbTestConfig) -> Self {
        Self::with_repository(Arc::new(InMemoryRepository::new()), config)
    }

    pub fn with_repository(repository: Arc<dyn Repository<ABTest>>, config: AbTestConfig) -> Self {
        Self {
            repository,
            locks: KeyedLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> &AbTestConfig {
        &self.config
    }

    /// Open a test between a guideline and its candidate
    #[instrument(skip(self, original, evolved))]
    pub async fn start(
        &self,
        guideline_id: &str,
        original: &Guideline,
        evolved: &EvolvedGuideline,
        required_sample_size: usize,
    ) -> Result<ABTest> {
        if original.id != guideline_id {
            return Err(EvolvError::validation(format!(
                "original guideline {} does not match {}",
                original.id, guideline_id
            )));
        }

        let test = ABTest::from_config(
            original.clone(),
            evolved.clone(),
            required_sample_size,
            &self.config,
        )?;
        self.repository.put(&test.id, test.clone()).await?;

        info!(
            "Started A/B test {} for {} (candidate {}, {} samples)",
            test.id, guideline_id, evolved.id, required_sample_size
        );
        Ok(test)
    }

    /// Append a measurement to one arm of a running test
    #[instrument(skip(self, measurement))]
    pub async fn record_measurement(
        &self,
        test_id: &str,
        arm: Arm,
        measurement: Measurement,
    ) -> Result<Option<ABTest>> {
        let recorded = {
            let _guard = self.locks.lock(test_id).await;
            self.append(test_id, arm, measurement).await
        };
        if !matches!(&recorded, Ok(Some(test)) if test.end_time.is_none()) {
            self.locks.forget(test_id).await;
        }
        recorded
    }

    async fn append(
        &self,
        test_id: &str,
        arm: Arm,
        measurement: Measurement,
    ) -> Result<Option<ABTest>> {
        let Some(mut test) = self.repository.get(test_id).await? else {
            warn!("Measurement for unknown A/B test {}", test_id);
            return Ok(None);
        };

        test.record(arm, measurement)?;
        if self.config.auto_finalize && test.reached_sample_size() {
            test.finalize(Utc::now());
            info!("A/B test {} reached its sample size and was finalized", test_id);
        }

        debug!(
            "A/B test {}: {} samples, original {:.2}, evolved {:.2}, confidence {:.3}",
            test_id,
            test.current_sample_size,
            test.original_success_rate,
            test.evolved_success_rate,
            test.confidence_level
        );
        self.repository.put(test_id, test.clone()).await?;
        Ok(Some(test))
    }

    /// Mark a test as ended
    #[instrument(skip(self))]
    pub async fn finalize(&self, test_id: &str) -> Result<Option<ABTest>> {
        let finalized = {
            let _guard = self.locks.lock(test_id).await;
            match self.repository.get(test_id).await? {
                Some(mut test) => {
                    test.finalize(Utc::now());
                    self.repository.put(test_id, test.clone()).await?;
                    Some(test)
                }
                None => None,
            }
        };
        self.locks.forget(test_id).await;
        let Some(test) = finalized else {
            return Ok(None);
        };

        match test.status() {
            ABTestStatus::Abandoned => warn!(
                "A/B test {} finalized with {} of {} samples",
                test_id, test.current_sample_size, test.required_sample_size
            ),
            _ => info!(
                "A/B test {} finalized: evolved {} (confidence {:.3})",
                test_id,
                if test.winner().is_some() { "wins" } else { "does not win" },
                test.confidence_level
            ),
        }
        Ok(Some(test))
    }

    pub async fn get(&self, test_id: &str) -> Result<Option<ABTest>> {
        self.repository.get(test_id).await
    }

    /// Evolved variant if it won; `None` for unknown or undecided tests
    pub async fn get_winner(&self, test_id: &str) -> Result<Option<EvolvedGuideline>> {
        Ok(self
            .repository
            .get(test_id)
            .await?
            .and_then(|test| test.winner().cloned()))
    }

    pub async fn get_improvement_rate(&self, test_id: &str) -> Result<Option<f64>> {
        Ok(self
            .repository
            .get(test_id)
            .await?
            .map(|test| test.improvement_rate()))
    }

    /// Every test for a guideline, oldest first
    pub async fn tests_for(&self, guideline_id: &str) -> Result<Vec<ABTest>> {
        let mut tests: Vec<_> = self
            .repository
            .list()
            .await?
            .into_iter()
            .filter(|test| test.guideline_id == guideline_id)
            .collect();
        tests.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        Ok(tests)
    }
}

impl Default for ABTestCoordinator {
    fn default() -> Self {
        Self::new(AbTestConfig::default())
    }
}
