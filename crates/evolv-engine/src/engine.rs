//! Host-facing facade wiring every component together

use evolv_core::{
    EngineConfig, EvolvError, EvolvedGuideline, ExperienceRecord, Guideline, InMemoryRepository,
    Measurement, OutcomeRecord, Repository, Result, Signal,
};
use evolv_evolution::{
    EvolutionEngine, EvolutionOutcome, EvolutionResult, EvolutionStrategy, ReviewItem,
};
use evolv_metrics::{EffectivenessSnapshot, EffectivenessTracker, TrackerRegistry};
use evolv_patterns::{builtin_patterns, ErrorPattern, PatternLibrary, PatternMatch};
use evolv_validation::{ABTest, ABTestCoordinator, Arm};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Assembles an [`Engine`]
///
/// An evolution strategy and a guideline store are required; every other
/// repository defaults to an in-memory one.
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    strategy: Option<Arc<dyn EvolutionStrategy>>,
    guidelines: Option<Arc<dyn Repository<Guideline>>>,
    trackers: Option<Arc<dyn Repository<EffectivenessTracker>>>,
    patterns: Option<Arc<dyn Repository<ErrorPattern>>>,
    ab_tests: Option<Arc<dyn Repository<ABTest>>>,
    builtin_patterns: bool,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Load `.evolv/config.toml` under `root`, falling back to defaults
    pub fn with_config_from(mut self, root: &Path) -> Result<Self> {
        self.config = EngineConfig::load_or_default(root)?;
        Ok(self)
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn EvolutionStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_guideline_store(mut self, store: Arc<dyn Repository<Guideline>>) -> Self {
        self.guidelines = Some(store);
        self
    }

    pub fn with_tracker_store(mut self, store: Arc<dyn Repository<EffectivenessTracker>>) -> Self {
        self.trackers = Some(store);
        self
    }

    pub fn with_pattern_store(mut self, store: Arc<dyn Repository<ErrorPattern>>) -> Self {
        self.patterns = Some(store);
        self
    }

    pub fn with_ab_test_store(mut self, store: Arc<dyn Repository<ABTest>>) -> Self {
        self.ab_tests = Some(store);
        self
    }

    /// Seed the pattern library with common failure signatures
    pub fn with_builtin_patterns(mut self) -> Self {
        self.builtin_patterns = true;
        self
    }

    pub async fn build(self) -> Result<Engine> {
        self.config.validate()?;

        let strategy = self.strategy.ok_or_else(|| {
            EvolvError::Configuration("no evolution strategy configured".to_string())
        })?;
        let guidelines = self.guidelines.ok_or_else(|| {
            EvolvError::Configuration("no guideline store configured".to_string())
        })?;

        let config = self.config;
        let trackers = Arc::new(TrackerRegistry::with_repository(
            self.trackers
                .unwrap_or_else(|| Arc::new(InMemoryRepository::new())),
            config.effectiveness,
        ));
        let patterns = PatternLibrary::with_repository(
            self.patterns
                .unwrap_or_else(|| Arc::new(InMemoryRepository::new())),
            config.patterns,
        );
        let ab_tests = ABTestCoordinator::with_repository(
            self.ab_tests
                .unwrap_or_else(|| Arc::new(InMemoryRepository::new())),
            config.ab_test,
        );
        let evolution =
            EvolutionEngine::new(trackers.clone(), guidelines.clone(), strategy, config.evolution);

        if self.builtin_patterns {
            for pattern in builtin_patterns(config.patterns.initial_confidence) {
                patterns.register(pattern).await?;
            }
        }

        info!("Evolv engine ready");
        Ok(Engine {
            config,
            guidelines,
            trackers,
            patterns,
            evolution,
            ab_tests,
        })
    }
}

/// Effectiveness tracking, evolution, A/B validation and pattern matching
/// behind one handle
pub struct Engine {
    config: EngineConfig,
    guidelines: Arc<dyn Repository<Guideline>>,
    trackers: Arc<TrackerRegistry>,
    patterns: PatternLibrary,
    evolution: EvolutionEngine,
    ab_tests: ABTestCoordinator,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn trackers(&self) -> &TrackerRegistry {
        &self.trackers
    }

    pub fn patterns(&self) -> &PatternLibrary {
        &self.patterns
    }

    pub fn evolution(&self) -> &EvolutionEngine {
        &self.evolution
    }

    pub fn ab_tests(&self) -> &ABTestCoordinator {
        &self.ab_tests
    }

    // --- Effectiveness ---

    /// Store a guideline and start tracking it from its original effectiveness
    pub async fn register_guideline(&self, guideline: Guideline) -> Result<EffectivenessSnapshot> {
        let tracker = self.trackers.register_guideline(&guideline).await?;
        let id = guideline.id.clone();
        self.guidelines.put(&id, guideline).await?;
        Ok(tracker.snapshot())
    }

    pub async fn record_experience(
        &self,
        experience: &ExperienceRecord,
    ) -> Result<EffectivenessSnapshot> {
        self.trackers.record_experience(experience).await
    }

    pub async fn record_outcome(
        &self,
        guideline_id: &str,
        outcome: &OutcomeRecord,
    ) -> Result<EffectivenessSnapshot> {
        self.trackers.add_real_world_result(guideline_id, outcome).await
    }

    pub async fn get_effectiveness(
        &self,
        guideline_id: &str,
    ) -> Result<Option<EffectivenessSnapshot>> {
        self.trackers.effectiveness(guideline_id).await
    }

    // --- Evolution ---

    /// Evaluate a guideline; improved candidates enter an A/B test when
    /// `ab_test.auto_start` is on
    #[instrument(skip(self))]
    pub async fn evaluate_evolution(&self, guideline_id: &str) -> Result<EvolutionResult> {
        let mut result = self.evolution.evaluate(guideline_id).await?;

        if self.config.ab_test.auto_start {
            if let EvolutionOutcome::Improved {
                original, evolved, ..
            } = &result.outcome
            {
                let test = self
                    .ab_tests
                    .start(
                        guideline_id,
                        original,
                        evolved,
                        self.config.ab_test.required_sample_size,
                    )
                    .await?;
                result.ab_test_id = Some(test.id);
            }
        }

        Ok(result)
    }

    pub async fn review_queue(&self) -> Result<Vec<ReviewItem>> {
        self.evolution.review_queue().await
    }

    // --- Patterns ---

    pub async fn register_pattern(&self, pattern: ErrorPattern) -> Result<ErrorPattern> {
        self.patterns.register(pattern).await
    }

    /// Best matching pattern, with its confidence raised
    pub async fn match_pattern(&self, signal: &Signal) -> Result<Option<ErrorPattern>> {
        Ok(self
            .patterns
            .match_signal(signal)
            .await?
            .map(|best| best.pattern))
    }

    /// Ranked matches, confidence untouched
    pub async fn match_all_patterns(&self, signal: &Signal) -> Result<Vec<PatternMatch>> {
        self.patterns.match_all(signal).await
    }

    pub async fn report_failed_match(&self, pattern_id: &str) -> Result<Option<ErrorPattern>> {
        self.patterns.report_failed_match(pattern_id).await
    }

    // --- A/B tests ---

    pub async fn start_ab_test(
        &self,
        guideline_id: &str,
        original: &Guideline,
        evolved: &EvolvedGuideline,
        required_sample_size: usize,
    ) -> Result<ABTest> {
        self.ab_tests
            .start(guideline_id, original, evolved, required_sample_size)
            .await
    }

    pub async fn record_ab_measurement(
        &self,
        test_id: &str,
        arm: Arm,
        measurement: Measurement,
    ) -> Result<Option<ABTest>> {
        self.ab_tests.record_measurement(test_id, arm, measurement).await
    }

    pub async fn finalize_ab_test(&self, test_id: &str) -> Result<Option<ABTest>> {
        self.ab_tests.finalize(test_id).await
    }

    pub async fn get_winner(&self, test_id: &str) -> Result<Option<EvolvedGuideline>> {
        self.ab_tests.get_winner(test_id).await
    }

    pub async fn get_improvement_rate(&self, test_id: &str) -> Result<Option<f64>> {
        self.ab_tests.get_improvement_rate(test_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl EvolutionStrategy for Echo {
        async fn evolve(
            &self,
            guideline: &Guideline,
            _tracker: &EffectivenessTracker,
        ) -> Result<EvolvedGuideline> {
            Ok(EvolvedGuideline::new(
                guideline.id.clone(),
                guideline.content.clone(),
                guideline.original_effectiveness,
            ))
        }
    }

    #[tokio::test]
    async fn test_missing_strategy_is_a_configuration_error() {
        let result = Engine::builder()
            .with_guideline_store(Arc::new(InMemoryRepository::new()))
            .build()
            .await;
        assert!(matches!(result, Err(EvolvError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_missing_guideline_store_is_a_configuration_error() {
        let result = Engine::builder().with_strategy(Arc::new(Echo)).build().await;
        assert!(matches!(result, Err(EvolvError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_invalid_config_fails_build() {
        let mut config = EngineConfig::default();
        config.effectiveness.real_world_multiplier = 0.5;

        let result = Engine::builder()
            .with_config(config)
            .with_strategy(Arc::new(Echo))
            .with_guideline_store(Arc::new(InMemoryRepository::new()))
            .build()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_builtin_patterns_are_registered() {
        let engine = Engine::builder()
            .with_strategy(Arc::new(Echo))
            .with_guideline_store(Arc::new(InMemoryRepository::new()))
            .with_builtin_patterns()
            .build()
            .await
            .unwrap();
        assert_eq!(engine.patterns().list().await.unwrap().len(), 4);
    }
}
