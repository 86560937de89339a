//! # evolv-engine
//!
//! Adaptive guideline effectiveness and pattern-matching engine.
//!
//! [`Engine`] is the single handle a host service holds. It records
//! experiences and production outcomes, reports effectiveness, proposes
//! evolved guidelines and validates them with A/B tests, and matches incoming
//! error signals against a self-tuning pattern library.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use evolv_engine::{Engine, EvolutionStrategy};
//! # use evolv_engine::{InMemoryRepository, Result};
//! # async fn run(strategy: Arc<dyn EvolutionStrategy>) -> Result<()> {
//! let engine = Engine::builder()
//!     .with_strategy(strategy)
//!     .with_guideline_store(Arc::new(InMemoryRepository::new()))
//!     .with_builtin_patterns()
//!     .build()
//!     .await?;
//! let result = engine.evaluate_evolution("guideline-1").await?;
//! # let _ = result;
//! # Ok(())
//! # }
//! ```

mod engine;

pub use engine::{Engine, EngineBuilder};
pub use evolv_core::{
    EngineConfig, EvolvError, EvolvedGuideline, ExperienceRecord, Guideline, InMemoryRepository,
    Measurement, OutcomeCategory, OutcomeRecord, Repository, Result, Signal,
};
pub use evolv_evolution::{
    EvolutionOutcome, EvolutionResult, EvolutionStrategy, ReviewItem, ReviewReason,
};
pub use evolv_metrics::{EffectivenessSnapshot, EffectivenessTracker, Trend};
pub use evolv_patterns::{ErrorPattern, MatchQuality, PatternFields, PatternMatch};
pub use evolv_validation::{ABTest, ABTestStatus, Arm, SuccessCriterion};
