//! # evolv-evolution
//!
//! Decides when a guideline should be improved.
//!
//! This crate provides:
//! - The pluggable [`EvolutionStrategy`] that produces candidate content
//! - [`EvolutionEngine`], which gates candidates on effectiveness, evolvability
//!   and sample size
//! - A review queue of outdated, ineffective or declining guidelines

mod engine;
mod review;

pub use engine::{EvolutionEngine, EvolutionOutcome, EvolutionResult, EvolutionStrategy};
pub use review::{EvolutionReview, ReviewItem, ReviewReason};
