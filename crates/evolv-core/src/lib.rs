//! # evolv-core
//!
//! Core types for the Evolv adaptive guideline engine.
//!
//! Evolv tracks how well stored guidelines perform in real projects, decides
//! when a guideline should evolve, validates candidates with A/B tests, and
//! matches incoming error signals against learned patterns.
//!
//! This crate provides:
//! - The shared data model (guidelines, measurements, records, signals)
//! - Engine configuration with named, overridable scoring constants
//! - The [`Repository`] storage seam and per-id [`KeyedLocks`]
//! - The unified [`EvolvError`] type

pub mod config;
mod error;
pub mod fail_open;
mod repository;
mod types;

pub use config::{AbTestConfig, EffectivenessConfig, EngineConfig, EvolutionConfig, PatternConfig};
pub use error::{EvolvError, Result};
pub use repository::{InMemoryRepository, KeyedLocks, Repository};
pub use types::*;
