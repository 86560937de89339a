//! # evolv-metrics
//!
//! Effectiveness tracking for Evolv guidelines.
//!
//! This crate provides:
//! - Recency-weighted score aggregation with a real-world bonus
//! - Trend detection over the most recent measurements
//! - A repository-backed registry with per-guideline write exclusivity

mod registry;
mod tracker;

pub use registry::TrackerRegistry;
pub use tracker::{recency_weight, EffectivenessSnapshot, EffectivenessTracker, Trend};
