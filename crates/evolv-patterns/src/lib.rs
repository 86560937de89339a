//! # evolv-patterns
//!
//! Learned error patterns for Evolv.
//!
//! This crate provides:
//! - Pattern registration with up-front regex validation
//! - Weighted four-factor matching of signals against patterns
//! - Self-adjusting pattern confidence
//! - Edit-distance based pattern-to-pattern similarity

mod library;
mod matcher;
mod pattern;
mod similarity;

pub use library::{builtin_patterns, PatternLibrary};
pub use matcher::{CompiledPatterns, MatchFactors, MatchQuality, PatternMatch, PatternMatcher};
pub use pattern::{CompiledPattern, ErrorPattern, PatternFields};
pub use similarity::{calculate_pattern_similarity, levenshtein_distance, string_similarity};
