//! Two-proportion z-test

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Outcome of a significance test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignificanceResult {
    pub z_score: f64,
    /// Two-tailed p-value
    pub p_value: f64,
    /// `1 - p_value`
    pub confidence_level: f64,
}

impl SignificanceResult {
    /// Nothing can be concluded (an empty arm or zero variance)
    pub const INCONCLUSIVE: Self = Self {
        z_score: 0.0,
        p_value: 1.0,
        confidence_level: 0.0,
    };

    pub fn is_significant(&self, level: f64) -> bool {
        self.confidence_level >= level
    }
}

/// Pooled two-proportion z-test of arm B's success rate against arm A's
pub fn two_proportion_z_test(
    rate_a: f64,
    n_a: usize,
    rate_b: f64,
    n_b: usize,
) -> SignificanceResult {
    if n_a == 0 || n_b == 0 {
        return SignificanceResult::INCONCLUSIVE;
    }

    let (n_a, n_b) = (n_a as f64, n_b as f64);
    let pooled = (rate_a * n_a + rate_b * n_b) / (n_a + n_b);

    let se = (pooled * (1.0 - pooled) * (1.0 / n_a + 1.0 / n_b)).sqrt();
    if !(se.is_finite() && se > 0.0) {
        return SignificanceResult::INCONCLUSIVE;
    }

    let z_score = (rate_b - rate_a) / se;
    let p_value = (2.0 * (1.0 - Normal::standard().cdf(z_score.abs()))).clamp(0.0, 1.0);

    SignificanceResult {
        z_score,
        p_value,
        confidence_level: 1.0 - p_value,
    }
}
