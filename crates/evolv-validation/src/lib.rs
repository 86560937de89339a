//! # evolv-validation
//!
//! A/B validation of evolved guidelines.
//!
//! A candidate only replaces its original after a two-arm test has collected
//! its sample size, been finalized, and shown a significant improvement under
//! a two-proportion z-test.

mod coordinator;
mod significance;

pub use ab_test::{ABTest, ABTestStatus, Arm, SuccessCriterion};
pub use coordinator::ABTestCoordinator;
pub use significance::{two_proportion_z_test, SignificanceResult};
