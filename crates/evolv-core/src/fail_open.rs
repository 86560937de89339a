//! Fail-open utilities for per-item isolation
//!
//! Scans over many candidates (patterns, stored records) use these helpers so
//! that one bad item is logged and skipped instead of failing the whole call.
//!
//! DO NOT use fail-open for:
//! - Input validation (reject synchronously instead)
//! - Repository writes (state)

use tracing::warn;

use crate::Result;

/// Run an operation that should fail open
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// # Usage
///
/// ```
/// use evolv_core::fail_open::fail_open;
/// use evolv_core::{EvolvError, Result};
///
/// fn parse(raw: &str) -> Result<u32> {
///     raw.parse().map_err(|_| EvolvError::validation("not a number"))
/// }
///
/// let parsed: Vec<u32> = ["1", "x", "3"]
///     .iter()
///     .filter_map(|raw| fail_open("parse", || parse(raw)))
///     .collect();
/// assert_eq!(parsed, vec![1, 3]);
/// ```
pub fn fail_open<F, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Result<T>,
{
    match f() {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}
