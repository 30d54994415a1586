//! Policy errors.

use thiserror::Error;

/// Errors raised while building the per-run policy values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// Retention window must cover at least one day.
    #[error("retention window must be at least 1 day, got {0}")]
    InvalidRetention(u32),

    /// The cutoff instant falls outside the representable time range.
    #[error("retention window of {days} days reaches before the earliest representable instant")]
    CutoffOutOfRange { days: u32 },
}
