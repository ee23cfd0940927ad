//! Numeric tolerances and thresholds.
//!
//! Every tolerance-driven decision in the engine reads its constant from
//! [`Tolerances`], so tests and callers can override any of them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Added before floor/ceil when rounding onsets to a fractional TR.
pub const ROUND_EPSILON: f64 = 1e-10;
/// Overlap between consecutive events (seconds) ignored as float noise.
pub const OVERLAP_TOLERANCE: f64 = 0.0001;
/// Maximum fractional TR offset below which timing is flagged as near TR-locked.
pub const NEAR_LOCK_THRESHOLD: f64 = 0.4;
/// Distance from an integer rank at which a scaled slice time is flagged.
pub const SLICE_GRID_TOLERANCE: f64 = 0.005;
/// Decimal places kept when checking scaled slice times for consecutive ranks.
pub const SLICE_RANK_DIGITS: i32 = 1;
/// Decimal places kept for times in TR units during discretization.
pub const TR_DECIMALS: i32 = 3;
/// Fraction of the remaining run an over-long event is truncated to.
pub const TRUNCATE_FRACTION: f64 = 0.99;

/// Tolerance configuration shared by every operation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Tolerances {
    /// Epsilon added before floor/ceil in `round_times` (fractional TRs only).
    pub round_epsilon: f64,
    /// Event overlap (seconds) above which an overlap is reported.
    pub overlap_tolerance: f64,
    /// Near TR-lock warning limit on the maximum fractional offset (0 disables).
    pub near_lock_threshold: f64,
    /// Off-integer distance at which scaled slice times are flagged.
    pub slice_grid_tolerance: f64,
    /// Decimal places used when validating scaled slice ranks.
    pub slice_rank_digits: i32,
    /// Decimal places kept for TR-unit times in the discretizer.
    pub tr_decimals: i32,
    /// Fraction of `run_length - onset` kept when truncating an event.
    pub truncate_fraction: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            round_epsilon: ROUND_EPSILON,
            overlap_tolerance: OVERLAP_TOLERANCE,
            near_lock_threshold: NEAR_LOCK_THRESHOLD,
            slice_grid_tolerance: SLICE_GRID_TOLERANCE,
            slice_rank_digits: SLICE_RANK_DIGITS,
            tr_decimals: TR_DECIMALS,
            truncate_fraction: TRUNCATE_FRACTION,
        }
    }
}

impl Tolerances {
    /// Creates the default tolerances.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rounding epsilon.
    #[must_use]
    pub fn with_round_epsilon(mut self, epsilon: f64) -> Self {
        self.round_epsilon = epsilon;
        self
    }

    /// Sets the overlap tolerance (seconds).
    #[must_use]
    pub fn with_overlap_tolerance(mut self, tolerance: f64) -> Self {
        self.overlap_tolerance = tolerance;
        self
    }

    /// Sets the near TR-lock threshold.
    #[must_use]
    pub fn with_near_lock_threshold(mut self, threshold: f64) -> Self {
        self.near_lock_threshold = threshold;
        self
    }

    /// Sets the slice grid tolerance.
    #[must_use]
    pub fn with_slice_grid_tolerance(mut self, tolerance: f64) -> Self {
        self.slice_grid_tolerance = tolerance;
        self
    }

    /// Sets the decimal places used for slice rank validation.
    #[must_use]
    pub fn with_slice_rank_digits(mut self, digits: i32) -> Self {
        self.slice_rank_digits = digits;
        self
    }

    /// Sets the decimal places kept for TR-unit times.
    #[must_use]
    pub fn with_tr_decimals(mut self, decimals: i32) -> Self {
        self.tr_decimals = decimals;
        self
    }

    /// Sets the truncation fraction for events running past the end of a run.
    #[must_use]
    pub fn with_truncate_fraction(mut self, fraction: f64) -> Self {
        self.truncate_fraction = fraction;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tol = Tolerances::default();
        assert!((tol.overlap_tolerance - 0.0001).abs() < f64::EPSILON);
        assert!((tol.near_lock_threshold - 0.4).abs() < f64::EPSILON);
        assert_eq!(tol.tr_decimals, 3);
        assert_eq!(tol.slice_rank_digits, 1);
    }

    #[test]
    fn test_builder() {
        let tol = Tolerances::new()
            .with_overlap_tolerance(0.01)
            .with_near_lock_threshold(0.0)
            .with_tr_decimals(6);
        assert!((tol.overlap_tolerance - 0.01).abs() < f64::EPSILON);
        assert!(tol.near_lock_threshold.abs() < f64::EPSILON);
        assert_eq!(tol.tr_decimals, 6);
    }
}
