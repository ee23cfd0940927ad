//! Min/mean/max/stdev summaries.
#![allow(clippy::cast_precision_loss)]

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Descriptive statistics over a list of values.
///
/// The standard deviation is the unbiased (N-1) estimate. An empty list
/// summarizes to all zeros and a single value has zero deviation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Summary {
    /// Smallest value.
    pub min: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Largest value.
    pub max: f64,
    /// Unbiased standard deviation.
    pub stdev: f64,
    /// Number of values summarized.
    pub count: usize,
}

impl Summary {
    /// Summarizes `values`.
    #[must_use]
    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        match values {
            [] => Self::default(),
            [only] => Self {
                min: *only,
                mean: *only,
                max: *only,
                stdev: 0.0,
                count,
            },
            _ => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mean = values.iter().sum::<f64>() / count as f64;
                let sumsq: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
                Self {
                    min,
                    mean,
                    max,
                    stdev: (sumsq / (count - 1) as f64).sqrt(),
                    count,
                }
            }
        }
    }

    /// Returns true if no values were summarized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:7.3}  {:7.3}  {:7.3}  {:7.3}",
            self.min, self.mean, self.max, self.stdev
        )
    }
}
