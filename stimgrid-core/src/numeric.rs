//! Small numeric helpers shared by the discretizer and the slice engine.
//!
//! None of these print, log or fail; degenerate input yields empty or
//! neutral output.

/// Rounds `value` to `places` decimal places (half away from zero).
#[inline]
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Sorted copy of `values` with exact duplicates removed.
#[must_use]
pub fn unique_sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted
}

/// Consecutive differences of `values`.
#[must_use]
pub fn first_diffs(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

/// Remainder of each time within consecutive intervals of length `period`,
/// in `[0, period)`. Empty when `period` is not positive.
#[must_use]
pub fn interval_offsets(times: &[f64], period: f64) -> Vec<f64> {
    if period <= 0.0 {
        return Vec::new();
    }
    times
        .iter()
        .map(|t| {
            // rem_euclid can round up to `period` for tiny negative times
            let r = t.rem_euclid(period);
            if r >= period {
                0.0
            } else {
                r
            }
        })
        .collect()
}
