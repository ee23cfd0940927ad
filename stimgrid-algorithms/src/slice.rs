//! Slice acquisition patterns: order and timing generation, and pattern
//! inference from slice times (including multiband repetition).
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use std::fmt;

use stimgrid_core::numeric::{first_diffs, round_to, unique_sorted};
use stimgrid_core::{Diagnostic, Error, Result, SlicePattern, Tolerances};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Acquisition order of `nslices` slices: entry `i` is the slice acquired
/// `i`-th.
///
/// # Errors
///
/// Returns [`Error::InvalidSliceCount`] for zero slices and
/// [`Error::UnorderedPattern`] for [`SlicePattern::Simultaneous`].
pub fn pattern_to_order(pattern: SlicePattern, nslices: usize) -> Result<Vec<usize>> {
    if nslices == 0 {
        return Err(Error::InvalidSliceCount(0));
    }
    let n = nslices;
    let up = |start: usize| (start..n).step_by(2);
    let down = |top: Option<usize>| top.into_iter().flat_map(|t| (0..=t).rev().step_by(2));

    let order: Vec<usize> = match pattern {
        SlicePattern::Simultaneous => return Err(Error::UnorderedPattern(pattern)),
        SlicePattern::SeqPlus => (0..n).collect(),
        SlicePattern::SeqMinus => (0..n).rev().collect(),
        SlicePattern::AltPlus => up(0).chain(up(1)).collect(),
        SlicePattern::AltMinus => down(n.checked_sub(1)).chain(down(n.checked_sub(2))).collect(),
        SlicePattern::AltPlus2 => up(1).chain(up(0)).collect(),
        SlicePattern::AltMinus2 => down(n.checked_sub(2)).chain(down(n.checked_sub(1))).collect(),
    };
    Ok(order)
}

/// Inverts an acquisition order: entry `s` is the rank at which slice `s`
/// is acquired.
fn order_to_ranks(order: &[usize]) -> Vec<usize> {
    let mut ranks = vec![0; order.len()];
    for (rank, &slice) in order.iter().enumerate() {
        ranks[slice] = rank;
    }
    ranks
}

/// Slice times for `nslices` slices within one TR.
///
/// With `mblevel > 1` the slices form `mblevel` identical bands acquired
/// together. A `tr` of 0 yields unscaled ranks.
///
/// # Errors
///
/// Returns an error for zero slices, a zero multiband level, a negative TR,
/// or a slice count that is not a multiple of `mblevel`.
pub fn pattern_to_timing(
    pattern: SlicePattern,
    nslices: usize,
    tr: f64,
    mblevel: usize,
) -> Result<Vec<f64>> {
    if nslices == 0 {
        return Err(Error::InvalidSliceCount(0));
    }
    if mblevel == 0 {
        return Err(Error::InvalidMultiband(0));
    }
    if tr.is_nan() || tr < 0.0 {
        return Err(Error::InvalidTr(tr));
    }
    if nslices == 1 {
        return Ok(vec![0.0]);
    }
    if pattern == SlicePattern::Simultaneous {
        return Ok(vec![0.0; nslices]);
    }
    if nslices % mblevel != 0 {
        return Err(Error::MultibandMismatch { nslices, mblevel });
    }

    let band = nslices / mblevel;
    let ranks = order_to_ranks(&pattern_to_order(pattern, band)?);
    let scale = if tr == 0.0 { 1.0 } else { tr / band as f64 };
    let times: Vec<f64> = ranks.iter().map(|&r| r as f64 * scale).collect();
    Ok(times.repeat(mblevel))
}

/// Result of slice order inference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SliceOrder {
    /// A named pattern.
    Pattern(SlicePattern),
    /// No known pattern fits.
    Irregular,
}

impl fmt::Display for SliceOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(pattern) => f.write_str(pattern.as_str()),
            Self::Irregular => f.write_str("irregular"),
        }
    }
}

/// Pattern inferred from a list of slice times.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PatternMatch {
    /// Multiband level; 0 when the bands do not repeat.
    pub mblevel: usize,
    /// Detected order.
    pub order: SliceOrder,
    /// Mean spacing between distinct slice times.
    pub grid: f64,
    /// Implied TR (`grid` times the number of distinct times).
    pub tr: f64,
    /// Largest minus smallest spacing between distinct times.
    pub resolution: f64,
    /// Warnings from the grid checks.
    pub diagnostics: Vec<Diagnostic>,
}

impl PatternMatch {
    fn new(mblevel: usize, order: SliceOrder) -> Self {
        Self {
            mblevel,
            order,
            grid: 0.0,
            tr: 0.0,
            resolution: 0.0,
            diagnostics: Vec::new(),
        }
    }

    /// Integer status and pattern name: the multiband level (0 for a
    /// failed repetition) and the pattern or `"irregular"`.
    #[must_use]
    pub fn status(&self) -> (usize, String) {
        (self.mblevel, self.order.to_string())
    }

    /// The detected pattern, if any.
    #[must_use]
    pub fn pattern(&self) -> Option<SlicePattern> {
        match self.order {
            SliceOrder::Pattern(pattern) => Some(pattern),
            SliceOrder::Irregular => None,
        }
    }
}

impl fmt::Display for PatternMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.mblevel, self.order)
    }
}

/// Apparent grid resolution of values expected to lie on a regular grid:
/// the largest minus the smallest spacing between distinct sorted values.
/// Zero for a perfect grid or fewer than two distinct values.
#[must_use]
pub fn numerical_resolution(times: &[f64]) -> f64 {
    let diffs = first_diffs(&unique_sorted(times));
    let min = diffs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = diffs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if diffs.is_empty() {
        0.0
    } else {
        max - min
    }
}

/// Infers the multiband level and acquisition pattern of slice times.
///
/// Classification failures are values ([`SliceOrder::Irregular`], or
/// `mblevel == 0` for a broken repetition); only unusable input is an error.
///
/// # Errors
///
/// Returns [`Error::InvalidSliceCount`] for an empty list and
/// [`Error::NonFiniteTime`] for a NaN or infinite time.
pub fn timing_to_pattern(times: &[f64], tolerances: &Tolerances) -> Result<PatternMatch> {
    if times.is_empty() {
        return Err(Error::InvalidSliceCount(0));
    }
    if let Some((index, &value)) = times.iter().enumerate().find(|(_, t)| !t.is_finite()) {
        return Err(Error::NonFiniteTime { index, value });
    }

    let unique = unique_sorted(times);
    let ntimes = times.len();
    let nunique = unique.len();
    if nunique <= 1 {
        return Ok(PatternMatch::new(1, SliceOrder::Pattern(SlicePattern::Simultaneous)));
    }

    let diffs = first_diffs(&unique);
    let grid = diffs.iter().sum::<f64>() / diffs.len() as f64;
    let mblevel = (ntimes as f64 / nunique as f64).round() as usize;
    let mut result = PatternMatch {
        mblevel,
        order: SliceOrder::Irregular,
        grid,
        tr: grid * nunique as f64,
        resolution: numerical_resolution(times),
        diagnostics: Vec::new(),
    };
    log::debug!(
        "timing_to_pattern: {ntimes} times, {nunique} unique, grid {grid}, tr ~{}, mb {mblevel}",
        result.tr
    );

    let scaled: Vec<f64> = times.iter().map(|t| t / grid).collect();

    // scaled times must land on the ranks 0..nunique
    let mut ranks: Vec<i64> = scaled
        .iter()
        .map(|&s| round_to(s, tolerances.slice_rank_digits) as i64)
        .collect();
    ranks.sort_unstable();
    ranks.dedup();
    let consecutive = ranks.len() == nunique && ranks.iter().zip(0..).all(|(&r, i)| r == i);
    if !consecutive {
        result.mblevel = 1;
        result.diagnostics.push(Diagnostic::SliceGridMismatch { grid, nunique });
        crate::warn_diagnostics(&result.diagnostics);
        return Ok(result);
    }

    if ntimes != mblevel * nunique {
        result.mblevel = 0;
        result
            .diagnostics
            .push(Diagnostic::MultibandIncomplete { ntimes, nunique });
        crate::warn_diagnostics(&result.diagnostics);
        return Ok(result);
    }

    let deviations: Vec<f64> = scaled.iter().map(|s| (s - s.round()).abs()).collect();
    let approximate = deviations
        .iter()
        .filter(|&&d| d >= tolerances.slice_grid_tolerance)
        .count();
    if approximate > 0 {
        let (worst_index, worst_deviation) = deviations
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.0), |best, (i, d)| if d > best.1 { (i, d) } else { best });
        result.diagnostics.push(Diagnostic::ApproximateSliceGrid {
            count: approximate,
            total: ntimes,
            grid,
            worst_index,
            worst_deviation,
        });
    }

    let ints: Vec<usize> = scaled.iter().map(|s| s.round() as usize).collect();
    let first_band = &ints[..nunique];
    result.order = SlicePattern::ORDERED
        .iter()
        .copied()
        .find(|&pattern| {
            pattern_to_order(pattern, nunique)
                .is_ok_and(|order| order_to_ranks(&order) == first_band)
        })
        .map_or(SliceOrder::Irregular, SliceOrder::Pattern);

    if let Some(band) = (1..mblevel).find(|b| &ints[b * nunique..(b + 1) * nunique] != first_band) {
        result.mblevel = 0;
        result.order = SliceOrder::Irregular;
        result
            .diagnostics
            .push(Diagnostic::MultibandRepeatMismatch { band });
    }

    crate::warn_diagnostics(&result.diagnostics);
    Ok(result)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_orders() {
        assert_eq!(pattern_to_order(SlicePattern::SeqPlus, 4).unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(pattern_to_order(SlicePattern::SeqMinus, 4).unwrap(), vec![3, 2, 1, 0]);
        assert_eq!(pattern_to_order(SlicePattern::AltPlus, 5).unwrap(), vec![0, 2, 4, 1, 3]);
        assert_eq!(pattern_to_order(SlicePattern::AltMinus, 5).unwrap(), vec![4, 2, 0, 3, 1]);
        assert_eq!(pattern_to_order(SlicePattern::AltPlus2, 5).unwrap(), vec![1, 3, 0, 2, 4]);
        assert_eq!(pattern_to_order(SlicePattern::AltMinus2, 5).unwrap(), vec![3, 1, 4, 2, 0]);
        assert_eq!(pattern_to_order(SlicePattern::AltMinus, 1).unwrap(), vec![0]);
    }

    #[test]
    fn test_order_errors() {
        assert_eq!(
            pattern_to_order(SlicePattern::Simultaneous, 4),
            Err(Error::UnorderedPattern(SlicePattern::Simultaneous))
        );
        assert_eq!(
            pattern_to_order(SlicePattern::SeqPlus, 0),
            Err(Error::InvalidSliceCount(0))
        );
    }

    #[test]
    fn test_alt_plus_timing() {
        let times = pattern_to_timing(SlicePattern::AltPlus, 6, 3.0, 1).unwrap();
        assert_eq!(times, vec![0.0, 1.5, 0.5, 2.0, 1.0, 2.5]);
    }

    #[test]
    fn test_multiband_timing() {
        let times = pattern_to_timing(SlicePattern::SeqPlus, 6, 1.5, 2).unwrap();
        assert_eq!(times, vec![0.0, 0.5, 1.0, 0.0, 0.5, 1.0]);
        assert_eq!(
            pattern_to_timing(SlicePattern::SeqPlus, 7, 1.5, 2),
            Err(Error::MultibandMismatch {
                nslices: 7,
                mblevel: 2
            })
        );
    }

    #[test]
    fn test_timing_edge_cases() {
        assert_eq!(pattern_to_timing(SlicePattern::AltPlus, 1, 2.0, 1).unwrap(), vec![0.0]);
        assert_eq!(
            pattern_to_timing(SlicePattern::Simultaneous, 3, 2.0, 1).unwrap(),
            vec![0.0; 3]
        );
        assert_eq!(
            pattern_to_timing(SlicePattern::SeqMinus, 3, 0.0, 1).unwrap(),
            vec![2.0, 1.0, 0.0]
        );
        assert_eq!(
            pattern_to_timing(SlicePattern::SeqPlus, 3, -1.0, 1),
            Err(Error::InvalidTr(-1.0))
        );
        assert_eq!(
            pattern_to_timing(SlicePattern::SeqPlus, 4, 2.0, 0),
            Err(Error::InvalidMultiband(0))
        );
    }

    #[test]
    fn test_infer_alt_plus() {
        let m = timing_to_pattern(&[0.0, 1.5, 0.5, 2.0, 1.0, 2.5], &Tolerances::default()).unwrap();
        assert_eq!(m.status(), (1, "alt+z".to_string()));
        assert_relative_eq!(m.grid, 0.5);
        assert_relative_eq!(m.tr, 3.0);
        assert!(m.diagnostics.is_empty());
    }

    #[test]
    fn test_infer_simultaneous() {
        let m = timing_to_pattern(&[0.0; 4], &Tolerances::default()).unwrap();
        assert_eq!(m.mblevel, 1);
        assert_eq!(m.pattern(), Some(SlicePattern::Simultaneous));
    }

    #[test]
    fn test_infer_multiband() {
        let times = pattern_to_timing(SlicePattern::AltMinus, 12, 2.0, 3).unwrap();
        let m = timing_to_pattern(&times, &Tolerances::default()).unwrap();
        assert_eq!(m.status(), (3, "alt-z".to_string()));
    }

    #[test]
    fn test_infer_broken_repeat() {
        let m = timing_to_pattern(&[0.0, 1.0, 2.0, 2.0, 1.0, 0.0], &Tolerances::default()).unwrap();
        assert_eq!(m.mblevel, 0);
        assert_eq!(m.order, SliceOrder::Irregular);
        assert_eq!(m.diagnostics, vec![Diagnostic::MultibandRepeatMismatch { band: 1 }]);
    }

    #[test]
    fn test_infer_incomplete_band() {
        let m = timing_to_pattern(&[0.0, 1.0, 2.0, 0.0, 1.0], &Tolerances::default()).unwrap();
        assert_eq!(m.status(), (0, "irregular".to_string()));
    }

    #[test]
    fn test_infer_off_grid() {
        let m = timing_to_pattern(&[0.0, 1.0, 3.0], &Tolerances::default()).unwrap();
        assert_eq!(m.status(), (1, "irregular".to_string()));
        assert!(matches!(m.diagnostics[0], Diagnostic::SliceGridMismatch { nunique: 3, .. }));
    }

    #[test]
    fn test_infer_irregular_band() {
        let m = timing_to_pattern(&[0.0, 3.0, 1.0, 2.0], &Tolerances::default()).unwrap();
        assert_eq!(m.status(), (1, "irregular".to_string()));
        assert!(m.diagnostics.is_empty());
    }

    #[test]
    fn test_infer_approximate_grid() {
        let m = timing_to_pattern(&[0.0, 1.02, 1.98, 3.0], &Tolerances::default()).unwrap();
        assert_eq!(m.pattern(), Some(SlicePattern::SeqPlus));
        assert!(matches!(
            m.diagnostics[0],
            Diagnostic::ApproximateSliceGrid { count: 2, total: 4, .. }
        ));
        assert_relative_eq!(m.resolution, 0.06, epsilon = 1e-9);
    }

    #[test]
    fn test_infer_rejects_nan() {
        assert!(matches!(
            timing_to_pattern(&[0.0, f64::NAN], &Tolerances::default()),
            Err(Error::NonFiniteTime { index: 1, .. })
        ));
        assert_eq!(
            timing_to_pattern(&[], &Tolerances::default()),
            Err(Error::InvalidSliceCount(0))
        );
    }

    #[test]
    fn test_numerical_resolution() {
        assert_eq!(numerical_resolution(&[0.0, 1.0, 2.0]), 0.0);
        assert_eq!(numerical_resolution(&[5.0]), 0.0);
        assert_relative_eq!(numerical_resolution(&[0.0, 1.0, 3.0]), 1.0);
    }
}
