//! Recorded, non-fatal findings.
//!
//! Operations that can downgrade a data inconsistency to a warning return
//! the corrected result together with the diagnostics describing what was
//! changed. Nothing in this crate prints or logs them.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A non-fatal finding attached to a result. Run and event indices are zero-based.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Diagnostic {
    /// Global onsets beyond the final run boundary were appended to the last run.
    EventsAfterLastRun { count: usize },
    /// An event crossing the end of its run had its end pulled inside the run.
    EventTruncated {
        run: usize,
        onset: f64,
        end: f64,
        new_end: f64,
        run_length: f64,
    },
    /// Overlapping events in a run were adjusted; `total` is in seconds.
    OverlapAdjusted { run: usize, count: usize, total: f64 },
    /// Modulator output was requested but an event carries no modulator.
    ModulatorsMissing { run: usize, index: usize },
    /// Within-TR offsets are small but non-zero.
    NearTrLocked {
        min_fraction: f64,
        max_fraction: f64,
        threshold: f64,
    },
    /// Scaled slice times do not form the ranks `0..nunique`.
    SliceGridMismatch { grid: f64, nunique: usize },
    /// Some slice times are only approximately multiples of the slice grid.
    ApproximateSliceGrid {
        count: usize,
        total: usize,
        grid: f64,
        worst_index: usize,
        worst_deviation: f64,
    },
    /// Slice time count is not a whole number of repeated bands.
    MultibandIncomplete { ntimes: usize, nunique: usize },
    /// A multiband repetition differs from the first band.
    MultibandRepeatMismatch { band: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EventsAfterLastRun { count } => {
                write!(f, "global to local: {count} times after last run")
            }
            Self::EventTruncated {
                run,
                onset,
                end,
                new_end,
                run_length,
            } => write!(
                f,
                "run {run}: stim ends after end of run (onset {onset}, offset {end}, \
                 end of run {run_length}), truncated to {new_end}"
            ),
            Self::OverlapAdjusted { run, count, total } => write!(
                f,
                "run {run}: adjusted for {count} overlaps in stim, total = {total} s"
            ),
            Self::ModulatorsMissing { run, index } => write!(
                f,
                "run {run}, event {index}: no modulator to write, writing occupancy only"
            ),
            Self::NearTrLocked {
                min_fraction,
                max_fraction,
                threshold,
            } => write!(
                f,
                "small maxoff {max_fraction:.3} (min {min_fraction:.3}, limit {threshold}) \
                 suggests (almost) TR-locked stimuli"
            ),
            Self::SliceGridMismatch { grid, nunique } => write!(
                f,
                "{nunique} unique slice times are not multiples of expected {grid}"
            ),
            Self::ApproximateSliceGrid {
                count,
                total,
                grid,
                worst_index,
                worst_deviation,
            } => write!(
                f,
                "{count}/{total} slice times are only approx multiples of {grid} \
                 (max ind,diff = {worst_index}, {worst_deviation})"
            ),
            Self::MultibandIncomplete { ntimes, nunique } => write!(
                f,
                "{ntimes} slice times are not a whole number of bands of {nunique}"
            ),
            Self::MultibandRepeatMismatch { band } => {
                write!(f, "multiband repetition {band} differs from the first band")
            }
        }
    }
}
