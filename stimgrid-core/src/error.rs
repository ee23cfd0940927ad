//! Error types for stimgrid-core.

use thiserror::Error;

use crate::pattern::SlicePattern;

/// Result type alias for stimgrid operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Hard failures: violated preconditions and inconsistent data.
///
/// Run and event indices are zero-based.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// TR is non-positive (or negative where zero is allowed).
    #[error("invalid TR: {0}")]
    InvalidTr(f64),

    /// A fraction parameter fell outside `[0, 1]`.
    #[error("invalid fraction: {0} (must be in [0, 1])")]
    InvalidFraction(f64),

    /// A run length was negative or not finite.
    #[error("invalid length {length} for run {run}")]
    InvalidRunLength { run: usize, length: f64 },

    /// Run-length list does not line up with the runs in the store.
    #[error("have {lengths} run lengths but {runs} runs")]
    RunCountMismatch { runs: usize, lengths: usize },

    /// Run lengths are required but none were given.
    #[error("run lengths are required")]
    MissingRunLengths,

    /// Global timing rows differ in length.
    #[error("global timing is not rectangular")]
    NotRectangular,

    /// Global timing holds more than one event per row.
    #[error("global timing is not a single column (row length {0})")]
    NotSingleColumn(usize),

    /// Shifting a run to the offset would move its first event backwards past it.
    #[error("offset shift to {offset} too big for run {run} (first onset {first_onset})")]
    OffsetTooLarge {
        run: usize,
        offset: f64,
        first_onset: f64,
    },

    /// A stimulus begins after its run has ended.
    #[error("run {run}: stimulus at {onset} starts after end of run ({run_length})")]
    EventAfterRun {
        run: usize,
        onset: f64,
        run_length: f64,
    },

    /// A stimulus extends past the end of its run.
    #[error("run {run}: stimulus ends at {end}, after end of run ({run_length})")]
    EventExceedsRun { run: usize, end: f64, run_length: f64 },

    /// Two consecutive stimuli overlap in time.
    #[error("run {run}, index {index}: stimulus overlap (event times {previous} and {onset})")]
    EventOverlap {
        run: usize,
        index: usize,
        previous: f64,
        onset: f64,
    },

    /// A stimulus has a negative onset.
    #[error("run {run}: stimulus at negative time {onset}")]
    NegativeOnset { run: usize, onset: f64 },

    /// The store carries no amplitude modulators.
    #[error("no amplitude modulators in timing")]
    NoModulators,

    /// Partition labels are not shaped like the runs.
    #[error("partition labels do not match timing at run {run} ({labels} labels, {events} events)")]
    LabelMismatch {
        run: usize,
        labels: usize,
        events: usize,
    },

    /// Pattern name outside the closed set.
    #[error("invalid slice pattern '{0}'")]
    UnknownPattern(String),

    /// The pattern has no defined acquisition order.
    #[error("cannot make slice ordering from pattern '{0}'")]
    UnorderedPattern(SlicePattern),

    /// Slice count is unusable.
    #[error("invalid slice count: {0}")]
    InvalidSliceCount(usize),

    /// Multiband level must be at least 1.
    #[error("invalid multiband level: {0}")]
    InvalidMultiband(usize),

    /// Slice count is not a multiple of the multiband level.
    #[error("nslices ({nslices}) not a multiple of mblevel ({mblevel})")]
    MultibandMismatch { nslices: usize, mblevel: usize },

    /// A slice time was NaN or infinite.
    #[error("non-finite slice time at index {index}: {value}")]
    NonFiniteTime { index: usize, value: f64 },
}
