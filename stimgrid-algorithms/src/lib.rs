//! stimgrid-algorithms: Timing discretization and slice-pattern engines.
//!
//! This crate provides:
//! - **Grid discretizer** - per-event timing to per-TR occupancy fractions
//! - **Threshold encoder** - occupancy to 0/1 or modulator regressors
//! - **Timing statistics** - ISI, within-TR offset and modulator summaries
//! - **Slice patterns** - pattern to order/timing, and timing to pattern
//!
#![warn(missing_docs)]

mod grid;
mod isi;
mod modulators;
mod offsets;
pub mod slice;
mod threshold;

pub use grid::{timing_to_tr_frac, Cells, Discretized, GridConfig};
pub use isi::{isi_stats, IsiStats, RunIsi};
pub use modulators::{modulator_stats, ModulatorStats};
pub use offsets::{
    detailed_offset_stats, offset_stats, tr_offsets, DetailedOffsets, LockStatus, OffsetComment,
    OffsetStats, OffsetSummaries,
};
pub use slice::{
    numerical_resolution, pattern_to_order, pattern_to_timing, timing_to_pattern, PatternMatch,
    SliceOrder,
};
pub use threshold::{threshold, timing_to_1d, Encoded};

// Re-export the core data model
pub use stimgrid_core::{Diagnostic, Error, Event, Result, SlicePattern, TimingStore, Tolerances};

/// Logs every recorded diagnostic as a warning.
pub(crate) fn warn_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        log::warn!("{diagnostic}");
    }
}
