//! stimgrid-core: Core types for stimulus-timing discretization.
//!
//! This crate provides the data model shared by the grid discretizer,
//! the timing statistics and the slice-pattern engine: events and
//! per-run timing stores, the closed set of slice-acquisition patterns,
//! the error taxonomy, recorded diagnostics and tolerance configuration.
//!

pub mod diagnostic;
pub mod error;
pub mod event;
pub mod numeric;
pub mod pattern;
pub mod summary;
pub mod timing;
pub mod tolerance;

pub use diagnostic::Diagnostic;
pub use error::{Error, Result};
pub use event::Event;
pub use pattern::SlicePattern;
pub use summary::Summary;
pub use timing::{ModulatorKind, Partition, TimingStore};
pub use tolerance::Tolerances;
