//! Stimulus event type.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single stimulus event within a run.
///
/// Times are in seconds, relative to the start of the run (or of the whole
/// session for global timing). Modulators are auxiliary per-event values
/// "married" to the onset, such as amplitudes.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    /// Start time in seconds.
    pub onset: f64,
    /// Duration in seconds.
    #[cfg_attr(feature = "serde", serde(default))]
    pub duration: f64,
    /// Amplitude modulators, possibly empty.
    #[cfg_attr(feature = "serde", serde(default))]
    pub modulators: Vec<f64>,
}

impl Event {
    /// Creates an event without modulators.
    #[inline]
    #[must_use]
    pub fn new(onset: f64, duration: f64) -> Self {
        Self {
            onset,
            duration,
            modulators: Vec::new(),
        }
    }

    /// Creates a zero-duration event at the given onset.
    #[inline]
    #[must_use]
    pub fn instant(onset: f64) -> Self {
        Self::new(onset, 0.0)
    }

    /// Attaches modulators to the event.
    #[must_use]
    pub fn with_modulators(mut self, modulators: Vec<f64>) -> Self {
        self.modulators = modulators;
        self
    }

    /// End time (`onset + duration`).
    #[inline]
    #[must_use]
    pub fn end(&self) -> f64 {
        self.onset + self.duration
    }

    /// First modulator, if any.
    #[inline]
    #[must_use]
    pub fn first_modulator(&self) -> Option<f64> {
        self.modulators.first().copied()
    }

    /// Returns true if the event carries at least one modulator.
    #[inline]
    #[must_use]
    pub fn is_married(&self) -> bool {
        !self.modulators.is_empty()
    }
}
