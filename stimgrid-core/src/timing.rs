//! Per-run stimulus timing store.
//!
//! A [`TimingStore`] holds one list of [`Event`]s per acquisition run. Runs
//! may be ragged and need not be sorted at rest; operations that depend on
//! order sort a working copy or sort in place explicitly.
//!
//! Mutating operations validate everything up front and leave the store
//! untouched when they return an error.
#![allow(clippy::cast_precision_loss)]

use std::collections::BTreeMap;

use crate::diagnostic::Diagnostic;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::tolerance::Tolerances;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stores keyed by partition label.
pub type Partition = BTreeMap<String, TimingStore>;

/// Kind of generated amplitude modulator for [`TimingStore::marry_modulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ModulatorKind {
    /// Onset as a fraction of the run length, in `[0, 1]`.
    LinRunFraction,
    /// One-based index of the event within its run.
    LinEventIndex,
}

/// Ordered sequence of runs, each an ordered sequence of events.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimingStore {
    runs: Vec<Vec<Event>>,
}

impl TimingStore {
    /// Creates an empty store (no runs).
    #[must_use]
    pub fn new() -> Self {
        Self { runs: Vec::new() }
    }

    /// Creates a store from per-run event lists.
    #[must_use]
    pub fn from_runs(runs: Vec<Vec<Event>>) -> Self {
        Self { runs }
    }

    /// Creates a store of zero-duration events from per-run onsets.
    #[must_use]
    pub fn from_onsets(onsets: &[Vec<f64>]) -> Self {
        Self::from_onsets_with_duration(onsets, 0.0)
    }

    /// Creates a store from per-run onsets sharing a single duration.
    #[must_use]
    pub fn from_onsets_with_duration(onsets: &[Vec<f64>], duration: f64) -> Self {
        onsets
            .iter()
            .map(|run| run.iter().map(|&t| Event::new(t, duration)).collect())
            .collect()
    }

    /// Returns the runs.
    #[must_use]
    pub fn runs(&self) -> &[Vec<Event>] {
        &self.runs
    }

    /// Returns one run, if present.
    #[must_use]
    pub fn run(&self, index: usize) -> Option<&[Event]> {
        self.runs.get(index).map(Vec::as_slice)
    }

    /// Consumes the store, returning the runs.
    #[must_use]
    pub fn into_runs(self) -> Vec<Vec<Event>> {
        self.runs
    }

    /// Appends a run.
    pub fn push_run(&mut self, run: Vec<Event>) {
        self.runs.push(run);
    }

    /// Number of runs (rows).
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.runs.len()
    }

    /// Total number of events across all runs.
    #[must_use]
    pub fn num_events(&self) -> usize {
        self.runs.iter().map(Vec::len).sum()
    }

    /// Returns true if no run holds an event.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(Vec::is_empty)
    }

    /// Per-run onset lists.
    #[must_use]
    pub fn onsets(&self) -> Vec<Vec<f64>> {
        self.runs
            .iter()
            .map(|run| run.iter().map(|e| e.onset).collect())
            .collect()
    }

    /// Returns true if any event carries a modulator.
    #[must_use]
    pub fn is_married(&self) -> bool {
        self.events().any(Event::is_married)
    }

    /// Largest number of modulators on any event.
    #[must_use]
    pub fn num_modulators(&self) -> usize {
        self.events().map(|e| e.modulators.len()).max().unwrap_or(0)
    }

    /// Latest event end over all runs (0 for an empty store).
    #[must_use]
    pub fn max_end(&self) -> f64 {
        self.events().map(Event::end).fold(0.0, f64::max)
    }

    /// Iterates over all events, run by run.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.runs.iter().flatten()
    }

    /// Stable-sorts each run by onset.
    pub fn sort(&mut self) {
        for run in &mut self.runs {
            run.sort_by(|a, b| a.onset.total_cmp(&b.onset));
        }
    }

    /// Sorted copy of the store.
    #[must_use]
    pub fn sorted(&self) -> Self {
        let mut copy = self.clone();
        copy.sort();
        copy
    }

    /// Per-run `(onset, end)` pairs, optionally sorted by onset.
    #[must_use]
    pub fn start_end_times(&self, sort: bool) -> Vec<Vec<(f64, f64)>> {
        self.runs
            .iter()
            .map(|run| {
                let mut times: Vec<(f64, f64)> = run.iter().map(|e| (e.onset, e.end())).collect();
                if sort {
                    times.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
                }
                times
            })
            .collect()
    }

    /// Fails unless there is exactly one run length per run.
    pub fn check_run_count(&self, run_lengths: &[f64]) -> Result<()> {
        if run_lengths.len() == self.nrows() {
            Ok(())
        } else {
            Err(Error::RunCountMismatch {
                runs: self.nrows(),
                lengths: run_lengths.len(),
            })
        }
    }

    /// Broadcasts a single run length across all runs; otherwise the lengths
    /// must match the run count.
    pub fn expand_run_lengths(&self, run_lengths: &[f64]) -> Result<Vec<f64>> {
        if run_lengths.len() == 1 && self.nrows() > 1 {
            return Ok(vec![run_lengths[0]; self.nrows()]);
        }
        self.check_run_count(run_lengths)?;
        Ok(run_lengths.to_vec())
    }

    /// Converts a single column of global times into per-run local times.
    ///
    /// The store must hold one event per row. Onsets are sorted and each run
    /// receives those before its cumulative end boundary, shifted so the run
    /// starts at zero. Onsets past the final boundary are kept in the last
    /// run and reported.
    pub fn global_to_local(&mut self, run_lengths: &[f64]) -> Result<Vec<Diagnostic>> {
        if run_lengths.is_empty() {
            return Err(Error::MissingRunLengths);
        }
        let Some(first) = self.runs.first() else {
            return Ok(Vec::new());
        };
        let row_len = first.len();
        if self.runs.iter().any(|run| run.len() != row_len) {
            return Err(Error::NotRectangular);
        }
        if row_len > 1 {
            return Err(Error::NotSingleColumn(row_len));
        }
        if row_len == 0 || self.runs.len() < 2 {
            return Ok(Vec::new());
        }

        let mut events: Vec<Event> = std::mem::take(&mut self.runs).into_iter().flatten().collect();
        events.sort_by(|a, b| a.onset.total_cmp(&b.onset));

        let mut pending = events.into_iter().peekable();
        let mut runs = Vec::with_capacity(run_lengths.len());
        let mut run_start = 0.0;
        let mut run_end = 0.0;
        for &length in run_lengths {
            run_start = run_end;
            run_end += length;
            let mut run = Vec::new();
            while let Some(mut event) = pending.next_if(|e| e.onset < run_end) {
                event.onset -= run_start;
                run.push(event);
            }
            runs.push(run);
        }

        let mut diagnostics = Vec::new();
        let leftover: Vec<Event> = pending
            .map(|mut event| {
                event.onset -= run_start;
                event
            })
            .collect();
        if !leftover.is_empty() {
            diagnostics.push(Diagnostic::EventsAfterLastRun {
                count: leftover.len(),
            });
            if let Some(last) = runs.last_mut() {
                last.extend(leftover);
            }
        }

        self.runs = runs;
        Ok(diagnostics)
    }

    /// Converts per-run local times into one global column.
    ///
    /// Each run's onsets are offset by the summed lengths of the preceding
    /// runs; the result holds one event per row, sorted by onset.
    pub fn local_to_global(&mut self, run_lengths: &[f64]) -> Result<()> {
        self.check_run_count(run_lengths)?;
        self.sort();

        let mut events = Vec::with_capacity(self.num_events());
        let mut run_start = 0.0;
        for (run, &length) in std::mem::take(&mut self.runs).into_iter().zip(run_lengths) {
            events.extend(run.into_iter().map(|mut event| {
                event.onset += run_start;
                event
            }));
            run_start += length;
        }
        events.sort_by(|a, b| a.onset.total_cmp(&b.onset));

        self.runs = events.into_iter().map(|event| vec![event]).collect();
        Ok(())
    }

    /// Adds `value` to every onset.
    pub fn add_val(&mut self, value: f64) {
        for event in self.runs.iter_mut().flatten() {
            event.onset += value;
        }
    }

    /// Multiplies every onset by `value`.
    pub fn scale_val(&mut self, value: f64) {
        for event in self.runs.iter_mut().flatten() {
            event.onset *= value;
        }
    }

    /// Shifts each run so its earliest onset lands on `offset`.
    pub fn shift_to_offset(&mut self, offset: f64) -> Result<()> {
        let mut shifted = self.sorted();
        for (run_index, run) in shifted.runs.iter_mut().enumerate() {
            let Some(first) = run.first() else {
                continue;
            };
            let diff = first.onset - offset;
            if diff < 0.0 {
                return Err(Error::OffsetTooLarge {
                    run: run_index,
                    offset,
                    first_onset: first.onset,
                });
            }
            for event in run.iter_mut() {
                event.onset -= diff;
            }
        }
        *self = shifted;
        Ok(())
    }

    /// Rounds every onset to a multiple of `tr` with the default tolerances.
    ///
    /// `round_frac` is the fraction of a TR required to round down:
    /// `1.0` always floors, `0.0` always ceils, `0.5` rounds to nearest.
    pub fn round_times(&mut self, tr: f64, round_frac: f64) -> Result<()> {
        self.round_times_with(tr, round_frac, &Tolerances::default())
    }

    /// Rounds every onset to a multiple of `tr`.
    ///
    /// For a fractional TR, `tolerances.round_epsilon` is applied before the
    /// floor or ceiling so that onsets already on the grid stay put.
    #[allow(clippy::float_cmp)]
    pub fn round_times_with(&mut self, tr: f64, round_frac: f64, tolerances: &Tolerances) -> Result<()> {
        if tr.is_nan() || tr <= 0.0 {
            return Err(Error::InvalidTr(tr));
        }
        if !(0.0..=1.0).contains(&round_frac) {
            return Err(Error::InvalidFraction(round_frac));
        }

        let tiny = if tr == tr.floor() {
            0.0
        } else {
            tolerances.round_epsilon
        };
        let bias = 1.0 - round_frac;

        for event in self.runs.iter_mut().flatten() {
            let index = event.onset / tr;
            event.onset = if round_frac == 0.0 {
                if index == 0.0 {
                    0.0
                } else {
                    (index - tiny).ceil() * tr
                }
            } else if round_frac == 1.0 {
                (index + tiny).floor() * tr
            } else {
                (index + bias).floor() * tr
            };
        }
        Ok(())
    }

    /// Applies one duration to every event.
    pub fn set_duration(&mut self, duration: f64) {
        for event in self.runs.iter_mut().flatten() {
            event.duration = duration;
        }
    }

    /// Appends the runs of `other` after the runs of this store.
    pub fn add_rows(&mut self, other: &TimingStore) {
        self.runs.extend(other.runs.iter().cloned());
    }

    /// Extends each run with the events of the matching run in `other`.
    pub fn extend_rows(&mut self, other: &TimingStore) -> Result<()> {
        if other.nrows() != self.nrows() {
            return Err(Error::RunCountMismatch {
                runs: self.nrows(),
                lengths: other.nrows(),
            });
        }
        for (run, extra) in self.runs.iter_mut().zip(&other.runs) {
            run.extend(extra.iter().cloned());
        }
        Ok(())
    }

    /// Appends a generated modulator to every event.
    ///
    /// `LinRunFraction` needs run lengths (a single length is broadcast) and
    /// optionally truncates the fraction to `places` decimals.
    pub fn marry_modulator(
        &mut self,
        kind: ModulatorKind,
        run_lengths: &[f64],
        places: Option<i32>,
    ) -> Result<()> {
        let lengths = match kind {
            ModulatorKind::LinEventIndex => Vec::new(),
            ModulatorKind::LinRunFraction => {
                if run_lengths.is_empty() {
                    return Err(Error::MissingRunLengths);
                }
                let lengths = self.expand_run_lengths(run_lengths)?;
                if let Some((run, &length)) = lengths
                    .iter()
                    .enumerate()
                    .find(|(_, l)| l.is_nan() || **l <= 0.0)
                {
                    return Err(Error::InvalidRunLength { run, length });
                }
                lengths
            }
        };

        for (run_index, run) in self.runs.iter_mut().enumerate() {
            for (index, event) in run.iter_mut().enumerate() {
                let value = match kind {
                    ModulatorKind::LinEventIndex => (index + 1) as f64,
                    ModulatorKind::LinRunFraction => {
                        let fraction = event.onset / lengths[run_index];
                        match places {
                            Some(places) if places >= 0 => {
                                let power = 10f64.powi(places);
                                (power * fraction).trunc() / power
                            }
                            _ => fraction,
                        }
                    }
                };
                event.modulators.push(value);
            }
        }
        Ok(())
    }

    /// Splits the store by per-event labels.
    ///
    /// `labels` must have the same shape as the runs. Each distinct label
    /// other than `"0"` yields a store with every run, holding only the
    /// events carrying that label.
    pub fn partition<S: AsRef<str>>(&self, labels: &[Vec<S>]) -> Result<Partition> {
        if labels.len() != self.nrows() {
            return Err(Error::RunCountMismatch {
                runs: self.nrows(),
                lengths: labels.len(),
            });
        }
        for (run_index, (run, run_labels)) in self.runs.iter().zip(labels).enumerate() {
            if run.len() != run_labels.len() {
                return Err(Error::LabelMismatch {
                    run: run_index,
                    labels: run_labels.len(),
                    events: run.len(),
                });
            }
        }

        let mut parts = Partition::new();
        for label in labels.iter().flatten().map(AsRef::as_ref) {
            if label == "0" || parts.contains_key(label) {
                continue;
            }
            let store = self
                .runs
                .iter()
                .zip(labels)
                .map(|(run, run_labels)| {
                    run.iter()
                        .zip(run_labels)
                        .filter(|(_, l)| l.as_ref() == label)
                        .map(|(event, _)| event.clone())
                        .collect()
                })
                .collect();
            parts.insert(label.to_string(), store);
        }
        Ok(parts)
    }
}

impl FromIterator<Vec<Event>> for TimingStore {
    fn from_iter<I: IntoIterator<Item = Vec<Event>>>(iter: I) -> Self {
        Self {
            runs: iter.into_iter().collect(),
        }
    }
}
