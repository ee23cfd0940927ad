//! Event timing to per-TR occupancy fractions.
//!
//! Each run is laid out on a grid of `ceil(run_length / tr)` cells. An event
//! covering `[start, end)` (in TR units) contributes the covered fraction of
//! every cell it touches. Distinct events sharing a cell accumulate, clamped
//! to 1.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use stimgrid_core::numeric::round_to;
use stimgrid_core::{Diagnostic, Error, Event, Result, TimingStore, Tolerances};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Discretizer configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct GridConfig {
    /// Repetition time (seconds).
    pub tr: f64,
    /// Keep one cell array per run instead of concatenating runs.
    pub per_run: bool,
    /// Downgrade data inconsistencies to recorded diagnostics.
    pub allow_warnings: bool,
    /// Carry each event's first modulator on the cells it touches.
    pub write_mods: bool,
    /// Numeric tolerances.
    pub tolerances: Tolerances,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            tr: 2.0,
            per_run: false,
            allow_warnings: false,
            write_mods: false,
            tolerances: Tolerances::default(),
        }
    }
}

impl GridConfig {
    /// Creates a configuration for the given TR.
    #[must_use]
    pub fn new(tr: f64) -> Self {
        Self {
            tr,
            ..Self::default()
        }
    }

    /// Set whether output is kept per run.
    #[must_use]
    pub fn with_per_run(mut self, per_run: bool) -> Self {
        self.per_run = per_run;
        self
    }

    /// Set whether data inconsistencies are downgraded to diagnostics.
    #[must_use]
    pub fn with_allow_warnings(mut self, allow: bool) -> Self {
        self.allow_warnings = allow;
        self
    }

    /// Set whether modulator values are written.
    #[must_use]
    pub fn with_write_mods(mut self, write_mods: bool) -> Self {
        self.write_mods = write_mods;
        self
    }

    /// Set the numeric tolerances.
    #[must_use]
    pub fn with_tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = tolerances;
        self
    }
}

/// Cell values, either concatenated across runs or kept per run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Cells {
    /// All runs concatenated.
    Flat(Vec<f64>),
    /// One array per run.
    PerRun(Vec<Vec<f64>>),
}

impl Cells {
    pub(crate) fn from_runs(runs: Vec<Vec<f64>>, per_run: bool) -> Self {
        if per_run {
            Self::PerRun(runs)
        } else {
            Self::Flat(runs.into_iter().flatten().collect())
        }
    }

    /// All values, runs concatenated.
    #[must_use]
    pub fn flatten(&self) -> Vec<f64> {
        match self {
            Self::Flat(values) => values.clone(),
            Self::PerRun(runs) => runs.iter().flatten().copied().collect(),
        }
    }

    /// Output rows: one for `Flat`, one per run for `PerRun`.
    #[must_use]
    pub fn rows(&self) -> Vec<&[f64]> {
        match self {
            Self::Flat(values) => vec![values.as_slice()],
            Self::PerRun(runs) => runs.iter().map(Vec::as_slice).collect(),
        }
    }

    /// Total number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(values) => values.len(),
            Self::PerRun(runs) => runs.iter().map(Vec::len).sum(),
        }
    }

    /// Returns true if there are no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum over all cells.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.rows().iter().flat_map(|row| row.iter()).sum()
    }
}

/// Result of [`timing_to_tr_frac`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Discretized {
    /// Occupancy fraction per TR cell, in `[0, 1]`.
    pub fractions: Cells,
    /// First modulator per TR cell, when modulators were written.
    pub modulators: Option<Cells>,
    /// Corrections applied under `allow_warnings`.
    pub diagnostics: Vec<Diagnostic>,
}

/// Per-run grids before output shaping.
pub(crate) struct RunGrids {
    pub fractions: Vec<Vec<f64>>,
    pub modulators: Option<Vec<Vec<f64>>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Converts event timing into per-TR occupancy fractions.
///
/// # Errors
///
/// Returns an error when the run lengths do not match the runs, `tr` is not
/// positive, a run length is negative, an event starts outside its run, or
/// (without `allow_warnings`) an event ends past its run or overlaps the
/// previous one.
pub fn timing_to_tr_frac(
    store: &TimingStore,
    run_lengths: &[f64],
    config: &GridConfig,
) -> Result<Discretized> {
    let grids = discretize_runs(store, run_lengths, config)?;
    crate::warn_diagnostics(&grids.diagnostics);
    Ok(Discretized {
        fractions: Cells::from_runs(grids.fractions, config.per_run),
        modulators: grids
            .modulators
            .map(|mods| Cells::from_runs(mods, config.per_run)),
        diagnostics: grids.diagnostics,
    })
}

pub(crate) fn discretize_runs(
    store: &TimingStore,
    run_lengths: &[f64],
    config: &GridConfig,
) -> Result<RunGrids> {
    if config.tr.is_nan() || config.tr <= 0.0 {
        return Err(Error::InvalidTr(config.tr));
    }
    store.check_run_count(run_lengths)?;
    if let Some((run, &length)) = run_lengths
        .iter()
        .enumerate()
        .find(|(_, l)| !l.is_finite() || **l < 0.0)
    {
        return Err(Error::InvalidRunLength { run, length });
    }
    log::debug!(
        "timing_to_tr_frac: {} runs, tr {}, per_run {}, allow_warnings {}, write_mods {}",
        store.nrows(),
        config.tr,
        config.per_run,
        config.allow_warnings,
        config.write_mods
    );

    let mut diagnostics = Vec::new();
    let write_mods = config.write_mods && {
        let missing = store.runs().iter().enumerate().find_map(|(run, events)| {
            events
                .iter()
                .position(|e| !e.is_married())
                .map(|index| (run, index))
        });
        match missing {
            Some((run, index)) => {
                diagnostics.push(Diagnostic::ModulatorsMissing { run, index });
                false
            }
            None => true,
        }
    };

    let mut fractions = Vec::with_capacity(store.nrows());
    let mut modulators = write_mods.then(|| Vec::with_capacity(store.nrows()));
    for (run_index, (events, &run_length)) in store.runs().iter().zip(run_lengths).enumerate() {
        let grid = RunGrid::build(run_index, events, run_length, config, &mut diagnostics)?;
        let (cells, mods) = grid.fill(write_mods, config.tolerances.tr_decimals);
        fractions.push(cells);
        if let (Some(all), Some(mods)) = (modulators.as_mut(), mods) {
            all.push(mods);
        }
    }

    Ok(RunGrids {
        fractions,
        modulators,
        diagnostics,
    })
}

/// One run's events in TR units, validated and overlap-corrected.
struct RunGrid {
    ncells: usize,
    /// `(start, end, first modulator)` per event, sorted by start.
    spans: Vec<(f64, f64, f64)>,
}

impl RunGrid {
    fn build(
        run: usize,
        events: &[Event],
        run_length: f64,
        config: &GridConfig,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Self> {
        let tr = config.tr;
        let tol = &config.tolerances;
        let places = tol.tr_decimals;

        let mut sorted: Vec<&Event> = events.iter().collect();
        sorted.sort_by(|a, b| a.onset.total_cmp(&b.onset));

        let mut spans = Vec::with_capacity(sorted.len());
        for event in sorted {
            let onset = event.onset;
            if onset < 0.0 {
                return Err(Error::NegativeOnset { run, onset });
            }
            if onset > run_length {
                return Err(Error::EventAfterRun {
                    run,
                    onset,
                    run_length,
                });
            }
            let mut end = event.end();
            if end > run_length {
                if !config.allow_warnings {
                    return Err(Error::EventExceedsRun {
                        run,
                        end,
                        run_length,
                    });
                }
                let new_end = onset + tol.truncate_fraction * (run_length - onset);
                diagnostics.push(Diagnostic::EventTruncated {
                    run,
                    onset,
                    end,
                    new_end,
                    run_length,
                });
                end = new_end;
            }
            spans.push((
                round_to(onset / tr, places),
                round_to(end / tr, places),
                event.first_modulator().unwrap_or(0.0),
            ));
        }

        let mut count = 0;
        let mut total = 0.0;
        for index in 1..spans.len() {
            let start = spans[index].0;
            let previous_end = spans[index - 1].1;
            let overlap = (previous_end - start) * tr;
            if overlap > tol.overlap_tolerance {
                if !config.allow_warnings {
                    return Err(Error::EventOverlap {
                        run,
                        index,
                        previous: previous_end * tr,
                        onset: start * tr,
                    });
                }
                spans[index - 1].1 = start;
                count += 1;
                total += overlap;
            }
        }
        if count > 0 {
            diagnostics.push(Diagnostic::OverlapAdjusted { run, count, total });
        }

        let ncells = (run_length / tr).ceil() as usize;
        Ok(Self { ncells, spans })
    }

    fn fill(&self, write_mods: bool, places: i32) -> (Vec<f64>, Option<Vec<f64>>) {
        let mut cells = vec![0.0; self.ncells];
        let mut mods = write_mods.then(|| vec![0.0; self.ncells]);

        let add = |cells: &mut [f64], index: usize, value: f64| {
            if let Some(cell) = cells.get_mut(index) {
                *cell = (*cell + value).min(1.0);
            }
        };

        for &(start, end, modulator) in &self.spans {
            let first = start.floor() as usize;
            let last = end.floor() as usize;
            if first >= self.ncells {
                continue;
            }
            if first == last {
                add(&mut cells, first, round_to(end - start, places));
            } else {
                add(&mut cells, first, round_to(1.0 - (start - start.floor()), places));
                for index in first + 1..last {
                    add(&mut cells, index, 1.0);
                }
                add(&mut cells, last, round_to(end - end.floor(), places));
            }
            if let Some(mods) = mods.as_mut() {
                let upper = last.min(self.ncells - 1);
                for cell in &mut mods[first..=upper] {
                    *cell = modulator;
                }
            }
        }
        (cells, mods)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_relative_eq;

    fn store(events: Vec<Vec<Event>>) -> TimingStore {
        TimingStore::from_runs(events)
    }

    #[test]
    fn test_partial_cells() {
        let s = store(vec![vec![Event::new(0.5, 3.0)]]);
        let out = timing_to_tr_frac(&s, &[4.0], &GridConfig::new(2.0)).unwrap();
        assert_eq!(out.fractions, Cells::Flat(vec![0.75, 0.75]));
        assert_relative_eq!(out.fractions.sum(), 1.5);
        assert!(out.diagnostics.is_empty());
        assert!(out.modulators.is_none());
    }

    #[test]
    fn test_single_cell_event() {
        let s = store(vec![vec![Event::new(2.2, 0.6)]]);
        let out = timing_to_tr_frac(&s, &[6.0], &GridConfig::new(2.0)).unwrap();
        assert_eq!(out.fractions, Cells::Flat(vec![0.0, 0.3, 0.0]));
    }

    #[test]
    fn test_middle_cells_full() {
        let s = store(vec![vec![Event::new(1.0, 6.0)]]);
        let out = timing_to_tr_frac(&s, &[10.0], &GridConfig::new(2.0)).unwrap();
        assert_eq!(out.fractions.flatten(), vec![0.5, 1.0, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_event_ending_on_run_boundary() {
        let s = store(vec![vec![Event::new(2.0, 2.0)]]);
        let out = timing_to_tr_frac(&s, &[4.0], &GridConfig::new(2.0)).unwrap();
        assert_eq!(out.fractions.flatten(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_partial_last_tr_gets_a_cell() {
        let s = store(vec![vec![Event::new(0.0, 1.0)]]);
        let out = timing_to_tr_frac(&s, &[4.0004], &GridConfig::new(2.0)).unwrap();
        assert_eq!(out.fractions.flatten(), vec![0.5, 0.0, 0.0]);

        let out = timing_to_tr_frac(&s, &[200.0004], &GridConfig::new(2.0)).unwrap();
        assert_eq!(out.fractions.len(), 101);
    }

    #[test]
    fn test_shared_cell_accumulates() {
        let s = store(vec![vec![Event::new(0.0, 0.5), Event::new(1.0, 0.5)]]);
        let out = timing_to_tr_frac(&s, &[2.0], &GridConfig::new(2.0)).unwrap();
        assert_eq!(out.fractions.flatten(), vec![0.5]);
    }

    #[test]
    fn test_per_run_output() {
        let s = store(vec![vec![Event::new(0.0, 2.0)], vec![Event::new(2.0, 1.0)]]);
        let config = GridConfig::new(2.0).with_per_run(true);
        let out = timing_to_tr_frac(&s, &[4.0, 4.0], &config).unwrap();
        assert_eq!(
            out.fractions,
            Cells::PerRun(vec![vec![1.0, 0.0], vec![0.0, 0.5]])
        );
        assert_eq!(out.fractions.rows().len(), 2);
    }

    #[test]
    fn test_precondition_errors() {
        let s = store(vec![vec![Event::new(0.0, 1.0)]]);
        assert_eq!(
            timing_to_tr_frac(&s, &[4.0], &GridConfig::new(0.0)),
            Err(Error::InvalidTr(0.0))
        );
        assert_eq!(
            timing_to_tr_frac(&s, &[4.0, 4.0], &GridConfig::new(2.0)),
            Err(Error::RunCountMismatch { runs: 1, lengths: 2 })
        );
        assert!(matches!(
            timing_to_tr_frac(&s, &[-1.0], &GridConfig::new(2.0)),
            Err(Error::InvalidRunLength { run: 0, .. })
        ));
    }

    #[test]
    fn test_event_after_run_is_always_error() {
        let s = store(vec![vec![Event::new(5.0, 1.0)]]);
        let config = GridConfig::new(2.0).with_allow_warnings(true);
        assert!(matches!(
            timing_to_tr_frac(&s, &[4.0], &config),
            Err(Error::EventAfterRun { run: 0, .. })
        ));
    }

    #[test]
    fn test_event_exceeding_run() {
        let s = store(vec![vec![Event::new(2.0, 4.0)]]);
        assert!(matches!(
            timing_to_tr_frac(&s, &[4.0], &GridConfig::new(2.0)),
            Err(Error::EventExceedsRun { run: 0, .. })
        ));

        let config = GridConfig::new(2.0).with_allow_warnings(true);
        let out = timing_to_tr_frac(&s, &[4.0], &config).unwrap();
        assert_eq!(out.diagnostics.len(), 1);
        match &out.diagnostics[0] {
            Diagnostic::EventTruncated { new_end, .. } => assert_relative_eq!(*new_end, 3.98),
            other => panic!("unexpected diagnostic {other:?}"),
        }
        assert_eq!(out.fractions.flatten(), vec![0.0, 0.99]);
    }

    #[test]
    fn test_overlap() {
        let s = store(vec![vec![Event::new(0.0, 3.0), Event::new(2.0, 1.0)]]);
        assert!(matches!(
            timing_to_tr_frac(&s, &[6.0], &GridConfig::new(2.0)),
            Err(Error::EventOverlap { run: 0, index: 1, .. })
        ));

        let config = GridConfig::new(2.0).with_allow_warnings(true);
        let out = timing_to_tr_frac(&s, &[6.0], &config).unwrap();
        assert_eq!(
            out.diagnostics,
            vec![Diagnostic::OverlapAdjusted {
                run: 0,
                count: 1,
                total: 1.0
            }]
        );
        assert_eq!(out.fractions.flatten(), vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_touching_events_are_not_overlap() {
        let s = store(vec![vec![Event::new(0.0, 2.0), Event::new(2.0, 2.0)]]);
        let out = timing_to_tr_frac(&s, &[4.0], &GridConfig::new(2.0)).unwrap();
        assert_eq!(out.fractions.flatten(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_write_mods() {
        let s = store(vec![vec![
            Event::new(0.0, 3.0).with_modulators(vec![2.5, 9.0]),
            Event::new(6.0, 1.0).with_modulators(vec![-1.0]),
        ]]);
        let config = GridConfig::new(2.0).with_write_mods(true);
        let out = timing_to_tr_frac(&s, &[8.0], &config).unwrap();
        assert_eq!(
            out.modulators,
            Some(Cells::Flat(vec![2.5, 2.5, 0.0, -1.0]))
        );
    }

    #[test]
    fn test_write_mods_disabled_when_missing() {
        let s = store(vec![vec![
            Event::new(0.0, 1.0).with_modulators(vec![2.0]),
            Event::new(4.0, 1.0),
        ]]);
        let config = GridConfig::new(2.0).with_write_mods(true);
        let out = timing_to_tr_frac(&s, &[8.0], &config).unwrap();
        assert!(out.modulators.is_none());
        assert_eq!(
            out.diagnostics,
            vec![Diagnostic::ModulatorsMissing { run: 0, index: 1 }]
        );
    }

    #[test]
    fn test_unsorted_input() {
        let s = store(vec![vec![Event::new(4.0, 1.0), Event::new(0.0, 1.0)]]);
        let out = timing_to_tr_frac(&s, &[6.0], &GridConfig::new(2.0)).unwrap();
        assert_eq!(out.fractions.flatten(), vec![0.5, 0.0, 0.5]);
    }
}
