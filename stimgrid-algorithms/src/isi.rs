//! Inter-stimulus interval and rest statistics.

use std::fmt;

use stimgrid_core::{Diagnostic, Error, Result, Summary, TimingStore, Tolerances};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rest and stimulus durations of one run (seconds).
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunIsi {
    /// Run length used for the post-stimulus rest.
    pub run_length: f64,
    /// Rest before the first onset.
    pub pre: f64,
    /// Rest after the last event end.
    pub post: f64,
    /// Rest between consecutive events.
    pub isis: Vec<f64>,
    /// Stimulus durations, shortened where events overlapped.
    pub durations: Vec<f64>,
}

impl RunIsi {
    /// Total stimulus time.
    #[must_use]
    pub fn stim_time(&self) -> f64 {
        self.durations.iter().sum()
    }

    /// Total rest between events.
    #[must_use]
    pub fn isi_time(&self) -> f64 {
        self.isis.iter().sum()
    }
}

/// ISI statistics over all runs.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IsiStats {
    /// Per-run durations.
    pub runs: Vec<RunIsi>,
    /// Pre-stimulus rest across runs.
    pub pre: Summary,
    /// Post-stimulus rest across runs.
    pub post: Summary,
    /// ISIs of each run.
    pub isi_per_run: Vec<Summary>,
    /// ISIs of all runs.
    pub isi_all: Summary,
    /// Stimulus durations of all runs.
    pub stim_all: Summary,
    /// Overlap corrections.
    pub diagnostics: Vec<Diagnostic>,
}

impl IsiStats {
    /// Summed run time.
    #[must_use]
    pub fn total_time(&self) -> f64 {
        self.runs.iter().map(|r| r.run_length).sum()
    }

    /// Summed stimulus time.
    #[must_use]
    pub fn stim_time(&self) -> f64 {
        self.runs.iter().map(RunIsi::stim_time).sum()
    }

    /// Run time not covered by stimuli.
    #[must_use]
    pub fn rest_time(&self) -> f64 {
        self.total_time() - self.stim_time()
    }

    /// Summed rest between events.
    #[must_use]
    pub fn isi_time(&self) -> f64 {
        self.runs.iter().map(RunIsi::isi_time).sum()
    }

    /// Summed pre-stimulus rest.
    #[must_use]
    pub fn pre_time(&self) -> f64 {
        self.runs.iter().map(|r| r.pre).sum()
    }

    /// Summed post-stimulus rest.
    #[must_use]
    pub fn post_time(&self) -> f64 {
        self.runs.iter().map(|r| r.post).sum()
    }

    /// Number of stimuli.
    #[must_use]
    pub fn num_stim(&self) -> usize {
        self.runs.iter().map(|r| r.durations.len()).sum()
    }

    /// Per run `[pre, isi..., post]`.
    #[must_use]
    pub fn rest_durations(&self) -> Vec<Vec<f64>> {
        self.runs
            .iter()
            .map(|run| {
                let mut rest = Vec::with_capacity(run.isis.len() + 2);
                rest.push(run.pre);
                rest.extend_from_slice(&run.isis);
                rest.push(run.post);
                rest
            })
            .collect()
    }
}

/// Computes ISI statistics.
///
/// `run_lengths` may be empty (each run ends at its last event), a single
/// value for every run, or one value per run. Overlaps larger than
/// `tolerances.overlap_tolerance` become a zero ISI and shorten the later
/// stimulus.
///
/// # Errors
///
/// Returns [`Error::RunCountMismatch`] for any other number of run lengths,
/// [`Error::NegativeOnset`] for a negative first onset and
/// [`Error::EventExceedsRun`] when a run ends before its last event.
pub fn isi_stats(
    store: &TimingStore,
    run_lengths: &[f64],
    tolerances: &Tolerances,
) -> Result<IsiStats> {
    let lengths = if run_lengths.is_empty() {
        vec![0.0; store.nrows()]
    } else {
        store.expand_run_lengths(run_lengths)?
    };
    log::debug!("isi_stats: {} runs", store.nrows());

    let mut diagnostics = Vec::new();
    let mut runs = Vec::with_capacity(store.nrows());
    for (run_index, (times, &length)) in store
        .start_end_times(true)
        .iter()
        .zip(&lengths)
        .enumerate()
    {
        runs.push(run_isi(run_index, times, length, tolerances, &mut diagnostics)?);
    }
    crate::warn_diagnostics(&diagnostics);

    let pre: Vec<f64> = runs.iter().map(|r| r.pre).collect();
    let post: Vec<f64> = runs.iter().map(|r| r.post).collect();
    let all_isi: Vec<f64> = runs.iter().flat_map(|r| r.isis.iter().copied()).collect();
    let all_stim: Vec<f64> = runs
        .iter()
        .flat_map(|r| r.durations.iter().copied())
        .collect();

    Ok(IsiStats {
        pre: Summary::from_values(&pre),
        post: Summary::from_values(&post),
        isi_per_run: runs.iter().map(|r| Summary::from_values(&r.isis)).collect(),
        isi_all: Summary::from_values(&all_isi),
        stim_all: Summary::from_values(&all_stim),
        runs,
        diagnostics,
    })
}

fn run_isi(
    run: usize,
    times: &[(f64, f64)],
    length: f64,
    tolerances: &Tolerances,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<RunIsi> {
    let (Some(&(first_onset, _)), Some(&(_, last_end))) = (times.first(), times.last()) else {
        return Ok(RunIsi {
            run_length: length,
            pre: length,
            ..RunIsi::default()
        });
    };

    let run_length = if length > 0.0 { length } else { last_end };
    if run_length < last_end {
        return Err(Error::EventExceedsRun {
            run,
            end: last_end,
            run_length,
        });
    }
    if first_onset < 0.0 {
        return Err(Error::NegativeOnset {
            run,
            onset: first_onset,
        });
    }

    let mut durations: Vec<f64> = times.iter().map(|(s, e)| e - s).collect();
    let mut isis = Vec::with_capacity(times.len().saturating_sub(1));
    let mut count = 0;
    let mut total = 0.0;
    for (index, pair) in times.windows(2).enumerate() {
        let mut isi = pair[1].0 - pair[0].1;
        let overlap = -isi;
        if overlap > tolerances.overlap_tolerance {
            isi = 0.0;
            durations[index + 1] = (durations[index + 1] - overlap).max(0.0);
            count += 1;
            total += overlap;
        }
        isis.push(isi);
    }
    if count > 0 {
        diagnostics.push(Diagnostic::OverlapAdjusted { run, count, total });
    }

    Ok(RunIsi {
        run_length,
        pre: first_onset,
        post: run_length - last_end,
        isis,
        durations,
    })
}

impl fmt::Display for IsiStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let per_run = |value: &dyn Fn(&RunIsi) -> f64| -> String {
            self.runs
                .iter()
                .map(|r| format!("{:.1}", value(r)))
                .collect::<Vec<_>>()
                .join(", ")
        };

        writeln!(f, "ISI statistics ({} elements) :", self.num_stim())?;
        writeln!(f)?;
        writeln!(f, "                        total      per run")?;
        writeln!(f, "                       ------      ------------------------------")?;
        writeln!(f, "    total time        {:7.1}      {}", self.total_time(), per_run(&|r| r.run_length))?;
        writeln!(f, "    total time: stim  {:7.1}      {}", self.stim_time(), per_run(&RunIsi::stim_time))?;
        writeln!(
            f,
            "    total time: rest  {:7.1}      {}",
            self.rest_time(),
            per_run(&|r| r.run_length - r.stim_time())
        )?;
        writeln!(f)?;
        writeln!(f, "    rest: total isi   {:7.1}      {}", self.isi_time(), per_run(&RunIsi::isi_time))?;
        writeln!(f, "    rest: pre stim    {:7.1}      {}", self.pre_time(), per_run(&|r| r.pre))?;
        writeln!(f, "    rest: post stim   {:7.1}      {}", self.post_time(), per_run(&|r| r.post))?;
        writeln!(f)?;
        let counts: Vec<String> = self.runs.iter().map(|r| r.durations.len().to_string()).collect();
        writeln!(f, "    num stimuli       {:7}      {}", self.num_stim(), counts.join(", "))?;
        writeln!(f)?;
        writeln!(f, "                         min      mean     max     stdev")?;
        writeln!(f, "                       -------  -------  -------  -------")?;
        writeln!(f, "    pre-stim rest    {}", self.pre)?;
        writeln!(f, "    post-stim rest   {}", self.post)?;
        writeln!(f)?;
        for (run, summary) in self.isi_per_run.iter().enumerate() {
            writeln!(f, "    run #{run:<3} ISI     {summary}")?;
        }
        writeln!(f)?;
        writeln!(f, "    all runs ISI     {}", self.isi_all)?;
        write!(f, "    all runs stimuli {}", self.stim_all)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_relative_eq;
    use stimgrid_core::Event;

    fn store(runs: &[Vec<(f64, f64)>]) -> TimingStore {
        TimingStore::from_runs(
            runs.iter()
                .map(|run| run.iter().map(|&(t, d)| Event::new(t, d)).collect())
                .collect(),
        )
    }

    #[test]
    fn test_basic_run() {
        let s = store(&[vec![(1.0, 1.0), (3.0, 1.0), (6.0, 1.0)]]);
        let stats = isi_stats(&s, &[10.0], &Tolerances::default()).unwrap();
        let run = &stats.runs[0];
        assert_eq!(run.pre, 1.0);
        assert_eq!(run.isis, vec![1.0, 2.0]);
        assert_eq!(run.post, 3.0);
        assert_eq!(stats.rest_durations(), vec![vec![1.0, 1.0, 2.0, 3.0]]);
        assert_eq!(stats.stim_time(), 3.0);
        assert_eq!(stats.rest_time(), 7.0);
        assert_relative_eq!(stats.isi_all.mean, 1.5);
    }

    #[test]
    fn test_no_run_lengths_uses_last_end() {
        let s = store(&[vec![(2.0, 1.0), (5.0, 2.0)]]);
        let stats = isi_stats(&s, &[], &Tolerances::default()).unwrap();
        assert_eq!(stats.runs[0].run_length, 7.0);
        assert_eq!(stats.runs[0].post, 0.0);
    }

    #[test]
    fn test_empty_run_is_all_rest() {
        let s = store(&[vec![(1.0, 1.0)], vec![]]);
        let stats = isi_stats(&s, &[8.0], &Tolerances::default()).unwrap();
        assert_eq!(stats.runs[1].pre, 8.0);
        assert_eq!(stats.runs[1].post, 0.0);
        assert_eq!(stats.num_stim(), 1);
        assert!(stats.isi_per_run[1].is_empty());
    }

    #[test]
    fn test_overlap_adjusted() {
        let s = store(&[vec![(0.0, 3.0), (2.0, 2.0)]]);
        let stats = isi_stats(&s, &[10.0], &Tolerances::default()).unwrap();
        assert_eq!(stats.runs[0].isis, vec![0.0]);
        assert_eq!(stats.runs[0].durations, vec![3.0, 1.0]);
        assert_eq!(
            stats.diagnostics,
            vec![Diagnostic::OverlapAdjusted {
                run: 0,
                count: 1,
                total: 1.0
            }]
        );
    }

    #[test]
    fn test_errors() {
        let s = store(&[vec![(1.0, 5.0)]]);
        assert!(matches!(
            isi_stats(&s, &[4.0], &Tolerances::default()),
            Err(Error::EventExceedsRun { run: 0, .. })
        ));
        let s = store(&[vec![(-1.0, 0.5)]]);
        assert!(matches!(
            isi_stats(&s, &[4.0], &Tolerances::default()),
            Err(Error::NegativeOnset { run: 0, .. })
        ));
        let s = store(&[vec![], vec![], vec![]]);
        assert!(matches!(
            isi_stats(&s, &[4.0, 4.0], &Tolerances::default()),
            Err(Error::RunCountMismatch { .. })
        ));
    }

    #[test]
    fn test_report_text() {
        let s = store(&[vec![(1.0, 1.0), (3.0, 1.0), (6.0, 1.0)]]);
        let text = isi_stats(&s, &[10.0], &Tolerances::default())
            .unwrap()
            .to_string();
        assert!(text.starts_with("ISI statistics (3 elements)"));
        assert!(text.contains("run #0"));
        assert!(text.contains("all runs stimuli"));
    }
}
