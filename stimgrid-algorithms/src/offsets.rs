//! Within-TR stimulus offset statistics and TR-lock detection.
#![allow(clippy::float_cmp)]

use std::fmt;

use stimgrid_core::numeric::{first_diffs, interval_offsets, unique_sorted};
use stimgrid_core::{Diagnostic, Error, Result, Summary, TimingStore, Tolerances};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Whether onsets are aligned to the TR grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LockStatus {
    /// Every onset is a multiple of the TR.
    Locked,
    /// Offsets are non-zero but all below the near-lock threshold.
    NearLocked,
    /// Offsets spread across the TR.
    Unlocked,
    /// No events to judge.
    NoEvents,
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Locked => "TR-locked",
            Self::NearLocked => "nearly TR-locked",
            Self::Unlocked => "not TR-locked",
            Self::NoEvents => "no events",
        };
        f.write_str(text)
    }
}

/// Summary of onset offsets within the TR.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OffsetStats {
    /// TR the offsets were taken against.
    pub tr: f64,
    /// Absolute offsets (seconds) of each run.
    pub per_run: Vec<Summary>,
    /// Absolute offsets (seconds) of all runs.
    pub overall: Summary,
    /// Offsets as a fraction of the TR.
    pub fraction: Summary,
    /// Largest absolute offset.
    pub max_offset: f64,
    /// TR-lock classification.
    pub status: LockStatus,
    /// Near-lock warning, if any.
    pub diagnostics: Vec<Diagnostic>,
}

/// Onset offsets within the TR, `onset mod tr` in `[0, tr)`, per run.
///
/// # Errors
///
/// Returns [`Error::InvalidTr`] if `tr` is not positive.
pub fn tr_offsets(store: &TimingStore, tr: f64) -> Result<Vec<Vec<f64>>> {
    if tr.is_nan() || tr <= 0.0 {
        return Err(Error::InvalidTr(tr));
    }
    Ok(store
        .onsets()
        .iter()
        .map(|onsets| interval_offsets(onsets, tr))
        .collect())
}

/// Summarizes within-TR offsets and classifies TR-locking.
///
/// # Errors
///
/// Returns [`Error::InvalidTr`] if `tr` is not positive.
pub fn offset_stats(store: &TimingStore, tr: f64, tolerances: &Tolerances) -> Result<OffsetStats> {
    let offsets = tr_offsets(store, tr)?;
    let all: Vec<f64> = offsets.iter().flatten().copied().collect();
    let fractions: Vec<f64> = all.iter().map(|o| o / tr).collect();

    let overall = Summary::from_values(&all);
    let fraction = Summary::from_values(&fractions);
    let max_offset = all.iter().copied().fold(0.0, f64::max);
    let max_fraction = max_offset / tr;
    let threshold = tolerances.near_lock_threshold;

    let mut diagnostics = Vec::new();
    let status = if all.is_empty() {
        LockStatus::NoEvents
    } else if max_fraction == 0.0 {
        LockStatus::Locked
    } else if threshold > 0.0 && fraction.min > 0.0 && max_fraction < threshold {
        diagnostics.push(Diagnostic::NearTrLocked {
            min_fraction: fraction.min,
            max_fraction,
            threshold,
        });
        LockStatus::NearLocked
    } else {
        LockStatus::Unlocked
    };
    log::debug!("offset_stats: tr {tr}, {} events, {status}", all.len());
    crate::warn_diagnostics(&diagnostics);

    Ok(OffsetStats {
        tr,
        per_run: offsets.iter().map(|o| Summary::from_values(o)).collect(),
        overall,
        fraction,
        max_offset,
        status,
        diagnostics,
    })
}

impl fmt::Display for OffsetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "within-TR stimulus offset statistics (tr = {}) :", self.tr)?;
        writeln!(f)?;
        writeln!(f, "                         min      mean     max     stdev")?;
        writeln!(f, "                       -------  -------  -------  -------")?;
        for (run, summary) in self.per_run.iter().enumerate() {
            writeln!(f, "    run #{run:<3} offsets {summary}")?;
        }
        writeln!(f)?;
        writeln!(f, "    all runs         {}", self.overall)?;
        writeln!(f, "    fractional       {}", self.fraction)?;
        writeln!(f)?;
        write!(f, "    max offset {:.3} s: {}", self.max_offset, self.status)
    }
}

/// Pattern noted in a summary of fractional offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OffsetComment {
    /// All zero.
    TrLock,
    /// All close to, but not on, a TR boundary.
    NearLock,
    /// All equal and non-zero.
    Constant,
}

impl OffsetComment {
    fn classify(summary: &Summary) -> Option<Self> {
        if summary.is_empty() {
            None
        } else if summary.min == 0.0 && summary.stdev == 0.0 {
            Some(Self::TrLock)
        } else if summary.min > 0.0 && summary.max < 0.1 {
            Some(Self::NearLock)
        } else if summary.min > 0.9 {
            Some(Self::NearLock)
        } else if summary.min > 0.0 && summary.stdev == 0.0 {
            Some(Self::Constant)
        } else {
            None
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::TrLock => "tr-lock",
            Self::NearLock => "~lock",
            Self::Constant => "const",
        }
    }
}

/// Four views of one set of offsets.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OffsetSummaries {
    /// Absolute offsets (seconds).
    pub raw: Summary,
    /// Offsets as a fraction of the TR.
    pub fraction: Summary,
    /// Note on `fraction`.
    pub fraction_comment: Option<OffsetComment>,
    /// Gaps between sorted fractional offsets, bracketed by 0 and 1.
    pub gaps: Summary,
    /// Note on `gaps`.
    pub gaps_comment: Option<OffsetComment>,
    /// Gaps between distinct fractional offsets, bracketed by 0 and 1.
    pub unique_gaps: Summary,
    /// Note on `unique_gaps`.
    pub unique_gaps_comment: Option<OffsetComment>,
}

impl OffsetSummaries {
    fn from_offsets(offsets: &[f64], tr: f64) -> Self {
        let fractions: Vec<f64> = offsets.iter().map(|o| o / tr).collect();

        let mut bracketed = fractions.clone();
        bracketed.sort_by(f64::total_cmp);
        if bracketed.first() != Some(&0.0) {
            bracketed.insert(0, 0.0);
        }
        if let Some(&last) = bracketed.last() {
            if last > 0.0 && last != 1.0 {
                bracketed.push(1.0);
            }
        }
        let gaps = first_diffs(&bracketed);
        let unique_gaps = first_diffs(&unique_sorted(&bracketed));

        let fraction = Summary::from_values(&fractions);
        let gaps = Summary::from_values(&gaps);
        let unique_gaps = Summary::from_values(&unique_gaps);
        Self {
            raw: Summary::from_values(offsets),
            fraction_comment: OffsetComment::classify(&fraction),
            fraction,
            gaps_comment: OffsetComment::classify(&gaps),
            gaps,
            unique_gaps_comment: OffsetComment::classify(&unique_gaps),
            unique_gaps,
        }
    }
}

/// Offset summaries per run and over all runs.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetailedOffsets {
    /// TR the offsets were taken against.
    pub tr: f64,
    /// One entry per run.
    pub per_run: Vec<OffsetSummaries>,
    /// All runs together.
    pub overall: OffsetSummaries,
}

/// Detailed within-TR offset statistics.
///
/// # Errors
///
/// Returns [`Error::InvalidTr`] if `tr` is not positive.
pub fn detailed_offset_stats(store: &TimingStore, tr: f64) -> Result<DetailedOffsets> {
    let offsets = tr_offsets(store, tr)?;
    let all: Vec<f64> = offsets.iter().flatten().copied().collect();
    Ok(DetailedOffsets {
        tr,
        per_run: offsets
            .iter()
            .map(|o| OffsetSummaries::from_offsets(o, tr))
            .collect(),
        overall: OffsetSummaries::from_offsets(&all, tr),
    })
}

fn write_summaries(f: &mut fmt::Formatter<'_>, label: &str, s: &OffsetSummaries) -> fmt::Result {
    let note = |c: Option<OffsetComment>| c.map_or("", OffsetComment::as_str);
    writeln!(f, "{label}")?;
    writeln!(f, "    raw offsets      {}", s.raw)?;
    writeln!(f, "    fractional       {}  {}", s.fraction, note(s.fraction_comment))?;
    writeln!(f, "    fractional gaps  {}  {}", s.gaps, note(s.gaps_comment))?;
    writeln!(f, "    unique gaps      {}  {}", s.unique_gaps, note(s.unique_gaps_comment))
}

impl fmt::Display for DetailedOffsets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "offset statistics (tr = {}) :", self.tr)?;
        writeln!(f, "                         min      mean     max     stdev")?;
        for (run, summaries) in self.per_run.iter().enumerate() {
            write_summaries(f, &format!("run #{run}"), summaries)?;
        }
        write_summaries(f, "all runs", &self.overall)
    }
}
