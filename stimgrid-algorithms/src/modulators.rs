//! Amplitude modulator statistics.

use std::fmt;

use stimgrid_core::{Error, Result, Summary, TimingStore};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Statistics of one modulator column.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModulatorStats {
    /// Zero-based modulator index.
    pub index: usize,
    /// Summary per run.
    pub per_run: Vec<Summary>,
    /// Summary over all runs.
    pub overall: Summary,
}

/// Summarizes every modulator column, per run and overall.
///
/// Events with fewer modulators than a given column are left out of that
/// column's summaries.
///
/// # Errors
///
/// Returns [`Error::NoModulators`] if no event carries a modulator.
pub fn modulator_stats(store: &TimingStore) -> Result<Vec<ModulatorStats>> {
    let count = store.num_modulators();
    if count == 0 {
        return Err(Error::NoModulators);
    }
    log::debug!("modulator_stats: {count} modulators over {} runs", store.nrows());

    Ok((0..count)
        .map(|index| {
            let columns: Vec<Vec<f64>> = store
                .runs()
                .iter()
                .map(|run| {
                    run.iter()
                        .filter_map(|e| e.modulators.get(index).copied())
                        .collect()
                })
                .collect();
            let all: Vec<f64> = columns.iter().flatten().copied().collect();
            ModulatorStats {
                index,
                per_run: columns.iter().map(|c| Summary::from_values(c)).collect(),
                overall: Summary::from_values(&all),
            }
        })
        .collect())
}

impl fmt::Display for ModulatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "amplitude modulator {} :", self.index)?;
        writeln!(f, "                         min      mean     max     stdev")?;
        writeln!(f, "                       -------  -------  -------  -------")?;
        for (run, summary) in self.per_run.iter().enumerate() {
            writeln!(f, "    run #{run:<3}         {summary}")?;
        }
        write!(f, "    all runs         {}", self.overall)
    }
}
