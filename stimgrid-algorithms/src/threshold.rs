//! Occupancy thresholding into 0/1 (or modulator) regressors.

use stimgrid_core::{Diagnostic, Error, Result, TimingStore};

use crate::grid::{discretize_runs, Cells, GridConfig};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Result of [`timing_to_1d`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Encoded {
    /// One value per TR cell: 1 (or the modulator) when occupied, else 0.
    pub values: Cells,
    /// Corrections applied under `allow_warnings`.
    pub diagnostics: Vec<Diagnostic>,
}

fn check_fraction(min_frac: f64) -> Result<()> {
    if (0.0..=1.0).contains(&min_frac) {
        Ok(())
    } else {
        Err(Error::InvalidFraction(min_frac))
    }
}

/// Maps each occupancy value to 1 if it reaches `min_frac`, else 0.
///
/// # Errors
///
/// Returns [`Error::InvalidFraction`] if `min_frac` is outside `[0, 1]`.
pub fn threshold(values: &[f64], min_frac: f64) -> Result<Vec<f64>> {
    check_fraction(min_frac)?;
    Ok(values
        .iter()
        .map(|&v| if v >= min_frac { 1.0 } else { 0.0 })
        .collect())
}

/// Converts event timing into a thresholded per-TR regressor.
///
/// A single run length is broadcast to all runs. With `write_mods`, occupied
/// cells carry the event's first modulator instead of 1.
///
/// # Errors
///
/// Returns [`Error::InvalidFraction`] for `min_frac` outside `[0, 1]`, plus
/// every error of [`crate::timing_to_tr_frac`].
pub fn timing_to_1d(
    store: &TimingStore,
    run_lengths: &[f64],
    min_frac: f64,
    config: &GridConfig,
) -> Result<Encoded> {
    check_fraction(min_frac)?;
    let lengths = store.expand_run_lengths(run_lengths)?;
    log::debug!("timing_to_1d: min_frac {min_frac}");

    let grids = discretize_runs(store, &lengths, config)?;
    crate::warn_diagnostics(&grids.diagnostics);

    let runs = match &grids.modulators {
        Some(mods) => grids
            .fractions
            .iter()
            .zip(mods)
            .map(|(fractions, mods)| {
                fractions
                    .iter()
                    .zip(mods)
                    .map(|(&f, &m)| if f >= min_frac { m } else { 0.0 })
                    .collect()
            })
            .collect(),
        None => grids
            .fractions
            .iter()
            .map(|fractions| {
                fractions
                    .iter()
                    .map(|&f| if f >= min_frac { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect(),
    };

    Ok(Encoded {
        values: Cells::from_runs(runs, config.per_run),
        diagnostics: grids.diagnostics,
    })
}
