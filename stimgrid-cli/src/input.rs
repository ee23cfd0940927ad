//! JSON input: timing stores and tolerance overrides.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use stimgrid_core::{TimingStore, Tolerances};

use crate::Result;

/// Load a timing store from a JSON file of the form
/// `{"runs": [[{"onset": .., "duration": .., "modulators": [..]}, ..], ..]}`.
///
/// `duration` and `modulators` may be omitted.
pub fn read_timing<P: AsRef<Path>>(path: P) -> Result<TimingStore> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Load tolerance overrides from a JSON file; missing fields keep their defaults.
pub fn read_tolerances<P: AsRef<Path>>(path: P) -> Result<Tolerances> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Tolerances from an optional config file.
pub fn load_tolerances(path: Option<&Path>) -> Result<Tolerances> {
    match path {
        Some(path) => {
            log::debug!("loading tolerances from {}", path.display());
            read_tolerances(path)
        }
        None => Ok(Tolerances::default()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_timing_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"runs": [[{{"onset": 1.5}}, {{"onset": 4.0, "duration": 2.0, "modulators": [3.0]}}], []]}}"#
        )
        .unwrap();
        let store = read_timing(file.path()).unwrap();
        assert_eq!(store.nrows(), 2);
        let run = store.run(0).unwrap();
        assert_eq!(run[0].duration, 0.0);
        assert!(run[0].modulators.is_empty());
        assert_eq!(run[1].modulators, vec![3.0]);
        assert!(store.run(1).unwrap().is_empty());
    }

    #[test]
    fn test_read_timing_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"runs": [[{{"onset": 0.5, "duration": 3.0}}]]}}"#).unwrap();
        let store = read_timing(file.path()).unwrap();
        assert_eq!(store.onsets(), vec![vec![0.5]]);
    }

    #[test]
    fn test_read_timing_bad_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(read_timing(file.path()), Err(crate::CliError::Json(_))));
        assert!(matches!(
            read_timing("/nonexistent/timing.json"),
            Err(crate::CliError::Io(_))
        ));
    }

    #[test]
    fn test_partial_tolerances() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"overlap_tolerance": 0.01, "tr_decimals": 4}}"#).unwrap();
        let tol = load_tolerances(Some(file.path())).unwrap();
        assert_eq!(tol.overlap_tolerance, 0.01);
        assert_eq!(tol.tr_decimals, 4);
        assert_eq!(tol.near_lock_threshold, Tolerances::default().near_lock_threshold);
        assert_eq!(load_tolerances(None).unwrap(), Tolerances::default());
    }
}
