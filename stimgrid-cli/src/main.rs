//! stimgrid CLI
//!
//! Converts stimulus timing files into TR-grid regressors, reports timing
//! statistics and generates or infers slice acquisition patterns.
#![allow(clippy::uninlined_format_args, clippy::too_many_lines)]

mod input;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;

use stimgrid_algorithms::{
    detailed_offset_stats, isi_stats, modulator_stats, offset_stats, pattern_to_timing,
    timing_to_1d, timing_to_pattern, timing_to_tr_frac, Cells, Discretized, GridConfig,
};
use stimgrid_core::{SlicePattern, TimingStore};

use input::{load_tolerances, read_timing};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Core(#[from] stimgrid_core::Error),
}

/// Stimulus timing discretization and slice-pattern tools.
#[derive(Parser)]
#[command(name = "stimgrid")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file overriding numeric tolerances
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging (debug level unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the grid subcommands.
#[derive(clap::Args)]
struct GridArgs {
    /// Timing JSON file
    input: PathBuf,

    /// Run lengths in seconds (one per run)
    #[arg(short = 'r', long = "run-len", required = true, num_args = 1..)]
    run_lengths: Vec<f64>,

    /// Repetition time (seconds)
    #[arg(long)]
    tr: f64,

    /// Print one row per run
    #[arg(long)]
    per_run: bool,

    /// Correct data problems with warnings instead of failing
    #[arg(long)]
    allow_warnings: bool,

    /// Write the first modulator instead of occupancy
    #[arg(long)]
    write_mods: bool,
}

impl GridArgs {
    fn config(&self, cli: &Cli) -> Result<GridConfig> {
        Ok(GridConfig::new(self.tr)
            .with_per_run(self.per_run)
            .with_allow_warnings(self.allow_warnings)
            .with_write_mods(self.write_mods)
            .with_tolerances(load_tolerances(cli.config.as_deref())?))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Convert event timing to per-TR occupancy fractions
    TrFrac(GridArgs),

    /// Convert event timing to a thresholded per-TR regressor
    #[command(name = "to-1d")]
    To1d {
        #[command(flatten)]
        grid: GridArgs,

        /// Minimum occupancy fraction for a TR to count
        #[arg(long, default_value = "0.5")]
        min_frac: f64,
    },

    /// Show ISI and rest statistics
    IsiStats {
        /// Timing JSON file
        input: PathBuf,

        /// Run lengths in seconds (none: each run ends at its last event)
        #[arg(short = 'r', long = "run-len", num_args = 1..)]
        run_lengths: Vec<f64>,

        /// Print per-run rest durations instead of the report
        #[arg(long)]
        rest: bool,
    },

    /// Show within-TR onset offset statistics
    OffsetStats {
        /// Timing JSON file
        input: PathBuf,

        /// Repetition time (seconds)
        #[arg(long)]
        tr: f64,

        /// Include fractional gap summaries per run
        #[arg(long)]
        detailed: bool,
    },

    /// Show amplitude modulator statistics
    ModStats {
        /// Timing JSON file
        input: PathBuf,
    },

    /// Convert one column of global times to per-run local times
    ToLocal {
        /// Timing JSON file
        input: PathBuf,

        /// Run lengths in seconds
        #[arg(short = 'r', long = "run-len", required = true, num_args = 1..)]
        run_lengths: Vec<f64>,
    },

    /// Convert per-run local times to one column of global times
    ToGlobal {
        /// Timing JSON file
        input: PathBuf,

        /// Run lengths in seconds
        #[arg(short = 'r', long = "run-len", required = true, num_args = 1..)]
        run_lengths: Vec<f64>,
    },

    /// Round onsets to multiples of the TR
    RoundTimes {
        /// Timing JSON file
        input: PathBuf,

        /// Repetition time (seconds)
        #[arg(long)]
        tr: f64,

        /// Fraction of a TR needed to round down (1 = floor, 0 = ceil)
        #[arg(long, default_value = "0.5")]
        round_frac: f64,
    },

    /// Generate slice times for a named pattern
    SliceTimes {
        /// Slice pattern (e.g. alt+z, seq-z, simult)
        pattern: SlicePattern,

        /// Number of slices
        nslices: usize,

        /// Repetition time (seconds, 0 for unscaled ranks)
        #[arg(long, default_value = "0")]
        tr: f64,

        /// Multiband level
        #[arg(long, default_value = "1")]
        mb: usize,
    },

    /// Infer the multiband level and pattern of slice times
    SlicePattern {
        /// Slice times (seconds)
        #[arg(required = true, allow_negative_numbers = true)]
        times: Vec<f64>,
    },
}

fn format_row(values: &[f64]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_cells(cells: &Cells) {
    for row in cells.rows() {
        println!("{}", format_row(row));
    }
}

/// Occupancy rows, followed by the modulator rows when they were written.
fn discretized_lines(out: &Discretized) -> Vec<String> {
    let mut rows = out.fractions.rows();
    if let Some(modulators) = &out.modulators {
        rows.extend(modulators.rows());
    }
    rows.into_iter().map(format_row).collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load(path: &Path) -> Result<TimingStore> {
    let store = read_timing(path)?;
    log::debug!(
        "read {} runs, {} events from {}",
        store.nrows(),
        store.num_events(),
        path.display()
    );
    Ok(store)
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::TrFrac(grid) => {
            let store = load(&grid.input)?;
            let out = timing_to_tr_frac(&store, &grid.run_lengths, &grid.config(cli)?)?;
            if cli.json {
                return print_json(&out);
            }
            for line in discretized_lines(&out) {
                println!("{}", line);
            }
        }

        Commands::To1d { grid, min_frac } => {
            let store = load(&grid.input)?;
            let out = timing_to_1d(&store, &grid.run_lengths, *min_frac, &grid.config(cli)?)?;
            if cli.json {
                return print_json(&out);
            }
            print_cells(&out.values);
        }

        Commands::IsiStats {
            input,
            run_lengths,
            rest,
        } => {
            let store = load(input)?;
            let tolerances = load_tolerances(cli.config.as_deref())?;
            let stats = isi_stats(&store, run_lengths, &tolerances)?;
            if cli.json {
                return print_json(&stats);
            }
            if *rest {
                for row in stats.rest_durations() {
                    println!("{}", format_row(&row));
                }
            } else {
                println!("{}", stats);
            }
        }

        Commands::OffsetStats {
            input,
            tr,
            detailed,
        } => {
            let store = load(input)?;
            let tolerances = load_tolerances(cli.config.as_deref())?;
            let stats = offset_stats(&store, *tr, &tolerances)?;
            let details = if *detailed {
                Some(detailed_offset_stats(&store, *tr)?)
            } else {
                None
            };
            if cli.json {
                return print_json(&(stats, details));
            }
            println!("{}", stats);
            if let Some(details) = details {
                println!();
                println!("{}", details);
            }
        }

        Commands::ModStats { input } => {
            let store = load(input)?;
            let stats = modulator_stats(&store)?;
            if cli.json {
                return print_json(&stats);
            }
            for column in &stats {
                println!("{}", column);
                println!();
            }
        }

        Commands::ToLocal { input, run_lengths } => {
            let mut store = load(input)?;
            for diagnostic in store.global_to_local(run_lengths)? {
                log::warn!("{}", diagnostic);
            }
            print_json(&store)?;
        }

        Commands::ToGlobal { input, run_lengths } => {
            let mut store = load(input)?;
            store.local_to_global(run_lengths)?;
            print_json(&store)?;
        }

        Commands::RoundTimes {
            input,
            tr,
            round_frac,
        } => {
            let mut store = load(input)?;
            let tolerances = load_tolerances(cli.config.as_deref())?;
            store.round_times_with(*tr, *round_frac, &tolerances)?;
            print_json(&store)?;
        }

        Commands::SliceTimes {
            pattern,
            nslices,
            tr,
            mb,
        } => {
            let times = pattern_to_timing(*pattern, *nslices, *tr, *mb)?;
            if cli.json {
                return print_json(&times);
            }
            println!("{}", format_row(&times));
        }

        Commands::SlicePattern { times } => {
            let tolerances = load_tolerances(cli.config.as_deref())?;
            let found = timing_to_pattern(times, &tolerances)?;
            if cli.json {
                return print_json(&found);
            }
            println!("{}", found);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(&cli)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_slice_times() {
        let cli = Cli::parse_from(["stimgrid", "slice-times", "alt+z", "6", "--tr", "3"]);
        match cli.command {
            Commands::SliceTimes {
                pattern, nslices, ..
            } => {
                assert_eq!(pattern, SlicePattern::AltPlus);
                assert_eq!(nslices, 6);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_pattern() {
        assert!(Cli::try_parse_from(["stimgrid", "slice-times", "spiral", "6"]).is_err());
    }

    #[test]
    fn test_parse_grid_args() {
        let cli = Cli::parse_from([
            "stimgrid", "to-1d", "t.json", "-r", "200", "210", "--tr", "2", "--min-frac", "0.3",
        ]);
        match cli.command {
            Commands::To1d { grid, min_frac } => {
                assert_eq!(grid.run_lengths, vec![200.0, 210.0]);
                assert!((min_frac - 0.3).abs() < 1e-12);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_tr_frac_lines_include_modulators() {
        let event = stimgrid_core::Event::new(0.0, 1.0).with_modulators(vec![3.0]);
        let store = TimingStore::from_runs(vec![vec![event]]);
        let config = GridConfig::new(2.0).with_write_mods(true);
        let out = timing_to_tr_frac(&store, &[4.0], &config).unwrap();
        assert_eq!(discretized_lines(&out), vec!["0.5 0", "3 0"]);

        let out = timing_to_tr_frac(&store, &[4.0], &GridConfig::new(2.0)).unwrap();
        assert_eq!(discretized_lines(&out), vec!["0.5 0"]);
    }

    #[test]
    fn test_format_row() {
        assert_eq!(format_row(&[0.75, 1.0, 0.0]), "0.75 1 0");
    }
}
