//! Command-line parsing for the spectrum processing tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! transform/measurement code; `app` maps these structs onto library configs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::fit::{
    DEFAULT_CLIP_SIGMA, DEFAULT_KERNEL_SIZE, DEFAULT_MAX_ITERATIONS, DEFAULT_RESPONSE_SCALE, DEFAULT_WINDOW_LENGTH,
};
use crate::transform::DEFAULT_REDSHIFT_THRESHOLD;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cmost", version, about = "Survey spectrum preprocessing, Lick indices and continuum fitting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Measure Lick indices for a batch of spectra.
    Indices(IndicesArgs),
    /// Fit a robust continuum to one spectrum.
    Continuum(ContinuumArgs),
    /// Normalize, de-redshift and align a batch of spectra onto one grid.
    Preprocess(PreprocessArgs),
}

/// Target grid given as `START:END:STEP` (half-open, in Å).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridArg {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl GridArg {
    pub fn to_grid(self) -> Vec<f64> {
        crate::transform::arange(self.start, self.end, self.step)
    }
}

pub fn parse_grid(raw: &str) -> Result<GridArg, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    let [start, end, step] = parts.as_slice() else {
        return Err(format!("expected START:END:STEP, got '{raw}'"));
    };
    let num = |s: &str| s.trim().parse::<f64>().map_err(|_| format!("'{s}' is not a number"));
    let grid = GridArg {
        start: num(*start)?,
        end: num(*end)?,
        step: num(*step)?,
    };
    if !(grid.step > 0.0 && grid.end > grid.start) {
        return Err(format!("grid '{raw}' must have END > START and STEP > 0"));
    }
    Ok(grid)
}

/// Options shared by the stages that read files and redshift-correct them.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Accept spectra with nonzero Andmask/Ormask pixels.
    #[arg(long)]
    pub ignore_mask: bool,

    /// Reject spectra with |z| at or above this value.
    #[arg(long, default_value_t = DEFAULT_REDSHIFT_THRESHOLD)]
    pub redshift_threshold: f64,

    /// Skip the |z| threshold check.
    #[arg(long)]
    pub bypass_redshift_guard: bool,
}

#[derive(Debug, Args, Clone)]
pub struct IndicesArgs {
    /// Spectrum files.
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Index definition table (whitespace or CSV). Defaults to the builtin Lick table.
    #[arg(long, value_name = "PATH")]
    pub table: Option<PathBuf>,

    /// Min-max normalize flux first.
    #[arg(long)]
    pub normalize: bool,

    /// Remove the redshift given by the header `Z`.
    #[arg(long)]
    pub redshift: bool,

    /// Resample onto START:END:STEP before measuring.
    #[arg(long, value_parser = parse_grid, value_name = "START:END:STEP")]
    pub align: Option<GridArg>,

    /// Worker threads (default: CMOST_WORKERS or the number of CPUs).
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    #[command(flatten)]
    pub input: InputArgs,

    /// Write `id,<index...>` rows to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ContinuumArgs {
    /// Spectrum file.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Statistical window length (Å).
    #[arg(long, default_value_t = DEFAULT_WINDOW_LENGTH)]
    pub window_length: f64,

    /// Median filter kernel size.
    #[arg(long, default_value_t = DEFAULT_KERNEL_SIZE)]
    pub kernel_size: usize,

    /// Scale of the percentile response curve.
    #[arg(long, default_value_t = DEFAULT_RESPONSE_SCALE)]
    pub response_scale: f64,

    /// Sigma-clipping iteration cap.
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: usize,

    /// Rejection threshold in standard deviations.
    #[arg(long, default_value_t = DEFAULT_CLIP_SIGMA)]
    pub clip_sigma: f64,

    /// Min-max normalize flux first.
    #[arg(long)]
    pub normalize: bool,

    /// Remove the redshift given by the header `Z`.
    #[arg(long)]
    pub redshift: bool,

    #[command(flatten)]
    pub input: InputArgs,

    /// Write `wavelength,flux` of the continuum to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Write coefficients, domain and continuum grid to JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct PreprocessArgs {
    /// Spectrum files.
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Output grid (default 3700:9100:2).
    #[arg(long, value_parser = parse_grid, value_name = "START:END:STEP")]
    pub align: Option<GridArg>,

    /// Worker threads (default: CMOST_WORKERS or the number of CPUs).
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    #[command(flatten)]
    pub input: InputArgs,

    /// Write `id,<wavelength...>` flux rows to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn grid_argument_parses() {
        let grid = parse_grid("3700:9100:2").unwrap();
        assert_eq!(grid, GridArg { start: 3700.0, end: 9100.0, step: 2.0 });
        assert_eq!(grid.to_grid().len(), 2700);
        assert!(parse_grid("3700:9100").is_err());
        assert!(parse_grid("9100:3700:2").is_err());
        assert!(parse_grid("a:b:c").is_err());
    }

    #[test]
    fn indices_subcommand_parses() {
        let cli = Cli::parse_from([
            "cmost", "indices", "a.txt", "b.txt", "--normalize", "--align", "4000:5000:1", "-j", "3",
        ]);
        let Command::Indices(args) = cli.command else {
            panic!("expected indices");
        };
        assert_eq!(args.files.len(), 2);
        assert!(args.normalize && !args.redshift);
        assert_eq!(args.workers, Some(3));
        assert_eq!(args.align.map(|g| g.step), Some(1.0));
        assert_eq!(args.input.redshift_threshold, DEFAULT_REDSHIFT_THRESHOLD);
    }
}
