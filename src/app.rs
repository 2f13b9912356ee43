//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and `.env` defaults
//! - builds the transform/measurement pipeline
//! - runs the batch (or single-spectrum fit)
//! - prints reports and writes optional exports

use clap::Parser;
use log::warn;

use crate::cli::{Command, ContinuumArgs, IndicesArgs, PreprocessArgs};
use crate::error::AppError;

pub mod config;
pub mod pipeline;

use config::EnvDefaults;

/// Entry point for the `cmost` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    let env = EnvDefaults::load()?;

    match cli.command {
        Command::Indices(args) => handle_indices(args, &env),
        Command::Continuum(args) => handle_continuum(args),
        Command::Preprocess(args) => handle_preprocess(args, &env),
    }
}

fn handle_indices(args: IndicesArgs, env: &EnvDefaults) -> Result<(), AppError> {
    let spec = config::indices_pipeline(&args, env)?;
    let workers = env.resolve_workers(args.workers)?;
    let run = pipeline::run_batch(&args.files, spec, workers, args.input.ignore_mask)?;

    println!("{}", crate::report::format_batch_summary(&run.result, run.workers, run.elapsed));
    match run.result.index_table() {
        Some(table) => {
            println!("{}", crate::report::format_index_table(&table));
            if let Some(path) = &args.export {
                crate::io::write_index_table_csv(path, &table)?;
            }
        }
        None => warn!("no spectrum produced index values"),
    }
    Ok(())
}

fn handle_continuum(args: ContinuumArgs) -> Result<(), AppError> {
    let spec = config::continuum_pipeline(&args)?;
    let config = config::continuum_config(&args);
    let run = pipeline::run_continuum(&args.file, &spec.stages, &config, args.input.ignore_mask)?;

    let source = run.record.identifier().map(str::to_string);
    println!(
        "{}",
        crate::report::format_continuum_summary(source.as_deref().unwrap_or("<unnamed>"), &run.fit)
    );

    if let Some(path) = &args.export {
        crate::io::write_continuum_csv(path, &run.fit)?;
    }
    if let Some(path) = &args.export_json {
        crate::io::write_continuum_json(path, &run.fit, source.as_deref())?;
    }
    Ok(())
}

fn handle_preprocess(args: PreprocessArgs, env: &EnvDefaults) -> Result<(), AppError> {
    let spec = config::preprocess_pipeline(&args)?;
    let workers = env.resolve_workers(args.workers)?;
    let run = pipeline::run_batch(&args.files, spec, workers, args.input.ignore_mask)?;

    println!("{}", crate::report::format_batch_summary(&run.result, run.workers, run.elapsed));
    if let Some(path) = &args.export {
        match run.result.flux_table()? {
            Some(table) => crate::io::write_flux_table_csv(path, &table)?,
            None => warn!("no spectrum survived preprocessing; nothing written to {}", path.display()),
        }
    }
    Ok(())
}
