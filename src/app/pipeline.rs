//! Shared run logic behind the subcommands.
//!
//! Batch subcommands go through the orchestrator; `continuum` works on a
//! single file and fails fast.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;

use crate::batch::{BatchInput, BatchOrchestrator, BatchResult, CancelToken, PipelineSpec};
use crate::domain::SpectrumRecord;
use crate::error::AppError;
use crate::fit::{ContinuumConfig, FitResult, fit_continuum};
use crate::io::{SpectrumDecoder, TextSpectrumDecoder};
use crate::transform::{TransformStage, apply_stages};

/// Outputs of one batch subcommand.
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub result: BatchResult,
    pub workers: usize,
    pub elapsed: Duration,
}

/// Batch ids are file names; a path whose file name is shared with another
/// input (or that has none) keeps its full path as given.
pub fn file_inputs(files: &[PathBuf]) -> Vec<(String, BatchInput)> {
    let mut seen: HashMap<&OsStr, usize> = HashMap::new();
    for name in files.iter().filter_map(|p| p.file_name()) {
        *seen.entry(name).or_default() += 1;
    }

    files
        .iter()
        .map(|p| {
            let id = match p.file_name() {
                Some(name) if seen.get(name) == Some(&1) => name.to_string_lossy().into_owned(),
                _ => p.display().to_string(),
            };
            (id, BatchInput::Path(p.clone()))
        })
        .collect()
}

pub fn run_batch(
    files: &[PathBuf],
    pipeline: PipelineSpec,
    workers: usize,
    ignore_mask: bool,
) -> Result<BatchRun, AppError> {
    let decoder: Arc<dyn SpectrumDecoder> = Arc::new(TextSpectrumDecoder::new(ignore_mask));
    let orchestrator = BatchOrchestrator::new(workers, decoder, pipeline)?;

    let started = Instant::now();
    let step = (files.len() / 10).max(1);
    let result = orchestrator.run_with(file_inputs(files), &CancelToken::new(), |p| {
        if p.completed % step == 0 || p.is_done() {
            info!("progress: {}/{}", p.completed, p.total);
        }
    })?;

    Ok(BatchRun {
        result,
        workers,
        elapsed: started.elapsed(),
    })
}

/// Outputs of a single-spectrum continuum fit.
#[derive(Debug, Clone)]
pub struct ContinuumRun {
    pub record: SpectrumRecord,
    pub fit: FitResult,
}

pub fn run_continuum(
    path: &Path,
    stages: &[TransformStage],
    config: &ContinuumConfig,
    ignore_mask: bool,
) -> Result<ContinuumRun, AppError> {
    let record = TextSpectrumDecoder::new(ignore_mask).decode(path)?;
    let record = apply_stages(&record, stages)?;
    let fit = fit_continuum(&record, config)?;
    Ok(ContinuumRun { record, fit })
}
