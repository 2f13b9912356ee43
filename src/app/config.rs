//! Environment defaults and argument-to-config mapping.

use std::path::PathBuf;
use std::sync::Arc;

use crate::batch::{Measurement, PipelineSpec};
use crate::cli::{ContinuumArgs, IndicesArgs, InputArgs, PreprocessArgs};
use crate::error::AppError;
use crate::fit::ContinuumConfig;
use crate::indices::IndexTable;
use crate::transform::{NormalizeRange, RedshiftConfig, TransformStage};

pub const ENV_WORKERS: &str = "CMOST_WORKERS";
pub const ENV_INDEX_TABLE: &str = "CMOST_INDEX_TABLE";

/// Defaults read from the environment (and `.env`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvDefaults {
    pub workers: Option<usize>,
    pub index_table: Option<PathBuf>,
}

impl EnvDefaults {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let workers = match lookup(ENV_WORKERS) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| AppError::configuration(format!("{ENV_WORKERS} must be a positive integer, got '{raw}'.")))?,
            ),
            None => None,
        };
        let index_table = lookup(ENV_INDEX_TABLE)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);
        Ok(Self { workers, index_table })
    }

    /// CLI value, then environment, then the number of CPUs.
    pub fn resolve_workers(&self, cli: Option<usize>) -> Result<usize, AppError> {
        match cli.or(self.workers) {
            Some(0) => Err(AppError::configuration("--workers must be at least 1.")),
            Some(n) => Ok(n),
            None => Ok(std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)),
        }
    }
}

pub fn redshift_config(input: &InputArgs) -> Result<RedshiftConfig, AppError> {
    if !(input.redshift_threshold.is_finite() && input.redshift_threshold > 0.0) {
        return Err(AppError::configuration(format!(
            "Redshift threshold must be positive, got {}.",
            input.redshift_threshold
        )));
    }
    Ok(RedshiftConfig {
        threshold: input.redshift_threshold,
        bypass_guard: input.bypass_redshift_guard,
    })
}

fn stages(normalize: bool, redshift: bool, input: &InputArgs, grid: Option<Vec<f64>>) -> Result<Vec<TransformStage>, AppError> {
    let mut stages = Vec::new();
    if normalize {
        stages.push(TransformStage::Normalize(NormalizeRange::default()));
    }
    if redshift {
        stages.push(TransformStage::RemoveRedshift(redshift_config(input)?));
    }
    if let Some(grid) = grid {
        stages.push(TransformStage::Align(grid.into()));
    }
    Ok(stages)
}

/// Index table: `--table`, then `CMOST_INDEX_TABLE`, then the builtin table.
pub fn index_table(cli: Option<&PathBuf>, env: &EnvDefaults) -> Result<Arc<IndexTable>, AppError> {
    match cli.or(env.index_table.as_ref()) {
        Some(path) => Ok(Arc::new(IndexTable::load(path)?)),
        None => Ok(Arc::new(IndexTable::builtin()?.clone())),
    }
}

pub fn indices_pipeline(args: &IndicesArgs, env: &EnvDefaults) -> Result<PipelineSpec, AppError> {
    let table = index_table(args.table.as_ref(), env)?;
    let stages = stages(args.normalize, args.redshift, &args.input, args.align.map(|g| g.to_grid()))?;
    Ok(PipelineSpec::new(stages, Measurement::LickIndices(table)))
}

pub fn continuum_config(args: &ContinuumArgs) -> ContinuumConfig {
    ContinuumConfig {
        window_length: args.window_length,
        kernel_size: args.kernel_size,
        response_scale: args.response_scale,
        max_iterations: args.max_iterations,
        clip_sigma: args.clip_sigma,
        ..ContinuumConfig::default()
    }
}

pub fn continuum_pipeline(args: &ContinuumArgs) -> Result<PipelineSpec, AppError> {
    let stages = stages(args.normalize, args.redshift, &args.input, None)?;
    Ok(PipelineSpec::new(stages, Measurement::Continuum(continuum_config(args))))
}

pub fn preprocess_pipeline(args: &PreprocessArgs) -> Result<PipelineSpec, AppError> {
    let mut spec = PipelineSpec::preprocessing(args.align.map(|g| g.to_grid().into()));
    let redshift = redshift_config(&args.input)?;
    for stage in &mut spec.stages {
        if let TransformStage::RemoveRedshift(config) = stage {
            *config = redshift;
        }
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn env_defaults_parse() {
        let env = EnvDefaults::from_lookup(|key| match key {
            ENV_WORKERS => Some("6".to_string()),
            ENV_INDEX_TABLE => Some(" tables/lick.csv ".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(env.workers, Some(6));
        assert_eq!(env.index_table, Some(PathBuf::from("tables/lick.csv")));

        assert_eq!(env.resolve_workers(Some(2)).unwrap(), 2);
        assert_eq!(env.resolve_workers(None).unwrap(), 6);
        assert!(EnvDefaults::default().resolve_workers(None).unwrap() >= 1);
    }

    #[test]
    fn bad_worker_count_is_configuration_error() {
        let err = EnvDefaults::from_lookup(|key| (key == ENV_WORKERS).then(|| "zero".to_string())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let err = EnvDefaults::default().resolve_workers(Some(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn preprocess_pipeline_carries_redshift_settings() {
        let args = PreprocessArgs {
            files: vec![PathBuf::from("a.txt")],
            align: None,
            workers: None,
            input: InputArgs {
                ignore_mask: false,
                redshift_threshold: 0.5,
                bypass_redshift_guard: true,
            },
            export: None,
        };
        let spec = preprocess_pipeline(&args).unwrap();
        assert_eq!(spec.stages.len(), 3);
        let labels: Vec<&str> = spec.stages.iter().map(|s| s.label()).collect();
        assert_eq!(labels, vec!["normalize", "remove_redshift", "align"]);
        let TransformStage::RemoveRedshift(config) = &spec.stages[1] else {
            panic!("expected redshift stage");
        };
        assert_eq!(config.threshold, 0.5);
        assert!(config.bypass_guard);
    }
}
