//! What a batch unit does with one spectrum.

use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::SpectrumRecord;
use crate::error::AppError;
use crate::fit::{ContinuumConfig, FitResult, fit_continuum};
use crate::indices::{IndexRow, IndexTable, compute_indices};
use crate::io::SpectrumDecoder;
use crate::transform::{NormalizeRange, RedshiftConfig, TransformStage, apply_stages, default_grid};

/// One item of work: a file to decode or an already decoded record.
#[derive(Debug, Clone)]
pub enum BatchInput {
    Path(PathBuf),
    Record(SpectrumRecord),
}

impl From<PathBuf> for BatchInput {
    fn from(path: PathBuf) -> Self {
        BatchInput::Path(path)
    }
}

impl From<SpectrumRecord> for BatchInput {
    fn from(record: SpectrumRecord) -> Self {
        BatchInput::Record(record)
    }
}

/// How a pseudo-continuum is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuumStrategy {
    /// Straight line through the blue and red sideband means (Lick indices).
    TwoPoint,
    /// Statistical windows plus sigma-clipped polynomial.
    Windowed,
}

/// Final step of a unit, run after the transform stages.
#[derive(Debug, Clone)]
pub enum Measurement {
    LickIndices(Arc<IndexTable>),
    Continuum(ContinuumConfig),
    /// Return the transformed spectrum itself.
    Spectrum,
}

impl Measurement {
    /// Lick indices against the embedded reference table.
    pub fn builtin_indices() -> Result<Self, AppError> {
        Ok(Measurement::LickIndices(Arc::new(IndexTable::builtin()?.clone())))
    }

    pub fn continuum_strategy(&self) -> Option<ContinuumStrategy> {
        match self {
            Measurement::LickIndices(_) => Some(ContinuumStrategy::TwoPoint),
            Measurement::Continuum(_) => Some(ContinuumStrategy::Windowed),
            Measurement::Spectrum => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Measurement::LickIndices(_) => "lick_indices",
            Measurement::Continuum(_) => "continuum",
            Measurement::Spectrum => "spectrum",
        }
    }
}

/// Ordered transform stages followed by one measurement.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    pub stages: Vec<TransformStage>,
    pub measurement: Measurement,
}

impl Default for PipelineSpec {
    fn default() -> Self {
        Self {
            stages: Vec::new(),
            measurement: Measurement::Spectrum,
        }
    }
}

impl PipelineSpec {
    pub fn new(stages: Vec<TransformStage>, measurement: Measurement) -> Self {
        Self { stages, measurement }
    }

    /// Min-max scaling, redshift removal, then alignment onto `grid`
    /// (the canonical survey grid when `None`); yields the flux rows.
    pub fn preprocessing(grid: Option<Arc<[f64]>>) -> Self {
        let grid = grid.unwrap_or_else(|| default_grid().into());
        Self {
            stages: vec![
                TransformStage::Normalize(NormalizeRange::default()),
                TransformStage::RemoveRedshift(RedshiftConfig::default()),
                TransformStage::Align(grid),
            ],
            measurement: Measurement::Spectrum,
        }
    }
}

/// A successful unit's output.
#[derive(Debug, Clone)]
pub enum BatchRow {
    Indices(IndexRow),
    Continuum(FitResult),
    Spectrum(SpectrumRecord),
}

/// Decode (if needed), transform, and measure one input.
pub fn run_unit(input: BatchInput, decoder: &dyn SpectrumDecoder, spec: &PipelineSpec) -> Result<BatchRow, AppError> {
    let record = match input {
        BatchInput::Path(path) => decoder.decode(&path)?,
        BatchInput::Record(record) => record,
    };
    let record = apply_stages(&record, &spec.stages)?;

    match &spec.measurement {
        Measurement::LickIndices(table) => compute_indices(&record, table).map(BatchRow::Indices),
        Measurement::Continuum(config) => fit_continuum(&record, config).map(BatchRow::Continuum),
        Measurement::Spectrum => Ok(BatchRow::Spectrum(record)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Header, KEY_REDSHIFT, SpectrumSource};
    use crate::io::TextSpectrumDecoder;

    fn record(z: f64) -> SpectrumRecord {
        let wavelength: Vec<f64> = (0..2000).map(|i| 3600.0 + 3.0 * i as f64).collect();
        let flux = wavelength.iter().map(|w| 2.0 + (w / 400.0).sin()).collect();
        SpectrumRecord::new(Header::new().with(KEY_REDSHIFT, z), wavelength, flux).unwrap()
    }

    #[test]
    fn preprocessing_lands_on_the_canonical_grid() {
        let spec = PipelineSpec::preprocessing(None);
        let row = run_unit(record(0.001).into(), &TextSpectrumDecoder::default(), &spec).unwrap();
        let BatchRow::Spectrum(out) = row else {
            panic!("expected a spectrum row");
        };
        assert_eq!(out.len(), 2700);
        assert_eq!(out.wavelength()[0], 3700.0);
        assert!(out.flux().iter().all(|f| (0.0..=1.0).contains(f)));
    }

    #[test]
    fn measurement_selects_continuum_strategy() {
        assert_eq!(
            Measurement::builtin_indices().unwrap().continuum_strategy(),
            Some(ContinuumStrategy::TwoPoint)
        );
        assert_eq!(
            Measurement::Continuum(ContinuumConfig::default()).continuum_strategy(),
            Some(ContinuumStrategy::Windowed)
        );
        assert_eq!(Measurement::Spectrum.continuum_strategy(), None);
    }

    #[test]
    fn stage_errors_propagate() {
        let spec = PipelineSpec::preprocessing(None);
        let err = run_unit(record(3.0).into(), &TextSpectrumDecoder::default(), &spec).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnusualRedshift);
    }
}
