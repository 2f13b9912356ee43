//! Export batch tables and continuum fits.
//!
//! CSV for tables (spreadsheets, pandas), JSON for a continuum fit so the
//! polynomial can be re-evaluated later without refitting.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::batch::{FluxTable, IndexResultTable};
use crate::error::AppError;
use crate::fit::FitResult;

/// Portable continuum fit, as written by [`write_continuum_json`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuumFile {
    pub tool: String,
    pub source: Option<String>,
    /// Ascending coefficients in the mapped variable.
    pub coefficients: Vec<f64>,
    /// Wavelength interval mapped onto `[-1, 1]`.
    pub domain: (f64, f64),
    pub iterations: usize,
    pub converged: bool,
    pub warning: Option<String>,
    pub grid: ContinuumGrid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuumGrid {
    pub wavelength: Vec<f64>,
    pub flux: Vec<f64>,
}

impl ContinuumFile {
    pub fn from_fit(fit: &FitResult, source: Option<&str>) -> Self {
        Self {
            tool: "cmost".to_string(),
            source: source.map(str::to_string),
            coefficients: fit.polynomial.coefficients.clone(),
            domain: fit.polynomial.domain,
            iterations: fit.iterations,
            converged: fit.converged(),
            warning: fit.warning.map(|w| w.to_string()),
            grid: ContinuumGrid {
                wavelength: fit.wavelength.clone(),
                flux: fit.continuum.clone(),
            },
        }
    }
}

fn create(path: &Path, what: &str) -> Result<File, AppError> {
    File::create(path).map_err(|e| AppError::io(format!("Failed to create {what} '{}': {e}", path.display())))
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::io(format!("Failed to write CSV: {e}"))
}

/// `id,<index names...>`, one row per spectrum.
pub fn write_index_table<W: Write>(writer: W, table: &IndexResultTable) -> Result<(), AppError> {
    let mut out = csv::Writer::from_writer(writer);
    let mut header = vec!["id".to_string()];
    header.extend(table.columns.iter().cloned());
    out.write_record(&header).map_err(csv_error)?;

    for (id, values) in &table.rows {
        let mut record = vec![id.clone()];
        record.extend(values.iter().map(|v| format!("{v:.6}")));
        out.write_record(&record).map_err(csv_error)?;
    }
    out.flush().map_err(|e| AppError::io(format!("Failed to flush CSV: {e}")))
}

pub fn write_index_table_csv(path: &Path, table: &IndexResultTable) -> Result<(), AppError> {
    write_index_table(create(path, "index CSV")?, table)
}

/// `id,<wavelengths...>`, one flux row per spectrum.
pub fn write_flux_table<W: Write>(writer: W, table: &FluxTable) -> Result<(), AppError> {
    let mut out = csv::Writer::from_writer(writer);
    let mut header = vec!["id".to_string()];
    header.extend(table.wavelength.iter().map(|w| w.to_string()));
    out.write_record(&header).map_err(csv_error)?;

    for (id, flux) in &table.rows {
        let mut record = vec![id.clone()];
        record.extend(flux.iter().map(|v| v.to_string()));
        out.write_record(&record).map_err(csv_error)?;
    }
    out.flush().map_err(|e| AppError::io(format!("Failed to flush CSV: {e}")))
}

pub fn write_flux_table_csv(path: &Path, table: &FluxTable) -> Result<(), AppError> {
    write_flux_table(create(path, "flux CSV")?, table)
}

#[derive(Serialize)]
struct ContinuumRow {
    wavelength: f64,
    flux: f64,
}

/// `wavelength,flux` of the fitted continuum.
pub fn write_continuum<W: Write>(writer: W, fit: &FitResult) -> Result<(), AppError> {
    let mut out = csv::Writer::from_writer(writer);
    for (&wavelength, &flux) in fit.wavelength.iter().zip(&fit.continuum) {
        out.serialize(ContinuumRow { wavelength, flux }).map_err(csv_error)?;
    }
    out.flush().map_err(|e| AppError::io(format!("Failed to flush CSV: {e}")))
}

pub fn write_continuum_csv(path: &Path, fit: &FitResult) -> Result<(), AppError> {
    write_continuum(create(path, "continuum CSV")?, fit)
}

pub fn write_continuum_json(path: &Path, fit: &FitResult, source: Option<&str>) -> Result<(), AppError> {
    let file = create(path, "continuum JSON")?;
    serde_json::to_writer_pretty(file, &ContinuumFile::from_fit(fit, source))
        .map_err(|e| AppError::io(format!("Failed to write continuum JSON: {e}")))
}

pub fn read_continuum_json(path: &Path) -> Result<ContinuumFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open continuum JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::decode(format!("Invalid continuum JSON: {e}")))
}
