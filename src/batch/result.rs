//! Aggregated batch output.

use serde::Serialize;

use crate::batch::pipeline::BatchRow;
use crate::domain::{Header, SpectrumSource};
use crate::error::{AppError, ErrorKind};

/// `(completed, total)` units; cancelled units count as completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub id: String,
    pub row: BatchRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub id: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl BatchFailure {
    pub fn from_error(id: impl Into<String>, err: &AppError) -> Self {
        Self {
            id: id.into(),
            kind: err.kind(),
            message: err.message().to_string(),
        }
    }
}

/// Everything a batch produced. Rows and failures are in completion order.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub rows: Vec<BatchEntry>,
    pub failures: Vec<BatchFailure>,
    pub cancelled: Vec<String>,
    pub progress: Progress,
}

impl BatchResult {
    pub fn ids(&self) -> Vec<&str> {
        self.rows.iter().map(|e| e.id.as_str()).collect()
    }

    /// Failure counts per error kind, most frequent first.
    pub fn failure_counts(&self) -> Vec<(ErrorKind, usize)> {
        let mut counts: Vec<(ErrorKind, usize)> = Vec::new();
        for f in &self.failures {
            match counts.iter_mut().find(|(k, _)| *k == f.kind) {
                Some((_, n)) => *n += 1,
                None => counts.push((f.kind, 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.label().cmp(b.0.label())));
        counts
    }

    /// Index rows as one table: spectra down, index names across.
    ///
    /// `None` when the batch produced no index rows.
    pub fn index_table(&self) -> Option<IndexResultTable> {
        let mut table: Option<IndexResultTable> = None;
        for entry in &self.rows {
            let BatchRow::Indices(row) = &entry.row else {
                continue;
            };
            let t = table.get_or_insert_with(|| IndexResultTable {
                columns: row.iter().map(|(name, _)| name.to_string()).collect(),
                rows: Vec::new(),
            });
            t.rows.push((entry.id.clone(), row.values()));
        }
        table
    }

    /// Transformed flux rows on a shared grid, with their headers.
    ///
    /// Fails when the rows are not all on the same wavelength grid.
    pub fn flux_table(&self) -> Result<Option<FluxTable>, AppError> {
        let mut table: Option<FluxTable> = None;
        for entry in &self.rows {
            let BatchRow::Spectrum(record) = &entry.row else {
                continue;
            };
            let t = table.get_or_insert_with(|| FluxTable {
                wavelength: record.wavelength().to_vec(),
                rows: Vec::new(),
                headers: Vec::new(),
            });
            if t.wavelength.as_slice() != record.wavelength() {
                return Err(AppError::invalid_spectrum(format!(
                    "Spectrum '{}' is not on the batch's shared wavelength grid; add an align stage.",
                    entry.id
                )));
            }
            t.rows.push((entry.id.clone(), record.flux().to_vec()));
            t.headers.push((entry.id.clone(), record.header().clone()));
        }
        Ok(table)
    }
}

/// Index values, one row per spectrum.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<(String, Vec<f64>)>,
}

impl IndexResultTable {
    pub fn get(&self, id: &str, column: &str) -> Option<f64> {
        let col = self.columns.iter().position(|c| c == column)?;
        let (_, values) = self.rows.iter().find(|(row_id, _)| row_id == id)?;
        values.get(col).copied()
    }
}

/// Flux rows sharing one wavelength grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FluxTable {
    pub wavelength: Vec<f64>,
    pub rows: Vec<(String, Vec<f64>)>,
    pub headers: Vec<(String, Header)>,
}

impl FluxTable {
    pub fn header(&self, id: &str) -> Option<&Header> {
        self.headers.iter().find(|(row_id, _)| row_id == id).map(|(_, h)| h)
    }
}
