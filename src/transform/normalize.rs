//! Min-max flux normalization.

use crate::domain::{SpectrumRecord, SpectrumSource};
use crate::error::AppError;

/// Target flux range for [`normalize`]; `[0, 1]` by default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeRange {
    pub lo: f64,
    pub hi: f64,
}

impl Default for NormalizeRange {
    fn default() -> Self {
        Self { lo: 0.0, hi: 1.0 }
    }
}

impl NormalizeRange {
    pub fn new(lo: f64, hi: f64) -> Result<Self, AppError> {
        let range = Self { lo, hi };
        range.validate()?;
        Ok(range)
    }

    /// Finite bounds with `lo < hi`.
    pub fn validate(&self) -> Result<(), AppError> {
        let (lo, hi) = (self.lo, self.hi);
        if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
            return Err(AppError::configuration(format!(
                "Invalid normalization range [{lo}, {hi}]: expected finite lo < hi."
            )));
        }
        Ok(())
    }
}

/// Rescale flux linearly so its minimum maps to `range.lo` and its maximum to `range.hi`.
///
/// Constant flux has no scale and is rejected as an invalid spectrum.
pub fn normalize(record: &SpectrumRecord, range: NormalizeRange) -> Result<SpectrumRecord, AppError> {
    range.validate()?;
    let flux = record.flux();
    if let Some(bad) = flux.iter().position(|f| !f.is_finite()) {
        return Err(AppError::invalid_spectrum(format!(
            "Cannot normalize '{}': non-finite flux at index {bad}.",
            record.identifier().unwrap_or("<unnamed>")
        )));
    }
    let min = flux.iter().copied().fold(f64::INFINITY, f64::min);
    let max = flux.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let span = max - min;
    if span == 0.0 {
        return Err(AppError::invalid_spectrum(format!(
            "Cannot normalize '{}': flux is constant ({min}).",
            record.identifier().unwrap_or("<unnamed>")
        )));
    }

    let width = range.hi - range.lo;
    let scaled = flux
        .iter()
        .map(|f| (range.lo + (f - min) / span * width).clamp(range.lo, range.hi))
        .collect();
    record.with_flux(scaled)
}
