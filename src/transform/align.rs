//! Resampling onto a canonical wavelength grid.

use crate::domain::{SpectrumRecord, SpectrumSource};
use crate::error::AppError;
use crate::math::resample_clamped;

/// Canonical survey grid: `3700..9100` Å in 2 Å steps.
pub fn default_grid() -> Vec<f64> {
    arange(3700.0, 9100.0, 2.0)
}

/// Half-open `[start, stop)` grid with a fixed step.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0) || !(stop > start) {
        return Vec::new();
    }
    let n = ((stop - start) / step).ceil() as usize;
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Resample flux onto `grid`; samples outside the source coverage take the first/last flux.
pub fn align_wavelength(record: &SpectrumRecord, grid: &[f64]) -> Result<SpectrumRecord, AppError> {
    let flux = resample_clamped(grid, record.wavelength(), record.flux());
    record.with_grid(grid.to_vec(), flux)
}
