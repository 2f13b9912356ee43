//! Redshift removal.
//!
//! The observed flux is treated as sampled on the rest-frame grid
//! `w_rest = w_obs / (1 + z)`, then resampled back onto the observed grid so
//! every spectrum in a batch keeps its original wavelength sampling.

use log::debug;

use crate::domain::{SpectrumRecord, SpectrumSource};
use crate::error::AppError;
use crate::math::resample_clamped;

/// Default `|z|` at which a redshift is considered implausible for a stellar spectrum.
pub const DEFAULT_REDSHIFT_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RedshiftConfig {
    /// Reject `|z| >= threshold`.
    pub threshold: f64,
    /// Skip the threshold check (the `1 + z > 0` requirement still applies).
    pub bypass_guard: bool,
}

impl Default for RedshiftConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_REDSHIFT_THRESHOLD,
            bypass_guard: false,
        }
    }
}

/// Move flux onto the rest frame using the header's `Z`, keeping the observed grid.
pub fn remove_redshift(record: &SpectrumRecord, config: &RedshiftConfig) -> Result<SpectrumRecord, AppError> {
    let z = record.header().redshift()?;
    let name = record.identifier().unwrap_or("<unnamed>");

    if !config.bypass_guard && z.abs() >= config.threshold {
        return Err(AppError::unusual_redshift(format!(
            "Unusual redshift z={z} in '{name}': |z| >= threshold {}.",
            config.threshold
        )));
    }
    if 1.0 + z <= 0.0 {
        return Err(AppError::unusual_redshift(format!(
            "Redshift z={z} in '{name}' gives a non-positive rest-frame scale (1 + z <= 0)."
        )));
    }

    debug!("removing redshift z={z} from '{name}'");
    let observed = record.wavelength();
    let rest: Vec<f64> = observed.iter().map(|w| w / (1.0 + z)).collect();
    let flux = resample_clamped(observed, &rest, record.flux());
    record.with_flux(flux)
}
