//! Lick index measurement.
//!
//! For every band definition:
//!
//! 1. cut out the index band and both continuum windows, adding exactly
//!    interpolated samples at the window edges so partial pixels count
//! 2. average each continuum window (trapezoid integral / window width)
//! 3. draw a straight pseudo-continuum through the two window midpoints
//! 4. integrate `1 - F_I/F_C` (equivalent width, Å) or take
//!    `-2.5 log10(∫ F_I/F_C / Δλ)` (magnitude)

use serde::Serialize;

use crate::domain::SpectrumSource;
use crate::error::AppError;
use crate::indices::table::{IndexBandDefinition, IndexTable, IndexUnits, Window};
use crate::math::{Line, interp_within, trapezoid};

/// Wavelength-sorted samples of one window, edges included.
#[derive(Debug, Clone, PartialEq)]
pub struct BandSlice {
    pub wavelength: Vec<f64>,
    pub flux: Vec<f64>,
}

/// Index values for one spectrum, in index-table order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexRow {
    entries: Vec<(String, f64)>,
}

impl IndexRow {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, v)| *v).collect()
    }
}

/// Cut `window` out of the spectrum.
///
/// Keeps samples strictly inside `(start, end)` and adds linearly interpolated
/// samples at `start` and `end`. Edges outside the spectrum coverage have no
/// interpolated value and fail with `BandOutOfRange`.
pub fn extract_band<S: SpectrumSource + ?Sized>(source: &S, window: Window, label: &str) -> Result<BandSlice, AppError> {
    if window.width() < 0.0 {
        return Err(AppError::configuration(format!(
            "Window '{label}' is inverted: start {} > end {}.",
            window.start, window.end
        )));
    }

    let wavelength = source.wavelength();
    let flux = source.flux();

    let edge = |x: f64| {
        interp_within(x, wavelength, flux).ok_or_else(|| {
            AppError::band_out_of_range(format!(
                "Window '{label}' edge {x} lies outside the spectrum coverage [{}, {}].",
                wavelength.first().copied().unwrap_or(f64::NAN),
                wavelength.last().copied().unwrap_or(f64::NAN)
            ))
        })
    };
    let flux_start = edge(window.start)?;
    let flux_end = edge(window.end)?;

    let lo = wavelength.partition_point(|&w| w <= window.start);
    let hi = wavelength.partition_point(|&w| w < window.end).max(lo);

    let mut slice_w = Vec::with_capacity(hi - lo + 2);
    let mut slice_f = Vec::with_capacity(hi - lo + 2);
    slice_w.push(window.start);
    slice_f.push(flux_start);
    slice_w.extend_from_slice(&wavelength[lo..hi]);
    slice_f.extend_from_slice(&flux[lo..hi]);
    slice_w.push(window.end);
    slice_f.push(flux_end);

    Ok(BandSlice {
        wavelength: slice_w,
        flux: slice_f,
    })
}

/// Mean flux over a window: `∫ F dλ / (λ2 - λ1)`.
pub fn mean_flux(slice: &BandSlice, window: Window, label: &str) -> Result<f64, AppError> {
    let width = window.width();
    if width == 0.0 {
        return Err(AppError::division_by_zero(format!(
            "Window '{label}' has zero width at {}.",
            window.start
        )));
    }
    Ok(trapezoid(&slice.flux, &slice.wavelength) / width)
}

/// Measure a single index.
pub fn compute_index<S: SpectrumSource + ?Sized>(source: &S, def: &IndexBandDefinition) -> Result<f64, AppError> {
    let name = def.name.as_str();
    let index = extract_band(source, def.index_band, &format!("{name} index band"))?;
    let blue = extract_band(source, def.blue_continuum, &format!("{name} blue continuum"))?;
    let red = extract_band(source, def.red_continuum, &format!("{name} red continuum"))?;

    let blue_mean = mean_flux(&blue, def.blue_continuum, &format!("{name} blue continuum"))?;
    let red_mean = mean_flux(&red, def.red_continuum, &format!("{name} red continuum"))?;

    let continuum = Line::through(
        (def.blue_continuum.midpoint(), blue_mean),
        (def.red_continuum.midpoint(), red_mean),
    )
    .ok_or_else(|| {
        AppError::division_by_zero(format!(
            "Index '{name}': blue and red continuum windows share the midpoint {}.",
            def.blue_continuum.midpoint()
        ))
    })?;

    let mut ratio = Vec::with_capacity(index.wavelength.len());
    for (&w, &f) in index.wavelength.iter().zip(&index.flux) {
        let fc = continuum.eval(w);
        if fc == 0.0 {
            return Err(AppError::division_by_zero(format!(
                "Index '{name}': pseudo-continuum is zero at {w}."
            )));
        }
        ratio.push(f / fc);
    }

    match def.units {
        IndexUnits::EquivalentWidth => {
            let depth: Vec<f64> = ratio.iter().map(|r| 1.0 - r).collect();
            Ok(trapezoid(&depth, &index.wavelength))
        }
        IndexUnits::Magnitude => {
            let width = def.index_band.width();
            if width == 0.0 {
                return Err(AppError::division_by_zero(format!(
                    "Index '{name}': index band has zero width at {}.",
                    def.index_band.start
                )));
            }
            Ok(-2.5 * (trapezoid(&ratio, &index.wavelength) / width).log10())
        }
    }
}

/// Measure every index in `table`, failing on the first error.
pub fn compute_indices<S: SpectrumSource + ?Sized>(source: &S, table: &IndexTable) -> Result<IndexRow, AppError> {
    let mut entries = Vec::with_capacity(table.len());
    for def in table {
        entries.push((def.name.clone(), compute_index(source, def)?));
    }
    Ok(IndexRow { entries })
}
