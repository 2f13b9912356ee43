//! Statistical-window point selection for continuum fitting.
//!
//! The wavelength range is cut into consecutive fixed-length windows. In each
//! window we estimate how "busy" the spectrum is with a relative deviation
//! statistic against a median-filtered copy:
//!
//! ```text
//! S = Σ |f - m| / Σ m
//! ```
//!
//! `S` is mapped through a saturating arctangent step `H(s)` to a retained
//! percentile band `[L, U]` centred on the median (45%–55% for a quiet window,
//! widening as `S` grows). Only points whose flux rank lies strictly inside the
//! band survive; absorption lines and spikes sit in the tails and are dropped.

use log::debug;

use crate::error::AppError;
use crate::math::median_filter;

pub const DEFAULT_WINDOW_LENGTH: f64 = 100.0;
pub const DEFAULT_KERNEL_SIZE: usize = 5;
/// Scale `c` of the arctangent step `H(s)`.
pub const DEFAULT_RESPONSE_SCALE: f64 = 5.0;

/// Lower/upper retained percentiles for a quiet (`S = 0`) window.
const BASE_LOWER_PERCENT: f64 = 45.0;
const BASE_UPPER_PERCENT: f64 = 55.0;
/// `S` at which the band widening is normalized.
const SATURATION_S: f64 = 100.0;

/// Saturating step `H(s) = ½ (1 + (2/π) atan(s / c))`.
pub fn step_response(s: f64, c: f64) -> f64 {
    0.5 * (1.0 + (2.0 / std::f64::consts::PI) * (s / c).atan())
}

/// Retained percentile band `(L, U)` in percent for a window statistic `s`.
pub fn percentile_bounds(s: f64, c: f64) -> (f64, f64) {
    let h0 = step_response(0.0, c);
    let widen = (step_response(s, c) - h0) * (step_response(SATURATION_S, c) - h0) / 50.0;
    (BASE_LOWER_PERCENT - widen, BASE_UPPER_PERCENT + widen)
}

/// Relative deviation `Σ|f - m| / Σm` of `flux` from its filtered copy.
pub fn deviation_statistic(flux: &[f64], filtered: &[f64]) -> f64 {
    let num: f64 = flux.iter().zip(filtered).map(|(f, m)| (f - m).abs()).sum();
    let den: f64 = filtered.iter().sum();
    if den == 0.0 {
        return if num == 0.0 { 0.0 } else { f64::INFINITY };
    }
    num / den
}

/// Points surviving window selection, sorted by wavelength.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectedPoints {
    pub wavelength: Vec<f64>,
    pub flux: Vec<f64>,
}

impl SelectedPoints {
    pub fn len(&self) -> usize {
        self.wavelength.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelength.is_empty()
    }
}

/// Run window selection over an ascending spectrum.
///
/// Windows are `[start + kL, start + (k+1)L)`; the last one also takes the
/// final sample.
pub fn select_points(
    wavelength: &[f64],
    flux: &[f64],
    window_length: f64,
    kernel_size: usize,
    response_scale: f64,
) -> Result<SelectedPoints, AppError> {
    if !(window_length.is_finite() && window_length > 0.0) {
        return Err(AppError::configuration(format!(
            "Window length must be a positive number, got {window_length}."
        )));
    }
    if kernel_size == 0 {
        return Err(AppError::configuration("Median filter kernel size must be >= 1."));
    }
    let (Some(&first), Some(&last)) = (wavelength.first(), wavelength.last()) else {
        return Ok(SelectedPoints::default());
    };

    let n_windows = (((last - first) / window_length).ceil() as usize).max(1);
    let window_of = |w: f64| (((w - first) / window_length).floor() as usize).min(n_windows - 1);

    let mut selected: Vec<(f64, f64)> = Vec::new();
    let mut start = 0;
    while start < wavelength.len() {
        let k = window_of(wavelength[start]);
        let end = start + wavelength[start..].partition_point(|&w| window_of(w) == k);
        let kept = select_in_window(&wavelength[start..end], &flux[start..end], kernel_size, response_scale);
        debug!(
            "window {k}: {} of {} points retained",
            kept.len(),
            end - start
        );
        selected.extend(kept);
        start = end;
    }

    selected.sort_by(|a, b| a.0.total_cmp(&b.0));
    let (wavelength, flux) = selected.into_iter().unzip();
    Ok(SelectedPoints { wavelength, flux })
}

fn select_in_window(wavelength: &[f64], flux: &[f64], kernel_size: usize, response_scale: f64) -> Vec<(f64, f64)> {
    let n = flux.len();
    let filtered = median_filter(flux, kernel_size);
    let s = deviation_statistic(flux, &filtered);
    let (lower, upper) = percentile_bounds(s, response_scale);

    let lb = (lower * n as f64 / 100.0).floor() as usize;
    let ub = (upper * n as f64 / 100.0).floor() as usize;

    let mut ranked: Vec<(f64, f64)> = wavelength.iter().copied().zip(flux.iter().copied()).collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

    ranked
        .into_iter()
        .enumerate()
        .filter(|(rank, _)| *rank > lb && *rank < ub)
        .map(|(_, p)| p)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_window_keeps_base_band() {
        let (l, u) = percentile_bounds(0.0, DEFAULT_RESPONSE_SCALE);
        assert_eq!((l, u), (45.0, 55.0));
    }

    #[test]
    fn band_widens_monotonically_and_saturates() {
        let c = DEFAULT_RESPONSE_SCALE;
        let (l1, u1) = percentile_bounds(1.0, c);
        let (l2, u2) = percentile_bounds(10.0, c);
        let (l3, u3) = percentile_bounds(1e9, c);
        assert!(l1 < 45.0 && u1 > 55.0);
        assert!(l2 < l1 && u2 > u1);
        assert!(l3 <= l2 && u3 >= u2);
        // H saturates at 1, so the widening is bounded.
        let h0 = step_response(0.0, c);
        let max_widen = (1.0 - h0) * (step_response(100.0, c) - h0) / 50.0;
        assert!(u3 - 55.0 <= max_widen + 1e-12);
    }

    #[test]
    fn deviation_statistic_is_relative() {
        assert_eq!(deviation_statistic(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
        assert!((deviation_statistic(&[2.0, 2.0], &[1.0, 3.0]) - 0.5).abs() < 1e-12);
        assert_eq!(deviation_statistic(&[0.0], &[0.0]), 0.0);
    }

    #[test]
    fn selection_keeps_middle_ranks_per_window() {
        // Two windows of 100 samples each; flux is a ramp inside each window.
        let wavelength: Vec<f64> = (0..200).map(|i| 4000.0 + i as f64).collect();
        let flux: Vec<f64> = (0..200).map(|i| (i % 100) as f64).collect();
        let selected = select_points(&wavelength, &flux, 100.0, 5, DEFAULT_RESPONSE_SCALE).unwrap();

        // S is small but non-zero (the reflected median filter bends the ramp ends),
        // so L sits just under 45% and U just over 55%: ranks 44 < r < 55.
        assert_eq!(selected.len(), 20);
        for (w, f) in selected.wavelength.iter().zip(&selected.flux) {
            let rank = ((w - 4000.0) as usize) % 100;
            assert_eq!(*f as usize, rank);
            assert!(rank > 44 && rank < 55, "rank {rank}");
        }
        assert!(selected.wavelength.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn spikes_are_never_selected() {
        let wavelength: Vec<f64> = (0..300).map(|i| 5000.0 + i as f64).collect();
        let mut flux: Vec<f64> = wavelength.iter().map(|w| 1.0 + 0.001 * (w / 3.0).sin()).collect();
        for &i in &[17usize, 140, 266] {
            flux[i] = 10.0;
        }
        let selected = select_points(&wavelength, &flux, 100.0, 5, DEFAULT_RESPONSE_SCALE).unwrap();
        assert!(!selected.is_empty());
        assert!(selected.flux.iter().all(|&f| f < 2.0));
    }

    #[test]
    fn invalid_settings_are_configuration_errors() {
        let w = [1.0, 2.0];
        let f = [1.0, 1.0];
        assert!(select_points(&w, &f, 0.0, 5, 5.0).is_err());
        assert!(select_points(&w, &f, 100.0, 0, 5.0).is_err());
    }
}
