//! Robust polynomial continuum fitting.
//!
//! Given candidate points (usually from [`crate::fit::window::select_points`])
//! we repeatedly:
//!
//! - fit a degree-5 least-squares polynomial to the active points
//! - normalize the active flux by the fitted polynomial
//! - reject points whose normalized flux lies outside `mean ± 3σ`
//!
//! until an iteration rejects nothing or the iteration cap is reached. The
//! final polynomial is then evaluated over the *whole* input grid.

use log::{debug, warn};
use serde::Serialize;

use crate::domain::SpectrumSource;
use crate::error::AppError;
use crate::fit::window::{
    DEFAULT_KERNEL_SIZE, DEFAULT_RESPONSE_SCALE, DEFAULT_WINDOW_LENGTH, SelectedPoints, select_points,
};
use crate::math::{Polynomial, mean, sample_std};

pub const DEFAULT_DEGREE: usize = 5;
pub const DEFAULT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_CLIP_SIGMA: f64 = 3.0;

/// Continuum fitting options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinuumConfig {
    /// Statistical window length (Å).
    pub window_length: f64,
    /// Median filter size used for the window statistic.
    pub kernel_size: usize,
    /// Scale `c` of the percentile response.
    pub response_scale: f64,
    /// Iteration cap for the clipping loop.
    pub max_iterations: usize,
    /// Rejection threshold in standard deviations.
    pub clip_sigma: f64,
    pub degree: usize,
}

impl Default for ContinuumConfig {
    fn default() -> Self {
        Self {
            window_length: DEFAULT_WINDOW_LENGTH,
            kernel_size: DEFAULT_KERNEL_SIZE,
            response_scale: DEFAULT_RESPONSE_SCALE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            clip_sigma: DEFAULT_CLIP_SIGMA,
            degree: DEFAULT_DEGREE,
        }
    }
}

/// Non-fatal: the clipping loop hit its cap while still rejecting points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConvergenceWarning {
    pub iterations: usize,
    /// Points rejected by the final iteration.
    pub last_rejected: usize,
}

impl std::fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "continuum fit did not converge after {} iterations ({} points rejected in the last one)",
            self.iterations, self.last_rejected
        )
    }
}

/// Output of the clipping loop on a set of candidate points.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipOutcome {
    pub polynomial: Polynomial,
    /// Number of points `polynomial` was fit on.
    pub fitted: usize,
    /// Points that survived the last rejection step, sorted by wavelength.
    /// Smaller than `fitted` when the iteration cap stopped the loop.
    pub retained: SelectedPoints,
    /// Rejected points, in rejection order.
    pub rejected: Vec<(f64, f64)>,
    pub iterations: usize,
    pub warning: Option<ConvergenceWarning>,
}

impl ClipOutcome {
    pub fn converged(&self) -> bool {
        self.warning.is_none()
    }
}

/// A fitted continuum over a full spectrum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResult {
    /// Coefficients and the wavelength domain they were fit over.
    pub polynomial: Polynomial,
    /// The original wavelength grid.
    pub wavelength: Vec<f64>,
    /// Continuum evaluated on `wavelength`.
    pub continuum: Vec<f64>,
    /// Number of candidate points produced by window selection.
    pub candidates: usize,
    /// Points the final polynomial was fit on.
    pub fitted: usize,
    /// Points left after the final rejection step.
    pub retained: usize,
    pub iterations: usize,
    pub warning: Option<ConvergenceWarning>,
}

impl FitResult {
    pub fn converged(&self) -> bool {
        self.warning.is_none()
    }
}

/// Iteratively fit and sigma-clip the candidate points.
pub fn clip_and_fit(wavelength: &[f64], flux: &[f64], config: &ContinuumConfig) -> Result<ClipOutcome, AppError> {
    if wavelength.len() != flux.len() {
        return Err(AppError::invalid_spectrum(format!(
            "Candidate wavelength and flux lengths differ ({} vs {}).",
            wavelength.len(),
            flux.len()
        )));
    }
    if config.max_iterations == 0 {
        return Err(AppError::configuration("Continuum fit needs max_iterations >= 1."));
    }
    if !(config.clip_sigma.is_finite() && config.clip_sigma > 0.0) {
        return Err(AppError::configuration(format!(
            "Clip threshold must be a positive number of sigmas, got {}.",
            config.clip_sigma
        )));
    }

    let needed = config.degree + 1;
    let mut active: Vec<(f64, f64)> = wavelength.iter().copied().zip(flux.iter().copied()).collect();
    let mut rejected: Vec<(f64, f64)> = Vec::new();
    let mut last_fit: Option<(Polynomial, usize, usize)> = None;
    let mut iterations = 0;

    for iteration in 1..=config.max_iterations {
        if active.len() < needed {
            return Err(AppError::insufficient_data(format!(
                "Continuum fit has {} active points after {} iteration(s); a degree-{} polynomial needs {needed}.",
                active.len(),
                iteration - 1,
                config.degree
            )));
        }

        let xs: Vec<f64> = active.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = active.iter().map(|p| p.1).collect();
        let poly = Polynomial::fit(&xs, &ys, config.degree).ok_or_else(|| {
            AppError::insufficient_data(format!(
                "Continuum polynomial could not be solved on {} points.",
                active.len()
            ))
        })?;

        let normalized: Vec<f64> = active.iter().map(|&(x, y)| y / poly.eval(x)).collect();
        let finite: Vec<f64> = normalized.iter().copied().filter(|v| v.is_finite()).collect();
        let (Some(a), Some(b)) = (mean(&finite), sample_std(&finite)) else {
            return Err(AppError::insufficient_data(
                "Continuum normalization produced fewer than 2 finite values.",
            ));
        };
        let (lower, upper) = (a - config.clip_sigma * b, a + config.clip_sigma * b);

        let (keep, outside): (Vec<_>, Vec<_>) = active
            .iter()
            .zip(&normalized)
            .partition(|(_, v)| **v >= lower && **v <= upper);
        let dropped = outside.len();

        debug!(
            "continuum iteration {iteration}: mean={a:.6} std={b:.6} rejected {dropped} of {}",
            active.len()
        );

        iterations = iteration;
        last_fit = Some((poly, active.len(), dropped));
        if dropped == 0 {
            break;
        }
        rejected.extend(outside.into_iter().map(|(p, _)| *p));
        active = keep.into_iter().map(|(p, _)| *p).collect();
    }

    let Some((polynomial, fitted, last_rejected)) = last_fit else {
        return Err(AppError::insufficient_data("Continuum fit ran no iterations."));
    };
    if active.is_empty() {
        return Err(AppError::insufficient_data(
            "Every candidate point was rejected before the continuum fit converged.",
        ));
    }

    let warning = (last_rejected > 0).then_some(ConvergenceWarning {
        iterations,
        last_rejected,
    });
    if let Some(w) = &warning {
        warn!("{w}");
    }

    let (retained_w, retained_f) = active.into_iter().unzip();
    Ok(ClipOutcome {
        polynomial,
        fitted,
        retained: SelectedPoints {
            wavelength: retained_w,
            flux: retained_f,
        },
        rejected,
        iterations,
        warning,
    })
}

/// Fit a robust continuum to a spectrum (window selection, then clipping).
pub fn fit_continuum<S: SpectrumSource + ?Sized>(source: &S, config: &ContinuumConfig) -> Result<FitResult, AppError> {
    let outcome = fit_continuum_detailed(source, config)?;
    Ok(outcome.1)
}

/// Like [`fit_continuum`], also returning the clipping details.
pub fn fit_continuum_detailed<S: SpectrumSource + ?Sized>(
    source: &S,
    config: &ContinuumConfig,
) -> Result<(ClipOutcome, FitResult), AppError> {
    let wavelength = source.wavelength();
    let candidates = select_points(
        wavelength,
        source.flux(),
        config.window_length,
        config.kernel_size,
        config.response_scale,
    )?;
    debug!("window selection kept {} of {} points", candidates.len(), wavelength.len());

    let outcome = clip_and_fit(&candidates.wavelength, &candidates.flux, config)?;
    let result = FitResult {
        polynomial: outcome.polynomial.clone(),
        wavelength: wavelength.to_vec(),
        continuum: outcome.polynomial.eval_many(wavelength),
        candidates: candidates.len(),
        fitted: outcome.fitted,
        retained: outcome.retained.len(),
        iterations: outcome.iterations,
        warning: outcome.warning,
    };
    Ok((outcome, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SpectrumTable;
    use crate::error::ErrorKind;
    use rand::prelude::*;
    use rand::rngs::StdRng;
    use rand_distr::Uniform;

    const TRUTH: [f64; 6] = [1.0, 0.1, -0.05, 0.03, 0.02, -0.01];

    /// Quintic continuum on `[lo, hi]` plus bounded uniform noise.
    fn synthetic(lo: f64, hi: f64, step: f64, noise: f64, seed: u64) -> (Polynomial, Vec<f64>, Vec<f64>) {
        let truth = Polynomial::new(TRUTH.to_vec(), (lo, hi));
        let n = ((hi - lo) / step).round() as usize + 1;
        let wavelength: Vec<f64> = (0..n).map(|i| lo + step * i as f64).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        let dist = Uniform::new_inclusive(-noise, noise);
        let flux = wavelength.iter().map(|&w| truth.eval(w) + rng.sample(dist)).collect();
        (truth, wavelength, flux)
    }

    #[test]
    fn clipping_rejects_exactly_the_injected_outliers() {
        let (truth, wavelength, mut flux) = synthetic(4000.0, 7000.0, 5.0, 0.004, 7);
        let outlier_idx = [23usize, 150, 301, 444, 580];
        for &i in &outlier_idx {
            flux[i] += 3.0;
        }

        let outcome = clip_and_fit(&wavelength, &flux, &ContinuumConfig::default()).unwrap();
        assert!(outcome.converged());
        assert_eq!(outcome.polynomial.domain, truth.domain);

        let mut rejected: Vec<f64> = outcome.rejected.iter().map(|p| p.0).collect();
        rejected.sort_by(|a, b| a.total_cmp(b));
        let expected: Vec<f64> = outlier_idx.iter().map(|&i| wavelength[i]).collect();
        assert_eq!(rejected, expected);
        assert_eq!(outcome.retained.len(), wavelength.len() - outlier_idx.len());

        for (a, b) in outcome.polynomial.coefficients.iter().zip(&truth.coefficients) {
            assert!((a - b).abs() < 0.02, "coefficient {a} vs {b}");
        }
    }

    #[test]
    fn clean_data_converges_in_one_iteration() {
        let (_, wavelength, flux) = synthetic(4000.0, 7000.0, 5.0, 0.004, 1);
        let outcome = clip_and_fit(&wavelength, &flux, &ContinuumConfig::default()).unwrap();
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.rejected.is_empty());
    }

    #[test]
    fn full_fit_tracks_truth_and_ignores_spikes() {
        let (truth, wavelength, mut flux) = synthetic(4000.0, 7000.0, 1.0, 0.004, 11);
        let spikes = [120usize, 980, 1500, 2222, 2900];
        for &i in &spikes {
            flux[i] += 3.0;
        }
        let spectrum = SpectrumTable::from_columns(wavelength.clone(), flux).unwrap();

        let (outcome, fit) = fit_continuum_detailed(&spectrum, &ContinuumConfig::default()).unwrap();
        assert_eq!(fit.wavelength, wavelength);
        assert_eq!(fit.continuum.len(), wavelength.len());
        assert!(fit.retained > 100);
        if fit.converged() {
            assert_eq!(fit.fitted, fit.retained);
        }

        for &i in &spikes {
            assert!(!outcome.retained.wavelength.contains(&wavelength[i]));
        }
        for (w, c) in fit.wavelength.iter().zip(&fit.continuum) {
            assert!((c - truth.eval(*w)).abs() < 0.01, "continuum at {w}: {c}");
        }
    }

    #[test]
    fn too_few_points_is_insufficient_data() {
        let err = clip_and_fit(&[1.0, 2.0, 3.0], &[1.0, 1.0, 1.0], &ContinuumConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn iteration_cap_returns_best_effort_with_warning() {
        let wavelength: Vec<f64> = (0..100).map(|i| 5000.0 + i as f64).collect();
        let mut flux: Vec<f64> = (0..100).map(|i| 1.0 + 0.001 * (i as f64).sin()).collect();
        flux[50] = 50.0;
        let config = ContinuumConfig {
            max_iterations: 1,
            ..ContinuumConfig::default()
        };
        let outcome = clip_and_fit(&wavelength, &flux, &config).unwrap();
        assert_eq!(outcome.iterations, 1);
        let warning = outcome.warning.expect("cap should produce a warning");
        assert_eq!(warning.iterations, 1);
        assert_eq!(warning.last_rejected, 1);
        assert_eq!(outcome.rejected, vec![(5050.0, 50.0)]);
        // The returned polynomial still includes the spike it just flagged.
        assert_eq!(outcome.fitted, 100);
        assert_eq!(outcome.retained.len(), 99);
    }

    #[test]
    fn zero_iterations_is_configuration_error() {
        let config = ContinuumConfig {
            max_iterations: 0,
            ..ContinuumConfig::default()
        };
        let err = clip_and_fit(&[1.0; 10], &[1.0; 10], &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
