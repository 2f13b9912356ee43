//! Least-squares polynomials over a scaled domain.
//!
//! Wavelengths are in the thousands of Å; raising them to the 5th power
//! directly produces a hopelessly conditioned Vandermonde matrix. We fit in the
//! mapped variable `t = (2x - (lo + hi)) / (hi - lo)` which spans `[-1, 1]`
//! over the fit domain `[lo, hi]`, and keep the domain next to the
//! coefficients so the polynomial can be re-evaluated anywhere.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::math::solve_least_squares;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    /// Coefficients in ascending powers of the mapped variable `t`.
    pub coefficients: Vec<f64>,
    /// Wavelength interval mapped onto `[-1, 1]`.
    pub domain: (f64, f64),
}

impl Polynomial {
    pub fn new(coefficients: Vec<f64>, domain: (f64, f64)) -> Self {
        Self { coefficients, domain }
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// Least-squares fit of the given degree.
    ///
    /// Returns `None` when there are fewer points than coefficients, the
    /// abscissae span no interval, or the solve fails.
    pub fn fit(x: &[f64], y: &[f64], degree: usize) -> Option<Self> {
        let n = x.len();
        let p = degree + 1;
        if n != y.len() || n < p {
            return None;
        }

        let lo = x.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !(lo.is_finite() && hi.is_finite()) || hi <= lo {
            return None;
        }
        let domain = (lo, hi);

        let t: Vec<f64> = x.iter().map(|&v| map_to_unit(v, domain)).collect();
        let design = DMatrix::from_fn(n, p, |i, j| t[i].powi(j as i32));
        let rhs = DVector::from_column_slice(y);

        let beta = solve_least_squares(&design, &rhs)?;
        Some(Self {
            coefficients: beta.iter().copied().collect(),
            domain,
        })
    }

    /// Evaluate at wavelength `x` (Horner in the mapped variable).
    pub fn eval(&self, x: f64) -> f64 {
        let t = map_to_unit(x, self.domain);
        self.coefficients.iter().rev().fold(0.0, |acc, &c| acc * t + c)
    }

    pub fn eval_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }
}

fn map_to_unit(x: f64, (lo, hi): (f64, f64)) -> f64 {
    (2.0 * x - (lo + hi)) / (hi - lo)
}
