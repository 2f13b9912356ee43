//! Least squares solver.
//!
//! Continuum fitting repeatedly solves small, tall regression problems:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! with a handful of columns (polynomial degree + 1) and hundreds to thousands
//! of rows. We solve via SVD because the design matrix is tall and
//! Vandermonde columns can be close to collinear. (Nalgebra's `QR::solve` is
//! intended for square systems and will panic for non-square matrices.)

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
