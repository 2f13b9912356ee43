//! Piecewise-linear interpolation on an ascending grid.
//!
//! Two boundary policies are used by the pipeline:
//! - **clamped**: outside the grid, return the first/last sample value
//!   (resampling stages)
//! - **strict**: outside the grid there is no value (band extraction)

/// Evaluate the linear interpolant of `(xp, fp)` at `x`, clamping outside the domain.
///
/// `xp` must be strictly increasing and non-empty, and `fp.len() == xp.len()`.
pub fn interp_clamped(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    debug_assert_eq!(xp.len(), fp.len());
    let n = xp.len();
    let i = xp.partition_point(|&v| v <= x);
    if i == 0 {
        return fp[0];
    }
    if i == n {
        return fp[n - 1];
    }
    lerp(x, xp[i - 1], xp[i], fp[i - 1], fp[i])
}

/// Evaluate the linear interpolant at `x`, or `None` when `x` is outside `[xp[0], xp[n-1]]`.
pub fn interp_within(x: f64, xp: &[f64], fp: &[f64]) -> Option<f64> {
    let (first, last) = (*xp.first()?, *xp.last()?);
    if !(x >= first && x <= last) {
        return None;
    }
    Some(interp_clamped(x, xp, fp))
}

/// Resample `(xp, fp)` onto `targets` with clamped extrapolation.
pub fn resample_clamped(targets: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    targets.iter().map(|&x| interp_clamped(x, xp, fp)).collect()
}

#[inline]
fn lerp(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    let t = (x - x0) / (x1 - x0);
    y0 + t * (y1 - y0)
}

/// The straight line through two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub slope: f64,
    pub intercept: f64,
}

impl Line {
    /// Returns `None` when `x0 == x1` (the line is not a function of x).
    pub fn through(p0: (f64, f64), p1: (f64, f64)) -> Option<Self> {
        let dx = p1.0 - p0.0;
        if dx == 0.0 || !dx.is_finite() {
            return None;
        }
        let slope = (p1.1 - p0.1) / dx;
        Some(Self {
            slope,
            intercept: p0.1 - slope * p0.0,
        })
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_interpolation_matches_endpoints_and_midpoints() {
        let xp = [1.0, 2.0, 4.0];
        let fp = [10.0, 20.0, 0.0];
        assert_eq!(interp_clamped(0.0, &xp, &fp), 10.0);
        assert_eq!(interp_clamped(1.0, &xp, &fp), 10.0);
        assert!((interp_clamped(1.5, &xp, &fp) - 15.0).abs() < 1e-12);
        assert_eq!(interp_clamped(2.0, &xp, &fp), 20.0);
        assert!((interp_clamped(3.0, &xp, &fp) - 10.0).abs() < 1e-12);
        assert_eq!(interp_clamped(4.0, &xp, &fp), 0.0);
        assert_eq!(interp_clamped(9.0, &xp, &fp), 0.0);
    }

    #[test]
    fn strict_interpolation_rejects_outside_domain() {
        let xp = [1.0, 2.0];
        let fp = [0.0, 1.0];
        assert_eq!(interp_within(0.999, &xp, &fp), None);
        assert_eq!(interp_within(2.001, &xp, &fp), None);
        assert_eq!(interp_within(2.0, &xp, &fp), Some(1.0));
        assert_eq!(interp_within(f64::NAN, &xp, &fp), None);
    }

    #[test]
    fn line_through_two_points() {
        let line = Line::through((0.0, 1.0), (2.0, 5.0)).unwrap();
        assert!((line.eval(1.0) - 3.0).abs() < 1e-12);
        assert!(Line::through((1.0, 0.0), (1.0, 2.0)).is_none());
    }
}
