//! Small statistics helpers: trapezoidal integration, moments, median filter.

/// Trapezoidal integral of `y` over `x`.
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| 0.5 * (xs[1] - xs[0]) * (ys[0] + ys[1]))
        .sum()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (`n - 1` denominator).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (n as f64 - 1.0)).sqrt())
}

/// Sliding median with a `size`-sample window and reflected boundaries.
///
/// The signal is extended by mirroring about its edges (`d c b a | a b c d | d c b a`).
/// For even sizes the window reaches one sample further left than right and
/// the upper of the two middle values is taken.
pub fn median_filter(values: &[f64], size: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 || size <= 1 {
        return values.to_vec();
    }

    let half = (size / 2) as isize;
    let mut window = Vec::with_capacity(size);
    (0..n as isize)
        .map(|i| {
            window.clear();
            for j in (i - half)..(i - half + size as isize) {
                window.push(values[reflect_index(j, n)]);
            }
            window.sort_by(|a, b| a.total_cmp(b));
            window[size / 2]
        })
        .collect()
}

fn reflect_index(j: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = j.rem_euclid(period);
    if m < n as isize {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}
