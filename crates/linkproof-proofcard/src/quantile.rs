//! Nearest-rank percentiles.
//!
//! `rank = ceil(p / 100 * n)`, clamped to `[1, n]`, then the rank-th value of
//! the ascending sort (1-indexed). No interpolation. Empty input yields 0.

/// Percentile `p` (0..=100) of `values`.
pub fn nearest_rank(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted[rank(sorted.len(), p) - 1]
}

/// p50, p95 and p5 from one sort.
pub fn p50_p95_p5(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let at = |p: f64| sorted[rank(sorted.len(), p) - 1];
    (at(50.0), at(95.0), at(5.0))
}

fn rank(n: usize, p: f64) -> usize {
    let r = (p / 100.0 * n as f64).ceil();
    if r.is_nan() || r < 1.0 {
        1
    } else {
        (r as usize).min(n)
    }
}
