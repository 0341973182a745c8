//! Continuous percentile with linear interpolation.
//!
//! Matches PostgreSQL `PERCENTILE_CONT`: the values are sorted and the
//! result is interpolated between the two closest ranks at
//! `fraction * (n - 1)`.

/// Continuous percentile of `values` at `fraction` (`0.0..=1.0`).
///
/// Returns `None` for an empty input. NaN values are ignored.
pub fn percentile_cont(values: &[f64], fraction: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let fraction = fraction.clamp(0.0, 1.0);
    let position = fraction * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Median (50th percentile) of `values`.
pub fn median(values: &[f64]) -> Option<f64> {
    percentile_cont(values, 0.5)
}
