//! Window Statistics Helpers

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n-1 denominator), 0 for fewer than 2 values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Peak-to-peak span (max - min), 0 for an empty slice.
pub fn span(values: &[f64]) -> f64 {
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if values.is_empty() {
        0.0
    } else {
        max - min
    }
}

/// Maximum absolute value, 0 for an empty slice.
pub fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |acc, v| acc.max(v.abs()))
}
