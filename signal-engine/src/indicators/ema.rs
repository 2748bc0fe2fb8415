//! EMA (Exponential Moving Average) indicator

/// Calculate EMA from a series of values.
///
/// The first output is the simple average of the first `period` values; every later point
/// applies `(value - prev) * 2 / (period + 1) + prev`. Returns `values.len() - period + 1`
/// points, or nothing when there are fewer than `period` values.
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut results = Vec::with_capacity(values.len() - period + 1);
    results.push(seed);

    let mut prev = seed;
    for &value in &values[period..] {
        prev = (value - prev) * k + prev;
        results.push(prev);
    }

    results
}

/// Input index of the first EMA output
pub fn ema_offset(period: usize) -> usize {
    period.saturating_sub(1)
}
