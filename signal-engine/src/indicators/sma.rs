//! SMA (Simple Moving Average) indicator

use ta::indicators::SimpleMovingAverage;
use ta::Next;

/// Calculate SMA from a series of values.
///
/// Returns `values.len() - period + 1` window means; the `ta` indicator's partial
/// warm-up averages are dropped.
pub fn calculate_sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let mut sma = match SimpleMovingAverage::new(period) {
        Ok(sma) => sma,
        Err(_) => return Vec::new(),
    };

    values
        .iter()
        .map(|&value| sma.next(value))
        .skip(period - 1)
        .collect()
}

/// Input index of the first SMA output
pub fn sma_offset(period: usize) -> usize {
    period.saturating_sub(1)
}
