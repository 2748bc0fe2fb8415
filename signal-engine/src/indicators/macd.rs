//! MACD (Moving Average Convergence Divergence) indicator

use crate::indicators::{calculate_ema, ema_offset};

/// MACD result structure
///
/// The three lines start at different input indices: `macd[j]` belongs to input
/// `j + macd_offset`, `signal[j]` and `histogram[j]` to input `j + macd_offset + signal_offset`.
#[derive(Debug, Clone, Default)]
pub struct MacdOutput {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
    /// Input index of `macd[0]`
    pub macd_offset: usize,
    /// Index into `macd` of `signal[0]`
    pub signal_offset: usize,
}

impl MacdOutput {
    /// Input index of `signal[0]` and `histogram[0]`
    pub fn signal_input_offset(&self) -> usize {
        self.macd_offset + self.signal_offset
    }
}

/// Calculate MACD, its signal line and histogram
pub fn calculate_macd(
    values: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> MacdOutput {
    let mut output = MacdOutput {
        macd_offset: ema_offset(slow_period),
        signal_offset: ema_offset(signal_period),
        ..Default::default()
    };

    if fast_period == 0 || fast_period > slow_period {
        return output;
    }

    let fast = calculate_ema(values, fast_period);
    let slow = calculate_ema(values, slow_period);
    if slow.is_empty() {
        return output;
    }

    // fast[j + shift] and slow[j] belong to the same input index
    let shift = slow_period - fast_period;
    output.macd = slow
        .iter()
        .enumerate()
        .map(|(j, slow_value)| fast[j + shift] - slow_value)
        .collect();

    output.signal = calculate_ema(&output.macd, signal_period);
    output.histogram = output
        .signal
        .iter()
        .enumerate()
        .map(|(j, signal_value)| output.macd[j + output.signal_offset] - signal_value)
        .collect();

    output
}
