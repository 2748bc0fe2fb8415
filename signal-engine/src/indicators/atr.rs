//! ATR (Average True Range) indicator

use crate::data::Candle;
use crate::indicators::calculate_sma;
use ta::indicators::TrueRange;
use ta::Next;

/// Calculate ATR as the SMA of true range.
///
/// The first candle has no previous close and contributes no true range, so output `j`
/// belongs to candle `j + period` and the result has `candles.len() - period` points.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Vec<f64> {
    if period == 0 || candles.len() <= period {
        return Vec::new();
    }

    let mut true_range = TrueRange::new();
    let ranges: Vec<f64> = candles
        .iter()
        .map(|candle| true_range.next(candle))
        .skip(1)
        .collect();

    calculate_sma(&ranges, period)
}

/// Candle index of the first ATR output
pub fn atr_offset(period: usize) -> usize {
    period
}
