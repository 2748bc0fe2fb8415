//! SuperTrend indicator

use crate::data::Candle;
use crate::indicators::{atr_offset, calculate_atr};

pub const BULLISH: i8 = 1;
pub const BEARISH: i8 = -1;

/// SuperTrend result structure; `upper[j]`, `lower[j]` and `direction[j]` belong to candle
/// `j + offset`
#[derive(Debug, Clone, Default)]
pub struct SuperTrendOutput {
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
    pub direction: Vec<i8>,
    pub offset: usize,
}

/// Calculate SuperTrend bands and direction.
///
/// Basic bands are `hl2 ± multiplier * ATR`. The upper band may only move down and the lower
/// band only up, unless the previous close broke through the previous band. Direction turns
/// bullish when the close rises above the previous upper band and bearish when it falls
/// below the previous lower band. The first bar is bullish by assumption.
pub fn calculate_supertrend(candles: &[Candle], atr_period: usize, multiplier: f64) -> SuperTrendOutput {
    let atr = calculate_atr(candles, atr_period);
    let offset = atr_offset(atr_period);

    let mut output = SuperTrendOutput {
        upper: Vec::with_capacity(atr.len()),
        lower: Vec::with_capacity(atr.len()),
        direction: Vec::with_capacity(atr.len()),
        offset,
    };

    for (j, atr_value) in atr.iter().enumerate() {
        let candle = &candles[j + offset];
        let hl2 = candle.median_price();
        let basic_upper = hl2 + multiplier * atr_value;
        let basic_lower = hl2 - multiplier * atr_value;

        if j == 0 {
            output.upper.push(basic_upper);
            output.lower.push(basic_lower);
            output.direction.push(BULLISH);
            continue;
        }

        let prev_close = candles[j + offset - 1].close;
        let prev_upper = output.upper[j - 1];
        let prev_lower = output.lower[j - 1];
        let prev_direction = output.direction[j - 1];

        let upper = if basic_upper < prev_upper || prev_close > prev_upper {
            basic_upper
        } else {
            prev_upper
        };
        let lower = if basic_lower > prev_lower || prev_close < prev_lower {
            basic_lower
        } else {
            prev_lower
        };

        let direction = if prev_direction == BEARISH && candle.close > prev_upper {
            BULLISH
        } else if prev_direction == BULLISH && candle.close < prev_lower {
            BEARISH
        } else {
            prev_direction
        };

        output.upper.push(upper);
        output.lower.push(lower);
        output.direction.push(direction);
    }

    output
}
