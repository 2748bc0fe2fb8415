//! Unit tests for signal-engine indicator functions

#[cfg(test)]
mod tests {
    use signal_engine::data::{Candle, Timeframe};
    use signal_engine::indicators::*;

    fn wave(count: usize) -> Vec<f64> {
        (0..count)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.05)
            .collect()
    }

    fn candles_from(prices: &[f64]) -> Vec<Candle> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let open_time = i as i64 * 3_600_000;
                Candle::new(open_time, open_time + 3_599_999, p, p + 1.5, p - 1.5, p, 100.0)
            })
            .collect()
    }

    #[test]
    fn test_candle_creation() {
        let candle = Candle::new(0, 59_999, 100.0, 110.0, 95.0, 105.0, 1000.0);

        assert_eq!(candle.open, 100.0);
        assert_eq!(candle.high, 110.0);
        assert_eq!(candle.low, 95.0);
        assert_eq!(candle.close, 105.0);
        assert!(candle.is_bullish());
        assert_eq!(candle.range(), 15.0);
        assert_eq!(candle.median_price(), 102.5);
    }

    #[test]
    fn test_output_lengths() {
        let values = wave(40);
        for period in [1usize, 2, 5, 14, 39, 40] {
            assert_eq!(calculate_ema(&values, period).len(), values.len() - period + 1);
            assert_eq!(calculate_sma(&values, period).len(), values.len() - period + 1);
            if period < values.len() {
                assert_eq!(calculate_rsi(&values, period).len(), values.len() - period);
            }
        }
    }

    #[test]
    fn test_short_input_is_empty() {
        let values = wave(10);
        assert!(calculate_ema(&values, 11).is_empty());
        assert!(calculate_sma(&values, 11).is_empty());
        assert!(calculate_rsi(&values, 10).is_empty());
        assert!(calculate_rsi(&values, 11).is_empty());
        assert!(calculate_macd(&values, 12, 26, 9).macd.is_empty());
        assert!(calculate_atr(&candles_from(&values), 14).is_empty());
    }

    #[test]
    fn test_rsi_bounds() {
        let rsi = calculate_rsi(&wave(200), 14);
        assert!(!rsi.is_empty());
        assert!(rsi.iter().all(|v| (0.0..=100.0).contains(v)));
    }

    #[test]
    fn test_macd_histogram_alignment() {
        let output = calculate_macd(&wave(120), 12, 26, 9);
        let signal_start = output.signal_input_offset() - output.macd_offset;

        assert_eq!(output.signal.len(), output.histogram.len());
        for (j, histogram) in output.histogram.iter().enumerate() {
            let expected = output.macd[j + signal_start] - output.signal[j];
            assert!((histogram - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_bollinger_band_ordering() {
        let output = calculate_bollinger_bands(&wave(80), 20, 2.0);
        assert_eq!(output.middle.len(), 61);
        for i in 0..output.middle.len() {
            assert!(output.upper[i] >= output.middle[i]);
            assert!(output.middle[i] >= output.lower[i]);
        }
    }

    #[test]
    fn test_supertrend_direction_values() {
        let candles = candles_from(&wave(150));
        let st = calculate_supertrend(&candles, 10, 3.0);
        assert_eq!(st.direction.len(), candles.len() - 10);
        assert!(st.direction.iter().all(|d| *d == BULLISH || *d == BEARISH));
    }

    #[test]
    fn test_standard_battery_on_short_window() {
        let candles = candles_from(&wave(30));
        let indicators = IndicatorSeries::compute(&candles, &IndicatorSeries::standard_battery());

        assert!(indicators.latest(&Indicator::ema(21)).is_some());
        assert!(indicators.latest(&Indicator::ema(50)).is_none());
        assert!(indicators.latest(&Indicator::sma(50)).is_none());
        assert_eq!(indicators.candle_count(), 30);
    }

    #[test]
    fn test_timeframe_parsing() {
        let tf: Timeframe = "1h".parse().unwrap();
        assert_eq!(tf.interval_ms(), 3_600_000);
        assert_eq!(tf.candle_start(7_260_000), 7_200_000);
        assert!("7m".parse::<Timeframe>().is_err());
    }
}
