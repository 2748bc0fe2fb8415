//! Indicator series computed once per candle window

use crate::data::{closes, Candle};
use crate::indicators::*;
use std::collections::{BTreeMap, HashMap};

/// One indicator output line and the candle index of its first value
#[derive(Debug, Clone, Default)]
pub struct Series {
    pub values: Vec<f64>,
    pub offset: usize,
}

impl Series {
    pub fn new(values: Vec<f64>, offset: usize) -> Self {
        Self { values, offset }
    }

    /// Value belonging to candle `index`, if that candle is past the warm-up
    pub fn value_at(&self, index: usize) -> Option<f64> {
        index
            .checked_sub(self.offset)
            .and_then(|i| self.values.get(i))
            .copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

/// All indicator lines for one candle window, keyed by [`Indicator::key`]
#[derive(Debug, Clone, Default)]
pub struct IndicatorSeries {
    series: HashMap<String, Series>,
    candle_count: usize,
}

impl IndicatorSeries {
    /// Standard battery computed for every window, regardless of strategy
    pub fn standard_battery() -> Vec<Indicator> {
        let (fast, slow, signal) = DEFAULT_MACD;
        vec![
            Indicator::ema(9),
            Indicator::ema(21),
            Indicator::ema(50),
            Indicator::sma(20),
            Indicator::sma(50),
            Indicator::rsi(DEFAULT_RSI_PERIOD),
            Indicator::Macd { fast, slow, signal, line: MacdLine::Macd },
            Indicator::Bollinger {
                period: DEFAULT_BB_PERIOD,
                std_dev: DEFAULT_BB_STD_DEV,
                band: Band::Middle,
            },
            Indicator::atr(DEFAULT_ATR_PERIOD),
            Indicator::SuperTrend {
                period: DEFAULT_SUPERTREND_PERIOD,
                multiplier: DEFAULT_SUPERTREND_MULTIPLIER,
                line: SuperTrendLine::Direction,
            },
        ]
    }

    /// Compute every requested indicator. Multi-line families (MACD, Bollinger Bands,
    /// SuperTrend) are computed once and all their lines stored.
    pub fn compute(candles: &[Candle], required: &[Indicator]) -> Self {
        let prices = closes(candles);
        let mut indicators = Self {
            series: HashMap::new(),
            candle_count: candles.len(),
        };

        for indicator in required {
            if indicators.series.contains_key(&indicator.key()) {
                continue;
            }

            match *indicator {
                Indicator::Ema { period } => {
                    let values = calculate_ema(&prices, period);
                    indicators.insert(*indicator, Series::new(values, ema_offset(period)));
                }
                Indicator::Sma { period } => {
                    let values = calculate_sma(&prices, period);
                    indicators.insert(*indicator, Series::new(values, sma_offset(period)));
                }
                Indicator::Rsi { period } => {
                    let values = calculate_rsi(&prices, period);
                    indicators.insert(*indicator, Series::new(values, rsi_offset(period)));
                }
                Indicator::Atr { period } => {
                    let values = calculate_atr(candles, period);
                    indicators.insert(*indicator, Series::new(values, atr_offset(period)));
                }
                Indicator::Macd { fast, slow, signal, .. } => {
                    let output = calculate_macd(&prices, fast, slow, signal);
                    let line = |line| Indicator::Macd { fast, slow, signal, line };
                    let signal_offset = output.signal_input_offset();
                    indicators.insert(line(MacdLine::Macd), Series::new(output.macd, output.macd_offset));
                    indicators.insert(line(MacdLine::Signal), Series::new(output.signal, signal_offset));
                    indicators.insert(line(MacdLine::Histogram), Series::new(output.histogram, signal_offset));
                }
                Indicator::Bollinger { period, std_dev, .. } => {
                    let output = calculate_bollinger_bands(&prices, period, std_dev);
                    let band = |band| Indicator::Bollinger { period, std_dev, band };
                    let offset = sma_offset(period);
                    indicators.insert(band(Band::Upper), Series::new(output.upper, offset));
                    indicators.insert(band(Band::Middle), Series::new(output.middle, offset));
                    indicators.insert(band(Band::Lower), Series::new(output.lower, offset));
                }
                Indicator::SuperTrend { period, multiplier, .. } => {
                    let output = calculate_supertrend(candles, period, multiplier);
                    let line = |line| Indicator::SuperTrend { period, multiplier, line };
                    let direction = output.direction.iter().map(|&d| f64::from(d)).collect();
                    indicators.insert(line(SuperTrendLine::Upper), Series::new(output.upper, output.offset));
                    indicators.insert(line(SuperTrendLine::Lower), Series::new(output.lower, output.offset));
                    indicators.insert(line(SuperTrendLine::Direction), Series::new(direction, output.offset));
                }
            }
        }

        indicators
    }

    fn insert(&mut self, indicator: Indicator, series: Series) {
        self.series.insert(indicator.key(), series);
    }

    pub fn get(&self, indicator: &Indicator) -> Option<&Series> {
        self.series.get(&indicator.key())
    }

    /// Value of `indicator` at candle `index`
    pub fn value_at(&self, indicator: &Indicator, index: usize) -> Option<f64> {
        self.get(indicator).and_then(|series| series.value_at(index))
    }

    /// Value of `indicator` on the most recent candle
    pub fn latest(&self, indicator: &Indicator) -> Option<f64> {
        self.candle_count
            .checked_sub(1)
            .and_then(|index| self.value_at(indicator, index))
    }

    /// Most recent value of every line that has one
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.series
            .iter()
            .filter_map(|(key, series)| series.last().map(|value| (key.clone(), value)))
            .collect()
    }

    pub fn candle_count(&self) -> usize {
        self.candle_count
    }
}
