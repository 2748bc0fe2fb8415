//! Technical indicators module
//!
//! Every indicator is a pure function over a price or candle slice. Outputs are shorter than
//! their input by the indicator's warm-up, so each module also reports the input index of its
//! first output. Short input never panics; it yields an empty result.

pub mod atr;
pub mod bb;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod series;
pub mod sma;
pub mod supertrend;

pub use atr::*;
pub use bb::*;
pub use ema::*;
pub use macd::*;
pub use rsi::*;
pub use series::*;
pub use sma::*;
pub use supertrend::*;

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_ATR_PERIOD: usize = 14;
pub const DEFAULT_MACD: (usize, usize, usize) = (12, 26, 9);
pub const DEFAULT_BB_PERIOD: usize = 20;
pub const DEFAULT_BB_STD_DEV: f64 = 2.0;
pub const DEFAULT_SUPERTREND_PERIOD: usize = 10;
pub const DEFAULT_SUPERTREND_MULTIPLIER: f64 = 3.0;

/// Which of the three MACD outputs a reference reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacdLine {
    Macd,
    Signal,
    Histogram,
}

/// Which Bollinger band a reference reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Upper,
    Middle,
    Lower,
}

/// Which SuperTrend output a reference reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuperTrendLine {
    Upper,
    Lower,
    Direction,
}

/// A named indicator output with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Ema { period: usize },
    Sma { period: usize },
    Rsi { period: usize },
    Macd { fast: usize, slow: usize, signal: usize, line: MacdLine },
    Bollinger { period: usize, std_dev: f64, band: Band },
    Atr { period: usize },
    SuperTrend { period: usize, multiplier: f64, line: SuperTrendLine },
}

impl Indicator {
    pub fn ema(period: usize) -> Self {
        Indicator::Ema { period }
    }

    pub fn sma(period: usize) -> Self {
        Indicator::Sma { period }
    }

    pub fn rsi(period: usize) -> Self {
        Indicator::Rsi { period }
    }

    pub fn atr(period: usize) -> Self {
        Indicator::Atr { period }
    }

    /// Primary period of the indicator, if it has a single one
    pub fn period(&self) -> Option<usize> {
        match self {
            Indicator::Ema { period }
            | Indicator::Sma { period }
            | Indicator::Rsi { period }
            | Indicator::Atr { period }
            | Indicator::Bollinger { period, .. }
            | Indicator::SuperTrend { period, .. } => Some(*period),
            Indicator::Macd { .. } => None,
        }
    }

    /// Key of the series in an [`IndicatorSeries`]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indicator::Ema { period } => write!(f, "ema({})", period),
            Indicator::Sma { period } => write!(f, "sma({})", period),
            Indicator::Rsi { period } => write!(f, "rsi({})", period),
            Indicator::Atr { period } => write!(f, "atr({})", period),
            Indicator::Macd { fast, slow, signal, line } => {
                let name = match line {
                    MacdLine::Macd => "macd",
                    MacdLine::Signal => "macd.signal",
                    MacdLine::Histogram => "macd.histogram",
                };
                if (*fast, *slow, *signal) == DEFAULT_MACD {
                    write!(f, "{}", name)
                } else {
                    write!(f, "{}({},{},{})", name, fast, slow, signal)
                }
            }
            Indicator::Bollinger { period, std_dev, band } => {
                let name = match band {
                    Band::Upper => "bb.upper",
                    Band::Middle => "bb.middle",
                    Band::Lower => "bb.lower",
                };
                write!(f, "{}({},{})", name, period, std_dev)
            }
            Indicator::SuperTrend { period, multiplier, line } => {
                let name = match line {
                    SuperTrendLine::Upper => "supertrend.upper",
                    SuperTrendLine::Lower => "supertrend.lower",
                    SuperTrendLine::Direction => "supertrend.direction",
                };
                write!(f, "{}({},{})", name, period, multiplier)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_keys() {
        assert_eq!(Indicator::ema(9).key(), "ema(9)");
        assert_eq!(Indicator::rsi(14).to_string(), "rsi(14)");
        let signal = Indicator::Macd { fast: 12, slow: 26, signal: 9, line: MacdLine::Signal };
        assert_eq!(signal.key(), "macd.signal");
        let lower = Indicator::Bollinger { period: 20, std_dev: 2.0, band: Band::Lower };
        assert_eq!(lower.key(), "bb.lower(20,2)");
        let direction = Indicator::SuperTrend {
            period: 10,
            multiplier: 3.0,
            line: SuperTrendLine::Direction,
        };
        assert_eq!(direction.key(), "supertrend.direction(10,3)");
    }
}
