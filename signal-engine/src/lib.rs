//! Signal-Engine: the pure half of ScriptTrader
//!
//! This crate turns a free-form strategy script and a window of OHLCV candles into a trade
//! signal. It performs no I/O:
//! - [ta-rs](https://github.com/greyblake/ta-rs) backs the moving-window indicators
//! - [regex](https://docs.rs/regex) backs the heuristic script detectors
//!
//! # Features
//!
//! - **Data**: OHLCV candles and timeframe arithmetic
//! - **Technical Indicators**: EMA, SMA, RSI, MACD, Bollinger Bands, ATR, SuperTrend
//! - **Strategy Parser**: script text to entry/exit condition lists
//! - **Signal Evaluator**: entry and exit scans over a short lookback window
//!
//! # Example
//!
//! ```no_run
//! use signal_engine::prelude::*;
//!
//! fn signal_for(script: &str, candles: &[Candle], price: f64) -> Result<TradeSignal> {
//!     let strategy = StrategyParser::default().parse(script)?;
//!     let indicators = IndicatorSeries::compute(candles, &strategy.required_indicators());
//!     Ok(evaluate_strategy(&strategy, candles, &indicators, price))
//! }
//! ```

pub mod data;
pub mod indicators;
pub mod strategy;

// Re-export commonly used types
pub mod prelude {
    pub use crate::data::*;
    pub use crate::indicators::*;
    pub use crate::strategy::*;

    pub use anyhow::{Context, Result};
}

/// Result type alias
pub type Result<T> = anyhow::Result<T>;
