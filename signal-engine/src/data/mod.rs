//! Market data module
//!
//! OHLCV candles and the timeframes they are sampled on.

pub mod candle;
pub mod timeframe;

pub use candle::*;
pub use timeframe::*;
