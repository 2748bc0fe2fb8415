//! OHLCV candle data structures

use serde::{Deserialize, Serialize};

/// OHLCV candle data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time (epoch milliseconds)
    pub open_time: i64,
    /// Close time (epoch milliseconds)
    pub close_time: i64,
    /// Opening price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Volume
    pub volume: f64,
}

/// Raw price field a condition can compare against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
}

impl PriceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
        }
    }
}

impl Candle {
    /// Create a new candle
    pub fn new(
        open_time: i64,
        close_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Read one of the raw price fields
    pub fn price(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
        }
    }

    /// Get median price (HL/2)
    pub fn median_price(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// Check if candle is bullish
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Get total range (high - low)
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

impl ta::Open for Candle {
    fn open(&self) -> f64 {
        self.open
    }
}

impl ta::High for Candle {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for Candle {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for Candle {
    fn close(&self) -> f64 {
        self.close
    }
}

impl ta::Volume for Candle {
    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Get close prices as vector
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_fields() {
        let candle = Candle::new(0, 59_999, 100.0, 110.0, 95.0, 105.0, 1000.0);

        assert_eq!(candle.price(PriceField::Open), 100.0);
        assert_eq!(candle.price(PriceField::High), 110.0);
        assert_eq!(candle.price(PriceField::Low), 95.0);
        assert_eq!(candle.price(PriceField::Close), 105.0);
        assert_eq!(candle.median_price(), 102.5);
        assert_eq!(candle.range(), 15.0);
        assert!(candle.is_bullish());
    }
}
