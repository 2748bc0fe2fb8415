//! Candle timeframes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported candle intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H8,
    H12,
    D1,
    W1,
}

impl Timeframe {
    /// Exchange notation ("1m", "1h", ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::H6 => "6h",
            Timeframe::H8 => "8h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }

    /// Interval length in milliseconds
    pub fn interval_ms(&self) -> i64 {
        const MINUTE: i64 = 60_000;
        match self {
            Timeframe::M1 => MINUTE,
            Timeframe::M3 => 3 * MINUTE,
            Timeframe::M5 => 5 * MINUTE,
            Timeframe::M15 => 15 * MINUTE,
            Timeframe::M30 => 30 * MINUTE,
            Timeframe::H1 => 60 * MINUTE,
            Timeframe::H2 => 2 * 60 * MINUTE,
            Timeframe::H4 => 4 * 60 * MINUTE,
            Timeframe::H6 => 6 * 60 * MINUTE,
            Timeframe::H8 => 8 * 60 * MINUTE,
            Timeframe::H12 => 12 * 60 * MINUTE,
            Timeframe::D1 => 24 * 60 * MINUTE,
            Timeframe::W1 => 7 * 24 * 60 * MINUTE,
        }
    }

    /// Start (epoch ms) of the candle that contains `timestamp_ms`.
    ///
    /// Weekly candles on Binance open on Monday, so the epoch (a Thursday) is shifted by
    /// four days before flooring.
    pub fn candle_start(&self, timestamp_ms: i64) -> i64 {
        let interval = self.interval_ms();
        match self {
            Timeframe::W1 => {
                let shift = 4 * 24 * 60 * 60_000;
                (timestamp_ms - shift).div_euclid(interval) * interval + shift
            }
            _ => timestamp_ms.div_euclid(interval) * interval,
        }
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let timeframe = match s.trim().to_lowercase().as_str() {
            "1m" => Timeframe::M1,
            "3m" => Timeframe::M3,
            "5m" => Timeframe::M5,
            "15m" => Timeframe::M15,
            "30m" => Timeframe::M30,
            "1h" | "60m" => Timeframe::H1,
            "2h" => Timeframe::H2,
            "4h" => Timeframe::H4,
            "6h" => Timeframe::H6,
            "8h" => Timeframe::H8,
            "12h" => Timeframe::H12,
            "1d" | "d" => Timeframe::D1,
            "1w" | "w" => Timeframe::W1,
            _ => return Err(anyhow::anyhow!("Unsupported interval: {}", s)),
        };
        Ok(timeframe)
    }
}

impl TryFrom<String> for Timeframe {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(value: Timeframe) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
