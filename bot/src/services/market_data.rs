//! Candle and ticker feed

use crate::services::exchange::BinanceClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use shared::{Config, MarketType};
use signal_engine::data::{Candle, Timeframe};
use std::time::Duration;

#[async_trait]
pub trait MarketData: Send + Sync {
    /// Most recent `limit` candles, ascending by open time
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        market_type: MarketType,
        limit: usize,
    ) -> Result<Vec<Candle>>;

    async fn fetch_current_price(&self, symbol: &str, market_type: MarketType) -> Result<f64>;
}

/// Public Binance market data, read from the host that matches the market type
pub struct BinanceMarketData {
    spot: BinanceClient,
    futures: BinanceClient,
    coin_futures: BinanceClient,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

/// `/dapi/v1/ticker/price` answers with a list even for one symbol
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TickerReply {
    One(TickerPrice),
    Many(Vec<TickerPrice>),
}

impl BinanceMarketData {
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.exchange_timeout_secs))
            .build()?;

        Ok(Self {
            spot: BinanceClient::public_client(http.clone(), &config.binance_spot_url),
            futures: BinanceClient::public_client(http.clone(), &config.binance_futures_url),
            coin_futures: BinanceClient::public_client(http, &config.binance_coin_futures_url),
        })
    }

    fn route(&self, market_type: MarketType) -> (&BinanceClient, &'static str) {
        match market_type {
            MarketType::Spot => (&self.spot, "/api/v3"),
            MarketType::LinearFutures => (&self.futures, "/fapi/v1"),
            MarketType::InverseFutures => (&self.coin_futures, "/dapi/v1"),
        }
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::String(text) => text.parse().ok(),
        other => other.as_f64(),
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::String(text) => text.parse().ok(),
        other => other.as_i64(),
    }
}

/// `[openTime, open, high, low, close, volume, closeTime, ...]`
pub fn parse_kline(row: &[Value]) -> Option<Candle> {
    Some(Candle::new(
        integer(row.first()?)?,
        integer(row.get(6)?)?,
        number(row.get(1)?)?,
        number(row.get(2)?)?,
        number(row.get(3)?)?,
        number(row.get(4)?)?,
        number(row.get(5)?)?,
    ))
}

#[async_trait]
impl MarketData for BinanceMarketData {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        market_type: MarketType,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let (client, prefix) = self.route(market_type);
        let rows: Vec<Vec<Value>> = client
            .public(
                &format!("{}/klines", prefix),
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", timeframe.as_str().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await
            .with_context(|| format!("Failed to fetch {} {} candles", symbol, timeframe))?;

        let mut candles: Vec<Candle> = rows.iter().filter_map(|row| parse_kline(row)).collect();
        candles.sort_by_key(|c| c.open_time);
        Ok(candles)
    }

    async fn fetch_current_price(&self, symbol: &str, market_type: MarketType) -> Result<f64> {
        let (client, prefix) = self.route(market_type);
        let reply: TickerReply = client
            .public(
                &format!("{}/ticker/price", prefix),
                &[("symbol", symbol.to_string())],
            )
            .await
            .with_context(|| format!("Failed to fetch {} price", symbol))?;

        let ticker = match reply {
            TickerReply::One(ticker) => Some(ticker),
            TickerReply::Many(tickers) => tickers.into_iter().find(|t| t.symbol == symbol),
        }
        .ok_or_else(|| anyhow::anyhow!("No price returned for {}", symbol))?;

        ticker
            .price
            .parse()
            .with_context(|| format!("Invalid price for {}: {}", symbol, ticker.price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kline_row() {
        let row: Vec<Value> = serde_json::from_str(
            r#"[1499040000000, "0.01634790", "0.80000000", "0.01575800", "0.01577100",
                "148976.11427815", 1499644799999, "2434.19055334", 308, "1756.87402397",
                "28.46694368", "0"]"#,
        )
        .unwrap();

        let candle = parse_kline(&row).unwrap();
        assert_eq!(candle.open_time, 1_499_040_000_000);
        assert_eq!(candle.close_time, 1_499_644_799_999);
        assert!((candle.high - 0.8).abs() < 1e-12);
        assert!((candle.close - 0.015771).abs() < 1e-12);
    }

    #[test]
    fn test_short_kline_row_is_skipped() {
        let row: Vec<Value> = serde_json::from_str(r#"[1499040000000, "1.0"]"#).unwrap();
        assert!(parse_kline(&row).is_none());
    }
}
