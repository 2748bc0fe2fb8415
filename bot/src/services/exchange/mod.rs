//! Exchange gateway
//!
//! One [`ExchangeRouter`] per market type, all speaking the signed Binance REST dialect
//! through a shared [`BinanceClient`]. The execution layer only sees the trait, so tests
//! swap in scripted routers through [`ExchangeConnector`].

pub mod binance;
pub mod futures;
pub mod spot;

pub use binance::BinanceClient;
pub use futures::FuturesRouter;
pub use spot::SpotRouter;

use crate::error::ExchangeError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{Config, Credentials, MarketType, TradeSide};
use std::sync::Arc;
use std::time::Duration;

/// Quote assets recognised when a symbol has to be split without exchange metadata
const KNOWN_QUOTES: &[&str] = &["USDT", "USDC", "FDUSD", "BUSD", "USD", "BTC", "ETH", "BNB"];

/// Trading rules of one symbol
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolFilters {
    pub base_asset: String,
    pub quote_asset: String,
    /// Asset the futures balance is held in (quote for linear, base for inverse)
    pub margin_asset: String,
    /// Lot step; quantities are multiples of it
    pub step_size: Decimal,
    pub min_qty: Decimal,
    /// Minimum order value in quote units; zero when the market has none
    pub min_notional: Decimal,
    pub tick_size: Decimal,
    /// USD value of one inverse contract
    pub contract_size: Option<Decimal>,
}

impl SymbolFilters {
    /// Conservative rules used when exchange metadata cannot be loaded
    pub fn fallback(symbol: &str, market_type: MarketType) -> Self {
        let (base, quote) = split_symbol(symbol);
        match market_type {
            MarketType::Spot | MarketType::LinearFutures => SymbolFilters {
                margin_asset: quote.clone(),
                base_asset: base,
                quote_asset: quote,
                step_size: Decimal::new(1, 3),
                min_qty: Decimal::new(1, 3),
                min_notional: if market_type == MarketType::Spot {
                    Decimal::from(10)
                } else {
                    Decimal::from(5)
                },
                tick_size: Decimal::new(1, 2),
                contract_size: None,
            },
            MarketType::InverseFutures => SymbolFilters {
                contract_size: Some(if base == "BTC" {
                    Decimal::from(100)
                } else {
                    Decimal::from(10)
                }),
                margin_asset: base.clone(),
                base_asset: base,
                quote_asset: quote,
                step_size: Decimal::ONE,
                min_qty: Decimal::ONE,
                min_notional: Decimal::ZERO,
                tick_size: Decimal::new(1, 1),
            },
        }
    }

    /// Asset whose free balance funds an entry
    pub fn balance_asset(&self, market_type: MarketType) -> &str {
        match market_type {
            MarketType::Spot => &self.quote_asset,
            MarketType::LinearFutures | MarketType::InverseFutures => &self.margin_asset,
        }
    }
}

/// `BTCUSDT` -> (`BTC`, `USDT`); `BTCUSD_PERP` -> (`BTC`, `USD`)
pub fn split_symbol(symbol: &str) -> (String, String) {
    let pair = symbol.split('_').next().unwrap_or(symbol).to_uppercase();
    for quote in KNOWN_QUOTES {
        if let Some(base) = pair.strip_suffix(quote) {
            if !base.is_empty() {
                return (base.to_string(), quote.to_string());
            }
        }
    }
    (pair, "USDT".to_string())
}

/// A filled market order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFill {
    pub order_id: String,
    pub quantity: Decimal,
    /// Zero when the exchange did not report an average price
    pub avg_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectiveKind {
    StopLoss,
    TakeProfit,
}

impl ProtectiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectiveKind::StopLoss => "stop-loss",
            ProtectiveKind::TakeProfit => "take-profit",
        }
    }
}

/// Order routing for one market type
#[async_trait]
pub trait ExchangeRouter: Send + Sync {
    fn market_type(&self) -> MarketType;

    /// Lot, price and notional rules of `symbol`
    async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters, ExchangeError>;

    /// Free balance of `asset` in this market's wallet
    async fn available_balance(&self, asset: &str) -> Result<Decimal, ExchangeError>;

    /// No-op on spot
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError>;

    async fn market_order(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: Decimal,
        reduce_only: bool,
    ) -> Result<OrderFill, ExchangeError>;

    /// Places a stop-loss or take-profit that closes a position opened on `position_side`.
    /// Returns the exchange order id.
    async fn protective_order(
        &self,
        symbol: &str,
        kind: ProtectiveKind,
        position_side: TradeSide,
        quantity: Decimal,
        trigger_price: Decimal,
        filters: &SymbolFilters,
    ) -> Result<String, ExchangeError>;

    /// Size currently held on `side`: base balance on spot, position amount on futures
    async fn position_size(
        &self,
        symbol: &str,
        side: TradeSide,
        filters: &SymbolFilters,
    ) -> Result<Decimal, ExchangeError>;

    async fn cancel_open_orders(&self, symbol: &str) -> Result<(), ExchangeError>;
}

/// Builds routers from a user's credentials
pub trait ExchangeConnector: Send + Sync {
    fn connect(
        &self,
        credentials: &Credentials,
        market_type: MarketType,
    ) -> Result<Arc<dyn ExchangeRouter>, ExchangeError>;
}

/// Connector for the live Binance hosts
#[derive(Clone)]
pub struct BinanceConnector {
    http: reqwest::Client,
    spot_url: String,
    futures_url: String,
    coin_futures_url: String,
    recv_window_ms: u64,
}

impl BinanceConnector {
    pub fn from_config(config: &Config) -> Result<Self, ExchangeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.exchange_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            spot_url: config.binance_spot_url.clone(),
            futures_url: config.binance_futures_url.clone(),
            coin_futures_url: config.binance_coin_futures_url.clone(),
            recv_window_ms: config.exchange_recv_window_ms,
        })
    }
}

impl ExchangeConnector for BinanceConnector {
    fn connect(
        &self,
        credentials: &Credentials,
        market_type: MarketType,
    ) -> Result<Arc<dyn ExchangeRouter>, ExchangeError> {
        let base_url = match market_type {
            MarketType::Spot => &self.spot_url,
            MarketType::LinearFutures => &self.futures_url,
            MarketType::InverseFutures => &self.coin_futures_url,
        };
        let client = BinanceClient::signed_client(
            self.http.clone(),
            base_url,
            credentials,
            self.recv_window_ms,
        );

        Ok(match market_type {
            MarketType::Spot => Arc::new(SpotRouter::new(client)),
            MarketType::LinearFutures => Arc::new(FuturesRouter::linear(client)),
            MarketType::InverseFutures => Arc::new(FuturesRouter::inverse(client)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_symbol() {
        assert_eq!(split_symbol("BTCUSDT"), ("BTC".to_string(), "USDT".to_string()));
        assert_eq!(split_symbol("ETHBTC"), ("ETH".to_string(), "BTC".to_string()));
        assert_eq!(split_symbol("BTCUSD_PERP"), ("BTC".to_string(), "USD".to_string()));
        assert_eq!(split_symbol("SOLFDUSD"), ("SOL".to_string(), "FDUSD".to_string()));
    }

    #[test]
    fn test_fallback_filters_per_market() {
        let spot = SymbolFilters::fallback("BTCUSDT", MarketType::Spot);
        assert_eq!(spot.balance_asset(MarketType::Spot), "USDT");
        assert_eq!(spot.min_notional, Decimal::from(10));

        let inverse = SymbolFilters::fallback("ETHUSD_PERP", MarketType::InverseFutures);
        assert_eq!(inverse.balance_asset(MarketType::InverseFutures), "ETH");
        assert_eq!(inverse.contract_size, Some(Decimal::from(10)));
        assert_eq!(inverse.step_size, Decimal::ONE);
    }
}
