//! Futures routing: USDⓈ-margined (`/fapi`) and coin-margined (`/dapi`)
//!
//! Both APIs share request shapes. The differences are the path prefix, the balance and
//! position endpoint versions, and that inverse quantities are counted in contracts.

use super::binance::{BinanceClient, ExchangeInfo};
use super::{ExchangeRouter, OrderFill, ProtectiveKind, SymbolFilters};
use crate::error::ExchangeError;
use crate::services::sizing::round_to_tick;
use async_trait::async_trait;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{MarketType, TradeSide};
use tracing::{info, warn};

pub struct FuturesRouter {
    client: BinanceClient,
    market_type: MarketType,
    /// `/fapi` or `/dapi`
    prefix: &'static str,
    /// Version segment of the balance and positionRisk endpoints
    account_version: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FuturesBalance {
    asset: String,
    available_balance: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRisk {
    symbol: String,
    position_amt: Decimal,
    #[serde(default)]
    position_side: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    #[serde(default)]
    executed_qty: Decimal,
    #[serde(default)]
    avg_price: Decimal,
}

impl FuturesRouter {
    pub fn linear(client: BinanceClient) -> Self {
        Self {
            client,
            market_type: MarketType::LinearFutures,
            prefix: "/fapi",
            account_version: "v2",
        }
    }

    pub fn inverse(client: BinanceClient) -> Self {
        Self {
            client,
            market_type: MarketType::InverseFutures,
            prefix: "/dapi",
            account_version: "v1",
        }
    }

    fn path(&self, version: &str, endpoint: &str) -> String {
        format!("{}/{}/{}", self.prefix, version, endpoint)
    }
}

#[async_trait]
impl ExchangeRouter for FuturesRouter {
    fn market_type(&self) -> MarketType {
        self.market_type
    }

    async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters, ExchangeError> {
        let info: ExchangeInfo = self.client.public(&self.path("v1", "exchangeInfo"), &[]).await?;

        let mut filters = info
            .symbols
            .iter()
            .find(|s| s.symbol == symbol)
            .map(|s| s.to_filters(SymbolFilters::fallback(symbol, self.market_type)))
            .ok_or_else(|| {
                ExchangeError::CallFailed(format!("Unknown {} symbol {}", self.market_type, symbol))
            })?;

        // Contracts have no quote-notional floor; one contract is the minimum
        if self.market_type == MarketType::InverseFutures {
            filters.min_notional = Decimal::ZERO;
        }
        Ok(filters)
    }

    async fn available_balance(&self, asset: &str) -> Result<Decimal, ExchangeError> {
        let balances: Vec<FuturesBalance> = self
            .client
            .signed(Method::GET, &self.path(self.account_version, "balance"), &[])
            .await?;

        Ok(balances
            .into_iter()
            .find(|b| b.asset == asset)
            .map(|b| b.available_balance)
            .unwrap_or(Decimal::ZERO))
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("leverage", leverage.to_string()),
        ];
        let _: serde_json::Value = self
            .client
            .signed(Method::POST, &self.path("v1", "leverage"), &params)
            .await?;
        Ok(())
    }

    async fn market_order(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: Decimal,
        reduce_only: bool,
    ) -> Result<OrderFill, ExchangeError> {
        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity.normalize().to_string()),
            ("newOrderRespType", "RESULT".to_string()),
        ];
        if reduce_only {
            params.push(("reduceOnly", "true".to_string()));
        }

        let order: OrderResponse = self
            .client
            .signed(Method::POST, &self.path("v1", "order"), &params)
            .await?;
        info!(
            "✅ {} {} {} {} filled at {} (order {})",
            self.market_type, side, order.executed_qty, symbol, order.avg_price, order.order_id
        );

        Ok(OrderFill {
            order_id: order.order_id.to_string(),
            quantity: order.executed_qty,
            avg_price: order.avg_price,
        })
    }

    async fn protective_order(
        &self,
        symbol: &str,
        kind: ProtectiveKind,
        position_side: TradeSide,
        quantity: Decimal,
        trigger_price: Decimal,
        filters: &SymbolFilters,
    ) -> Result<String, ExchangeError> {
        let order_type = match kind {
            ProtectiveKind::StopLoss => "STOP_MARKET",
            ProtectiveKind::TakeProfit => "TAKE_PROFIT_MARKET",
        };
        let params = [
            ("symbol", symbol.to_string()),
            ("side", position_side.opposite().as_str().to_string()),
            ("type", order_type.to_string()),
            ("quantity", quantity.normalize().to_string()),
            (
                "stopPrice",
                round_to_tick(trigger_price, filters.tick_size).normalize().to_string(),
            ),
            ("reduceOnly", "true".to_string()),
            ("workingType", "MARK_PRICE".to_string()),
        ];

        let order: OrderResponse = self
            .client
            .signed(Method::POST, &self.path("v1", "order"), &params)
            .await?;
        Ok(order.order_id.to_string())
    }

    async fn position_size(
        &self,
        symbol: &str,
        side: TradeSide,
        _filters: &SymbolFilters,
    ) -> Result<Decimal, ExchangeError> {
        let params = match self.market_type {
            MarketType::InverseFutures => Vec::new(),
            _ => vec![("symbol", symbol.to_string())],
        };
        let positions: Vec<PositionRisk> = self
            .client
            .signed(Method::GET, &self.path(self.account_version, "positionRisk"), &params)
            .await?;

        let mut size = Decimal::ZERO;
        for position in positions.iter().filter(|p| p.symbol == symbol) {
            // One-way mode reports a signed amount on BOTH; hedge mode splits LONG/SHORT
            let amount = match (position.position_side.as_deref(), side) {
                (Some("LONG"), TradeSide::Buy) | (Some("SHORT"), TradeSide::Sell) => position.position_amt.abs(),
                (Some("LONG"), _) | (Some("SHORT"), _) => Decimal::ZERO,
                (_, TradeSide::Buy) => position.position_amt.max(Decimal::ZERO),
                (_, TradeSide::Sell) => (-position.position_amt).max(Decimal::ZERO),
            };
            size += amount;
        }

        if size.is_zero() && positions.iter().all(|p| p.symbol != symbol) {
            warn!("⚠️ No {} position entry reported for {}", self.market_type, symbol);
        }
        Ok(size)
    }

    async fn cancel_open_orders(&self, symbol: &str) -> Result<(), ExchangeError> {
        let _: serde_json::Value = self
            .client
            .signed(
                Method::DELETE,
                &self.path("v1", "allOpenOrders"),
                &[("symbol", symbol.to_string())],
            )
            .await?;
        Ok(())
    }
}
