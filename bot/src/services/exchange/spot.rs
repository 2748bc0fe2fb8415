//! Spot routing (`/api/v3`)

use super::binance::{BinanceClient, ExchangeInfo};
use super::{ExchangeRouter, OrderFill, ProtectiveKind, SymbolFilters};
use crate::error::ExchangeError;
use crate::services::sizing::round_to_tick;
use async_trait::async_trait;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{MarketType, TradeSide};
use tracing::info;

/// Binance answers -2011 when there is nothing to cancel
const NO_OPEN_ORDERS: i64 = -2011;

pub struct SpotRouter {
    client: BinanceClient,
}

#[derive(Debug, Deserialize)]
struct Account {
    balances: Vec<Balance>,
}

#[derive(Debug, Deserialize)]
struct Balance {
    asset: String,
    free: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    #[serde(default)]
    executed_qty: Decimal,
    #[serde(default)]
    cummulative_quote_qty: Decimal,
}

impl SpotRouter {
    pub fn new(client: BinanceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExchangeRouter for SpotRouter {
    fn market_type(&self) -> MarketType {
        MarketType::Spot
    }

    async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters, ExchangeError> {
        let info: ExchangeInfo = self
            .client
            .public("/api/v3/exchangeInfo", &[("symbol", symbol.to_string())])
            .await?;

        info.symbols
            .iter()
            .find(|s| s.symbol == symbol)
            .map(|s| s.to_filters(SymbolFilters::fallback(symbol, MarketType::Spot)))
            .ok_or_else(|| ExchangeError::CallFailed(format!("Unknown spot symbol {}", symbol)))
    }

    async fn available_balance(&self, asset: &str) -> Result<Decimal, ExchangeError> {
        let account: Account = self.client.signed(Method::GET, "/api/v3/account", &[]).await?;
        Ok(account
            .balances
            .into_iter()
            .find(|b| b.asset == asset)
            .map(|b| b.free)
            .unwrap_or(Decimal::ZERO))
    }

    async fn set_leverage(&self, _symbol: &str, _leverage: u32) -> Result<(), ExchangeError> {
        Ok(())
    }

    async fn market_order(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: Decimal,
        _reduce_only: bool,
    ) -> Result<OrderFill, ExchangeError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity.normalize().to_string()),
            ("newOrderRespType", "FULL".to_string()),
        ];
        let order: OrderResponse = self.client.signed(Method::POST, "/api/v3/order", &params).await?;

        let avg_price = if order.executed_qty.is_zero() {
            Decimal::ZERO
        } else {
            order.cummulative_quote_qty / order.executed_qty
        };
        info!(
            "✅ Spot {} {} {} filled at {} (order {})",
            side, order.executed_qty, symbol, avg_price, order.order_id
        );

        Ok(OrderFill {
            order_id: order.order_id.to_string(),
            quantity: order.executed_qty,
            avg_price,
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
            ProtectiveKind::StopLoss => "STOP_LOSS_LIMIT",
            ProtectiveKind::TakeProfit => "TAKE_PROFIT_LIMIT",
        };
        let price = round_to_tick(trigger_price, filters.tick_size).normalize();
        let params = [
            ("symbol", symbol.to_string()),
            ("side", position_side.opposite().as_str().to_string()),
            ("type", order_type.to_string()),
            ("timeInForce", "GTC".to_string()),
            ("quantity", quantity.normalize().to_string()),
            ("price", price.to_string()),
            ("stopPrice", price.to_string()),
        ];
        let order: OrderResponse = self.client.signed(Method::POST, "/api/v3/order", &params).await?;
        Ok(order.order_id.to_string())
    }

    async fn position_size(
        &self,
        _symbol: &str,
        _side: TradeSide,
        filters: &SymbolFilters,
    ) -> Result<Decimal, ExchangeError> {
        self.available_balance(&filters.base_asset).await
    }

    async fn cancel_open_orders(&self, symbol: &str) -> Result<(), ExchangeError> {
        let result: Result<serde_json::Value, ExchangeError> = self
            .client
            .signed(Method::DELETE, "/api/v3/openOrders", &[("symbol", symbol.to_string())])
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(ExchangeError::Rejected { code, .. }) if code == NO_OPEN_ORDERS => Ok(()),
            Err(e) => Err(e),
        }
    }
}
