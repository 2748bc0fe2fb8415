//! Scripted exchange and market doubles shared by the bot integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bot::services::exchange::{
    ExchangeConnector, ExchangeRouter, OrderFill, ProtectiveKind, SymbolFilters,
};
use bot::services::execution::TradeExecutor;
use bot::services::locks::InstanceLocks;
use bot::services::market_data::MarketData;
use bot::services::store::{
    BotSource, CandleCheck, CredentialStore, MemoryStore, OverrideRule, PendingInsert, QuotaStore,
    TradeStore,
};
use bot::ExchangeError;
use rust_decimal::Decimal;
use shared::{
    BotDefinition, Credentials, ExecutionConfig, MarketType, NewTrade, QuotaBalance, QuotaUnit,
    SignalRecord, Trade, TradeFill, TradeSide,
};
use signal_engine::data::{Candle, Timeframe};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub side: TradeSide,
    pub quantity: Decimal,
    pub reduce_only: bool,
}

#[derive(Debug, Default)]
pub struct ExchangeState {
    pub balance: Decimal,
    pub position: Decimal,
    pub fill_price: Decimal,
    pub reject_market_orders: bool,
    pub reject_protective_orders: bool,
    pub fail_filters: bool,
    pub orders: Vec<PlacedOrder>,
    pub protective: Vec<(ProtectiveKind, Decimal)>,
    pub cancels: usize,
    pub leverage: Option<u32>,
}

#[derive(Clone, Default)]
pub struct MockExchange {
    pub state: Arc<Mutex<ExchangeState>>,
}

impl MockExchange {
    pub fn with_balance(balance: i64, fill_price: i64) -> Self {
        let exchange = Self::default();
        {
            let mut state = exchange.state.lock().unwrap();
            state.balance = Decimal::from(balance);
            state.fill_price = Decimal::from(fill_price);
        }
        exchange
    }

    pub fn update(&self, f: impl FnOnce(&mut ExchangeState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn orders(&self) -> Vec<PlacedOrder> {
        self.state.lock().unwrap().orders.clone()
    }

    pub fn protective(&self) -> Vec<(ProtectiveKind, Decimal)> {
        self.state.lock().unwrap().protective.clone()
    }
}

struct MockRouter {
    market_type: MarketType,
    state: Arc<Mutex<ExchangeState>>,
}

#[async_trait]
impl ExchangeRouter for MockRouter {
    fn market_type(&self) -> MarketType {
        self.market_type
    }

    async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters, ExchangeError> {
        if self.state.lock().unwrap().fail_filters {
            return Err(ExchangeError::CallFailed("exchangeInfo timed out".to_string()));
        }
        Ok(SymbolFilters::fallback(symbol, self.market_type))
    }

    async fn available_balance(&self, _asset: &str) -> Result<Decimal, ExchangeError> {
        Ok(self.state.lock().unwrap().balance)
    }

    async fn set_leverage(&self, _symbol: &str, leverage: u32) -> Result<(), ExchangeError> {
        self.state.lock().unwrap().leverage = Some(leverage);
        Ok(())
    }

    async fn market_order(
        &self,
        _symbol: &str,
        side: TradeSide,
        quantity: Decimal,
        reduce_only: bool,
    ) -> Result<OrderFill, ExchangeError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_market_orders {
            return Err(ExchangeError::Rejected {
                code: -2010,
                message: "Account has insufficient balance for requested action.".to_string(),
            });
        }

        state.orders.push(PlacedOrder {
            side,
            quantity,
            reduce_only,
        });
        if reduce_only {
            state.position -= quantity;
        } else {
            state.position += quantity;
        }
        Ok(OrderFill {
            order_id: state.orders.len().to_string(),
            quantity,
            avg_price: state.fill_price,
        })
    }

    async fn protective_order(
        &self,
        _symbol: &str,
        kind: ProtectiveKind,
        _position_side: TradeSide,
        _quantity: Decimal,
        trigger_price: Decimal,
        _filters: &SymbolFilters,
    ) -> Result<String, ExchangeError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_protective_orders {
            return Err(ExchangeError::Rejected {
                code: -2021,
                message: "Order would immediately trigger.".to_string(),
            });
        }
        state.protective.push((kind, trigger_price));
        Ok(format!("p{}", state.protective.len()))
    }

    async fn position_size(
        &self,
        _symbol: &str,
        _side: TradeSide,
        _filters: &SymbolFilters,
    ) -> Result<Decimal, ExchangeError> {
        Ok(self.state.lock().unwrap().position)
    }

    async fn cancel_open_orders(&self, _symbol: &str) -> Result<(), ExchangeError> {
        self.state.lock().unwrap().cancels += 1;
        Ok(())
    }
}

impl ExchangeConnector for MockExchange {
    fn connect(
        &self,
        _credentials: &Credentials,
        market_type: MarketType,
    ) -> Result<Arc<dyn ExchangeRouter>, ExchangeError> {
        Ok(Arc::new(MockRouter {
            market_type,
            state: self.state.clone(),
        }))
    }
}

/// Serves the same candles and price for every request
pub struct StaticMarket {
    pub candles: Vec<Candle>,
    pub price: f64,
    pub fail: bool,
}

#[async_trait]
impl MarketData for StaticMarket {
    async fn fetch_candles(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        _market_type: MarketType,
        _limit: usize,
    ) -> anyhow::Result<Vec<Candle>> {
        if self.fail {
            anyhow::bail!("klines for {} unavailable", symbol);
        }
        Ok(self.candles.clone())
    }

    async fn fetch_current_price(&self, _symbol: &str, _market_type: MarketType) -> anyhow::Result<f64> {
        Ok(self.price)
    }
}

const HOUR_MS: i64 = 3_600_000;

/// Steady decline, then flat at 200: EMA(9) crosses above EMA(21) two candles before the end
pub fn crossover_candles() -> Vec<Candle> {
    (0..200)
        .map(|i| {
            let price = if i <= 195 { 240.0 - i as f64 * 0.25 } else { 200.0 };
            let open_time = 1_704_067_200_000 + i as i64 * HOUR_MS;
            Candle::new(open_time, open_time + HOUR_MS - 1, price, price + 0.5, price - 0.5, price, 25.0)
        })
        .collect()
}

pub fn bot(id: i64, user_id: i64, market_type: MarketType) -> BotDefinition {
    BotDefinition {
        id,
        user_id,
        script_id: id,
        name: format!("bot-{}", id),
        symbol: "BTCUSDT".to_string(),
        timeframe: Timeframe::H1,
        market_type,
        leverage: if market_type == MarketType::Spot { 1 } else { 5 },
        script_content: "ta.crossover(ta.ema(close, 9), ta.ema(close, 21))".to_string(),
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        api_key: "test-key".to_string(),
        api_secret: "test-secret".to_string(),
    }
}

pub async fn funded_store(user_id: i64, free_trades: i32, coin_balance: i32) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .set_quota(
            user_id,
            QuotaBalance {
                free_trades,
                coin_balance,
                auto_trading_enabled: true,
            },
        )
        .await;
    store.set_credentials(user_id, credentials()).await;
    store
}

pub fn executor(store: Arc<MemoryStore>, exchange: &MockExchange) -> TradeExecutor {
    TradeExecutor::new(
        store,
        Arc::new(exchange.clone()),
        InstanceLocks::new(),
        ExecutionConfig::default(),
    )
}

/// Delegates to a [`MemoryStore`] but fails every credential lookup, like a dropped DB connection
pub struct CredentialOutage {
    pub inner: Arc<MemoryStore>,
}

#[async_trait]
impl QuotaStore for CredentialOutage {
    async fn quota(&self, user_id: i64) -> anyhow::Result<QuotaBalance> {
        self.inner.quota(user_id).await
    }

    async fn consume(&self, user_id: i64) -> anyhow::Result<Option<QuotaUnit>> {
        self.inner.consume(user_id).await
    }

    async fn refund(&self, user_id: i64, unit: QuotaUnit) -> anyhow::Result<()> {
        self.inner.refund(user_id, unit).await
    }
}

#[async_trait]
impl CredentialStore for CredentialOutage {
    async fn credentials(&self, _user_id: i64) -> anyhow::Result<Option<Credentials>> {
        anyhow::bail!("connection reset while reading exchange_wallets")
    }
}

#[async_trait]
impl TradeStore for CredentialOutage {
    async fn trade(&self, trade_id: i64) -> anyhow::Result<Option<Trade>> {
        self.inner.trade(trade_id).await
    }

    async fn active_trade(&self, user_id: i64, bot_id: i64, symbol: &str) -> anyhow::Result<Option<Trade>> {
        self.inner.active_trade(user_id, bot_id, symbol).await
    }

    async fn candle_check(
        &self,
        user_id: i64,
        bot_id: i64,
        symbol: &str,
        candle_open_time: i64,
        max_failed: u32,
    ) -> anyhow::Result<CandleCheck> {
        self.inner
            .candle_check(user_id, bot_id, symbol, candle_open_time, max_failed)
            .await
    }

    async fn insert_pending(&self, trade: NewTrade, max_failed: u32) -> anyhow::Result<PendingInsert> {
        self.inner.insert_pending(trade, max_failed).await
    }

    async fn insert_failed(&self, trade: NewTrade, error: &str) -> anyhow::Result<Trade> {
        self.inner.insert_failed(trade, error).await
    }

    async fn mark_open(&self, trade_id: i64, fill: &TradeFill) -> anyhow::Result<bool> {
        self.inner.mark_open(trade_id, fill).await
    }

    async fn mark_failed(&self, trade_id: i64, error: &str) -> anyhow::Result<bool> {
        self.inner.mark_failed(trade_id, error).await
    }

    async fn mark_closed(
        &self,
        trade_id: i64,
        exit_price: Option<Decimal>,
        note: Option<&str>,
    ) -> anyhow::Result<bool> {
        self.inner.mark_closed(trade_id, exit_price, note).await
    }

    async fn active_trades_for_user(&self, user_id: i64) -> anyhow::Result<Vec<Trade>> {
        self.inner.active_trades_for_user(user_id).await
    }

    async fn record_signal(&self, record: SignalRecord) -> anyhow::Result<()> {
        self.inner.record_signal(record).await
    }
}

#[async_trait]
impl BotSource for CredentialOutage {
    async fn active_bots(&self) -> anyhow::Result<Vec<BotDefinition>> {
        self.inner.active_bots().await
    }

    async fn settings_overrides(&self) -> anyhow::Result<Vec<OverrideRule>> {
        self.inner.settings_overrides().await
    }
}
