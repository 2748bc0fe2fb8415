//! In-process store for tests and dry runs

use super::{
    BotSource, CandleCheck, CredentialStore, OverrideRule, PendingInsert, QuotaStore, TradeStore,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    BotDefinition, Credentials, NewTrade, QuotaBalance, QuotaUnit, SignalRecord, Trade, TradeFill,
    TradeStatus,
};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    quotas: HashMap<i64, QuotaBalance>,
    credentials: HashMap<i64, Credentials>,
    trades: Vec<Trade>,
    signals: Vec<SignalRecord>,
    bots: Vec<BotDefinition>,
    overrides: Vec<OverrideRule>,
    next_trade_id: i64,
}

impl MemoryState {
    fn build_trade(&mut self, trade: NewTrade, status: TradeStatus, error: Option<&str>) -> Trade {
        self.next_trade_id += 1;
        Trade {
            id: self.next_trade_id,
            user_id: trade.user_id,
            bot_id: trade.bot_id,
            symbol: trade.symbol,
            timeframe: trade.timeframe,
            market_type: trade.market_type,
            side: trade.side,
            status,
            quantity: None,
            entry_price: None,
            exit_price: None,
            stop_loss: trade.stop_loss,
            take_profit: trade.take_profit,
            leverage: trade.leverage,
            candle_open_time: trade.candle_open_time,
            exchange_order_id: None,
            quota_unit: trade.quota_unit,
            quota_consumed: false,
            signal_reason: Some(trade.signal_reason),
            error_message: error.map(str::to_string),
            created_at: Utc::now(),
            opened_at: None,
            closed_at: None,
        }
    }

    fn instance_trades<'a>(
        &'a self,
        user_id: i64,
        bot_id: i64,
        symbol: &'a str,
    ) -> impl Iterator<Item = &'a Trade> + 'a {
        self.trades
            .iter()
            .filter(move |t| t.user_id == user_id && t.bot_id == bot_id && t.symbol == symbol)
    }

    fn candle_check(&self, user_id: i64, bot_id: i64, symbol: &str, candle: i64, max_failed: u32) -> CandleCheck {
        CandleCheck::evaluate(
            self.instance_trades(user_id, bot_id, symbol)
                .filter(|t| t.candle_open_time == candle)
                .map(|t| t.status),
            max_failed,
        )
    }

    /// Applies `update` when the trade is in `from`; false otherwise
    fn transition(&mut self, trade_id: i64, from: TradeStatus, update: impl FnOnce(&mut Trade)) -> bool {
        match self.trades.iter_mut().find(|t| t.id == trade_id && t.status == from) {
            Some(trade) => {
                update(trade);
                true
            }
            None => false,
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_quota(&self, user_id: i64, quota: QuotaBalance) {
        self.state.lock().await.quotas.insert(user_id, quota);
    }

    pub async fn set_credentials(&self, user_id: i64, credentials: Credentials) {
        self.state.lock().await.credentials.insert(user_id, credentials);
    }

    pub async fn add_bot(&self, bot: BotDefinition) {
        self.state.lock().await.bots.push(bot);
    }

    pub async fn add_override(&self, rule: OverrideRule) {
        self.state.lock().await.overrides.push(rule);
    }

    /// Inserts an existing trade verbatim, e.g. an open position
    pub async fn add_trade(&self, trade: Trade) {
        let mut state = self.state.lock().await;
        state.next_trade_id = state.next_trade_id.max(trade.id);
        state.trades.push(trade);
    }

    pub async fn trades(&self) -> Vec<Trade> {
        self.state.lock().await.trades.clone()
    }

    pub async fn signals(&self) -> Vec<SignalRecord> {
        self.state.lock().await.signals.clone()
    }
}

#[async_trait]
impl QuotaStore for MemoryStore {
    async fn quota(&self, user_id: i64) -> Result<QuotaBalance> {
        Ok(self.state.lock().await.quotas.get(&user_id).copied().unwrap_or_default())
    }

    async fn consume(&self, user_id: i64) -> Result<Option<QuotaUnit>> {
        let mut state = self.state.lock().await;
        let Some(quota) = state.quotas.get_mut(&user_id) else {
            return Ok(None);
        };

        if quota.free_trades > 0 {
            quota.free_trades -= 1;
            Ok(Some(QuotaUnit::FreeTrade))
        } else if quota.coin_balance > 0 {
            quota.coin_balance -= 1;
            Ok(Some(QuotaUnit::Coin))
        } else {
            Ok(None)
        }
    }

    async fn refund(&self, user_id: i64, unit: QuotaUnit) -> Result<()> {
        let mut state = self.state.lock().await;
        let quota = state.quotas.entry(user_id).or_default();
        match unit {
            QuotaUnit::FreeTrade => quota.free_trades += 1,
            QuotaUnit::Coin => quota.coin_balance += 1,
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn credentials(&self, user_id: i64) -> Result<Option<Credentials>> {
        Ok(self.state.lock().await.credentials.get(&user_id).cloned())
    }
}

#[async_trait]
impl TradeStore for MemoryStore {
    async fn trade(&self, trade_id: i64) -> Result<Option<Trade>> {
        Ok(self.state.lock().await.trades.iter().find(|t| t.id == trade_id).cloned())
    }

    async fn active_trade(&self, user_id: i64, bot_id: i64, symbol: &str) -> Result<Option<Trade>> {
        let state = self.state.lock().await;
        let trade = state
            .instance_trades(user_id, bot_id, symbol)
            .filter(|t| t.status.is_active())
            .max_by_key(|t| t.id)
            .cloned();
        Ok(trade)
    }

    async fn candle_check(
        &self,
        user_id: i64,
        bot_id: i64,
        symbol: &str,
        candle_open_time: i64,
        max_failed: u32,
    ) -> Result<CandleCheck> {
        let state = self.state.lock().await;
        Ok(state.candle_check(user_id, bot_id, symbol, candle_open_time, max_failed))
    }

    async fn insert_pending(&self, trade: NewTrade, max_failed: u32) -> Result<PendingInsert> {
        let mut state = self.state.lock().await;

        let active = state
            .instance_trades(trade.user_id, trade.bot_id, &trade.symbol)
            .find(|t| t.status.is_active())
            .map(|t| t.status);
        let check = match active {
            Some(status) => CandleCheck::Duplicate(status),
            None => state.candle_check(
                trade.user_id,
                trade.bot_id,
                &trade.symbol,
                trade.candle_open_time,
                max_failed,
            ),
        };
        if check != CandleCheck::Clear {
            return Ok(PendingInsert::Blocked(check));
        }

        let trade = state.build_trade(trade, TradeStatus::Pending, None);
        state.trades.push(trade.clone());
        Ok(PendingInsert::Inserted(trade))
    }

    async fn insert_failed(&self, trade: NewTrade, error: &str) -> Result<Trade> {
        let mut state = self.state.lock().await;
        let trade = state.build_trade(trade, TradeStatus::Failed, Some(error));
        state.trades.push(trade.clone());
        Ok(trade)
    }

    async fn mark_open(&self, trade_id: i64, fill: &TradeFill) -> Result<bool> {
        let mut state = self.state.lock().await;
        Ok(state.transition(trade_id, TradeStatus::Pending, |trade| {
            trade.status = TradeStatus::Open;
            trade.quantity = Some(fill.quantity);
            trade.entry_price = Some(fill.entry_price);
            trade.exchange_order_id = fill.exchange_order_id.clone();
            trade.quota_consumed = true;
            trade.opened_at = Some(Utc::now());
        }))
    }

    async fn mark_failed(&self, trade_id: i64, error: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        Ok(state.transition(trade_id, TradeStatus::Pending, |trade| {
            trade.status = TradeStatus::Failed;
            trade.error_message = Some(error.to_string());
            trade.quota_consumed = false;
        }))
    }

    async fn mark_closed(
        &self,
        trade_id: i64,
        exit_price: Option<Decimal>,
        note: Option<&str>,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        Ok(state.transition(trade_id, TradeStatus::Open, |trade| {
            trade.status = TradeStatus::Closed;
            trade.exit_price = exit_price;
            trade.closed_at = Some(Utc::now());
            if let Some(note) = note {
                trade.error_message = Some(note.to_string());
            }
        }))
    }

    async fn active_trades_for_user(&self, user_id: i64) -> Result<Vec<Trade>> {
        let state = self.state.lock().await;
        Ok(state
            .trades
            .iter()
            .filter(|t| t.user_id == user_id && t.status.is_active())
            .cloned()
            .collect())
    }

    async fn record_signal(&self, record: SignalRecord) -> Result<()> {
        self.state.lock().await.signals.push(record);
        Ok(())
    }
}

#[async_trait]
impl BotSource for MemoryStore {
    async fn active_bots(&self) -> Result<Vec<BotDefinition>> {
        Ok(self.state.lock().await.bots.clone())
    }

    async fn settings_overrides(&self) -> Result<Vec<OverrideRule>> {
        Ok(self.state.lock().await.overrides.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{MarketType, TradeSide};
    use signal_engine::data::Timeframe;

    fn new_trade(candle: i64) -> NewTrade {
        NewTrade {
            user_id: 1,
            bot_id: 2,
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::H1,
            market_type: MarketType::Spot,
            side: TradeSide::Buy,
            leverage: 1,
            candle_open_time: candle,
            stop_loss: None,
            take_profit: None,
            signal_reason: "test".to_string(),
            quota_unit: Some(QuotaUnit::FreeTrade),
        }
    }

    #[tokio::test]
    async fn test_quota_prefers_free_trades() {
        let store = MemoryStore::new();
        store
            .set_quota(1, QuotaBalance { free_trades: 1, coin_balance: 1, auto_trading_enabled: true })
            .await;

        assert_eq!(store.consume(1).await.unwrap(), Some(QuotaUnit::FreeTrade));
        assert_eq!(store.consume(1).await.unwrap(), Some(QuotaUnit::Coin));
        assert_eq!(store.consume(1).await.unwrap(), None);

        store.refund(1, QuotaUnit::Coin).await.unwrap();
        let quota = store.quota(1).await.unwrap();
        assert_eq!((quota.free_trades, quota.coin_balance), (0, 1));
    }

    #[tokio::test]
    async fn test_pending_insert_blocks_second_entry() {
        let store = MemoryStore::new();
        let first = store.insert_pending(new_trade(1_000), 2).await.unwrap();
        let PendingInsert::Inserted(trade) = first else {
            panic!("first insert should succeed");
        };

        // Same candle, and a later candle while the first is still active
        for candle in [1_000, 2_000] {
            assert_eq!(
                store.insert_pending(new_trade(candle), 2).await.unwrap(),
                PendingInsert::Blocked(CandleCheck::Duplicate(TradeStatus::Pending))
            );
        }

        assert!(store.mark_failed(trade.id, "boom").await.unwrap());
        assert!(!store.mark_open(trade.id, &TradeFill {
            quantity: Decimal::ONE,
            entry_price: Decimal::ONE,
            exchange_order_id: None,
        }).await.unwrap());
        assert!(matches!(
            store.insert_pending(new_trade(1_000), 2).await.unwrap(),
            PendingInsert::Inserted(_)
        ));
    }
}
