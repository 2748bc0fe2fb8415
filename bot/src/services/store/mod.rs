//! Persistence seams of the execution layer
//!
//! [`SeaStore`] backs production with MySQL through sea-orm. [`MemoryStore`] implements the
//! same traits in process for tests and dry runs.

pub mod memory;
pub mod sea;

pub use memory::MemoryStore;
pub use sea::SeaStore;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{
    BotDefinition, Credentials, NewTrade, QuotaBalance, QuotaUnit, SettingsOverride, SignalRecord,
    Trade, TradeFill, TradeStatus,
};

#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Users without a quota row have no quota and auto-trading off
    async fn quota(&self, user_id: i64) -> Result<QuotaBalance>;

    /// Atomically deducts one unit, free trades before coins. `None` when both are empty.
    async fn consume(&self, user_id: i64) -> Result<Option<QuotaUnit>>;

    /// Gives back exactly the unit that was consumed
    async fn refund(&self, user_id: i64, unit: QuotaUnit) -> Result<()>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Active exchange wallet first, then the legacy key table
    async fn credentials(&self, user_id: i64) -> Result<Option<Credentials>>;
}

/// Result of the duplicate-candle guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleCheck {
    Clear,
    /// A non-failed trade already exists for the candle (or is still active)
    Duplicate(TradeStatus),
    TooManyFailures(u32),
}

impl CandleCheck {
    pub fn evaluate(statuses: impl IntoIterator<Item = TradeStatus>, max_failed: u32) -> Self {
        let mut failed = 0;
        for status in statuses {
            match status {
                TradeStatus::Failed => failed += 1,
                other => return CandleCheck::Duplicate(other),
            }
        }
        if failed >= max_failed {
            CandleCheck::TooManyFailures(failed)
        } else {
            CandleCheck::Clear
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PendingInsert {
    Inserted(Trade),
    Blocked(CandleCheck),
}

#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn trade(&self, trade_id: i64) -> Result<Option<Trade>>;

    /// Newest `PENDING` or `OPEN` trade of the instance
    async fn active_trade(&self, user_id: i64, bot_id: i64, symbol: &str) -> Result<Option<Trade>>;

    async fn candle_check(
        &self,
        user_id: i64,
        bot_id: i64,
        symbol: &str,
        candle_open_time: i64,
        max_failed: u32,
    ) -> Result<CandleCheck>;

    /// Re-runs the candle and active-trade checks and inserts a `PENDING` row as one atomic step
    async fn insert_pending(&self, trade: NewTrade, max_failed: u32) -> Result<PendingInsert>;

    /// Records an attempt that failed before a pending row was warranted
    async fn insert_failed(&self, trade: NewTrade, error: &str) -> Result<Trade>;

    /// `PENDING -> OPEN`; false when the trade was no longer pending
    async fn mark_open(&self, trade_id: i64, fill: &TradeFill) -> Result<bool>;

    /// `PENDING -> FAILED`; clears the quota-consumed flag
    async fn mark_failed(&self, trade_id: i64, error: &str) -> Result<bool>;

    /// `OPEN -> CLOSED`; false when the trade was not open
    async fn mark_closed(
        &self,
        trade_id: i64,
        exit_price: Option<Decimal>,
        note: Option<&str>,
    ) -> Result<bool>;

    async fn active_trades_for_user(&self, user_id: i64) -> Result<Vec<Trade>>;

    async fn record_signal(&self, record: SignalRecord) -> Result<()>;
}

/// A settings override row; `bot_id == None` applies to every bot of the user
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideRule {
    pub user_id: i64,
    pub bot_id: Option<i64>,
    pub settings: SettingsOverride,
}

/// Layers user-wide then bot-specific overrides over one bot
pub fn apply_overrides(bot: BotDefinition, rules: &[OverrideRule]) -> BotDefinition {
    let user_wide = rules
        .iter()
        .filter(|r| r.user_id == bot.user_id && r.bot_id.is_none())
        .fold(SettingsOverride::default(), |acc, r| acc.merged_with(r.settings.clone()));
    let specific = rules
        .iter()
        .filter(|r| r.user_id == bot.user_id && r.bot_id == Some(bot.id))
        .fold(SettingsOverride::default(), |acc, r| acc.merged_with(r.settings.clone()));

    bot.with_override(&user_wide.merged_with(specific))
}

#[async_trait]
pub trait BotSource: Send + Sync {
    async fn active_bots(&self) -> Result<Vec<BotDefinition>>;

    async fn settings_overrides(&self) -> Result<Vec<OverrideRule>>;
}

/// Everything the orchestrator and scheduler persist through
pub trait Store: QuotaStore + CredentialStore + TradeStore + BotSource {}

impl<T> Store for T where T: QuotaStore + CredentialStore + TradeStore + BotSource {}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::MarketType;
    use signal_engine::data::Timeframe;

    #[test]
    fn test_candle_check() {
        assert_eq!(CandleCheck::evaluate(vec![], 2), CandleCheck::Clear);
        assert_eq!(CandleCheck::evaluate(vec![TradeStatus::Failed], 2), CandleCheck::Clear);
        assert_eq!(
            CandleCheck::evaluate(vec![TradeStatus::Failed, TradeStatus::Failed], 2),
            CandleCheck::TooManyFailures(2)
        );
        assert_eq!(
            CandleCheck::evaluate(vec![TradeStatus::Failed, TradeStatus::Closed], 2),
            CandleCheck::Duplicate(TradeStatus::Closed)
        );
    }

    #[test]
    fn test_apply_overrides_prefers_bot_specific() {
        let bot = BotDefinition {
            id: 4,
            user_id: 1,
            script_id: 1,
            name: "rsi".to_string(),
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::H1,
            market_type: MarketType::Spot,
            leverage: 1,
            script_content: String::new(),
        };
        let rules = vec![
            OverrideRule {
                user_id: 1,
                bot_id: None,
                settings: SettingsOverride {
                    market_type: Some(MarketType::LinearFutures),
                    leverage: Some(3),
                    ..Default::default()
                },
            },
            OverrideRule {
                user_id: 1,
                bot_id: Some(4),
                settings: SettingsOverride {
                    leverage: Some(8),
                    ..Default::default()
                },
            },
            OverrideRule {
                user_id: 2,
                bot_id: None,
                settings: SettingsOverride {
                    symbol: Some("ETHUSDT".to_string()),
                    ..Default::default()
                },
            },
        ];

        let bot = apply_overrides(bot, &rules);
        assert_eq!(bot.market_type, MarketType::LinearFutures);
        assert_eq!(bot.leverage, 8);
        assert_eq!(bot.symbol, "BTCUSDT");
    }
}
