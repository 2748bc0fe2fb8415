use crate::entity::{bots, trades};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use signal_engine::data::Timeframe;
use signal_engine::strategy::SignalAction;
use std::fmt;
use std::str::FromStr;

/// Which exchange product an instance trades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MarketType {
    #[default]
    #[serde(rename = "spot")]
    Spot,
    /// USDⓈ-margined perpetuals
    #[serde(rename = "futures", alias = "linear")]
    LinearFutures,
    /// Coin-margined contracts
    #[serde(rename = "inverse", alias = "coin_futures")]
    InverseFutures,
}

impl MarketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Spot => "spot",
            MarketType::LinearFutures => "futures",
            MarketType::InverseFutures => "inverse",
        }
    }

    pub fn is_futures(&self) -> bool {
        !matches!(self, MarketType::Spot)
    }
}

impl FromStr for MarketType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spot" => Ok(MarketType::Spot),
            "futures" | "linear" | "usdt_futures" | "usdm" | "perpetual" => Ok(MarketType::LinearFutures),
            "inverse" | "coin_futures" | "coinm" | "delivery" => Ok(MarketType::InverseFutures),
            other => Err(anyhow::anyhow!("Unknown market type: {}", other)),
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            TradeSide::Buy => TradeSide::Sell,
            TradeSide::Sell => TradeSide::Buy,
        }
    }

    /// Side of the order that opens a position for an entry signal
    pub fn for_entry(action: SignalAction) -> Option<Self> {
        match action {
            SignalAction::Buy => Some(TradeSide::Buy),
            SignalAction::Sell => Some(TradeSide::Sell),
            SignalAction::Close | SignalAction::None => None,
        }
    }
}

impl FromStr for TradeSide {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" | "LONG" => Ok(TradeSide::Buy),
            "SELL" | "SHORT" => Ok(TradeSide::Sell),
            other => Err(anyhow::anyhow!("Unknown trade side: {}", other)),
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a trade row: `PENDING -> OPEN -> CLOSED`, or `PENDING -> FAILED`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    /// Quota held, order not confirmed yet
    Pending,
    /// Order filled, position live
    Open,
    Closed,
    Failed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "PENDING",
            TradeStatus::Open => "OPEN",
            TradeStatus::Closed => "CLOSED",
            TradeStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeStatus::Closed | TradeStatus::Failed)
    }

    /// Pending and open trades both block a new entry
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(&self, next: TradeStatus) -> bool {
        matches!(
            (self, next),
            (TradeStatus::Pending, TradeStatus::Open)
                | (TradeStatus::Pending, TradeStatus::Failed)
                | (TradeStatus::Open, TradeStatus::Closed)
        )
    }
}

impl FromStr for TradeStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Ok(TradeStatus::Pending),
            "OPEN" => Ok(TradeStatus::Open),
            "CLOSED" => Ok(TradeStatus::Closed),
            "FAILED" => Ok(TradeStatus::Failed),
            other => Err(anyhow::anyhow!("Unknown trade status: {}", other)),
        }
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which quota column a trade consumed, so a refund restores exactly that one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaUnit {
    FreeTrade,
    Coin,
}

impl QuotaUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaUnit::FreeTrade => "free_trade",
            QuotaUnit::Coin => "coin",
        }
    }
}

impl FromStr for QuotaUnit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free_trade" => Ok(QuotaUnit::FreeTrade),
            "coin" => Ok(QuotaUnit::Coin),
            other => Err(anyhow::anyhow!("Unknown quota unit: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuotaBalance {
    pub free_trades: i32,
    pub coin_balance: i32,
    pub auto_trading_enabled: bool,
}

impl QuotaBalance {
    pub fn has_quota(&self) -> bool {
        self.free_trades > 0 || self.coin_balance > 0
    }
}

/// Outcome recorded with an audited signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Executed,
    Skipped,
    Failed,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Executed => "executed",
            SignalStatus::Skipped => "skipped",
            SignalStatus::Failed => "failed",
        }
    }
}

/// Exchange API credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: String = self.api_key.chars().take(4).collect();
        f.debug_struct("Credentials")
            .field("api_key", &format!("{}…", visible))
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// `btc/usdt`, `BTC-USDT` and `btcusdt` all become `BTCUSDT`
pub fn normalize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_uppercase()
}

/// Per-user settings layered over a bot's own configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsOverride {
    pub symbol: Option<String>,
    pub timeframe: Option<Timeframe>,
    pub market_type: Option<MarketType>,
    pub leverage: Option<u32>,
}

impl SettingsOverride {
    /// Fields of `specific` win over those of `self`
    pub fn merged_with(self, specific: SettingsOverride) -> SettingsOverride {
        SettingsOverride {
            symbol: specific.symbol.or(self.symbol),
            timeframe: specific.timeframe.or(self.timeframe),
            market_type: specific.market_type.or(self.market_type),
            leverage: specific.leverage.or(self.leverage),
        }
    }
}

/// An active bot with the content of its script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotDefinition {
    pub id: i64,
    pub user_id: i64,
    pub script_id: i64,
    pub name: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub market_type: MarketType,
    pub leverage: u32,
    pub script_content: String,
}

impl BotDefinition {
    pub fn from_models(bot: bots::Model, script_content: String) -> Result<Self, anyhow::Error> {
        Ok(BotDefinition {
            id: bot.id,
            user_id: bot.user_id,
            script_id: bot.script_id,
            name: bot.name,
            symbol: normalize_symbol(&bot.symbol),
            timeframe: bot.timeframe.parse()?,
            market_type: bot.market_type.parse()?,
            leverage: bot.leverage.max(1) as u32,
            script_content,
        })
    }

    pub fn with_override(mut self, settings: &SettingsOverride) -> Self {
        if let Some(symbol) = &settings.symbol {
            self.symbol = normalize_symbol(symbol);
        }
        if let Some(timeframe) = settings.timeframe {
            self.timeframe = timeframe;
        }
        if let Some(market_type) = settings.market_type {
            self.market_type = market_type;
        }
        if let Some(leverage) = settings.leverage {
            self.leverage = leverage.max(1);
        }
        // Spot has no leverage
        if self.market_type == MarketType::Spot {
            self.leverage = 1;
        }
        self
    }
}

/// Trade row as the execution layer sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub user_id: i64,
    pub bot_id: i64,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub market_type: MarketType,
    pub side: TradeSide,
    pub status: TradeStatus,
    pub quantity: Option<Decimal>,
    pub entry_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub leverage: u32,
    pub candle_open_time: i64,
    pub exchange_order_id: Option<String>,
    pub quota_unit: Option<QuotaUnit>,
    pub quota_consumed: bool,
    pub signal_reason: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl TryFrom<trades::Model> for Trade {
    type Error = anyhow::Error;

    fn try_from(model: trades::Model) -> Result<Self, Self::Error> {
        Ok(Trade {
            id: model.id,
            user_id: model.user_id,
            bot_id: model.bot_id,
            symbol: model.symbol,
            timeframe: model.timeframe.parse()?,
            market_type: model.market_type.parse()?,
            side: model.side.parse()?,
            status: model.status.parse()?,
            quantity: model.quantity,
            entry_price: model.entry_price,
            exit_price: model.exit_price,
            stop_loss: model.stop_loss,
            take_profit: model.take_profit,
            leverage: model.leverage.max(1) as u32,
            candle_open_time: model.candle_open_time,
            exchange_order_id: model.exchange_order_id,
            quota_unit: model.quota_unit.as_deref().map(str::parse).transpose()?,
            quota_consumed: model.quota_consumed,
            signal_reason: model.signal_reason,
            error_message: model.error_message,
            created_at: model.created_at,
            opened_at: model.opened_at,
            closed_at: model.closed_at,
        })
    }
}

/// Values of a trade about to be inserted as `PENDING`
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrade {
    pub user_id: i64,
    pub bot_id: i64,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub market_type: MarketType,
    pub side: TradeSide,
    pub leverage: u32,
    pub candle_open_time: i64,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub signal_reason: String,
    /// Quota unit already deducted for this entry; `None` when nothing was consumed
    pub quota_unit: Option<QuotaUnit>,
}

/// Values recorded when a position is confirmed on the exchange
#[derive(Debug, Clone, PartialEq)]
pub struct TradeFill {
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub exchange_order_id: Option<String>,
}

/// An audited signal
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRecord {
    pub user_id: i64,
    pub bot_id: i64,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub action: SignalAction,
    pub price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub reason: String,
    pub status: SignalStatus,
    pub detail: Option<String>,
    pub trade_id: Option<i64>,
    pub candle_open_time: i64,
    pub indicator_values: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(TradeStatus::Pending.can_transition_to(TradeStatus::Open));
        assert!(TradeStatus::Pending.can_transition_to(TradeStatus::Failed));
        assert!(TradeStatus::Open.can_transition_to(TradeStatus::Closed));
        assert!(!TradeStatus::Open.can_transition_to(TradeStatus::Failed));
        for terminal in [TradeStatus::Closed, TradeStatus::Failed] {
            for next in [TradeStatus::Pending, TradeStatus::Open, TradeStatus::Closed, TradeStatus::Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_market_type_parsing() {
        assert_eq!("linear".parse::<MarketType>().unwrap(), MarketType::LinearFutures);
        assert_eq!("COIN_FUTURES".parse::<MarketType>().unwrap(), MarketType::InverseFutures);
        assert_eq!(
            serde_json::from_str::<MarketType>("\"futures\"").unwrap(),
            MarketType::LinearFutures
        );
        assert!("margin".parse::<MarketType>().is_err());
    }

    #[test]
    fn test_override_layering() {
        let bot = BotDefinition {
            id: 1,
            user_id: 7,
            script_id: 3,
            name: "ema".to_string(),
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::H1,
            market_type: MarketType::LinearFutures,
            leverage: 5,
            script_content: String::new(),
        };
        let user_wide = SettingsOverride {
            symbol: Some("eth/usdt".to_string()),
            leverage: Some(3),
            ..Default::default()
        };
        let specific = SettingsOverride {
            leverage: Some(10),
            ..Default::default()
        };

        let bot = bot.with_override(&user_wide.merged_with(specific));
        assert_eq!(bot.symbol, "ETHUSDT");
        assert_eq!(bot.leverage, 10);

        let spot = bot.with_override(&SettingsOverride {
            market_type: Some(MarketType::Spot),
            ..Default::default()
        });
        assert_eq!(spot.leverage, 1);
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let credentials = Credentials {
            api_key: "abcdefgh".to_string(),
            api_secret: "topsecret".to_string(),
        };
        let printed = format!("{:?}", credentials);
        assert!(!printed.contains("topsecret"));
        assert!(!printed.contains("abcdefgh"));
    }
}
