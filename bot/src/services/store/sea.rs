//! MySQL-backed store

use super::{
    BotSource, CandleCheck, CredentialStore, OverrideRule, PendingInsert, QuotaStore, TradeStore,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use shared::entity::{bot_settings, bots, exchange_wallets, legacy_api_keys, scripts, signals, trades, user_quotas};
use shared::{
    BotDefinition, Credentials, NewTrade, QuotaBalance, QuotaUnit, SettingsOverride, SignalRecord,
    Trade, TradeFill, TradeStatus,
};
use std::sync::Arc;
use tracing::warn;

const ACTIVE_STATUSES: [&str; 2] = ["PENDING", "OPEN"];

#[derive(Clone)]
pub struct SeaStore {
    db: Arc<DatabaseConnection>,
}

impl SeaStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn new_trade_model(trade: NewTrade, status: TradeStatus, error: Option<&str>) -> trades::ActiveModel {
        let now = Utc::now();
        trades::ActiveModel {
            user_id: ActiveValue::Set(trade.user_id),
            bot_id: ActiveValue::Set(trade.bot_id),
            symbol: ActiveValue::Set(trade.symbol),
            timeframe: ActiveValue::Set(trade.timeframe.to_string()),
            market_type: ActiveValue::Set(trade.market_type.to_string()),
            side: ActiveValue::Set(trade.side.to_string()),
            status: ActiveValue::Set(status.to_string()),
            stop_loss: ActiveValue::Set(trade.stop_loss),
            take_profit: ActiveValue::Set(trade.take_profit),
            leverage: ActiveValue::Set(trade.leverage as i32),
            candle_open_time: ActiveValue::Set(trade.candle_open_time),
            quota_unit: ActiveValue::Set(trade.quota_unit.map(|u| u.as_str().to_string())),
            quota_consumed: ActiveValue::Set(false),
            signal_reason: ActiveValue::Set(Some(trade.signal_reason)),
            error_message: ActiveValue::Set(error.map(str::to_string)),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        }
    }

    async fn adjust_quota(&self, user_id: i64, column: user_quotas::Column, delta: i32, only_if_positive: bool) -> Result<bool> {
        let mut update = user_quotas::Entity::update_many()
            .col_expr(column, Expr::col(column).add(delta))
            .col_expr(user_quotas::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user_quotas::Column::UserId.eq(user_id));
        if only_if_positive {
            update = update.filter(column.gt(0));
        }

        let result = update.exec(self.db.as_ref()).await?;
        Ok(result.rows_affected == 1)
    }
}

fn unit_column(unit: QuotaUnit) -> user_quotas::Column {
    match unit {
        QuotaUnit::FreeTrade => user_quotas::Column::FreeTrades,
        QuotaUnit::Coin => user_quotas::Column::CoinBalance,
    }
}

fn to_trades(models: Vec<trades::Model>) -> Result<Vec<Trade>> {
    models.into_iter().map(Trade::try_from).collect()
}

fn statuses(models: &[trades::Model]) -> Vec<TradeStatus> {
    models.iter().filter_map(|m| m.status.parse().ok()).collect()
}

#[async_trait]
impl QuotaStore for SeaStore {
    async fn quota(&self, user_id: i64) -> Result<QuotaBalance> {
        let row = user_quotas::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .context("Failed to load quota")?;

        Ok(row
            .map(|q| QuotaBalance {
                free_trades: q.free_trades,
                coin_balance: q.coin_balance,
                auto_trading_enabled: q.auto_trading_enabled,
            })
            .unwrap_or_default())
    }

    async fn consume(&self, user_id: i64) -> Result<Option<QuotaUnit>> {
        for unit in [QuotaUnit::FreeTrade, QuotaUnit::Coin] {
            if self.adjust_quota(user_id, unit_column(unit), -1, true).await? {
                return Ok(Some(unit));
            }
        }
        Ok(None)
    }

    async fn refund(&self, user_id: i64, unit: QuotaUnit) -> Result<()> {
        if !self.adjust_quota(user_id, unit_column(unit), 1, false).await? {
            warn!("⚠️ [User {}] Refund of {} matched no quota row", user_id, unit.as_str());
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SeaStore {
    async fn credentials(&self, user_id: i64) -> Result<Option<Credentials>> {
        let wallet = exchange_wallets::Entity::find()
            .filter(exchange_wallets::Column::UserId.eq(user_id))
            .filter(exchange_wallets::Column::IsActive.eq(true))
            .filter(exchange_wallets::Column::Exchange.eq("binance"))
            .order_by_desc(exchange_wallets::Column::Id)
            .one(self.db.as_ref())
            .await
            .context("Failed to load exchange wallet")?;

        if let Some(wallet) = wallet.filter(|w| !w.api_key.trim().is_empty()) {
            return Ok(Some(Credentials {
                api_key: wallet.api_key,
                api_secret: wallet.api_secret,
            }));
        }

        let legacy = legacy_api_keys::Entity::find()
            .filter(legacy_api_keys::Column::UserId.eq(user_id))
            .order_by_desc(legacy_api_keys::Column::Id)
            .one(self.db.as_ref())
            .await
            .context("Failed to load legacy API key")?;

        Ok(legacy
            .filter(|k| !k.api_key.trim().is_empty())
            .map(|k| Credentials {
                api_key: k.api_key,
                api_secret: k.api_secret,
            }))
    }
}

#[async_trait]
impl TradeStore for SeaStore {
    async fn trade(&self, trade_id: i64) -> Result<Option<Trade>> {
        trades::Entity::find_by_id(trade_id)
            .one(self.db.as_ref())
            .await?
            .map(Trade::try_from)
            .transpose()
    }

    async fn active_trade(&self, user_id: i64, bot_id: i64, symbol: &str) -> Result<Option<Trade>> {
        trades::Entity::find()
            .filter(trades::Column::UserId.eq(user_id))
            .filter(trades::Column::BotId.eq(bot_id))
            .filter(trades::Column::Symbol.eq(symbol))
            .filter(trades::Column::Status.is_in(ACTIVE_STATUSES))
            .order_by_desc(trades::Column::Id)
            .one(self.db.as_ref())
            .await?
            .map(Trade::try_from)
            .transpose()
    }

    async fn candle_check(
        &self,
        user_id: i64,
        bot_id: i64,
        symbol: &str,
        candle_open_time: i64,
        max_failed: u32,
    ) -> Result<CandleCheck> {
        let rows = trades::Entity::find()
            .filter(trades::Column::UserId.eq(user_id))
            .filter(trades::Column::BotId.eq(bot_id))
            .filter(trades::Column::Symbol.eq(symbol))
            .filter(trades::Column::CandleOpenTime.eq(candle_open_time))
            .all(self.db.as_ref())
            .await?;

        Ok(CandleCheck::evaluate(statuses(&rows), max_failed))
    }

    async fn insert_pending(&self, trade: NewTrade, max_failed: u32) -> Result<PendingInsert> {
        let txn = self.db.begin().await?;

        let same_candle = trades::Entity::find()
            .filter(trades::Column::UserId.eq(trade.user_id))
            .filter(trades::Column::BotId.eq(trade.bot_id))
            .filter(trades::Column::Symbol.eq(trade.symbol.as_str()))
            .filter(trades::Column::CandleOpenTime.eq(trade.candle_open_time))
            .lock_exclusive()
            .all(&txn)
            .await?;
        let active = trades::Entity::find()
            .filter(trades::Column::UserId.eq(trade.user_id))
            .filter(trades::Column::BotId.eq(trade.bot_id))
            .filter(trades::Column::Symbol.eq(trade.symbol.as_str()))
            .filter(trades::Column::Status.is_in(ACTIVE_STATUSES))
            .lock_exclusive()
            .all(&txn)
            .await?;

        let check = match statuses(&active).first() {
            Some(status) => CandleCheck::Duplicate(*status),
            None => CandleCheck::evaluate(statuses(&same_candle), max_failed),
        };
        if check != CandleCheck::Clear {
            txn.rollback().await?;
            return Ok(PendingInsert::Blocked(check));
        }

        let model = Self::new_trade_model(trade, TradeStatus::Pending, None)
            .insert(&txn)
            .await
            .context("Failed to insert pending trade")?;
        txn.commit().await?;

        Ok(PendingInsert::Inserted(Trade::try_from(model)?))
    }

    async fn insert_failed(&self, trade: NewTrade, error: &str) -> Result<Trade> {
        let model = Self::new_trade_model(trade, TradeStatus::Failed, Some(error))
            .insert(self.db.as_ref())
            .await
            .context("Failed to insert failed trade")?;
        Trade::try_from(model)
    }

    async fn mark_open(&self, trade_id: i64, fill: &TradeFill) -> Result<bool> {
        let now = Utc::now();
        let result = trades::Entity::update_many()
            .set(trades::ActiveModel {
                status: ActiveValue::Set(TradeStatus::Open.to_string()),
                quantity: ActiveValue::Set(Some(fill.quantity)),
                entry_price: ActiveValue::Set(Some(fill.entry_price)),
                exchange_order_id: ActiveValue::Set(fill.exchange_order_id.clone()),
                quota_consumed: ActiveValue::Set(true),
                opened_at: ActiveValue::Set(Some(now)),
                updated_at: ActiveValue::Set(now),
                ..Default::default()
            })
            .filter(trades::Column::Id.eq(trade_id))
            .filter(trades::Column::Status.eq(TradeStatus::Pending.as_str()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn mark_failed(&self, trade_id: i64, error: &str) -> Result<bool> {
        let result = trades::Entity::update_many()
            .set(trades::ActiveModel {
                status: ActiveValue::Set(TradeStatus::Failed.to_string()),
                error_message: ActiveValue::Set(Some(error.to_string())),
                quota_consumed: ActiveValue::Set(false),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            })
            .filter(trades::Column::Id.eq(trade_id))
            .filter(trades::Column::Status.eq(TradeStatus::Pending.as_str()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn mark_closed(
        &self,
        trade_id: i64,
        exit_price: Option<Decimal>,
        note: Option<&str>,
    ) -> Result<bool> {
        let now = Utc::now();
        let mut update = trades::ActiveModel {
            status: ActiveValue::Set(TradeStatus::Closed.to_string()),
            exit_price: ActiveValue::Set(exit_price),
            closed_at: ActiveValue::Set(Some(now)),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        };
        if let Some(note) = note {
            update.error_message = ActiveValue::Set(Some(note.to_string()));
        }

        let result = trades::Entity::update_many()
            .set(update)
            .filter(trades::Column::Id.eq(trade_id))
            .filter(trades::Column::Status.eq(TradeStatus::Open.as_str()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn active_trades_for_user(&self, user_id: i64) -> Result<Vec<Trade>> {
        let rows = trades::Entity::find()
            .filter(trades::Column::UserId.eq(user_id))
            .filter(trades::Column::Status.is_in(ACTIVE_STATUSES))
            .order_by_asc(trades::Column::Id)
            .all(self.db.as_ref())
            .await?;
        to_trades(rows)
    }

    async fn record_signal(&self, record: SignalRecord) -> Result<()> {
        let signal = signals::ActiveModel {
            user_id: ActiveValue::Set(record.user_id),
            bot_id: ActiveValue::Set(record.bot_id),
            symbol: ActiveValue::Set(record.symbol),
            timeframe: ActiveValue::Set(record.timeframe.to_string()),
            action: ActiveValue::Set(record.action.to_string()),
            price: ActiveValue::Set(record.price),
            stop_loss: ActiveValue::Set(record.stop_loss),
            take_profit: ActiveValue::Set(record.take_profit),
            reason: ActiveValue::Set(record.reason),
            status: ActiveValue::Set(record.status.as_str().to_string()),
            detail: ActiveValue::Set(record.detail),
            trade_id: ActiveValue::Set(record.trade_id),
            candle_open_time: ActiveValue::Set(record.candle_open_time),
            indicator_values: ActiveValue::Set(record.indicator_values.map(|v| v.to_string())),
            created_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        };

        signals::Entity::insert(signal)
            .exec(self.db.as_ref())
            .await
            .context("Failed to record signal")?;
        Ok(())
    }
}

#[async_trait]
impl BotSource for SeaStore {
    async fn active_bots(&self) -> Result<Vec<BotDefinition>> {
        let rows = bots::Entity::find()
            .filter(bots::Column::IsActive.eq(true))
            .find_also_related(scripts::Entity)
            .all(self.db.as_ref())
            .await
            .context("Failed to load active bots")?;

        let mut definitions = Vec::with_capacity(rows.len());
        for (bot, script) in rows {
            let Some(script) = script else {
                warn!("⚠️ Bot {} has no script, skipping", bot.id);
                continue;
            };
            let bot_id = bot.id;
            match BotDefinition::from_models(bot, script.content) {
                Ok(definition) => definitions.push(definition),
                Err(e) => warn!("⚠️ Bot {} has invalid settings, skipping: {}", bot_id, e),
            }
        }
        Ok(definitions)
    }

    async fn settings_overrides(&self) -> Result<Vec<OverrideRule>> {
        let rows = bot_settings::Entity::find()
            .all(self.db.as_ref())
            .await
            .context("Failed to load bot settings")?;

        Ok(rows
            .into_iter()
            .map(|row| OverrideRule {
                user_id: row.user_id,
                bot_id: row.bot_id,
                settings: SettingsOverride {
                    symbol: row.symbol.filter(|s| !s.trim().is_empty()),
                    timeframe: row.timeframe.and_then(|t| t.parse().ok()),
                    market_type: row.market_type.and_then(|m| m.parse().ok()),
                    leverage: row.leverage.map(|l| l.max(1) as u32),
                },
            })
            .collect())
    }
}
