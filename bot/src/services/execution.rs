//! Trade execution orchestrator
//!
//! Entry: auto-trading flag -> duplicate-candle guard -> quota -> credentials -> quota deduction
//! -> `PENDING` row -> sizing and market order -> `OPEN` -> best-effort stop-loss / take-profit.
//! Anything failing before the fill fails the trade and refunds the exact quota unit. Once a
//! position exists on the exchange it is never rolled back.
//!
//! Exit: cancel resting orders, resolve what the exchange holds and send a reduce-only market
//! order on the opposite side. When nothing is held, or the exchange cannot be reached, the
//! trade is still closed locally with an annotation.

use crate::error::{ExchangeError, ExecutionError};
use crate::services::exchange::{
    ExchangeConnector, ExchangeRouter, OrderFill, ProtectiveKind, SymbolFilters,
};
use crate::services::locks::InstanceLocks;
use crate::services::sizing::{self, to_decimal};
use crate::services::store::{CandleCheck, PendingInsert, Store};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    BotDefinition, ExecutionConfig, MarketType, NewTrade, QuotaUnit, SignalRecord, SignalStatus,
    Trade, TradeFill, TradeSide, TradeStatus,
};
use signal_engine::strategy::TradeSignal;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What an entry, exit or close attempt did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Opened {
        trade_id: i64,
        side: TradeSide,
        quantity: Decimal,
        entry_price: Decimal,
        /// Stop-loss / take-profit orders that could not be placed
        protective_failures: Vec<String>,
    },
    Closed {
        trade_id: i64,
        exit_price: Option<Decimal>,
        /// False when the trade was only closed in the database
        exchange_closed: bool,
        note: Option<String>,
    },
    /// A stale pending trade failed by close-all
    Cancelled { trade_id: i64, refunded: bool },
    Skipped { reason: String },
}

/// One trade handled by close-all
#[derive(Debug, Clone, Serialize)]
pub struct CloseResult {
    pub trade_id: i64,
    pub bot_id: i64,
    pub symbol: String,
    pub outcome: Option<ExecutionOutcome>,
    pub error: Option<String>,
}

/// Signal context carried into the audit log
#[derive(Debug, Clone, Copy)]
pub struct SignalContext<'a> {
    pub signal: &'a TradeSignal,
    /// Open time of the candle the signal belongs to
    pub candle_open_time: i64,
    pub indicator_values: Option<&'a serde_json::Value>,
}

pub struct TradeExecutor {
    store: Arc<dyn Store>,
    connector: Arc<dyn ExchangeConnector>,
    locks: InstanceLocks,
    config: ExecutionConfig,
}

impl TradeExecutor {
    pub fn new(
        store: Arc<dyn Store>,
        connector: Arc<dyn ExchangeConnector>,
        locks: InstanceLocks,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            store,
            connector,
            locks,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Opens a position for a BUY/SELL signal
    pub async fn execute_entry(
        &self,
        bot: &BotDefinition,
        context: SignalContext<'_>,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let _guard = self.locks.acquire(bot.user_id, bot.id, &bot.symbol).await;

        let result = self.try_entry(bot, context).await;
        match &result {
            Ok(ExecutionOutcome::Skipped { reason }) => {
                self.audit(bot, context, SignalStatus::Skipped, Some(reason.clone()), None).await
            }
            Ok(outcome) => self.audit(bot, context, SignalStatus::Executed, None, trade_id_of(outcome)).await,
            Err(e) if e.is_skip() => {
                info!("⏭️ [User {}] {} entry skipped: {}", bot.user_id, bot.symbol, e);
                self.audit(bot, context, SignalStatus::Skipped, Some(e.to_string()), None).await
            }
            Err(e) => {
                warn!("❌ [User {}] {} entry failed: {}", bot.user_id, bot.symbol, e);
                self.audit(bot, context, SignalStatus::Failed, Some(e.to_string()), None).await
            }
        }
        result
    }

    async fn try_entry(
        &self,
        bot: &BotDefinition,
        context: SignalContext<'_>,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let signal = context.signal;
        let Some(side) = TradeSide::for_entry(signal.action) else {
            return Ok(ExecutionOutcome::Skipped {
                reason: format!("{} is not an entry signal", signal.action),
            });
        };
        if bot.market_type == MarketType::Spot && side == TradeSide::Sell {
            return Err(ExecutionError::ShortOnSpot);
        }

        let quota = self.store.quota(bot.user_id).await?;
        if !quota.auto_trading_enabled {
            return Err(ExecutionError::AutoTradingDisabled(bot.user_id));
        }

        // A repeat on a traded candle is a duplicate even when that trade used the last unit
        let max_failed = self.config.max_failed_attempts_per_candle;
        let check = self
            .store
            .candle_check(bot.user_id, bot.id, &bot.symbol, context.candle_open_time, max_failed)
            .await?;
        candle_check_result(check, context.candle_open_time)?;

        if !quota.has_quota() {
            return Err(ExecutionError::QuotaExhausted(bot.user_id));
        }

        let mut new_trade = NewTrade {
            user_id: bot.user_id,
            bot_id: bot.id,
            symbol: bot.symbol.clone(),
            timeframe: bot.timeframe,
            market_type: bot.market_type,
            side,
            leverage: bot.leverage,
            candle_open_time: context.candle_open_time,
            stop_loss: signal.stop_loss.and_then(to_decimal),
            take_profit: signal.take_profit.and_then(to_decimal),
            signal_reason: signal.reason.clone(),
            quota_unit: None,
        };

        let Some(credentials) = self.store.credentials(bot.user_id).await? else {
            let trade = self.store.insert_failed(new_trade, "no credentials").await?;
            warn!("⚠️ [User {}] No exchange credentials, trade {} failed", bot.user_id, trade.id);
            return Err(ExecutionError::NoCredentials);
        };

        let unit = self
            .store
            .consume(bot.user_id)
            .await?
            .ok_or(ExecutionError::QuotaExhausted(bot.user_id))?;
        new_trade.quota_unit = Some(unit);

        let trade = match self.store.insert_pending(new_trade, max_failed).await {
            Ok(PendingInsert::Inserted(trade)) => trade,
            Ok(PendingInsert::Blocked(check)) => {
                // Another run won the race between the guard above and the insert
                self.refund(bot.user_id, unit).await;
                candle_check_result(check, context.candle_open_time)?;
                return Err(anyhow::anyhow!("pending insert blocked for {}", bot.symbol).into());
            }
            Err(e) => {
                self.refund(bot.user_id, unit).await;
                return Err(e.into());
            }
        };

        let opened = match self.connector.connect(&credentials, bot.market_type) {
            Ok(router) => self
                .open_position(router.as_ref(), bot, side, signal.price)
                .await
                .map(|(fill, filters, planned)| (router, fill, filters, planned)),
            Err(e) => Err(e.into()),
        };
        let (router, fill, filters, planned) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                self.fail_pending(&trade, unit, &e).await;
                return Err(e);
            }
        };

        let quantity = if fill.quantity > Decimal::ZERO { fill.quantity } else { planned };
        let entry_price = if fill.avg_price > Decimal::ZERO {
            fill.avg_price
        } else {
            to_decimal(signal.price).unwrap_or(Decimal::ZERO)
        };

        let trade_fill = TradeFill {
            quantity,
            entry_price,
            exchange_order_id: Some(fill.order_id.clone()),
        };
        match self.store.mark_open(trade.id, &trade_fill).await {
            Ok(true) => {}
            Ok(false) => {
                error!(
                    "🚨 [User {}] Order {} filled but trade {} was no longer pending",
                    bot.user_id, fill.order_id, trade.id
                );
                return Err(ExecutionError::Store(anyhow::anyhow!(
                    "order {} filled but trade {} was no longer pending",
                    fill.order_id,
                    trade.id
                )));
            }
            Err(e) => {
                error!(
                    "🚨 [User {}] Order {} filled but trade {} could not be marked open: {}",
                    bot.user_id, fill.order_id, trade.id, e
                );
                return Err(e.into());
            }
        }
        info!(
            "✅ [User {}] Opened {} {} {} @ {} (trade {}, {})",
            bot.user_id, side, quantity, bot.symbol, entry_price, trade.id, bot.market_type
        );

        let protective_failures = self
            .place_protective_orders(router.as_ref(), bot, side, quantity, signal, &filters)
            .await;

        Ok(ExecutionOutcome::Opened {
            trade_id: trade.id,
            side,
            quantity,
            entry_price,
            protective_failures,
        })
    }

    /// Sizing and the market order. Returns the fill, the filters used and the planned quantity.
    async fn open_position(
        &self,
        router: &dyn ExchangeRouter,
        bot: &BotDefinition,
        side: TradeSide,
        price: f64,
    ) -> Result<(OrderFill, SymbolFilters, Decimal), ExecutionError> {
        let filters = self.filters_or_fallback(router, &bot.symbol).await;
        let asset = filters.balance_asset(bot.market_type).to_string();
        let balance = router.available_balance(&asset).await?;

        if bot.market_type.is_futures() {
            if let Err(e) = router.set_leverage(&bot.symbol, bot.leverage).await {
                warn!("⚠️ [User {}] Could not set {}x leverage on {}: {}", bot.user_id, bot.leverage, bot.symbol, e);
            }
        }

        let price = to_decimal(price)
            .ok_or_else(|| ExchangeError::BelowMinimum(format!("invalid reference price {}", price)))?;
        let quantity =
            sizing::entry_quantity(&self.config, bot.market_type, balance, price, bot.leverage, &filters)?;

        let fill = router.market_order(&bot.symbol, side, quantity, false).await?;
        Ok((fill, filters, quantity))
    }

    async fn filters_or_fallback(&self, router: &dyn ExchangeRouter, symbol: &str) -> SymbolFilters {
        match router.symbol_filters(symbol).await {
            Ok(filters) => filters,
            Err(e) => {
                warn!("⚠️ Using fallback filters for {}: {}", symbol, e);
                SymbolFilters::fallback(symbol, router.market_type())
            }
        }
    }

    async fn place_protective_orders(
        &self,
        router: &dyn ExchangeRouter,
        bot: &BotDefinition,
        side: TradeSide,
        quantity: Decimal,
        signal: &TradeSignal,
        filters: &SymbolFilters,
    ) -> Vec<String> {
        let mut failures = Vec::new();
        let targets = [
            (ProtectiveKind::StopLoss, signal.stop_loss),
            (ProtectiveKind::TakeProfit, signal.take_profit),
        ];

        for (kind, price) in targets {
            let Some(price) = price.and_then(to_decimal).filter(|p| *p > Decimal::ZERO) else {
                continue;
            };
            match router
                .protective_order(&bot.symbol, kind, side, quantity, price, filters)
                .await
            {
                Ok(order_id) => info!(
                    "🛡️ [User {}] {} order {} placed for {} at {}",
                    bot.user_id, kind.as_str(), order_id, bot.symbol, price
                ),
                Err(e) => {
                    warn!("⚠️ [User {}] {} order for {} failed: {}", bot.user_id, kind.as_str(), bot.symbol, e);
                    failures.push(format!("{} at {}: {}", kind.as_str(), price, e));
                }
            }
        }
        failures
    }

    async fn fail_pending(&self, trade: &Trade, unit: QuotaUnit, err: &ExecutionError) {
        match self.store.mark_failed(trade.id, &err.to_string()).await {
            Ok(true) => {}
            Ok(false) => warn!("⚠️ Trade {} was no longer pending when failing it", trade.id),
            Err(e) => error!("❌ Could not mark trade {} failed: {}", trade.id, e),
        }
        self.refund(trade.user_id, unit).await;
    }

    async fn refund(&self, user_id: i64, unit: QuotaUnit) {
        match self.store.refund(user_id, unit).await {
            Ok(()) => info!("↩️ [User {}] Refunded one {} unit", user_id, unit.as_str()),
            Err(e) => error!("❌ [User {}] Refund of {} failed: {}", user_id, unit.as_str(), e),
        }
    }

    /// Closes the open trade of an instance after its exit conditions fired
    pub async fn execute_exit(
        &self,
        bot: &BotDefinition,
        trade_id: i64,
        context: SignalContext<'_>,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let _guard = self.locks.acquire(bot.user_id, bot.id, &bot.symbol).await;

        let result = match self.store.trade(trade_id).await {
            Ok(Some(trade)) if trade.status == TradeStatus::Open => {
                self.close_position(&trade, to_decimal(context.signal.price)).await
            }
            Ok(_) => Ok(ExecutionOutcome::Skipped {
                reason: format!("trade {} is no longer open", trade_id),
            }),
            Err(e) => Err(e.into()),
        };

        let status = match &result {
            Ok(ExecutionOutcome::Skipped { .. }) => SignalStatus::Skipped,
            Ok(_) => SignalStatus::Executed,
            Err(_) => SignalStatus::Failed,
        };
        let detail = match &result {
            Ok(ExecutionOutcome::Closed { note, .. }) => note.clone(),
            Ok(ExecutionOutcome::Skipped { reason }) => Some(reason.clone()),
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };
        self.audit(bot, context, status, detail, Some(trade_id)).await;
        result
    }

    /// Closes an `OPEN` trade on the exchange, falling back to a local close
    async fn close_position(
        &self,
        trade: &Trade,
        fallback_price: Option<Decimal>,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let exchange_result = match self.store.credentials(trade.user_id).await {
            Ok(Some(credentials)) => match self.connector.connect(&credentials, trade.market_type) {
                Ok(router) => self.close_on_exchange(router.as_ref(), trade).await,
                Err(e) => Err(e),
            },
            Ok(None) => Err(ExchangeError::CallFailed("no credentials".to_string())),
            Err(e) => Err(ExchangeError::CallFailed(format!("credential lookup failed: {}", e))),
        };

        let (exit_price, exchange_closed, note) = match exchange_result {
            Ok(Some(fill)) => {
                let price = Some(fill.avg_price).filter(|p| *p > Decimal::ZERO).or(fallback_price);
                (price, true, None)
            }
            Ok(None) => (
                fallback_price,
                false,
                Some("no exchange position found; closed locally".to_string()),
            ),
            Err(e) => {
                warn!("⚠️ [User {}] Exchange close of trade {} failed: {}", trade.user_id, trade.id, e);
                (
                    fallback_price,
                    false,
                    Some(format!("exchange close failed: {}; closed locally", e)),
                )
            }
        };

        if !self.store.mark_closed(trade.id, exit_price, note.as_deref()).await? {
            return Ok(ExecutionOutcome::Skipped {
                reason: format!("trade {} is no longer open", trade.id),
            });
        }

        info!(
            "✅ [User {}] Closed trade {} on {} ({})",
            trade.user_id,
            trade.id,
            trade.symbol,
            if exchange_closed { "exchange" } else { "local only" }
        );
        Ok(ExecutionOutcome::Closed {
            trade_id: trade.id,
            exit_price,
            exchange_closed,
            note,
        })
    }

    /// `Ok(None)` when the exchange holds nothing to close
    async fn close_on_exchange(
        &self,
        router: &dyn ExchangeRouter,
        trade: &Trade,
    ) -> Result<Option<OrderFill>, ExchangeError> {
        let filters = self.filters_or_fallback(router, &trade.symbol).await;

        // Resting stop-loss / take-profit orders would otherwise fire on a flat position
        if let Err(e) = router.cancel_open_orders(&trade.symbol).await {
            warn!("⚠️ Could not cancel open orders on {}: {}", trade.symbol, e);
        }

        let held = match router.position_size(&trade.symbol, trade.side, &filters).await {
            Ok(held) => held,
            Err(e) => {
                warn!("⚠️ Position of trade {} could not be resolved: {}", trade.id, e);
                return Ok(None);
            }
        };
        let quantity = sizing::close_quantity(trade.quantity, held, filters.step_size);
        if quantity <= Decimal::ZERO {
            return Ok(None);
        }

        let fill = router
            .market_order(&trade.symbol, trade.side.opposite(), quantity, true)
            .await?;
        Ok(Some(fill))
    }

    /// Closes every active trade of a user. Stale `PENDING` rows are failed and refunded.
    pub async fn close_all(&self, user_id: i64) -> Result<Vec<CloseResult>, ExecutionError> {
        let trades = self.store.active_trades_for_user(user_id).await?;
        info!("🧹 [User {}] Closing {} active trades", user_id, trades.len());

        let mut results = Vec::with_capacity(trades.len());
        for trade in trades {
            let _guard = self.locks.acquire(user_id, trade.bot_id, &trade.symbol).await;

            let result = match self.store.trade(trade.id).await {
                Ok(Some(current)) => self.close_one(current).await,
                Ok(None) => Ok(ExecutionOutcome::Skipped {
                    reason: format!("trade {} no longer exists", trade.id),
                }),
                Err(e) => Err(e.into()),
            };

            let (outcome, error) = match result {
                Ok(outcome) => (Some(outcome), None),
                Err(e) => {
                    warn!("❌ [User {}] close-all failed for trade {}: {}", user_id, trade.id, e);
                    (None, Some(e.to_string()))
                }
            };
            results.push(CloseResult {
                trade_id: trade.id,
                bot_id: trade.bot_id,
                symbol: trade.symbol,
                outcome,
                error,
            });
        }
        Ok(results)
    }

    async fn close_one(&self, trade: Trade) -> Result<ExecutionOutcome, ExecutionError> {
        match trade.status {
            TradeStatus::Open => self.close_position(&trade, None).await,
            TradeStatus::Pending => {
                if !self.store.mark_failed(trade.id, "cancelled by close-all").await? {
                    return Ok(ExecutionOutcome::Skipped {
                        reason: format!("trade {} is no longer pending", trade.id),
                    });
                }
                let refunded = match trade.quota_unit {
                    Some(unit) if !trade.quota_consumed => {
                        self.refund(trade.user_id, unit).await;
                        true
                    }
                    _ => false,
                };
                Ok(ExecutionOutcome::Cancelled {
                    trade_id: trade.id,
                    refunded,
                })
            }
            TradeStatus::Closed | TradeStatus::Failed => Ok(ExecutionOutcome::Skipped {
                reason: format!("trade {} is already {}", trade.id, trade.status),
            }),
        }
    }

    async fn audit(
        &self,
        bot: &BotDefinition,
        context: SignalContext<'_>,
        status: SignalStatus,
        detail: Option<String>,
        trade_id: Option<i64>,
    ) {
        let signal = context.signal;
        let record = SignalRecord {
            user_id: bot.user_id,
            bot_id: bot.id,
            symbol: bot.symbol.clone(),
            timeframe: bot.timeframe,
            action: signal.action,
            price: to_decimal(signal.price).unwrap_or(Decimal::ZERO),
            stop_loss: signal.stop_loss.and_then(to_decimal),
            take_profit: signal.take_profit.and_then(to_decimal),
            reason: signal.reason.clone(),
            status,
            detail,
            trade_id,
            candle_open_time: context.candle_open_time,
            indicator_values: context.indicator_values.cloned(),
        };

        if let Err(e) = self.store.record_signal(record).await {
            warn!("⚠️ [User {}] Could not record {} signal: {}", bot.user_id, signal.action, e);
        }
    }
}

fn trade_id_of(outcome: &ExecutionOutcome) -> Option<i64> {
    match outcome {
        ExecutionOutcome::Opened { trade_id, .. }
        | ExecutionOutcome::Closed { trade_id, .. }
        | ExecutionOutcome::Cancelled { trade_id, .. } => Some(*trade_id),
        ExecutionOutcome::Skipped { .. } => None,
    }
}

fn candle_check_result(check: CandleCheck, candle_open_time: i64) -> Result<(), ExecutionError> {
    match check {
        CandleCheck::Clear => Ok(()),
        CandleCheck::Duplicate(status) => Err(ExecutionError::DuplicateCandle {
            candle_open_time,
            status: status.to_string(),
        }),
        CandleCheck::TooManyFailures(attempts) => Err(ExecutionError::TooManyFailedAttempts {
            attempts,
            candle_open_time,
        }),
    }
}

/// Open time of the candle a signal evaluated now belongs to
pub fn current_candle_open_time(bot: &BotDefinition) -> i64 {
    bot.timeframe.candle_start(Utc::now().timestamp_millis())
}
