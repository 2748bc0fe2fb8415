//! Integration tests for the trade execution orchestrator

mod common;

use bot::services::exchange::ProtectiveKind;
use bot::services::execution::{ExecutionOutcome, SignalContext, TradeExecutor};
use bot::services::locks::InstanceLocks;
use bot::services::store::{QuotaStore, TradeStore};
use bot::{ExchangeError, ExecutionError};
use chrono::Utc;
use common::*;
use rust_decimal::Decimal;
use shared::{
    ExecutionConfig, MarketType, QuotaBalance, SignalStatus, Trade, TradeSide, TradeStatus,
};
use signal_engine::data::Timeframe;
use signal_engine::strategy::TradeSignal;
use std::str::FromStr;
use std::sync::Arc;

const CANDLE: i64 = 1_704_783_600_000;

fn dec(text: &str) -> Decimal {
    Decimal::from_str(text).unwrap()
}

fn buy_signal() -> TradeSignal {
    TradeSignal::buy(100.0, "Entry conditions met: ema(9) crossover ema(21)".to_string())
        .with_stop_loss(Some(98.0))
        .with_take_profit(Some(104.0))
}

fn context(signal: &TradeSignal) -> SignalContext<'_> {
    SignalContext {
        signal,
        candle_open_time: CANDLE,
        indicator_values: None,
    }
}

fn open_trade(id: i64, user_id: i64, bot_id: i64, quantity: &str) -> Trade {
    Trade {
        id,
        user_id,
        bot_id,
        symbol: "BTCUSDT".to_string(),
        timeframe: Timeframe::H1,
        market_type: MarketType::Spot,
        side: TradeSide::Buy,
        status: TradeStatus::Open,
        quantity: Some(dec(quantity)),
        entry_price: Some(dec("100")),
        exit_price: None,
        stop_loss: None,
        take_profit: None,
        leverage: 1,
        candle_open_time: CANDLE - 3_600_000,
        exchange_order_id: Some("42".to_string()),
        quota_unit: Some(shared::QuotaUnit::FreeTrade),
        quota_consumed: true,
        signal_reason: None,
        error_message: None,
        created_at: Utc::now(),
        opened_at: Some(Utc::now()),
        closed_at: None,
    }
}

#[tokio::test]
async fn test_entry_opens_position_with_protection() {
    let store = funded_store(7, 1, 0).await;
    let exchange = MockExchange::with_balance(1000, 100);
    let executor = executor(store.clone(), &exchange);
    let bot = bot(1, 7, MarketType::Spot);

    let signal = buy_signal();
    let outcome = executor.execute_entry(&bot, context(&signal)).await.unwrap();

    match outcome {
        ExecutionOutcome::Opened { quantity, entry_price, protective_failures, .. } => {
            // 10% of 1000 USDT at 100
            assert_eq!(quantity, dec("1"));
            assert_eq!(entry_price, dec("100"));
            assert!(protective_failures.is_empty());
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let trades = store.trades().await;
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].status, TradeStatus::Open);
    assert!(trades[0].quota_consumed);
    assert_eq!(trades[0].candle_open_time, CANDLE);
    assert_eq!(store.quota(7).await.unwrap().free_trades, 0);

    assert_eq!(
        exchange.protective(),
        vec![(ProtectiveKind::StopLoss, dec("98")), (ProtectiveKind::TakeProfit, dec("104"))]
    );
    let signals = store.signals().await;
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].status, SignalStatus::Executed);
    assert_eq!(signals[0].trade_id, Some(trades[0].id));
}

#[tokio::test]
async fn test_duplicate_candle_executes_once() {
    let store = funded_store(7, 5, 0).await;
    let exchange = MockExchange::with_balance(1000, 100);
    let executor = executor(store.clone(), &exchange);
    let bot = bot(1, 7, MarketType::Spot);
    let signal = buy_signal();

    executor.execute_entry(&bot, context(&signal)).await.unwrap();

    // Exit the position within the same candle, then signal again
    let trade_id = store.trades().await[0].id;
    let close = TradeSignal::close(101.0, "Exit conditions met".to_string());
    let closed = executor.execute_exit(&bot, trade_id, context(&close)).await.unwrap();
    assert!(matches!(closed, ExecutionOutcome::Closed { exchange_closed: true, .. }));

    let err = executor.execute_entry(&bot, context(&signal)).await.unwrap_err();
    assert!(matches!(err, ExecutionError::DuplicateCandle { candle_open_time: CANDLE, .. }));
    assert!(err.is_skip());

    assert_eq!(store.quota(7).await.unwrap().free_trades, 4);
    let entries: Vec<_> = exchange.orders().into_iter().filter(|o| !o.reduce_only).collect();
    assert_eq!(entries.len(), 1);

    let statuses: Vec<SignalStatus> = store.signals().await.iter().map(|s| s.status).collect();
    assert_eq!(statuses, vec![SignalStatus::Executed, SignalStatus::Executed, SignalStatus::Skipped]);
}

#[tokio::test]
async fn test_duplicate_candle_with_single_quota() {
    let store = funded_store(7, 1, 0).await;
    let exchange = MockExchange::with_balance(1000, 100);
    let executor = executor(store.clone(), &exchange);
    let bot = bot(1, 7, MarketType::Spot);
    let signal = buy_signal();

    executor.execute_entry(&bot, context(&signal)).await.unwrap();
    assert_eq!(store.quota(7).await.unwrap().free_trades, 0);

    // The last unit went to the first entry; the repeat is still a duplicate, not a quota miss
    let err = executor.execute_entry(&bot, context(&signal)).await.unwrap_err();
    assert!(matches!(err, ExecutionError::DuplicateCandle { candle_open_time: CANDLE, .. }));

    let trades = store.trades().await;
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].status, TradeStatus::Open);
    assert_eq!(store.quota(7).await.unwrap().free_trades, 0);
}

#[tokio::test]
async fn test_order_failure_refunds_exact_unit() {
    let store = funded_store(7, 0, 3).await;
    let exchange = MockExchange::with_balance(1000, 100);
    exchange.update(|state| state.reject_market_orders = true);
    let executor = executor(store.clone(), &exchange);
    let bot = bot(1, 7, MarketType::Spot);
    let signal = buy_signal();

    let err = executor.execute_entry(&bot, context(&signal)).await.unwrap_err();
    assert!(matches!(err, ExecutionError::Exchange(ExchangeError::Rejected { code: -2010, .. })));

    let quota = store.quota(7).await.unwrap();
    assert_eq!((quota.free_trades, quota.coin_balance), (0, 3));

    let trades = store.trades().await;
    assert_eq!(trades[0].status, TradeStatus::Failed);
    assert!(!trades[0].quota_consumed);
    assert!(trades[0].error_message.as_deref().unwrap().contains("insufficient balance"));
    assert_eq!(store.signals().await[0].status, SignalStatus::Failed);

    // The second failure on the candle reaches the cap
    executor.execute_entry(&bot, context(&signal)).await.unwrap_err();
    let err = executor.execute_entry(&bot, context(&signal)).await.unwrap_err();
    assert!(matches!(err, ExecutionError::TooManyFailedAttempts { attempts: 2, .. }));
    assert_eq!(store.quota(7).await.unwrap().coin_balance, 3);
}

#[tokio::test]
async fn test_insufficient_balance_fails_and_refunds() {
    let store = funded_store(7, 1, 0).await;
    let exchange = MockExchange::with_balance(5, 100);
    let executor = executor(store.clone(), &exchange);
    let bot = bot(1, 7, MarketType::Spot);
    let signal = buy_signal();

    let err = executor.execute_entry(&bot, context(&signal)).await.unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::Exchange(ExchangeError::InsufficientBalance { .. })
    ));
    assert!(exchange.orders().is_empty());
    assert_eq!(store.quota(7).await.unwrap().free_trades, 1);
    assert_eq!(store.trades().await[0].status, TradeStatus::Failed);
}

#[tokio::test]
async fn test_no_credentials_records_failed_trade_without_quota() {
    let store = std::sync::Arc::new(bot::services::store::MemoryStore::new());
    store
        .set_quota(7, QuotaBalance { free_trades: 1, coin_balance: 0, auto_trading_enabled: true })
        .await;
    let exchange = MockExchange::with_balance(1000, 100);
    let executor = executor(store.clone(), &exchange);
    let signal = buy_signal();

    let err = executor
        .execute_entry(&bot(1, 7, MarketType::Spot), context(&signal))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::NoCredentials));

    let trades = store.trades().await;
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].status, TradeStatus::Failed);
    assert_eq!(trades[0].error_message.as_deref(), Some("no credentials"));
    assert_eq!(trades[0].quota_unit, None);
    assert_eq!(store.quota(7).await.unwrap().free_trades, 1);
    assert!(exchange.orders().is_empty());
}

#[tokio::test]
async fn test_quota_gates() {
    let store = funded_store(7, 0, 0).await;
    let exchange = MockExchange::with_balance(1000, 100);
    let executor = executor(store.clone(), &exchange);
    let bot = bot(1, 7, MarketType::Spot);
    let signal = buy_signal();

    let err = executor.execute_entry(&bot, context(&signal)).await.unwrap_err();
    assert!(matches!(err, ExecutionError::QuotaExhausted(7)));

    store
        .set_quota(7, QuotaBalance { free_trades: 3, coin_balance: 0, auto_trading_enabled: false })
        .await;
    let err = executor.execute_entry(&bot, context(&signal)).await.unwrap_err();
    assert!(matches!(err, ExecutionError::AutoTradingDisabled(7)));
    assert!(store.trades().await.is_empty());
}

#[tokio::test]
async fn test_short_on_spot_is_rejected_before_quota() {
    let store = funded_store(7, 1, 0).await;
    let exchange = MockExchange::with_balance(1000, 100);
    let executor = executor(store.clone(), &exchange);
    let signal = TradeSignal::sell(100.0, "Entry conditions met".to_string());

    let err = executor
        .execute_entry(&bot(1, 7, MarketType::Spot), context(&signal))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::ShortOnSpot));
    assert_eq!(store.quota(7).await.unwrap().free_trades, 1);
}

#[tokio::test]
async fn test_futures_short_sets_leverage_and_falls_back_on_filters() {
    let store = funded_store(7, 1, 0).await;
    let exchange = MockExchange::with_balance(500, 100);
    exchange.update(|state| state.fail_filters = true);
    let executor = executor(store.clone(), &exchange);
    let signal = TradeSignal::sell(100.0, "Entry conditions met".to_string())
        .with_stop_loss(Some(102.0))
        .with_take_profit(Some(96.0));

    let outcome = executor
        .execute_entry(&bot(1, 7, MarketType::LinearFutures), context(&signal))
        .await
        .unwrap();

    // 10% of 500 at 5x leverage
    assert!(matches!(outcome, ExecutionOutcome::Opened { side: TradeSide::Sell, .. }));
    assert_eq!(exchange.orders()[0].quantity, dec("2.5"));
    assert_eq!(exchange.state.lock().unwrap().leverage, Some(5));
}

#[tokio::test]
async fn test_protective_failure_keeps_position_open() {
    let store = funded_store(7, 1, 0).await;
    let exchange = MockExchange::with_balance(1000, 100);
    exchange.update(|state| state.reject_protective_orders = true);
    let executor = executor(store.clone(), &exchange);
    let signal = buy_signal();

    let outcome = executor
        .execute_entry(&bot(1, 7, MarketType::Spot), context(&signal))
        .await
        .unwrap();
    match outcome {
        ExecutionOutcome::Opened { protective_failures, .. } => assert_eq!(protective_failures.len(), 2),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(store.trades().await[0].status, TradeStatus::Open);
    assert_eq!(store.quota(7).await.unwrap().free_trades, 0);
}

#[tokio::test]
async fn test_zero_position_closes_in_database_only() {
    let store = funded_store(7, 1, 0).await;
    store.add_trade(open_trade(11, 7, 1, "0.5")).await;
    let exchange = MockExchange::with_balance(1000, 100);
    let executor = executor(store.clone(), &exchange);
    let close = TradeSignal::close(103.0, "Exit conditions met".to_string());

    let outcome = executor
        .execute_exit(&bot(1, 7, MarketType::Spot), 11, context(&close))
        .await
        .unwrap();
    match outcome {
        ExecutionOutcome::Closed { exchange_closed, exit_price, note, .. } => {
            assert!(!exchange_closed);
            assert_eq!(exit_price, Some(dec("103")));
            assert!(note.unwrap().contains("no exchange position"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    assert!(exchange.orders().is_empty());
    let trade = store.trade(11).await.unwrap().unwrap();
    assert_eq!(trade.status, TradeStatus::Closed);
}

#[tokio::test]
async fn test_close_rounds_down_to_holdings() {
    let store = funded_store(7, 1, 0).await;
    store.add_trade(open_trade(11, 7, 1, "0.5")).await;
    let exchange = MockExchange::with_balance(1000, 105);
    exchange.update(|state| state.position = dec("0.4996"));
    let executor = executor(store.clone(), &exchange);
    let close = TradeSignal::close(104.0, "Exit conditions met".to_string());

    let outcome = executor
        .execute_exit(&bot(1, 7, MarketType::Spot), 11, context(&close))
        .await
        .unwrap();
    assert!(matches!(outcome, ExecutionOutcome::Closed { exchange_closed: true, .. }));

    let orders = exchange.orders();
    assert_eq!(
        orders,
        vec![PlacedOrder { side: TradeSide::Sell, quantity: dec("0.499"), reduce_only: true }]
    );
    assert_eq!(exchange.state.lock().unwrap().cancels, 1);
    assert_eq!(store.trade(11).await.unwrap().unwrap().exit_price, Some(dec("105")));
}

#[tokio::test]
async fn test_exchange_close_failure_still_closes_locally() {
    let store = funded_store(7, 1, 0).await;
    store.add_trade(open_trade(11, 7, 1, "0.5")).await;
    let exchange = MockExchange::with_balance(1000, 100);
    exchange.update(|state| {
        state.position = dec("0.5");
        state.reject_market_orders = true;
    });
    let executor = executor(store.clone(), &exchange);
    let close = TradeSignal::close(99.0, "Exit conditions met".to_string());

    let outcome = executor
        .execute_exit(&bot(1, 7, MarketType::Spot), 11, context(&close))
        .await
        .unwrap();
    match outcome {
        ExecutionOutcome::Closed { exchange_closed, note, .. } => {
            assert!(!exchange_closed);
            assert!(note.unwrap().starts_with("exchange close failed"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(store.trade(11).await.unwrap().unwrap().status, TradeStatus::Closed);
}

#[tokio::test]
async fn test_credential_lookup_failure_still_closes_locally() {
    let memory = funded_store(7, 1, 0).await;
    memory.add_trade(open_trade(11, 7, 1, "0.5")).await;
    let exchange = MockExchange::with_balance(1000, 100);
    let executor = TradeExecutor::new(
        Arc::new(CredentialOutage { inner: memory.clone() }),
        Arc::new(exchange.clone()),
        InstanceLocks::new(),
        ExecutionConfig::default(),
    );
    let close = TradeSignal::close(99.0, "Exit conditions met".to_string());

    let outcome = executor
        .execute_exit(&bot(1, 7, MarketType::Spot), 11, context(&close))
        .await
        .unwrap();
    match outcome {
        ExecutionOutcome::Closed { exchange_closed, exit_price, note, .. } => {
            assert!(!exchange_closed);
            assert_eq!(exit_price, Some(dec("99")));
            assert!(note.unwrap().contains("credential lookup failed"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(memory.trade(11).await.unwrap().unwrap().status, TradeStatus::Closed);
    assert!(exchange.orders().is_empty());
}

#[tokio::test]
async fn test_close_all_closes_open_and_cancels_pending() {
    let store = funded_store(7, 0, 0).await;
    store.add_trade(open_trade(11, 7, 1, "0.5")).await;
    let mut pending = open_trade(12, 7, 2, "0");
    pending.status = TradeStatus::Pending;
    pending.quantity = None;
    pending.quota_consumed = false;
    store.add_trade(pending).await;
    let mut other_user = open_trade(13, 8, 3, "1");
    other_user.symbol = "ETHUSDT".to_string();
    store.add_trade(other_user).await;

    let exchange = MockExchange::with_balance(1000, 100);
    exchange.update(|state| state.position = dec("0.5"));
    let executor = executor(store.clone(), &exchange);

    let results = executor.close_all(7).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(matches!(
        results[0].outcome,
        Some(ExecutionOutcome::Closed { trade_id: 11, exchange_closed: true, .. })
    ));
    assert!(matches!(
        results[1].outcome,
        Some(ExecutionOutcome::Cancelled { trade_id: 12, refunded: true })
    ));

    assert_eq!(store.quota(7).await.unwrap().free_trades, 1);
    assert_eq!(store.trade(12).await.unwrap().unwrap().status, TradeStatus::Failed);
    assert_eq!(store.trade(13).await.unwrap().unwrap().status, TradeStatus::Open);
}
