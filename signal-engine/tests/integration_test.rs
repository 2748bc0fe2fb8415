//! Integration tests for signal-engine: script -> indicators -> signal

use signal_engine::data::Candle;
use signal_engine::indicators::{Indicator, IndicatorSeries};
use signal_engine::strategy::*;

const HOUR_MS: i64 = 3_600_000;

/// 200 hourly candles: a steady decline until index 195, then flat at 200.
/// EMA(9) crosses above EMA(21) on index 197.
/// The cross has to land within the last `LOOKBACK_CANDLES` candles or the evaluator never sees it.
fn crossover_candles() -> Vec<Candle> {
    (0..200)
        .map(|i| {
            let price = if i <= 195 { 240.0 - i as f64 * 0.25 } else { 200.0 };
            let open_time = 1_704_067_200_000 + i as i64 * HOUR_MS;
            Candle::new(open_time, open_time + HOUR_MS - 1, price, price + 0.5, price - 0.5, price, 25.0)
        })
        .collect()
}

fn evaluate(script: &str, candles: &[Candle], price: f64) -> (ParsedStrategy, TradeSignal) {
    let strategy = StrategyParser::default().parse(script).unwrap();
    let indicators = IndicatorSeries::compute(candles, &strategy.required_indicators());
    let signal = evaluate_strategy(&strategy, candles, &indicators, price);
    (strategy, signal)
}

#[test]
fn test_ema_crossover_end_to_end() {
    let candles = crossover_candles();
    let (strategy, signal) = evaluate("ta.crossover(ta.ema(close, 9), ta.ema(close, 21))", &candles, 200.0);

    assert!(!strategy.used_fallback);
    assert_eq!(signal.action, SignalAction::Buy);
    assert!(signal.reason.contains("ema(9) crossover ema(21)"));
    assert_eq!(signal.candles_ago, Some(2));
    assert!((signal.stop_loss.unwrap() - 196.0).abs() < 1e-9);
    assert!((signal.take_profit.unwrap() - 208.0).abs() < 1e-9);
}

#[test]
fn test_fallback_strategy_trades_same_crossover() {
    let candles = crossover_candles();
    let (strategy, signal) = evaluate("my secret sauce", &candles, 200.0);

    assert!(strategy.used_fallback);
    assert_eq!(signal.action, SignalAction::Buy);
    assert!(signal.reason.contains("ema(9) crossover ema(21)"));
}

#[test]
fn test_crossover_outside_lookback_is_ignored() {
    let mut candles = crossover_candles();
    let last = *candles.last().unwrap();
    for i in 1..=LOOKBACK_CANDLES as i64 {
        let open_time = last.open_time + i * HOUR_MS;
        candles.push(Candle::new(open_time, open_time + HOUR_MS - 1, 200.0, 200.5, 199.5, 200.0, 25.0));
    }

    let (_, signal) = evaluate("ta.crossover(ta.ema(close, 9), ta.ema(close, 21))", &candles, 200.0);
    assert_eq!(signal.action, SignalAction::None);
    assert!(signal.stop_loss.is_none());
}

#[test]
fn test_exit_conditions_close_position() {
    let candles = crossover_candles();
    let strategy = StrategyParser::default()
        .parse("if ta.crossover(ta.ema(close, 9), ta.ema(close, 21))\n    strategy.entry(\"L\", strategy.long)\nexit when ema 9 crosses below ema 21")
        .unwrap();
    assert_eq!(strategy.exit_conditions.len(), 1);

    // The crossunder never happens in this data
    let indicators = IndicatorSeries::compute(&candles, &strategy.required_indicators());
    let signal = evaluate_exit_conditions(&strategy, &candles, &indicators, 200.0);
    assert_eq!(signal.action, SignalAction::None);

    // Reversed data turns the crossover into a crossunder
    let reversed: Vec<Candle> = candles
        .iter()
        .map(|c| {
            let price = 400.0 - c.close;
            Candle::new(c.open_time, c.close_time, price, price + 0.5, price - 0.5, price, c.volume)
        })
        .collect();
    let indicators = IndicatorSeries::compute(&reversed, &strategy.required_indicators());
    let signal = evaluate_exit_conditions(&strategy, &reversed, &indicators, 200.0);
    assert_eq!(signal.action, SignalAction::Close);
    assert!(signal.reason.contains("ema(9) crossunder ema(21)"));
}

#[test]
fn test_atr_stops_use_latest_atr() {
    let candles = crossover_candles();
    let strategy = ParsedStrategy {
        entry_conditions: vec![Condition::crossover(Indicator::ema(9), Indicator::ema(21))],
        stop_loss: Some(StopLoss { kind: StopLossKind::Atr, value: 1.5 }),
        take_profit: Some(TakeProfit { kind: TakeProfitKind::Atr, value: 3.0 }),
        ..Default::default()
    };
    let indicators = IndicatorSeries::compute(&candles, &strategy.required_indicators());
    let atr = indicators.latest(&Indicator::atr(14)).unwrap();

    let signal = evaluate_strategy(&strategy, &candles, &indicators, 200.0);
    assert_eq!(signal.action, SignalAction::Buy);
    assert!((signal.stop_loss.unwrap() - (200.0 - 1.5 * atr)).abs() < 1e-9);
    assert!((signal.take_profit.unwrap() - (200.0 + 3.0 * atr)).abs() < 1e-9);
}

#[test]
fn test_supertrend_direction_change_matches_series() {
    let mut prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
    prices.extend((0..40).map(|i| 160.0 - i as f64 * 3.0));
    prices.extend((0..40).map(|i| 40.0 + i as f64 * 4.0));
    let candles: Vec<Candle> = prices
        .iter()
        .enumerate()
        .map(|(i, &p)| Candle::new(i as i64 * HOUR_MS, (i as i64 + 1) * HOUR_MS - 1, p, p + 2.0, p - 2.0, p, 1.0))
        .collect();

    let strategy = StrategyParser::default().parse("ta.supertrend(3, 10)").unwrap();
    let indicators = IndicatorSeries::compute(&candles, &strategy.required_indicators());
    let direction = strategy.entry_conditions[0].left.indicator().unwrap();

    let mut flips_up = 0;
    for index in 1..candles.len() {
        let prev = indicators.value_at(&direction, index - 1);
        let cur = indicators.value_at(&direction, index);
        let expected = matches!((prev, cur), (Some(p), Some(c)) if p < 0.0 && c > 0.0);
        assert_eq!(
            evaluate_condition(&strategy.entry_conditions[0], &indicators, &candles, index),
            expected
        );
        if expected {
            flips_up += 1;
        }
    }
    assert_eq!(flips_up, 1);
}
