//! Signal evaluation: entry and exit scans over a short lookback window

use crate::data::Candle;
use crate::indicators::{Indicator, IndicatorSeries, DEFAULT_ATR_PERIOD};
use crate::strategy::{
    describe_conditions, Condition, ConditionKind, Direction, IndicatorRef, Logic,
    ParsedStrategy, StopLossKind, TakeProfitKind, TradeSignal,
};

/// Number of candles (latest included) scanned for a satisfied condition set
pub const LOOKBACK_CANDLES: usize = 5;

/// Tolerance of the `equals` comparison
pub const EQUALS_EPSILON: f64 = 1e-4;

fn resolve(operand: &IndicatorRef, indicators: &IndicatorSeries, candles: &[Candle], index: usize) -> Option<f64> {
    match operand {
        IndicatorRef::Value(value) => Some(*value),
        IndicatorRef::Price(field) => candles.get(index).map(|candle| candle.price(*field)),
        IndicatorRef::Indicator(indicator) => indicators.value_at(indicator, index),
    }
}

/// Evaluate one condition at candle `index`.
///
/// Returns `false` whenever an operand has no value there (warm-up, or `index - 1`
/// missing for history-based comparisons).
pub fn evaluate_condition(
    condition: &Condition,
    indicators: &IndicatorSeries,
    candles: &[Candle],
    index: usize,
) -> bool {
    let current = (
        resolve(&condition.left, indicators, candles, index),
        resolve(&condition.right, indicators, candles, index),
    );
    let (Some(cur1), Some(cur2)) = current else {
        return false;
    };

    if !condition.kind.needs_history() {
        return match condition.kind {
            ConditionKind::Above => cur1 > cur2,
            ConditionKind::Below => cur1 < cur2,
            _ => (cur1 - cur2).abs() < EQUALS_EPSILON,
        };
    }

    let Some(prev_index) = index.checked_sub(1) else {
        return false;
    };
    let previous = (
        resolve(&condition.left, indicators, candles, prev_index),
        resolve(&condition.right, indicators, candles, prev_index),
    );
    let (Some(prev1), Some(prev2)) = previous else {
        return false;
    };

    match condition.kind {
        ConditionKind::Crossover => prev1 <= prev2 && cur1 > cur2,
        ConditionKind::Crossunder => prev1 >= prev2 && cur1 < cur2,
        ConditionKind::DirectionChangeUp => prev1 < 0.0 && cur1 > 0.0,
        ConditionKind::DirectionChangeDown => prev1 > 0.0 && cur1 < 0.0,
        _ => false,
    }
}

/// Combine a condition list left to right using each condition's own logic flag.
/// An empty list is never satisfied.
pub fn evaluate_conditions(
    conditions: &[Condition],
    indicators: &IndicatorSeries,
    candles: &[Candle],
    index: usize,
) -> bool {
    let Some((first, rest)) = conditions.split_first() else {
        return false;
    };

    rest.iter().fold(
        evaluate_condition(first, indicators, candles, index),
        |satisfied, condition| match condition.logic {
            Logic::And => satisfied && evaluate_condition(condition, indicators, candles, index),
            Logic::Or => satisfied || evaluate_condition(condition, indicators, candles, index),
        },
    )
}

/// Most recent candle index, within the lookback window, at which the set is satisfied.
/// Returns how many candles before the latest one that was.
fn scan_lookback(conditions: &[Condition], indicators: &IndicatorSeries, candles: &[Candle]) -> Option<usize> {
    let last = candles.len().checked_sub(1)?;
    (0..LOOKBACK_CANDLES)
        .take_while(|&ago| ago <= last)
        .find(|&ago| evaluate_conditions(conditions, indicators, candles, last - ago))
}

fn signal_reason(prefix: &str, conditions: &[Condition], candles_ago: usize) -> String {
    let description = describe_conditions(conditions);
    match candles_ago {
        0 => format!("{}: {}", prefix, description),
        1 => format!("{}: {} (1 candle ago)", prefix, description),
        n => format!("{}: {} ({} candles ago)", prefix, description, n),
    }
}

/// Scan the entry conditions and produce a BUY/SELL signal or NONE.
///
/// Stop-loss and take-profit prices are computed from `current_price`, not from the
/// candle that satisfied the conditions: positions always open at market.
pub fn evaluate_strategy(
    strategy: &ParsedStrategy,
    candles: &[Candle],
    indicators: &IndicatorSeries,
    current_price: f64,
) -> TradeSignal {
    if strategy.entry_conditions.is_empty() {
        return TradeSignal::none(current_price, "Strategy has no entry conditions".to_string());
    }
    if candles.is_empty() {
        return TradeSignal::none(current_price, "No candles available".to_string());
    }

    let Some(candles_ago) = scan_lookback(&strategy.entry_conditions, indicators, candles) else {
        return TradeSignal::none(
            current_price,
            format!(
                "Entry conditions not met in last {} candles: {}",
                LOOKBACK_CANDLES,
                describe_conditions(&strategy.entry_conditions)
            ),
        );
    };

    let is_long = strategy.direction != Direction::Short;
    let reason = signal_reason("Entry conditions met", &strategy.entry_conditions, candles_ago);
    let signal = if is_long {
        TradeSignal::buy(current_price, reason)
    } else {
        TradeSignal::sell(current_price, reason)
    };

    let atr = indicators.latest(&Indicator::atr(DEFAULT_ATR_PERIOD));
    let stop_loss = stop_loss_price(strategy, current_price, atr, is_long);
    let take_profit = take_profit_price(strategy, current_price, atr, stop_loss, is_long);

    signal
        .with_stop_loss(stop_loss)
        .with_take_profit(take_profit)
        .with_candles_ago(candles_ago)
}

/// Scan the exit conditions of a strategy with an open position.
///
/// Strategies without exit conditions never produce CLOSE here; their positions are left
/// to the protective orders placed at entry.
pub fn evaluate_exit_conditions(
    strategy: &ParsedStrategy,
    candles: &[Candle],
    indicators: &IndicatorSeries,
    current_price: f64,
) -> TradeSignal {
    if strategy.exit_conditions.is_empty() {
        return TradeSignal::none(current_price, "Strategy has no exit conditions".to_string());
    }

    match scan_lookback(&strategy.exit_conditions, indicators, candles) {
        Some(candles_ago) => TradeSignal::close(
            current_price,
            signal_reason("Exit conditions met", &strategy.exit_conditions, candles_ago),
        )
        .with_candles_ago(candles_ago),
        None => TradeSignal::none(
            current_price,
            format!(
                "Exit conditions not met in last {} candles: {}",
                LOOKBACK_CANDLES,
                describe_conditions(&strategy.exit_conditions)
            ),
        ),
    }
}

fn offset_price(price: f64, distance: f64, towards_profit: bool, is_long: bool) -> f64 {
    if towards_profit == is_long {
        price + distance
    } else {
        price - distance
    }
}

fn stop_loss_price(strategy: &ParsedStrategy, price: f64, atr: Option<f64>, is_long: bool) -> Option<f64> {
    let stop = strategy.stop_loss?;
    let distance = match stop.kind {
        StopLossKind::Percent => price * stop.value / 100.0,
        StopLossKind::Atr => atr? * stop.value,
        StopLossKind::Fixed => stop.value,
    };
    Some(offset_price(price, distance, false, is_long))
}

fn take_profit_price(
    strategy: &ParsedStrategy,
    price: f64,
    atr: Option<f64>,
    stop_loss: Option<f64>,
    is_long: bool,
) -> Option<f64> {
    let target = strategy.take_profit?;
    let distance = match target.kind {
        TakeProfitKind::Percent => price * target.value / 100.0,
        TakeProfitKind::Atr => atr? * target.value,
        TakeProfitKind::Fixed => target.value,
        TakeProfitKind::Rr => (price - stop_loss?).abs() * target.value,
    };
    Some(offset_price(price, distance, true, is_long))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{StopLoss, TakeProfit};

    fn flat_candles(count: usize, price: f64) -> Vec<Candle> {
        (0..count)
            .map(|i| Candle::new(i as i64, i as i64 + 1, price, price, price, price, 1.0))
            .collect()
    }

    #[test]
    fn test_no_crossover_on_equal_series() {
        let candles = flat_candles(30, 100.0);
        let indicators = IndicatorSeries::compute(&candles, &[Indicator::ema(9), Indicator::ema(21)]);
        let conditions = [
            Condition::crossover(Indicator::ema(9), Indicator::ema(21)),
            Condition::crossunder(IndicatorRef::close(), IndicatorRef::Value(100.0)),
        ];

        for condition in &conditions {
            for index in 0..candles.len() {
                assert!(!evaluate_condition(condition, &indicators, &candles, index));
            }
        }
    }

    #[test]
    fn test_unavailable_operand_is_false() {
        let candles = flat_candles(10, 100.0);
        let indicators = IndicatorSeries::compute(&candles, &[Indicator::rsi(14)]);
        let condition = Condition::below(Indicator::rsi(14), IndicatorRef::Value(101.0));
        assert!(!evaluate_condition(&condition, &indicators, &candles, 9));
    }

    #[test]
    fn test_equals_uses_epsilon() {
        let candles = flat_candles(3, 100.00005);
        let indicators = IndicatorSeries::default();
        let condition = Condition::new(ConditionKind::Equals, IndicatorRef::close(), IndicatorRef::Value(100.0));
        assert!(evaluate_condition(&condition, &indicators, &candles, 2));
    }

    #[test]
    fn test_logic_flags_fold_left_to_right() {
        let candles = flat_candles(3, 100.0);
        let indicators = IndicatorSeries::default();
        let yes = Condition::above(IndicatorRef::close(), IndicatorRef::Value(50.0));
        let no = Condition::below(IndicatorRef::close(), IndicatorRef::Value(50.0));

        assert!(!evaluate_conditions(&[yes.clone(), no.clone()], &indicators, &candles, 2));
        assert!(evaluate_conditions(&[no.clone(), yes.clone().or()], &indicators, &candles, 2));
        // (no OR yes) AND no
        assert!(!evaluate_conditions(&[no.clone(), yes.or(), no], &indicators, &candles, 2));
        assert!(!evaluate_conditions(&[], &indicators, &candles, 2));
    }

    #[test]
    fn test_short_strategy_sells_with_inverted_stops() {
        let candles = flat_candles(3, 100.0);
        let indicators = IndicatorSeries::default();
        let strategy = ParsedStrategy {
            entry_conditions: vec![Condition::above(IndicatorRef::close(), IndicatorRef::Value(50.0))],
            direction: Direction::Short,
            stop_loss: Some(StopLoss { kind: StopLossKind::Percent, value: 2.0 }),
            take_profit: Some(TakeProfit { kind: TakeProfitKind::Rr, value: 2.0 }),
            ..Default::default()
        };

        let signal = evaluate_strategy(&strategy, &candles, &indicators, 200.0);
        assert_eq!(signal.action, crate::strategy::SignalAction::Sell);
        assert!((signal.stop_loss.unwrap() - 204.0).abs() < 1e-9);
        assert!((signal.take_profit.unwrap() - 192.0).abs() < 1e-9);
        assert_eq!(signal.candles_ago, Some(0));
    }

    #[test]
    fn test_exit_without_conditions_never_closes() {
        let candles = flat_candles(3, 100.0);
        let strategy = ParsedStrategy::default();
        let signal = evaluate_exit_conditions(&strategy, &candles, &IndicatorSeries::default(), 100.0);
        assert!(!signal.is_actionable());
    }
}
