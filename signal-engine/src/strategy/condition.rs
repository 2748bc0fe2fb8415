//! Condition tree of a parsed strategy

use crate::data::PriceField;
use crate::indicators::{Indicator, DEFAULT_ATR_PERIOD};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operand of a condition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorRef {
    /// A computed indicator line
    Indicator(Indicator),
    /// A literal number
    Value(f64),
    /// A raw candle field
    Price(PriceField),
}

impl IndicatorRef {
    pub fn close() -> Self {
        IndicatorRef::Price(PriceField::Close)
    }

    pub fn indicator(&self) -> Option<Indicator> {
        match self {
            IndicatorRef::Indicator(indicator) => Some(*indicator),
            _ => None,
        }
    }
}

impl From<Indicator> for IndicatorRef {
    fn from(indicator: Indicator) -> Self {
        IndicatorRef::Indicator(indicator)
    }
}

impl fmt::Display for IndicatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorRef::Indicator(indicator) => write!(f, "{}", indicator),
            IndicatorRef::Value(value) => write!(f, "{}", value),
            IndicatorRef::Price(field) => f.write_str(field.as_str()),
        }
    }
}

/// Comparison performed by a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Crossover,
    Crossunder,
    Above,
    Below,
    Equals,
    DirectionChangeUp,
    DirectionChangeDown,
}

impl ConditionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionKind::Crossover => "crossover",
            ConditionKind::Crossunder => "crossunder",
            ConditionKind::Above => "above",
            ConditionKind::Below => "below",
            ConditionKind::Equals => "equals",
            ConditionKind::DirectionChangeUp => "direction_change_up",
            ConditionKind::DirectionChangeDown => "direction_change_down",
        }
    }

    /// Whether the comparison also reads the previous candle
    pub fn needs_history(&self) -> bool {
        !matches!(self, ConditionKind::Above | ConditionKind::Below | ConditionKind::Equals)
    }
}

/// How a condition combines with the result of the conditions before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Logic {
    #[default]
    And,
    Or,
}

/// A single comparison between two operands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub kind: ConditionKind,
    pub left: IndicatorRef,
    pub right: IndicatorRef,
    pub logic: Logic,
}

impl Condition {
    pub fn new(kind: ConditionKind, left: impl Into<IndicatorRef>, right: impl Into<IndicatorRef>) -> Self {
        Self {
            kind,
            left: left.into(),
            right: right.into(),
            logic: Logic::And,
        }
    }

    pub fn crossover(left: impl Into<IndicatorRef>, right: impl Into<IndicatorRef>) -> Self {
        Self::new(ConditionKind::Crossover, left, right)
    }

    pub fn crossunder(left: impl Into<IndicatorRef>, right: impl Into<IndicatorRef>) -> Self {
        Self::new(ConditionKind::Crossunder, left, right)
    }

    pub fn above(left: impl Into<IndicatorRef>, right: impl Into<IndicatorRef>) -> Self {
        Self::new(ConditionKind::Above, left, right)
    }

    pub fn below(left: impl Into<IndicatorRef>, right: impl Into<IndicatorRef>) -> Self {
        Self::new(ConditionKind::Below, left, right)
    }

    /// Direction series turning from bearish (-1) to bullish (+1)
    pub fn direction_change_up(series: Indicator) -> Self {
        Self::new(ConditionKind::DirectionChangeUp, series, IndicatorRef::Value(1.0))
    }

    /// Direction series turning from bullish (+1) to bearish (-1)
    pub fn direction_change_down(series: Indicator) -> Self {
        Self::new(ConditionKind::DirectionChangeDown, series, IndicatorRef::Value(-1.0))
    }

    pub fn or(mut self) -> Self {
        self.logic = Logic::Or;
        self
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConditionKind::DirectionChangeUp | ConditionKind::DirectionChangeDown => {
                write!(f, "{} {}", self.left, self.kind.as_str())
            }
            _ => write!(f, "{} {} {}", self.left, self.kind.as_str(), self.right),
        }
    }
}

/// Render a condition list the way it is combined: left to right with each logic flag
pub fn describe_conditions(conditions: &[Condition]) -> String {
    let mut text = String::new();
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            text.push_str(match condition.logic {
                Logic::And => " AND ",
                Logic::Or => " OR ",
            });
        }
        text.push_str(&condition.to_string());
    }
    text
}

/// Directional bias of a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
    #[default]
    Both,
}

/// Units of a stop-loss distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopLossKind {
    /// Percent of the entry price
    Percent,
    /// Multiple of ATR
    Atr,
    /// Absolute price distance
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopLoss {
    pub kind: StopLossKind,
    pub value: f64,
}

/// Units of a take-profit distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeProfitKind {
    Percent,
    Atr,
    Fixed,
    /// Multiple of the stop-loss distance
    Rr,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfit {
    pub kind: TakeProfitKind,
    pub value: f64,
}

pub const DEFAULT_RISK_PERCENT: f64 = 1.0;

/// Structured form of a strategy script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedStrategy {
    pub entry_conditions: Vec<Condition>,
    pub exit_conditions: Vec<Condition>,
    pub direction: Direction,
    pub stop_loss: Option<StopLoss>,
    pub take_profit: Option<TakeProfit>,
    /// Informational only; sizing does not read it
    pub risk_percent: f64,
    /// Set when no entry condition could be derived and the default strategy was used
    pub used_fallback: bool,
}

impl Default for ParsedStrategy {
    fn default() -> Self {
        Self {
            entry_conditions: Vec::new(),
            exit_conditions: Vec::new(),
            direction: Direction::Both,
            stop_loss: None,
            take_profit: None,
            risk_percent: DEFAULT_RISK_PERCENT,
            used_fallback: false,
        }
    }
}

impl ParsedStrategy {
    /// Every indicator line the conditions and stop distances read
    pub fn required_indicators(&self) -> Vec<Indicator> {
        let mut required: Vec<Indicator> = Vec::new();
        let operands = self
            .entry_conditions
            .iter()
            .chain(self.exit_conditions.iter())
            .flat_map(|c| [c.left, c.right]);

        for indicator in operands.filter_map(|operand| operand.indicator()) {
            if !required.contains(&indicator) {
                required.push(indicator);
            }
        }

        let uses_atr = matches!(self.stop_loss, Some(StopLoss { kind: StopLossKind::Atr, .. }))
            || matches!(self.take_profit, Some(TakeProfit { kind: TakeProfitKind::Atr, .. }));
        let atr = Indicator::atr(DEFAULT_ATR_PERIOD);
        if uses_atr && !required.contains(&atr) {
            required.push(atr);
        }

        required
    }
}
