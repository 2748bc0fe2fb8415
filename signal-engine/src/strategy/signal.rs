//! Trade signals produced by the evaluator

use serde::{Deserialize, Serialize};
use std::fmt;

/// Signal action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    /// Open a long position
    Buy,
    /// Open a short position
    Sell,
    /// Close the open position
    Close,
    /// No action
    None,
}

impl SignalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
            SignalAction::Close => "CLOSE",
            SignalAction::None => "NONE",
        }
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trading signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    /// Signal action
    pub action: SignalAction,
    /// Reference price (the live price at evaluation time)
    pub price: f64,
    /// Stop loss price
    pub stop_loss: Option<f64>,
    /// Take profit price
    pub take_profit: Option<f64>,
    /// Reason for signal
    pub reason: String,
    /// How many candles before the latest one the conditions were satisfied
    pub candles_ago: Option<usize>,
}

impl TradeSignal {
    /// Create buy signal
    pub fn buy(price: f64, reason: String) -> Self {
        Self::new(SignalAction::Buy, price, reason)
    }

    /// Create sell signal
    pub fn sell(price: f64, reason: String) -> Self {
        Self::new(SignalAction::Sell, price, reason)
    }

    /// Create close signal
    pub fn close(price: f64, reason: String) -> Self {
        Self::new(SignalAction::Close, price, reason)
    }

    /// Create no-action signal
    pub fn none(price: f64, reason: String) -> Self {
        Self::new(SignalAction::None, price, reason)
    }

    fn new(action: SignalAction, price: f64, reason: String) -> Self {
        Self {
            action,
            price,
            stop_loss: None,
            take_profit: None,
            reason,
            candles_ago: None,
        }
    }

    /// Set stop loss
    pub fn with_stop_loss(mut self, stop_loss: Option<f64>) -> Self {
        self.stop_loss = stop_loss;
        self
    }

    /// Set take profit
    pub fn with_take_profit(mut self, take_profit: Option<f64>) -> Self {
        self.take_profit = take_profit;
        self
    }

    pub fn with_candles_ago(mut self, candles_ago: usize) -> Self {
        self.candles_ago = Some(candles_ago);
        self
    }

    /// Check if signal asks for an order
    pub fn is_actionable(&self) -> bool {
        self.action != SignalAction::None
    }
}
