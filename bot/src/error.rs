//! Error types of the execution layer

use rust_decimal::Decimal;
use thiserror::Error;

/// Failures talking to, or refused by, an exchange
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Exchange rejected request ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Exchange call failed: {0}")]
    CallFailed(String),

    #[error("Insufficient balance: {available} {asset} available, {required} {asset} required")]
    InsufficientBalance {
        asset: String,
        available: Decimal,
        required: Decimal,
    },

    #[error("Order below exchange minimum: {0}")]
    BelowMinimum(String),
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        ExchangeError::CallFailed(err.to_string())
    }
}

/// Reasons an entry or exit did not go through
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Auto-trading is disabled for user {0}")]
    AutoTradingDisabled(i64),

    #[error("Trade quota exhausted for user {0}")]
    QuotaExhausted(i64),

    #[error("A {status} trade already exists for candle {candle_open_time}")]
    DuplicateCandle { candle_open_time: i64, status: String },

    #[error("{attempts} failed attempts already on candle {candle_open_time}")]
    TooManyFailedAttempts { candle_open_time: i64, attempts: u32 },

    #[error("Spot market cannot open short positions")]
    ShortOnSpot,

    #[error("No exchange credentials configured")]
    NoCredentials,

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl ExecutionError {
    /// Refusals that happen before anything is attempted; audited as "skipped"
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            ExecutionError::AutoTradingDisabled(_)
                | ExecutionError::QuotaExhausted(_)
                | ExecutionError::DuplicateCandle { .. }
                | ExecutionError::TooManyFailedAttempts { .. }
                | ExecutionError::ShortOnSpot
        )
    }
}
