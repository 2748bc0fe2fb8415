//! Trading bot runtime: exchange gateway, stores, trade execution and the run scheduler

pub mod error;
pub mod services;
pub mod state;

pub use error::{ExchangeError, ExecutionError};
pub use state::AppState;
