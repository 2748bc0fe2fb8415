pub mod evaluation;
pub mod exchange;
pub mod execution;
pub mod locks;
pub mod market_data;
pub mod scheduler;
pub mod sizing;
pub mod store;
pub mod strategy_cache;
