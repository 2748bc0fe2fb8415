//! HTTP surface over the evaluation, run and close-all operations

pub mod error;
pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use bot::services::execution::TradeExecutor;
use bot::services::market_data::MarketData;
use bot::services::scheduler::Scheduler;
use bot::services::strategy_cache::StrategyCache;
use bot::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// The parts of [`AppState`] the handlers use
#[derive(Clone)]
pub struct ApiState {
    pub market: Arc<dyn MarketData>,
    pub cache: Arc<StrategyCache>,
    pub executor: Arc<TradeExecutor>,
    pub scheduler: Arc<Scheduler>,
    pub candle_limit: usize,
}

impl From<&AppState> for ApiState {
    fn from(state: &AppState) -> Self {
        Self {
            market: state.market.clone(),
            cache: state.cache.clone(),
            executor: state.executor.clone(),
            scheduler: state.scheduler.clone(),
            candle_limit: state.config.candle_limit,
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/strategies/evaluate", post(handlers::evaluate))
        .route("/api/bots/run", post(handlers::run_once))
        .route("/api/users/:user_id/close-all", post(handlers::close_all))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
