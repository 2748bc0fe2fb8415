use crate::services::exchange::BinanceConnector;
use crate::services::execution::TradeExecutor;
use crate::services::locks::InstanceLocks;
use crate::services::market_data::{BinanceMarketData, MarketData};
use crate::services::scheduler::Scheduler;
use crate::services::store::{SeaStore, Store};
use crate::services::strategy_cache::StrategyCache;
use sea_orm::DatabaseConnection;
use shared::{get_db_connection, get_redis_client, Config, RunLock};
use signal_engine::strategy::StrategyParser;
use std::sync::Arc;

const RUN_LOCK_KEY: &str = "scripttrader:scheduler:run";

/// Everything the scheduler binary and the HTTP API share
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<DatabaseConnection>,
    pub store: Arc<dyn Store>,
    pub market: Arc<dyn MarketData>,
    pub cache: Arc<StrategyCache>,
    pub executor: Arc<TradeExecutor>,
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    pub async fn new() -> Result<Self, anyhow::Error> {
        let config = Config::from_env()?;
        let db = Arc::new(get_db_connection(&config.database_url).await?);
        tracing::info!("Connected to database successfully");

        let store: Arc<dyn Store> = Arc::new(SeaStore::new(db.clone()));
        let market: Arc<dyn MarketData> = Arc::new(BinanceMarketData::from_config(&config)?);
        let connector = Arc::new(BinanceConnector::from_config(&config)?);
        let cache = Arc::new(StrategyCache::new(StrategyParser::new(config.parse_failure_policy)));

        let executor = Arc::new(TradeExecutor::new(
            store.clone(),
            connector,
            InstanceLocks::new(),
            config.execution.clone(),
        ));

        let mut scheduler = Scheduler::new(
            store.clone(),
            market.clone(),
            executor.clone(),
            cache.clone(),
            config.candle_limit,
            config.max_concurrent_groups,
        );
        if let Some(redis_url) = &config.redis_url {
            let client = get_redis_client(redis_url)?;
            // Outlives a normal run, expires if the holder dies
            let ttl_ms = config.run_interval_secs.max(30) * 2 * 1000;
            scheduler = scheduler.with_run_lock(RunLock::new(client, RUN_LOCK_KEY, ttl_ms));
            tracing::info!("Redis run lock enabled");
        }

        Ok(AppState {
            config: Arc::new(config),
            db,
            store,
            market,
            cache,
            executor,
            scheduler: Arc::new(scheduler),
        })
    }
}
