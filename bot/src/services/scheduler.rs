//! Run scheduler
//!
//! One run collects the active bots, layers the users' overrides, groups the instances by
//! (symbol, timeframe, market) and evaluates each group against a single market snapshot.
//! Groups run concurrently; members of a group run one after another.

use crate::error::ExecutionError;
use crate::services::evaluation::MarketSnapshot;
use crate::services::execution::{
    current_candle_open_time, ExecutionOutcome, SignalContext, TradeExecutor,
};
use crate::services::market_data::MarketData;
use crate::services::store::{apply_overrides, Store};
use crate::services::strategy_cache::StrategyCache;
use anyhow::Result;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use shared::{BotDefinition, MarketType, RunLock, TradeStatus};
use signal_engine::data::Timeframe;
use signal_engine::indicators::Indicator;
use signal_engine::strategy::{ParsedStrategy, SignalAction, TradeSignal};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Per-instance result of a run
#[derive(Debug, Clone, Serialize)]
pub struct InstanceResult {
    pub bot_id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub market_type: MarketType,
    pub signal: Option<TradeSignal>,
    pub outcome: Option<ExecutionOutcome>,
    /// An order was placed or a trade changed state
    pub executed: bool,
    pub error: Option<String>,
}

impl InstanceResult {
    fn new(bot: &BotDefinition) -> Self {
        Self {
            bot_id: bot.id,
            user_id: bot.user_id,
            symbol: bot.symbol.clone(),
            timeframe: bot.timeframe,
            market_type: bot.market_type,
            signal: None,
            outcome: None,
            executed: false,
            error: None,
        }
    }

    fn failed(bot: &BotDefinition, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(bot)
        }
    }

    fn with_execution(mut self, result: Result<ExecutionOutcome, ExecutionError>) -> Self {
        match result {
            Ok(outcome) => {
                self.executed = !matches!(outcome, ExecutionOutcome::Skipped { .. });
                self.outcome = Some(outcome);
            }
            Err(e) if e.is_skip() => {
                self.outcome = Some(ExecutionOutcome::Skipped {
                    reason: e.to_string(),
                });
            }
            Err(e) => self.error = Some(e.to_string()),
        }
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub groups: usize,
    pub results: Vec<InstanceResult>,
    /// Another process held the run lock, nothing was evaluated
    pub skipped_by_lock: bool,
}

impl RunReport {
    pub fn executed(&self) -> usize {
        self.results.iter().filter(|r| r.executed).count()
    }

    pub fn errors(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_some()).count()
    }
}

type GroupKey = (String, Timeframe, MarketType);

/// Buckets instances by the market snapshot they need, keeping first-seen order
fn group_instances(bots: Vec<BotDefinition>) -> Vec<(GroupKey, Vec<BotDefinition>)> {
    let mut groups: Vec<(GroupKey, Vec<BotDefinition>)> = Vec::new();
    for bot in bots {
        let key = (bot.symbol.clone(), bot.timeframe, bot.market_type);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(bot),
            None => groups.push((key, vec![bot])),
        }
    }
    groups
}

pub struct Scheduler {
    store: Arc<dyn Store>,
    market: Arc<dyn MarketData>,
    executor: Arc<TradeExecutor>,
    cache: Arc<StrategyCache>,
    run_lock: Option<RunLock>,
    candle_limit: usize,
    max_concurrent_groups: usize,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn Store>,
        market: Arc<dyn MarketData>,
        executor: Arc<TradeExecutor>,
        cache: Arc<StrategyCache>,
        candle_limit: usize,
        max_concurrent_groups: usize,
    ) -> Self {
        Self {
            store,
            market,
            executor,
            cache,
            run_lock: None,
            candle_limit,
            max_concurrent_groups: max_concurrent_groups.max(1),
        }
    }

    pub fn with_run_lock(mut self, run_lock: RunLock) -> Self {
        self.run_lock = Some(run_lock);
        self
    }

    /// One full evaluation and execution pass over every active instance
    pub async fn run_once(&self) -> Result<RunReport> {
        let guard = match &self.run_lock {
            Some(lock) => match lock.try_acquire().await {
                Ok(Some(guard)) => Some(guard),
                Ok(None) => {
                    info!("⏭️ Another scheduler holds the run lock, skipping this run");
                    return Ok(RunReport {
                        skipped_by_lock: true,
                        ..Default::default()
                    });
                }
                Err(e) => {
                    warn!("⚠️ Run lock unavailable, running without it: {}", e);
                    None
                }
            },
            None => None,
        };

        let report = self.run_batch().await;

        if let (Some(lock), Some(guard)) = (&self.run_lock, guard) {
            if let Err(e) = lock.release(guard).await {
                warn!("⚠️ Could not release run lock: {}", e);
            }
        }
        report
    }

    async fn run_batch(&self) -> Result<RunReport> {
        let bots = self.store.active_bots().await?;
        let rules = self.store.settings_overrides().await?;
        let bots: Vec<BotDefinition> = bots
            .into_iter()
            .map(|bot| apply_overrides(bot, &rules))
            .collect();

        let groups = group_instances(bots);
        let group_count = groups.len();
        info!("🔄 Running {} groups", group_count);

        let results: Vec<Vec<InstanceResult>> = stream::iter(groups)
            .map(|(key, members)| self.run_group(key, members))
            .buffer_unordered(self.max_concurrent_groups)
            .collect()
            .await;

        Ok(RunReport {
            groups: group_count,
            results: results.into_iter().flatten().collect(),
            skipped_by_lock: false,
        })
    }

    async fn run_group(&self, key: GroupKey, members: Vec<BotDefinition>) -> Vec<InstanceResult> {
        let (symbol, timeframe, market_type) = key;
        let mut results = Vec::with_capacity(members.len());

        let mut parsed: Vec<(BotDefinition, Arc<ParsedStrategy>)> = Vec::with_capacity(members.len());
        for bot in members {
            match self.cache.get_or_parse(&bot.script_content) {
                Ok(strategy) => parsed.push((bot, strategy)),
                Err(e) => {
                    warn!("⚠️ [User {}] Bot {} script rejected: {}", bot.user_id, bot.id, e);
                    results.push(InstanceResult::failed(&bot, format!("strategy rejected: {}", e)));
                }
            }
        }
        if parsed.is_empty() {
            return results;
        }

        let mut required: Vec<Indicator> = Vec::new();
        for indicator in parsed.iter().flat_map(|(_, s)| s.required_indicators()) {
            if !required.contains(&indicator) {
                required.push(indicator);
            }
        }

        let snapshot = match MarketSnapshot::load(
            self.market.as_ref(),
            &symbol,
            timeframe,
            market_type,
            self.candle_limit,
            &required,
        )
        .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("❌ Market data for {} {} unavailable: {:#}", symbol, timeframe, e);
                results.extend(parsed.iter().map(|(bot, _)| {
                    InstanceResult::failed(bot, format!("market data unavailable: {:#}", e))
                }));
                return results;
            }
        };
        let indicator_values = snapshot.indicator_values();

        // Members share the snapshot; a failing member never stops the others
        for (bot, strategy) in &parsed {
            results.push(self.run_instance(bot, strategy, &snapshot, &indicator_values).await);
        }
        results
    }

    async fn run_instance(
        &self,
        bot: &BotDefinition,
        strategy: &ParsedStrategy,
        snapshot: &MarketSnapshot,
        indicator_values: &serde_json::Value,
    ) -> InstanceResult {
        let result = InstanceResult::new(bot);
        let active = match self.store.active_trade(bot.user_id, bot.id, &bot.symbol).await {
            Ok(active) => active,
            Err(e) => return InstanceResult::failed(bot, format!("trade lookup failed: {}", e)),
        };
        let candle_open_time = current_candle_open_time(bot);

        match active {
            Some(trade) if trade.status == TradeStatus::Pending => InstanceResult {
                outcome: Some(ExecutionOutcome::Skipped {
                    reason: format!("trade {} is still pending", trade.id),
                }),
                ..result
            },
            Some(trade) => {
                let signal = snapshot.exit_signal(strategy);
                if signal.action != SignalAction::Close {
                    return InstanceResult {
                        outcome: Some(ExecutionOutcome::Skipped {
                            reason: format!("position open, {}", signal.reason),
                        }),
                        signal: Some(signal),
                        ..result
                    };
                }

                let context = SignalContext {
                    signal: &signal,
                    candle_open_time,
                    indicator_values: Some(indicator_values),
                };
                let execution = self.executor.execute_exit(bot, trade.id, context).await;
                InstanceResult {
                    signal: Some(signal),
                    ..result
                }
                .with_execution(execution)
            }
            None => {
                let signal = snapshot.entry_signal(strategy);
                if !signal.is_actionable() {
                    return InstanceResult {
                        signal: Some(signal),
                        ..result
                    };
                }

                let context = SignalContext {
                    signal: &signal,
                    candle_open_time,
                    indicator_values: Some(indicator_values),
                };
                let execution = self.executor.execute_entry(bot, context).await;
                InstanceResult {
                    signal: Some(signal),
                    ..result
                }
                .with_execution(execution)
            }
        }
    }

    /// Runs until `shutdown` resolves
    pub async fn run_loop(&self, interval: Duration, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("🛑 Scheduler stopping");
                    break;
                }
                _ = ticker.tick() => match self.run_once().await {
                    Ok(report) if report.skipped_by_lock => {}
                    Ok(report) => info!(
                        "✅ Run finished: {} groups, {} instances, {} executed, {} errors",
                        report.groups,
                        report.results.len(),
                        report.executed(),
                        report.errors()
                    ),
                    Err(e) => error!("❌ Run failed: {:#}", e),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot(id: i64, symbol: &str, timeframe: Timeframe, market_type: MarketType) -> BotDefinition {
        BotDefinition {
            id,
            user_id: id * 10,
            script_id: 1,
            name: format!("bot-{}", id),
            symbol: symbol.to_string(),
            timeframe,
            market_type,
            leverage: 1,
            script_content: String::new(),
        }
    }

    #[test]
    fn test_group_instances_by_snapshot() {
        let groups = group_instances(vec![
            bot(1, "BTCUSDT", Timeframe::H1, MarketType::Spot),
            bot(2, "ETHUSDT", Timeframe::H1, MarketType::Spot),
            bot(3, "BTCUSDT", Timeframe::H1, MarketType::Spot),
            bot(4, "BTCUSDT", Timeframe::H4, MarketType::Spot),
            bot(5, "BTCUSDT", Timeframe::H1, MarketType::LinearFutures),
        ]);

        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0].0, ("BTCUSDT".to_string(), Timeframe::H1, MarketType::Spot));
        let ids: Vec<i64> = groups[0].1.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
