//! Market snapshots and the stand-alone `evaluate` operation

use crate::services::market_data::MarketData;
use crate::services::strategy_cache::StrategyCache;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shared::{normalize_symbol, MarketType};
use signal_engine::data::{Candle, Timeframe};
use signal_engine::indicators::{Indicator, IndicatorSeries};
use signal_engine::strategy::{evaluate_exit_conditions, evaluate_strategy, ParsedStrategy, TradeSignal};
use std::collections::BTreeMap;
use tracing::debug;

/// Candles, live price and indicators of one (symbol, timeframe, market) group
pub struct MarketSnapshot {
    pub candles: Vec<Candle>,
    pub price: f64,
    pub indicators: IndicatorSeries,
}

impl MarketSnapshot {
    /// Fetches once and computes every indicator in `required` plus the standard battery
    pub async fn load(
        market: &dyn MarketData,
        symbol: &str,
        timeframe: Timeframe,
        market_type: MarketType,
        limit: usize,
        required: &[Indicator],
    ) -> Result<Self> {
        let candles = market
            .fetch_candles(symbol, timeframe, market_type, limit)
            .await?;
        let price = market.fetch_current_price(symbol, market_type).await?;

        let mut indicators = IndicatorSeries::standard_battery();
        for indicator in required {
            if !indicators.contains(indicator) {
                indicators.push(*indicator);
            }
        }
        debug!(
            "Computing {} indicators over {} {} {} candles",
            indicators.len(),
            candles.len(),
            symbol,
            timeframe
        );

        let indicators = IndicatorSeries::compute(&candles, &indicators);
        Ok(Self {
            candles,
            price,
            indicators,
        })
    }

    pub fn entry_signal(&self, strategy: &ParsedStrategy) -> TradeSignal {
        evaluate_strategy(strategy, &self.candles, &self.indicators, self.price)
    }

    pub fn exit_signal(&self, strategy: &ParsedStrategy) -> TradeSignal {
        evaluate_exit_conditions(strategy, &self.candles, &self.indicators, self.price)
    }

    /// Latest indicator values, for the signal audit log
    pub fn indicator_values(&self) -> serde_json::Value {
        serde_json::json!(self.indicators.snapshot())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateRequest {
    pub script: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    #[serde(default)]
    pub market_type: MarketType,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub market_type: MarketType,
    pub strategy: ParsedStrategy,
    pub entry_signal: TradeSignal,
    /// Only present when the strategy has exit conditions
    pub exit_signal: Option<TradeSignal>,
    pub candle_count: usize,
    pub indicators: BTreeMap<String, f64>,
}

/// Evaluates a script against live market data without touching any account
pub async fn evaluate(
    market: &dyn MarketData,
    cache: &StrategyCache,
    candle_limit: usize,
    request: &EvaluateRequest,
) -> Result<EvaluationReport> {
    let strategy = cache
        .get_or_parse(&request.script)
        .context("Strategy script was rejected")?;
    let symbol = normalize_symbol(&request.symbol);

    let snapshot = MarketSnapshot::load(
        market,
        &symbol,
        request.timeframe,
        request.market_type,
        candle_limit,
        &strategy.required_indicators(),
    )
    .await?;

    let exit_signal =
        (!strategy.exit_conditions.is_empty()).then(|| snapshot.exit_signal(&strategy));

    Ok(EvaluationReport {
        symbol,
        timeframe: request.timeframe,
        market_type: request.market_type,
        entry_signal: snapshot.entry_signal(&strategy),
        exit_signal,
        candle_count: snapshot.candles.len(),
        indicators: snapshot.indicators.snapshot(),
        strategy: strategy.as_ref().clone(),
    })
}
