//! Heuristic strategy-script parser
//!
//! Scripts are free text (usually Pine-like code mixed with prose). The parser does not
//! implement a grammar: it tokenizes the lowercased text, records simple `name = expr`
//! assignments, and runs an ordered list of pattern detectors. Every detector that matches
//! appends conditions, so several families may contribute to one strategy.

use crate::indicators::{
    Band, Indicator, MacdLine, SuperTrendLine, DEFAULT_BB_PERIOD, DEFAULT_BB_STD_DEV, DEFAULT_MACD,
    DEFAULT_RSI_PERIOD, DEFAULT_SUPERTREND_MULTIPLIER, DEFAULT_SUPERTREND_PERIOD,
};
use crate::strategy::{
    Condition, Direction, IndicatorRef, ParsedStrategy, StopLoss, StopLossKind, TakeProfit,
    TakeProfitKind,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_STOP_LOSS_PERCENT: f64 = 2.0;
pub const DEFAULT_TAKE_PROFIT_PERCENT: f64 = 4.0;
const SUPERTREND_STOP_ATR: f64 = 1.5;
const SUPERTREND_TARGET_ATR: f64 = 3.0;
const FALLBACK_FAST_EMA: usize = 9;
const FALLBACK_SLOW_EMA: usize = 21;

/// What to do with a script no detector could derive an entry from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailurePolicy {
    /// Trade the default EMA(9)/EMA(21) crossover with 2%/4% stops
    #[default]
    UseDefault,
    /// Return [`ParseError::NoEntryConditions`]
    Reject,
}

impl FromStr for ParseFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" | "use_default" | "usedefault" => Ok(ParseFailurePolicy::UseDefault),
            "reject" => Ok(ParseFailurePolicy::Reject),
            other => Err(anyhow::anyhow!("Unknown parse failure policy: {}", other)),
        }
    }
}

impl fmt::Display for ParseFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseFailurePolicy::UseDefault => f.write_str("use_default"),
            ParseFailurePolicy::Reject => f.write_str("reject"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("strategy script is empty")]
    EmptyScript,
    #[error("no entry conditions could be derived from the strategy script")]
    NoEntryConditions,
}

/// Lowercased script with its token set and simple variable assignments
struct Script {
    text: String,
    tokens: HashSet<String>,
    variables: HashMap<String, String>,
}

impl Script {
    fn new(content: &str) -> Self {
        let text = content.to_lowercase();
        let tokens = text
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect();

        let mut variables = HashMap::new();
        if let Ok(assignment) =
            Regex::new(r"^\s*(?:var\s+|float\s+|int\s+)?([a-z_][a-z0-9_]*)\s*:?=\s*(.+?)\s*;?\s*$")
        {
            for line in text.lines() {
                let Some(caps) = assignment.captures(line) else {
                    continue;
                };
                let value = &caps[2];
                // `a == b` is a comparison, not an assignment
                if !value.starts_with('=') {
                    variables.insert(caps[1].to_string(), value.to_string());
                }
            }
        }

        Self { text, tokens, variables }
    }

    fn has(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    fn has_any(&self, tokens: &[&str]) -> bool {
        tokens.iter().any(|token| self.has(token))
    }

    fn mentions_any(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|phrase| self.text.contains(phrase))
    }

    /// Expression assigned to `name`, or `name` itself
    fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        let name = name.trim();
        self.variables.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Numeric literal, or the first number in the expression assigned to the name
    fn resolve_number(&self, token: &str) -> Option<f64> {
        let token = token.trim();
        if let Ok(value) = token.parse::<f64>() {
            return Some(value);
        }
        first_number(self.variables.get(token)?)
    }

    fn capture_number(&self, pattern: &str) -> Option<f64> {
        let re = Regex::new(pattern).ok()?;
        let caps = re.captures(&self.text)?;
        caps.get(1)?.as_str().parse().ok()
    }

    fn capture_period(&self, pattern: &str) -> Option<usize> {
        self.capture_number(pattern)
            .filter(|value| *value >= 1.0)
            .map(|value| value as usize)
    }
}

fn first_number(text: &str) -> Option<f64> {
    let re = Regex::new(r"(\d+(?:\.\d+)?)").ok()?;
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn push_unique(conditions: &mut Vec<Condition>, condition: Condition) {
    if !conditions.contains(&condition) {
        conditions.push(condition);
    }
}

/// Fractions (`0.02`) are scaled to percent, larger numbers are already percent
fn to_percent(value: f64) -> f64 {
    if value <= 1.0 {
        value * 100.0
    } else {
        value
    }
}

type Detector = fn(&Script, &mut ParsedStrategy);

/// Detectors in priority order
const DETECTORS: &[(&str, Detector)] = &[
    ("direction bias", detect_bias),
    ("bollinger bands", detect_bollinger),
    ("supertrend", detect_supertrend),
    ("moving average crossover", detect_ma_crossover),
    ("rsi threshold", detect_rsi),
    ("close vs literal", detect_close_literal),
    ("macd crossover", detect_macd),
    ("stop loss / take profit", detect_risk),
];

/// Converts strategy scripts into [`ParsedStrategy`] values
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyParser {
    policy: ParseFailurePolicy,
}

impl StrategyParser {
    pub fn new(policy: ParseFailurePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ParseFailurePolicy {
        self.policy
    }

    pub fn parse(&self, content: &str) -> Result<ParsedStrategy, ParseError> {
        let script = Script::new(content);
        let mut strategy = ParsedStrategy::default();

        for (name, detect) in DETECTORS {
            let before = (strategy.entry_conditions.len(), strategy.exit_conditions.len());
            detect(&script, &mut strategy);
            let after = (strategy.entry_conditions.len(), strategy.exit_conditions.len());
            if before != after {
                debug!(
                    "Detector '{}' added {} entry and {} exit conditions",
                    name,
                    after.0 - before.0,
                    after.1 - before.1
                );
            }
        }

        if strategy.entry_conditions.is_empty() {
            return self.fallback(strategy, content.trim().is_empty());
        }

        apply_default_risk(&mut strategy);
        Ok(strategy)
    }

    fn fallback(&self, mut strategy: ParsedStrategy, empty: bool) -> Result<ParsedStrategy, ParseError> {
        if self.policy == ParseFailurePolicy::Reject {
            return Err(if empty {
                ParseError::EmptyScript
            } else {
                ParseError::NoEntryConditions
            });
        }

        warn!(
            "⚠️ No entry conditions recognised in strategy script, using default EMA({})/EMA({}) crossover",
            FALLBACK_FAST_EMA, FALLBACK_SLOW_EMA
        );
        strategy.entry_conditions = vec![Condition::crossover(
            Indicator::ema(FALLBACK_FAST_EMA),
            Indicator::ema(FALLBACK_SLOW_EMA),
        )];
        strategy.direction = Direction::Long;
        strategy.used_fallback = true;
        apply_default_risk(&mut strategy);
        Ok(strategy)
    }
}

fn apply_default_risk(strategy: &mut ParsedStrategy) {
    strategy.stop_loss.get_or_insert(StopLoss {
        kind: StopLossKind::Percent,
        value: DEFAULT_STOP_LOSS_PERCENT,
    });
    strategy.take_profit.get_or_insert(TakeProfit {
        kind: TakeProfitKind::Percent,
        value: DEFAULT_TAKE_PROFIT_PERCENT,
    });
}

const LONG_OPENERS: &[&str] = &[
    "strategy.long",
    "entry(\"long\"",
    "entry('long'",
    "go long",
    "enter long",
    "open long",
    "long only",
    "long_only",
    "longs only",
];

const SHORT_OPENERS: &[&str] = &[
    "strategy.short",
    "entry(\"short\"",
    "entry('short'",
    "go short",
    "enter short",
    "open short",
    "short only",
    "short_only",
    "shorts only",
];

fn detect_bias(script: &Script, strategy: &mut ParsedStrategy) {
    let long = script.mentions_any(LONG_OPENERS);
    let short = script.mentions_any(SHORT_OPENERS);
    strategy.direction = match (long, short) {
        (true, false) => Direction::Long,
        (false, true) => Direction::Short,
        _ => Direction::Both,
    };
}

fn detect_bollinger(script: &Script, strategy: &mut ParsedStrategy) {
    let named = script.has_any(&["bb", "bbands", "bollinger", "bollinger_bands"]);
    let std_bands = script.has_any(&["stdev", "std", "stddev", "dev"])
        && script.has_any(&["sma", "ema", "basis", "ma"]);
    if !named && !std_bands {
        return;
    }

    let period = script
        .capture_period(r"bb\(\s*[a-z_]+\s*,\s*(\d+)")
        .or_else(|| script.capture_period(r"stdev\(\s*[a-z_]+\s*,\s*(\d+)"))
        .or_else(|| {
            script.capture_period(
                r"(?:bb_?length|bb_?len|length|len|period)\s*=\s*(?:input(?:\.int)?\(\s*)?(\d+)",
            )
        })
        .unwrap_or(DEFAULT_BB_PERIOD);
    let std_dev = script
        .capture_number(r"bb\(\s*[a-z_]+\s*,\s*\d+\s*,\s*(\d+(?:\.\d+)?)")
        .or_else(|| script.capture_number(r"(\d+(?:\.\d+)?)\s*\*\s*(?:ta\.)?stdev"))
        .or_else(|| {
            script.capture_number(
                r"(?:bb_?mult|mult|multiplier|std_?dev|deviation|dev)\s*=\s*(?:input(?:\.float)?\(\s*)?(\d+(?:\.\d+)?)",
            )
        })
        .filter(|value| *value > 0.0)
        .unwrap_or(DEFAULT_BB_STD_DEV);

    let band = |band| Indicator::Bollinger { period, std_dev, band };
    let close = IndicatorRef::close();

    let cross_below_lower = matches_any(
        &script.text,
        &[
            r"crossunder\(\s*close\s*,\s*[a-z_.]*(?:lower|dn|bot)[a-z_.]*\s*\)",
            r"cross(?:es)?\s+(?:below|under)\s+(?:the\s+)?lower",
        ],
    );
    let cross_above_upper = matches_any(
        &script.text,
        &[
            r"crossover\(\s*close\s*,\s*[a-z_.]*(?:upper|top)[a-z_.]*\s*\)",
            r"cross(?:es)?\s+(?:above|over)\s+(?:the\s+)?upper",
        ],
    );

    let (long_entry, short_entry) = if cross_below_lower || cross_above_upper {
        (
            cross_below_lower.then(|| Condition::crossunder(close, band(Band::Lower))),
            cross_above_upper.then(|| Condition::crossover(close, band(Band::Upper))),
        )
    } else {
        let below_lower = matches_any(&script.text, &[r"close\s*<=?\s*[a-z_.]*(?:lower|dn|bot)"]);
        let above_upper = matches_any(&script.text, &[r"close\s*>=?\s*[a-z_.]*(?:upper|top)"]);
        (
            (below_lower || !above_upper).then(|| Condition::below(close, band(Band::Lower))),
            above_upper.then(|| Condition::above(close, band(Band::Upper))),
        )
    };

    if let Some(entry) = long_entry {
        push_unique(&mut strategy.entry_conditions, entry);
        push_unique(
            &mut strategy.exit_conditions,
            Condition::crossover(close, band(Band::Middle)),
        );
    } else if let Some(entry) = short_entry {
        push_unique(&mut strategy.entry_conditions, entry);
        push_unique(
            &mut strategy.exit_conditions,
            Condition::crossunder(close, band(Band::Middle)),
        );
        if strategy.direction != Direction::Long {
            strategy.direction = Direction::Short;
        }
    }
}

fn matches_any(text: &str, patterns: &[&str]) -> bool {
    patterns
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .any(|re| re.is_match(text))
}

fn detect_supertrend(script: &Script, strategy: &mut ParsedStrategy) {
    let named = script.has("supertrend");
    let co_occurring = script.has("atr")
        && script.has_any(&["trend", "uptrend", "downtrend"])
        && script.has_any(&["direction", "dir"]);
    if !named && !co_occurring {
        return;
    }

    let call = Regex::new(r"supertrend\(\s*(\d+(?:\.\d+)?)\s*,\s*(\d+)\s*\)")
        .ok()
        .and_then(|re| re.captures(&script.text))
        .and_then(|caps| Some((caps[1].parse::<f64>().ok()?, caps[2].parse::<usize>().ok()?)));

    let (multiplier, period) = match call {
        Some(params) => params,
        None => (
            script
                .capture_number(
                    r"(?:factor|st_?mult|supertrend_?mult|multiplier)\s*=\s*(?:input(?:\.float)?\(\s*)?(\d+(?:\.\d+)?)",
                )
                .unwrap_or(DEFAULT_SUPERTREND_MULTIPLIER),
            script
                .capture_period(
                    r"(?:atr_?period|atr_?length|atr_?len)\s*=\s*(?:input(?:\.int)?\(\s*)?(\d+)",
                )
                .unwrap_or(DEFAULT_SUPERTREND_PERIOD),
        ),
    };

    let direction = Indicator::SuperTrend {
        period,
        multiplier,
        line: SuperTrendLine::Direction,
    };
    push_unique(&mut strategy.entry_conditions, Condition::direction_change_up(direction));
    push_unique(&mut strategy.exit_conditions, Condition::direction_change_down(direction));
    strategy.direction = Direction::Both;
    strategy.stop_loss.get_or_insert(StopLoss {
        kind: StopLossKind::Atr,
        value: SUPERTREND_STOP_ATR,
    });
    strategy.take_profit.get_or_insert(TakeProfit {
        kind: TakeProfitKind::Atr,
        value: SUPERTREND_TARGET_ATR,
    });
}

/// `ta.ema(close, 9)`, `sma(close, len)`, `ema_21`, or a variable holding one of those
fn resolve_moving_average(script: &Script, operand: &str) -> Option<Indicator> {
    let expr = script.resolve(operand).trim();

    let call = Regex::new(r"^(?:ta\.)?(ema|sma)\(\s*[a-z_]+\s*,\s*([a-z0-9_.]+)\s*\)$").ok()?;
    let named = Regex::new(r"^(ema|sma)_?(\d+)$").ok()?;
    let caps = call.captures(expr).or_else(|| named.captures(expr))?;

    let period = script.resolve_number(&caps[2]).filter(|p| *p >= 1.0)? as usize;
    match &caps[1] {
        "ema" => Some(Indicator::ema(period)),
        _ => Some(Indicator::sma(period)),
    }
}

fn detect_ma_crossover(script: &Script, strategy: &mut ParsedStrategy) {
    if let Ok(calls) = Regex::new(
        r"(crossover|crossunder)\(\s*([^,()]+(?:\([^()]*\))?)\s*,\s*([^,()]+(?:\([^()]*\))?)\s*\)",
    ) {
        for caps in calls.captures_iter(&script.text) {
            let (Some(fast), Some(slow)) = (
                resolve_moving_average(script, &caps[2]),
                resolve_moving_average(script, &caps[3]),
            ) else {
                continue;
            };
            if &caps[1] == "crossover" {
                push_unique(&mut strategy.entry_conditions, Condition::crossover(fast, slow));
            } else {
                push_unique(&mut strategy.exit_conditions, Condition::crossunder(fast, slow));
            }
        }
    }

    if let Ok(phrases) = Regex::new(
        r"(ema|sma)\s*\(?\s*(\d+)\s*\)?\s+cross(?:es)?\s+(above|over|below|under)\s+(?:the\s+)?(ema|sma)\s*\(?\s*(\d+)",
    ) {
        for caps in phrases.captures_iter(&script.text) {
            let ma = |kind: &str, period: &str| {
                let period = period.parse::<usize>().ok().filter(|p| *p >= 1)?;
                Some(if kind == "ema" { Indicator::ema(period) } else { Indicator::sma(period) })
            };
            let (Some(left), Some(right)) = (ma(&caps[1], &caps[2]), ma(&caps[4], &caps[5])) else {
                continue;
            };
            if matches!(&caps[3], "above" | "over") {
                push_unique(&mut strategy.entry_conditions, Condition::crossover(left, right));
            } else {
                push_unique(&mut strategy.exit_conditions, Condition::crossunder(left, right));
            }
        }
    }
}

fn detect_rsi(script: &Script, strategy: &mut ParsedStrategy) {
    if !script.text.contains("rsi") {
        return;
    }

    let default_period = script
        .capture_period(r"rsi\(\s*(?:[a-z_]+\s*,\s*)?(\d+)\s*\)")
        .or_else(|| {
            script.capture_period(r"rsi_?(?:length|len|period)\s*=\s*(?:input(?:\.int)?\(\s*)?(\d+)")
        })
        .unwrap_or(DEFAULT_RSI_PERIOD);
    let period_in = |expr: &str| {
        Regex::new(r"rsi\(\s*(?:[a-z_]+\s*,\s*)?([a-z0-9_.]+)\s*\)")
            .ok()
            .and_then(|re| re.captures(expr))
            .and_then(|caps| script.resolve_number(&caps[1]))
            .filter(|p| *p >= 1.0)
            .map(|p| p as usize)
    };

    let mut below: Vec<(usize, f64)> = Vec::new();
    let mut above: Vec<(usize, f64)> = Vec::new();

    if let Ok(comparisons) =
        Regex::new(r"([a-z_][a-z0-9_.]*)(\([^()]*\))?\s*(<=|>=|<|>)\s*([a-z0-9_.]+)")
    {
        for caps in comparisons.captures_iter(&script.text) {
            let name = &caps[1];
            let period = if name.contains("rsi") {
                let call = format!("{}{}", name, caps.get(2).map_or("", |m| m.as_str()));
                period_in(&call).unwrap_or(default_period)
            } else {
                match script.variables.get(name) {
                    Some(expr) if expr.contains("rsi(") => period_in(expr).unwrap_or(default_period),
                    _ => continue,
                }
            };
            let Some(threshold) = script.resolve_number(&caps[4]) else {
                continue;
            };
            if caps[3].starts_with('<') {
                below.push((period, threshold));
            } else {
                above.push((period, threshold));
            }
        }
    }

    if let Ok(phrases) = Regex::new(
        r"rsi(?:\s*\(\s*(?:[a-z_]+\s*,\s*)?(\d+)\s*\))?\s+(?:is\s+)?(?:crosses\s+)?(below|under|above|over)\s+(\d+(?:\.\d+)?)",
    ) {
        for caps in phrases.captures_iter(&script.text) {
            let period = caps
                .get(1)
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .unwrap_or(default_period);
            let Ok(threshold) = caps[3].parse::<f64>() else {
                continue;
            };
            if matches!(&caps[2], "below" | "under") {
                below.push((period, threshold));
            } else {
                above.push((period, threshold));
            }
        }
    }

    let any_below = !below.is_empty();
    for (period, threshold) in below {
        push_unique(
            &mut strategy.entry_conditions,
            Condition::below(Indicator::rsi(period), IndicatorRef::Value(threshold)),
        );
    }
    for (period, threshold) in above {
        let condition = Condition::above(Indicator::rsi(period), IndicatorRef::Value(threshold));
        let condition = if any_below { condition.or() } else { condition };
        push_unique(&mut strategy.entry_conditions, condition);
    }
}

fn detect_close_literal(script: &Script, strategy: &mut ParsedStrategy) {
    if !strategy.entry_conditions.is_empty() {
        return;
    }
    let Ok(re) = Regex::new(r"(?:^|[^a-z_.])close\s*(>=?|<=?)\s*(\d+(?:\.\d+)?)") else {
        return;
    };
    for caps in re.captures_iter(&script.text) {
        let Ok(value) = caps[2].parse::<f64>() else {
            continue;
        };
        let condition = if caps[1].starts_with('>') {
            Condition::above(IndicatorRef::close(), IndicatorRef::Value(value))
        } else {
            Condition::below(IndicatorRef::close(), IndicatorRef::Value(value))
        };
        push_unique(&mut strategy.entry_conditions, condition);
    }
}

fn detect_macd(script: &Script, strategy: &mut ParsedStrategy) {
    if !script.has("macd") || !script.text.contains("signal") {
        return;
    }

    let (fast, slow, signal) = Regex::new(r"macd\(\s*[a-z_]+\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*\)")
        .ok()
        .and_then(|re| re.captures(&script.text))
        .and_then(|caps| {
            Some((
                caps[1].parse::<usize>().ok()?,
                caps[2].parse::<usize>().ok()?,
                caps[3].parse::<usize>().ok()?,
            ))
        })
        .unwrap_or(DEFAULT_MACD);
    let line = |line| Indicator::Macd { fast, slow, signal, line };
    let is_macd = |name: &str| name.contains("macd") && !name.contains("signal") && !name.contains("hist");
    let is_signal = |name: &str| name.contains("signal") || name == "sig";

    let Ok(calls) = Regex::new(r"(crossover|crossunder)\(\s*([a-z_][a-z0-9_.]*)\s*,\s*([a-z_][a-z0-9_.]*)\s*\)")
    else {
        return;
    };
    for caps in calls.captures_iter(&script.text) {
        let (left, right) = (&caps[2], &caps[3]);
        let macd_crosses_up = match (&caps[1], is_macd(left) && is_signal(right), is_signal(left) && is_macd(right)) {
            ("crossover", true, _) | ("crossunder", _, true) => true,
            ("crossunder", true, _) | ("crossover", _, true) => false,
            _ => continue,
        };
        if macd_crosses_up {
            push_unique(
                &mut strategy.entry_conditions,
                Condition::crossover(line(MacdLine::Macd), line(MacdLine::Signal)),
            );
        } else {
            push_unique(
                &mut strategy.exit_conditions,
                Condition::crossunder(line(MacdLine::Macd), line(MacdLine::Signal)),
            );
        }
    }
}

fn detect_risk(script: &Script, strategy: &mut ParsedStrategy) {
    let Ok(stop) = Regex::new(
        r"(?:stop[_\s-]?loss|\bsl\b)([^\d\n]{0,20}?)(\d+(?:\.\d+)?)\s*(%|(?:x|\*)?\s*(?:ta\.)?atr)?",
    ) else {
        return;
    };
    let Ok(target) = Regex::new(
        r"(?:take[_\s-]?profit|\btp\b)([^\d\n]{0,20}?)(\d+(?:\.\d+)?)\s*(%|(?:x|\*)?\s*(?:ta\.)?atr)?",
    ) else {
        return;
    };

    let is_atr = |caps: &regex::Captures| {
        caps[1].contains("atr") || caps.get(3).is_some_and(|m| m.as_str().contains("atr"))
    };

    if let Some(caps) = stop.captures(&script.text) {
        if let Ok(value) = caps[2].parse::<f64>() {
            strategy.stop_loss = Some(if is_atr(&caps) {
                StopLoss { kind: StopLossKind::Atr, value }
            } else {
                StopLoss { kind: StopLossKind::Percent, value: to_percent(value) }
            });
        }
    }

    if let Some(caps) = target.captures(&script.text) {
        if let Ok(value) = caps[2].parse::<f64>() {
            strategy.take_profit = Some(if is_atr(&caps) {
                TakeProfit { kind: TakeProfitKind::Atr, value }
            } else {
                TakeProfit { kind: TakeProfitKind::Percent, value: to_percent(value) }
            });
        }
    }

    if strategy.stop_loss.is_some() {
        if let Some(multiple) = script.capture_number(
            r"(?:risk[_\s-]?reward|reward[_\s-]?ratio|\brr\b|r:r)[^\d\n]{0,20}?(\d+(?:\.\d+)?)",
        ) {
            strategy.take_profit = Some(TakeProfit { kind: TakeProfitKind::Rr, value: multiple });
        }
    }

    if let Some(risk) =
        script.capture_number(r"risk[_\s-]?(?:percent|pct|per[_\s]?trade)[^\d\n]{0,20}?(\d+(?:\.\d+)?)")
    {
        strategy.risk_percent = risk;
    }
}
