//! Position sizing and exchange rounding
//!
//! All arithmetic is done in `Decimal` so lot steps and ticks stay exact.

use crate::error::ExchangeError;
use crate::services::exchange::SymbolFilters;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use shared::{ExecutionConfig, MarketType};
use std::str::FromStr;

/// f64 to Decimal through its shortest decimal text, so 0.1 stays 0.1
pub fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(value))
}

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Smallest multiple of `step` that is >= `value`
pub fn ceil_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }
    ((value / step).ceil() * step).normalize()
}

/// Largest multiple of `step` that is <= `value`
pub fn floor_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }
    ((value / step).floor() * step).normalize()
}

pub fn round_to_tick(price: Decimal, tick: Decimal) -> Decimal {
    if tick <= Decimal::ZERO {
        return price;
    }
    ((price / tick).round() * tick).normalize()
}

/// Quantity of a new position.
///
/// The notional is `min(balance × fraction, cap)`. When that falls below the exchange
/// minimum (with margin) it is raised to the minimum, but only if the balance itself covers
/// it. Futures exposure is the notional times leverage. Inverse contracts are counted in
/// `contract_size` USD units and the balance is converted to USD at `price`.
pub fn entry_quantity(
    config: &ExecutionConfig,
    market_type: MarketType,
    balance: Decimal,
    price: Decimal,
    leverage: u32,
    filters: &SymbolFilters,
) -> Result<Decimal, ExchangeError> {
    if price <= Decimal::ZERO {
        return Err(ExchangeError::BelowMinimum(format!("invalid reference price {}", price)));
    }

    let balance_usd = match market_type {
        MarketType::InverseFutures => balance * price,
        _ => balance,
    };
    let max_notional = (balance_usd * config.balance_fraction).min(config.max_notional_usd);
    let floor = filters.min_notional * config.min_notional_margin;

    let notional = if max_notional >= floor {
        max_notional
    } else if balance_usd >= floor {
        floor
    } else {
        let required = match market_type {
            MarketType::InverseFutures => floor / price,
            _ => floor,
        };
        return Err(ExchangeError::InsufficientBalance {
            asset: filters.balance_asset(market_type).to_string(),
            available: balance,
            required: required.round_dp(8),
        });
    };

    let exposure = if market_type.is_futures() {
        notional * Decimal::from(leverage.max(1))
    } else {
        notional
    };

    let raw_quantity = match (market_type, filters.contract_size) {
        (MarketType::InverseFutures, Some(contract)) if contract > Decimal::ZERO => exposure / contract,
        _ => exposure / price,
    };
    let quantity = ceil_to_step(raw_quantity, filters.step_size);

    if quantity <= Decimal::ZERO || quantity < filters.min_qty {
        return Err(ExchangeError::BelowMinimum(format!(
            "quantity {} is below the minimum {}",
            quantity, filters.min_qty
        )));
    }

    let order_notional = match (market_type, filters.contract_size) {
        (MarketType::InverseFutures, Some(contract)) => quantity * contract,
        _ => quantity * price,
    };
    if order_notional < filters.min_notional {
        return Err(ExchangeError::BelowMinimum(format!(
            "notional {} is below the minimum {}",
            order_notional.round_dp(8),
            filters.min_notional
        )));
    }

    Ok(quantity)
}

/// Quantity of a closing order: never more than the exchange holds, rounded down to the step
pub fn close_quantity(recorded: Option<Decimal>, held: Decimal, step: Decimal) -> Decimal {
    let target = match recorded {
        Some(quantity) if quantity > Decimal::ZERO => quantity.min(held),
        _ => held,
    };
    floor_to_step(target, step)
}
