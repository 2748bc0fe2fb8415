//! Signed REST client shared by every Binance market

use super::SymbolFilters;
use crate::error::ExchangeError;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use shared::Credentials;
use std::str::FromStr;
use tracing::debug;

#[derive(Clone)]
pub struct BinanceClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
}

/// Error body returned by every Binance API
#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

impl BinanceClient {
    pub fn signed_client(
        http: Client,
        base_url: &str,
        credentials: &Credentials,
        recv_window_ms: u64,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key.clone(),
            api_secret: credentials.api_secret.clone(),
            recv_window_ms,
        }
    }

    /// Client for public market-data endpoints only
    pub fn public_client(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            recv_window_ms: 0,
        }
    }

    fn sign(&self, query: &str) -> Result<String, ExchangeError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| ExchangeError::CallFailed(format!("Invalid API secret: {}", e)))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Sends a `USER_DATA`/`TRADE` request: timestamp and recvWindow are appended, the
    /// query string is signed and the key travels in `X-MBX-APIKEY`.
    pub async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let mut parts: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        parts.push(format!("timestamp={}", Utc::now().timestamp_millis()));
        parts.push(format!("recvWindow={}", self.recv_window_ms));

        let query = parts.join("&");
        let signature = self.sign(&query)?;
        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);
        debug!("{} {}", method, path);

        let response = self
            .http
            .request(method, url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn public<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let query = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&");
        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };

        let response = self.http.get(url).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ExchangeError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ApiError>(&body) {
                Ok(err) => ExchangeError::Rejected {
                    code: err.code,
                    message: err.msg,
                },
                Err(_) => ExchangeError::CallFailed(format!("HTTP {}: {}", status, body)),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| ExchangeError::CallFailed(format!("Unexpected response body: {}", e)))
    }
}

/// `GET .../exchangeInfo` payload, reduced to what sizing needs
#[derive(Debug, Deserialize)]
pub(crate) struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SymbolInfo {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    #[serde(default)]
    pub margin_asset: Option<String>,
    #[serde(default)]
    pub contract_size: Option<Decimal>,
    #[serde(default)]
    pub filters: Vec<serde_json::Value>,
}

fn decimal_field(filter: &serde_json::Value, key: &str) -> Option<Decimal> {
    match filter.get(key)? {
        serde_json::Value::String(text) => Decimal::from_str(text).ok(),
        other => Decimal::from_str(&other.to_string()).ok(),
    }
}

impl SymbolInfo {
    /// Merges the symbol's filter list over `defaults`
    pub fn to_filters(&self, defaults: SymbolFilters) -> SymbolFilters {
        let mut filters = SymbolFilters {
            base_asset: self.base_asset.clone(),
            quote_asset: self.quote_asset.clone(),
            margin_asset: self
                .margin_asset
                .clone()
                .unwrap_or_else(|| defaults.margin_asset.clone()),
            contract_size: self.contract_size.or(defaults.contract_size),
            ..defaults
        };

        for filter in &self.filters {
            match filter.get("filterType").and_then(|t| t.as_str()) {
                Some("LOT_SIZE") => {
                    if let Some(step) = decimal_field(filter, "stepSize").filter(|s| !s.is_zero()) {
                        filters.step_size = step;
                    }
                    if let Some(min_qty) = decimal_field(filter, "minQty") {
                        filters.min_qty = min_qty;
                    }
                }
                Some("PRICE_FILTER") => {
                    if let Some(tick) = decimal_field(filter, "tickSize").filter(|t| !t.is_zero()) {
                        filters.tick_size = tick;
                    }
                }
                // Spot uses `minNotional`, USDⓈ-M futures `notional`
                Some("MIN_NOTIONAL") | Some("NOTIONAL") => {
                    if let Some(min) = decimal_field(filter, "minNotional")
                        .or_else(|| decimal_field(filter, "notional"))
                    {
                        filters.min_notional = min;
                    }
                }
                _ => {}
            }
        }

        filters.step_size = filters.step_size.normalize();
        filters.tick_size = filters.tick_size.normalize();
        filters
    }
}
