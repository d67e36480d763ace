//! HTTP adapters for the oracle ports.
//!
//! [`HttpPriceOracle`] speaks the Jupiter-style price API
//! (`GET {base}/price?ids={mint}`); [`RpcBalanceOracle`] asks a Solana
//! JSON-RPC node for a wallet's lamport balance. Both classify failures so
//! the resilient client can tell a 429 cooldown from an ordinary hiccup.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::net::{Endpoint, FetchError};
use crate::ports::{BalanceOracle, PriceOracle};

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

#[derive(Debug, Deserialize)]
struct PriceResponse {
    data: HashMap<String, PriceEntry>,
}

#[derive(Debug, Deserialize)]
struct PriceEntry {
    price: f64,
}

/// Price oracle over a Jupiter-shaped HTTP price API
pub struct HttpPriceOracle {
    http: reqwest::Client,
}

impl HttpPriceOracle {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn price(&self, endpoint: &Endpoint, mint: &str) -> Result<f64, FetchError> {
        let url = format!("{}/price?ids={mint}", endpoint.url.trim_end_matches('/'));

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(FetchError::RateLimited(format!("429 from {}", endpoint.url)));
            }
            status if !status.is_success() => {
                return Err(FetchError::Transient(format!(
                    "HTTP {status} from {}",
                    endpoint.url
                )));
            }
            _ => {}
        }

        let body: PriceResponse = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        let price = body
            .data
            .get(mint)
            .map(|entry| entry.price)
            .ok_or_else(|| FetchError::InvalidResponse(format!("no price for mint {mint}")))?;

        if !price.is_finite() || price <= 0.0 {
            return Err(FetchError::InvalidResponse(format!(
                "unusable price {price} for mint {mint}"
            )));
        }
        Ok(price)
    }
}

#[derive(Debug, Deserialize)]
struct RpcBalanceResponse {
    result: Option<RpcBalanceResult>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcBalanceResult {
    value: u64,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Wallet balance via Solana JSON-RPC `getBalance`, reported in SOL
pub struct RpcBalanceOracle {
    http: reqwest::Client,
}

impl RpcBalanceOracle {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl BalanceOracle for RpcBalanceOracle {
    async fn balance(&self, endpoint: &Endpoint, address: &str) -> Result<f64, FetchError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getBalance",
            "params": [address],
        });

        let response = self
            .http
            .post(&endpoint.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited(format!("429 from {}", endpoint.url)));
        }
        if !response.status().is_success() {
            return Err(FetchError::Transient(format!(
                "HTTP {} from {}",
                response.status(),
                endpoint.url
            )));
        }

        let body: RpcBalanceResponse = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        if let Some(err) = body.error {
            return Err(FetchError::InvalidResponse(format!(
                "RPC error {}: {}",
                err.code, err.message
            )));
        }

        body.result
            .map(|r| r.value as f64 / LAMPORTS_PER_SOL)
            .ok_or_else(|| FetchError::InvalidResponse("missing result".to_string()))
    }
}
