//! Trade Executor Port
//!
//! Signing and broadcasting live behind this trait. The engine treats exits
//! as idempotent-safe requests: a failed close leaves the position Active and
//! the same decision fires again next tick.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Position;

#[derive(Debug, Error, Clone)]
pub enum ExecError {
    #[error("execution rejected: {0}")]
    Rejected(String),

    #[error("execution network error: {0}")]
    Network(String),

    #[error("slippage tolerance exceeded")]
    SlippageExceeded,

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Result of a filled open or close
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    /// Fill price in quote currency
    pub price: f64,
    /// Tokens bought (open) or sold (close)
    pub tokens: f64,
    /// Transaction reference for audit logs
    pub tx_ref: String,
}

#[async_trait]
pub trait TradeExecutor: Send + Sync {
    /// Spend `quote_amount` of quote currency on `mint`
    async fn open(&self, mint: &str, quote_amount: f64) -> Result<Fill, ExecError>;

    /// Sell `tokens` out of the position. `tokens` is the full holding for a
    /// terminal close, or a slice of it for a partial exit.
    async fn close(&self, position: &Position, tokens: f64) -> Result<Fill, ExecError>;
}
