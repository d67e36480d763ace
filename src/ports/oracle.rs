//! Oracle Ports
//!
//! Read-side collaborator traits. Implementations receive the endpoint the
//! resilient client selected for the attempt, so rotation and breaker
//! accounting stay in one place.

use async_trait::async_trait;

use crate::net::{Endpoint, FetchError};

/// Token price source in quote currency
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn price(&self, endpoint: &Endpoint, mint: &str) -> Result<f64, FetchError>;
}

/// Wallet balance source in quote currency
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    async fn balance(&self, endpoint: &Endpoint, address: &str) -> Result<f64, FetchError>;
}
