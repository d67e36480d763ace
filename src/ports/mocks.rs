//! Deterministic port fakes
//!
//! Scripted implementations that record calls and play back configured
//! responses, replacing the random prices and fake tx hashes a quick
//! prototype would reach for. Used by the engine tests and handy for
//! integration harnesses.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::executor::{ExecError, Fill, TradeExecutor};
use super::oracle::{BalanceOracle, PriceOracle};
use crate::domain::Position;
use crate::net::{Endpoint, FetchError};

/// Price oracle that plays back a per-mint script of results.
///
/// When a mint's script runs out the last value repeats, so a test can seed
/// one price and tick as often as it likes.
#[derive(Debug, Default)]
pub struct ScriptedPriceOracle {
    scripts: Mutex<HashMap<String, VecDeque<Result<f64, FetchError>>>>,
    last: Mutex<HashMap<String, f64>>,
    calls: AtomicU64,
}

impl ScriptedPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append prices to a mint's script
    pub fn with_prices(self, mint: &str, prices: &[f64]) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap();
            let entry = scripts.entry(mint.to_string()).or_default();
            for p in prices {
                entry.push_back(Ok(*p));
            }
        }
        self
    }

    /// Append a failure to a mint's script
    pub fn with_error(self, mint: &str, error: FetchError) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(mint.to_string())
            .or_default()
            .push_back(Err(error));
        self
    }

    pub fn push_price(&self, mint: &str, price: f64) {
        self.scripts
            .lock()
            .unwrap()
            .entry(mint.to_string())
            .or_default()
            .push_back(Ok(price));
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceOracle for ScriptedPriceOracle {
    async fn price(&self, _endpoint: &Endpoint, mint: &str) -> Result<f64, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(mint)
            .and_then(|script| script.pop_front());

        match next {
            Some(Ok(price)) => {
                self.last.lock().unwrap().insert(mint.to_string(), price);
                Ok(price)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .lock()
                .unwrap()
                .get(mint)
                .copied()
                .ok_or_else(|| FetchError::InvalidResponse(format!("no script for {mint}"))),
        }
    }
}

/// Balance oracle returning a fixed figure per address
#[derive(Debug, Default)]
pub struct FixedBalanceOracle {
    balances: Mutex<HashMap<String, f64>>,
}

impl FixedBalanceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, address: &str, balance: f64) -> Self {
        self.balances
            .lock()
            .unwrap()
            .insert(address.to_string(), balance);
        self
    }

    pub fn set_balance(&self, address: &str, balance: f64) {
        self.balances
            .lock()
            .unwrap()
            .insert(address.to_string(), balance);
    }
}

#[async_trait]
impl BalanceOracle for FixedBalanceOracle {
    async fn balance(&self, _endpoint: &Endpoint, address: &str) -> Result<f64, FetchError> {
        self.balances
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .ok_or_else(|| FetchError::InvalidResponse(format!("no balance for {address}")))
    }
}

/// Executor call record, for asserting what the engine requested
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorCall {
    Open { mint: String, quote_amount: f64 },
    Close { position_id: String, tokens: f64 },
}

/// Executor that fills at the position's current price and records calls.
///
/// `fail_closes(n)` makes the next n close requests fail, for exercising the
/// retry-next-tick path.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<ExecutorCall>>,
    failing_closes: AtomicU64,
    tx_counter: AtomicU64,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_closes(&self, n: u64) {
        self.failing_closes.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<ExecutorCall> {
        self.calls.lock().unwrap().clone()
    }

    fn next_tx_ref(&self) -> String {
        format!("mock-tx-{}", self.tx_counter.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl TradeExecutor for RecordingExecutor {
    async fn open(&self, mint: &str, quote_amount: f64) -> Result<Fill, ExecError> {
        self.calls.lock().unwrap().push(ExecutorCall::Open {
            mint: mint.to_string(),
            quote_amount,
        });
        // Filled at 1.0 unless the test cares; tokens = quote spent
        Ok(Fill {
            price: 1.0,
            tokens: quote_amount,
            tx_ref: self.next_tx_ref(),
        })
    }

    async fn close(&self, position: &Position, tokens: f64) -> Result<Fill, ExecError> {
        self.calls.lock().unwrap().push(ExecutorCall::Close {
            position_id: position.id.clone(),
            tokens,
        });

        let failing = self.failing_closes.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_closes.store(failing - 1, Ordering::SeqCst);
            return Err(ExecError::Network("mock close failure".to_string()));
        }

        Ok(Fill {
            price: position.current_price,
            tokens,
            tx_ref: self.next_tx_ref(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::net::EndpointKind;

    fn endpoint() -> Endpoint {
        Endpoint::new("https://mock", EndpointKind::Price, 1)
    }

    #[tokio::test]
    async fn test_scripted_oracle_plays_back_and_repeats() {
        let oracle = ScriptedPriceOracle::new().with_prices("MintAAA", &[1.0, 2.0]);

        assert_eq!(oracle.price(&endpoint(), "MintAAA").await.unwrap(), 1.0);
        assert_eq!(oracle.price(&endpoint(), "MintAAA").await.unwrap(), 2.0);
        // Script exhausted: last value repeats
        assert_eq!(oracle.price(&endpoint(), "MintAAA").await.unwrap(), 2.0);
        assert_eq!(oracle.call_count(), 3);
    }

    #[tokio::test]
    async fn test_scripted_oracle_error_then_recovers() {
        let oracle = ScriptedPriceOracle::new()
            .with_error("MintAAA", FetchError::RateLimited("429".into()))
            .with_prices("MintAAA", &[3.0]);

        assert!(oracle.price(&endpoint(), "MintAAA").await.is_err());
        assert_eq!(oracle.price(&endpoint(), "MintAAA").await.unwrap(), 3.0);
    }

    #[tokio::test]
    async fn test_scripted_oracle_unknown_mint() {
        let oracle = ScriptedPriceOracle::new();
        assert!(oracle.price(&endpoint(), "nope").await.is_err());
    }

    #[tokio::test]
    async fn test_recording_executor_fill_and_failures() {
        let executor = RecordingExecutor::new();
        let mut pos =
            Position::open("p1", "MintAAA", "WIF", Role::Scalp, 1.0, 10.0, 10.0, 0).unwrap();
        pos.record_price(1.5, 0.08).unwrap();

        executor.fail_closes(1);
        assert!(executor.close(&pos, 10.0).await.is_err());

        let fill = executor.close(&pos, 10.0).await.unwrap();
        assert_eq!(fill.price, 1.5);
        assert_eq!(fill.tokens, 10.0);
        assert_eq!(executor.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_fixed_balance_oracle() {
        let oracle = FixedBalanceOracle::new().with_balance("wallet1", 250.0);
        assert_eq!(oracle.balance(&endpoint(), "wallet1").await.unwrap(), 250.0);
        assert!(oracle.balance(&endpoint(), "wallet2").await.is_err());
    }
}
