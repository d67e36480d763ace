//! Paper Executor
//!
//! Simulated fills, no signing and no broadcast. Opens fill at the live
//! price fetched through the resilient client; closes fill at the position's
//! last observed price, which is exactly what the risk engine just evaluated.
//! Every fill gets a sequential `paper-N` reference so logs stay traceable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::net::{EndpointKind, ResilientClient};
use crate::ports::{ExecError, Fill, PriceOracle, TradeExecutor};

pub struct PaperExecutor {
    client: Arc<ResilientClient>,
    prices: Arc<dyn PriceOracle>,
    fill_counter: AtomicU64,
}

impl PaperExecutor {
    pub fn new(client: Arc<ResilientClient>, prices: Arc<dyn PriceOracle>) -> Self {
        Self {
            client,
            prices,
            fill_counter: AtomicU64::new(1),
        }
    }

    fn next_ref(&self) -> String {
        format!("paper-{}", self.fill_counter.fetch_add(1, Ordering::SeqCst))
    }

    async fn live_price(&self, mint: &str) -> Result<f64, ExecError> {
        let prices = Arc::clone(&self.prices);
        let mint_owned = mint.to_string();

        self.client
            .execute(
                EndpointKind::Price,
                &format!("price:{mint}"),
                Duration::from_secs(30),
                move |ep| {
                    let prices = Arc::clone(&prices);
                    let mint = mint_owned.clone();
                    async move { prices.price(&ep, &mint).await }
                },
            )
            .await
            .map_err(|e| ExecError::Network(e.to_string()))
    }
}

#[async_trait]
impl TradeExecutor for PaperExecutor {
    async fn open(&self, mint: &str, quote_amount: f64) -> Result<Fill, ExecError> {
        if !quote_amount.is_finite() || quote_amount <= 0.0 {
            return Err(ExecError::InvalidParameters(format!(
                "quote_amount must be > 0, got {quote_amount}"
            )));
        }

        let price = self.live_price(mint).await?;
        let tx_ref = self.next_ref();
        tracing::info!(mint, quote_amount, price, tx = %tx_ref, "paper fill (open)");

        Ok(Fill {
            price,
            tokens: quote_amount / price,
            tx_ref,
        })
    }

    async fn close(
        &self,
        position: &crate::domain::Position,
        tokens: f64,
    ) -> Result<Fill, ExecError> {
        if !tokens.is_finite() || tokens <= 0.0 || tokens > position.tokens_held {
            return Err(ExecError::InvalidParameters(format!(
                "cannot sell {tokens} of {} held",
                position.tokens_held
            )));
        }

        // The engine just fetched this price; no second network trip
        let price = position.current_price;
        let tx_ref = self.next_ref();
        tracing::info!(
            id = %position.id,
            tokens,
            price,
            tx = %tx_ref,
            "paper fill (close)"
        );

        Ok(Fill {
            price,
            tokens,
            tx_ref,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Position, Role};
    use crate::net::{BreakerSettings, Endpoint, EndpointPool, ResponseCache, RetrySettings};
    use crate::ports::ScriptedPriceOracle;
    use approx::assert_relative_eq;

    fn executor(oracle: Arc<ScriptedPriceOracle>) -> PaperExecutor {
        let pool = Arc::new(EndpointPool::new(
            vec![Endpoint::new("https://price.mock", EndpointKind::Price, 1)],
            BreakerSettings::default(),
        ));
        let client = Arc::new(ResilientClient::new(
            pool,
            Arc::new(ResponseCache::new()),
            RetrySettings {
                max_attempts: 2,
                base_backoff: Duration::from_millis(1),
                request_timeout: Duration::from_millis(200),
            },
        ));
        PaperExecutor::new(client, oracle as Arc<dyn PriceOracle>)
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_fills_at_live_price() {
        let oracle = Arc::new(ScriptedPriceOracle::new().with_prices("MintAAA", &[2.0]));
        let exec = executor(oracle);

        let fill = exec.open("MintAAA", 10.0).await.unwrap();
        assert_relative_eq!(fill.price, 2.0);
        assert_relative_eq!(fill.tokens, 5.0);
        assert_eq!(fill.tx_ref, "paper-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejects_bad_amount() {
        let oracle = Arc::new(ScriptedPriceOracle::new());
        let exec = executor(oracle);

        assert!(matches!(
            exec.open("MintAAA", 0.0).await,
            Err(ExecError::InvalidParameters(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_fills_at_current_price() {
        let oracle = Arc::new(ScriptedPriceOracle::new());
        let exec = executor(oracle);
        let mut pos =
            Position::open("p1", "MintAAA", "WIF", Role::Scalp, 1.0, 10.0, 10.0, 0).unwrap();
        pos.record_price(1.4, 0.08).unwrap();

        let fill = exec.close(&pos, 10.0).await.unwrap();
        assert_relative_eq!(fill.price, 1.4);
        assert_relative_eq!(fill.tokens, 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_rejects_overselling() {
        let oracle = Arc::new(ScriptedPriceOracle::new());
        let exec = executor(oracle);
        let pos = Position::open("p1", "MintAAA", "WIF", Role::Scalp, 1.0, 10.0, 10.0, 0).unwrap();

        assert!(exec.close(&pos, 11.0).await.is_err());
    }
}
