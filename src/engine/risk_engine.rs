//! Position Risk Engine
//!
//! The per-tick evaluation loop. Each tick walks every Active position,
//! fetches a price through the resilient client, advances the trailing stop
//! and applies the exit policy's decision through the trade executor. Every
//! mutation persists before the next position is touched, so a crash between
//! positions loses at most the tick in flight.
//!
//! A price fetch failure skips that position for the tick; the engine never
//! guesses an exit off a price it does not have.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::exit_policy::{ExitDecision, ExitPolicy};
use crate::domain::{
    ExitReason, Position, PositionError, PositionStore, ProfileTable, Role, StoreError,
    StrategyProfile,
};
use crate::net::{ClientError, EndpointKind, ResilientClient};
use crate::ports::{BalanceOracle, ExecError, PriceOracle, TradeExecutor};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Position(#[from] PositionError),

    #[error("execution failed: {0}")]
    Execution(#[from] ExecError),

    #[error(transparent)]
    Price(#[from] ClientError),

    #[error("insufficient capital: {capital} available, {required} required")]
    InsufficientCapital { capital: f64, required: f64 },
}

/// What happened during one tick
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub evaluated: usize,
    pub held: usize,
    pub partial_exits: usize,
    pub closed: usize,
    pub quarantined: usize,
    /// Positions skipped because no price could be obtained
    pub price_failures: usize,
    /// Exits the executor rejected; the position stays Active for retry
    pub exec_failures: usize,
}

/// Owns the store and drives positions through the exit policy.
///
/// All collaborators are injected; the engine itself holds no network or
/// clock state, which is what makes the tests below possible.
pub struct RiskEngine {
    store: PositionStore,
    client: Arc<ResilientClient>,
    oracle: Arc<dyn PriceOracle>,
    executor: Arc<dyn TradeExecutor>,
    profiles: ProfileTable,
    policy: ExitPolicy,
    capital: f64,
}

impl RiskEngine {
    pub fn new(
        store: PositionStore,
        client: Arc<ResilientClient>,
        oracle: Arc<dyn PriceOracle>,
        executor: Arc<dyn TradeExecutor>,
        profiles: ProfileTable,
        policy: ExitPolicy,
        starting_capital: f64,
    ) -> Self {
        Self {
            store,
            client,
            oracle,
            executor,
            profiles,
            policy,
            capital: starting_capital,
        }
    }

    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    /// Shared network client, for health reporting and cache housekeeping
    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    /// Active profile for the current capital
    pub fn active_profile(&self) -> &StrategyProfile {
        self.profiles.select(self.capital)
    }

    /// Evaluate every Active position once.
    ///
    /// Skips (never aborts) on per-position trouble: a price outage, a
    /// rejected exit or a corrupt record each affect only their own position.
    pub async fn tick(&mut self, now_ms: u64) -> Result<TickReport, EngineError> {
        let mut report = TickReport::default();
        let profile = self.profiles.select(self.capital).clone();

        for id in self.store.active_ids() {
            let Some(position) = self.store.get(&id) else {
                continue;
            };
            let mut position = position.clone();
            report.evaluated += 1;

            if let Err(e) = position.validate() {
                tracing::warn!(id = %id, error = %e, "quarantining corrupt position");
                position.mark_corrupt(now_ms)?;
                self.store.update(position)?;
                report.quarantined += 1;
                continue;
            }

            let price = match self.fetch_price(&position, &profile).await {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(
                        id = %id,
                        mint = %position.token_mint,
                        error = %e,
                        "price unavailable, skipping position this tick"
                    );
                    report.price_failures += 1;
                    continue;
                }
            };

            let trailing = self.policy.trailing_stop_pct(position.role, &profile);
            if let Err(e) = position.record_price(price, trailing) {
                tracing::warn!(id = %id, price, error = %e, "rejected price update");
                report.price_failures += 1;
                continue;
            }
            self.store.update(position.clone())?;

            match self.policy.evaluate(&position, &profile, now_ms) {
                ExitDecision::Hold => {
                    report.held += 1;
                }
                ExitDecision::Partial {
                    fraction,
                    trigger_pnl_pct,
                } => match self.partial_exit(&mut position, fraction).await {
                    Ok(proceeds) => {
                        tracing::info!(
                            id = %id,
                            symbol = %position.symbol,
                            trigger_pnl_pct,
                            fraction,
                            proceeds,
                            "partial exit filled"
                        );
                        report.partial_exits += 1;
                    }
                    Err(e) => {
                        tracing::warn!(id = %id, error = %e, "partial exit failed, will retry");
                        report.exec_failures += 1;
                    }
                },
                ExitDecision::Close { reason } => {
                    match self.close_position(&mut position, reason, now_ms).await {
                        Ok(proceeds) => {
                            tracing::info!(
                                id = %id,
                                symbol = %position.symbol,
                                ?reason,
                                pnl_pct = position.pnl_pct(),
                                proceeds,
                                "position closed"
                            );
                            report.closed += 1;
                        }
                        Err(e) => {
                            tracing::warn!(id = %id, error = %e, "close failed, will retry");
                            report.exec_failures += 1;
                        }
                    }
                }
            }
        }

        Ok(report)
    }

    /// Open a new position sized from the active profile
    pub async fn open_position(
        &mut self,
        mint: &str,
        symbol: &str,
        role: Role,
        now_ms: u64,
    ) -> Result<String, EngineError> {
        let profile = self.profiles.select(self.capital);
        let quote_amount = self.capital * profile.max_position_fraction;
        if quote_amount <= 0.0 {
            return Err(EngineError::InsufficientCapital {
                capital: self.capital,
                required: 0.0,
            });
        }

        let fill = self.executor.open(mint, quote_amount).await?;
        let entry_value = fill.price * fill.tokens;
        let id = format!("{}-{now_ms}", symbol.to_lowercase());

        let position = Position::open(
            id.clone(),
            mint,
            symbol,
            role,
            fill.price,
            entry_value,
            fill.tokens,
            now_ms,
        )?;

        self.capital -= entry_value;
        self.store.insert(position)?;
        tracing::info!(
            id = %id,
            mint,
            %role,
            entry_value,
            tx = %fill.tx_ref,
            "position opened"
        );
        Ok(id)
    }

    /// Refresh tracked capital from the wallet balance, keeping the current
    /// figure as the estimate when every endpoint is out
    pub async fn refresh_capital(
        &mut self,
        balances: &Arc<dyn BalanceOracle>,
        address: &str,
    ) -> Result<f64, EngineError> {
        let oracle = Arc::clone(balances);
        let addr = address.to_string();
        let current = self.capital;

        let balance = self
            .client
            .execute_or_estimate(
                EndpointKind::Rpc,
                &format!("balance:{address}"),
                Duration::from_secs(60),
                move |ep| {
                    let oracle = Arc::clone(&oracle);
                    let addr = addr.clone();
                    async move { oracle.balance(&ep, &addr).await }
                },
                || current,
            )
            .await?;

        self.capital = balance;
        Ok(balance)
    }

    async fn fetch_price(
        &self,
        position: &Position,
        profile: &StrategyProfile,
    ) -> Result<f64, ClientError> {
        let oracle = Arc::clone(&self.oracle);
        let mint = position.token_mint.clone();

        self.client
            .execute(
                EndpointKind::Price,
                &format!("price:{}", position.token_mint),
                Duration::from_millis(profile.price_cache_ttl_ms()),
                move |ep| {
                    let oracle = Arc::clone(&oracle);
                    let mint = mint.clone();
                    async move { oracle.price(&ep, &mint).await }
                },
            )
            .await
    }

    /// Sell a fraction; on success shrink the position and bank the proceeds
    async fn partial_exit(
        &mut self,
        position: &mut Position,
        fraction: f64,
    ) -> Result<f64, EngineError> {
        let tokens = position.tokens_held * fraction;
        let fill = self.executor.close(position, tokens).await?;

        position.apply_partial_exit(fraction)?;
        let proceeds = fill.price * fill.tokens;
        self.capital += proceeds;
        self.store.update(position.clone())?;
        Ok(proceeds)
    }

    /// Full terminal exit through the executor
    async fn close_position(
        &mut self,
        position: &mut Position,
        reason: ExitReason,
        now_ms: u64,
    ) -> Result<f64, EngineError> {
        let fill = self.executor.close(position, position.tokens_held).await?;

        position.close(reason, fill.price, now_ms)?;
        let proceeds = fill.price * fill.tokens;
        self.capital += proceeds;
        self.store.update(position.clone())?;
        Ok(proceeds)
    }
}
