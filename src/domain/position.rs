//! Position State Machine
//!
//! A held token position with a bounded lifetime: Active until exactly one
//! terminal transition (profit, loss, trailing, timeout, or corrupt), then
//! immutable. The trailing stop and peak price only ever ratchet upward.
//! Partial exits shrink the position, never grow it. A closed position is
//! never reopened; re-entry means a new id.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exit-policy tag determining how aggressive or patient the thresholds are
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Fast in and out on a small gain, short time box
    Scalp,
    /// Mid-size target, longer hold
    Momentum,
    /// No time limit, ladder of partial exits at large gains
    Moonshot,
    /// Defensive holding, profile thresholds with a wide berth
    Hedge,
    /// Plain profile-driven thresholds
    Default,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Scalp => "scalp",
            Role::Momentum => "momentum",
            Role::Moonshot => "moonshot",
            Role::Hedge => "hedge",
            Role::Default => "default",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle status. Everything except `Active` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Active,
    ClosedProfit,
    ClosedLoss,
    ClosedTrailing,
    ClosedTimeout,
    /// Frozen on bad data (negative price, zero size); flagged for manual
    /// review, never traded again
    Corrupt,
}

impl PositionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PositionStatus::Active)
    }
}

/// Why a position left the Active state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Hard safety net below the normal stop-loss
    EmergencyStop,
    StopLoss,
    TrailingStop,
    TakeProfit,
    Timeout,
    /// Invariant violation froze the position
    CorruptData,
}

impl ExitReason {
    /// Terminal status this reason maps to
    pub fn status(&self) -> PositionStatus {
        match self {
            ExitReason::EmergencyStop | ExitReason::StopLoss => PositionStatus::ClosedLoss,
            ExitReason::TrailingStop => PositionStatus::ClosedTrailing,
            ExitReason::TakeProfit => PositionStatus::ClosedProfit,
            ExitReason::Timeout => PositionStatus::ClosedTimeout,
            ExitReason::CorruptData => PositionStatus::Corrupt,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PositionError {
    #[error("position {0} is already closed")]
    AlreadyClosed(String),

    #[error("invalid entry price: {0}")]
    InvalidEntryPrice(f64),

    #[error("invalid entry amount: {0}")]
    InvalidEntryAmount(f64),

    #[error("invalid token amount: {0}")]
    InvalidTokenAmount(f64),

    #[error("invalid price update: {0}")]
    InvalidPrice(f64),

    #[error("partial exit fraction must be in (0, 1), got {0}")]
    InvalidExitFraction(f64),
}

/// A single held token position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Unique per entry; re-entry into the same token gets a fresh id
    pub id: String,
    /// Token mint address
    pub token_mint: String,
    /// Token symbol for display
    pub symbol: String,
    /// Exit-policy role tag
    pub role: Role,
    /// Entry price in quote currency
    pub entry_price: f64,
    /// Quote currency spent to enter (shrinks on partial exits)
    pub entry_value_quote: f64,
    /// Tokens currently held (shrinks on partial exits)
    pub tokens_held: f64,
    /// Entry timestamp, unix ms
    pub entry_time_ms: u64,
    /// Most recently observed price
    pub current_price: f64,
    /// Peak price since entry, never decreases
    pub max_price_reached: f64,
    /// Trailing stop trigger, never decreases while Active
    pub trailing_stop_price: f64,
    /// How many partial-exit tiers have fired
    pub partial_exits_taken: u8,
    pub status: PositionStatus,
    /// Fill price of the terminal close
    pub exit_price: Option<f64>,
    /// When the terminal transition happened, unix ms
    pub exit_time_ms: Option<u64>,
    pub exit_reason: Option<ExitReason>,
}

impl Position {
    /// Open a new position, validating entry invariants
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        id: impl Into<String>,
        token_mint: impl Into<String>,
        symbol: impl Into<String>,
        role: Role,
        entry_price: f64,
        entry_value_quote: f64,
        tokens_held: f64,
        entry_time_ms: u64,
    ) -> Result<Self, PositionError> {
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(PositionError::InvalidEntryPrice(entry_price));
        }
        if !entry_value_quote.is_finite() || entry_value_quote <= 0.0 {
            return Err(PositionError::InvalidEntryAmount(entry_value_quote));
        }
        if !tokens_held.is_finite() || tokens_held <= 0.0 {
            return Err(PositionError::InvalidTokenAmount(tokens_held));
        }

        Ok(Self {
            id: id.into(),
            token_mint: token_mint.into(),
            symbol: symbol.into(),
            role,
            entry_price,
            entry_value_quote,
            tokens_held,
            entry_time_ms,
            current_price: entry_price,
            max_price_reached: entry_price,
            trailing_stop_price: 0.0,
            partial_exits_taken: 0,
            status: PositionStatus::Active,
            exit_price: None,
            exit_time_ms: None,
            exit_reason: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == PositionStatus::Active
    }

    /// PnL relative to entry, in percent
    pub fn pnl_pct(&self) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        (self.current_price - self.entry_price) / self.entry_price * 100.0
    }

    /// Age of the position in ms
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.entry_time_ms)
    }

    /// Record a fresh price observation.
    ///
    /// Ratchets `max_price_reached` and derives the trailing stop from the
    /// peak: the stop only tightens upward, it never loosens even when the
    /// price later falls.
    pub fn record_price(
        &mut self,
        price: f64,
        trailing_stop_pct: f64,
    ) -> Result<(), PositionError> {
        if !self.is_active() {
            return Err(PositionError::AlreadyClosed(self.id.clone()));
        }
        if !price.is_finite() || price < 0.0 {
            return Err(PositionError::InvalidPrice(price));
        }

        self.current_price = price;
        self.max_price_reached = self.max_price_reached.max(price);
        let candidate = self.max_price_reached * (1.0 - trailing_stop_pct);
        self.trailing_stop_price = self.trailing_stop_price.max(candidate);
        Ok(())
    }

    /// Shrink the position after a partial take-profit fill.
    ///
    /// Tokens and entry value reduce proportionally so the entry price and
    /// pnl math stay unchanged; the position remains Active.
    pub fn apply_partial_exit(&mut self, fraction: f64) -> Result<(), PositionError> {
        if !self.is_active() {
            return Err(PositionError::AlreadyClosed(self.id.clone()));
        }
        if !fraction.is_finite() || fraction <= 0.0 || fraction >= 1.0 {
            return Err(PositionError::InvalidExitFraction(fraction));
        }

        self.tokens_held *= 1.0 - fraction;
        self.entry_value_quote *= 1.0 - fraction;
        self.partial_exits_taken = self.partial_exits_taken.saturating_add(1);
        Ok(())
    }

    /// One-way terminal transition. Close fields are append-only and the
    /// record is immutable afterwards.
    pub fn close(
        &mut self,
        reason: ExitReason,
        exit_price: f64,
        now_ms: u64,
    ) -> Result<(), PositionError> {
        if !self.is_active() {
            return Err(PositionError::AlreadyClosed(self.id.clone()));
        }

        self.status = reason.status();
        self.exit_price = Some(exit_price);
        self.exit_time_ms = Some(now_ms);
        self.exit_reason = Some(reason);
        Ok(())
    }

    /// Freeze on bad data. Terminal like `close` but with no fill.
    pub fn mark_corrupt(&mut self, now_ms: u64) -> Result<(), PositionError> {
        if !self.is_active() {
            return Err(PositionError::AlreadyClosed(self.id.clone()));
        }
        self.status = PositionStatus::Corrupt;
        self.exit_time_ms = Some(now_ms);
        self.exit_reason = Some(ExitReason::CorruptData);
        Ok(())
    }

    /// Entry invariants that must hold for the position to be evaluated
    pub fn validate(&self) -> Result<(), PositionError> {
        if !self.entry_price.is_finite() || self.entry_price <= 0.0 {
            return Err(PositionError::InvalidEntryPrice(self.entry_price));
        }
        if !self.entry_value_quote.is_finite() || self.entry_value_quote <= 0.0 {
            return Err(PositionError::InvalidEntryAmount(self.entry_value_quote));
        }
        if !self.tokens_held.is_finite() || self.tokens_held <= 0.0 {
            return Err(PositionError::InvalidTokenAmount(self.tokens_held));
        }
        Ok(())
    }

    /// Realized quote-currency proceeds at the recorded exit, if closed
    pub fn realized_pnl_quote(&self) -> Option<f64> {
        let exit_price = self.exit_price?;
        Some(self.tokens_held * exit_price - self.entry_value_quote)
    }
}
