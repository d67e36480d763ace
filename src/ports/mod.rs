//! Port traits at the boundary between the risk engine and the outside world.
//!
//! The engine only ever talks to a [`PriceOracle`], [`BalanceOracle`] and
//! [`TradeExecutor`]; production adapters and deterministic test fakes both
//! live behind these traits so the engine can be driven either way.

pub mod executor;
pub mod mocks;
pub mod oracle;

pub use executor::{ExecError, Fill, TradeExecutor};
pub use mocks::{ExecutorCall, FixedBalanceOracle, RecordingExecutor, ScriptedPriceOracle};
pub use oracle::{BalanceOracle, PriceOracle};
