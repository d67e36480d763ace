//! Concrete implementations of the port traits, plus the CLI surface.

pub mod cli;
pub mod paper;
pub mod price_api;

pub use paper::PaperExecutor;
pub use price_api::{HttpPriceOracle, RpcBalanceOracle};
