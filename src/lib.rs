//! SolSentry - resilient position risk engine for Solana tokens
//!
//! Watches open token positions, fetches prices through a pool of redundant
//! endpoints with circuit breakers and a stale-cache fallback ladder, and
//! drives every position through a fixed-priority exit policy: emergency
//! stop, stop-loss, trailing stop, take-profit ladders, timeout.
//!
//! # Modules
//!
//! - `domain`: Position state machine, milestone profiles, durable store
//! - `net`: Endpoint pool, circuit breakers, resilient client, TTL cache
//! - `ports`: PriceOracle / BalanceOracle / TradeExecutor traits and fakes
//! - `engine`: Exit policy, per-tick risk engine, tick scheduler
//! - `adapters`: HTTP oracles, paper executor, CLI
//! - `config`: TOML loading and validation

pub mod adapters;
pub mod clock;
pub mod config;
pub mod domain;
pub mod engine;
pub mod net;
pub mod ports;
