//! Network Resilience Layer
//!
//! Everything the trading loops need to read third-party data without
//! trusting any single host: ranked endpoint pools with per-endpoint circuit
//! breakers, a shared TTL response cache, and a retrying client with a
//! stale-cache/estimate fallback ladder.

pub mod cache;
pub mod client;
pub mod endpoint;
pub mod pool;

pub use cache::ResponseCache;
pub use client::{ClientError, FetchError, ResilientClient, RetrySettings};
pub use endpoint::{BreakerSettings, Endpoint, EndpointKind};
pub use pool::EndpointPool;

pub(crate) use crate::clock::unix_ms;
