//! Resilient Client
//!
//! Executes a single logical read (balance, price, token metadata) against the
//! best available endpoint, retrying with jittered exponential backoff and
//! endpoint rotation. When every attempt fails the fallback ladder kicks in:
//! fresh cache was already checked first, then stale cache, then a
//! caller-supplied estimate, and only with all of those absent does the error
//! surface. A trading loop must never block on one flaky third-party host.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use super::cache::ResponseCache;
use super::endpoint::EndpointKind;
use super::pool::EndpointPool;
use super::unix_ms;
use crate::net::endpoint::Endpoint;

/// Default attempts per logical read
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default per-attempt timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default base backoff between attempts
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Failure of a single fetch attempt against one endpoint
#[derive(Debug, Error, Clone)]
pub enum FetchError {
    /// Timeout, connection reset, 5xx - worth retrying elsewhere
    #[error("transient network error: {0}")]
    Transient(String),

    /// HTTP 429 or an explicit provider marker - retried, but the offending
    /// endpoint also cools down
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The per-attempt timeout elapsed
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint answered with something we could not use
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Terminal failure of a logical read, after the whole fallback ladder
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("all {kind} endpoints failed for '{cache_key}': {last_error}")]
    AllEndpointsFailed {
        kind: EndpointKind,
        cache_key: String,
        last_error: String,
    },

    #[error("no {0} endpoints configured")]
    NoEndpoints(EndpointKind),
}

/// Retry and timeout tunables
#[derive(Debug, Clone, Copy)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub request_timeout: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Executes reads against an [`EndpointPool`] with retries, rotation and the
/// stale-cache/estimate fallback ladder
pub struct ResilientClient {
    pool: Arc<EndpointPool>,
    cache: Arc<ResponseCache>,
    retry: RetrySettings,
}

impl ResilientClient {
    pub fn new(pool: Arc<EndpointPool>, cache: Arc<ResponseCache>, retry: RetrySettings) -> Self {
        Self { pool, cache, retry }
    }

    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Execute a logical read: fresh cache, then up to `max_attempts` rotated
    /// endpoint calls, then stale cache, then error.
    pub async fn execute<T, F, Fut>(
        &self,
        kind: EndpointKind,
        cache_key: &str,
        ttl: Duration,
        op: F,
    ) -> Result<T, ClientError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(Endpoint) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        match self.execute_inner(kind, cache_key, ttl, op).await {
            Outcome::Value(v) => Ok(v),
            Outcome::Exhausted(err) => Err(err),
        }
    }

    /// Like [`execute`](Self::execute), but with a final estimate tier: when
    /// endpoints and stale cache are both out, the caller's estimate is
    /// returned instead of an error.
    pub async fn execute_or_estimate<T, F, Fut, E>(
        &self,
        kind: EndpointKind,
        cache_key: &str,
        ttl: Duration,
        op: F,
        estimate: E,
    ) -> Result<T, ClientError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(Endpoint) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
        E: FnOnce() -> T,
    {
        match self.execute_inner(kind, cache_key, ttl, op).await {
            Outcome::Value(v) => Ok(v),
            Outcome::Exhausted(_) => {
                tracing::warn!(
                    cache_key,
                    "degraded read: no endpoint or cache, using caller estimate"
                );
                Ok(estimate())
            }
        }
    }

    async fn execute_inner<T, F, Fut>(
        &self,
        kind: EndpointKind,
        cache_key: &str,
        ttl: Duration,
        op: F,
    ) -> Outcome<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(Endpoint) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        // Tier 1: fresh cache
        if let Some(value) = self.cache.get(cache_key, unix_ms()) {
            match serde_json::from_value::<T>(value) {
                Ok(v) => return Outcome::Value(v),
                Err(e) => {
                    tracing::warn!(cache_key, error = %e, "ignoring undecodable cache entry");
                }
            }
        }

        // Tier 2: live attempts with rotation and backoff
        let mut last_error: Option<FetchError> = None;
        for attempt in 1..=self.retry.max_attempts {
            let now = unix_ms();
            let endpoint = match self.pool.select_best(kind, now) {
                Some(ep) => ep,
                None => return Outcome::Exhausted(ClientError::NoEndpoints(kind)),
            };

            let result = tokio::time::timeout(self.retry.request_timeout, op(endpoint.clone())).await;
            match result {
                Ok(Ok(value)) => {
                    self.pool.record_success(&endpoint.url);
                    if let Ok(json) = serde_json::to_value(&value) {
                        self.cache
                            .insert(cache_key, json, ttl.as_millis() as u64, unix_ms());
                    }
                    return Outcome::Value(value);
                }
                Ok(Err(err)) => {
                    let rate_limited = matches!(err, FetchError::RateLimited(_));
                    tracing::debug!(
                        url = %endpoint.url,
                        attempt,
                        rate_limited,
                        error = %err,
                        "attempt failed"
                    );
                    self.pool.record_failure(&endpoint.url, rate_limited, unix_ms());
                    last_error = Some(err);
                }
                Err(_elapsed) => {
                    tracing::debug!(url = %endpoint.url, attempt, "attempt timed out");
                    self.pool.record_failure(&endpoint.url, false, unix_ms());
                    last_error = Some(FetchError::Timeout(self.retry.request_timeout));
                }
            }

            if attempt < self.retry.max_attempts {
                tokio::time::sleep(self.backoff_delay(attempt)).await;
            }
        }

        // Tier 3: stale cache beats stalling the caller
        if let Some((value, age_ms)) = self.cache.get_stale(cache_key, unix_ms()) {
            if let Ok(v) = serde_json::from_value::<T>(value) {
                tracing::warn!(
                    cache_key,
                    age_ms,
                    "degraded read: all endpoints failed, serving stale cache"
                );
                return Outcome::Value(v);
            }
        }

        Outcome::Exhausted(ClientError::AllEndpointsFailed {
            kind,
            cache_key: cache_key.to_string(),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        })
    }

    /// Exponential backoff `base * 2^(attempt-1)` with up to half-base jitter
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.retry.base_backoff.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16));
        let jitter = if base > 1 {
            rand::thread_rng().gen_range(0..base / 2 + 1)
        } else {
            0
        };
        Duration::from_millis(exp + jitter)
    }
}

enum Outcome<T> {
    Value(T),
    Exhausted(ClientError),
}
