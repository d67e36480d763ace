//! Endpoint Health Tracking
//!
//! Per-endpoint circuit breaker and rate-limit cool-down state. An endpoint
//! that keeps failing is taken out of rotation for a cooldown window and
//! re-admitted lazily on the next eligibility check, no background sweep.

use serde::{Deserialize, Serialize};

/// Default consecutive failures before the breaker opens
pub const DEFAULT_BREAKER_THRESHOLD: u32 = 5;

/// Default breaker cooldown window in milliseconds (5 minutes)
pub const DEFAULT_COOLDOWN_WINDOW_MS: u64 = 5 * 60 * 1000;

/// Default rate-limit cooldown in milliseconds (60 seconds)
pub const DEFAULT_RATE_LIMIT_COOLDOWN_MS: u64 = 60 * 1000;

/// What an endpoint serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    /// Solana JSON-RPC node (balances, account reads)
    Rpc,
    /// Price feed API (quotes, token prices)
    Price,
}

impl std::fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointKind::Rpc => write!(f, "rpc"),
            EndpointKind::Price => write!(f, "price"),
        }
    }
}

/// Breaker and cooldown tunables shared by every endpoint in a pool
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Consecutive failures that open the breaker
    pub breaker_threshold: u32,
    /// How long an open breaker keeps the endpoint out of rotation (ms)
    pub cooldown_window_ms: u64,
    /// How long a rate-limited endpoint cools down (ms)
    pub rate_limit_cooldown_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            breaker_threshold: DEFAULT_BREAKER_THRESHOLD,
            cooldown_window_ms: DEFAULT_COOLDOWN_WINDOW_MS,
            rate_limit_cooldown_ms: DEFAULT_RATE_LIMIT_COOLDOWN_MS,
        }
    }
}

/// A ranked, health-tracked network endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    /// Endpoint URL, also its identity within the pool
    pub url: String,
    /// What this endpoint serves
    pub kind: EndpointKind,
    /// Selection priority, lower is preferred
    pub priority: u8,
    /// Consecutive failures since the last success
    pub consecutive_failures: u32,
    /// When the breaker opened (unix ms), None if closed
    pub opened_at: Option<u64>,
    /// Endpoint is rate-limited until this time (unix ms)
    pub rate_limited_until: Option<u64>,
    /// Last recorded failure (unix ms), drives degraded-mode selection
    pub last_failure_at: Option<u64>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, kind: EndpointKind, priority: u8) -> Self {
        Self {
            url: url.into(),
            kind,
            priority,
            consecutive_failures: 0,
            opened_at: None,
            rate_limited_until: None,
            last_failure_at: None,
        }
    }

    /// Whether the breaker is currently holding this endpoint out of rotation.
    ///
    /// The breaker self-heals lazily: once the cooldown window elapses this
    /// returns false again without any explicit reset.
    pub fn breaker_open(&self, now_ms: u64, settings: &BreakerSettings) -> bool {
        if self.consecutive_failures < settings.breaker_threshold {
            return false;
        }
        match self.opened_at {
            Some(opened) => now_ms.saturating_sub(opened) < settings.cooldown_window_ms,
            None => false,
        }
    }

    /// Whether the endpoint may be handed out to callers right now
    pub fn is_eligible(&self, now_ms: u64, settings: &BreakerSettings) -> bool {
        if let Some(until) = self.rate_limited_until {
            if now_ms <= until {
                return false;
            }
        }
        !self.breaker_open(now_ms, settings)
    }

    /// Record a successful call: failures and breaker state are cleared
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    /// Record a failed call.
    ///
    /// At or above the breaker threshold every further failure re-stamps
    /// `opened_at`, so an endpoint that fails again right after healing goes
    /// straight back into cooldown.
    pub fn record_failure(&mut self, is_rate_limit: bool, now_ms: u64, settings: &BreakerSettings) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(now_ms);
        if self.consecutive_failures >= settings.breaker_threshold {
            self.opened_at = Some(now_ms);
        }
        if is_rate_limit {
            self.rate_limited_until = Some(now_ms + settings.rate_limit_cooldown_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BreakerSettings {
        BreakerSettings {
            breaker_threshold: 3,
            cooldown_window_ms: 1_000,
            rate_limit_cooldown_ms: 500,
        }
    }

    #[test]
    fn test_new_endpoint_is_eligible() {
        let ep = Endpoint::new("https://rpc.example", EndpointKind::Rpc, 1);
        assert!(ep.is_eligible(0, &settings()));
        assert_eq!(ep.consecutive_failures, 0);
    }

    #[test]
    fn test_breaker_opens_at_threshold() {
        let s = settings();
        let mut ep = Endpoint::new("https://rpc.example", EndpointKind::Rpc, 1);

        ep.record_failure(false, 100, &s);
        ep.record_failure(false, 101, &s);
        assert!(ep.is_eligible(102, &s));

        ep.record_failure(false, 102, &s);
        assert!(!ep.is_eligible(103, &s));
        assert_eq!(ep.opened_at, Some(102));
    }

    #[test]
    fn test_breaker_self_heals_after_cooldown() {
        let s = settings();
        let mut ep = Endpoint::new("https://rpc.example", EndpointKind::Rpc, 1);
        for t in 0..3 {
            ep.record_failure(false, t, &s);
        }
        assert!(!ep.is_eligible(500, &s));
        // Cooldown window elapsed - eligible again without manual reset
        assert!(ep.is_eligible(2 + 1_000, &s));
    }

    #[test]
    fn test_failure_after_heal_reopens_breaker() {
        let s = settings();
        let mut ep = Endpoint::new("https://rpc.example", EndpointKind::Rpc, 1);
        for t in 0..3 {
            ep.record_failure(false, t, &s);
        }
        assert!(ep.is_eligible(5_000, &s));

        ep.record_failure(false, 5_000, &s);
        assert!(!ep.is_eligible(5_001, &s));
        assert_eq!(ep.opened_at, Some(5_000));
    }

    #[test]
    fn test_success_clears_breaker() {
        let s = settings();
        let mut ep = Endpoint::new("https://rpc.example", EndpointKind::Rpc, 1);
        for t in 0..3 {
            ep.record_failure(false, t, &s);
        }
        ep.record_success();
        assert!(ep.is_eligible(3, &s));
        assert_eq!(ep.consecutive_failures, 0);
        assert!(ep.opened_at.is_none());
    }

    #[test]
    fn test_rate_limit_cooldown() {
        let s = settings();
        let mut ep = Endpoint::new("https://price.example", EndpointKind::Price, 1);

        ep.record_failure(true, 1_000, &s);
        assert!(!ep.is_eligible(1_000, &s));
        assert!(!ep.is_eligible(1_400, &s));
        assert!(ep.is_eligible(1_501, &s));
    }

    #[test]
    fn test_rate_limit_applies_below_breaker_threshold() {
        let s = settings();
        let mut ep = Endpoint::new("https://price.example", EndpointKind::Price, 1);

        // A single 429 must cool the endpoint down even though the breaker is closed
        ep.record_failure(true, 0, &s);
        assert_eq!(ep.consecutive_failures, 1);
        assert!(!ep.breaker_open(0, &s));
        assert!(!ep.is_eligible(100, &s));
    }
}
