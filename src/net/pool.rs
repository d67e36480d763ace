//! Endpoint Pool
//!
//! Ranked list of interchangeable endpoints per kind. Selection always yields
//! a candidate: when every endpoint of a kind is breaker-open or rate-limited
//! the pool degrades to the least-recently-failed one instead of erroring, so
//! a caller is never left without something to try.

use std::sync::RwLock;

use super::endpoint::{BreakerSettings, Endpoint, EndpointKind};

/// Process-wide, health-tracked endpoint registry
#[derive(Debug)]
pub struct EndpointPool {
    endpoints: RwLock<Vec<Endpoint>>,
    settings: BreakerSettings,
}

impl EndpointPool {
    pub fn new(endpoints: Vec<Endpoint>, settings: BreakerSettings) -> Self {
        Self {
            endpoints: RwLock::new(endpoints),
            settings,
        }
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Pick the best endpoint for a kind.
    ///
    /// Highest-priority eligible endpoint wins; ties break on fewest
    /// consecutive failures. With nothing eligible the least-recently-failed
    /// endpoint of that kind is returned in degraded mode. `None` only when
    /// the pool holds no endpoint of the kind at all.
    pub fn select_best(&self, kind: EndpointKind, now_ms: u64) -> Option<Endpoint> {
        let endpoints = self.endpoints.read().unwrap_or_else(|e| e.into_inner());

        let best = endpoints
            .iter()
            .filter(|ep| ep.kind == kind && ep.is_eligible(now_ms, &self.settings))
            .min_by_key(|ep| (ep.priority, ep.consecutive_failures));
        if let Some(ep) = best {
            return Some(ep.clone());
        }

        // Degraded mode: all gated, hand out the one that failed longest ago
        let fallback = endpoints
            .iter()
            .filter(|ep| ep.kind == kind)
            .min_by_key(|ep| (ep.last_failure_at.unwrap_or(0), ep.priority))?;
        tracing::debug!(
            kind = %kind,
            url = %fallback.url,
            "no eligible {} endpoint, degrading to least-recently-failed",
            kind
        );
        Some(fallback.clone())
    }

    /// Clear failure and breaker state for an endpoint after a good call
    pub fn record_success(&self, url: &str) {
        let mut endpoints = self.endpoints.write().unwrap_or_else(|e| e.into_inner());
        if let Some(ep) = endpoints.iter_mut().find(|ep| ep.url == url) {
            ep.record_success();
        }
    }

    /// Record a failed call against an endpoint
    pub fn record_failure(&self, url: &str, is_rate_limit: bool, now_ms: u64) {
        let mut endpoints = self.endpoints.write().unwrap_or_else(|e| e.into_inner());
        if let Some(ep) = endpoints.iter_mut().find(|ep| ep.url == url) {
            ep.record_failure(is_rate_limit, now_ms, &self.settings);
            if ep.consecutive_failures >= self.settings.breaker_threshold {
                tracing::warn!(
                    url = %ep.url,
                    failures = ep.consecutive_failures,
                    "endpoint breaker open, cooling down for {}ms",
                    self.settings.cooldown_window_ms
                );
            }
        }
    }

    /// Copy of the current endpoint states, for status output and tests
    pub fn snapshot(&self) -> Vec<Endpoint> {
        self.endpoints
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> EndpointPool {
        let settings = BreakerSettings {
            breaker_threshold: 5,
            cooldown_window_ms: 10_000,
            rate_limit_cooldown_ms: 1_000,
        };
        EndpointPool::new(
            vec![
                Endpoint::new("https://a.example", EndpointKind::Rpc, 1),
                Endpoint::new("https://b.example", EndpointKind::Rpc, 2),
                Endpoint::new("https://c.example", EndpointKind::Rpc, 3),
                Endpoint::new("https://p.example", EndpointKind::Price, 1),
            ],
            settings,
        )
    }

    #[test]
    fn test_selects_highest_priority() {
        let pool = pool();
        let ep = pool.select_best(EndpointKind::Rpc, 0).unwrap();
        assert_eq!(ep.url, "https://a.example");
    }

    #[test]
    fn test_selection_filters_by_kind() {
        let pool = pool();
        let ep = pool.select_best(EndpointKind::Price, 0).unwrap();
        assert_eq!(ep.url, "https://p.example");
    }

    #[test]
    fn test_rotation_after_breaker_trip_and_heal() {
        let pool = pool();

        // Priority-1 endpoint fails 5 consecutive times
        for t in 0..5u64 {
            pool.record_failure("https://a.example", false, t);
        }

        // Subsequent selection moves to priority 2
        let ep = pool.select_best(EndpointKind::Rpc, 10).unwrap();
        assert_eq!(ep.url, "https://b.example");

        // Once the cooldown elapses the priority-1 endpoint is preferred again
        let ep = pool.select_best(EndpointKind::Rpc, 4 + 10_000 + 1).unwrap();
        assert_eq!(ep.url, "https://a.example");
    }

    #[test]
    fn test_degraded_mode_returns_least_recently_failed() {
        let pool = pool();
        pool.record_failure("https://p.example", true, 100);

        // Only price endpoint is rate-limited, but selection still yields it
        let ep = pool.select_best(EndpointKind::Price, 200).unwrap();
        assert_eq!(ep.url, "https://p.example");
    }

    #[test]
    fn test_degraded_mode_prefers_oldest_failure() {
        let settings = BreakerSettings {
            breaker_threshold: 1,
            cooldown_window_ms: 1_000_000,
            rate_limit_cooldown_ms: 1_000,
        };
        let pool = EndpointPool::new(
            vec![
                Endpoint::new("https://a.example", EndpointKind::Rpc, 1),
                Endpoint::new("https://b.example", EndpointKind::Rpc, 2),
            ],
            settings,
        );

        pool.record_failure("https://a.example", false, 5_000);
        pool.record_failure("https://b.example", false, 100);

        let ep = pool.select_best(EndpointKind::Rpc, 6_000).unwrap();
        assert_eq!(ep.url, "https://b.example");
    }

    #[test]
    fn test_success_resets_failures() {
        let pool = pool();
        for t in 0..5u64 {
            pool.record_failure("https://a.example", false, t);
        }
        pool.record_success("https://a.example");

        let ep = pool.select_best(EndpointKind::Rpc, 10).unwrap();
        assert_eq!(ep.url, "https://a.example");
        assert_eq!(ep.consecutive_failures, 0);
    }

    #[test]
    fn test_unknown_kind_without_endpoints() {
        let pool = EndpointPool::new(vec![], BreakerSettings::default());
        assert!(pool.select_best(EndpointKind::Rpc, 0).is_none());
    }
}
