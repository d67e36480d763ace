//! Strategy Profiles
//!
//! A milestone table of risk parameter bundles. Crossing a capital floor
//! activates the next profile: bigger accounts poll slower, size smaller
//! relative to capital and keep wider stops. Selection is a pure function of
//! current capital, safe to call every tick.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProfileError {
    #[error("profile table is empty")]
    EmptyTable,

    #[error("first profile must have min_capital 0, got {0}")]
    MissingBaseline(f64),

    #[error("profiles must be ordered by min_capital ascending: {0} before {1}")]
    UnorderedMilestones(f64, f64),

    #[error("profile '{name}': {reason}")]
    InvalidProfile { name: String, reason: String },
}

/// A named bundle of risk parameters active above a capital floor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyProfile {
    /// Display name, e.g. "starter"
    pub name: String,
    /// Capital floor (quote currency) at which this profile activates
    pub min_capital: f64,
    /// Fraction of capital a single entry may consume, in (0, 1]
    pub max_position_fraction: f64,
    /// Stop-loss threshold in percent, negative
    pub stop_loss_pct: f64,
    /// Take-profit threshold in percent, positive
    pub take_profit_pct: f64,
    /// Trailing stop distance from the peak, in (0, 1)
    pub trailing_stop_pct: f64,
    /// Risk-evaluation polling cadence
    pub poll_interval_ms: u64,
    /// Forced-exit age; None means no time limit
    pub max_hold_ms: Option<u64>,
}

impl StrategyProfile {
    pub fn validate(&self) -> Result<(), ProfileError> {
        let fail = |reason: String| ProfileError::InvalidProfile {
            name: self.name.clone(),
            reason,
        };

        if self.min_capital < 0.0 || !self.min_capital.is_finite() {
            return Err(fail(format!("min_capital must be >= 0, got {}", self.min_capital)));
        }
        if self.max_position_fraction <= 0.0 || self.max_position_fraction > 1.0 {
            return Err(fail(format!(
                "max_position_fraction must be in (0, 1], got {}",
                self.max_position_fraction
            )));
        }
        if self.stop_loss_pct >= 0.0 {
            return Err(fail(format!("stop_loss_pct must be < 0, got {}", self.stop_loss_pct)));
        }
        if self.take_profit_pct <= 0.0 {
            return Err(fail(format!(
                "take_profit_pct must be > 0, got {}",
                self.take_profit_pct
            )));
        }
        if self.trailing_stop_pct <= 0.0 || self.trailing_stop_pct >= 1.0 {
            return Err(fail(format!(
                "trailing_stop_pct must be in (0, 1), got {}",
                self.trailing_stop_pct
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(fail("poll_interval_ms must be > 0".to_string()));
        }
        Ok(())
    }

    /// Price-cache TTL for this profile: the polling cadence clamped into the
    /// 30-120s band so fast pollers still coalesce reads and slow pollers do
    /// not trade on minutes-old quotes
    pub fn price_cache_ttl_ms(&self) -> u64 {
        self.poll_interval_ms.clamp(30_000, 120_000)
    }
}

/// Ordered milestone table; the active profile is the last one whose floor is
/// at or below current capital
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileTable {
    profiles: Vec<StrategyProfile>,
}

impl ProfileTable {
    pub fn new(profiles: Vec<StrategyProfile>) -> Result<Self, ProfileError> {
        if profiles.is_empty() {
            return Err(ProfileError::EmptyTable);
        }
        if profiles[0].min_capital != 0.0 {
            return Err(ProfileError::MissingBaseline(profiles[0].min_capital));
        }
        for pair in profiles.windows(2) {
            if pair[1].min_capital <= pair[0].min_capital {
                return Err(ProfileError::UnorderedMilestones(
                    pair[0].min_capital,
                    pair[1].min_capital,
                ));
            }
        }
        for profile in &profiles {
            profile.validate()?;
        }
        Ok(Self { profiles })
    }

    /// Active profile for the given capital. Pure and deterministic.
    pub fn select(&self, capital: f64) -> &StrategyProfile {
        self.profiles
            .iter()
            .rev()
            .find(|p| p.min_capital <= capital)
            .unwrap_or(&self.profiles[0])
    }

    pub fn profiles(&self) -> &[StrategyProfile] {
        &self.profiles
    }
}

impl Default for ProfileTable {
    /// Three-milestone default ladder. The numbers are configuration, not
    /// invariants; operators are expected to override them.
    fn default() -> Self {
        Self::new(vec![
            StrategyProfile {
                name: "starter".to_string(),
                min_capital: 0.0,
                max_position_fraction: 0.20,
                stop_loss_pct: -15.0,
                take_profit_pct: 25.0,
                trailing_stop_pct: 0.08,
                poll_interval_ms: 30_000,
                max_hold_ms: Some(4 * 60 * 60 * 1000),
            },
            StrategyProfile {
                name: "grower".to_string(),
                min_capital: 500.0,
                max_position_fraction: 0.10,
                stop_loss_pct: -12.0,
                take_profit_pct: 20.0,
                trailing_stop_pct: 0.06,
                poll_interval_ms: 60_000,
                max_hold_ms: Some(8 * 60 * 60 * 1000),
            },
            StrategyProfile {
                name: "guardian".to_string(),
                min_capital: 5_000.0,
                max_position_fraction: 0.05,
                stop_loss_pct: -10.0,
                take_profit_pct: 15.0,
                trailing_stop_pct: 0.05,
                poll_interval_ms: 120_000,
                max_hold_ms: None,
            },
        ])
        .expect("default profile table is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, min_capital: f64) -> StrategyProfile {
        StrategyProfile {
            name: name.to_string(),
            min_capital,
            max_position_fraction: 0.1,
            stop_loss_pct: -15.0,
            take_profit_pct: 20.0,
            trailing_stop_pct: 0.08,
            poll_interval_ms: 30_000,
            max_hold_ms: Some(3_600_000),
        }
    }

    #[test]
    fn test_select_picks_last_crossed_milestone() {
        let table = ProfileTable::new(vec![
            profile("a", 0.0),
            profile("b", 100.0),
            profile("c", 1_000.0),
        ])
        .unwrap();

        assert_eq!(table.select(0.0).name, "a");
        assert_eq!(table.select(99.9).name, "a");
        assert_eq!(table.select(100.0).name, "b");
        assert_eq!(table.select(999.0).name, "b");
        assert_eq!(table.select(1_000.0).name, "c");
        assert_eq!(table.select(1_000_000.0).name, "c");
    }

    #[test]
    fn test_select_is_deterministic() {
        let table = ProfileTable::default();
        for _ in 0..3 {
            assert_eq!(table.select(600.0).name, table.select(600.0).name);
        }
    }

    #[test]
    fn test_negative_capital_falls_back_to_baseline() {
        let table = ProfileTable::default();
        assert_eq!(table.select(-10.0).name, "starter");
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(matches!(ProfileTable::new(vec![]), Err(ProfileError::EmptyTable)));
    }

    #[test]
    fn test_missing_baseline_rejected() {
        let result = ProfileTable::new(vec![profile("a", 50.0)]);
        assert!(matches!(result, Err(ProfileError::MissingBaseline(_))));
    }

    #[test]
    fn test_unordered_milestones_rejected() {
        let result = ProfileTable::new(vec![profile("a", 0.0), profile("b", 500.0), profile("c", 500.0)]);
        assert!(matches!(result, Err(ProfileError::UnorderedMilestones(_, _))));
    }

    #[test]
    fn test_profile_validation() {
        let mut p = profile("bad", 0.0);
        p.stop_loss_pct = 5.0;
        assert!(p.validate().is_err());

        let mut p = profile("bad", 0.0);
        p.max_position_fraction = 1.5;
        assert!(p.validate().is_err());

        let mut p = profile("bad", 0.0);
        p.trailing_stop_pct = 1.0;
        assert!(p.validate().is_err());

        let mut p = profile("bad", 0.0);
        p.poll_interval_ms = 0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_price_cache_ttl_clamped() {
        let mut p = profile("fast", 0.0);
        p.poll_interval_ms = 5_000;
        assert_eq!(p.price_cache_ttl_ms(), 30_000);

        p.poll_interval_ms = 60_000;
        assert_eq!(p.price_cache_ttl_ms(), 60_000);

        p.poll_interval_ms = 600_000;
        assert_eq!(p.price_cache_ttl_ms(), 120_000);
    }

    #[test]
    fn test_default_table_is_valid() {
        let table = ProfileTable::default();
        assert_eq!(table.profiles().len(), 3);
        assert_eq!(table.select(250.0).name, "starter");
        assert_eq!(table.select(5_000.0).name, "guardian");
    }
}
