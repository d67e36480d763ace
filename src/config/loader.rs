//! Configuration Loader
//!
//! Loads and validates TOML configuration matching config.toml structure,
//! then converts the sections into the typed settings the engine and the
//! network layer consume.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::{ProfileError, ProfileTable, StrategyProfile};
use crate::engine::{ExitPolicy, RolePolicy};
use crate::net::{BreakerSettings, Endpoint, EndpointKind, RetrySettings};

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub engine: EngineSection,
    #[serde(default)]
    pub resilience: ResilienceSection,
    pub endpoints: EndpointsSection,
    /// Milestone ladder; omitted sections fall back to the built-in table
    #[serde(default)]
    pub profiles: Vec<StrategyProfile>,
    #[serde(default)]
    pub roles: RolesSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Engine configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Data directory holding the position store (supports ~ expansion)
    pub data_dir: String,
    /// Capital figure the engine starts from, in quote currency
    pub starting_capital: f64,
    /// Hard loss floor in percent; a breach exits regardless of role
    #[serde(default = "default_emergency_floor")]
    pub emergency_floor_pct: f64,
    /// Wallet to poll for capital tracking; omit to track from fills only
    #[serde(default)]
    pub wallet_address: Option<String>,
}

fn default_emergency_floor() -> f64 {
    -50.0
}

/// Endpoint resilience section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResilienceSection {
    /// Consecutive failures that open an endpoint's breaker
    pub breaker_threshold: u32,
    /// Breaker cooldown before an endpoint is retried, in ms
    pub cooldown_window_ms: u64,
    /// Cooldown after a rate-limit response, in ms
    pub rate_limit_cooldown_ms: u64,
    /// Attempts per logical read
    pub max_attempts: u32,
    /// Base delay for exponential backoff, in ms
    pub base_backoff_ms: u64,
    /// Per-attempt timeout, in ms
    pub request_timeout_ms: u64,
}

impl Default for ResilienceSection {
    fn default() -> Self {
        Self {
            breaker_threshold: 5,
            cooldown_window_ms: 5 * 60 * 1000,
            rate_limit_cooldown_ms: 60 * 1000,
            max_attempts: 3,
            base_backoff_ms: 500,
            request_timeout_ms: 15_000,
        }
    }
}

/// One configured endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointEntry {
    pub url: String,
    /// Lower tries first
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    1
}

/// Endpoints configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointsSection {
    #[serde(default)]
    pub rpc: Vec<EndpointEntry>,
    #[serde(default)]
    pub price: Vec<EndpointEntry>,
}

/// Per-role exit overrides; an omitted role keeps the built-in policy
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RolesSection {
    pub scalp: Option<RolePolicy>,
    pub momentum: Option<RolePolicy>,
    pub moonshot: Option<RolePolicy>,
    pub hedge: Option<RolePolicy>,
    pub default: Option<RolePolicy>,
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Invalid profile table: {0}")]
    ProfileError(#[from] ProfileError),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.engine.starting_capital.is_finite() || self.engine.starting_capital < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "starting_capital must be >= 0, got {}",
                self.engine.starting_capital
            )));
        }

        if self.engine.emergency_floor_pct >= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "emergency_floor_pct must be < 0, got {}",
                self.engine.emergency_floor_pct
            )));
        }

        if self.engine.data_dir.is_empty() {
            return Err(ConfigError::ValidationError(
                "data_dir cannot be empty".to_string(),
            ));
        }

        if self.resilience.breaker_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "breaker_threshold must be > 0".to_string(),
            ));
        }

        if self.resilience.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "max_attempts must be > 0".to_string(),
            ));
        }

        if self.resilience.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_ms must be > 0".to_string(),
            ));
        }

        if self.endpoints.price.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one price endpoint is required".to_string(),
            ));
        }

        for entry in self.endpoints.rpc.iter().chain(&self.endpoints.price) {
            if entry.url.is_empty() {
                return Err(ConfigError::ValidationError(
                    "endpoint url cannot be empty".to_string(),
                ));
            }
        }

        // The profile table itself validates milestones and thresholds
        self.profile_table()?;

        for (name, role) in self.role_overrides() {
            validate_role_policy(name, role)?;
        }

        Ok(())
    }

    /// Data directory with ~ expanded
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.engine.data_dir).into_owned())
    }

    pub fn breaker_settings(&self) -> BreakerSettings {
        BreakerSettings {
            breaker_threshold: self.resilience.breaker_threshold,
            cooldown_window_ms: self.resilience.cooldown_window_ms,
            rate_limit_cooldown_ms: self.resilience.rate_limit_cooldown_ms,
        }
    }

    pub fn retry_settings(&self) -> RetrySettings {
        RetrySettings {
            max_attempts: self.resilience.max_attempts,
            base_backoff: std::time::Duration::from_millis(self.resilience.base_backoff_ms),
            request_timeout: std::time::Duration::from_millis(self.resilience.request_timeout_ms),
        }
    }

    /// All configured endpoints as pool entries
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let rpc = self
            .endpoints
            .rpc
            .iter()
            .map(|e| Endpoint::new(&e.url, EndpointKind::Rpc, e.priority));
        let price = self
            .endpoints
            .price
            .iter()
            .map(|e| Endpoint::new(&e.url, EndpointKind::Price, e.priority));
        rpc.chain(price).collect()
    }

    /// Milestone table: configured profiles, or the built-in ladder when the
    /// config has none
    pub fn profile_table(&self) -> Result<ProfileTable, ProfileError> {
        if self.profiles.is_empty() {
            return Ok(ProfileTable::default());
        }
        ProfileTable::new(self.profiles.clone())
    }

    /// Exit rulebook: built-in policy with configured role overrides applied
    pub fn exit_policy(&self) -> ExitPolicy {
        let mut policy = ExitPolicy {
            emergency_floor_pct: self.engine.emergency_floor_pct,
            ..ExitPolicy::default()
        };
        if let Some(scalp) = &self.roles.scalp {
            policy.scalp = scalp.clone();
        }
        if let Some(momentum) = &self.roles.momentum {
            policy.momentum = momentum.clone();
        }
        if let Some(moonshot) = &self.roles.moonshot {
            policy.moonshot = moonshot.clone();
        }
        if let Some(hedge) = &self.roles.hedge {
            policy.hedge = hedge.clone();
        }
        if let Some(default) = &self.roles.default {
            policy.default = default.clone();
        }
        policy
    }

    fn role_overrides(&self) -> Vec<(&'static str, &RolePolicy)> {
        [
            ("scalp", &self.roles.scalp),
            ("momentum", &self.roles.momentum),
            ("moonshot", &self.roles.moonshot),
            ("hedge", &self.roles.hedge),
            ("default", &self.roles.default),
        ]
        .into_iter()
        .filter_map(|(name, role)| role.as_ref().map(|r| (name, r)))
        .collect()
    }
}

fn validate_role_policy(name: &str, role: &RolePolicy) -> Result<(), ConfigError> {
    if let Some(tp) = role.take_profit_pct {
        if tp <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "roles.{name}: take_profit_pct must be > 0, got {tp}"
            )));
        }
    }
    if let Some(ts) = role.trailing_stop_pct {
        if ts <= 0.0 || ts >= 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "roles.{name}: trailing_stop_pct must be in (0, 1), got {ts}"
            )));
        }
    }

    let mut last_trigger = f64::NEG_INFINITY;
    for tier in &role.partial_tiers {
        if tier.trigger_pnl_pct <= last_trigger {
            return Err(ConfigError::ValidationError(format!(
                "roles.{name}: partial tier triggers must be strictly ascending"
            )));
        }
        if tier.exit_fraction <= 0.0 || tier.exit_fraction > 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "roles.{name}: exit_fraction must be in (0, 1], got {}",
                tier.exit_fraction
            )));
        }
        last_trigger = tier.trigger_pnl_pct;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HoldLimit;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[engine]
data_dir = "~/.solsentry"
starting_capital = 100.0
emergency_floor_pct = -50.0
wallet_address = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"

[resilience]
breaker_threshold = 5
cooldown_window_ms = 300000
rate_limit_cooldown_ms = 60000
max_attempts = 3
base_backoff_ms = 500
request_timeout_ms = 15000

[[endpoints.rpc]]
url = "https://api.mainnet-beta.solana.com"
priority = 1

[[endpoints.rpc]]
url = "https://rpc.backup.example"
priority = 2

[[endpoints.price]]
url = "https://price.jup.ag/v6"
priority = 1

[[profiles]]
name = "starter"
min_capital = 0.0
max_position_fraction = 0.2
stop_loss_pct = -15.0
take_profit_pct = 25.0
trailing_stop_pct = 0.08
poll_interval_ms = 30000
max_hold_ms = 14400000

[[profiles]]
name = "grower"
min_capital = 500.0
max_position_fraction = 0.1
stop_loss_pct = -12.0
take_profit_pct = 20.0
trailing_stop_pct = 0.06
poll_interval_ms = 60000

[roles.scalp]
take_profit_pct = 6.0
trailing_stop_pct = 0.03
max_hold = { capped = 1800000 }

[roles.moonshot]
max_hold = "unlimited"

[[roles.moonshot.partial_tiers]]
trigger_pnl_pct = 100.0
exit_fraction = 0.25

[[roles.moonshot.partial_tiers]]
trigger_pnl_pct = 300.0
exit_fraction = 1.0

[logging]
level = "debug"
"#
        .to_string()
    }

    #[test]
    fn test_load_valid_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(create_valid_config().as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.engine.starting_capital, 100.0);
        assert_eq!(config.resilience.breaker_threshold, 5);
        assert_eq!(config.endpoints.rpc.len(), 2);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.profile_table().unwrap().profiles().len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.toml");
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let minimal = r#"
[engine]
data_dir = "/tmp/solsentry"
starting_capital = 50.0

[[endpoints.price]]
url = "https://price.jup.ag/v6"
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(minimal.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.resilience.max_attempts, 3);
        assert_eq!(config.engine.emergency_floor_pct, -50.0);
        assert_eq!(config.logging.level, "info");
        // Built-in profile ladder kicks in
        assert_eq!(config.profile_table().unwrap().profiles().len(), 3);
        assert!(config.engine.wallet_address.is_none());
    }

    #[test]
    fn test_endpoints_conversion() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(create_valid_config().as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        let endpoints = config.endpoints();
        assert_eq!(endpoints.len(), 3);
        assert_eq!(
            endpoints
                .iter()
                .filter(|e| e.kind == EndpointKind::Rpc)
                .count(),
            2
        );
    }

    #[test]
    fn test_role_overrides_applied() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(create_valid_config().as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        let policy = config.exit_policy();

        assert_eq!(policy.scalp.take_profit_pct, Some(6.0));
        assert_eq!(policy.scalp.max_hold, HoldLimit::Capped(1_800_000));
        assert_eq!(policy.moonshot.max_hold, HoldLimit::Unlimited);
        assert_eq!(policy.moonshot.partial_tiers.len(), 2);
        // Momentum keeps the built-in policy
        assert_eq!(policy.momentum.take_profit_pct, Some(25.0));
    }

    #[test]
    fn test_rejects_missing_price_endpoints() {
        let broken = r#"
[engine]
data_dir = "/tmp/solsentry"
starting_capital = 50.0

[[endpoints.rpc]]
url = "https://api.mainnet-beta.solana.com"
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(broken.as_bytes()).unwrap();

        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_rejects_positive_emergency_floor() {
        let broken = r#"
[engine]
data_dir = "/tmp/solsentry"
starting_capital = 50.0
emergency_floor_pct = 10.0

[[endpoints.price]]
url = "https://price.jup.ag/v6"
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(broken.as_bytes()).unwrap();

        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_rejects_unordered_partial_tiers() {
        let broken = r#"
[engine]
data_dir = "/tmp/solsentry"
starting_capital = 50.0

[[endpoints.price]]
url = "https://price.jup.ag/v6"

[[roles.moonshot.partial_tiers]]
trigger_pnl_pct = 300.0
exit_fraction = 0.25

[[roles.moonshot.partial_tiers]]
trigger_pnl_pct = 100.0
exit_fraction = 0.25
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(broken.as_bytes()).unwrap();

        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_rejects_bad_profile_table() {
        let broken = r#"
[engine]
data_dir = "/tmp/solsentry"
starting_capital = 50.0

[[endpoints.price]]
url = "https://price.jup.ag/v6"

[[profiles]]
name = "floating"
min_capital = 100.0
max_position_fraction = 0.2
stop_loss_pct = -15.0
take_profit_pct = 25.0
trailing_stop_pct = 0.08
poll_interval_ms = 30000
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(broken.as_bytes()).unwrap();

        // First profile must have min_capital 0
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ProfileError(_)
        ));
    }

    #[test]
    fn test_data_dir_tilde_expansion() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(create_valid_config().as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert!(!config.data_dir().to_string_lossy().contains('~'));
    }
}
