//! Exit Policy
//!
//! Pure decision logic: given a position, the active strategy profile and the
//! role policy table, produce at most one exit decision per evaluation.
//! Checks run in a fixed priority order so the same inputs always yield the
//! same decision:
//!
//!   emergency stop > stop-loss > trailing stop > take-profit tiers > timeout
//!
//! A position that passes every check holds. All thresholds here are data;
//! nothing in this module touches the network or the clock.

use serde::{Deserialize, Serialize};

use crate::domain::{ExitReason, Position, Role, StrategyProfile};

/// What the engine should do with a position this tick
#[derive(Debug, Clone, PartialEq)]
pub enum ExitDecision {
    Hold,
    /// Sell a fraction of the position and keep the rest running
    Partial { fraction: f64, trigger_pnl_pct: f64 },
    /// Full terminal exit
    Close { reason: ExitReason },
}

/// Hold-time ceiling for a role
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldLimit {
    /// Use the active profile's max_hold_ms
    #[default]
    Profile,
    /// Never time out
    Unlimited,
    /// Fixed ceiling in ms, regardless of profile
    Capped(u64),
}

/// One rung of a partial-exit ladder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialTier {
    /// PnL percent at which this rung fires
    pub trigger_pnl_pct: f64,
    /// Fraction of the remaining position to sell; 1.0 means full close
    pub exit_fraction: f64,
}

/// Per-role overrides on top of the profile thresholds.
///
/// `None` means fall through to the profile's value for that knob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolePolicy {
    pub take_profit_pct: Option<f64>,
    pub trailing_stop_pct: Option<f64>,
    pub max_hold: HoldLimit,
    /// Ladder consumed in order by `partial_exits_taken`; empty means a plain
    /// full close at the take-profit threshold
    pub partial_tiers: Vec<PartialTier>,
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self::profile_driven()
    }
}

impl RolePolicy {
    /// Plain profile-driven policy: no overrides, no ladder
    pub fn profile_driven() -> Self {
        Self {
            take_profit_pct: None,
            trailing_stop_pct: None,
            max_hold: HoldLimit::Profile,
            partial_tiers: Vec::new(),
        }
    }
}

/// The full exit rulebook: one hard floor plus a policy per role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitPolicy {
    /// Emergency floor in percent, below every role's stop-loss. A breach
    /// closes immediately no matter what the role says.
    pub emergency_floor_pct: f64,
    pub scalp: RolePolicy,
    pub momentum: RolePolicy,
    pub moonshot: RolePolicy,
    pub hedge: RolePolicy,
    pub default: RolePolicy,
}

impl ExitPolicy {
    pub fn role_policy(&self, role: Role) -> &RolePolicy {
        match role {
            Role::Scalp => &self.scalp,
            Role::Momentum => &self.momentum,
            Role::Moonshot => &self.moonshot,
            Role::Hedge => &self.hedge,
            Role::Default => &self.default,
        }
    }

    /// Evaluate a position against this policy. Pure: same inputs, same
    /// decision. Non-active positions always hold (the store already froze
    /// or closed them).
    pub fn evaluate(
        &self,
        position: &Position,
        profile: &StrategyProfile,
        now_ms: u64,
    ) -> ExitDecision {
        if !position.is_active() {
            return ExitDecision::Hold;
        }

        let role = self.role_policy(position.role);
        let pnl = position.pnl_pct();

        // 1. Emergency floor, the hard safety net
        if pnl <= self.emergency_floor_pct {
            return ExitDecision::Close {
                reason: ExitReason::EmergencyStop,
            };
        }

        // 2. Stop-loss from the active profile
        if pnl <= profile.stop_loss_pct {
            return ExitDecision::Close {
                reason: ExitReason::StopLoss,
            };
        }

        // 3. Trailing stop: locks in gains, so it only fires while the
        // position is in profit. A gap down through the stop into negative
        // pnl is the stop-loss's problem, not a trailing exit.
        if pnl > 0.0 && position.current_price <= position.trailing_stop_price {
            return ExitDecision::Close {
                reason: ExitReason::TrailingStop,
            };
        }

        // 4. Take-profit: ladder if the role has one, plain threshold if not
        if !role.partial_tiers.is_empty() {
            let tier_index = position.partial_exits_taken as usize;
            if let Some(tier) = role.partial_tiers.get(tier_index) {
                if pnl >= tier.trigger_pnl_pct {
                    if tier.exit_fraction >= 1.0 {
                        return ExitDecision::Close {
                            reason: ExitReason::TakeProfit,
                        };
                    }
                    return ExitDecision::Partial {
                        fraction: tier.exit_fraction,
                        trigger_pnl_pct: tier.trigger_pnl_pct,
                    };
                }
            }
            // Ladder fully consumed or next rung not reached: fall through to
            // the time check, never to the plain threshold
        } else {
            let take_profit = role.take_profit_pct.unwrap_or(profile.take_profit_pct);
            if pnl >= take_profit {
                return ExitDecision::Close {
                    reason: ExitReason::TakeProfit,
                };
            }
        }

        // 5. Timeout
        let limit = match role.max_hold {
            HoldLimit::Profile => profile.max_hold_ms,
            HoldLimit::Unlimited => None,
            HoldLimit::Capped(ms) => Some(ms),
        };
        if let Some(limit_ms) = limit {
            if position.age_ms(now_ms) >= limit_ms {
                return ExitDecision::Close {
                    reason: ExitReason::Timeout,
                };
            }
        }

        ExitDecision::Hold
    }

    /// Trailing distance for a role, falling back to the profile
    pub fn trailing_stop_pct(&self, role: Role, profile: &StrategyProfile) -> f64 {
        self.role_policy(role)
            .trailing_stop_pct
            .unwrap_or(profile.trailing_stop_pct)
    }
}

impl Default for ExitPolicy {
    /// Built-in rulebook. Like the profile defaults these numbers are
    /// configuration; operators override them per role in the config file.
    fn default() -> Self {
        Self {
            emergency_floor_pct: -50.0,
            scalp: RolePolicy {
                take_profit_pct: Some(8.0),
                trailing_stop_pct: Some(0.04),
                max_hold: HoldLimit::Capped(30 * 60 * 1000),
                partial_tiers: Vec::new(),
            },
            momentum: RolePolicy {
                take_profit_pct: Some(25.0),
                trailing_stop_pct: None,
                max_hold: HoldLimit::Capped(4 * 60 * 60 * 1000),
                partial_tiers: Vec::new(),
            },
            moonshot: RolePolicy {
                take_profit_pct: None,
                trailing_stop_pct: Some(0.15),
                max_hold: HoldLimit::Unlimited,
                partial_tiers: vec![
                    PartialTier {
                        trigger_pnl_pct: 100.0,
                        exit_fraction: 0.25,
                    },
                    PartialTier {
                        trigger_pnl_pct: 300.0,
                        exit_fraction: 0.25,
                    },
                    PartialTier {
                        trigger_pnl_pct: 900.0,
                        exit_fraction: 1.0,
                    },
                ],
            },
            hedge: RolePolicy {
                take_profit_pct: None,
                trailing_stop_pct: None,
                max_hold: HoldLimit::Unlimited,
                partial_tiers: Vec::new(),
            },
            default: RolePolicy::profile_driven(),
        }
    }
}
