//! Risk engine: exit policy, per-tick evaluation and the run loop's cadence.

pub mod exit_policy;
pub mod risk_engine;
pub mod scheduler;

pub use exit_policy::{ExitDecision, ExitPolicy, HoldLimit, PartialTier, RolePolicy};
pub use risk_engine::{EngineError, RiskEngine, TickReport};
pub use scheduler::{Scheduler, ShutdownHandle};
