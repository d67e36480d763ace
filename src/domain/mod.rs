//! Domain Layer
//!
//! Pure position and risk-parameter types. All external interaction goes
//! through the ports layer; nothing here touches the network.

pub mod position;
pub mod profile;
pub mod store;

pub use position::{ExitReason, Position, PositionError, PositionStatus, Role};
pub use profile::{ProfileError, ProfileTable, StrategyProfile};
pub use store::{PositionStore, StoreError};
