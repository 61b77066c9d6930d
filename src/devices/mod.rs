//! Appliances and the power curves that drive them.

/// Appliance on/off state machine.
pub mod appliance;
/// Decoded appliance power curves.
pub mod consumption;
pub mod types;

pub use appliance::{Appliance, ApplianceState};
pub use consumption::ConsumptionModel;
pub use types::{LoadStats, PowerKind};
