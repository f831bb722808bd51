mod gate;
mod store;

pub use gate::ArmingGate;
pub use store::{EntityRecord, EntityTracker, Observation};
