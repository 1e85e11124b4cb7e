//! Decision requests raised from fleet state.

pub mod catalog;
pub mod engine;

pub use catalog::{Effect, ScenarioConfig, ScenarioOption};
pub use engine::{ExpiryPolicy, MAX_PENDING, ScenarioEngine, TriggerRates};
