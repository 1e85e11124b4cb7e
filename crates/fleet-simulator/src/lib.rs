//! # Fleet Simulator
//!
//! Real-time simulator for a mixed autonomous delivery fleet: aerial
//! drones, ground pods and sidewalk swarm bots.
//!
//! ## Features
//!
//! - Route and street interpolation
//! - Hub slot reservation with FIFO queues
//! - Per-class vehicle state machines
//! - Human-in-the-loop scenarios with AI fallback on expiry
//! - Telemetry message shapes and a control API client

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod effects;
pub mod error;
pub mod fleet;
pub mod hubs;
pub mod network;
pub mod random;
pub mod route;
pub mod scenario;
pub mod telemetry;
pub mod transport;
pub mod vehicles;

pub use clock::SimClock;
pub use config::SimulatorConfig;
pub use error::{Result, SimulatorError};
pub use fleet::{FleetConfig, Simulation, TickReport};
pub use hubs::HubRegistry;
pub use network::CityNetwork;
pub use random::{RandomSource, ScriptedRandom, SeededRandom};
pub use scenario::{ExpiryPolicy, ScenarioEngine, TriggerRates};
pub use telemetry::{FleetSnapshot, TelemetryMessage};
pub use transport::{Command, ControlClient};
