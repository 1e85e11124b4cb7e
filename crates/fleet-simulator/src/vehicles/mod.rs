//! Per-class vehicle state machines.
//!
//! Each `step` takes the previous snapshot of one vehicle and returns the
//! next one. Shared mutable state (hub slots, randomness, emitted events)
//! travels in the [`TickContext`].

pub mod drone;
pub mod pod;
pub mod swarm_bot;

use crate::hubs::HubRegistry;
use crate::network::CityNetwork;
use crate::random::RandomSource;
use fleet_domain::{SimTime, VehicleClass};
use serde::{Deserialize, Serialize};

/// Ticks a pod spends dispatching swarm bots at the end of its route.
pub const DISPATCH_TICKS: u32 = 80;
/// Ticks a pod spends loading or unloading.
pub const LOAD_TICKS: u32 = 60;
/// Ticks a swarm bot spends handing over a package.
pub const DELIVERY_TICKS: u32 = 40;
/// Distance below which a swarm bot has reached its target.
pub const ARRIVAL_EPSILON: f64 = 0.0001;

/// Something observable that happened during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FleetEvent {
    HandoffComplete {
        vehicle_id: String,
        class: VehicleClass,
        handoff_point: Option<String>,
    },
    DeliveryComplete {
        vehicle_id: String,
        class: VehicleClass,
        packages: u32,
    },
}

/// Everything a state machine may read or touch besides its own vehicle.
pub struct TickContext<'a> {
    pub network: &'a CityNetwork,
    pub hubs: &'a mut HubRegistry,
    pub rng: &'a mut dyn RandomSource,
    pub time_scale: f64,
    /// Frame length in milliseconds multiplied by the time scale
    pub delta_speed: f64,
    pub now: SimTime,
    pub events: Vec<FleetEvent>,
}

impl<'a> TickContext<'a> {
    pub fn new(
        network: &'a CityNetwork,
        hubs: &'a mut HubRegistry,
        rng: &'a mut dyn RandomSource,
        dt_ms: f64,
        time_scale: f64,
        now: SimTime,
    ) -> Self {
        let time_scale = if time_scale.is_finite() { time_scale.max(0.0) } else { 0.0 };
        let dt_ms = if dt_ms.is_finite() { dt_ms.max(0.0) } else { 0.0 };
        Self {
            network,
            hubs,
            rng,
            time_scale,
            delta_speed: dt_ms * time_scale,
            now,
            events: Vec::new(),
        }
    }

    /// Progress step for a class this tick, before direction.
    pub fn travel(&self, class: VehicleClass) -> f64 {
        class.physics().speed_multiplier * self.delta_speed
    }

    /// Battery lost this tick at `rate` times the class drain.
    pub fn drain(&self, class: VehicleClass, rate: f64) -> f64 {
        class.physics().battery_drain * rate * self.time_scale
    }

    /// Battery gained this tick while charging.
    pub fn charge(&self, class: VehicleClass) -> f64 {
        class.physics().charging_rate * self.time_scale
    }
}
