//! Fleet summary metrics.
//!
//! Everything here is a pure fold over borrowed snapshots; nothing is
//! mutated and an empty fleet yields all-zero metrics.

use fleet_domain::{
    Drone, Fleet, FleetVehicle, Hub, HubType, LOW_BATTERY_THRESHOLD, Pod, SwarmBot, VehicleClass,
};
use serde::{Deserialize, Serialize};

/// Fleet-wide summary metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetStats {
    /// Vehicles across all classes
    pub total_vehicles: usize,
    /// Neither idle nor charging
    pub active: usize,
    /// Charging or swapping a battery
    pub charging: usize,
    /// Carrying at least one package
    pub delivering: usize,
    /// Battery below the low-battery threshold
    pub low_battery: usize,
    /// Active share of the fleet, in percent
    pub utilization: f64,
    /// Mean battery percent
    pub avg_battery: f64,
}

/// Per-class breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    /// Vehicle class
    pub class: VehicleClass,
    /// Vehicles of this class
    pub total: usize,
    /// Neither idle nor charging
    pub active: usize,
    /// Following a route or heading to a target
    pub moving: usize,
    /// Charging or swapping
    pub charging: usize,
    /// Waiting for or performing a handoff
    pub in_handoff: usize,
    /// Packages on board
    pub packages: u32,
    /// Mean battery percent
    pub avg_battery: f64,
}

/// Load on one hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubLoad {
    /// Hub id
    pub hub_id: String,
    /// Display name
    pub name: String,
    /// Hub type
    pub hub_type: HubType,
    /// Slots held
    pub occupancy: u32,
    /// Slots across all classes
    pub capacity: u32,
    /// Vehicles waiting for a slot
    pub queued: usize,
    /// Occupied share of capacity, in percent
    pub utilization: f64,
}

/// Fold the three vehicle collections into summary metrics.
pub fn aggregate(drones: &[Drone], pods: &[Pod], swarm_bots: &[SwarmBot]) -> FleetStats {
    let vehicles = drones
        .iter()
        .map(|d| d as &dyn FleetVehicle)
        .chain(pods.iter().map(|p| p as &dyn FleetVehicle))
        .chain(swarm_bots.iter().map(|b| b as &dyn FleetVehicle));
    fold(vehicles)
}

/// Same as [`aggregate`] for a whole fleet.
pub fn aggregate_fleet(fleet: &Fleet) -> FleetStats {
    aggregate(&fleet.drones, &fleet.pods, &fleet.swarm_bots)
}

fn fold<'a>(vehicles: impl Iterator<Item = &'a dyn FleetVehicle>) -> FleetStats {
    let mut stats = FleetStats::default();
    let mut battery_sum = 0.0;

    for vehicle in vehicles {
        let core = vehicle.core();
        stats.total_vehicles += 1;
        battery_sum += core.battery;

        if vehicle.is_active() {
            stats.active += 1;
        }
        if vehicle.is_charging() {
            stats.charging += 1;
        }
        if core.packages > 0 {
            stats.delivering += 1;
        }
        if core.battery < LOW_BATTERY_THRESHOLD {
            stats.low_battery += 1;
        }
    }

    if stats.total_vehicles > 0 {
        let total = stats.total_vehicles as f64;
        stats.utilization = stats.active as f64 / total * 100.0;
        stats.avg_battery = battery_sum / total;
    }

    stats
}

/// Breakdown per vehicle class, in drone, pod, swarm bot order.
pub fn class_breakdown(fleet: &Fleet) -> Vec<ClassStats> {
    VehicleClass::ALL
        .into_iter()
        .map(|class| {
            let vehicles = fleet.of_class(class);
            let total = vehicles.len();
            let battery_sum: f64 = vehicles.iter().map(|v| v.core().battery).sum();

            ClassStats {
                class,
                total,
                active: vehicles.iter().filter(|v| v.is_active()).count(),
                moving: vehicles.iter().filter(|v| v.is_moving()).count(),
                charging: vehicles.iter().filter(|v| v.is_charging()).count(),
                in_handoff: vehicles.iter().filter(|v| v.is_in_handoff()).count(),
                packages: vehicles.iter().map(|v| v.core().packages).sum(),
                avg_battery: if total == 0 {
                    0.0
                } else {
                    battery_sum / total as f64
                },
            }
        })
        .collect()
}

/// Occupancy and queue length per hub.
pub fn hub_loads(hubs: &[Hub]) -> Vec<HubLoad> {
    hubs.iter()
        .map(|hub| {
            let occupancy = hub.total_occupancy();
            let capacity = hub.capacity.total();
            HubLoad {
                hub_id: hub.id.clone(),
                name: hub.name.clone(),
                hub_type: hub.hub_type,
                occupancy,
                capacity,
                queued: hub.queue.len(),
                utilization: if capacity == 0 {
                    0.0
                } else {
                    f64::from(occupancy) / f64::from(capacity) * 100.0
                },
            }
        })
        .collect()
}

/// Packages currently on board any vehicle.
pub fn packages_in_transit(fleet: &Fleet) -> u32 {
    fleet.vehicles().map(|v| v.core().packages).sum()
}
