//! Decision effect applier.
//!
//! Maps the chosen option of a scenario onto fleet and hub mutations and
//! appends one audit entry to the target vehicle. Calling it twice applies
//! the effect twice; the scenario engine only hands out a pending scenario
//! once.

use crate::hubs::HubRegistry;
use crate::random::RandomSource;
use crate::scenario::catalog::{self, Effect, ScenarioOption};
use fleet_domain::{
    DecisionHistoryEntry, DroneState, Fleet, FleetVehicle, HubType, PodState, Priority, Resolution,
    Scenario, ScenarioType, SimTime, SwarmBotState, VehicleClass,
};
use tracing::{debug, info, warn};

/// Battery below which the priority queue option moves a drone forward.
pub const PRIORITY_QUEUE_BATTERY: f64 = 30.0;
/// Half-width of the jitter applied to a rebalanced bot's target.
pub const REBALANCE_JITTER: f64 = 0.005;
/// Swarm bots a pod picks up for transport.
pub const BOTS_PER_POD: u32 = 4;
/// Altitude shed by a safe-zone landing.
pub const SAFE_LANDING_DESCENT: f64 = 20.0;

/// Mutable state an effect may touch.
pub struct EffectContext<'a> {
    pub fleet: &'a mut Fleet,
    pub hubs: &'a mut HubRegistry,
    pub rng: &'a mut dyn RandomSource,
    pub now: SimTime,
}

/// Apply `option_id` of `scenario`.
///
/// Returns false, leaving everything untouched, when the option is not
/// part of the scenario's catalog entry.
pub fn apply_effect(
    scenario: &Scenario,
    option_id: &str,
    resolution: Resolution,
    ctx: &mut EffectContext<'_>,
) -> bool {
    let config = catalog::config(scenario.scenario_type);
    let Some(option) = config.option(option_id) else {
        warn!(
            "Unknown option '{}' for {} scenario {}; ignoring",
            option_id, scenario.scenario_type, scenario.id
        );
        return false;
    };

    let target = scenario.vehicle_id.as_str();
    match option.effect {
        Effect::GroundDrones => ground_zone(scenario, ctx),
        Effect::ReduceAltitude { value } => {
            if let Some(drone) = ctx.fleet.drone_mut(target) {
                drone.altitude = drone.altitude.min(value);
                drone.markers.reduced_altitude = true;
            }
        }
        Effect::NoAction => {
            if scenario.scenario_type == ScenarioType::WeatherAlert {
                if let Some(drone) = ctx.fleet.drone_mut(target) {
                    drone.markers.weather_override = true;
                }
            }
        }
        Effect::Wait { timeout_secs } => {
            if let Some(drone) = ctx.fleet.drone_mut(target) {
                drone.handoff_deadline = Some(ctx.now.plus_secs(timeout_secs));
            }
        }
        Effect::RedirectHandoff => {
            if let Some(drone) = ctx.fleet.drone_mut(target) {
                let next_point = ctx
                    .hubs
                    .nearest_handoff_point(&drone.core.position, drone.handoff_point.as_deref())
                    .map(|hub| hub.id.clone());
                drone.state = DroneState::Flying;
                drone.core.handoff_progress = 0;
                drone.handoff_waiting_since = None;
                drone.handoff_point = next_point;
                drone.markers.redirected = true;
            }
        }
        Effect::DirectDelivery => {
            if let Some(drone) = ctx.fleet.drone_mut(target) {
                drone.state = DroneState::Landing;
                drone.core.handoff_progress = 0;
                drone.handoff_waiting_since = None;
                drone.markers.direct_delivery = true;
            }
        }
        Effect::PriorityIntercept { priority } => intercept(scenario, priority, ctx),
        Effect::DispatchReserve => dispatch_reserve(ctx),
        Effect::RedistributeToHubs => redistribute(scenario.vehicle_class, ctx),
        Effect::PriorityQueue => {
            for drone in &mut ctx.fleet.drones {
                if drone.core.battery < PRIORITY_QUEUE_BATTERY {
                    drone.core.priority = Priority::Priority;
                    drone.markers.queue_prioritized = true;
                    if ctx.hubs.prioritize(&drone.core.id) {
                        debug!("{} moved to the front of its hub queue", drone.core.id);
                    }
                }
            }
        }
        Effect::LowerThreshold { value } => {
            for drone in &mut ctx.fleet.drones {
                drone.low_battery_threshold = value;
                drone.markers.extended_range = true;
            }
        }
        Effect::RushToHub => {
            if let Some(drone) = ctx.fleet.drone_mut(target) {
                let hub_id = ctx
                    .hubs
                    .nearest_hub(&drone.core.position, HubType::Rooftop)
                    .map(|hub| hub.id.clone());
                if let Some(hub_id) = hub_id {
                    ctx.hubs.assign(&mut drone.core, VehicleClass::Drone, &hub_id);
                }
                drone.state = DroneState::Landing;
                drone.markers.emergency_rush = true;
            }
        }
        Effect::EmergencyLand => {
            if let Some(drone) = ctx.fleet.drone_mut(target) {
                drone.state = DroneState::Landing;
                drone.altitude = (drone.altitude - SAFE_LANDING_DESCENT).max(0.0);
                drone.markers.emergency_landing = true;
                drone.markers.safe_zone_landing = true;
            }
        }
        Effect::LandNow => {
            if let Some(drone) = ctx.fleet.drone_mut(target) {
                drone.state = DroneState::Landing;
                drone.altitude = 0.0;
                drone.markers.immediate_landing = true;
            }
        }
        Effect::RebalanceSwarm { count } => {
            let idle = ctx
                .fleet
                .swarm_bots
                .iter_mut()
                .filter(|bot| bot.state == SwarmBotState::Idle)
                .take(count);
            for bot in idle {
                let target = bot.base_position.offset(
                    ctx.rng.spread(REBALANCE_JITTER),
                    ctx.rng.spread(REBALANCE_JITTER),
                );
                bot.state = SwarmBotState::Returning;
                bot.target_position = Some(target);
                bot.core.route_id = None;
                bot.markers.rebalancing = true;
            }
        }
        Effect::PodTransport => {
            if let Some(pod) = ctx
                .fleet
                .pods
                .iter_mut()
                .find(|pod| pod.state == PodState::EnRoute)
            {
                pod.markers.transporting_bots = true;
                pod.bots_to_transport = BOTS_PER_POD;
            }
        }
    }

    record(scenario, option, resolution, ctx);
    true
}

fn record(
    scenario: &Scenario,
    option: &ScenarioOption,
    resolution: Resolution,
    ctx: &mut EffectContext<'_>,
) {
    let entry = DecisionHistoryEntry {
        timestamp: ctx.now,
        scenario_id: scenario.id,
        scenario_type: scenario.scenario_type,
        option_id: option.id.to_string(),
        option_label: option.label.to_string(),
        resolution,
    };

    match ctx
        .fleet
        .core_mut(scenario.vehicle_class, &scenario.vehicle_id)
    {
        Some(core) => {
            core.record_decision(entry);
            info!(
                "{} {} -> '{}' ({:?}) for {}",
                ctx.now, scenario.scenario_type, option.label, resolution, scenario.vehicle_id
            );
        }
        None => warn!(
            "Decision for unknown {} {} not recorded",
            scenario.vehicle_class, scenario.vehicle_id
        ),
    }
}

/// Land every airborne drone sharing the target's zone.
fn ground_zone(scenario: &Scenario, ctx: &mut EffectContext<'_>) {
    let Some(zone) = ctx
        .fleet
        .vehicle(scenario.vehicle_class, &scenario.vehicle_id)
        .map(|v| v.core().zone.clone())
    else {
        return;
    };

    for drone in &mut ctx.fleet.drones {
        if drone.core.zone != zone || !drone.state.is_airborne() {
            continue;
        }
        let hub_id = ctx
            .hubs
            .nearest_hub(&drone.core.position, HubType::Rooftop)
            .map(|hub| hub.id.clone());
        if let Some(hub_id) = hub_id {
            ctx.hubs.assign(&mut drone.core, VehicleClass::Drone, &hub_id);
        }
        drone.state = DroneState::Landing;
        drone.markers.weather_grounded = true;
    }
}

fn intercept(scenario: &Scenario, priority: Priority, ctx: &mut EffectContext<'_>) {
    let target = scenario.vehicle_id.as_str();
    match scenario.vehicle_class {
        VehicleClass::Drone => {
            if let Some(drone) = ctx.fleet.drone_mut(target) {
                drone.core.priority = priority;
                drone.core.packages += 1;
                drone.markers.intercepting = true;
            }
        }
        VehicleClass::Pod => {
            if let Some(pod) = ctx.fleet.pod_mut(target) {
                pod.core.priority = priority;
                pod.core.packages += 1;
                pod.markers.intercepting = true;
            }
        }
        VehicleClass::SwarmBot => {
            if let Some(bot) = ctx.fleet.swarm_bot_mut(target) {
                bot.core.priority = priority;
            }
        }
    }
}

fn dispatch_reserve(ctx: &mut EffectContext<'_>) {
    let reserve = ctx
        .fleet
        .drones
        .iter_mut()
        .find(|d| matches!(d.state, DroneState::Idle | DroneState::Charging));
    let Some(drone) = reserve else {
        debug!("No reserve drone available");
        return;
    };

    ctx.hubs.release(&drone.core.id);
    drone.state = DroneState::TakingOff;
    drone.core.priority = Priority::Emergency;
    drone.markers.dispatched_for_priority = true;
}

fn redistribute(class: VehicleClass, ctx: &mut EffectContext<'_>) {
    match class {
        VehicleClass::Drone => {
            for drone in &mut ctx.fleet.drones {
                if !matches!(drone.state, DroneState::Charging | DroneState::Landing) {
                    continue;
                }
                let current = drone.core.target_hub.clone().unwrap_or_default();
                let alternate = ctx
                    .hubs
                    .alternate_hub(&drone.core.position, HubType::Rooftop, &current)
                    .map(|hub| hub.id.clone());
                if let Some(hub_id) = alternate {
                    ctx.hubs.reassign(&mut drone.core, VehicleClass::Drone, &hub_id);
                    drone.markers.redistributed = true;
                }
            }
        }
        VehicleClass::Pod | VehicleClass::SwarmBot => {
            for pod in &mut ctx.fleet.pods {
                if pod.state != PodState::Charging {
                    continue;
                }
                let current = pod.core.target_hub.clone().unwrap_or_default();
                let alternate = ctx
                    .hubs
                    .alternate_hub(&pod.core.position, HubType::Street, &current)
                    .map(|hub| hub.id.clone());
                if let Some(hub_id) = alternate {
                    ctx.hubs.reassign(&mut pod.core, VehicleClass::Pod, &hub_id);
                    pod.markers.redistributed = true;
                }
            }
        }
    }
}
