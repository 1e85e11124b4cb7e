//! Drone flight state machine.

use super::{FleetEvent, TickContext};
use fleet_domain::{Drone, DroneState, HANDOFF_DURATION, HubType, VehicleClass};
use tracing::debug;

const CLASS: VehicleClass = VehicleClass::Drone;

/// Battery level at which a charging drone takes off again.
pub const CHARGED_LEVEL: f64 = 95.0;
/// Cruise altitude, normalized.
pub const CRUISE_ALTITUDE: f64 = 100.0;
/// Per-tick chance of a demo handoff while carrying packages, before time scaling.
pub const HANDOFF_CHANCE: f64 = 0.0005;

/// Advance one drone by one tick.
pub fn step(drone: &Drone, ctx: &mut TickContext<'_>) -> Drone {
    let mut next = drone.clone();

    match drone.state {
        DroneState::Flying | DroneState::EnRoute => fly(&mut next, ctx),
        DroneState::Landing => {
            next.altitude = (next.altitude - 2.0 * ctx.time_scale).max(0.0);
            if next.altitude <= 0.0 {
                next.altitude = 0.0;
                transition(&mut next, DroneState::Charging);
            }
        }
        DroneState::TakingOff => {
            next.altitude = (next.altitude + 3.0 * ctx.time_scale).min(CRUISE_ALTITUDE);
            if next.altitude >= CRUISE_ALTITUDE {
                next.core.target_hub = None;
                next.core.packages =
                    ctx.rng
                        .range_u32(1, CLASS.physics().package_capacity);
                transition(&mut next, DroneState::Flying);
            }
        }
        DroneState::Hovering => {
            let battery = next.core.battery - ctx.drain(CLASS, 0.5);
            next.core.set_battery(battery);
        }
        DroneState::Charging | DroneState::Swapping => {
            if ctx.hubs.can_charge(&next.core) {
                let battery = next.core.battery + ctx.charge(CLASS);
                next.core.set_battery(battery);
            }
            if next.core.battery >= CHARGED_LEVEL {
                ctx.hubs.release(&next.core.id);
                transition(&mut next, DroneState::TakingOff);
            }
        }
        DroneState::HandoffWaiting => {
            next.core.handoff_progress += 1;
            if next.core.handoff_progress >= HANDOFF_DURATION / 2 {
                transition(&mut next, DroneState::HandoffActive);
            }
        }
        DroneState::HandoffActive => {
            next.core.handoff_progress += 1;
            if next.core.handoff_progress >= HANDOFF_DURATION {
                ctx.events.push(FleetEvent::HandoffComplete {
                    vehicle_id: next.core.id.clone(),
                    class: CLASS,
                    handoff_point: next.handoff_point.take(),
                });
                next.core.packages = 0;
                next.core.handoff_progress = 0;
                next.handoff_waiting_since = None;
                next.handoff_deadline = None;
                transition(&mut next, DroneState::Flying);
            }
        }
        DroneState::Idle | DroneState::Arriving => {}
    }

    next
}

/// Bounce along the corridor, drain, and check for landing or handoff.
fn fly(next: &mut Drone, ctx: &mut TickContext<'_>) {
    let mut progress = next.core.progress + ctx.travel(CLASS) * next.core.direction.sign();
    if progress >= 1.0 {
        progress = 0.99;
        next.core.direction = next.core.direction.flipped();
    } else if progress <= 0.0 {
        progress = 0.01;
        next.core.direction = next.core.direction.flipped();
    }
    next.core.set_progress(progress);

    let battery = next.core.battery - ctx.drain(CLASS, 1.0);
    next.core.set_battery(battery);

    if let Some(position) = next
        .core
        .route_id
        .as_deref()
        .and_then(|id| ctx.network.position_on(id, next.core.progress))
    {
        next.core.position = position;
    }

    if next.core.battery < next.low_battery_threshold {
        let hub_id = ctx
            .hubs
            .nearest_hub(&next.core.position, HubType::Rooftop)
            .map(|hub| hub.id.clone());
        if let Some(hub_id) = hub_id {
            ctx.hubs.assign(&mut next.core, CLASS, &hub_id);
        }
        transition(next, DroneState::Landing);
        return;
    }

    if next.core.packages > 0 && ctx.rng.chance(HANDOFF_CHANCE * ctx.time_scale) {
        next.handoff_point = ctx
            .hubs
            .nearest_handoff_point(&next.core.position, None)
            .map(|hub| hub.id.clone());
        next.handoff_waiting_since = Some(ctx.now);
        next.core.handoff_progress = 0;
        transition(next, DroneState::HandoffWaiting);
    }
}

fn transition(drone: &mut Drone, state: DroneState) {
    debug!(
        "{} {} -> {}",
        drone.core.id,
        drone.state.as_str(),
        state.as_str()
    );
    drone.state = state;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedRandom;
    use crate::vehicles::testing::Harness;
    use fleet_domain::{Direction, LatLng, VehicleCore};

    fn drone(state: DroneState, battery: f64, packages: u32) -> Drone {
        let mut core = VehicleCore::new("la-drone-1", "dtla", LatLng::new(34.0452, -118.2551));
        core.set_battery(battery);
        core.packages = packages;
        core.route_id = Some("corridor-dtla-1".to_string());
        core.set_progress(0.5);
        let mut drone = Drone::new(core);
        drone.state = state;
        drone
    }

    #[test]
    fn test_flying_advances_and_drains() {
        let mut harness = Harness::new(ScriptedRandom::constant(0.999));
        let before = drone(DroneState::Flying, 80.0, 1);
        let after = step(&before, &mut harness.ctx(100.0, 1.0));

        assert!((after.core.progress - 0.51).abs() < 1e-9);
        assert!((after.core.battery - 79.998).abs() < 1e-9);
        assert_eq!(after.state, DroneState::Flying);
        assert_ne!(after.core.position, before.core.position);
    }

    #[test]
    fn test_bounces_at_corridor_end() {
        let mut harness = Harness::new(ScriptedRandom::constant(0.999));
        let mut before = drone(DroneState::Flying, 80.0, 0);
        before.core.set_progress(0.999);
        let after = step(&before, &mut harness.ctx(100.0, 1.0));

        assert!((after.core.progress - 0.99).abs() < 1e-12);
        assert_eq!(after.core.direction, Direction::Reverse);
    }

    #[test]
    fn test_low_battery_lands_at_nearest_rooftop() {
        // Random draw of 0.0 would fire a handoff; low battery wins.
        let mut harness = Harness::new(ScriptedRandom::constant(0.0));
        let before = drone(DroneState::Flying, 20.0, 2);
        let after = step(&before, &mut harness.ctx(100.0, 1.0));

        assert_eq!(after.state, DroneState::Landing);
        assert_eq!(after.core.target_hub.as_deref(), Some("hub-dtla-1"));
        assert!(harness.hubs.get("hub-dtla-1").unwrap().holds("la-drone-1"));
    }

    #[test]
    fn test_random_handoff_records_point() {
        let mut harness = Harness::new(ScriptedRandom::constant(0.0));
        let before = drone(DroneState::Flying, 80.0, 2);
        let after = step(&before, &mut harness.ctx(100.0, 1.0));

        assert_eq!(after.state, DroneState::HandoffWaiting);
        assert!(after.handoff_point.is_some());
        assert_eq!(after.handoff_waiting_since, Some(fleet_domain::SimTime::ZERO));
    }

    #[test]
    fn test_landing_then_charging_then_takeoff() {
        let mut harness = Harness::new(ScriptedRandom::constant(0.999));
        let mut current = drone(DroneState::Landing, 10.0, 0);
        current.altitude = 3.0;

        current = step(&current, &mut harness.ctx(16.0, 1.0));
        assert_eq!(current.state, DroneState::Landing);
        current = step(&current, &mut harness.ctx(16.0, 1.0));
        assert_eq!(current.state, DroneState::Charging);
        assert_eq!(current.altitude, 0.0);

        current.core.set_battery(94.99);
        current = step(&current, &mut harness.ctx(16.0, 1.0));
        assert_eq!(current.state, DroneState::TakingOff);

        current.altitude = 99.0;
        current = step(&current, &mut harness.ctx(16.0, 1.0));
        assert_eq!(current.state, DroneState::Flying);
        assert_eq!(current.core.target_hub, None);
        assert!((1..=2).contains(&current.core.packages));
    }

    #[test]
    fn test_queued_drone_does_not_charge() {
        let mut harness = Harness::new(ScriptedRandom::constant(0.999));
        // hub-sm-rooftop has three drone slots
        for i in 0..3 {
            let mut holder = VehicleCore::new(format!("holder-{i}"), "santa_monica", LatLng::default());
            harness.hubs.assign(&mut holder, VehicleClass::Drone, "hub-sm-rooftop");
        }
        let mut waiting = drone(DroneState::Charging, 50.0, 0);
        harness
            .hubs
            .assign(&mut waiting.core, VehicleClass::Drone, "hub-sm-rooftop");

        let after = step(&waiting, &mut harness.ctx(16.0, 1.0));
        assert_eq!(after.core.battery, 50.0);

        harness.hubs.release("holder-0");
        let after = step(&after, &mut harness.ctx(16.0, 1.0));
        assert!(after.core.battery > 50.0);
    }

    #[test]
    fn test_handoff_completes_after_duration() {
        let mut harness = Harness::new(ScriptedRandom::constant(0.999));
        let mut current = drone(DroneState::HandoffWaiting, 80.0, 2);
        current.handoff_point = Some("handoff-dtla-1".to_string());

        let mut ctx = harness.ctx(16.0, 1.0);
        for _ in 0..HANDOFF_DURATION {
            current = step(&current, &mut ctx);
        }

        assert_eq!(current.state, DroneState::Flying);
        assert_eq!(current.core.packages, 0);
        assert_eq!(current.core.handoff_progress, 0);
        assert_eq!(
            ctx.events,
            vec![FleetEvent::HandoffComplete {
                vehicle_id: "la-drone-1".to_string(),
                class: VehicleClass::Drone,
                handoff_point: Some("handoff-dtla-1".to_string()),
            }]
        );
    }

    #[test]
    fn test_battery_stays_in_range() {
        let mut harness = Harness::new(ScriptedRandom::constant(0.999));
        let mut current = drone(DroneState::Hovering, 0.0001, 0);
        current = step(&current, &mut harness.ctx(16.0, 50.0));
        assert_eq!(current.core.battery, 0.0);

        let mut charging = drone(DroneState::Charging, 99.9, 0);
        charging.core.target_hub = None;
        charging = step(&charging, &mut harness.ctx(16.0, 50.0));
        assert_eq!(charging.core.battery, 100.0);
    }
}
