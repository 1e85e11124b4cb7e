//! Ground pod state machine.

use super::{DISPATCH_TICKS, LOAD_TICKS, TickContext};
use fleet_domain::{HubType, Pod, PodState, VehicleClass};
use tracing::debug;

const CLASS: VehicleClass = VehicleClass::Pod;

/// Battery level at which a charging pod goes back to loading.
pub const CHARGED_LEVEL: f64 = 95.0;
/// Packages handed to swarm bots per dispatch stop.
pub const PACKAGES_PER_DISPATCH: u32 = 5;

/// Advance one pod by one tick.
pub fn step(pod: &Pod, ctx: &mut TickContext<'_>) -> Pod {
    let mut next = pod.clone();

    match pod.state {
        PodState::EnRoute => drive(&mut next, ctx),
        PodState::Dispatching => {
            next.dispatch_progress += 1;
            if next.dispatch_progress >= DISPATCH_TICKS {
                next.core.packages = next.core.packages.saturating_sub(PACKAGES_PER_DISPATCH);
                next.dispatch_progress = 0;
                next.markers.transporting_bots = false;
                next.bots_to_transport = 0;
                transition(&mut next, PodState::EnRoute);
            }
        }
        PodState::Loading | PodState::Unloading => {
            next.load_progress += 1;
            if next.load_progress >= LOAD_TICKS {
                next.core.packages = if pod.state == PodState::Loading {
                    CLASS.physics().package_capacity
                } else {
                    0
                };
                next.load_progress = 0;
                transition(&mut next, PodState::EnRoute);
            }
        }
        PodState::Charging => {
            if ctx.hubs.can_charge(&next.core) {
                let battery = next.core.battery + ctx.charge(CLASS);
                next.core.set_battery(battery);
            }
            if next.core.battery >= CHARGED_LEVEL {
                ctx.hubs.release(&next.core.id);
                next.core.target_hub = None;
                transition(&mut next, PodState::Loading);
            }
        }
    }

    next
}

fn drive(next: &mut Pod, ctx: &mut TickContext<'_>) {
    let mut progress = next.core.progress + ctx.travel(CLASS) * next.core.direction.sign();
    if progress >= 1.0 {
        progress = 0.99;
        next.core.direction = next.core.direction.flipped();
        if next.core.packages > 0 {
            transition(next, PodState::Dispatching);
        }
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

    if next.core.is_low_battery() {
        let hub_id = ctx
            .hubs
            .nearest_hub(&next.core.position, HubType::Street)
            .map(|hub| hub.id.clone());
        if let Some(hub_id) = hub_id {
            ctx.hubs.assign(&mut next.core, CLASS, &hub_id);
        }
        next.dispatch_progress = 0;
        transition(next, PodState::Charging);
    }
}

fn transition(pod: &mut Pod, state: PodState) {
    debug!("{} {} -> {}", pod.core.id, pod.state.as_str(), state.as_str());
    pod.state = state;
}
