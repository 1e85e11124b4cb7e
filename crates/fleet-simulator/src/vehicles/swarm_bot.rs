//! Swarm bot state machine.
//!
//! A bot follows an assigned street when it has one, otherwise it moves in
//! a straight line toward its target.

use super::{ARRIVAL_EPSILON, DELIVERY_TICKS, FleetEvent, TickContext};
use fleet_domain::{
    Direction, HANDOFF_DURATION, LatLng, SwarmBot, SwarmBotState, VehicleClass,
};
use tracing::{debug, warn};

const CLASS: VehicleClass = VehicleClass::SwarmBot;

/// Battery level at which a charging bot becomes idle.
pub const CHARGED_LEVEL: f64 = 90.0;
/// Per-tick activation chance of an idle bot, before time scaling.
pub const ACTIVATION_CHANCE: f64 = 0.002;
/// Half-width of the random target box around the base.
pub const TARGET_SPREAD: f64 = 0.005;

/// Advance one swarm bot by one tick.
pub fn step(bot: &SwarmBot, ctx: &mut TickContext<'_>) -> SwarmBot {
    let mut next = bot.clone();

    match bot.state {
        SwarmBotState::Swarming | SwarmBotState::EnRoute => {
            if has_street(&next, ctx) {
                advance_on_street(&mut next, ctx);
            } else if let Some(target) = next.target_position {
                if move_toward(&mut next.core.position, target, ctx.travel(CLASS)) {
                    transition(&mut next, SwarmBotState::Delivering);
                }
            }

            let battery = next.core.battery - ctx.drain(CLASS, 1.0);
            next.core.set_battery(battery);

            if next.core.is_low_battery() {
                next.core.direction = Direction::Reverse;
                transition(&mut next, SwarmBotState::Returning);
            }
        }
        SwarmBotState::Delivering => {
            next.delivery_progress += 1;
            if next.delivery_progress >= DELIVERY_TICKS {
                ctx.events.push(FleetEvent::DeliveryComplete {
                    vehicle_id: next.core.id.clone(),
                    class: CLASS,
                    packages: next.core.packages,
                });
                next.core.packages = 0;
                next.delivery_progress = 0;
                next.core.direction = Direction::Reverse;
                transition(&mut next, SwarmBotState::Returning);
            }
        }
        SwarmBotState::Returning => {
            let arrived = if has_street(&next, ctx) {
                return_on_street(&mut next, ctx)
            } else {
                let home = if next.markers.rebalancing {
                    next.target_position.unwrap_or(next.base_position)
                } else {
                    next.base_position
                };
                move_toward(&mut next.core.position, home, ctx.travel(CLASS))
            };

            let battery = next.core.battery - ctx.drain(CLASS, 0.5);
            next.core.set_battery(battery);

            if arrived {
                if next.markers.rebalancing {
                    next.base_position = next.core.position;
                    next.markers.rebalancing = false;
                }
                dock(&mut next, ctx);
            }
        }
        SwarmBotState::Charging => {
            if ctx.hubs.can_charge(&next.core) {
                let battery = next.core.battery + ctx.charge(CLASS);
                next.core.set_battery(battery);
            }
            if next.core.battery >= CHARGED_LEVEL {
                ctx.hubs.release(&next.core.id);
                next.core.target_hub = None;
                next.core.route_id = None;
                next.core.progress = 0.0;
                next.core.direction = Direction::Forward;
                next.target_position = None;
                transition(&mut next, SwarmBotState::Idle);
            }
        }
        SwarmBotState::Idle => {
            if ctx.rng.chance(ACTIVATION_CHANCE * ctx.time_scale) {
                activate(&mut next, ctx);
            }
        }
        SwarmBotState::HandoffWaiting | SwarmBotState::HandoffActive => {
            next.core.handoff_progress += 1;
            if next.core.handoff_progress >= HANDOFF_DURATION {
                next.core.handoff_progress = 0;
                transition(&mut next, SwarmBotState::Delivering);
            }
        }
    }

    next
}

fn has_street(bot: &SwarmBot, ctx: &TickContext<'_>) -> bool {
    bot.core
        .route_id
        .as_deref()
        .is_some_and(|id| ctx.network.route(id).is_some())
}

fn advance_on_street(next: &mut SwarmBot, ctx: &TickContext<'_>) {
    let progress = next.core.progress + ctx.travel(CLASS) * next.core.direction.sign();
    if progress >= 1.0 {
        next.core.set_progress(1.0);
        transition(next, SwarmBotState::Delivering);
    } else if progress <= 0.0 {
        next.core.set_progress(0.0);
        next.core.direction = Direction::Forward;
    } else {
        next.core.set_progress(progress);
    }
    place_on_street(next, ctx);
}

/// Walk back toward the street start. True once it is reached.
fn return_on_street(next: &mut SwarmBot, ctx: &TickContext<'_>) -> bool {
    next.core.direction = Direction::Reverse;
    let progress = next.core.progress - ctx.travel(CLASS);
    next.core.set_progress(progress);
    place_on_street(next, ctx);
    next.core.progress <= 0.0
}

fn place_on_street(next: &mut SwarmBot, ctx: &TickContext<'_>) {
    if let Some(position) = next
        .core
        .route_id
        .as_deref()
        .and_then(|id| ctx.network.position_on(id, next.core.progress))
    {
        next.core.position = position;
    }
}

/// Step `position` up to `distance` toward `target`. True when within epsilon.
fn move_toward(position: &mut LatLng, target: LatLng, distance: f64) -> bool {
    let remaining = position.distance_to(&target);
    if remaining <= ARRIVAL_EPSILON {
        return true;
    }

    let travelled = distance.min(remaining);
    let t = travelled / remaining;
    *position = position.lerp(&target, t);
    position.distance_to(&target) <= ARRIVAL_EPSILON
}

/// Start charging at the base hub, queueing if it is full.
fn dock(next: &mut SwarmBot, ctx: &mut TickContext<'_>) {
    match next.base_hub.clone() {
        Some(hub_id) => {
            if ctx.hubs.assign(&mut next.core, CLASS, &hub_id).is_none() {
                warn!("{} has unknown base hub {}", next.core.id, hub_id);
            }
        }
        None => debug!("{} charging without a base hub", next.core.id),
    }
    transition(next, SwarmBotState::Charging);
}

fn activate(next: &mut SwarmBot, ctx: &mut TickContext<'_>) {
    next.core.packages = ctx.rng.range_u32(1, CLASS.physics().package_capacity);

    let street = next
        .zone_id
        .as_deref()
        .and_then(|zone| ctx.network.nearest_street(zone, &next.base_position))
        .map(|street| (street.id.clone(), street.end()));

    match street {
        Some((street_id, end)) => {
            next.core.route_id = Some(street_id);
            next.core.progress = 0.0;
            next.core.direction = Direction::Forward;
            next.target_position = end;
        }
        None => {
            next.core.route_id = None;
            next.target_position = Some(next.base_position.offset(
                ctx.rng.spread(TARGET_SPREAD),
                ctx.rng.spread(TARGET_SPREAD),
            ));
        }
    }

    transition(next, SwarmBotState::Swarming);
}

fn transition(bot: &mut SwarmBot, state: SwarmBotState) {
    debug!("{} {} -> {}", bot.core.id, bot.state.as_str(), state.as_str());
    bot.state = state;
}
