//! Fleet simulation orchestrating every vehicle class.
//!
//! One [`Simulation`] owns the city network, the fleet, hub occupancy, the
//! scenario engine and the simulated clock. A tick rebuilds every vehicle
//! from its previous snapshot, then expires and raises scenarios against
//! the new fleet.

use crate::clock::SimClock;
use crate::effects::{EffectContext, apply_effect};
use crate::error::{Result, SimulatorError};
use crate::hubs::HubRegistry;
use crate::network::CityNetwork;
use crate::random::RandomSource;
use crate::scenario::{ExpiryPolicy, ScenarioEngine, catalog};
use crate::telemetry::{FleetSnapshot, TelemetryMessage};
use crate::transport::Command;
use crate::vehicles::{self, FleetEvent, TickContext};
use fleet_analytics::{FleetReport, FleetStats, aggregate_fleet};
use fleet_domain::{
    Direction, DomainError, Drone, DroneState, Fleet, HubType, LatLng, Pod, PodState, Resolution,
    Scenario, ScenarioType, SimTime, SwarmBot, SwarmBotState, Uuid, VehicleClass, VehicleCore,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Upper bound accepted by [`Simulation::set_time_scale`].
pub const MAX_TIME_SCALE: f64 = 100.0;
/// Share of swarm bots already out on a delivery at start.
const INITIAL_SWARMING_SHARE: f64 = 0.4;

/// Vehicles created per class at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub drones: usize,
    pub pods: usize,
    /// Spread over the swarm zones, capped by each zone's density
    pub swarm_bots: usize,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            drones: 12,
            pods: 6,
            swarm_bots: 20,
        }
    }
}

/// What one tick produced.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    pub now: SimTime,
    pub events: Vec<FleetEvent>,
    pub opened: Vec<Scenario>,
    pub expired: Vec<Scenario>,
}

/// Multi-class delivery fleet simulation.
pub struct Simulation {
    network: CityNetwork,
    fleet: Fleet,
    hubs: HubRegistry,
    scenarios: ScenarioEngine,
    clock: SimClock,
    rng: Box<dyn RandomSource + Send>,
    time_scale: f64,
    running: bool,
}

impl Simulation {
    /// Create a simulation with a freshly populated fleet.
    pub fn new(
        network: CityNetwork,
        config: FleetConfig,
        scenarios: ScenarioEngine,
        mut rng: Box<dyn RandomSource + Send>,
    ) -> Self {
        let fleet = populate(&network, config, rng.as_mut());
        info!(
            "Populated {} fleet: {} drones, {} pods, {} swarm bots",
            network.name,
            fleet.drones.len(),
            fleet.pods.len(),
            fleet.swarm_bots.len()
        );
        Self::with_fleet(network, fleet, scenarios, rng)
    }

    /// Create a simulation around an existing fleet.
    pub fn with_fleet(
        network: CityNetwork,
        fleet: Fleet,
        scenarios: ScenarioEngine,
        rng: Box<dyn RandomSource + Send>,
    ) -> Self {
        let hubs = HubRegistry::from_network(&network);
        Self {
            network,
            fleet,
            hubs,
            scenarios,
            clock: SimClock::new(),
            rng,
            time_scale: 1.0,
            running: true,
        }
    }

    pub fn network(&self) -> &CityNetwork {
        &self.network
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    pub fn hubs(&self) -> &HubRegistry {
        &self.hubs
    }

    pub fn scenarios(&self) -> &ScenarioEngine {
        &self.scenarios
    }

    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn ticks(&self) -> u64 {
        self.clock.ticks()
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance every vehicle by one frame of `dt_ms` milliseconds.
    ///
    /// Does nothing while stopped.
    pub fn tick(&mut self, dt_ms: f64) -> TickReport {
        if !self.running {
            return TickReport {
                tick: self.clock.ticks(),
                now: self.clock.now(),
                ..TickReport::default()
            };
        }

        let now = self.clock.advance(dt_ms, self.time_scale);
        let mut ctx = TickContext::new(
            &self.network,
            &mut self.hubs,
            self.rng.as_mut(),
            dt_ms,
            self.time_scale,
            now,
        );
        let next = Fleet {
            drones: self
                .fleet
                .drones
                .iter()
                .map(|drone| vehicles::drone::step(drone, &mut ctx))
                .collect(),
            pods: self
                .fleet
                .pods
                .iter()
                .map(|pod| vehicles::pod::step(pod, &mut ctx))
                .collect(),
            swarm_bots: self
                .fleet
                .swarm_bots
                .iter()
                .map(|bot| vehicles::swarm_bot::step(bot, &mut ctx))
                .collect(),
        };
        let events = ctx.events;
        self.fleet = next;

        for event in &events {
            log_event(now, event);
        }

        let expired = self.scenarios.expire_due(now);
        if self.scenarios.policy() == ExpiryPolicy::AutoResolve {
            for scenario in &expired {
                self.auto_resolve(scenario, now);
            }
        }

        let opened = self
            .scenarios
            .evaluate(&self.fleet, &self.hubs, now, self.rng.as_mut());

        TickReport {
            tick: self.clock.ticks(),
            now,
            events,
            opened,
            expired,
        }
    }

    fn effect_context(&mut self) -> EffectContext<'_> {
        EffectContext {
            fleet: &mut self.fleet,
            hubs: &mut self.hubs,
            rng: self.rng.as_mut(),
            now: self.clock.now(),
        }
    }

    /// Apply the recommended option of an expired scenario on the operator's behalf.
    fn auto_resolve(&mut self, scenario: &Scenario, now: SimTime) {
        let Some(option) = catalog::config(scenario.scenario_type).recommended_option() else {
            return;
        };
        info!(
            "{} AI applying '{}' to expired scenario {}",
            now, option.label, scenario.id
        );
        let mut ctx = self.effect_context();
        apply_effect(scenario, option.id, Resolution::Ai, &mut ctx);
    }

    /// Resolve a pending scenario with the operator's choice and apply it.
    pub fn resolve_scenario(&mut self, id: Uuid, option_id: &str) -> Result<Scenario> {
        let now = self.clock.now();
        let scenario = self
            .scenarios
            .resolve(id, option_id, Resolution::Human, now)?;
        let mut ctx = self.effect_context();
        apply_effect(&scenario, option_id, Resolution::Human, &mut ctx);
        Ok(scenario)
    }

    /// Raise a scenario by hand; random type or vehicle when not given.
    pub fn trigger_scenario(
        &mut self,
        scenario_type: Option<ScenarioType>,
        vehicle_id: Option<&str>,
    ) -> Option<Scenario> {
        self.scenarios.trigger(
            scenario_type,
            vehicle_id,
            &self.fleet,
            self.clock.now(),
            self.rng.as_mut(),
        )
    }

    /// Apply a control command locally.
    pub fn apply_command(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::Start => {
                self.running = true;
                info!("Simulation started");
            }
            Command::Stop => {
                self.running = false;
                info!("Simulation stopped at {}", self.clock.now());
            }
            Command::SetTimeScale { value } => self.set_time_scale(*value),
            Command::DispatchDrone {
                drone_id,
                target_pos,
            } => self.dispatch_drone(drone_id, *target_pos)?,
            Command::DispatchPod { pod_id, route_id } => self.dispatch_pod(pod_id, route_id)?,
            Command::DispatchSwarm {
                pod_id,
                count,
                zone_id,
            } => self.dispatch_swarm(pod_id, *count, zone_id)?,
            Command::EmergencyReturn {
                vehicle_id,
                vehicle_type,
            } => self.emergency_return(vehicle_id, *vehicle_type)?,
        }
        Ok(())
    }

    /// Clamp into `0..=MAX_TIME_SCALE`; non-finite values are ignored.
    pub fn set_time_scale(&mut self, value: f64) {
        if !value.is_finite() {
            warn!("Ignoring non-finite time scale {}", value);
            return;
        }
        self.time_scale = value.clamp(0.0, MAX_TIME_SCALE);
        info!("Time scale set to {}", self.time_scale);
    }

    fn nearest_corridor(&self, target: &LatLng) -> Option<String> {
        self.network
            .corridors
            .iter()
            .filter_map(|corridor| {
                corridor
                    .waypoints
                    .iter()
                    .map(|point| point.distance_to(target))
                    .min_by(f64::total_cmp)
                    .map(|distance| (corridor, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(corridor, _)| corridor.id.clone())
    }

    fn dispatch_drone(&mut self, drone_id: &str, target: Option<LatLng>) -> Result<()> {
        let corridor = target.and_then(|target| self.nearest_corridor(&target));
        let drone = self
            .fleet
            .drone_mut(drone_id)
            .ok_or_else(|| not_found("drone", drone_id))?;

        self.hubs.release(&drone.core.id);
        drone.core.target_hub = None;
        drone.handoff_point = None;
        drone.handoff_waiting_since = None;
        drone.handoff_deadline = None;
        drone.core.handoff_progress = 0;
        if let Some(corridor) = corridor {
            drone.core.route_id = Some(corridor);
        }
        drone.state = if drone.state.is_airborne() {
            DroneState::Flying
        } else {
            DroneState::TakingOff
        };
        info!(
            "Dispatched {} on {} ({})",
            drone.core.id,
            drone.core.route_id.as_deref().unwrap_or("no corridor"),
            drone.state.as_str()
        );
        Ok(())
    }

    fn dispatch_pod(&mut self, pod_id: &str, route_id: &str) -> Result<()> {
        if !self.network.pod_routes.iter().any(|r| r.id == route_id) {
            return Err(not_found("pod route", route_id));
        }
        let pod = self
            .fleet
            .pod_mut(pod_id)
            .ok_or_else(|| not_found("pod", pod_id))?;

        self.hubs.release(&pod.core.id);
        pod.core.target_hub = None;
        pod.core.route_id = Some(route_id.to_string());
        pod.core.set_progress(0.0);
        pod.core.direction = Direction::Forward;
        pod.dispatch_progress = 0;
        pod.load_progress = 0;
        if let Some(position) = self.network.position_on(route_id, 0.0) {
            pod.core.position = position;
        }
        pod.state = if pod.core.packages == 0 {
            PodState::Loading
        } else {
            PodState::EnRoute
        };
        info!("Dispatched {} on {}", pod.core.id, route_id);
        Ok(())
    }

    /// Send up to `count` idle bots of a zone out from the pod's position.
    fn dispatch_swarm(&mut self, pod_id: &str, count: u32, zone_id: &str) -> Result<()> {
        let origin = self
            .fleet
            .pod(pod_id)
            .ok_or_else(|| not_found("pod", pod_id))?
            .core
            .position;
        if self.network.swarm_zone(zone_id).is_none() {
            return Err(not_found("swarm zone", zone_id));
        }
        let street = self
            .network
            .nearest_street(zone_id, &origin)
            .map(|street| (street.id.clone(), street.end()));

        let capacity = VehicleClass::SwarmBot.physics().package_capacity;
        let mut sent = 0;
        for bot in self
            .fleet
            .swarm_bots
            .iter_mut()
            .filter(|b| b.state == SwarmBotState::Idle && b.zone_id.as_deref() == Some(zone_id))
            .take(count as usize)
        {
            self.hubs.release(&bot.core.id);
            bot.core.target_hub = None;
            bot.core.position = origin;
            bot.core.packages = self.rng.range_u32(1, capacity);
            match &street {
                Some((street_id, end)) => {
                    bot.core.route_id = Some(street_id.clone());
                    bot.core.set_progress(0.0);
                    bot.core.direction = Direction::Forward;
                    bot.target_position = *end;
                }
                None => {
                    bot.core.route_id = None;
                    bot.target_position = Some(origin.offset(
                        self.rng.spread(vehicles::swarm_bot::TARGET_SPREAD),
                        self.rng.spread(vehicles::swarm_bot::TARGET_SPREAD),
                    ));
                }
            }
            bot.state = SwarmBotState::Swarming;
            sent += 1;
        }

        if let Some(pod) = self.fleet.pod_mut(pod_id) {
            pod.markers.transporting_bots = sent > 0;
            pod.bots_to_transport = sent;
        }
        if sent < count {
            warn!(
                "Only {} of {} bots idle in {} for {}",
                sent, count, zone_id, pod_id
            );
        }
        info!("{} dispatched {} bots into {}", pod_id, sent, zone_id);
        Ok(())
    }

    fn emergency_return(&mut self, vehicle_id: &str, class: VehicleClass) -> Result<()> {
        match class {
            VehicleClass::Drone => {
                let drone = self
                    .fleet
                    .drone_mut(vehicle_id)
                    .ok_or_else(|| not_found("drone", vehicle_id))?;
                let hub_id = self
                    .hubs
                    .nearest_hub(&drone.core.position, HubType::Rooftop)
                    .map(|hub| hub.id.clone());
                if let Some(hub_id) = hub_id {
                    self.hubs.assign(&mut drone.core, class, &hub_id);
                }
                drone.state = DroneState::Landing;
            }
            VehicleClass::Pod => {
                let pod = self
                    .fleet
                    .pod_mut(vehicle_id)
                    .ok_or_else(|| not_found("pod", vehicle_id))?;
                let hub_id = self
                    .hubs
                    .nearest_hub(&pod.core.position, HubType::Street)
                    .map(|hub| hub.id.clone());
                if let Some(hub_id) = hub_id {
                    self.hubs.assign(&mut pod.core, class, &hub_id);
                }
                pod.state = PodState::Charging;
            }
            VehicleClass::SwarmBot => {
                let bot = self
                    .fleet
                    .swarm_bot_mut(vehicle_id)
                    .ok_or_else(|| not_found("swarm bot", vehicle_id))?;
                self.hubs.release(&bot.core.id);
                bot.core.target_hub = None;
                bot.core.direction = Direction::Reverse;
                bot.state = SwarmBotState::Returning;
            }
        }
        info!("Emergency return ordered for {} {}", class, vehicle_id);
        Ok(())
    }

    pub fn stats(&self) -> FleetStats {
        aggregate_fleet(&self.fleet)
    }

    pub fn report(&self) -> FleetReport {
        FleetReport::build(
            &self.fleet,
            self.hubs.hubs(),
            self.scenarios.scenarios(),
            self.clock.now(),
        )
    }

    /// Full state in the shape of the `delivery:state` payload.
    pub fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot {
            sim_time: self.clock.now(),
            running: self.running,
            time_scale: self.time_scale,
            drones: self.fleet.drones.clone(),
            pods: self.fleet.pods.clone(),
            swarm_bots: self.fleet.swarm_bots.clone(),
            hubs: self.hubs.hubs().to_vec(),
            scenarios: self.scenarios.scenarios().to_vec(),
            metrics: self.stats(),
        }
    }

    pub fn state_message(&self) -> TelemetryMessage {
        TelemetryMessage::State(self.snapshot())
    }
}

fn not_found(entity_type: &str, id: &str) -> SimulatorError {
    DomainError::NotFound {
        entity_type: entity_type.to_string(),
        id: id.to_string(),
    }
    .into()
}

fn log_event(now: SimTime, event: &FleetEvent) {
    match event {
        FleetEvent::HandoffComplete {
            vehicle_id,
            handoff_point,
            ..
        } => info!(
            "{} {} completed handoff at {}",
            now,
            vehicle_id,
            handoff_point.as_deref().unwrap_or("unknown point")
        ),
        FleetEvent::DeliveryComplete {
            vehicle_id,
            class,
            packages,
        } => info!(
            "{} {} {} delivered {} packages",
            now, class, vehicle_id, packages
        ),
    }
}

/// Initials of the network name, e.g. `la` for Los Angeles.
fn id_prefix(name: &str) -> String {
    let prefix: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_lowercase)
        .collect();
    if prefix.is_empty() {
        "fleet".to_string()
    } else {
        prefix
    }
}

fn random_direction(rng: &mut dyn RandomSource) -> Direction {
    if rng.chance(0.5) {
        Direction::Forward
    } else {
        Direction::Reverse
    }
}

/// Build the starting fleet: vehicles spread round-robin over routes and zones.
fn populate(network: &CityNetwork, config: FleetConfig, rng: &mut dyn RandomSource) -> Fleet {
    let prefix = id_prefix(&network.name);
    let mut fleet = Fleet::default();

    let drone_capacity = VehicleClass::Drone.physics().package_capacity;
    for i in 0..config.drones {
        let corridor = network.corridors.get(i % network.corridors.len().max(1));
        let progress = rng.next_f64();
        let position = corridor
            .and_then(|c| network.position_on(&c.id, progress))
            .unwrap_or_default();
        let zone = corridor.map(|c| c.zone.clone()).unwrap_or_default();

        let mut core = VehicleCore::new(format!("{prefix}-drone-{}", i + 1), zone, position);
        core.route_id = corridor.map(|c| c.id.clone());
        core.set_progress(progress);
        core.set_battery(60.0 + rng.next_f64() * 40.0);
        core.direction = random_direction(rng);
        core.packages = rng.range_u32(0, drone_capacity);

        let mut drone = Drone::new(core);
        drone.altitude = 80.0 + rng.next_f64() * 20.0;
        fleet.drones.push(drone);
    }

    let pod_capacity = VehicleClass::Pod.physics().package_capacity;
    for i in 0..config.pods {
        let route = network.pod_routes.get(i % network.pod_routes.len().max(1));
        let progress = rng.next_f64();
        let position = route
            .and_then(|r| network.position_on(&r.id, progress))
            .unwrap_or_default();
        let zone = route.map(|r| r.zone.clone()).unwrap_or_default();

        let mut core = VehicleCore::new(format!("{prefix}-pod-{}", i + 1), zone, position);
        core.route_id = route.map(|r| r.id.clone());
        core.set_progress(progress);
        core.set_battery(70.0 + rng.next_f64() * 30.0);
        core.direction = random_direction(rng);
        core.packages = rng.range_u32(0, pod_capacity.saturating_sub(1));
        fleet.pods.push(Pod::new(core));
    }

    if network.swarm_zones.is_empty() {
        if config.swarm_bots > 0 {
            warn!("No swarm zones in {}; no swarm bots created", network.name);
        }
        return fleet;
    }

    let swarm_capacity = VehicleClass::SwarmBot.physics().package_capacity;
    let per_zone = config.swarm_bots.div_ceil(network.swarm_zones.len());
    let mut remaining = config.swarm_bots;
    for (zi, zone) in network.swarm_zones.iter().enumerate() {
        let count = per_zone.min(zone.density as usize).min(remaining);
        for i in 0..count {
            let position = zone.center.offset(
                rng.spread(zone.radius * 0.4),
                rng.spread(zone.radius * 0.4),
            );
            let mut core = VehicleCore::new(
                format!("{prefix}-swarm-{zi}-{}", i + 1),
                zone.zone.clone(),
                position,
            );
            core.set_battery(50.0 + rng.next_f64() * 50.0);

            let mut bot = SwarmBot::new(core, zone.center);
            bot.zone_id = Some(zone.id.clone());
            bot.base_hub = zone.base_hub.clone();
            if rng.next_f64() > 1.0 - INITIAL_SWARMING_SHARE {
                bot.core.packages = rng.range_u32(1, swarm_capacity);
                bot.target_position = Some(zone.center.offset(
                    rng.spread(vehicles::swarm_bot::TARGET_SPREAD),
                    rng.spread(vehicles::swarm_bot::TARGET_SPREAD),
                ));
                bot.state = SwarmBotState::Swarming;
            }
            fleet.swarm_bots.push(bot);
        }
        remaining -= count;
        debug!("{} swarm bots placed in {}", count, zone.id);
    }

    fleet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{ScriptedRandom, SeededRandom};
    use fleet_domain::{FleetVehicle, ScenarioStatus};

    fn seeded(seed: u64) -> Simulation {
        Simulation::new(
            CityNetwork::los_angeles().unwrap(),
            FleetConfig::default(),
            ScenarioEngine::default(),
            Box::new(SeededRandom::from_seed(seed)),
        )
    }

    /// No probabilistic event ever fires.
    fn quiet(policy: ExpiryPolicy) -> Simulation {
        Simulation::new(
            CityNetwork::los_angeles().unwrap(),
            FleetConfig::default(),
            ScenarioEngine::new(Default::default(), policy),
            Box::new(ScriptedRandom::constant(0.999)),
        )
    }

    #[test]
    fn test_populate_fleet() {
        let sim = seeded(7);
        let fleet = sim.fleet();

        assert_eq!(fleet.drones.len(), 12);
        assert_eq!(fleet.pods.len(), 6);
        assert_eq!(fleet.swarm_bots.len(), 20);
        assert_eq!(fleet.drones[0].core.id, "la-drone-1");
        assert_eq!(fleet.pods[5].core.id, "la-pod-6");

        for drone in &fleet.drones {
            assert_eq!(drone.state, DroneState::Flying);
            assert!((60.0..=100.0).contains(&drone.core.battery));
            assert!(drone.core.route_id.is_some());
            assert!(drone.core.packages <= 2);
        }
        for pod in &fleet.pods {
            assert!((70.0..=100.0).contains(&pod.core.battery));
            assert!(pod.core.packages < 15);
        }
        for bot in &fleet.swarm_bots {
            assert!(bot.zone_id.is_some());
            assert!(bot.base_hub.is_some());
            assert!(matches!(bot.state, SwarmBotState::Idle | SwarmBotState::Swarming));
        }
    }

    #[test]
    fn test_id_prefix() {
        assert_eq!(id_prefix("Los Angeles"), "la");
        assert_eq!(id_prefix("Pasadena"), "p");
        assert_eq!(id_prefix(""), "fleet");
    }

    #[test]
    fn test_long_run_keeps_invariants() {
        let mut sim = seeded(42);
        sim.set_time_scale(10.0);

        for _ in 0..1000 {
            sim.tick(16.0);

            for vehicle in sim.fleet().vehicles() {
                let core = vehicle.core();
                assert!((0.0..=100.0).contains(&core.battery), "{} battery", core.id);
                assert!((0.0..=1.0).contains(&core.progress), "{} progress", core.id);
            }
            assert!(sim.scenarios().pending_count() <= 2);
            for hub in sim.hubs().hubs() {
                for class in VehicleClass::ALL {
                    assert!(hub.occupancy(class) <= hub.capacity.for_class(class));
                }
            }
        }

        assert_eq!(sim.ticks(), 1000);
        assert!((sim.now().as_secs() - 160.0).abs() < 1e-6);
    }

    #[test]
    fn test_stopped_tick_is_noop() {
        let mut sim = quiet(ExpiryPolicy::AutoResolve);
        sim.apply_command(&Command::Stop).unwrap();
        let before = sim.fleet().clone();

        let report = sim.tick(16.0);
        assert_eq!(report.tick, 0);
        assert_eq!(sim.now(), SimTime::ZERO);
        assert_eq!(sim.fleet(), &before);

        sim.apply_command(&Command::Start).unwrap();
        let report = sim.tick(1000.0);
        assert_eq!(report.tick, 1);
        assert!((report.now.as_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_set_time_scale_clamps() {
        let mut sim = quiet(ExpiryPolicy::AutoResolve);
        sim.apply_command(&Command::SetTimeScale { value: 500.0 })
            .unwrap();
        assert_eq!(sim.time_scale(), MAX_TIME_SCALE);
        sim.set_time_scale(-3.0);
        assert_eq!(sim.time_scale(), 0.0);
        sim.set_time_scale(f64::NAN);
        assert_eq!(sim.time_scale(), 0.0);
    }

    #[test]
    fn test_dispatch_pod() {
        let mut sim = quiet(ExpiryPolicy::AutoResolve);
        sim.apply_command(&Command::DispatchPod {
            pod_id: "la-pod-1".to_string(),
            route_id: "pod-route-sm-1".to_string(),
        })
        .unwrap();

        let pod = sim.fleet().pod("la-pod-1").unwrap();
        assert_eq!(pod.core.route_id.as_deref(), Some("pod-route-sm-1"));
        assert_eq!(pod.core.progress, 0.0);
        assert_eq!(pod.core.direction, Direction::Forward);

        let err = sim
            .apply_command(&Command::DispatchPod {
                pod_id: "la-pod-1".to_string(),
                route_id: "corridor-dtla-1".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, SimulatorError::Domain(DomainError::NotFound { .. })));

        let err = sim
            .apply_command(&Command::DispatchPod {
                pod_id: "la-pod-99".to_string(),
                route_id: "pod-route-sm-1".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, SimulatorError::Domain(DomainError::NotFound { .. })));
    }

    #[test]
    fn test_dispatch_drone_from_charger() {
        let mut sim = quiet(ExpiryPolicy::AutoResolve);
        sim.fleet.drones[0].state = DroneState::Charging;
        sim.fleet.drones[1].state = DroneState::Hovering;

        sim.apply_command(&Command::DispatchDrone {
            drone_id: "la-drone-1".to_string(),
            target_pos: None,
        })
        .unwrap();
        sim.apply_command(&Command::DispatchDrone {
            drone_id: "la-drone-2".to_string(),
            target_pos: Some(LatLng::new(34.1, -118.33)),
        })
        .unwrap();

        assert_eq!(sim.fleet().drones[0].state, DroneState::TakingOff);
        let second = &sim.fleet().drones[1];
        assert_eq!(second.state, DroneState::Flying);
        assert_eq!(second.core.route_id.as_deref(), Some("corridor-hollywood-1"));
    }

    #[test]
    fn test_dispatch_swarm_takes_idle_bots() {
        let mut sim = quiet(ExpiryPolicy::AutoResolve);
        for bot in &mut sim.fleet.swarm_bots {
            bot.state = SwarmBotState::Idle;
        }

        sim.apply_command(&Command::DispatchSwarm {
            pod_id: "la-pod-1".to_string(),
            count: 3,
            zone_id: "swarm-zone-sm".to_string(),
        })
        .unwrap();

        let swarming: Vec<&SwarmBot> = sim
            .fleet()
            .swarm_bots
            .iter()
            .filter(|b| b.state == SwarmBotState::Swarming)
            .collect();
        assert_eq!(swarming.len(), 3);
        assert!(swarming
            .iter()
            .all(|b| b.zone_id.as_deref() == Some("swarm-zone-sm") && b.core.packages >= 1));

        let pod = sim.fleet().pod("la-pod-1").unwrap();
        assert!(pod.markers.transporting_bots);
        assert_eq!(pod.bots_to_transport, 3);
    }

    #[test]
    fn test_emergency_return() {
        let mut sim = quiet(ExpiryPolicy::AutoResolve);
        sim.apply_command(&Command::EmergencyReturn {
            vehicle_id: "la-drone-3".to_string(),
            vehicle_type: VehicleClass::Drone,
        })
        .unwrap();
        sim.apply_command(&Command::EmergencyReturn {
            vehicle_id: "la-pod-2".to_string(),
            vehicle_type: VehicleClass::Pod,
        })
        .unwrap();

        let drone = sim.fleet().drone("la-drone-3").unwrap();
        assert_eq!(drone.state, DroneState::Landing);
        let hub = sim.hubs().get(drone.core.target_hub.as_deref().unwrap()).unwrap();
        assert_eq!(hub.hub_type, HubType::Rooftop);
        assert!(hub.holds("la-drone-3"));

        let pod = sim.fleet().pod("la-pod-2").unwrap();
        assert_eq!(pod.state, PodState::Charging);

        let err = sim.apply_command(&Command::EmergencyReturn {
            vehicle_id: "la-drone-3".to_string(),
            vehicle_type: VehicleClass::SwarmBot,
        });
        assert!(err.is_err());
    }

    #[test]
    fn test_resolve_scenario_applies_choice_once() {
        let mut sim = quiet(ExpiryPolicy::AutoResolve);
        let scenario = sim
            .trigger_scenario(Some(ScenarioType::EmergencyLanding), Some("la-drone-1"))
            .unwrap();
        let altitude = sim.fleet().drone("la-drone-1").unwrap().altitude;

        let resolved = sim.resolve_scenario(scenario.id, "safe-landing").unwrap();
        assert!(matches!(resolved.status, ScenarioStatus::Resolved { .. }));

        let drone = sim.fleet().drone("la-drone-1").unwrap();
        assert_eq!(drone.state, DroneState::Landing);
        assert!(drone.markers.safe_zone_landing);
        assert!((drone.altitude - (altitude - 20.0).max(0.0)).abs() < 1e-9);
        assert_eq!(drone.core.decision_history.len(), 1);
        assert_eq!(drone.core.decision_history[0].resolution, Resolution::Human);

        assert!(sim.resolve_scenario(scenario.id, "safe-landing").is_err());
        let drone = sim.fleet().drone("la-drone-1").unwrap();
        assert_eq!(drone.core.decision_history.len(), 1);
    }

    #[test]
    fn test_expired_scenario_is_auto_resolved() {
        let mut sim = quiet(ExpiryPolicy::AutoResolve);
        let scenario = sim
            .trigger_scenario(Some(ScenarioType::EmergencyLanding), Some("la-drone-1"))
            .unwrap();

        let report = sim.tick(21_000.0);
        assert_eq!(report.expired.len(), 1);
        assert_eq!(report.expired[0].id, scenario.id);

        let drone = sim.fleet().drone("la-drone-1").unwrap();
        assert_eq!(drone.state, DroneState::Landing);
        assert_eq!(drone.core.decision_history.len(), 1);
        assert_eq!(drone.core.decision_history[0].resolution, Resolution::Ai);
        assert_eq!(drone.core.decision_history[0].option_id, "safe-landing");

        let report = sim.tick(16.0);
        assert!(report.expired.is_empty());
    }

    #[test]
    fn test_expire_only_leaves_fleet_alone() {
        let mut sim = quiet(ExpiryPolicy::ExpireOnly);
        sim.trigger_scenario(Some(ScenarioType::WeatherAlert), Some("la-drone-2"))
            .unwrap();

        let report = sim.tick(31_000.0);
        assert_eq!(report.expired.len(), 1);
        assert!(sim.fleet().drone("la-drone-2").unwrap().core.decision_history.is_empty());
    }

    #[test]
    fn test_snapshot_matches_state() {
        let mut sim = quiet(ExpiryPolicy::AutoResolve);
        sim.tick(16.0);
        let snapshot = sim.snapshot();

        assert_eq!(snapshot.drones.len(), 12);
        assert_eq!(snapshot.swarm_bots.len(), 20);
        assert_eq!(snapshot.hubs.len(), sim.hubs().hubs().len());
        assert_eq!(snapshot.metrics.total_vehicles, 38);
        assert_eq!(snapshot.fleet(), *sim.fleet());
        assert_eq!(sim.state_message().kind(), "delivery:state");
    }
}
