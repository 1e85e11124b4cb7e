//! Scenario trigger and decision engine.
//!
//! Samples the fleet after every tick and opens decision requests. At most
//! [`MAX_PENDING`] are open at once and a vehicle never has two pending
//! requests of the same type.

use super::catalog;
use crate::error::{Result, SimulatorError};
use crate::hubs::HubRegistry;
use crate::random::RandomSource;
use fleet_domain::{
    DomainError, DroneState, Fleet, FleetVehicle, Resolution, Scenario, ScenarioStatus,
    ScenarioType, SimTime, SwarmBotState, Uuid, VehicleClass,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};

/// Open decision requests allowed at once.
pub const MAX_PENDING: usize = 2;
/// Closed scenarios kept for reporting.
pub const ARCHIVE_LIMIT: usize = 100;

/// Thresholds and per-tick probabilities for raising scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerRates {
    /// Chance per flying drone per tick
    pub weather: f64,
    /// Chance per vehicle per tick
    pub priority: f64,
    /// Chance per tick of a random demo scenario
    pub demo: f64,
    /// Drone battery percent below which an emergency landing is raised
    pub emergency_battery: f64,
    /// Simulated seconds a drone may wait at a handoff point
    pub handoff_timeout_secs: f64,
    /// Hub class occupancy ratio treated as congested
    pub congestion_ratio: f64,
    /// Idle-share spread between swarm zones treated as imbalanced
    pub swarm_imbalance: f64,
}

impl Default for TriggerRates {
    fn default() -> Self {
        Self {
            weather: 0.0001,
            priority: 0.00005,
            demo: 0.001,
            emergency_battery: 12.0,
            handoff_timeout_secs: 60.0,
            congestion_ratio: 0.85,
            swarm_imbalance: 0.4,
        }
    }
}

/// What happens when a scenario's countdown runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Apply the recommended option on behalf of the operator
    #[default]
    AutoResolve,
    ExpireOnly,
}

impl FromStr for ExpiryPolicy {
    type Err = SimulatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto_resolve" | "auto-resolve" => Ok(Self::AutoResolve),
            "expire_only" | "expire-only" => Ok(Self::ExpireOnly),
            other => Err(SimulatorError::Config(format!(
                "unknown expiry policy '{other}'"
            ))),
        }
    }
}

/// Pending decision requests plus a bounded archive of closed ones.
#[derive(Debug, Clone, Default)]
pub struct ScenarioEngine {
    rates: TriggerRates,
    policy: ExpiryPolicy,
    scenarios: Vec<Scenario>,
}

impl ScenarioEngine {
    pub fn new(rates: TriggerRates, policy: ExpiryPolicy) -> Self {
        Self {
            rates,
            policy,
            scenarios: Vec::new(),
        }
    }

    pub fn rates(&self) -> &TriggerRates {
        &self.rates
    }

    pub fn policy(&self) -> ExpiryPolicy {
        self.policy
    }

    /// Every tracked scenario, oldest first.
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn pending(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter().filter(|s| s.is_pending())
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    pub fn get(&self, id: Uuid) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    fn has_room(&self) -> bool {
        self.pending_count() < MAX_PENDING
    }

    fn is_duplicate(&self, scenario_type: ScenarioType, vehicle_id: &str) -> bool {
        self.pending()
            .any(|s| s.scenario_type == scenario_type && s.vehicle_id == vehicle_id)
    }

    /// Open a scenario for a vehicle if the cap and dedupe rules allow it.
    fn open(
        &mut self,
        scenario_type: ScenarioType,
        vehicle_id: &str,
        class: VehicleClass,
        now: SimTime,
        rng: &mut dyn RandomSource,
    ) -> Option<Scenario> {
        let config = catalog::config(scenario_type);
        if !config.applies_to(class) {
            debug!("{} does not apply to {}", scenario_type, class);
            return None;
        }
        if !self.has_room() {
            debug!("Scenario cap reached; {} for {} dropped", scenario_type, vehicle_id);
            return None;
        }
        if self.is_duplicate(scenario_type, vehicle_id) {
            return None;
        }

        let scenario = Scenario::new(
            rng.uuid(),
            scenario_type,
            vehicle_id,
            class,
            now,
            config.countdown_secs,
        );
        info!(
            "{} Scenario {} '{}' raised for {} {} ({}s to decide)",
            now, scenario.id, config.title, class, vehicle_id, config.countdown_secs
        );
        self.scenarios.push(scenario.clone());
        Some(scenario)
    }

    /// Check every trigger against the fleet. Returns the scenarios opened.
    pub fn evaluate(
        &mut self,
        fleet: &Fleet,
        hubs: &HubRegistry,
        now: SimTime,
        rng: &mut dyn RandomSource,
    ) -> Vec<Scenario> {
        let mut opened = Vec::new();

        for (scenario_type, vehicle_id, class) in self.deterministic_triggers(fleet, hubs, now) {
            if !self.has_room() {
                break;
            }
            opened.extend(self.open(scenario_type, &vehicle_id, class, now, rng));
        }

        for drone in fleet.drones.iter().filter(|d| d.is_moving()) {
            if self.has_room() && rng.chance(self.rates.weather) {
                opened.extend(self.open(
                    ScenarioType::WeatherAlert,
                    &drone.core.id,
                    VehicleClass::Drone,
                    now,
                    rng,
                ));
            }
        }

        for vehicle in fleet.vehicles() {
            if self.has_room() && rng.chance(self.rates.priority) {
                opened.extend(self.open(
                    ScenarioType::PriorityOverride,
                    &vehicle.core().id,
                    vehicle.class(),
                    now,
                    rng,
                ));
            }
        }

        opened.extend(self.generate_random(fleet, now, rng));
        opened
    }

    fn deterministic_triggers(
        &self,
        fleet: &Fleet,
        hubs: &HubRegistry,
        now: SimTime,
    ) -> Vec<(ScenarioType, String, VehicleClass)> {
        let mut found = Vec::new();

        for drone in &fleet.drones {
            // a landing drone is already coming down
            let descending = drone.is_charging() || drone.state == DroneState::Landing;
            if drone.core.battery < self.rates.emergency_battery && !descending {
                found.push((
                    ScenarioType::EmergencyLanding,
                    drone.core.id.clone(),
                    VehicleClass::Drone,
                ));
            }

            if drone.state == DroneState::HandoffWaiting {
                let waited = drone
                    .handoff_waiting_since
                    .map_or(0.0, |since| now.secs_since(since));
                let past_deadline = drone.handoff_deadline.is_none_or(|deadline| now > deadline);
                if waited > self.rates.handoff_timeout_secs && past_deadline {
                    found.push((
                        ScenarioType::HandoffFailure,
                        drone.core.id.clone(),
                        VehicleClass::Drone,
                    ));
                }
            }
        }

        for hub in hubs.hubs() {
            for class in VehicleClass::ALL {
                if hub.capacity.for_class(class) == 0
                    || hub.load_ratio(class) <= self.rates.congestion_ratio
                {
                    continue;
                }
                let waiting = fleet
                    .of_class(class)
                    .into_iter()
                    .find(|v| v.core().target_hub.as_deref() == Some(hub.id.as_str()));
                if let Some(vehicle) = waiting {
                    found.push((ScenarioType::HubCongestion, vehicle.core().id.clone(), class));
                }
            }
        }

        if let Some(bot_id) = self.swarm_imbalance(fleet) {
            found.push((ScenarioType::SwarmRebalance, bot_id, VehicleClass::SwarmBot));
        }

        found
    }

    /// Idle bot in the most oversupplied zone, when zones differ enough.
    fn swarm_imbalance(&self, fleet: &Fleet) -> Option<String> {
        let mut zones: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for bot in &fleet.swarm_bots {
            let Some(zone) = bot.zone_id.as_deref() else {
                continue;
            };
            let entry = zones.entry(zone).or_default();
            entry.1 += 1;
            if bot.state == SwarmBotState::Idle {
                entry.0 += 1;
            }
        }
        if zones.len() < 2 {
            return None;
        }

        let share = |(idle, total): (usize, usize)| idle as f64 / total as f64;
        let (oversupplied, highest) = zones
            .iter()
            .map(|(zone, counts)| (*zone, share(*counts)))
            .max_by(|a, b| a.1.total_cmp(&b.1))?;
        let lowest = zones
            .values()
            .map(|counts| share(*counts))
            .fold(f64::INFINITY, f64::min);

        if highest - lowest <= self.rates.swarm_imbalance {
            return None;
        }
        fleet
            .swarm_bots
            .iter()
            .find(|b| b.zone_id.as_deref() == Some(oversupplied) && b.state == SwarmBotState::Idle)
            .map(|b| b.core.id.clone())
    }

    /// Demo generator: occasionally raise a random type for a random eligible vehicle.
    pub fn generate_random(
        &mut self,
        fleet: &Fleet,
        now: SimTime,
        rng: &mut dyn RandomSource,
    ) -> Option<Scenario> {
        if !self.has_room() || !rng.chance(self.rates.demo) {
            return None;
        }
        let index = rng.pick_index(ScenarioType::ALL.len())?;
        self.trigger(Some(ScenarioType::ALL[index]), None, fleet, now, rng)
    }

    /// Raise a scenario on demand.
    ///
    /// A missing type or vehicle is chosen at random among eligible ones.
    /// Returns `None` when the cap is reached or nothing is eligible.
    pub fn trigger(
        &mut self,
        scenario_type: Option<ScenarioType>,
        vehicle_id: Option<&str>,
        fleet: &Fleet,
        now: SimTime,
        rng: &mut dyn RandomSource,
    ) -> Option<Scenario> {
        let scenario_type = match scenario_type {
            Some(t) => t,
            None => ScenarioType::ALL[rng.pick_index(ScenarioType::ALL.len())?],
        };
        let config = catalog::config(scenario_type);

        let (id, class) = match vehicle_id {
            Some(id) => {
                let vehicle = fleet
                    .vehicles()
                    .find(|v| v.core().id == id && config.applies_to(v.class()))?;
                (vehicle.core().id.clone(), vehicle.class())
            }
            None => {
                let eligible: Vec<&dyn FleetVehicle> = fleet
                    .vehicles()
                    .filter(|v| config.applies_to(v.class()))
                    .collect();
                let vehicle = eligible.get(rng.pick_index(eligible.len())?)?;
                (vehicle.core().id.clone(), vehicle.class())
            }
        };

        self.open(scenario_type, &id, class, now, rng)
    }

    /// Close a pending scenario with the chosen option.
    ///
    /// Fails for an unknown or already closed scenario and for an option the
    /// scenario does not offer; nothing changes in that case.
    pub fn resolve(
        &mut self,
        id: Uuid,
        option_id: &str,
        resolution: Resolution,
        now: SimTime,
    ) -> Result<Scenario> {
        let scenario = self
            .scenarios
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| DomainError::NotFound {
                entity_type: "scenario".to_string(),
                id: id.to_string(),
            })?;
        if !scenario.is_pending() {
            return Err(SimulatorError::ScenarioNotPending(id));
        }
        if catalog::config(scenario.scenario_type).option(option_id).is_none() {
            return Err(SimulatorError::UnknownOption {
                scenario_id: id,
                option_id: option_id.to_string(),
            });
        }

        scenario.resolve(option_id, resolution, now)?;
        let resolved = scenario.clone();
        self.prune();
        Ok(resolved)
    }

    /// Expire every pending scenario whose countdown has run out.
    ///
    /// Each scenario is returned exactly once, on the call that expired it.
    pub fn expire_due(&mut self, now: SimTime) -> Vec<Scenario> {
        let expired: Vec<Scenario> = self
            .scenarios
            .iter_mut()
            .filter_map(|s| s.expire(now).then(|| s.clone()))
            .collect();
        for scenario in &expired {
            info!(
                "{} Scenario {} ({}) for {} expired",
                now, scenario.id, scenario.scenario_type, scenario.vehicle_id
            );
        }
        if !expired.is_empty() {
            self.prune();
        }
        expired
    }

    /// Drop the oldest closed scenarios beyond the archive limit.
    fn prune(&mut self) {
        let closed = self.scenarios.iter().filter(|s| !s.is_pending()).count();
        let mut excess = closed.saturating_sub(ARCHIVE_LIMIT);
        if excess == 0 {
            return;
        }
        self.scenarios.retain(|s| {
            if excess > 0 && !matches!(s.status, ScenarioStatus::Pending) {
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::CityNetwork;
    use crate::random::ScriptedRandom;
    use fleet_domain::{Drone, LatLng, Pod, SwarmBot, VehicleCore};

    fn quiet() -> TriggerRates {
        TriggerRates {
            weather: 0.0,
            priority: 0.0,
            demo: 0.0,
            ..TriggerRates::default()
        }
    }

    fn drone(id: &str, battery: f64) -> Drone {
        let mut core = VehicleCore::new(id, "dtla", LatLng::new(34.0452, -118.2551));
        core.set_battery(battery);
        Drone::new(core)
    }

    fn hubs() -> HubRegistry {
        HubRegistry::from_network(&CityNetwork::los_angeles().unwrap())
    }

    #[test]
    fn test_low_battery_raises_emergency() {
        let mut engine = ScenarioEngine::new(quiet(), ExpiryPolicy::default());
        let mut fleet = Fleet::default();
        fleet.drones.push(drone("la-drone-1", 10.0));
        let mut rng = ScriptedRandom::constant(0.999);

        let opened = engine.evaluate(&fleet, &hubs(), SimTime::ZERO, &mut rng);
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].scenario_type, ScenarioType::EmergencyLanding);
        assert_eq!(opened[0].vehicle_id, "la-drone-1");
        assert_eq!(opened[0].expires_at, SimTime::from_secs(20.0));

        // same vehicle, same type: no duplicate
        let again = engine.evaluate(&fleet, &hubs(), SimTime::from_secs(1.0), &mut rng);
        assert!(again.is_empty());
    }

    #[test]
    fn test_charging_drone_is_not_an_emergency() {
        let mut engine = ScenarioEngine::new(quiet(), ExpiryPolicy::default());
        let mut fleet = Fleet::default();
        let mut charging = drone("la-drone-1", 5.0);
        charging.state = DroneState::Charging;
        fleet.drones.push(charging);
        let mut rng = ScriptedRandom::constant(0.999);
        assert!(engine.evaluate(&fleet, &hubs(), SimTime::ZERO, &mut rng).is_empty());
    }

    #[test]
    fn test_pending_never_exceeds_cap() {
        let mut engine = ScenarioEngine::new(quiet(), ExpiryPolicy::default());
        let mut fleet = Fleet::default();
        for i in 0..5 {
            fleet.drones.push(drone(&format!("la-drone-{i}"), 5.0));
        }
        let mut rng = ScriptedRandom::constant(0.0);

        for tick in 0..10 {
            engine.evaluate(&fleet, &hubs(), SimTime::from_secs(f64::from(tick)), &mut rng);
            assert!(engine.pending_count() <= MAX_PENDING);
        }
        assert_eq!(engine.pending_count(), MAX_PENDING);
        assert!(engine
            .trigger(Some(ScenarioType::WeatherAlert), None, &fleet, SimTime::ZERO, &mut rng)
            .is_none());
    }

    #[test]
    fn test_handoff_wait_past_timeout() {
        let mut engine = ScenarioEngine::new(quiet(), ExpiryPolicy::default());
        let mut fleet = Fleet::default();
        let mut waiting = drone("la-drone-1", 80.0);
        waiting.state = DroneState::HandoffWaiting;
        waiting.handoff_waiting_since = Some(SimTime::ZERO);
        waiting.handoff_deadline = Some(SimTime::from_secs(90.0));
        fleet.drones.push(waiting);
        let mut rng = ScriptedRandom::constant(0.999);

        assert!(engine
            .evaluate(&fleet, &hubs(), SimTime::from_secs(61.0), &mut rng)
            .is_empty());
        let opened = engine.evaluate(&fleet, &hubs(), SimTime::from_secs(91.0), &mut rng);
        assert_eq!(opened[0].scenario_type, ScenarioType::HandoffFailure);
    }

    #[test]
    fn test_full_hub_raises_congestion() {
        let mut engine = ScenarioEngine::new(quiet(), ExpiryPolicy::default());
        let mut hubs = hubs();
        let mut fleet = Fleet::default();
        // hub-sm-rooftop holds three drones
        for i in 0..3 {
            let mut d = drone(&format!("la-drone-{i}"), 60.0);
            d.state = DroneState::Charging;
            hubs.assign(&mut d.core, VehicleClass::Drone, "hub-sm-rooftop");
            fleet.drones.push(d);
        }
        let mut rng = ScriptedRandom::constant(0.999);

        let opened = engine.evaluate(&fleet, &hubs, SimTime::ZERO, &mut rng);
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].scenario_type, ScenarioType::HubCongestion);
        assert_eq!(opened[0].vehicle_id, "la-drone-0");
    }

    #[test]
    fn test_swarm_imbalance() {
        let mut engine = ScenarioEngine::new(quiet(), ExpiryPolicy::default());
        let mut fleet = Fleet::default();
        for (i, (zone, state)) in [
            ("swarm-zone-sm", SwarmBotState::Idle),
            ("swarm-zone-sm", SwarmBotState::Idle),
            ("swarm-zone-dtla", SwarmBotState::Swarming),
            ("swarm-zone-dtla", SwarmBotState::Swarming),
        ]
        .into_iter()
        .enumerate()
        {
            let base = LatLng::new(34.0, -118.0);
            let mut bot = SwarmBot::new(VehicleCore::new(format!("la-swarm-{i}"), "la", base), base);
            bot.zone_id = Some(zone.to_string());
            bot.state = state;
            fleet.swarm_bots.push(bot);
        }
        let mut rng = ScriptedRandom::constant(0.999);

        let opened = engine.evaluate(&fleet, &hubs(), SimTime::ZERO, &mut rng);
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].scenario_type, ScenarioType::SwarmRebalance);
        assert_eq!(opened[0].vehicle_id, "la-swarm-0");
    }

    #[test]
    fn test_trigger_respects_eligibility() {
        let mut engine = ScenarioEngine::new(quiet(), ExpiryPolicy::default());
        let mut fleet = Fleet::default();
        fleet.pods.push(Pod::new(VehicleCore::new("la-pod-1", "sm", LatLng::default())));
        let mut rng = ScriptedRandom::constant(0.0);

        assert!(engine
            .trigger(Some(ScenarioType::EmergencyLanding), None, &fleet, SimTime::ZERO, &mut rng)
            .is_none());
        assert!(engine
            .trigger(Some(ScenarioType::WeatherAlert), Some("la-pod-1"), &fleet, SimTime::ZERO, &mut rng)
            .is_none());
        let opened = engine
            .trigger(Some(ScenarioType::PriorityOverride), Some("la-pod-1"), &fleet, SimTime::ZERO, &mut rng)
            .unwrap();
        assert_eq!(opened.vehicle_class, VehicleClass::Pod);
    }

    #[test]
    fn test_resolve_once_with_known_option() {
        let mut engine = ScenarioEngine::new(quiet(), ExpiryPolicy::default());
        let mut fleet = Fleet::default();
        fleet.drones.push(drone("la-drone-1", 50.0));
        let mut rng = ScriptedRandom::constant(0.0);
        let scenario = engine
            .trigger(Some(ScenarioType::WeatherAlert), Some("la-drone-1"), &fleet, SimTime::ZERO, &mut rng)
            .unwrap();

        let err = engine
            .resolve(scenario.id, "hide", Resolution::Human, SimTime::ZERO)
            .unwrap_err();
        assert!(matches!(err, SimulatorError::UnknownOption { .. }));
        assert!(engine.get(scenario.id).unwrap().is_pending());

        let resolved = engine
            .resolve(scenario.id, "reduce", Resolution::Human, SimTime::from_secs(3.0))
            .unwrap();
        assert!(matches!(resolved.status, ScenarioStatus::Resolved { .. }));

        let err = engine
            .resolve(scenario.id, "reduce", Resolution::Human, SimTime::from_secs(4.0))
            .unwrap_err();
        assert!(matches!(err, SimulatorError::ScenarioNotPending(_)));
        assert!(matches!(
            engine.resolve(Uuid::nil(), "reduce", Resolution::Human, SimTime::ZERO),
            Err(SimulatorError::Domain(DomainError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_expire_due_reports_once() {
        let mut engine = ScenarioEngine::new(quiet(), ExpiryPolicy::ExpireOnly);
        let mut fleet = Fleet::default();
        fleet.drones.push(drone("la-drone-1", 50.0));
        let mut rng = ScriptedRandom::constant(0.0);
        engine
            .trigger(Some(ScenarioType::WeatherAlert), None, &fleet, SimTime::ZERO, &mut rng)
            .unwrap();

        assert!(engine.expire_due(SimTime::from_secs(29.0)).is_empty());
        assert_eq!(engine.expire_due(SimTime::from_secs(30.0)).len(), 1);
        assert!(engine.expire_due(SimTime::from_secs(31.0)).is_empty());
        assert_eq!(engine.pending_count(), 0);
    }

    #[test]
    fn test_expiry_policy_parse() {
        assert_eq!("expire_only".parse::<ExpiryPolicy>().unwrap(), ExpiryPolicy::ExpireOnly);
        assert_eq!("auto-resolve".parse::<ExpiryPolicy>().unwrap(), ExpiryPolicy::AutoResolve);
        assert!("sometimes".parse::<ExpiryPolicy>().is_err());
    }
}
