//! Static decision catalog: one entry per scenario type.

use fleet_domain::{Priority, ScenarioType, VehicleClass};
use serde::Serialize;

/// Structured mutation attached to an option.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Effect {
    /// Land every airborne drone in the target's zone
    GroundDrones,
    ReduceAltitude { value: f64 },
    /// Leave operations untouched apart from the audit entry
    #[serde(rename = "none")]
    NoAction,
    Wait { timeout_secs: f64 },
    RedirectHandoff,
    DirectDelivery,
    PriorityIntercept { priority: Priority },
    DispatchReserve,
    RedistributeToHubs,
    PriorityQueue,
    LowerThreshold { value: f64 },
    RushToHub,
    EmergencyLand,
    LandNow,
    RebalanceSwarm { count: usize },
    PodTransport,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioOption {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    /// What happens if this option is chosen
    pub consequence: &'static str,
    pub recommended: bool,
    pub effect: Effect,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioConfig {
    #[serde(rename = "type")]
    pub scenario_type: ScenarioType,
    pub title: &'static str,
    pub description: &'static str,
    pub countdown_secs: f64,
    /// Percent confidence of the recommended option
    pub ai_confidence: u8,
    pub classes: &'static [VehicleClass],
    pub options: &'static [ScenarioOption],
}

impl ScenarioConfig {
    pub fn option(&self, option_id: &str) -> Option<&'static ScenarioOption> {
        let options: &'static [ScenarioOption] = self.options;
        options.iter().find(|o| o.id == option_id)
    }

    /// The option applied on expiry. Falls back to the first option.
    pub fn recommended_option(&self) -> Option<&'static ScenarioOption> {
        let options: &'static [ScenarioOption] = self.options;
        options
            .iter()
            .find(|o| o.recommended)
            .or_else(|| options.first())
    }

    pub fn applies_to(&self, class: VehicleClass) -> bool {
        self.classes.contains(&class)
    }
}

const ALL_CLASSES: &[VehicleClass] = &VehicleClass::ALL;

static WEATHER_ALERT: ScenarioConfig = ScenarioConfig {
    scenario_type: ScenarioType::WeatherAlert,
    title: "Weather Alert",
    description: "High winds detected in flight corridor. Wind speed exceeding safe operating limits.",
    countdown_secs: 30.0,
    ai_confidence: 87,
    classes: &[VehicleClass::Drone],
    options: &[
        ScenarioOption {
            id: "ground",
            label: "Ground Fleet",
            description: "Land all drones at nearest hub until conditions improve",
            consequence: "All drones safely grounded, deliveries delayed 15-30 min",
            recommended: true,
            effect: Effect::GroundDrones,
        },
        ScenarioOption {
            id: "reduce",
            label: "Reduce Altitude",
            description: "Lower flight altitude to reduce wind exposure",
            consequence: "Continue with reduced efficiency, 20% higher battery drain",
            recommended: false,
            effect: Effect::ReduceAltitude { value: 50.0 },
        },
        ScenarioOption {
            id: "continue",
            label: "Continue Operations",
            description: "Maintain current flight patterns",
            consequence: "Risk of drone drift, potential delivery delays",
            recommended: false,
            effect: Effect::NoAction,
        },
    ],
};

static HANDOFF_FAILURE: ScenarioConfig = ScenarioConfig {
    scenario_type: ScenarioType::HandoffFailure,
    title: "Handoff Failure",
    description: "SwarmBot unavailable for handoff. Drone hovering at transfer point.",
    countdown_secs: 25.0,
    ai_confidence: 72,
    classes: &[VehicleClass::Drone, VehicleClass::SwarmBot],
    options: &[
        ScenarioOption {
            id: "wait",
            label: "Wait for Bot",
            description: "Hold position until swarmbot becomes available",
            consequence: "Up to 5 min delay, battery drain while hovering",
            recommended: false,
            effect: Effect::Wait { timeout_secs: 300.0 },
        },
        ScenarioOption {
            id: "redirect",
            label: "Redirect Drone",
            description: "Reroute to alternate handoff point",
            consequence: "New handoff point 2km away, 3 min added delay",
            recommended: true,
            effect: Effect::RedirectHandoff,
        },
        ScenarioOption {
            id: "direct",
            label: "Direct Delivery",
            description: "Drone completes last-mile delivery directly",
            consequence: "Drone lands at destination, longer turnaround time",
            recommended: false,
            effect: Effect::DirectDelivery,
        },
    ],
};

static PRIORITY_OVERRIDE: ScenarioConfig = ScenarioConfig {
    scenario_type: ScenarioType::PriorityOverride,
    title: "Priority Override",
    description: "Emergency medical delivery detected nearby. Priority package requires immediate attention.",
    countdown_secs: 45.0,
    ai_confidence: 95,
    classes: ALL_CLASSES,
    options: &[
        ScenarioOption {
            id: "intercept",
            label: "Intercept Package",
            description: "Redirect nearest vehicle to pick up priority package",
            consequence: "Current delivery delayed, priority package delivered in 8 min",
            recommended: true,
            effect: Effect::PriorityIntercept {
                priority: Priority::Emergency,
            },
        },
        ScenarioOption {
            id: "dispatch",
            label: "Dispatch Reserve",
            description: "Send reserve vehicle from hub",
            consequence: "No delay to current ops, priority delivered in 15 min",
            recommended: false,
            effect: Effect::DispatchReserve,
        },
        ScenarioOption {
            id: "decline",
            label: "Decline Override",
            description: "Continue with current operations",
            consequence: "Priority package assigned to next available unit",
            recommended: false,
            effect: Effect::NoAction,
        },
    ],
};

static HUB_CONGESTION: ScenarioConfig = ScenarioConfig {
    scenario_type: ScenarioType::HubCongestion,
    title: "Hub Congestion",
    description: "Charging hub approaching full capacity. Queue forming for charging slots.",
    countdown_secs: 40.0,
    ai_confidence: 81,
    classes: ALL_CLASSES,
    options: &[
        ScenarioOption {
            id: "redistribute",
            label: "Redistribute",
            description: "Send vehicles to alternate hubs",
            consequence: "Vehicles rerouted to Hub B, 1.5km extra distance",
            recommended: true,
            effect: Effect::RedistributeToHubs,
        },
        ScenarioOption {
            id: "priority-queue",
            label: "Priority Queue",
            description: "Prioritize low-battery vehicles",
            consequence: "Low battery vehicles get priority, others wait",
            recommended: false,
            effect: Effect::PriorityQueue,
        },
        ScenarioOption {
            id: "extend-range",
            label: "Extend Range",
            description: "Allow vehicles to operate at lower battery threshold",
            consequence: "Risky, potential emergency landings",
            recommended: false,
            effect: Effect::LowerThreshold { value: 15.0 },
        },
    ],
};

static EMERGENCY_LANDING: ScenarioConfig = ScenarioConfig {
    scenario_type: ScenarioType::EmergencyLanding,
    title: "Emergency Landing",
    description: "Drone critically low on battery. Immediate landing required.",
    countdown_secs: 20.0,
    ai_confidence: 98,
    classes: &[VehicleClass::Drone],
    options: &[
        ScenarioOption {
            id: "nearest-hub",
            label: "Nearest Hub",
            description: "Rush to closest charging hub",
            consequence: "Hub is 800m away, 40% chance of reaching",
            recommended: false,
            effect: Effect::RushToHub,
        },
        ScenarioOption {
            id: "safe-landing",
            label: "Safe Landing Zone",
            description: "Land at designated emergency zone",
            consequence: "Safe landing 200m away, requires recovery dispatch",
            recommended: true,
            effect: Effect::EmergencyLand,
        },
        ScenarioOption {
            id: "immediate",
            label: "Immediate Landing",
            description: "Land at current position",
            consequence: "Risk of landing in unsuitable area",
            recommended: false,
            effect: Effect::LandNow,
        },
    ],
};

static SWARM_REBALANCE: ScenarioConfig = ScenarioConfig {
    scenario_type: ScenarioType::SwarmRebalance,
    title: "Swarm Rebalance",
    description: "Significant swarm imbalance detected. Zone A has high demand, Zone B oversupplied.",
    countdown_secs: 35.0,
    ai_confidence: 76,
    classes: &[VehicleClass::SwarmBot],
    options: &[
        ScenarioOption {
            id: "auto-rebalance",
            label: "Auto Rebalance",
            description: "Migrate bots from Zone B to Zone A",
            consequence: "4 bots relocated, 5 min migration time",
            recommended: true,
            effect: Effect::RebalanceSwarm { count: 4 },
        },
        ScenarioOption {
            id: "pod-dispatch",
            label: "Pod Dispatch",
            description: "Send pod to transport multiple bots",
            consequence: "Faster migration, pod diverted from delivery",
            recommended: false,
            effect: Effect::PodTransport,
        },
        ScenarioOption {
            id: "ignore",
            label: "Maintain Current",
            description: "Keep current distribution",
            consequence: "Zone A deliveries delayed up to 10 min",
            recommended: false,
            effect: Effect::NoAction,
        },
    ],
};

/// Catalog entry for a scenario type.
pub fn config(scenario_type: ScenarioType) -> &'static ScenarioConfig {
    match scenario_type {
        ScenarioType::WeatherAlert => &WEATHER_ALERT,
        ScenarioType::HandoffFailure => &HANDOFF_FAILURE,
        ScenarioType::PriorityOverride => &PRIORITY_OVERRIDE,
        ScenarioType::HubCongestion => &HUB_CONGESTION,
        ScenarioType::EmergencyLanding => &EMERGENCY_LANDING,
        ScenarioType::SwarmRebalance => &SWARM_REBALANCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_type_has_one_recommended_option() {
        for scenario_type in ScenarioType::ALL {
            let config = config(scenario_type);
            assert_eq!(config.scenario_type, scenario_type);
            assert!((2..=3).contains(&config.options.len()));
            assert_eq!(config.options.iter().filter(|o| o.recommended).count(), 1);
            assert!(!config.classes.is_empty());
        }
    }

    #[test]
    fn test_recommended_options() {
        let expected = [
            (ScenarioType::WeatherAlert, "ground"),
            (ScenarioType::HandoffFailure, "redirect"),
            (ScenarioType::PriorityOverride, "intercept"),
            (ScenarioType::HubCongestion, "redistribute"),
            (ScenarioType::EmergencyLanding, "safe-landing"),
            (ScenarioType::SwarmRebalance, "auto-rebalance"),
        ];
        for (scenario_type, option_id) in expected {
            assert_eq!(config(scenario_type).recommended_option().unwrap().id, option_id);
        }
    }

    #[test]
    fn test_option_lookup() {
        let emergency = config(ScenarioType::EmergencyLanding);
        assert_eq!(emergency.countdown_secs, 20.0);
        assert!(emergency.applies_to(VehicleClass::Drone));
        assert!(!emergency.applies_to(VehicleClass::Pod));
        assert_eq!(emergency.option("immediate").unwrap().effect, Effect::LandNow);
        assert!(emergency.option("teleport").is_none());
    }

    #[test]
    fn test_effect_wire_shape() {
        let json = serde_json::to_value(Effect::LowerThreshold { value: 15.0 }).unwrap();
        assert_eq!(json["action"], "lower_threshold");
        assert_eq!(json["value"], 15.0);
    }
}
