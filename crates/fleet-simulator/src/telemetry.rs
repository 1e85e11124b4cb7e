//! Telemetry message shapes.
//!
//! Messages travel as `{"type": ..., "data": ...}`. Entity messages carry
//! either one entity, which is upserted by id, or a full list, which
//! replaces the collection.

use fleet_analytics::FleetStats;
use fleet_domain::{Drone, Fleet, Hub, Pod, Scenario, SimTime, SwarmBot};
use serde::{Deserialize, Serialize};

/// Full simulation state, also returned by the initial-state fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetSnapshot {
    pub sim_time: SimTime,
    pub running: bool,
    pub time_scale: f64,
    pub drones: Vec<Drone>,
    pub pods: Vec<Pod>,
    #[serde(rename = "swarmBots", alias = "swarm_bots")]
    pub swarm_bots: Vec<SwarmBot>,
    pub hubs: Vec<Hub>,
    pub scenarios: Vec<Scenario>,
    pub metrics: FleetStats,
}

/// One entity or the whole collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityUpdate<T> {
    All(Vec<T>),
    One(T),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TelemetryMessage {
    #[serde(rename = "delivery:state")]
    State(FleetSnapshot),
    #[serde(rename = "delivery:drone")]
    Drone(EntityUpdate<Drone>),
    #[serde(rename = "delivery:pod")]
    Pod(EntityUpdate<Pod>),
    #[serde(rename = "delivery:swarmbot")]
    SwarmBot(EntityUpdate<SwarmBot>),
    #[serde(rename = "delivery:hub")]
    Hub(EntityUpdate<Hub>),
    #[serde(rename = "delivery:metrics")]
    Metrics(FleetStats),
}

impl TelemetryMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::State(_) => "delivery:state",
            Self::Drone(_) => "delivery:drone",
            Self::Pod(_) => "delivery:pod",
            Self::SwarmBot(_) => "delivery:swarmbot",
            Self::Hub(_) => "delivery:hub",
            Self::Metrics(_) => "delivery:metrics",
        }
    }
}

fn merge<T>(items: &mut Vec<T>, update: EntityUpdate<T>, id: impl Fn(&T) -> &str) {
    match update {
        EntityUpdate::All(all) => *items = all,
        EntityUpdate::One(item) => match items.iter().position(|i| id(i) == id(&item)) {
            Some(index) => items[index] = item,
            None => items.push(item),
        },
    }
}

impl FleetSnapshot {
    /// Clamp decoded vehicle and hub fields into range.
    pub fn sanitize(&mut self) {
        for drone in &mut self.drones {
            drone.sanitize();
        }
        for pod in &mut self.pods {
            pod.core.sanitize();
        }
        for bot in &mut self.swarm_bots {
            bot.core.sanitize();
        }
        for hub in &mut self.hubs {
            hub.sanitize();
        }
    }

    /// Fold one decoded message into this snapshot.
    pub fn apply(&mut self, message: TelemetryMessage) {
        match message {
            TelemetryMessage::State(state) => *self = state,
            TelemetryMessage::Drone(update) => merge(&mut self.drones, update, |d| d.core.id.as_str()),
            TelemetryMessage::Pod(update) => merge(&mut self.pods, update, |p| p.core.id.as_str()),
            TelemetryMessage::SwarmBot(update) => {
                merge(&mut self.swarm_bots, update, |b| b.core.id.as_str());
            }
            TelemetryMessage::Hub(update) => merge(&mut self.hubs, update, |h| h.id.as_str()),
            TelemetryMessage::Metrics(metrics) => self.metrics = metrics,
        }
        self.sanitize();
    }

    pub fn fleet(&self) -> Fleet {
        Fleet {
            drones: self.drones.clone(),
            pods: self.pods.clone(),
            swarm_bots: self.swarm_bots.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_domain::{HubType, LatLng, SlotCapacity, VehicleCore};

    fn drone(id: &str, battery: f64) -> Drone {
        let mut core = VehicleCore::new(id, "dtla", LatLng::new(34.05, -118.25));
        core.set_battery(battery);
        Drone::new(core)
    }

    #[test]
    fn test_message_envelope() {
        let message = TelemetryMessage::Drone(EntityUpdate::One(drone("la-drone-1", 80.0)));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "delivery:drone");
        assert_eq!(json["data"]["id"], "la-drone-1");
        assert_eq!(json["data"]["battery_level"], 80.0);
        assert_eq!(message.kind(), "delivery:drone");
    }

    #[test]
    fn test_upsert_by_id() {
        let mut snapshot = FleetSnapshot::default();
        snapshot.apply(TelemetryMessage::Drone(EntityUpdate::One(drone("la-drone-1", 80.0))));
        snapshot.apply(TelemetryMessage::Drone(EntityUpdate::One(drone("la-drone-2", 70.0))));
        snapshot.apply(TelemetryMessage::Drone(EntityUpdate::One(drone("la-drone-1", 55.0))));

        assert_eq!(snapshot.drones.len(), 2);
        assert_eq!(snapshot.drones[0].core.battery, 55.0);

        snapshot.apply(TelemetryMessage::Drone(EntityUpdate::All(vec![drone("la-drone-9", 10.0)])));
        assert_eq!(snapshot.drones.len(), 1);
        assert_eq!(snapshot.drones[0].core.id, "la-drone-9");
    }

    #[test]
    fn test_decode_fills_defaults_and_clamps() {
        let raw = r#"{
            "type": "delivery:state",
            "data": {
                "drones": [{"id": "la-drone-1", "battery_level": 140.0, "progress": -2.0}],
                "swarmBots": [{"id": "la-swarm-0-1", "base_position": [34.14, -118.14]}]
            }
        }"#;
        let message: TelemetryMessage = serde_json::from_str(raw).unwrap();
        let mut snapshot = FleetSnapshot::default();
        snapshot.apply(message);

        assert_eq!(snapshot.drones[0].core.battery, 100.0);
        assert_eq!(snapshot.drones[0].core.progress, 0.0);
        assert_eq!(snapshot.swarm_bots.len(), 1);
        assert!(snapshot.pods.is_empty());
        assert_eq!(snapshot.metrics, FleetStats::default());
    }

    #[test]
    fn test_hub_update() {
        let mut snapshot = FleetSnapshot::default();
        let hub = Hub::new(
            "hub-dtla-1",
            "DTLA Tower Hub",
            "dtla",
            HubType::Rooftop,
            LatLng::new(34.0452, -118.2551),
            SlotCapacity::new(6, 0, 0),
        );
        let json = serde_json::to_string(&TelemetryMessage::Hub(EntityUpdate::One(hub))).unwrap();
        snapshot.apply(serde_json::from_str(&json).unwrap());
        assert_eq!(snapshot.hubs[0].capacity.drone, 6);
        assert_eq!(snapshot.fleet().len(), 0);
    }
}
