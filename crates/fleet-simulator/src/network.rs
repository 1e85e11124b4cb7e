//! City network configuration.
//!
//! Hubs, handoff points, drone corridors, pod routes and swarm street
//! zones. Loaded once and immutable afterwards; hub occupancy lives in
//! [`crate::hubs::HubRegistry`].

use crate::error::{Result, SimulatorError};
use crate::route::{self, RouteGeometry};
use fleet_domain::{Hub, Interpolation, LatLng, Route, StreetZone, SwarmZone};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

const LOS_ANGELES: &str = include_str!("../data/los_angeles.json");

/// Static description of one city's delivery infrastructure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CityNetwork {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rooftop_hubs: Vec<Hub>,
    #[serde(default)]
    pub street_hubs: Vec<Hub>,
    #[serde(default)]
    pub handoff_points: Vec<Hub>,
    #[serde(default)]
    pub corridors: Vec<Route>,
    #[serde(default)]
    pub pod_routes: Vec<Route>,
    #[serde(default)]
    pub swarm_zones: Vec<SwarmZone>,
    #[serde(default)]
    pub street_zones: Vec<StreetZone>,
    #[serde(skip)]
    geometries: HashMap<String, RouteGeometry>,
}

impl CityNetwork {
    /// Built-in Los Angeles network.
    pub fn los_angeles() -> Result<Self> {
        Self::from_json_str(LOS_ANGELES)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let mut network: CityNetwork = serde_json::from_str(raw)?;
        network.prepare()?;
        Ok(network)
    }

    /// Resolve defaults, validate references and cache street geometry.
    pub fn prepare(&mut self) -> Result<()> {
        for hub in self.all_hubs_mut() {
            hub.sanitize();
        }

        let mut hub_ids = HashSet::new();
        for hub in self.all_hubs() {
            if !hub_ids.insert(hub.id.clone()) {
                return Err(SimulatorError::InvalidNetwork(format!(
                    "duplicate hub id '{}'",
                    hub.id
                )));
            }
        }
        if self.rooftop_hubs.is_empty() && self.street_hubs.is_empty() {
            return Err(SimulatorError::InvalidNetwork(
                "network has no charging hubs".to_string(),
            ));
        }

        for zone in &self.swarm_zones {
            if let Some(base) = &zone.base_hub {
                if !hub_ids.contains(base) {
                    warn!("Swarm zone {} references unknown base hub {}", zone.id, base);
                }
            }
        }

        for street_zone in &mut self.street_zones {
            for street in &mut street_zone.streets {
                street.interpolation = Interpolation::DistanceWeighted;
            }
        }

        let mut route_ids = HashSet::new();
        for route in self.all_routes() {
            if !route_ids.insert(route.id.clone()) {
                return Err(SimulatorError::InvalidNetwork(format!(
                    "duplicate route id '{}'",
                    route.id
                )));
            }
            if route.waypoints.len() < 2 {
                warn!(
                    "Route {} has {} waypoint(s); vehicles on it will hold position",
                    route.id,
                    route.waypoints.len()
                );
            }
        }

        self.geometries = self
            .street_zones
            .iter()
            .flat_map(|zone| zone.streets.iter())
            .map(|street| (street.id.clone(), RouteGeometry::new(&street.waypoints)))
            .collect();

        debug!(
            "Network {} ready: {} hubs, {} routes",
            self.name,
            hub_ids.len(),
            route_ids.len()
        );
        Ok(())
    }

    pub fn all_hubs(&self) -> impl Iterator<Item = &Hub> {
        self.rooftop_hubs
            .iter()
            .chain(&self.street_hubs)
            .chain(&self.handoff_points)
    }

    fn all_hubs_mut(&mut self) -> impl Iterator<Item = &mut Hub> {
        self.rooftop_hubs
            .iter_mut()
            .chain(&mut self.street_hubs)
            .chain(&mut self.handoff_points)
    }

    /// Corridors, pod routes and streets
    pub fn all_routes(&self) -> impl Iterator<Item = &Route> {
        self.corridors
            .iter()
            .chain(&self.pod_routes)
            .chain(self.street_zones.iter().flat_map(|zone| zone.streets.iter()))
    }

    pub fn route(&self, id: &str) -> Option<&Route> {
        self.all_routes().find(|r| r.id == id)
    }

    pub fn swarm_zone(&self, id: &str) -> Option<&SwarmZone> {
        self.swarm_zones.iter().find(|z| z.id == id)
    }

    pub fn streets_in_zone(&self, zone_id: &str) -> &[Route] {
        self.street_zones
            .iter()
            .find(|z| z.zone_id == zone_id)
            .map(|z| z.streets.as_slice())
            .unwrap_or_default()
    }

    /// Street in the zone whose start point is closest to `position`.
    pub fn nearest_street(&self, zone_id: &str, position: &LatLng) -> Option<&Route> {
        self.streets_in_zone(zone_id)
            .iter()
            .filter_map(|street| street.start().map(|start| (street, start.distance_to(position))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(street, _)| street)
    }

    /// Position at `progress` along the route with this id.
    pub fn position_on(&self, route_id: &str, progress: f64) -> Option<LatLng> {
        if let Some(geometry) = self.geometries.get(route_id) {
            return geometry.position(progress);
        }
        self.route(route_id)
            .and_then(|route| route::position(route, progress))
    }
}
