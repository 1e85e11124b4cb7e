//! Hub and handoff resource model.
//!
//! Charging slots are reserved when a vehicle is assigned to a hub. A
//! vehicle that finds the hub full still targets it but waits in the hub's
//! FIFO queue and does not charge until promoted, so occupancy never
//! exceeds capacity.

use crate::network::CityNetwork;
use fleet_domain::{Hub, HubType, LatLng, SlotClaim, VehicleClass, VehicleCore};
use tracing::{debug, warn};

/// Live hub occupancy, keyed by hub id.
#[derive(Debug, Clone, Default)]
pub struct HubRegistry {
    hubs: Vec<Hub>,
}

impl HubRegistry {
    pub fn new(mut hubs: Vec<Hub>) -> Self {
        for hub in &mut hubs {
            hub.sanitize();
        }
        Self { hubs }
    }

    pub fn from_network(network: &CityNetwork) -> Self {
        Self::new(network.all_hubs().cloned().collect())
    }

    pub fn hubs(&self) -> &[Hub] {
        &self.hubs
    }

    pub fn get(&self, id: &str) -> Option<&Hub> {
        self.hubs.iter().find(|h| h.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Hub> {
        self.hubs.iter_mut().find(|h| h.id == id)
    }

    /// Closest hub of the given type by straight-line distance.
    pub fn nearest_hub(&self, position: &LatLng, hub_type: HubType) -> Option<&Hub> {
        self.nearest_where(position, |hub| hub.hub_type == hub_type)
    }

    /// Closest handoff point, skipping `exclude`.
    pub fn nearest_handoff_point(&self, position: &LatLng, exclude: Option<&str>) -> Option<&Hub> {
        self.nearest_where(position, |hub| {
            hub.hub_type == HubType::Handoff && Some(hub.id.as_str()) != exclude
        })
    }

    /// Closest hub of the type other than `exclude`.
    pub fn alternate_hub(&self, position: &LatLng, hub_type: HubType, exclude: &str) -> Option<&Hub> {
        self.nearest_where(position, |hub| hub.hub_type == hub_type && hub.id != exclude)
    }

    fn nearest_where(&self, position: &LatLng, keep: impl Fn(&Hub) -> bool) -> Option<&Hub> {
        self.hubs
            .iter()
            .filter(|hub| keep(hub))
            .map(|hub| (hub, hub.position.distance_to(position)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(hub, _)| hub)
    }

    /// Point the vehicle at `hub_id` and reserve a slot, queueing when full.
    ///
    /// Any slot the vehicle holds elsewhere is released first. Returns `None`
    /// for an unknown hub, leaving the vehicle untouched.
    pub fn assign(
        &mut self,
        vehicle: &mut VehicleCore,
        class: VehicleClass,
        hub_id: &str,
    ) -> Option<SlotClaim> {
        self.get(hub_id)?;
        if vehicle.target_hub.as_deref() != Some(hub_id) {
            self.release(&vehicle.id);
        }

        let hub = self.get_mut(hub_id)?;
        let claim = hub.claim(&vehicle.id, class);
        vehicle.target_hub = Some(hub_id.to_string());

        match claim {
            SlotClaim::Queued => warn!(
                "Hub {} full for {}; {} queued at position {}",
                hub.id,
                class,
                vehicle.id,
                hub.queue.len()
            ),
            SlotClaim::Granted => debug!("{} reserved a slot at {}", vehicle.id, hub.id),
            SlotClaim::AlreadyHeld => {}
        }
        Some(claim)
    }

    /// Drop every slot or queue entry the vehicle has. Returns promoted vehicle ids.
    pub fn release(&mut self, vehicle_id: &str) -> Vec<String> {
        let mut promoted = Vec::new();
        for hub in &mut self.hubs {
            if hub.holds(vehicle_id) || hub.is_queued(vehicle_id) {
                let moved = hub.release(vehicle_id);
                for id in &moved {
                    debug!("{} promoted from queue at {}", id, hub.id);
                }
                promoted.extend(moved);
            }
        }
        promoted
    }

    /// Move the vehicle to a different hub.
    pub fn reassign(
        &mut self,
        vehicle: &mut VehicleCore,
        class: VehicleClass,
        hub_id: &str,
    ) -> Option<SlotClaim> {
        self.get(hub_id)?;
        self.release(&vehicle.id);
        vehicle.target_hub = None;
        self.assign(vehicle, class, hub_id)
    }

    /// Jump the vehicle to the front of whichever queue it waits in.
    pub fn prioritize(&mut self, vehicle_id: &str) -> bool {
        self.hubs
            .iter_mut()
            .any(|hub| hub.move_to_front(vehicle_id))
    }

    pub fn is_queued(&self, vehicle_id: &str) -> bool {
        self.hubs.iter().any(|hub| hub.is_queued(vehicle_id))
    }

    pub fn holds_slot(&self, vehicle_id: &str) -> bool {
        self.hubs.iter().any(|hub| hub.holds(vehicle_id))
    }

    /// True when the vehicle holds its slot or is not tied to a known hub.
    pub fn can_charge(&self, vehicle: &VehicleCore) -> bool {
        match vehicle.target_hub.as_deref().and_then(|id| self.get(id)) {
            Some(hub) => hub.holds(&vehicle.id),
            None => true,
        }
    }

    pub fn load_ratio(&self, hub_id: &str, class: VehicleClass) -> f64 {
        self.get(hub_id).map_or(0.0, |hub| hub.load_ratio(class))
    }
}
