//! # Autonomous Delivery Fleet - Domain Model
//!
//! Core domain entities, value objects, and enums for a multi-class
//! delivery fleet: aerial drones, ground delivery pods and sidewalk
//! swarm bots. These types are the single source of truth across all
//! layers: simulation, analytics and telemetry.
//!
//! Optional fields are resolved to their defaults once, at
//! deserialization or construction time, so update logic never has to
//! re-default a missing value.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
pub use uuid::Uuid;

/// Battery percentage below which a vehicle heads for a charger.
pub const LOW_BATTERY_THRESHOLD: f64 = 20.0;

/// Ticks a full handoff takes (half waiting, half active).
pub const HANDOFF_DURATION: u32 = 100;

// =============================================================================
// VALUE OBJECTS
// =============================================================================

/// Position in (lat, lng) degree space.
///
/// Distances are planar Euclidean, not geodesic; good enough at city scale.
/// Serialized as a `[lat, lng]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Euclidean distance in degrees
    #[must_use]
    pub fn distance_to(&self, other: &LatLng) -> f64 {
        let dlat = other.lat - self.lat;
        let dlng = other.lng - self.lng;
        (dlat * dlat + dlng * dlng).sqrt()
    }

    /// Linear interpolation towards `other`; `t` is not clamped.
    #[must_use]
    pub fn lerp(&self, other: &LatLng, t: f64) -> LatLng {
        LatLng {
            lat: self.lat + (other.lat - self.lat) * t,
            lng: self.lng + (other.lng - self.lng) * t,
        }
    }

    #[must_use]
    pub fn offset(&self, dlat: f64, dlng: f64) -> LatLng {
        LatLng {
            lat: self.lat + dlat,
            lng: self.lng + dlng,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

impl From<[f64; 2]> for LatLng {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl From<LatLng> for [f64; 2] {
    fn from(value: LatLng) -> Self {
        [value.lat, value.lng]
    }
}

/// Monotonic simulated time, in seconds since the simulation started.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(f64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0.0);

    pub fn from_secs(secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            Self(secs)
        } else {
            Self::ZERO
        }
    }

    pub fn as_secs(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn plus_secs(self, secs: f64) -> Self {
        Self::from_secs(self.0 + secs)
    }

    /// Seconds elapsed since `earlier`, never negative.
    pub fn secs_since(self, earlier: SimTime) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T+{:.1}s", self.0)
    }
}

/// Travel direction along a route. Serialized as `1` / `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i8", into = "i8")]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Self::Forward => 1.0,
            Self::Reverse => -1.0,
        }
    }

    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }
}

impl From<i8> for Direction {
    fn from(value: i8) -> Self {
        if value < 0 { Self::Reverse } else { Self::Forward }
    }
}

impl From<Direction> for i8 {
    fn from(value: Direction) -> Self {
        match value {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }
}

// =============================================================================
// ENUMS
// =============================================================================

/// Vehicle classes in the fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleClass {
    #[serde(rename = "drone")]
    Drone,
    #[serde(rename = "pod")]
    Pod,
    #[serde(rename = "swarmbot")]
    SwarmBot,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 3] = [Self::Drone, Self::Pod, Self::SwarmBot];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drone => "drone",
            Self::Pod => "pod",
            Self::SwarmBot => "swarmbot",
        }
    }

    /// Movement and energy constants for this class.
    pub const fn physics(self) -> VehiclePhysics {
        match self {
            Self::Drone => VehiclePhysics {
                speed_multiplier: 0.0001,
                battery_drain: 0.002,
                charging_rate: 0.05,
                package_capacity: 2,
            },
            Self::Pod => VehiclePhysics {
                speed_multiplier: 0.000_03,
                battery_drain: 0.0003,
                charging_rate: 0.015,
                package_capacity: 15,
            },
            Self::SwarmBot => VehiclePhysics {
                speed_multiplier: 0.000_01,
                battery_drain: 0.0008,
                charging_rate: 0.04,
                package_capacity: 3,
            },
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleClass {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drone" => Ok(Self::Drone),
            "pod" => Ok(Self::Pod),
            "swarmbot" | "swarm_bot" => Ok(Self::SwarmBot),
            other => Err(DomainError::UnknownVehicleClass(other.to_string())),
        }
    }
}

/// Per-class movement and energy constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehiclePhysics {
    /// Progress per millisecond of scaled time
    pub speed_multiplier: f64,
    /// Battery percent lost per tick at time scale 1
    pub battery_drain: f64,
    /// Battery percent gained per tick at time scale 1
    pub charging_rate: f64,
    pub package_capacity: u32,
}

/// Delivery priority tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Standard,
    Express,
    Priority,
    Emergency,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Self::Standard,
        Self::Express,
        Self::Priority,
        Self::Emergency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Express => "express",
            Self::Priority => "priority",
            Self::Emergency => "emergency",
        }
    }
}

/// Drone flight states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DroneState {
    Idle,
    Charging,
    Swapping,
    EnRoute,
    Arriving,
    #[default]
    Flying,
    Landing,
    Hovering,
    TakingOff,
    HandoffWaiting,
    HandoffActive,
}

impl DroneState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Charging => "charging",
            Self::Swapping => "swapping",
            Self::EnRoute => "en_route",
            Self::Arriving => "arriving",
            Self::Flying => "flying",
            Self::Landing => "landing",
            Self::Hovering => "hovering",
            Self::TakingOff => "taking_off",
            Self::HandoffWaiting => "handoff_waiting",
            Self::HandoffActive => "handoff_active",
        }
    }

    /// In the air, i.e. not parked on a pad.
    pub fn is_airborne(&self) -> bool {
        !matches!(self, Self::Idle | Self::Charging | Self::Swapping)
    }
}

/// Ground pod states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PodState {
    #[default]
    EnRoute,
    Dispatching,
    Loading,
    Unloading,
    Charging,
}

impl PodState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnRoute => "en_route",
            Self::Dispatching => "dispatching",
            Self::Loading => "loading",
            Self::Unloading => "unloading",
            Self::Charging => "charging",
        }
    }
}

/// Swarm bot states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmBotState {
    #[default]
    Idle,
    Swarming,
    EnRoute,
    Delivering,
    Returning,
    Charging,
    HandoffWaiting,
    HandoffActive,
}

impl SwarmBotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Swarming => "swarming",
            Self::EnRoute => "en_route",
            Self::Delivering => "delivering",
            Self::Returning => "returning",
            Self::Charging => "charging",
            Self::HandoffWaiting => "handoff_waiting",
            Self::HandoffActive => "handoff_active",
        }
    }
}

/// Hub types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HubType {
    /// Drone landing and battery swap
    #[serde(rename = "rooftop_hub")]
    Rooftop,
    /// Pod and swarm bot charging
    #[serde(rename = "street_hub")]
    Street,
    /// Package transfer between classes
    #[serde(rename = "handoff_point")]
    Handoff,
}

impl HubType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rooftop => "rooftop_hub",
            Self::Street => "street_hub",
            Self::Handoff => "handoff_point",
        }
    }
}

/// Route interpolation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Equal progress share per segment, whatever its length
    #[default]
    Uniform,
    /// Progress proportional to travelled distance
    DistanceWeighted,
}

/// Decision scenario kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioType {
    WeatherAlert,
    HandoffFailure,
    PriorityOverride,
    HubCongestion,
    EmergencyLanding,
    SwarmRebalance,
}

impl ScenarioType {
    pub const ALL: [ScenarioType; 6] = [
        Self::WeatherAlert,
        Self::HandoffFailure,
        Self::PriorityOverride,
        Self::HubCongestion,
        Self::EmergencyLanding,
        Self::SwarmRebalance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeatherAlert => "weather_alert",
            Self::HandoffFailure => "handoff_failure",
            Self::PriorityOverride => "priority_override",
            Self::HubCongestion => "hub_congestion",
            Self::EmergencyLanding => "emergency_landing",
            Self::SwarmRebalance => "swarm_rebalance",
        }
    }
}

impl fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::UnknownScenarioType(s.to_string()))
    }
}

/// Who picked a scenario option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Human,
    /// Recommended option applied automatically on countdown expiry
    Ai,
}

// =============================================================================
// VEHICLE ENTITIES
// =============================================================================

/// Decision audit record, appended to the target vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionHistoryEntry {
    pub timestamp: SimTime,
    pub scenario_id: Uuid,
    pub scenario_type: ScenarioType,
    pub option_id: String,
    pub option_label: String,
    pub resolution: Resolution,
}

/// Attributes shared by every vehicle class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleCore {
    pub id: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub position: LatLng,
    /// Battery percent, always within `0..=100`
    #[serde(default, rename = "battery_level")]
    pub battery: f64,
    #[serde(default)]
    pub packages: u32,
    /// Corridor, pod route or street id
    #[serde(default)]
    pub route_id: Option<String>,
    /// Normalized route progress, always within `0..=1`
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub target_hub: Option<String>,
    #[serde(default)]
    pub handoff_progress: u32,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub decision_history: Vec<DecisionHistoryEntry>,
}

impl VehicleCore {
    pub fn new(id: impl Into<String>, zone: impl Into<String>, position: LatLng) -> Self {
        Self {
            id: id.into(),
            zone: zone.into(),
            position,
            battery: 100.0,
            packages: 0,
            route_id: None,
            progress: 0.0,
            direction: Direction::Forward,
            target_hub: None,
            handoff_progress: 0,
            priority: Priority::Standard,
            decision_history: Vec::new(),
        }
    }

    /// Set battery, clamped to `0..=100`. Non-finite input reads as empty.
    pub fn set_battery(&mut self, value: f64) {
        self.battery = if value.is_finite() {
            value.clamp(0.0, 100.0)
        } else {
            0.0
        };
    }

    /// Set progress, clamped to `0..=1`. Non-finite input reads as route start.
    pub fn set_progress(&mut self, value: f64) {
        self.progress = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    /// Repair out-of-range or non-finite fields from decoded input.
    pub fn sanitize(&mut self) {
        self.set_battery(self.battery);
        self.set_progress(self.progress);
        if !self.position.is_finite() {
            self.position = LatLng::default();
        }
    }

    pub fn is_low_battery(&self) -> bool {
        self.battery < LOW_BATTERY_THRESHOLD
    }

    pub fn record_decision(&mut self, entry: DecisionHistoryEntry) {
        self.decision_history.push(entry);
    }
}

/// Read-only view over any vehicle class, used by stats and triggers.
pub trait FleetVehicle {
    fn core(&self) -> &VehicleCore;
    fn class(&self) -> VehicleClass;
    fn state_label(&self) -> &'static str;
    fn is_idle(&self) -> bool;
    /// Charging or swapping a battery
    fn is_charging(&self) -> bool;
    fn is_moving(&self) -> bool;
    fn is_in_handoff(&self) -> bool;

    fn is_active(&self) -> bool {
        !self.is_idle() && !self.is_charging()
    }
}

/// Markers left on a drone by applied decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DroneMarkers {
    pub weather_grounded: bool,
    pub reduced_altitude: bool,
    pub weather_override: bool,
    pub redirected: bool,
    pub direct_delivery: bool,
    pub intercepting: bool,
    pub dispatched_for_priority: bool,
    pub redistributed: bool,
    pub queue_prioritized: bool,
    pub extended_range: bool,
    pub emergency_rush: bool,
    pub emergency_landing: bool,
    pub safe_zone_landing: bool,
    pub immediate_landing: bool,
}

fn default_altitude() -> f64 {
    100.0
}

fn default_low_battery_threshold() -> f64 {
    LOW_BATTERY_THRESHOLD
}

/// Aerial delivery drone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drone {
    #[serde(flatten)]
    pub core: VehicleCore,
    #[serde(default)]
    pub state: DroneState,
    /// Normalized altitude, `0` on the pad and `100` at cruise
    #[serde(default = "default_altitude")]
    pub altitude: f64,
    #[serde(default = "default_low_battery_threshold")]
    pub low_battery_threshold: f64,
    #[serde(default)]
    pub handoff_point: Option<String>,
    #[serde(default)]
    pub handoff_waiting_since: Option<SimTime>,
    /// Handoff failure is not raised before this instant
    #[serde(default)]
    pub handoff_deadline: Option<SimTime>,
    #[serde(default)]
    pub markers: DroneMarkers,
}

impl Drone {
    pub fn new(core: VehicleCore) -> Self {
        Self {
            core,
            state: DroneState::Flying,
            altitude: default_altitude(),
            low_battery_threshold: LOW_BATTERY_THRESHOLD,
            handoff_point: None,
            handoff_waiting_since: None,
            handoff_deadline: None,
            markers: DroneMarkers::default(),
        }
    }

    pub fn sanitize(&mut self) {
        self.core.sanitize();
        self.altitude = if self.altitude.is_finite() {
            self.altitude.clamp(0.0, 100.0)
        } else {
            default_altitude()
        };
        if !self.low_battery_threshold.is_finite() {
            self.low_battery_threshold = LOW_BATTERY_THRESHOLD;
        }
    }
}

impl FleetVehicle for Drone {
    fn core(&self) -> &VehicleCore {
        &self.core
    }

    fn class(&self) -> VehicleClass {
        VehicleClass::Drone
    }

    fn state_label(&self) -> &'static str {
        self.state.as_str()
    }

    fn is_idle(&self) -> bool {
        self.state == DroneState::Idle
    }

    fn is_charging(&self) -> bool {
        matches!(self.state, DroneState::Charging | DroneState::Swapping)
    }

    fn is_moving(&self) -> bool {
        matches!(self.state, DroneState::Flying | DroneState::EnRoute)
    }

    fn is_in_handoff(&self) -> bool {
        matches!(
            self.state,
            DroneState::HandoffWaiting | DroneState::HandoffActive
        )
    }
}

/// Markers left on a pod by applied decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PodMarkers {
    pub intercepting: bool,
    pub redistributed: bool,
    pub transporting_bots: bool,
}

/// Ground delivery pod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    #[serde(flatten)]
    pub core: VehicleCore,
    #[serde(default)]
    pub state: PodState,
    #[serde(default)]
    pub dispatch_progress: u32,
    #[serde(default)]
    pub load_progress: u32,
    #[serde(default)]
    pub bots_to_transport: u32,
    #[serde(default)]
    pub markers: PodMarkers,
}

impl Pod {
    pub fn new(core: VehicleCore) -> Self {
        Self {
            core,
            state: PodState::EnRoute,
            dispatch_progress: 0,
            load_progress: 0,
            bots_to_transport: 0,
            markers: PodMarkers::default(),
        }
    }
}

impl FleetVehicle for Pod {
    fn core(&self) -> &VehicleCore {
        &self.core
    }

    fn class(&self) -> VehicleClass {
        VehicleClass::Pod
    }

    fn state_label(&self) -> &'static str {
        self.state.as_str()
    }

    fn is_idle(&self) -> bool {
        false
    }

    fn is_charging(&self) -> bool {
        self.state == PodState::Charging
    }

    fn is_moving(&self) -> bool {
        self.state == PodState::EnRoute
    }

    fn is_in_handoff(&self) -> bool {
        self.state == PodState::Dispatching
    }
}

/// Markers left on a swarm bot by applied decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmBotMarkers {
    pub rebalancing: bool,
}

/// Sidewalk micro-delivery robot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmBot {
    /// `core.route_id` holds the assigned street, if any
    #[serde(flatten)]
    pub core: VehicleCore,
    #[serde(default)]
    pub state: SwarmBotState,
    /// Street grid zone this bot works in
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub base_position: LatLng,
    #[serde(default)]
    pub base_hub: Option<String>,
    #[serde(default)]
    pub target_position: Option<LatLng>,
    #[serde(default)]
    pub delivery_progress: u32,
    #[serde(default)]
    pub markers: SwarmBotMarkers,
}

impl SwarmBot {
    pub fn new(core: VehicleCore, base_position: LatLng) -> Self {
        Self {
            core,
            state: SwarmBotState::Idle,
            zone_id: None,
            base_position,
            base_hub: None,
            target_position: None,
            delivery_progress: 0,
            markers: SwarmBotMarkers::default(),
        }
    }
}

impl FleetVehicle for SwarmBot {
    fn core(&self) -> &VehicleCore {
        &self.core
    }

    fn class(&self) -> VehicleClass {
        VehicleClass::SwarmBot
    }

    fn state_label(&self) -> &'static str {
        self.state.as_str()
    }

    fn is_idle(&self) -> bool {
        self.state == SwarmBotState::Idle
    }

    fn is_charging(&self) -> bool {
        self.state == SwarmBotState::Charging
    }

    fn is_moving(&self) -> bool {
        matches!(
            self.state,
            SwarmBotState::Swarming | SwarmBotState::EnRoute | SwarmBotState::Returning
        )
    }

    fn is_in_handoff(&self) -> bool {
        matches!(
            self.state,
            SwarmBotState::HandoffWaiting | SwarmBotState::HandoffActive
        )
    }
}

/// All vehicle collections, one `Vec` per class, addressed by stable id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fleet {
    #[serde(default)]
    pub drones: Vec<Drone>,
    #[serde(default)]
    pub pods: Vec<Pod>,
    #[serde(default)]
    pub swarm_bots: Vec<SwarmBot>,
}

impl Fleet {
    pub fn len(&self) -> usize {
        self.drones.len() + self.pods.len() + self.swarm_bots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn drone(&self, id: &str) -> Option<&Drone> {
        self.drones.iter().find(|d| d.core.id == id)
    }

    pub fn drone_mut(&mut self, id: &str) -> Option<&mut Drone> {
        self.drones.iter_mut().find(|d| d.core.id == id)
    }

    pub fn pod(&self, id: &str) -> Option<&Pod> {
        self.pods.iter().find(|p| p.core.id == id)
    }

    pub fn pod_mut(&mut self, id: &str) -> Option<&mut Pod> {
        self.pods.iter_mut().find(|p| p.core.id == id)
    }

    pub fn swarm_bot(&self, id: &str) -> Option<&SwarmBot> {
        self.swarm_bots.iter().find(|b| b.core.id == id)
    }

    pub fn swarm_bot_mut(&mut self, id: &str) -> Option<&mut SwarmBot> {
        self.swarm_bots.iter_mut().find(|b| b.core.id == id)
    }

    /// Look up any vehicle by class and id
    pub fn vehicle(&self, class: VehicleClass, id: &str) -> Option<&dyn FleetVehicle> {
        match class {
            VehicleClass::Drone => self.drone(id).map(|d| d as &dyn FleetVehicle),
            VehicleClass::Pod => self.pod(id).map(|p| p as &dyn FleetVehicle),
            VehicleClass::SwarmBot => self.swarm_bot(id).map(|b| b as &dyn FleetVehicle),
        }
    }

    pub fn core_mut(&mut self, class: VehicleClass, id: &str) -> Option<&mut VehicleCore> {
        match class {
            VehicleClass::Drone => self.drone_mut(id).map(|d| &mut d.core),
            VehicleClass::Pod => self.pod_mut(id).map(|p| &mut p.core),
            VehicleClass::SwarmBot => self.swarm_bot_mut(id).map(|b| &mut b.core),
        }
    }

    /// Every vehicle, drones first, then pods, then swarm bots.
    pub fn vehicles(&self) -> impl Iterator<Item = &dyn FleetVehicle> {
        self.drones
            .iter()
            .map(|d| d as &dyn FleetVehicle)
            .chain(self.pods.iter().map(|p| p as &dyn FleetVehicle))
            .chain(self.swarm_bots.iter().map(|b| b as &dyn FleetVehicle))
    }

    pub fn of_class(&self, class: VehicleClass) -> Vec<&dyn FleetVehicle> {
        self.vehicles().filter(|v| v.class() == class).collect()
    }
}

// =============================================================================
// HUB ENTITIES
// =============================================================================

/// Slots per vehicle class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotCapacity {
    pub drone: u32,
    pub pod: u32,
    pub swarm: u32,
}

impl SlotCapacity {
    pub const fn new(drone: u32, pod: u32, swarm: u32) -> Self {
        Self { drone, pod, swarm }
    }

    /// Capacity used when a hub is configured without one
    pub const fn default_for(hub_type: HubType) -> Self {
        match hub_type {
            HubType::Rooftop => Self::new(6, 0, 0),
            HubType::Street => Self::new(0, 2, 8),
            HubType::Handoff => Self::new(2, 0, 4),
        }
    }

    pub fn for_class(&self, class: VehicleClass) -> u32 {
        match class {
            VehicleClass::Drone => self.drone,
            VehicleClass::Pod => self.pod,
            VehicleClass::SwarmBot => self.swarm,
        }
    }

    pub fn total(&self) -> u32 {
        self.drone + self.pod + self.swarm
    }
}

/// A vehicle holding or waiting for a hub slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub vehicle_id: String,
    pub class: VehicleClass,
}

/// Outcome of a slot claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotClaim {
    Granted,
    AlreadyHeld,
    /// No free slot; the vehicle waits in the hub's FIFO queue
    Queued,
}

/// Charging hub or handoff point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hub {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub zone: String,
    #[serde(rename = "type")]
    pub hub_type: HubType,
    #[serde(default)]
    pub position: LatLng,
    #[serde(default)]
    pub capacity: SlotCapacity,
    #[serde(default)]
    pub occupants: Vec<Occupant>,
    #[serde(default)]
    pub queue: VecDeque<Occupant>,
}

impl Hub {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        zone: impl Into<String>,
        hub_type: HubType,
        position: LatLng,
        capacity: SlotCapacity,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            zone: zone.into(),
            hub_type,
            position,
            capacity,
            occupants: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    /// Resolve a missing capacity to the per-type default.
    pub fn sanitize(&mut self) {
        if self.capacity.total() == 0 {
            self.capacity = SlotCapacity::default_for(self.hub_type);
        }
        if !self.position.is_finite() {
            self.position = LatLng::default();
        }
    }

    pub fn occupancy(&self, class: VehicleClass) -> u32 {
        self.occupants.iter().filter(|o| o.class == class).count() as u32
    }

    pub fn total_occupancy(&self) -> u32 {
        self.occupants.len() as u32
    }

    /// Occupied share of the class's slots; zero when the class has none.
    pub fn load_ratio(&self, class: VehicleClass) -> f64 {
        let capacity = self.capacity.for_class(class);
        if capacity == 0 {
            0.0
        } else {
            f64::from(self.occupancy(class)) / f64::from(capacity)
        }
    }

    pub fn has_free_slot(&self, class: VehicleClass) -> bool {
        self.occupancy(class) < self.capacity.for_class(class)
    }

    pub fn holds(&self, vehicle_id: &str) -> bool {
        self.occupants.iter().any(|o| o.vehicle_id == vehicle_id)
    }

    pub fn is_queued(&self, vehicle_id: &str) -> bool {
        self.queue.iter().any(|o| o.vehicle_id == vehicle_id)
    }

    /// Take a slot if one is free, otherwise join the queue.
    pub fn claim(&mut self, vehicle_id: &str, class: VehicleClass) -> SlotClaim {
        if self.holds(vehicle_id) {
            return SlotClaim::AlreadyHeld;
        }
        if self.is_queued(vehicle_id) {
            return SlotClaim::Queued;
        }

        let occupant = Occupant {
            vehicle_id: vehicle_id.to_string(),
            class,
        };
        if self.has_free_slot(class) {
            self.occupants.push(occupant);
            SlotClaim::Granted
        } else {
            self.queue.push_back(occupant);
            SlotClaim::Queued
        }
    }

    /// Drop the vehicle's slot or queue entry. Returns ids promoted from the queue.
    pub fn release(&mut self, vehicle_id: &str) -> Vec<String> {
        self.occupants.retain(|o| o.vehicle_id != vehicle_id);
        self.queue.retain(|o| o.vehicle_id != vehicle_id);
        self.promote_queue()
    }

    /// Move queued vehicles into free slots, FIFO per class.
    pub fn promote_queue(&mut self) -> Vec<String> {
        let mut promoted = Vec::new();
        let mut waiting = VecDeque::with_capacity(self.queue.len());

        while let Some(next) = self.queue.pop_front() {
            if self.has_free_slot(next.class) {
                promoted.push(next.vehicle_id.clone());
                self.occupants.push(next);
            } else {
                waiting.push_back(next);
            }
        }

        self.queue = waiting;
        promoted
    }

    /// Jump a queued vehicle to the head of the queue.
    pub fn move_to_front(&mut self, vehicle_id: &str) -> bool {
        match self.queue.iter().position(|o| o.vehicle_id == vehicle_id) {
            Some(index) => {
                if let Some(occupant) = self.queue.remove(index) {
                    self.queue.push_front(occupant);
                }
                true
            }
            None => false,
        }
    }
}

// =============================================================================
// ROUTES
// =============================================================================

/// Ordered waypoint path: drone corridor, pod route or street
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub zone: String,
    pub waypoints: Vec<LatLng>,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub speed_limit: Option<f64>,
    #[serde(default)]
    pub interpolation: Interpolation,
}

impl Route {
    pub fn new(
        id: impl Into<String>,
        zone: impl Into<String>,
        waypoints: Vec<LatLng>,
        interpolation: Interpolation,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            zone: zone.into(),
            waypoints,
            altitude: None,
            speed_limit: None,
            interpolation,
        }
    }

    pub fn start(&self) -> Option<LatLng> {
        self.waypoints.first().copied()
    }

    pub fn end(&self) -> Option<LatLng> {
        self.waypoints.last().copied()
    }
}

/// Sidewalk streets available to one swarm zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetZone {
    pub zone_id: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub center: LatLng,
    #[serde(default)]
    pub streets: Vec<Route>,
}

/// Swarm bot home zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmZone {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub zone: String,
    pub center: LatLng,
    /// Coverage radius in degrees
    #[serde(default)]
    pub radius: f64,
    /// Bots stationed in the zone
    #[serde(default)]
    pub density: u32,
    #[serde(default)]
    pub base_hub: Option<String>,
}

// =============================================================================
// SCENARIOS
// =============================================================================

/// Lifecycle of a decision request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioStatus {
    Pending,
    Resolved {
        option_id: String,
        resolution: Resolution,
        at: SimTime,
    },
    Expired {
        at: SimTime,
    },
}

/// Pending human/AI decision request tied to one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub scenario_type: ScenarioType,
    pub vehicle_id: String,
    pub vehicle_class: VehicleClass,
    pub created_at: SimTime,
    pub expires_at: SimTime,
    pub status: ScenarioStatus,
}

impl Scenario {
    pub fn new(
        id: Uuid,
        scenario_type: ScenarioType,
        vehicle_id: impl Into<String>,
        vehicle_class: VehicleClass,
        created_at: SimTime,
        countdown_secs: f64,
    ) -> Self {
        Self {
            id,
            scenario_type,
            vehicle_id: vehicle_id.into(),
            vehicle_class,
            created_at,
            expires_at: created_at.plus_secs(countdown_secs),
            status: ScenarioStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ScenarioStatus::Pending
    }

    /// Pending with its countdown elapsed
    pub fn is_due(&self, now: SimTime) -> bool {
        self.is_pending() && now >= self.expires_at
    }

    pub fn remaining_secs(&self, now: SimTime) -> f64 {
        self.expires_at.secs_since(now)
    }

    /// Transition to expired. True only on the call that performs the transition.
    pub fn expire(&mut self, now: SimTime) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.status = ScenarioStatus::Expired { at: now };
        true
    }

    /// Record the chosen option. Only a pending scenario can be resolved.
    pub fn resolve(
        &mut self,
        option_id: &str,
        resolution: Resolution,
        now: SimTime,
    ) -> Result<(), DomainError> {
        if !self.is_pending() {
            return Err(DomainError::ScenarioClosed { id: self.id });
        }
        self.status = ScenarioStatus::Resolved {
            option_id: option_id.to_string(),
            resolution,
            at: now,
        };
        Ok(())
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Domain-level errors
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Unknown scenario type: {0}")]
    UnknownScenarioType(String),

    #[error("Unknown vehicle class: {0}")]
    UnknownVehicleClass(String),

    #[error("Scenario {id} is no longer pending")]
    ScenarioClosed { id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::{Fake, Faker};

    fn hub(capacity: SlotCapacity) -> Hub {
        let id: String = Faker.fake();
        Hub::new(
            id,
            "Test Hub",
            "dtla",
            HubType::Street,
            LatLng::new(34.05, -118.25),
            capacity,
        )
    }

    #[test]
    fn test_battery_is_clamped() {
        let mut core = VehicleCore::new("d-1", "dtla", LatLng::default());
        core.set_battery(140.0);
        assert_eq!(core.battery, 100.0);
        core.set_battery(-3.0);
        assert_eq!(core.battery, 0.0);
        core.set_battery(f64::NAN);
        assert_eq!(core.battery, 0.0);
    }

    #[test]
    fn test_decode_applies_defaults() {
        let drone: Drone = serde_json::from_str(r#"{"id":"la-drone-1"}"#).unwrap();
        assert_eq!(drone.core.battery, 0.0);
        assert_eq!(drone.altitude, 100.0);
        assert_eq!(drone.low_battery_threshold, LOW_BATTERY_THRESHOLD);
        assert_eq!(drone.state, DroneState::Flying);
        assert_eq!(drone.core.direction, Direction::Forward);
    }

    #[test]
    fn test_direction_serializes_as_sign() {
        let json = serde_json::to_string(&Direction::Reverse).unwrap();
        assert_eq!(json, "-1");
        let parsed: Direction = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, Direction::Forward);
    }

    #[test]
    fn test_position_serializes_as_pair() {
        let json = serde_json::to_string(&LatLng::new(34.0452, -118.2551)).unwrap();
        assert_eq!(json, "[34.0452,-118.2551]");
        let parsed: LatLng = serde_json::from_str("[34.1, -118.2]").unwrap();
        assert_eq!(parsed, LatLng::new(34.1, -118.2));
    }

    #[test]
    fn test_hub_queues_when_full() {
        let mut hub = hub(SlotCapacity::new(0, 1, 0));
        assert_eq!(hub.claim("pod-1", VehicleClass::Pod), SlotClaim::Granted);
        assert_eq!(hub.claim("pod-2", VehicleClass::Pod), SlotClaim::Queued);
        assert_eq!(hub.claim("pod-1", VehicleClass::Pod), SlotClaim::AlreadyHeld);
        assert_eq!(hub.occupancy(VehicleClass::Pod), 1);
        assert!(hub.is_queued("pod-2"));

        let promoted = hub.release("pod-1");
        assert_eq!(promoted, vec!["pod-2".to_string()]);
        assert!(hub.holds("pod-2"));
        assert!(hub.queue.is_empty());
    }

    #[test]
    fn test_hub_queue_is_per_class() {
        let mut hub = hub(SlotCapacity::new(0, 1, 1));
        hub.claim("pod-1", VehicleClass::Pod);
        hub.claim("pod-2", VehicleClass::Pod);
        assert_eq!(hub.claim("bot-1", VehicleClass::SwarmBot), SlotClaim::Granted);
        assert!(hub.is_queued("pod-2"));
        assert!((hub.load_ratio(VehicleClass::Pod) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hub_move_to_front() {
        let mut hub = hub(SlotCapacity::new(0, 1, 0));
        hub.claim("pod-1", VehicleClass::Pod);
        hub.claim("pod-2", VehicleClass::Pod);
        hub.claim("pod-3", VehicleClass::Pod);
        assert!(hub.move_to_front("pod-3"));
        assert_eq!(hub.release("pod-1"), vec!["pod-3".to_string()]);
    }

    #[test]
    fn test_hub_sanitize_defaults_capacity() {
        let mut hub = hub(SlotCapacity::default());
        hub.sanitize();
        assert_eq!(hub.capacity, SlotCapacity::default_for(HubType::Street));
    }

    #[test]
    fn test_scenario_expires_once() {
        let mut scenario = Scenario::new(
            Uuid::nil(),
            ScenarioType::WeatherAlert,
            "la-drone-1",
            VehicleClass::Drone,
            SimTime::ZERO,
            30.0,
        );
        assert!(!scenario.expire(SimTime::from_secs(10.0)));
        assert!(scenario.expire(SimTime::from_secs(30.0)));
        assert!(!scenario.expire(SimTime::from_secs(31.0)));
        assert_eq!(
            scenario.status,
            ScenarioStatus::Expired {
                at: SimTime::from_secs(30.0)
            }
        );
    }

    #[test]
    fn test_resolved_scenario_cannot_resolve_again() {
        let mut scenario = Scenario::new(
            Uuid::nil(),
            ScenarioType::HubCongestion,
            "la-pod-1",
            VehicleClass::Pod,
            SimTime::ZERO,
            40.0,
        );
        scenario
            .resolve("redistribute", Resolution::Human, SimTime::from_secs(1.0))
            .unwrap();
        assert!(matches!(
            scenario.resolve("redistribute", Resolution::Human, SimTime::from_secs(2.0)),
            Err(DomainError::ScenarioClosed { .. })
        ));
        assert!(!scenario.expire(SimTime::from_secs(100.0)));
    }

    #[test]
    fn test_scenario_type_round_trips_through_str() {
        for scenario_type in ScenarioType::ALL {
            assert_eq!(scenario_type.as_str().parse::<ScenarioType>().unwrap(), scenario_type);
        }
        assert!("meteor_strike".parse::<ScenarioType>().is_err());
    }

    #[test]
    fn test_fleet_lookup_by_class() {
        let mut fleet = Fleet::default();
        fleet
            .drones
            .push(Drone::new(VehicleCore::new("d-1", "dtla", LatLng::default())));
        fleet
            .pods
            .push(Pod::new(VehicleCore::new("p-1", "pasadena", LatLng::default())));

        assert_eq!(fleet.len(), 2);
        assert!(fleet.vehicle(VehicleClass::Drone, "d-1").is_some());
        assert!(fleet.vehicle(VehicleClass::Pod, "d-1").is_none());
        assert_eq!(fleet.of_class(VehicleClass::Pod).len(), 1);
    }
}
