//! Control API client.
//!
//! Commands are posted as `{action, ...params}` JSON. Every call reports a
//! plain success flag; failures are logged and never propagated into the
//! simulation.

use crate::error::Result;
use crate::telemetry::{FleetSnapshot, TelemetryMessage};
use fleet_domain::{LatLng, VehicleClass};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
/// Wait after a failed publish before trying again.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(2000);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Control command understood by the delivery API and by
/// [`Simulation::apply_command`](crate::fleet::Simulation::apply_command).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    Start,
    Stop,
    SetTimeScale {
        value: f64,
    },
    DispatchDrone {
        drone_id: String,
        #[serde(default)]
        target_pos: Option<LatLng>,
    },
    DispatchPod {
        pod_id: String,
        route_id: String,
    },
    DispatchSwarm {
        pod_id: String,
        count: u32,
        zone_id: String,
    },
    EmergencyReturn {
        vehicle_id: String,
        vehicle_type: VehicleClass,
    },
}

/// Fixed-delay retry gate for telemetry publishing.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    delay: Duration,
    enabled: bool,
    retry_at: Option<Instant>,
}

impl ReconnectPolicy {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            enabled: true,
            retry_at: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stop retrying after an explicit disconnect.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.retry_at = None;
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// True when an attempt may be made at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        self.enabled && self.retry_at.is_none_or(|at| now >= at)
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.retry_at = Some(now + self.delay);
    }

    pub fn record_success(&mut self) {
        self.retry_at = None;
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(RECONNECT_DELAY)
    }
}

/// HTTP client for the delivery control API.
pub struct ControlClient {
    client: Client,
    api_url: String,
    policy: ReconnectPolicy,
}

impl ControlClient {
    pub fn new(api_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            policy: ReconnectPolicy::default(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Post a control command. True on a 2xx response.
    pub async fn send_command(&self, command: &Command) -> bool {
        let response = self
            .client
            .post(self.endpoint("/api/delivery/control"))
            .json(command)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("Command rejected with status: {}", response.status());
                false
            }
            Err(err) => {
                warn!("Command failed: {}", err);
                false
            }
        }
    }

    /// Fetch the full state, shaped like the `delivery:state` payload.
    pub async fn fetch_state(&self) -> Option<FleetSnapshot> {
        let response = match self.client.get(self.endpoint("/api/delivery")).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!("State fetch returned status: {}", response.status());
                return None;
            }
            Err(err) => {
                warn!("Failed to fetch state: {}", err);
                return None;
            }
        };

        match response.json::<FleetSnapshot>().await {
            Ok(mut snapshot) => {
                snapshot.sanitize();
                Some(snapshot)
            }
            Err(err) => {
                warn!("Failed to decode state: {}", err);
                None
            }
        }
    }

    /// Publish a telemetry message unless the retry gate is closed.
    pub async fn publish(&mut self, message: &TelemetryMessage) -> bool {
        if !self.policy.ready(Instant::now()) {
            debug!("Publish skipped until reconnect delay passes");
            return false;
        }

        let result = self
            .client
            .post(self.endpoint("/api/delivery/telemetry"))
            .json(message)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                if self.policy.retry_at.is_some() {
                    info!("Telemetry endpoint reachable again");
                }
                self.policy.record_success();
                true
            }
            Ok(response) => {
                warn!("Telemetry rejected with status: {}", response.status());
                self.policy.record_failure(Instant::now());
                false
            }
            Err(err) => {
                warn!(
                    "Failed to publish telemetry: {}; retrying in {:?}",
                    err, self.policy.delay
                );
                self.policy.record_failure(Instant::now());
                false
            }
        }
    }

    /// Stop publishing for good.
    pub fn disconnect(&mut self) {
        self.policy.disable();
    }
}
