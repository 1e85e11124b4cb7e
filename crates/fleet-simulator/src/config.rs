//! # Simulator Configuration
//!
//! Environment-based configuration for the fleet simulator. Every value has
//! a default; a value that is set but cannot be parsed is an error.

use crate::error::{Result, SimulatorError};
use crate::fleet::FleetConfig;
use crate::scenario::{ExpiryPolicy, TriggerRates};
use crate::transport::DEFAULT_API_URL;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Wall milliseconds between ticks
    pub tick_ms: u64,

    /// Ticks to run; `None` runs until interrupted
    pub duration_ticks: Option<u64>,

    /// Simulated seconds per wall second
    pub time_scale: f64,

    /// Seed for reproducible runs
    pub seed: Option<u64>,

    /// Vehicles per class
    pub fleet: FleetConfig,

    /// City network JSON; the built-in Los Angeles network when unset
    pub network_file: Option<PathBuf>,

    /// Delivery control API base URL
    pub api_url: String,

    pub expiry_policy: ExpiryPolicy,

    pub trigger_rates: TriggerRates,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_ms: 16,
            duration_ticks: None,
            time_scale: 1.0,
            seed: None,
            fleet: FleetConfig::default(),
            network_file: None,
            api_url: DEFAULT_API_URL.to_string(),
            expiry_policy: ExpiryPolicy::default(),
            trigger_rates: TriggerRates::default(),
        }
    }
}

impl SimulatorConfig {
    /// Load configuration from `FLEET_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let rates = defaults.trigger_rates;

        Ok(Self {
            tick_ms: parse(&lookup, "FLEET_TICK_MS")?.unwrap_or(defaults.tick_ms),
            duration_ticks: parse(&lookup, "FLEET_DURATION_TICKS")?,
            time_scale: parse(&lookup, "FLEET_TIME_SCALE")?.unwrap_or(defaults.time_scale),
            seed: parse(&lookup, "FLEET_SEED")?,

            fleet: FleetConfig {
                drones: parse(&lookup, "FLEET_DRONES")?.unwrap_or(defaults.fleet.drones),
                pods: parse(&lookup, "FLEET_PODS")?.unwrap_or(defaults.fleet.pods),
                swarm_bots: parse(&lookup, "FLEET_SWARM_BOTS")?
                    .unwrap_or(defaults.fleet.swarm_bots),
            },

            network_file: lookup("FLEET_NETWORK_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),

            api_url: lookup("FLEET_API_URL").unwrap_or(defaults.api_url),

            expiry_policy: parse(&lookup, "FLEET_EXPIRY_POLICY")?
                .unwrap_or(defaults.expiry_policy),

            trigger_rates: TriggerRates {
                weather: parse(&lookup, "FLEET_WEATHER_RATE")?.unwrap_or(rates.weather),
                priority: parse(&lookup, "FLEET_PRIORITY_RATE")?.unwrap_or(rates.priority),
                demo: parse(&lookup, "FLEET_DEMO_RATE")?.unwrap_or(rates.demo),
                ..rates
            },
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|err| SimulatorError::Config(format!("{key}={raw}: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SimulatorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.tick_ms, 16);
        assert_eq!(config.duration_ticks, None);
        assert_eq!(config.fleet, FleetConfig::default());
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.expiry_policy, ExpiryPolicy::AutoResolve);
        assert_eq!(config.trigger_rates, TriggerRates::default());
    }

    #[test]
    fn test_overrides() {
        let config = SimulatorConfig::from_lookup(lookup(&[
            ("FLEET_TICK_MS", "50"),
            ("FLEET_DURATION_TICKS", "600"),
            ("FLEET_TIME_SCALE", "4.5"),
            ("FLEET_SEED", "42"),
            ("FLEET_SWARM_BOTS", "9"),
            ("FLEET_NETWORK_FILE", "/tmp/city.json"),
            ("FLEET_EXPIRY_POLICY", "expire-only"),
            ("FLEET_DEMO_RATE", "0"),
        ]))
        .unwrap();

        assert_eq!(config.tick_ms, 50);
        assert_eq!(config.duration_ticks, Some(600));
        assert_eq!(config.time_scale, 4.5);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.fleet.swarm_bots, 9);
        assert_eq!(config.fleet.drones, 12);
        assert_eq!(config.network_file, Some(PathBuf::from("/tmp/city.json")));
        assert_eq!(config.expiry_policy, ExpiryPolicy::ExpireOnly);
        assert_eq!(config.trigger_rates.demo, 0.0);
        assert_eq!(config.trigger_rates.emergency_battery, 12.0);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config =
            SimulatorConfig::from_lookup(lookup(&[("FLEET_SEED", " "), ("FLEET_NETWORK_FILE", "")]))
                .unwrap();
        assert_eq!(config.seed, None);
        assert_eq!(config.network_file, None);
    }

    #[test]
    fn test_malformed_value_is_config_error() {
        let err = SimulatorConfig::from_lookup(lookup(&[("FLEET_DRONES", "twelve")])).unwrap_err();
        assert!(matches!(err, SimulatorError::Config(ref msg) if msg.contains("FLEET_DRONES")));

        let err =
            SimulatorConfig::from_lookup(lookup(&[("FLEET_EXPIRY_POLICY", "panic")])).unwrap_err();
        assert!(matches!(err, SimulatorError::Config(_)));
    }
}
