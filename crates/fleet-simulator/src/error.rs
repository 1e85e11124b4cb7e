//! Simulator error types.

use fleet_domain::DomainError;
use thiserror::Error;
use uuid::Uuid;

/// Simulator errors.
#[derive(Error, Debug)]
pub enum SimulatorError {
    /// Configuration value could not be used
    #[error("Configuration error: {0}")]
    Config(String),

    /// City network file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// City network file could not be decoded
    #[error("Network decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// City network is unusable
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    /// No scenario with this id is pending
    #[error("Scenario {0} is not pending")]
    ScenarioNotPending(Uuid),

    /// Option id is not part of the scenario's catalog entry
    #[error("Unknown option '{option_id}' for scenario {scenario_id}")]
    UnknownOption { scenario_id: Uuid, option_id: String },

    /// Domain rule violation
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Control API request failed
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Result type for simulator operations.
pub type Result<T> = std::result::Result<T, SimulatorError>;
