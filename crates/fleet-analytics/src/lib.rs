//! # Fleet Analytics
//!
//! Read-only aggregation over a fleet snapshot.
//!
//! ## Features
//!
//! - Fleet summary metrics (active, charging, delivering, utilization)
//! - Per-class breakdown
//! - Hub load summary
//! - JSON and Markdown reports

#![forbid(unsafe_code)]
#![warn(clippy::all, missing_docs)]

pub mod error;
pub mod reports;
pub mod stats;

pub use error::AnalyticsError;
pub use reports::{FleetReport, ScenarioSummary};
pub use stats::{ClassStats, FleetStats, HubLoad, aggregate, aggregate_fleet};
