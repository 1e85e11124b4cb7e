//! Report generation for fleet snapshots.

use crate::error::Result;
use crate::stats::{self, ClassStats, FleetStats, HubLoad};
use fleet_domain::{Fleet, Hub, Resolution, Scenario, ScenarioStatus, ScenarioType, SimTime};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// Decision outcomes over a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    /// Scenarios seen
    pub total: usize,
    /// Still waiting for a decision
    pub pending: usize,
    /// Resolved by an operator
    pub resolved_human: usize,
    /// Resolved automatically on expiry
    pub resolved_ai: usize,
    /// Expired without a decision
    pub expired: usize,
    /// Count per scenario type, catalog order, zero counts omitted
    pub by_type: Vec<(ScenarioType, usize)>,
}

impl ScenarioSummary {
    /// Tally scenario outcomes.
    pub fn from_scenarios(scenarios: &[Scenario]) -> Self {
        let mut summary = Self {
            total: scenarios.len(),
            ..Self::default()
        };

        for scenario in scenarios {
            match &scenario.status {
                ScenarioStatus::Pending => summary.pending += 1,
                ScenarioStatus::Resolved {
                    resolution: Resolution::Human,
                    ..
                } => summary.resolved_human += 1,
                ScenarioStatus::Resolved {
                    resolution: Resolution::Ai,
                    ..
                } => summary.resolved_ai += 1,
                ScenarioStatus::Expired { .. } => summary.expired += 1,
            }
        }

        summary.by_type = ScenarioType::ALL
            .into_iter()
            .map(|t| (t, scenarios.iter().filter(|s| s.scenario_type == t).count()))
            .filter(|(_, count)| *count > 0)
            .collect();

        summary
    }
}

/// Fleet report for one point in simulated time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetReport {
    /// Wall-clock generation time, RFC 3339
    pub generated_at: String,
    /// Simulated seconds elapsed
    pub sim_time_secs: f64,
    /// Fleet-wide metrics
    pub stats: FleetStats,
    /// Per-class breakdown
    pub classes: Vec<ClassStats>,
    /// Per-hub load
    pub hubs: Vec<HubLoad>,
    /// Packages on board any vehicle
    pub packages_in_transit: u32,
    /// Decision outcomes
    pub scenarios: ScenarioSummary,
}

impl FleetReport {
    /// Build a report from a snapshot.
    pub fn build(fleet: &Fleet, hubs: &[Hub], scenarios: &[Scenario], now: SimTime) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            sim_time_secs: now.as_secs(),
            stats: stats::aggregate_fleet(fleet),
            classes: stats::class_breakdown(fleet),
            hubs: stats::hub_loads(hubs),
            packages_in_transit: stats::packages_in_transit(fleet),
            scenarios: ScenarioSummary::from_scenarios(scenarios),
        }
    }

    /// Report as a pretty JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON report to `path`.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        info!("Wrote fleet report to {}", path.display());
        Ok(())
    }

    /// Report as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str("# Delivery Fleet Report\n\n");
        let _ = writeln!(md, "**Generated:** {}", self.generated_at);
        let _ = writeln!(md, "**Simulated time:** {:.1}s\n", self.sim_time_secs);

        md.push_str("## Fleet Summary\n\n");
        md.push_str("| Metric | Value |\n");
        md.push_str("|--------|-------|\n");
        let _ = writeln!(md, "| Total Vehicles | {} |", self.stats.total_vehicles);
        let _ = writeln!(md, "| Active | {} |", self.stats.active);
        let _ = writeln!(md, "| Charging | {} |", self.stats.charging);
        let _ = writeln!(md, "| Delivering | {} |", self.stats.delivering);
        let _ = writeln!(md, "| Low Battery | {} |", self.stats.low_battery);
        let _ = writeln!(md, "| Utilization | {:.1}% |", self.stats.utilization);
        let _ = writeln!(md, "| Avg Battery | {:.1}% |", self.stats.avg_battery);
        let _ = writeln!(md, "| Packages In Transit | {} |", self.packages_in_transit);
        md.push('\n');

        if !self.classes.is_empty() {
            md.push_str("## Vehicle Classes\n\n");
            md.push_str("| Class | Total | Active | Moving | Charging | Handoff | Packages | Avg Battery |\n");
            md.push_str("|-------|-------|--------|--------|----------|---------|----------|-------------|\n");
            for class in &self.classes {
                let _ = writeln!(
                    md,
                    "| {} | {} | {} | {} | {} | {} | {} | {:.1}% |",
                    class.class,
                    class.total,
                    class.active,
                    class.moving,
                    class.charging,
                    class.in_handoff,
                    class.packages,
                    class.avg_battery
                );
            }
            md.push('\n');
        }

        if !self.hubs.is_empty() {
            md.push_str("## Hub Load\n\n");
            md.push_str("| Hub | Type | Occupancy | Queued | Utilization |\n");
            md.push_str("|-----|------|-----------|--------|-------------|\n");
            for hub in &self.hubs {
                let _ = writeln!(
                    md,
                    "| {} | {} | {}/{} | {} | {:.1}% |",
                    hub.name,
                    hub.hub_type.as_str(),
                    hub.occupancy,
                    hub.capacity,
                    hub.queued,
                    hub.utilization
                );
            }
            md.push('\n');
        }

        if self.scenarios.total > 0 {
            let s = &self.scenarios;
            md.push_str("## Decisions\n\n");
            md.push_str("| Pending | Operator | Auto | Expired |\n");
            md.push_str("|---------|----------|------|---------|\n");
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} |",
                s.pending, s.resolved_human, s.resolved_ai, s.expired
            );
            md.push('\n');
            for (scenario_type, count) in &s.by_type {
                let _ = writeln!(md, "- {scenario_type}: {count}");
            }
            md.push('\n');
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_domain::{Uuid, VehicleClass};

    fn scenario(scenario_type: ScenarioType) -> Scenario {
        Scenario::new(
            Uuid::nil(),
            scenario_type,
            "la-drone-1",
            VehicleClass::Drone,
            SimTime::ZERO,
            30.0,
        )
    }

    #[test]
    fn test_empty_report() {
        let report = FleetReport::build(&Fleet::default(), &[], &[], SimTime::ZERO);
        assert_eq!(report.stats.total_vehicles, 0);
        assert!(report.hubs.is_empty());
        assert_eq!(report.scenarios.total, 0);
    }

    #[test]
    fn test_markdown_generation() {
        let report = FleetReport::build(&Fleet::default(), &[], &[], SimTime::from_secs(12.0));
        let md = report.to_markdown();
        assert!(md.contains("# Delivery Fleet Report"));
        assert!(md.contains("12.0s"));
        assert!(!md.contains("## Decisions"));
    }

    #[test]
    fn test_scenario_summary() {
        let mut human = scenario(ScenarioType::WeatherAlert);
        human
            .resolve("ground", Resolution::Human, SimTime::from_secs(1.0))
            .unwrap();
        let mut ai = scenario(ScenarioType::WeatherAlert);
        ai.resolve("ground", Resolution::Ai, SimTime::from_secs(30.0))
            .unwrap();
        let pending = scenario(ScenarioType::EmergencyLanding);

        let summary = ScenarioSummary::from_scenarios(&[human, ai, pending]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.resolved_human, 1);
        assert_eq!(summary.resolved_ai, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(
            summary.by_type,
            vec![
                (ScenarioType::WeatherAlert, 2),
                (ScenarioType::EmergencyLanding, 1)
            ]
        );
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = FleetReport::build(&Fleet::default(), &[], &[], SimTime::ZERO);
        report.write_json(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed["stats"]["total_vehicles"], 0);
    }
}
