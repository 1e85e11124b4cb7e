//! Delivery Fleet Simulator CLI
//!
//! Runs the fleet tick loop and publishes state to the delivery API.

use anyhow::Result;
use clap::Parser;
use fleet_simulator::{
    CityNetwork, Command, ControlClient, ExpiryPolicy, ScenarioEngine, SeededRandom, Simulation,
    SimulatorConfig,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fleet-simulator")]
#[command(about = "Simulate a multi-class autonomous delivery fleet")]
struct Args {
    /// Tick interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Total run length in ticks (runs until Ctrl-C when unset)
    #[arg(long)]
    duration: Option<u64>,

    /// Simulated seconds per wall second
    #[arg(long)]
    time_scale: Option<f64>,

    /// Random seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Number of drones
    #[arg(long)]
    drones: Option<usize>,

    /// Number of pods
    #[arg(long)]
    pods: Option<usize>,

    /// Number of swarm bots
    #[arg(long)]
    swarm_bots: Option<usize>,

    /// City network JSON file
    #[arg(long)]
    network: Option<PathBuf>,

    /// Delivery API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// What happens to expired scenarios (auto-resolve, expire-only)
    #[arg(long)]
    expiry_policy: Option<String>,

    /// Log fleet stats every N ticks
    #[arg(long, default_value = "300")]
    stats_every: u64,

    /// Publish the full state every N ticks
    #[arg(long, default_value = "30")]
    publish_every: u64,

    /// Write the final JSON report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Dry run (don't talk to the API)
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn apply(&self, config: &mut SimulatorConfig) -> Result<()> {
        if let Some(tick_ms) = self.tick_ms {
            config.tick_ms = tick_ms;
        }
        if self.duration.is_some() {
            config.duration_ticks = self.duration;
        }
        if let Some(time_scale) = self.time_scale {
            config.time_scale = time_scale;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(drones) = self.drones {
            config.fleet.drones = drones;
        }
        if let Some(pods) = self.pods {
            config.fleet.pods = pods;
        }
        if let Some(swarm_bots) = self.swarm_bots {
            config.fleet.swarm_bots = swarm_bots;
        }
        if self.network.is_some() {
            config.network_file.clone_from(&self.network);
        }
        if let Some(api_url) = &self.api_url {
            config.api_url.clone_from(api_url);
        }
        if let Some(policy) = &self.expiry_policy {
            config.expiry_policy = policy.parse::<ExpiryPolicy>()?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fleet_simulator=info".parse()?))
        .init();

    let args = Args::parse();
    let mut config = SimulatorConfig::from_env()?;
    args.apply(&mut config)?;

    let network = match &config.network_file {
        Some(path) => CityNetwork::from_json_file(path)?,
        None => CityNetwork::los_angeles()?,
    };
    info!(
        "Starting fleet simulation: {} ({} drones, {} pods, {} swarm bots)",
        network.name, config.fleet.drones, config.fleet.pods, config.fleet.swarm_bots
    );

    let engine = ScenarioEngine::new(config.trigger_rates, config.expiry_policy);
    let mut sim = Simulation::new(
        network,
        config.fleet,
        engine,
        Box::new(SeededRandom::new(config.seed)),
    );
    sim.set_time_scale(config.time_scale);

    let mut client = if args.dry_run {
        None
    } else {
        Some(ControlClient::new(config.api_url.as_str())?)
    };

    info!("API: {}", if args.dry_run { "disabled" } else { config.api_url.as_str() });
    info!(
        "Tick: {}ms, Duration: {}, Seed: {:?}, Expiry: {:?}",
        config.tick_ms,
        config
            .duration_ticks
            .map_or_else(|| "until interrupted".to_string(), |d| format!("{d} ticks")),
        config.seed,
        config.expiry_policy
    );

    if let Some(client) = &client {
        if let Some(remote) = client.fetch_state().await {
            info!(
                "API currently reports {} vehicles and {} hubs",
                remote.fleet().len(),
                remote.hubs.len()
            );
        }
        if !client.send_command(&Command::Start).await {
            warn!("API did not acknowledge start");
        }
    }

    let started = chrono::Utc::now();
    let dt_ms = config.tick_ms.max(1) as f64;
    let stats_every = args.stats_every.max(1);
    let publish_every = args.publish_every.max(1);
    let mut ticker = interval(Duration::from_millis(config.tick_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut tick: u64 = 0;
    loop {
        if config.duration_ticks.is_some_and(|limit| tick >= limit) {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }

        let report = sim.tick(dt_ms);
        tick += 1;

        for scenario in &report.opened {
            info!(
                "  Awaiting decision on {} for {} (expires at {})",
                scenario.scenario_type, scenario.vehicle_id, scenario.expires_at
            );
        }

        // Show fleet stats periodically
        if tick % stats_every == 0 {
            let stats = sim.stats();
            info!(
                "Tick {} | {} | Active: {}/{} | Charging: {} | Delivering: {} | Low battery: {} | Avg battery: {:.1}% | Pending: {}",
                tick,
                sim.now(),
                stats.active,
                stats.total_vehicles,
                stats.charging,
                stats.delivering,
                stats.low_battery,
                stats.avg_battery,
                sim.scenarios().pending_count()
            );
        }

        if let Some(client) = client.as_mut() {
            if tick % publish_every == 0 {
                client.publish(&sim.state_message()).await;
            }
        }
    }

    let elapsed = chrono::Utc::now() - started;
    info!(
        "Simulation complete: {} ticks, {} simulated, {}s wall time",
        tick,
        sim.now(),
        elapsed.num_seconds()
    );

    if let Some(mut client) = client {
        client.send_command(&Command::Stop).await;
        client.disconnect();
    }

    let report = sim.report();
    println!("{}", report.to_markdown());
    if let Some(path) = &args.report {
        report.write_json(path)?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}
