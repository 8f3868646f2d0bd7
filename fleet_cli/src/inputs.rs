use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use fleet_core::{
    config::fleet_config::FleetConfig,
    lifecycle::vehicle_daemon::VehicleSpec,
    trips::{read_trips, select_fleet},
};
use fleet_network::{network::Network, network_engine::NetworkEngine};
use tracing::info;

use crate::parsers;

/// Files every subcommand needs.
#[derive(Args)]
pub struct InputArgs {
    /// Road network definition (JSON)
    #[arg(short, long)]
    pub network: PathBuf,

    /// Trip file (JSON), one trip per fleet vehicle
    #[arg(short, long)]
    pub trips: PathBuf,

    /// Fleet configuration (JSON), defaults are used when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Only use the first N trips
    #[arg(long)]
    pub fleet_size: Option<usize>,

    /// Length of one engine step (e.g., "1s", "500ms")
    #[arg(long, value_parser = parsers::parse_duration, default_value = "1s")]
    pub step_length: jiff::SignedDuration,
}

impl InputArgs {
    pub fn load_config(&self) -> Result<FleetConfig, anyhow::Error> {
        let mut config = match &self.config {
            Some(path) => FleetConfig::from_file(path)?,
            None => FleetConfig::default(),
        };

        if self.fleet_size.is_some() {
            config.fleet_size = self.fleet_size;
        }

        Ok(config)
    }

    pub fn load_engine(&self) -> Result<NetworkEngine, anyhow::Error> {
        let network = load_network(&self.network)?;
        Ok(NetworkEngine::new(network, self.step_length))
    }

    pub fn load_fleet(&self, config: &FleetConfig) -> Result<Vec<VehicleSpec>, anyhow::Error> {
        let trips = read_trips(&self.trips)?;
        let specs = select_fleet(&trips, config)?;

        info!("Fleet of {} vehicles out of {} trips", specs.len(), trips.len());

        Ok(specs)
    }
}

fn load_network(path: &Path) -> Result<Network, anyhow::Error> {
    let network = Network::from_file(path)
        .with_context(|| format!("Failed to load network {}", path.display()))?;

    info!("Loaded network {} ({} edges)", path.display(), network.edges().len());

    Ok(network)
}
