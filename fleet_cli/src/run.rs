use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use anyhow::Context;
use clap::{Args, ValueEnum};
use comfy_table::Table;
use fleet_core::{
    config::fleet_config::FleetConfig,
    engine::SimulationEngine,
    lifecycle::vehicle_daemon::VehicleSpec,
    simulation::{
        simulation::{RunSummary, Simulation},
        simulation_params::{RunParams, Termination},
    },
};
use fleet_publisher::{
    channel_publisher::{ChannelPublisher, PublisherHandle, PublisherStats, spawn_publisher},
    http_transport::{HttpTransport, HttpTransportParams},
    log_transport::LogTransport,
    transport::Transport,
};
use tracing::{info, warn};

use crate::{inputs::InputArgs, parsers};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    /// Log every message
    Log,
    /// POST every message to FLEET_PUBLISH_URL
    Http,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    inputs: InputArgs,

    /// Simulated time to run for (e.g., "10m", "PT1H"), until Ctrl-C otherwise
    #[arg(short, long, value_parser = parsers::parse_duration)]
    duration: Option<jiff::SignedDuration>,

    /// Overrides the configured publish interval
    #[arg(short, long, value_parser = parsers::parse_duration)]
    publish_interval: Option<jiff::SignedDuration>,

    #[arg(long, value_enum, default_value_t = TransportKind::Log)]
    transport: TransportKind,

    /// Pace the simulation on wall-clock time
    #[arg(long)]
    realtime: bool,

    /// Overrides the configured master seed
    #[arg(long)]
    seed: Option<u64>,

    /// Messages buffered before the publisher starts dropping
    #[arg(long, default_value_t = 1024)]
    queue_capacity: usize,
}

pub async fn run(args: RunArgs) -> Result<(), anyhow::Error> {
    match args.transport {
        TransportKind::Log => run_with(args, LogTransport).await,
        TransportKind::Http => {
            let transport = HttpTransport::new(HttpTransportParams::from_env()?)?;
            run_with(args, transport).await
        }
    }
}

async fn run_with<T>(args: RunArgs, transport: T) -> Result<(), anyhow::Error>
where
    T: Transport,
{
    let mut config = args.inputs.load_config()?;
    if let Some(publish_interval) = args.publish_interval {
        config.publish_interval = publish_interval;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate()?;

    let engine = args.inputs.load_engine()?;
    let specs = args.inputs.load_fleet(&config)?;

    let params = RunParams {
        terminations: match args.duration {
            Some(duration) => vec![Termination::Duration(duration), Termination::NoVehiclesExpected],
            None => vec![Termination::NoVehiclesExpected],
        },
        realtime: args.realtime,
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let signal_cancel = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping");
            signal_cancel.store(true, Ordering::SeqCst);
        }
    });

    let (publisher, handle) = spawn_publisher(transport, args.queue_capacity);
    let (summary, stats) = drive(engine, specs, config, params, cancel, publisher, handle).await?;

    print_summary(&summary, &stats);

    Ok(())
}

/// Runs the simulation on a blocking thread, then drains the publisher. The
/// worker is awaited on every exit path, before any simulation error is
/// returned.
async fn drive<E>(
    engine: E,
    specs: Vec<VehicleSpec>,
    config: FleetConfig,
    params: RunParams,
    cancel: Arc<AtomicBool>,
    publisher: ChannelPublisher,
    handle: PublisherHandle,
) -> Result<(RunSummary, PublisherStats), anyhow::Error>
where
    E: SimulationEngine + Send + 'static,
{
    // the simulation owns the last publisher clone, dropping it lets the worker drain and exit
    let outcome = tokio::task::spawn_blocking(move || -> Result<RunSummary, anyhow::Error> {
        let mut simulation = Simulation::build(engine, specs, &config, publisher)?;
        let summary = simulation.run(&params, &cancel)?;
        Ok(summary)
    })
    .await;

    let stats = handle.shutdown().await.context("Publisher task panicked")?;
    info!("Publisher drained, {} messages sent", stats.sent);
    if stats.dropped > 0 || stats.failed > 0 {
        warn!("{} messages dropped, {} failed", stats.dropped, stats.failed);
    }

    let summary = outcome.context("Simulation thread panicked")??;

    Ok((summary, stats))
}

fn print_summary(summary: &RunSummary, stats: &PublisherStats) {
    let phases = summary.phase_counts;

    let mut table = Table::new();
    table.set_header(vec!["Run", "Value"]);
    table.add_row(vec!["Stop reason".to_string(), format!("{:?}", summary.stop_reason)]);
    table.add_row(vec!["Steps".to_string(), summary.steps.to_string()]);
    table.add_row(vec!["Failed steps".to_string(), summary.failed_steps.to_string()]);
    table.add_row(vec!["Simulated".to_string(), format!("{:#}", summary.simulated)]);
    table.add_row(vec!["Publish ticks".to_string(), summary.publish_ticks.to_string()]);
    table.add_row(vec!["Samples".to_string(), summary.samples.to_string()]);
    table.add_row(vec!["Skipped".to_string(), summary.skipped.to_string()]);
    table.add_row(vec!["Messages sent".to_string(), stats.sent.to_string()]);
    table.add_row(vec!["Messages failed".to_string(), stats.failed.to_string()]);
    table.add_row(vec!["Messages dropped".to_string(), stats.dropped.to_string()]);
    table.add_row(vec![
        "Vehicles".to_string(),
        format!(
            "{} active, {} dispatched, {} respawning, {} stranded, {} unlaunched",
            phases.active, phases.dispatched, phases.respawning, phases.stranded, phases.unlaunched
        ),
    ]);

    println!("{table}");
}
