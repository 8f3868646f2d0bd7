use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;

use crate::{routes::RoutesArgs, run::RunArgs};

mod inputs;
mod parsers;
mod routes;
mod run;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short = 'v', long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fleet and publish its telemetry
    Run {
        #[command(flatten)]
        args: RunArgs,
    },
    /// Print the stitched route of every fleet vehicle
    #[command(visible_alias = "r")]
    Routes {
        #[command(flatten)]
        args: RoutesArgs,
    },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::from_filename("./.env.local").ok();

    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    match cli.command {
        Commands::Run { args } => run::run(args).await?,
        Commands::Routes { args } => routes::run(args)?,
    }

    Ok(())
}
