use clap::Args;
use comfy_table::Table;
use fleet_core::route::route_stitcher::stitch;

use crate::inputs::InputArgs;

#[derive(Args)]
pub struct RoutesArgs {
    #[command(flatten)]
    inputs: InputArgs,
}

/// Stitches the route of every fleet vehicle without running the simulation.
pub fn run(args: RoutesArgs) -> Result<(), anyhow::Error> {
    let config = args.inputs.load_config()?;
    config.validate()?;

    let mut engine = args.inputs.load_engine()?;
    let specs = args.inputs.load_fleet(&config)?;

    let mut table = Table::new();
    table.set_header(vec!["Vehicle", "Class", "Waypoints", "Edges"]);

    let mut failed = 0;
    for spec in &specs {
        let waypoints = spec
            .waypoints
            .iter()
            .map(|waypoint| waypoint.to_string())
            .collect::<Vec<_>>()
            .join(" > ");

        let edges = match stitch(&mut engine, &spec.waypoints, &spec.vehicle_class) {
            Ok(route) => route.len().to_string(),
            Err(err) => {
                failed += 1;
                err.to_string()
            }
        };

        table.add_row(vec![
            spec.id.to_string(),
            spec.vehicle_class.to_string(),
            waypoints,
            edges,
        ]);
    }

    println!("{table}");

    if failed > 0 {
        anyhow::bail!("{} of {} routes could not be stitched", failed, specs.len());
    }

    Ok(())
}
