#[allow(clippy::module_inception)]
pub mod simulation;
pub mod simulation_params;
