pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod publish;
pub mod route;
pub mod simulation;
pub mod telemetry;
pub mod trips;
pub mod units;
pub mod utils;
pub mod vehicle;
pub mod wear;

#[cfg(test)]
pub(crate) mod test_utils;
