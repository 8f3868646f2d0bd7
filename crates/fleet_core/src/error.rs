use thiserror::Error;

use crate::{engine::EngineError, vehicle::VehicleId};

/// A numeric parameter outside of its allowed range.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("{section}.{name} must be finite, got {value}")]
    NotFinite {
        section: &'static str,
        name: &'static str,
        value: f64,
    },

    #[error("{section}.{name} must be >= 0, got {value}")]
    Negative {
        section: &'static str,
        name: &'static str,
        value: f64,
    },
}

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Engine failure: {0}")]
    Engine(#[from] EngineError),

    #[error("Engine failed {failures} steps in a row: {source}")]
    EngineStalled {
        failures: usize,
        #[source]
        source: EngineError,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    InvalidParam(#[from] ParamError),

    #[error("Vehicle {0} is defined twice")]
    DuplicateVehicle(VehicleId),

    #[error("Failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON")]
    Json(#[from] serde_json::Error),

    #[error("Fleet size {requested} requested but only {available} trips are defined")]
    NotEnoughTrips { available: usize, requested: usize },

    #[error("Invalid trip {id}: {reason}")]
    InvalidTrip { id: String, reason: String },
}

impl FleetError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        FleetError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
