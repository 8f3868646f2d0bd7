use std::path::Path;

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

use crate::{
    error::FleetError,
    lifecycle::lifecycle_policy::LifecyclePolicy,
    telemetry::telemetry_params::TelemetryParams,
    vehicle::{Color, VehicleClass},
    wear::wear_params::WearParams,
};

/// Everything that is fixed at startup. Every field has a default so a config
/// file only needs the values it overrides.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FleetConfig {
    /// Simulation time between two publish ticks.
    pub publish_interval: SignedDuration,

    /// Number of trips turned into vehicles. All trips when absent.
    pub fleet_size: Option<usize>,

    /// Class used by trips that do not name one.
    pub vehicle_class: VehicleClass,

    /// Display color used by trips that do not name one.
    pub color: Color,

    pub topic_prefix: String,

    /// Master seed for the wear noise. Seeded from the OS when absent.
    pub seed: Option<u64>,

    /// Wall-clock instant of simulation time zero. Startup time when absent.
    pub anchor: Option<Timestamp>,

    pub wear: WearParams,
    pub telemetry: TelemetryParams,
    pub lifecycle: LifecyclePolicy,
}

impl Default for FleetConfig {
    fn default() -> Self {
        FleetConfig {
            publish_interval: SignedDuration::from_secs(10),
            fleet_size: None,
            vehicle_class: VehicleClass::new("pt_bus"),
            color: Color::BLUE,
            topic_prefix: String::from("fleet"),
            seed: None,
            anchor: None,
            wear: WearParams::default(),
            telemetry: TelemetryParams::default(),
            lifecycle: LifecyclePolicy::default(),
        }
    }
}

impl FleetConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FleetError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| FleetError::io(path, err))?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, FleetError> {
        let config: FleetConfig = serde_json::from_str(content)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FleetError> {
        if self.publish_interval <= SignedDuration::ZERO {
            return Err(FleetError::Config(format!(
                "publish_interval must be positive, got {}",
                self.publish_interval
            )));
        }

        if self.fleet_size == Some(0) {
            return Err(FleetError::Config(String::from(
                "fleet_size must be at least 1",
            )));
        }

        if self.topic_prefix.is_empty() {
            return Err(FleetError::Config(String::from(
                "topic_prefix must not be empty",
            )));
        }

        self.wear.validate()?;
        self.telemetry.validate()?;

        Ok(())
    }

    /// Anchor of the telemetry timestamps.
    pub fn resolve_anchor(&self) -> Timestamp {
        self.anchor.unwrap_or_else(Timestamp::now)
    }
}
