use serde::{Deserialize, Serialize};

use crate::error::ParamError;

/// Fuel consumption strategy, in litres per hour.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum FuelModel {
    /// Quadratic speed curve plus a penalty on positive acceleration.
    Physical {
        idle_rate: f64,
        linear_coeff: f64,
        quadratic_coeff: f64,
        /// Litres per hour per (km/h per second) of positive acceleration.
        accel_penalty: f64,
    },
    /// Flat placeholder: idle rate plus a constant per km/h.
    Linear { idle_rate: f64, per_kmh: f64 },
}

impl Default for FuelModel {
    fn default() -> Self {
        FuelModel::Physical {
            idle_rate: 0.8,
            linear_coeff: 0.03,
            quadratic_coeff: 0.0004,
            accel_penalty: 0.6,
        }
    }
}

impl FuelModel {
    /// `speed` in km/h, `acceleration` in km/h per second, `extra_fuel` is the
    /// wear offset and `fuel_factor` the wear multiplier of the acceleration
    /// penalty.
    pub fn rate(&self, speed: f64, acceleration: f64, extra_fuel: f64, fuel_factor: f64) -> f64 {
        match *self {
            FuelModel::Physical {
                idle_rate,
                linear_coeff,
                quadratic_coeff,
                accel_penalty,
            } => {
                idle_rate
                    + linear_coeff * speed
                    + quadratic_coeff * speed.powi(2)
                    + accel_penalty * acceleration.max(0.0) * fuel_factor
                    + extra_fuel
            }
            FuelModel::Linear { idle_rate, per_kmh } => idle_rate + per_kmh * speed + extra_fuel,
        }
    }

    fn constants(&self) -> Vec<(&'static str, f64)> {
        match *self {
            FuelModel::Physical {
                idle_rate,
                linear_coeff,
                quadratic_coeff,
                accel_penalty,
            } => vec![
                ("idle_rate", idle_rate),
                ("linear_coeff", linear_coeff),
                ("quadratic_coeff", quadratic_coeff),
                ("accel_penalty", accel_penalty),
            ],
            FuelModel::Linear { idle_rate, per_kmh } => {
                vec![("idle_rate", idle_rate), ("per_kmh", per_kmh)]
            }
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryParams {
    pub fuel_model: FuelModel,
    pub rpm_per_kmh: f64,
    /// Engine temperature at standstill, in degrees Celsius.
    pub base_temperature: f64,
    pub temperature_speed_coeff: f64,
    /// Acceleration (km/h per second) from which a harsh acceleration is flagged.
    pub harsh_accel_threshold: f64,
    /// Deceleration (km/h per second) from which a harsh brake is flagged.
    pub harsh_brake_threshold: f64,
}

impl Default for TelemetryParams {
    fn default() -> Self {
        Self {
            fuel_model: FuelModel::default(),
            rpm_per_kmh: 40.0,
            base_temperature: 85.0,
            temperature_speed_coeff: 0.05,
            harsh_accel_threshold: 8.0,
            harsh_brake_threshold: 10.0,
        }
    }
}

impl TelemetryParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        let mut constants = self.fuel_model.constants();
        constants.extend([
            ("rpm_per_kmh", self.rpm_per_kmh),
            ("base_temperature", self.base_temperature),
            ("temperature_speed_coeff", self.temperature_speed_coeff),
            ("harsh_accel_threshold", self.harsh_accel_threshold),
            ("harsh_brake_threshold", self.harsh_brake_threshold),
        ]);

        match constants.into_iter().find(|(_, value)| !value.is_finite()) {
            Some((name, value)) => Err(ParamError::NotFinite {
                section: "telemetry",
                name,
                value,
            }),
            None => Ok(()),
        }
    }
}
