use serde::{Deserialize, Serialize};

use crate::error::ParamError;

/// One value per degraded quantity. Units: km/h for speed, L/h for fuel and
/// degrees Celsius for temperature.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct WearVector {
    pub speed: f64,
    pub fuel: f64,
    pub temperature: f64,
}

impl WearVector {
    pub const ZERO: WearVector = WearVector {
        speed: 0.0,
        fuel: 0.0,
        temperature: 0.0,
    };

    pub fn new(speed: f64, fuel: f64, temperature: f64) -> Self {
        WearVector {
            speed,
            fuel,
            temperature,
        }
    }

    pub(crate) fn components(&self) -> [f64; 3] {
        [self.speed, self.fuel, self.temperature]
    }

    pub(crate) fn from_components([speed, fuel, temperature]: [f64; 3]) -> Self {
        WearVector {
            speed,
            fuel,
            temperature,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WearParams {
    /// Number of sampling ticks until the degradation reaches its maximum.
    pub ramp_duration: u32,
    pub max: WearVector,
    /// Standard deviation of the steady-state jitter of each component.
    pub noise_std: WearVector,
}

impl Default for WearParams {
    fn default() -> Self {
        Self {
            // one hour of driving at the default 10s publish interval
            ramp_duration: 360,
            max: WearVector::new(8.0, 1.5, 12.0),
            noise_std: WearVector::new(0.5, 0.1, 0.8),
        }
    }
}

impl WearParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        for (name, value) in [
            ("max.speed", self.max.speed),
            ("max.fuel", self.max.fuel),
            ("max.temperature", self.max.temperature),
            ("noise_std.speed", self.noise_std.speed),
            ("noise_std.fuel", self.noise_std.fuel),
            ("noise_std.temperature", self.noise_std.temperature),
        ] {
            if !value.is_finite() {
                return Err(ParamError::NotFinite {
                    section: "wear",
                    name,
                    value,
                });
            }
            if value < 0.0 {
                return Err(ParamError::Negative {
                    section: "wear",
                    name,
                    value,
                });
            }
        }

        Ok(())
    }
}
