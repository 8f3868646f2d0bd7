use rand::rngs::SmallRng;
use rand_distr::{Distribution, Normal, NormalError};
use serde::Serialize;

use super::wear_params::{WearParams, WearVector};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WearPhase {
    Ramp,
    Steady,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct WearState {
    degradation: WearVector,
    elapsed_ticks: u32,
    phase: WearPhase,
}

impl WearState {
    /// Fresh state. A zero ramp duration means the vehicle starts fully worn.
    pub fn new(params: &WearParams) -> Self {
        if params.ramp_duration == 0 {
            WearState {
                degradation: params.max,
                elapsed_ticks: 0,
                phase: WearPhase::Steady,
            }
        } else {
            WearState {
                degradation: WearVector::ZERO,
                elapsed_ticks: 0,
                phase: WearPhase::Ramp,
            }
        }
    }

    pub fn degradation(&self) -> &WearVector {
        &self.degradation
    }

    pub fn speed_loss(&self) -> f64 {
        self.degradation.speed
    }

    pub fn extra_fuel(&self) -> f64 {
        self.degradation.fuel
    }

    pub fn extra_temperature(&self) -> f64 {
        self.degradation.temperature
    }

    pub fn elapsed_ticks(&self) -> u32 {
        self.elapsed_ticks
    }

    pub fn phase(&self) -> WearPhase {
        self.phase
    }

    /// Zero degradation, used by tests and callers that want an unworn vehicle.
    pub fn pristine() -> Self {
        WearState {
            degradation: WearVector::ZERO,
            elapsed_ticks: 0,
            phase: WearPhase::Ramp,
        }
    }
}

struct WearNoise {
    speed: Normal<f64>,
    fuel: Normal<f64>,
    temperature: Normal<f64>,
}

impl WearNoise {
    fn new(std: &WearVector) -> Result<Self, NormalError> {
        Ok(WearNoise {
            speed: Normal::new(0.0, std.speed)?,
            fuel: Normal::new(0.0, std.fuel)?,
            temperature: Normal::new(0.0, std.temperature)?,
        })
    }

    fn sample(&self, rng: &mut SmallRng) -> [f64; 3] {
        [
            self.speed.sample(rng),
            self.fuel.sample(rng),
            self.temperature.sample(rng),
        ]
    }
}

/// Per-vehicle degradation: linear ramp up to the maximum, then bounded
/// Gaussian jitter around the current value.
pub struct WearModel {
    params: WearParams,
    state: WearState,
    noise: WearNoise,
    rng: SmallRng,
}

impl WearModel {
    pub fn new(params: WearParams, rng: SmallRng) -> Result<Self, NormalError> {
        Ok(WearModel {
            noise: WearNoise::new(&params.noise_std)?,
            state: WearState::new(&params),
            params,
            rng,
        })
    }

    pub fn state(&self) -> &WearState {
        &self.state
    }

    pub fn params(&self) -> &WearParams {
        &self.params
    }

    /// Moves the model forward by one sampling tick.
    pub fn advance(&mut self) -> &WearState {
        let max = self.params.max.components();

        match self.state.phase {
            WearPhase::Ramp => {
                let ramp = self.params.ramp_duration as f64;
                let mut current = self.state.degradation.components();

                for (value, max) in current.iter_mut().zip(max) {
                    *value = (*value + max / ramp).min(max);
                }

                self.state.elapsed_ticks += 1;

                if self.state.elapsed_ticks >= self.params.ramp_duration {
                    self.state.phase = WearPhase::Steady;
                    current = max;
                }

                self.state.degradation = WearVector::from_components(current);
            }
            WearPhase::Steady => {
                let noise = self.noise.sample(&mut self.rng);
                let mut current = self.state.degradation.components();

                for ((value, max), noise) in current.iter_mut().zip(max).zip(noise) {
                    *value = (*value + noise).clamp(0.0, max);
                }

                self.state.elapsed_ticks = self.state.elapsed_ticks.saturating_add(1);
                self.state.degradation = WearVector::from_components(current);
            }
        }

        &self.state
    }

    pub fn reset(&mut self) {
        self.state = WearState::new(&self.params);
    }
}
