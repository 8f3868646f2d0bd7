use jiff::{SignedDuration, Timestamp};

use crate::{
    engine::RawKinematics,
    telemetry::{telemetry_params::TelemetryParams, telemetry_record::TelemetryRecord},
    units::Kmh,
    utils::round2,
    vehicle::VehicleId,
    wear::{wear_model::WearState, wear_params::WearVector},
};

/// Combines engine kinematics with the wear state into telemetry records.
/// Holds only constants; the per-vehicle speed history lives with the vehicle.
#[derive(Debug, Clone)]
pub struct TelemetrySynthesizer {
    params: TelemetryParams,
    /// Divisor of the acceleration estimate, never below one second.
    interval_secs: f64,
    wear_max: WearVector,
}

impl TelemetrySynthesizer {
    pub fn new(params: TelemetryParams, sampling_interval: SignedDuration, wear_max: WearVector) -> Self {
        TelemetrySynthesizer {
            params,
            interval_secs: sampling_interval.as_secs_f64().max(1.0),
            wear_max,
        }
    }

    pub fn params(&self) -> &TelemetryParams {
        &self.params
    }

    fn fuel_factor(&self, wear: &WearState) -> f64 {
        if self.wear_max.fuel > 0.0 {
            1.0 + wear.extra_fuel() / self.wear_max.fuel
        } else {
            1.0
        }
    }

    /// Builds the record of one vehicle and updates its previous effective
    /// speed. Without a previous speed the acceleration is taken as zero.
    pub fn sample(
        &self,
        vehicle_id: &VehicleId,
        kinematics: &RawKinematics,
        wear: &WearState,
        previous_speed: &mut Option<Kmh>,
        timestamp: Timestamp,
    ) -> TelemetryRecord {
        let speed = kinematics.speed.saturating_sub(Kmh::new(wear.speed_loss()));

        let acceleration = match previous_speed.replace(speed) {
            Some(previous) => (speed - previous).value() / self.interval_secs,
            None => 0.0,
        };

        let speed = speed.value();
        let fuel = self.params.fuel_model.rate(
            speed,
            acceleration,
            wear.extra_fuel(),
            self.fuel_factor(wear),
        );
        let temperature = self.params.base_temperature
            + self.params.temperature_speed_coeff * speed
            + wear.extra_temperature();
        let rpm = (self.params.rpm_per_kmh * speed).round().max(0.0) as u32;

        TelemetryRecord {
            device_id: vehicle_id.clone(),
            timestamp,
            lat: kinematics.position.y(),
            lon: kinematics.position.x(),
            heading: round2(kinematics.heading),
            distance_m: round2(kinematics.distance.value()),
            speed: round2(speed),
            rpm,
            fuel_consumption: round2(fuel),
            engine_temperature: round2(temperature),
            accel_event: acceleration >= self.params.harsh_accel_threshold,
            brake_event: -acceleration >= self.params.harsh_brake_threshold,
        }
    }
}
