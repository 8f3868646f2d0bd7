use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::vehicle::VehicleId;

/// One sample of one vehicle. Never mutated once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub device_id: VehicleId,
    pub timestamp: Timestamp,
    pub lat: f64,
    pub lon: f64,
    pub heading: f64,
    /// Distance driven in the current trip, in metres.
    pub distance_m: f64,
    /// Effective speed in km/h.
    pub speed: f64,
    pub rpm: u32,
    /// Litres per hour.
    pub fuel_consumption: f64,
    /// Degrees Celsius.
    pub engine_temperature: f64,
    pub accel_event: bool,
    pub brake_event: bool,
}

impl TelemetryRecord {
    pub fn gps_message(&self) -> GpsMessage {
        GpsMessage {
            device_id: self.device_id.clone(),
            timestamp: self.timestamp,
            lat: self.lat,
            lon: self.lon,
            heading: self.heading,
        }
    }

    pub fn telemetry_message(&self) -> TelemetryMessage {
        TelemetryMessage {
            device_id: self.device_id.clone(),
            timestamp: self.timestamp,
            speed: self.speed,
            distance_m: self.distance_m,
            rpm: self.rpm,
            fuel_consumption: self.fuel_consumption,
            engine_temperature: self.engine_temperature,
            accel_event: self.accel_event,
            brake_event: self.brake_event,
        }
    }
}

/// Payload published on `{prefix}/{device_id}/gps`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GpsMessage {
    pub device_id: VehicleId,
    pub timestamp: Timestamp,
    pub lat: f64,
    pub lon: f64,
    pub heading: f64,
}

/// Payload published on `{prefix}/{device_id}/telemetry`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TelemetryMessage {
    pub device_id: VehicleId,
    pub timestamp: Timestamp,
    pub speed: f64,
    pub distance_m: f64,
    pub rpm: u32,
    pub fuel_consumption: f64,
    pub engine_temperature: f64,
    #[serde(default)]
    pub accel_event: bool,
    #[serde(default)]
    pub brake_event: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_record() -> TelemetryRecord {
        TelemetryRecord {
            device_id: VehicleId::new("veh_1"),
            timestamp: "2025-11-30T08:00:10Z".parse().unwrap(),
            lat: 6.251_839_442,
            lon: -75.563_591_234,
            heading: 87.25,
            distance_m: 1_234.56,
            speed: 47.33,
            rpm: 1_893,
            fuel_consumption: 3.17,
            engine_temperature: 89.12,
            accel_event: false,
            brake_event: true,
        }
    }

    #[test]
    fn test_telemetry_message_round_trip() {
        let record = create_record();

        let json = serde_json::to_string(&record.telemetry_message()).unwrap();
        let parsed: TelemetryMessage = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.device_id, record.device_id);
        assert_eq!(parsed.timestamp, record.timestamp);
        assert_eq!(parsed.speed, record.speed);
        assert_eq!(parsed.distance_m, record.distance_m);
        assert_eq!(parsed.rpm, record.rpm);
        assert_eq!(parsed.fuel_consumption, record.fuel_consumption);
        assert_eq!(parsed.engine_temperature, record.engine_temperature);
        assert_eq!(parsed, record.telemetry_message());
    }

    #[test]
    fn test_gps_message_wire_shape() {
        let record = create_record();

        let value = serde_json::to_value(record.gps_message()).unwrap();

        assert_eq!(value["device_id"], "veh_1");
        assert_eq!(value["timestamp"], "2025-11-30T08:00:10Z");
        assert_eq!(value["lat"], 6.251_839_442);
        assert_eq!(value["lon"], -75.563_591_234);
        assert_eq!(value["heading"], 87.25);
        assert_eq!(value.as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_telemetry_message_wire_shape() {
        let value = serde_json::to_value(create_record().telemetry_message()).unwrap();
        let object = value.as_object().unwrap();

        for key in [
            "device_id",
            "timestamp",
            "speed",
            "distance_m",
            "rpm",
            "fuel_consumption",
            "engine_temperature",
        ] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert!(!object.contains_key("lat"));
    }
}
