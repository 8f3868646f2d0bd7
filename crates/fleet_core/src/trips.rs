use std::path::Path;

use fxhash::FxHashSet;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::{
    config::fleet_config::FleetConfig,
    error::FleetError,
    lifecycle::vehicle_daemon::VehicleSpec,
    vehicle::{Color, LocationId, VehicleClass, VehicleId},
};

/// One vehicle's trip: origin, destination and the intermediate waypoints.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Trip {
    pub id: VehicleId,
    pub from: LocationId,
    pub to: LocationId,

    /// Either a list or a single space-separated string.
    #[serde(default, deserialize_with = "deserialize_via")]
    pub via: Vec<LocationId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_class: Option<VehicleClass>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Via {
    List(Vec<LocationId>),
    Joined(String),
}

fn deserialize_via<'de, D>(deserializer: D) -> Result<Vec<LocationId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Via::deserialize(deserializer)? {
        Via::List(list) => list,
        Via::Joined(joined) => joined.split_whitespace().map(LocationId::from).collect(),
    })
}

impl Trip {
    /// `[from, via.., to]`
    pub fn waypoints(&self) -> Vec<LocationId> {
        let mut waypoints = Vec::with_capacity(self.via.len() + 2);
        waypoints.push(self.from.clone());
        waypoints.extend(self.via.iter().cloned());
        waypoints.push(self.to.clone());
        waypoints
    }

    pub fn to_vehicle_spec(&self, config: &FleetConfig) -> VehicleSpec {
        VehicleSpec {
            id: self.id.clone(),
            waypoints: self.waypoints(),
            vehicle_class: self
                .vehicle_class
                .clone()
                .unwrap_or_else(|| config.vehicle_class.clone()),
            color: self.color.unwrap_or(config.color),
        }
    }
}

pub fn read_trips<P: AsRef<Path>>(path: P) -> Result<Vec<Trip>, FleetError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|err| FleetError::io(path, err))?;

    let trips = parse_trips(&content)?;
    info!("Read {} trips from {}", trips.len(), path.display());

    Ok(trips)
}

pub fn parse_trips(content: &str) -> Result<Vec<Trip>, FleetError> {
    let trips: Vec<Trip> = serde_json::from_str(content)?;

    let mut seen = FxHashSet::default();
    for trip in &trips {
        if trip.id.as_str().is_empty() {
            return Err(FleetError::InvalidTrip {
                id: String::new(),
                reason: String::from("empty id"),
            });
        }

        if !seen.insert(&trip.id) {
            return Err(FleetError::DuplicateVehicle(trip.id.clone()));
        }
    }

    Ok(trips)
}

/// Takes the first `config.fleet_size` trips in file order (all of them when
/// no size is configured) and turns them into vehicle specs.
pub fn select_fleet(trips: &[Trip], config: &FleetConfig) -> Result<Vec<VehicleSpec>, FleetError> {
    let requested = config.fleet_size.unwrap_or(trips.len());

    if requested > trips.len() {
        return Err(FleetError::NotEnoughTrips {
            available: trips.len(),
            requested,
        });
    }

    Ok(trips[..requested]
        .iter()
        .map(|trip| trip.to_vehicle_spec(config))
        .collect())
}
