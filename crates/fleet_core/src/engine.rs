use jiff::SignedDuration;
use thiserror::Error;

use crate::{
    units::{Kmh, Meters},
    vehicle::{Color, EdgeId, LocationId, RouteId, VehicleClass, VehicleId},
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine connection lost: {0}")]
    Connection(String),

    #[error("Engine is closed")]
    Closed,

    #[error("Unknown vehicle {0}")]
    UnknownVehicle(VehicleId),

    #[error("Unknown location {0}")]
    UnknownLocation(LocationId),

    #[error("Unknown route {0}")]
    UnknownRoute(RouteId),

    #[error("Unknown vehicle class {0}")]
    UnknownVehicleClass(VehicleClass),

    #[error("Command rejected: {0}")]
    Rejected(String),
}

impl EngineError {
    /// Errors after which the engine cannot be driven any further.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Connection(_) | EngineError::Closed)
    }
}

/// Boundary to the traffic microsimulation. All calls happen from the single
/// driving thread, so the trait takes `&mut self` for commands and does not
/// require `Sync`.
pub trait SimulationEngine {
    /// Engine-preferred path between two locations. An empty vector means the
    /// locations are not connected for this vehicle class.
    fn find_path(
        &mut self,
        from: &LocationId,
        to: &LocationId,
        vehicle_class: &VehicleClass,
    ) -> Result<Vec<EdgeId>, EngineError>;

    /// Registers (or replaces) a route under `route_id`.
    fn register_route(&mut self, route_id: &RouteId, edges: &[EdgeId]) -> Result<(), EngineError>;

    /// Advances the simulation by one step.
    fn step(&mut self) -> Result<(), EngineError>;

    /// Simulation time elapsed since the engine started.
    fn current_time(&self) -> SignedDuration;

    /// Vehicles that reached the end of their route during the last step.
    fn just_arrived_ids(&self) -> &[VehicleId];

    /// Inserts a vehicle on a registered route, departing now.
    fn dispatch(
        &mut self,
        vehicle_id: &VehicleId,
        route_id: &RouteId,
        vehicle_class: &VehicleClass,
        color: Color,
    ) -> Result<(), EngineError>;

    /// Network coordinates in metres.
    fn position(&self, vehicle_id: &VehicleId) -> Result<(f64, f64), EngineError>;

    /// Current speed in metres per second.
    fn speed(&self, vehicle_id: &VehicleId) -> Result<f64, EngineError>;

    /// Heading in degrees, clockwise from north.
    fn heading(&self, vehicle_id: &VehicleId) -> Result<f64, EngineError>;

    /// Distance driven since the vehicle was dispatched, in metres.
    fn distance(&self, vehicle_id: &VehicleId) -> Result<f64, EngineError>;

    /// Converts network coordinates into a `(lon, lat)` point.
    fn to_geo(&self, x: f64, y: f64) -> Result<geo_types::Point, EngineError>;

    fn active_vehicle_ids(&self) -> Vec<VehicleId>;

    fn is_active(&self, vehicle_id: &VehicleId) -> bool {
        self.active_vehicle_ids().contains(vehicle_id)
    }

    /// Vehicles still running or waiting to depart.
    fn min_expected_vehicles(&self) -> usize;

    fn close(&mut self);
}

/// Kinematics of one vehicle as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawKinematics {
    pub position: geo_types::Point,
    pub heading: f64,
    pub distance: Meters,
    pub speed: Kmh,
}

impl RawKinematics {
    pub fn read<E>(engine: &E, vehicle_id: &VehicleId) -> Result<Self, EngineError>
    where
        E: SimulationEngine + ?Sized,
    {
        let (x, y) = engine.position(vehicle_id)?;
        let position = engine.to_geo(x, y)?;

        Ok(RawKinematics {
            position,
            heading: engine.heading(vehicle_id)?,
            distance: Meters::new(engine.distance(vehicle_id)?),
            speed: Kmh::from_meters_per_second(engine.speed(vehicle_id)?),
        })
    }
}
