use fleet_core::{
    engine::{EngineError, SimulationEngine},
    vehicle::{Color, EdgeId, LocationId, RouteId, VehicleClass, VehicleId},
};
use fxhash::FxHashMap;
use jiff::SignedDuration;
use tracing::{debug, info};

use crate::{
    network::{EdgeIdx, Network, VehicleClassDefinition},
    projection,
};

struct MovingVehicle {
    id: VehicleId,
    route: Vec<EdgeIdx>,
    /// Position in `route` of the edge the vehicle is on.
    route_position: usize,
    /// Metres driven on the current edge.
    offset: f64,
    /// m/s
    speed: f64,
    /// Metres driven since departure.
    odometer: f64,
    class: VehicleClassDefinition,
    color: Color,
}

impl MovingVehicle {
    fn current_edge(&self) -> EdgeIdx {
        self.route[self.route_position]
    }
}

/// Deterministic microsimulation over a [`Network`]. Every step moves each
/// vehicle along its route with a fixed time increment.
pub struct NetworkEngine {
    network: Network,
    step_length: SignedDuration,
    time: SignedDuration,
    routes: FxHashMap<RouteId, Vec<EdgeIdx>>,
    vehicles: Vec<MovingVehicle>,
    just_arrived: Vec<VehicleId>,
    closed: bool,
}

impl NetworkEngine {
    pub fn new(network: Network, step_length: SignedDuration) -> Self {
        NetworkEngine {
            network,
            step_length,
            time: SignedDuration::ZERO,
            routes: FxHashMap::default(),
            vehicles: Vec::new(),
            just_arrived: Vec::new(),
            closed: false,
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn step_length(&self) -> SignedDuration {
        self.step_length
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Display color the vehicle was dispatched with.
    pub fn color(&self, vehicle_id: &VehicleId) -> Result<Color, EngineError> {
        self.vehicle(vehicle_id).map(|vehicle| vehicle.color)
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.closed {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    fn vehicle(&self, vehicle_id: &VehicleId) -> Result<&MovingVehicle, EngineError> {
        self.vehicles
            .iter()
            .find(|vehicle| &vehicle.id == vehicle_id)
            .ok_or_else(|| EngineError::UnknownVehicle(vehicle_id.clone()))
    }

    /// Moves one vehicle by `dt` seconds. Returns true once it passed the end
    /// of its last edge.
    fn advance(network: &Network, vehicle: &mut MovingVehicle, dt: f64) -> bool {
        let target = network.target_speed(vehicle.current_edge(), &vehicle.class);
        let delta = vehicle.class.accel * dt;

        vehicle.speed = if vehicle.speed < target {
            (vehicle.speed + delta).min(target)
        } else {
            (vehicle.speed - delta).max(target)
        };

        let mut remaining = vehicle.speed * dt;
        vehicle.odometer += remaining;

        loop {
            let length = network.edge(vehicle.current_edge()).length.value();

            if vehicle.offset + remaining < length {
                vehicle.offset += remaining;
                return false;
            }

            remaining -= length - vehicle.offset;
            vehicle.offset = 0.0;

            if vehicle.route_position + 1 == vehicle.route.len() {
                return true;
            }

            vehicle.route_position += 1;
        }
    }
}

impl SimulationEngine for NetworkEngine {
    fn find_path(
        &mut self,
        from: &LocationId,
        to: &LocationId,
        vehicle_class: &VehicleClass,
    ) -> Result<Vec<EdgeId>, EngineError> {
        self.ensure_open()?;
        self.network.find_path(from, to, vehicle_class)
    }

    fn register_route(&mut self, route_id: &RouteId, edges: &[EdgeId]) -> Result<(), EngineError> {
        self.ensure_open()?;

        if edges.is_empty() {
            return Err(EngineError::Rejected(format!("route {route_id} has no edges")));
        }

        let route = edges
            .iter()
            .map(|edge_id| {
                self.network
                    .edge_idx(edge_id)
                    .ok_or_else(|| EngineError::Rejected(format!("unknown edge {edge_id} in route {route_id}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for pair in route.windows(2) {
            let (current, next) = (self.network.edge(pair[0]), self.network.edge(pair[1]));
            if current.to != next.from {
                return Err(EngineError::Rejected(format!(
                    "edges {} and {} of route {} are not connected",
                    current.id, next.id, route_id
                )));
            }
        }

        self.routes.insert(route_id.clone(), route);
        Ok(())
    }

    fn step(&mut self) -> Result<(), EngineError> {
        self.ensure_open()?;

        self.time += self.step_length;
        self.just_arrived.clear();

        let dt = self.step_length.as_secs_f64();
        let network = &self.network;
        let just_arrived = &mut self.just_arrived;

        self.vehicles.retain_mut(|vehicle| {
            if Self::advance(network, vehicle, dt) {
                debug!(
                    "Vehicle {} arrived after {:.0}m",
                    vehicle.id, vehicle.odometer
                );
                just_arrived.push(vehicle.id.clone());
                false
            } else {
                true
            }
        });

        Ok(())
    }

    fn current_time(&self) -> SignedDuration {
        self.time
    }

    fn just_arrived_ids(&self) -> &[VehicleId] {
        &self.just_arrived
    }

    fn dispatch(
        &mut self,
        vehicle_id: &VehicleId,
        route_id: &RouteId,
        vehicle_class: &VehicleClass,
        color: Color,
    ) -> Result<(), EngineError> {
        self.ensure_open()?;

        let route = self
            .routes
            .get(route_id)
            .ok_or_else(|| EngineError::UnknownRoute(route_id.clone()))?;

        let class = self
            .network
            .vehicle_class(vehicle_class)
            .ok_or_else(|| EngineError::UnknownVehicleClass(vehicle_class.clone()))?;

        if self.vehicles.iter().any(|vehicle| &vehicle.id == vehicle_id) {
            return Err(EngineError::Rejected(format!("{vehicle_id} is already running")));
        }

        if let Some(closed_edge) = route
            .iter()
            .map(|edge_idx| self.network.edge(*edge_idx))
            .find(|edge| !edge.allows(vehicle_class))
        {
            return Err(EngineError::Rejected(format!(
                "edge {} is closed to {}",
                closed_edge.id, vehicle_class
            )));
        }

        let speed = self.network.target_speed(route[0], class);

        self.vehicles.push(MovingVehicle {
            id: vehicle_id.clone(),
            route: route.clone(),
            route_position: 0,
            offset: 0.0,
            speed,
            odometer: 0.0,
            class: class.clone(),
            color,
        });

        Ok(())
    }

    fn position(&self, vehicle_id: &VehicleId) -> Result<(f64, f64), EngineError> {
        let vehicle = self.vehicle(vehicle_id)?;
        let edge = self.network.edge(vehicle.current_edge());
        let from = self.network.junction(edge.from).point;
        let to = self.network.junction(edge.to).point;
        let ratio = vehicle.offset / edge.length.value();

        Ok((
            from.x() + (to.x() - from.x()) * ratio,
            from.y() + (to.y() - from.y()) * ratio,
        ))
    }

    fn speed(&self, vehicle_id: &VehicleId) -> Result<f64, EngineError> {
        self.vehicle(vehicle_id).map(|vehicle| vehicle.speed)
    }

    fn heading(&self, vehicle_id: &VehicleId) -> Result<f64, EngineError> {
        let vehicle = self.vehicle(vehicle_id)?;
        let edge = self.network.edge(vehicle.current_edge());
        let from = self.network.junction(edge.from).point;
        let to = self.network.junction(edge.to).point;

        Ok(projection::heading(to.x() - from.x(), to.y() - from.y()))
    }

    fn distance(&self, vehicle_id: &VehicleId) -> Result<f64, EngineError> {
        self.vehicle(vehicle_id).map(|vehicle| vehicle.odometer)
    }

    fn to_geo(&self, x: f64, y: f64) -> Result<geo::Point, EngineError> {
        Ok(self.network.origin().to_geo(x, y))
    }

    fn active_vehicle_ids(&self) -> Vec<VehicleId> {
        self.vehicles.iter().map(|vehicle| vehicle.id.clone()).collect()
    }

    fn min_expected_vehicles(&self) -> usize {
        // departures are immediate, nothing is ever pending
        self.vehicles.len()
    }

    fn close(&mut self) {
        if !self.closed {
            info!(
                "Network engine closed at {} with {} vehicles",
                self.time,
                self.vehicles.len()
            );
            self.closed = true;
            self.vehicles.clear();
        }
    }
}
