use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use fxhash::{FxHashMap, FxHashSet};
use jiff::SignedDuration;

use crate::{
    engine::{EngineError, SimulationEngine},
    vehicle::{Color, EdgeId, LocationId, RouteId, VehicleClass, VehicleId},
};

pub fn locations(ids: &[&str]) -> Vec<LocationId> {
    ids.iter().map(|id| LocationId::new(*id)).collect()
}

pub fn edges(ids: &[&str]) -> Vec<EdgeId> {
    ids.iter().map(|id| EdgeId::new(*id)).collect()
}

/// Metres covered per edge, one edge per step.
pub const EDGE_LENGTH: f64 = 100.0;

struct ScriptedVehicle {
    id: VehicleId,
    route_len: usize,
    progress: usize,
}

/// Deterministic engine for unit tests. Paths are scripted with `add_path`,
/// every active vehicle covers exactly one edge per step at 10 m/s.
#[derive(Default)]
pub struct ScriptedEngine {
    time: SignedDuration,
    paths: FxHashMap<(LocationId, LocationId), Vec<EdgeId>>,
    routes: FxHashMap<RouteId, Vec<EdgeId>>,
    vehicles: Vec<ScriptedVehicle>,
    just_arrived: Vec<VehicleId>,
    dispatches: FxHashMap<VehicleId, usize>,
    colors: FxHashMap<VehicleId, Color>,
    rejections: FxHashMap<VehicleId, usize>,
    no_kinematics: FxHashSet<VehicleId>,
    failing_path_queries: bool,
    failing_steps: usize,
    disconnected: bool,
    closed: Arc<AtomicBool>,
}

impl ScriptedEngine {
    /// Adds or replaces the path returned for `from -> to`.
    pub fn add_path(&mut self, from: &str, to: &str, path: &[&str]) {
        self.paths
            .insert((LocationId::new(from), LocationId::new(to)), edges(path));
    }

    pub fn remove_path(&mut self, from: &str, to: &str) {
        self.paths.remove(&(LocationId::new(from), LocationId::new(to)));
    }

    pub fn fail_path_queries(&mut self) {
        self.failing_path_queries = true;
    }

    /// Rejects the next `count` dispatches of `vehicle_id`. `usize::MAX`
    /// rejects forever.
    pub fn reject_dispatches(&mut self, vehicle_id: &VehicleId, count: usize) {
        self.rejections.insert(vehicle_id.clone(), count);
    }

    pub fn fail_kinematics(&mut self, vehicle_id: &VehicleId) {
        self.no_kinematics.insert(vehicle_id.clone());
    }

    /// The next `count` steps fail without advancing time. `usize::MAX` fails
    /// forever. The failures are not fatal.
    pub fn fail_steps(&mut self, count: usize) {
        self.failing_steps = count;
    }

    /// Every following step fails with a lost connection.
    pub fn disconnect(&mut self) {
        self.disconnected = true;
    }

    /// A vehicle that is not part of any fleet and never arrives.
    pub fn add_background_vehicle(&mut self, vehicle_id: &VehicleId) {
        self.vehicles.push(ScriptedVehicle {
            id: vehicle_id.clone(),
            route_len: usize::MAX,
            progress: 0,
        });
    }

    pub fn registered_routes(&self) -> &FxHashMap<RouteId, Vec<EdgeId>> {
        &self.routes
    }

    /// Dispatch attempts, rejected ones included.
    pub fn dispatch_count(&self, vehicle_id: &VehicleId) -> usize {
        self.dispatches.get(vehicle_id).copied().unwrap_or(0)
    }

    pub fn last_color(&self, vehicle_id: &VehicleId) -> Option<Color> {
        self.colors.get(vehicle_id).copied()
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    pub fn step_once(&mut self) {
        self.step().unwrap();
    }

    fn vehicle(&self, vehicle_id: &VehicleId) -> Result<&ScriptedVehicle, EngineError> {
        if self.no_kinematics.contains(vehicle_id) {
            return Err(EngineError::Rejected(format!("no kinematics for {vehicle_id}")));
        }

        self.vehicles
            .iter()
            .find(|vehicle| &vehicle.id == vehicle_id)
            .ok_or_else(|| EngineError::UnknownVehicle(vehicle_id.clone()))
    }
}

impl SimulationEngine for ScriptedEngine {
    fn find_path(
        &mut self,
        from: &LocationId,
        to: &LocationId,
        _vehicle_class: &VehicleClass,
    ) -> Result<Vec<EdgeId>, EngineError> {
        if self.failing_path_queries {
            return Err(EngineError::Connection(String::from("scripted failure")));
        }

        Ok(self
            .paths
            .get(&(from.clone(), to.clone()))
            .cloned()
            .unwrap_or_default())
    }

    fn register_route(&mut self, route_id: &RouteId, edges: &[EdgeId]) -> Result<(), EngineError> {
        self.routes.insert(route_id.clone(), edges.to_vec());
        Ok(())
    }

    fn step(&mut self) -> Result<(), EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        if self.disconnected {
            return Err(EngineError::Connection(String::from("scripted disconnect")));
        }
        if self.failing_steps > 0 {
            if self.failing_steps != usize::MAX {
                self.failing_steps -= 1;
            }
            return Err(EngineError::Rejected(String::from("scripted step failure")));
        }

        self.time += SignedDuration::from_secs(1);
        self.just_arrived.clear();

        for vehicle in self.vehicles.iter_mut() {
            vehicle.progress = vehicle.progress.saturating_add(1);
        }

        let just_arrived = &mut self.just_arrived;
        self.vehicles.retain(|vehicle| {
            if vehicle.progress >= vehicle.route_len {
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
        _vehicle_class: &VehicleClass,
        color: Color,
    ) -> Result<(), EngineError> {
        *self.dispatches.entry(vehicle_id.clone()).or_default() += 1;

        if let Some(remaining) = self.rejections.get_mut(vehicle_id)
            && *remaining > 0
        {
            if *remaining != usize::MAX {
                *remaining -= 1;
            }
            return Err(EngineError::Rejected(format!("scripted rejection of {vehicle_id}")));
        }

        let route_len = self
            .routes
            .get(route_id)
            .map(|edges| edges.len())
            .ok_or_else(|| EngineError::UnknownRoute(route_id.clone()))?;

        if self.is_active(vehicle_id) {
            return Err(EngineError::Rejected(format!("{vehicle_id} is already running")));
        }

        self.colors.insert(vehicle_id.clone(), color);
        self.vehicles.push(ScriptedVehicle {
            id: vehicle_id.clone(),
            route_len,
            progress: 0,
        });

        Ok(())
    }

    fn position(&self, vehicle_id: &VehicleId) -> Result<(f64, f64), EngineError> {
        let vehicle = self.vehicle(vehicle_id)?;
        Ok((vehicle.progress as f64 * EDGE_LENGTH, 0.0))
    }

    fn speed(&self, vehicle_id: &VehicleId) -> Result<f64, EngineError> {
        self.vehicle(vehicle_id).map(|_| 10.0)
    }

    fn heading(&self, vehicle_id: &VehicleId) -> Result<f64, EngineError> {
        self.vehicle(vehicle_id).map(|_| 90.0)
    }

    fn distance(&self, vehicle_id: &VehicleId) -> Result<f64, EngineError> {
        let vehicle = self.vehicle(vehicle_id)?;
        Ok(vehicle.progress as f64 * EDGE_LENGTH)
    }

    fn to_geo(&self, x: f64, y: f64) -> Result<geo_types::Point, EngineError> {
        Ok(geo_types::Point::new(-75.5 + x * 1e-5, 6.2 + y * 1e-5))
    }

    fn active_vehicle_ids(&self) -> Vec<VehicleId> {
        self.vehicles.iter().map(|vehicle| vehicle.id.clone()).collect()
    }

    fn min_expected_vehicles(&self) -> usize {
        self.vehicles.len()
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
