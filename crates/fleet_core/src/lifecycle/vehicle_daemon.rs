use jiff::{SignedDuration, Timestamp};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    engine::{EngineError, RawKinematics, SimulationEngine},
    lifecycle::{
        lifecycle_policy::{LifecyclePolicy, RouteRefresh, WearResetPolicy},
        step_listener::StepListener,
    },
    route::{route::Route, route_stitcher},
    telemetry::{telemetry_record::TelemetryRecord, telemetry_synthesizer::TelemetrySynthesizer},
    units::Kmh,
    vehicle::{Color, LocationId, RouteId, VehicleClass, VehicleId},
    wear::wear_model::WearModel,
};

#[derive(Debug, Error)]
#[error("Dispatch of {vehicle_id} rejected: {source}")]
pub struct DispatchError {
    pub vehicle_id: VehicleId,
    #[source]
    pub source: EngineError,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum VehiclePhase {
    /// The initial route could not be stitched, the vehicle never departed.
    Unlaunched,
    /// Depart command accepted, the engine has not reported the vehicle yet.
    Dispatched,
    Active,
    /// Arrived and waiting for a rejected dispatch to be retried.
    Respawning { failed_attempts: u32 },
    /// Every dispatch retry failed.
    Stranded,
}

/// Static description of one fleet member.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSpec {
    pub id: VehicleId,
    pub waypoints: Vec<LocationId>,
    pub vehicle_class: VehicleClass,
    pub color: Color,
}

/// Lifecycle controller of one vehicle: detects arrival and re-injects the
/// vehicle so the fleet keeps a constant population. Owns everything that is
/// per vehicle (route, wear, speed history).
pub struct VehicleDaemon {
    spec: VehicleSpec,
    route_id: RouteId,
    route: Option<Route>,
    phase: VehiclePhase,
    wear: WearModel,
    previous_speed: Option<Kmh>,
    policy: LifecyclePolicy,
    trips_completed: u32,
}

impl VehicleDaemon {
    /// Stitches the initial route and issues the first depart command.
    pub fn install<E>(engine: &mut E, spec: VehicleSpec, wear: WearModel, policy: LifecyclePolicy) -> Self
    where
        E: SimulationEngine + ?Sized,
    {
        let route_id = RouteId::for_vehicle(&spec.id);

        let mut daemon = VehicleDaemon {
            spec,
            route_id,
            route: None,
            phase: VehiclePhase::Unlaunched,
            wear,
            previous_speed: None,
            policy,
            trips_completed: 0,
        };

        match route_stitcher::stitch_and_register(
            engine,
            &daemon.route_id,
            &daemon.spec.waypoints,
            &daemon.spec.vehicle_class,
        ) {
            Ok(route) => {
                daemon.route = Some(route);
                daemon.try_dispatch(engine, 0);
                info!("Daemon installed for vehicle {}", daemon.spec.id);
            }
            Err(err) => {
                error!(vehicle = %daemon.spec.id, "Vehicle stays unlaunched: {}", err);
            }
        }

        daemon
    }

    pub fn id(&self) -> &VehicleId {
        &self.spec.id
    }

    pub fn spec(&self) -> &VehicleSpec {
        &self.spec
    }

    pub fn route_id(&self) -> &RouteId {
        &self.route_id
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn phase(&self) -> VehiclePhase {
        self.phase
    }

    pub fn wear(&self) -> &WearModel {
        &self.wear
    }

    pub fn trips_completed(&self) -> u32 {
        self.trips_completed
    }

    fn dispatch<E>(&self, engine: &mut E) -> Result<(), DispatchError>
    where
        E: SimulationEngine + ?Sized,
    {
        engine
            .dispatch(
                &self.spec.id,
                &self.route_id,
                &self.spec.vehicle_class,
                self.spec.color,
            )
            .map_err(|source| DispatchError {
                vehicle_id: self.spec.id.clone(),
                source,
            })
    }

    fn try_dispatch<E>(&mut self, engine: &mut E, failed_attempts: u32)
    where
        E: SimulationEngine + ?Sized,
    {
        match self.dispatch(engine) {
            Ok(()) => {
                self.phase = if engine.is_active(&self.spec.id) {
                    VehiclePhase::Active
                } else {
                    VehiclePhase::Dispatched
                };
            }
            Err(err) => {
                let failed_attempts = failed_attempts + 1;

                if failed_attempts > self.policy.max_dispatch_retries {
                    error!(
                        vehicle = %self.spec.id,
                        failed_attempts,
                        "Giving up on vehicle: {}", err
                    );
                    self.phase = VehiclePhase::Stranded;
                } else {
                    warn!(vehicle = %self.spec.id, failed_attempts, "{}", err);
                    self.phase = VehiclePhase::Respawning { failed_attempts };
                }
            }
        }
    }

    fn refresh_route<E>(&mut self, engine: &mut E)
    where
        E: SimulationEngine + ?Sized,
    {
        if self.policy.route_refresh == RouteRefresh::Once {
            return;
        }

        match route_stitcher::stitch_and_register(
            engine,
            &self.route_id,
            &self.spec.waypoints,
            &self.spec.vehicle_class,
        ) {
            Ok(route) => self.route = Some(route),
            Err(err) => warn!(
                vehicle = %self.spec.id,
                "Keeping previous route {}: {}", self.route_id, err
            ),
        }
    }

    fn respawn<E>(&mut self, engine: &mut E, now: SignedDuration)
    where
        E: SimulationEngine + ?Sized,
    {
        self.trips_completed += 1;
        info!(
            vehicle = %self.spec.id,
            trips = self.trips_completed,
            "Vehicle arrived at {}, re-dispatching", now
        );

        if self.policy.wear_reset == WearResetPolicy::PerTrip {
            self.wear.reset();
        }
        self.previous_speed = None;

        self.refresh_route(engine);
        self.try_dispatch(engine, 0);
    }

    /// Advances the wear model by one sampling tick and synthesizes a record.
    pub fn sample(
        &mut self,
        synthesizer: &TelemetrySynthesizer,
        kinematics: &RawKinematics,
        timestamp: Timestamp,
    ) -> TelemetryRecord {
        let wear = *self.wear.advance();

        synthesizer.sample(
            &self.spec.id,
            kinematics,
            &wear,
            &mut self.previous_speed,
            timestamp,
        )
    }
}

impl StepListener for VehicleDaemon {
    fn on_step(&mut self, engine: &mut dyn SimulationEngine, now: SignedDuration) {
        match self.phase {
            VehiclePhase::Unlaunched | VehiclePhase::Stranded => {}
            VehiclePhase::Dispatched | VehiclePhase::Active => {
                if engine.just_arrived_ids().contains(&self.spec.id) {
                    self.respawn(engine, now);
                } else if self.phase == VehiclePhase::Dispatched && engine.is_active(&self.spec.id) {
                    debug!("Vehicle {} is active", self.spec.id);
                    self.phase = VehiclePhase::Active;
                }
            }
            VehiclePhase::Respawning { failed_attempts } => {
                debug!(vehicle = %self.spec.id, failed_attempts, "Retrying dispatch");
                self.try_dispatch(engine, failed_attempts);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::SmallRng};

    use super::*;
    use crate::{
        test_utils::{ScriptedEngine, edges, locations},
        wear::{wear_model::WearPhase, wear_params::WearParams},
    };

    fn create_spec(id: &str, waypoints: &[&str]) -> VehicleSpec {
        VehicleSpec {
            id: VehicleId::new(id),
            waypoints: locations(waypoints),
            vehicle_class: VehicleClass::new("pt_bus"),
            color: Color::BLUE,
        }
    }

    fn create_wear(ramp_duration: u32) -> WearModel {
        WearModel::new(
            WearParams {
                ramp_duration,
                ..WearParams::default()
            },
            SmallRng::seed_from_u64(0),
        )
        .unwrap()
    }

    fn create_engine() -> ScriptedEngine {
        let mut engine = ScriptedEngine::default();
        engine.add_path("A", "B", &["A", "x", "B"]);
        engine
    }

    fn step(engine: &mut ScriptedEngine, daemon: &mut VehicleDaemon) {
        engine.step_once();
        let now = engine.current_time();
        daemon.on_step(engine, now);
    }

    #[test]
    fn test_install_dispatches_vehicle() {
        let mut engine = create_engine();

        let daemon = VehicleDaemon::install(
            &mut engine,
            create_spec("veh_1", &["A", "B"]),
            create_wear(10),
            LifecyclePolicy::default(),
        );

        assert_eq!(daemon.phase(), VehiclePhase::Active);
        assert_eq!(daemon.route().unwrap().edges(), edges(&["A", "x", "B"]).as_slice());
        assert_eq!(
            engine.registered_routes()[daemon.route_id()],
            edges(&["A", "x", "B"])
        );
        assert_eq!(engine.dispatch_count(daemon.id()), 1);
        assert_eq!(engine.last_color(daemon.id()), Some(Color::BLUE));
    }

    #[test]
    fn test_install_without_path_stays_unlaunched() {
        let mut engine = create_engine();

        let mut daemon = VehicleDaemon::install(
            &mut engine,
            create_spec("veh_1", &["A", "Z"]),
            create_wear(10),
            LifecyclePolicy::default(),
        );

        assert_eq!(daemon.phase(), VehiclePhase::Unlaunched);
        assert!(engine.registered_routes().is_empty());
        assert_eq!(engine.dispatch_count(daemon.id()), 0);

        for _ in 0..5 {
            step(&mut engine, &mut daemon);
        }
        assert_eq!(engine.dispatch_count(daemon.id()), 0);
    }

    #[test]
    fn test_arrival_redispatches_in_same_step() {
        let mut engine = create_engine();
        let mut daemon = VehicleDaemon::install(
            &mut engine,
            create_spec("veh_1", &["A", "B"]),
            create_wear(10),
            LifecyclePolicy::default(),
        );

        // three edges, one edge per step
        step(&mut engine, &mut daemon);
        step(&mut engine, &mut daemon);
        assert_eq!(daemon.trips_completed(), 0);

        step(&mut engine, &mut daemon);

        assert!(engine.just_arrived_ids().contains(daemon.id()));
        assert_eq!(daemon.trips_completed(), 1);
        assert_eq!(engine.dispatch_count(daemon.id()), 2);
        assert!(engine.is_active(daemon.id()));
        assert_eq!(daemon.phase(), VehiclePhase::Active);
    }

    #[test]
    fn test_respawn_restitches_route() {
        let mut engine = create_engine();
        let mut daemon = VehicleDaemon::install(
            &mut engine,
            create_spec("veh_1", &["A", "B"]),
            create_wear(10),
            LifecyclePolicy::default(),
        );

        engine.add_path("A", "B", &["A", "y", "B"]);
        for _ in 0..3 {
            step(&mut engine, &mut daemon);
        }

        assert_eq!(daemon.route().unwrap().edges(), edges(&["A", "y", "B"]).as_slice());
        assert_eq!(
            engine.registered_routes()[daemon.route_id()],
            edges(&["A", "y", "B"])
        );
    }

    #[test]
    fn test_respawn_keeps_previous_route_when_stitch_fails() {
        let mut engine = create_engine();
        let mut daemon = VehicleDaemon::install(
            &mut engine,
            create_spec("veh_1", &["A", "B"]),
            create_wear(10),
            LifecyclePolicy::default(),
        );

        engine.remove_path("A", "B");
        for _ in 0..3 {
            step(&mut engine, &mut daemon);
        }

        assert_eq!(daemon.trips_completed(), 1);
        assert_eq!(daemon.route().unwrap().edges(), edges(&["A", "x", "B"]).as_slice());
        assert!(engine.is_active(daemon.id()));
    }

    #[test]
    fn test_rejected_dispatch_is_retried_once_per_step() {
        let mut engine = create_engine();
        let mut daemon = VehicleDaemon::install(
            &mut engine,
            create_spec("veh_1", &["A", "B"]),
            create_wear(10),
            LifecyclePolicy::default(),
        );

        engine.reject_dispatches(daemon.id(), 2);
        for _ in 0..3 {
            step(&mut engine, &mut daemon);
        }
        assert_eq!(
            daemon.phase(),
            VehiclePhase::Respawning { failed_attempts: 1 }
        );
        assert!(!engine.is_active(daemon.id()));

        step(&mut engine, &mut daemon);
        assert_eq!(
            daemon.phase(),
            VehiclePhase::Respawning { failed_attempts: 2 }
        );

        step(&mut engine, &mut daemon);
        assert_eq!(daemon.phase(), VehiclePhase::Active);
        assert!(engine.is_active(daemon.id()));
        // install + arrival + two retries
        assert_eq!(engine.dispatch_count(daemon.id()), 4);
    }

    #[test]
    fn test_exhausted_retries_end_stranded() {
        let mut engine = create_engine();
        let policy = LifecyclePolicy {
            max_dispatch_retries: 2,
            ..LifecyclePolicy::default()
        };
        let mut daemon = VehicleDaemon::install(
            &mut engine,
            create_spec("veh_1", &["A", "B"]),
            create_wear(10),
            policy,
        );

        engine.reject_dispatches(daemon.id(), usize::MAX);
        for _ in 0..10 {
            step(&mut engine, &mut daemon);
        }

        assert_eq!(daemon.phase(), VehiclePhase::Stranded);
        // install, arrival, then two retries
        assert_eq!(engine.dispatch_count(daemon.id()), 4);
    }

    #[test]
    fn test_cumulative_wear_survives_respawn() {
        let mut engine = create_engine();
        let mut daemon = VehicleDaemon::install(
            &mut engine,
            create_spec("veh_1", &["A", "B"]),
            create_wear(10),
            LifecyclePolicy::default(),
        );
        let synthesizer = test_synthesizer();

        sample(&mut engine, &mut daemon, &synthesizer);
        sample(&mut engine, &mut daemon, &synthesizer);
        for _ in 0..3 {
            step(&mut engine, &mut daemon);
        }

        assert_eq!(daemon.trips_completed(), 1);
        assert_eq!(daemon.wear().state().elapsed_ticks(), 2);
    }

    #[test]
    fn test_per_trip_wear_reset() {
        let mut engine = create_engine();
        let policy = LifecyclePolicy {
            wear_reset: WearResetPolicy::PerTrip,
            ..LifecyclePolicy::default()
        };
        let mut daemon = VehicleDaemon::install(
            &mut engine,
            create_spec("veh_1", &["A", "B"]),
            create_wear(10),
            policy,
        );
        let synthesizer = test_synthesizer();

        sample(&mut engine, &mut daemon, &synthesizer);
        sample(&mut engine, &mut daemon, &synthesizer);
        for _ in 0..3 {
            step(&mut engine, &mut daemon);
        }

        assert_eq!(daemon.wear().state().elapsed_ticks(), 0);
        assert_eq!(daemon.wear().state().phase(), WearPhase::Ramp);
    }

    #[test]
    fn test_route_refresh_once_reuses_route() {
        let mut engine = create_engine();
        let policy = LifecyclePolicy {
            route_refresh: RouteRefresh::Once,
            ..LifecyclePolicy::default()
        };
        let mut daemon = VehicleDaemon::install(
            &mut engine,
            create_spec("veh_1", &["A", "B"]),
            create_wear(10),
            policy,
        );

        engine.add_path("A", "B", &["A", "y", "B"]);
        for _ in 0..3 {
            step(&mut engine, &mut daemon);
        }

        assert_eq!(daemon.trips_completed(), 1);
        assert_eq!(daemon.route().unwrap().edges(), edges(&["A", "x", "B"]).as_slice());
    }

    fn test_synthesizer() -> TelemetrySynthesizer {
        TelemetrySynthesizer::new(
            Default::default(),
            SignedDuration::from_secs(10),
            WearParams::default().max,
        )
    }

    fn sample(engine: &mut ScriptedEngine, daemon: &mut VehicleDaemon, synthesizer: &TelemetrySynthesizer) {
        let kinematics = RawKinematics::read(engine, daemon.id()).unwrap();
        daemon.sample(synthesizer, &kinematics, Timestamp::UNIX_EPOCH);
    }
}
