use fxhash::FxHashMap;
use jiff::SignedDuration;
use rand::{SeedableRng, rngs::SmallRng};
use tracing::info;

use crate::{
    config::fleet_config::FleetConfig,
    define_index_newtype,
    engine::SimulationEngine,
    error::FleetError,
    lifecycle::{
        step_listener::StepListener,
        vehicle_daemon::{VehicleDaemon, VehiclePhase, VehicleSpec},
    },
    vehicle::VehicleId,
    wear::wear_model::WearModel,
};

define_index_newtype!(VehicleIdx, VehicleDaemon);

/// Counts of vehicles per lifecycle phase.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PhaseCounts {
    pub unlaunched: usize,
    pub dispatched: usize,
    pub active: usize,
    pub respawning: usize,
    pub stranded: usize,
}

/// Registry of the fleet's daemons, one per vehicle, keyed by a stable index.
pub struct Fleet {
    daemons: Vec<VehicleDaemon>,
    index: FxHashMap<VehicleId, VehicleIdx>,
}

impl Fleet {
    /// Installs one daemon per spec. Every vehicle gets its own wear RNG drawn
    /// from the configured master seed.
    pub fn install<E>(engine: &mut E, specs: Vec<VehicleSpec>, config: &FleetConfig) -> Result<Self, FleetError>
    where
        E: SimulationEngine + ?Sized,
    {
        let mut master_rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };

        let mut daemons = Vec::with_capacity(specs.len());
        let mut index = FxHashMap::default();

        for spec in specs {
            if index.contains_key(&spec.id) {
                return Err(FleetError::DuplicateVehicle(spec.id));
            }

            let wear = WearModel::new(config.wear, SmallRng::from_rng(&mut master_rng))
                .map_err(|err| FleetError::Config(format!("wear noise: {err}")))?;

            index.insert(spec.id.clone(), VehicleIdx::new(daemons.len()));
            daemons.push(VehicleDaemon::install(engine, spec, wear, config.lifecycle));
        }

        let fleet = Fleet { daemons, index };
        let counts = fleet.phase_counts();
        info!(
            "Fleet installed: {} vehicles, {} unlaunched",
            fleet.len(),
            counts.unlaunched
        );

        Ok(fleet)
    }

    pub fn len(&self) -> usize {
        self.daemons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.daemons.is_empty()
    }

    pub fn daemons(&self) -> &[VehicleDaemon] {
        &self.daemons
    }

    pub fn daemon(&self, vehicle_idx: VehicleIdx) -> &VehicleDaemon {
        &self.daemons[vehicle_idx]
    }

    pub fn vehicle_idx(&self, vehicle_id: &VehicleId) -> Option<VehicleIdx> {
        self.index.get(vehicle_id).copied()
    }

    pub fn get(&self, vehicle_id: &VehicleId) -> Option<&VehicleDaemon> {
        self.vehicle_idx(vehicle_id).map(|idx| &self.daemons[idx])
    }

    pub fn get_mut(&mut self, vehicle_id: &VehicleId) -> Option<&mut VehicleDaemon> {
        let idx = self.vehicle_idx(vehicle_id)?;
        Some(&mut self.daemons[idx])
    }

    /// True while a vehicle is running, departing or waiting for a dispatch
    /// retry. Unlaunched and stranded vehicles never come back.
    pub fn expects_vehicles(&self) -> bool {
        self.daemons.iter().any(|daemon| {
            matches!(
                daemon.phase(),
                VehiclePhase::Dispatched | VehiclePhase::Active | VehiclePhase::Respawning { .. }
            )
        })
    }

    pub fn phase_counts(&self) -> PhaseCounts {
        let mut counts = PhaseCounts::default();

        for daemon in &self.daemons {
            match daemon.phase() {
                VehiclePhase::Unlaunched => counts.unlaunched += 1,
                VehiclePhase::Dispatched => counts.dispatched += 1,
                VehiclePhase::Active => counts.active += 1,
                VehiclePhase::Respawning { .. } => counts.respawning += 1,
                VehiclePhase::Stranded => counts.stranded += 1,
            }
        }

        counts
    }
}

impl StepListener for Fleet {
    fn on_step(&mut self, engine: &mut dyn SimulationEngine, now: SignedDuration) {
        for daemon in self.daemons.iter_mut() {
            daemon.on_step(engine, now);
        }
    }
}
