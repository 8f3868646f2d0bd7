use std::sync::atomic::{AtomicBool, Ordering};

use jiff::{SignedDuration, Timestamp};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    config::fleet_config::FleetConfig,
    engine::SimulationEngine,
    error::FleetError,
    lifecycle::{
        fleet::{Fleet, PhaseCounts},
        step_listener::StepListener,
        vehicle_daemon::VehicleSpec,
    },
    publish::{
        publish_scheduler::{PublishReport, PublishScheduler},
        publisher::{Publisher, Topics},
    },
    simulation::simulation_params::{RunParams, Termination},
    telemetry::telemetry_synthesizer::TelemetrySynthesizer,
};

/// Non-fatal engine step failures in a row after which the run is aborted.
pub const MAX_CONSECUTIVE_STEP_FAILURES: usize = 10;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Cancelled,
    Duration,
    Steps,
    NoVehiclesExpected,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub steps: usize,
    pub failed_steps: usize,
    pub simulated: SignedDuration,
    pub publish_ticks: usize,
    /// Vehicle samples handed to the publisher, two messages each.
    pub samples: usize,
    pub skipped: usize,
    pub stop_reason: StopReason,
    #[serde(skip)]
    pub phase_counts: PhaseCounts,
}

/// Drives the engine step by step and calls, after every step, the fleet's
/// daemons, the extra listeners and finally the publish scheduler. The engine
/// is closed when the simulation is dropped.
pub struct Simulation<E, P>
where
    E: SimulationEngine,
    P: Publisher,
{
    engine: E,
    fleet: Fleet,
    scheduler: PublishScheduler,
    publisher: P,
    listeners: Vec<Box<dyn StepListener + Send>>,
    start: SignedDuration,
    steps: usize,
    failed_steps: usize,
    consecutive_failures: usize,
}

impl<E, P> Simulation<E, P>
where
    E: SimulationEngine,
    P: Publisher,
{
    pub fn build(
        mut engine: E,
        specs: Vec<VehicleSpec>,
        config: &FleetConfig,
        publisher: P,
    ) -> Result<Self, FleetError> {
        let fleet = config
            .validate()
            .and_then(|_| Fleet::install(&mut engine, specs, config));

        let fleet = match fleet {
            Ok(fleet) => fleet,
            Err(err) => {
                engine.close();
                return Err(err);
            }
        };

        let start = engine.current_time();
        let scheduler = PublishScheduler::new(
            config.publish_interval,
            start,
            config.resolve_anchor(),
            TelemetrySynthesizer::new(config.telemetry, config.publish_interval, config.wear.max),
            Topics::new(config.topic_prefix.clone()),
        );

        Ok(Simulation {
            engine,
            fleet,
            scheduler,
            publisher,
            listeners: Vec::new(),
            start,
            steps: 0,
            failed_steps: 0,
            consecutive_failures: 0,
        })
    }

    pub fn add_listener<L>(&mut self, listener: L)
    where
        L: StepListener + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Engine steps that failed with a non-fatal error.
    pub fn failed_steps(&self) -> usize {
        self.failed_steps
    }

    pub fn elapsed(&self) -> SignedDuration {
        self.engine.current_time() - self.start
    }

    /// Advances the engine by one step. Fatal engine errors are returned, as is
    /// the last error once `MAX_CONSECUTIVE_STEP_FAILURES` steps in a row failed.
    pub fn step(&mut self) -> Result<Option<PublishReport>, FleetError> {
        if let Err(err) = self.engine.step() {
            if err.is_fatal() {
                return Err(err.into());
            }

            self.failed_steps += 1;
            self.consecutive_failures += 1;
            if self.consecutive_failures >= MAX_CONSECUTIVE_STEP_FAILURES {
                return Err(FleetError::EngineStalled {
                    failures: self.consecutive_failures,
                    source: err,
                });
            }

            warn!(
                "Engine step failed ({}/{}): {}",
                self.consecutive_failures, MAX_CONSECUTIVE_STEP_FAILURES, err
            );
            return Ok(None);
        }

        self.consecutive_failures = 0;
        self.steps += 1;
        let now = self.engine.current_time();

        self.fleet.on_step(&mut self.engine, now);
        for listener in self.listeners.iter_mut() {
            listener.on_step(&mut self.engine, now);
        }

        Ok(self
            .scheduler
            .on_step(&self.engine, &mut self.fleet, &self.publisher, now))
    }

    fn check_termination(&self, termination: &Termination) -> bool {
        match termination {
            Termination::Duration(max_duration) => self.elapsed() >= *max_duration,
            Termination::Steps(max_steps) => self.steps + self.failed_steps >= *max_steps,
            Termination::NoVehiclesExpected => {
                self.engine.min_expected_vehicles() == 0 && !self.fleet.expects_vehicles()
            }
        }
    }

    fn should_terminate(&self, params: &RunParams) -> Option<StopReason> {
        params
            .terminations
            .iter()
            .find(|termination| self.check_termination(termination))
            .map(|termination| {
                debug!("Termination condition met: {:?} at step {}", termination, self.steps);
                match termination {
                    Termination::Duration(_) => StopReason::Duration,
                    Termination::Steps(_) => StopReason::Steps,
                    Termination::NoVehiclesExpected => StopReason::NoVehiclesExpected,
                }
            })
    }

    /// Steps until a termination fires or `cancel` is set.
    pub fn run(&mut self, params: &RunParams, cancel: &AtomicBool) -> Result<RunSummary, FleetError> {
        let wall_start = Timestamp::now();
        let mut publish_ticks = 0;
        let mut samples = 0;
        let mut skipped = 0;

        info!("Simulation started with {} vehicles", self.fleet.len());

        let stop_reason = loop {
            if cancel.load(Ordering::Relaxed) {
                info!("Simulation cancelled at {}", self.elapsed());
                break StopReason::Cancelled;
            }

            if let Some(reason) = self.should_terminate(params) {
                break reason;
            }

            if let Some(report) = self.step()? {
                publish_ticks += 1;
                samples += report.published;
                skipped += report.skipped;
            }

            if params.realtime {
                let target = wall_start.checked_add(self.elapsed()).unwrap_or(wall_start);
                let remaining = target.duration_since(Timestamp::now());
                if remaining.is_positive() {
                    std::thread::sleep(remaining.unsigned_abs());
                }
            }
        };

        let summary = RunSummary {
            steps: self.steps,
            failed_steps: self.failed_steps,
            simulated: self.elapsed(),
            publish_ticks,
            samples,
            skipped,
            stop_reason,
            phase_counts: self.fleet.phase_counts(),
        };

        info!(
            "Simulation stopped ({:?}) after {} steps, {} simulated, {} samples in {} publish ticks",
            summary.stop_reason, summary.steps, summary.simulated, summary.samples, summary.publish_ticks
        );

        Ok(summary)
    }
}

impl<E, P> Drop for Simulation<E, P>
where
    E: SimulationEngine,
    P: Publisher,
{
    fn drop(&mut self) {
        debug!("Closing engine");
        self.engine.close();
    }
}
