use jiff::SignedDuration;

use crate::engine::SimulationEngine;

/// Observer called by the driver after every engine step. Listeners are called
/// in no particular order and must not rely on each other's side effects.
pub trait StepListener {
    fn on_step(&mut self, engine: &mut dyn SimulationEngine, now: SignedDuration);
}
