use jiff::SignedDuration;

#[derive(Clone, Debug, PartialEq)]
pub enum Termination {
    /// Simulated time since the run started.
    Duration(SignedDuration),
    Steps(usize),
    /// The engine has no vehicle left running or waiting to depart.
    NoVehiclesExpected,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunParams {
    pub terminations: Vec<Termination>,
    /// Paces the steps so that simulated time follows wall-clock time.
    pub realtime: bool,
}

impl Default for RunParams {
    fn default() -> Self {
        RunParams {
            terminations: vec![Termination::NoVehiclesExpected],
            realtime: false,
        }
    }
}
