use serde::{Deserialize, Serialize};

/// What happens to the wear state when a vehicle is re-injected.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WearResetPolicy {
    /// Wear accumulates over the vehicle's whole life.
    #[default]
    Cumulative,
    /// Every trip starts with a fresh wear state.
    PerTrip,
}

/// When a vehicle's route is stitched.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RouteRefresh {
    /// Re-stitch on every dispatch to follow changing traffic conditions.
    #[default]
    EveryDispatch,
    /// Stitch once at install and reuse the registered route.
    Once,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LifecyclePolicy {
    pub wear_reset: WearResetPolicy,
    pub route_refresh: RouteRefresh,
    /// Rejected dispatches are retried once per step, at most this many times.
    pub max_dispatch_retries: u32,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            wear_reset: WearResetPolicy::default(),
            route_refresh: RouteRefresh::default(),
            max_dispatch_retries: 5,
        }
    }
}
