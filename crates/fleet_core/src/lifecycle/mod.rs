pub mod fleet;
pub mod lifecycle_policy;
pub mod step_listener;
pub mod vehicle_daemon;
