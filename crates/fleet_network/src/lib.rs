pub mod network;
pub mod network_engine;
pub mod projection;
