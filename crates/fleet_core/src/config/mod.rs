pub mod fleet_config;
