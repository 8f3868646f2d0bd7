pub mod telemetry_params;
pub mod telemetry_record;
pub mod telemetry_synthesizer;
