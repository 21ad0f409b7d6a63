pub mod orchestrator;
pub mod params;
