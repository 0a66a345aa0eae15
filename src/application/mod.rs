pub mod context;
pub mod engine;
pub mod orchestrator;
pub mod sentiment;
