pub mod backend;
pub mod config;
pub mod orchestrator;
pub mod store;
pub mod tasks;
