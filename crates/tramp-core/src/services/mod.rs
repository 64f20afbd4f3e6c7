pub mod catalog;
pub mod health;
pub mod launch;
pub mod lifecycle;
pub mod orchestrator;
pub mod ports;
pub mod registry;
pub mod runner;
pub mod scheduler;
pub mod settings_loader;
pub mod store;

pub use orchestrator::Orchestrator;
