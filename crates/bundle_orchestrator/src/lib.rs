pub mod bundle_orchestrator;
pub mod domain;
pub mod nats;

pub use bundle_orchestrator::*;
