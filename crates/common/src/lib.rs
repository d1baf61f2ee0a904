pub mod domain;
pub mod garde;
pub mod http;
pub mod nats;
pub mod postgres;
pub mod resilience;
