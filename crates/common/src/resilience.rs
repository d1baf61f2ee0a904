mod bulkhead;
mod circuit_breaker;
mod invoker;
mod registry;

pub use bulkhead::*;
pub use circuit_breaker::*;
pub use invoker::*;
pub use registry::*;
