mod encryption_producer;
mod feedback_processor;
mod generation_producer;

pub use encryption_producer::*;
pub use feedback_processor::*;
pub use generation_producer::*;
