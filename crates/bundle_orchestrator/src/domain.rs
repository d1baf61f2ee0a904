mod bundle_service;
mod encryption;
mod metadata_service;
mod producer;

pub use bundle_service::*;
pub use encryption::*;
pub use metadata_service::*;
pub use producer::*;
