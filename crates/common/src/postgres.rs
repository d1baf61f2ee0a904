mod bundle_store;
mod client;

pub use bundle_store::*;
pub use client::*;
