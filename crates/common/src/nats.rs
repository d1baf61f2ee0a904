mod client;
mod consumer;
mod dispatch;

pub use client::*;
pub use consumer::*;
pub use dispatch::*;

/// Header carrying the opaque correlation id on every published and consumed
/// message.
pub const CORRELATION_ID_HEADER: &str = "x-request-id";
