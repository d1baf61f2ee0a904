use crate::domain::DomainResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Outbound side of the message boundary.
///
/// Transport failure is the `Err` value, never a panic; the orchestrator
/// checks it and compensates. The correlation id travels as a message header
/// so consumers can restore the request context.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageDispatch: Send + Sync {
    async fn publish(&self, queue: &str, payload: Bytes, correlation_id: &str) -> DomainResult<()>;
}

/// What a feedback handler did with one inbound message.
///
/// Every variant maps to an acknowledgement; there is no requeue path. A
/// message gets exactly one processing attempt, whether it applied, was
/// stale, was malformed, or failed inside the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The conditional update applied.
    Applied,
    /// The message was valid but its timestamp was not newer than the
    /// stored one; the update degraded to a no-op.
    Stale,
    /// Missing correlation id or timestamp, undecodable body, or unknown
    /// phase code. Logged and dropped.
    DroppedInvalid,
    /// The handler hit an internal error; it was logged and the message is
    /// still acknowledged.
    ErrorLogged,
}
