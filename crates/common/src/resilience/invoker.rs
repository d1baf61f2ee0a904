use crate::resilience::{
    Bulkhead, BulkheadConfig, CallOutcome, CircuitBreaker, CircuitBreakerConfig,
};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Tagged classification of a call failure, used instead of inspecting
/// concrete error types at runtime. Each call error maps itself to a kind
/// once; the recoverable predicate is evaluated over the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The dependency answered "no such thing", an expected outcome.
    NotFound,
    Timeout,
    Transport,
    RemoteStatus,
    Internal,
}

pub trait ClassifyFailure {
    fn failure_kind(&self) -> FailureKind;
}

/// Predicate deciding which failure kinds are excluded from circuit-breaker
/// accounting.
pub type RecoverablePredicate = Arc<dyn Fn(FailureKind) -> bool + Send + Sync>;

/// Typed admission rejection, distinct from a failure of the wrapped call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    #[error("bulkhead '{name}' is full")]
    BulkheadFull { name: String },
}

#[derive(Error, Debug)]
pub enum InvokerError<E: std::error::Error> {
    /// The call never ran: an admission stage refused it.
    #[error("call rejected: {0}")]
    Rejected(Rejection),

    /// The call ran and failed with its own error.
    #[error("call failed: {0}")]
    Inner(E),
}

impl<E: std::error::Error> InvokerError<E> {
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            InvokerError::Rejected(rejection) => Some(rejection),
            InvokerError::Inner(_) => None,
        }
    }
}

/// Guards calls to one external dependency with a fixed admission pipeline:
/// bulkhead first, then circuit breaker, then the call itself.
///
/// The ordering is load-bearing: a bulkhead rejection never reaches the
/// breaker, so overflow under load cannot trip it. Outcomes matched by the
/// recoverable predicate are excluded from breaker statistics entirely.
/// The invoker adds no deadline of its own; timeouts belong to the wrapped
/// call.
pub struct ResilientInvoker {
    name: String,
    bulkhead: Option<Bulkhead>,
    circuit_breaker: CircuitBreaker,
    recoverable: RecoverablePredicate,
}

impl ResilientInvoker {
    pub fn new(
        name: impl Into<String>,
        breaker_config: CircuitBreakerConfig,
        bulkhead_config: Option<BulkheadConfig>,
    ) -> Self {
        let name = name.into();
        Self {
            bulkhead: bulkhead_config.map(|cfg| Bulkhead::new(name.clone(), cfg)),
            circuit_breaker: CircuitBreaker::new(name.clone(), breaker_config),
            recoverable: Arc::new(|_| false),
            name,
        }
    }

    /// Replace the recoverable-failure predicate.
    pub fn recoverable_when(
        mut self,
        predicate: impl Fn(FailureKind) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.recoverable = Arc::new(predicate);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Run an async call through the admission pipeline.
    pub async fn invoke<T, E, F, Fut>(&self, task: F) -> Result<T, InvokerError<E>>
    where
        E: ClassifyFailure + std::error::Error,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _slot = match &self.bulkhead {
            Some(bulkhead) => Some(bulkhead.acquire().await.map_err(InvokerError::Rejected)?),
            None => None,
        };
        self.circuit_breaker
            .before_call()
            .map_err(InvokerError::Rejected)?;

        let result = task().await;
        self.record(&result);
        result.map_err(InvokerError::Inner)
    }

    /// Run an async call, recovering from any error (admission rejection
    /// included) with the caller-supplied fallback.
    pub async fn invoke_with_fallback<T, E, F, Fut, R>(&self, task: F, fallback: R) -> T
    where
        E: ClassifyFailure + std::error::Error,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: FnOnce(InvokerError<E>) -> T,
    {
        self.invoke(task).await.unwrap_or_else(fallback)
    }

    /// Run a blocking call on the invoking thread. Bulkhead admission does
    /// not wait on this path.
    pub fn invoke_sync<T, E, F>(&self, task: F) -> Result<T, InvokerError<E>>
    where
        E: ClassifyFailure + std::error::Error,
        F: FnOnce() -> Result<T, E>,
    {
        let _slot = match &self.bulkhead {
            Some(bulkhead) => Some(bulkhead.try_acquire().map_err(InvokerError::Rejected)?),
            None => None,
        };
        self.circuit_breaker
            .before_call()
            .map_err(InvokerError::Rejected)?;

        let result = task();
        self.record(&result);
        result.map_err(InvokerError::Inner)
    }

    /// Fire-and-forget variant for unit-returning calls.
    pub fn run_sync<E, F>(&self, task: F) -> Result<(), InvokerError<E>>
    where
        E: ClassifyFailure + std::error::Error,
        F: FnOnce() -> Result<(), E>,
    {
        self.invoke_sync(task)
    }

    fn record<T, E: ClassifyFailure>(&self, result: &Result<T, E>) {
        let outcome = match result {
            Ok(_) => CallOutcome::Success,
            Err(error) if (self.recoverable)(error.failure_kind()) => CallOutcome::Excluded,
            Err(_) => CallOutcome::Failure,
        };
        self.circuit_breaker.on_outcome(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use thiserror::Error;

    #[derive(Error, Debug, PartialEq)]
    enum FakeError {
        #[error("boom")]
        Boom,
        #[error("missing")]
        Missing,
    }

    impl ClassifyFailure for FakeError {
        fn failure_kind(&self) -> FailureKind {
            match self {
                FakeError::Boom => FailureKind::Transport,
                FakeError::Missing => FailureKind::NotFound,
            }
        }
    }

    fn invoker(window: usize) -> ResilientInvoker {
        ResilientInvoker::new(
            "metadata",
            CircuitBreakerConfig {
                failure_rate_threshold: 100.0,
                sliding_window_size: window,
                wait_duration_in_open: Duration::from_secs(60),
                half_open_permits: 1,
                automatic_half_open: true,
            },
            Some(BulkheadConfig {
                max_concurrent_calls: 4,
                max_wait: Duration::ZERO,
            }),
        )
        .recoverable_when(|kind| kind == FailureKind::NotFound)
    }

    #[tokio::test]
    async fn two_failures_open_the_breaker_and_block_the_call() {
        let invoker = invoker(2);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let result: Result<(), _> = invoker
                .invoke(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(FakeError::Boom)
                })
                .await;
            assert!(matches!(result, Err(InvokerError::Inner(FakeError::Boom))));
        }
        assert_eq!(invoker.circuit_breaker().state(), CircuitState::Open);

        let rejected: Result<(), InvokerError<FakeError>> = invoker
            .invoke(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(
            rejected,
            Err(InvokerError::Rejected(Rejection::CircuitOpen { .. }))
        ));
        // The wrapped call never ran while open.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn recoverable_failures_do_not_count_toward_the_breaker() {
        let invoker = invoker(2);

        for _ in 0..5 {
            let result: Result<(), _> = invoker.invoke(|| async { Err(FakeError::Missing) }).await;
            assert!(matches!(
                result,
                Err(InvokerError::Inner(FakeError::Missing))
            ));
        }

        assert_eq!(invoker.circuit_breaker().state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn zero_slot_bulkhead_rejects_without_touching_the_breaker() {
        let invoker = ResilientInvoker::new(
            "metadata",
            CircuitBreakerConfig {
                failure_rate_threshold: 100.0,
                sliding_window_size: 1,
                wait_duration_in_open: Duration::from_secs(60),
                half_open_permits: 1,
                automatic_half_open: true,
            },
            Some(BulkheadConfig {
                max_concurrent_calls: 0,
                max_wait: Duration::ZERO,
            }),
        );
        let calls = AtomicUsize::new(0);

        let result: Result<(), InvokerError<FakeError>> = invoker
            .invoke(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(
            result,
            Err(InvokerError::Rejected(Rejection::BulkheadFull { .. }))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(invoker.circuit_breaker().state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn fallback_replaces_rejections() {
        let invoker = ResilientInvoker::new(
            "metadata",
            CircuitBreakerConfig::default(),
            Some(BulkheadConfig {
                max_concurrent_calls: 0,
                max_wait: Duration::ZERO,
            }),
        );

        let value = invoker
            .invoke_with_fallback(
                || async { Ok::<_, FakeError>("live") },
                |error| {
                    assert!(error.rejection().is_some());
                    "fallback"
                },
            )
            .await;

        assert_eq!(value, "fallback");
    }

    #[test]
    fn sync_variant_shares_the_same_admission_pipeline() {
        let invoker = invoker(2);

        for _ in 0..2 {
            let result: Result<(), _> = invoker.invoke_sync(|| Err(FakeError::Boom));
            assert!(result.is_err());
        }

        let rejected = invoker.run_sync::<FakeError, _>(|| Ok(()));
        assert!(matches!(
            rejected,
            Err(InvokerError::Rejected(Rejection::CircuitOpen { .. }))
        ));
    }
}
