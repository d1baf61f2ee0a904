use crate::resilience::Rejection;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct BulkheadConfig {
    pub max_concurrent_calls: usize,
    /// How long an async caller may wait for a free slot before being
    /// rejected. Synchronous admission never waits.
    pub max_wait: Duration,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 25,
            max_wait: Duration::from_millis(100),
        }
    }
}

/// Bounded-concurrency admission guard for one external dependency.
///
/// A rejected call never reaches the circuit breaker behind it, so bulkhead
/// overflow does not pollute breaker statistics.
pub struct Bulkhead {
    name: String,
    max_wait: Duration,
    slots: Arc<Semaphore>,
}

/// Held for the duration of one admitted call; the slot frees on drop.
pub struct BulkheadPermit {
    _permit: OwnedSemaphorePermit,
}

impl Bulkhead {
    pub fn new(name: impl Into<String>, config: BulkheadConfig) -> Self {
        Self {
            name: name.into(),
            max_wait: config.max_wait,
            slots: Arc::new(Semaphore::new(config.max_concurrent_calls)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Wait up to `max_wait` for a slot.
    pub async fn acquire(&self) -> Result<BulkheadPermit, Rejection> {
        let acquired =
            tokio::time::timeout(self.max_wait, Arc::clone(&self.slots).acquire_owned()).await;

        match acquired {
            Ok(Ok(permit)) => Ok(BulkheadPermit { _permit: permit }),
            // The semaphore is never closed; a timeout is the only miss.
            _ => {
                warn!(bulkhead = %self.name, "admission rejected, no slot within wait");
                Err(Rejection::BulkheadFull {
                    name: self.name.clone(),
                })
            }
        }
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Result<BulkheadPermit, Rejection> {
        match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => Ok(BulkheadPermit { _permit: permit }),
            Err(_) => {
                warn!(bulkhead = %self.name, "admission rejected, bulkhead full");
                Err(Rejection::BulkheadFull {
                    name: self.name.clone(),
                })
            }
        }
    }
}
