use crate::resilience::ResilientInvoker;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Holds one resilient invoker per logical external dependency, keyed by a
/// stable name. Constructed once at start-up and passed by reference to
/// every collaborator that talks to the outside; each dependency's
/// breaker/bulkhead pair is independent, so one tripping cannot affect
/// another.
#[derive(Default)]
pub struct ResilienceRegistry {
    invokers: RwLock<HashMap<String, Arc<ResilientInvoker>>>,
}

impl ResilienceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the invoker registered under `name`, creating it with `build`
    /// on first use.
    pub fn get_or_create(
        &self,
        name: &str,
        build: impl FnOnce() -> ResilientInvoker,
    ) -> Arc<ResilientInvoker> {
        if let Some(existing) = self
            .invokers
            .read()
            .expect("resilience registry lock poisoned")
            .get(name)
        {
            return Arc::clone(existing);
        }

        let mut invokers = self
            .invokers
            .write()
            .expect("resilience registry lock poisoned");
        // A racing writer may have inserted between the read and the write.
        if let Some(existing) = invokers.get(name) {
            return Arc::clone(existing);
        }

        info!(dependency = name, "registering resilient invoker");
        let invoker = Arc::new(build());
        invokers.insert(name.to_string(), Arc::clone(&invoker));
        invoker
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResilientInvoker>> {
        self.invokers
            .read()
            .expect("resilience registry lock poisoned")
            .get(name)
            .map(Arc::clone)
    }
}
