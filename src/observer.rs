//! Observer hooks for pool and lifecycle events.
//!
//! Observers see every spawn, despawn and caught handler failure of the
//! factories resolved below the container they are registered in. They are
//! called synchronously; keep implementations cheap.

use std::sync::Arc;

use crate::factory::DespawnOutcome;

/// Observer trait for factory events.
///
/// # Examples
///
/// ```
/// use ferrous_prefab::{ContainerBuilder, DespawnOutcome, PoolObserver};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct SpawnCounter {
///     reused: AtomicUsize,
/// }
///
/// impl PoolObserver for SpawnCounter {
///     fn spawned(&self, _prefab: &str, reused: bool) {
///         if reused {
///             self.reused.fetch_add(1, Ordering::Relaxed);
///         }
///     }
///
///     fn despawned(&self, _prefab: &str, _outcome: DespawnOutcome) {}
///
///     fn handler_failed(&self, _prefab: &str, _handler: &str, _message: &str) {}
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.add_observer(Arc::new(SpawnCounter::default()));
/// ```
pub trait PoolObserver: Send + Sync {
    /// A spawn completed. `reused` is true when the instance came from the pool.
    fn spawned(&self, prefab: &str, reused: bool);

    /// A despawn completed.
    fn despawned(&self, prefab: &str, outcome: DespawnOutcome);

    /// A spawn or despawn handler panicked. The panic was caught and the
    /// remaining handlers still ran.
    fn handler_failed(&self, prefab: &str, handler: &str, message: &str);
}

/// Fan-out over registered observers. Cheap when empty.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn PoolObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub(crate) fn from_vec(observers: Vec<Arc<dyn PoolObserver>>) -> Self {
        Self { observers }
    }

    pub(crate) fn push(&mut self, observer: Arc<dyn PoolObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn spawned(&self, prefab: &str, reused: bool) {
        for observer in &self.observers {
            observer.spawned(prefab, reused);
        }
    }

    #[inline]
    pub(crate) fn despawned(&self, prefab: &str, outcome: DespawnOutcome) {
        for observer in &self.observers {
            observer.despawned(prefab, outcome);
        }
    }

    #[inline]
    pub(crate) fn handler_failed(&self, prefab: &str, handler: &str, message: &str) {
        for observer in &self.observers {
            observer.handler_failed(prefab, handler, message);
        }
    }
}

/// Built-in observer that forwards events to `tracing`.
///
/// ```
/// use ferrous_prefab::{ContainerBuilder, TracingObserver};
/// use std::sync::Arc;
///
/// let mut builder = ContainerBuilder::new();
/// builder.add_observer(Arc::new(TracingObserver::new()));
/// ```
pub struct TracingObserver {
    label: &'static str,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self { label: "ferrous_prefab" }
    }

    /// Tags every event with `label` in the `source` field.
    pub fn with_label(label: &'static str) -> Self {
        Self { label }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolObserver for TracingObserver {
    fn spawned(&self, prefab: &str, reused: bool) {
        tracing::info!(source = self.label, prefab, reused, "spawned");
    }

    fn despawned(&self, prefab: &str, outcome: DespawnOutcome) {
        tracing::info!(source = self.label, prefab, ?outcome, "despawned");
    }

    fn handler_failed(&self, prefab: &str, handler: &str, message: &str) {
        tracing::warn!(source = self.label, prefab, handler, reason = message, "lifecycle handler failed");
    }
}
