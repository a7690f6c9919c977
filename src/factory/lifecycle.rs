//! Spawn/despawn notification dispatch.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::observer::Observers;
use crate::params::Args;
use crate::poolable::LifecycleHandle;
use crate::provider::LifetimeScope;
use crate::scene::{NodeId, SceneHost};
use crate::DiResult;

use super::Despawner;

/// The objects notified on every spawn and despawn of one instance.
///
/// Built once when an instance is first created and kept with it while it
/// cycles through the pool.
#[derive(Debug, Clone, Default)]
pub struct LifecycleTargets {
    handles: Vec<LifecycleHandle>,
}

impl LifecycleTargets {
    /// Scope handles matching `A` in registration order, each object once,
    /// followed by `output` when it matches `A` and is not already present.
    pub fn collect<A: Args>(scope_handles: &[LifecycleHandle], output: Option<&LifecycleHandle>) -> Self {
        let mut seen = HashSet::new();
        let handles = scope_handles
            .iter()
            .chain(output)
            .filter(|handle| handle.matches::<A>() && seen.insert(handle.identity()))
            .cloned()
            .collect();
        Self { handles }
    }

    /// Targets for a freshly spawned instance whose output has allocation
    /// identity `output`. The output's own handle comes from the component
    /// with that identity on `node`, if there is one.
    pub(crate) fn for_instance<A: Args>(
        host: &dyn SceneHost,
        scope: Option<&LifetimeScope>,
        node: NodeId,
        output: usize,
    ) -> DiResult<Self> {
        let own = host
            .components(node)
            .into_iter()
            .find(|component| component.identity() == output)
            .and_then(|component| component.lifecycle().cloned());
        match scope {
            Some(scope) => Ok(Self::collect::<A>(&scope.lifecycle_handles()?, own.as_ref())),
            None => Ok(Self::collect::<A>(&[], own.as_ref())),
        }
    }

    pub fn handles(&self) -> &[LifecycleHandle] {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Calls `on_pool_spawn` on every target. A panicking handler is logged and
/// reported; the others still run.
pub(crate) fn dispatch_spawn<A: Args>(
    targets: &LifecycleTargets,
    despawner: &Despawner,
    args: &A,
    prefab: &str,
    observers: &Observers,
) {
    for handle in targets.handles() {
        let Some(hook) = handle.spawn_hook::<A>() else {
            continue;
        };
        let result = catch_unwind(AssertUnwindSafe(|| hook.on_pool_spawn(despawner, args)));
        if let Err(payload) = result {
            report(prefab, handle, "on_pool_spawn", payload.as_ref(), observers);
        }
    }
}

/// Calls `on_pool_despawn` on every target, isolating panics like
/// [`dispatch_spawn`].
pub(crate) fn dispatch_despawn(targets: &LifecycleTargets, prefab: &str, observers: &Observers) {
    for handle in targets.handles() {
        let hook = handle.despawn_hook();
        let result = catch_unwind(AssertUnwindSafe(|| hook.on_pool_despawn()));
        if let Err(payload) = result {
            report(prefab, handle, "on_pool_despawn", payload.as_ref(), observers);
        }
    }
}

fn report(prefab: &str, handle: &LifecycleHandle, hook: &str, payload: &(dyn Any + Send), observers: &Observers) {
    let message = panic_message(payload);
    tracing::error!(prefab, handler = handle.type_name(), hook, panic = message, "lifecycle handler panicked");
    if observers.has_observers() {
        observers.handler_failed(prefab, handle.type_name(), message);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
