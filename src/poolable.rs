//! Spawn/despawn capabilities and the type-erased handles that carry them.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::factory::Despawner;
use crate::params::Args;
use crate::registration::{AnyArc, LifecycleCaster};

/// Despawn half of the pooling lifecycle.
///
/// Implemented by every object that wants to hear about its instance going
/// back into the pool.
pub trait PoolableBase: Send + Sync + 'static {
    /// Called before the instance is deactivated (or destroyed, when the pool
    /// is full).
    fn on_pool_despawn(&self);
}

/// Spawn half of the pooling lifecycle for argument tuple `A`.
///
/// `A` is `()` for factories without extra parameters, `(P1,)` for one,
/// `(P1, P2)` for two and so on. A capability declared for one tuple type is
/// never notified by a factory with a different one.
///
/// ```rust
/// use ferrous_prefab::{Despawner, Poolable, PoolableBase};
/// use std::sync::Mutex;
///
/// #[derive(Default)]
/// struct Bullet {
///     damage: Mutex<u32>,
/// }
///
/// impl PoolableBase for Bullet {
///     fn on_pool_despawn(&self) {
///         *self.damage.lock().unwrap() = 0;
///     }
/// }
///
/// impl Poolable<(u32,)> for Bullet {
///     fn on_pool_spawn(&self, _despawn: &Despawner, (damage,): &(u32,)) {
///         *self.damage.lock().unwrap() = *damage;
///     }
/// }
/// ```
pub trait Poolable<A: Args = ()>: PoolableBase {
    /// Called after the instance is placed and activated. `despawn` is the
    /// one and only way to return this particular spawn to the pool.
    fn on_pool_spawn(&self, despawn: &Despawner, args: &A);
}

/// Data-pointer identity of a shared value.
pub fn identity_of<T: ?Sized>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value) as *const () as usize
}

/// Type-erased handle to one capability-bearing object.
///
/// Carries the object's identity, its despawn hook and a spawn hook for
/// exactly one argument tuple type.
#[derive(Clone)]
pub struct LifecycleHandle {
    identity: usize,
    type_name: &'static str,
    args: TypeId,
    base: Arc<dyn PoolableBase>,
    // Arc<dyn Poolable<A>> behind Any
    spawn: AnyArc,
}

impl LifecycleHandle {
    pub fn new<T, A>(value: Arc<T>) -> Self
    where
        T: Poolable<A>,
        A: Args,
    {
        let identity = identity_of(&value);
        let base: Arc<dyn PoolableBase> = value.clone();
        let spawn: Arc<dyn Poolable<A>> = value;
        Self {
            identity,
            type_name: std::any::type_name::<T>(),
            args: TypeId::of::<A>(),
            base,
            spawn: Arc::new(spawn) as AnyArc,
        }
    }

    pub fn identity(&self) -> usize {
        self.identity
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// True if the handle was declared for argument tuple `A`.
    pub fn matches<A: Args>(&self) -> bool {
        self.args == TypeId::of::<A>()
    }

    pub(crate) fn spawn_hook<A: Args>(&self) -> Option<Arc<dyn Poolable<A>>> {
        self.spawn.downcast_ref::<Arc<dyn Poolable<A>>>().cloned()
    }

    pub(crate) fn despawn_hook(&self) -> &Arc<dyn PoolableBase> {
        &self.base
    }
}

impl fmt::Debug for LifecycleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHandle")
            .field("type_name", &self.type_name)
            .field("identity", &format_args!("{:#x}", self.identity))
            .finish()
    }
}

/// Builds handles for a registration declared `as_poolable::<A>()`.
pub(crate) fn lifecycle_caster<T, A>() -> LifecycleCaster
where
    T: Poolable<A>,
    A: Args,
{
    Arc::new(|raw: &AnyArc| -> Option<LifecycleHandle> {
        raw.clone().downcast::<T>().ok().map(LifecycleHandle::new::<T, A>)
    })
}
