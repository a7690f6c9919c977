//! The pooling prefab factory.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::collection::Installer;
use crate::observer::{Observers, PoolObserver};
use crate::params::{Args, ParameterInstaller};
use crate::pool::{PoolRegistry, PoolSettings, PooledInstance, Release};
use crate::poolable::identity_of;
use crate::prefab::Prefab;
use crate::provider::LifetimeScope;
use crate::registration::AnyArc;
use crate::scene::{NodeId, Placement, Quat, SceneHost, Vec3};
use crate::traits::Dispose;
use crate::{DiError, DiResult};

use super::lifecycle::{dispatch_despawn, dispatch_spawn, LifecycleTargets};
use super::spawner::ScopedSpawner;

/// Result of a [`Despawner::despawn`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DespawnOutcome {
    /// The instance was deactivated and parked for reuse.
    Pooled,
    /// The pool was full or switched off; the instance was destroyed.
    Destroyed,
    /// This spawn had already been despawned. Nothing happened.
    AlreadyDespawned,
}

type ReleaseFn = Box<dyn FnOnce() -> DespawnOutcome + Send>;

/// Returns one particular spawn to its pool.
///
/// Every pooled spawn gets a fresh despawner. Clones share state: the first
/// [`despawn`](Self::despawn) on any of them releases the instance, later
/// calls are no-ops that return [`DespawnOutcome::AlreadyDespawned`].
#[derive(Clone)]
pub struct Despawner {
    inner: Arc<DespawnerInner>,
}

struct DespawnerInner {
    prefab: String,
    release: Mutex<Option<ReleaseFn>>,
}

impl Despawner {
    fn new(prefab: &str, release: ReleaseFn) -> Self {
        Self {
            inner: Arc::new(DespawnerInner {
                prefab: prefab.to_string(),
                release: Mutex::new(Some(release)),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn detached(prefab: &str) -> Self {
        Self::new(prefab, Box::new(|| DespawnOutcome::Destroyed))
    }

    /// Runs despawn notifications and hands the instance back to the pool.
    pub fn despawn(&self) -> DespawnOutcome {
        let release = self.inner.release.lock().take();
        match release {
            Some(release) => release(),
            None => {
                tracing::warn!(prefab = %self.inner.prefab, "despawn called more than once; ignored");
                DespawnOutcome::AlreadyDespawned
            }
        }
    }

    /// True once [`despawn`](Self::despawn) has been called.
    pub fn is_spent(&self) -> bool {
        self.inner.release.lock().is_none()
    }

    /// Whether two despawners belong to the same spawn.
    pub fn ptr_eq(&self, other: &Despawner) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Despawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Despawner")
            .field("prefab", &self.inner.prefab)
            .field("spent", &self.is_spent())
            .finish()
    }
}

/// A live instance handed out by a [`PrefabFactory`].
pub struct Spawned<T> {
    value: Arc<T>,
    node: NodeId,
    scope: Option<LifetimeScope>,
    despawner: Option<Despawner>,
    reused: bool,
}

impl<T> Spawned<T> {
    pub fn value(&self) -> &Arc<T> {
        &self.value
    }

    /// The instance's root object.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The scope built for a scoped prefab.
    pub fn scope(&self) -> Option<&LifetimeScope> {
        self.scope.as_ref()
    }

    /// Present when the factory pools; the only way to return the instance.
    pub fn despawner(&self) -> Option<&Despawner> {
        self.despawner.as_ref()
    }

    /// Despawns through the despawner. `None` for unpooled spawns, which
    /// belong to the caller.
    pub fn despawn(&self) -> Option<DespawnOutcome> {
        self.despawner.as_ref().map(Despawner::despawn)
    }

    /// True when the instance came out of the pool.
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    pub fn into_value(self) -> Arc<T> {
        self.value
    }
}

impl<T> Deref for Spawned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> fmt::Debug for Spawned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spawned")
            .field("type", &std::any::type_name::<T>())
            .field("node", &self.node)
            .field("scope", &self.scope)
            .field("reused", &self.reused)
            .finish()
    }
}

/// Instantiates a prefab, optionally recycling instances through a pool.
///
/// `A` is the argument tuple passed to every [`create`](Self::create) and `T`
/// the type handed back.
///
/// Without pool settings each call instantiates the prefab, registers the
/// arguments into the new scope and returns the output; the caller owns it.
///
/// With pool settings, arguments are never registered into a container:
/// a pooled instance is reused across spawns, so the arguments reach it
/// only through [`Poolable::on_pool_spawn`](crate::Poolable::on_pool_spawn).
/// Each spawn carries a [`Despawner`] that returns it to the pool.
///
/// A factory drives its pool from one logical thread. Concurrent `create`
/// or `despawn` calls on one pool are not serialized beyond individual
/// pool operations.
///
/// # Examples
///
/// ```rust
/// use ferrous_prefab::{
///     ComponentTemplate, Despawner, MemoryScene, PoolSettings, Poolable, PoolableBase,
///     Prefab, PrefabFactory, Placement,
/// };
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Bullet {
///     damage: AtomicU32,
/// }
///
/// impl PoolableBase for Bullet {
///     fn on_pool_despawn(&self) {}
/// }
///
/// impl Poolable<(u32,)> for Bullet {
///     fn on_pool_spawn(&self, _: &Despawner, (damage,): &(u32,)) {
///         self.damage.store(*damage, Ordering::Relaxed);
///     }
/// }
///
/// let scene = Arc::new(MemoryScene::new());
/// let prefab = Prefab::builder("Bullet")
///     .component(ComponentTemplate::poolable::<Bullet, (u32,), _>(|_| Ok(Bullet::default())))
///     .build();
///
/// let factory = PrefabFactory::<(u32,), Bullet>::new(scene.clone(), None, prefab)
///     .with_pool_settings(PoolSettings::with_max(8));
///
/// let first = factory.create((10,), Placement::default()).unwrap();
/// assert_eq!(first.damage.load(Ordering::Relaxed), 10);
/// first.despawn();
///
/// let second = factory.create((25,), Placement::default()).unwrap();
/// assert!(second.is_reused());
/// assert_eq!(second.damage.load(Ordering::Relaxed), 25);
/// assert_eq!(scene.instantiated_count("Bullet"), 1);
/// ```
pub struct PrefabFactory<A, T> {
    spawner: ScopedSpawner,
    prefab: Prefab,
    registry: Arc<PoolRegistry>,
    observers: Observers,
    disposed: AtomicBool,
    _marker: PhantomData<fn(A) -> T>,
}

impl<A, T> PrefabFactory<A, T>
where
    A: Args,
    T: Send + Sync + 'static,
{
    /// A factory spawning `prefab` below `current`, without pooling and with
    /// a pool registry of its own.
    pub fn new(host: Arc<dyn SceneHost>, current: Option<LifetimeScope>, prefab: Prefab) -> Self {
        let registry = Arc::new(PoolRegistry::new(host.clone()));
        Self {
            spawner: ScopedSpawner::new(host, current),
            prefab,
            registry,
            observers: Observers::new(),
            disposed: AtomicBool::new(false),
            _marker: PhantomData,
        }
    }

    pub fn with_pool_settings(self, settings: PoolSettings) -> Self {
        self.set_pool_settings(Some(settings));
        self
    }

    /// Keeps this factory's pool in `registry`, shared with every other
    /// factory handed the same registry. Settings already applied move over.
    ///
    /// The registry must use the same [`SceneHost`] as the factory.
    pub fn with_pool_registry(mut self, registry: Arc<PoolRegistry>) -> Self {
        let key = self.prefab.id();
        let settings = self.registry.settings(key);
        self.registry.teardown(key);
        self.registry = registry;
        if settings.is_some() {
            self.registry.configure(key, settings);
        }
        self
    }

    pub fn add_observer(&mut self, observer: Arc<dyn PoolObserver>) {
        self.observers.push(observer);
    }

    pub(crate) fn with_observers(mut self, observers: Vec<Arc<dyn PoolObserver>>) -> Self {
        self.observers = Observers::from_vec(observers);
        self
    }

    pub fn prefab(&self) -> &Prefab {
        &self.prefab
    }

    pub fn pool_registry(&self) -> &Arc<PoolRegistry> {
        &self.registry
    }

    pub fn pool_settings(&self) -> Option<PoolSettings> {
        self.registry.settings(self.prefab.id())
    }

    /// Turns pooling on, off, or changes its settings. Any change discards
    /// the previous pool.
    pub fn set_pool_settings(&self, settings: Option<PoolSettings>) {
        if self.registry.configure(self.prefab.id(), settings) {
            tracing::debug!(prefab = self.prefab.name(), "pool settings applied");
        }
    }

    /// Inactive instances waiting for reuse.
    pub fn pooled_count(&self) -> usize {
        self.registry.pooled_count(self.prefab.id())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Spawns an instance at `placement`.
    pub fn create(&self, args: A, placement: Placement) -> DiResult<Spawned<T>> {
        if self.is_disposed() {
            return Err(DiError::Disposed(format!("factory for '{}'", self.prefab.name())));
        }
        if self.registry.is_pooling(self.prefab.id()) {
            self.create_pooled(args, &placement)
        } else {
            self.create_unpooled(args, &placement)
        }
    }

    /// Spawns at a world position and rotation, optionally under `parent`.
    pub fn create_at(&self, args: A, position: Vec3, rotation: Quat, parent: Option<NodeId>) -> DiResult<Spawned<T>> {
        self.create(args, Placement::World { position, rotation, parent })
    }

    /// Spawns under `parent`.
    pub fn create_under(&self, args: A, parent: NodeId, keep_world_position: bool) -> DiResult<Spawned<T>> {
        self.create(args, Placement::Parent { parent, keep_world_position })
    }

    fn create_unpooled(&self, args: A, placement: &Placement) -> DiResult<Spawned<T>> {
        let extra: Vec<Box<dyn Installer>> = vec![Box::new(ParameterInstaller::new(args))];
        let result = self.spawner.spawn::<T>(&self.prefab, placement, extra)?;
        self.observers.spawned(self.prefab.name(), false);
        Ok(Spawned {
            value: result.output,
            node: result.node,
            scope: result.scope,
            despawner: None,
            reused: false,
        })
    }

    fn create_pooled(&self, args: A, placement: &Placement) -> DiResult<Spawned<T>> {
        let key = self.prefab.id();
        let host = self.spawner.host();

        let (instance, reused) = match self.registry.pop(key) {
            Some(instance) => match reactivate(host.as_ref(), &instance, placement) {
                Ok(()) => (instance, true),
                Err(err) => {
                    instance.destroy(host.as_ref());
                    return Err(err);
                }
            },
            None => (self.fresh(placement)?, false),
        };

        let value = match instance.output.clone().downcast::<T>() {
            Ok(value) => value,
            Err(_) => {
                instance.destroy(host.as_ref());
                return Err(DiError::TypeMismatch(std::any::type_name::<T>()));
            }
        };

        let node = instance.node;
        let scope = instance.scope.clone();
        let targets = instance.targets.clone();
        let despawner = Despawner::new(self.prefab.name(), self.releaser(instance));

        dispatch_spawn(&*targets, &despawner, &args, self.prefab.name(), &self.observers);
        tracing::debug!(prefab = self.prefab.name(), reused, handlers = targets.len(), "spawned pooled instance");
        self.observers.spawned(self.prefab.name(), reused);

        Ok(Spawned { value, node, scope, despawner: Some(despawner), reused })
    }

    /// Builds a new instance for the pool. Arguments are not installed.
    fn fresh(&self, placement: &Placement) -> DiResult<PooledInstance> {
        let host = self.spawner.host();
        let result = self.spawner.spawn::<T>(&self.prefab, placement, Vec::new())?;
        let targets = LifecycleTargets::for_instance::<A>(
            host.as_ref(),
            result.scope.as_ref(),
            result.node,
            identity_of(&result.output),
        );
        match targets {
            Ok(targets) => Ok(PooledInstance {
                output: result.output as AnyArc,
                node: result.node,
                scope: result.scope,
                targets: Arc::new(targets),
            }),
            Err(err) => {
                match result.scope {
                    Some(scope) => scope.dispose(),
                    None => host.destroy(result.node),
                }
                Err(err)
            }
        }
    }

    fn releaser(&self, instance: PooledInstance) -> ReleaseFn {
        let registry = self.registry.clone();
        let observers = self.observers.clone();
        let prefab = self.prefab.name().to_string();
        let key = self.prefab.id();
        Box::new(move || {
            let targets = instance.targets.clone();
            dispatch_despawn(&targets, &prefab, &observers);
            let outcome = match registry.release(key, instance) {
                Ok(Release::Pooled) => DespawnOutcome::Pooled,
                Ok(Release::Destroyed) => DespawnOutcome::Destroyed,
                Err(err) => {
                    tracing::warn!(prefab = %prefab, error = %err, "could not park instance; destroyed it");
                    DespawnOutcome::Destroyed
                }
            };
            tracing::debug!(prefab = %prefab, ?outcome, "despawned");
            observers.despawned(&prefab, outcome);
            outcome
        })
    }

    /// Fills the pool with `prewarm_count` instances through the regular
    /// spawn and despawn paths. All instances are spawned before any is
    /// despawned, so the pool ends up holding `min(prewarm_count, max_count)`.
    /// Returns the number of instances spawned.
    pub fn prewarm(&self, args: A) -> DiResult<usize> {
        let Some(settings) = self.pool_settings() else {
            return Ok(0);
        };
        let mut warm = Vec::with_capacity(settings.prewarm_count);
        let mut failure = None;
        for _ in 0..settings.prewarm_count {
            match self.create(args.clone(), Placement::default()) {
                Ok(spawned) => warm.push(spawned),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        let count = warm.len();
        for spawned in &warm {
            spawned.despawn();
        }
        match failure {
            Some(err) => Err(err),
            None => {
                tracing::debug!(prefab = self.prefab.name(), count, "pool prewarmed");
                Ok(count)
            }
        }
    }

    /// Stops pooling and destroys the pool parent and every parked instance.
    /// Further `create` calls fail. Instances still out keep their
    /// despawners; despawning them destroys them.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let destroyed = self.registry.teardown(self.prefab.id());
        tracing::debug!(prefab = self.prefab.name(), destroyed, "factory disposed");
    }
}

fn reactivate(host: &dyn SceneHost, instance: &PooledInstance, placement: &Placement) -> DiResult<()> {
    host.set_active(instance.node, true)?;
    host.place(instance.node, placement)
}

impl<A, T> Dispose for PrefabFactory<A, T>
where
    A: Args,
    T: Send + Sync + 'static,
{
    fn dispose(&self) {
        PrefabFactory::dispose(self);
    }
}

impl<A, T> fmt::Debug for PrefabFactory<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefabFactory")
            .field("prefab", &self.prefab.name())
            .field("output", &std::any::type_name::<T>())
            .field("pooled", &self.registry.pooled_count(self.prefab.id()))
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .finish()
    }
}
