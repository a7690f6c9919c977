//! # ferrous-prefab
//!
//! Prefab factories, object pooling and scoped child containers for
//! scene-based applications.
//!
//! ## Features
//!
//! - **Scoped prefabs**: every spawn of a prefab carrying a scope definition gets its own child container
//! - **Typed arguments**: factories take a tuple of up to ten arguments, registered into the spawned scope
//! - **Object pooling**: bounded LIFO pools keyed by prefab identity, with prewarming
//! - **Lifecycle notifications**: every pooled spawn and despawn reaches each capability-bearing object exactly once
//! - **Handler isolation**: a panicking spawn or despawn handler is logged and never breaks the others
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_prefab::{
//!     installer_fn, ComponentTemplate, Despawner, Lifetime, LifetimeScope, MemoryScene, Placement,
//!     PoolSettings, Poolable, PoolableBase, Prefab, PrefabFactory, Resolver, ScopeDefinition,
//! };
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! // An enemy with its own scope: health is per spawn, the speed comes from the level.
//! struct Speed(f32);
//!
//! #[derive(Default)]
//! struct Health {
//!     current: AtomicU32,
//! }
//!
//! impl PoolableBase for Health {
//!     fn on_pool_despawn(&self) {
//!         self.current.store(0, Ordering::Relaxed);
//!     }
//! }
//!
//! impl Poolable<(u32,)> for Health {
//!     fn on_pool_spawn(&self, _despawn: &Despawner, (max,): &(u32,)) {
//!         self.current.store(*max, Ordering::Relaxed);
//!     }
//! }
//!
//! let enemy = Prefab::builder("Enemy")
//!     .scope(ScopeDefinition::new("Enemy").with_installer(installer_fn(|b| {
//!         b.register::<Health, _>(Lifetime::Scoped, |_| Ok(Health::default()))
//!             .as_self()
//!             .as_poolable::<(u32,)>();
//!         Ok(())
//!     })))
//!     .build();
//!
//! let scene = Arc::new(MemoryScene::new());
//! let level = LifetimeScope::root(
//!     Some(scene.clone()),
//!     ScopeDefinition::new("Level").with_installer(installer_fn(move |b| {
//!         b.register_instance(Speed(3.5));
//!         b.register_prefab_factory::<(u32,), Health>(enemy.clone())
//!             .pooled(PoolSettings::new("Enemies", 0, 16));
//!         Ok(())
//!     })),
//! );
//! let container = level.build().unwrap();
//!
//! let factory = container.get_required::<PrefabFactory<(u32,), Health>>();
//! let spawned = factory.create((100,), Placement::default()).unwrap();
//! assert_eq!(spawned.current.load(Ordering::Relaxed), 100);
//! assert_eq!(spawned.scope().unwrap().container().unwrap().get_required::<Speed>().0, 3.5);
//!
//! spawned.despawn();
//! assert_eq!(factory.pooled_count(), 1);
//!
//! level.dispose();
//! assert_eq!(scene.node_count(), 0);
//! ```
//!
//! ## Scopes
//!
//! A [`LifetimeScope`] owns a [`Container`] and, optionally, a scene object.
//! Scopes form a tree; resolution falls back to the parent container and
//! disposing a scope disposes its children first.
//!
//! ## Pooling
//!
//! With [`PoolSettings`] a [`PrefabFactory`] keeps despawned instances
//! inactive, parked under a pool parent object, and reuses them (most recent
//! first). Arguments never become registrations of a pooled instance's
//! scope; they arrive through [`Poolable::on_pool_spawn`] on every spawn.

pub mod collection;
pub mod error;
pub mod factory;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod params;
pub mod pool;
pub mod poolable;
pub mod prefab;
pub mod provider;
pub mod scene;
pub mod traits;

// Internal modules
mod internal;
mod registration;

pub use collection::{
    installer_fn, ContainerBuilder, FnInstaller, Installer, RegistrationBuilder, ScopeDefinition,
    ViewPresenterInstaller,
};
pub use error::{DiError, DiResult};
pub use factory::{
    ContextFactory, DespawnOutcome, Despawner, FactoryRegistration, LifecycleTargets, OutputSource, PrefabFactory,
    ScopedSpawner, ScopedValue, SpawnResult, Spawned,
};
pub use key::{key_of_trait, key_of_type, Key};
pub use lifetime::{Lifetime, ScopePhase};
pub use observer::{PoolObserver, TracingObserver};
pub use params::{Args, ParameterInstaller};
pub use pool::{PoolRegistry, PoolSettings, Release};
pub use poolable::{identity_of, LifecycleHandle, Poolable, PoolableBase};
pub use prefab::{ComponentTemplate, InjectContext, Prefab, PrefabBuilder, PrefabId};
pub use provider::{Container, CurrentScope, LifetimeScope, ResolverContext};
pub use scene::{pose, ComponentInstance, MemoryScene, NodeId, Placement, Pose, Quat, SceneHost, Vec3};
pub use traits::{Dispose, EntryPoint, Resolver, ResolverCore};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Presenter {
        started: AtomicUsize,
    }

    impl EntryPoint for Presenter {
        fn start(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct View;

    #[test]
    fn view_presenter_scope_starts_presenter_with_root_view() {
        let scene = Arc::new(MemoryScene::new());
        let hud = Prefab::builder("Hud")
            .component(ComponentTemplate::new(|_| Ok(View)))
            .scope(ScopeDefinition::new("Hud").with_installer(ViewPresenterInstaller::<View, Presenter>::new(|r| {
                r.get::<View>()?;
                Ok(Presenter::default())
            })))
            .build();

        let root = LifetimeScope::root(Some(scene.clone()), ScopeDefinition::new("Root"));
        root.build().unwrap();
        let child = root.create_child_from_prefab(&hud, &Placement::default(), Vec::new()).unwrap();
        let container = child.build().unwrap();

        assert_eq!(container.get_required::<Presenter>().started.load(Ordering::SeqCst), 1);
        root.dispose();
        assert_eq!(child.phase(), ScopePhase::Disposed);
        assert_eq!(scene.node_count(), 0);
    }

    #[test]
    fn scoped_spawns_get_distinct_containers() {
        let scene = Arc::new(MemoryScene::new());
        let prefab = Prefab::builder("Crate")
            .scope(ScopeDefinition::new("Crate").with_installer(installer_fn(|b| {
                b.register::<String, _>(Lifetime::Scoped, |_| Ok(String::from("loot")));
                Ok(())
            })))
            .build();

        let factory = PrefabFactory::<(), String>::new(scene.clone(), None, prefab);
        let a = factory.create((), Placement::default()).unwrap();
        let b = factory.create((), Placement::default()).unwrap();

        assert!(!Arc::ptr_eq(a.value(), b.value()));
        assert!(!a.scope().unwrap().ptr_eq(b.scope().unwrap()));
        assert!(a.despawner().is_none());
    }
}
