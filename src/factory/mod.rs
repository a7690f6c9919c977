//! Prefab factories.
//!
//! [`ScopedSpawner`] instantiates a prefab and locates its output, building a
//! child scope for scoped prefabs. [`PrefabFactory`] layers pooling and
//! spawn/despawn notifications on top of it. [`ContextFactory`] builds
//! object-less child scopes. The registration helpers on
//! [`ContainerBuilder`](crate::ContainerBuilder) wire factories into scopes.

mod context_factory;
mod lifecycle;
mod prefab_factory;
mod registration;
mod spawner;

pub use context_factory::{ContextFactory, ScopedValue};
pub use lifecycle::LifecycleTargets;
pub use prefab_factory::{DespawnOutcome, Despawner, PrefabFactory, Spawned};
pub use registration::FactoryRegistration;
pub use spawner::{OutputSource, ScopedSpawner, SpawnResult};
