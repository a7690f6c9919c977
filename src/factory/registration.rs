//! Registering factories into a container.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::collection::{ContainerBuilder, ScopeDefinition};
use crate::observer::PoolObserver;
use crate::params::Args;
use crate::pool::{PoolRegistry, PoolSettings};
use crate::prefab::Prefab;
use crate::provider::{CurrentScope, LifetimeScope, ResolverContext};
use crate::scene::SceneHost;
use crate::traits::Resolver;
use crate::{DiError, DiResult, Lifetime};

use super::{ContextFactory, PrefabFactory};

struct FactoryConfig<A> {
    settings: Option<PoolSettings>,
    prewarm: Option<A>,
    registry: Option<Arc<PoolRegistry>>,
}

/// Pool configuration of a factory registered with
/// [`ContainerBuilder::register_prefab_factory`].
///
/// Applied when the factory is first resolved in a scope.
pub struct FactoryRegistration<A> {
    config: Arc<Mutex<FactoryConfig<A>>>,
}

impl<A: Args> FactoryRegistration<A> {
    /// Enables pooling with `settings`.
    pub fn pooled(self, settings: PoolSettings) -> Self {
        self.config.lock().settings = Some(settings);
        self
    }

    /// Arguments used to prewarm the pool when the factory is created.
    ///
    /// Factories taking `()` prewarm without them. For any other tuple a
    /// non-zero `prewarm_count` without prewarm arguments makes resolving the
    /// factory fail with [`DiError::Configuration`].
    pub fn prewarm_with(self, args: A) -> Self {
        self.config.lock().prewarm = Some(args);
        self
    }

    /// Keeps the pool in `registry` instead of a registry owned by the
    /// factory.
    pub fn shared_pool(self, registry: Arc<PoolRegistry>) -> Self {
        self.config.lock().registry = Some(registry);
        self
    }
}

impl ContainerBuilder {
    /// Registers a scoped [`PrefabFactory<A, T>`] for `prefab`.
    ///
    /// Each scope resolving the factory gets its own instance, spawning
    /// below that scope. The factory is disposed with the scope.
    ///
    /// ```rust
    /// use ferrous_prefab::{
    ///     installer_fn, ComponentTemplate, LifetimeScope, MemoryScene, Placement, PoolSettings,
    ///     Prefab, PrefabFactory, Resolver, ScopeDefinition,
    /// };
    /// use std::sync::Arc;
    ///
    /// struct Coin;
    ///
    /// let scene = Arc::new(MemoryScene::new());
    /// let coin = Prefab::builder("Coin")
    ///     .component(ComponentTemplate::new(|_| Ok(Coin)))
    ///     .build();
    ///
    /// let level = LifetimeScope::root(
    ///     Some(scene.clone()),
    ///     ScopeDefinition::new("Level").with_installer(installer_fn(move |b| {
    ///         b.register_prefab_factory::<(), Coin>(coin.clone())
    ///             .pooled(PoolSettings::new("Coins", 4, 8));
    ///         Ok(())
    ///     })),
    /// );
    /// let container = level.build().unwrap();
    ///
    /// let factory = container.get_required::<PrefabFactory<(), Coin>>();
    /// assert_eq!(factory.pooled_count(), 4);
    /// let spawned = factory.create((), Placement::default()).unwrap();
    /// assert!(spawned.is_reused());
    /// ```
    pub fn register_prefab_factory<A, T>(&mut self, prefab: Prefab) -> FactoryRegistration<A>
    where
        A: Args,
        T: Send + Sync + 'static,
    {
        let config = Arc::new(Mutex::new(FactoryConfig { settings: None, prewarm: None, registry: None }));
        let captured = config.clone();

        self.register_shared::<PrefabFactory<A, T>, _>(Lifetime::Scoped, move |r: &ResolverContext| {
            let prefab = r.parameter::<Prefab>("prefab")?;
            let host = r.get_trait::<dyn SceneHost>()?;
            let current = r.get::<CurrentScope>().ok().and_then(|current| current.get());
            let observers = r.get_all_trait::<dyn PoolObserver>()?;
            let (settings, prewarm, registry) = {
                let config = captured.lock();
                (config.settings.clone(), config.prewarm.clone(), config.registry.clone())
            };
            let prewarm = prewarm.or_else(A::trivial);
            if let (None, Some(settings)) = (&prewarm, &settings) {
                if settings.prewarm_count > 0 {
                    return Err(DiError::Configuration(format!(
                        "factory for '{}' asks for {} prewarmed instances but has no prewarm arguments",
                        prefab.name(),
                        settings.prewarm_count
                    )));
                }
            }

            let mut factory = PrefabFactory::<A, T>::new(host, current, (*prefab).clone()).with_observers(observers);
            if let Some(registry) = registry {
                factory = factory.with_pool_registry(registry);
            }
            if settings.is_some() {
                factory.set_pool_settings(settings);
            }

            let factory = Arc::new(factory);
            r.register_disposer(factory.clone());
            if let Some(args) = prewarm {
                factory.prewarm(args)?;
            }
            Ok(factory)
        })
        .with_parameter("prefab", prefab);

        FactoryRegistration { config }
    }

    /// Registers a scoped [`ContextFactory<A, T>`] creating child scopes from
    /// `definition` below the resolving scope.
    pub fn register_context_factory<A, T>(&mut self, definition: ScopeDefinition) -> &mut Self
    where
        A: Args,
        T: Send + Sync + 'static,
    {
        self.register::<ContextFactory<A, T>, _>(Lifetime::Scoped, move |r: &ResolverContext| {
            Ok(ContextFactory::new(current_scope(r)?, definition.clone()))
        });
        self
    }
}

fn current_scope(r: &ResolverContext<'_>) -> DiResult<LifetimeScope> {
    r.get::<CurrentScope>()?
        .get()
        .ok_or_else(|| DiError::Configuration("the resolving scope has been dropped".to_string()))
}
