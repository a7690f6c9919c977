//! Container builder module for dependency injection.
//!
//! This module contains the [`ContainerBuilder`] used to register services
//! and build a [`Container`], plus the [`Installer`] abstraction that groups
//! registrations into reusable units.

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::key::{key_of_trait, key_of_type};
use crate::observer::PoolObserver;
use crate::params::Args;
use crate::poolable::{lifecycle_caster, Poolable, PoolableBase};
use crate::provider::ResolverContext;
use crate::registration::{
    AnyArc, Binding, Caster, Ctor, EntryCaster, LifecycleCaster, Parameters, Registration, Registry,
};
use crate::scene::{NodeId, SceneHost};
use crate::traits::EntryPoint;
use crate::{Container, DiError, DiResult, Key, Lifetime};

pub mod installer;
pub use installer::*;

type BuildCallback = Box<dyn FnOnce(&Container) -> DiResult<()> + Send>;

/// Mutable registration state, turned into a [`Registration`] on build.
pub(crate) struct Pending {
    lifetime: Lifetime,
    ctor: Ctor,
    type_name: &'static str,
    impl_id: TypeId,
    exposures: Vec<Exposure>,
    /// Set once `as_self`/`as_capability` is called; otherwise the
    /// registration is exposed as its own type.
    explicit: bool,
    base_exposed: bool,
    parameters: Parameters,
    lifecycle: Vec<LifecycleCaster>,
    entry_point: Option<EntryCaster>,
}

struct Exposure {
    key: Key,
    cast: Option<Caster>,
    single: bool,
    many: bool,
}

impl Pending {
    fn new(lifetime: Lifetime, ctor: Ctor, type_name: &'static str, impl_id: TypeId) -> Self {
        Self {
            lifetime,
            ctor,
            type_name,
            impl_id,
            exposures: Vec::new(),
            explicit: false,
            base_exposed: false,
            parameters: Parameters::new(),
            lifecycle: Vec::new(),
            entry_point: None,
        }
    }

    fn exposes(&self, key: &Key) -> bool {
        let implicit_self = !self.explicit && Key::Type(self.impl_id, self.type_name) == *key;
        implicit_self || self.exposures.iter().any(|e| e.single && e.key == *key)
    }
}

/// Collects registrations for one container.
///
/// Registration methods return a [`RegistrationBuilder`] for fluent
/// configuration. A registration without any explicit `as_*` exposure is
/// resolvable as its own type.
///
/// # Examples
///
/// ```rust
/// use ferrous_prefab::{ContainerBuilder, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String { "hello".into() }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder
///     .register::<English, _>(Lifetime::Singleton, |_| Ok(English))
///     .as_self()
///     .as_capability::<dyn Greeter, _>(|english| english as Arc<dyn Greeter>);
///
/// let container = builder.build().unwrap();
/// assert_eq!(container.get_required_trait::<dyn Greeter>().greet(), "hello");
/// assert!(container.get::<English>().is_ok());
/// ```
pub struct ContainerBuilder {
    name: String,
    pending: Vec<Pending>,
    callbacks: Vec<BuildCallback>,
    root: Option<(Arc<dyn SceneHost>, NodeId)>,
}

impl ContainerBuilder {
    /// Creates a new empty builder.
    pub fn new() -> Self {
        Self::named("container")
    }

    /// Creates a new empty builder whose container carries `name` in
    /// diagnostics and errors.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pending: Vec::new(),
            callbacks: Vec::new(),
            root: None,
        }
    }

    /// Diagnostic name of the container being built.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scope's root object, used by [`register_component`](Self::register_component).
    pub(crate) fn attach_root(&mut self, host: Arc<dyn SceneHost>, node: NodeId) {
        self.root = Some((host, node));
    }

    fn push(&mut self, pending: Pending) -> &mut Pending {
        self.pending.push(pending);
        let last = self.pending.len() - 1;
        &mut self.pending[last]
    }

    // ----- Concrete Type Registrations -----

    /// Registers an existing value as a singleton.
    ///
    /// ```rust
    /// # use ferrous_prefab::{ContainerBuilder, Resolver};
    /// struct Config { speed: f32 }
    ///
    /// let mut builder = ContainerBuilder::new();
    /// builder.register_instance(Config { speed: 4.0 });
    /// let container = builder.build().unwrap();
    /// assert_eq!(container.get_required::<Config>().speed, 4.0);
    /// ```
    pub fn register_instance<T: Send + Sync + 'static>(&mut self, value: T) -> RegistrationBuilder<'_, T> {
        self.register_instance_arc(Arc::new(value))
    }

    /// Registers an already shared value as a singleton.
    pub fn register_instance_arc<T: Send + Sync + 'static>(&mut self, value: Arc<T>) -> RegistrationBuilder<'_, T> {
        let ctor: Ctor = Arc::new(move |_: &ResolverContext| -> DiResult<AnyArc> {
            Ok(value.clone() as AnyArc)
        });
        let entry = self.push(Pending::new(
            Lifetime::Singleton,
            ctor,
            std::any::type_name::<T>(),
            TypeId::of::<T>(),
        ));
        RegistrationBuilder::new(entry)
    }

    /// Registers a factory with the given lifetime.
    pub fn register<T, F>(&mut self, lifetime: Lifetime, factory: F) -> RegistrationBuilder<'_, T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register_shared::<T, _>(lifetime, move |r: &ResolverContext| factory(r).map(Arc::new))
    }

    /// Registers a factory that hands out an `Arc` it already owns, useful
    /// when the factory also keeps a clone (for disposal hooks, say).
    pub fn register_shared<T, F>(&mut self, lifetime: Lifetime, factory: F) -> RegistrationBuilder<'_, T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |r: &ResolverContext| -> DiResult<AnyArc> {
            factory(r).map(|value| value as AnyArc)
        });
        let entry = self.push(Pending::new(
            lifetime,
            ctor,
            std::any::type_name::<T>(),
            TypeId::of::<T>(),
        ));
        RegistrationBuilder::new(entry)
    }

    // ----- Trait Registrations -----

    /// Registers a capability implementation as a singleton.
    ///
    /// The value is reachable through `get_trait::<C>()` (last registration
    /// wins) and `get_all_trait::<C>()` (every registration, in order).
    pub fn register_trait_instance<C>(&mut self, value: Arc<C>) -> &mut Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |_: &ResolverContext| -> DiResult<AnyArc> {
            Ok(Arc::new(value.clone()) as AnyArc)
        });
        let entry = self.push(Pending::new(
            Lifetime::Singleton,
            ctor,
            std::any::type_name::<C>(),
            TypeId::of::<Arc<C>>(),
        ));
        entry.explicit = true;
        entry.exposures.push(Exposure {
            key: key_of_trait::<C>(),
            cast: None,
            single: true,
            many: true,
        });
        self
    }

    // ----- Scene Registrations -----

    /// Registers the component `C` found on the scope's root object.
    ///
    /// Resolution fails with [`DiError::ComponentNotFound`] when the root
    /// object has no such component, and with [`DiError::Configuration`]
    /// when the container does not belong to a scope with a root object.
    pub fn register_component<C: Send + Sync + 'static>(&mut self) -> RegistrationBuilder<'_, C> {
        let root = self.root.clone();
        let ctor: Ctor = Arc::new(move |_: &ResolverContext| -> DiResult<AnyArc> {
            let type_name = std::any::type_name::<C>();
            let (host, node) = root.as_ref().ok_or_else(|| {
                DiError::Configuration(format!(
                    "{type_name} registered as a component, but the scope has no root object"
                ))
            })?;
            host.find_component(*node, TypeId::of::<C>())
                .map(|component| component.value().clone())
                .ok_or_else(|| DiError::ComponentNotFound {
                    prefab: host.name(*node).unwrap_or_default(),
                    type_name,
                })
        });
        let entry = self.push(Pending::new(
            Lifetime::Singleton,
            ctor,
            std::any::type_name::<C>(),
            TypeId::of::<C>(),
        ));
        RegistrationBuilder::new(entry)
    }

    /// Registers a singleton that is resolved and started right after the
    /// container is built.
    pub fn register_entry_point<T, F>(&mut self, factory: F) -> RegistrationBuilder<'_, T>
    where
        T: EntryPoint,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        let mut registration = self.register::<T, _>(Lifetime::Singleton, factory);
        registration.entry.entry_point = Some(Arc::new(|raw: &AnyArc| {
            raw.clone()
                .downcast::<T>()
                .ok()
                .map(|entry| entry as Arc<dyn EntryPoint>)
        }));
        registration
    }

    /// Runs `callback` once the container is built and its entry points have
    /// started. Callbacks run in registration order; an error fails the build.
    pub fn register_build_callback<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce(&Container) -> DiResult<()> + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
        self
    }

    /// Whether this builder already holds a registration resolvable as `T`.
    /// Ancestor containers are not consulted.
    pub fn exists<T: 'static>(&self) -> bool {
        let key = key_of_type::<T>();
        self.pending.iter().any(|entry| entry.exposes(&key))
    }

    /// Adds an observer for pool and lifecycle events.
    ///
    /// Factories resolved from this container, or any descendant, report to
    /// every observer registered along the chain.
    pub fn add_observer(&mut self, observer: Arc<dyn PoolObserver>) -> &mut Self {
        self.register_trait_instance::<dyn PoolObserver>(observer)
    }

    /// Builds a root container.
    pub fn build(self) -> DiResult<Container> {
        self.build_with_parent(None)
    }

    /// Builds a container that falls back to `parent` for keys it does not
    /// register itself.
    ///
    /// Entry points are started, then build callbacks run. If either fails,
    /// the fresh container is disposed and the error returned.
    pub fn build_with_parent(self, parent: Option<&Container>) -> DiResult<Container> {
        let ContainerBuilder { name, pending, callbacks, .. } = self;

        let mut registry = Registry::new();
        for entry in pending {
            let Pending {
                lifetime,
                ctor,
                type_name,
                impl_id,
                mut exposures,
                explicit,
                parameters,
                lifecycle,
                entry_point,
                ..
            } = entry;

            // A transient has no instance for the scope to notify
            if lifetime == Lifetime::Transient && !lifecycle.is_empty() {
                return Err(DiError::Configuration(format!(
                    "'{type_name}' is transient and cannot take spawn/despawn notifications; register it as scoped or singleton"
                )));
            }

            if !explicit {
                exposures.insert(0, Exposure {
                    key: Key::Type(impl_id, type_name),
                    cast: None,
                    single: true,
                    many: false,
                });
            }

            let index = registry.push(Registration {
                lifetime,
                ctor,
                type_name,
                impl_id,
                parameters: Arc::new(parameters),
                singleton: Mutex::new(None),
                lifecycle,
                entry_point,
            });

            for exposure in exposures {
                let binding = Binding { index, cast: exposure.cast };
                if exposure.many {
                    registry.bind_many(exposure.key.display_name(), binding.clone());
                }
                if exposure.single {
                    registry.bind_single(exposure.key, binding);
                }
            }
        }

        let container = Container::new(name, registry, parent.cloned());
        if let Err(err) = Self::start(&container, callbacks) {
            container.dispose();
            return Err(err);
        }
        Ok(container)
    }

    fn start(container: &Container, callbacks: Vec<BuildCallback>) -> DiResult<()> {
        for entry in container.entry_points()? {
            entry.start();
        }
        for callback in callbacks {
            callback(container)?;
        }
        Ok(())
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent configuration of a single registration.
///
/// Returned by the `register*` methods of [`ContainerBuilder`].
pub struct RegistrationBuilder<'a, T> {
    entry: &'a mut Pending,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Send + Sync + 'static> RegistrationBuilder<'a, T> {
    fn new(entry: &'a mut Pending) -> Self {
        Self { entry, _marker: PhantomData }
    }

    /// Exposes the registration as its own type.
    pub fn as_self(mut self) -> Self {
        self.entry.explicit = true;
        let key = key_of_type::<T>();
        if !self.entry.exposures.iter().any(|e| e.single && e.key == key) {
            self.entry.exposures.push(Exposure { key, cast: None, single: true, many: false });
        }
        self
    }

    /// Exposes the registration as the capability `C`.
    ///
    /// `cast` performs the unsizing coercion, typically
    /// `|value| value as Arc<dyn Capability>`.
    pub fn as_capability<C, F>(mut self, cast: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<C> + Send + Sync + 'static,
    {
        self.entry.explicit = true;
        let caster: Caster = Arc::new(move |raw: AnyArc| {
            let value = raw
                .downcast::<T>()
                .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))?;
            Ok(Arc::new(cast(value)) as AnyArc)
        });
        self.entry.exposures.push(Exposure {
            key: key_of_trait::<C>(),
            cast: Some(caster),
            single: true,
            many: true,
        });
        self
    }

    /// Declares the spawn/despawn capability for argument tuple `A`.
    ///
    /// Only valid on scoped or singleton registrations; building a container
    /// with a transient poolable fails with [`DiError::Configuration`].
    /// The instance joins the owning scope's lifecycle registry and becomes
    /// reachable through `get_all_trait::<dyn Poolable<A>>()` and
    /// `get_all_trait::<dyn PoolableBase>()`.
    pub fn as_poolable<A: Args>(mut self) -> Self
    where
        T: Poolable<A>,
    {
        self.entry.lifecycle.push(lifecycle_caster::<T, A>());

        let spawn_cast: Caster = Arc::new(|raw: AnyArc| {
            let value = raw
                .downcast::<T>()
                .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))?;
            let poolable: Arc<dyn Poolable<A>> = value;
            Ok(Arc::new(poolable) as AnyArc)
        });
        self.entry.exposures.push(Exposure {
            key: key_of_trait::<dyn Poolable<A>>(),
            cast: Some(spawn_cast),
            single: false,
            many: true,
        });

        if !self.entry.base_exposed {
            self.entry.base_exposed = true;
            let base_cast: Caster = Arc::new(|raw: AnyArc| {
                let value = raw
                    .downcast::<T>()
                    .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))?;
                let base: Arc<dyn PoolableBase> = value;
                Ok(Arc::new(base) as AnyArc)
            });
            self.entry.exposures.push(Exposure {
                key: key_of_trait::<dyn PoolableBase>(),
                cast: Some(base_cast),
                single: false,
                many: true,
            });
        }
        self
    }

    /// Attaches a named value the factory can read through
    /// [`ResolverContext::parameter`].
    pub fn with_parameter<P: Send + Sync + 'static>(mut self, name: &'static str, value: P) -> Self {
        self.entry.parameters.insert(name, Arc::new(value) as AnyArc);
        self
    }
}
