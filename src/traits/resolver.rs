//! Resolver traits for service resolution.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::traits::Dispose;

/// Core resolver trait for object-safe service resolution.
///
/// Handles the low-level mechanics: key lookup through the container
/// hierarchy, lifetime caching and circular dependency detection.
///
/// Most users should use the [`Resolver`] trait instead, which provides
/// generic methods built on top of this trait.
pub trait ResolverCore: Send + Sync {
    /// Resolves a single service.
    ///
    /// # Returns
    ///
    /// * `Ok(AnyArc)` - The resolved service wrapped in `Arc<dyn Any>`
    /// * `Err(DiError)` - Resolution error (not found, circular, disposed, ...)
    fn resolve_any(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>>;

    /// Resolves all multi-bound services for a capability.
    ///
    /// Bindings from ancestor containers come first, then the container's
    /// own, each group in registration order. Concrete type keys return an
    /// empty vector.
    fn resolve_many(&self, key: &Key) -> DiResult<Vec<Arc<dyn Any + Send + Sync>>>;

    /// Registers a synchronous disposal hook.
    ///
    /// Used by factories to register disposal callbacks that are executed
    /// when the containing container is disposed.
    fn push_sync_disposer(&self, f: Box<dyn FnOnce() + Send>);
}

/// High-level resolver interface with generic methods for type-safe resolution.
///
/// Both [`Container`](crate::Container) and
/// [`ResolverContext`](crate::ResolverContext) implement this trait, so
/// factory closures and callers use the same API.
///
/// # Examples
///
/// ```
/// use ferrous_prefab::{ContainerBuilder, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str) -> String;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) -> String {
///         format!("LOG: {msg}")
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(42usize);
/// builder
///     .register_instance(ConsoleLogger)
///     .as_capability::<dyn Logger, _>(|logger| logger as Arc<dyn Logger>);
///
/// let container = builder.build().unwrap();
/// assert_eq!(*container.get_required::<usize>(), 42);
/// assert_eq!(container.get_required_trait::<dyn Logger>().log("hi"), "LOG: hi");
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete service type.
    fn get<T: 'static + Send + Sync>(&self) -> DiResult<Arc<T>> {
        let key = Key::Type(TypeId::of::<T>(), std::any::type_name::<T>());
        let any = self.resolve_any(&key)?;
        any.downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves a single capability implementation.
    ///
    /// Returns the most recently registered implementation for `T`, searching
    /// the nearest container first. For every implementation use
    /// [`get_all_trait`](Self::get_all_trait).
    fn get_trait<T: ?Sized + 'static + Send + Sync>(&self) -> DiResult<Arc<T>>
    where
        Arc<T>: 'static,
    {
        let key = Key::Trait(std::any::type_name::<T>());
        let any = self.resolve_any(&key)?;
        // Capabilities are stored as Arc<Arc<dyn Trait>>
        any.downcast::<Arc<T>>()
            .map(|boxed| (*boxed).clone())
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves all registered implementations of a capability.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_prefab::{ContainerBuilder, Resolver};
    /// use std::sync::Arc;
    ///
    /// trait Plugin: Send + Sync {
    ///     fn name(&self) -> &str;
    /// }
    ///
    /// struct PluginA;
    /// impl Plugin for PluginA {
    ///     fn name(&self) -> &str { "Plugin A" }
    /// }
    ///
    /// struct PluginB;
    /// impl Plugin for PluginB {
    ///     fn name(&self) -> &str { "Plugin B" }
    /// }
    ///
    /// let mut builder = ContainerBuilder::new();
    /// builder.register_trait_instance::<dyn Plugin>(Arc::new(PluginA));
    /// builder.register_trait_instance::<dyn Plugin>(Arc::new(PluginB));
    ///
    /// let container = builder.build().unwrap();
    /// let plugins = container.get_all_trait::<dyn Plugin>().unwrap();
    /// assert_eq!(plugins.len(), 2);
    /// assert_eq!(plugins[0].name(), "Plugin A");
    /// assert_eq!(plugins[1].name(), "Plugin B");
    /// ```
    fn get_all_trait<T: ?Sized + 'static + Send + Sync>(&self) -> DiResult<Vec<Arc<T>>>
    where
        Arc<T>: 'static,
    {
        let key = Key::Trait(std::any::type_name::<T>());
        let anys = self.resolve_many(&key)?;

        let mut results = Vec::with_capacity(anys.len());
        for any in anys {
            let arc = any.downcast::<Arc<T>>()
                .map(|boxed| (*boxed).clone())
                .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))?;
            results.push(arc);
        }
        Ok(results)
    }

    /// Resolves a concrete service type, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if the service cannot be resolved.
    fn get_required<T: 'static + Send + Sync>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {:?}", std::any::type_name::<T>(), e))
    }

    /// Resolves a capability implementation, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if the capability cannot be resolved.
    fn get_required_trait<T: ?Sized + 'static + Send + Sync>(&self) -> Arc<T>
    where
        Arc<T>: 'static,
    {
        self.get_trait::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve trait {}: {:?}", std::any::type_name::<T>(), e))
    }

    /// Registers a service for disposal when the resolving container is
    /// disposed. Hooks run in LIFO order.
    fn register_disposer<T: Dispose>(&self, service: Arc<T>) {
        self.push_sync_disposer(Box::new(move || service.dispose()));
    }
}
