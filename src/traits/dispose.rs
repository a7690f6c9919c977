//! Disposal trait for resource cleanup.

/// Trait for synchronous resource disposal.
///
/// Implement this trait for services that need structured teardown. Disposal
/// hooks registered through [`Resolver::register_disposer`](crate::Resolver::register_disposer)
/// run in LIFO order when the owning container is disposed, which happens when
/// its [`LifetimeScope`](crate::LifetimeScope) is disposed.
///
/// # Examples
///
/// ```
/// use ferrous_prefab::{ContainerBuilder, Dispose, Lifetime, Resolver};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Cache {
///     flushed: AtomicBool,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) {
///         self.flushed.store(true, Ordering::SeqCst);
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_shared::<Cache, _>(Lifetime::Singleton, |resolver| {
///     let cache = Arc::new(Cache::default());
///     resolver.register_disposer(cache.clone());
///     Ok(cache)
/// });
///
/// let container = builder.build().unwrap();
/// let cache = container.get_required::<Cache>();
/// container.dispose();
/// assert!(cache.flushed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}
