//! Entry points started once a scope's container is built.

/// A service that is resolved and started right after its container is built.
///
/// Registered with [`ContainerBuilder::register_entry_point`](crate::ContainerBuilder::register_entry_point).
/// This is the presenter half of the view/presenter pattern: the view is a
/// component on the scope's root object, the presenter is an entry point that
/// receives the view through injection.
pub trait EntryPoint: Send + Sync + 'static {
    /// Called once, in registration order, after the container is built.
    fn start(&self);
}
