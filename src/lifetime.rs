//! Service lifetimes and scope build phases.

use std::fmt;

/// Service lifetimes controlling instance caching behavior.
///
/// Containers form a hierarchy: a child scope's container falls back to its
/// parent for registrations it does not own. The lifetime decides *where* an
/// instance is cached once a registration is found.
///
/// # Examples
///
/// ```rust
/// use ferrous_prefab::{ContainerBuilder, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct Counter(u32);
///
/// let mut root = ContainerBuilder::new();
/// root.register::<Counter, _>(Lifetime::Scoped, |_| Ok(Counter(0)));
/// let root = root.build().unwrap();
///
/// let child = ContainerBuilder::new().build_with_parent(Some(&root)).unwrap();
///
/// // Scoped: one instance per resolving container
/// let a = root.get_required::<Counter>();
/// let b = child.get_required::<Counter>();
/// assert!(!Arc::ptr_eq(&a, &b));
/// assert!(Arc::ptr_eq(&b, &child.get_required::<Counter>()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Single instance cached in the container that owns the registration,
    /// shared with every descendant container.
    Singleton,
    /// Single instance per resolving container. A child resolving a parent's
    /// scoped registration gets its own instance.
    Scoped,
    /// New instance per resolution, never cached.
    Transient,
}

/// Build phase of a [`LifetimeScope`](crate::LifetimeScope).
///
/// `Unbuilt → Building → Built → Disposed`. A scope transitions to `Built`
/// exactly once; a failed build goes straight to `Disposed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopePhase {
    /// Created, registrations not run yet
    Unbuilt,
    /// Installers are running
    Building,
    /// Container available
    Built,
    /// Torn down
    Disposed,
}

impl fmt::Display for ScopePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ScopePhase::Unbuilt => "unbuilt",
            ScopePhase::Building => "building",
            ScopePhase::Built => "built",
            ScopePhase::Disposed => "disposed",
        };
        f.write_str(text)
    }
}
