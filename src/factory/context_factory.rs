use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use crate::collection::{Installer, ScopeDefinition};
use crate::params::{Args, ParameterInstaller};
use crate::provider::LifetimeScope;
use crate::traits::Resolver;
use crate::DiResult;

/// Creates object-less child scopes of `current` and resolves `T` from them.
///
/// Each call passes its arguments to the new scope through a
/// [`ParameterInstaller`], so they are resolvable by the scope's
/// registrations.
///
/// ```rust
/// use ferrous_prefab::{
///     installer_fn, ContextFactory, Lifetime, LifetimeScope, Resolver, ScopeDefinition,
/// };
///
/// struct Level { number: u32 }
///
/// let root = LifetimeScope::root(None, ScopeDefinition::new("Game"));
/// root.build().unwrap();
///
/// let level = ScopeDefinition::new("Level").with_installer(installer_fn(|b| {
///     b.register::<Level, _>(Lifetime::Scoped, |r| Ok(Level { number: *r.get::<u32>()? }));
///     Ok(())
/// }));
/// let factory = ContextFactory::<(u32,), Level>::new(root.clone(), level);
///
/// let third = factory.create((3,)).unwrap();
/// assert_eq!(third.number, 3);
/// third.dispose();
/// ```
pub struct ContextFactory<A, T> {
    current: LifetimeScope,
    definition: ScopeDefinition,
    _marker: PhantomData<fn(A) -> T>,
}

impl<A, T> ContextFactory<A, T>
where
    A: Args,
    T: Send + Sync + 'static,
{
    pub fn new(current: LifetimeScope, definition: ScopeDefinition) -> Self {
        Self { current, definition, _marker: PhantomData }
    }

    pub fn definition(&self) -> &ScopeDefinition {
        &self.definition
    }

    /// Builds a child scope with `args` registered and resolves `T` from it.
    pub fn create(&self, args: A) -> DiResult<ScopedValue<T>> {
        let extra: Vec<Box<dyn Installer>> = vec![Box::new(ParameterInstaller::new(args))];
        let scope = self.current.create_child(self.definition.clone(), extra)?;
        let resolved = scope.build().and_then(|container| container.get::<T>());
        match resolved {
            Ok(value) => Ok(ScopedValue { value, scope }),
            Err(err) => {
                scope.dispose();
                Err(err)
            }
        }
    }
}

impl<A, T> fmt::Debug for ContextFactory<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextFactory")
            .field("definition", &self.definition.name())
            .field("output", &std::any::type_name::<T>())
            .finish()
    }
}

/// A value together with the scope it was resolved from.
///
/// The scope stays alive until [`dispose`](Self::dispose) is called or its
/// parent scope is disposed.
pub struct ScopedValue<T> {
    value: Arc<T>,
    scope: LifetimeScope,
}

impl<T> ScopedValue<T> {
    pub fn value(&self) -> &Arc<T> {
        &self.value
    }

    pub fn scope(&self) -> &LifetimeScope {
        &self.scope
    }

    /// Disposes the scope the value came from.
    pub fn dispose(self) {
        self.scope.dispose();
    }
}

impl<T> Deref for ScopedValue<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}
