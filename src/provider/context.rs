//! Resolver context for dependency injection.
//!
//! This module contains the ResolverContext type which provides
//! the interface for factory functions to resolve dependencies.

use std::any::Any;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::registration::Parameters;
use crate::traits::{Resolver, ResolverCore};

/// Context passed to factory functions for resolving dependencies.
///
/// Wraps the resolving container and the registration's named parameters
/// (attached with [`RegistrationBuilder::with_parameter`](crate::RegistrationBuilder::with_parameter)).
///
/// # Examples
///
/// ```
/// use ferrous_prefab::{ContainerBuilder, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database>, table: Arc<&'static str> }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(Database { url: "postgres://localhost".to_string() });
/// builder
///     .register::<UserService, _>(Lifetime::Transient, |resolver| {
///         Ok(UserService {
///             db: resolver.get::<Database>()?,
///             table: resolver.parameter::<&'static str>("table")?,
///         })
///     })
///     .with_parameter("table", "users");
///
/// let container = builder.build().unwrap();
/// let service = container.get_required::<UserService>();
/// assert_eq!(service.db.url, "postgres://localhost");
/// assert_eq!(*service.table, "users");
/// ```
pub struct ResolverContext<'a> {
    resolver: &'a dyn ResolverCore,
    parameters: Option<&'a Parameters>,
}

impl<'a> ResolverContext<'a> {
    /// Creates a new ResolverContext wrapping the given resolver.
    pub(crate) fn new<T>(resolver: &'a T, parameters: Option<&'a Parameters>) -> Self
    where
        T: ResolverCore,
    {
        Self { resolver, parameters }
    }

    /// Returns the named parameter attached to the registration being built.
    pub fn parameter<T: Send + Sync + 'static>(&self, name: &'static str) -> DiResult<Arc<T>> {
        let value = self
            .parameters
            .and_then(|params| params.get(name))
            .ok_or(DiError::NotFound(name))?;
        value
            .clone()
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }
}

impl<'a> ResolverCore for ResolverContext<'a> {
    fn resolve_any(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>> {
        self.resolver.resolve_any(key)
    }

    fn resolve_many(&self, key: &Key) -> DiResult<Vec<Arc<dyn Any + Send + Sync>>> {
        self.resolver.resolve_many(key)
    }

    fn push_sync_disposer(&self, f: Box<dyn FnOnce() + Send>) {
        self.resolver.push_sync_disposer(f);
    }
}

impl<'a> Resolver for ResolverContext<'a> {}
