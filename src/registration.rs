//! Service registration types.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::DiResult;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::poolable::LifecycleHandle;
use crate::traits::EntryPoint;

// ResolverContext is defined in provider module
pub(crate) use crate::provider::ResolverContext;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Named values attached to a registration with `with_parameter`.
pub(crate) type Parameters = HashMap<&'static str, AnyArc>;

pub(crate) type Ctor = Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

/// Turns the raw instance into the value stored under a capability key.
pub(crate) type Caster = Arc<dyn Fn(AnyArc) -> DiResult<AnyArc> + Send + Sync>;

pub(crate) type LifecycleCaster = Arc<dyn Fn(&AnyArc) -> Option<LifecycleHandle> + Send + Sync>;

pub(crate) type EntryCaster = Arc<dyn Fn(&AnyArc) -> Option<Arc<dyn EntryPoint>> + Send + Sync>;

/// One constructor plus its lifetime. A registration may be exposed under
/// several keys; every key shares the cached instance.
pub(crate) struct Registration {
    pub(crate) lifetime: Lifetime,
    pub(crate) ctor: Ctor,
    /// Concrete type name for diagnostics
    pub(crate) type_name: &'static str,
    #[cfg_attr(not(feature = "diagnostics"), allow(dead_code))]
    pub(crate) impl_id: TypeId,
    pub(crate) parameters: Arc<Parameters>,
    /// Singleton cache, owned by the registering container
    pub(crate) singleton: Mutex<Option<AnyArc>>,
    pub(crate) lifecycle: Vec<LifecycleCaster>,
    pub(crate) entry_point: Option<EntryCaster>,
}

/// Points a key at a registration, optionally through a capability cast.
#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) index: usize,
    pub(crate) cast: Option<Caster>,
}

impl Binding {
    /// Applies the capability cast to a raw instance.
    #[inline]
    pub(crate) fn project(&self, raw: AnyArc) -> DiResult<AnyArc> {
        match &self.cast {
            Some(cast) => cast(raw),
            None => Ok(raw),
        }
    }
}

/// Service registry holding all registrations of one container.
pub(crate) struct Registry {
    /// Registrations in registration order
    pub(crate) entries: Vec<Registration>,
    /// Single bindings, last registration wins
    pub(crate) single: HashMap<Key, Binding>,
    /// Multi-binding registrations (append-only, ordered)
    pub(crate) many: HashMap<&'static str, Vec<Binding>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            single: HashMap::new(),
            many: HashMap::new(),
        }
    }

    /// Appends a registration and returns its index.
    pub(crate) fn push(&mut self, registration: Registration) -> usize {
        self.entries.push(registration);
        self.entries.len() - 1
    }

    pub(crate) fn bind_single(&mut self, key: Key, binding: Binding) {
        self.single.insert(key, binding);
    }

    pub(crate) fn bind_many(&mut self, trait_name: &'static str, binding: Binding) {
        self.many.entry(trait_name).or_default().push(binding);
    }

    #[inline(always)]
    pub(crate) fn get(&self, key: &Key) -> Option<&Binding> {
        self.single.get(key)
    }
}
