//! Container module for dependency injection.
//!
//! This module contains the built [`Container`], the [`LifetimeScope`] that
//! owns one, and the [`ResolverContext`] handed to factories.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::internal::{DisposeBag, ResolutionGuard};
use crate::poolable::LifecycleHandle;
use crate::registration::{AnyArc, Binding, Registration, Registry};
use crate::traits::{EntryPoint, Resolver, ResolverCore};
use crate::{DiError, DiResult, Key, Lifetime};

pub mod context;
pub mod scope;
pub use context::ResolverContext;
pub use scope::*;

/// A built, immutable set of registrations plus its instance caches.
///
/// Containers form a hierarchy. Lookups fall back to the parent when a key is
/// not registered locally; the [`Lifetime`] of the registration found decides
/// where the instance is cached.
///
/// Cloning is cheap and yields a handle to the same container.
///
/// # Examples
///
/// ```
/// use ferrous_prefab::{ContainerBuilder, Lifetime, Resolver};
///
/// struct Database { url: String }
/// struct UserService { db: std::sync::Arc<Database> }
///
/// let mut root = ContainerBuilder::new();
/// root.register_instance(Database { url: "postgres://localhost".to_string() });
/// let root = root.build().unwrap();
///
/// let mut child = ContainerBuilder::new();
/// child.register::<UserService, _>(Lifetime::Transient, |r| {
///     Ok(UserService { db: r.get::<Database>()? })
/// });
/// let child = child.build_with_parent(Some(&root)).unwrap();
///
/// assert_eq!(child.get_required::<UserService>().db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    name: String,
    registry: Registry,
    parent: Option<Container>,
    /// Scoped instances keyed by (owning container, registration index)
    scoped: Mutex<HashMap<(usize, usize), AnyArc>>,
    disposers: Mutex<DisposeBag>,
    disposed: AtomicBool,
}

impl Container {
    pub(crate) fn new(name: String, registry: Registry, parent: Option<Container>) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                name,
                registry,
                parent,
                scoped: Mutex::new(HashMap::new()),
                disposers: Mutex::new(DisposeBag::default()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Diagnostic name, usually the owning scope's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The parent container, if any.
    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    /// True once [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Whether `T` is resolvable from this container or an ancestor.
    pub fn contains<T: 'static>(&self) -> bool {
        self.find(&crate::key::key_of_type::<T>()).is_some()
    }

    /// Returns true if both handles point to the same container.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[inline]
    fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Runs every disposal hook in LIFO order and drops cached instances.
    ///
    /// Idempotent. Resolving from a disposed container fails with
    /// [`DiError::Disposed`].
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut bag = std::mem::take(&mut *self.inner.disposers.lock());
        bag.run_all_sync_reverse();

        let scoped = std::mem::take(&mut *self.inner.scoped.lock());
        drop(scoped);
        for registration in &self.inner.registry.entries {
            let cached = registration.singleton.lock().take();
            drop(cached);
        }
        tracing::trace!(container = %self.inner.name, "container disposed");
    }

    fn ensure_alive(&self) -> DiResult<()> {
        if self.is_disposed() {
            return Err(DiError::Disposed(self.inner.name.clone()));
        }
        Ok(())
    }

    /// Finds the nearest container owning a single binding for `key`.
    fn find(&self, key: &Key) -> Option<(&Container, &Binding)> {
        let mut current = Some(self);
        while let Some(container) = current {
            if let Some(binding) = container.inner.registry.get(key) {
                return Some((container, binding));
            }
            current = container.inner.parent.as_ref();
        }
        None
    }

    /// This container and its ancestors, root first.
    fn lineage(&self) -> Vec<&Container> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(container) = current {
            chain.push(container);
            current = container.inner.parent.as_ref();
        }
        chain.reverse();
        chain
    }

    /// Produces the raw instance of `owner`'s registration `index`, honoring
    /// its lifetime relative to this (resolving) container.
    fn instance(&self, owner: &Container, index: usize) -> DiResult<AnyArc> {
        let registration = owner
            .inner
            .registry
            .entries
            .get(index)
            .ok_or(DiError::NotFound("registration"))?;

        match registration.lifetime {
            Lifetime::Singleton => {
                owner.ensure_alive()?;
                if let Some(value) = registration.singleton.lock().as_ref() {
                    return Ok(value.clone());
                }
                // Never hold the slot lock while the constructor runs
                let value = owner.construct(registration)?;
                let mut slot = registration.singleton.lock();
                Ok(slot.get_or_insert(value).clone())
            }
            Lifetime::Scoped => {
                let slot_key = (owner.id(), index);
                if let Some(value) = self.inner.scoped.lock().get(&slot_key) {
                    return Ok(value.clone());
                }
                let value = self.construct(registration)?;
                let mut scoped = self.inner.scoped.lock();
                Ok(scoped.entry(slot_key).or_insert(value).clone())
            }
            Lifetime::Transient => self.construct(registration),
        }
    }

    fn construct(&self, registration: &Registration) -> DiResult<AnyArc> {
        let ctx = ResolverContext::new(self, Some(&*registration.parameters));
        (registration.ctor)(&ctx)
    }

    /// Resolves every own registration flagged as an entry point, in
    /// registration order.
    pub(crate) fn entry_points(&self) -> DiResult<Vec<Arc<dyn EntryPoint>>> {
        let mut started = Vec::new();
        for (index, registration) in self.inner.registry.entries.iter().enumerate() {
            if let Some(cast) = &registration.entry_point {
                let raw = self.instance(self, index)?;
                let entry = cast(&raw).ok_or(DiError::TypeMismatch(registration.type_name))?;
                started.push(entry);
            }
        }
        Ok(started)
    }

    /// Builds the explicit lifecycle registry: one handle per capability
    /// declared on this container's own registrations, in registration order.
    pub(crate) fn lifecycle_handles(&self) -> DiResult<Vec<LifecycleHandle>> {
        let mut handles = Vec::new();
        for (index, registration) in self.inner.registry.entries.iter().enumerate() {
            if registration.lifecycle.is_empty() {
                continue;
            }
            let raw = self.instance(self, index)?;
            for cast in &registration.lifecycle {
                let handle = cast(&raw).ok_or(DiError::TypeMismatch(registration.type_name))?;
                handles.push(handle);
            }
        }
        Ok(handles)
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("=== Container '{}' ===\n", self.inner.name));
        s.push_str("Registrations:\n");
        for (i, r) in self.inner.registry.entries.iter().enumerate() {
            s.push_str(&format!(
                "  #{} {} ({:?}) {:?}{}\n",
                i,
                r.type_name,
                r.impl_id,
                r.lifetime,
                if r.lifecycle.is_empty() { "" } else { " [poolable]" }
            ));
        }
        s.push_str("Single Bindings:\n");
        for (k, b) in &self.inner.registry.single {
            s.push_str(&format!("  {} -> #{}\n", k.display_name(), b.index));
        }
        s.push_str("Multi Bindings:\n");
        for (k, bs) in &self.inner.registry.many {
            for b in bs {
                s.push_str(&format!("  MultiTrait({}) -> #{}\n", k, b.index));
            }
        }
        if let Some(parent) = &self.inner.parent {
            s.push_str(&format!("Parent: '{}'\n", parent.name()));
        }
        s
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.inner.name)
            .field("registrations", &self.inner.registry.entries.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl ResolverCore for Container {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.ensure_alive()?;
        let _guard = ResolutionGuard::enter(self.id(), key.display_name())?;
        let (owner, binding) = self.find(key).ok_or(DiError::NotFound(key.display_name()))?;
        let raw = self.instance(owner, binding.index)?;
        binding.project(raw)
    }

    fn resolve_many(&self, key: &Key) -> DiResult<Vec<AnyArc>> {
        let Key::Trait(trait_name) = key else {
            return Ok(Vec::new());
        };
        self.ensure_alive()?;
        let _guard = ResolutionGuard::enter(self.id(), *trait_name)?;

        let mut results = Vec::new();
        for owner in self.lineage() {
            if let Some(bindings) = owner.inner.registry.many.get(trait_name) {
                for binding in bindings {
                    let raw = self.instance(owner, binding.index)?;
                    results.push(binding.project(raw)?);
                }
            }
        }
        Ok(results)
    }

    fn push_sync_disposer(&self, f: Box<dyn FnOnce() + Send>) {
        self.inner.disposers.lock().push_sync(f);
    }
}

impl Resolver for Container {}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if !self.disposed.load(Ordering::Acquire) && !self.disposers.get_mut().is_empty() {
            tracing::warn!(
                container = %self.name,
                "container dropped with undisposed resources; dispose its scope before dropping"
            );
        }
    }
}
