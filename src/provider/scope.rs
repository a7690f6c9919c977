//! Lifetime scopes: a container plus the scene object that owns it.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::collection::{ContainerBuilder, Installer, ScopeDefinition};
use crate::poolable::LifecycleHandle;
use crate::prefab::{InjectContext, Prefab};
use crate::scene::{NodeId, Placement, SceneHost};
use crate::{Container, DiError, DiResult, ScopePhase};

/// A node in the scope tree.
///
/// A scope is created `Unbuilt`, runs its installers exactly once in
/// [`build`](Self::build), and is torn down by [`dispose`](Self::dispose),
/// which also disposes its child scopes and destroys its root object.
///
/// Every scope registers two things into its own container before the
/// installers run: a [`CurrentScope`] handle and, when it has one, the
/// [`SceneHost`] (as `dyn SceneHost`). Factories resolve both.
///
/// # Examples
///
/// ```rust
/// use ferrous_prefab::{installer_fn, LifetimeScope, Resolver, ScopeDefinition, ScopePhase};
///
/// let project = LifetimeScope::root(
///     None,
///     ScopeDefinition::new("Project").with_installer(installer_fn(|b| {
///         b.register_instance(String::from("settings"));
///         Ok(())
///     })),
/// );
/// project.build().unwrap();
///
/// let level = project.create_child(ScopeDefinition::new("Level"), Vec::new()).unwrap();
/// let container = level.build().unwrap();
/// assert_eq!(&*container.get_required::<String>(), "settings");
///
/// project.dispose();
/// assert_eq!(level.phase(), ScopePhase::Disposed);
/// ```
#[derive(Clone)]
pub struct LifetimeScope {
    inner: Arc<ScopeInner>,
}

pub(crate) struct ScopeInner {
    name: String,
    parent: Option<LifetimeScope>,
    host: Option<Arc<dyn SceneHost>>,
    root_node: Option<NodeId>,
    definition: ScopeDefinition,
    state: Mutex<ScopeState>,
    /// Live children, released again when they are disposed.
    children: Mutex<Vec<LifetimeScope>>,
}

enum ScopeState {
    Unbuilt { extra: Vec<Box<dyn Installer>> },
    Building,
    Built { container: Container, lifecycle: Arc<[LifecycleHandle]> },
    Disposed,
}

impl ScopeState {
    fn phase(&self) -> ScopePhase {
        match self {
            ScopeState::Unbuilt { .. } => ScopePhase::Unbuilt,
            ScopeState::Building => ScopePhase::Building,
            ScopeState::Built { .. } => ScopePhase::Built,
            ScopeState::Disposed => ScopePhase::Disposed,
        }
    }
}

impl LifetimeScope {
    fn new_scope(
        parent: Option<&LifetimeScope>,
        host: Option<Arc<dyn SceneHost>>,
        root_node: Option<NodeId>,
        definition: ScopeDefinition,
        extra: Vec<Box<dyn Installer>>,
    ) -> Self {
        let scope = LifetimeScope {
            inner: Arc::new(ScopeInner {
                name: definition.name().to_string(),
                parent: parent.cloned(),
                host,
                root_node,
                definition,
                state: Mutex::new(ScopeState::Unbuilt { extra }),
                children: Mutex::new(Vec::new()),
            }),
        };
        if let Some(parent) = parent {
            parent.inner.children.lock().push(scope.clone());
        }
        scope
    }

    /// A parentless, object-less scope such as the project-wide root.
    pub fn root(host: Option<Arc<dyn SceneHost>>, definition: ScopeDefinition) -> Self {
        Self::new_scope(None, host, None, definition, Vec::new())
    }

    /// Instantiates a scoped prefab without a parent scope.
    ///
    /// The root object is created and placed; the scope is left `Unbuilt`.
    pub fn instantiate(
        host: Arc<dyn SceneHost>,
        prefab: &Prefab,
        placement: &Placement,
        extra: Vec<Box<dyn Installer>>,
    ) -> DiResult<Self> {
        let definition = scope_of(prefab)?;
        let node = host.instantiate(prefab, placement, &InjectContext::empty())?;
        Ok(Self::new_scope(None, Some(host), Some(node), definition, extra))
    }

    /// Creates an object-less child scope.
    pub fn create_child(&self, definition: ScopeDefinition, extra: Vec<Box<dyn Installer>>) -> DiResult<Self> {
        self.require_built("create a child scope")?;
        Ok(Self::new_scope(Some(self), self.inner.host.clone(), None, definition, extra))
    }

    /// Instantiates a scoped prefab as a child of this scope.
    ///
    /// Components of the new object are constructed with this scope's
    /// container available for injection. The child is left `Unbuilt`.
    pub fn create_child_from_prefab(
        &self,
        prefab: &Prefab,
        placement: &Placement,
        extra: Vec<Box<dyn Installer>>,
    ) -> DiResult<Self> {
        let definition = scope_of(prefab)?;
        let container = self.require_built("create a child scope")?;
        let host = self.inner.host.clone().ok_or_else(|| {
            DiError::Configuration(format!("scope '{}' has no scene host to instantiate '{}'", self.inner.name, prefab.name()))
        })?;
        let node = host.instantiate(prefab, placement, &InjectContext::new(Some(&container)))?;
        Ok(Self::new_scope(Some(self), Some(host), Some(node), definition, extra))
    }

    /// Runs the definition's installers, then the extra installers passed at
    /// creation, and builds the container.
    ///
    /// Succeeds exactly once. Building twice, or building a disposed scope,
    /// fails with [`DiError::InvalidPhase`]. A failed build disposes the scope.
    pub fn build(&self) -> DiResult<Container> {
        let extra = {
            let mut state = self.inner.state.lock();
            match std::mem::replace(&mut *state, ScopeState::Building) {
                ScopeState::Unbuilt { extra } => extra,
                other => {
                    let phase = other.phase();
                    *state = other;
                    return Err(DiError::InvalidPhase {
                        scope: self.inner.name.clone(),
                        operation: "build",
                        phase,
                    });
                }
            }
        };

        match self.build_container(extra) {
            Ok((container, lifecycle)) => {
                let stored = {
                    let mut state = self.inner.state.lock();
                    if matches!(*state, ScopeState::Building) {
                        *state = ScopeState::Built { container: container.clone(), lifecycle };
                        true
                    } else {
                        false
                    }
                };
                if !stored {
                    // Disposed while building
                    container.dispose();
                    return Err(DiError::Disposed(self.inner.name.clone()));
                }
                tracing::debug!(scope = %self.inner.name, "scope built");
                Ok(container)
            }
            Err(err) => {
                tracing::debug!(scope = %self.inner.name, error = %err, "scope build failed");
                self.dispose();
                Err(err)
            }
        }
    }

    fn build_container(&self, extra: Vec<Box<dyn Installer>>) -> DiResult<(Container, Arc<[LifecycleHandle]>)> {
        let parent = match &self.inner.parent {
            Some(parent) => Some(parent.require_built("build a child scope")?),
            None => None,
        };

        let mut builder = ContainerBuilder::named(self.inner.name.clone());
        builder.register_instance(CurrentScope(Arc::downgrade(&self.inner)));
        if let Some(host) = &self.inner.host {
            builder.register_trait_instance::<dyn SceneHost>(host.clone());
            if let Some(node) = self.inner.root_node {
                builder.attach_root(host.clone(), node);
            }
        }

        self.inner.definition.install(&mut builder)?;
        for installer in &extra {
            installer.install(&mut builder)?;
        }
        drop(extra);

        let container = builder.build_with_parent(parent.as_ref())?;
        match container.lifecycle_handles() {
            Ok(handles) => Ok((container, handles.into())),
            Err(err) => {
                container.dispose();
                Err(err)
            }
        }
    }

    fn require_built(&self, operation: &'static str) -> DiResult<Container> {
        match &*self.inner.state.lock() {
            ScopeState::Built { container, .. } => Ok(container.clone()),
            other => Err(DiError::InvalidPhase {
                scope: self.inner.name.clone(),
                operation,
                phase: other.phase(),
            }),
        }
    }

    /// The built container.
    pub fn container(&self) -> DiResult<Container> {
        self.require_built("resolve")
    }

    /// Spawn/despawn handles of this scope's own registrations, in
    /// registration order.
    pub fn lifecycle_handles(&self) -> DiResult<Arc<[LifecycleHandle]>> {
        match &*self.inner.state.lock() {
            ScopeState::Built { lifecycle, .. } => Ok(lifecycle.clone()),
            other => Err(DiError::InvalidPhase {
                scope: self.inner.name.clone(),
                operation: "read lifecycle handles",
                phase: other.phase(),
            }),
        }
    }

    pub fn phase(&self) -> ScopePhase {
        self.inner.state.lock().phase()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn parent(&self) -> Option<&LifetimeScope> {
        self.inner.parent.as_ref()
    }

    pub fn host(&self) -> Option<&Arc<dyn SceneHost>> {
        self.inner.host.as_ref()
    }

    /// The scene object this scope was instantiated with, if any.
    pub fn root_node(&self) -> Option<NodeId> {
        self.inner.root_node
    }

    pub fn ptr_eq(&self, other: &LifetimeScope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Disposes child scopes (newest first), then this scope's container,
    /// then destroys the root object. Idempotent.
    ///
    /// A parent keeps its children alive until they are disposed, so
    /// dropping every handle to a child does not skip its teardown.
    pub fn dispose(&self) {
        let previous = std::mem::replace(&mut *self.inner.state.lock(), ScopeState::Disposed);
        if matches!(previous, ScopeState::Disposed) {
            return;
        }

        if let Some(parent) = &self.inner.parent {
            parent.inner.children.lock().retain(|child| !child.ptr_eq(self));
        }

        let children = std::mem::take(&mut *self.inner.children.lock());
        for child in children.iter().rev() {
            child.dispose();
        }

        if let ScopeState::Built { container, .. } = previous {
            container.dispose();
        }
        if let (Some(host), Some(node)) = (&self.inner.host, self.inner.root_node) {
            host.destroy(node);
        }
        tracing::debug!(scope = %self.inner.name, "scope disposed");
    }
}

fn scope_of(prefab: &Prefab) -> DiResult<ScopeDefinition> {
    prefab.scope().cloned().ok_or_else(|| {
        DiError::Configuration(format!("prefab '{}' has no scope definition", prefab.name()))
    })
}

impl fmt::Debug for LifetimeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeScope")
            .field("name", &self.inner.name)
            .field("phase", &self.phase())
            .field("root_node", &self.inner.root_node)
            .finish()
    }
}

/// Weak handle to the scope that owns a container, registered into every
/// scope's container.
///
/// ```rust
/// use ferrous_prefab::{CurrentScope, LifetimeScope, Resolver, ScopeDefinition};
///
/// let scope = LifetimeScope::root(None, ScopeDefinition::new("Root"));
/// let container = scope.build().unwrap();
/// let current = container.get_required::<CurrentScope>().get().unwrap();
/// assert!(current.ptr_eq(&scope));
/// ```
#[derive(Clone)]
pub struct CurrentScope(Weak<ScopeInner>);

impl CurrentScope {
    /// The owning scope, unless it has been dropped.
    pub fn get(&self) -> Option<LifetimeScope> {
        self.0.upgrade().map(|inner| LifetimeScope { inner })
    }
}
