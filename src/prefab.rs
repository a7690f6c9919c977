//! Prefabs: immutable prototypes that factories clone into the scene.

use std::any::TypeId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::collection::ScopeDefinition;
use crate::error::{DiError, DiResult};
use crate::params::Args;
use crate::poolable::{LifecycleHandle, Poolable};
use crate::scene::{pose, ComponentInstance, Pose, Quat, Vec3};
use crate::traits::Resolver;
use crate::Container;

/// Identity of a [`Prefab`], used as the pool key.
///
/// Ids are drawn from a process-wide counter and never reused, so a pool
/// keyed by a dropped prefab can never be picked up by a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrefabId(u64);

static NEXT_PREFAB_ID: AtomicU64 = AtomicU64::new(1);

/// A cheap-to-clone, immutable object prototype.
///
/// A prefab carries a name, a local pose, component templates and optionally
/// a [`ScopeDefinition`]. Prefabs with a scope definition get their own child
/// container on every spawn.
///
/// Two clones of the same prefab share one [`PrefabId`]; two prefabs built
/// separately never do, even with identical contents.
#[derive(Clone)]
pub struct Prefab {
    inner: Arc<PrefabInner>,
}

struct PrefabInner {
    id: PrefabId,
    name: String,
    pose: Pose,
    components: Vec<ComponentTemplate>,
    scope: Option<ScopeDefinition>,
}

impl Prefab {
    pub fn builder(name: impl Into<String>) -> PrefabBuilder {
        PrefabBuilder {
            name: name.into(),
            pose: Pose::identity(),
            components: Vec::new(),
            scope: None,
        }
    }

    pub fn id(&self) -> PrefabId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn pose(&self) -> &Pose {
        &self.inner.pose
    }

    pub fn components(&self) -> &[ComponentTemplate] {
        &self.inner.components
    }

    pub fn scope(&self) -> Option<&ScopeDefinition> {
        self.inner.scope.as_ref()
    }
}

impl fmt::Debug for Prefab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prefab")
            .field("name", &self.inner.name)
            .field("components", &self.inner.components)
            .field("scope", &self.inner.scope)
            .finish()
    }
}

/// Builder for [`Prefab`].
pub struct PrefabBuilder {
    name: String,
    pose: Pose,
    components: Vec<ComponentTemplate>,
    scope: Option<ScopeDefinition>,
}

impl PrefabBuilder {
    /// Local pose applied when the prefab is instantiated under a parent
    /// without an explicit position.
    pub fn pose(mut self, position: Vec3, rotation: Quat) -> Self {
        self.pose = pose(position, rotation);
        self
    }

    pub fn component(mut self, template: ComponentTemplate) -> Self {
        self.components.push(template);
        self
    }

    /// Turns the prefab into a scoped prefab.
    pub fn scope(mut self, definition: ScopeDefinition) -> Self {
        self.scope = Some(definition);
        self
    }

    pub fn build(self) -> Prefab {
        Prefab {
            inner: Arc::new(PrefabInner {
                id: PrefabId(NEXT_PREFAB_ID.fetch_add(1, Ordering::Relaxed)),
                name: self.name,
                pose: self.pose,
                components: self.components,
                scope: self.scope,
            }),
        }
    }
}

type ComponentCtor = Arc<dyn Fn(&InjectContext<'_>) -> DiResult<ComponentInstance> + Send + Sync>;

/// Recipe for one component of a prefab.
///
/// ```rust
/// use ferrous_prefab::{ComponentTemplate, Prefab};
///
/// struct Health(u32);
///
/// let prefab = Prefab::builder("Enemy")
///     .component(ComponentTemplate::new(|_| Ok(Health(100))))
///     .build();
/// assert_eq!(prefab.components().len(), 1);
/// ```
#[derive(Clone)]
pub struct ComponentTemplate {
    type_id: TypeId,
    type_name: &'static str,
    ctor: ComponentCtor,
}

impl ComponentTemplate {
    /// A plain component.
    pub fn new<C, F>(ctor: F) -> Self
    where
        C: Send + Sync + 'static,
        F: Fn(&InjectContext<'_>) -> DiResult<C> + Send + Sync + 'static,
    {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
            ctor: Arc::new(move |inject: &InjectContext| -> DiResult<ComponentInstance> {
                Ok(ComponentInstance::new(Arc::new(ctor(inject)?), None))
            }),
        }
    }

    /// A component that receives spawn notifications with arguments `A` and
    /// despawn notifications.
    pub fn poolable<C, A, F>(ctor: F) -> Self
    where
        C: Poolable<A>,
        A: Args,
        F: Fn(&InjectContext<'_>) -> DiResult<C> + Send + Sync + 'static,
    {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
            ctor: Arc::new(move |inject: &InjectContext| -> DiResult<ComponentInstance> {
                let value = Arc::new(ctor(inject)?);
                let handle = LifecycleHandle::new::<C, A>(value.clone());
                Ok(ComponentInstance::new(value, Some(handle)))
            }),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Constructs a live component. Called by [`SceneHost`](crate::SceneHost)
    /// implementations.
    pub fn instantiate(&self, inject: &InjectContext<'_>) -> DiResult<ComponentInstance> {
        (self.ctor)(inject)
    }
}

impl fmt::Debug for ComponentTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// Injection source for component constructors.
///
/// Holds the container of the scope that spawns the object, if any.
#[derive(Clone, Copy)]
pub struct InjectContext<'a> {
    container: Option<&'a Container>,
}

impl<'a> InjectContext<'a> {
    /// No container: components must construct themselves.
    pub fn empty() -> Self {
        Self { container: None }
    }

    pub fn new(container: Option<&'a Container>) -> Self {
        Self { container }
    }

    pub fn container(&self) -> Option<&'a Container> {
        self.container
    }

    /// Resolves `T` from the spawning scope.
    pub fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        match self.container {
            Some(container) => container.get::<T>(),
            None => Err(DiError::NotFound(std::any::type_name::<T>())),
        }
    }
}
