//! Engine abstraction: scene objects, placement and components.
//!
//! The factories never talk to an engine directly. They go through
//! [`SceneHost`], which models object identity, activity, parenting and
//! transforms. [`MemoryScene`] is the in-memory implementation used by tests
//! and headless simulations.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

use crate::error::{DiError, DiResult};
use crate::poolable::LifecycleHandle;
use crate::prefab::{InjectContext, Prefab};
use crate::registration::AnyArc;

mod memory;
pub use memory::MemoryScene;

slotmap::new_key_type! {
    /// Handle to an object living in a [`SceneHost`].
    pub struct NodeId;
}

/// World-space position.
pub type Vec3 = Vector3<f32>;
/// Rotation.
pub type Quat = UnitQuaternion<f32>;
/// Rigid transform: translation plus rotation.
pub type Pose = Isometry3<f32>;

/// Builds a pose from a position and a rotation.
pub fn pose(position: Vec3, rotation: Quat) -> Pose {
    Isometry3::from_parts(Translation3::from(position), rotation)
}

/// Where a spawned object ends up.
///
/// The two variants mirror the two `create` families of a factory.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// Place at a world position and rotation, optionally under `parent`.
    World {
        position: Vec3,
        rotation: Quat,
        parent: Option<NodeId>,
    },
    /// Attach to `parent`. With `keep_world_position` the object's world
    /// pose is preserved across the reparent; otherwise its local pose is.
    Parent {
        parent: NodeId,
        keep_world_position: bool,
    },
}

impl Placement {
    /// World placement without a parent.
    pub fn at(position: Vec3, rotation: Quat) -> Self {
        Placement::World { position, rotation, parent: None }
    }

    /// Parent placement.
    pub fn under(parent: NodeId, keep_world_position: bool) -> Self {
        Placement::Parent { parent, keep_world_position }
    }
}

impl Default for Placement {
    fn default() -> Self {
        Placement::at(Vec3::zeros(), Quat::identity())
    }
}

/// A live component attached to a scene object.
#[derive(Clone)]
pub struct ComponentInstance {
    value: AnyArc,
    type_id: TypeId,
    type_name: &'static str,
    lifecycle: Option<LifecycleHandle>,
}

impl ComponentInstance {
    pub(crate) fn new<C: Send + Sync + 'static>(value: Arc<C>, lifecycle: Option<LifecycleHandle>) -> Self {
        Self {
            value: value as AnyArc,
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
            lifecycle,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The component as `Arc<dyn Any>`.
    pub fn value(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.value
    }

    /// The component as `C`, if it is one.
    pub fn downcast<C: Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.value.clone().downcast::<C>().ok()
    }

    /// Spawn/despawn capability, when the template declared one.
    pub fn lifecycle(&self) -> Option<&LifecycleHandle> {
        self.lifecycle.as_ref()
    }

    /// Allocation identity of the component.
    pub fn identity(&self) -> usize {
        crate::poolable::identity_of(&self.value)
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("type_name", &self.type_name)
            .field("poolable", &self.lifecycle.is_some())
            .finish()
    }
}

/// The engine surface the factories consume.
///
/// Implementations must be usable from behind an `Arc` and should never
/// call back into factories while holding internal locks: component
/// constructors run arbitrary user code, including container resolution.
pub trait SceneHost: Send + Sync + 'static {
    /// Clones `prefab` into a new root object, constructs its components
    /// (with `inject` available for injection), then applies `placement`.
    fn instantiate(&self, prefab: &Prefab, placement: &Placement, inject: &InjectContext<'_>) -> DiResult<NodeId>;

    /// Re-applies a placement to an existing object.
    fn place(&self, node: NodeId, placement: &Placement) -> DiResult<()>;

    fn set_active(&self, node: NodeId, active: bool) -> DiResult<()>;

    fn is_active(&self, node: NodeId) -> bool;

    /// Reparents `node`. `None` detaches it to the scene root.
    fn set_parent(&self, node: NodeId, parent: Option<NodeId>, keep_world_position: bool) -> DiResult<()>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Destroys `node` and all of its descendants. Unknown nodes are ignored.
    fn destroy(&self, node: NodeId);

    fn is_alive(&self, node: NodeId) -> bool;

    /// Creates a fresh, empty, active root object.
    fn create_root(&self, name: &str) -> NodeId;

    fn name(&self, node: NodeId) -> Option<String>;

    fn components(&self, node: NodeId) -> Vec<ComponentInstance>;

    fn find_component(&self, node: NodeId, type_id: TypeId) -> Option<ComponentInstance> {
        self.components(node).into_iter().find(|c| c.type_id() == type_id)
    }

    fn world_pose(&self, node: NodeId) -> Option<Pose>;

    fn world_position(&self, node: NodeId) -> Option<Vec3> {
        self.world_pose(node).map(|p| p.translation.vector)
    }
}

pub(crate) fn dead_node(host: &dyn SceneHost, node: NodeId) -> DiError {
    DiError::DeadNode(host.name(node).unwrap_or_else(|| format!("{node:?}")))
}
