use std::collections::HashMap;

use parking_lot::Mutex;
use slotmap::SlotMap;

use super::{dead_node, pose, ComponentInstance, NodeId, Placement, Pose, SceneHost};
use crate::error::{DiError, DiResult};
use crate::prefab::{InjectContext, Prefab};

struct Node {
    name: String,
    local: Pose,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    active: bool,
    components: Vec<ComponentInstance>,
}

impl Node {
    fn new(name: String, local: Pose, components: Vec<ComponentInstance>) -> Self {
        Self { name, local, parent: None, children: Vec::new(), active: true, components }
    }
}

#[derive(Default)]
struct SceneState {
    nodes: SlotMap<NodeId, Node>,
    instantiated: HashMap<String, usize>,
    destroyed: usize,
}

impl SceneState {
    fn world(&self, node: NodeId) -> Option<Pose> {
        let entry = self.nodes.get(node)?;
        match entry.parent {
            Some(parent) => Some(self.world(parent)? * entry.local),
            None => Some(entry.local),
        }
    }

    fn is_ancestor(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(candidate);
        while let Some(id) = current {
            if id == node {
                return true;
            }
            current = self.nodes.get(id).and_then(|n| n.parent);
        }
        false
    }

    fn reparent(&mut self, node: NodeId, parent: Option<NodeId>, keep_world: bool) -> DiResult<()> {
        if !self.nodes.contains_key(node) {
            return Err(DiError::DeadNode(format!("{node:?}")));
        }
        if let Some(parent) = parent {
            if !self.nodes.contains_key(parent) {
                return Err(DiError::DeadNode(format!("{parent:?}")));
            }
            if self.is_ancestor(parent, node) {
                return Err(DiError::Configuration(format!(
                    "cannot parent {node:?} under its own descendant {parent:?}"
                )));
            }
        }

        let world = self.world(node);
        let parent_world = match parent {
            Some(p) => self.world(p),
            None => Some(Pose::identity()),
        };

        let old_parent = self.nodes[node].parent;
        if let Some(old) = old_parent.and_then(|p| self.nodes.get_mut(p)) {
            old.children.retain(|c| *c != node);
        }
        if let Some(new) = parent.and_then(|p| self.nodes.get_mut(p)) {
            new.children.push(node);
        }

        let entry = &mut self.nodes[node];
        entry.parent = parent;
        if keep_world {
            if let (Some(world), Some(parent_world)) = (world, parent_world) {
                entry.local = parent_world.inverse() * world;
            }
        }
        Ok(())
    }

    fn place(&mut self, node: NodeId, placement: &Placement) -> DiResult<()> {
        match placement {
            Placement::World { position, rotation, parent } => {
                self.reparent(node, *parent, false)?;
                let parent_world = match parent {
                    Some(p) => self.world(*p).unwrap_or_else(Pose::identity),
                    None => Pose::identity(),
                };
                self.nodes[node].local = parent_world.inverse() * pose(*position, *rotation);
                Ok(())
            }
            Placement::Parent { parent, keep_world_position } => {
                self.reparent(node, Some(*parent), *keep_world_position)
            }
        }
    }

    /// Removes `node` and its subtree, returning the removed nodes so their
    /// components can be dropped outside the lock.
    fn remove_subtree(&mut self, node: NodeId) -> Vec<Node> {
        let Some(parent) = self.nodes.get(node).map(|n| n.parent) else {
            return Vec::new();
        };
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p)) {
            parent.children.retain(|c| *c != node);
        }

        let mut removed = Vec::new();
        let mut pending = vec![node];
        while let Some(id) = pending.pop() {
            if let Some(entry) = self.nodes.remove(id) {
                pending.extend(entry.children.iter().copied());
                removed.push(entry);
            }
        }
        self.destroyed += removed.len();
        removed
    }
}

/// In-memory [`SceneHost`].
///
/// Nodes live in a slot map, so a destroyed [`NodeId`] never aliases a newer
/// node. World poses are composed from local poses up the parent chain.
///
/// ```rust
/// use ferrous_prefab::{MemoryScene, Placement, Prefab, SceneHost, Vec3, Quat};
/// use ferrous_prefab::InjectContext;
///
/// let scene = MemoryScene::new();
/// let prefab = Prefab::builder("Crate").build();
/// let node = scene
///     .instantiate(&prefab, &Placement::at(Vec3::new(1.0, 2.0, 3.0), Quat::identity()), &InjectContext::empty())
///     .unwrap();
/// assert_eq!(scene.world_position(node), Some(Vec3::new(1.0, 2.0, 3.0)));
/// assert_eq!(scene.instantiated_count("Crate"), 1);
/// ```
#[derive(Default)]
pub struct MemoryScene {
    state: Mutex<SceneState>,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times a prefab with this name was instantiated.
    pub fn instantiated_count(&self, prefab_name: &str) -> usize {
        self.state.lock().instantiated.get(prefab_name).copied().unwrap_or(0)
    }

    /// Total number of nodes destroyed so far, descendants included.
    pub fn destroyed_count(&self) -> usize {
        self.state.lock().destroyed
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.state.lock().nodes.len()
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.state
            .lock()
            .nodes
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn local_pose(&self, node: NodeId) -> Option<Pose> {
        self.state.lock().nodes.get(node).map(|n| n.local)
    }
}

impl SceneHost for MemoryScene {
    fn instantiate(&self, prefab: &Prefab, placement: &Placement, inject: &InjectContext<'_>) -> DiResult<NodeId> {
        // Component constructors may resolve services that spawn in turn
        let mut components = Vec::with_capacity(prefab.components().len());
        for template in prefab.components() {
            components.push(template.instantiate(inject)?);
        }

        let mut state = self.state.lock();
        let node = state
            .nodes
            .insert(Node::new(prefab.name().to_string(), *prefab.pose(), components));
        *state.instantiated.entry(prefab.name().to_string()).or_insert(0) += 1;

        if let Err(err) = state.place(node, placement) {
            let removed = state.remove_subtree(node);
            drop(state);
            drop(removed);
            return Err(err);
        }
        Ok(node)
    }

    fn place(&self, node: NodeId, placement: &Placement) -> DiResult<()> {
        self.state.lock().place(node, placement)
    }

    fn set_active(&self, node: NodeId, active: bool) -> DiResult<()> {
        let found = match self.state.lock().nodes.get_mut(node) {
            Some(entry) => {
                entry.active = active;
                true
            }
            None => false,
        };
        if found {
            Ok(())
        } else {
            Err(dead_node(self, node))
        }
    }

    fn is_active(&self, node: NodeId) -> bool {
        self.state.lock().nodes.get(node).is_some_and(|n| n.active)
    }

    fn set_parent(&self, node: NodeId, parent: Option<NodeId>, keep_world_position: bool) -> DiResult<()> {
        self.state.lock().reparent(node, parent, keep_world_position)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.state.lock().nodes.get(node).and_then(|n| n.parent)
    }

    fn destroy(&self, node: NodeId) {
        let removed = self.state.lock().remove_subtree(node);
        drop(removed);
    }

    fn is_alive(&self, node: NodeId) -> bool {
        self.state.lock().nodes.contains_key(node)
    }

    fn create_root(&self, name: &str) -> NodeId {
        self.state
            .lock()
            .nodes
            .insert(Node::new(name.to_string(), Pose::identity(), Vec::new()))
    }

    fn name(&self, node: NodeId) -> Option<String> {
        self.state.lock().nodes.get(node).map(|n| n.name.clone())
    }

    fn components(&self, node: NodeId) -> Vec<ComponentInstance> {
        self.state
            .lock()
            .nodes
            .get(node)
            .map(|n| n.components.clone())
            .unwrap_or_default()
    }

    fn world_pose(&self, node: NodeId) -> Option<Pose> {
        self.state.lock().world(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Quat, Vec3};

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).norm() < 1e-4
    }

    fn spawn(scene: &MemoryScene, name: &str, placement: Placement) -> NodeId {
        let prefab = Prefab::builder(name).build();
        scene.instantiate(&prefab, &placement, &InjectContext::empty()).unwrap()
    }

    #[test]
    fn world_pose_composes_through_parents() {
        let scene = MemoryScene::new();
        let parent = spawn(&scene, "Parent", Placement::at(Vec3::new(10.0, 0.0, 0.0), Quat::identity()));
        let child = spawn(
            &scene,
            "Child",
            Placement::World { position: Vec3::new(12.0, 1.0, 0.0), rotation: Quat::identity(), parent: Some(parent) },
        );

        assert_eq!(scene.parent(child), Some(parent));
        assert!(approx(scene.world_position(child).unwrap(), Vec3::new(12.0, 1.0, 0.0)));
        assert!(approx(scene.local_pose(child).unwrap().translation.vector, Vec3::new(2.0, 1.0, 0.0)));
    }

    #[test]
    fn reparent_keeps_world_or_local_pose() {
        let scene = MemoryScene::new();
        let anchor = spawn(&scene, "Anchor", Placement::at(Vec3::new(5.0, 0.0, 0.0), Quat::identity()));
        let a = spawn(&scene, "A", Placement::at(Vec3::new(1.0, 0.0, 0.0), Quat::identity()));
        let b = spawn(&scene, "B", Placement::at(Vec3::new(1.0, 0.0, 0.0), Quat::identity()));

        scene.set_parent(a, Some(anchor), true).unwrap();
        scene.set_parent(b, Some(anchor), false).unwrap();

        assert!(approx(scene.world_position(a).unwrap(), Vec3::new(1.0, 0.0, 0.0)));
        assert!(approx(scene.world_position(b).unwrap(), Vec3::new(6.0, 0.0, 0.0)));
        assert_eq!(scene.children(anchor), vec![a, b]);
    }

    #[test]
    fn destroy_removes_the_whole_subtree() {
        let scene = MemoryScene::new();
        let root = scene.create_root("Pool");
        let child = spawn(&scene, "Bullet", Placement::under(root, false));
        let grandchild = spawn(&scene, "Trail", Placement::under(child, false));

        scene.destroy(root);
        assert!(!scene.is_alive(root));
        assert!(!scene.is_alive(child));
        assert!(!scene.is_alive(grandchild));
        assert_eq!(scene.destroyed_count(), 3);
        assert_eq!(scene.node_count(), 0);
    }

    #[test]
    fn cannot_parent_under_descendant() {
        let scene = MemoryScene::new();
        let a = scene.create_root("A");
        let b = spawn(&scene, "B", Placement::under(a, false));
        assert!(matches!(scene.set_parent(a, Some(b), false), Err(DiError::Configuration(_))));
    }

    #[test]
    fn dead_nodes_are_reported() {
        let scene = MemoryScene::new();
        let a = scene.create_root("A");
        scene.destroy(a);
        assert!(matches!(scene.set_active(a, false), Err(DiError::DeadNode(_))));
        assert!(!scene.is_active(a));
    }
}
