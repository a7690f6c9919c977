//! Object pools keyed by prefab identity.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::DiResult;
use crate::factory::LifecycleTargets;
use crate::prefab::PrefabId;
use crate::provider::LifetimeScope;
use crate::registration::AnyArc;
use crate::scene::{NodeId, SceneHost};

/// Pool configuration for one factory.
///
/// Defaults pool nothing: `max_count` is 0, so every despawned instance is
/// destroyed.
///
/// With the `serde` feature (on by default) settings can be loaded from
/// configuration assets:
///
/// ```rust
/// # #[cfg(feature = "serde")] {
/// use ferrous_prefab::PoolSettings;
///
/// let settings: PoolSettings =
///     serde_json::from_str(r#"{ "parent_name": "Bullets", "max_count": 32 }"#).unwrap();
/// assert_eq!(settings.prewarm_count, 0);
/// assert_eq!(settings.max_count, 32);
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolSettings {
    /// Name of the object holding inactive instances. Empty means pooled
    /// instances stay unparented.
    pub parent_name: String,
    /// Instances created and parked when the factory starts.
    pub prewarm_count: usize,
    /// Maximum number of inactive instances kept. Active ones don't count.
    pub max_count: usize,
}

impl PoolSettings {
    pub fn new(parent_name: impl Into<String>, prewarm_count: usize, max_count: usize) -> Self {
        Self { parent_name: parent_name.into(), prewarm_count, max_count }
    }

    /// Settings with no pool parent and no prewarm.
    pub fn with_max(max_count: usize) -> Self {
        Self { max_count, ..Self::default() }
    }
}

/// What happened to an instance handed to [`PoolRegistry::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Deactivated and parked for reuse
    Pooled,
    /// Destroyed: the pool was full or no longer configured
    Destroyed,
}

/// A spawned instance that can go back into a pool.
pub(crate) struct PooledInstance {
    pub(crate) output: AnyArc,
    pub(crate) node: NodeId,
    pub(crate) scope: Option<LifetimeScope>,
    pub(crate) targets: Arc<LifecycleTargets>,
}

impl PooledInstance {
    /// Destroys the instance. A scoped instance disposes its scope, which
    /// destroys the root object.
    pub(crate) fn destroy(self, host: &dyn SceneHost) {
        match self.scope {
            Some(scope) => scope.dispose(),
            None => host.destroy(self.node),
        }
    }
}

struct PoolEntry {
    settings: PoolSettings,
    stack: Vec<PooledInstance>,
    parent: Option<NodeId>,
}

impl PoolEntry {
    fn new(settings: PoolSettings) -> Self {
        Self { settings, stack: Vec::new(), parent: None }
    }

    fn has_room(&self) -> bool {
        self.stack.len() < self.settings.max_count
    }

    /// The parent object for parked instances, created on first use.
    fn parent_node(&mut self, host: &dyn SceneHost) -> Option<NodeId> {
        if self.settings.parent_name.is_empty() {
            return None;
        }
        match self.parent {
            Some(parent) if host.is_alive(parent) => Some(parent),
            _ => {
                let parent = host.create_root(&self.settings.parent_name);
                self.parent = Some(parent);
                Some(parent)
            }
        }
    }

    fn destroy(self, host: &dyn SceneHost) -> usize {
        let count = self.stack.len();
        for instance in self.stack.into_iter().rev() {
            instance.destroy(host);
        }
        if let Some(parent) = self.parent {
            host.destroy(parent);
        }
        count
    }
}

/// Pools of inactive instances, one per prefab.
///
/// Each pool is a LIFO stack: the most recently despawned instance is reused
/// first. A registry is normally owned by a single factory; factories that
/// should share pools for the same prefab can be handed one registry
/// explicitly. Every factory sharing a registry must use the registry's host.
///
/// Pools are `Send + Sync`, but spawning and despawning on one pool from
/// several threads at once is not serialized beyond individual operations.
/// Callers drive a pool from one logical thread.
pub struct PoolRegistry {
    host: Arc<dyn SceneHost>,
    pools: Mutex<HashMap<PrefabId, PoolEntry>>,
}

impl PoolRegistry {
    pub fn new(host: Arc<dyn SceneHost>) -> Self {
        Self { host, pools: Mutex::new(HashMap::new()) }
    }

    pub fn host(&self) -> &Arc<dyn SceneHost> {
        &self.host
    }

    /// Sets or clears the settings of a pool.
    ///
    /// Any change discards the previous pool: parked instances and the pool
    /// parent are destroyed, and the new pool starts empty. Re-applying equal
    /// settings is a no-op. Returns true if something changed.
    pub fn configure(&self, key: PrefabId, settings: Option<PoolSettings>) -> bool {
        let evicted = {
            let mut pools = self.pools.lock();
            match (pools.get(&key), &settings) {
                (Some(entry), Some(new)) if entry.settings == *new => return false,
                (None, None) => return false,
                _ => {}
            }
            let evicted = pools.remove(&key);
            if let Some(settings) = settings {
                pools.insert(key, PoolEntry::new(settings));
            }
            evicted
        };

        if let Some(entry) = evicted {
            let destroyed = entry.destroy(self.host.as_ref());
            tracing::debug!(?key, destroyed, "pool settings changed; previous pool discarded");
        }
        true
    }

    pub fn settings(&self, key: PrefabId) -> Option<PoolSettings> {
        self.pools.lock().get(&key).map(|entry| entry.settings.clone())
    }

    pub fn is_pooling(&self, key: PrefabId) -> bool {
        self.pools.lock().contains_key(&key)
    }

    /// Number of inactive instances parked in the pool.
    pub fn pooled_count(&self, key: PrefabId) -> usize {
        self.pools.lock().get(&key).map_or(0, |entry| entry.stack.len())
    }

    /// The pool parent object, if one has been created.
    pub fn parent_node(&self, key: PrefabId) -> Option<NodeId> {
        self.pools.lock().get(&key).and_then(|entry| entry.parent)
    }

    /// Takes the most recently parked instance. Instances whose object was
    /// destroyed behind the pool's back are dropped.
    pub(crate) fn pop(&self, key: PrefabId) -> Option<PooledInstance> {
        let mut stale = Vec::new();
        let found = {
            let mut pools = self.pools.lock();
            let entry = pools.get_mut(&key)?;
            loop {
                match entry.stack.pop() {
                    Some(instance) if self.host.is_alive(instance.node) => break Some(instance),
                    Some(instance) => stale.push(instance),
                    None => break None,
                }
            }
        };
        if !stale.is_empty() {
            tracing::debug!(?key, count = stale.len(), "dropped pooled instances whose objects were destroyed");
            for instance in stale {
                instance.destroy(self.host.as_ref());
            }
        }
        found
    }

    /// Returns an instance to its pool, or destroys it when the pool is full
    /// or no longer configured.
    pub(crate) fn release(&self, key: PrefabId, instance: PooledInstance) -> DiResult<Release> {
        let parking = {
            let mut pools = self.pools.lock();
            match pools.get_mut(&key) {
                Some(entry) if entry.has_room() => Some(entry.parent_node(self.host.as_ref())),
                _ => None,
            }
        };

        let Some(parent) = parking else {
            instance.destroy(self.host.as_ref());
            return Ok(Release::Destroyed);
        };

        if let Err(err) = self.park(&instance, parent) {
            instance.destroy(self.host.as_ref());
            return Err(err);
        }

        let overflow = {
            let mut pools = self.pools.lock();
            match pools.get_mut(&key) {
                Some(entry) if entry.has_room() => {
                    entry.stack.push(instance);
                    None
                }
                _ => Some(instance),
            }
        };

        match overflow {
            None => Ok(Release::Pooled),
            Some(instance) => {
                instance.destroy(self.host.as_ref());
                Ok(Release::Destroyed)
            }
        }
    }

    fn park(&self, instance: &PooledInstance, parent: Option<NodeId>) -> DiResult<()> {
        self.host.set_active(instance.node, false)?;
        self.host.set_parent(instance.node, parent, true)
    }

    /// Removes the pool entirely, destroying parked instances and the pool
    /// parent. Returns the number of instances destroyed.
    pub fn teardown(&self, key: PrefabId) -> usize {
        let removed = self.pools.lock().remove(&key);
        removed.map_or(0, |entry| entry.destroy(self.host.as_ref()))
    }
}
