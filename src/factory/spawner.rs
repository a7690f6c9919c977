//! Scoped spawning: instantiate a prefab, build its scope, locate the output.

use std::any::TypeId;
use std::sync::Arc;

use crate::collection::Installer;
use crate::prefab::{InjectContext, Prefab};
use crate::provider::LifetimeScope;
use crate::scene::{NodeId, Placement, SceneHost};
use crate::traits::Resolver;
use crate::{Container, DiError, DiResult};

/// Where a spawn's output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    /// Resolved from the spawned scope's container.
    Resolved,
    /// Not registered in the spawned scope; found as a component on the
    /// scope's root object.
    Component,
    /// Unscoped prefab; found as a component on the new object.
    Instantiated,
}

/// One instantiated prefab.
pub struct SpawnResult<T> {
    pub output: Arc<T>,
    pub node: NodeId,
    /// The scope built for a scoped prefab.
    pub scope: Option<LifetimeScope>,
    pub source: OutputSource,
}

/// Instantiates prefabs below an optional current scope.
///
/// Scoped prefabs (those carrying a [`ScopeDefinition`](crate::ScopeDefinition))
/// get a child scope of `current`, or a standalone one without a current
/// scope. The extra installers passed to [`spawn`](Self::spawn) run right
/// after the definition's own installers. Other prefabs are instantiated
/// directly, with the current scope's container available to their
/// component constructors.
#[derive(Clone)]
pub struct ScopedSpawner {
    host: Arc<dyn SceneHost>,
    current: Option<LifetimeScope>,
}

impl ScopedSpawner {
    pub fn new(host: Arc<dyn SceneHost>, current: Option<LifetimeScope>) -> Self {
        Self { host, current }
    }

    pub fn host(&self) -> &Arc<dyn SceneHost> {
        &self.host
    }

    pub fn current(&self) -> Option<&LifetimeScope> {
        self.current.as_ref()
    }

    /// Instantiates `prefab` and locates its `T`.
    ///
    /// On failure nothing is left behind: a half-built scope is disposed and
    /// an unscoped object without a `T` is destroyed.
    pub fn spawn<T: Send + Sync + 'static>(
        &self,
        prefab: &Prefab,
        placement: &Placement,
        extra: Vec<Box<dyn Installer>>,
    ) -> DiResult<SpawnResult<T>> {
        if prefab.scope().is_some() {
            self.spawn_scoped(prefab, placement, extra)
        } else {
            if !extra.is_empty() {
                tracing::trace!(prefab = prefab.name(), "unscoped prefab; extra installers ignored");
            }
            self.spawn_unscoped(prefab, placement)
        }
    }

    fn spawn_scoped<T: Send + Sync + 'static>(
        &self,
        prefab: &Prefab,
        placement: &Placement,
        extra: Vec<Box<dyn Installer>>,
    ) -> DiResult<SpawnResult<T>> {
        let scope = match &self.current {
            Some(current) => current.create_child_from_prefab(prefab, placement, extra)?,
            None => LifetimeScope::instantiate(self.host.clone(), prefab, placement, extra)?,
        };
        let container = scope.build()?;

        let located = scope
            .root_node()
            .ok_or_else(|| DiError::Configuration(format!("scope '{}' has no root object", scope.name())))
            .and_then(|node| locate::<T>(&container, self.host.as_ref(), node).map(|found| (node, found)));

        match located {
            Ok((node, (output, source))) => {
                tracing::debug!(prefab = prefab.name(), ?source, "spawned scoped prefab");
                Ok(SpawnResult { output, node, scope: Some(scope), source })
            }
            Err(err) => {
                scope.dispose();
                Err(err)
            }
        }
    }

    fn spawn_unscoped<T: Send + Sync + 'static>(&self, prefab: &Prefab, placement: &Placement) -> DiResult<SpawnResult<T>> {
        let container = self.current.as_ref().map(LifetimeScope::container).transpose()?;
        let node = self
            .host
            .instantiate(prefab, placement, &InjectContext::new(container.as_ref()))?;

        match component::<T>(self.host.as_ref(), node) {
            Some(output) => {
                tracing::debug!(prefab = prefab.name(), "spawned prefab");
                Ok(SpawnResult { output, node, scope: None, source: OutputSource::Instantiated })
            }
            None => {
                self.host.destroy(node);
                Err(DiError::ComponentNotFound {
                    prefab: prefab.name().to_string(),
                    type_name: std::any::type_name::<T>(),
                })
            }
        }
    }
}

/// Resolves `T`, falling back to a component of the root object when `T`
/// is simply not registered. Any other failure, or a failed fallback,
/// returns the resolution error unchanged.
fn locate<T: Send + Sync + 'static>(
    container: &Container,
    host: &dyn SceneHost,
    node: NodeId,
) -> DiResult<(Arc<T>, OutputSource)> {
    match container.get::<T>() {
        Ok(output) => Ok((output, OutputSource::Resolved)),
        Err(DiError::NotFound(name)) if name == std::any::type_name::<T>() => component::<T>(host, node)
            .map(|output| (output, OutputSource::Component))
            .ok_or(DiError::NotFound(name)),
        Err(err) => Err(err),
    }
}

fn component<T: Send + Sync + 'static>(host: &dyn SceneHost, node: NodeId) -> Option<Arc<T>> {
    host.find_component(node, TypeId::of::<T>())
        .and_then(|component| component.downcast::<T>())
}
