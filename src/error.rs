//! Error types for the container, scopes and prefab factories.

use thiserror::Error;

use crate::lifetime::ScopePhase;

/// Errors raised while registering, resolving, building scopes or spawning.
///
/// Configuration and resolution errors surface synchronously to the caller of
/// `create(...)`. Failures inside spawn/despawn handlers never show up here;
/// they are caught and logged at the dispatch site.
///
/// # Examples
///
/// ```rust
/// use ferrous_prefab::{ContainerBuilder, DiError, Resolver};
///
/// let container = ContainerBuilder::new().build().unwrap();
/// match container.get::<String>() {
///     Err(DiError::NotFound(type_name)) => {
///         assert_eq!(type_name, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Service not registered anywhere in the container hierarchy
    #[error("Service not found: {0}")]
    NotFound(&'static str),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// Maximum recursion depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// A scope operation was attempted in the wrong build phase
    #[error("Scope '{scope}' cannot {operation} while {phase}")]
    InvalidPhase {
        /// Scope name
        scope: String,
        /// The rejected operation
        operation: &'static str,
        /// Phase the scope was in
        phase: ScopePhase,
    },
    /// The produced object does not carry the requested component
    #[error("Prefab '{prefab}' has no component of type {type_name}")]
    ComponentNotFound {
        /// Prefab name
        prefab: String,
        /// Requested component type
        type_name: &'static str,
    },
    /// The scene host no longer knows the node
    #[error("Scene node '{0}' is not alive")]
    DeadNode(String),
    /// The factory (or container) was disposed
    #[error("'{0}' has been disposed")]
    Disposed(String),
    /// Caller misuse: missing host, prefab without the required parts, ...
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for container, scope and factory operations.
pub type DiResult<T> = Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_path_is_joined() {
        let err = DiError::Circular(vec!["A", "B", "A"]);
        assert_eq!(err.to_string(), "Circular dependency: A -> B -> A");
    }

    #[test]
    fn invalid_phase_names_scope_and_operation() {
        let err = DiError::InvalidPhase {
            scope: "Enemy".to_string(),
            operation: "build",
            phase: ScopePhase::Built,
        };
        assert_eq!(err.to_string(), "Scope 'Enemy' cannot build while built");
    }
}
