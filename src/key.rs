//! Service key types for the container.

use std::any::TypeId;

/// Key for service storage and lookup.
///
/// - **Type**: concrete types (structs, enums, primitives)
/// - **Trait**: capability bindings such as `dyn Poolable<(u32,)>`
///
/// Trait keys carry only the trait name since `dyn Trait` registrations are
/// stored as `Arc<Arc<dyn Trait>>` and looked up by `type_name`.
#[derive(Debug, Clone)]
pub enum Key {
    /// Concrete type key with TypeId and name for diagnostics
    Type(TypeId, &'static str),
    /// Capability (trait object) key
    Trait(&'static str),
}

impl Key {
    /// Human readable type or trait name, used in errors and diagnostics.
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) => name,
            Key::Trait(name) => name,
        }
    }
}

// TypeId-only comparison for concrete types; the name is diagnostic only
impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Type(a, _), Key::Type(b, _)) => a == b,
            (Key::Trait(a), Key::Trait(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Key::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Key::Trait(name) => {
                1u8.hash(state);
                name.hash(state);
            }
        }
    }
}

/// Key for a concrete type.
#[inline(always)]
pub fn key_of_type<T: 'static>() -> Key {
    Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
}

/// Key for a capability binding (`dyn Trait`).
#[inline(always)]
pub fn key_of_trait<T: ?Sized + 'static>() -> Key {
    Key::Trait(std::any::type_name::<T>())
}
