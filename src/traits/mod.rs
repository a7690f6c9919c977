//! Core traits for the dependency injection container.

mod dispose;
mod entry_point;
mod resolver;

pub use dispose::Dispose;
pub use entry_point::EntryPoint;
pub use resolver::{Resolver, ResolverCore};
