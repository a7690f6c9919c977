//! Factory argument tuples and the per-call installer that injects them.

use parking_lot::Mutex;

use crate::collection::{ContainerBuilder, Installer};
use crate::DiResult;

/// An argument tuple accepted by a factory: `()`, `(P1,)`, ... up to ten
/// elements.
///
/// Each element is registered into the spawned scope as an instance exposed
/// as its own concrete type only. When two elements share a type, the later
/// one wins.
///
/// Elements are not exposed under any trait they implement: an element of
/// type `Arc<dyn Weapon>` is found with `get::<Arc<dyn Weapon>>()`, never with
/// `get_trait::<dyn Weapon>()`. Register such a service explicitly through an
/// installer when consumers resolve it by trait.
pub trait Args: Clone + Send + Sync + 'static {
    /// Number of elements.
    const ARITY: usize;

    /// Registers every element into `builder`.
    fn install(self, builder: &mut ContainerBuilder);

    /// The tuple's only value, for tuples that need no caller input.
    fn trivial() -> Option<Self> {
        None
    }
}

impl Args for () {
    const ARITY: usize = 0;

    fn install(self, _builder: &mut ContainerBuilder) {}

    fn trivial() -> Option<Self> {
        Some(())
    }
}

macro_rules! impl_args {
    ($arity:expr; $($T:ident $idx:tt),+) => {
        impl<$($T),+> Args for ($($T,)+)
        where
            $($T: Clone + Send + Sync + 'static),+
        {
            const ARITY: usize = $arity;

            fn install(self, builder: &mut ContainerBuilder) {
                $( builder.register_instance(self.$idx); )+
            }
        }
    };
}

impl_args!(1; P1 0);
impl_args!(2; P1 0, P2 1);
impl_args!(3; P1 0, P2 1, P3 2);
impl_args!(4; P1 0, P2 1, P3 2, P4 3);
impl_args!(5; P1 0, P2 1, P3 2, P4 3, P5 4);
impl_args!(6; P1 0, P2 1, P3 2, P4 3, P5 4, P6 5);
impl_args!(7; P1 0, P2 1, P3 2, P4 3, P5 4, P6 5, P7 6);
impl_args!(8; P1 0, P2 1, P3 2, P4 3, P5 4, P6 5, P7 6, P8 7);
impl_args!(9; P1 0, P2 1, P3 2, P4 3, P5 4, P6 5, P7 6, P8 7, P9 8);
impl_args!(10; P1 0, P2 1, P3 2, P4 3, P5 4, P6 5, P7 6, P8 7, P9 8, P10 9);

/// Single-slot installer carrying one call's arguments into the child scope
/// being built.
///
/// The slot is filled at construction and emptied by the first `install`;
/// later installs register nothing. Each `create` call builds its own
/// installer and hands it to the scope by value, so concurrent or reentrant
/// spawns never see each other's arguments.
pub struct ParameterInstaller<A> {
    slot: Mutex<Option<A>>,
}

impl<A: Args> ParameterInstaller<A> {
    pub fn new(args: A) -> Self {
        Self { slot: Mutex::new(Some(args)) }
    }

    /// True until the arguments have been installed.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<A: Args> Installer for ParameterInstaller<A> {
    fn install(&self, builder: &mut ContainerBuilder) -> DiResult<()> {
        let taken = self.slot.lock().take();
        match taken {
            Some(args) => {
                tracing::trace!(scope = builder.name(), arity = A::ARITY, "installing factory parameters");
                args.install(builder);
            }
            None => {
                tracing::warn!(scope = builder.name(), "factory parameters already consumed; nothing installed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Resolver;

    #[test]
    fn arity_matches_tuple_length() {
        assert_eq!(<() as Args>::ARITY, 0);
        assert_eq!(<(u8,) as Args>::ARITY, 1);
        assert_eq!(<(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64) as Args>::ARITY, 10);
    }

    #[test]
    fn second_install_registers_nothing() {
        let installer = ParameterInstaller::new((7u32, "name"));

        let mut first = ContainerBuilder::new();
        installer.install(&mut first).unwrap();
        assert!(!installer.is_pending());
        let first = first.build().unwrap();
        assert_eq!(*first.get_required::<u32>(), 7);
        assert_eq!(*first.get_required::<&'static str>(), "name");

        let mut second = ContainerBuilder::new();
        installer.install(&mut second).unwrap();
        assert!(!second.exists::<u32>());
    }
}
