//! Installers: reusable groups of registrations.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::collection::ContainerBuilder;
use crate::provider::ResolverContext;
use crate::traits::EntryPoint;
use crate::DiResult;

/// A unit of registrations applied to a [`ContainerBuilder`].
///
/// Scope definitions hold a list of installers; factories pass extra
/// installers per call (see [`ParameterInstaller`](crate::ParameterInstaller)).
pub trait Installer: Send + Sync {
    /// Adds registrations to `builder`.
    fn install(&self, builder: &mut ContainerBuilder) -> DiResult<()>;
}

/// Installer backed by a closure. Created with [`installer_fn`].
pub struct FnInstaller<F> {
    f: F,
}

impl<F> Installer for FnInstaller<F>
where
    F: Fn(&mut ContainerBuilder) -> DiResult<()> + Send + Sync,
{
    fn install(&self, builder: &mut ContainerBuilder) -> DiResult<()> {
        (self.f)(builder)
    }
}

/// Wraps a closure as an [`Installer`].
///
/// ```rust
/// use ferrous_prefab::{installer_fn, ScopeDefinition};
///
/// let definition = ScopeDefinition::new("Enemy").with_installer(installer_fn(|builder| {
///     builder.register_instance(100u32);
///     Ok(())
/// }));
/// assert_eq!(definition.installers().len(), 1);
/// ```
pub fn installer_fn<F>(f: F) -> FnInstaller<F>
where
    F: Fn(&mut ContainerBuilder) -> DiResult<()> + Send + Sync,
{
    FnInstaller { f }
}

/// The registrations a scope runs when it is built, plus its name.
///
/// Attached to a [`Prefab`](crate::Prefab) it turns the prefab into a scoped
/// prefab: every spawn gets its own child container.
#[derive(Clone)]
pub struct ScopeDefinition {
    name: String,
    installers: Vec<Arc<dyn Installer>>,
}

impl ScopeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), installers: Vec::new() }
    }

    pub fn with_installer(self, installer: impl Installer + 'static) -> Self {
        self.with_installer_arc(Arc::new(installer))
    }

    pub fn with_installer_arc(mut self, installer: Arc<dyn Installer>) -> Self {
        self.installers.push(installer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn installers(&self) -> &[Arc<dyn Installer>] {
        &self.installers
    }

    pub(crate) fn install(&self, builder: &mut ContainerBuilder) -> DiResult<()> {
        for installer in &self.installers {
            installer.install(builder)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ScopeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeDefinition")
            .field("name", &self.name)
            .field("installers", &self.installers.len())
            .finish()
    }
}

type PresenterFactory<P> = Arc<dyn Fn(&ResolverContext<'_>) -> DiResult<P> + Send + Sync>;

/// View/presenter context: registers the root object's `V` component and
/// starts the presenter `P` as an entry point once the scope is built.
///
/// ```rust
/// use ferrous_prefab::{EntryPoint, Resolver, ScopeDefinition, ViewPresenterInstaller};
/// use std::sync::Arc;
///
/// struct HealthBar;
/// struct HealthPresenter { view: Arc<HealthBar> }
/// impl EntryPoint for HealthPresenter {
///     fn start(&self) {}
/// }
///
/// let definition = ScopeDefinition::new("HealthBar").with_installer(
///     ViewPresenterInstaller::<HealthBar, HealthPresenter>::new(|r| {
///         Ok(HealthPresenter { view: r.get::<HealthBar>()? })
///     }),
/// );
/// # let _ = definition;
/// ```
pub struct ViewPresenterInstaller<V, P> {
    presenter: PresenterFactory<P>,
    _view: PhantomData<fn() -> V>,
}

impl<V, P> ViewPresenterInstaller<V, P>
where
    V: Send + Sync + 'static,
    P: EntryPoint,
{
    pub fn new<F>(presenter: F) -> Self
    where
        F: Fn(&ResolverContext<'_>) -> DiResult<P> + Send + Sync + 'static,
    {
        Self { presenter: Arc::new(presenter), _view: PhantomData }
    }
}

impl<V, P> Installer for ViewPresenterInstaller<V, P>
where
    V: Send + Sync + 'static,
    P: EntryPoint,
{
    fn install(&self, builder: &mut ContainerBuilder) -> DiResult<()> {
        builder.register_component::<V>();
        let presenter = self.presenter.clone();
        builder.register_entry_point::<P, _>(move |r: &ResolverContext| presenter(r));
        Ok(())
    }
}
