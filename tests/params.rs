use ferrous_prefab::{
    installer_fn, Args, ContainerBuilder, ContextFactory, Despawner, DiError, Installer, Lifetime, LifetimeScope,
    MemoryScene, ParameterInstaller, Placement, PoolSettings, Poolable, PoolableBase, Prefab, PrefabFactory,
    Resolver, ScopeDefinition,
};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, PartialEq)]
struct Team(&'static str);

/// Built from whatever arguments the spawning scope registered.
struct Soldier {
    team: Option<Arc<Team>>,
    level: Option<Arc<u32>>,
    spawned_with: Mutex<Option<(Team, u32)>>,
}

impl PoolableBase for Soldier {
    fn on_pool_despawn(&self) {
        *self.spawned_with.lock().unwrap() = None;
    }
}

impl Poolable<(Team, u32)> for Soldier {
    fn on_pool_spawn(&self, _despawn: &Despawner, (team, level): &(Team, u32)) {
        *self.spawned_with.lock().unwrap() = Some((team.clone(), *level));
    }
}

fn soldier_prefab() -> Prefab {
    Prefab::builder("Soldier")
        .scope(ScopeDefinition::new("Soldier").with_installer(installer_fn(|builder| {
            builder
                .register::<Soldier, _>(Lifetime::Scoped, |r| {
                    Ok(Soldier {
                        team: r.get::<Team>().ok(),
                        level: r.get::<u32>().ok(),
                        spawned_with: Mutex::new(None),
                    })
                })
                .as_self()
                .as_poolable::<(Team, u32)>();
            Ok(())
        })))
        .build()
}

#[test]
fn test_unpooled_spawn_registers_arguments_in_child_scope() {
    let scene = Arc::new(MemoryScene::new());
    let factory = PrefabFactory::<(Team, u32), Soldier>::new(scene, None, soldier_prefab());

    let soldier = factory.create((Team("red"), 3), Placement::default()).unwrap();
    assert_eq!(soldier.team.as_deref(), Some(&Team("red")));
    assert_eq!(soldier.level.as_deref(), Some(&3));
    // No pooling, no lifecycle dispatch
    assert!(soldier.spawned_with.lock().unwrap().is_none());

    let container = soldier.scope().unwrap().container().unwrap();
    assert_eq!(*container.get_required::<u32>(), 3);
}

#[test]
fn test_pooled_spawn_never_registers_arguments() {
    let scene = Arc::new(MemoryScene::new());
    let factory = PrefabFactory::<(Team, u32), Soldier>::new(scene, None, soldier_prefab())
        .with_pool_settings(PoolSettings::with_max(4));

    let first = factory.create((Team("red"), 1), Placement::default()).unwrap();
    assert!(first.team.is_none());
    assert!(first.level.is_none());
    assert_eq!(*first.spawned_with.lock().unwrap(), Some((Team("red"), 1)));
    first.despawn();

    let second = factory.create((Team("blue"), 2), Placement::default()).unwrap();
    assert!(second.is_reused());
    assert!(Arc::ptr_eq(first.value(), second.value()));
    assert_eq!(*second.spawned_with.lock().unwrap(), Some((Team("blue"), 2)));

    let container = second.scope().unwrap().container().unwrap();
    assert!(matches!(container.get::<Team>(), Err(DiError::NotFound(_))));
    assert!(matches!(container.get::<u32>(), Err(DiError::NotFound(_))));
}

#[test]
fn test_each_call_installs_its_own_arguments() {
    let scene = Arc::new(MemoryScene::new());
    let factory = PrefabFactory::<(Team, u32), Soldier>::new(scene, None, soldier_prefab());

    let levels: Vec<u32> = (1..=5)
        .map(|level| *factory.create((Team("green"), level), Placement::default()).unwrap().level.clone().unwrap())
        .collect();
    assert_eq!(levels, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_duplicate_argument_types_last_wins() {
    let installer = ParameterInstaller::new((1u8, 2u8));
    let mut builder = ContainerBuilder::new();
    installer.install(&mut builder).unwrap();
    let container = builder.build().unwrap();
    assert_eq!(*container.get_required::<u8>(), 2);
}

#[test]
fn test_arguments_are_exposed_as_their_own_type_only() {
    trait Weapon: Send + Sync {
        fn damage(&self) -> u32;
    }
    struct Sword;
    impl Weapon for Sword {
        fn damage(&self) -> u32 {
            7
        }
    }

    let weapon: Arc<dyn Weapon> = Arc::new(Sword);
    let installer = ParameterInstaller::new((weapon,));
    let mut builder = ContainerBuilder::new();
    installer.install(&mut builder).unwrap();
    let container = builder.build().unwrap();

    assert_eq!(container.get_required::<Arc<dyn Weapon>>().damage(), 7);
    assert!(matches!(container.get_trait::<dyn Weapon>(), Err(DiError::NotFound(_))));
}

#[test]
fn test_only_the_unit_tuple_has_a_trivial_value() {
    assert_eq!(<() as Args>::trivial(), Some(()));
    assert!(<(u8,) as Args>::trivial().is_none());
    assert!(<(Team, u32) as Args>::trivial().is_none());
}

#[test]
fn test_ten_arguments() {
    type Ten = (u8, u16, u32, u64, i8, i16, i32, i64, bool, char);
    assert_eq!(<Ten as Args>::ARITY, 10);

    let installer = ParameterInstaller::new((1u8, 2u16, 3u32, 4u64, -1i8, -2i16, -3i32, -4i64, true, 'x'));
    assert!(installer.is_pending());
    let mut builder = ContainerBuilder::new();
    installer.install(&mut builder).unwrap();
    assert!(!installer.is_pending());

    let container = builder.build().unwrap();
    assert_eq!(*container.get_required::<u64>(), 4);
    assert_eq!(*container.get_required::<i16>(), -2);
    assert_eq!(*container.get_required::<char>(), 'x');
}

#[test]
fn test_context_factory_passes_arguments_per_call() {
    struct Room {
        id: u32,
        theme: Arc<&'static str>,
    }

    let root = LifetimeScope::root(
        None,
        ScopeDefinition::new("Dungeon").with_installer(installer_fn(|builder| {
            builder.register_instance("stone");
            builder.register_context_factory::<(u32,), Room>(ScopeDefinition::new("Room").with_installer(
                installer_fn(|builder| {
                    builder.register::<Room, _>(Lifetime::Scoped, |r| {
                        Ok(Room { id: *r.get::<u32>()?, theme: r.get::<&'static str>()? })
                    });
                    Ok(())
                }),
            ));
            Ok(())
        })),
    );
    let container = root.build().unwrap();
    let factory = container.get_required::<ContextFactory<(u32,), Room>>();

    let first = factory.create((1,)).unwrap();
    let second = factory.create((2,)).unwrap();
    assert_eq!((first.id, second.id), (1, 2));
    assert_eq!(*second.theme, "stone");
    assert!(second.scope().parent().unwrap().ptr_eq(&root));

    first.dispose();
    root.dispose();
    assert!(container.is_disposed());
}

#[test]
fn test_context_factory_failure_disposes_scope() {
    struct Missing;

    let root = LifetimeScope::root(None, ScopeDefinition::new("Root"));
    root.build().unwrap();
    let factory = ContextFactory::<(), Missing>::new(root.clone(), ScopeDefinition::new("Empty"));

    assert!(matches!(factory.create(()), Err(DiError::NotFound(_))));
}
