use ferrous_prefab::{
    installer_fn, ComponentTemplate, ContainerBuilder, DespawnOutcome, Despawner, DiError, Lifetime, LifetimeScope,
    MemoryScene, Placement, PoolObserver, PoolSettings, Poolable, PoolableBase, Prefab, PrefabFactory, Resolver,
    SceneHost, ScopeDefinition,
};
use serial_test::serial;
use std::io;
use std::panic;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Counts {
    spawns: AtomicUsize,
    despawns: AtomicUsize,
}

impl Counts {
    fn get(&self) -> (usize, usize) {
        (self.spawns.load(Ordering::SeqCst), self.despawns.load(Ordering::SeqCst))
    }
}

macro_rules! counted {
    ($name:ident, $args:ty) => {
        #[derive(Default)]
        struct $name(Counts);

        impl PoolableBase for $name {
            fn on_pool_despawn(&self) {
                self.0.despawns.fetch_add(1, Ordering::SeqCst);
            }
        }

        impl Poolable<$args> for $name {
            fn on_pool_spawn(&self, _: &Despawner, _: &$args) {
                self.0.spawns.fetch_add(1, Ordering::SeqCst);
            }
        }
    };
}

counted!(Tank, (u8,));
counted!(Turret, (u8,));
counted!(Armor, (u8,));
counted!(Radio, ());

/// Panics in both hooks.
struct Fuse;

impl PoolableBase for Fuse {
    fn on_pool_despawn(&self) {
        panic!("fuse blew on despawn");
    }
}

impl Poolable<(u8,)> for Fuse {
    fn on_pool_spawn(&self, _: &Despawner, _: &(u8,)) {
        panic!("fuse blew on spawn");
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl PoolObserver for Recorder {
    fn spawned(&self, prefab: &str, reused: bool) {
        self.events.lock().unwrap().push(format!("spawned {prefab} reused={reused}"));
    }

    fn despawned(&self, prefab: &str, outcome: DespawnOutcome) {
        self.events.lock().unwrap().push(format!("despawned {prefab} {outcome:?}"));
    }

    fn handler_failed(&self, prefab: &str, handler: &str, message: &str) {
        let handler = handler.rsplit("::").next().unwrap_or(handler);
        self.events.lock().unwrap().push(format!("failed {prefab} {handler}: {message}"));
    }
}

/// Runs `f` with the default panic hook silenced. The hook is process-wide,
/// so callers are `#[serial]`.
fn quietly<R>(f: impl FnOnce() -> R) -> R {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let result = f();
    panic::set_hook(previous);
    result
}

fn tank_prefab(armor: Arc<Armor>, with_fuse: bool) -> Prefab {
    Prefab::builder("Tank")
        .component(ComponentTemplate::poolable::<Tank, (u8,), _>(|_| Ok(Tank::default())))
        .scope(ScopeDefinition::new("Tank").with_installer(installer_fn(move |builder| {
            builder
                .register::<Turret, _>(Lifetime::Scoped, |_| Ok(Turret::default()))
                .as_poolable::<(u8,)>();
            // The same object registered twice is still notified once
            builder.register_instance_arc(armor.clone()).as_poolable::<(u8,)>();
            builder.register_instance_arc(armor.clone()).as_poolable::<(u8,)>();
            builder.register::<Radio, _>(Lifetime::Scoped, |_| Ok(Radio::default())).as_poolable::<()>();
            if with_fuse {
                builder.register::<Fuse, _>(Lifetime::Scoped, |_| Ok(Fuse)).as_poolable::<(u8,)>();
            }
            Ok(())
        })))
        .build()
}

#[test]
fn test_every_handler_notified_exactly_once_per_cycle() {
    let scene = Arc::new(MemoryScene::new());
    let armor = Arc::new(Armor::default());
    let factory = PrefabFactory::<(u8,), Tank>::new(scene.clone(), None, tank_prefab(armor.clone(), false))
        .with_pool_settings(PoolSettings::with_max(1));

    let tank = factory.create((1,), Placement::default()).unwrap();
    let container = tank.scope().unwrap().container().unwrap();
    let turret = container.get_required::<Turret>();
    let radio = container.get_required::<Radio>();
    assert_eq!(factory.pooled_count(), 0);
    assert_eq!(tank.despawner().map(|d| d.is_spent()), Some(false));

    // The output is not registered in its scope; it was found on the root object
    assert_eq!(tank.0.get(), (1, 0));
    assert_eq!(turret.0.get(), (1, 0));
    assert_eq!(armor.0.get(), (1, 0));

    tank.despawn();
    assert_eq!(tank.0.get(), (1, 1));
    assert_eq!(turret.0.get(), (1, 1));
    assert_eq!(armor.0.get(), (1, 1));

    let again = factory.create((2,), Placement::default()).unwrap();
    assert!(again.is_reused());
    assert_eq!(again.0.get(), (2, 1));
    assert_eq!(turret.0.get(), (2, 1));
    assert_eq!(armor.0.get(), (2, 1));

    // Handlers for other argument tuples are left alone
    assert_eq!(radio.0.get(), (0, 0));
}

#[test]
fn test_unpooled_spawns_skip_lifecycle_handlers() {
    let scene = Arc::new(MemoryScene::new());
    let armor = Arc::new(Armor::default());
    let factory = PrefabFactory::<(u8,), Tank>::new(scene, None, tank_prefab(armor.clone(), false));

    let tank = factory.create((1,), Placement::default()).unwrap();
    assert_eq!(tank.0.get(), (0, 0));
    assert_eq!(armor.0.get(), (0, 0));
}

#[test]
#[serial]
fn test_panicking_handler_does_not_stop_the_others() {
    let scene = Arc::new(MemoryScene::new());
    let armor = Arc::new(Armor::default());
    let recorder = Arc::new(Recorder::default());
    let mut factory = PrefabFactory::<(u8,), Tank>::new(scene.clone(), None, tank_prefab(armor.clone(), true))
        .with_pool_settings(PoolSettings::with_max(2));
    factory.add_observer(recorder.clone());

    let tank = quietly(|| factory.create((1,), Placement::default())).unwrap();
    assert_eq!(tank.0.get(), (1, 0));
    assert_eq!(armor.0.get(), (1, 0));

    let outcome = quietly(|| tank.despawn());
    assert_eq!(outcome, Some(DespawnOutcome::Pooled));
    assert_eq!(tank.0.get(), (1, 1));
    assert_eq!(armor.0.get(), (1, 1));
    assert_eq!(factory.pooled_count(), 1);

    assert_eq!(
        recorder.events(),
        vec![
            "failed Tank Fuse: fuse blew on spawn",
            "spawned Tank reused=false",
            "failed Tank Fuse: fuse blew on despawn",
            "despawned Tank Pooled",
        ]
    );
}

#[test]
#[serial]
fn test_handler_failures_are_logged() {
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let capture = Capture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();

    let scene = Arc::new(MemoryScene::new());
    let factory = PrefabFactory::<(u8,), Tank>::new(scene, None, tank_prefab(Arc::new(Armor::default()), true))
        .with_pool_settings(PoolSettings::with_max(2));

    tracing::subscriber::with_default(subscriber, || {
        let tank = quietly(|| factory.create((1,), Placement::default())).unwrap();
        quietly(|| tank.despawn());
        // A second despawn is only a warning
        tank.despawn();
    });

    let logs = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
    assert!(logs.contains("lifecycle handler panicked"));
    assert!(logs.contains("fuse blew on spawn"));
    assert!(logs.contains("fuse blew on despawn"));
    assert!(logs.contains("despawn called more than once"));
}

#[test]
fn test_registered_observers_reach_registered_factories() {
    let scene = Arc::new(MemoryScene::new());
    let recorder = Arc::new(Recorder::default());
    let prefab = tank_prefab(Arc::new(Armor::default()), false);

    let observer = recorder.clone();
    let level = LifetimeScope::root(
        Some(scene),
        ScopeDefinition::new("Level").with_installer(installer_fn(move |builder| {
            builder.add_observer(observer.clone());
            builder
                .register_prefab_factory::<(u8,), Tank>(prefab.clone())
                .pooled(PoolSettings::with_max(4));
            Ok(())
        })),
    );
    let container = level.build().unwrap();
    let factory = container.get_required::<PrefabFactory<(u8,), Tank>>();

    let tank = factory.create((1,), Placement::default()).unwrap();
    tank.despawn();
    factory.create((1,), Placement::default()).unwrap();

    assert_eq!(
        recorder.events(),
        vec!["spawned Tank reused=false", "despawned Tank Pooled", "spawned Tank reused=true"]
    );
}

#[test]
fn test_despawn_after_scope_disposal_destroys() {
    let scene = Arc::new(MemoryScene::new());
    let armor = Arc::new(Armor::default());
    let factory = PrefabFactory::<(u8,), Tank>::new(scene.clone(), None, tank_prefab(armor.clone(), false))
        .with_pool_settings(PoolSettings::with_max(4));

    let tank = factory.create((1,), Placement::default()).unwrap();
    tank.scope().unwrap().dispose();
    assert!(!scene.is_alive(tank.node()));

    // Handlers still run; the dead object cannot be parked
    assert_eq!(tank.despawn(), Some(DespawnOutcome::Destroyed));
    assert_eq!(armor.0.get(), (1, 1));
    assert_eq!(factory.pooled_count(), 0);
}

#[test]
fn test_transient_poolable_is_rejected_at_build() {
    let mut builder = ContainerBuilder::new();
    builder.register::<Turret, _>(Lifetime::Transient, |_| Ok(Turret::default())).as_poolable::<(u8,)>();
    assert!(matches!(builder.build(), Err(DiError::Configuration(msg)) if msg.contains("Turret")));

    // Scoped prefabs surface the same error on spawn
    let scene = Arc::new(MemoryScene::new());
    let prefab = Prefab::builder("Tank")
        .component(ComponentTemplate::poolable::<Tank, (u8,), _>(|_| Ok(Tank::default())))
        .scope(ScopeDefinition::new("Tank").with_installer(installer_fn(|builder| {
            builder
                .register::<Turret, _>(Lifetime::Transient, |_| Ok(Turret::default()))
                .as_poolable::<(u8,)>();
            Ok(())
        })))
        .build();
    let factory = PrefabFactory::<(u8,), Tank>::new(scene, None, prefab).with_pool_settings(PoolSettings::with_max(2));
    assert!(matches!(factory.create((1,), Placement::default()), Err(DiError::Configuration(_))));
}
