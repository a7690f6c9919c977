use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrous_prefab::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Projectile {
    speed: AtomicU32,
}

impl PoolableBase for Projectile {
    fn on_pool_despawn(&self) {}
}

impl Poolable<(u32,)> for Projectile {
    fn on_pool_spawn(&self, _: &Despawner, (speed,): &(u32,)) {
        self.speed.store(*speed, Ordering::Relaxed);
    }
}

fn plain_prefab() -> Prefab {
    Prefab::builder("Projectile")
        .component(ComponentTemplate::poolable::<Projectile, (u32,), _>(|_| Ok(Projectile::default())))
        .build()
}

fn scoped_prefab() -> Prefab {
    Prefab::builder("Projectile")
        .scope(ScopeDefinition::new("Projectile").with_installer(installer_fn(|b| {
            b.register::<Projectile, _>(Lifetime::Scoped, |_| Ok(Projectile::default()))
                .as_self()
                .as_poolable::<(u32,)>();
            Ok(())
        })))
        .build()
}

// ===== Spawn/despawn cycles =====

fn bench_spawn_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_cycle");

    for (label, prefab) in [("plain", plain_prefab()), ("scoped", scoped_prefab())] {
        let scene = Arc::new(MemoryScene::new());
        let unpooled = PrefabFactory::<(u32,), Projectile>::new(scene.clone(), None, prefab.clone());
        group.bench_function(BenchmarkId::new("unpooled", label), |b| {
            b.iter(|| {
                let spawned = unpooled.create((black_box(7),), Placement::default()).unwrap();
                match spawned.scope() {
                    Some(scope) => scope.dispose(),
                    None => scene.destroy(spawned.node()),
                }
            })
        });

        let scene = Arc::new(MemoryScene::new());
        let pooled = PrefabFactory::<(u32,), Projectile>::new(scene, None, prefab)
            .with_pool_settings(PoolSettings::new("Pool", 1, 16));
        pooled.prewarm((0,)).unwrap();
        group.bench_function(BenchmarkId::new("pooled", label), |b| {
            b.iter(|| {
                let spawned = pooled.create((black_box(7),), Placement::default()).unwrap();
                black_box(spawned.despawn());
            })
        });
    }

    group.finish();
}

fn bench_prewarm(c: &mut Criterion) {
    let mut group = c.benchmark_group("prewarm");

    for count in [8usize, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let scene = Arc::new(MemoryScene::new());
                    PrefabFactory::<(u32,), Projectile>::new(scene, None, plain_prefab())
                        .with_pool_settings(PoolSettings::new("Pool", count, count))
                },
                |factory| black_box(factory.prewarm((1,)).unwrap()),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_scope_resolution(c: &mut Criterion) {
    let level = LifetimeScope::root(
        None,
        ScopeDefinition::new("Level").with_installer(installer_fn(|b| {
            b.register_instance(42u64);
            Ok(())
        })),
    );
    level.build().unwrap();
    let child = level.create_child(ScopeDefinition::new("Room"), Vec::new()).unwrap();
    let container = child.build().unwrap();

    c.bench_function("resolve_from_parent_scope", |b| {
        b.iter(|| black_box(container.get::<u64>().unwrap()))
    });
}

criterion_group!(benches, bench_spawn_cycle, bench_prewarm, bench_scope_resolution);
criterion_main!(benches);
