use criterion::*;
use reflex::{Component, Engine, Entity, Query};

#[derive(Component)]
struct CompN<const N: usize>(i32);

#[derive(Component)]
#[component(linked)]
struct Link(i32);

fn add_component(c: &mut Criterion) {
    let mut group = c.benchmark_group("add component");

    macro_rules! add_component_batch {
        ($num_comps:literal; $($n:literal),* $(,)?) => {
            for log_entities in (0..=8).step_by(4) {
                let entities = 1 << log_entities;
                group.throughput(Throughput::Elements(entities));
                let id = BenchmarkId::new(
                    format!("{} components", $num_comps),
                    format!("{entities} entities"),
                );
                group.bench_with_input(id, &entities, |b, &entities| {
                    b.iter_batched(
                        || {
                            let engine = Engine::new();
                            let query =
                                Query::builder().contains::<CompN<1>>().contains::<CompN<2>>();
                            engine.add_query(&query.build());
                            let pool: Vec<_> = (0..entities).map(|_| Entity::new()).collect();
                            engine.add_entities(&pool);
                            (engine, pool)
                        },
                        |(_engine, pool)| {
                            for entity in &pool {
                                $(entity.add(CompN::<$n>($n));)*
                            }
                        },
                        BatchSize::SmallInput,
                    );
                });
            }
        }
    }

    add_component_batch!(1; 1);
    add_component_batch!(2; 1, 2);
    add_component_batch!(4; 1, 2, 3, 4);
    add_component_batch!(8; 1, 2, 3, 4, 5, 6, 7, 8);

    for chain_len in [1, 16, 256] {
        group.throughput(Throughput::Elements(chain_len));
        let id = BenchmarkId::new("linked", format!("{chain_len} instances"));
        group.bench_with_input(id, &chain_len, |b, &chain_len| {
            b.iter_batched(
                Entity::new,
                |entity| {
                    for i in 0..chain_len {
                        entity.append(Link(i as i32));
                    }
                    entity
                },
                BatchSize::SmallInput,
            );
        });
    }
}

criterion_group!(benches, add_component);
criterion_main!(benches);
