use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use universe_gen::graph::{build_graph, GraphParams};
use universe_gen::repair::{repair_connectivity, RepairPolicy};
use universe_gen::{generate_universe, GenerationConfig, RandomStream};

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    group.sample_size(20);

    for size in [100u32, 1_000, 5_000, 20_000] {
        group.bench_with_input(BenchmarkId::new("universe", size), &size, |b, &size| {
            let config = GenerationConfig::with_sectors(size).with_seed(7);
            b.iter(|| generate_universe(&config).expect("benchmark config is valid"));
        });
    }

    group.finish();
}

fn bench_graph_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph");

    for size in [1_000u32, 10_000] {
        let config = GenerationConfig::with_sectors(size);
        let params = GraphParams::from_config(&config);
        let policy = RepairPolicy::from_config(&config);

        group.bench_with_input(BenchmarkId::new("build", size), &size, |b, _| {
            b.iter_batched(
                || RandomStream::from_seed(11),
                |mut rng| build_graph(&params, &mut rng),
                BatchSize::SmallInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("build_and_repair", size), &size, |b, _| {
            b.iter_batched(
                || RandomStream::from_seed(11),
                |mut rng| {
                    let graph = build_graph(&params, &mut rng).expect("benchmark params are valid");
                    repair_connectivity(graph, &policy, &mut rng)
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(generate_benches, bench_generate, bench_graph_stages);
criterion_main!(generate_benches);
