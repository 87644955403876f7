use std::collections::BTreeSet;

use criterion::measurement::WallTime;
use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion, Throughput,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sketch_binpack::{pack, FitStrategy, Item, OracleError, PackerConfig};

/// Packing is benchmarked for item counts ranging from 16 to `DEFAULT_MAX_ITEMS` or environment
/// variable `N` (if defined), doubling with every iteration.
const DEFAULT_MAX_ITEMS: usize = 1024;

/// Capacity of every bin, in distinct elements
const CAPACITY: f64 = 2_000.0;

criterion_group!(benches, benchmark);
criterion_main!(benches);

fn benchmark(c: &mut Criterion) {
    let max_items = std::env::var("N")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_ITEMS);

    let counts: Vec<usize> = (4..)
        .map(|c| 1 << c)
        .take_while(|&c| c <= max_items)
        .collect();

    let mut group = c.benchmark_group("pack");
    for &n in &counts {
        group.throughput(Throughput::Elements(n as u64));
        bench_pack(&mut group, FitStrategy::FirstFit, n);
        bench_pack(&mut group, FitStrategy::BestFit, n);
    }
    group.finish();
}

fn bench_pack(group: &mut BenchmarkGroup<WallTime>, strategy: FitStrategy, n: usize) {
    let config = PackerConfig::new(CAPACITY).unwrap().with_strategy(strategy);
    let items = random_items(n);
    group.bench_with_input(
        BenchmarkId::new(format!("{strategy:?}"), n),
        &items,
        |b, items| {
            b.iter(|| {
                let result = pack(
                    black_box(items.clone()),
                    &config,
                    &exact_cardinality,
                    &exact_union,
                )
                .unwrap();
                black_box(result.len())
            });
        },
    );
}

/// Items of 50..500 elements drawn from a shared universe, so unions overlap
fn random_items(n: usize) -> Vec<Item<BTreeSet<u32>>> {
    let mut rng = StdRng::seed_from_u64(12345);
    (0..n)
        .map(|i| {
            let len = rng.gen_range(50..500);
            let sketch = (0..len).map(|_| rng.gen_range(0..200_000)).collect();
            Item::new(format!("item{i}"), sketch)
        })
        .collect()
}

fn exact_cardinality(s: &BTreeSet<u32>) -> Result<f64, OracleError> {
    Ok(s.len() as f64)
}

fn exact_union(a: &BTreeSet<u32>, b: &BTreeSet<u32>) -> Result<BTreeSet<u32>, OracleError> {
    Ok(a.union(b).copied().collect())
}
