use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{rngs::SmallRng, Rng, SeedableRng};

use permap::Rbt;

fn random_keys(n: usize) -> Vec<i64> {
    let mut rng = SmallRng::seed_from_u64(0xBE4C);
    (0..n).map(|_| rng.gen_range(0..1_000_000)).collect()
}

fn bench_insert_rand(c: &mut Criterion) {
    let keys = random_keys(1_000);
    c.bench_function("rbt_insert_rand_1000", |b| {
        b.iter(|| {
            let mut tree: Rbt<i64, i64> = Rbt::new();
            for key in keys.iter() {
                tree = tree.insert(*key, *key);
            }
            black_box(tree)
        })
    });
}

fn bench_get_rand(c: &mut Criterion) {
    let keys = random_keys(10_000);
    let tree: Rbt<i64, i64> = keys.iter().map(|k| (*k, *k)).collect();
    c.bench_function("rbt_get_rand_10000", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % keys.len();
            black_box(tree.get(&keys[i]))
        })
    });
}

fn bench_remove_rand(c: &mut Criterion) {
    let keys = random_keys(1_000);
    let tree: Rbt<i64, i64> = keys.iter().map(|k| (*k, *k)).collect();
    c.bench_function("rbt_remove_rand_1000", |b| {
        b.iter(|| {
            let mut tree = tree.clone();
            for key in keys.iter() {
                tree = tree.remove(key);
            }
            black_box(tree)
        })
    });
}

criterion_group!(benches, bench_insert_rand, bench_get_rand, bench_remove_rand);
criterion_main!(benches);
