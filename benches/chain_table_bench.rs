use chaintable::{ChainTable, Ownership, TableConfig};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> Vec<u8> {
    format!("k{:016x}", n).into_bytes()
}

fn bench_insert(c: &mut Criterion) {
    let keys: Vec<_> = lcg(1).take(10_000).map(key).collect();
    c.bench_function("chain_table_insert_10k", |b| {
        b.iter_batched(
            || ChainTable::new().unwrap(),
            |mut t| {
                for (i, k) in keys.iter().enumerate() {
                    t.insert(k, Ownership::Copy(&(i as u64).to_le_bytes()))
                        .unwrap();
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_insert_presized(c: &mut Criterion) {
    let keys: Vec<_> = lcg(1).take(10_000).map(key).collect();
    c.bench_function("chain_table_insert_10k_presized", |b| {
        b.iter_batched(
            || TableConfig::new().capacity(16_411).build().unwrap(),
            |mut t| {
                for (i, k) in keys.iter().enumerate() {
                    t.insert(k, Ownership::Copy(&(i as u64).to_le_bytes()))
                        .unwrap();
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit(c: &mut Criterion) {
    c.bench_function("chain_table_get_hit", |b| {
        let mut t = ChainTable::new().unwrap();
        let keys: Vec<_> = lcg(7).take(20_000).map(key).collect();
        for (i, k) in keys.iter().enumerate() {
            t.insert(k, Ownership::Copy(&(i as u64).to_le_bytes()))
                .unwrap();
        }
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(t.get(k).unwrap());
        })
    });
}

fn bench_get_miss(c: &mut Criterion) {
    c.bench_function("chain_table_get_miss", |b| {
        let mut t = ChainTable::new().unwrap();
        for (i, x) in lcg(11).take(10_000).enumerate() {
            t.insert(&key(x), Ownership::Copy(&(i as u64).to_le_bytes()))
                .unwrap();
        }
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            // generate keys unlikely in the table
            let k = key(miss.next().unwrap());
            black_box(t.get(&k));
        })
    });
}

fn bench_insert_remove(c: &mut Criterion) {
    c.bench_function("chain_table_insert_remove", |b| {
        let mut t = ChainTable::new().unwrap();
        let k = key(42);
        b.iter(|| {
            t.insert(&k, Ownership::Copy(b"value")).unwrap();
            t.remove(&k).unwrap();
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert, bench_insert_presized, bench_get_hit, bench_get_miss, bench_insert_remove
}
criterion_main!(benches);
