//! Sweep area and replication benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use zweep::common::{HashFunction, Predicate};
use zweep::config::PartitionConfig;
use zweep::replicate::{Replicator, SplitPolicy, Traversal};
use zweep::sweep::{
    BagImplementor, DefaultSweepArea, HashImplementor, ListImplementor, SweepArea,
};
use zweep_bench::data_gen::{bench_rng, uniform_rects};

use rand::Rng;

fn match_value() -> Predicate<i64, i64> {
    Predicate::from_fn(|probe: &i64, element: &i64| probe == element)
}

fn below() -> Predicate<i64, i64> {
    Predicate::from_fn(|watermark: &i64, element: &i64| element < watermark)
}

fn list_area() -> SweepArea<i64, i64> {
    SweepArea::new(
        DefaultSweepArea::new(
            0,
            false,
            vec![match_value(), match_value()],
            vec![below(), below()],
            Predicate::equality(),
            ListImplementor::new(),
        )
        .unwrap(),
    )
}

fn bag_area() -> SweepArea<i64, i64> {
    SweepArea::new(
        DefaultSweepArea::new(
            0,
            false,
            vec![match_value(), match_value()],
            vec![below(), below()],
            Predicate::equality(),
            BagImplementor::new(),
        )
        .unwrap(),
    )
}

fn hash_area() -> SweepArea<i64, i64> {
    let hash_fns = vec![
        HashFunction::from_fn(|v: &i64| *v as u64),
        HashFunction::from_fn(|v: &i64| *v as u64),
    ];
    SweepArea::new(
        DefaultSweepArea::new(
            0,
            false,
            vec![match_value(), match_value()],
            vec![below(), below()],
            Predicate::equality(),
            HashImplementor::new(hash_fns).unwrap(),
        )
        .unwrap(),
    )
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sweep/Insert");

    for size in [1_000, 10_000].iter() {
        let mut rng = bench_rng(20);
        let values: Vec<i64> = (0..*size).map(|_| rng.gen_range(0..1_000_000)).collect();

        let areas: [(&str, fn() -> SweepArea<i64, i64>); 3] = [
            ("list", list_area),
            ("bag", bag_area),
            ("hash", hash_area),
        ];
        for (name, make) in areas.iter() {
            group.bench_with_input(BenchmarkId::new(*name, size), &values, |b, values| {
                b.iter_with_setup(make, |area| {
                    for v in values {
                        area.insert(*v).unwrap();
                    }
                    black_box(area.size().unwrap())
                });
            });
        }
    }

    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sweep/Query");

    for size in [1_000, 10_000].iter() {
        let mut rng = bench_rng(21);
        let values: Vec<i64> = (0..*size).map(|_| rng.gen_range(0..1_000)).collect();

        let areas: [(&str, fn() -> SweepArea<i64, i64>); 2] = [("list", list_area), ("hash", hash_area)];
        for (name, make) in areas.iter() {
            group.bench_with_input(BenchmarkId::new(*name, size), &values, |b, values| {
                b.iter_with_setup(
                    || {
                        let area = make();
                        for v in values {
                            area.insert(*v).unwrap();
                        }
                        area
                    },
                    |area| {
                        let mut hits = 0usize;
                        for probe in 0..1_000i64 {
                            hits += area.query(&probe, 1).unwrap().count();
                        }
                        black_box(hits)
                    },
                );
            });
        }
    }

    group.finish();
}

fn bench_replicate(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sweep/Replicate");

    let config = PartitionConfig::new(2, 10).unwrap();
    let rects = uniform_rects(22, 1_000, 0.1);

    let policies: [(&str, fn() -> SplitPolicy); 2] = [
        ("unlimited", SplitPolicy::unlimited),
        ("max-generation-3", || SplitPolicy::max_generation(3)),
    ];
    for (name, policy) in policies.iter() {
        group.bench_with_input(BenchmarkId::new(*name, 1_000), &rects, |b, rects| {
            b.iter(|| {
                let replicator =
                    Replicator::new(config.clone(), policy(), Traversal::BreadthFirst);
                let mut replicas = 0usize;
                for (sequence, rect) in rects.iter().enumerate() {
                    replicas += replicator
                        .replicate_one(&(), rect, sequence as u64)
                        .unwrap()
                        .len();
                }
                black_box(replicas)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_query, bench_replicate);
criterion_main!(benches);
