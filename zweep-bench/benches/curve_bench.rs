//! Z-order curve benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use zweep::common::Rectangle;
use zweep::config::PartitionConfig;
use zweep::curve::{decode_cell, next_in_box, z_code, z_code_point, BitCode};
use zweep_bench::data_gen::{bench_rng, uniform_rects};

use rand::Rng;

fn config() -> PartitionConfig {
    PartitionConfig::new(2, 16).unwrap()
}

fn bench_rect_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("Curve/Encode Rectangle");

    for size in [1_000, 10_000].iter() {
        let rects = uniform_rects(7, *size, 0.05);
        let config = config();
        group.bench_with_input(BenchmarkId::new("z_code", size), &rects, |b, rects| {
            b.iter(|| {
                let mut total = 0u32;
                for rect in rects {
                    total += z_code(rect, &config).unwrap().precision();
                }
                black_box(total)
            });
        });
    }

    group.finish();
}

fn bench_point_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("Curve/Encode Point");

    for size in [1_000, 10_000].iter() {
        let mut rng = bench_rng(8);
        let points: Vec<[f64; 2]> = (0..*size)
            .map(|_| [rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)])
            .collect();
        let config = config();
        group.bench_with_input(BenchmarkId::new("z_code_point", size), &points, |b, points| {
            b.iter(|| {
                let mut total = 0u32;
                for point in points {
                    total += z_code_point(point, &config).unwrap().precision();
                }
                black_box(total)
            });
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("Curve/Decode Cell");

    let config = config();
    let rects = uniform_rects(9, 1_000, 0.05);
    let codes: Vec<BitCode> = rects.iter().map(|r| z_code(r, &config).unwrap()).collect();

    group.bench_with_input(BenchmarkId::new("decode_cell", 1_000), &codes, |b, codes| {
        b.iter(|| {
            let mut dims = 0usize;
            for code in codes {
                dims += decode_cell(code, &config).unwrap().dimensions();
            }
            black_box(dims)
        });
    });

    group.finish();
}

fn bench_next_in_box(c: &mut Criterion) {
    let mut group = c.benchmark_group("Curve/Next In Box");

    let config = config();
    let query = Rectangle::new(&[0.3, 0.3], &[0.7, 0.7]).unwrap();
    let mut rng = bench_rng(10);
    // start codes scattered over the whole square, most outside the box
    let starts: Vec<BitCode> = (0..1_000)
        .map(|_| {
            let point = [rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)];
            z_code_point(&point, &config).unwrap()
        })
        .collect();

    group.bench_with_input(BenchmarkId::new("bigmin", 1_000), &starts, |b, starts| {
        b.iter(|| {
            let mut inside = 0usize;
            for start in starts {
                if next_in_box(start, &query, &config).unwrap().is_some() {
                    inside += 1;
                }
            }
            black_box(inside)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_rect_encode,
    bench_point_encode,
    bench_decode,
    bench_next_in_box
);
criterion_main!(benches);
