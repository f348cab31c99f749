//! Workload generation for the benchmarks.
//!
//! All rectangles live in the unit square; the join drivers expect
//! normalized coordinates.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use zweep::common::Rectangle;

/// A seeded generator so benchmark runs are comparable.
pub fn bench_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// A random rectangle with per-dimension extent up to `max_extent`,
/// clamped to the unit square.
pub fn random_rect(rng: &mut StdRng, max_extent: f64) -> Rectangle {
    let mut lower = [0.0f64; 2];
    let mut upper = [0.0f64; 2];
    for d in 0..2 {
        let lo: f64 = rng.gen_range(0.0..1.0);
        let extent: f64 = rng.gen_range(0.0..max_extent);
        lower[d] = lo;
        upper[d] = (lo + extent).min(1.0);
    }
    Rectangle::new(&lower, &upper).unwrap()
}

/// Uniformly distributed rectangles.
pub fn uniform_rects(seed: u64, count: usize, max_extent: f64) -> Vec<Rectangle> {
    let mut rng = bench_rng(seed);
    (0..count).map(|_| random_rect(&mut rng, max_extent)).collect()
}

/// Rectangles drawn around a handful of cluster centers, yielding a
/// skewed workload with many more candidate pairs than the uniform one.
pub fn clustered_rects(seed: u64, count: usize, clusters: usize, spread: f64) -> Vec<Rectangle> {
    let mut rng = bench_rng(seed);
    let centers: Vec<[f64; 2]> = (0..clusters)
        .map(|_| [rng.gen_range(0.1..0.9), rng.gen_range(0.1..0.9)])
        .collect();
    (0..count)
        .map(|_| {
            let center = centers[rng.gen_range(0..centers.len())];
            let mut lower = [0.0f64; 2];
            let mut upper = [0.0f64; 2];
            for d in 0..2 {
                let lo = (center[d] + rng.gen_range(-spread..spread)).clamp(0.0, 1.0);
                lower[d] = lo;
                upper[d] = (lo + rng.gen_range(0.0..spread)).min(1.0);
            }
            Rectangle::new(&lower, &upper).unwrap()
        })
        .collect()
}
