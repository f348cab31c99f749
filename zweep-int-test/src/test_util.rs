use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use zweep::common::{Predicate, Rectangle};

/// A reproducible generator for the randomized join tests.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// A random 2-D rectangle inside the unit square with per-dimension extent
/// at most `max_extent`.
pub fn random_rect(rng: &mut StdRng, max_extent: f64) -> Rectangle {
    let mut lower = Vec::with_capacity(2);
    let mut upper = Vec::with_capacity(2);
    for _ in 0..2 {
        let lo: f64 = rng.random_range(0.0..(1.0 - max_extent));
        let extent: f64 = rng.random_range(0.0..max_extent);
        lower.push(lo);
        upper.push(lo + extent);
    }
    Rectangle::new(&lower, &upper).expect("generated bounds are ordered")
}

pub fn random_rects(rng: &mut StdRng, count: usize, max_extent: f64) -> Vec<Rectangle> {
    (0..count).map(|_| random_rect(rng, max_extent)).collect()
}

/// The intersection predicate all the join tests use.
pub fn intersects() -> Predicate<Rectangle, Rectangle> {
    Predicate::from_fn(|a: &Rectangle, b: &Rectangle| a.intersects(b))
}

/// Nested-loop reference join: sorted `(left index, right index)` pairs of
/// intersecting rectangles.
pub fn brute_force_pairs(left: &[Rectangle], right: &[Rectangle]) -> Vec<(u64, u64)> {
    let mut pairs = Vec::new();
    for (i, a) in left.iter().enumerate() {
        for (j, b) in right.iter().enumerate() {
            if a.intersects(b) {
                pairs.push((i as u64, j as u64));
            }
        }
    }
    pairs.sort();
    pairs
}
