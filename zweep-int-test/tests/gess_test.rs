use zweep::common::constants::{DUPLICATES_DROPPED, REPLICAS_EMITTED, RESULT_PAIRS};
use zweep::common::Rectangle;
use zweep::config::PartitionConfig;
use zweep::join::GessJoin;
use zweep::metrics::MetricsRegistry;
use zweep::replicate::{SplitPolicy, Traversal};

use zweep_int_test::test_util::{brute_force_pairs, intersects, random_rects, seeded_rng};

#[ctor::ctor]
fn init_logger() {
    colog::init();
}

fn run_gess(join: &GessJoin, left: Vec<Rectangle>, right: Vec<Rectangle>) -> Vec<(u64, u64)> {
    let driver = join
        .join(left, right, |r: &Rectangle| r.clone(), intersects(), |a, b| {
            (a.sequence(), b.sequence())
        })
        .unwrap();
    let mut pairs: Vec<(u64, u64)> = driver.map(|r| r.unwrap()).collect();
    pairs.sort();
    pairs
}

#[test]
fn test_random_workload_matches_nested_loop_exactly_once() {
    let mut rng = seeded_rng(42);
    let left = random_rects(&mut rng, 25, 0.15);
    let right = random_rects(&mut rng, 25, 0.15);
    let expected = brute_force_pairs(&left, &right);
    assert!(!expected.is_empty());

    let metrics = MetricsRegistry::new();
    let join = GessJoin::new(PartitionConfig::new(2, 5).unwrap()).with_metrics(metrics.clone());
    let pairs = run_gess(&join, left, right);

    // every intersecting pair appears, and appears once
    assert_eq!(pairs, expected);
    assert!(metrics.get(REPLICAS_EMITTED) > 0);
    assert_eq!(metrics.get(RESULT_PAIRS), expected.len() as u64);
}

#[test]
fn test_traversal_does_not_change_the_result() {
    let mut rng = seeded_rng(7);
    let left = random_rects(&mut rng, 15, 0.2);
    let right = random_rects(&mut rng, 15, 0.2);

    let bfs = GessJoin::new(PartitionConfig::new(2, 4).unwrap());
    let lifo = GessJoin::new(PartitionConfig::new(2, 4).unwrap())
        .with_traversal(Traversal::LifoDepthFirst);
    assert_eq!(
        run_gess(&bfs, left.clone(), right.clone()),
        run_gess(&lifo, left, right)
    );
}

#[test]
fn test_duplicates_are_dropped_not_emitted() {
    let metrics = MetricsRegistry::new();
    let join = GessJoin::new(PartitionConfig::new(2, 3).unwrap()).with_metrics(metrics.clone());
    let pairs = run_gess(
        &join,
        vec![Rectangle::new(&[0.4, 0.4], &[0.6, 0.6]).unwrap()],
        vec![Rectangle::new(&[0.45, 0.45], &[0.65, 0.65]).unwrap()],
    );
    assert_eq!(pairs, vec![(0, 0)]);
    assert!(metrics.get(DUPLICATES_DROPPED) > 0);
}

#[test]
fn test_bounded_policy_stays_correct_on_random_data() {
    // a stingy split policy produces coarser fragments but never loses or
    // duplicates a result pair
    let mut rng = seeded_rng(99);
    let left = random_rects(&mut rng, 20, 0.25);
    let right = random_rects(&mut rng, 20, 0.25);
    let expected = brute_force_pairs(&left, &right);

    let join = GessJoin::new(PartitionConfig::new(2, 4).unwrap())
        .with_policy(SplitPolicy::max_generation(2));
    assert_eq!(run_gess(&join, left, right), expected);
}
