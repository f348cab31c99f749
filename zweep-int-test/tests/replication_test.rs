use zweep::common::Rectangle;
use zweep::config::PartitionConfig;
use zweep::curve::{decode_cell, Coded};
use zweep::replicate::{Replicator, SplitPolicy, Traversal};

use zweep_int_test::test_util::{random_rect, seeded_rng};

#[ctor::ctor]
fn init_logger() {
    colog::init();
}

#[test]
fn test_fragments_cover_the_original_rectangle() {
    let mut rng = seeded_rng(5);
    let config = PartitionConfig::new(2, 4).unwrap();
    let replicator = Replicator::new(
        config.clone(),
        SplitPolicy::unlimited(),
        Traversal::BreadthFirst,
    );

    for _ in 0..50 {
        let rect = random_rect(&mut rng, 0.3);
        let entries = replicator.replicate_one(&(), &rect, 0).unwrap();
        assert!(!entries.is_empty());
        // every corner of the original lands in some fragment's cell
        for point in [rect.lower().to_vec(), rect.upper().to_vec()] {
            let covered = entries.iter().any(|e| {
                decode_cell(e.code(), &config)
                    .map(|cell| {
                        (0..2).all(|d| {
                            point[d] >= cell.lower()[d] - 1e-9
                                && point[d] <= cell.upper()[d] + 1e-9
                        })
                    })
                    .unwrap_or(false)
            });
            assert!(covered, "corner {:?} of {:?} uncovered", point, rect);
        }
    }
}

#[test]
fn test_fragment_cells_are_pairwise_disjoint() {
    let mut rng = seeded_rng(11);
    let config = PartitionConfig::new(2, 4).unwrap();
    for policy in [
        SplitPolicy::unlimited(),
        SplitPolicy::max_generation(2),
        SplitPolicy::max_splits_per_level(1),
    ] {
        let replicator =
            Replicator::new(config.clone(), policy, Traversal::LifoDepthFirst);
        for _ in 0..25 {
            let rect = random_rect(&mut rng, 0.4);
            let entries = replicator.replicate_one(&(), &rect, 0).unwrap();
            for (i, a) in entries.iter().enumerate() {
                for b in entries.iter().skip(i + 1) {
                    // prefix-incompatible codes mean disjoint cells
                    assert!(
                        !a.code().is_prefix_of(b.code()) && !b.code().is_prefix_of(a.code()),
                        "overlapping fragment cells {} and {}",
                        a.code(),
                        b.code()
                    );
                }
            }
        }
    }
}

#[test]
fn test_replica_counts_respect_the_policy() {
    let mut rng = seeded_rng(23);
    let config = PartitionConfig::new(2, 6).unwrap();
    let bounded = Replicator::new(
        config.clone(),
        SplitPolicy::max_replicates(4),
        Traversal::BreadthFirst,
    );
    for _ in 0..50 {
        let rect = random_rect(&mut rng, 0.5);
        let entries = bounded.replicate_one(&(), &rect, 0).unwrap();
        assert!(entries.len() <= 4, "{} replicas", entries.len());
    }
}

#[test]
fn test_replication_is_deterministic() {
    let config = PartitionConfig::new(2, 5).unwrap();
    let replicator = Replicator::new(
        config,
        SplitPolicy::unlimited(),
        Traversal::BreadthFirst,
    );
    let rect = Rectangle::new(&[0.2, 0.3], &[0.55, 0.61]).unwrap();
    let first: Vec<String> = replicator
        .replicate_one(&(), &rect, 0)
        .unwrap()
        .iter()
        .map(|e| e.code().to_string())
        .collect();
    let second: Vec<String> = replicator
        .replicate_one(&(), &rect, 0)
        .unwrap()
        .iter()
        .map(|e| e.code().to_string())
        .collect();
    assert_eq!(first, second);
}
