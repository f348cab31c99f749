use std::sync::Arc;

use crate::common::{Predicate, PredicateProvider, Rectangle};
use crate::config::PartitionConfig;
use crate::curve::{z_code_point, Coded};
use crate::errors::ZweepResult;
use crate::join::driver::MergeJoin;
use crate::join::{prefix_overlap, stack_area_pair};
use crate::metrics::MetricsRegistry;
use crate::replicate::{Replicator, SplitPolicy, Traversal, ZEntry};

/// The replicating sort-merge join.
///
/// Boundary straddlers are split by a [`Replicator`] before encoding, so
/// every fragment carries a selective code and the merge stays cheap. The
/// price is that one logical pair can surface once per fragment pair; the
/// reference-point filter restores exactly-once semantics by accepting a
/// replicated pair only in the fragment pair whose cell contains the pair's
/// reference point (the component-wise maximum of the two lower corners,
/// inset by half the join distance).
pub struct GessJoin {
    config: PartitionConfig,
    policy: SplitPolicy,
    traversal: Traversal,
    epsilon: f64,
    metrics: Option<MetricsRegistry>,
}

impl GessJoin {
    /// A replicating join with unlimited splitting and no join distance.
    pub fn new(config: PartitionConfig) -> Self {
        GessJoin {
            config,
            policy: SplitPolicy::unlimited(),
            traversal: Traversal::BreadthFirst,
            epsilon: 0.0,
            metrics: None,
        }
    }

    pub fn with_policy(mut self, policy: SplitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    /// Sets the join distance the reference point is inset by. Use the same
    /// epsilon the join predicate uses.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replicates, encodes, sorts and merges two rectangle collections.
    pub fn join<T, R, F, M>(
        &self,
        left: Vec<T>,
        right: Vec<T>,
        rect_of: F,
        predicate: Predicate<T, T>,
        mapper: M,
    ) -> ZweepResult<MergeJoin<T, R>>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&T) -> Rectangle + Send + Sync + 'static,
        M: Fn(&ZEntry<T>, &ZEntry<T>) -> R + 'static,
    {
        let rect_of: Arc<dyn Fn(&T) -> Rectangle + Send + Sync> = Arc::new(rect_of);
        let replicator = Replicator::new(self.config.clone(), self.policy.clone(), self.traversal);
        if let Some(metrics) = &self.metrics {
            replicator.set_metrics(metrics.clone());
        }

        let left = self.replicate_sorted(&replicator, left, &rect_of)?;
        let right = self.replicate_sorted(&replicator, right, &rect_of)?;

        let filter = Predicate::new(ReferencePointFilter {
            rect_of: Arc::clone(&rect_of),
            config: self.config.clone(),
            epsilon: self.epsilon,
        });
        let driver = MergeJoin::new(
            Box::new(left.into_iter().map(Ok)),
            Box::new(right.into_iter().map(Ok)),
            stack_area_pair(prefix_overlap())?,
            predicate,
            mapper,
        )?
        .with_pair_filter(filter);
        Ok(match &self.metrics {
            Some(metrics) => driver.with_metrics(metrics.clone()),
            None => driver,
        })
    }

    fn replicate_sorted<T>(
        &self,
        replicator: &Replicator,
        input: Vec<T>,
        rect_of: &Arc<dyn Fn(&T) -> Rectangle + Send + Sync>,
    ) -> ZweepResult<Vec<ZEntry<T>>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let rect_of = Arc::clone(rect_of);
        let mut entries = Vec::with_capacity(input.len());
        for entry in replicator.stream(input, move |data: &T| rect_of(data)) {
            entries.push(entry?);
        }
        entries.sort();
        Ok(entries)
    }
}

/// Accepts a replicated candidate pair only in the fragment pair whose cell
/// contains the reference point; pairs with no replicated side always pass.
struct ReferencePointFilter<T> {
    rect_of: Arc<dyn Fn(&T) -> Rectangle + Send + Sync>,
    config: PartitionConfig,
    epsilon: f64,
}

impl<T> PredicateProvider<ZEntry<T>, ZEntry<T>> for ReferencePointFilter<T>
where
    T: Send + Sync,
{
    fn test(&self, left: &ZEntry<T>, right: &ZEntry<T>) -> ZweepResult<bool> {
        if !left.is_replicate() && !right.is_replicate() {
            return Ok(true);
        }
        let left_rect = (self.rect_of)(left.data());
        let right_rect = (self.rect_of)(right.data());
        let mut point = Vec::with_capacity(self.config.dimensions());
        for d in 0..self.config.dimensions() {
            let corner = left_rect.lower()[d].max(right_rect.lower()[d]);
            point.push(corner - self.epsilon / 2.0);
        }
        let reference = z_code_point(&point, &self.config)?;

        let finer = if left.code().precision() >= right.code().precision() {
            left.code()
        } else {
            right.code()
        };
        Ok(finer.is_prefix_of(&reference))
    }

    fn name(&self) -> &str {
        "reference-point-filter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::{DUPLICATES_DROPPED, RESULT_PAIRS};

    fn config() -> PartitionConfig {
        PartitionConfig::new(2, 3).unwrap()
    }

    fn rect_of(r: &(f64, f64, f64, f64)) -> Rectangle {
        Rectangle::new(&[r.0, r.1], &[r.2, r.3]).unwrap()
    }

    fn intersects() -> Predicate<(f64, f64, f64, f64), (f64, f64, f64, f64)> {
        Predicate::from_fn(|a: &(f64, f64, f64, f64), b: &(f64, f64, f64, f64)| {
            rect_of(a).intersects(&rect_of(b))
        })
    }

    fn run(
        join: &GessJoin,
        left: Vec<(f64, f64, f64, f64)>,
        right: Vec<(f64, f64, f64, f64)>,
    ) -> Vec<(u64, u64)> {
        let driver = join
            .join(left, right, rect_of, intersects(), |a, b| {
                (a.sequence(), b.sequence())
            })
            .unwrap();
        let mut pairs: Vec<(u64, u64)> = driver.map(|r| r.unwrap()).collect();
        pairs.sort();
        pairs
    }

    #[test]
    fn test_replicated_pair_is_emitted_exactly_once() {
        // both rectangles straddle the center, fragments overlap in every
        // quadrant; the reference point keeps one fragment pair
        let metrics = MetricsRegistry::new();
        let join = GessJoin::new(config()).with_metrics(metrics.clone());
        let pairs = run(
            &join,
            vec![(0.4, 0.4, 0.6, 0.6)],
            vec![(0.45, 0.45, 0.65, 0.65)],
        );
        assert_eq!(pairs, vec![(0, 0)]);
        assert_eq!(metrics.get(RESULT_PAIRS), 1);
        assert!(metrics.get(DUPLICATES_DROPPED) > 0);
    }

    #[test]
    fn test_unreplicated_pairs_skip_the_filter() {
        let join = GessJoin::new(config());
        let pairs = run(
            &join,
            vec![(0.1, 0.1, 0.2, 0.2)],
            vec![(0.15, 0.15, 0.22, 0.22)],
        );
        assert_eq!(pairs, vec![(0, 0)]);
    }

    #[test]
    fn test_matches_baseline_on_clustered_data() {
        use crate::join::OrensteinJoin;

        let left = vec![
            (0.10, 0.10, 0.30, 0.30),
            (0.40, 0.40, 0.60, 0.60),
            (0.70, 0.10, 0.90, 0.45),
        ];
        let right = vec![
            (0.25, 0.25, 0.45, 0.45),
            (0.55, 0.55, 0.75, 0.75),
            (0.05, 0.80, 0.20, 0.95),
        ];

        let gess = run(&GessJoin::new(config()), left.clone(), right.clone());
        let baseline = OrensteinJoin::new(config())
            .join(left, right, rect_of, intersects(), |a, b| {
                (a.sequence(), b.sequence())
            })
            .unwrap();
        let mut baseline: Vec<(u64, u64)> = baseline.map(|r| r.unwrap()).collect();
        baseline.sort();
        assert_eq!(gess, baseline);
        assert!(!gess.is_empty());
    }

    #[test]
    fn test_bounded_policy_still_joins_correctly() {
        let join = GessJoin::new(config())
            .with_policy(SplitPolicy::max_generation(1))
            .with_traversal(Traversal::LifoDepthFirst);
        let pairs = run(
            &join,
            vec![(0.4, 0.4, 0.6, 0.6)],
            vec![(0.45, 0.45, 0.65, 0.65)],
        );
        assert_eq!(pairs, vec![(0, 0)]);
    }

    #[test]
    fn test_epsilon_inset_keeps_exactly_one_pair() {
        // distance join: the reference point is inset by eps/2, landing in
        // a cell both replicated sides cover exactly once
        let eps = 0.1;
        let within = Predicate::from_fn(move |a: &(f64, f64, f64, f64), b: &(f64, f64, f64, f64)| {
            let (ra, rb) = (rect_of(a), rect_of(b));
            (0..2).all(|d| {
                ra.lower()[d] - eps <= rb.upper()[d] && rb.lower()[d] - eps <= ra.upper()[d]
            })
        });
        let join = GessJoin::new(config()).with_epsilon(eps);
        let driver = join
            .join(
                vec![(0.40, 0.40, 0.60, 0.60)],
                vec![(0.45, 0.45, 0.65, 0.65)],
                rect_of,
                within,
                |a, b| (a.sequence(), b.sequence()),
            )
            .unwrap();
        let pairs: Vec<(u64, u64)> = driver.map(|r| r.unwrap()).collect();
        assert_eq!(pairs, vec![(0, 0)]);
    }
}
