use crate::common::{Predicate, Rectangle};
use crate::config::PartitionConfig;
use crate::errors::ZweepResult;
use crate::join::driver::MergeJoin;
use crate::join::{prefix_overlap, stack_area_pair};
use crate::metrics::MetricsRegistry;
use crate::replicate::ZEntry;

/// The baseline sort-merge join over plain z-order codes.
///
/// Each input rectangle is encoded exactly once; no replication takes
/// place. Boundary straddlers therefore keep their short codes and act as
/// near-universal matchers, which is correct but can degenerate: a
/// precision-0 entry is probed against the entire opposite buffer. The
/// replicating variants exist to fix exactly that.
pub struct OrensteinJoin {
    config: PartitionConfig,
    metrics: Option<MetricsRegistry>,
}

impl OrensteinJoin {
    pub fn new(config: PartitionConfig) -> Self {
        OrensteinJoin {
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Encodes, sorts and merges two rectangle collections.
    ///
    /// `rect_of` maps a payload to its bounding rectangle; `predicate` is
    /// the actual spatial condition, re-checked on every candidate pair the
    /// code overlap produces.
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
        F: Fn(&T) -> Rectangle,
        M: Fn(&ZEntry<T>, &ZEntry<T>) -> R + 'static,
    {
        let left = self.encode_sorted(left, &rect_of)?;
        let right = self.encode_sorted(right, &rect_of)?;
        let driver = MergeJoin::new(
            Box::new(left.into_iter().map(Ok)),
            Box::new(right.into_iter().map(Ok)),
            stack_area_pair(prefix_overlap())?,
            predicate,
            mapper,
        )?;
        Ok(match &self.metrics {
            Some(metrics) => driver.with_metrics(metrics.clone()),
            None => driver,
        })
    }

    /// Encodes one input collection and sorts it into merge order,
    /// sequence numbers following arrival order.
    pub fn encode_sorted<T, F>(&self, input: Vec<T>, rect_of: F) -> ZweepResult<Vec<ZEntry<T>>>
    where
        F: Fn(&T) -> Rectangle,
    {
        let mut entries = Vec::with_capacity(input.len());
        for (sequence, data) in input.into_iter().enumerate() {
            let rect = rect_of(&data);
            entries.push(ZEntry::encode(data, sequence as u64, &rect, &self.config)?);
        }
        entries.sort();
        Ok(entries)
    }
}
