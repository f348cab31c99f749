use itertools::Itertools;
use std::collections::BTreeMap;

use crate::common::Predicate;
use crate::config::PartitionConfig;
use crate::curve::Coded;
use crate::errors::ZweepResult;
use crate::join::driver::MergeJoin;
use crate::join::{prefix_overlap, stack_area_pair};
use crate::metrics::MetricsRegistry;
use crate::replicate::ZEntry;

/// The multi-level sort-merge join.
///
/// Instead of one global sort, entries are first distributed into level
/// files keyed by their code depth (`precision / dimensions`, capped at the
/// partition depth). Each level file is sorted independently, which keeps
/// individual runs small, and the files are k-merged back into the global
/// order that feeds the standard driver.
///
/// Level 0 collects every entry with a near-empty code. Those entries sort
/// to the very front of the merge and stay buffered for its entire
/// duration, probing against everything; a heavily populated level 0 is
/// the signal to replicate the input first.
pub struct MsjJoin {
    config: PartitionConfig,
    metrics: Option<MetricsRegistry>,
}

impl MsjJoin {
    pub fn new(config: PartitionConfig) -> Self {
        MsjJoin {
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Merges two collections of already-encoded entries.
    ///
    /// The inputs need not be sorted; level distribution and the k-merge
    /// establish the order. Entries coming out of a replicator should go
    /// through the duplicate filter of [`crate::join::GessJoin`] instead.
    pub fn join<T, R, M>(
        &self,
        left: Vec<ZEntry<T>>,
        right: Vec<ZEntry<T>>,
        predicate: Predicate<T, T>,
        mapper: M,
    ) -> ZweepResult<MergeJoin<T, R>>
    where
        T: Clone + Send + Sync + 'static,
        M: Fn(&ZEntry<T>, &ZEntry<T>) -> R + 'static,
    {
        let left = self.level_merge(left);
        let right = self.level_merge(right);
        let driver = MergeJoin::new(
            Box::new(left.map(Ok)),
            Box::new(right.map(Ok)),
            stack_area_pair(prefix_overlap())?,
            predicate,
            mapper,
        )?;
        Ok(match &self.metrics {
            Some(metrics) => driver.with_metrics(metrics.clone()),
            None => driver,
        })
    }

    /// Distributes entries into level files, sorts each file and k-merges
    /// the files into one globally ordered stream.
    pub fn level_merge<T>(&self, entries: Vec<ZEntry<T>>) -> impl Iterator<Item = ZEntry<T>> {
        let files = self.level_files(entries);
        files.into_values().kmerge_by(|a, b| a <= b)
    }

    /// The level-file distribution alone, keyed by code depth.
    pub fn level_files<T>(&self, entries: Vec<ZEntry<T>>) -> BTreeMap<u32, Vec<ZEntry<T>>> {
        let dims = self.config.dimensions() as u32;
        let max_level = self.config.max_level();
        let mut files: BTreeMap<u32, Vec<ZEntry<T>>> = BTreeMap::new();
        for entry in entries {
            let level = (entry.code().precision() / dims).min(max_level);
            files.entry(level).or_default().push(entry);
        }
        for file in files.values_mut() {
            file.sort();
        }
        files
    }
}
