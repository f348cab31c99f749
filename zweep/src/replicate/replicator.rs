use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::common::constants::{REPLICAS_EMITTED, SPLITS_PERFORMED};
use crate::common::{atomic, Atomic, ReadExecutor, Rectangle, WriteExecutor};
use crate::config::PartitionConfig;
use crate::curve::{cell_of, z_code, BitCode};
use crate::errors::ZweepResult;
use crate::metrics::MetricsRegistry;
use crate::replicate::entry::ZEntry;
use crate::replicate::split_policy::{SplitPolicy, SplitStatus};

/// Work-queue discipline for processing pending split fragments.
///
/// Breadth-first processes fragments level by level; the LIFO variant dives
/// into the left-most fragment first and keeps the queue shallow. Both emit
/// the same set of replicas, only in a different order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Traversal {
    BreadthFirst,
    LifoDepthFirst,
}

/// Splits boundary-straddling rectangles into fragments with longer codes.
///
/// A rectangle that straddles a partition boundary gets a short z-order
/// code, which forces the merge to treat it as a near-universal matcher.
/// The replicator instead cuts such a rectangle at the offending boundary
/// and encodes each fragment separately, trading duplicates in the join
/// output (eliminated downstream by the reference-point filter) for much
/// more selective codes.
///
/// Splitting is iterative over an explicit work queue; recursion depth never
/// depends on the partition depth. The injected [`SplitPolicy`] bounds the
/// replication cost per input, and `min_bit_index` of the partition
/// configuration caps code length globally: all emitted codes are truncated
/// to `(max_level - min_bit_index) × dimensions` bits.
pub struct Replicator {
    config: PartitionConfig,
    policy: SplitPolicy,
    traversal: Traversal,
    metrics: Atomic<Option<MetricsRegistry>>,
}

impl Clone for Replicator {
    fn clone(&self) -> Self {
        Replicator {
            config: self.config.clone(),
            policy: self.policy.clone(),
            traversal: self.traversal,
            metrics: atomic(self.metrics.read_with(|m| m.clone())),
        }
    }
}

struct SplitTask {
    rect: Rectangle,
    generation: u32,
}

impl Replicator {
    pub fn new(config: PartitionConfig, policy: SplitPolicy, traversal: Traversal) -> Self {
        Replicator {
            config,
            policy,
            traversal,
            metrics: atomic(None),
        }
    }

    /// A replicator that never splits; every input maps to one entry.
    pub fn disabled(config: PartitionConfig) -> Self {
        Replicator::new(config, SplitPolicy::none(), Traversal::BreadthFirst)
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    pub fn set_metrics(&self, metrics: MetricsRegistry) {
        self.metrics.write_with(|m| *m = Some(metrics));
    }

    /// Encodes one payload, splitting its rectangle as the policy allows.
    ///
    /// All produced entries carry the payload (cloned) and the given
    /// sequence number; entries of a split input have the replicate flag
    /// set. The returned vector follows queue-processing order, not code
    /// order.
    pub fn replicate_one<T: Clone>(
        &self,
        data: &T,
        rect: &Rectangle,
        sequence: u64,
    ) -> ZweepResult<Vec<ZEntry<T>>> {
        self.policy.reset();
        let code_cap =
            (self.config.max_level() - self.config.min_bit_index()) * self.config.dimensions() as u32;

        let mut queue: VecDeque<SplitTask> = VecDeque::new();
        queue.push_back(SplitTask {
            rect: rect.clone(),
            generation: 0,
        });
        let mut splits_at_level: HashMap<u32, u32> = HashMap::new();
        let mut splits = 0u64;
        let mut out: Vec<ZEntry<T>> = Vec::new();

        loop {
            let task = match self.traversal {
                Traversal::BreadthFirst => queue.pop_front(),
                Traversal::LifoDepthFirst => queue.pop_back(),
            };
            let task = match task {
                Some(task) => task,
                None => break,
            };

            if let Some((dim, level)) = self.find_split(&task.rect) {
                let performed = splits_at_level.get(&level).copied().unwrap_or(0);
                let status = SplitStatus {
                    generation: task.generation,
                    bit_index: level,
                    splits_at_level: performed,
                    // the task in hand plus everything finalized or queued
                    replicates_emitted: (out.len() + queue.len() + 1) as u32,
                };
                if self.policy.allow_split(&status) {
                    *splits_at_level.entry(level).or_insert(0) += 1;
                    splits += 1;
                    let (left, right) = self.split_at(&task.rect, dim, level);
                    let generation = task.generation + 1;
                    match self.traversal {
                        Traversal::BreadthFirst => {
                            queue.push_back(SplitTask { rect: left, generation });
                            queue.push_back(SplitTask { rect: right, generation });
                        }
                        Traversal::LifoDepthFirst => {
                            queue.push_back(SplitTask { rect: right, generation });
                            queue.push_back(SplitTask { rect: left, generation });
                        }
                    }
                    continue;
                }
                log::debug!(
                    "split policy {} stopped replication at level {} (generation {})",
                    self.policy.name(),
                    level,
                    task.generation
                );
            }

            out.push(ZEntry::with_code(
                data.clone(),
                sequence,
                self.fragment_code(&task.rect, code_cap),
                task.generation > 0,
            ));
        }

        self.metrics.read_with(|m| {
            if let Some(metrics) = m {
                metrics.add(SPLITS_PERFORMED, splits);
                let replicas = out.iter().filter(|e| e.is_replicate()).count();
                metrics.add(REPLICAS_EMITTED, replicas as u64);
            }
        });
        Ok(out)
    }

    /// Lazily replicates a whole input stream, assigning sequence numbers in
    /// arrival order.
    ///
    /// The output is not sorted by code; the merge drivers sort after
    /// collection.
    pub fn stream<T, I, F>(&self, input: I, rect_of: F) -> ReplicateStream<T, I::IntoIter>
    where
        T: Clone,
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> Rectangle + Send + Sync + 'static,
    {
        ReplicateStream {
            replicator: self.clone(),
            input: input.into_iter(),
            rect_of: Arc::new(rect_of),
            pending: VecDeque::new(),
            sequence: 0,
        }
    }

    /// The longest bit-order code prefix the rectangle determines, capped
    /// at `code_cap` bits.
    ///
    /// Unlike the even-length rectangle code of [`z_code`], this keeps every
    /// leading bit whose dimension still agrees at that depth, so a
    /// policy-stopped fragment retains the bits its split path already
    /// fixed. Fragment cells of one input are then pairwise disjoint, which
    /// the downstream duplicate elimination depends on.
    fn fragment_code(&self, rect: &Rectangle, code_cap: u32) -> BitCode {
        let max_level = self.config.max_level();
        let dims = self.config.dimensions();
        let mut cells = Vec::with_capacity(dims);
        let mut agreements = Vec::with_capacity(dims);
        for d in 0..dims {
            let lo = cell_of(rect.lower()[d], max_level);
            let up = cell_of(rect.upper()[d], max_level);
            let agreement = if lo == up {
                max_level
            } else {
                let highest_diff = 63 - (lo ^ up).leading_zeros();
                max_level - (highest_diff + 1)
            };
            cells.push(lo);
            agreements.push(agreement);
        }
        let mut code = BitCode::new();
        for pos in 0..code_cap {
            let d = (pos as usize) % dims;
            let level = pos / dims as u32;
            if level >= agreements[d] {
                break;
            }
            code.push((cells[d] >> (max_level - 1 - level)) & 1 == 1);
        }
        code
    }

    /// The dimension and level of the coarsest partition boundary the
    /// rectangle straddles, if it straddles one above the splitting floor.
    fn find_split(&self, rect: &Rectangle) -> Option<(usize, u32)> {
        let max_level = self.config.max_level();
        let effective_depth = max_level - self.config.min_bit_index();
        let mut coarsest: Option<(usize, u32)> = None;
        for d in 0..self.config.dimensions() {
            let lo = cell_of(rect.lower()[d], max_level);
            let up = cell_of(rect.upper()[d], max_level);
            if lo == up {
                continue;
            }
            let highest_diff = 63 - (lo ^ up).leading_zeros();
            let agreement = max_level - (highest_diff + 1);
            if coarsest.map_or(true, |(_, level)| agreement < level) {
                coarsest = Some((d, agreement));
            }
        }
        match coarsest {
            Some((dim, level)) if level < effective_depth => Some((dim, level)),
            _ => None,
        }
    }

    /// Cuts the rectangle at the partition boundary of `level` in dimension
    /// `dim`. The left fragment's upper corner lands in the middle of the
    /// last cell below the boundary so it can never be flushed back across.
    fn split_at(&self, rect: &Rectangle, dim: usize, level: u32) -> (Rectangle, Rectangle) {
        let max_level = self.config.max_level();
        let shift = max_level - 1 - level;
        let cells = (1u64 << max_level) as f64;
        let up_cell = cell_of(rect.upper()[dim], max_level);
        let boundary_cell = (up_cell >> shift) << shift;
        let boundary = boundary_cell as f64 / cells;

        let left_upper = ((boundary_cell as f64 - 0.5) / cells).max(rect.lower()[dim]);
        let left = rect.with_upper(dim, left_upper);
        let right = rect.with_lower(dim, boundary);
        (left, right)
    }
}

/// Lazy adapter produced by [`Replicator::stream`].
pub struct ReplicateStream<T, I>
where
    I: Iterator<Item = T>,
{
    replicator: Replicator,
    input: I,
    rect_of: Arc<dyn Fn(&T) -> Rectangle + Send + Sync>,
    pending: VecDeque<ZEntry<T>>,
    sequence: u64,
}

impl<T, I> Iterator for ReplicateStream<T, I>
where
    T: Clone,
    I: Iterator<Item = T>,
{
    type Item = ZweepResult<ZEntry<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(Ok(entry));
            }
            let data = self.input.next()?;
            let rect = (self.rect_of)(&data);
            match self.replicator.replicate_one(&data, &rect, self.sequence) {
                Ok(entries) => {
                    self.sequence += 1;
                    self.pending.extend(entries);
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
