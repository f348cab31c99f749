use std::collections::VecDeque;
use std::sync::Arc;

use crate::common::constants::{
    DUPLICATES_DROPPED, MAX_BUFFER_SIZE, PREDICATE_CALLS, PREDICATE_HITS, RESULT_PAIRS,
};
use crate::common::Predicate;
use crate::errors::{ErrorKind, ZweepError, ZweepResult};
use crate::metrics::MetricsRegistry;
use crate::replicate::ZEntry;
use crate::sweep::SweepArea;

/// Boxed sorted input feeding one side of the merge.
pub type EntryInput<T> = Box<dyn Iterator<Item = ZweepResult<ZEntry<T>>>>;

/// The sort-merge core shared by every join variant.
///
/// Both inputs must be sorted by entry order (code, then sequence). The
/// driver repeatedly consumes the smaller head, reorganizes both sweep
/// areas with it as the watermark, probes the opposite area for candidates,
/// and buffers it in its own area for later probes from the other side.
/// Ties are broken in favor of the left input, which keeps the merge
/// deterministic and result pairs in stream order: the left input's entry
/// is always the first component.
///
/// Candidate pairs found by the sweep-area query predicates still pass
/// through the join predicate (evaluated on the payloads) and, when
/// configured, a pair filter over the full entries; the filter is where
/// replication-induced duplicates are dropped.
///
/// The iterator is fused: after both inputs are exhausted, or after the
/// first error, it yields `None` forever and the sweep areas are closed.
pub struct MergeJoin<T, R> {
    inputs: [EntryInput<T>; 2],
    heads: [Option<ZEntry<T>>; 2],
    areas: [SweepArea<ZEntry<T>, ZEntry<T>>; 2],
    predicate: Predicate<T, T>,
    pair_filter: Option<Predicate<ZEntry<T>, ZEntry<T>>>,
    mapper: Arc<dyn Fn(&ZEntry<T>, &ZEntry<T>) -> R>,
    pending: VecDeque<R>,
    metrics: Option<MetricsRegistry>,
    primed: bool,
    done: bool,
}

impl<T, R> std::fmt::Debug for MergeJoin<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeJoin").finish_non_exhaustive()
    }
}

impl<T, R> MergeJoin<T, R>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wires a driver over two sorted inputs and their sweep areas.
    ///
    /// `areas[0]` buffers the left input and must have stream id 0,
    /// `areas[1]` the right with stream id 1; both must be configured for
    /// two streams.
    pub fn new<F>(
        left: EntryInput<T>,
        right: EntryInput<T>,
        areas: [SweepArea<ZEntry<T>, ZEntry<T>>; 2],
        predicate: Predicate<T, T>,
        mapper: F,
    ) -> ZweepResult<Self>
    where
        F: Fn(&ZEntry<T>, &ZEntry<T>) -> R + 'static,
    {
        for (expected, area) in areas.iter().enumerate() {
            if area.stream_id() != expected || area.dimensions() != 2 {
                log::error!(
                    "merge join rejected sweep area: stream id {} of {} streams, expected {} of 2",
                    area.stream_id(),
                    area.dimensions(),
                    expected
                );
                return Err(ZweepError::new(
                    "merge join requires two-stream sweep areas with ids 0 and 1",
                    ErrorKind::InvalidArgument,
                ));
            }
        }
        Ok(MergeJoin {
            inputs: [left, right],
            heads: [None, None],
            areas,
            predicate,
            pair_filter: None,
            mapper: Arc::new(mapper),
            pending: VecDeque::new(),
            metrics: None,
            primed: false,
            done: false,
        })
    }

    /// Installs a filter evaluated on every predicate-accepted pair, in
    /// stream order. Rejected pairs count as dropped duplicates.
    pub fn with_pair_filter(mut self, filter: Predicate<ZEntry<T>, ZEntry<T>>) -> Self {
        self.pair_filter = Some(filter);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        for area in &self.areas {
            area.set_metrics(metrics.clone());
        }
        self.metrics = Some(metrics);
        self
    }

    /// Closes both sweep areas. Called automatically on exhaustion.
    pub fn close(&self) -> ZweepResult<()> {
        self.areas[0].close()?;
        self.areas[1].close()
    }

    fn advance(&mut self, stream: usize) -> ZweepResult<()> {
        self.heads[stream] = self.inputs[stream].next().transpose()?;
        Ok(())
    }

    /// Consumes input until at least one result pair is buffered or both
    /// inputs run dry.
    fn fill_pending(&mut self) -> ZweepResult<bool> {
        if !self.primed {
            self.advance(0)?;
            self.advance(1)?;
            self.primed = true;
        }
        while self.pending.is_empty() {
            let stream = match (&self.heads[0], &self.heads[1]) {
                (None, None) => return Ok(false),
                (Some(_), None) => 0,
                (None, Some(_)) => 1,
                (Some(left), Some(right)) => {
                    if left <= right {
                        0
                    } else {
                        1
                    }
                }
            };
            let entry = self.heads[stream].take().expect("head checked above");
            self.advance(stream)?;

            // the consumed entry is the watermark for both buffers
            self.areas[0].reorganize(&entry, stream)?;
            self.areas[1].reorganize(&entry, stream)?;

            let other = 1 - stream;
            let candidates = self.areas[other].query(&entry, stream)?;
            for candidate in candidates {
                let candidate = candidate?;
                let (left, right) = if stream == 0 {
                    (&entry, &candidate)
                } else {
                    (&candidate, &entry)
                };
                if let Some(metrics) = &self.metrics {
                    metrics.increment(PREDICATE_CALLS);
                }
                if !self.predicate.test(left.data(), right.data())? {
                    continue;
                }
                if let Some(metrics) = &self.metrics {
                    metrics.increment(PREDICATE_HITS);
                }
                if let Some(filter) = &self.pair_filter {
                    if !filter.test(left, right)? {
                        if let Some(metrics) = &self.metrics {
                            metrics.increment(DUPLICATES_DROPPED);
                        }
                        continue;
                    }
                }
                if let Some(metrics) = &self.metrics {
                    metrics.increment(RESULT_PAIRS);
                }
                self.pending.push_back((self.mapper)(left, right));
            }

            self.areas[stream].insert(entry)?;
            if let Some(metrics) = &self.metrics {
                let buffered = self.areas[0].size()? + self.areas[1].size()?;
                metrics.raise_to(MAX_BUFFER_SIZE, buffered as u64);
            }
        }
        Ok(true)
    }
}

impl<T, R> Iterator for MergeJoin<T, R>
where
    T: Clone + Send + Sync + 'static,
{
    type Item = ZweepResult<R>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(result) = self.pending.pop_front() {
            return Some(Ok(result));
        }
        match self.fill_pending() {
            Ok(true) => self.pending.pop_front().map(Ok),
            Ok(false) => {
                self.done = true;
                if let Err(err) = self.close() {
                    return Some(Err(err));
                }
                None
            }
            Err(err) => {
                self.done = true;
                let _ = self.close();
                Some(Err(err))
            }
        }
    }
}
