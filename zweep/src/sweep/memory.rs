use std::sync::Arc;

use crate::common::constants::{ELEMENTS_SHED, MEMORY_USAGE, OBJECT_SIZE};
use crate::common::{atomic, Atomic, ElementStream, ReadExecutor, WriteExecutor};
use crate::errors::{ErrorKind, ZweepError, ZweepResult};
use crate::metrics::MetricsRegistry;
use crate::sweep::sweep_area::{SweepArea, SweepAreaProvider};

/// How the byte footprint per buffered element is determined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectSize {
    /// Footprint unknown; memory accounting and load shedding are disabled.
    Unknown,
    /// Caller-supplied footprint in bytes.
    Bytes(usize),
    /// Measure the shallow footprint (`size_of`) of the first inserted
    /// element. Heap-heavy payloads should supply [`ObjectSize::Bytes`]
    /// instead, since the shallow size misses owned allocations.
    Measure,
}

/// Emits `true` exactly `numerator` times over every `denominator` calls,
/// spread as evenly as the call sequence allows.
///
/// This is the load-shedding selector: deterministic for a given call
/// sequence, never a random number generator, so tests can assert the exact
/// emitted ratio.
#[derive(Debug)]
pub struct RationalFilter {
    numerator: usize,
    denominator: usize,
    accumulator: usize,
}

impl RationalFilter {
    pub fn new(numerator: usize, denominator: usize) -> Self {
        RationalFilter {
            numerator,
            denominator,
            accumulator: 0,
        }
    }

    pub fn take(&mut self) -> bool {
        self.accumulator += self.numerator;
        if self.accumulator >= self.denominator {
            self.accumulator -= self.denominator;
            true
        } else {
            false
        }
    }
}

/// Memory-bounding decorator over any sweep area.
///
/// Tracks usage as `object_size × size()` against an assigned byte budget.
/// When an insertion pushes usage over the budget, overflow handling drops
/// enough elements to bring occupancy down to 80% of the budget, selecting
/// victims with a [`RationalFilter`] over the iteration order so removals
/// are spread across the whole buffer rather than concentrated at one end.
///
/// Shedding is a designed, lossy, non-error behavior: the caller who opted
/// into bounded memory trades result completeness for the bound. It is the
/// only place in the engine where elements disappear without an error.
pub struct MemoryManagedSweepArea<I, E> {
    inner: Arc<MemoryInner<I, E>>,
}

impl<I, E> Clone for MemoryManagedSweepArea<I, E> {
    fn clone(&self) -> Self {
        MemoryManagedSweepArea {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct MemoryInner<I, E> {
    area: SweepArea<I, E>,
    assigned: Atomic<usize>,
    mode: ObjectSize,
    resolved: Atomic<Option<usize>>,
    metrics: Atomic<Option<MetricsRegistry>>,
}

impl<I, E> MemoryManagedSweepArea<I, E>
where
    I: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(
        area: SweepArea<I, E>,
        assigned_mem_size: usize,
        object_size: ObjectSize,
    ) -> ZweepResult<Self> {
        if assigned_mem_size == 0 {
            return Err(ZweepError::new(
                "assigned memory size must be positive",
                ErrorKind::InvalidArgument,
            ));
        }
        if let ObjectSize::Bytes(0) = object_size {
            return Err(ZweepError::new(
                "object size must be positive",
                ErrorKind::InvalidArgument,
            ));
        }
        let resolved = match object_size {
            ObjectSize::Bytes(bytes) => Some(bytes),
            _ => None,
        };
        Ok(MemoryManagedSweepArea {
            inner: Arc::new(MemoryInner {
                area,
                assigned: atomic(assigned_mem_size),
                mode: object_size,
                resolved: atomic(resolved),
                metrics: atomic(None),
            }),
        })
    }

    /// Current usage in bytes; zero while the object size is unknown.
    pub fn memory_usage(&self) -> ZweepResult<usize> {
        match self.inner.resolved.read_with(|r| *r) {
            Some(object_size) => Ok(self.inner.area.size()? * object_size),
            None => Ok(0),
        }
    }

    pub fn assigned_mem_size(&self) -> usize {
        self.inner.assigned.read_with(|a| *a)
    }

    /// Re-assigns the byte budget; a smaller budget immediately re-triggers
    /// overflow handling.
    pub fn set_assigned_mem_size(&self, bytes: usize) -> ZweepResult<()> {
        if bytes == 0 {
            return Err(ZweepError::new(
                "assigned memory size must be positive",
                ErrorKind::InvalidArgument,
            ));
        }
        self.inner.assigned.write_with(|a| *a = bytes);
        self.shed_if_over_budget()?;
        Ok(())
    }

    fn resolve_object_size(&self, element: &E) {
        if self.inner.mode == ObjectSize::Measure {
            self.inner.resolved.write_with(|resolved| {
                if resolved.is_none() {
                    *resolved = Some(std::mem::size_of_val(element).max(1));
                }
            });
        }
    }

    fn record_usage(&self) {
        self.inner.metrics.read_with(|m| {
            if let Some(metrics) = m {
                if let Ok(usage) = self.memory_usage() {
                    metrics.set(MEMORY_USAGE, usage as u64);
                }
                if let Some(object_size) = self.inner.resolved.read_with(|r| *r) {
                    metrics.set(OBJECT_SIZE, object_size as u64);
                }
            }
        });
    }

    fn shed_if_over_budget(&self) -> ZweepResult<usize> {
        let object_size = match self.inner.resolved.read_with(|r| *r) {
            Some(s) if s > 0 => s,
            _ => return Ok(0),
        };
        let assigned = self.inner.assigned.read_with(|a| *a);
        let count = self.inner.area.size()?;
        if count * object_size <= assigned {
            return Ok(0);
        }

        // target 80% occupancy of the assignment
        let max_allowed = (4 * assigned) / (5 * object_size);
        if count <= max_allowed {
            return Ok(0);
        }
        let overage = count - max_allowed;

        let mut snapshot = Vec::with_capacity(count);
        for element in self.inner.area.iter()? {
            snapshot.push(element?);
        }
        let mut filter = RationalFilter::new(overage, snapshot.len());
        let mut shed = 0usize;
        for element in &snapshot {
            if filter.take() && self.inner.area.remove(element)? {
                shed += 1;
            }
        }
        log::debug!(
            "load shedding dropped {} of {} buffered elements (budget {} bytes)",
            shed,
            count,
            assigned
        );
        self.inner.metrics.read_with(|m| {
            if let Some(metrics) = m {
                metrics.add(ELEMENTS_SHED, shed as u64);
            }
        });
        self.record_usage();
        Ok(shed)
    }
}

impl<I, E> SweepAreaProvider<I, E> for MemoryManagedSweepArea<I, E>
where
    I: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn stream_id(&self) -> usize {
        self.inner.area.stream_id()
    }

    fn dimensions(&self) -> usize {
        self.inner.area.dimensions()
    }

    fn self_reorganize(&self) -> bool {
        self.inner.area.self_reorganize()
    }

    fn insert(&self, element: E) -> ZweepResult<()> {
        self.resolve_object_size(&element);
        self.inner.area.insert(element)?;
        self.shed_if_over_budget()?;
        self.record_usage();
        Ok(())
    }

    fn remove(&self, element: &E) -> ZweepResult<bool> {
        let removed = self.inner.area.remove(element)?;
        self.record_usage();
        Ok(removed)
    }

    fn update(&self, old: &E, new: E) -> ZweepResult<E> {
        self.inner.area.update(old, new)
    }

    fn query(&self, probe: &I, from_stream: usize) -> ZweepResult<ElementStream<E>> {
        self.inner.area.query(probe, from_stream)
    }

    fn query_multi(
        &self,
        probes: &[I],
        from_streams: &[usize],
        valid: usize,
    ) -> ZweepResult<ElementStream<E>> {
        self.inner.area.query_multi(probes, from_streams, valid)
    }

    fn expire(&self, watermark: &I, from_stream: usize) -> ZweepResult<ElementStream<E>> {
        self.inner.area.expire(watermark, from_stream)
    }

    fn reorganize(&self, watermark: &I, from_stream: usize) -> ZweepResult<()> {
        self.inner.area.reorganize(watermark, from_stream)?;
        self.record_usage();
        Ok(())
    }

    fn size(&self) -> ZweepResult<usize> {
        self.inner.area.size()
    }

    fn clear(&self) -> ZweepResult<()> {
        self.inner.area.clear()
    }

    fn close(&self) -> ZweepResult<()> {
        self.inner.area.close()
    }

    fn iter(&self) -> ZweepResult<ElementStream<E>> {
        self.inner.area.iter()
    }

    fn object_size(&self) -> Option<usize> {
        self.inner.resolved.read_with(|r| *r)
    }

    fn set_metrics(&self, metrics: MetricsRegistry) {
        self.inner.metrics.write_with(|m| *m = Some(metrics.clone()));
        self.inner.area.set_metrics(metrics);
    }
}
