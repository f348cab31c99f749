use std::sync::Arc;

use crate::common::constants::SIZE;
use crate::common::{
    atomic, Atomic, ElementStream, ElementStreamProvider, Predicate, ReadExecutor, WriteExecutor,
};
use crate::curve::{BitCode, Coded};
use crate::errors::{ErrorKind, ZweepError, ZweepResult};
use crate::metrics::MetricsRegistry;
use crate::sweep::implementor::{ImplementorRef, ScanQueryProvider, SweepAreaImplementor};

/// Trait for implementing sweep areas.
///
/// # Purpose
///
/// A sweep area is the stateful buffer holding the "currently relevant"
/// elements of one input stream during a sort-based merge. The provider
/// interface adds what the raw storage strategy lacks: stream identity,
/// per-stream predicate dispatch, and the watermark-driven reorganization
/// protocol that expires elements no longer able to match future probes.
///
/// # Characteristics
///
/// - **Per-stream**: one sweep area serves exactly one of the `dimensions`
///   participating streams and is never shared across concurrent joins
/// - **Bridge**: concrete providers delegate storage to an injected
///   [`SweepAreaImplementor`]
/// - **Watermark protocol**: `expire`/`reorganize` exploit input sortedness
///   to discard elements once the watermark moves past them
pub trait SweepAreaProvider<I, E>: Send + Sync {
    /// Which of the participating streams this area serves.
    fn stream_id(&self) -> usize;

    /// Total number of streams participating in the join.
    fn dimensions(&self) -> usize;

    /// Whether reorganization requests originating from this area's own
    /// stream are honored.
    fn self_reorganize(&self) -> bool;

    fn insert(&self, element: E) -> ZweepResult<()>;

    fn remove(&self, element: &E) -> ZweepResult<bool>;

    fn update(&self, old: &E, new: E) -> ZweepResult<E>;

    /// Probes the buffer with an element arriving on `from_stream`.
    fn query(&self, probe: &I, from_stream: usize) -> ZweepResult<ElementStream<E>>;

    fn query_multi(
        &self,
        probes: &[I],
        from_streams: &[usize],
        valid: usize,
    ) -> ZweepResult<ElementStream<E>>;

    /// Removes and yields every buffered element expired by the watermark.
    ///
    /// The returned stream is a removing view: each yielded element has
    /// already been removed from the underlying storage.
    fn expire(&self, watermark: &I, from_stream: usize) -> ZweepResult<ElementStream<E>>;

    /// Expires without yielding; semantically `expire` with the result
    /// discarded, but specializations may delete in bulk.
    fn reorganize(&self, watermark: &I, from_stream: usize) -> ZweepResult<()>;

    fn size(&self) -> ZweepResult<usize>;

    fn clear(&self) -> ZweepResult<()>;

    fn close(&self) -> ZweepResult<()>;

    fn iter(&self) -> ZweepResult<ElementStream<E>>;

    /// Byte footprint per element, when known.
    fn object_size(&self) -> Option<usize>;

    fn set_metrics(&self, metrics: MetricsRegistry);
}

/// A unified facade over any [`SweepAreaProvider`].
///
/// Clones share the same underlying area.
pub struct SweepArea<I, E> {
    inner: Arc<dyn SweepAreaProvider<I, E>>,
}

impl<I, E> Clone for SweepArea<I, E> {
    fn clone(&self) -> Self {
        SweepArea {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I, E> SweepArea<I, E> {
    pub fn new<T: SweepAreaProvider<I, E> + 'static>(provider: T) -> Self {
        SweepArea {
            inner: Arc::new(provider),
        }
    }

    pub fn stream_id(&self) -> usize {
        self.inner.stream_id()
    }

    pub fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    pub fn self_reorganize(&self) -> bool {
        self.inner.self_reorganize()
    }

    pub fn insert(&self, element: E) -> ZweepResult<()> {
        self.inner.insert(element)
    }

    pub fn remove(&self, element: &E) -> ZweepResult<bool> {
        self.inner.remove(element)
    }

    pub fn update(&self, old: &E, new: E) -> ZweepResult<E> {
        self.inner.update(old, new)
    }

    pub fn query(&self, probe: &I, from_stream: usize) -> ZweepResult<ElementStream<E>> {
        self.inner.query(probe, from_stream)
    }

    pub fn query_multi(
        &self,
        probes: &[I],
        from_streams: &[usize],
        valid: usize,
    ) -> ZweepResult<ElementStream<E>> {
        self.inner.query_multi(probes, from_streams, valid)
    }

    pub fn expire(&self, watermark: &I, from_stream: usize) -> ZweepResult<ElementStream<E>> {
        self.inner.expire(watermark, from_stream)
    }

    pub fn reorganize(&self, watermark: &I, from_stream: usize) -> ZweepResult<()> {
        self.inner.reorganize(watermark, from_stream)
    }

    pub fn size(&self) -> ZweepResult<usize> {
        self.inner.size()
    }

    pub fn clear(&self) -> ZweepResult<()> {
        self.inner.clear()
    }

    pub fn close(&self) -> ZweepResult<()> {
        self.inner.close()
    }

    pub fn iter(&self) -> ZweepResult<ElementStream<E>> {
        self.inner.iter()
    }

    pub fn object_size(&self) -> Option<usize> {
        self.inner.object_size()
    }

    pub fn set_metrics(&self, metrics: MetricsRegistry) {
        self.inner.set_metrics(metrics)
    }
}

/// The default sweep area: predicate-routing bridge over any implementor.
///
/// Expiration is a guarded sequential scan: every buffered element is tested
/// against `remove_predicates[from_stream]` bound to the watermark, and
/// matching elements are removed and yielded lazily through the returned
/// stream. Specialized areas (see [`StackSweepArea`]) replace the scan with
/// bulk deletion where an ordering invariant allows it.
pub struct DefaultSweepArea<I, E> {
    inner: Arc<DefaultInner<I, E>>,
}

impl<I, E> std::fmt::Debug for DefaultSweepArea<I, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultSweepArea").finish_non_exhaustive()
    }
}

impl<I, E> Clone for DefaultSweepArea<I, E> {
    fn clone(&self) -> Self {
        DefaultSweepArea {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct DefaultInner<I, E> {
    stream_id: usize,
    self_reorganize: bool,
    remove_predicates: Vec<Predicate<I, E>>,
    implementor: ImplementorRef<I, E>,
    object_size: Atomic<Option<usize>>,
    metrics: Atomic<Option<MetricsRegistry>>,
}

impl<I, E> DefaultSweepArea<I, E>
where
    I: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates and initializes a sweep area over the given implementor.
    ///
    /// `query_predicates` and `remove_predicates` must have equal non-zero
    /// length; that length is the number of participating streams and
    /// `stream_id` must index into it.
    pub fn new<M: SweepAreaImplementor<I, E> + 'static>(
        stream_id: usize,
        self_reorganize: bool,
        query_predicates: Vec<Predicate<I, E>>,
        remove_predicates: Vec<Predicate<I, E>>,
        equals: Predicate<E, E>,
        implementor: M,
    ) -> ZweepResult<Self> {
        if query_predicates.is_empty() || query_predicates.len() != remove_predicates.len() {
            log::error!(
                "sweep area predicate arrays malformed: {} query, {} remove",
                query_predicates.len(),
                remove_predicates.len()
            );
            return Err(ZweepError::new(
                "query and remove predicate arrays must be non-empty and of equal length",
                ErrorKind::InvalidArgument,
            ));
        }
        if stream_id >= query_predicates.len() {
            return Err(ZweepError::new(
                &format!(
                    "stream id {} out of range for {} streams",
                    stream_id,
                    query_predicates.len()
                ),
                ErrorKind::InvalidArgument,
            ));
        }
        implementor.initialize(stream_id, query_predicates, equals)?;
        Ok(DefaultSweepArea {
            inner: Arc::new(DefaultInner {
                stream_id,
                self_reorganize,
                remove_predicates,
                implementor: Arc::new(implementor),
                object_size: atomic(None),
                metrics: atomic(None),
            }),
        })
    }

    /// Declares the byte footprint per buffered element.
    pub fn set_object_size(&self, bytes: usize) {
        self.inner.object_size.write_with(|s| *s = Some(bytes));
    }

    fn record_size(&self) {
        self.inner.metrics.read_with(|m| {
            if let Some(metrics) = m {
                if let Ok(size) = self.inner.implementor.size() {
                    metrics.set(SIZE, size as u64);
                }
            }
        });
    }
}

impl<I, E> SweepAreaProvider<I, E> for DefaultSweepArea<I, E>
where
    I: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn stream_id(&self) -> usize {
        self.inner.stream_id
    }

    fn dimensions(&self) -> usize {
        self.inner.remove_predicates.len()
    }

    fn self_reorganize(&self) -> bool {
        self.inner.self_reorganize
    }

    fn insert(&self, element: E) -> ZweepResult<()> {
        self.inner.implementor.insert(element)?;
        self.record_size();
        Ok(())
    }

    fn remove(&self, element: &E) -> ZweepResult<bool> {
        let removed = self.inner.implementor.remove(element)?;
        self.record_size();
        Ok(removed)
    }

    fn update(&self, old: &E, new: E) -> ZweepResult<E> {
        self.inner.implementor.update(old, new)
    }

    fn query(&self, probe: &I, from_stream: usize) -> ZweepResult<ElementStream<E>> {
        self.inner.implementor.query(probe, from_stream)
    }

    fn query_multi(
        &self,
        probes: &[I],
        from_streams: &[usize],
        valid: usize,
    ) -> ZweepResult<ElementStream<E>> {
        self.inner.implementor.query_multi(probes, from_streams, valid)
    }

    fn expire(&self, watermark: &I, from_stream: usize) -> ZweepResult<ElementStream<E>> {
        if from_stream >= self.dimensions() {
            return Err(ZweepError::new(
                &format!(
                    "stream id {} out of range for {} streams",
                    from_stream,
                    self.dimensions()
                ),
                ErrorKind::InvalidArgument,
            ));
        }
        if from_stream == self.inner.stream_id && !self.inner.self_reorganize {
            // a stream may not starve its own buffer
            return Ok(ElementStream::empty());
        }
        let predicate = self.inner.remove_predicates[from_stream].clone();
        if predicate.is_vacuous() {
            log::warn!(
                "reorganization requested on sweep area {} with a vacuous remove predicate",
                self.inner.stream_id
            );
            return Err(ZweepError::new(
                "sweep area cannot expire: remove predicate rejects everything",
                ErrorKind::Unsupported,
            ));
        }

        let mut snapshot = Vec::new();
        for element in self.inner.implementor.iter()? {
            snapshot.push(element?);
        }
        Ok(ElementStream::new(ExpireStreamProvider {
            implementor: Arc::clone(&self.inner.implementor),
            pending: snapshot.into_iter(),
            watermark: watermark.clone(),
            predicate,
        }))
    }

    fn reorganize(&self, watermark: &I, from_stream: usize) -> ZweepResult<()> {
        for expired in self.expire(watermark, from_stream)? {
            expired?;
        }
        self.record_size();
        Ok(())
    }

    fn size(&self) -> ZweepResult<usize> {
        self.inner.implementor.size()
    }

    fn clear(&self) -> ZweepResult<()> {
        self.inner.implementor.clear()
    }

    fn close(&self) -> ZweepResult<()> {
        self.inner.implementor.close()
    }

    fn iter(&self) -> ZweepResult<ElementStream<E>> {
        self.inner.implementor.iter()
    }

    fn object_size(&self) -> Option<usize> {
        self.inner.object_size.read_with(|s| *s)
    }

    fn set_metrics(&self, metrics: MetricsRegistry) {
        self.inner.metrics.write_with(|m| *m = Some(metrics));
    }
}

/// The removing view behind `expire`: tests each snapshot element against
/// the bound remove predicate and propagates the removal to the implementor
/// before yielding it.
struct ExpireStreamProvider<I, E> {
    implementor: ImplementorRef<I, E>,
    pending: std::vec::IntoIter<E>,
    watermark: I,
    predicate: Predicate<I, E>,
}

impl<I, E> ElementStreamProvider<E> for ExpireStreamProvider<I, E>
where
    I: Send + Sync,
    E: Clone + Send + Sync,
{
    fn next_element(&mut self) -> Option<ZweepResult<E>> {
        loop {
            let element = self.pending.next()?;
            match self.predicate.test(&self.watermark, &element) {
                Ok(true) => match self.implementor.remove(&element) {
                    // yield only what was actually removed
                    Ok(true) => return Some(Ok(element)),
                    Ok(false) => continue,
                    Err(err) => return Some(Err(err)),
                },
                Ok(false) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// LIFO-specialized sweep area for the stack-merge join algorithms.
///
/// Valid only when elements arrive in z-code order: stack order then
/// coincides with insertion order and with code order, so reorganization can
/// pop from the top while the top's code is not a prefix of the watermark's
/// code, an O(k) bulk operation instead of a full scan. Inserting an element
/// whose code precedes the previously inserted one breaks the invariant and
/// fails fast.
pub struct StackSweepArea<T> {
    inner: Arc<StackInner<T>>,
}

impl<T> Clone for StackSweepArea<T> {
    fn clone(&self) -> Self {
        StackSweepArea {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct StackInner<T> {
    stream_id: usize,
    self_reorganize: bool,
    query_predicates: Vec<Predicate<T, T>>,
    stack: Atomic<Vec<T>>,
    last_code: Atomic<Option<BitCode>>,
    metrics: Atomic<Option<MetricsRegistry>>,
}

impl<T> StackSweepArea<T>
where
    T: Coded + Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(
        stream_id: usize,
        self_reorganize: bool,
        query_predicates: Vec<Predicate<T, T>>,
    ) -> ZweepResult<Self> {
        StackSweepArea::with_capacity(stream_id, self_reorganize, query_predicates, 0)
    }

    /// Pre-sizes the stack (the `initialCapacity` hint).
    pub fn with_capacity(
        stream_id: usize,
        self_reorganize: bool,
        query_predicates: Vec<Predicate<T, T>>,
        capacity: usize,
    ) -> ZweepResult<Self> {
        if query_predicates.is_empty() || stream_id >= query_predicates.len() {
            return Err(ZweepError::new(
                "stream id must index into a non-empty predicate array",
                ErrorKind::InvalidArgument,
            ));
        }
        Ok(StackSweepArea {
            inner: Arc::new(StackInner {
                stream_id,
                self_reorganize,
                query_predicates,
                stack: atomic(Vec::with_capacity(capacity)),
                last_code: atomic(None),
                metrics: atomic(None),
            }),
        })
    }

    /// Pops everything whose code is not a prefix of the watermark's code.
    fn pop_expired(&self, watermark: &T) -> Vec<T> {
        let watermark_code = watermark.code().clone();
        self.inner.stack.write_with(|stack| {
            let mut popped = Vec::new();
            while let Some(top) = stack.last() {
                if top.code().is_prefix_of(&watermark_code) {
                    break;
                }
                popped.push(stack.pop().expect("top exists"));
            }
            popped
        })
    }

    fn check_stream(&self, from_stream: usize) -> ZweepResult<()> {
        if from_stream >= self.inner.query_predicates.len() {
            return Err(ZweepError::new(
                &format!(
                    "stream id {} out of range for {} streams",
                    from_stream,
                    self.inner.query_predicates.len()
                ),
                ErrorKind::InvalidArgument,
            ));
        }
        Ok(())
    }
}

impl<T> SweepAreaProvider<T, T> for StackSweepArea<T>
where
    T: Coded + Clone + PartialEq + Send + Sync + 'static,
{
    fn stream_id(&self) -> usize {
        self.inner.stream_id
    }

    fn dimensions(&self) -> usize {
        self.inner.query_predicates.len()
    }

    fn self_reorganize(&self) -> bool {
        self.inner.self_reorganize
    }

    fn insert(&self, element: T) -> ZweepResult<()> {
        let incoming = element.code().clone();
        let monotonic = self.inner.last_code.read_with(|last| match last {
            Some(last_code) => incoming >= *last_code,
            None => true,
        });
        if !monotonic {
            log::error!(
                "non-monotonic element pushed onto stack sweep area {}",
                self.inner.stream_id
            );
            return Err(ZweepError::new(
                "input stream is not sorted by code",
                ErrorKind::InvalidState,
            ));
        }
        self.inner.stack.write_with(|stack| stack.push(element));
        self.inner.last_code.write_with(|last| *last = Some(incoming));
        self.inner.metrics.read_with(|m| {
            if let Some(metrics) = m {
                metrics.set(SIZE, self.inner.stack.read_with(|s| s.len()) as u64);
            }
        });
        Ok(())
    }

    fn remove(&self, element: &T) -> ZweepResult<bool> {
        Ok(self.inner.stack.write_with(|stack| {
            match stack.iter().position(|e| e == element) {
                Some(index) => {
                    stack.remove(index);
                    true
                }
                None => false,
            }
        }))
    }

    fn update(&self, old: &T, new: T) -> ZweepResult<T> {
        self.inner.stack.write_with(|stack| {
            for candidate in stack.iter_mut() {
                if candidate == old {
                    return Ok(std::mem::replace(candidate, new));
                }
            }
            Err(ZweepError::new(
                "no element equal to the update target",
                ErrorKind::NotFound,
            ))
        })
    }

    fn query(&self, probe: &T, from_stream: usize) -> ZweepResult<ElementStream<T>> {
        self.check_stream(from_stream)?;
        if self.inner.stack.read_with(|s| s.is_empty()) {
            return Ok(ElementStream::empty());
        }
        Ok(ElementStream::new(ScanQueryProvider::new(
            self.inner.stack.clone(),
            vec![(
                probe.clone(),
                self.inner.query_predicates[from_stream].clone(),
            )],
        )))
    }

    fn query_multi(
        &self,
        probes: &[T],
        from_streams: &[usize],
        valid: usize,
    ) -> ZweepResult<ElementStream<T>> {
        crate::sweep::implementor::check_multi_args(
            probes.len(),
            from_streams.len(),
            valid,
            self.dimensions(),
            from_streams,
        )?;
        let conjuncts = (0..valid)
            .map(|i| {
                (
                    probes[i].clone(),
                    self.inner.query_predicates[from_streams[i]].clone(),
                )
            })
            .collect();
        Ok(ElementStream::new(ScanQueryProvider::new(
            self.inner.stack.clone(),
            conjuncts,
        )))
    }

    fn expire(&self, watermark: &T, from_stream: usize) -> ZweepResult<ElementStream<T>> {
        self.check_stream(from_stream)?;
        if from_stream == self.inner.stream_id && !self.inner.self_reorganize {
            return Ok(ElementStream::empty());
        }
        Ok(ElementStream::owned(self.pop_expired(watermark)))
    }

    fn reorganize(&self, watermark: &T, from_stream: usize) -> ZweepResult<()> {
        self.check_stream(from_stream)?;
        if from_stream == self.inner.stream_id && !self.inner.self_reorganize {
            return Ok(());
        }
        let popped = self.pop_expired(watermark);
        drop(popped);
        self.inner.metrics.read_with(|m| {
            if let Some(metrics) = m {
                metrics.set(SIZE, self.inner.stack.read_with(|s| s.len()) as u64);
            }
        });
        Ok(())
    }

    fn size(&self) -> ZweepResult<usize> {
        Ok(self.inner.stack.read_with(|s| s.len()))
    }

    fn clear(&self) -> ZweepResult<()> {
        self.inner.stack.write_with(|s| s.clear());
        self.inner.last_code.write_with(|last| *last = None);
        Ok(())
    }

    fn close(&self) -> ZweepResult<()> {
        self.inner.stack.write_with(|s| {
            s.clear();
            s.shrink_to_fit();
        });
        self.inner.last_code.write_with(|last| *last = None);
        Ok(())
    }

    fn iter(&self) -> ZweepResult<ElementStream<T>> {
        Ok(ElementStream::new(ScanQueryProvider::<T, T>::new(
            self.inner.stack.clone(),
            Vec::new(),
        )))
    }

    fn object_size(&self) -> Option<usize> {
        None
    }

    fn set_metrics(&self, metrics: MetricsRegistry) {
        self.inner.metrics.write_with(|m| *m = Some(metrics));
    }
}
