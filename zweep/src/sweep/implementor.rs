use std::sync::Arc;

use crate::common::{Atomic, ElementStream, ElementStreamProvider, Predicate, ReadExecutor};
use crate::errors::{ErrorKind, ZweepError, ZweepResult};

/// Trait for implementing sweep-area storage strategies.
///
/// # Purpose
///
/// A `SweepAreaImplementor` owns the actual element collection of a sweep
/// area and applies the per-stream query predicates it was initialized with.
/// It holds no stream-routing or expiration logic; that lives in the sweep
/// area wrapping it. The split keeps the outer interface stable while the
/// storage strategy (ordered list, hash buckets, unordered bag) is injected.
///
/// # Characteristics
///
/// - **Single initialization**: `initialize` must be called exactly once
///   before first use; re-initialization is not supported
/// - **Interior mutability**: all methods take `&self`; concrete implementors
///   are `Arc`-shared state behind locks
/// - **Lazy queries**: `query` returns a lazy, non-removing element stream;
///   empty storage yields an immediately-exhausted stream
/// - **Error Handling**: every operation returns `ZweepResult<T>`
pub trait SweepAreaImplementor<I, E>: Send + Sync {
    /// Binds the implementor to its stream id, query predicates and equality
    /// predicate. Must be called exactly once.
    fn initialize(
        &self,
        stream_id: usize,
        query_predicates: Vec<Predicate<I, E>>,
        equals: Predicate<E, E>,
    ) -> ZweepResult<()>;

    /// Unconditionally appends an element.
    fn insert(&self, element: E) -> ZweepResult<()>;

    /// Removes the first element equal to `element` under the equality
    /// predicate. Returns whether a removal occurred.
    fn remove(&self, element: &E) -> ZweepResult<bool>;

    /// Replaces the first element equal to `old` with `new`, returning the
    /// replaced element. Implementors that never need replacement signal
    /// an unsupported operation.
    fn update(&self, old: &E, new: E) -> ZweepResult<E>;

    /// A lazy, non-removing stream of elements matching
    /// `query_predicates[stream_id]` against the probe.
    fn query(&self, probe: &I, stream_id: usize) -> ZweepResult<ElementStream<E>>;

    /// Conjunctive multi-predicate probe: elements matching all of the first
    /// `valid` `(probe, stream_id)` pairs.
    fn query_multi(
        &self,
        probes: &[I],
        stream_ids: &[usize],
        valid: usize,
    ) -> ZweepResult<ElementStream<E>>;

    /// Number of buffered elements.
    fn size(&self) -> ZweepResult<usize>;

    /// Removes all elements, keeping the implementor usable.
    fn clear(&self) -> ZweepResult<()>;

    /// Releases storage; the implementor is unusable afterwards.
    fn close(&self) -> ZweepResult<()>;

    /// A lazy stream over all buffered elements.
    fn iter(&self) -> ZweepResult<ElementStream<E>>;
}

/// Initialization state shared by the concrete implementors.
pub(crate) struct ImplementorConfig<I, E> {
    pub stream_id: usize,
    pub query_predicates: Vec<Predicate<I, E>>,
    pub equals: Predicate<E, E>,
}

/// Validates the argument arrays of a multi-predicate probe.
pub(crate) fn check_multi_args(
    probes: usize,
    stream_ids: usize,
    valid: usize,
    dims: usize,
    ids: &[usize],
) -> ZweepResult<()> {
    if probes != stream_ids {
        log::error!(
            "multi-probe arrays differ in length: {} probes, {} stream ids",
            probes,
            stream_ids
        );
        return Err(ZweepError::new(
            "probe and stream id arrays must have equal length",
            ErrorKind::InvalidArgument,
        ));
    }
    if valid == 0 || valid > probes {
        log::error!("multi-probe valid count {} out of range 1..={}", valid, probes);
        return Err(ZweepError::new(
            "valid count out of range",
            ErrorKind::InvalidArgument,
        ));
    }
    for id in &ids[..valid] {
        if *id >= dims {
            return Err(ZweepError::new(
                &format!("stream id {} out of range for {} streams", id, dims),
                ErrorKind::InvalidArgument,
            ));
        }
    }
    Ok(())
}

/// Lazy conjunctive scan over shared storage.
///
/// Pulls one element per position on each call, so concurrent insertions
/// past the current position become visible while removals before it do
/// not repeat elements. Good enough for the single-threaded driver.
pub(crate) struct ScanQueryProvider<I, E> {
    storage: Atomic<Vec<E>>,
    probes: Vec<(I, Predicate<I, E>)>,
    position: usize,
}

impl<I, E> ScanQueryProvider<I, E> {
    pub(crate) fn new(storage: Atomic<Vec<E>>, probes: Vec<(I, Predicate<I, E>)>) -> Self {
        ScanQueryProvider {
            storage,
            probes,
            position: 0,
        }
    }
}

impl<I, E> ElementStreamProvider<E> for ScanQueryProvider<I, E>
where
    I: Send + Sync,
    E: Clone + Send + Sync,
{
    fn next_element(&mut self) -> Option<ZweepResult<E>> {
        loop {
            let element = self
                .storage
                .read_with(|storage| storage.get(self.position).cloned());
            let element = element?;
            self.position += 1;

            let mut matched = true;
            for (probe, predicate) in &self.probes {
                match predicate.test(probe, &element) {
                    Ok(true) => {}
                    Ok(false) => {
                        matched = false;
                        break;
                    }
                    Err(err) => return Some(Err(err)),
                }
            }
            if matched {
                return Some(Ok(element));
            }
        }
    }
}

/// Lazy conjunctive scan over an owned snapshot (used by bucket queries).
pub(crate) struct SnapshotScanProvider<I, E> {
    elements: std::vec::IntoIter<E>,
    probes: Vec<(I, Predicate<I, E>)>,
}

impl<I, E> SnapshotScanProvider<I, E> {
    pub(crate) fn new(elements: Vec<E>, probes: Vec<(I, Predicate<I, E>)>) -> Self {
        SnapshotScanProvider {
            elements: elements.into_iter(),
            probes,
        }
    }
}

impl<I, E> ElementStreamProvider<E> for SnapshotScanProvider<I, E>
where
    I: Send + Sync,
    E: Clone + Send + Sync,
{
    fn next_element(&mut self) -> Option<ZweepResult<E>> {
        loop {
            let element = self.elements.next()?;
            let mut matched = true;
            for (probe, predicate) in &self.probes {
                match predicate.test(probe, &element) {
                    Ok(true) => {}
                    Ok(false) => {
                        matched = false;
                        break;
                    }
                    Err(err) => return Some(Err(err)),
                }
            }
            if matched {
                return Some(Ok(element));
            }
        }
    }
}

/// Shorthand used by the sweep-area bridge to hold any implementor.
pub type ImplementorRef<I, E> = Arc<dyn SweepAreaImplementor<I, E>>;
