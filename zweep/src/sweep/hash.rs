use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::common::constants::{BUCKET_OPS, HASH_CALLS};
use crate::common::{
    atomic, Atomic, ElementStream, HashFunction, Predicate, ReadExecutor, WriteExecutor,
};
use crate::errors::{ErrorKind, ZweepError, ZweepResult};
use crate::metrics::MetricsRegistry;
use crate::sweep::implementor::{
    check_multi_args, ImplementorConfig, SnapshotScanProvider, SweepAreaImplementor,
};

/// Creates the ordered sequence backing one hash bucket.
///
/// The default factory builds an empty `VecDeque`; callers can supply their
/// own to pre-size buckets.
pub type BucketFactory<T> = Arc<dyn Fn() -> VecDeque<T> + Send + Sync>;

/// Point-in-time introspection snapshot of a hash implementor.
///
/// Read-only side channel for cost-based reasoning; never part of the join
/// semantics.
#[derive(Clone, Debug, PartialEq)]
pub struct HashStats {
    pub bucket_count: usize,
    pub total_elements: usize,
    pub avg_bucket_occupancy: f64,
    /// Hash-function invocations per stream.
    pub hash_calls: Vec<u64>,
    pub bucket_ops: u64,
}

/// Sweep-area storage backed by hash buckets.
///
/// The bucket key of a value is `hash_functions[stream_id](value)`; probes
/// from stream `k` and the implementor's own elements are routed through the
/// hash function of their originating stream. Insertion, removal and
/// querying only ever touch the single selected bucket, so with a
/// well-spreading hash family each operation is confined to a small ordered
/// sequence instead of the whole buffer.
///
/// Probe and element type coincide here: one hash-function family must route
/// both, which is only well-defined over a single type.
///
/// Buckets are created lazily on first insertion and iterate in creation
/// order (deterministic across runs with identical input).
pub struct HashImplementor<T> {
    inner: Arc<HashInner<T>>,
}

impl<T> Clone for HashImplementor<T> {
    fn clone(&self) -> Self {
        HashImplementor {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct HashInner<T> {
    buckets: Atomic<IndexMap<u64, VecDeque<T>>>,
    hash_functions: Vec<HashFunction<T>>,
    bucket_factory: BucketFactory<T>,
    config: Atomic<Option<ImplementorConfig<T, T>>>,
    closed: AtomicBool,
    hash_calls: Atomic<Vec<u64>>,
    bucket_ops: AtomicU64,
    metrics: Atomic<Option<MetricsRegistry>>,
}

impl<T: 'static> HashImplementor<T> {
    /// Creates a hash implementor routed by the given per-stream hash family.
    pub fn new(hash_functions: Vec<HashFunction<T>>) -> ZweepResult<Self> {
        if hash_functions.is_empty() {
            return Err(ZweepError::new(
                "hash implementor needs at least one hash function",
                ErrorKind::InvalidArgument,
            ));
        }
        let streams = hash_functions.len();
        Ok(HashImplementor {
            inner: Arc::new(HashInner {
                buckets: atomic(IndexMap::new()),
                hash_functions,
                bucket_factory: Arc::new(VecDeque::new),
                config: atomic(None),
                closed: AtomicBool::new(false),
                hash_calls: atomic(vec![0; streams]),
                bucket_ops: AtomicU64::new(0),
                metrics: atomic(None),
            }),
        })
    }

    /// Creates a hash implementor with a custom bucket factory.
    pub fn with_bucket_factory(
        hash_functions: Vec<HashFunction<T>>,
        factory: BucketFactory<T>,
    ) -> ZweepResult<Self> {
        if hash_functions.is_empty() {
            return Err(ZweepError::new(
                "hash implementor needs at least one hash function",
                ErrorKind::InvalidArgument,
            ));
        }
        let streams = hash_functions.len();
        Ok(HashImplementor {
            inner: Arc::new(HashInner {
                buckets: atomic(IndexMap::new()),
                hash_functions,
                bucket_factory: factory,
                config: atomic(None),
                closed: AtomicBool::new(false),
                hash_calls: atomic(vec![0; streams]),
                bucket_ops: AtomicU64::new(0),
                metrics: atomic(None),
            }),
        })
    }

    /// Attaches a metrics registry mirroring hash-call and bucket-operation
    /// counts.
    pub fn set_metrics(&self, metrics: MetricsRegistry) {
        self.inner.metrics.write_with(|m| *m = Some(metrics));
    }

    /// Introspection snapshot.
    pub fn stats(&self) -> HashStats {
        let (bucket_count, total_elements) = self
            .inner
            .buckets
            .read_with(|b| (b.len(), b.values().map(|v| v.len()).sum::<usize>()));
        let avg = if bucket_count == 0 {
            0.0
        } else {
            total_elements as f64 / bucket_count as f64
        };
        HashStats {
            bucket_count,
            total_elements,
            avg_bucket_occupancy: avg,
            hash_calls: self.inner.hash_calls.read_with(|c| c.clone()),
            bucket_ops: self.inner.bucket_ops.load(Ordering::Relaxed),
        }
    }
}

impl<T> HashInner<T> {
    fn check_open(&self) -> ZweepResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ZweepError::new(
                "hash implementor is closed",
                ErrorKind::Closed,
            ));
        }
        Ok(())
    }

    fn with_config<R>(
        &self,
        f: impl FnOnce(&ImplementorConfig<T, T>) -> ZweepResult<R>,
    ) -> ZweepResult<R> {
        self.config.read_with(|config| match config {
            Some(c) => f(c),
            None => Err(ZweepError::new(
                "hash implementor used before initialize",
                ErrorKind::NotInitialized,
            )),
        })
    }

    fn own_stream(&self) -> ZweepResult<usize> {
        self.with_config(|c| Ok(c.stream_id))
    }

    fn bucket_of(&self, stream_id: usize, value: &T) -> ZweepResult<u64> {
        let hash = self.hash_functions.get(stream_id).ok_or_else(|| {
            ZweepError::new(
                &format!(
                    "stream id {} has no hash function ({} configured)",
                    stream_id,
                    self.hash_functions.len()
                ),
                ErrorKind::InvalidArgument,
            )
        })?;
        self.hash_calls.write_with(|calls| calls[stream_id] += 1);
        self.metrics.read_with(|m| {
            if let Some(metrics) = m {
                metrics.increment(HASH_CALLS);
            }
        });
        hash.apply(value)
    }

    fn count_bucket_op(&self) {
        self.bucket_ops.fetch_add(1, Ordering::Relaxed);
        self.metrics.read_with(|m| {
            if let Some(metrics) = m {
                metrics.increment(BUCKET_OPS);
            }
        });
    }
}

impl<T> SweepAreaImplementor<T, T> for HashImplementor<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn initialize(
        &self,
        stream_id: usize,
        query_predicates: Vec<Predicate<T, T>>,
        equals: Predicate<T, T>,
    ) -> ZweepResult<()> {
        self.inner.check_open()?;
        if query_predicates.len() != self.inner.hash_functions.len() {
            log::error!(
                "hash implementor predicate/hash arity mismatch: {} predicates, {} hash functions",
                query_predicates.len(),
                self.inner.hash_functions.len()
            );
            return Err(ZweepError::new(
                "one query predicate per hash function is required",
                ErrorKind::InvalidArgument,
            ));
        }
        self.inner.config.write_with(|config| {
            if config.is_some() {
                return Err(ZweepError::new(
                    "implementor is already initialized",
                    ErrorKind::AlreadyInitialized,
                ));
            }
            if query_predicates.is_empty() || stream_id >= query_predicates.len() {
                return Err(ZweepError::new(
                    "stream id must index into a non-empty predicate array",
                    ErrorKind::InvalidArgument,
                ));
            }
            *config = Some(ImplementorConfig {
                stream_id,
                query_predicates,
                equals,
            });
            Ok(())
        })
    }

    fn insert(&self, element: T) -> ZweepResult<()> {
        self.inner.check_open()?;
        let own = self.inner.own_stream()?;
        let key = self.inner.bucket_of(own, &element)?;
        let factory = self.inner.bucket_factory.clone();
        self.inner.buckets.write_with(|buckets| {
            buckets.entry(key).or_insert_with(|| factory()).push_back(element);
        });
        self.inner.count_bucket_op();
        Ok(())
    }

    fn remove(&self, element: &T) -> ZweepResult<bool> {
        self.inner.check_open()?;
        let own = self.inner.own_stream()?;
        let equals = self.inner.with_config(|c| Ok(c.equals.clone()))?;
        let key = self.inner.bucket_of(own, element)?;
        self.inner.count_bucket_op();
        self.inner.buckets.write_with(|buckets| {
            let bucket = match buckets.get_mut(&key) {
                Some(b) => b,
                None => return Ok(false),
            };
            let mut found = None;
            for (index, candidate) in bucket.iter().enumerate() {
                if equals.test(element, candidate)? {
                    found = Some(index);
                    break;
                }
            }
            match found {
                Some(index) => {
                    bucket.remove(index);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn update(&self, old: &T, new: T) -> ZweepResult<T> {
        self.inner.check_open()?;
        let own = self.inner.own_stream()?;
        let equals = self.inner.with_config(|c| Ok(c.equals.clone()))?;
        let old_key = self.inner.bucket_of(own, old)?;
        let new_key = self.inner.bucket_of(own, &new)?;
        if old_key != new_key {
            log::error!(
                "hash update would move element across buckets ({} -> {})",
                old_key,
                new_key
            );
            return Err(ZweepError::new(
                "update target hashes to a different bucket",
                ErrorKind::InvalidArgument,
            ));
        }
        self.inner.count_bucket_op();
        self.inner.buckets.write_with(|buckets| {
            let bucket = buckets.get_mut(&old_key).ok_or_else(|| {
                ZweepError::new("no element equal to the update target", ErrorKind::NotFound)
            })?;
            for candidate in bucket.iter_mut() {
                if equals.test(old, candidate)? {
                    return Ok(std::mem::replace(candidate, new));
                }
            }
            Err(ZweepError::new(
                "no element equal to the update target",
                ErrorKind::NotFound,
            ))
        })
    }

    fn query(&self, probe: &T, stream_id: usize) -> ZweepResult<ElementStream<T>> {
        self.inner.check_open()?;
        let predicate = self.inner.with_config(|c| {
            c.query_predicates.get(stream_id).cloned().ok_or_else(|| {
                ZweepError::new(
                    &format!(
                        "stream id {} out of range for {} streams",
                        stream_id,
                        c.query_predicates.len()
                    ),
                    ErrorKind::InvalidArgument,
                )
            })
        })?;
        if self.inner.buckets.read_with(|b| b.is_empty()) {
            return Ok(ElementStream::empty());
        }
        let key = self.inner.bucket_of(stream_id, probe)?;
        self.inner.count_bucket_op();
        let snapshot: Vec<T> = self
            .inner
            .buckets
            .read_with(|buckets| buckets.get(&key).map(|b| b.iter().cloned().collect()))
            .unwrap_or_default();
        if snapshot.is_empty() {
            return Ok(ElementStream::empty());
        }
        Ok(ElementStream::new(SnapshotScanProvider::new(
            snapshot,
            vec![(probe.clone(), predicate)],
        )))
    }

    fn query_multi(
        &self,
        probes: &[T],
        stream_ids: &[usize],
        valid: usize,
    ) -> ZweepResult<ElementStream<T>> {
        self.inner.check_open()?;
        let dims = self
            .inner
            .with_config(|c| Ok(c.query_predicates.len()))?;
        check_multi_args(probes.len(), stream_ids.len(), valid, dims, stream_ids)?;

        // all valid probes must select the same bucket
        let mut key = None;
        for i in 0..valid {
            let probe_key = self.inner.bucket_of(stream_ids[i], &probes[i])?;
            match key {
                None => key = Some(probe_key),
                Some(k) if k != probe_key => {
                    log::error!(
                        "multi-probe hashes to distinct buckets ({} and {})",
                        k,
                        probe_key
                    );
                    return Err(ZweepError::new(
                        "multi-probe values hash to different buckets",
                        ErrorKind::InvalidArgument,
                    ));
                }
                Some(_) => {}
            }
        }
        let key = key.expect("valid >= 1 checked above");

        let mut conjuncts = Vec::with_capacity(valid);
        for i in 0..valid {
            let predicate = self
                .inner
                .with_config(|c| Ok(c.query_predicates[stream_ids[i]].clone()))?;
            conjuncts.push((probes[i].clone(), predicate));
        }
        self.inner.count_bucket_op();
        let snapshot: Vec<T> = self
            .inner
            .buckets
            .read_with(|buckets| buckets.get(&key).map(|b| b.iter().cloned().collect()))
            .unwrap_or_default();
        if snapshot.is_empty() {
            return Ok(ElementStream::empty());
        }
        Ok(ElementStream::new(SnapshotScanProvider::new(
            snapshot, conjuncts,
        )))
    }

    fn size(&self) -> ZweepResult<usize> {
        self.inner.check_open()?;
        Ok(self
            .inner
            .buckets
            .read_with(|b| b.values().map(|v| v.len()).sum()))
    }

    fn clear(&self) -> ZweepResult<()> {
        self.inner.check_open()?;
        self.inner.buckets.write_with(|b| b.clear());
        Ok(())
    }

    fn close(&self) -> ZweepResult<()> {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.buckets.write_with(|b| {
            b.clear();
            b.shrink_to_fit();
        });
        Ok(())
    }

    fn iter(&self) -> ZweepResult<ElementStream<T>> {
        self.inner.check_open()?;
        let snapshot: Vec<T> = self.inner.buckets.read_with(|buckets| {
            buckets.values().flat_map(|b| b.iter().cloned()).collect()
        });
        Ok(ElementStream::new(SnapshotScanProvider::<T, T>::new(
            snapshot,
            Vec::new(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mod8() -> HashFunction<i32> {
        HashFunction::from_fn(|v: &i32| (*v % 8) as u64)
    }

    fn initialized() -> HashImplementor<i32> {
        let hash = HashImplementor::new(vec![mod8(), mod8()]).unwrap();
        let eq = Predicate::from_fn(|probe: &i32, e: &i32| probe == e);
        hash.initialize(0, vec![eq.clone(), eq], Predicate::equality())
            .unwrap();
        hash
    }

    #[test]
    fn test_round_trip_same_bucket() {
        let hash = initialized();
        hash.insert(11).unwrap();
        // 11 and 3 share bucket 3 under mod 8
        let hits: Vec<i32> = hash.query(&11, 1).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(hits, vec![11]);
    }

    #[test]
    fn test_different_bucket_never_finds() {
        let hash = initialized();
        hash.insert(11).unwrap();
        // 4 hashes to bucket 4; element sits in bucket 3
        let hits: Vec<i32> = hash.query(&4, 1).unwrap().map(|r| r.unwrap()).collect();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_remove_confined_to_bucket() {
        let hash = initialized();
        hash.insert(3).unwrap();
        hash.insert(11).unwrap();
        assert!(hash.remove(&3).unwrap());
        assert_eq!(hash.size().unwrap(), 1);
        assert!(!hash.remove(&4).unwrap());
    }

    #[test]
    fn test_update_same_bucket_only() {
        let hash = initialized();
        hash.insert(3).unwrap();
        // 3 -> 11 stays in bucket 3
        let old = hash.update(&3, 11).unwrap();
        assert_eq!(old, 3);
        // 11 -> 4 would cross buckets
        let err = hash.update(&11, 4).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
        // update of an absent element
        let err = hash.update(&19, 27).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotFound);
    }

    #[test]
    fn test_query_multi_bucket_confinement() {
        let hash = initialized();
        hash.insert(3).unwrap();
        let hits: Vec<i32> = hash
            .query_multi(&[3, 11], &[0, 1], 1)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(hits, vec![3]);
        // probes 3 and 4 select different buckets
        let err = hash.query_multi(&[3, 4], &[0, 1], 2).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_predicate_hash_arity_must_match() {
        let hash = HashImplementor::new(vec![mod8()]).unwrap();
        let eq = Predicate::<i32>::equality();
        let err = hash
            .initialize(0, vec![eq.clone(), eq.clone()], eq)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_stats_and_metrics() {
        let hash = initialized();
        let metrics = MetricsRegistry::new();
        hash.set_metrics(metrics.clone());
        hash.insert(1).unwrap();
        hash.insert(9).unwrap();
        hash.insert(2).unwrap();
        let _ = hash.query(&1, 1).unwrap().count();

        let stats = hash.stats();
        assert_eq!(stats.bucket_count, 2);
        assert_eq!(stats.total_elements, 3);
        assert!((stats.avg_bucket_occupancy - 1.5).abs() < 1e-12);
        // three inserts through stream 0, one query through stream 1
        assert_eq!(stats.hash_calls[0], 3);
        assert_eq!(stats.hash_calls[1], 1);
        assert_eq!(metrics.get(HASH_CALLS), 4);
        assert!(metrics.get(BUCKET_OPS) >= 4);
    }

    #[test]
    fn test_empty_storage_short_circuits() {
        let hash = initialized();
        let mut stream = hash.query(&5, 0).unwrap();
        assert!(stream.next().is_none());
        // no hash call happened for the empty-storage query
        assert_eq!(hash.stats().hash_calls, vec![0, 0]);
    }
}
