use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::common::{
    atomic, Atomic, ElementStream, Predicate, ReadExecutor, WriteExecutor,
};
use crate::errors::{ErrorKind, ZweepError, ZweepResult};
use crate::sweep::implementor::{
    check_multi_args, ImplementorConfig, ScanQueryProvider, SweepAreaImplementor,
};

/// Sweep-area storage backed by an unordered multiset.
///
/// The bag gives no positional guarantees: removals swap the last element
/// into the removed slot, so iteration order changes over time. Use it when
/// only membership and counting matter. In-place replacement (`update`) is
/// not supported.
pub struct BagImplementor<I, E> {
    inner: Arc<BagInner<I, E>>,
}

impl<I, E> Clone for BagImplementor<I, E> {
    fn clone(&self) -> Self {
        BagImplementor {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct BagInner<I, E> {
    storage: Atomic<Vec<E>>,
    config: Atomic<Option<ImplementorConfig<I, E>>>,
    closed: AtomicBool,
}

impl<I, E> Default for BagImplementor<I, E> {
    fn default() -> Self {
        BagImplementor::new()
    }
}

impl<I, E> BagImplementor<I, E> {
    pub fn new() -> Self {
        BagImplementor::with_capacity(0)
    }

    /// Pre-sizes the backing storage (the `initialCapacity` hint).
    pub fn with_capacity(capacity: usize) -> Self {
        BagImplementor {
            inner: Arc::new(BagInner {
                storage: atomic(Vec::with_capacity(capacity)),
                config: atomic(None),
                closed: AtomicBool::new(false),
            }),
        }
    }
}

impl<I, E> BagInner<I, E> {
    fn check_open(&self) -> ZweepResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ZweepError::new(
                "bag implementor is closed",
                ErrorKind::Closed,
            ));
        }
        Ok(())
    }

    fn with_config<R>(
        &self,
        f: impl FnOnce(&ImplementorConfig<I, E>) -> ZweepResult<R>,
    ) -> ZweepResult<R> {
        self.config.read_with(|config| match config {
            Some(c) => f(c),
            None => Err(ZweepError::new(
                "bag implementor used before initialize",
                ErrorKind::NotInitialized,
            )),
        })
    }
}

impl<I, E> SweepAreaImplementor<I, E> for BagImplementor<I, E>
where
    I: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn initialize(
        &self,
        stream_id: usize,
        query_predicates: Vec<Predicate<I, E>>,
        equals: Predicate<E, E>,
    ) -> ZweepResult<()> {
        self.inner.check_open()?;
        self.inner.config.write_with(|config| {
            if config.is_some() {
                log::error!("bag implementor initialized twice");
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

    fn insert(&self, element: E) -> ZweepResult<()> {
        self.inner.check_open()?;
        self.inner.with_config(|_| Ok(()))?;
        self.inner.storage.write_with(|storage| storage.push(element));
        Ok(())
    }

    fn remove(&self, element: &E) -> ZweepResult<bool> {
        self.inner.check_open()?;
        let equals = self.inner.with_config(|c| Ok(c.equals.clone()))?;
        self.inner.storage.write_with(|storage| {
            let mut found = None;
            for (index, candidate) in storage.iter().enumerate() {
                if equals.test(element, candidate)? {
                    found = Some(index);
                    break;
                }
            }
            match found {
                Some(index) => {
                    storage.swap_remove(index);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn update(&self, _old: &E, _new: E) -> ZweepResult<E> {
        Err(ZweepError::new(
            "bag implementor does not support in-place replacement",
            ErrorKind::Unsupported,
        ))
    }

    fn query(&self, probe: &I, stream_id: usize) -> ZweepResult<ElementStream<E>> {
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
        if self.inner.storage.read_with(|s| s.is_empty()) {
            return Ok(ElementStream::empty());
        }
        Ok(ElementStream::new(ScanQueryProvider::new(
            self.inner.storage.clone(),
            vec![(probe.clone(), predicate)],
        )))
    }

    fn query_multi(
        &self,
        probes: &[I],
        stream_ids: &[usize],
        valid: usize,
    ) -> ZweepResult<ElementStream<E>> {
        self.inner.check_open()?;
        let dims = self.inner.with_config(|c| Ok(c.query_predicates.len()))?;
        check_multi_args(probes.len(), stream_ids.len(), valid, dims, stream_ids)?;
        let mut conjuncts = Vec::with_capacity(valid);
        for i in 0..valid {
            let predicate = self
                .inner
                .with_config(|c| Ok(c.query_predicates[stream_ids[i]].clone()))?;
            conjuncts.push((probes[i].clone(), predicate));
        }
        if self.inner.storage.read_with(|s| s.is_empty()) {
            return Ok(ElementStream::empty());
        }
        Ok(ElementStream::new(ScanQueryProvider::new(
            self.inner.storage.clone(),
            conjuncts,
        )))
    }

    fn size(&self) -> ZweepResult<usize> {
        self.inner.check_open()?;
        Ok(self.inner.storage.read_with(|s| s.len()))
    }

    fn clear(&self) -> ZweepResult<()> {
        self.inner.check_open()?;
        self.inner.storage.write_with(|s| s.clear());
        Ok(())
    }

    fn close(&self) -> ZweepResult<()> {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.storage.write_with(|s| {
            s.clear();
            s.shrink_to_fit();
        });
        Ok(())
    }

    fn iter(&self) -> ZweepResult<ElementStream<E>> {
        self.inner.check_open()?;
        Ok(ElementStream::new(ScanQueryProvider::<I, E>::new(
            self.inner.storage.clone(),
            Vec::new(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialized() -> BagImplementor<i32, i32> {
        let bag = BagImplementor::with_capacity(8);
        let eq = Predicate::from_fn(|probe: &i32, e: &i32| probe == e);
        bag.initialize(0, vec![eq], Predicate::equality()).unwrap();
        bag
    }

    #[test]
    fn test_multiset_semantics() {
        let bag = initialized();
        bag.insert(3).unwrap();
        bag.insert(3).unwrap();
        bag.insert(5).unwrap();
        assert_eq!(bag.size().unwrap(), 3);
        // duplicates are kept; remove takes one occurrence
        assert!(bag.remove(&3).unwrap());
        assert_eq!(bag.size().unwrap(), 2);
        let hits: Vec<i32> = bag.query(&3, 0).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(hits, vec![3]);
    }

    #[test]
    fn test_update_unsupported() {
        let bag = initialized();
        bag.insert(1).unwrap();
        let err = bag.update(&1, 2).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::Unsupported);
    }

    #[test]
    fn test_initialize_guards() {
        let bag = initialized();
        let err = bag
            .initialize(0, vec![Predicate::always()], Predicate::equality())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::AlreadyInitialized);

        let fresh: BagImplementor<i32, i32> = BagImplementor::new();
        assert_eq!(
            fresh.insert(1).unwrap_err().kind(),
            &ErrorKind::NotInitialized
        );
    }

    #[test]
    fn test_close_releases() {
        let bag = initialized();
        bag.insert(1).unwrap();
        bag.close().unwrap();
        assert_eq!(bag.insert(2).unwrap_err().kind(), &ErrorKind::Closed);
    }
}
