use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::common::{
    atomic, Atomic, ElementStream, Predicate, ReadExecutor, WriteExecutor,
};
use crate::errors::{ErrorKind, ZweepError, ZweepResult};
use crate::sweep::implementor::{
    check_multi_args, ImplementorConfig, ScanQueryProvider, SweepAreaImplementor,
};

/// Sweep-area storage backed by an ordered sequence.
///
/// Elements keep their insertion order; every query and removal is an O(n)
/// scan. This is the reference storage strategy: predictable, order
/// preserving, no hashing requirements on the element type.
///
/// # Examples
///
/// ```rust,ignore
/// use zweep::sweep::ListImplementor;
/// use zweep::common::Predicate;
///
/// let list: ListImplementor<i32, i32> = ListImplementor::new();
/// list.initialize(0, vec![Predicate::equality(), Predicate::equality()],
///                 Predicate::equality())?;
/// list.insert(42)?;
/// ```
pub struct ListImplementor<I, E> {
    inner: Arc<ListInner<I, E>>,
}

impl<I, E> Clone for ListImplementor<I, E> {
    fn clone(&self) -> Self {
        ListImplementor {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ListInner<I, E> {
    storage: Atomic<Vec<E>>,
    config: Atomic<Option<ImplementorConfig<I, E>>>,
    closed: AtomicBool,
}

impl<I, E> Default for ListImplementor<I, E> {
    fn default() -> Self {
        ListImplementor::new()
    }
}

impl<I, E> ListImplementor<I, E> {
    pub fn new() -> Self {
        ListImplementor {
            inner: Arc::new(ListInner {
                storage: atomic(Vec::new()),
                config: atomic(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Pre-sizes the backing sequence.
    pub fn with_capacity(capacity: usize) -> Self {
        ListImplementor {
            inner: Arc::new(ListInner {
                storage: atomic(Vec::with_capacity(capacity)),
                config: atomic(None),
                closed: AtomicBool::new(false),
            }),
        }
    }
}

impl<I, E> ListInner<I, E> {
    fn check_open(&self) -> ZweepResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ZweepError::new(
                "list implementor is closed",
                ErrorKind::Closed,
            ));
        }
        Ok(())
    }

    fn equals(&self) -> ZweepResult<Predicate<E, E>> {
        self.config.read_with(|config| match config {
            Some(c) => Ok(c.equals.clone()),
            None => Err(ZweepError::new(
                "list implementor used before initialize",
                ErrorKind::NotInitialized,
            )),
        })
    }

    fn predicate_for(&self, stream_id: usize) -> ZweepResult<Predicate<I, E>> {
        self.config.read_with(|config| match config {
            Some(c) => c.query_predicates.get(stream_id).cloned().ok_or_else(|| {
                ZweepError::new(
                    &format!(
                        "stream id {} out of range for {} streams",
                        stream_id,
                        c.query_predicates.len()
                    ),
                    ErrorKind::InvalidArgument,
                )
            }),
            None => Err(ZweepError::new(
                "list implementor used before initialize",
                ErrorKind::NotInitialized,
            )),
        })
    }

    fn dims(&self) -> ZweepResult<usize> {
        self.config.read_with(|config| match config {
            Some(c) => Ok(c.query_predicates.len()),
            None => Err(ZweepError::new(
                "list implementor used before initialize",
                ErrorKind::NotInitialized,
            )),
        })
    }
}

impl<I, E> SweepAreaImplementor<I, E> for ListImplementor<I, E>
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
                log::error!("list implementor initialized twice");
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
        self.inner.dims()?;
        self.inner.storage.write_with(|storage| storage.push(element));
        Ok(())
    }

    fn remove(&self, element: &E) -> ZweepResult<bool> {
        self.inner.check_open()?;
        let equals = self.inner.equals()?;
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
                    storage.remove(index);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn update(&self, old: &E, new: E) -> ZweepResult<E> {
        self.inner.check_open()?;
        let equals = self.inner.equals()?;
        self.inner.storage.write_with(|storage| {
            for candidate in storage.iter_mut() {
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

    fn query(&self, probe: &I, stream_id: usize) -> ZweepResult<ElementStream<E>> {
        self.inner.check_open()?;
        let predicate = self.inner.predicate_for(stream_id)?;
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
        let dims = self.inner.dims()?;
        check_multi_args(probes.len(), stream_ids.len(), valid, dims, stream_ids)?;
        let mut conjuncts = Vec::with_capacity(valid);
        for i in 0..valid {
            conjuncts.push((probes[i].clone(), self.inner.predicate_for(stream_ids[i])?));
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
