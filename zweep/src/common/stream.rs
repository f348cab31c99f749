use std::sync::Arc;

use crate::errors::ZweepResult;

/// Trait for implementing lazy element sequences.
///
/// # Purpose
///
/// `ElementStreamProvider` defines the contract for any lazy sequence the
/// engine hands out: query results, expiration sequences, replication
/// output. Elements are produced one at a time when the consumer pulls;
/// producing an element may itself pull from an underlying source.
///
/// # Characteristics
///
/// - **Lazy**: No work happens until `next_element` is called
/// - **Stateful**: Maintains the current position
/// - **Thread-Safe**: Requires `Send + Sync` so streams can be handed across
///   threads, although a running join is single-threaded
/// - **Error Handling**: Yields `ZweepResult<E>` so evaluation failures
///   surface through the sequence instead of being swallowed
pub trait ElementStreamProvider<E>: Send + Sync {
    /// Produces the next element, or `None` when the sequence is exhausted.
    fn next_element(&mut self) -> Option<ZweepResult<E>>;
}

/// A unified facade for lazy element sequences.
///
/// `ElementStream` wraps any [`ElementStreamProvider`] and exposes the
/// standard `Iterator` interface. Clones are cheap and share iteration
/// state through the same provider.
pub struct ElementStream<E> {
    provider: Arc<parking_lot::Mutex<Box<dyn ElementStreamProvider<E>>>>,
}

impl<E> ElementStream<E> {
    /// Creates a new stream wrapping the given provider.
    pub fn new<T: ElementStreamProvider<E> + 'static>(provider: T) -> Self {
        ElementStream {
            provider: Arc::new(parking_lot::Mutex::new(Box::new(provider))),
        }
    }
}

impl<E: Send + Sync + 'static> ElementStream<E> {
    /// An immediately-exhausted stream.
    pub fn empty() -> Self {
        ElementStream::new(EmptyStreamProvider)
    }

    /// A stream over an owned vector of elements.
    pub fn owned(elements: Vec<E>) -> Self {
        ElementStream::new(OwnedStreamProvider {
            iter: elements.into_iter(),
        })
    }
}

impl<E> std::fmt::Debug for ElementStream<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementStream").finish_non_exhaustive()
    }
}

impl<E> Clone for ElementStream<E> {
    fn clone(&self) -> Self {
        ElementStream {
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<E> Iterator for ElementStream<E> {
    type Item = ZweepResult<E>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut provider = self.provider.lock();
        provider.next_element()
    }
}

struct EmptyStreamProvider;

impl<E> ElementStreamProvider<E> for EmptyStreamProvider {
    fn next_element(&mut self) -> Option<ZweepResult<E>> {
        None
    }
}

struct OwnedStreamProvider<E> {
    iter: std::vec::IntoIter<E>,
}

impl<E: Send> ElementStreamProvider<E> for OwnedStreamProvider<E>
where
    E: Sync,
{
    fn next_element(&mut self) -> Option<ZweepResult<E>> {
        self.iter.next().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorKind, ZweepError};

    #[test]
    fn test_empty_stream() {
        let mut stream: ElementStream<i32> = ElementStream::empty();
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_owned_stream() {
        let stream = ElementStream::owned(vec![1, 2, 3]);
        let collected: Vec<i32> = stream.map(|r| r.unwrap()).collect();
        assert_eq!(collected, vec![1, 2, 3]);
    }

    #[test]
    fn test_clones_share_position() {
        let stream = ElementStream::owned(vec![1, 2, 3]);
        let mut a = stream.clone();
        let mut b = stream;
        assert_eq!(a.next().unwrap().unwrap(), 1);
        assert_eq!(b.next().unwrap().unwrap(), 2);
        assert_eq!(a.next().unwrap().unwrap(), 3);
        assert!(b.next().is_none());
    }

    #[test]
    fn test_custom_provider_yields_errors() {
        struct FailAfterOne {
            yielded: bool,
        }
        impl ElementStreamProvider<i32> for FailAfterOne {
            fn next_element(&mut self) -> Option<ZweepResult<i32>> {
                if !self.yielded {
                    self.yielded = true;
                    Some(Ok(7))
                } else {
                    Some(Err(ZweepError::new("boom", ErrorKind::InternalError)))
                }
            }
        }
        let mut stream = ElementStream::new(FailAfterOne { yielded: false });
        assert_eq!(stream.next().unwrap().unwrap(), 7);
        assert!(stream.next().unwrap().is_err());
    }
}
