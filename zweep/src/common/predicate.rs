use std::marker::PhantomData;
use std::sync::Arc;

use crate::errors::ZweepResult;

/// Trait for implementing binary predicates.
///
/// A `PredicateProvider` decides whether a `(left, right)` pair of values
/// satisfies some condition. Sweep areas dispatch these by originating
/// stream: `left` is the probe or watermark coming from that stream, `right`
/// is a buffered element.
///
/// Predicate invocation errors are programmer errors from the engine's point
/// of view; they propagate uncaught to the driver's caller.
pub trait PredicateProvider<L, R>: Send + Sync {
    /// Evaluates the predicate against a pair of values.
    fn test(&self, left: &L, right: &R) -> ZweepResult<bool>;

    /// Whether this predicate rejects every pair by construction.
    ///
    /// A sweep area configured with a vacuous *remove* predicate can never
    /// expire anything; reorganization requests against it are reported as
    /// unsupported rather than silently doing nothing.
    #[inline]
    fn is_vacuous(&self) -> bool {
        false
    }

    /// A short name used in log messages.
    fn name(&self) -> &str {
        "predicate"
    }
}

/// A binary predicate over `(left, right)` pairs.
///
/// `Predicate` wraps a [`PredicateProvider`] implementation behind an `Arc`,
/// so clones are cheap and a predicate can be handed to several sweep areas
/// at once. The two type parameters allow the probe type to differ from the
/// element type; most uses keep them equal.
pub struct Predicate<L, R = L> {
    inner: Arc<dyn PredicateProvider<L, R>>,
}

impl<L, R> Clone for Predicate<L, R> {
    fn clone(&self) -> Self {
        Predicate {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L, R> Predicate<L, R> {
    /// Creates a predicate from a provider implementation.
    pub fn new<T: PredicateProvider<L, R> + 'static>(inner: T) -> Self {
        Predicate {
            inner: Arc::new(inner),
        }
    }

    /// Creates a predicate from a plain closure.
    ///
    /// The closure must be infallible; use [`Predicate::new`] with a custom
    /// provider when evaluation itself can fail.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&L, &R) -> bool + Send + Sync + 'static,
    {
        Predicate::new(FnPredicateProvider { f })
    }

    /// Evaluates the predicate.
    #[inline]
    pub fn test(&self, left: &L, right: &R) -> ZweepResult<bool> {
        self.inner.test(left, right)
    }

    /// Whether the predicate rejects every pair by construction.
    #[inline]
    pub fn is_vacuous(&self) -> bool {
        self.inner.is_vacuous()
    }

    /// The provider's short name.
    pub fn name(&self) -> &str {
        self.inner.name()
    }
}

impl<L: 'static, R: 'static> Predicate<L, R> {
    /// A predicate that accepts every pair.
    pub fn always() -> Self {
        Predicate::new(AlwaysProvider(PhantomData))
    }

    /// A predicate that rejects every pair.
    ///
    /// Marked vacuous: a sweep area whose remove predicate is `never()`
    /// reports reorganization as unsupported.
    pub fn never() -> Self {
        Predicate::new(NeverProvider(PhantomData))
    }
}

impl<T: PartialEq + Send + Sync + 'static> Predicate<T, T> {
    /// Value-equality predicate for a single element type.
    pub fn equality() -> Self {
        Predicate::new(EqualityProvider(PhantomData))
    }
}

struct FnPredicateProvider<F> {
    f: F,
}

impl<L, R, F> PredicateProvider<L, R> for FnPredicateProvider<F>
where
    F: Fn(&L, &R) -> bool + Send + Sync,
{
    fn test(&self, left: &L, right: &R) -> ZweepResult<bool> {
        Ok((self.f)(left, right))
    }

    fn name(&self) -> &str {
        "fn-predicate"
    }
}

struct AlwaysProvider<L, R>(PhantomData<fn(&L, &R)>);

impl<L, R> PredicateProvider<L, R> for AlwaysProvider<L, R> {
    fn test(&self, _left: &L, _right: &R) -> ZweepResult<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "always"
    }
}

struct NeverProvider<L, R>(PhantomData<fn(&L, &R)>);

impl<L, R> PredicateProvider<L, R> for NeverProvider<L, R> {
    fn test(&self, _left: &L, _right: &R) -> ZweepResult<bool> {
        Ok(false)
    }

    fn is_vacuous(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "never"
    }
}

struct EqualityProvider<T>(PhantomData<fn(&T)>);

impl<T: PartialEq + Send + Sync> PredicateProvider<T, T> for EqualityProvider<T> {
    fn test(&self, left: &T, right: &T) -> ZweepResult<bool> {
        Ok(left == right)
    }

    fn name(&self) -> &str {
        "equality"
    }
}

/// Trait for implementing hash functions used by hash implementors.
///
/// One hash function is configured per participating stream; probes and
/// elements originating from stream `k` are both routed through
/// `hash_functions[k]`.
pub trait HashFunctionProvider<T>: Send + Sync {
    /// Computes the bucket number for a value.
    fn apply(&self, value: &T) -> ZweepResult<u64>;
}

/// A bucket-routing hash function.
///
/// Wraps a [`HashFunctionProvider`] behind an `Arc`; clones are cheap.
pub struct HashFunction<T> {
    inner: Arc<dyn HashFunctionProvider<T>>,
}

impl<T> Clone for HashFunction<T> {
    fn clone(&self) -> Self {
        HashFunction {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> HashFunction<T> {
    /// Creates a hash function from a provider implementation.
    pub fn new<P: HashFunctionProvider<T> + 'static>(inner: P) -> Self {
        HashFunction {
            inner: Arc::new(inner),
        }
    }

    /// Creates a hash function from a plain closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&T) -> u64 + Send + Sync + 'static,
    {
        struct FnHashProvider<F> {
            f: F,
        }
        impl<T, F> HashFunctionProvider<T> for FnHashProvider<F>
        where
            F: Fn(&T) -> u64 + Send + Sync,
        {
            fn apply(&self, value: &T) -> ZweepResult<u64> {
                Ok((self.f)(value))
            }
        }
        HashFunction::new(FnHashProvider { f })
    }

    /// Computes the bucket number for a value.
    #[inline]
    pub fn apply(&self, value: &T) -> ZweepResult<u64> {
        self.inner.apply(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fn_predicate() {
        let less_than = Predicate::from_fn(|w: &i32, e: &i32| e < w);
        assert!(less_than.test(&5, &3).unwrap());
        assert!(!less_than.test(&5, &7).unwrap());
        assert!(!less_than.is_vacuous());
    }

    #[test]
    fn test_always_and_never() {
        let always: Predicate<i32> = Predicate::always();
        let never: Predicate<i32> = Predicate::never();
        assert!(always.test(&1, &2).unwrap());
        assert!(!never.test(&1, &2).unwrap());
        assert!(never.is_vacuous());
        assert!(!always.is_vacuous());
    }

    #[test]
    fn test_equality_predicate() {
        let eq = Predicate::<i32>::equality();
        assert!(eq.test(&4, &4).unwrap());
        assert!(!eq.test(&4, &5).unwrap());
    }

    #[test]
    fn test_predicate_clone_shares_provider() {
        let p = Predicate::from_fn(|a: &i32, b: &i32| a == b);
        let q = p.clone();
        assert!(q.test(&9, &9).unwrap());
        assert_eq!(p.name(), q.name());
    }

    #[test]
    fn test_hash_function_from_fn() {
        let h = HashFunction::from_fn(|v: &i32| (*v % 8) as u64);
        assert_eq!(h.apply(&11).unwrap(), 3);
        let h2 = h.clone();
        assert_eq!(h2.apply(&16).unwrap(), 0);
    }

    #[test]
    fn test_mixed_types_predicate() {
        // Probe type differs from element type.
        let contains = Predicate::from_fn(|probe: &String, e: &char| probe.contains(*e));
        assert!(contains.test(&"hay".to_string(), &'a').unwrap());
        assert!(!contains.test(&"hay".to_string(), &'z').unwrap());
    }
}
