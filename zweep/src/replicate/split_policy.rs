use std::sync::Arc;

/// A snapshot of the replicator's progress on one input element, handed to
/// the split policy before every prospective split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitStatus {
    /// How many splits the candidate rectangle has already been through.
    pub generation: u32,
    /// Partition level of the prospective split, counted from the top.
    pub bit_index: u32,
    /// Splits already performed at this level for the current input.
    pub splits_at_level: u32,
    /// Replicas the current input already has, counting finalized entries
    /// and fragments still queued for processing. A split raises this by
    /// one.
    pub replicates_emitted: u32,
}

/// Trait for implementing split policies.
///
/// A split policy bounds the replication cost per input element. The
/// replicator consults it before every split; once denied, the candidate
/// rectangle is emitted as-is with whatever code it has.
pub trait SplitPolicyProvider: Send + Sync {
    /// Whether the prospective split may go ahead.
    fn allow_split(&self, status: &SplitStatus) -> bool;

    /// Called at the start of every input element, for stateful policies.
    fn reset(&self) {}

    /// A short name used in log messages.
    fn name(&self) -> &str {
        "split-policy"
    }
}

/// A replication-bounding policy behind an `Arc`; clones are cheap.
pub struct SplitPolicy {
    inner: Arc<dyn SplitPolicyProvider>,
}

impl Clone for SplitPolicy {
    fn clone(&self) -> Self {
        SplitPolicy {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl SplitPolicy {
    pub fn new<P: SplitPolicyProvider + 'static>(inner: P) -> Self {
        SplitPolicy {
            inner: Arc::new(inner),
        }
    }

    /// Creates a policy from a plain closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&SplitStatus) -> bool + Send + Sync + 'static,
    {
        struct FnPolicy<F> {
            f: F,
        }
        impl<F> SplitPolicyProvider for FnPolicy<F>
        where
            F: Fn(&SplitStatus) -> bool + Send + Sync,
        {
            fn allow_split(&self, status: &SplitStatus) -> bool {
                (self.f)(status)
            }
        }
        SplitPolicy::new(FnPolicy { f })
    }

    /// Allows every split; replication is bounded only by the partition
    /// depth.
    pub fn unlimited() -> Self {
        SplitPolicy::from_fn(|_| true)
    }

    /// Denies every split; each input maps to exactly one entry.
    pub fn none() -> Self {
        SplitPolicy::from_fn(|_| false)
    }

    /// Stops splitting a rectangle after `n` generations.
    pub fn max_generation(n: u32) -> Self {
        SplitPolicy::from_fn(move |status: &SplitStatus| status.generation < n)
    }

    /// Bounds the number of splits performed at any single level.
    pub fn max_splits_per_level(n: u32) -> Self {
        SplitPolicy::from_fn(move |status: &SplitStatus| status.splits_at_level < n)
    }

    /// Forbids splits above the given partition level; coarse straddlers
    /// stay whole while fine ones still split.
    pub fn min_split_bit(n: u32) -> Self {
        SplitPolicy::from_fn(move |status: &SplitStatus| status.bit_index >= n)
    }

    /// Bounds the total number of replicas per input element.
    pub fn max_replicates(n: u32) -> Self {
        // each split adds one replica to the final count
        SplitPolicy::from_fn(move |status: &SplitStatus| status.replicates_emitted < n)
    }

    #[inline]
    pub fn allow_split(&self, status: &SplitStatus) -> bool {
        self.inner.allow_split(status)
    }

    pub fn reset(&self) {
        self.inner.reset()
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(generation: u32, bit_index: u32, splits_at_level: u32, emitted: u32) -> SplitStatus {
        SplitStatus {
            generation,
            bit_index,
            splits_at_level,
            replicates_emitted: emitted,
        }
    }

    #[test]
    fn test_unlimited_and_none() {
        assert!(SplitPolicy::unlimited().allow_split(&status(9, 9, 9, 9)));
        assert!(!SplitPolicy::none().allow_split(&status(0, 0, 0, 0)));
    }

    #[test]
    fn test_max_generation() {
        let policy = SplitPolicy::max_generation(2);
        assert!(policy.allow_split(&status(0, 0, 0, 0)));
        assert!(policy.allow_split(&status(1, 0, 0, 0)));
        assert!(!policy.allow_split(&status(2, 0, 0, 0)));
    }

    #[test]
    fn test_max_splits_per_level() {
        let policy = SplitPolicy::max_splits_per_level(1);
        assert!(policy.allow_split(&status(0, 3, 0, 0)));
        assert!(!policy.allow_split(&status(0, 3, 1, 0)));
    }

    #[test]
    fn test_min_split_bit() {
        let policy = SplitPolicy::min_split_bit(4);
        assert!(!policy.allow_split(&status(0, 3, 0, 0)));
        assert!(policy.allow_split(&status(0, 4, 0, 0)));
    }

    #[test]
    fn test_max_replicates() {
        let policy = SplitPolicy::max_replicates(4);
        // three replicas so far, a split makes four: still allowed
        assert!(policy.allow_split(&status(0, 0, 0, 3)));
        // at four the next split would exceed the bound
        assert!(!policy.allow_split(&status(0, 0, 0, 4)));
    }
}
