//! Well-known counter names exposed through the metrics registry.
//!
//! The registry is a read/observe-only side channel; none of these values
//! participate in the correctness of a join.

/// Number of elements currently buffered in a sweep area.
pub const SIZE: &str = "SIZE";

/// Byte footprint per buffered element, once known.
pub const OBJECT_SIZE: &str = "OBJECT_SIZE";

/// Current memory usage of a memory-managed sweep area, in bytes.
pub const MEMORY_USAGE: &str = "MEMORY_USAGE";

/// Number of hash-function invocations performed by a hash implementor.
pub const HASH_CALLS: &str = "HASH_CALLS";

/// Number of bucket insert/remove/scan operations in a hash implementor.
pub const BUCKET_OPS: &str = "BUCKET_OPS";

/// Number of query-predicate invocations.
pub const PREDICATE_CALLS: &str = "PREDICATE_CALLS";

/// Number of query-predicate invocations that returned true.
pub const PREDICATE_HITS: &str = "PREDICATE_HITS";

/// Number of partition-tagged entries emitted by a replicator.
pub const REPLICAS_EMITTED: &str = "REPLICAS_EMITTED";

/// Number of rectangle splits performed by a replicator.
pub const SPLITS_PERFORMED: &str = "SPLITS_PERFORMED";

/// Number of result pairs emitted by a join driver.
pub const RESULT_PAIRS: &str = "RESULT_PAIRS";

/// Number of candidate pairs suppressed by the reference-point filter.
pub const DUPLICATES_DROPPED: &str = "DUPLICATES_DROPPED";

/// High-water mark of buffered elements across both sweep areas of a join.
pub const MAX_BUFFER_SIZE: &str = "MAX_BUFFER_SIZE";

/// Number of elements dropped by load shedding.
pub const ELEMENTS_SHED: &str = "ELEMENTS_SHED";
