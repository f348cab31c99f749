//! Sweep areas: the stateful per-stream buffers of a sort-based merge.
//!
//! The module follows a bridge layout. [`SweepArea`] is the facade the join
//! drivers program against; [`SweepAreaProvider`] is the abstraction it
//! wraps; concrete providers delegate raw storage to an injected
//! [`SweepAreaImplementor`] (list, bag or hash), so buffering semantics and
//! storage strategy vary independently. [`StackSweepArea`] short-circuits
//! the bridge for code-ordered input, and [`MemoryManagedSweepArea`] bounds
//! any area's footprint by shedding load.

pub(crate) mod bag;
pub(crate) mod hash;
pub(crate) mod implementor;
pub(crate) mod list;
pub(crate) mod memory;
pub(crate) mod sweep_area;

pub use bag::BagImplementor;
pub use hash::{BucketFactory, HashImplementor, HashStats};
pub use implementor::{ImplementorRef, SweepAreaImplementor};
pub use list::ListImplementor;
pub use memory::{MemoryManagedSweepArea, ObjectSize, RationalFilter};
pub use sweep_area::{DefaultSweepArea, StackSweepArea, SweepArea, SweepAreaProvider};
