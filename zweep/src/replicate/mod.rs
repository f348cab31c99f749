//! Replication: turning boundary straddlers into selective code fragments.
//!
//! Short z-order codes are poison for a sort-merge: a rectangle whose code
//! is a prefix of half the key space matches half the key space. This
//! module splits such rectangles before the merge, under a pluggable
//! [`SplitPolicy`] that bounds the cost, and tags the fragments so the
//! downstream reference-point filter can drop the duplicate result pairs
//! replication would otherwise produce.

mod entry;
mod replicator;
mod split_policy;

pub use entry::ZEntry;
pub use replicator::{ReplicateStream, Replicator, Traversal};
pub use split_policy::{SplitPolicy, SplitPolicyProvider, SplitStatus};
