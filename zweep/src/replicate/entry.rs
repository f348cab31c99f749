use std::cmp::Ordering;

use crate::common::Rectangle;
use crate::config::PartitionConfig;
use crate::curve::{z_code, BitCode, Coded};
use crate::errors::ZweepResult;

/// A payload tagged with its z-order code, ready for the sort-merge.
///
/// The sequence number records arrival order on the originating stream and
/// breaks ties between equal codes, keeping the merge deterministic.
/// Replicas produced by splitting one input all carry the input's sequence
/// number and have `replicate` set, which is what the duplicate-elimination
/// filter keys on.
///
/// Ordering and equality consider only `(code, sequence, replicate)`; the
/// payload never participates, so `T` needs no ordering bounds.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ZEntry<T> {
    data: T,
    sequence: u64,
    code: BitCode,
    replicate: bool,
}

impl<T> ZEntry<T> {
    /// Encodes a payload from its bounding rectangle.
    ///
    /// The code is the rectangle's z-order code under `config`; `replicate`
    /// starts out false. Entries that should be split first go through
    /// [`crate::replicate::Replicator`] instead.
    pub fn encode(
        data: T,
        sequence: u64,
        rect: &Rectangle,
        config: &PartitionConfig,
    ) -> ZweepResult<ZEntry<T>> {
        Ok(ZEntry {
            data,
            sequence,
            code: z_code(rect, config)?,
            replicate: false,
        })
    }

    /// Wraps a payload with an explicitly computed code.
    pub fn with_code(data: T, sequence: u64, code: BitCode, replicate: bool) -> ZEntry<T> {
        ZEntry {
            data,
            sequence,
            code,
            replicate,
        }
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether this entry is one of several replicas of the same input.
    pub fn is_replicate(&self) -> bool {
        self.replicate
    }
}

impl<T> Coded for ZEntry<T> {
    fn code(&self) -> &BitCode {
        &self.code
    }
}

impl<T> PartialEq for ZEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
            && self.sequence == other.sequence
            && self.replicate == other.replicate
    }
}

impl<T> Eq for ZEntry<T> {}

impl<T> PartialOrd for ZEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for ZEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code
            .cmp(&other.code)
            .then_with(|| self.sequence.cmp(&other.sequence))
            .then_with(|| self.replicate.cmp(&other.replicate))
    }
}
