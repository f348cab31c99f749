//! The join drivers: three ways to run the same sort-merge core.
//!
//! [`OrensteinJoin`] encodes each rectangle once and merges; [`GessJoin`]
//! replicates boundary straddlers first and eliminates the resulting
//! duplicates with a reference-point filter; [`MsjJoin`] organizes encoded
//! entries into per-level files and k-merges them into the global order.
//! All three feed the same [`MergeJoin`] driver.

mod driver;
mod gess;
mod msj;
mod orenstein;

pub use driver::{EntryInput, MergeJoin};
pub use gess::GessJoin;
pub use msj::MsjJoin;
pub use orenstein::OrensteinJoin;

use crate::common::Predicate;
use crate::curve::Coded;
use crate::errors::ZweepResult;
use crate::replicate::ZEntry;
use crate::sweep::{StackSweepArea, SweepArea};

/// The candidate predicate of the code-based merge: two entries can match
/// only if one code is a prefix of the other (their partition cells nest).
pub fn prefix_overlap<T>() -> Predicate<ZEntry<T>, ZEntry<T>> {
    Predicate::from_fn(|probe: &ZEntry<T>, element: &ZEntry<T>| {
        probe.code().is_prefix_of(element.code()) || element.code().is_prefix_of(probe.code())
    })
}

/// A pair of LIFO sweep areas wired for a two-stream merge, both using the
/// same query predicate for either probing direction.
pub fn stack_area_pair<T>(
    predicate: Predicate<ZEntry<T>, ZEntry<T>>,
) -> ZweepResult<[SweepArea<ZEntry<T>, ZEntry<T>>; 2]>
where
    T: Clone + Send + Sync + 'static,
{
    Ok([
        SweepArea::new(StackSweepArea::new(
            0,
            true,
            vec![predicate.clone(), predicate.clone()],
        )?),
        SweepArea::new(StackSweepArea::new(1, true, vec![predicate.clone(), predicate])?),
    ])
}
