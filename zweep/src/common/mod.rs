//! Shared building blocks: predicates, streams, rectangles and lock helpers.

pub mod constants;
mod predicate;
mod rectangle;
mod stream;
mod types;

pub use predicate::{HashFunction, HashFunctionProvider, Predicate, PredicateProvider};
pub use rectangle::Rectangle;
pub use stream::{ElementStream, ElementStreamProvider};
pub use types::{atomic, Atomic, ReadExecutor, WriteExecutor};
