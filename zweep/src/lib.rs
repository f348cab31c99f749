#![allow(
    dead_code,
    unused_imports,
    clippy::invisible_characters,
    clippy::approx_constant,
)]
//! # Zweep - Sweep-Area Similarity Joins
//!
//! Zweep is a sort-merge similarity-join engine for spatial data. Inputs
//! are collections of hyper-rectangles (or anything that maps to one);
//! each rectangle is linearized onto a z-order curve, the encoded streams
//! are sorted and merged, and candidate pairs are generated wherever one
//! code is a prefix of the other.
//!
//! ## Key Features
//!
//! - **Sweep areas**: pluggable per-stream buffers (list, bag, hash and a
//!   LIFO specialization for code-ordered input) behind one facade
//! - **Z-order codes**: rectangle and point encoding, decoding, and
//!   BIGMIN-based range scanning
//! - **Replication**: boundary straddlers split into selective fragments
//!   under a pluggable split policy
//! - **Three drivers**: the plain sort-merge, the replicating variant with
//!   reference-point duplicate elimination, and the multi-level merge
//! - **Bounded memory**: an optional decorator sheds buffered elements
//!   deterministically when a byte budget is exceeded
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use zweep::common::{Predicate, Rectangle};
//! use zweep::config::PartitionConfig;
//! use zweep::join::GessJoin;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PartitionConfig::new(2, 16)?;
//! let intersects = Predicate::from_fn(|a: &Rectangle, b: &Rectangle| a.intersects(b));
//!
//! let driver = GessJoin::new(config).join(
//!     left_rects,
//!     right_rects,
//!     |r: &Rectangle| r.clone(),
//!     intersects,
//!     |a, b| (a.sequence(), b.sequence()),
//! )?;
//! for pair in driver {
//!     println!("{:?}", pair?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Coordinates are the caller's responsibility: normalize them into
//! `[0, 1)` per dimension before joining. Out-of-range values are clamped
//! into the boundary cells without complaint.

pub mod common;
pub mod config;
pub mod curve;
pub mod errors;
pub mod join;
pub mod metrics;
pub mod replicate;
pub mod sweep;
