use std::hash::Hash;

use smallvec::SmallVec;

use crate::errors::{ErrorKind, ZweepError, ZweepResult};

/// A d-dimensional closed hyper-rectangle given by its lower and upper corners.
///
/// `Rectangle` is the geometric input of the partitioning machinery: the
/// replicator cuts rectangles along partition boundaries and the space-filling
/// curve maps them to z-order codes. Coordinates are interpreted as closed
/// intervals `[lower[d], upper[d]]` per dimension.
///
/// Partition codes are only meaningful for rectangles normalized into the
/// unit hypercube `[0, 1)^d`; callers are responsible for pre-normalizing
/// (see `curve::z_code`).
///
/// # Examples
///
/// ```rust,ignore
/// use zweep::common::Rectangle;
///
/// let a = Rectangle::new(&[0.1, 0.2], &[0.4, 0.6])?;
/// let b = Rectangle::new(&[0.3, 0.5], &[0.9, 0.9])?;
/// assert!(a.intersects(&b));
/// ```
#[derive(Clone, PartialEq, Default, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Rectangle {
    lower: SmallVec<[f64; 4]>,
    upper: SmallVec<[f64; 4]>,
}

impl Eq for Rectangle {}

impl PartialOrd for Rectangle {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rectangle {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // corner sequence order: lower corner first, then upper
        for (a, b) in self
            .lower
            .iter()
            .chain(self.upper.iter())
            .zip(other.lower.iter().chain(other.upper.iter()))
        {
            let ord = a.partial_cmp(b).unwrap();
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        self.dimensions().cmp(&other.dimensions())
    }
}

impl Hash for Rectangle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for v in self.lower.iter().chain(self.upper.iter()) {
            v.to_bits().hash(state);
        }
    }
}

impl std::fmt::Display for Rectangle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rectangle({:?}, {:?})", self.lower.as_slice(), self.upper.as_slice())
    }
}

impl Rectangle {
    /// Creates a new rectangle from its lower and upper corners.
    ///
    /// Fails with an invalid-argument error when the corners differ in
    /// dimensionality or are empty. Corner ordering is not validated here;
    /// use [`Rectangle::is_valid`] to check it.
    pub fn new(lower: &[f64], upper: &[f64]) -> ZweepResult<Rectangle> {
        if lower.is_empty() || lower.len() != upper.len() {
            log::error!(
                "invalid rectangle corners: lower has {} dims, upper has {}",
                lower.len(),
                upper.len()
            );
            return Err(ZweepError::new(
                "rectangle corners must be non-empty and of equal dimensionality",
                ErrorKind::InvalidArgument,
            ));
        }
        Ok(Rectangle {
            lower: SmallVec::from_slice(lower),
            upper: SmallVec::from_slice(upper),
        })
    }

    /// Creates a degenerate rectangle covering a single point.
    pub fn point(coords: &[f64]) -> ZweepResult<Rectangle> {
        Rectangle::new(coords, coords)
    }

    /// Number of dimensions.
    pub fn dimensions(&self) -> usize {
        self.lower.len()
    }

    /// The lower corner.
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// The upper corner.
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// The extent along one dimension.
    pub fn extent(&self, dim: usize) -> f64 {
        self.upper[dim] - self.lower[dim]
    }

    /// The product of all extents.
    pub fn volume(&self) -> f64 {
        (0..self.dimensions()).map(|d| self.extent(d)).product()
    }

    /// The center point.
    pub fn center(&self) -> SmallVec<[f64; 4]> {
        self.lower
            .iter()
            .zip(self.upper.iter())
            .map(|(lo, up)| (lo + up) / 2.0)
            .collect()
    }

    /// Checks if this rectangle contains a point.
    pub fn contains_point(&self, point: &[f64]) -> bool {
        if point.len() != self.dimensions() {
            return false;
        }
        self.lower
            .iter()
            .zip(self.upper.iter())
            .zip(point.iter())
            .all(|((lo, up), p)| p >= lo && p <= up)
    }

    /// Checks if this rectangle fully contains another rectangle.
    pub fn contains(&self, other: &Rectangle) -> bool {
        if other.dimensions() != self.dimensions() {
            return false;
        }
        (0..self.dimensions())
            .all(|d| other.lower[d] >= self.lower[d] && other.upper[d] <= self.upper[d])
    }

    /// Checks if this rectangle intersects another rectangle.
    ///
    /// Closed-interval semantics: rectangles that only touch at a face or
    /// corner still intersect.
    pub fn intersects(&self, other: &Rectangle) -> bool {
        if other.dimensions() != self.dimensions() {
            return false;
        }
        (0..self.dimensions())
            .all(|d| self.lower[d] <= other.upper[d] && other.lower[d] <= self.upper[d])
    }

    /// Returns the smallest rectangle covering both inputs.
    pub fn union(&self, other: &Rectangle) -> ZweepResult<Rectangle> {
        if other.dimensions() != self.dimensions() {
            return Err(ZweepError::new(
                "cannot union rectangles of different dimensionality",
                ErrorKind::InvalidArgument,
            ));
        }
        let lower: SmallVec<[f64; 4]> = self
            .lower
            .iter()
            .zip(other.lower.iter())
            .map(|(a, b)| a.min(*b))
            .collect();
        let upper: SmallVec<[f64; 4]> = self
            .upper
            .iter()
            .zip(other.upper.iter())
            .map(|(a, b)| a.max(*b))
            .collect();
        Ok(Rectangle { lower, upper })
    }

    /// Returns the overlap of both inputs, or `None` when they are disjoint.
    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        if !self.intersects(other) {
            return None;
        }
        let lower: SmallVec<[f64; 4]> = self
            .lower
            .iter()
            .zip(other.lower.iter())
            .map(|(a, b)| a.max(*b))
            .collect();
        let upper: SmallVec<[f64; 4]> = self
            .upper
            .iter()
            .zip(other.upper.iter())
            .map(|(a, b)| a.min(*b))
            .collect();
        Some(Rectangle { lower, upper })
    }

    /// Whether this rectangle is degenerate (lower corner equals upper).
    pub fn is_point(&self) -> bool {
        self.lower == self.upper
    }

    /// Whether every dimension has `lower <= upper` and finite coordinates.
    pub fn is_valid(&self) -> bool {
        self.lower
            .iter()
            .zip(self.upper.iter())
            .all(|(lo, up)| lo.is_finite() && up.is_finite() && lo <= up)
    }

    /// Replaces the lower bound in one dimension, returning a new rectangle.
    pub(crate) fn with_lower(&self, dim: usize, value: f64) -> Rectangle {
        let mut lower = self.lower.clone();
        lower[dim] = value;
        Rectangle {
            lower,
            upper: self.upper.clone(),
        }
    }

    /// Replaces the upper bound in one dimension, returning a new rectangle.
    pub(crate) fn with_upper(&self, dim: usize, value: f64) -> Rectangle {
        let mut upper = self.upper.clone();
        upper[dim] = value;
        Rectangle {
            lower: self.lower.clone(),
            upper,
        }
    }
}
