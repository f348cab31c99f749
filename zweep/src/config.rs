use crate::errors::{ErrorKind, ZweepError, ZweepResult};

/// Highest partition depth supported per dimension.
///
/// Grid cell numbers are derived from `f64` coordinates; beyond 52 bits the
/// mantissa can no longer distinguish adjacent cells.
pub const MAX_SUPPORTED_LEVEL: u32 = 52;

/// Partitioning parameters shared by the curve functions, the replicator
/// and the join drivers.
///
/// `dimensions` is the dimensionality of the data space, `max_level` the
/// maximum partition depth per dimension, and `min_bit_index` the depth
/// below which the replicator never splits (0 allows splitting all the way
/// down to `max_level`).
///
/// # Examples
///
/// ```rust,ignore
/// use zweep::config::PartitionConfig;
///
/// let config = PartitionConfig::new(2, 16)?;
/// assert_eq!(config.full_precision(), 32);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionConfig {
    dimensions: usize,
    max_level: u32,
    min_bit_index: u32,
}

impl PartitionConfig {
    /// Creates a new configuration with `min_bit_index = 0`.
    pub fn new(dimensions: usize, max_level: u32) -> ZweepResult<Self> {
        if dimensions == 0 {
            log::error!("partition config rejected: dimensions must be >= 1");
            return Err(ZweepError::new(
                "dimensions must be at least 1",
                ErrorKind::InvalidArgument,
            ));
        }
        if max_level == 0 || max_level > MAX_SUPPORTED_LEVEL {
            log::error!(
                "partition config rejected: max_level {} outside 1..={}",
                max_level,
                MAX_SUPPORTED_LEVEL
            );
            return Err(ZweepError::new(
                "max_level must be between 1 and 52",
                ErrorKind::InvalidArgument,
            ));
        }
        Ok(PartitionConfig {
            dimensions,
            max_level,
            min_bit_index: 0,
        })
    }

    /// Sets the minimum bit index below which no splitting happens.
    pub fn with_min_bit_index(mut self, min_bit_index: u32) -> ZweepResult<Self> {
        if min_bit_index >= self.max_level {
            log::error!(
                "partition config rejected: min_bit_index {} >= max_level {}",
                min_bit_index,
                self.max_level
            );
            return Err(ZweepError::new(
                "min_bit_index must be smaller than max_level",
                ErrorKind::InvalidArgument,
            ));
        }
        self.min_bit_index = min_bit_index;
        Ok(self)
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    pub fn min_bit_index(&self) -> u32 {
        self.min_bit_index
    }

    /// Code precision of a point encoded at full depth.
    pub fn full_precision(&self) -> u32 {
        self.max_level * self.dimensions as u32
    }
}
