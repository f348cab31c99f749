//! Space-filling-curve machinery: bit codes, z-order mapping and a 2-D
//! Hilbert alternative.
//!
//! Only the z-order functions drive the join algorithms; the Hilbert curve
//! is provided as an alternative linearization for callers that cluster
//! data themselves.

mod bit_code;
mod hilbert;
mod z_order;

pub use bit_code::{BitCode, Coded};
pub use hilbert::{hilbert_cell, hilbert_code, hilbert_index};
pub use z_order::{
    code_in_box, decode_cell, next_in_box, z_code, z_code_folded, z_code_from_bits, z_code_point,
};
pub(crate) use z_order::cell_of;

use thiserror::Error;

use crate::errors::{ErrorKind, ZweepError};

/// Errors raised by the curve functions.
#[derive(Error, Debug)]
pub enum CurveError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("precision {0} exceeds the supported code length")]
    PrecisionOverflow(u32),

    #[error("invalid curve input: {0}")]
    InvalidInput(String),
}

impl From<CurveError> for ZweepError {
    fn from(err: CurveError) -> Self {
        match err {
            CurveError::DimensionMismatch { .. } | CurveError::InvalidInput(_) => {
                ZweepError::new(&err.to_string(), ErrorKind::InvalidArgument)
            }
            CurveError::PrecisionOverflow(_) => {
                ZweepError::new(&err.to_string(), ErrorKind::EncodingError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_error_conversion() {
        let err: ZweepError = CurveError::DimensionMismatch {
            expected: 2,
            actual: 3,
        }
        .into();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
        assert!(err.message().contains("expected 2"));

        let err: ZweepError = CurveError::PrecisionOverflow(4096).into();
        assert_eq!(err.kind(), &ErrorKind::EncodingError);
    }
}
