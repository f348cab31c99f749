use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use smallvec::SmallVec;

use crate::errors::{ErrorKind, ZweepError};

/// A fixed-precision bit string, the representation of z-order codes.
///
/// Bits are indexed from 0 (most significant / first bit of the string) and
/// packed MSB-first into 64-bit words. The precision is the number of
/// meaningful bits; trailing bits of the last word are kept at zero so that
/// equality and hashing can work on the raw words.
///
/// # Ordering
///
/// Comparison is purely lexicographic over the stored bits, with the
/// precision as a tiebreaker: a proper prefix sorts *before* all of its
/// extensions, and equal-prefix codes of different precision are not equal.
/// This is the order the join drivers expect their input streams to be
/// sorted by. Callers interested in prefix containment must use
/// [`BitCode::is_prefix_of`] rather than equality.
///
/// # Examples
///
/// ```rust,ignore
/// use zweep::curve::BitCode;
///
/// let a: BitCode = "0101".parse()?;
/// let b: BitCode = "01".parse()?;
/// assert!(b < a);
/// assert!(b.is_prefix_of(&a));
/// assert_ne!(a, b);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BitCode {
    bits: SmallVec<[u64; 2]>,
    precision: u32,
}

impl BitCode {
    /// The empty code (precision 0), the coarsest possible partition.
    pub fn new() -> Self {
        BitCode {
            bits: SmallVec::new(),
            precision: 0,
        }
    }

    /// An all-zero code of the given precision.
    pub fn zeros(precision: u32) -> Self {
        let words = BitCode::words_for(precision);
        BitCode {
            bits: smallvec::smallvec![0u64; words],
            precision,
        }
    }

    fn words_for(precision: u32) -> usize {
        ((precision as usize) + 63) / 64
    }

    /// Number of meaningful bits.
    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn is_empty(&self) -> bool {
        self.precision == 0
    }

    /// Partition level this code represents for a space of `dims` dimensions.
    pub fn level(&self, dims: usize) -> u32 {
        self.precision / dims as u32
    }

    fn word(&self, index: usize) -> u64 {
        self.bits.get(index).copied().unwrap_or(0)
    }

    /// Reads bit `index`; bits at or beyond the precision read as zero.
    pub fn get(&self, index: u32) -> bool {
        if index >= self.precision {
            return false;
        }
        let word = self.word((index / 64) as usize);
        (word >> (63 - (index % 64))) & 1 == 1
    }

    /// Writes bit `index`, which must be within the precision.
    pub fn set(&mut self, index: u32, value: bool) {
        debug_assert!(index < self.precision, "bit index out of range");
        let word = &mut self.bits[(index / 64) as usize];
        let mask = 1u64 << (63 - (index % 64));
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    /// Appends one bit, growing the precision by one.
    pub fn push(&mut self, value: bool) {
        if self.precision as usize == self.bits.len() * 64 {
            self.bits.push(0);
        }
        self.precision += 1;
        if value {
            self.set(self.precision - 1, true);
        }
    }

    /// The first `length` bits as a new code.
    ///
    /// Requesting more bits than present returns a plain copy.
    pub fn prefix(&self, length: u32) -> BitCode {
        if length >= self.precision {
            return self.clone();
        }
        let words = BitCode::words_for(length);
        let mut bits: SmallVec<[u64; 2]> = self.bits[..words].into();
        // keep trailing bits of the last word zeroed
        let tail = length % 64;
        if tail != 0 {
            let mask = !0u64 << (64 - tail);
            bits[words - 1] &= mask;
        }
        BitCode {
            bits,
            precision: length,
        }
    }

    /// Length of the common prefix of two codes, in bits.
    pub fn common_prefix_len(&self, other: &BitCode) -> u32 {
        let limit = self.precision.min(other.precision);
        let words = BitCode::words_for(limit);
        let mut agreed = 0u32;
        for i in 0..words {
            let diff = self.word(i) ^ other.word(i);
            if diff == 0 {
                agreed += 64;
            } else {
                agreed += diff.leading_zeros();
                break;
            }
        }
        agreed.min(limit)
    }

    /// Whether this code is a (not necessarily proper) prefix of `other`.
    pub fn is_prefix_of(&self, other: &BitCode) -> bool {
        self.precision <= other.precision && self.common_prefix_len(other) == self.precision
    }

    /// Treats the code as a fixed-width integer and adds one.
    ///
    /// Returns `None` on carry out of the most significant bit. Precision is
    /// unchanged.
    pub fn increment(&self) -> Option<BitCode> {
        if self.precision == 0 {
            return None;
        }
        let mut out = self.clone();
        let mut index = self.precision;
        loop {
            if index == 0 {
                return None;
            }
            index -= 1;
            if out.get(index) {
                out.set(index, false);
            } else {
                out.set(index, true);
                return Some(out);
            }
        }
    }
}

impl PartialOrd for BitCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BitCode {
    fn cmp(&self, other: &Self) -> Ordering {
        let words = self.bits.len().max(other.bits.len());
        for i in 0..words {
            let ord = self.word(i).cmp(&other.word(i));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.precision.cmp(&other.precision)
    }
}

impl Display for BitCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.precision {
            write!(f, "{}", if self.get(i) { '1' } else { '0' })?;
        }
        Ok(())
    }
}

impl FromStr for BitCode {
    type Err = ZweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut code = BitCode::new();
        for c in s.chars() {
            match c {
                '0' => code.push(false),
                '1' => code.push(true),
                _ => {
                    return Err(ZweepError::new(
                        &format!("invalid bit character '{}' in code string", c),
                        ErrorKind::EncodingError,
                    ))
                }
            }
        }
        Ok(code)
    }
}

/// Types carrying a z-order partition code.
///
/// The stack-based sweep area and the merge drivers only need to see the
/// code of an element, not its payload; this trait is that seam.
pub trait Coded {
    fn code(&self) -> &BitCode;
}

impl Coded for BitCode {
    fn code(&self) -> &BitCode {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> BitCode {
        s.parse().unwrap()
    }

    #[test]
    fn test_push_get_set() {
        let mut c = BitCode::new();
        c.push(true);
        c.push(false);
        c.push(true);
        assert_eq!(c.precision(), 3);
        assert!(c.get(0));
        assert!(!c.get(1));
        assert!(c.get(2));
        assert!(!c.get(3));
        c.set(1, true);
        assert_eq!(c.to_string(), "111");
    }

    #[test]
    fn test_parse_and_display_round_trip() {
        let c = code("0101100");
        assert_eq!(c.to_string(), "0101100");
        assert_eq!(c.precision(), 7);
        assert!("01x".parse::<BitCode>().is_err());
    }

    #[test]
    fn test_lexicographic_order() {
        assert!(code("001") < code("010"));
        assert!(code("10") < code("11"));
        // a proper prefix sorts before its extensions
        assert!(code("01") < code("010"));
        assert!(code("01") < code("011"));
        // zero-extension still compares greater via precision tiebreak
        assert!(code("0") < code("00"));
        // extension with a one-bit is greater through the bits themselves
        assert!(code("0") < code("01"));
        assert!(code("011") > code("01"));
    }

    #[test]
    fn test_equal_prefix_different_precision_not_equal() {
        let short = code("0101");
        let long = code("01010");
        assert_ne!(short, long);
        assert!(short.is_prefix_of(&long));
        assert!(!long.is_prefix_of(&short));
    }

    #[test]
    fn test_common_prefix_len() {
        assert_eq!(code("0101").common_prefix_len(&code("0110")), 2);
        assert_eq!(code("0101").common_prefix_len(&code("0101")), 4);
        assert_eq!(code("1").common_prefix_len(&code("0")), 0);
        assert_eq!(code("").common_prefix_len(&code("0101")), 0);
    }

    #[test]
    fn test_prefix_masks_trailing_bits() {
        let c = code("0111");
        let p = c.prefix(2);
        assert_eq!(p.to_string(), "01");
        assert_eq!(p, code("01"));
        assert_eq!(c.prefix(9), c);
    }

    #[test]
    fn test_multi_word_codes() {
        let mut long = BitCode::zeros(70);
        long.set(69, true);
        assert_eq!(long.precision(), 70);
        assert!(long.get(69));
        assert!(!long.get(68));

        let shorter = long.prefix(64);
        assert_eq!(shorter, BitCode::zeros(64));
        assert!(shorter < long);
        assert!(shorter.is_prefix_of(&long));
    }

    #[test]
    fn test_increment() {
        assert_eq!(code("0101").increment().unwrap(), code("0110"));
        assert_eq!(code("0111").increment().unwrap(), code("1000"));
        assert!(code("1111").increment().is_none());
        assert!(BitCode::new().increment().is_none());
    }

    #[test]
    fn test_level() {
        assert_eq!(code("010110").level(2), 3);
        assert_eq!(code("01011").level(2), 2);
        assert_eq!(code("").level(3), 0);
    }
}
