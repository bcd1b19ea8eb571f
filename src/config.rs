//! Sketch parameters fixed at construction time.
//!
//! A sketch is defined by two parameters:
//! - `p`: precision in `[4..18]` range, which defines the number of hash bits
//!   used for register indices and therefore the register count `m = 2^p`.
//! - `w`: hash width, 32 or 64 bits, which defines the domain of the remaining
//!   `w - p` bits used for rank computation and selects the large-range
//!   correction formula.

use crate::error::HllError;

/// Minimum supported precision.
pub const MIN_PRECISION: u8 = 4;
/// Maximum supported precision.
pub const MAX_PRECISION: u8 = 18;

/// Width of the hash values consumed by a sketch.
///
/// The classical `2^32` large-range correction only applies to [`W32`]; with
/// 64-bit hashes the saturation point is practically unreachable and the
/// correction is a no-op.
///
/// [`W32`]: HashWidth::W32
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashWidth {
    W32,
    W64,
}

impl HashWidth {
    /// Number of bits of a hash value of this width.
    #[inline]
    pub fn bits(self) -> u8 {
        match self {
            HashWidth::W32 => 32,
            HashWidth::W64 => 64,
        }
    }
}

/// Validated `(p, w)` pair shared by all components of a sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Config {
    precision: u8,
    width: HashWidth,
}

impl Config {
    /// Validate precision and build a config, or report `InvalidPrecision`.
    pub(crate) fn new(precision: u8, width: HashWidth) -> Result<Self, HllError> {
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
            return Err(HllError::InvalidPrecision { precision });
        }
        Ok(Self { precision, width })
    }

    #[inline]
    pub(crate) fn precision(&self) -> u8 {
        self.precision
    }

    #[inline]
    pub(crate) fn width(&self) -> HashWidth {
        self.width
    }

    /// Number of registers `m = 2^p`.
    #[inline]
    pub(crate) fn registers(&self) -> usize {
        1 << self.precision
    }

    /// Largest rank a register can hold: `w - p`.
    #[inline]
    pub(crate) fn max_rank(&self) -> u8 {
        self.width.bits() - self.precision
    }

    /// Expected relative standard error of the estimate: `1.04 / sqrt(m)`.
    #[inline]
    pub(crate) fn standard_error(&self) -> f64 {
        1.04 / (self.registers() as f64).sqrt()
    }

    /// Sparse stores promote once they hold more distinct entries than this.
    #[inline]
    pub(crate) fn promotion_entries(&self) -> usize {
        self.registers() * 3 / 4
    }

    /// Sparse stores promote once their encoded stream outgrows the dense
    /// footprint of `m` one-byte registers.
    #[inline]
    pub(crate) fn promotion_bytes(&self) -> usize {
        self.registers()
    }

    /// Split a hash value into `(index, rank)`.
    ///
    /// The top `p` bits of the `w`-bit hash select the register; the rank is
    /// one plus the number of leading zeros of the remaining `w - p` bits,
    /// capped at `w - p` when the remainder is all zeros so the value never
    /// exceeds the register's representable maximum.
    ///
    /// For `W32` the low 32 bits of the hasher output are used.
    #[inline]
    pub(crate) fn split_hash(&self, hash: u64) -> (u32, u8) {
        let p = u32::from(self.precision);
        match self.width {
            HashWidth::W32 => {
                let x = hash as u32;
                let index = x >> (32 - p);
                let rest = x << p;
                let rank = if rest == 0 { 32 - p } else { rest.leading_zeros() + 1 };
                (index, rank as u8)
            }
            HashWidth::W64 => {
                let index = (hash >> (64 - p)) as u32;
                let rest = hash << p;
                let rank = if rest == 0 { 64 - p } else { rest.leading_zeros() + 1 };
                (index, rank as u8)
            }
        }
    }
}
