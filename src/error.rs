use thiserror::Error;

use crate::config::HashWidth;

/// Errors surfaced by sketch construction, merging and decoding.
///
/// All core operations are deterministic in-memory computations: there are no
/// transient failures and nothing is retried. Estimation itself is infallible.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HllError {
    /// Requested precision is outside the supported `[4, 18]` range.
    #[error("precision {precision} outside supported range [{min}, {max}]", min = crate::MIN_PRECISION, max = crate::MAX_PRECISION)]
    InvalidPrecision { precision: u8 },

    /// Attempted to merge sketches built with different parameters.
    #[error("cannot merge sketch with p={rhs_precision}/{rhs_width:?} into sketch with p={lhs_precision}/{lhs_width:?}")]
    PrecisionMismatch {
        lhs_precision: u8,
        lhs_width: HashWidth,
        rhs_precision: u8,
        rhs_width: HashWidth,
    },

    /// Serialized byte stream failed validation during decoding.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(&'static str),
}
