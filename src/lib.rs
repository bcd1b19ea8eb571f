//! `cardinality-sketch` estimates the number of distinct elements in a stream
//! or dataset using bounded, sub-linear memory.
//!
//! This library implements HyperLogLog with a compact sparse representation for
//! small cardinalities and a flat dense register array for large ones, suitable
//! for analytics, deduplication and distributed count-distinct aggregation.
//!
//! # Data-structure design rationale
//!
//! ## Low memory footprint
//!
//! A freshly created sketch starts in sparse mode: only non-zero registers are
//! stored, delta plus varint encoded in ascending index order, with exact byte
//! accounting. Once the sparse store grows past a fraction of the dense
//! footprint the sketch irreversibly promotes to a flat array of `m = 2^p`
//! one-byte registers.
//!
//! ## Low latency
//! - Sparse inserts are absorbed by a bounded buffer and merged into the
//!   encoded stream in sorted batches, keeping updates amortized sub-linear
//!   in `m`.
//! - The dense store tracks its zero-register count and registers' harmonic
//!   sum incrementally, making `estimate` a constant-time operation.
//!
//! ## High accuracy
//! - Three-regime estimation: linear counting for small cardinalities, a
//!   bias-corrected raw estimate in the moderate range, and large-range
//!   collision correction for the 32-bit hash width.
//!   - Expected error: 1.04 / sqrt(2^p), e.g. 0.81% at `p = 14`.
//!
//! # Example
//!
//! ```
//! use cardinality_sketch::{HashWidth, HyperLogLog};
//!
//! let mut sketch: HyperLogLog = HyperLogLog::new(14, HashWidth::W64).unwrap();
//! for i in 0..1000 {
//!     sketch.insert(&i);
//! }
//! assert!((sketch.count() as f64 - 1000.0).abs() / 1000.0 < 0.05);
//! ```
mod codec;
mod config;
mod dense;
mod error;
mod estimate;
#[cfg(feature = "with_serde")]
mod serde;
mod sketch;
mod sparse;

pub use config::{HashWidth, MAX_PRECISION, MIN_PRECISION};
pub use error::HllError;
pub use sketch::{HyperLogLog, Mode};
