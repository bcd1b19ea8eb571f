//! Public sketch type: hashing, representation dispatch, merging and the
//! serialization surface.
//!
//! A sketch is created with `(p, w)` parameters fixed for its lifetime and
//! starts in the sparse representation unless explicitly forced dense. Inserts
//! mutate registers monotonically; once the sparse store outgrows its budget
//! the sketch promotes to dense and never reverts.
//!
//! The sketch itself is a plain synchronous data structure with no interior
//! locking: concurrent writers must either serialize `insert` calls externally
//! or keep one sketch per worker and combine them with [`HyperLogLog::merge`],
//! which is associative, commutative and idempotent.

use std::fmt::{Debug, Formatter};
use std::hash::{BuildHasher, BuildHasherDefault, Hash, Hasher};

use enum_dispatch::enum_dispatch;
use wyhash::WyHash;

use crate::codec;
use crate::config::{Config, HashWidth};
use crate::dense::DenseRegisters;
use crate::error::HllError;
use crate::sparse::SparseRegisters;

/// Representation modes of a sketch. Promotion from [`Sparse`] to [`Dense`]
/// is one-way.
///
/// [`Sparse`]: Mode::Sparse
/// [`Dense`]: Mode::Dense
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sparse,
    Dense,
}

/// Register store trait implemented by both representations.
#[enum_dispatch(Registers)]
pub(crate) trait RegisterStore {
    fn update(&mut self, index: u32, rank: u8);
    fn estimate(&self) -> f64;
    fn size_of(&self) -> usize;
}

/// Register store of a sketch: one of the two representations.
#[enum_dispatch]
#[derive(Debug, Clone)]
pub(crate) enum Registers {
    Sparse(SparseRegisters),
    Dense(DenseRegisters),
}

/// HyperLogLog cardinality sketch with runtime `(p, w)` parameters.
///
/// - `p`: precision in `[4..18]`, defining `m = 2^p` registers and the
///   expected relative error `1.04 / sqrt(m)`.
/// - `w`: hash width, 32 or 64 bits.
///
/// Elements are hashed with `H` through [`BuildHasherDefault`]; any
/// well-distributed non-cryptographic hasher works, and pre-hashed values can
/// be fed directly via [`insert_hash`](HyperLogLog::insert_hash).
pub struct HyperLogLog<H: Hasher + Default = WyHash> {
    config: Config,
    registers: Registers,
    build_hasher: BuildHasherDefault<H>,
}

impl<H: Hasher + Default> HyperLogLog<H> {
    /// Create an empty sketch in sparse mode.
    pub fn new(precision: u8, width: HashWidth) -> Result<Self, HllError> {
        let config = Config::new(precision, width)?;
        Ok(Self {
            config,
            registers: Registers::Sparse(SparseRegisters::new(config)),
            build_hasher: BuildHasherDefault::default(),
        })
    }

    /// Create an empty sketch directly in dense mode, skipping the sparse
    /// stage entirely.
    pub fn new_dense(precision: u8, width: HashWidth) -> Result<Self, HllError> {
        let config = Config::new(precision, width)?;
        Ok(Self {
            config,
            registers: Registers::Dense(DenseRegisters::new(config)),
            build_hasher: BuildHasherDefault::default(),
        })
    }

    /// Insert a hashable item.
    #[inline]
    pub fn insert<T: Hash + ?Sized>(&mut self, item: &T) {
        let mut hasher = self.build_hasher.build_hasher();
        item.hash(&mut hasher);
        self.insert_hash(hasher.finish());
    }

    /// Insert a pre-computed hash value. For the 32-bit width the low 32 bits
    /// are used.
    #[inline]
    pub fn insert_hash(&mut self, hash: u64) {
        let (index, rank) = self.config.split_hash(hash);
        self.registers.update(index, rank);
        self.maybe_promote();
    }

    /// Cardinality estimate as a float; rounding is left to the caller's
    /// presentation boundary. Never negative, 0.0 for an empty sketch.
    #[inline]
    pub fn estimate(&self) -> f64 {
        self.registers.estimate()
    }

    /// Cardinality estimate rounded to the nearest integer.
    #[inline]
    pub fn count(&self) -> u64 {
        self.estimate().round() as u64
    }

    /// Merge `other` into `self` by register-wise maximum.
    ///
    /// Both sketches must share `(p, w)`; otherwise `PrecisionMismatch` is
    /// reported and neither operand is mutated. The result is dense if either
    /// operand was dense, and a sparse result is promoted if the union itself
    /// crosses the threshold.
    pub fn merge(&mut self, other: &Self) -> Result<(), HllError> {
        if self.config != other.config {
            return Err(HllError::PrecisionMismatch {
                lhs_precision: self.config.precision(),
                lhs_width: self.config.width(),
                rhs_precision: other.config.precision(),
                rhs_width: other.config.width(),
            });
        }

        let mut promoted: Option<DenseRegisters> = None;
        match (&mut self.registers, &other.registers) {
            (Registers::Dense(lhs), Registers::Dense(rhs)) => lhs.merge_from(rhs),
            (Registers::Dense(lhs), Registers::Sparse(rhs)) => {
                for (index, rank) in rhs.merged_entries() {
                    lhs.update(index, rank);
                }
            }
            (Registers::Sparse(lhs), Registers::Dense(rhs)) => {
                let mut dense = lhs.to_dense();
                dense.merge_from(rhs);
                promoted = Some(dense);
            }
            (Registers::Sparse(lhs), Registers::Sparse(rhs)) => lhs.merge_from(rhs),
        }
        if let Some(dense) = promoted {
            self.registers = Registers::Dense(dense);
        }

        self.maybe_promote();
        Ok(())
    }

    /// Serialize registers with a self-describing `(p, w, mode)` header.
    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode(self.config, &self.registers)
    }

    /// Reconstruct a sketch from [`to_bytes`](HyperLogLog::to_bytes) output,
    /// validating the header and the full register payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HllError> {
        let (config, registers) = codec::decode(bytes)?;
        Ok(Self {
            config,
            registers,
            build_hasher: BuildHasherDefault::default(),
        })
    }

    /// Discard all registers, returning to the initial sparse state.
    pub fn clear(&mut self) {
        self.registers = Registers::Sparse(SparseRegisters::new(self.config));
    }

    /// Current representation mode.
    pub fn mode(&self) -> Mode {
        match self.registers {
            Registers::Sparse(_) => Mode::Sparse,
            Registers::Dense(_) => Mode::Dense,
        }
    }

    /// Precision `p` the sketch was created with.
    pub fn precision(&self) -> u8 {
        self.config.precision()
    }

    /// Hash width the sketch was created with.
    pub fn hash_width(&self) -> HashWidth {
        self.config.width()
    }

    /// Expected relative standard error of the estimate: `1.04 / sqrt(m)`.
    pub fn standard_error(&self) -> f64 {
        self.config.standard_error()
    }

    /// Memory size of the sketch including its heap payload.
    pub fn size_of(&self) -> usize {
        std::mem::size_of::<Self>() + self.registers.size_of()
    }

    /// Promote to dense once the sparse store outgrows its budget.
    fn maybe_promote(&mut self) {
        let over = match &mut self.registers {
            Registers::Sparse(sparse) => sparse.over_threshold(),
            Registers::Dense(_) => false,
        };
        if over {
            if let Registers::Sparse(sparse) = &self.registers {
                let dense = sparse.to_dense();
                self.registers = Registers::Dense(dense);
            }
        }
    }
}

impl<H: Hasher + Default> Clone for HyperLogLog<H> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            registers: self.registers.clone(),
            build_hasher: BuildHasherDefault::default(),
        }
    }
}

impl<H: Hasher + Default> PartialEq for HyperLogLog<H> {
    /// Sketches compare equal when their parameters and register contents
    /// match; pending sparse buffers are folded in first.
    fn eq(&self, rhs: &Self) -> bool {
        self.config == rhs.config && self.to_bytes() == rhs.to_bytes()
    }
}

impl<H: Hasher + Default> Debug for HyperLogLog<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ mode: {:?}, estimate: {}, size: {} }}",
            self.mode(),
            self.count(),
            self.size_of()
        )
    }
}
