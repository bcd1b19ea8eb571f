//! Dense representation: a flat array of `m = 2^p` one-byte registers.
//!
//! Each register holds the maximum rank observed for its index, so updates and
//! merges are pointwise maximums and values never decrease. The number of zero
//! registers and the registers' harmonic sum are stored and updated as data is
//! inserted, allowing constant-time estimation.

use crate::config::Config;
use crate::estimate;
use crate::sketch::RegisterStore;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DenseRegisters {
    config: Config,
    registers: Vec<u8>,
    /// Number of registers still at rank 0.
    zeros: u32,
    /// `sum(2^-reg)` over all registers; zero registers contribute 1 each.
    sum: f64,
}

impl DenseRegisters {
    /// Create an all-zero dense store.
    pub(crate) fn new(config: Config) -> Self {
        let m = config.registers();
        Self {
            config,
            registers: vec![0; m],
            zeros: m as u32,
            sum: m as f64,
        }
    }

    /// Rebuild a dense store from raw register bytes, recomputing the zero
    /// count and harmonic sum. Callers must have validated the rank bounds.
    pub(crate) fn from_registers(config: Config, registers: Vec<u8>) -> Self {
        debug_assert_eq!(registers.len(), config.registers());
        let zeros = registers.iter().filter(|&&r| r == 0).count() as u32;
        let sum = registers
            .iter()
            .map(|&r| 1.0 / (1u64 << u32::from(r)) as f64)
            .sum();
        Self {
            config,
            registers,
            zeros,
            sum,
        }
    }

    /// Pointwise-maximum merge with a store of the same register count.
    pub(crate) fn merge_from(&mut self, other: &DenseRegisters) {
        debug_assert_eq!(self.config, other.config);
        for (index, &rank) in other.registers.iter().enumerate() {
            self.update(index as u32, rank);
        }
    }

    /// Raw HyperLogLog estimate before regime correction.
    pub(crate) fn raw_estimate(&self) -> f64 {
        estimate::raw_estimate(self.config.registers(), self.sum)
    }

    /// Number of registers still at rank 0.
    pub(crate) fn count_zero_registers(&self) -> u32 {
        self.zeros
    }

    pub(crate) fn registers(&self) -> &[u8] {
        &self.registers
    }

    #[cfg(test)]
    pub(crate) fn get(&self, index: u32) -> u8 {
        self.registers[index as usize]
    }
}

impl RegisterStore for DenseRegisters {
    /// Monotonic in-place update: `registers[index] = max(registers[index], rank)`.
    #[inline]
    fn update(&mut self, index: u32, rank: u8) {
        let slot = &mut self.registers[index as usize];
        let old = *slot;
        if rank > old {
            *slot = rank;
            self.zeros -= u32::from(old == 0);
            self.sum -= 1.0 / (1u64 << u32::from(old)) as f64;
            self.sum += 1.0 / (1u64 << u32::from(rank)) as f64;
        }
    }

    fn estimate(&self) -> f64 {
        estimate::estimate(self.config, self.zeros, self.sum)
    }

    fn size_of(&self) -> usize {
        std::mem::size_of::<Self>() + self.registers.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HashWidth;

    fn store(p: u8) -> DenseRegisters {
        DenseRegisters::new(Config::new(p, HashWidth::W64).unwrap())
    }

    #[test]
    fn test_update_is_pointwise_max() {
        let mut dense = store(10);
        dense.update(42, 3);
        assert_eq!(dense.get(42), 3);

        // Lower rank never overwrites.
        dense.update(42, 2);
        assert_eq!(dense.get(42), 3);

        dense.update(42, 7);
        assert_eq!(dense.get(42), 7);
    }

    #[test]
    fn test_zero_count_tracking() {
        let mut dense = store(10);
        let m = 1 << 10;
        assert_eq!(dense.count_zero_registers(), m);

        dense.update(0, 1);
        dense.update(1, 5);
        assert_eq!(dense.count_zero_registers(), m - 2);

        // Updating an occupied register does not change the count.
        dense.update(0, 3);
        assert_eq!(dense.count_zero_registers(), m - 2);
    }

    #[test]
    fn test_merge_from() {
        let mut a = store(8);
        let mut b = store(8);
        a.update(1, 4);
        a.update(2, 9);
        b.update(2, 6);
        b.update(3, 2);

        a.merge_from(&b);
        assert_eq!(a.get(1), 4);
        assert_eq!(a.get(2), 9);
        assert_eq!(a.get(3), 2);
    }

    #[test]
    fn test_merge_idempotent() {
        let mut a = store(8);
        a.update(5, 11);
        a.update(200, 1);
        let before = a.clone();

        let copy = a.clone();
        a.merge_from(&copy);
        assert_eq!(a, before);
    }

    #[test]
    fn test_from_registers_round_trips_counters() {
        let mut a = store(6);
        a.update(0, 12);
        a.update(17, 1);
        a.update(63, 58);

        let rebuilt = DenseRegisters::from_registers(a.config, a.registers().to_vec());
        assert_eq!(rebuilt.count_zero_registers(), a.count_zero_registers());
        assert!((rebuilt.sum - a.sum).abs() < 1e-9);
        assert_eq!(rebuilt.registers(), a.registers());
    }

    #[test]
    fn test_raw_estimate_uniform_registers() {
        let mut dense = store(4);
        for index in 0..16 {
            dense.update(index, 1);
        }
        // All registers at rank 1: Z = 16 * 0.5 = 8.
        let expected = 0.673 * 256.0 / 8.0;
        assert!((dense.raw_estimate() - expected).abs() < 1e-9);
    }
}
