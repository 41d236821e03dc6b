//! Bloom Filter
//!
//! Approximate membership filter sized from an expected item count `n` and a
//! target false-positive probability `p`:
//!
//! ```text
//! m = -n * ln(p) / ln(2)^2      (bits)
//! k = max(1, round(m / n * ln 2)) (probes)
//! ```
//!
//! Probe positions use double hashing over two xxh64 digests.

use std::f64::consts::LN_2;

use xxhash_rust::xxh64::xxh64;

use crate::error::{Error, Result};

const SEED_PRIMARY: u64 = 0;
const SEED_SECONDARY: u64 = 0x9e37_79b9_7f4a_7c15;

/// Approximate set membership with no false negatives
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    items: u64,
}

impl BloomFilter {
    /// Size a filter for `expected_items` at false-positive rate `fpp`
    pub fn new(expected_items: usize, fpp: f64) -> Result<Self> {
        if expected_items == 0 {
            return Err(Error::Configuration(
                "bloom filter needs a non-zero expected item count".to_string(),
            ));
        }
        if !(fpp > 0.0 && fpp < 1.0) {
            return Err(Error::Configuration(format!(
                "bloom filter false-positive rate must be in (0, 1), got {}",
                fpp
            )));
        }

        let n = expected_items as f64;
        let num_bits = ((-n * fpp.ln()) / (LN_2 * LN_2)).ceil().max(1.0) as u64;
        let num_hashes = (num_bits as f64 / n * LN_2).round().max(1.0) as u32;

        Ok(Self::with_params(num_bits, num_hashes))
    }

    /// Filter with an explicit bit count and probe count
    pub fn with_params(num_bits: u64, num_hashes: u32) -> Self {
        let num_bits = num_bits.max(1);
        let words = num_bits.div_ceil(64) as usize;
        Self {
            bits: vec![0; words],
            num_bits,
            num_hashes: num_hashes.max(1),
            items: 0,
        }
    }

    /// Add an item
    pub fn add(&mut self, item: &[u8]) {
        for bit in self.probes(item) {
            self.bits[(bit / 64) as usize] |= 1u64 << (bit % 64);
        }
        self.items += 1;
    }

    /// True if the item may have been added; false means it never was
    pub fn contains(&self, item: &[u8]) -> bool {
        self.probes(item)
            .all(|bit| self.bits[(bit / 64) as usize] & (1u64 << (bit % 64)) != 0)
    }

    fn probes(&self, item: &[u8]) -> impl Iterator<Item = u64> {
        let h1 = xxh64(item, SEED_PRIMARY);
        let h2 = xxh64(item, SEED_SECONDARY) | 1;
        let m = self.num_bits;
        (0..self.num_hashes as u64).map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % m)
    }

    /// Bits in the filter
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// Probes per item
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Items added so far (duplicates included)
    pub fn len(&self) -> u64 {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    /// Reset to empty
    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
        self.items = 0;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizing() {
        let filter = BloomFilter::new(1000, 0.01).unwrap();
        // 1000 * ln(100) / ln(2)^2 = 9585.06
        assert_eq!(filter.num_bits(), 9586);
        assert_eq!(filter.num_hashes(), 7);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(BloomFilter::new(0, 0.01).is_err());
        assert!(BloomFilter::new(10, 0.0).is_err());
        assert!(BloomFilter::new(10, 1.0).is_err());
        assert!(BloomFilter::new(10, -0.5).is_err());
    }

    #[test]
    fn test_no_false_negatives_and_bounded_false_positives() {
        const N: usize = 100_000;
        let mut filter = BloomFilter::new(N, 0.01).unwrap();
        for i in 0..N {
            filter.add(i.to_string().as_bytes());
        }

        for i in 0..N {
            assert!(filter.contains(i.to_string().as_bytes()), "missing {i}");
        }

        let false_positives = (N..N + 10_000)
            .filter(|i| filter.contains(i.to_string().as_bytes()))
            .count();
        let rate = false_positives as f64 / 10_000.0;
        assert!(rate < 0.02, "false positive rate {rate}");
    }

    #[test]
    fn test_clear() {
        let mut filter = BloomFilter::new(10, 0.1).unwrap();
        filter.add(b"Tom");
        assert!(filter.contains(b"Tom"));
        assert_eq!(filter.len(), 1);

        filter.clear();
        assert!(!filter.contains(b"Tom"));
        assert!(filter.is_empty());
    }
}
