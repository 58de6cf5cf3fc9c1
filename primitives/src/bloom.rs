//! 2048-bit log bloom filter.
//!
//! Every log contributes its emitting address and each topic. An input sets
//! three bits, each chosen by 11 bits of its BLAKE3 hash. Filters combine by
//! bitwise OR, so a block bloom is the union of its receipt blooms.

use core::fmt;
use core::ops::BitOrAssign;

use crate::block::{Log, Receipt};
use crate::crypto::hash_blake3;

/// Size of a bloom filter in bytes.
pub const BLOOM_BYTES: usize = 256;

/// Fixed-size log bloom.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bloom(pub [u8; BLOOM_BYTES]);

impl Bloom {
    /// The empty filter.
    pub const EMPTY: Bloom = Bloom([0u8; BLOOM_BYTES]);

    /// Set the three bits selected by `input`.
    pub fn accrue(&mut self, input: &[u8]) {
        for (byte, mask) in bloom_bits(input) {
            self.0[byte] |= mask;
        }
    }

    /// Returns true if all three bits for `input` are set.
    ///
    /// False positives are possible, false negatives are not.
    pub fn contains_input(&self, input: &[u8]) -> bool {
        bloom_bits(input)
            .iter()
            .all(|(byte, mask)| self.0[*byte] & mask == *mask)
    }

    /// Add a log's address and topics.
    pub fn accrue_log(&mut self, log: &Log) {
        self.accrue(&log.address);
        for topic in &log.topics {
            self.accrue(topic);
        }
    }

    /// Returns true if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; BLOOM_BYTES] {
        &self.0
    }
}

impl Default for Bloom {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BitOrAssign<&Bloom> for Bloom {
    fn bitor_assign(&mut self, rhs: &Bloom) {
        for (lhs, rhs) in self.0.iter_mut().zip(rhs.0.iter()) {
            *lhs |= rhs;
        }
    }
}

impl fmt::Debug for Bloom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bloom({})", self)
    }
}

impl fmt::Display for Bloom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Bloom over a set of logs.
pub fn logs_bloom<'a>(logs: impl IntoIterator<Item = &'a Log>) -> Bloom {
    let mut bloom = Bloom::EMPTY;
    for log in logs {
        bloom.accrue_log(log);
    }
    bloom
}

/// Block bloom: the OR of every receipt's bloom.
pub fn create_bloom(receipts: &[Receipt]) -> Bloom {
    let mut bloom = Bloom::EMPTY;
    for receipt in receipts {
        bloom |= &receipt.bloom;
    }
    bloom
}

/// Byte index and bit mask for each of the three bits an input sets.
fn bloom_bits(input: &[u8]) -> [(usize, u8); 3] {
    let hash = hash_blake3(input);
    let mut out = [(0usize, 0u8); 3];
    for (i, slot) in out.iter_mut().enumerate() {
        let bit = (((hash[2 * i] as usize) << 8) | hash[2 * i + 1] as usize) & 2047;
        *slot = (BLOOM_BYTES - 1 - bit / 8, 1u8 << (bit % 8));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn sample_log(address: u8, topic: u8) -> Log {
        Log::new([address; 32], vec![[topic; 32]], Bytes::from_static(b"payload"))
    }

    #[test]
    fn test_empty_bloom() {
        assert!(Bloom::EMPTY.is_empty());
        assert!(!Bloom::EMPTY.contains_input(b"anything"));
    }

    #[test]
    fn test_accrue_and_contains() {
        let mut bloom = Bloom::default();
        bloom.accrue(b"transfer");
        assert!(bloom.contains_input(b"transfer"));
        assert!(!bloom.is_empty());
    }

    #[test]
    fn test_log_bloom_covers_address_and_topics() {
        let log = sample_log(1, 2);
        let bloom = logs_bloom([&log]);
        assert!(bloom.contains_input(&[1u8; 32]));
        assert!(bloom.contains_input(&[2u8; 32]));
    }

    #[test]
    fn test_or_is_union() {
        let a = logs_bloom([&sample_log(1, 2)]);
        let b = logs_bloom([&sample_log(3, 4)]);
        let mut both = a;
        both |= &b;
        assert!(both.contains_input(&[1u8; 32]));
        assert!(both.contains_input(&[4u8; 32]));
        assert_eq!(both, logs_bloom([&sample_log(1, 2), &sample_log(3, 4)]));
    }

    #[test]
    fn test_display_is_hex() {
        let s = Bloom::EMPTY.to_string();
        assert_eq!(s.len(), 2 + 2 * BLOOM_BYTES);
        assert!(s.starts_with("0x00"));
    }
}
