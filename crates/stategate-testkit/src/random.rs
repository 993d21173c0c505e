//! Seeded random data generation
//!
//! Provides reproducible random data generation for tests.
//! Using the same seed produces identical sequences of random data,
//! making tests deterministic and failures reproducible.
//!
//! # Example
//!
//! ```rust
//! use stategate_testkit::random::PseudoGenerator;
//!
//! let mut rng1 = PseudoGenerator::new(42);
//! let mut rng2 = PseudoGenerator::new(42);
//!
//! // Same seed produces same output
//! assert_eq!(rng1.random_memory(100), rng2.random_memory(100));
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Alphabet of process identifiers (base64url)
const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Length of a process identifier
pub const PROCESS_ID_LEN: usize = 43;

/// Seeded pseudo-random generator for reproducible test data
#[derive(Debug)]
pub struct PseudoGenerator {
    rng: StdRng,
}

impl PseudoGenerator {
    /// Create a new generator with the given seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate random bytes of the specified length
    pub fn random_bytes(&mut self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        self.rng.fill(&mut bytes[..]);
        bytes
    }

    /// Generate a random memory snapshot (1 to max_size bytes)
    pub fn random_memory(&mut self, max_size: usize) -> Vec<u8> {
        let size = self.rng.random_range(1..=max_size.max(1));
        self.random_bytes(size)
    }

    /// Generate a process identifier shaped like a real one
    pub fn random_process_id(&mut self) -> String {
        (0..PROCESS_ID_LEN)
            .map(|_| ID_ALPHABET[self.rng.random_range(0..ID_ALPHABET.len())] as char)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reproducibility() {
        let mut rng1 = PseudoGenerator::new(12345);
        let mut rng2 = PseudoGenerator::new(12345);

        assert_eq!(rng1.random_bytes(1000), rng2.random_bytes(1000));
        assert_eq!(rng1.random_process_id(), rng2.random_process_id());
    }

    #[test]
    fn test_different_seeds_different_output() {
        let mut rng1 = PseudoGenerator::new(1);
        let mut rng2 = PseudoGenerator::new(2);

        assert_ne!(rng1.random_bytes(100), rng2.random_bytes(100));
    }

    #[test]
    fn test_random_memory_bounds() {
        let mut rng = PseudoGenerator::new(42);

        for _ in 0..100 {
            let memory = rng.random_memory(4096);
            assert!(!memory.is_empty());
            assert!(memory.len() <= 4096);
        }
    }

    #[test]
    fn test_process_id_shape() {
        let id = PseudoGenerator::new(7).random_process_id();
        assert_eq!(id.len(), PROCESS_ID_LEN);
        assert!(id.bytes().all(|b| ID_ALPHABET.contains(&b)));
    }
}
