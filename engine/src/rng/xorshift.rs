//! xorshift64* random number generator
//!
//! This is a fast, high-quality PRNG that is deterministic and suitable
//! for simulation purposes.
//!
//! # Algorithm
//!
//! xorshift64* is a variant of xorshift that passes TestU01's BigCrush
//! statistical tests. It uses 64-bit state and produces 64-bit output.
//!
//! # Determinism
//!
//! Same seed → same sequence of random numbers. This is CRITICAL for:
//! - Debugging (reproduce exact simulation)
//! - Testing (verify behavior)
//! - Research (validate results)

use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use waterplan_simulator_core_rs::rng::Xorshift64Star;
///
/// let mut rng = Xorshift64Star::new(12345);
/// let value = rng.next_u64();
/// let lifetime = rng.range(40, 60); // [40, 60)
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Xorshift64Star {
    /// Internal state (64-bit)
    state: u64,
}

impl Xorshift64Star {
    /// Create a new RNG with given seed
    ///
    /// A zero seed is mapped to 1 (xorshift state must be non-zero).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generate next random u64 value
    ///
    /// This advances the internal state and returns a random value.
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64* algorithm
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Generate random value in range [min, max)
    ///
    /// # Panics
    /// Panics if min >= max
    ///
    /// # Example
    /// ```
    /// use waterplan_simulator_core_rs::rng::Xorshift64Star;
    ///
    /// let mut rng = Xorshift64Star::new(12345);
    /// let years = rng.range(40, 60);
    /// assert!((40..60).contains(&years));
    /// ```
    pub fn range(&mut self, min: i64, max: i64) -> i64 {
        assert!(min < max, "min must be less than max");

        let value = self.next_u64();
        let range_size = (max - min) as u64;
        min + (value % range_size) as i64
    }

    /// Generate random f64 in range [0.0, 1.0)
    ///
    /// Useful for sampling from probability distributions.
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next_u64();
        // Convert to [0.0, 1.0) using the top 53 bits
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }

    /// Generate random f64 uniformly in [low, high)
    ///
    /// # Panics
    /// Panics if low >= high
    ///
    /// # Example
    /// ```
    /// use waterplan_simulator_core_rs::rng::Xorshift64Star;
    ///
    /// let mut rng = Xorshift64Star::new(777);
    /// let decay = rng.uniform(0.001, 0.004);
    /// assert!((0.001..0.004).contains(&decay));
    /// ```
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        assert!(low < high, "low must be less than high");
        low + (high - low) * self.next_f64()
    }

    /// Get current RNG state (for checkpointing/replay)
    pub fn state(&self) -> u64 {
        self.state
    }
}
