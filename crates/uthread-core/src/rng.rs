//! Seeded generator for reproducible preemption patterns
//!
//! xorshift64*: tiny, no allocation, safe to step from a signal handler.
//! The same seed always yields the same sequence, which is what makes
//! synchronous preemption replayable.

/// Deterministic pseudo-random source
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        // Zero is a fixed point of xorshift; spread the seed with splitmix64
        let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        Self { state: if z == 0 { 0x2545_F491_4F6C_DD1D } else { z } }
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// True with probability 1/`n`. `n <= 1` always fires.
    #[inline]
    pub fn one_in(&mut self, n: u32) -> bool {
        if n <= 1 {
            return true;
        }
        (self.next_u64() >> 32) % n as u64 == 0
    }
}
