//! Environment abstraction.
//!
//! The engine reads the clock and draws randomness only through
//! [`Environment`], so a simulation can run it against virtual time and a
//! seeded RNG.

use std::time::Instant;

use rand::RngCore;

/// Source of time and randomness.
pub trait Environment: Clone + 'static {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Random fixed-size array.
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut out = [0u8; N];
        self.random_bytes(&mut out);
        out
    }
}

/// Production environment: system clock and thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        rand::thread_rng().fill_bytes(buffer);
    }
}
