//! Simulated environment: virtual clock and seeded RNG.

use std::{
    cell::RefCell,
    rc::Rc,
    time::{Duration, Instant},
};

use commissioner_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

struct State {
    now: Instant,
    rng: ChaCha8Rng,
}

/// Deterministic [`Environment`].
///
/// Clones share one clock and one RNG stream. Time only moves through
/// [`SimEnv::advance`].
#[derive(Clone)]
pub struct SimEnv {
    state: Rc<RefCell<State>>,
}

impl SimEnv {
    /// Environment seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                now: Instant::now(),
                rng: ChaCha8Rng::seed_from_u64(seed),
            })),
        }
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.borrow_mut();
        state.now += by;
    }

    /// Random `u64` from the shared stream.
    pub fn next_u64(&self) -> u64 {
        self.state.borrow_mut().rng.next_u64()
    }

    /// Seeded RNG forked from the shared stream, for key generation.
    pub fn fork_rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.next_u64())
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        self.state.borrow().now
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.state.borrow_mut().rng.fill_bytes(buffer);
    }
}
