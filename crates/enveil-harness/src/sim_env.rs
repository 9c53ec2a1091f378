//! Deterministic environment for simulation.
//!
//! Time is tokio's clock, which simulation runs pause so that close delays and
//! notification timers advance instantly and in order. Randomness comes from a
//! seeded `ChaCha8Rng`: the same seed yields the same frame ids.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use enveil_core::env::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded, virtual-time environment.
#[derive(Debug, Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Environment seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))) }
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Environment for SimEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        // A poisoned lock still holds a usable RNG; keep the sequence going.
        let mut rng = match self.rng.lock() {
            Ok(rng) => rng,
            Err(poisoned) => poisoned.into_inner(),
        };
        rng.fill_bytes(buffer);
    }
}
