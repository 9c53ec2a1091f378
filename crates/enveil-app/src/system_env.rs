//! Production environment using system time and the OS RNG.
//!
//! Frame ids are salted from this RNG, so it must be unpredictable: two frames
//! on the same element content still get distinct ports.

use std::time::Duration;

use enveil_core::env::Environment;

/// Production environment.
///
/// `std::time::Instant` for time, `tokio::time::sleep` for the close delay
/// and getrandom for randomness.
///
/// # Panics
///
/// Panics if the OS RNG fails. Without randomness frame ids become
/// predictable and ports collide; there is no safe degraded mode.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_advances() {
        let env = SystemEnv::new();

        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(5));
        assert!(env.now() > t1);
    }

    #[test]
    fn random_bytes_differ() {
        let env = SystemEnv::new();

        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        env.random_bytes(&mut a);
        env.random_bytes(&mut b);

        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn sleep_waits() {
        let env = SystemEnv::new();

        let start = env.now();
        env.sleep(Duration::from_millis(20)).await;
        assert!(env.now() - start >= Duration::from_millis(20));
    }
}
