//! Environment abstraction for deterministic testing.
//!
//! Decouples the frame and controller runtimes from system resources (time,
//! randomness). Enables deterministic simulation (paused clock, seeded RNG)
//! and production use with real system resources.

use std::time::Duration;

/// Abstract environment providing time, randomness, and async primitives.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while simulation
    /// environments use virtual time (`tokio::time::Instant` with a paused
    /// clock).
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only runtime code awaits this (close animations, notification
    /// timers). State machines never sleep.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Instant `duration` after now.
    fn deadline(&self, duration: Duration) -> Self::Instant
    where
        Self::Instant: std::ops::Add<Duration, Output = Self::Instant>,
    {
        self.now() + duration
    }
}
