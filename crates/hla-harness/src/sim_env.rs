//! Simulated environment.
//!
//! `SimEnv` is a manual clock plus a seeded RNG. Time only moves when a
//! test calls [`SimEnv::advance`], so anything that measures deadlines
//! through [`Environment`] (the callback pump, for one) behaves the same
//! on every run. Clones share the clock and the RNG.

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use hla_core::Environment;
use rand::{Rng, RngCore, SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;

struct Inner {
    epoch: Instant,
    offset_nanos: AtomicU64,
    rng: Mutex<ChaCha8Rng>,
}

/// Deterministic clock and randomness for simulation runs.
#[derive(Clone)]
pub struct SimEnv {
    inner: Arc<Inner>,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv").field("elapsed", &self.elapsed()).finish_non_exhaustive()
    }
}

impl SimEnv {
    /// Environment seeded with 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment whose RNG starts from `seed`.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                epoch: Instant::now(),
                offset_nanos: AtomicU64::new(0),
                rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            }),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        // fetch_update only fails when the closure returns None
        let _ = self.inner.offset_nanos.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            Some(n.saturating_add(nanos))
        });
    }

    /// Simulated time since the environment was created.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.inner.offset_nanos.load(Ordering::Acquire))
    }

    fn rng(&self) -> MutexGuard<'_, ChaCha8Rng> {
        self.inner.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Next value of the seeded RNG.
    pub fn random_u64(&self) -> u64 {
        self.rng().next_u64()
    }

    /// Uniform value in `0..upper`; 0 when `upper` is 0.
    pub fn random_below(&self, upper: usize) -> usize {
        self.rng().gen_range(0..upper.max(1))
    }

    /// Fill `buffer` from the seeded RNG.
    pub fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng().fill_bytes(buffer);
    }

    /// Shuffle `items` in place.
    pub fn shuffle<X>(&self, items: &mut [X]) {
        items.shuffle(&mut *self.rng());
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        self.inner.epoch + self.elapsed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clock_moves_only_when_advanced() {
        let env = SimEnv::new();
        let start = env.now();
        assert_eq!(env.now(), start);

        env.advance(Duration::from_millis(250));
        assert_eq!(env.elapsed_since(start), Duration::from_millis(250));
    }

    #[test]
    fn clones_share_the_clock() {
        let env = SimEnv::new();
        let other = env.clone();

        other.advance(Duration::from_secs(3));

        assert_eq!(env.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn same_seed_same_sequence() {
        let a = SimEnv::with_seed(42);
        let b = SimEnv::with_seed(42);
        let c = SimEnv::with_seed(43);

        let draw = |env: &SimEnv| (0..4).map(|_| env.random_u64()).collect::<Vec<_>>();
        let first = draw(&a);
        assert_eq!(first, draw(&b));
        assert_ne!(first, draw(&c));
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let env = SimEnv::with_seed(7);
        let mut items: Vec<u32> = (0..16).collect();

        env.shuffle(&mut items);
        items.sort_unstable();

        assert_eq!(items, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn random_below_stays_in_range() {
        let env = SimEnv::with_seed(1);
        assert!((0..100).all(|_| env.random_below(3) < 3));
        assert_eq!(env.random_below(0), 0);
    }
}
