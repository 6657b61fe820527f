//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples federate logic from the wall clock.
//! Callback pumping (`evoke_callback`, `tick`) measures its deadlines
//! through it, so a simulated clock makes the pump deterministic.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Isolation: implementations must not share global state

use std::time::{Duration, Instant};

/// Abstract source of time.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current time.
    ///
    /// # Invariants
    ///
    /// - Monotonicity: subsequent calls return times >= previous calls.
    fn now(&self) -> Instant;

    /// Time elapsed since `earlier`, saturating at zero.
    fn elapsed_since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }
}
