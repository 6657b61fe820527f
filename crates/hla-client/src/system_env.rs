//! Production `Environment` backed by the system clock.

use std::time::Instant;

use hla_core::Environment;

/// Environment using `std::time::Instant::now()`.
///
/// The default for [`RtiAmbassador`](crate::RtiAmbassador); tests that need
/// deterministic pump deadlines supply a simulated clock instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn system_env_time_advances() {
        let env = SystemEnv::new();

        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = env.now();

        assert!(t2 > t1, "Time should advance");
        assert!(env.elapsed_since(t1) >= Duration::from_millis(10));
    }

    #[test]
    fn elapsed_saturates_for_future_instants() {
        let env = SystemEnv::new();
        let later = env.now() + Duration::from_secs(60);
        assert_eq!(env.elapsed_since(later), Duration::ZERO);
    }
}
