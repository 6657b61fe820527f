//! Ambassador configuration.

use std::time::Duration;

use hla_proto::Generation;

/// Default wait of the asynchronous delivery thread per poll.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for an [`RtiAmbassador`](crate::RtiAmbassador).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmbassadorConfig {
    /// API generation used for transportation and order type names.
    pub generation: Generation,

    /// How long the `Immediate` delivery thread waits for a callback
    /// before rechecking its stop flag.
    pub poll_interval: Duration,
}

impl Default for AmbassadorConfig {
    fn default() -> Self {
        Self { generation: Generation::Ieee1516e, poll_interval: DEFAULT_POLL_INTERVAL }
    }
}

impl AmbassadorConfig {
    /// Configuration for the HLA 1.3 names.
    pub fn hla13() -> Self {
        Self { generation: Generation::Hla13, ..Self::default() }
    }
}
