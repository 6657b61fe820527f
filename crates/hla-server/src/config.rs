//! In-process RTI configuration.

use serde::{Deserialize, Serialize};

/// Reason given to federates whose connection is severed by the RTI.
pub const DEFAULT_SEVER_REASON: &str = "connection severed by the RTI";

/// Behaviour switches for [`LocalRti`](crate::LocalRti).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtiConfig {
    /// Push every request, response and callback through the CBOR codec,
    /// as a networked RTI would.
    pub encode_messages: bool,
    /// Upper bound on callbacks queued for one connection. A federate that
    /// stops draining its queue past this point loses its connection.
    pub max_queued_callbacks: usize,
}

impl Default for RtiConfig {
    fn default() -> Self {
        Self { encode_messages: true, max_queued_callbacks: 65_536 }
    }
}
