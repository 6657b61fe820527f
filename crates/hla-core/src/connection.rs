//! The narrow seam between a federate and a (possibly remote) RTI.

use std::time::Duration;

use hla_proto::{Callback, LogicalTime, RtiError, ServiceRequest, ServiceResponse};

/// Call/callback interface to an RTI.
///
/// Implementations own the transport. They must deliver callbacks for one
/// federate in the order the RTI produced them.
pub trait RtiConnection<T: LogicalTime>: Send + Sync + 'static {
    /// Perform one service call and wait for its response.
    ///
    /// Must not block on other federates' cooperation.
    fn call(&self, request: &ServiceRequest<T>) -> Result<ServiceResponse<T>, RtiError>;

    /// Wait up to `timeout` for the next callback.
    ///
    /// Returns `Ok(None)` when none arrived in time.
    fn poll_callback(&self, timeout: Duration) -> Result<Option<Callback<T>>, RtiError>;
}
