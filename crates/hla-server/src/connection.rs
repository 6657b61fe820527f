//! In-process transport.
//!
//! [`LocalRti`] shares one [`RtiServer`] between any number of
//! [`LocalConnection`]s. A call takes the server lock, runs to completion
//! and wakes every waiting poller. With
//! [`RtiConfig::encode_messages`] each request, response and callback is
//! pushed through the CBOR codec first, so everything a federate exchanges
//! is known to survive the wire.

use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use hla_core::RtiConnection;
use hla_proto::{
    Callback, ErrorKind, LogicalTime, RtiError, ServiceRequest, ServiceResponse, message,
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, trace};

use crate::{
    config::{DEFAULT_SEVER_REASON, RtiConfig},
    federation::Federation,
    server::{ConnectionId, RtiServer},
};

struct Shared<T: LogicalTime> {
    server: Mutex<RtiServer<T>>,
    wake: Condvar,
}

impl<T: LogicalTime> Shared<T> {
    fn lock(&self) -> Result<MutexGuard<'_, RtiServer<T>>, RtiError> {
        self.server.lock().map_err(|_| RtiError::internal("RTI lock poisoned"))
    }
}

fn round_trip<M: Serialize + DeserializeOwned>(value: &M) -> Result<M, RtiError> {
    let bytes = message::encode(value)?;
    trace!(len = bytes.len(), "message encoded");
    Ok(message::decode(&bytes)?)
}

/// Handle on an in-process RTI. Clones share the same RTI.
pub struct LocalRti<T: LogicalTime> {
    shared: Arc<Shared<T>>,
}

impl<T: LogicalTime> Clone for LocalRti<T> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T: LogicalTime> Default for LocalRti<T> {
    fn default() -> Self {
        Self::new(RtiConfig::default())
    }
}

impl<T: LogicalTime> LocalRti<T> {
    /// Fresh RTI with no federations.
    pub fn new(config: RtiConfig) -> Self {
        Self {
            shared: Arc::new(Shared { server: Mutex::new(RtiServer::new(config)), wake: Condvar::new() }),
        }
    }

    /// Open a new connection. The federate still has to call `connect`.
    pub fn connect(&self) -> Result<LocalConnection<T>, RtiError> {
        let mut server = self.shared.lock()?;
        let id = server.open();
        let encode = server.config().encode_messages;
        Ok(LocalConnection { id, encode, shared: Arc::clone(&self.shared) })
    }

    /// Cut `connection` as a failed transport would.
    pub fn sever(&self, connection: ConnectionId) -> Result<(), RtiError> {
        self.shared.lock()?.sever(connection, DEFAULT_SEVER_REASON);
        self.shared.wake.notify_all();
        Ok(())
    }

    /// Inspect or adjust a federation execution under the server lock.
    pub fn with_federation<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Federation<T>) -> R,
    ) -> Result<R, RtiError> {
        let mut server = self.shared.lock()?;
        let federation = server
            .federation_mut(name)
            .ok_or_else(|| RtiError::new(ErrorKind::FederationExecutionDoesNotExist, name))?;
        Ok(f(federation))
    }

    /// Names of the existing federation executions.
    pub fn federation_names(&self) -> Result<Vec<String>, RtiError> {
        Ok(self.shared.lock()?.federation_names().map(str::to_string).collect())
    }
}

/// One federate's connection to a [`LocalRti`]. Dropping it resigns the
/// federate, if joined, and releases the connection.
pub struct LocalConnection<T: LogicalTime> {
    id: ConnectionId,
    encode: bool,
    shared: Arc<Shared<T>>,
}

impl<T: LogicalTime> LocalConnection<T> {
    /// Identity of this connection on the RTI.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<T: LogicalTime> RtiConnection<T> for LocalConnection<T> {
    fn call(&self, request: &ServiceRequest<T>) -> Result<ServiceResponse<T>, RtiError> {
        let decoded;
        let request = if self.encode {
            decoded = round_trip(request)?;
            &decoded
        } else {
            request
        };

        let result = self.shared.lock()?.handle(self.id, request);
        self.shared.wake.notify_all();

        if self.encode { round_trip(&result)? } else { result }
    }

    fn poll_callback(&self, timeout: Duration) -> Result<Option<Callback<T>>, RtiError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut server = self.shared.lock()?;
        loop {
            if let Some(callback) = server.next_callback(self.id) {
                drop(server);
                debug!(connection = %self.id, callback = callback.name(), "callback delivered");
                return if self.encode { round_trip(&callback).map(Some) } else { Ok(Some(callback)) };
            }
            server = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(None);
                    }
                    self.shared
                        .wake
                        .wait_timeout(server, remaining)
                        .map_err(|_| RtiError::internal("RTI lock poisoned"))?
                        .0
                },
                None => {
                    self.shared.wake.wait(server).map_err(|_| RtiError::internal("RTI lock poisoned"))?
                },
            };
        }
    }
}

impl<T: LogicalTime> Drop for LocalConnection<T> {
    fn drop(&mut self) {
        if let Ok(mut server) = self.shared.server.lock() {
            server.close(self.id);
        }
        self.shared.wake.notify_all();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::thread;

    use hla_proto::{CallbackModel, Float64Time};

    use super::*;

    fn connect(rti: &LocalRti<Float64Time>) -> LocalConnection<Float64Time> {
        let connection = rti.connect().unwrap();
        connection.call(&ServiceRequest::Connect { callback_model: CallbackModel::Evoked }).unwrap();
        connection
    }

    #[test]
    fn poll_times_out_empty() {
        let rti = LocalRti::<Float64Time>::default();
        let connection = connect(&rti);

        assert_eq!(connection.poll_callback(Duration::ZERO).unwrap(), None);
        assert_eq!(connection.poll_callback(Duration::from_millis(5)).unwrap(), None);
    }

    #[test]
    fn poller_wakes_on_callback_from_another_thread() {
        let rti = LocalRti::<Float64Time>::default();
        let waiting = connect(&rti);
        let id = waiting.id();

        let other = rti.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            other.sever(id).unwrap();
        });

        let callback = waiting.poll_callback(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
        assert_eq!(callback, Some(Callback::ConnectionLost { reason: DEFAULT_SEVER_REASON.into() }));
    }

    #[test]
    fn errors_survive_the_codec() {
        let rti = LocalRti::<Float64Time>::new(RtiConfig { encode_messages: true, ..RtiConfig::default() });
        let connection = connect(&rti);

        let err = connection
            .call(&ServiceRequest::DestroyFederationExecution { federation: "missing".into() })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FederationExecutionDoesNotExist);
    }

    #[test]
    fn dropping_a_connection_resigns() {
        let rti = LocalRti::<Float64Time>::default();
        let connection = connect(&rti);
        connection
            .call(&ServiceRequest::CreateFederationExecution {
                federation: "f".into(),
                modules: vec![crate::federation::tests::vehicles()],
            })
            .unwrap();
        connection
            .call(&ServiceRequest::JoinFederationExecution {
                federate_name: Some("a".into()),
                federate_type: "t".into(),
                federation: "f".into(),
            })
            .unwrap();
        assert_eq!(rti.with_federation("f", |f| f.federate_count()).unwrap(), 1);

        drop(connection);

        assert_eq!(rti.with_federation("f", |f| f.federate_count()).unwrap(), 0);
        assert_eq!(rti.federation_names().unwrap(), ["f"]);
    }
}
