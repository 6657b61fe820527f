//! Connection registry and federation directory.
//!
//! [`RtiServer`] is the sans-IO core of the in-process RTI. It owns every
//! federation execution and one callback queue per connection, answers
//! the connection-level services itself and routes everything else to the
//! federation the caller joined.

use std::{
    collections::{BTreeMap, VecDeque},
    fmt,
};

use hla_proto::{
    Callback, ErrorKind, FederateHandle, FederationExecutionInfo, LogicalTime, ResignAction,
    RtiError, ServiceRequest, ServiceResponse,
};
use tracing::{debug, info, warn};

use crate::{
    config::{DEFAULT_SEVER_REASON, RtiConfig},
    federation::{Delivery, Federation},
    object_model::ObjectModel,
};

/// Identifies one federate connection to the RTI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw connection number.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw connection number.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug)]
struct ConnectionState<T: LogicalTime> {
    connected: bool,
    /// Federation joined over this connection.
    federation: Option<String>,
    callbacks: VecDeque<Callback<T>>,
}

impl<T: LogicalTime> Default for ConnectionState<T> {
    fn default() -> Self {
        Self { connected: false, federation: None, callbacks: VecDeque::new() }
    }
}

/// Every federation execution and every connection of one RTI.
#[derive(Debug)]
pub struct RtiServer<T: LogicalTime> {
    config: RtiConfig,
    connections: BTreeMap<ConnectionId, ConnectionState<T>>,
    next_connection: u64,
    federations: BTreeMap<String, Federation<T>>,
}

impl<T: LogicalTime> RtiServer<T> {
    /// Empty RTI.
    pub fn new(config: RtiConfig) -> Self {
        Self { config, connections: BTreeMap::new(), next_connection: 0, federations: BTreeMap::new() }
    }

    /// Configuration in effect.
    pub fn config(&self) -> &RtiConfig {
        &self.config
    }

    /// Allocate a connection. It still has to call `connect`.
    pub fn open(&mut self) -> ConnectionId {
        self.next_connection += 1;
        let id = ConnectionId::new(self.next_connection);
        self.connections.insert(id, ConnectionState::default());
        debug!(connection = %id, "connection opened");
        id
    }

    /// Drop a connection, resigning its federate first.
    pub fn close(&mut self, connection: ConnectionId) {
        self.auto_resign(connection);
        if self.connections.remove(&connection).is_some() {
            debug!(%connection, "connection closed");
        }
    }

    /// Cut a connection as a transport failure would: its federate is
    /// resigned and it receives `connectionLost`.
    pub fn sever(&mut self, connection: ConnectionId, reason: &str) {
        self.auto_resign(connection);
        if let Some(state) = self.connections.get_mut(&connection)
            && state.connected
        {
            warn!(%connection, reason, "connection severed");
            state.connected = false;
            state.callbacks.push_back(Callback::ConnectionLost { reason: reason.to_string() });
        }
    }

    /// Next queued callback for `connection`.
    pub fn next_callback(&mut self, connection: ConnectionId) -> Option<Callback<T>> {
        self.connections.get_mut(&connection).and_then(|s| s.callbacks.pop_front())
    }

    /// Number of callbacks waiting for `connection`.
    pub fn queued_callbacks(&self, connection: ConnectionId) -> usize {
        self.connections.get(&connection).map_or(0, |s| s.callbacks.len())
    }

    /// A federation execution by name.
    pub fn federation(&self, name: &str) -> Option<&Federation<T>> {
        self.federations.get(name)
    }

    /// Mutable access to a federation execution. Callbacks it produces
    /// are delivered on the next request.
    pub fn federation_mut(&mut self, name: &str) -> Option<&mut Federation<T>> {
        self.federations.get_mut(name)
    }

    /// Names of the existing federation executions.
    pub fn federation_names(&self) -> impl Iterator<Item = &str> {
        self.federations.keys().map(String::as_str)
    }

    /// Handle one service call arriving over `connection`.
    pub fn handle(
        &mut self,
        connection: ConnectionId,
        request: &ServiceRequest<T>,
    ) -> Result<ServiceResponse<T>, RtiError> {
        let result = self.dispatch(connection, request);
        self.deliver_pending();
        if let Err(err) = &result {
            debug!(%connection, service = request.name(), %err, "request rejected");
        }
        result
    }

    fn state(&self, connection: ConnectionId) -> Result<&ConnectionState<T>, RtiError> {
        self.connections
            .get(&connection)
            .ok_or_else(|| RtiError::new(ErrorKind::NotConnected, connection.to_string()))
    }

    fn state_mut(&mut self, connection: ConnectionId) -> Result<&mut ConnectionState<T>, RtiError> {
        self.connections
            .get_mut(&connection)
            .ok_or_else(|| RtiError::new(ErrorKind::NotConnected, connection.to_string()))
    }

    fn dispatch(
        &mut self,
        connection: ConnectionId,
        request: &ServiceRequest<T>,
    ) -> Result<ServiceResponse<T>, RtiError> {
        use ServiceRequest as R;

        let state = self.state(connection)?;
        match request {
            R::Connect { .. } => {
                if state.connected {
                    return Err(RtiError::new(ErrorKind::AlreadyConnected, connection.to_string()));
                }
                self.state_mut(connection)?.connected = true;
                debug!(%connection, "connected");
                return Ok(ServiceResponse::Ok);
            },
            _ if !state.connected => {
                return Err(RtiError::new(ErrorKind::NotConnected, request.name()));
            },
            R::Disconnect => {
                if let Some(federation) = &state.federation {
                    return Err(RtiError::new(
                        ErrorKind::FederateIsExecutionMember,
                        format!("{connection} is joined to {federation}"),
                    ));
                }
                self.state_mut(connection)?.connected = false;
                debug!(%connection, "disconnected");
                return Ok(ServiceResponse::Ok);
            },
            R::CreateFederationExecution { federation, modules } => {
                if self.federations.contains_key(federation) {
                    return Err(RtiError::new(
                        ErrorKind::FederationExecutionAlreadyExists,
                        federation.clone(),
                    ));
                }
                let model = ObjectModel::build(modules)?;
                info!(%federation, time = T::NAME, "federation execution created");
                self.federations.insert(federation.clone(), Federation::new(federation.clone(), model));
                return Ok(ServiceResponse::Ok);
            },
            R::DestroyFederationExecution { federation } => {
                let existing = self.federations.get(federation).ok_or_else(|| {
                    RtiError::new(ErrorKind::FederationExecutionDoesNotExist, federation.clone())
                })?;
                if existing.federate_count() > 0 {
                    return Err(RtiError::new(
                        ErrorKind::FederatesCurrentlyJoined,
                        format!("{federation} has {} federates", existing.federate_count()),
                    ));
                }
                self.federations.remove(federation);
                info!(%federation, "federation execution destroyed");
                return Ok(ServiceResponse::Ok);
            },
            R::ListFederationExecutions => {
                let executions = self
                    .federations
                    .keys()
                    .map(|name| FederationExecutionInfo {
                        name: name.clone(),
                        time_implementation: T::NAME.to_string(),
                    })
                    .collect();
                self.state_mut(connection)?
                    .callbacks
                    .push_back(Callback::ReportFederationExecutions { executions });
                return Ok(ServiceResponse::Ok);
            },
            R::JoinFederationExecution { federate_name, federate_type, federation } => {
                if let Some(joined) = &state.federation {
                    return Err(RtiError::new(
                        ErrorKind::FederateAlreadyExecutionMember,
                        format!("{connection} is joined to {joined}"),
                    ));
                }
                let execution = self.federations.get_mut(federation).ok_or_else(|| {
                    RtiError::new(ErrorKind::FederationExecutionDoesNotExist, federation.clone())
                })?;
                let handle = execution.join(connection, federate_name.as_deref(), federate_type)?;
                self.state_mut(connection)?.federation = Some(federation.clone());
                return Ok(ServiceResponse::Federate(handle));
            },
            _ => {},
        }

        let (federation, federate) = self.joined(connection, request)?;
        let execution = self
            .federations
            .get_mut(&federation)
            .ok_or_else(|| RtiError::new(ErrorKind::FederateNotExecutionMember, request.name()))?;
        let response = execution.handle(federate, request)?;
        if matches!(request, R::ResignFederationExecution { .. }) {
            self.state_mut(connection)?.federation = None;
        }
        Ok(response)
    }

    /// Federation and federate handle behind a joined connection.
    fn joined(
        &self,
        connection: ConnectionId,
        request: &ServiceRequest<T>,
    ) -> Result<(String, FederateHandle), RtiError> {
        let not_member = || RtiError::new(ErrorKind::FederateNotExecutionMember, request.name());
        let federation = self.state(connection)?.federation.clone().ok_or_else(not_member)?;
        let federate = self
            .federations
            .get(&federation)
            .and_then(|f| f.federate_of(connection))
            .ok_or_else(not_member)?;
        Ok((federation, federate))
    }

    fn auto_resign(&mut self, connection: ConnectionId) {
        let Some(federation) = self.connections.get_mut(&connection).and_then(|s| s.federation.take())
        else {
            return;
        };
        let Some(execution) = self.federations.get_mut(&federation) else { return };
        let Some(federate) = execution.federate_of(connection) else { return };
        if let Err(err) = execution.resign(federate, ResignAction::CancelThenDeleteThenDivest) {
            warn!(%connection, %federate, %err, "automatic resign failed");
        }
        self.deliver_pending();
    }

    /// Move every federation's outbox into the connection queues. A queue
    /// past the configured bound costs its connection.
    fn deliver_pending(&mut self) {
        loop {
            let deliveries: Vec<Delivery<T>> =
                self.federations.values_mut().flat_map(Federation::take_deliveries).collect();
            if deliveries.is_empty() {
                return;
            }
            let mut overflowing = Vec::new();
            for Delivery { connection, callback } in deliveries {
                let Some(state) = self.connections.get_mut(&connection) else { continue };
                state.callbacks.push_back(callback);
                if state.connected
                    && state.callbacks.len() > self.config.max_queued_callbacks
                    && !overflowing.contains(&connection)
                {
                    overflowing.push(connection);
                }
            }
            for connection in overflowing {
                warn!(%connection, limit = self.config.max_queued_callbacks, "callback queue overflow");
                self.sever(connection, DEFAULT_SEVER_REASON);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hla_proto::{CallbackModel, Float64Time};

    use super::*;
    use crate::federation::tests::vehicles;

    type Server = RtiServer<Float64Time>;

    fn connected(server: &mut Server) -> ConnectionId {
        let id = server.open();
        server.handle(id, &ServiceRequest::Connect { callback_model: CallbackModel::Evoked }).unwrap();
        id
    }

    fn create(name: &str) -> ServiceRequest<Float64Time> {
        ServiceRequest::CreateFederationExecution { federation: name.into(), modules: vec![vehicles()] }
    }

    fn join(federation: &str) -> ServiceRequest<Float64Time> {
        ServiceRequest::JoinFederationExecution {
            federate_name: None,
            federate_type: "tester".into(),
            federation: federation.into(),
        }
    }

    fn kind(result: Result<ServiceResponse<Float64Time>, RtiError>) -> ErrorKind {
        result.unwrap_err().kind()
    }

    #[test]
    fn services_need_a_connection() {
        let mut server = Server::new(RtiConfig::default());
        let id = server.open();

        assert_eq!(kind(server.handle(id, &create("f"))), ErrorKind::NotConnected);
        assert_eq!(kind(server.handle(ConnectionId::new(99), &create("f"))), ErrorKind::NotConnected);

        server.handle(id, &ServiceRequest::Connect { callback_model: CallbackModel::Evoked }).unwrap();
        assert_eq!(
            kind(server.handle(id, &ServiceRequest::Connect { callback_model: CallbackModel::Evoked })),
            ErrorKind::AlreadyConnected
        );
    }

    #[test]
    fn federation_lifecycle() {
        let mut server = Server::new(RtiConfig::default());
        let id = connected(&mut server);

        server.handle(id, &create("f")).unwrap();
        assert_eq!(kind(server.handle(id, &create("f"))), ErrorKind::FederationExecutionAlreadyExists);

        let joined = server.handle(id, &join("f")).unwrap();
        assert!(matches!(joined, ServiceResponse::Federate(_)));
        assert_eq!(kind(server.handle(id, &join("f"))), ErrorKind::FederateAlreadyExecutionMember);
        assert_eq!(kind(server.handle(id, &ServiceRequest::Disconnect)), ErrorKind::FederateIsExecutionMember);

        let destroy = ServiceRequest::DestroyFederationExecution { federation: "f".into() };
        assert_eq!(kind(server.handle(id, &destroy)), ErrorKind::FederatesCurrentlyJoined);

        let resign = ServiceRequest::ResignFederationExecution { action: ResignAction::NoAction };
        server.handle(id, &resign).unwrap();
        assert_eq!(kind(server.handle(id, &resign)), ErrorKind::FederateNotExecutionMember);

        server.handle(id, &destroy).unwrap();
        assert_eq!(kind(server.handle(id, &destroy)), ErrorKind::FederationExecutionDoesNotExist);
        assert_eq!(kind(server.handle(id, &join("f"))), ErrorKind::FederationExecutionDoesNotExist);
        server.handle(id, &ServiceRequest::Disconnect).unwrap();
    }

    #[test]
    fn list_reports_to_the_caller_only() {
        let mut server = Server::new(RtiConfig::default());
        let a = connected(&mut server);
        let b = connected(&mut server);
        server.handle(a, &create("one")).unwrap();
        server.handle(a, &create("two")).unwrap();

        server.handle(b, &ServiceRequest::ListFederationExecutions).unwrap();

        assert_eq!(server.queued_callbacks(a), 0);
        let Some(Callback::ReportFederationExecutions { executions }) = server.next_callback(b) else {
            panic!("expected a report");
        };
        let names: Vec<_> = executions.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["one", "two"]);
        assert!(executions.iter().all(|e| e.time_implementation == "HLAfloat64Time"));
    }

    #[test]
    fn closing_a_connection_resigns_its_federate() {
        let mut server = Server::new(RtiConfig::default());
        let id = connected(&mut server);
        server.handle(id, &create("f")).unwrap();
        server.handle(id, &join("f")).unwrap();

        server.close(id);

        assert_eq!(server.federation("f").unwrap().federate_count(), 0);
    }

    #[test]
    fn sever_reports_connection_lost() {
        let mut server = Server::new(RtiConfig::default());
        let id = connected(&mut server);
        server.handle(id, &create("f")).unwrap();
        server.handle(id, &join("f")).unwrap();

        server.sever(id, DEFAULT_SEVER_REASON);

        assert_eq!(server.federation("f").unwrap().federate_count(), 0);
        assert_eq!(
            server.next_callback(id),
            Some(Callback::ConnectionLost { reason: DEFAULT_SEVER_REASON.into() })
        );
        assert_eq!(kind(server.handle(id, &ServiceRequest::ListFederationExecutions)), ErrorKind::NotConnected);
    }

    #[test]
    fn queue_overflow_severs_the_slow_connection() {
        let mut server = Server::new(RtiConfig { max_queued_callbacks: 2, ..RtiConfig::default() });
        let slow = connected(&mut server);
        let fast = connected(&mut server);
        server.handle(slow, &create("f")).unwrap();
        server.handle(slow, &join("f")).unwrap();
        server.handle(fast, &join("f")).unwrap();

        for label in ["a", "b", "c"] {
            server
                .handle(
                    fast,
                    &ServiceRequest::RegisterFederationSynchronizationPoint {
                        label: label.into(),
                        tag: bytes::Bytes::new(),
                        federates: None,
                    },
                )
                .unwrap();
            while server.next_callback(fast).is_some() {}
        }

        assert_eq!(server.federation("f").unwrap().federate_count(), 1);
        let mut last = None;
        while let Some(callback) = server.next_callback(slow) {
            last = Some(callback);
        }
        assert_eq!(last, Some(Callback::ConnectionLost { reason: DEFAULT_SEVER_REASON.into() }));
    }
}
