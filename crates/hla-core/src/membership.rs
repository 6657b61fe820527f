//! Connection and federation membership.
//!
//! ```text
//! NotConnected ──connect──▶ Connected ──join──▶ Joined
//!      ▲                      │   ▲               │
//!      └──────disconnect──────┘   └────resign─────┘
//! ```
//!
//! `connectionLost` drops straight back to `NotConnected` from any state.

use hla_proto::{CallbackModel, ErrorKind, FederateHandle, RtiError};
use tracing::info;

/// Where the federate is in its connect/join lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipState {
    /// No RTI connection.
    NotConnected,
    /// Connected, not joined to any federation.
    Connected,
    /// Joined to a federation execution.
    Joined {
        /// Handle assigned at join (or restore).
        federate: FederateHandle,
        /// Federation execution name.
        federation: String,
        /// Federate type given at join.
        federate_type: String,
    },
}

/// Membership state machine.
#[derive(Debug, Clone)]
pub struct Membership {
    state: MembershipState,
    callback_model: CallbackModel,
}

impl Default for Membership {
    fn default() -> Self {
        Self { state: MembershipState::NotConnected, callback_model: CallbackModel::Evoked }
    }
}

impl Membership {
    /// Current state.
    pub fn state(&self) -> &MembershipState {
        &self.state
    }

    /// Callback model chosen at connect.
    pub fn callback_model(&self) -> CallbackModel {
        self.callback_model
    }

    /// Handle of this federate while joined.
    pub fn federate(&self) -> Option<FederateHandle> {
        match &self.state {
            MembershipState::Joined { federate, .. } => Some(*federate),
            _ => None,
        }
    }

    /// Name of the joined federation.
    pub fn federation(&self) -> Option<&str> {
        match &self.state {
            MembershipState::Joined { federation, .. } => Some(federation),
            _ => None,
        }
    }

    /// True while joined.
    pub fn is_joined(&self) -> bool {
        matches!(self.state, MembershipState::Joined { .. })
    }

    /// True while connected (joined or not).
    pub fn is_connected(&self) -> bool {
        !matches!(self.state, MembershipState::NotConnected)
    }

    /// Validate `connect`.
    pub fn check_connect(&self) -> Result<(), RtiError> {
        if self.is_connected() {
            return Err(RtiError::new(ErrorKind::AlreadyConnected, "connect"));
        }
        Ok(())
    }

    /// Validate a service that needs a connection but no federation.
    pub fn check_connected(&self, service: &str) -> Result<(), RtiError> {
        if !self.is_connected() {
            return Err(RtiError::new(ErrorKind::NotConnected, service.to_string()));
        }
        Ok(())
    }

    /// Validate `joinFederationExecution`.
    pub fn check_join(&self) -> Result<(), RtiError> {
        self.check_connected("joinFederationExecution")?;
        if let MembershipState::Joined { federation, .. } = &self.state {
            return Err(RtiError::new(
                ErrorKind::FederateAlreadyExecutionMember,
                format!("already joined to {federation}"),
            ));
        }
        Ok(())
    }

    /// Validate `disconnect`.
    pub fn check_disconnect(&self) -> Result<(), RtiError> {
        self.check_connected("disconnect")?;
        if self.is_joined() {
            return Err(RtiError::new(ErrorKind::FederateIsExecutionMember, "disconnect"));
        }
        Ok(())
    }

    /// Validate a service that needs a joined federate.
    pub fn check_joined(&self, service: &str) -> Result<FederateHandle, RtiError> {
        self.check_connected(service)?;
        self.federate()
            .ok_or_else(|| RtiError::new(ErrorKind::FederateNotExecutionMember, service.to_string()))
    }

    /// Record a successful `connect`.
    pub fn connected(&mut self, callback_model: CallbackModel) {
        info!(?callback_model, "connected");
        self.state = MembershipState::Connected;
        self.callback_model = callback_model;
    }

    /// Record a successful `disconnect` or a lost connection.
    pub fn disconnected(&mut self) {
        info!("disconnected");
        self.state = MembershipState::NotConnected;
    }

    /// Record a successful join.
    pub fn joined(&mut self, federate: FederateHandle, federation: String, federate_type: String) {
        info!(%federate, %federation, "joined federation");
        self.state = MembershipState::Joined { federate, federation, federate_type };
    }

    /// Record a successful resign.
    pub fn resigned(&mut self) {
        info!("resigned");
        self.state = MembershipState::Connected;
    }

    /// A restore may assign a new handle.
    pub fn rehandled(&mut self, handle: FederateHandle) {
        if let MembershipState::Joined { federate, .. } = &mut self.state {
            *federate = handle;
        }
    }
}
