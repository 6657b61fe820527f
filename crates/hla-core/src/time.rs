//! Time management state machine.
//!
//! Three independent axes:
//!
//! ```text
//! regulation:   Off ──enable──▶ Pending ──timeRegulationEnabled──▶ On
//! constrained:  Off ──enable──▶ Pending ──timeConstrainedEnabled─▶ On
//! advance:      Idle ──TAR/TARA/NMR/NMRA/FQR──▶ Pending ──grant──▶ Idle
//! ```
//!
//! Disabling returns an axis to `Off` immediately. The grant sets the
//! federate's logical time.

use hla_proto::{
    AdvanceKind, ErrorKind, LogicalTime, LogicalTimeInterval, RtiError,
};
use tracing::debug;

/// Three-valued enablement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    /// Disabled.
    #[default]
    Off,
    /// Requested, waiting for the RTI's confirmation callback.
    Pending,
    /// Enabled.
    On,
}

/// Advance state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceState<T> {
    /// Not advancing.
    Idle,
    /// Waiting for `timeAdvanceGrant`.
    Pending {
        /// Request flavour.
        kind: AdvanceKind,
        /// Requested time.
        requested: T,
    },
}

/// Local time status of one federate.
#[derive(Debug, Clone)]
pub struct TimeState<T: LogicalTime> {
    current: T,
    lookahead: Option<T::Interval>,
    regulation: TriState,
    constrained: TriState,
    advance: AdvanceState<T>,
    asynchronous_delivery: bool,
}

impl<T: LogicalTime> Default for TimeState<T> {
    fn default() -> Self {
        Self {
            current: T::initial(),
            lookahead: None,
            regulation: TriState::Off,
            constrained: TriState::Off,
            advance: AdvanceState::Idle,
            asynchronous_delivery: false,
        }
    }
}

fn err(kind: ErrorKind, message: impl Into<String>) -> RtiError {
    RtiError::new(kind, message)
}

impl<T: LogicalTime> TimeState<T> {
    /// Current logical time (`queryLogicalTime`).
    pub fn current(&self) -> T {
        self.current
    }

    /// Regulation state.
    pub fn regulation(&self) -> TriState {
        self.regulation
    }

    /// Constrained state.
    pub fn constrained(&self) -> TriState {
        self.constrained
    }

    /// Advance state.
    pub fn advance(&self) -> AdvanceState<T> {
        self.advance
    }

    /// True while a time advance is pending.
    pub fn is_advancing(&self) -> bool {
        matches!(self.advance, AdvanceState::Pending { .. })
    }

    /// Asynchronous delivery enabled.
    pub fn asynchronous_delivery(&self) -> bool {
        self.asynchronous_delivery
    }

    /// `queryLookahead`.
    pub fn query_lookahead(&self) -> Result<T::Interval, RtiError> {
        match (self.regulation, self.lookahead) {
            (TriState::On, Some(l)) => Ok(l),
            _ => Err(err(ErrorKind::TimeRegulationIsNotEnabled, "queryLookahead")),
        }
    }

    fn check_not_advancing(&self, service: &str) -> Result<(), RtiError> {
        if let AdvanceState::Pending { requested, .. } = self.advance {
            return Err(err(
                ErrorKind::InTimeAdvancingState,
                format!("{service} while advancing to {requested}"),
            ));
        }
        Ok(())
    }

    fn check_lookahead(lookahead: T::Interval) -> Result<(), RtiError> {
        if lookahead <= T::Interval::zero() {
            return Err(err(ErrorKind::InvalidLookahead, format!("{lookahead}")));
        }
        Ok(())
    }

    /// Validate `enableTimeRegulation`.
    pub fn check_enable_regulation(&self, lookahead: T::Interval) -> Result<(), RtiError> {
        match self.regulation {
            TriState::On => return Err(err(ErrorKind::TimeRegulationAlreadyEnabled, "")),
            TriState::Pending => {
                return Err(err(ErrorKind::RequestForTimeRegulationPending, ""));
            },
            TriState::Off => {},
        }
        self.check_not_advancing("enableTimeRegulation")?;
        Self::check_lookahead(lookahead)
    }

    /// Validate `disableTimeRegulation`.
    pub fn check_disable_regulation(&self) -> Result<(), RtiError> {
        if self.regulation != TriState::On {
            return Err(err(ErrorKind::TimeRegulationIsNotEnabled, "disableTimeRegulation"));
        }
        Ok(())
    }

    /// Validate `enableTimeConstrained`.
    pub fn check_enable_constrained(&self) -> Result<(), RtiError> {
        match self.constrained {
            TriState::On => return Err(err(ErrorKind::TimeConstrainedAlreadyEnabled, "")),
            TriState::Pending => {
                return Err(err(ErrorKind::RequestForTimeConstrainedPending, ""));
            },
            TriState::Off => {},
        }
        self.check_not_advancing("enableTimeConstrained")
    }

    /// Validate `disableTimeConstrained`.
    pub fn check_disable_constrained(&self) -> Result<(), RtiError> {
        if self.constrained != TriState::On {
            return Err(err(ErrorKind::TimeConstrainedIsNotEnabled, "disableTimeConstrained"));
        }
        Ok(())
    }

    /// Validate a time advance request of any kind.
    pub fn check_advance(&self, kind: AdvanceKind, time: T) -> Result<(), RtiError> {
        self.check_not_advancing(&kind.to_string())?;
        if self.regulation == TriState::Pending {
            return Err(err(ErrorKind::RequestForTimeRegulationPending, kind.to_string()));
        }
        if self.constrained == TriState::Pending {
            return Err(err(ErrorKind::RequestForTimeConstrainedPending, kind.to_string()));
        }
        if time <= self.current {
            return Err(err(
                ErrorKind::LogicalTimeAlreadyPassed,
                format!("{kind}({time}) at {}", self.current),
            ));
        }
        Ok(())
    }

    /// Validate `modifyLookahead`.
    pub fn check_modify_lookahead(&self, lookahead: T::Interval) -> Result<(), RtiError> {
        if self.regulation != TriState::On {
            return Err(err(ErrorKind::TimeRegulationIsNotEnabled, "modifyLookahead"));
        }
        Self::check_lookahead(lookahead)
    }

    /// Validate `enable/disableAsynchronousDelivery`.
    pub fn check_asynchronous_delivery(&self, enable: bool) -> Result<(), RtiError> {
        match (enable, self.asynchronous_delivery) {
            (true, true) => Err(err(ErrorKind::AsynchronousDeliveryAlreadyEnabled, "")),
            (false, false) => Err(err(ErrorKind::AsynchronousDeliveryAlreadyDisabled, "")),
            _ => Ok(()),
        }
    }

    /// Earliest timestamp this federate may send with, if regulating.
    pub fn earliest_send_time(&self) -> Result<Option<T>, RtiError> {
        if self.regulation != TriState::On {
            return Ok(None);
        }
        let base = match self.advance {
            AdvanceState::Pending { requested, .. } => requested,
            AdvanceState::Idle => self.current,
        };
        let lookahead = self.lookahead.unwrap_or_else(T::Interval::zero);
        base.add(lookahead).map(Some)
    }

    /// Validate the timestamp of an update, interaction or deletion.
    ///
    /// Non-regulating federates may pass any timestamp; their messages are
    /// delivered receive-order.
    pub fn check_send_time(&self, time: T) -> Result<(), RtiError> {
        if let Some(earliest) = self.earliest_send_time()?
            && time < earliest
        {
            return Err(err(
                ErrorKind::InvalidLogicalTime,
                format!("timestamp {time} is before {earliest}"),
            ));
        }
        Ok(())
    }

    /// Validate the time of a timestamped save request.
    pub fn check_save_time(&self, time: T) -> Result<(), RtiError> {
        if time <= self.current {
            return Err(err(
                ErrorKind::LogicalTimeAlreadyPassed,
                format!("save at {time}, current time {}", self.current),
            ));
        }
        Ok(())
    }

    /// Record a forwarded `enableTimeRegulation`.
    pub fn regulation_requested(&mut self, lookahead: T::Interval) {
        self.regulation = TriState::Pending;
        self.lookahead = Some(lookahead);
    }

    /// `timeRegulationEnabled`.
    pub fn regulation_enabled(&mut self, time: T) -> Result<(), RtiError> {
        if self.regulation != TriState::Pending {
            return Err(RtiError::internal("timeRegulationEnabled without a pending request"));
        }
        debug!(%time, "time regulation enabled");
        self.regulation = TriState::On;
        self.current = self.current.max(time);
        Ok(())
    }

    /// Record a forwarded `disableTimeRegulation`.
    pub fn regulation_disabled(&mut self) {
        self.regulation = TriState::Off;
        self.lookahead = None;
    }

    /// Record a forwarded `enableTimeConstrained`.
    pub fn constrained_requested(&mut self) {
        self.constrained = TriState::Pending;
    }

    /// `timeConstrainedEnabled`.
    pub fn constrained_enabled(&mut self, time: T) -> Result<(), RtiError> {
        if self.constrained != TriState::Pending {
            return Err(RtiError::internal("timeConstrainedEnabled without a pending request"));
        }
        debug!(%time, "time constrained enabled");
        self.constrained = TriState::On;
        self.current = self.current.max(time);
        Ok(())
    }

    /// Record a forwarded `disableTimeConstrained`.
    pub fn constrained_disabled(&mut self) {
        self.constrained = TriState::Off;
    }

    /// Record a forwarded time advance request.
    pub fn advance_requested(&mut self, kind: AdvanceKind, requested: T) {
        debug!(%kind, %requested, "time advance requested");
        self.advance = AdvanceState::Pending { kind, requested };
    }

    /// `timeAdvanceGrant`.
    pub fn granted(&mut self, time: T) -> Result<(), RtiError> {
        let AdvanceState::Pending { kind, requested } = self.advance else {
            return Err(RtiError::internal(format!("timeAdvanceGrant({time}) while idle")));
        };
        if time > requested || time < self.current {
            return Err(RtiError::internal(format!(
                "grant {time} outside [{}, {requested}] for {kind}",
                self.current
            )));
        }
        debug!(%time, "time advance granted");
        self.current = time;
        self.advance = AdvanceState::Idle;
        Ok(())
    }

    /// Record a forwarded `modifyLookahead`.
    pub fn lookahead_modified(&mut self, lookahead: T::Interval) {
        self.lookahead = Some(lookahead);
    }

    /// Record a forwarded `enable/disableAsynchronousDelivery`.
    pub fn set_asynchronous_delivery(&mut self, enabled: bool) {
        self.asynchronous_delivery = enabled;
    }
}
