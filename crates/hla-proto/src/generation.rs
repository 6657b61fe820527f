//! Name translation between the two API generations.
//!
//! The state machines are written once. [`Generation`] only changes the
//! names that cross the API boundary: exception names, transportation and
//! order type names, and the legacy `-1.0` "no timestamp" sentinel.

use serde::{Deserialize, Serialize};

use crate::{
    error::{ErrorKind, RtiError},
    time::Float64Time,
    types::{OrderType, TransportationType},
};

/// API generation a federate was written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Generation {
    /// HLA 1.3 (`RTI::RTIambassador`).
    Hla13,
    /// IEEE 1516-2010 evolved (`rti1516e::RTIambassador`).
    #[default]
    Ieee1516e,
}

impl Generation {
    /// Exception name for `kind` in this generation.
    pub fn exception_name(self, kind: ErrorKind) -> &'static str {
        match self {
            Self::Hla13 => kind.hla13_name(),
            Self::Ieee1516e => kind.ieee1516e_name(),
        }
    }

    /// Kind for an exception name, preferring this generation's names.
    pub fn parse_exception(self, name: &str) -> Option<ErrorKind> {
        let own = ErrorKind::ALL.iter().copied().find(|k| self.exception_name(*k) == name);
        own.or_else(|| ErrorKind::from_name(name))
    }

    /// Name of a transportation type.
    pub fn transportation_name(self, transportation: TransportationType) -> &'static str {
        match (self, transportation) {
            (Self::Hla13, TransportationType::Reliable) => "reliable",
            (Self::Hla13, TransportationType::BestEffort) => "best_effort",
            (Self::Ieee1516e, TransportationType::Reliable) => "HLAreliable",
            (Self::Ieee1516e, TransportationType::BestEffort) => "HLAbestEffort",
        }
    }

    /// Transportation type for a name in this generation.
    ///
    /// # Errors
    ///
    /// `InvalidTransportationType` for unknown names.
    pub fn transportation_type(self, name: &str) -> Result<TransportationType, RtiError> {
        [TransportationType::Reliable, TransportationType::BestEffort]
            .into_iter()
            .find(|t| self.transportation_name(*t) == name)
            .ok_or_else(|| RtiError::new(ErrorKind::InvalidTransportationType, name.to_string()))
    }

    /// Name of an order type.
    pub fn order_name(self, order: OrderType) -> &'static str {
        match order {
            OrderType::Receive => "Receive",
            OrderType::Timestamp => "TimeStamp",
        }
    }

    /// Order type for a name.
    ///
    /// # Errors
    ///
    /// `InvalidOrderType` for unknown names.
    pub fn order_type(self, name: &str) -> Result<OrderType, RtiError> {
        [OrderType::Receive, OrderType::Timestamp]
            .into_iter()
            .find(|o| self.order_name(*o) == name)
            .ok_or_else(|| RtiError::new(ErrorKind::InvalidOrderType, name.to_string()))
    }

    /// Interpret a timestamp passed through the legacy `f64` API.
    ///
    /// HLA 1.3 callers pass `-1.0` for "no timestamp"; that becomes `None`.
    /// Every other negative or NaN value is invalid in both generations.
    ///
    /// # Errors
    ///
    /// `InvalidLogicalTime` for negative or NaN values other than the 1.3
    /// sentinel.
    pub fn legacy_timestamp(self, value: f64) -> Result<Option<Float64Time>, RtiError> {
        if self == Self::Hla13 && value == -1.0 {
            return Ok(None);
        }
        Float64Time::new(value).map(Some)
    }

    /// Inverse of [`Generation::legacy_timestamp`].
    ///
    /// # Errors
    ///
    /// `InvalidLogicalTime` when `None` has no representation (1516e).
    pub fn legacy_value(self, time: Option<Float64Time>) -> Result<f64, RtiError> {
        match (self, time) {
            (_, Some(t)) => Ok(t.value()),
            (Self::Hla13, None) => Ok(-1.0),
            (Self::Ieee1516e, None) => Err(RtiError::new(
                ErrorKind::InvalidLogicalTime,
                "1516e has no missing-timestamp sentinel",
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn exception_names_per_generation() {
        let kind = ErrorKind::InvalidMessageRetractionHandle;
        assert_eq!(Generation::Hla13.exception_name(kind), "EventNotKnown");
        assert_eq!(Generation::Ieee1516e.exception_name(kind), "InvalidMessageRetractionHandle");
        assert_eq!(
            Generation::Hla13.exception_name(ErrorKind::SynchronizationPointLabelNotAnnounced),
            "SynchronizationPointLabelWasNotAnnounced"
        );
    }

    #[test]
    fn parse_prefers_own_generation() {
        // "ObjectNotKnown" is 1.3 only.
        assert_eq!(
            Generation::Hla13.parse_exception("ObjectNotKnown"),
            Some(ErrorKind::ObjectInstanceNotKnown)
        );
        assert_eq!(
            Generation::Ieee1516e.parse_exception("TimeAdvanceAlreadyInProgress"),
            Some(ErrorKind::InTimeAdvancingState)
        );
    }

    #[test]
    fn every_kind_round_trips_through_its_1516e_name() {
        for kind in ErrorKind::ALL {
            let name = Generation::Ieee1516e.exception_name(*kind);
            assert_eq!(Generation::Ieee1516e.parse_exception(name), Some(*kind));
        }
    }

    #[test]
    fn transportation_names() {
        assert_eq!(
            Generation::Hla13.transportation_type("best_effort").unwrap(),
            TransportationType::BestEffort
        );
        assert_eq!(
            Generation::Ieee1516e.transportation_type("HLAreliable").unwrap(),
            TransportationType::Reliable
        );
        assert_eq!(
            Generation::Ieee1516e.transportation_type("reliable").unwrap_err().kind,
            ErrorKind::InvalidTransportationType
        );
        assert_eq!(Generation::Hla13.order_type("TimeStamp").unwrap(), OrderType::Timestamp);
        assert_eq!(
            Generation::Hla13.order_type("Fifo").unwrap_err().kind,
            ErrorKind::InvalidOrderType
        );
    }

    #[test]
    fn legacy_sentinel_only_in_hla13() {
        assert_eq!(Generation::Hla13.legacy_timestamp(-1.0).unwrap(), None);
        assert_eq!(
            Generation::Ieee1516e.legacy_timestamp(-1.0).unwrap_err().kind,
            ErrorKind::InvalidLogicalTime
        );
        assert_eq!(
            Generation::Hla13.legacy_timestamp(-2.0).unwrap_err().kind,
            ErrorKind::InvalidLogicalTime
        );
        assert_eq!(
            Generation::Hla13.legacy_timestamp(4.5).unwrap(),
            Some(Float64Time::new(4.5).unwrap())
        );
        assert_eq!(Generation::Hla13.legacy_value(None).unwrap(), -1.0);
        assert!(Generation::Ieee1516e.legacy_value(None).is_err());
    }
}
