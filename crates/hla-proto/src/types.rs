//! Small enumerations and records shared by services and callbacks.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ErrorKind, RtiError},
    handle::FederateHandle,
};

/// What the RTI does with a resigning federate's objects and attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResignAction {
    /// Release every owned attribute.
    UnconditionallyDivestAttributes,
    /// Delete every object the federate holds the delete privilege for.
    DeleteObjects,
    /// Withdraw pending acquisitions.
    CancelPendingOwnershipAcquisitions,
    /// Delete objects, then release the remaining attributes.
    DeleteObjectsThenDivest,
    /// Withdraw acquisitions, delete objects, then release attributes.
    CancelThenDeleteThenDivest,
    /// Do nothing; fails if the federate still owns attributes.
    NoAction,
}

impl ResignAction {
    /// Pending acquisitions are withdrawn.
    pub fn cancels_acquisitions(self) -> bool {
        matches!(self, Self::CancelPendingOwnershipAcquisitions | Self::CancelThenDeleteThenDivest)
    }

    /// Objects with the delete privilege are deleted.
    pub fn deletes_objects(self) -> bool {
        matches!(
            self,
            Self::DeleteObjects | Self::DeleteObjectsThenDivest | Self::CancelThenDeleteThenDivest
        )
    }

    /// Remaining owned attributes are released.
    pub fn divests(self) -> bool {
        matches!(
            self,
            Self::UnconditionallyDivestAttributes
                | Self::DeleteObjectsThenDivest
                | Self::CancelThenDeleteThenDivest
        )
    }
}

/// Delivery order of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Delivered on arrival.
    Receive,
    /// Delivered in timestamp order to constrained federates.
    Timestamp,
}

/// Transport quality requested for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportationType {
    /// `HLAreliable`.
    Reliable,
    /// `HLAbestEffort`.
    BestEffort,
}

/// How callbacks reach the federate ambassador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CallbackModel {
    /// Delivered only inside `evoke_callback` / `tick`.
    #[default]
    Evoked,
    /// Delivered on a background thread while callbacks are enabled.
    Immediate,
}

/// Kind of time advance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdvanceKind {
    /// `timeAdvanceRequest`.
    TimeAdvance,
    /// `timeAdvanceRequestAvailable`.
    TimeAdvanceAvailable,
    /// `nextMessageRequest`.
    NextMessage,
    /// `nextMessageRequestAvailable`.
    NextMessageAvailable,
    /// `flushQueueRequest`.
    FlushQueue,
}

impl AdvanceKind {
    /// The grant may equal the greatest available logical time.
    pub fn is_available_variant(self) -> bool {
        matches!(self, Self::TimeAdvanceAvailable | Self::NextMessageAvailable)
    }

    /// The grant may be earlier than the requested time.
    pub fn is_next_message(self) -> bool {
        matches!(self, Self::NextMessage | Self::NextMessageAvailable)
    }
}

impl fmt::Display for AdvanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TimeAdvance => "timeAdvanceRequest",
            Self::TimeAdvanceAvailable => "timeAdvanceRequestAvailable",
            Self::NextMessage => "nextMessageRequest",
            Self::NextMessageAvailable => "nextMessageRequestAvailable",
            Self::FlushQueue => "flushQueueRequest",
        })
    }
}

/// Reason a synchronization point registration failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncPointFailureReason {
    /// The label is already registered in this federation.
    LabelNotUnique,
    /// A federate in the synchronization set is not joined.
    SynchronizationSetMemberNotJoined,
}

/// Save progress of one federate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaveStatus {
    /// No save is in progress.
    NoSaveInProgress,
    /// `initiateFederateSave` delivered, `federateSaveBegun` not yet called.
    FederateInstructedToSave,
    /// Between `federateSaveBegun` and completion.
    FederateSaving,
    /// Completion reported, waiting for the rest of the federation.
    FederateWaitingForFederationToSave,
}

/// Why a federation save failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaveFailureReason {
    /// The RTI could not save its own state.
    RtiUnableToSave,
    /// A federate called `federateSaveNotComplete`.
    FederateReportedFailure,
    /// A federate resigned during the save.
    FederateResigned,
    /// The RTI detected a failure.
    RtiDetectedFailure,
    /// The requested save time is no longer reachable.
    SaveTimeCannotBeHonored,
    /// `abortFederationSave` was called.
    SaveAborted,
}

/// Restore progress of one federate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestoreStatus {
    /// No restore is in progress.
    NoRestoreInProgress,
    /// `initiateFederateRestore` delivered, completion not yet reported.
    FederateRestoreRequestPending,
    /// Completion reported, waiting for the rest of the federation.
    FederateWaitingForRestoreToFinish,
    /// The federate reported a failed restore.
    FederateRestoreFailed,
}

/// Why a federation restore failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestoreFailureReason {
    /// The RTI could not restore its own state.
    RtiUnableToRestore,
    /// A federate called `federateRestoreNotComplete`.
    FederateReportedFailure,
    /// A federate resigned during the restore.
    FederateResigned,
    /// The RTI detected a failure.
    RtiDetectedFailure,
    /// `abortFederationRestore` was called.
    RestoreAborted,
}

/// One federate's entry in a save status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederateSaveStatus {
    /// The federate.
    pub federate: FederateHandle,
    /// Its progress.
    pub status: SaveStatus,
}

/// One federate's entry in a restore status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederateRestoreStatus {
    /// Handle before the restore.
    pub pre_restore: FederateHandle,
    /// Handle after the restore.
    pub post_restore: FederateHandle,
    /// Its progress.
    pub status: RestoreStatus,
}

/// Entry of `reportFederationExecutions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationExecutionInfo {
    /// Federation execution name.
    pub name: String,
    /// Logical time implementation, for example `HLAfloat64Time`.
    pub time_implementation: String,
}

/// Half-open range `[lower, upper)` on one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeBounds {
    lower: u64,
    upper: u64,
}

impl RangeBounds {
    /// Create a range.
    ///
    /// # Errors
    ///
    /// `InvalidRangeBound` unless `lower < upper`.
    pub fn new(lower: u64, upper: u64) -> Result<Self, RtiError> {
        if lower >= upper {
            return Err(RtiError::new(ErrorKind::InvalidRangeBound, format!("[{lower}, {upper})")));
        }
        Ok(Self { lower, upper })
    }

    /// Inclusive lower bound.
    pub fn lower(&self) -> u64 {
        self.lower
    }

    /// Exclusive upper bound.
    pub fn upper(&self) -> u64 {
        self.upper
    }

    /// True if the two ranges share at least one point.
    pub fn intersects(&self, other: &Self) -> bool {
        self.lower < other.upper && other.lower < self.upper
    }
}

bitflags! {
    /// Advisory switches a federate can turn on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AdvisorySwitches: u8 {
        /// `start/stopRegistrationForObjectClass`.
        const OBJECT_CLASS_RELEVANCE = 1 << 0;
        /// `turnUpdatesOn/OffForObjectInstance`.
        const ATTRIBUTE_RELEVANCE = 1 << 1;
        /// `attributesInScope` / `attributesOutOfScope`.
        const ATTRIBUTE_SCOPE = 1 << 2;
        /// `turnInteractionsOn/Off`.
        const INTERACTION_RELEVANCE = 1 << 3;
    }
}

impl AdvisorySwitches {
    /// Switches enabled on a freshly joined federate.
    pub fn join_defaults() -> Self {
        Self::OBJECT_CLASS_RELEVANCE | Self::INTERACTION_RELEVANCE
    }

    /// Error raised when enabling a switch that is already on (`on = true`)
    /// or disabling one that is already off.
    ///
    /// `self` must be a single flag.
    pub fn redundant_error(self, on: bool) -> ErrorKind {
        use ErrorKind::*;
        if self == Self::OBJECT_CLASS_RELEVANCE {
            if on { ObjectClassRelevanceAdvisorySwitchIsOn } else { ObjectClassRelevanceAdvisorySwitchIsOff }
        } else if self == Self::ATTRIBUTE_RELEVANCE {
            if on { AttributeRelevanceAdvisorySwitchIsOn } else { AttributeRelevanceAdvisorySwitchIsOff }
        } else if self == Self::ATTRIBUTE_SCOPE {
            if on { AttributeScopeAdvisorySwitchIsOn } else { AttributeScopeAdvisorySwitchIsOff }
        } else if on {
            InteractionRelevanceAdvisorySwitchIsOn
        } else {
            InteractionRelevanceAdvisorySwitchIsOff
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn resign_action_composition() {
        let all = ResignAction::CancelThenDeleteThenDivest;
        assert!(all.cancels_acquisitions() && all.deletes_objects() && all.divests());
        let none = ResignAction::NoAction;
        assert!(!none.cancels_acquisitions() && !none.deletes_objects() && !none.divests());
        assert!(ResignAction::DeleteObjectsThenDivest.divests());
        assert!(!ResignAction::DeleteObjects.divests());
    }

    #[test]
    fn range_bounds_are_half_open() {
        let a = RangeBounds::new(0, 10).unwrap();
        let b = RangeBounds::new(10, 20).unwrap();
        let c = RangeBounds::new(9, 11).unwrap();
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c) && b.intersects(&c));
        assert_eq!(RangeBounds::new(5, 5).unwrap_err().kind, ErrorKind::InvalidRangeBound);
    }

    #[test]
    fn advisory_switch_errors() {
        assert_eq!(
            AdvisorySwitches::ATTRIBUTE_SCOPE.redundant_error(false),
            ErrorKind::AttributeScopeAdvisorySwitchIsOff
        );
        assert_eq!(
            AdvisorySwitches::INTERACTION_RELEVANCE.redundant_error(true),
            ErrorKind::InteractionRelevanceAdvisorySwitchIsOn
        );
    }
}
