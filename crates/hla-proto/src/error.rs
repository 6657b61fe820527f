//! Error taxonomy shared by the federate and the RTI.
//!
//! Every service failure is an [`RtiError`]: a closed [`ErrorKind`] plus a
//! free-form message. The kind is what conformance checks assert on, so it
//! crosses the wire as a numeric tag (`serde_repr`) and is never
//! reconstructed from an exception class name.
//!
//! Kinds are named after their IEEE 1516e exception. Concepts that HLA 1.3
//! names differently (`EventNotKnown`, `FederationTimeAlreadyPassed`, ...)
//! share the 1516e kind; [`crate::Generation`] translates names in both
//! directions.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use thiserror::Error;

/// Coarse grouping of error kinds.
///
/// Used by callers that want to react to a class of failures (for example,
/// "anything wrong with the federation phase") without matching every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorFamily {
    /// The referenced handle or name does not exist or is not visible.
    Identity,
    /// The caller does (or does not) own what the operation requires.
    Ownership,
    /// An ownership transfer is in the wrong state for the request.
    Transfer,
    /// The federate or federation is in the wrong phase for the call.
    Phase,
    /// Invalid logical time, lookahead or retraction request.
    Time,
    /// Capacity or encoding failure.
    Resource,
    /// Transport or implementation failure not otherwise classified.
    Internal,
}

macro_rules! error_kinds {
    ($( $variant:ident = $code:literal, $hla13:literal, $family:ident; )*) => {
        /// Closed set of error kinds.
        ///
        /// Variant names are the IEEE 1516e exception names (with
        /// `RTIinternalError` spelled `RtiInternalError`).
        #[allow(missing_docs)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize_repr, Deserialize_repr)]
        #[repr(u16)]
        pub enum ErrorKind {
            $( $variant = $code, )*
        }

        impl ErrorKind {
            /// Every kind, in tag order.
            pub const ALL: &'static [Self] = &[ $( Self::$variant, )* ];

            /// Exception name in the IEEE 1516e API.
            pub const fn ieee1516e_name(self) -> &'static str {
                if matches!(self, Self::RtiInternalError) {
                    return "RTIinternalError";
                }
                match self {
                    $( Self::$variant => stringify!($variant), )*
                }
            }

            /// Exception name in the HLA 1.3 API.
            pub const fn hla13_name(self) -> &'static str {
                match self {
                    $( Self::$variant => $hla13, )*
                }
            }

            /// Family this kind belongs to.
            pub const fn family(self) -> ErrorFamily {
                match self {
                    $( Self::$variant => ErrorFamily::$family, )*
                }
            }

            /// Numeric wire tag.
            pub const fn code(self) -> u16 {
                self as u16
            }

            /// Kind for a numeric wire tag.
            pub fn from_code(code: u16) -> Option<Self> {
                match code {
                    $( $code => Some(Self::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

error_kinds! {
    // Identity
    AttributeNotDefined = 100, "AttributeNotDefined", Identity;
    AttributeNotRecognized = 101, "AttributeNotKnown", Identity;
    FederateHandleNotKnown = 102, "FederateHandleNotKnown", Identity;
    InteractionClassNotDefined = 103, "InteractionClassNotDefined", Identity;
    InteractionClassNotRecognized = 104, "InteractionClassNotKnown", Identity;
    InteractionParameterNotDefined = 105, "InteractionParameterNotDefined", Identity;
    InteractionParameterNotRecognized = 106, "InteractionParameterNotKnown", Identity;
    InvalidAttributeHandle = 107, "AttributeNotDefined", Identity;
    InvalidDimensionHandle = 108, "DimensionNotDefined", Identity;
    InvalidFederateHandle = 109, "FederateHandleNotKnown", Identity;
    InvalidInteractionClassHandle = 110, "InteractionClassNotDefined", Identity;
    InvalidObjectClassHandle = 111, "ObjectClassNotDefined", Identity;
    InvalidParameterHandle = 112, "InteractionParameterNotDefined", Identity;
    InvalidRegion = 113, "RegionNotKnown", Identity;
    InvalidTransportationType = 114, "InvalidTransportationHandle", Identity;
    InvalidOrderType = 115, "InvalidOrderingHandle", Identity;
    NameNotFound = 116, "NameNotFound", Identity;
    ObjectClassNotDefined = 117, "ObjectClassNotDefined", Identity;
    ObjectClassNotKnown = 118, "ObjectClassNotKnown", Identity;
    ObjectInstanceNotKnown = 119, "ObjectNotKnown", Identity;
    RegionDoesNotContainSpecifiedDimension = 120, "DimensionNotDefined", Identity;
    RegionNotCreatedByThisFederate = 121, "RegionNotKnown", Identity;
    FederationExecutionDoesNotExist = 122, "FederationExecutionDoesNotExist", Identity;
    FederationExecutionAlreadyExists = 123, "FederationExecutionAlreadyExists", Identity;
    FederateNameAlreadyInUse = 124, "FederateNameAlreadyInUse", Identity;
    ObjectInstanceNameInUse = 125, "ObjectAlreadyRegistered", Identity;
    ObjectInstanceNameNotReserved = 126, "ObjectAlreadyRegistered", Identity;
    IllegalName = 127, "NameNotFound", Identity;
    SpecifiedSaveLabelDoesNotExist = 128, "SpecifiedSaveLabelDoesNotExist", Identity;
    // Ownership
    AttributeNotOwned = 200, "AttributeNotOwned", Ownership;
    AttributeAlreadyOwned = 201, "AttributeAlreadyOwned", Ownership;
    FederateOwnsAttributes = 202, "FederateOwnsAttributes", Ownership;
    DeletePrivilegeNotHeld = 203, "DeletePrivilegeNotHeld", Ownership;
    AttributeNotPublished = 204, "AttributeNotPublished", Ownership;
    ObjectClassNotPublished = 205, "ObjectClassNotPublished", Ownership;
    InteractionClassNotPublished = 206, "InteractionClassNotPublished", Ownership;
    AttributeNotSubscribed = 207, "AttributeNotSubscribed", Ownership;
    ObjectClassNotSubscribed = 208, "ObjectClassNotSubscribed", Ownership;
    InteractionClassNotSubscribed = 209, "InteractionClassNotSubscribed", Ownership;
    // Transfer
    AttributeAlreadyBeingAcquired = 300, "AttributeAlreadyBeingAcquired", Transfer;
    AttributeAlreadyBeingDivested = 301, "AttributeAlreadyBeingDivested", Transfer;
    AttributeAcquisitionWasNotRequested = 302, "AttributeAcquisitionWasNotRequested", Transfer;
    AttributeAcquisitionWasNotCanceled = 303, "AttributeAcquisitionWasNotCanceled", Transfer;
    AttributeDivestitureWasNotRequested = 304, "AttributeDivestitureWasNotRequested", Transfer;
    NoAcquisitionPending = 305, "FederateWasNotAskedToReleaseAttribute", Transfer;
    OwnershipAcquisitionPending = 306, "OwnershipAcquisitionPending", Transfer;
    // Phase
    NotConnected = 400, "RTIinternalError", Phase;
    AlreadyConnected = 401, "RTIinternalError", Phase;
    FederateNotExecutionMember = 402, "FederateNotExecutionMember", Phase;
    FederateAlreadyExecutionMember = 403, "FederateAlreadyExecutionMember", Phase;
    FederateIsExecutionMember = 404, "FederateAlreadyExecutionMember", Phase;
    FederatesCurrentlyJoined = 405, "FederatesCurrentlyJoined", Phase;
    SaveInProgress = 406, "SaveInProgress", Phase;
    RestoreInProgress = 407, "RestoreInProgress", Phase;
    SaveNotInitiated = 408, "SaveNotInitiated", Phase;
    SaveNotInProgress = 409, "SaveNotInitiated", Phase;
    FederateHasNotBegunSave = 410, "SaveNotInitiated", Phase;
    RestoreNotRequested = 411, "RestoreNotRequested", Phase;
    RestoreNotInProgress = 412, "RestoreNotRequested", Phase;
    SynchronizationPointLabelNotAnnounced = 413, "SynchronizationPointLabelWasNotAnnounced", Phase;
    CallNotAllowedFromWithinCallback = 414, "ConcurrentAccessAttempted", Phase;
    InvalidResignAction = 415, "InvalidResignAction", Phase;
    TimeRegulationAlreadyEnabled = 416, "TimeRegulationAlreadyEnabled", Phase;
    TimeConstrainedAlreadyEnabled = 417, "TimeConstrainedAlreadyEnabled", Phase;
    TimeRegulationIsNotEnabled = 418, "TimeRegulationWasNotEnabled", Phase;
    TimeConstrainedIsNotEnabled = 419, "TimeConstrainedWasNotEnabled", Phase;
    RequestForTimeRegulationPending = 420, "EnableTimeRegulationPending", Phase;
    RequestForTimeConstrainedPending = 421, "EnableTimeConstrainedPending", Phase;
    InTimeAdvancingState = 422, "TimeAdvanceAlreadyInProgress", Phase;
    AsynchronousDeliveryAlreadyEnabled = 423, "AsynchronousDeliveryAlreadyEnabled", Phase;
    AsynchronousDeliveryAlreadyDisabled = 424, "AsynchronousDeliveryAlreadyDisabled", Phase;
    ObjectClassRelevanceAdvisorySwitchIsOn = 425, "RTIinternalError", Phase;
    ObjectClassRelevanceAdvisorySwitchIsOff = 426, "RTIinternalError", Phase;
    AttributeRelevanceAdvisorySwitchIsOn = 427, "RTIinternalError", Phase;
    AttributeRelevanceAdvisorySwitchIsOff = 428, "RTIinternalError", Phase;
    AttributeScopeAdvisorySwitchIsOn = 429, "RTIinternalError", Phase;
    AttributeScopeAdvisorySwitchIsOff = 430, "RTIinternalError", Phase;
    InteractionRelevanceAdvisorySwitchIsOn = 431, "RTIinternalError", Phase;
    InteractionRelevanceAdvisorySwitchIsOff = 432, "RTIinternalError", Phase;
    RegionInUseForUpdateOrSubscription = 433, "RegionInUse", Phase;
    CouldNotOpenFDD = 434, "CouldNotOpenFED", Phase;
    ErrorReadingFDD = 435, "ErrorReadingFED", Phase;
    InconsistentFDD = 436, "ErrorReadingFED", Phase;
    // Time
    InvalidLogicalTime = 500, "InvalidFederationTime", Time;
    InvalidLogicalTimeInterval = 501, "InvalidFederationTime", Time;
    InvalidLookahead = 502, "InvalidLookahead", Time;
    LogicalTimeAlreadyPassed = 503, "FederationTimeAlreadyPassed", Time;
    IllegalTimeArithmetic = 504, "InvalidFederationTime", Time;
    InvalidMessageRetractionHandle = 505, "EventNotKnown", Time;
    MessageCanNoLongerBeRetracted = 506, "EventNotKnown", Time;
    InvalidRangeBound = 507, "InvalidExtents", Time;
    // Resource
    ArrayIndexOutOfBounds = 600, "ArrayIndexOutOfBounds", Resource;
    ValueCountExceeded = 601, "ValueCountExceeded", Resource;
    ValueLengthExceeded = 602, "ValueLengthExceeded", Resource;
    MemoryExhausted = 603, "MemoryExhausted", Resource;
    CouldNotDecode = 604, "CouldNotDecode", Resource;
    CouldNotEncode = 605, "CouldNotEncode", Resource;
    // Internal
    RtiInternalError = 700, "RTIinternalError", Internal;
    FederateInternalError = 701, "FederateInternalError", Internal;
    ConnectionFailed = 702, "RTIinternalError", Internal;
}

impl ErrorKind {
    /// Kind for an exception name from either API generation.
    ///
    /// 1516e names take precedence; a 1.3 name shared by several kinds maps
    /// to the first one in tag order.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.ieee1516e_name() == name)
            .or_else(|| Self::ALL.iter().copied().find(|k| k.hla13_name() == name))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ieee1516e_name())
    }
}

/// Error returned by every service call and carried by the wire codec.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct RtiError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl RtiError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// Shorthand for [`ErrorKind::RtiInternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RtiInternalError, message)
    }

    /// Error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// True if this error has the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Family of the error kind.
    pub fn family(&self) -> ErrorFamily {
        self.kind.family()
    }
}
