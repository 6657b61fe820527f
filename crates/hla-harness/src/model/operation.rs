//! Operations for model-based testing.
//!
//! Operations are generated randomly (through `arbitrary` or proptest) and
//! applied to both the model and the real federates. Federate and
//! attribute indices wrap around the world's size, so every generated
//! operation is applicable.

use arbitrary::Arbitrary;
use hla_proto::ErrorKind;

/// Federate index (0-based, wraps around the world's federate count).
pub type FederateId = u8;

/// Attribute index (0-based, wraps around the world's attribute count).
pub type AttributeId = u8;

/// One ownership service call on a single attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub struct Operation {
    /// Federate making the call.
    pub federate: FederateId,
    /// Attribute of the shared object it targets.
    pub attribute: AttributeId,
    /// The call.
    pub action: OwnershipAction,
}

/// The ownership services exercised by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum OwnershipAction {
    /// `unconditionalAttributeOwnershipDivestiture`.
    UnconditionalDivest,
    /// `negotiatedAttributeOwnershipDivestiture`.
    NegotiatedDivest,
    /// `confirmDivestiture`.
    ConfirmDivestiture,
    /// `cancelNegotiatedAttributeOwnershipDivestiture`.
    CancelNegotiatedDivestiture,
    /// `attributeOwnershipDivestitureIfWanted`.
    DivestIfWanted,
    /// `attributeOwnershipAcquisition`.
    Acquire,
    /// `attributeOwnershipAcquisitionIfAvailable`.
    AcquireIfAvailable,
    /// `attributeOwnershipReleaseResponse`.
    ReleaseResponse,
    /// `attributeOwnershipReleaseDenied`.
    ReleaseDenied,
    /// `cancelAttributeOwnershipAcquisition`.
    CancelAcquisition,
}

/// Result of applying an operation.
///
/// Used to compare model and real system behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// The call was accepted.
    Ok,

    /// The call was rejected.
    Error(OperationError),
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Check if operation failed.
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }
}

impl From<Result<(), OperationError>> for OperationResult {
    fn from(result: Result<(), OperationError>) -> Self {
        result.map_or_else(Self::Error, |()| Self::Ok)
    }
}

/// Rejections the model can predict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// The caller does not own the attribute.
    NotOwned,
    /// A negotiated divestiture is already pending.
    AlreadyBeingDivested,
    /// No negotiated divestiture is pending.
    DivestitureNotRequested,
    /// The caller already owns the attribute it asks for.
    OwnsAttribute,
    /// The caller already has an acquisition pending.
    AlreadyBeingAcquired,
    /// The caller owns the attribute whose acquisition it cancels.
    AlreadyOwned,
    /// The caller has no acquisition pending.
    AcquisitionNotRequested,
}

impl OperationError {
    /// The RTI error kind the real federate reports.
    pub fn kind(self) -> ErrorKind {
        match self {
            Self::NotOwned => ErrorKind::AttributeNotOwned,
            Self::AlreadyBeingDivested => ErrorKind::AttributeAlreadyBeingDivested,
            Self::DivestitureNotRequested => ErrorKind::AttributeDivestitureWasNotRequested,
            Self::OwnsAttribute => ErrorKind::FederateOwnsAttributes,
            Self::AlreadyBeingAcquired => ErrorKind::AttributeAlreadyBeingAcquired,
            Self::AlreadyOwned => ErrorKind::AttributeAlreadyOwned,
            Self::AcquisitionNotRequested => ErrorKind::AttributeAcquisitionWasNotRequested,
        }
    }

    /// Inverse of [`OperationError::kind`].
    pub fn from_kind(kind: ErrorKind) -> Option<Self> {
        Some(match kind {
            ErrorKind::AttributeNotOwned => Self::NotOwned,
            ErrorKind::AttributeAlreadyBeingDivested => Self::AlreadyBeingDivested,
            ErrorKind::AttributeDivestitureWasNotRequested => Self::DivestitureNotRequested,
            ErrorKind::FederateOwnsAttributes => Self::OwnsAttribute,
            ErrorKind::AttributeAlreadyBeingAcquired => Self::AlreadyBeingAcquired,
            ErrorKind::AttributeAlreadyOwned => Self::AlreadyOwned,
            ErrorKind::AttributeAcquisitionWasNotRequested => Self::AcquisitionNotRequested,
            _ => return None,
        })
    }
}
