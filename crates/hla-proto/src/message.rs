//! Messages exchanged across the federate/RTI boundary.
//!
//! A federate sends [`ServiceRequest`]s and receives one
//! [`ServiceResponse`] (or an [`RtiError`]) per request. Everything the RTI
//! initiates arrives later as a [`Callback`]. Services that can be answered
//! from federate-local state (`queryLogicalTime`, `decode*Handle`,
//! `isAttributeOwnedByFederate`, ...) never become requests.
//!
//! All three types encode to CBOR with [`encode`] / [`decode`].

use bytes::Bytes;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{
    error::{ErrorKind, RtiError},
    fom::FomModule,
    handle::{
        AttributeHandle, DimensionHandle, FederateHandle, InteractionClassHandle,
        ObjectClassHandle, ObjectInstanceHandle, ParameterHandle, RegionHandle,
    },
    handle_set::{AttributeHandleSet, DimensionHandleSet, FederateHandleSet, RegionHandleSet},
    retraction::MessageRetractionHandle,
    time::LogicalTime,
    types::{
        AdvanceKind, AdvisorySwitches, CallbackModel, FederateRestoreStatus, FederateSaveStatus,
        FederationExecutionInfo, OrderType, RangeBounds, ResignAction, RestoreFailureReason,
        SaveFailureReason, SyncPointFailureReason, TransportationType,
    },
    values::{AttributeValues, ParameterValues},
};

/// Service group, as in the HLA interface specification chapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceGroup {
    /// Connection, membership, synchronization, save and restore.
    FederationManagement,
    /// Publication and subscription.
    DeclarationManagement,
    /// Registration, updates, interactions and deletion.
    ObjectManagement,
    /// Attribute ownership transfer.
    OwnershipManagement,
    /// Time regulation, constraint and advance.
    TimeManagement,
    /// Regions.
    DataDistributionManagement,
    /// Name and handle lookup, advisory switches.
    Support,
}

/// Committed extents of one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionExtents {
    /// Region being committed.
    pub region: RegionHandle,
    /// Range per dimension.
    pub bounds: Vec<(DimensionHandle, RangeBounds)>,
}

/// Attributes associated with a set of regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRegions {
    /// Attributes.
    pub attributes: AttributeHandleSet,
    /// Regions they are associated with.
    pub regions: RegionHandleSet,
}

/// A call from a federate to the RTI.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: LogicalTime")]
pub enum ServiceRequest<T: LogicalTime> {
    // Federation management
    Connect { callback_model: CallbackModel },
    Disconnect,
    CreateFederationExecution { federation: String, modules: Vec<FomModule> },
    DestroyFederationExecution { federation: String },
    ListFederationExecutions,
    JoinFederationExecution { federate_name: Option<String>, federate_type: String, federation: String },
    ResignFederationExecution { action: ResignAction },
    RegisterFederationSynchronizationPoint { label: String, tag: Bytes, federates: Option<FederateHandleSet> },
    SynchronizationPointAchieved { label: String, successful: bool },
    RequestFederationSave { label: String, time: Option<T> },
    FederateSaveBegun,
    FederateSaveComplete,
    FederateSaveNotComplete,
    AbortFederationSave,
    QueryFederationSaveStatus,
    RequestFederationRestore { label: String },
    FederateRestoreComplete,
    FederateRestoreNotComplete,
    AbortFederationRestore,
    QueryFederationRestoreStatus,

    // Declaration management
    PublishObjectClassAttributes { class: ObjectClassHandle, attributes: AttributeHandleSet },
    UnpublishObjectClass { class: ObjectClassHandle },
    UnpublishObjectClassAttributes { class: ObjectClassHandle, attributes: AttributeHandleSet },
    PublishInteractionClass { class: InteractionClassHandle },
    UnpublishInteractionClass { class: InteractionClassHandle },
    SubscribeObjectClassAttributes {
        class: ObjectClassHandle,
        attributes: AttributeHandleSet,
        passive: bool,
        regions: RegionHandleSet,
    },
    UnsubscribeObjectClass { class: ObjectClassHandle },
    UnsubscribeObjectClassAttributes { class: ObjectClassHandle, attributes: AttributeHandleSet },
    UnsubscribeObjectClassAttributesWithRegions {
        class: ObjectClassHandle,
        attributes: AttributeHandleSet,
        regions: RegionHandleSet,
    },
    SubscribeInteractionClass { class: InteractionClassHandle, passive: bool, regions: RegionHandleSet },
    UnsubscribeInteractionClass { class: InteractionClassHandle },
    UnsubscribeInteractionClassWithRegions { class: InteractionClassHandle, regions: RegionHandleSet },

    // Object management
    ReserveObjectInstanceName { name: String },
    ReleaseObjectInstanceName { name: String },
    RegisterObjectInstance { class: ObjectClassHandle, name: Option<String>, regions: Vec<AttributeRegions> },
    UpdateAttributeValues { object: ObjectInstanceHandle, values: AttributeValues, tag: Bytes, time: Option<T> },
    SendInteraction {
        class: InteractionClassHandle,
        parameters: ParameterValues,
        tag: Bytes,
        time: Option<T>,
        regions: RegionHandleSet,
    },
    DeleteObjectInstance { object: ObjectInstanceHandle, tag: Bytes, time: Option<T> },
    LocalDeleteObjectInstance { object: ObjectInstanceHandle },
    RequestObjectAttributeValueUpdate { object: ObjectInstanceHandle, attributes: AttributeHandleSet, tag: Bytes },
    RequestClassAttributeValueUpdate {
        class: ObjectClassHandle,
        attributes: AttributeHandleSet,
        tag: Bytes,
        regions: RegionHandleSet,
    },

    // Ownership management
    UnconditionalAttributeOwnershipDivestiture { object: ObjectInstanceHandle, attributes: AttributeHandleSet },
    NegotiatedAttributeOwnershipDivestiture { object: ObjectInstanceHandle, attributes: AttributeHandleSet, tag: Bytes },
    ConfirmDivestiture { object: ObjectInstanceHandle, attributes: AttributeHandleSet, tag: Bytes },
    AttributeOwnershipDivestitureIfWanted { object: ObjectInstanceHandle, attributes: AttributeHandleSet },
    CancelNegotiatedAttributeOwnershipDivestiture { object: ObjectInstanceHandle, attributes: AttributeHandleSet },
    AttributeOwnershipAcquisition { object: ObjectInstanceHandle, attributes: AttributeHandleSet, tag: Bytes },
    AttributeOwnershipAcquisitionIfAvailable { object: ObjectInstanceHandle, attributes: AttributeHandleSet },
    AttributeOwnershipReleaseDenied { object: ObjectInstanceHandle, attributes: AttributeHandleSet },
    AttributeOwnershipReleaseResponse { object: ObjectInstanceHandle, attributes: AttributeHandleSet },
    CancelAttributeOwnershipAcquisition { object: ObjectInstanceHandle, attributes: AttributeHandleSet },
    QueryAttributeOwnership { object: ObjectInstanceHandle, attribute: AttributeHandle },

    // Time management
    EnableTimeRegulation { lookahead: T::Interval },
    DisableTimeRegulation,
    EnableTimeConstrained,
    DisableTimeConstrained,
    TimeAdvance { kind: AdvanceKind, time: T },
    EnableAsynchronousDelivery,
    DisableAsynchronousDelivery,
    QueryGalt,
    QueryLits,
    ModifyLookahead { lookahead: T::Interval },
    Retract { handle: MessageRetractionHandle },

    // Data distribution management
    CreateRegion { dimensions: DimensionHandleSet },
    CommitRegionModifications { regions: Vec<RegionExtents> },
    DeleteRegion { region: RegionHandle },
    AssociateRegionsForUpdates { object: ObjectInstanceHandle, associations: Vec<AttributeRegions> },
    UnassociateRegionsForUpdates { object: ObjectInstanceHandle, associations: Vec<AttributeRegions> },

    // Support services
    GetObjectClassHandle { name: String },
    GetObjectClassName { class: ObjectClassHandle },
    GetAttributeHandle { class: ObjectClassHandle, name: String },
    GetAttributeName { class: ObjectClassHandle, attribute: AttributeHandle },
    GetInteractionClassHandle { name: String },
    GetInteractionClassName { class: InteractionClassHandle },
    GetParameterHandle { class: InteractionClassHandle, name: String },
    GetParameterName { class: InteractionClassHandle, parameter: ParameterHandle },
    GetObjectInstanceHandle { name: String },
    GetObjectInstanceName { object: ObjectInstanceHandle },
    GetKnownObjectClassHandle { object: ObjectInstanceHandle },
    GetDimensionHandle { name: String },
    GetDimensionName { dimension: DimensionHandle },
    GetDimensionUpperBound { dimension: DimensionHandle },
    GetFederateHandle { name: String },
    GetFederateName { federate: FederateHandle },
    SetAdvisorySwitch { switch: AdvisorySwitches, enabled: bool },
}

impl<T: LogicalTime> ServiceRequest<T> {
    /// Service name as it appears in the HLA interface specification.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Disconnect => "disconnect",
            Self::CreateFederationExecution { .. } => "createFederationExecution",
            Self::DestroyFederationExecution { .. } => "destroyFederationExecution",
            Self::ListFederationExecutions => "listFederationExecutions",
            Self::JoinFederationExecution { .. } => "joinFederationExecution",
            Self::ResignFederationExecution { .. } => "resignFederationExecution",
            Self::RegisterFederationSynchronizationPoint { .. } => {
                "registerFederationSynchronizationPoint"
            },
            Self::SynchronizationPointAchieved { .. } => "synchronizationPointAchieved",
            Self::RequestFederationSave { .. } => "requestFederationSave",
            Self::FederateSaveBegun => "federateSaveBegun",
            Self::FederateSaveComplete => "federateSaveComplete",
            Self::FederateSaveNotComplete => "federateSaveNotComplete",
            Self::AbortFederationSave => "abortFederationSave",
            Self::QueryFederationSaveStatus => "queryFederationSaveStatus",
            Self::RequestFederationRestore { .. } => "requestFederationRestore",
            Self::FederateRestoreComplete => "federateRestoreComplete",
            Self::FederateRestoreNotComplete => "federateRestoreNotComplete",
            Self::AbortFederationRestore => "abortFederationRestore",
            Self::QueryFederationRestoreStatus => "queryFederationRestoreStatus",
            Self::PublishObjectClassAttributes { .. } => "publishObjectClassAttributes",
            Self::UnpublishObjectClass { .. } => "unpublishObjectClass",
            Self::UnpublishObjectClassAttributes { .. } => "unpublishObjectClassAttributes",
            Self::PublishInteractionClass { .. } => "publishInteractionClass",
            Self::UnpublishInteractionClass { .. } => "unpublishInteractionClass",
            Self::SubscribeObjectClassAttributes { .. } => "subscribeObjectClassAttributes",
            Self::UnsubscribeObjectClass { .. } => "unsubscribeObjectClass",
            Self::UnsubscribeObjectClassAttributes { .. } => "unsubscribeObjectClassAttributes",
            Self::UnsubscribeObjectClassAttributesWithRegions { .. } => {
                "unsubscribeObjectClassAttributesWithRegions"
            },
            Self::SubscribeInteractionClass { .. } => "subscribeInteractionClass",
            Self::UnsubscribeInteractionClass { .. } => "unsubscribeInteractionClass",
            Self::UnsubscribeInteractionClassWithRegions { .. } => {
                "unsubscribeInteractionClassWithRegions"
            },
            Self::ReserveObjectInstanceName { .. } => "reserveObjectInstanceName",
            Self::ReleaseObjectInstanceName { .. } => "releaseObjectInstanceName",
            Self::RegisterObjectInstance { .. } => "registerObjectInstance",
            Self::UpdateAttributeValues { .. } => "updateAttributeValues",
            Self::SendInteraction { .. } => "sendInteraction",
            Self::DeleteObjectInstance { .. } => "deleteObjectInstance",
            Self::LocalDeleteObjectInstance { .. } => "localDeleteObjectInstance",
            Self::RequestObjectAttributeValueUpdate { .. }
            | Self::RequestClassAttributeValueUpdate { .. } => "requestAttributeValueUpdate",
            Self::UnconditionalAttributeOwnershipDivestiture { .. } => {
                "unconditionalAttributeOwnershipDivestiture"
            },
            Self::NegotiatedAttributeOwnershipDivestiture { .. } => {
                "negotiatedAttributeOwnershipDivestiture"
            },
            Self::ConfirmDivestiture { .. } => "confirmDivestiture",
            Self::AttributeOwnershipDivestitureIfWanted { .. } => {
                "attributeOwnershipDivestitureIfWanted"
            },
            Self::CancelNegotiatedAttributeOwnershipDivestiture { .. } => {
                "cancelNegotiatedAttributeOwnershipDivestiture"
            },
            Self::AttributeOwnershipAcquisition { .. } => "attributeOwnershipAcquisition",
            Self::AttributeOwnershipAcquisitionIfAvailable { .. } => {
                "attributeOwnershipAcquisitionIfAvailable"
            },
            Self::AttributeOwnershipReleaseDenied { .. } => "attributeOwnershipReleaseDenied",
            Self::AttributeOwnershipReleaseResponse { .. } => "attributeOwnershipReleaseResponse",
            Self::CancelAttributeOwnershipAcquisition { .. } => {
                "cancelAttributeOwnershipAcquisition"
            },
            Self::QueryAttributeOwnership { .. } => "queryAttributeOwnership",
            Self::EnableTimeRegulation { .. } => "enableTimeRegulation",
            Self::DisableTimeRegulation => "disableTimeRegulation",
            Self::EnableTimeConstrained => "enableTimeConstrained",
            Self::DisableTimeConstrained => "disableTimeConstrained",
            Self::TimeAdvance { kind, .. } => match kind {
                AdvanceKind::TimeAdvance => "timeAdvanceRequest",
                AdvanceKind::TimeAdvanceAvailable => "timeAdvanceRequestAvailable",
                AdvanceKind::NextMessage => "nextMessageRequest",
                AdvanceKind::NextMessageAvailable => "nextMessageRequestAvailable",
                AdvanceKind::FlushQueue => "flushQueueRequest",
            },
            Self::EnableAsynchronousDelivery => "enableAsynchronousDelivery",
            Self::DisableAsynchronousDelivery => "disableAsynchronousDelivery",
            Self::QueryGalt => "queryGALT",
            Self::QueryLits => "queryLITS",
            Self::ModifyLookahead { .. } => "modifyLookahead",
            Self::Retract { .. } => "retract",
            Self::CreateRegion { .. } => "createRegion",
            Self::CommitRegionModifications { .. } => "commitRegionModifications",
            Self::DeleteRegion { .. } => "deleteRegion",
            Self::AssociateRegionsForUpdates { .. } => "associateRegionsForUpdates",
            Self::UnassociateRegionsForUpdates { .. } => "unassociateRegionsForUpdates",
            Self::GetObjectClassHandle { .. } => "getObjectClassHandle",
            Self::GetObjectClassName { .. } => "getObjectClassName",
            Self::GetAttributeHandle { .. } => "getAttributeHandle",
            Self::GetAttributeName { .. } => "getAttributeName",
            Self::GetInteractionClassHandle { .. } => "getInteractionClassHandle",
            Self::GetInteractionClassName { .. } => "getInteractionClassName",
            Self::GetParameterHandle { .. } => "getParameterHandle",
            Self::GetParameterName { .. } => "getParameterName",
            Self::GetObjectInstanceHandle { .. } => "getObjectInstanceHandle",
            Self::GetObjectInstanceName { .. } => "getObjectInstanceName",
            Self::GetKnownObjectClassHandle { .. } => "getKnownObjectClassHandle",
            Self::GetDimensionHandle { .. } => "getDimensionHandle",
            Self::GetDimensionName { .. } => "getDimensionName",
            Self::GetDimensionUpperBound { .. } => "getDimensionUpperBound",
            Self::GetFederateHandle { .. } => "getFederateHandle",
            Self::GetFederateName { .. } => "getFederateName",
            Self::SetAdvisorySwitch { enabled: true, .. } => "enableAdvisorySwitch",
            Self::SetAdvisorySwitch { enabled: false, .. } => "disableAdvisorySwitch",
        }
    }

    /// Group the service belongs to.
    pub fn group(&self) -> ServiceGroup {
        match self {
            Self::Connect { .. }
            | Self::Disconnect
            | Self::CreateFederationExecution { .. }
            | Self::DestroyFederationExecution { .. }
            | Self::ListFederationExecutions
            | Self::JoinFederationExecution { .. }
            | Self::ResignFederationExecution { .. }
            | Self::RegisterFederationSynchronizationPoint { .. }
            | Self::SynchronizationPointAchieved { .. }
            | Self::RequestFederationSave { .. }
            | Self::FederateSaveBegun
            | Self::FederateSaveComplete
            | Self::FederateSaveNotComplete
            | Self::AbortFederationSave
            | Self::QueryFederationSaveStatus
            | Self::RequestFederationRestore { .. }
            | Self::FederateRestoreComplete
            | Self::FederateRestoreNotComplete
            | Self::AbortFederationRestore
            | Self::QueryFederationRestoreStatus => ServiceGroup::FederationManagement,
            Self::PublishObjectClassAttributes { .. }
            | Self::UnpublishObjectClass { .. }
            | Self::UnpublishObjectClassAttributes { .. }
            | Self::PublishInteractionClass { .. }
            | Self::UnpublishInteractionClass { .. }
            | Self::SubscribeObjectClassAttributes { .. }
            | Self::UnsubscribeObjectClass { .. }
            | Self::UnsubscribeObjectClassAttributes { .. }
            | Self::UnsubscribeObjectClassAttributesWithRegions { .. }
            | Self::SubscribeInteractionClass { .. }
            | Self::UnsubscribeInteractionClass { .. }
            | Self::UnsubscribeInteractionClassWithRegions { .. } => {
                ServiceGroup::DeclarationManagement
            },
            Self::ReserveObjectInstanceName { .. }
            | Self::ReleaseObjectInstanceName { .. }
            | Self::RegisterObjectInstance { .. }
            | Self::UpdateAttributeValues { .. }
            | Self::SendInteraction { .. }
            | Self::DeleteObjectInstance { .. }
            | Self::LocalDeleteObjectInstance { .. }
            | Self::RequestObjectAttributeValueUpdate { .. }
            | Self::RequestClassAttributeValueUpdate { .. } => ServiceGroup::ObjectManagement,
            Self::UnconditionalAttributeOwnershipDivestiture { .. }
            | Self::NegotiatedAttributeOwnershipDivestiture { .. }
            | Self::ConfirmDivestiture { .. }
            | Self::AttributeOwnershipDivestitureIfWanted { .. }
            | Self::CancelNegotiatedAttributeOwnershipDivestiture { .. }
            | Self::AttributeOwnershipAcquisition { .. }
            | Self::AttributeOwnershipAcquisitionIfAvailable { .. }
            | Self::AttributeOwnershipReleaseDenied { .. }
            | Self::AttributeOwnershipReleaseResponse { .. }
            | Self::CancelAttributeOwnershipAcquisition { .. }
            | Self::QueryAttributeOwnership { .. } => ServiceGroup::OwnershipManagement,
            Self::EnableTimeRegulation { .. }
            | Self::DisableTimeRegulation
            | Self::EnableTimeConstrained
            | Self::DisableTimeConstrained
            | Self::TimeAdvance { .. }
            | Self::EnableAsynchronousDelivery
            | Self::DisableAsynchronousDelivery
            | Self::QueryGalt
            | Self::QueryLits
            | Self::ModifyLookahead { .. }
            | Self::Retract { .. } => ServiceGroup::TimeManagement,
            Self::CreateRegion { .. }
            | Self::CommitRegionModifications { .. }
            | Self::DeleteRegion { .. }
            | Self::AssociateRegionsForUpdates { .. }
            | Self::UnassociateRegionsForUpdates { .. } => ServiceGroup::DataDistributionManagement,
            Self::GetObjectClassHandle { .. }
            | Self::GetObjectClassName { .. }
            | Self::GetAttributeHandle { .. }
            | Self::GetAttributeName { .. }
            | Self::GetInteractionClassHandle { .. }
            | Self::GetInteractionClassName { .. }
            | Self::GetParameterHandle { .. }
            | Self::GetParameterName { .. }
            | Self::GetObjectInstanceHandle { .. }
            | Self::GetObjectInstanceName { .. }
            | Self::GetKnownObjectClassHandle { .. }
            | Self::GetDimensionHandle { .. }
            | Self::GetDimensionName { .. }
            | Self::GetDimensionUpperBound { .. }
            | Self::GetFederateHandle { .. }
            | Self::GetFederateName { .. }
            | Self::SetAdvisorySwitch { .. } => ServiceGroup::Support,
        }
    }

    /// Services that need no joined federation.
    pub fn is_outside_federation(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::Disconnect
                | Self::CreateFederationExecution { .. }
                | Self::DestroyFederationExecution { .. }
                | Self::ListFederationExecutions
                | Self::JoinFederationExecution { .. }
        )
    }

    /// Services still accepted while a save or restore is in progress.
    ///
    /// Save and restore phase services, queries, lookups and resignation
    /// remain available; everything that would change federation state
    /// does not.
    pub fn is_allowed_during_save_or_restore(&self) -> bool {
        matches!(
            self,
            Self::ResignFederationExecution { .. }
                | Self::FederateSaveBegun
                | Self::FederateSaveComplete
                | Self::FederateSaveNotComplete
                | Self::AbortFederationSave
                | Self::QueryFederationSaveStatus
                | Self::FederateRestoreComplete
                | Self::FederateRestoreNotComplete
                | Self::AbortFederationRestore
                | Self::QueryFederationRestoreStatus
                | Self::RequestFederationSave { .. }
                | Self::RequestFederationRestore { .. }
                | Self::QueryGalt
                | Self::QueryLits
        ) || (self.group() == ServiceGroup::Support
            && !matches!(self, Self::SetAdvisorySwitch { .. }))
    }
}

/// Successful result of a service request.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: LogicalTime")]
pub enum ServiceResponse<T: LogicalTime> {
    Ok,
    Federate(FederateHandle),
    ObjectInstance(ObjectInstanceHandle),
    ObjectClass(ObjectClassHandle),
    Attribute(AttributeHandle),
    InteractionClass(InteractionClassHandle),
    Parameter(ParameterHandle),
    Dimension(DimensionHandle),
    Region(RegionHandle),
    Attributes(AttributeHandleSet),
    Retraction(Option<MessageRetractionHandle>),
    Time(Option<T>),
    Name(String),
    UpperBound(u64),
}

macro_rules! response_accessors {
    ($( $(#[$meta:meta])* $fn_name:ident => $variant:ident($ty:ty); )*) => {
        impl<T: LogicalTime> ServiceResponse<T> {
            $(
                $(#[$meta])*
                ///
                /// # Errors
                ///
                /// `RTIinternalError` if the RTI answered with another variant.
                pub fn $fn_name(self) -> Result<$ty, RtiError> {
                    match self {
                        Self::$variant(v) => Ok(v),
                        other => Err(unexpected(stringify!($variant), &other)),
                    }
                }
            )*
        }
    };
}

fn unexpected<T: LogicalTime>(wanted: &str, got: &ServiceResponse<T>) -> RtiError {
    RtiError::internal(format!("expected {wanted} response, got {got:?}"))
}

impl<T: LogicalTime> ServiceResponse<T> {
    /// Expect [`ServiceResponse::Ok`].
    ///
    /// # Errors
    ///
    /// `RTIinternalError` if the RTI answered with another variant.
    pub fn into_unit(self) -> Result<(), RtiError> {
        match self {
            Self::Ok => Ok(()),
            other => Err(unexpected("Ok", &other)),
        }
    }
}

response_accessors! {
    /// Expect a federate handle.
    into_federate => Federate(FederateHandle);
    /// Expect an object instance handle.
    into_object_instance => ObjectInstance(ObjectInstanceHandle);
    /// Expect an object class handle.
    into_object_class => ObjectClass(ObjectClassHandle);
    /// Expect an attribute handle.
    into_attribute => Attribute(AttributeHandle);
    /// Expect an interaction class handle.
    into_interaction_class => InteractionClass(InteractionClassHandle);
    /// Expect a parameter handle.
    into_parameter => Parameter(ParameterHandle);
    /// Expect a dimension handle.
    into_dimension => Dimension(DimensionHandle);
    /// Expect a region handle.
    into_region => Region(RegionHandle);
    /// Expect an attribute handle set.
    into_attributes => Attributes(AttributeHandleSet);
    /// Expect an optional retraction handle.
    into_retraction => Retraction(Option<MessageRetractionHandle>);
    /// Expect an optional logical time.
    into_time => Time(Option<T>);
    /// Expect a name.
    into_name => Name(String);
    /// Expect a dimension upper bound.
    into_upper_bound => UpperBound(u64);
}

/// Delivery metadata of a reflected update, received interaction or
/// removed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "T: LogicalTime")]
pub struct MessageInfo<T: LogicalTime> {
    /// Order the message was delivered in.
    pub order: OrderType,
    /// Transport it was sent with.
    pub transportation: TransportationType,
    /// Timestamp, if the sender supplied one.
    pub time: Option<T>,
    /// Retraction handle of a timestamp-order message.
    pub retraction: Option<MessageRetractionHandle>,
    /// Sending federate.
    pub producer: FederateHandle,
    /// Regions of the sender that matched the receiver's subscription.
    pub sent_regions: RegionHandleSet,
}

/// A call from the RTI to a federate.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: LogicalTime")]
pub enum Callback<T: LogicalTime> {
    ConnectionLost { reason: String },
    ReportFederationExecutions { executions: Vec<FederationExecutionInfo> },
    SynchronizationPointRegistrationSucceeded { label: String },
    SynchronizationPointRegistrationFailed { label: String, reason: SyncPointFailureReason },
    AnnounceSynchronizationPoint { label: String, tag: Bytes },
    FederationSynchronized { label: String, failed: FederateHandleSet },
    InitiateFederateSave { label: String, time: Option<T> },
    FederationSaved,
    FederationNotSaved { reason: SaveFailureReason },
    FederationSaveStatusResponse { statuses: Vec<FederateSaveStatus> },
    RequestFederationRestoreSucceeded { label: String },
    RequestFederationRestoreFailed { label: String },
    FederationRestoreBegun,
    InitiateFederateRestore { label: String, federate_name: String, federate: FederateHandle },
    FederationRestored,
    FederationNotRestored { reason: RestoreFailureReason },
    FederationRestoreStatusResponse { statuses: Vec<FederateRestoreStatus> },
    StartRegistrationForObjectClass { class: ObjectClassHandle },
    StopRegistrationForObjectClass { class: ObjectClassHandle },
    TurnInteractionsOn { class: InteractionClassHandle },
    TurnInteractionsOff { class: InteractionClassHandle },
    ObjectInstanceNameReservationSucceeded { name: String },
    ObjectInstanceNameReservationFailed { name: String },
    DiscoverObjectInstance { object: ObjectInstanceHandle, class: ObjectClassHandle, name: String, producer: FederateHandle },
    ReflectAttributeValues { object: ObjectInstanceHandle, values: AttributeValues, tag: Bytes, info: MessageInfo<T> },
    ReceiveInteraction { class: InteractionClassHandle, parameters: ParameterValues, tag: Bytes, info: MessageInfo<T> },
    RemoveObjectInstance { object: ObjectInstanceHandle, tag: Bytes, info: MessageInfo<T> },
    AttributesInScope { object: ObjectInstanceHandle, attributes: AttributeHandleSet },
    AttributesOutOfScope { object: ObjectInstanceHandle, attributes: AttributeHandleSet },
    ProvideAttributeValueUpdate { object: ObjectInstanceHandle, attributes: AttributeHandleSet, tag: Bytes },
    TurnUpdatesOnForObjectInstance { object: ObjectInstanceHandle, attributes: AttributeHandleSet },
    TurnUpdatesOffForObjectInstance { object: ObjectInstanceHandle, attributes: AttributeHandleSet },
    RequestAttributeOwnershipAssumption { object: ObjectInstanceHandle, attributes: AttributeHandleSet, tag: Bytes },
    AttributeOwnershipDivestitureNotification { object: ObjectInstanceHandle, attributes: AttributeHandleSet },
    AttributeOwnershipAcquisitionNotification { object: ObjectInstanceHandle, attributes: AttributeHandleSet, tag: Bytes },
    AttributeOwnershipUnavailable { object: ObjectInstanceHandle, attributes: AttributeHandleSet },
    RequestAttributeOwnershipRelease { object: ObjectInstanceHandle, attributes: AttributeHandleSet, tag: Bytes },
    ConfirmAttributeOwnershipAcquisitionCancellation { object: ObjectInstanceHandle, attributes: AttributeHandleSet },
    InformAttributeOwnership { object: ObjectInstanceHandle, attribute: AttributeHandle, owner: FederateHandle },
    AttributeIsNotOwned { object: ObjectInstanceHandle, attribute: AttributeHandle },
    AttributeIsOwnedByRti { object: ObjectInstanceHandle, attribute: AttributeHandle },
    TimeRegulationEnabled { time: T },
    TimeConstrainedEnabled { time: T },
    TimeAdvanceGrant { time: T },
    RequestRetraction { handle: MessageRetractionHandle },
}

impl<T: LogicalTime> Callback<T> {
    /// Callback name as it appears in the HLA interface specification.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionLost { .. } => "connectionLost",
            Self::ReportFederationExecutions { .. } => "reportFederationExecutions",
            Self::SynchronizationPointRegistrationSucceeded { .. } => {
                "synchronizationPointRegistrationSucceeded"
            },
            Self::SynchronizationPointRegistrationFailed { .. } => {
                "synchronizationPointRegistrationFailed"
            },
            Self::AnnounceSynchronizationPoint { .. } => "announceSynchronizationPoint",
            Self::FederationSynchronized { .. } => "federationSynchronized",
            Self::InitiateFederateSave { .. } => "initiateFederateSave",
            Self::FederationSaved => "federationSaved",
            Self::FederationNotSaved { .. } => "federationNotSaved",
            Self::FederationSaveStatusResponse { .. } => "federationSaveStatusResponse",
            Self::RequestFederationRestoreSucceeded { .. } => "requestFederationRestoreSucceeded",
            Self::RequestFederationRestoreFailed { .. } => "requestFederationRestoreFailed",
            Self::FederationRestoreBegun => "federationRestoreBegun",
            Self::InitiateFederateRestore { .. } => "initiateFederateRestore",
            Self::FederationRestored => "federationRestored",
            Self::FederationNotRestored { .. } => "federationNotRestored",
            Self::FederationRestoreStatusResponse { .. } => "federationRestoreStatusResponse",
            Self::StartRegistrationForObjectClass { .. } => "startRegistrationForObjectClass",
            Self::StopRegistrationForObjectClass { .. } => "stopRegistrationForObjectClass",
            Self::TurnInteractionsOn { .. } => "turnInteractionsOn",
            Self::TurnInteractionsOff { .. } => "turnInteractionsOff",
            Self::ObjectInstanceNameReservationSucceeded { .. } => {
                "objectInstanceNameReservationSucceeded"
            },
            Self::ObjectInstanceNameReservationFailed { .. } => {
                "objectInstanceNameReservationFailed"
            },
            Self::DiscoverObjectInstance { .. } => "discoverObjectInstance",
            Self::ReflectAttributeValues { .. } => "reflectAttributeValues",
            Self::ReceiveInteraction { .. } => "receiveInteraction",
            Self::RemoveObjectInstance { .. } => "removeObjectInstance",
            Self::AttributesInScope { .. } => "attributesInScope",
            Self::AttributesOutOfScope { .. } => "attributesOutOfScope",
            Self::ProvideAttributeValueUpdate { .. } => "provideAttributeValueUpdate",
            Self::TurnUpdatesOnForObjectInstance { .. } => "turnUpdatesOnForObjectInstance",
            Self::TurnUpdatesOffForObjectInstance { .. } => "turnUpdatesOffForObjectInstance",
            Self::RequestAttributeOwnershipAssumption { .. } => {
                "requestAttributeOwnershipAssumption"
            },
            Self::AttributeOwnershipDivestitureNotification { .. } => {
                "attributeOwnershipDivestitureNotification"
            },
            Self::AttributeOwnershipAcquisitionNotification { .. } => {
                "attributeOwnershipAcquisitionNotification"
            },
            Self::AttributeOwnershipUnavailable { .. } => "attributeOwnershipUnavailable",
            Self::RequestAttributeOwnershipRelease { .. } => "requestAttributeOwnershipRelease",
            Self::ConfirmAttributeOwnershipAcquisitionCancellation { .. } => {
                "confirmAttributeOwnershipAcquisitionCancellation"
            },
            Self::InformAttributeOwnership { .. } => "informAttributeOwnership",
            Self::AttributeIsNotOwned { .. } => "attributeIsNotOwned",
            Self::AttributeIsOwnedByRti { .. } => "attributeIsOwnedByRTI",
            Self::TimeRegulationEnabled { .. } => "timeRegulationEnabled",
            Self::TimeConstrainedEnabled { .. } => "timeConstrainedEnabled",
            Self::TimeAdvanceGrant { .. } => "timeAdvanceGrant",
            Self::RequestRetraction { .. } => "requestRetraction",
        }
    }
}

/// Wire codec failure.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serialisation failed.
    #[error("encode failed: {0}")]
    Encode(String),

    /// The bytes are not a valid message.
    #[error("decode failed: {0}")]
    Decode(String),
}

impl From<CodecError> for RtiError {
    fn from(err: CodecError) -> Self {
        let kind = match err {
            CodecError::Encode(_) => ErrorKind::CouldNotEncode,
            CodecError::Decode(_) => ErrorKind::CouldNotDecode,
        };
        Self::new(kind, err.to_string())
    }
}

/// Encode a message to CBOR.
pub fn encode<M: Serialize>(message: &M) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Decode a CBOR message.
pub fn decode<M: DeserializeOwned>(bytes: &[u8]) -> Result<M, CodecError> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}
