//! The federate: every local state machine behind one phase guard.
//!
//! A service call goes through three steps:
//!
//! ```text
//! check(request) ──Forward──▶ RtiConnection::call ──Ok(response)──▶ record(request, response)
//!      │
//!      └──AlreadySatisfied──▶ answered locally, nothing sent
//! ```
//!
//! `check` rejects calls that are illegal from this federate's point of
//! view without touching state. `record` applies the transition once the
//! RTI has accepted the call. Transitions the RTI initiates arrive as
//! callbacks and go through [`Federate::apply_callback`].
//!
//! The phase guard applies in a fixed order: connection, membership, the
//! save/restore window, then the owning machine's own preconditions.

use std::collections::HashMap;

use hla_proto::{
    AdvisorySwitches, AttributeHandle, AttributeHandleSet, Callback, ErrorKind, FederateHandle,
    LogicalTime, ObjectInstanceHandle, RtiError, ServiceRequest, ServiceResponse,
};
use tracing::{debug, warn};

use crate::{
    membership::Membership,
    objects::{ObjectRegistry, default_object_name},
    ownership::OwnershipTable,
    regions::RegionRegistry,
    save_restore::SaveRestore,
    sync::{AchieveOutcome, SyncPoints},
    time::TimeState,
};

/// What to do with a request that passed [`Federate::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Send it to the RTI.
    Forward,
    /// Already satisfied locally; answer `Ok` without sending.
    AlreadySatisfied,
}

/// Federation state saved under a label on `federationSaved`.
#[derive(Debug, Clone)]
struct LocalSnapshot<T: LogicalTime> {
    sync: SyncPoints,
    time: TimeState<T>,
    ownership: OwnershipTable,
    objects: ObjectRegistry,
    regions: RegionRegistry,
    advisory: AdvisorySwitches,
}

/// Local view of one federate.
#[derive(Debug, Clone)]
pub struct Federate<T: LogicalTime> {
    membership: Membership,
    sync: SyncPoints,
    time: TimeState<T>,
    ownership: OwnershipTable,
    save_restore: SaveRestore,
    objects: ObjectRegistry,
    regions: RegionRegistry,
    advisory: AdvisorySwitches,
    snapshots: HashMap<String, LocalSnapshot<T>>,
    /// Handle held before the restore in progress renamed this federate.
    pre_restore: Option<FederateHandle>,
}

impl<T: LogicalTime> Default for Federate<T> {
    fn default() -> Self {
        Self {
            membership: Membership::default(),
            sync: SyncPoints::default(),
            time: TimeState::default(),
            ownership: OwnershipTable::default(),
            save_restore: SaveRestore::default(),
            objects: ObjectRegistry::default(),
            regions: RegionRegistry::default(),
            advisory: AdvisorySwitches::empty(),
            snapshots: HashMap::new(),
            pre_restore: None,
        }
    }
}

impl<T: LogicalTime> Federate<T> {
    /// Membership state.
    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    /// Synchronization points.
    pub fn sync_points(&self) -> &SyncPoints {
        &self.sync
    }

    /// Time state.
    pub fn time(&self) -> &TimeState<T> {
        &self.time
    }

    /// Attribute ownership.
    pub fn ownership(&self) -> &OwnershipTable {
        &self.ownership
    }

    /// Save/restore phases.
    pub fn save_restore(&self) -> &SaveRestore {
        &self.save_restore
    }

    /// Declarations and known objects.
    pub fn objects(&self) -> &ObjectRegistry {
        &self.objects
    }

    /// Regions created by this federate.
    pub fn regions(&self) -> &RegionRegistry {
        &self.regions
    }

    /// Advisory switches currently on.
    pub fn advisory_switches(&self) -> AdvisorySwitches {
        self.advisory
    }

    /// Handle of this federate while joined.
    pub fn handle(&self) -> Option<FederateHandle> {
        self.membership.federate()
    }

    /// Labels with a local snapshot.
    pub fn saved_labels(&self) -> impl Iterator<Item = &str> {
        self.snapshots.keys().map(String::as_str)
    }

    fn reset_federation_state(&mut self) {
        self.sync = SyncPoints::default();
        self.time = TimeState::default();
        self.ownership = OwnershipTable::default();
        self.save_restore = SaveRestore::default();
        self.objects = ObjectRegistry::default();
        self.regions = RegionRegistry::default();
        self.advisory = AdvisorySwitches::empty();
        self.snapshots.clear();
        self.pre_restore = None;
    }

    /// Joined, and not inside a save or restore window.
    ///
    /// Used by the local-only services that change federation state.
    pub fn check_service(&self, service: &str) -> Result<FederateHandle, RtiError> {
        let federate = self.membership.check_joined(service)?;
        self.check_window(service)?;
        Ok(federate)
    }

    fn check_window(&self, service: &str) -> Result<(), RtiError> {
        if let Some(label) = self.save_restore.save_label() {
            return Err(RtiError::new(
                ErrorKind::SaveInProgress,
                format!("{service} during save {label}"),
            ));
        }
        if self.save_restore.restore_in_progress() {
            return Err(RtiError::new(
                ErrorKind::RestoreInProgress,
                format!("{service} during restore"),
            ));
        }
        Ok(())
    }

    /// `queryLogicalTime`.
    pub fn query_logical_time(&self) -> Result<T, RtiError> {
        self.membership.check_joined("queryLogicalTime")?;
        Ok(self.time.current())
    }

    /// `queryLookahead`.
    pub fn query_lookahead(&self) -> Result<T::Interval, RtiError> {
        self.membership.check_joined("queryLookahead")?;
        self.time.query_lookahead()
    }

    /// `isAttributeOwnedByFederate`.
    pub fn is_attribute_owned_by_federate(
        &self,
        object: ObjectInstanceHandle,
        attribute: AttributeHandle,
    ) -> Result<bool, RtiError> {
        self.membership.check_joined("isAttributeOwnedByFederate")?;
        self.objects.check_known(object)?;
        Ok(self.ownership.is_owned(object, attribute))
    }

    /// `setRangeBounds`.
    pub fn set_range_bounds(
        &mut self,
        region: hla_proto::RegionHandle,
        dimension: hla_proto::DimensionHandle,
        bounds: hla_proto::RangeBounds,
    ) -> Result<(), RtiError> {
        self.check_service("setRangeBounds")?;
        self.regions.set_range_bounds(region, dimension, bounds)
    }

    /// Validate a service request against local state.
    pub fn check(&self, request: &ServiceRequest<T>) -> Result<Dispatch, RtiError> {
        use ServiceRequest as R;

        if let R::Connect { .. } = request {
            self.membership.check_connect()?;
            return Ok(Dispatch::Forward);
        }
        if request.is_outside_federation() {
            match request {
                R::Disconnect => self.membership.check_disconnect()?,
                R::JoinFederationExecution { .. } => self.membership.check_join()?,
                _ => self.membership.check_connected(request.name())?,
            }
            return Ok(Dispatch::Forward);
        }

        let federate = self.membership.check_joined(request.name())?;
        if !request.is_allowed_during_save_or_restore() {
            self.check_window(request.name())?;
        }

        match request {
            R::ResignFederationExecution { action } => {
                if !action.divests()
                    && !action.deletes_objects()
                    && let Some((object, attributes)) = self.ownership.owned().next()
                {
                    return Err(RtiError::new(
                        ErrorKind::FederateOwnsAttributes,
                        format!("resign with {action:?}: {object} still owns {attributes:?}"),
                    ));
                }
            },
            R::SynchronizationPointAchieved { label, .. } => {
                return match self.sync.check_achieve(label)? {
                    AchieveOutcome::Forward => Ok(Dispatch::Forward),
                    AchieveOutcome::AlreadyAchieved => Ok(Dispatch::AlreadySatisfied),
                };
            },
            R::RequestFederationSave { time, .. } => {
                self.save_restore.check_request()?;
                if let Some(time) = time {
                    self.time.check_save_time(*time)?;
                }
            },
            R::FederateSaveBegun => self.save_restore.check_save_begun()?,
            R::FederateSaveComplete | R::FederateSaveNotComplete => {
                self.save_restore.check_save_complete()?;
            },
            R::RequestFederationRestore { .. } => self.save_restore.check_request()?,
            R::FederateRestoreComplete | R::FederateRestoreNotComplete => {
                self.save_restore.check_restore_complete()?;
            },

            R::UnpublishObjectClass { class }
            | R::UnpublishObjectClassAttributes { class, .. } => {
                self.objects.check_class_published(*class)?;
            },
            R::UnpublishInteractionClass { class } => {
                self.objects.check_interaction_published(*class)?;
            },
            R::SubscribeObjectClassAttributes { regions, .. }
            | R::UnsubscribeObjectClassAttributesWithRegions { regions, .. }
            | R::SubscribeInteractionClass { regions, .. }
            | R::UnsubscribeInteractionClassWithRegions { regions, .. }
            | R::RequestClassAttributeValueUpdate { regions, .. } => {
                self.regions.check_owned(regions)?;
            },

            R::ReserveObjectInstanceName { name } => self.objects.check_reserve(name)?,
            R::ReleaseObjectInstanceName { name } => self.objects.check_release(name)?,
            R::RegisterObjectInstance { class, name, regions } => {
                self.objects.check_register(*class, name.as_deref())?;
                for association in regions {
                    self.regions.check_owned(&association.regions)?;
                }
            },
            R::UpdateAttributeValues { object, values, time, .. } => {
                self.objects.check_known(*object)?;
                let attributes: AttributeHandleSet = values.handles().collect();
                self.ownership.check_owned(*object, &attributes)?;
                if let Some(time) = time {
                    self.time.check_send_time(*time)?;
                }
            },
            R::SendInteraction { class, time, regions, .. } => {
                self.objects.check_interaction_published(*class)?;
                self.regions.check_owned(regions)?;
                if let Some(time) = time {
                    self.time.check_send_time(*time)?;
                }
            },
            R::DeleteObjectInstance { object, time, .. } => {
                self.objects.check_known(*object)?;
                if let Some(time) = time {
                    self.time.check_send_time(*time)?;
                }
            },
            R::LocalDeleteObjectInstance { object } => {
                self.objects.check_known(*object)?;
                if self.ownership.owns_any_of(*object) {
                    return Err(RtiError::new(
                        ErrorKind::FederateOwnsAttributes,
                        format!("local delete of {object}"),
                    ));
                }
            },
            R::RequestObjectAttributeValueUpdate { object, .. }
            | R::QueryAttributeOwnership { object, .. } => {
                self.objects.check_known(*object)?;
            },

            R::UnconditionalAttributeOwnershipDivestiture { object, attributes }
            | R::AttributeOwnershipDivestitureIfWanted { object, attributes }
            | R::AttributeOwnershipReleaseDenied { object, attributes }
            | R::AttributeOwnershipReleaseResponse { object, attributes } => {
                self.objects.check_known(*object)?;
                self.ownership.check_owned(*object, attributes)?;
            },
            R::NegotiatedAttributeOwnershipDivestiture { object, attributes, .. } => {
                self.objects.check_known(*object)?;
                self.ownership.check_negotiated_divestiture(*object, attributes)?;
            },
            R::ConfirmDivestiture { object, attributes, .. }
            | R::CancelNegotiatedAttributeOwnershipDivestiture { object, attributes } => {
                self.objects.check_known(*object)?;
                self.ownership.check_divesting(*object, attributes)?;
            },
            R::AttributeOwnershipAcquisition { object, attributes, .. }
            | R::AttributeOwnershipAcquisitionIfAvailable { object, attributes } => {
                self.objects.check_acquisition(*object, attributes)?;
                self.ownership.check_acquisition(*object, attributes)?;
            },
            R::CancelAttributeOwnershipAcquisition { object, attributes } => {
                self.objects.check_known(*object)?;
                self.ownership.check_cancel_acquisition(*object, attributes)?;
            },

            R::EnableTimeRegulation { lookahead } => {
                self.time.check_enable_regulation(*lookahead)?;
            },
            R::DisableTimeRegulation => self.time.check_disable_regulation()?,
            R::EnableTimeConstrained => self.time.check_enable_constrained()?,
            R::DisableTimeConstrained => self.time.check_disable_constrained()?,
            R::TimeAdvance { kind, time } => self.time.check_advance(*kind, *time)?,
            R::EnableAsynchronousDelivery => self.time.check_asynchronous_delivery(true)?,
            R::DisableAsynchronousDelivery => self.time.check_asynchronous_delivery(false)?,
            R::ModifyLookahead { lookahead } => self.time.check_modify_lookahead(*lookahead)?,
            R::Retract { handle } => {
                if handle.federate() != federate {
                    return Err(RtiError::new(
                        ErrorKind::InvalidMessageRetractionHandle,
                        format!("{handle} was not sent by {federate}"),
                    ));
                }
            },

            R::CommitRegionModifications { regions } => {
                let handles = regions.iter().map(|extents| extents.region).collect();
                self.regions.check_owned(&handles)?;
            },
            R::DeleteRegion { region } => {
                self.regions.check_owned(&std::iter::once(*region).collect())?;
            },
            R::AssociateRegionsForUpdates { object, associations }
            | R::UnassociateRegionsForUpdates { object, associations } => {
                self.objects.check_known(*object)?;
                for association in associations {
                    self.regions.check_owned(&association.regions)?;
                }
            },

            R::SetAdvisorySwitch { switch, enabled } => {
                if self.advisory.contains(*switch) == *enabled {
                    return Err(RtiError::new(
                        switch.redundant_error(*enabled),
                        request.name().to_string(),
                    ));
                }
            },

            _ => {},
        }
        Ok(Dispatch::Forward)
    }

    /// Apply the transition of a request the RTI accepted.
    pub fn record(
        &mut self,
        request: &ServiceRequest<T>,
        response: &ServiceResponse<T>,
    ) -> Result<(), RtiError> {
        use ServiceRequest as R;

        match request {
            R::Connect { callback_model } => self.membership.connected(*callback_model),
            R::Disconnect => {
                self.membership.disconnected();
                self.reset_federation_state();
            },
            R::JoinFederationExecution { federate_type, federation, .. } => {
                let ServiceResponse::Federate(federate) = response else {
                    return Err(unexpected(request, response));
                };
                self.reset_federation_state();
                self.advisory = AdvisorySwitches::join_defaults();
                self.membership.joined(*federate, federation.clone(), federate_type.clone());
            },
            R::ResignFederationExecution { .. } => {
                self.membership.resigned();
                self.reset_federation_state();
            },
            R::RegisterFederationSynchronizationPoint { label, .. } => {
                self.sync.registration_sent(label);
            },
            R::SynchronizationPointAchieved { label, .. } => self.sync.achieved(label),
            R::FederateSaveBegun => self.save_restore.save_begun(),
            R::FederateSaveComplete => self.save_restore.save_reported(true),
            R::FederateSaveNotComplete => self.save_restore.save_reported(false),
            R::FederateRestoreComplete => self.save_restore.restore_reported(true),
            R::FederateRestoreNotComplete => self.save_restore.restore_reported(false),

            R::PublishObjectClassAttributes { class, attributes } => {
                self.objects.published(*class, attributes);
            },
            R::UnpublishObjectClass { class } => self.objects.unpublished(*class),
            R::UnpublishObjectClassAttributes { class, attributes } => {
                self.objects.unpublished_attributes(*class, attributes);
            },
            R::PublishInteractionClass { class } => self.objects.interaction_published(*class),
            R::UnpublishInteractionClass { class } => self.objects.interaction_unpublished(*class),
            R::SubscribeObjectClassAttributes { class, attributes, .. } => {
                self.objects.subscribed(*class, attributes);
            },
            R::UnsubscribeObjectClass { class } => self.objects.unsubscribed(*class),
            R::UnsubscribeObjectClassAttributes { class, attributes } => {
                self.objects.unsubscribed_attributes(*class, attributes);
            },
            R::SubscribeInteractionClass { class, .. } => self.objects.interaction_subscribed(*class),
            R::UnsubscribeInteractionClass { class } => {
                self.objects.interaction_unsubscribed(*class);
            },

            R::ReserveObjectInstanceName { name } => self.objects.reservation_requested(name),
            R::ReleaseObjectInstanceName { name } => self.objects.name_released(name),
            R::RegisterObjectInstance { class, name, .. } => {
                let ServiceResponse::ObjectInstance(object) = response else {
                    return Err(unexpected(request, response));
                };
                let name = name.clone().unwrap_or_else(|| default_object_name(*object));
                let owned = self.objects.published_attributes(*class).cloned().unwrap_or_default();
                self.objects.registered(*object, *class, name);
                self.ownership.registered(*object, &owned);
            },
            R::DeleteObjectInstance { object, .. } | R::LocalDeleteObjectInstance { object } => {
                self.objects.forget(*object);
                self.ownership.forget(*object);
            },

            R::UnconditionalAttributeOwnershipDivestiture { object, attributes }
            | R::ConfirmDivestiture { object, attributes, .. } => {
                self.ownership.released(*object, attributes);
            },
            R::AttributeOwnershipDivestitureIfWanted { object, .. }
            | R::AttributeOwnershipReleaseResponse { object, .. } => {
                let ServiceResponse::Attributes(released) = response else {
                    return Err(unexpected(request, response));
                };
                self.ownership.released(*object, released);
            },
            R::NegotiatedAttributeOwnershipDivestiture { object, attributes, .. } => {
                self.ownership.divesting(*object, attributes);
            },
            R::CancelNegotiatedAttributeOwnershipDivestiture { object, attributes } => {
                self.ownership.divestiture_cancelled(*object, attributes);
            },
            R::AttributeOwnershipAcquisition { object, attributes, .. }
            | R::AttributeOwnershipAcquisitionIfAvailable { object, attributes } => {
                self.ownership.acquiring(*object, attributes);
            },

            R::EnableTimeRegulation { lookahead } => self.time.regulation_requested(*lookahead),
            R::DisableTimeRegulation => self.time.regulation_disabled(),
            R::EnableTimeConstrained => self.time.constrained_requested(),
            R::DisableTimeConstrained => self.time.constrained_disabled(),
            R::TimeAdvance { kind, time } => self.time.advance_requested(*kind, *time),
            R::EnableAsynchronousDelivery => self.time.set_asynchronous_delivery(true),
            R::DisableAsynchronousDelivery => self.time.set_asynchronous_delivery(false),
            R::ModifyLookahead { lookahead } => self.time.lookahead_modified(*lookahead),

            R::CreateRegion { dimensions } => {
                let ServiceResponse::Region(region) = response else {
                    return Err(unexpected(request, response));
                };
                self.regions.created(*region, dimensions.clone());
            },
            R::CommitRegionModifications { regions } => {
                let handles = regions.iter().map(|extents| extents.region).collect();
                self.regions.committed_all(&handles);
            },
            R::DeleteRegion { region } => self.regions.deleted(*region),

            R::SetAdvisorySwitch { switch, enabled } => self.advisory.set(*switch, *enabled),

            _ => {},
        }
        Ok(())
    }

    /// Apply a callback from the RTI.
    ///
    /// An error means the callback contradicts local state. The caller
    /// should drop it rather than hand it to the application.
    pub fn apply_callback(&mut self, callback: &Callback<T>) -> Result<(), RtiError> {
        use Callback as C;

        match callback {
            C::ConnectionLost { reason } => {
                warn!(%reason, "connection lost");
                self.membership.disconnected();
                self.reset_federation_state();
                return Ok(());
            },
            C::ReportFederationExecutions { .. } => {
                return self.membership.check_connected(callback.name());
            },
            _ => {},
        }
        self.membership.check_joined(callback.name())?;

        match callback {
            C::SynchronizationPointRegistrationSucceeded { label }
            | C::SynchronizationPointRegistrationFailed { label, .. } => {
                self.sync.registration_resolved(label);
            },
            C::AnnounceSynchronizationPoint { label, tag } => self.sync.announce(label, tag.clone()),
            C::FederationSynchronized { label, .. } => self.sync.synchronized(label)?,

            C::InitiateFederateSave { label, .. } => self.save_restore.save_initiated(label),
            C::FederationSaved => {
                if let Some(label) = self.save_restore.save_concluded() {
                    let snapshot = self.snapshot();
                    self.snapshots.insert(label, snapshot);
                }
            },
            C::FederationNotSaved { .. } => {
                self.save_restore.save_concluded();
            },
            C::FederationRestoreBegun => self.save_restore.restore_begun(),
            C::InitiateFederateRestore { label, federate, .. } => {
                self.save_restore.restore_initiated(label);
                self.pre_restore = self.pre_restore.or(self.membership.federate());
                self.membership.rehandled(*federate);
            },
            C::FederationRestored => {
                self.pre_restore = None;
                if let Some(label) = self.save_restore.restore_concluded() {
                    self.reinstate(&label);
                }
            },
            C::FederationNotRestored { .. } => {
                self.save_restore.restore_concluded();
                if let Some(previous) = self.pre_restore.take() {
                    self.membership.rehandled(previous);
                }
            },

            C::StartRegistrationForObjectClass { class } => {
                self.objects.registration_advice(*class, true);
            },
            C::StopRegistrationForObjectClass { class } => {
                self.objects.registration_advice(*class, false);
            },
            C::TurnInteractionsOn { class } => self.objects.interaction_advice(*class, true),
            C::TurnInteractionsOff { class } => self.objects.interaction_advice(*class, false),
            C::ObjectInstanceNameReservationSucceeded { name } => {
                self.objects.reservation_resolved(name, true);
            },
            C::ObjectInstanceNameReservationFailed { name } => {
                self.objects.reservation_resolved(name, false);
            },
            C::DiscoverObjectInstance { object, class, name, .. } => {
                self.objects.discovered(*object, *class, name.clone());
            },
            C::RemoveObjectInstance { object, .. } => {
                self.objects.check_known(*object)?;
                self.objects.forget(*object);
                self.ownership.forget(*object);
            },
            C::ReflectAttributeValues { object, .. }
            | C::AttributesInScope { object, .. }
            | C::AttributesOutOfScope { object, .. }
            | C::ProvideAttributeValueUpdate { object, .. }
            | C::RequestAttributeOwnershipAssumption { object, .. }
            | C::RequestAttributeOwnershipRelease { object, .. }
            | C::InformAttributeOwnership { object, .. }
            | C::AttributeIsNotOwned { object, .. }
            | C::AttributeIsOwnedByRti { object, .. } => {
                self.objects.check_known(*object)?;
            },
            C::TurnUpdatesOnForObjectInstance { object, attributes } => {
                self.objects.check_known(*object)?;
                self.objects.update_advice(*object, attributes, true);
            },
            C::TurnUpdatesOffForObjectInstance { object, attributes } => {
                self.objects.check_known(*object)?;
                self.objects.update_advice(*object, attributes, false);
            },

            C::AttributeOwnershipDivestitureNotification { object, attributes } => {
                self.ownership.released(*object, attributes);
            },
            C::AttributeOwnershipAcquisitionNotification { object, attributes, .. } => {
                self.objects.check_known(*object)?;
                self.ownership.acquired(*object, attributes);
            },
            C::AttributeOwnershipUnavailable { object, attributes }
            | C::ConfirmAttributeOwnershipAcquisitionCancellation { object, attributes } => {
                self.ownership.acquisition_ended(*object, attributes);
            },

            C::TimeRegulationEnabled { time } => self.time.regulation_enabled(*time)?,
            C::TimeConstrainedEnabled { time } => self.time.constrained_enabled(*time)?,
            C::TimeAdvanceGrant { time } => self.time.granted(*time)?,

            _ => {},
        }
        Ok(())
    }

    fn snapshot(&self) -> LocalSnapshot<T> {
        LocalSnapshot {
            sync: self.sync.clone(),
            time: self.time.clone(),
            ownership: self.ownership.clone(),
            objects: self.objects.clone(),
            regions: self.regions.clone(),
            advisory: self.advisory,
        }
    }

    fn reinstate(&mut self, label: &str) {
        let Some(snapshot) = self.snapshots.get(label).cloned() else {
            warn!(label, "restored a save this federate holds no snapshot of");
            return;
        };
        debug!(label, "local state restored");
        self.sync = snapshot.sync;
        self.time = snapshot.time;
        self.ownership = snapshot.ownership;
        self.objects = snapshot.objects;
        self.regions = snapshot.regions;
        self.advisory = snapshot.advisory;
    }
}

fn unexpected<T: LogicalTime>(
    request: &ServiceRequest<T>,
    response: &ServiceResponse<T>,
) -> RtiError {
    RtiError::internal(format!("{} answered with {response:?}", request.name()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bytes::Bytes;
    use hla_proto::{
        AdvanceKind, CallbackModel, Float64Interval, Float64Time, Handle, MessageRetractionHandle,
        ObjectClassHandle, ResignAction, RestoreFailureReason, SaveFailureReason,
    };

    use super::*;

    type Fed = Federate<Float64Time>;
    type Req = ServiceRequest<Float64Time>;

    fn t(v: f64) -> Float64Time {
        Float64Time::new(v).unwrap()
    }

    fn attrs(raw: &[u32]) -> AttributeHandleSet {
        raw.iter().map(|r| AttributeHandle::from_raw(*r)).collect()
    }

    fn send(fed: &mut Fed, request: Req, response: ServiceResponse<Float64Time>) {
        assert_eq!(fed.check(&request).unwrap(), Dispatch::Forward);
        fed.record(&request, &response).unwrap();
    }

    fn joined() -> Fed {
        let mut fed = Fed::default();
        send(&mut fed, Req::Connect { callback_model: CallbackModel::Evoked }, ServiceResponse::Ok);
        send(
            &mut fed,
            Req::JoinFederationExecution {
                federate_name: Some("alpha".into()),
                federate_type: "test".into(),
                federation: "fed".into(),
            },
            ServiceResponse::Federate(FederateHandle::from_raw(1)),
        );
        fed
    }

    fn with_object(fed: &mut Fed) -> ObjectInstanceHandle {
        let class = ObjectClassHandle::from_raw(1);
        send(
            fed,
            Req::PublishObjectClassAttributes { class, attributes: attrs(&[1, 2]) },
            ServiceResponse::Ok,
        );
        let object = ObjectInstanceHandle::from_raw(10);
        send(
            fed,
            Req::RegisterObjectInstance { class, name: None, regions: Vec::new() },
            ServiceResponse::ObjectInstance(object),
        );
        object
    }

    #[test]
    fn phase_guard_order() {
        let fed = Fed::default();
        assert_eq!(
            fed.check(&Req::EnableTimeConstrained).unwrap_err().kind,
            ErrorKind::NotConnected
        );
        let mut fed = Fed::default();
        send(&mut fed, Req::Connect { callback_model: CallbackModel::Evoked }, ServiceResponse::Ok);
        assert_eq!(
            fed.check(&Req::EnableTimeConstrained).unwrap_err().kind,
            ErrorKind::FederateNotExecutionMember
        );
        fed.check(&Req::ListFederationExecutions).unwrap();
    }

    #[test]
    fn save_window_rejects_federation_services() {
        let mut fed = joined();
        fed.apply_callback(&Callback::InitiateFederateSave { label: "S1".into(), time: None })
            .unwrap();
        let err = fed.check(&Req::EnableTimeConstrained).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"SaveInProgress: enableTimeConstrained during save S1");
        assert_eq!(
            fed.check(&Req::RequestFederationSave { label: "S2".into(), time: None })
                .unwrap_err()
                .kind,
            ErrorKind::SaveInProgress
        );
        fed.check(&Req::QueryGalt).unwrap();
        fed.check(&Req::ResignFederationExecution { action: ResignAction::NoAction }).unwrap();

        send(&mut fed, Req::FederateSaveBegun, ServiceResponse::Ok);
        send(&mut fed, Req::FederateSaveComplete, ServiceResponse::Ok);
        fed.apply_callback(&Callback::FederationSaved).unwrap();
        fed.check(&Req::EnableTimeConstrained).unwrap();
        assert_eq!(fed.saved_labels().collect::<Vec<_>>(), vec!["S1"]);
    }

    #[test]
    fn registering_owns_published_attributes() {
        let mut fed = joined();
        let object = with_object(&mut fed);
        assert!(fed.is_attribute_owned_by_federate(object, AttributeHandle::from_raw(1)).unwrap());
        assert!(!fed.is_attribute_owned_by_federate(object, AttributeHandle::from_raw(3)).unwrap());
        assert_eq!(fed.objects().object(object).unwrap().name, "HLAobject_10");
        assert_eq!(
            fed.is_attribute_owned_by_federate(
                ObjectInstanceHandle::from_raw(99),
                AttributeHandle::from_raw(1)
            )
            .unwrap_err()
            .kind,
            ErrorKind::ObjectInstanceNotKnown
        );
    }

    #[test]
    fn resign_without_action_needs_no_owned_attributes() {
        let mut fed = joined();
        let object = with_object(&mut fed);
        let err = fed.check(&Req::ResignFederationExecution { action: ResignAction::NoAction }).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FederateOwnsAttributes);
        assert!(err.message.contains(&object.to_string()));
        send(
            &mut fed,
            Req::ResignFederationExecution { action: ResignAction::DeleteObjectsThenDivest },
            ServiceResponse::Ok,
        );
        assert!(!fed.membership().is_joined());
        assert!(!fed.ownership().owns_any());
    }

    #[test]
    fn resign_is_allowed_once_everything_is_divested() {
        let mut fed = joined();
        let object = with_object(&mut fed);
        send(
            &mut fed,
            Req::UnconditionalAttributeOwnershipDivestiture { object, attributes: attrs(&[1]) },
            ServiceResponse::Ok,
        );
        let err = fed.check(&Req::ResignFederationExecution { action: ResignAction::NoAction }).unwrap_err();
        assert!(err.message.contains(&format!("{:?}", attrs(&[2]))));

        send(
            &mut fed,
            Req::UnconditionalAttributeOwnershipDivestiture { object, attributes: attrs(&[2]) },
            ServiceResponse::Ok,
        );
        send(&mut fed, Req::ResignFederationExecution { action: ResignAction::NoAction }, ServiceResponse::Ok);
        assert!(!fed.membership().is_joined());
    }

    #[test]
    fn achieved_twice_is_answered_locally() {
        let mut fed = joined();
        fed.apply_callback(&Callback::AnnounceSynchronizationPoint {
            label: "ready".into(),
            tag: Bytes::new(),
        })
        .unwrap();
        let achieve = Req::SynchronizationPointAchieved { label: "ready".into(), successful: true };
        send(&mut fed, achieve.clone(), ServiceResponse::Ok);
        assert_eq!(fed.check(&achieve).unwrap(), Dispatch::AlreadySatisfied);
    }

    #[test]
    fn retracting_someone_elses_message_is_rejected() {
        let fed = joined();
        let handle = MessageRetractionHandle::new(1, FederateHandle::from_raw(2));
        assert_eq!(
            fed.check(&Req::Retract { handle }).unwrap_err().kind,
            ErrorKind::InvalidMessageRetractionHandle
        );
    }

    #[test]
    fn timestamped_update_respects_lookahead() {
        let mut fed = joined();
        let object = with_object(&mut fed);
        send(
            &mut fed,
            Req::EnableTimeRegulation { lookahead: Float64Interval::new(2.0).unwrap() },
            ServiceResponse::Ok,
        );
        fed.apply_callback(&Callback::TimeRegulationEnabled { time: t(0.0) }).unwrap();

        let mut values = hla_proto::AttributeValues::new();
        values.add_copied(AttributeHandle::from_raw(1), b"x").unwrap();
        let update = |time| Req::UpdateAttributeValues {
            object,
            values: values.clone(),
            tag: Bytes::new(),
            time: Some(t(time)),
        };
        assert_eq!(fed.check(&update(1.0)).unwrap_err().kind, ErrorKind::InvalidLogicalTime);
        fed.check(&update(2.0)).unwrap();
    }

    #[test]
    fn grant_outside_request_is_rejected() {
        let mut fed = joined();
        send(
            &mut fed,
            Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(5.0) },
            ServiceResponse::Ok,
        );
        assert!(fed.apply_callback(&Callback::TimeAdvanceGrant { time: t(6.0) }).is_err());
        fed.apply_callback(&Callback::TimeAdvanceGrant { time: t(5.0) }).unwrap();
        assert_eq!(fed.query_logical_time().unwrap(), t(5.0));
    }

    #[test]
    fn restore_reinstates_snapshot() {
        let mut fed = joined();
        let object = with_object(&mut fed);
        fed.apply_callback(&Callback::InitiateFederateSave { label: "S1".into(), time: None })
            .unwrap();
        send(&mut fed, Req::FederateSaveBegun, ServiceResponse::Ok);
        send(&mut fed, Req::FederateSaveComplete, ServiceResponse::Ok);
        fed.apply_callback(&Callback::FederationSaved).unwrap();

        send(
            &mut fed,
            Req::UnconditionalAttributeOwnershipDivestiture { object, attributes: attrs(&[1, 2]) },
            ServiceResponse::Ok,
        );
        assert!(!fed.ownership().owns_any());

        fed.apply_callback(&Callback::FederationRestoreBegun).unwrap();
        fed.apply_callback(&Callback::InitiateFederateRestore {
            label: "S1".into(),
            federate_name: "alpha".into(),
            federate: FederateHandle::from_raw(1),
        })
        .unwrap();
        send(&mut fed, Req::FederateRestoreComplete, ServiceResponse::Ok);
        fed.apply_callback(&Callback::FederationRestored).unwrap();
        assert!(fed.ownership().owns_any_of(object));
    }

    #[test]
    fn failed_restore_gives_back_the_old_handle() {
        let mut fed = joined();
        fed.apply_callback(&Callback::FederationRestoreBegun).unwrap();
        fed.apply_callback(&Callback::InitiateFederateRestore {
            label: "S1".into(),
            federate_name: "alpha".into(),
            federate: FederateHandle::from_raw(7),
        })
        .unwrap();
        assert_eq!(fed.membership().federate(), Some(FederateHandle::from_raw(7)));

        send(&mut fed, Req::FederateRestoreNotComplete, ServiceResponse::Ok);
        fed.apply_callback(&Callback::FederationNotRestored {
            reason: RestoreFailureReason::FederateReportedFailure,
        })
        .unwrap();
        assert_eq!(fed.membership().federate(), Some(FederateHandle::from_raw(1)));
        assert!(!fed.save_restore().restore_in_progress());
    }

    #[test]
    fn failed_save_keeps_no_snapshot() {
        let mut fed = joined();
        fed.apply_callback(&Callback::InitiateFederateSave { label: "S1".into(), time: None })
            .unwrap();
        fed.apply_callback(&Callback::FederationNotSaved { reason: SaveFailureReason::SaveAborted })
            .unwrap();
        assert_eq!(fed.saved_labels().count(), 0);
        assert!(!fed.save_restore().save_in_progress());
    }

    #[test]
    fn callbacks_after_resign_are_rejected() {
        let mut fed = joined();
        send(
            &mut fed,
            Req::ResignFederationExecution { action: ResignAction::NoAction },
            ServiceResponse::Ok,
        );
        assert_eq!(
            fed.apply_callback(&Callback::TimeAdvanceGrant { time: t(1.0) }).unwrap_err().kind,
            ErrorKind::FederateNotExecutionMember
        );
    }

    #[test]
    fn advisory_switch_toggles() {
        let mut fed = joined();
        let switch = AdvisorySwitches::OBJECT_CLASS_RELEVANCE;
        assert_eq!(
            fed.check(&Req::SetAdvisorySwitch { switch, enabled: true }).unwrap_err().kind,
            ErrorKind::ObjectClassRelevanceAdvisorySwitchIsOn
        );
        send(&mut fed, Req::SetAdvisorySwitch { switch, enabled: false }, ServiceResponse::Ok);
        assert!(!fed.advisory_switches().contains(switch));
    }
}
