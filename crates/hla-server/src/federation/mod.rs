//! One federation execution.
//!
//! This is the authoritative view every federate's local state has to
//! agree with. Requests arrive already attributed to a joined federate.
//! Each handler validates before it mutates, so a rejected request leaves
//! no trace. Callbacks produced along the way collect in an outbox that
//! the server drains after every request.
//!
//! ## Architecture
//!
//! ```text
//! Federation::handle(federate, request)
//!   ├─ membership / sync points   (this module, sync)
//!   ├─ declarations + advisories  (declarations)
//!   ├─ objects and messages       (objects)
//!   ├─ ownership transfers        (ownership)
//!   ├─ logical time and queues    (time)
//!   ├─ regions                    (regions)
//!   └─ save / restore             (save_restore)
//!        │
//!        └──▶ outbox: Vec<Delivery>
//! ```
//!
//! Time grants and advisory notifications are recomputed after every
//! request rather than tracked incrementally.

mod declarations;
mod objects;
mod ownership;
mod regions;
mod save_restore;
mod sync;
mod time;

use std::collections::BTreeMap;

use bytes::Bytes;
use hla_proto::{
    AdvisorySwitches, AttributeHandle, Callback, ErrorKind, FederateHandle, Handle, LogicalTime,
    MessageRetractionHandle, ObjectClassHandle, ObjectInstanceHandle, RegionHandle, ResignAction,
    RtiError, ServiceRequest, ServiceResponse,
};
use tracing::{debug, info};

pub use self::objects::Owner;
use self::{
    declarations::{Advice, Declarations},
    objects::ObjectInstance,
    regions::Region,
    save_restore::{RestoreSession, SaveSession, Snapshot},
    sync::SyncPoint,
    time::{FederateTime, SentMessage},
};
use crate::{object_model::ObjectModel, server::ConnectionId};

/// A callback addressed to one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery<T: LogicalTime> {
    /// Receiving connection.
    pub connection: ConnectionId,
    /// The callback.
    pub callback: Callback<T>,
}

#[derive(Debug, Clone)]
struct FederateRecord<T: LogicalTime> {
    handle: FederateHandle,
    name: String,
    federate_type: String,
    connection: ConnectionId,
    advisory: AdvisorySwitches,
    declarations: Declarations,
    /// Known object instances with the class each is known as.
    known: BTreeMap<ObjectInstanceHandle, ObjectClassHandle>,
    time: FederateTime<T>,
    advice: Advice,
}

impl<T: LogicalTime> FederateRecord<T> {
    fn new(handle: FederateHandle, name: String, federate_type: String, connection: ConnectionId) -> Self {
        Self {
            handle,
            name,
            federate_type,
            connection,
            advisory: AdvisorySwitches::join_defaults(),
            declarations: Declarations::default(),
            known: BTreeMap::new(),
            time: FederateTime::default(),
            advice: Advice::default(),
        }
    }
}

/// State of one federation execution.
#[derive(Debug)]
pub struct Federation<T: LogicalTime> {
    name: String,
    model: ObjectModel,
    federates: BTreeMap<FederateHandle, FederateRecord<T>>,
    next_federate: u32,
    objects: BTreeMap<ObjectInstanceHandle, ObjectInstance>,
    next_object: u32,
    reserved_names: BTreeMap<String, FederateHandle>,
    regions: BTreeMap<RegionHandle, Region>,
    next_region: u32,
    sync_points: BTreeMap<String, SyncPoint>,
    save: Option<SaveSession<T>>,
    pending_save: Option<(String, T)>,
    restore: Option<RestoreSession>,
    snapshots: BTreeMap<String, Snapshot<T>>,
    sent: BTreeMap<MessageRetractionHandle, SentMessage<T>>,
    next_serial: u64,
    next_sequence: u64,
    outbox: Vec<Delivery<T>>,
}

impl<T: LogicalTime> Federation<T> {
    /// Empty federation over `model`.
    pub fn new(name: impl Into<String>, model: ObjectModel) -> Self {
        Self {
            name: name.into(),
            model,
            federates: BTreeMap::new(),
            next_federate: 0,
            objects: BTreeMap::new(),
            next_object: 0,
            reserved_names: BTreeMap::new(),
            regions: BTreeMap::new(),
            next_region: 0,
            sync_points: BTreeMap::new(),
            save: None,
            pending_save: None,
            restore: None,
            snapshots: BTreeMap::new(),
            sent: BTreeMap::new(),
            next_serial: 0,
            next_sequence: 0,
            outbox: Vec::new(),
        }
    }

    /// Federation execution name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The merged object model.
    pub fn model(&self) -> &ObjectModel {
        &self.model
    }

    /// Number of joined federates.
    pub fn federate_count(&self) -> usize {
        self.federates.len()
    }

    /// Joined federates with their names.
    pub fn federates(&self) -> impl Iterator<Item = (FederateHandle, &str)> {
        self.federates.values().map(|r| (r.handle, r.name.as_str()))
    }

    /// The federate joined over `connection`.
    pub fn federate_of(&self, connection: ConnectionId) -> Option<FederateHandle> {
        self.federates.values().find(|r| r.connection == connection).map(|r| r.handle)
    }

    /// Current owner of an attribute instance.
    pub fn owner(&self, object: ObjectInstanceHandle, attribute: AttributeHandle) -> Option<Owner> {
        self.objects.get(&object).and_then(|o| o.owner(attribute))
    }

    /// Registered object instances.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectInstanceHandle, &str)> {
        self.objects.iter().map(|(h, o)| (*h, o.name.as_str()))
    }

    /// Granted logical time of a federate.
    pub fn logical_time(&self, federate: FederateHandle) -> Option<T> {
        self.federates.get(&federate).map(|r| r.time.current)
    }

    /// Callbacks produced since the last call.
    pub fn take_deliveries(&mut self) -> Vec<Delivery<T>> {
        std::mem::take(&mut self.outbox)
    }

    /// Admit a federate. A missing name is generated from the type.
    pub fn join(
        &mut self,
        connection: ConnectionId,
        name: Option<&str>,
        federate_type: &str,
    ) -> Result<FederateHandle, RtiError> {
        self.check_window("joinFederationExecution")?;
        if let Some(name) = name
            && self.federates.values().any(|r| r.name == name)
        {
            return Err(RtiError::new(ErrorKind::FederateNameAlreadyInUse, name));
        }

        self.next_federate += 1;
        let handle = FederateHandle::from_raw(self.next_federate);
        let name = name.map_or_else(|| format!("{federate_type}-{}", handle.raw()), str::to_string);
        if self.federates.values().any(|r| r.name == name) {
            return Err(RtiError::new(ErrorKind::FederateNameAlreadyInUse, name));
        }

        info!(federation = %self.name, federate = %handle, %name, "federate joined");
        self.federates.insert(
            handle,
            FederateRecord::new(handle, name, federate_type.to_string(), connection),
        );
        self.announce_to_late_joiner(handle);
        self.recompute_advice();
        Ok(handle)
    }

    /// Handle one federation-scoped request from `federate`.
    pub fn handle(
        &mut self,
        federate: FederateHandle,
        request: &ServiceRequest<T>,
    ) -> Result<ServiceResponse<T>, RtiError> {
        use ServiceRequest as R;
        use ServiceResponse as Resp;

        self.record(federate)?;
        if !request.is_allowed_during_save_or_restore() {
            self.check_window(request.name())?;
        }

        let response = match request {
            R::Connect { .. }
            | R::Disconnect
            | R::CreateFederationExecution { .. }
            | R::DestroyFederationExecution { .. }
            | R::ListFederationExecutions
            | R::JoinFederationExecution { .. } => {
                return Err(RtiError::internal(format!(
                    "{} is not a federation-scoped service",
                    request.name()
                )));
            },

            R::ResignFederationExecution { action } => {
                self.resign(federate, *action)?;
                Resp::Ok
            },
            R::RegisterFederationSynchronizationPoint { label, tag, federates } => {
                self.register_sync_point(federate, label, tag, federates.as_ref());
                Resp::Ok
            },
            R::SynchronizationPointAchieved { label, successful } => {
                self.sync_point_achieved(federate, label, *successful)?;
                Resp::Ok
            },
            R::RequestFederationSave { label, time } => {
                self.request_save(federate, label, *time)?;
                Resp::Ok
            },
            R::FederateSaveBegun => {
                self.save_begun(federate)?;
                Resp::Ok
            },
            R::FederateSaveComplete => {
                self.save_reported(federate, true)?;
                Resp::Ok
            },
            R::FederateSaveNotComplete => {
                self.save_reported(federate, false)?;
                Resp::Ok
            },
            R::AbortFederationSave => {
                self.abort_save()?;
                Resp::Ok
            },
            R::QueryFederationSaveStatus => {
                self.query_save_status(federate);
                Resp::Ok
            },
            R::RequestFederationRestore { label } => {
                self.request_restore(federate, label)?;
                Resp::Ok
            },
            R::FederateRestoreComplete => {
                self.restore_reported(federate, true)?;
                Resp::Ok
            },
            R::FederateRestoreNotComplete => {
                self.restore_reported(federate, false)?;
                Resp::Ok
            },
            R::AbortFederationRestore => {
                self.abort_restore()?;
                Resp::Ok
            },
            R::QueryFederationRestoreStatus => {
                self.query_restore_status(federate);
                Resp::Ok
            },

            R::PublishObjectClassAttributes { class, attributes } => {
                self.publish_object_class_attributes(federate, *class, attributes)?;
                Resp::Ok
            },
            R::UnpublishObjectClass { class } => {
                self.unpublish_object_class(federate, *class, None)?;
                Resp::Ok
            },
            R::UnpublishObjectClassAttributes { class, attributes } => {
                self.unpublish_object_class(federate, *class, Some(attributes))?;
                Resp::Ok
            },
            R::PublishInteractionClass { class } => {
                self.publish_interaction_class(federate, *class, true)?;
                Resp::Ok
            },
            R::UnpublishInteractionClass { class } => {
                self.publish_interaction_class(federate, *class, false)?;
                Resp::Ok
            },
            R::SubscribeObjectClassAttributes { class, attributes, passive, regions } => {
                self.subscribe_object_class_attributes(
                    federate, *class, attributes, *passive, regions,
                )?;
                Resp::Ok
            },
            R::UnsubscribeObjectClass { class } => {
                self.unsubscribe_object_class(federate, *class, None, None)?;
                Resp::Ok
            },
            R::UnsubscribeObjectClassAttributes { class, attributes } => {
                self.unsubscribe_object_class(federate, *class, Some(attributes), None)?;
                Resp::Ok
            },
            R::UnsubscribeObjectClassAttributesWithRegions { class, attributes, regions } => {
                self.unsubscribe_object_class(federate, *class, Some(attributes), Some(regions))?;
                Resp::Ok
            },
            R::SubscribeInteractionClass { class, passive, regions } => {
                self.subscribe_interaction_class(federate, *class, *passive, regions)?;
                Resp::Ok
            },
            R::UnsubscribeInteractionClass { class } => {
                self.unsubscribe_interaction_class(federate, *class, None)?;
                Resp::Ok
            },
            R::UnsubscribeInteractionClassWithRegions { class, regions } => {
                self.unsubscribe_interaction_class(federate, *class, Some(regions))?;
                Resp::Ok
            },

            R::ReserveObjectInstanceName { name } => {
                self.reserve_object_instance_name(federate, name)?;
                Resp::Ok
            },
            R::ReleaseObjectInstanceName { name } => {
                self.release_object_instance_name(federate, name)?;
                Resp::Ok
            },
            R::RegisterObjectInstance { class, name, regions } => Resp::ObjectInstance(
                self.register_object_instance(federate, *class, name.as_deref(), regions)?,
            ),
            R::UpdateAttributeValues { object, values, tag, time } => Resp::Retraction(
                self.update_attribute_values(federate, *object, values, tag, *time)?,
            ),
            R::SendInteraction { class, parameters, tag, time, regions } => Resp::Retraction(
                self.send_interaction(federate, *class, parameters, tag, *time, regions)?,
            ),
            R::DeleteObjectInstance { object, tag, time } => {
                Resp::Retraction(self.delete_object_instance(federate, *object, tag, *time)?)
            },
            R::LocalDeleteObjectInstance { object } => {
                self.local_delete_object_instance(federate, *object)?;
                Resp::Ok
            },
            R::RequestObjectAttributeValueUpdate { object, attributes, tag } => {
                self.request_object_attribute_value_update(federate, *object, attributes, tag)?;
                Resp::Ok
            },
            R::RequestClassAttributeValueUpdate { class, attributes, tag, regions } => {
                self.request_class_attribute_value_update(
                    federate, *class, attributes, tag, regions,
                )?;
                Resp::Ok
            },

            R::UnconditionalAttributeOwnershipDivestiture { object, attributes } => {
                self.unconditional_divestiture(federate, *object, attributes)?;
                Resp::Ok
            },
            R::NegotiatedAttributeOwnershipDivestiture { object, attributes, tag } => {
                self.negotiated_divestiture(federate, *object, attributes, tag)?;
                Resp::Ok
            },
            R::ConfirmDivestiture { object, attributes, .. } => {
                self.confirm_divestiture(federate, *object, attributes)?;
                Resp::Ok
            },
            R::AttributeOwnershipDivestitureIfWanted { object, attributes } => {
                Resp::Attributes(self.release_to_acquirers(federate, *object, attributes)?)
            },
            R::CancelNegotiatedAttributeOwnershipDivestiture { object, attributes } => {
                self.cancel_negotiated_divestiture(federate, *object, attributes)?;
                Resp::Ok
            },
            R::AttributeOwnershipAcquisition { object, attributes, tag } => {
                self.acquisition(federate, *object, attributes, Some(tag))?;
                Resp::Ok
            },
            R::AttributeOwnershipAcquisitionIfAvailable { object, attributes } => {
                self.acquisition(federate, *object, attributes, None)?;
                Resp::Ok
            },
            R::AttributeOwnershipReleaseDenied { object, attributes } => {
                self.release_denied(federate, *object, attributes)?;
                Resp::Ok
            },
            R::AttributeOwnershipReleaseResponse { object, attributes } => {
                Resp::Attributes(self.release_to_acquirers(federate, *object, attributes)?)
            },
            R::CancelAttributeOwnershipAcquisition { object, attributes } => {
                self.cancel_acquisition(federate, *object, attributes)?;
                Resp::Ok
            },
            R::QueryAttributeOwnership { object, attribute } => {
                self.query_attribute_ownership(federate, *object, *attribute)?;
                Resp::Ok
            },

            R::EnableTimeRegulation { lookahead } => {
                self.enable_time_regulation(federate, *lookahead)?;
                Resp::Ok
            },
            R::DisableTimeRegulation => {
                self.disable_time_regulation(federate)?;
                Resp::Ok
            },
            R::EnableTimeConstrained => {
                self.enable_time_constrained(federate)?;
                Resp::Ok
            },
            R::DisableTimeConstrained => {
                self.disable_time_constrained(federate)?;
                Resp::Ok
            },
            R::TimeAdvance { kind, time } => {
                self.request_advance(federate, *kind, *time)?;
                Resp::Ok
            },
            R::EnableAsynchronousDelivery => {
                self.set_asynchronous_delivery(federate, true)?;
                Resp::Ok
            },
            R::DisableAsynchronousDelivery => {
                self.set_asynchronous_delivery(federate, false)?;
                Resp::Ok
            },
            R::QueryGalt => Resp::Time(self.galt(federate)),
            R::QueryLits => Resp::Time(self.lits(federate)),
            R::ModifyLookahead { lookahead } => {
                self.modify_lookahead(federate, *lookahead)?;
                Resp::Ok
            },
            R::Retract { handle } => {
                self.retract(federate, *handle)?;
                Resp::Ok
            },

            R::CreateRegion { dimensions } => Resp::Region(self.create_region(federate, dimensions)?),
            R::CommitRegionModifications { regions } => {
                self.commit_region_modifications(federate, regions)?;
                Resp::Ok
            },
            R::DeleteRegion { region } => {
                self.delete_region(federate, *region)?;
                Resp::Ok
            },
            R::AssociateRegionsForUpdates { object, associations } => {
                self.associate_regions(federate, *object, associations, true)?;
                Resp::Ok
            },
            R::UnassociateRegionsForUpdates { object, associations } => {
                self.associate_regions(federate, *object, associations, false)?;
                Resp::Ok
            },

            R::GetObjectClassHandle { name } => Resp::ObjectClass(self.model.object_class_handle(name)?),
            R::GetObjectClassName { class } => {
                Resp::Name(self.model.object_class(*class)?.qualified_name.clone())
            },
            R::GetAttributeHandle { class, name } => {
                Resp::Attribute(self.model.attribute_handle(*class, name)?)
            },
            R::GetAttributeName { class, attribute } => {
                Resp::Name(self.model.attribute_name(*class, *attribute)?.to_string())
            },
            R::GetInteractionClassHandle { name } => {
                Resp::InteractionClass(self.model.interaction_class_handle(name)?)
            },
            R::GetInteractionClassName { class } => {
                Resp::Name(self.model.interaction_class(*class)?.qualified_name.clone())
            },
            R::GetParameterHandle { class, name } => {
                Resp::Parameter(self.model.parameter_handle(*class, name)?)
            },
            R::GetParameterName { class, parameter } => {
                Resp::Name(self.model.parameter_name(*class, *parameter)?.to_string())
            },
            R::GetObjectInstanceHandle { name } => {
                Resp::ObjectInstance(self.object_instance_handle(federate, name)?)
            },
            R::GetObjectInstanceName { object } => {
                self.check_known(federate, *object)?;
                Resp::Name(self.instance(*object)?.name.clone())
            },
            R::GetKnownObjectClassHandle { object } => {
                Resp::ObjectClass(self.check_known(federate, *object)?)
            },
            R::GetDimensionHandle { name } => Resp::Dimension(self.model.dimension_handle(name)?),
            R::GetDimensionName { dimension } => {
                Resp::Name(self.model.dimension(*dimension)?.name.clone())
            },
            R::GetDimensionUpperBound { dimension } => {
                Resp::UpperBound(self.model.dimension(*dimension)?.upper_bound)
            },
            R::GetFederateHandle { name } => Resp::Federate(
                self.federates
                    .values()
                    .find(|r| r.name == *name)
                    .map(|r| r.handle)
                    .ok_or_else(|| RtiError::new(ErrorKind::NameNotFound, name.clone()))?,
            ),
            R::GetFederateName { federate: other } => Resp::Name(self.federate_name(*other)?),
            R::SetAdvisorySwitch { switch, enabled } => {
                self.set_advisory_switch(federate, *switch, *enabled)?;
                Resp::Ok
            },
        };

        self.process_grants();
        self.recompute_advice();
        Ok(response)
    }

    /// Remove `federate` after applying `action`.
    pub fn resign(&mut self, federate: FederateHandle, action: ResignAction) -> Result<(), RtiError> {
        let deletable = if action.deletes_objects() {
            self.deletable_by(federate)
        } else {
            Vec::new()
        };
        if !action.divests()
            && let Some((object, _)) =
                self.owned_by(federate).into_iter().find(|(o, _)| !deletable.contains(o))
        {
            return Err(RtiError::new(
                ErrorKind::FederateOwnsAttributes,
                format!("{federate} still owns attributes of {object}"),
            ));
        }
        if !action.cancels_acquisitions() && self.has_pending_acquisitions(federate) {
            return Err(RtiError::new(
                ErrorKind::OwnershipAcquisitionPending,
                format!("{federate} resigning with {action:?}"),
            ));
        }

        self.drop_acquisitions(federate);
        for object in deletable {
            self.remove_object(federate, object, &Bytes::new(), None, None);
        }
        if action.divests() {
            self.divest_everything(federate);
        }
        self.reserved_names.retain(|_, owner| *owner != federate);
        self.forget_regions_of(federate);
        self.leave_sync_points(federate);
        let federate = self.leave_save(federate);
        self.forget_sent(federate, None);

        if let Some(record) = self.federates.remove(&federate) {
            info!(
                federation = %self.name,
                %federate,
                name = %record.name,
                federate_type = %record.federate_type,
                ?action,
                "federate resigned"
            );
        }
        self.check_timed_save();
        self.process_grants();
        self.recompute_advice();
        Ok(())
    }

    fn check_window(&self, service: &str) -> Result<(), RtiError> {
        if self.save.is_some() {
            return Err(RtiError::new(ErrorKind::SaveInProgress, service));
        }
        if self.restore.is_some() {
            return Err(RtiError::new(ErrorKind::RestoreInProgress, service));
        }
        Ok(())
    }

    fn record(&self, federate: FederateHandle) -> Result<&FederateRecord<T>, RtiError> {
        self.federates
            .get(&federate)
            .ok_or_else(|| RtiError::new(ErrorKind::FederateNotExecutionMember, federate.to_string()))
    }

    fn record_mut(&mut self, federate: FederateHandle) -> Result<&mut FederateRecord<T>, RtiError> {
        self.federates
            .get_mut(&federate)
            .ok_or_else(|| RtiError::new(ErrorKind::FederateNotExecutionMember, federate.to_string()))
    }

    fn federate_name(&self, federate: FederateHandle) -> Result<String, RtiError> {
        if federate.raw() == 0 {
            return Err(RtiError::new(ErrorKind::InvalidFederateHandle, federate.to_string()));
        }
        self.federates
            .get(&federate)
            .map(|r| r.name.clone())
            .ok_or_else(|| federate.not_found())
    }

    fn set_advisory_switch(
        &mut self,
        federate: FederateHandle,
        switch: AdvisorySwitches,
        enabled: bool,
    ) -> Result<(), RtiError> {
        let record = self.record_mut(federate)?;
        if record.advisory.contains(switch) == enabled {
            return Err(RtiError::new(switch.redundant_error(enabled), format!("{switch:?}")));
        }
        record.advisory.set(switch, enabled);
        debug!(%federate, ?switch, enabled, "advisory switch changed");
        Ok(())
    }

    /// Queue `callback` for `federate`. Unknown federates are ignored.
    fn send(&mut self, federate: FederateHandle, callback: Callback<T>) {
        if let Some(record) = self.federates.get(&federate) {
            self.outbox.push(Delivery { connection: record.connection, callback });
        }
    }

    fn broadcast(&mut self, callback: &Callback<T>) {
        let handles: Vec<_> = self.federates.keys().copied().collect();
        for federate in handles {
            self.send(federate, callback.clone());
        }
    }

    fn others(&self, federate: FederateHandle) -> Vec<FederateHandle> {
        self.federates.keys().copied().filter(|h| *h != federate).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests;
