//! The callback surface.
//!
//! Applications implement [`FederateAmbassador`] and override only the
//! callbacks they care about; every method defaults to accepting the
//! callback and doing nothing. [`dispatch`] routes a decoded [`Callback`]
//! to the matching method.

use bytes::Bytes;
use hla_proto::{
    AttributeHandle, AttributeHandleSet, AttributeValues, Callback, FederateHandle,
    FederateHandleSet, FederateRestoreStatus, FederateSaveStatus, FederationExecutionInfo,
    InteractionClassHandle, LogicalTime, MessageInfo, MessageRetractionHandle, ObjectClassHandle,
    ObjectInstanceHandle, ParameterValues, RestoreFailureReason, RtiError, SaveFailureReason,
    SyncPointFailureReason,
};

/// Result of a callback handler.
///
/// An error is logged and reported from the pump call as
/// `FederateInternalError`.
pub type CallbackResult = Result<(), RtiError>;

/// Callbacks from the RTI to a federate.
#[allow(unused_variables)]
pub trait FederateAmbassador<T: LogicalTime>: Send {
    /// The RTI connection is gone.
    fn connection_lost(&mut self, reason: &str) -> CallbackResult {
        Ok(())
    }

    /// Answer to `listFederationExecutions`.
    fn report_federation_executions(
        &mut self,
        executions: &[FederationExecutionInfo],
    ) -> CallbackResult {
        Ok(())
    }

    /// Label registered.
    fn synchronization_point_registration_succeeded(&mut self, label: &str) -> CallbackResult {
        Ok(())
    }

    /// Label could not be registered.
    fn synchronization_point_registration_failed(
        &mut self,
        label: &str,
        reason: SyncPointFailureReason,
    ) -> CallbackResult {
        Ok(())
    }

    /// A synchronization point this federate must achieve.
    fn announce_synchronization_point(&mut self, label: &str, tag: &Bytes) -> CallbackResult {
        Ok(())
    }

    /// Every required federate achieved `label`.
    fn federation_synchronized(
        &mut self,
        label: &str,
        failed: &FederateHandleSet,
    ) -> CallbackResult {
        Ok(())
    }

    /// Save now.
    fn initiate_federate_save(&mut self, label: &str, time: Option<T>) -> CallbackResult {
        Ok(())
    }

    /// Every federate saved.
    fn federation_saved(&mut self) -> CallbackResult {
        Ok(())
    }

    /// The save failed.
    fn federation_not_saved(&mut self, reason: SaveFailureReason) -> CallbackResult {
        Ok(())
    }

    /// Answer to `queryFederationSaveStatus`.
    fn federation_save_status_response(
        &mut self,
        statuses: &[FederateSaveStatus],
    ) -> CallbackResult {
        Ok(())
    }

    /// The restore request was accepted.
    fn request_federation_restore_succeeded(&mut self, label: &str) -> CallbackResult {
        Ok(())
    }

    /// The restore request was refused.
    fn request_federation_restore_failed(&mut self, label: &str) -> CallbackResult {
        Ok(())
    }

    /// A restore is starting.
    fn federation_restore_begun(&mut self) -> CallbackResult {
        Ok(())
    }

    /// Restore `label`, taking over `federate_name` and `federate`.
    fn initiate_federate_restore(
        &mut self,
        label: &str,
        federate_name: &str,
        federate: FederateHandle,
    ) -> CallbackResult {
        Ok(())
    }

    /// Every federate restored.
    fn federation_restored(&mut self) -> CallbackResult {
        Ok(())
    }

    /// The restore failed.
    fn federation_not_restored(&mut self, reason: RestoreFailureReason) -> CallbackResult {
        Ok(())
    }

    /// Answer to `queryFederationRestoreStatus`.
    fn federation_restore_status_response(
        &mut self,
        statuses: &[FederateRestoreStatus],
    ) -> CallbackResult {
        Ok(())
    }

    /// Some federate subscribes to `class`.
    fn start_registration_for_object_class(&mut self, class: ObjectClassHandle) -> CallbackResult {
        Ok(())
    }

    /// Nobody subscribes to `class` any more.
    fn stop_registration_for_object_class(&mut self, class: ObjectClassHandle) -> CallbackResult {
        Ok(())
    }

    /// Some federate subscribes to `class`.
    fn turn_interactions_on(&mut self, class: InteractionClassHandle) -> CallbackResult {
        Ok(())
    }

    /// Nobody subscribes to `class` any more.
    fn turn_interactions_off(&mut self, class: InteractionClassHandle) -> CallbackResult {
        Ok(())
    }

    /// `name` is reserved for this federate.
    fn object_instance_name_reservation_succeeded(&mut self, name: &str) -> CallbackResult {
        Ok(())
    }

    /// `name` is taken.
    fn object_instance_name_reservation_failed(&mut self, name: &str) -> CallbackResult {
        Ok(())
    }

    /// A new object instance is visible through a subscription.
    fn discover_object_instance(
        &mut self,
        object: ObjectInstanceHandle,
        class: ObjectClassHandle,
        name: &str,
        producer: FederateHandle,
    ) -> CallbackResult {
        Ok(())
    }

    /// New attribute values.
    fn reflect_attribute_values(
        &mut self,
        object: ObjectInstanceHandle,
        values: &AttributeValues,
        tag: &Bytes,
        info: &MessageInfo<T>,
    ) -> CallbackResult {
        Ok(())
    }

    /// An interaction.
    fn receive_interaction(
        &mut self,
        class: InteractionClassHandle,
        parameters: &ParameterValues,
        tag: &Bytes,
        info: &MessageInfo<T>,
    ) -> CallbackResult {
        Ok(())
    }

    /// An object instance was deleted.
    fn remove_object_instance(
        &mut self,
        object: ObjectInstanceHandle,
        tag: &Bytes,
        info: &MessageInfo<T>,
    ) -> CallbackResult {
        Ok(())
    }

    /// Attributes came into scope.
    fn attributes_in_scope(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> CallbackResult {
        Ok(())
    }

    /// Attributes went out of scope.
    fn attributes_out_of_scope(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> CallbackResult {
        Ok(())
    }

    /// Another federate asked for current values.
    fn provide_attribute_value_update(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
        tag: &Bytes,
    ) -> CallbackResult {
        Ok(())
    }

    /// Some federate subscribes to these attributes.
    fn turn_updates_on_for_object_instance(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> CallbackResult {
        Ok(())
    }

    /// Nobody subscribes to these attributes any more.
    fn turn_updates_off_for_object_instance(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> CallbackResult {
        Ok(())
    }

    /// The owner offers these attributes.
    fn request_attribute_ownership_assumption(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
        tag: &Bytes,
    ) -> CallbackResult {
        Ok(())
    }

    /// This federate no longer owns these attributes.
    fn attribute_ownership_divestiture_notification(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> CallbackResult {
        Ok(())
    }

    /// This federate now owns these attributes.
    fn attribute_ownership_acquisition_notification(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
        tag: &Bytes,
    ) -> CallbackResult {
        Ok(())
    }

    /// An acquire-if-available found the attributes owned.
    fn attribute_ownership_unavailable(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> CallbackResult {
        Ok(())
    }

    /// Another federate wants attributes this federate owns.
    fn request_attribute_ownership_release(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
        tag: &Bytes,
    ) -> CallbackResult {
        Ok(())
    }

    /// The acquisition was cancelled.
    fn confirm_attribute_ownership_acquisition_cancellation(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> CallbackResult {
        Ok(())
    }

    /// Answer to `queryAttributeOwnership`: owned by `owner`.
    fn inform_attribute_ownership(
        &mut self,
        object: ObjectInstanceHandle,
        attribute: AttributeHandle,
        owner: FederateHandle,
    ) -> CallbackResult {
        Ok(())
    }

    /// Answer to `queryAttributeOwnership`: unowned.
    fn attribute_is_not_owned(
        &mut self,
        object: ObjectInstanceHandle,
        attribute: AttributeHandle,
    ) -> CallbackResult {
        Ok(())
    }

    /// Answer to `queryAttributeOwnership`: owned by the RTI.
    fn attribute_is_owned_by_rti(
        &mut self,
        object: ObjectInstanceHandle,
        attribute: AttributeHandle,
    ) -> CallbackResult {
        Ok(())
    }

    /// Time regulation is on.
    fn time_regulation_enabled(&mut self, time: T) -> CallbackResult {
        Ok(())
    }

    /// Time constraint is on.
    fn time_constrained_enabled(&mut self, time: T) -> CallbackResult {
        Ok(())
    }

    /// The pending time advance completed.
    fn time_advance_grant(&mut self, time: T) -> CallbackResult {
        Ok(())
    }

    /// A message already delivered was retracted by its sender.
    fn request_retraction(&mut self, handle: MessageRetractionHandle) -> CallbackResult {
        Ok(())
    }
}

/// Route a callback to the matching [`FederateAmbassador`] method.
pub fn dispatch<T: LogicalTime>(
    ambassador: &mut dyn FederateAmbassador<T>,
    callback: &Callback<T>,
) -> CallbackResult {
    use Callback as C;

    match callback {
        C::ConnectionLost { reason } => ambassador.connection_lost(reason),
        C::ReportFederationExecutions { executions } => {
            ambassador.report_federation_executions(executions)
        },
        C::SynchronizationPointRegistrationSucceeded { label } => {
            ambassador.synchronization_point_registration_succeeded(label)
        },
        C::SynchronizationPointRegistrationFailed { label, reason } => {
            ambassador.synchronization_point_registration_failed(label, *reason)
        },
        C::AnnounceSynchronizationPoint { label, tag } => {
            ambassador.announce_synchronization_point(label, tag)
        },
        C::FederationSynchronized { label, failed } => {
            ambassador.federation_synchronized(label, failed)
        },
        C::InitiateFederateSave { label, time } => ambassador.initiate_federate_save(label, *time),
        C::FederationSaved => ambassador.federation_saved(),
        C::FederationNotSaved { reason } => ambassador.federation_not_saved(*reason),
        C::FederationSaveStatusResponse { statuses } => {
            ambassador.federation_save_status_response(statuses)
        },
        C::RequestFederationRestoreSucceeded { label } => {
            ambassador.request_federation_restore_succeeded(label)
        },
        C::RequestFederationRestoreFailed { label } => {
            ambassador.request_federation_restore_failed(label)
        },
        C::FederationRestoreBegun => ambassador.federation_restore_begun(),
        C::InitiateFederateRestore { label, federate_name, federate } => {
            ambassador.initiate_federate_restore(label, federate_name, *federate)
        },
        C::FederationRestored => ambassador.federation_restored(),
        C::FederationNotRestored { reason } => ambassador.federation_not_restored(*reason),
        C::FederationRestoreStatusResponse { statuses } => {
            ambassador.federation_restore_status_response(statuses)
        },
        C::StartRegistrationForObjectClass { class } => {
            ambassador.start_registration_for_object_class(*class)
        },
        C::StopRegistrationForObjectClass { class } => {
            ambassador.stop_registration_for_object_class(*class)
        },
        C::TurnInteractionsOn { class } => ambassador.turn_interactions_on(*class),
        C::TurnInteractionsOff { class } => ambassador.turn_interactions_off(*class),
        C::ObjectInstanceNameReservationSucceeded { name } => {
            ambassador.object_instance_name_reservation_succeeded(name)
        },
        C::ObjectInstanceNameReservationFailed { name } => {
            ambassador.object_instance_name_reservation_failed(name)
        },
        C::DiscoverObjectInstance { object, class, name, producer } => {
            ambassador.discover_object_instance(*object, *class, name, *producer)
        },
        C::ReflectAttributeValues { object, values, tag, info } => {
            ambassador.reflect_attribute_values(*object, values, tag, info)
        },
        C::ReceiveInteraction { class, parameters, tag, info } => {
            ambassador.receive_interaction(*class, parameters, tag, info)
        },
        C::RemoveObjectInstance { object, tag, info } => {
            ambassador.remove_object_instance(*object, tag, info)
        },
        C::AttributesInScope { object, attributes } => {
            ambassador.attributes_in_scope(*object, attributes)
        },
        C::AttributesOutOfScope { object, attributes } => {
            ambassador.attributes_out_of_scope(*object, attributes)
        },
        C::ProvideAttributeValueUpdate { object, attributes, tag } => {
            ambassador.provide_attribute_value_update(*object, attributes, tag)
        },
        C::TurnUpdatesOnForObjectInstance { object, attributes } => {
            ambassador.turn_updates_on_for_object_instance(*object, attributes)
        },
        C::TurnUpdatesOffForObjectInstance { object, attributes } => {
            ambassador.turn_updates_off_for_object_instance(*object, attributes)
        },
        C::RequestAttributeOwnershipAssumption { object, attributes, tag } => {
            ambassador.request_attribute_ownership_assumption(*object, attributes, tag)
        },
        C::AttributeOwnershipDivestitureNotification { object, attributes } => {
            ambassador.attribute_ownership_divestiture_notification(*object, attributes)
        },
        C::AttributeOwnershipAcquisitionNotification { object, attributes, tag } => {
            ambassador.attribute_ownership_acquisition_notification(*object, attributes, tag)
        },
        C::AttributeOwnershipUnavailable { object, attributes } => {
            ambassador.attribute_ownership_unavailable(*object, attributes)
        },
        C::RequestAttributeOwnershipRelease { object, attributes, tag } => {
            ambassador.request_attribute_ownership_release(*object, attributes, tag)
        },
        C::ConfirmAttributeOwnershipAcquisitionCancellation { object, attributes } => {
            ambassador.confirm_attribute_ownership_acquisition_cancellation(*object, attributes)
        },
        C::InformAttributeOwnership { object, attribute, owner } => {
            ambassador.inform_attribute_ownership(*object, *attribute, *owner)
        },
        C::AttributeIsNotOwned { object, attribute } => {
            ambassador.attribute_is_not_owned(*object, *attribute)
        },
        C::AttributeIsOwnedByRti { object, attribute } => {
            ambassador.attribute_is_owned_by_rti(*object, *attribute)
        },
        C::TimeRegulationEnabled { time } => ambassador.time_regulation_enabled(*time),
        C::TimeConstrainedEnabled { time } => ambassador.time_constrained_enabled(*time),
        C::TimeAdvanceGrant { time } => ambassador.time_advance_grant(*time),
        C::RequestRetraction { handle } => ambassador.request_retraction(*handle),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hla_proto::{ErrorKind, Float64Time, Handle};

    use super::*;

    struct Silent;

    impl FederateAmbassador<Float64Time> for Silent {}

    #[derive(Default)]
    struct Grants(Vec<Float64Time>);

    impl FederateAmbassador<Float64Time> for Grants {
        fn time_advance_grant(&mut self, time: Float64Time) -> CallbackResult {
            if time.value() > 100.0 {
                return Err(RtiError::new(ErrorKind::FederateInternalError, "too far"));
            }
            self.0.push(time);
            Ok(())
        }
    }

    #[test]
    fn default_methods_accept_everything() {
        let callback = Callback::<Float64Time>::DiscoverObjectInstance {
            object: ObjectInstanceHandle::from_raw(1),
            class: ObjectClassHandle::from_raw(2),
            name: "tank".into(),
            producer: FederateHandle::from_raw(3),
        };
        dispatch(&mut Silent, &callback).unwrap();
    }

    #[test]
    fn overridden_method_receives_arguments() {
        let mut grants = Grants::default();
        let time = Float64Time::new(4.0).unwrap();
        dispatch(&mut grants, &Callback::TimeAdvanceGrant { time }).unwrap();
        assert_eq!(grants.0, vec![time]);

        let far = Float64Time::new(200.0).unwrap();
        assert!(dispatch(&mut grants, &Callback::TimeAdvanceGrant { time: far }).is_err());
    }
}
