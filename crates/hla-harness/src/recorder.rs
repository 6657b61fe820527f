//! Federate ambassador that records every callback.
//!
//! The recorder rebuilds each callback as a [`Callback`] value so tests can
//! assert on exactly what a federate saw, in order. Clones share the log.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use hla_client::{CallbackResult, FederateAmbassador};
use hla_proto::{
    AttributeHandle, AttributeHandleSet, AttributeValues, Callback, FederateHandle,
    FederateHandleSet, FederateRestoreStatus, FederateSaveStatus, FederationExecutionInfo,
    InteractionClassHandle, LogicalTime, MessageInfo, MessageRetractionHandle, ObjectClassHandle,
    ObjectInstanceHandle, ParameterValues, RestoreFailureReason, SaveFailureReason,
    SyncPointFailureReason,
};

/// Shared, ordered log of received callbacks.
pub struct Recorder<T: LogicalTime> {
    log: Arc<Mutex<Vec<Callback<T>>>>,
}

impl<T: LogicalTime> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self { log: Arc::clone(&self.log) }
    }
}

impl<T: LogicalTime> Default for Recorder<T> {
    fn default() -> Self {
        Self { log: Arc::new(Mutex::new(Vec::new())) }
    }
}

impl<T: LogicalTime> Recorder<T> {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Vec<Callback<T>>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<Callback<T>> {
        std::mem::take(&mut *self.log())
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<Callback<T>> {
        self.log().clone()
    }

    /// Number of recorded callbacks.
    pub fn len(&self) -> usize {
        self.log().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.log().is_empty()
    }

    /// Recorded callbacks with the given interface name, in order.
    pub fn named(&self, name: &str) -> Vec<Callback<T>> {
        self.log().iter().filter(|c| c.name() == name).cloned().collect()
    }

    fn push(&self, callback: Callback<T>) -> CallbackResult {
        tracing::trace!(callback = callback.name(), "recorded");
        self.log().push(callback);
        Ok(())
    }
}

impl<T: LogicalTime> FederateAmbassador<T> for Recorder<T> {
    fn connection_lost(&mut self, reason: &str) -> CallbackResult {
        self.push(Callback::ConnectionLost { reason: reason.to_string() })
    }

    fn report_federation_executions(
        &mut self,
        executions: &[FederationExecutionInfo],
    ) -> CallbackResult {
        self.push(Callback::ReportFederationExecutions { executions: executions.to_vec() })
    }

    fn synchronization_point_registration_succeeded(&mut self, label: &str) -> CallbackResult {
        self.push(Callback::SynchronizationPointRegistrationSucceeded { label: label.to_string() })
    }

    fn synchronization_point_registration_failed(
        &mut self,
        label: &str,
        reason: SyncPointFailureReason,
    ) -> CallbackResult {
        self.push(Callback::SynchronizationPointRegistrationFailed {
            label: label.to_string(),
            reason,
        })
    }

    fn announce_synchronization_point(&mut self, label: &str, tag: &Bytes) -> CallbackResult {
        self.push(Callback::AnnounceSynchronizationPoint { label: label.to_string(), tag: tag.clone() })
    }

    fn federation_synchronized(
        &mut self,
        label: &str,
        failed: &FederateHandleSet,
    ) -> CallbackResult {
        self.push(Callback::FederationSynchronized { label: label.to_string(), failed: failed.clone() })
    }

    fn initiate_federate_save(&mut self, label: &str, time: Option<T>) -> CallbackResult {
        self.push(Callback::InitiateFederateSave { label: label.to_string(), time })
    }

    fn federation_saved(&mut self) -> CallbackResult {
        self.push(Callback::FederationSaved)
    }

    fn federation_not_saved(&mut self, reason: SaveFailureReason) -> CallbackResult {
        self.push(Callback::FederationNotSaved { reason })
    }

    fn federation_save_status_response(
        &mut self,
        statuses: &[FederateSaveStatus],
    ) -> CallbackResult {
        self.push(Callback::FederationSaveStatusResponse { statuses: statuses.to_vec() })
    }

    fn request_federation_restore_succeeded(&mut self, label: &str) -> CallbackResult {
        self.push(Callback::RequestFederationRestoreSucceeded { label: label.to_string() })
    }

    fn request_federation_restore_failed(&mut self, label: &str) -> CallbackResult {
        self.push(Callback::RequestFederationRestoreFailed { label: label.to_string() })
    }

    fn federation_restore_begun(&mut self) -> CallbackResult {
        self.push(Callback::FederationRestoreBegun)
    }

    fn initiate_federate_restore(
        &mut self,
        label: &str,
        federate_name: &str,
        federate: FederateHandle,
    ) -> CallbackResult {
        self.push(Callback::InitiateFederateRestore {
            label: label.to_string(),
            federate_name: federate_name.to_string(),
            federate,
        })
    }

    fn federation_restored(&mut self) -> CallbackResult {
        self.push(Callback::FederationRestored)
    }

    fn federation_not_restored(&mut self, reason: RestoreFailureReason) -> CallbackResult {
        self.push(Callback::FederationNotRestored { reason })
    }

    fn federation_restore_status_response(
        &mut self,
        statuses: &[FederateRestoreStatus],
    ) -> CallbackResult {
        self.push(Callback::FederationRestoreStatusResponse { statuses: statuses.to_vec() })
    }

    fn start_registration_for_object_class(&mut self, class: ObjectClassHandle) -> CallbackResult {
        self.push(Callback::StartRegistrationForObjectClass { class })
    }

    fn stop_registration_for_object_class(&mut self, class: ObjectClassHandle) -> CallbackResult {
        self.push(Callback::StopRegistrationForObjectClass { class })
    }

    fn turn_interactions_on(&mut self, class: InteractionClassHandle) -> CallbackResult {
        self.push(Callback::TurnInteractionsOn { class })
    }

    fn turn_interactions_off(&mut self, class: InteractionClassHandle) -> CallbackResult {
        self.push(Callback::TurnInteractionsOff { class })
    }

    fn object_instance_name_reservation_succeeded(&mut self, name: &str) -> CallbackResult {
        self.push(Callback::ObjectInstanceNameReservationSucceeded { name: name.to_string() })
    }

    fn object_instance_name_reservation_failed(&mut self, name: &str) -> CallbackResult {
        self.push(Callback::ObjectInstanceNameReservationFailed { name: name.to_string() })
    }

    fn discover_object_instance(
        &mut self,
        object: ObjectInstanceHandle,
        class: ObjectClassHandle,
        name: &str,
        producer: FederateHandle,
    ) -> CallbackResult {
        self.push(Callback::DiscoverObjectInstance { object, class, name: name.to_string(), producer })
    }

    fn reflect_attribute_values(
        &mut self,
        object: ObjectInstanceHandle,
        values: &AttributeValues,
        tag: &Bytes,
        info: &MessageInfo<T>,
    ) -> CallbackResult {
        self.push(Callback::ReflectAttributeValues {
            object,
            values: values.clone(),
            tag: tag.clone(),
            info: info.clone(),
        })
    }

    fn receive_interaction(
        &mut self,
        class: InteractionClassHandle,
        parameters: &ParameterValues,
        tag: &Bytes,
        info: &MessageInfo<T>,
    ) -> CallbackResult {
        self.push(Callback::ReceiveInteraction {
            class,
            parameters: parameters.clone(),
            tag: tag.clone(),
            info: info.clone(),
        })
    }

    fn remove_object_instance(
        &mut self,
        object: ObjectInstanceHandle,
        tag: &Bytes,
        info: &MessageInfo<T>,
    ) -> CallbackResult {
        self.push(Callback::RemoveObjectInstance { object, tag: tag.clone(), info: info.clone() })
    }

    fn attributes_in_scope(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> CallbackResult {
        self.push(Callback::AttributesInScope { object, attributes: attributes.clone() })
    }

    fn attributes_out_of_scope(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> CallbackResult {
        self.push(Callback::AttributesOutOfScope { object, attributes: attributes.clone() })
    }

    fn provide_attribute_value_update(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
        tag: &Bytes,
    ) -> CallbackResult {
        self.push(Callback::ProvideAttributeValueUpdate {
            object,
            attributes: attributes.clone(),
            tag: tag.clone(),
        })
    }

    fn turn_updates_on_for_object_instance(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> CallbackResult {
        self.push(Callback::TurnUpdatesOnForObjectInstance { object, attributes: attributes.clone() })
    }

    fn turn_updates_off_for_object_instance(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> CallbackResult {
        self.push(Callback::TurnUpdatesOffForObjectInstance { object, attributes: attributes.clone() })
    }

    fn request_attribute_ownership_assumption(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
        tag: &Bytes,
    ) -> CallbackResult {
        self.push(Callback::RequestAttributeOwnershipAssumption {
            object,
            attributes: attributes.clone(),
            tag: tag.clone(),
        })
    }

    fn attribute_ownership_divestiture_notification(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> CallbackResult {
        self.push(Callback::AttributeOwnershipDivestitureNotification {
            object,
            attributes: attributes.clone(),
        })
    }

    fn attribute_ownership_acquisition_notification(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
        tag: &Bytes,
    ) -> CallbackResult {
        self.push(Callback::AttributeOwnershipAcquisitionNotification {
            object,
            attributes: attributes.clone(),
            tag: tag.clone(),
        })
    }

    fn attribute_ownership_unavailable(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> CallbackResult {
        self.push(Callback::AttributeOwnershipUnavailable { object, attributes: attributes.clone() })
    }

    fn request_attribute_ownership_release(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
        tag: &Bytes,
    ) -> CallbackResult {
        self.push(Callback::RequestAttributeOwnershipRelease {
            object,
            attributes: attributes.clone(),
            tag: tag.clone(),
        })
    }

    fn confirm_attribute_ownership_acquisition_cancellation(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> CallbackResult {
        self.push(Callback::ConfirmAttributeOwnershipAcquisitionCancellation {
            object,
            attributes: attributes.clone(),
        })
    }

    fn inform_attribute_ownership(
        &mut self,
        object: ObjectInstanceHandle,
        attribute: AttributeHandle,
        owner: FederateHandle,
    ) -> CallbackResult {
        self.push(Callback::InformAttributeOwnership { object, attribute, owner })
    }

    fn attribute_is_not_owned(
        &mut self,
        object: ObjectInstanceHandle,
        attribute: AttributeHandle,
    ) -> CallbackResult {
        self.push(Callback::AttributeIsNotOwned { object, attribute })
    }

    fn attribute_is_owned_by_rti(
        &mut self,
        object: ObjectInstanceHandle,
        attribute: AttributeHandle,
    ) -> CallbackResult {
        self.push(Callback::AttributeIsOwnedByRti { object, attribute })
    }

    fn time_regulation_enabled(&mut self, time: T) -> CallbackResult {
        self.push(Callback::TimeRegulationEnabled { time })
    }

    fn time_constrained_enabled(&mut self, time: T) -> CallbackResult {
        self.push(Callback::TimeConstrainedEnabled { time })
    }

    fn time_advance_grant(&mut self, time: T) -> CallbackResult {
        self.push(Callback::TimeAdvanceGrant { time })
    }

    fn request_retraction(&mut self, handle: MessageRetractionHandle) -> CallbackResult {
        self.push(Callback::RequestRetraction { handle })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hla_client::dispatch;
    use hla_proto::{Float64Time, Handle};

    use super::*;

    #[test]
    fn dispatched_callbacks_come_back_unchanged() {
        let recorder = Recorder::<Float64Time>::new();
        let mut ambassador = recorder.clone();
        let callbacks = vec![
            Callback::AnnounceSynchronizationPoint { label: "ready".into(), tag: Bytes::from_static(b"x") },
            Callback::TimeAdvanceGrant { time: Float64Time::new(2.0).unwrap() },
            Callback::AttributeIsNotOwned {
                object: ObjectInstanceHandle::from_raw(4),
                attribute: AttributeHandle::from_raw(1),
            },
            Callback::FederationSaved,
        ];

        for callback in &callbacks {
            dispatch(&mut ambassador, callback).unwrap();
        }

        assert_eq!(recorder.len(), 4);
        assert_eq!(recorder.named("timeAdvanceGrant").len(), 1);
        assert_eq!(recorder.take(), callbacks);
        assert!(recorder.is_empty());
    }
}
