//! The RTI ambassador: the service surface a federate calls.
//!
//! Every service goes through the same path:
//!
//! ```text
//! method ─▶ invoke(request)
//!             │ reentrancy check (callback thread?)
//!             │ lock Federate
//!             │ Federate::check ──AlreadySatisfied──▶ Ok, nothing sent
//!             │ RtiConnection::call
//!             └ Federate::record
//! ```
//!
//! Callbacks travel the other way. A pump call (`evoke_callback`, `tick`)
//! or the `Immediate` delivery thread polls the connection, applies the
//! callback to the local state machines and hands it to the
//! [`FederateAmbassador`]. While a handler runs, service calls from the
//! same thread fail with `CallNotAllowedFromWithinCallback`; local queries
//! stay available.

use std::{
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle, ThreadId},
    time::Duration,
};

use bytes::Bytes;
use hla_core::{Dispatch, Environment, Federate, RtiConnection};
use hla_proto::{
    AdvanceKind, AdvisorySwitches, AttributeHandle, AttributeHandleSet, AttributeRegions,
    AttributeValues, Callback, CallbackModel, DimensionHandle, DimensionHandleSet, ErrorKind,
    FederateHandle, FederateHandleSet, Float64Time, FomModule, Handle, InteractionClassHandle,
    LogicalTime, LogicalTimeInterval, MessageRetractionHandle, ObjectClassHandle,
    ObjectInstanceHandle, OrderType, ParameterHandle, ParameterValues, RangeBounds, RegionHandle,
    RegionHandleSet, ResignAction, RtiError, ServiceRequest, ServiceResponse, TransportationType,
};
use tracing::{debug, warn};

use crate::{
    cache::HandleCache,
    config::AmbassadorConfig,
    federate_ambassador::{FederateAmbassador, dispatch},
    system_env::SystemEnv,
};

fn lock<'a, X>(mutex: &'a Mutex<X>, what: &str) -> Result<MutexGuard<'a, X>, RtiError> {
    mutex.lock().map_err(|_| RtiError::internal(format!("{what} lock poisoned")))
}

/// Marks the current thread as delivering a callback until dropped.
struct CallbackScope<'a> {
    slot: &'a Mutex<Option<ThreadId>>,
}

impl<'a> CallbackScope<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Result<Self, RtiError> {
        *lock(slot, "callback thread")? = Some(thread::current().id());
        Ok(Self { slot })
    }
}

impl Drop for CallbackScope<'_> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

struct Inner<T: LogicalTime, C, E> {
    federate: Mutex<Federate<T>>,
    connection: C,
    env: E,
    config: AmbassadorConfig,
    ambassador: Mutex<Option<Box<dyn FederateAmbassador<T>>>>,
    callback_thread: Mutex<Option<ThreadId>>,
    callbacks_enabled: AtomicBool,
    stop: AtomicBool,
    cache: Mutex<HandleCache>,
}

impl<T, C, E> Inner<T, C, E>
where
    T: LogicalTime,
    C: RtiConnection<T>,
    E: Environment,
{
    fn check_not_in_callback(&self, service: &str) -> Result<(), RtiError> {
        if *lock(&self.callback_thread, "callback thread")? == Some(thread::current().id()) {
            return Err(RtiError::new(
                ErrorKind::CallNotAllowedFromWithinCallback,
                format!("{service} called from a federate ambassador callback"),
            ));
        }
        Ok(())
    }

    fn invoke(&self, request: &ServiceRequest<T>) -> Result<ServiceResponse<T>, RtiError> {
        self.check_not_in_callback(request.name())?;

        let mut federate = lock(&self.federate, "federate")?;
        if federate.check(request)? == Dispatch::AlreadySatisfied {
            debug!(service = request.name(), "answered locally");
            return Ok(ServiceResponse::Ok);
        }
        let response = self.connection.call(request).inspect_err(|err| {
            debug!(service = request.name(), %err, "rejected by RTI");
        })?;
        federate.record(request, &response)?;
        drop(federate);

        if matches!(
            request,
            ServiceRequest::JoinFederationExecution { .. }
                | ServiceRequest::ResignFederationExecution { .. }
                | ServiceRequest::Disconnect
        ) {
            lock(&self.cache, "handle cache")?.clear();
        }
        Ok(response)
    }

    /// Deliver at most one callback, waiting up to `timeout` for it.
    ///
    /// Returns whether a callback was consumed. A callback that contradicts
    /// local state is logged and dropped without reaching the application.
    fn deliver_next(&self, timeout: Duration) -> Result<bool, RtiError> {
        let mut ambassador = lock(&self.ambassador, "federate ambassador")?;
        let Some(callback) = self.connection.poll_callback(timeout)? else {
            return Ok(false);
        };

        let applied = lock(&self.federate, "federate")?.apply_callback(&callback);
        if let Err(err) = applied {
            warn!(callback = callback.name(), %err, "dropping callback");
            return Ok(true);
        }
        if matches!(callback, Callback::ConnectionLost { .. }) {
            lock(&self.cache, "handle cache")?.clear();
        }

        let Some(handler) = ambassador.as_deref_mut() else {
            debug!(callback = callback.name(), "no federate ambassador, callback discarded");
            return Ok(true);
        };
        let _scope = CallbackScope::enter(&self.callback_thread)?;
        dispatch(handler, &callback).map_err(|err| {
            warn!(callback = callback.name(), %err, "federate ambassador failed");
            RtiError::new(ErrorKind::FederateInternalError, format!("{}: {err}", callback.name()))
        })?;
        Ok(true)
    }

    fn run_delivery(&self) {
        debug!("callback delivery thread started");
        while !self.stop.load(Ordering::Acquire) {
            if !self.callbacks_enabled.load(Ordering::Acquire) {
                thread::sleep(self.config.poll_interval);
                continue;
            }
            match self.deliver_next(self.config.poll_interval) {
                Ok(_) => {},
                Err(err) if err.is(ErrorKind::FederateInternalError) => {},
                Err(err) => {
                    warn!(%err, "callback delivery stopped");
                    break;
                },
            }
        }
        debug!("callback delivery thread stopped");
    }
}

/// Service surface of one federate.
///
/// # Type Parameters
///
/// - `T`: the federation's logical time representation
/// - `C`: connection to the RTI
/// - `E`: clock used for pump deadlines
pub struct RtiAmbassador<T: LogicalTime, C: RtiConnection<T>, E: Environment = SystemEnv> {
    inner: Arc<Inner<T, C, E>>,
    delivery: Mutex<Option<JoinHandle<()>>>,
}

impl<T: LogicalTime, C: RtiConnection<T>> RtiAmbassador<T, C, SystemEnv> {
    /// Ambassador over `connection` with the default configuration.
    pub fn new(connection: C) -> Self {
        Self::with_env(connection, SystemEnv::new(), AmbassadorConfig::default())
    }
}

impl<T, C, E> RtiAmbassador<T, C, E>
where
    T: LogicalTime,
    C: RtiConnection<T>,
    E: Environment,
{
    /// Ambassador with an explicit clock and configuration.
    pub fn with_env(connection: C, env: E, config: AmbassadorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                federate: Mutex::new(Federate::default()),
                connection,
                env,
                config,
                ambassador: Mutex::new(None),
                callback_thread: Mutex::new(None),
                callbacks_enabled: AtomicBool::new(true),
                stop: AtomicBool::new(false),
                cache: Mutex::new(HandleCache::default()),
            }),
            delivery: Mutex::new(None),
        }
    }

    /// Configuration in effect.
    pub fn config(&self) -> &AmbassadorConfig {
        &self.inner.config
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.inner.connection
    }

    /// Run `f` against the local federate state.
    pub fn with_federate<R>(&self, f: impl FnOnce(&Federate<T>) -> R) -> Result<R, RtiError> {
        let guard = lock(&self.inner.federate, "federate")?;
        Ok(f(&guard))
    }

    /// Handle of this federate while joined.
    pub fn federate_handle(&self) -> Result<Option<FederateHandle>, RtiError> {
        self.with_federate(Federate::handle)
    }

    fn invoke(&self, request: ServiceRequest<T>) -> Result<ServiceResponse<T>, RtiError> {
        self.inner.invoke(&request)
    }

    fn invoke_unit(&self, request: ServiceRequest<T>) -> Result<(), RtiError> {
        self.invoke(request).map(|_| ())
    }

    fn start_delivery_thread(&self) -> Result<(), RtiError> {
        self.stop_delivery_thread()?;
        self.inner.stop.store(false, Ordering::Release);
        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("hla-callbacks".into())
            .spawn(move || inner.run_delivery())
            .map_err(|e| RtiError::internal(format!("spawning callback thread: {e}")))?;
        *lock(&self.delivery, "delivery thread")? = Some(handle);
        Ok(())
    }

    fn stop_delivery_thread(&self) -> Result<(), RtiError> {
        self.inner.stop.store(true, Ordering::Release);
        let handle = lock(&self.delivery, "delivery thread")?.take();
        if let Some(handle) = handle
            && handle.thread().id() != thread::current().id()
            && handle.join().is_err()
        {
            warn!("callback delivery thread panicked");
        }
        Ok(())
    }

    // Federation management

    /// `connect`. `ambassador` receives every callback from now on.
    ///
    /// With [`CallbackModel::Immediate`] a delivery thread is started;
    /// with [`CallbackModel::Evoked`] callbacks wait for a pump call.
    pub fn connect(
        &self,
        ambassador: Box<dyn FederateAmbassador<T>>,
        callback_model: CallbackModel,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::Connect { callback_model })?;
        *lock(&self.inner.ambassador, "federate ambassador")? = Some(ambassador);
        if callback_model == CallbackModel::Immediate {
            self.start_delivery_thread()?;
        }
        Ok(())
    }

    /// `disconnect`.
    pub fn disconnect(&self) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::Disconnect)?;
        self.stop_delivery_thread()
    }

    /// `createFederationExecution`.
    pub fn create_federation_execution(
        &self,
        federation: &str,
        modules: Vec<FomModule>,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::CreateFederationExecution {
            federation: federation.to_string(),
            modules,
        })
    }

    /// `destroyFederationExecution`.
    pub fn destroy_federation_execution(&self, federation: &str) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::DestroyFederationExecution {
            federation: federation.to_string(),
        })
    }

    /// `listFederationExecutions`; answered by `reportFederationExecutions`.
    pub fn list_federation_executions(&self) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::ListFederationExecutions)
    }

    /// `joinFederationExecution`.
    pub fn join_federation_execution(
        &self,
        federate_name: Option<&str>,
        federate_type: &str,
        federation: &str,
    ) -> Result<FederateHandle, RtiError> {
        self.invoke(ServiceRequest::JoinFederationExecution {
            federate_name: federate_name.map(str::to_string),
            federate_type: federate_type.to_string(),
            federation: federation.to_string(),
        })?
        .into_federate()
    }

    /// `resignFederationExecution`.
    pub fn resign_federation_execution(&self, action: ResignAction) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::ResignFederationExecution { action })
    }

    /// `registerFederationSynchronizationPoint`, for every federate or the
    /// given subset.
    pub fn register_federation_synchronization_point(
        &self,
        label: &str,
        tag: impl Into<Bytes>,
        federates: Option<FederateHandleSet>,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::RegisterFederationSynchronizationPoint {
            label: label.to_string(),
            tag: tag.into(),
            federates,
        })
    }

    /// `synchronizationPointAchieved`. Repeating it for the same label is
    /// a no-op.
    pub fn synchronization_point_achieved(
        &self,
        label: &str,
        successful: bool,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::SynchronizationPointAchieved {
            label: label.to_string(),
            successful,
        })
    }

    /// `requestFederationSave`, immediately or at a logical time.
    pub fn request_federation_save(&self, label: &str, time: Option<T>) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::RequestFederationSave { label: label.to_string(), time })
    }

    /// `federateSaveBegun`.
    pub fn federate_save_begun(&self) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::FederateSaveBegun)
    }

    /// `federateSaveComplete`.
    pub fn federate_save_complete(&self) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::FederateSaveComplete)
    }

    /// `federateSaveNotComplete`.
    pub fn federate_save_not_complete(&self) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::FederateSaveNotComplete)
    }

    /// `abortFederationSave`.
    pub fn abort_federation_save(&self) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::AbortFederationSave)
    }

    /// `queryFederationSaveStatus`.
    pub fn query_federation_save_status(&self) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::QueryFederationSaveStatus)
    }

    /// `requestFederationRestore`.
    pub fn request_federation_restore(&self, label: &str) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::RequestFederationRestore { label: label.to_string() })
    }

    /// `federateRestoreComplete`.
    pub fn federate_restore_complete(&self) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::FederateRestoreComplete)
    }

    /// `federateRestoreNotComplete`.
    pub fn federate_restore_not_complete(&self) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::FederateRestoreNotComplete)
    }

    /// `abortFederationRestore`.
    pub fn abort_federation_restore(&self) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::AbortFederationRestore)
    }

    /// `queryFederationRestoreStatus`.
    pub fn query_federation_restore_status(&self) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::QueryFederationRestoreStatus)
    }

    // Declaration management

    /// `publishObjectClassAttributes`.
    pub fn publish_object_class_attributes(
        &self,
        class: ObjectClassHandle,
        attributes: AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::PublishObjectClassAttributes { class, attributes })
    }

    /// `unpublishObjectClass`.
    pub fn unpublish_object_class(&self, class: ObjectClassHandle) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::UnpublishObjectClass { class })
    }

    /// `unpublishObjectClassAttributes`.
    pub fn unpublish_object_class_attributes(
        &self,
        class: ObjectClassHandle,
        attributes: AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::UnpublishObjectClassAttributes { class, attributes })
    }

    /// `publishInteractionClass`.
    pub fn publish_interaction_class(&self, class: InteractionClassHandle) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::PublishInteractionClass { class })
    }

    /// `unpublishInteractionClass`.
    pub fn unpublish_interaction_class(
        &self,
        class: InteractionClassHandle,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::UnpublishInteractionClass { class })
    }

    /// `subscribeObjectClassAttributes`. An empty set unsubscribes.
    pub fn subscribe_object_class_attributes(
        &self,
        class: ObjectClassHandle,
        attributes: AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.subscribe_object_class_attributes_with_regions(
            class,
            attributes,
            RegionHandleSet::new(),
            false,
        )
    }

    /// `subscribeObjectClassAttributesPassively`.
    pub fn subscribe_object_class_attributes_passively(
        &self,
        class: ObjectClassHandle,
        attributes: AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.subscribe_object_class_attributes_with_regions(
            class,
            attributes,
            RegionHandleSet::new(),
            true,
        )
    }

    /// `subscribeObjectClassAttributesWithRegions`.
    pub fn subscribe_object_class_attributes_with_regions(
        &self,
        class: ObjectClassHandle,
        attributes: AttributeHandleSet,
        regions: RegionHandleSet,
        passive: bool,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::SubscribeObjectClassAttributes {
            class,
            attributes,
            passive,
            regions,
        })
    }

    /// `unsubscribeObjectClass`.
    pub fn unsubscribe_object_class(&self, class: ObjectClassHandle) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::UnsubscribeObjectClass { class })
    }

    /// `unsubscribeObjectClassAttributes`.
    pub fn unsubscribe_object_class_attributes(
        &self,
        class: ObjectClassHandle,
        attributes: AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::UnsubscribeObjectClassAttributes { class, attributes })
    }

    /// `unsubscribeObjectClassAttributesWithRegions`.
    pub fn unsubscribe_object_class_attributes_with_regions(
        &self,
        class: ObjectClassHandle,
        attributes: AttributeHandleSet,
        regions: RegionHandleSet,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::UnsubscribeObjectClassAttributesWithRegions {
            class,
            attributes,
            regions,
        })
    }

    /// `subscribeInteractionClass`.
    pub fn subscribe_interaction_class(
        &self,
        class: InteractionClassHandle,
    ) -> Result<(), RtiError> {
        self.subscribe_interaction_class_with_regions(class, RegionHandleSet::new(), false)
    }

    /// `subscribeInteractionClassPassively`.
    pub fn subscribe_interaction_class_passively(
        &self,
        class: InteractionClassHandle,
    ) -> Result<(), RtiError> {
        self.subscribe_interaction_class_with_regions(class, RegionHandleSet::new(), true)
    }

    /// `subscribeInteractionClassWithRegions`.
    pub fn subscribe_interaction_class_with_regions(
        &self,
        class: InteractionClassHandle,
        regions: RegionHandleSet,
        passive: bool,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::SubscribeInteractionClass { class, passive, regions })
    }

    /// `unsubscribeInteractionClass`.
    pub fn unsubscribe_interaction_class(
        &self,
        class: InteractionClassHandle,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::UnsubscribeInteractionClass { class })
    }

    /// `unsubscribeInteractionClassWithRegions`.
    pub fn unsubscribe_interaction_class_with_regions(
        &self,
        class: InteractionClassHandle,
        regions: RegionHandleSet,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::UnsubscribeInteractionClassWithRegions { class, regions })
    }

    // Object management

    /// `reserveObjectInstanceName`; answered by a reservation callback.
    pub fn reserve_object_instance_name(&self, name: &str) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::ReserveObjectInstanceName { name: name.to_string() })
    }

    /// `releaseObjectInstanceName`.
    pub fn release_object_instance_name(&self, name: &str) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::ReleaseObjectInstanceName { name: name.to_string() })
    }

    /// `registerObjectInstance` with an RTI-chosen name.
    pub fn register_object_instance(
        &self,
        class: ObjectClassHandle,
    ) -> Result<ObjectInstanceHandle, RtiError> {
        self.register_object_instance_with_regions(class, Vec::new(), None)
    }

    /// `registerObjectInstance` with a reserved name.
    pub fn register_object_instance_with_name(
        &self,
        class: ObjectClassHandle,
        name: &str,
    ) -> Result<ObjectInstanceHandle, RtiError> {
        self.register_object_instance_with_regions(class, Vec::new(), Some(name))
    }

    /// `registerObjectInstanceWithRegions`.
    pub fn register_object_instance_with_regions(
        &self,
        class: ObjectClassHandle,
        regions: Vec<AttributeRegions>,
        name: Option<&str>,
    ) -> Result<ObjectInstanceHandle, RtiError> {
        self.invoke(ServiceRequest::RegisterObjectInstance {
            class,
            name: name.map(str::to_string),
            regions,
        })?
        .into_object_instance()
    }

    /// `updateAttributeValues`, receive order.
    pub fn update_attribute_values(
        &self,
        object: ObjectInstanceHandle,
        values: AttributeValues,
        tag: impl Into<Bytes>,
    ) -> Result<(), RtiError> {
        self.invoke(ServiceRequest::UpdateAttributeValues {
            object,
            values,
            tag: tag.into(),
            time: None,
        })
        .map(|_| ())
    }

    /// `updateAttributeValues` with a timestamp.
    ///
    /// Returns a retraction handle when the update is timestamp order.
    pub fn update_attribute_values_at(
        &self,
        object: ObjectInstanceHandle,
        values: AttributeValues,
        tag: impl Into<Bytes>,
        time: T,
    ) -> Result<Option<MessageRetractionHandle>, RtiError> {
        self.invoke(ServiceRequest::UpdateAttributeValues {
            object,
            values,
            tag: tag.into(),
            time: Some(time),
        })?
        .into_retraction()
    }

    /// `sendInteraction`, receive order.
    pub fn send_interaction(
        &self,
        class: InteractionClassHandle,
        parameters: ParameterValues,
        tag: impl Into<Bytes>,
    ) -> Result<(), RtiError> {
        self.send_interaction_with_regions(class, parameters, RegionHandleSet::new(), tag, None)
            .map(|_| ())
    }

    /// `sendInteraction` with a timestamp.
    pub fn send_interaction_at(
        &self,
        class: InteractionClassHandle,
        parameters: ParameterValues,
        tag: impl Into<Bytes>,
        time: T,
    ) -> Result<Option<MessageRetractionHandle>, RtiError> {
        self.send_interaction_with_regions(
            class,
            parameters,
            RegionHandleSet::new(),
            tag,
            Some(time),
        )
    }

    /// `sendInteractionWithRegions`.
    pub fn send_interaction_with_regions(
        &self,
        class: InteractionClassHandle,
        parameters: ParameterValues,
        regions: RegionHandleSet,
        tag: impl Into<Bytes>,
        time: Option<T>,
    ) -> Result<Option<MessageRetractionHandle>, RtiError> {
        self.invoke(ServiceRequest::SendInteraction {
            class,
            parameters,
            tag: tag.into(),
            time,
            regions,
        })?
        .into_retraction()
    }

    /// `deleteObjectInstance`, receive order.
    pub fn delete_object_instance(
        &self,
        object: ObjectInstanceHandle,
        tag: impl Into<Bytes>,
    ) -> Result<(), RtiError> {
        self.invoke(ServiceRequest::DeleteObjectInstance { object, tag: tag.into(), time: None })
            .map(|_| ())
    }

    /// `deleteObjectInstance` with a timestamp.
    pub fn delete_object_instance_at(
        &self,
        object: ObjectInstanceHandle,
        tag: impl Into<Bytes>,
        time: T,
    ) -> Result<Option<MessageRetractionHandle>, RtiError> {
        self.invoke(ServiceRequest::DeleteObjectInstance {
            object,
            tag: tag.into(),
            time: Some(time),
        })?
        .into_retraction()
    }

    /// `localDeleteObjectInstance`.
    pub fn local_delete_object_instance(&self, object: ObjectInstanceHandle) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::LocalDeleteObjectInstance { object })
    }

    /// `requestAttributeValueUpdate` for one instance.
    pub fn request_attribute_value_update(
        &self,
        object: ObjectInstanceHandle,
        attributes: AttributeHandleSet,
        tag: impl Into<Bytes>,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::RequestObjectAttributeValueUpdate {
            object,
            attributes,
            tag: tag.into(),
        })
    }

    /// `requestAttributeValueUpdate` for every instance of a class.
    pub fn request_class_attribute_value_update(
        &self,
        class: ObjectClassHandle,
        attributes: AttributeHandleSet,
        tag: impl Into<Bytes>,
    ) -> Result<(), RtiError> {
        self.request_class_attribute_value_update_with_regions(
            class,
            attributes,
            RegionHandleSet::new(),
            tag,
        )
    }

    /// `requestAttributeValueUpdateWithRegions`.
    pub fn request_class_attribute_value_update_with_regions(
        &self,
        class: ObjectClassHandle,
        attributes: AttributeHandleSet,
        regions: RegionHandleSet,
        tag: impl Into<Bytes>,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::RequestClassAttributeValueUpdate {
            class,
            attributes,
            tag: tag.into(),
            regions,
        })
    }

    // Ownership management

    /// `unconditionalAttributeOwnershipDivestiture`.
    pub fn unconditional_attribute_ownership_divestiture(
        &self,
        object: ObjectInstanceHandle,
        attributes: AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::UnconditionalAttributeOwnershipDivestiture {
            object,
            attributes,
        })
    }

    /// `negotiatedAttributeOwnershipDivestiture`.
    pub fn negotiated_attribute_ownership_divestiture(
        &self,
        object: ObjectInstanceHandle,
        attributes: AttributeHandleSet,
        tag: impl Into<Bytes>,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::NegotiatedAttributeOwnershipDivestiture {
            object,
            attributes,
            tag: tag.into(),
        })
    }

    /// `confirmDivestiture`.
    pub fn confirm_divestiture(
        &self,
        object: ObjectInstanceHandle,
        attributes: AttributeHandleSet,
        tag: impl Into<Bytes>,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::ConfirmDivestiture {
            object,
            attributes,
            tag: tag.into(),
        })
    }

    /// `attributeOwnershipDivestitureIfWanted`. Returns the attributes
    /// handed to waiting acquirers.
    pub fn attribute_ownership_divestiture_if_wanted(
        &self,
        object: ObjectInstanceHandle,
        attributes: AttributeHandleSet,
    ) -> Result<AttributeHandleSet, RtiError> {
        self.invoke(ServiceRequest::AttributeOwnershipDivestitureIfWanted { object, attributes })?
            .into_attributes()
    }

    /// `cancelNegotiatedAttributeOwnershipDivestiture`.
    pub fn cancel_negotiated_attribute_ownership_divestiture(
        &self,
        object: ObjectInstanceHandle,
        attributes: AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::CancelNegotiatedAttributeOwnershipDivestiture {
            object,
            attributes,
        })
    }

    /// `attributeOwnershipAcquisition`.
    pub fn attribute_ownership_acquisition(
        &self,
        object: ObjectInstanceHandle,
        attributes: AttributeHandleSet,
        tag: impl Into<Bytes>,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::AttributeOwnershipAcquisition {
            object,
            attributes,
            tag: tag.into(),
        })
    }

    /// `attributeOwnershipAcquisitionIfAvailable`.
    pub fn attribute_ownership_acquisition_if_available(
        &self,
        object: ObjectInstanceHandle,
        attributes: AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::AttributeOwnershipAcquisitionIfAvailable {
            object,
            attributes,
        })
    }

    /// `attributeOwnershipReleaseDenied`.
    pub fn attribute_ownership_release_denied(
        &self,
        object: ObjectInstanceHandle,
        attributes: AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::AttributeOwnershipReleaseDenied { object, attributes })
    }

    /// `attributeOwnershipReleaseResponse`. Returns the attributes actually
    /// released.
    pub fn attribute_ownership_release_response(
        &self,
        object: ObjectInstanceHandle,
        attributes: AttributeHandleSet,
    ) -> Result<AttributeHandleSet, RtiError> {
        self.invoke(ServiceRequest::AttributeOwnershipReleaseResponse { object, attributes })?
            .into_attributes()
    }

    /// `cancelAttributeOwnershipAcquisition`.
    pub fn cancel_attribute_ownership_acquisition(
        &self,
        object: ObjectInstanceHandle,
        attributes: AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::CancelAttributeOwnershipAcquisition { object, attributes })
    }

    /// `queryAttributeOwnership`; answered by an ownership callback.
    pub fn query_attribute_ownership(
        &self,
        object: ObjectInstanceHandle,
        attribute: AttributeHandle,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::QueryAttributeOwnership { object, attribute })
    }

    /// `isAttributeOwnedByFederate`, answered locally.
    pub fn is_attribute_owned_by_federate(
        &self,
        object: ObjectInstanceHandle,
        attribute: AttributeHandle,
    ) -> Result<bool, RtiError> {
        lock(&self.inner.federate, "federate")?.is_attribute_owned_by_federate(object, attribute)
    }

    // Time management

    /// `enableTimeRegulation`; completes with `timeRegulationEnabled`.
    pub fn enable_time_regulation(&self, lookahead: T::Interval) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::EnableTimeRegulation { lookahead })
    }

    /// `disableTimeRegulation`.
    pub fn disable_time_regulation(&self) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::DisableTimeRegulation)
    }

    /// `enableTimeConstrained`; completes with `timeConstrainedEnabled`.
    pub fn enable_time_constrained(&self) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::EnableTimeConstrained)
    }

    /// `disableTimeConstrained`.
    pub fn disable_time_constrained(&self) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::DisableTimeConstrained)
    }

    fn advance(&self, kind: AdvanceKind, time: T) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::TimeAdvance { kind, time })
    }

    /// `timeAdvanceRequest`.
    pub fn time_advance_request(&self, time: T) -> Result<(), RtiError> {
        self.advance(AdvanceKind::TimeAdvance, time)
    }

    /// `timeAdvanceRequestAvailable`.
    pub fn time_advance_request_available(&self, time: T) -> Result<(), RtiError> {
        self.advance(AdvanceKind::TimeAdvanceAvailable, time)
    }

    /// `nextMessageRequest`.
    pub fn next_message_request(&self, time: T) -> Result<(), RtiError> {
        self.advance(AdvanceKind::NextMessage, time)
    }

    /// `nextMessageRequestAvailable`.
    pub fn next_message_request_available(&self, time: T) -> Result<(), RtiError> {
        self.advance(AdvanceKind::NextMessageAvailable, time)
    }

    /// `flushQueueRequest`.
    pub fn flush_queue_request(&self, time: T) -> Result<(), RtiError> {
        self.advance(AdvanceKind::FlushQueue, time)
    }

    /// `enableAsynchronousDelivery`.
    pub fn enable_asynchronous_delivery(&self) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::EnableAsynchronousDelivery)
    }

    /// `disableAsynchronousDelivery`.
    pub fn disable_asynchronous_delivery(&self) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::DisableAsynchronousDelivery)
    }

    /// `queryGALT`. `None` when no federate constrains this one.
    pub fn query_galt(&self) -> Result<Option<T>, RtiError> {
        self.invoke(ServiceRequest::QueryGalt)?.into_time()
    }

    /// `queryLITS`. `None` when no timestamp-order message is queued.
    pub fn query_lits(&self) -> Result<Option<T>, RtiError> {
        self.invoke(ServiceRequest::QueryLits)?.into_time()
    }

    /// `queryLogicalTime`, answered locally.
    pub fn query_logical_time(&self) -> Result<T, RtiError> {
        lock(&self.inner.federate, "federate")?.query_logical_time()
    }

    /// `queryLookahead`, answered locally.
    pub fn query_lookahead(&self) -> Result<T::Interval, RtiError> {
        lock(&self.inner.federate, "federate")?.query_lookahead()
    }

    /// `modifyLookahead`.
    pub fn modify_lookahead(&self, lookahead: T::Interval) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::ModifyLookahead { lookahead })
    }

    /// `retract`.
    pub fn retract(&self, handle: MessageRetractionHandle) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::Retract { handle })
    }

    // Data distribution management

    /// `createRegion`.
    pub fn create_region(&self, dimensions: DimensionHandleSet) -> Result<RegionHandle, RtiError> {
        self.invoke(ServiceRequest::CreateRegion { dimensions })?.into_region()
    }

    /// `setRangeBounds`, local until the next commit.
    pub fn set_range_bounds(
        &self,
        region: RegionHandle,
        dimension: DimensionHandle,
        bounds: RangeBounds,
    ) -> Result<(), RtiError> {
        self.inner.check_not_in_callback("setRangeBounds")?;
        lock(&self.inner.federate, "federate")?.set_range_bounds(region, dimension, bounds)
    }

    /// `getRangeBounds`. `None` for a dimension with no bounds set, which
    /// spans its whole range.
    pub fn get_range_bounds(
        &self,
        region: RegionHandle,
        dimension: DimensionHandle,
    ) -> Result<Option<RangeBounds>, RtiError> {
        let federate = lock(&self.inner.federate, "federate")?;
        federate.membership().check_joined("getRangeBounds")?;
        federate.regions().range_bounds(region, dimension)
    }

    /// `getDimensionHandleSet` of a region.
    pub fn get_dimension_handle_set(
        &self,
        region: RegionHandle,
    ) -> Result<DimensionHandleSet, RtiError> {
        let federate = lock(&self.inner.federate, "federate")?;
        federate.membership().check_joined("getDimensionHandleSet")?;
        federate.regions().dimensions(region).cloned()
    }

    /// `commitRegionModifications`: publish the bounds set since the last
    /// commit.
    pub fn commit_region_modifications(&self, regions: &RegionHandleSet) -> Result<(), RtiError> {
        let extents = lock(&self.inner.federate, "federate")?.regions().extents(regions)?;
        self.invoke_unit(ServiceRequest::CommitRegionModifications { regions: extents })
    }

    /// `deleteRegion`.
    pub fn delete_region(&self, region: RegionHandle) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::DeleteRegion { region })
    }

    /// `associateRegionsForUpdates`.
    pub fn associate_regions_for_updates(
        &self,
        object: ObjectInstanceHandle,
        associations: Vec<AttributeRegions>,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::AssociateRegionsForUpdates { object, associations })
    }

    /// `unassociateRegionsForUpdates`.
    pub fn unassociate_regions_for_updates(
        &self,
        object: ObjectInstanceHandle,
        associations: Vec<AttributeRegions>,
    ) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::UnassociateRegionsForUpdates { object, associations })
    }

    // Support services

    /// `getObjectClassHandle`.
    pub fn get_object_class_handle(&self, name: &str) -> Result<ObjectClassHandle, RtiError> {
        if let Some(class) = lock(&self.inner.cache, "handle cache")?.object_class(name) {
            return Ok(class);
        }
        let class = self
            .invoke(ServiceRequest::GetObjectClassHandle { name: name.to_string() })?
            .into_object_class()?;
        lock(&self.inner.cache, "handle cache")?.insert_object_class(name, class);
        Ok(class)
    }

    /// `getObjectClassName`.
    pub fn get_object_class_name(&self, class: ObjectClassHandle) -> Result<String, RtiError> {
        self.invoke(ServiceRequest::GetObjectClassName { class })?.into_name()
    }

    /// `getAttributeHandle`.
    pub fn get_attribute_handle(
        &self,
        class: ObjectClassHandle,
        name: &str,
    ) -> Result<AttributeHandle, RtiError> {
        if let Some(attribute) = lock(&self.inner.cache, "handle cache")?.attribute(class, name) {
            return Ok(attribute);
        }
        let attribute = self
            .invoke(ServiceRequest::GetAttributeHandle { class, name: name.to_string() })?
            .into_attribute()?;
        lock(&self.inner.cache, "handle cache")?.insert_attribute(class, name, attribute);
        Ok(attribute)
    }

    /// `getAttributeName`.
    pub fn get_attribute_name(
        &self,
        class: ObjectClassHandle,
        attribute: AttributeHandle,
    ) -> Result<String, RtiError> {
        self.invoke(ServiceRequest::GetAttributeName { class, attribute })?.into_name()
    }

    /// `getInteractionClassHandle`.
    pub fn get_interaction_class_handle(
        &self,
        name: &str,
    ) -> Result<InteractionClassHandle, RtiError> {
        if let Some(class) = lock(&self.inner.cache, "handle cache")?.interaction_class(name) {
            return Ok(class);
        }
        let class = self
            .invoke(ServiceRequest::GetInteractionClassHandle { name: name.to_string() })?
            .into_interaction_class()?;
        lock(&self.inner.cache, "handle cache")?.insert_interaction_class(name, class);
        Ok(class)
    }

    /// `getInteractionClassName`.
    pub fn get_interaction_class_name(
        &self,
        class: InteractionClassHandle,
    ) -> Result<String, RtiError> {
        self.invoke(ServiceRequest::GetInteractionClassName { class })?.into_name()
    }

    /// `getParameterHandle`.
    pub fn get_parameter_handle(
        &self,
        class: InteractionClassHandle,
        name: &str,
    ) -> Result<ParameterHandle, RtiError> {
        if let Some(parameter) = lock(&self.inner.cache, "handle cache")?.parameter(class, name) {
            return Ok(parameter);
        }
        let parameter = self
            .invoke(ServiceRequest::GetParameterHandle { class, name: name.to_string() })?
            .into_parameter()?;
        lock(&self.inner.cache, "handle cache")?.insert_parameter(class, name, parameter);
        Ok(parameter)
    }

    /// `getParameterName`.
    pub fn get_parameter_name(
        &self,
        class: InteractionClassHandle,
        parameter: ParameterHandle,
    ) -> Result<String, RtiError> {
        self.invoke(ServiceRequest::GetParameterName { class, parameter })?.into_name()
    }

    /// `getObjectInstanceHandle`.
    pub fn get_object_instance_handle(&self, name: &str) -> Result<ObjectInstanceHandle, RtiError> {
        self.invoke(ServiceRequest::GetObjectInstanceHandle { name: name.to_string() })?
            .into_object_instance()
    }

    /// `getObjectInstanceName`.
    pub fn get_object_instance_name(&self, object: ObjectInstanceHandle) -> Result<String, RtiError> {
        self.invoke(ServiceRequest::GetObjectInstanceName { object })?.into_name()
    }

    /// `getKnownObjectClassHandle`.
    pub fn get_known_object_class_handle(
        &self,
        object: ObjectInstanceHandle,
    ) -> Result<ObjectClassHandle, RtiError> {
        self.invoke(ServiceRequest::GetKnownObjectClassHandle { object })?.into_object_class()
    }

    /// `getDimensionHandle`.
    pub fn get_dimension_handle(&self, name: &str) -> Result<DimensionHandle, RtiError> {
        if let Some(dimension) = lock(&self.inner.cache, "handle cache")?.dimension(name) {
            return Ok(dimension);
        }
        let dimension = self
            .invoke(ServiceRequest::GetDimensionHandle { name: name.to_string() })?
            .into_dimension()?;
        lock(&self.inner.cache, "handle cache")?.insert_dimension(name, dimension);
        Ok(dimension)
    }

    /// `getDimensionName`.
    pub fn get_dimension_name(&self, dimension: DimensionHandle) -> Result<String, RtiError> {
        self.invoke(ServiceRequest::GetDimensionName { dimension })?.into_name()
    }

    /// `getDimensionUpperBound`.
    pub fn get_dimension_upper_bound(&self, dimension: DimensionHandle) -> Result<u64, RtiError> {
        self.invoke(ServiceRequest::GetDimensionUpperBound { dimension })?.into_upper_bound()
    }

    /// `getFederateHandle`.
    pub fn get_federate_handle(&self, name: &str) -> Result<FederateHandle, RtiError> {
        self.invoke(ServiceRequest::GetFederateHandle { name: name.to_string() })?
            .into_federate()
    }

    /// `getFederateName`.
    pub fn get_federate_name(&self, federate: FederateHandle) -> Result<String, RtiError> {
        self.invoke(ServiceRequest::GetFederateName { federate })?.into_name()
    }

    /// `getTransportationType`, by this generation's name.
    pub fn get_transportation_type(&self, name: &str) -> Result<TransportationType, RtiError> {
        self.inner.config.generation.transportation_type(name)
    }

    /// `getTransportationName`.
    pub fn get_transportation_name(&self, transportation: TransportationType) -> &'static str {
        self.inner.config.generation.transportation_name(transportation)
    }

    /// `getOrderType`, by name.
    pub fn get_order_type(&self, name: &str) -> Result<OrderType, RtiError> {
        self.inner.config.generation.order_type(name)
    }

    /// `getOrderName`.
    pub fn get_order_name(&self, order: OrderType) -> &'static str {
        self.inner.config.generation.order_name(order)
    }

    /// `decode*Handle` for any handle kind.
    pub fn decode_handle<H: Handle>(&self, bytes: &[u8]) -> Result<H, RtiError> {
        H::decode(bytes)
    }

    /// `decodeMessageRetractionHandle`.
    pub fn decode_message_retraction_handle(
        &self,
        bytes: &[u8],
    ) -> Result<MessageRetractionHandle, RtiError> {
        MessageRetractionHandle::decode(bytes)
    }

    /// Decode a logical time of this federation's representation.
    pub fn decode_logical_time(&self, bytes: &[u8]) -> Result<T, RtiError> {
        T::decode(bytes)
    }

    /// Decode a logical time interval of this federation's representation.
    pub fn decode_logical_time_interval(&self, bytes: &[u8]) -> Result<T::Interval, RtiError> {
        <T::Interval as LogicalTimeInterval>::decode(bytes)
    }

    fn set_advisory_switch(&self, switch: AdvisorySwitches, enabled: bool) -> Result<(), RtiError> {
        self.invoke_unit(ServiceRequest::SetAdvisorySwitch { switch, enabled })
    }

    /// `enableObjectClassRelevanceAdvisorySwitch`.
    pub fn enable_object_class_relevance_advisory_switch(&self) -> Result<(), RtiError> {
        self.set_advisory_switch(AdvisorySwitches::OBJECT_CLASS_RELEVANCE, true)
    }

    /// `disableObjectClassRelevanceAdvisorySwitch`.
    pub fn disable_object_class_relevance_advisory_switch(&self) -> Result<(), RtiError> {
        self.set_advisory_switch(AdvisorySwitches::OBJECT_CLASS_RELEVANCE, false)
    }

    /// `enableAttributeRelevanceAdvisorySwitch`.
    pub fn enable_attribute_relevance_advisory_switch(&self) -> Result<(), RtiError> {
        self.set_advisory_switch(AdvisorySwitches::ATTRIBUTE_RELEVANCE, true)
    }

    /// `disableAttributeRelevanceAdvisorySwitch`.
    pub fn disable_attribute_relevance_advisory_switch(&self) -> Result<(), RtiError> {
        self.set_advisory_switch(AdvisorySwitches::ATTRIBUTE_RELEVANCE, false)
    }

    /// `enableAttributeScopeAdvisorySwitch`.
    pub fn enable_attribute_scope_advisory_switch(&self) -> Result<(), RtiError> {
        self.set_advisory_switch(AdvisorySwitches::ATTRIBUTE_SCOPE, true)
    }

    /// `disableAttributeScopeAdvisorySwitch`.
    pub fn disable_attribute_scope_advisory_switch(&self) -> Result<(), RtiError> {
        self.set_advisory_switch(AdvisorySwitches::ATTRIBUTE_SCOPE, false)
    }

    /// `enableInteractionRelevanceAdvisorySwitch`.
    pub fn enable_interaction_relevance_advisory_switch(&self) -> Result<(), RtiError> {
        self.set_advisory_switch(AdvisorySwitches::INTERACTION_RELEVANCE, true)
    }

    /// `disableInteractionRelevanceAdvisorySwitch`.
    pub fn disable_interaction_relevance_advisory_switch(&self) -> Result<(), RtiError> {
        self.set_advisory_switch(AdvisorySwitches::INTERACTION_RELEVANCE, false)
    }

    // Callback control

    /// `enableCallbacks`.
    pub fn enable_callbacks(&self) -> Result<(), RtiError> {
        self.inner.check_not_in_callback("enableCallbacks")?;
        self.inner.callbacks_enabled.store(true, Ordering::Release);
        Ok(())
    }

    /// `disableCallbacks`. Pump calls return without delivering until
    /// callbacks are enabled again.
    pub fn disable_callbacks(&self) -> Result<(), RtiError> {
        self.inner.check_not_in_callback("disableCallbacks")?;
        self.inner.callbacks_enabled.store(false, Ordering::Release);
        Ok(())
    }

    fn check_pump(&self, service: &str) -> Result<bool, RtiError> {
        self.inner.check_not_in_callback(service)?;
        Ok(self.inner.callbacks_enabled.load(Ordering::Acquire))
    }

    /// `evokeCallback`: wait up to `min_wait` for one callback and deliver
    /// it. Returns whether one was delivered.
    pub fn evoke_callback(&self, min_wait: Duration) -> Result<bool, RtiError> {
        if !self.check_pump("evokeCallback")? {
            return Ok(false);
        }
        self.inner.deliver_next(min_wait)
    }

    /// `evokeMultipleCallbacks`: deliver callbacks for at least `min_wait`
    /// and at most `max_wait`. Returns whether any was delivered.
    pub fn evoke_multiple_callbacks(
        &self,
        min_wait: Duration,
        max_wait: Duration,
    ) -> Result<bool, RtiError> {
        if !self.check_pump("evokeMultipleCallbacks")? {
            return Ok(false);
        }
        let start = self.inner.env.now();
        let mut delivered = false;
        loop {
            let elapsed = self.inner.env.elapsed_since(start);
            if delivered && elapsed >= max_wait {
                break;
            }
            let wait = min_wait.saturating_sub(elapsed);
            if !self.inner.deliver_next(wait)? {
                break;
            }
            delivered = true;
        }
        Ok(delivered)
    }

    /// `tick`: deliver every callback already pending, without waiting.
    pub fn tick(&self) -> Result<bool, RtiError> {
        if !self.check_pump("tick")? {
            return Ok(false);
        }
        let mut delivered = false;
        while self.inner.deliver_next(Duration::ZERO)? {
            delivered = true;
        }
        Ok(delivered)
    }

    /// `tick(min, max)`, the 1.3 spelling of
    /// [`RtiAmbassador::evoke_multiple_callbacks`].
    pub fn tick_for(&self, min_wait: Duration, max_wait: Duration) -> Result<bool, RtiError> {
        self.evoke_multiple_callbacks(min_wait, max_wait)
    }
}

/// Services taking the legacy `f64` timestamp.
impl<C, E> RtiAmbassador<Float64Time, C, E>
where
    C: RtiConnection<Float64Time>,
    E: Environment,
{
    fn legacy_time(&self, timestamp: f64) -> Result<Option<Float64Time>, RtiError> {
        self.inner.config.generation.legacy_timestamp(timestamp)
    }

    /// `updateAttributeValues` with an `f64` timestamp; `-1.0` means none
    /// under the 1.3 names.
    pub fn update_attribute_values_legacy(
        &self,
        object: ObjectInstanceHandle,
        values: AttributeValues,
        tag: impl Into<Bytes>,
        timestamp: f64,
    ) -> Result<Option<MessageRetractionHandle>, RtiError> {
        let time = self.legacy_time(timestamp)?;
        self.invoke(ServiceRequest::UpdateAttributeValues { object, values, tag: tag.into(), time })?
            .into_retraction()
    }

    /// `sendInteraction` with an `f64` timestamp.
    pub fn send_interaction_legacy(
        &self,
        class: InteractionClassHandle,
        parameters: ParameterValues,
        tag: impl Into<Bytes>,
        timestamp: f64,
    ) -> Result<Option<MessageRetractionHandle>, RtiError> {
        let time = self.legacy_time(timestamp)?;
        self.send_interaction_with_regions(class, parameters, RegionHandleSet::new(), tag, time)
    }
}

impl<T: LogicalTime, C: RtiConnection<T>, E: Environment> Drop for RtiAmbassador<T, C, E> {
    fn drop(&mut self) {
        self.inner.stop.store(true, Ordering::Release);
        let handle = self.delivery.get_mut().ok().and_then(Option::take);
        if let Some(handle) = handle
            && handle.thread().id() != thread::current().id()
            && handle.join().is_err()
        {
            warn!("callback delivery thread panicked");
        }
    }
}
