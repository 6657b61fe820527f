//! Declaration and object bookkeeping for one federate.
//!
//! Tracks what this federate has published and subscribed, the object
//! instances it knows about (registered here or discovered), reserved
//! instance names and the relevance advisories the RTI has sent.
//!
//! The RTI is the authority on class definitions and on names; this
//! registry only rejects calls that are wrong from the federate's own point
//! of view (publishing state, known objects, reservations).

use std::collections::{BTreeMap, BTreeSet};

use hla_proto::{
    AttributeHandleSet, ErrorKind, Handle, InteractionClassHandle, ObjectClassHandle,
    ObjectInstanceHandle, RtiError,
};
use tracing::debug;

/// Name the RTI gives an instance registered without a reserved name.
pub fn default_object_name(object: ObjectInstanceHandle) -> String {
    format!("HLAobject_{}", object.raw())
}

/// An object instance known to this federate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownObject {
    /// Registered class (own objects) or discovered class.
    pub class: ObjectClassHandle,
    /// Instance name.
    pub name: String,
    /// Registered by this federate.
    pub registered_here: bool,
}

/// Publication, subscription and known-object state.
#[derive(Debug, Clone, Default)]
pub struct ObjectRegistry {
    published_classes: BTreeMap<ObjectClassHandle, AttributeHandleSet>,
    published_interactions: BTreeSet<InteractionClassHandle>,
    subscribed_classes: BTreeMap<ObjectClassHandle, AttributeHandleSet>,
    subscribed_interactions: BTreeSet<InteractionClassHandle>,
    objects: BTreeMap<ObjectInstanceHandle, KnownObject>,
    reserved_names: BTreeSet<String>,
    pending_reservations: BTreeSet<String>,
    registration_advised: BTreeSet<ObjectClassHandle>,
    interactions_advised: BTreeSet<InteractionClassHandle>,
    updates_advised: BTreeMap<ObjectInstanceHandle, AttributeHandleSet>,
}

impl ObjectRegistry {
    /// Attributes published for `class`.
    pub fn published_attributes(&self, class: ObjectClassHandle) -> Option<&AttributeHandleSet> {
        self.published_classes.get(&class)
    }

    /// Attributes subscribed for `class`.
    pub fn subscribed_attributes(&self, class: ObjectClassHandle) -> Option<&AttributeHandleSet> {
        self.subscribed_classes.get(&class)
    }

    /// Interaction class is published.
    pub fn is_interaction_published(&self, class: InteractionClassHandle) -> bool {
        self.published_interactions.contains(&class)
    }

    /// Interaction class is subscribed.
    pub fn is_interaction_subscribed(&self, class: InteractionClassHandle) -> bool {
        self.subscribed_interactions.contains(&class)
    }

    /// Known object instance.
    pub fn object(&self, object: ObjectInstanceHandle) -> Option<&KnownObject> {
        self.objects.get(&object)
    }

    /// Every known object instance.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectInstanceHandle, &KnownObject)> {
        self.objects.iter().map(|(o, k)| (*o, k))
    }

    /// Name is reserved for this federate.
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved_names.contains(name)
    }

    /// The RTI has advised registering instances of `class`.
    pub fn is_registration_advised(&self, class: ObjectClassHandle) -> bool {
        self.registration_advised.contains(&class)
    }

    /// The RTI has advised sending interactions of `class`.
    pub fn is_interaction_advised(&self, class: InteractionClassHandle) -> bool {
        self.interactions_advised.contains(&class)
    }

    /// Attributes of `object` the RTI has advised updating.
    pub fn updates_advised(&self, object: ObjectInstanceHandle) -> Option<&AttributeHandleSet> {
        self.updates_advised.get(&object)
    }

    /// The object class must be published.
    pub fn check_class_published(&self, class: ObjectClassHandle) -> Result<(), RtiError> {
        if !self.published_classes.contains_key(&class) {
            return Err(RtiError::new(ErrorKind::ObjectClassNotPublished, class.to_string()));
        }
        Ok(())
    }

    /// The interaction class must be published.
    pub fn check_interaction_published(
        &self,
        class: InteractionClassHandle,
    ) -> Result<(), RtiError> {
        if !self.published_interactions.contains(&class) {
            return Err(RtiError::new(ErrorKind::InteractionClassNotPublished, class.to_string()));
        }
        Ok(())
    }

    /// The object must be known.
    pub fn check_known(&self, object: ObjectInstanceHandle) -> Result<&KnownObject, RtiError> {
        self.objects.get(&object).ok_or_else(|| {
            RtiError::new(ErrorKind::ObjectInstanceNotKnown, object.to_string())
        })
    }

    /// Validate `registerObjectInstance`.
    pub fn check_register(
        &self,
        class: ObjectClassHandle,
        name: Option<&str>,
    ) -> Result<(), RtiError> {
        self.check_class_published(class)?;
        if let Some(name) = name
            && !self.reserved_names.contains(name)
        {
            return Err(RtiError::new(ErrorKind::ObjectInstanceNameNotReserved, name.to_string()));
        }
        Ok(())
    }

    /// Validate `reserveObjectInstanceName`.
    pub fn check_reserve(&self, name: &str) -> Result<(), RtiError> {
        if name.is_empty() {
            return Err(RtiError::new(ErrorKind::IllegalName, "empty object instance name"));
        }
        Ok(())
    }

    /// Validate `releaseObjectInstanceName`.
    pub fn check_release(&self, name: &str) -> Result<(), RtiError> {
        if !self.reserved_names.contains(name) {
            return Err(RtiError::new(ErrorKind::ObjectInstanceNameNotReserved, name.to_string()));
        }
        Ok(())
    }

    /// Validate an ownership acquisition: the object must be known and the
    /// attributes published for its class.
    pub fn check_acquisition(
        &self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> Result<(), RtiError> {
        let known = self.check_known(object)?;
        let published = self.published_classes.get(&known.class).ok_or_else(|| {
            RtiError::new(ErrorKind::ObjectClassNotPublished, known.class.to_string())
        })?;
        if let Some(missing) = attributes.iter().find(|a| !published.contains(*a)) {
            return Err(RtiError::new(
                ErrorKind::AttributeNotPublished,
                format!("{missing} of {}", known.class),
            ));
        }
        Ok(())
    }

    /// Record a forwarded `publishObjectClassAttributes`. Publication
    /// replaces the previous attribute set; an empty set unpublishes.
    pub fn published(&mut self, class: ObjectClassHandle, attributes: &AttributeHandleSet) {
        if attributes.is_empty() {
            self.published_classes.remove(&class);
        } else {
            self.published_classes.insert(class, attributes.clone());
        }
    }

    /// Record a forwarded `unpublishObjectClass`.
    pub fn unpublished(&mut self, class: ObjectClassHandle) {
        self.published_classes.remove(&class);
        self.registration_advised.remove(&class);
    }

    /// Record a forwarded `unpublishObjectClassAttributes`.
    pub fn unpublished_attributes(
        &mut self,
        class: ObjectClassHandle,
        attributes: &AttributeHandleSet,
    ) {
        if let Some(published) = self.published_classes.get_mut(&class) {
            *published = published.difference(attributes);
            if published.is_empty() {
                self.unpublished(class);
            }
        }
    }

    /// Record a forwarded `publishInteractionClass`.
    pub fn interaction_published(&mut self, class: InteractionClassHandle) {
        self.published_interactions.insert(class);
    }

    /// Record a forwarded `unpublishInteractionClass`.
    pub fn interaction_unpublished(&mut self, class: InteractionClassHandle) {
        self.published_interactions.remove(&class);
        self.interactions_advised.remove(&class);
    }

    /// Record a forwarded subscription. Subscription replaces the previous
    /// attribute set; an empty set unsubscribes.
    pub fn subscribed(&mut self, class: ObjectClassHandle, attributes: &AttributeHandleSet) {
        if attributes.is_empty() {
            self.subscribed_classes.remove(&class);
        } else {
            self.subscribed_classes.insert(class, attributes.clone());
        }
    }

    /// Record a forwarded `unsubscribeObjectClass`.
    pub fn unsubscribed(&mut self, class: ObjectClassHandle) {
        self.subscribed_classes.remove(&class);
    }

    /// Record a forwarded `unsubscribeObjectClassAttributes`.
    pub fn unsubscribed_attributes(
        &mut self,
        class: ObjectClassHandle,
        attributes: &AttributeHandleSet,
    ) {
        if let Some(subscribed) = self.subscribed_classes.get_mut(&class) {
            *subscribed = subscribed.difference(attributes);
            if subscribed.is_empty() {
                self.subscribed_classes.remove(&class);
            }
        }
    }

    /// Record a forwarded `subscribeInteractionClass`.
    pub fn interaction_subscribed(&mut self, class: InteractionClassHandle) {
        self.subscribed_interactions.insert(class);
    }

    /// Record a forwarded `unsubscribeInteractionClass`.
    pub fn interaction_unsubscribed(&mut self, class: InteractionClassHandle) {
        self.subscribed_interactions.remove(&class);
    }

    /// Record a forwarded name reservation.
    pub fn reservation_requested(&mut self, name: &str) {
        self.pending_reservations.insert(name.to_string());
    }

    /// `objectInstanceNameReservationSucceeded` / `...Failed`.
    pub fn reservation_resolved(&mut self, name: &str, succeeded: bool) {
        self.pending_reservations.remove(name);
        if succeeded {
            self.reserved_names.insert(name.to_string());
        }
    }

    /// Record a forwarded `releaseObjectInstanceName`.
    pub fn name_released(&mut self, name: &str) {
        self.reserved_names.remove(name);
    }

    /// Record a successful registration.
    pub fn registered(&mut self, object: ObjectInstanceHandle, class: ObjectClassHandle, name: String) {
        debug!(%object, %class, %name, "object registered");
        self.reserved_names.remove(&name);
        self.objects.insert(object, KnownObject { class, name, registered_here: true });
    }

    /// `discoverObjectInstance`.
    pub fn discovered(&mut self, object: ObjectInstanceHandle, class: ObjectClassHandle, name: String) {
        debug!(%object, %class, %name, "object discovered");
        self.objects.insert(object, KnownObject { class, name, registered_here: false });
    }

    /// Object deleted, removed or locally deleted.
    pub fn forget(&mut self, object: ObjectInstanceHandle) -> Option<KnownObject> {
        self.updates_advised.remove(&object);
        self.objects.remove(&object)
    }

    /// Objects registered by this federate.
    pub fn registered_here(&self) -> Vec<ObjectInstanceHandle> {
        self.objects.iter().filter(|(_, k)| k.registered_here).map(|(o, _)| *o).collect()
    }

    /// `startRegistrationForObjectClass` / `stopRegistrationForObjectClass`.
    pub fn registration_advice(&mut self, class: ObjectClassHandle, start: bool) {
        if start {
            self.registration_advised.insert(class);
        } else {
            self.registration_advised.remove(&class);
        }
    }

    /// `turnInteractionsOn` / `turnInteractionsOff`.
    pub fn interaction_advice(&mut self, class: InteractionClassHandle, on: bool) {
        if on {
            self.interactions_advised.insert(class);
        } else {
            self.interactions_advised.remove(&class);
        }
    }

    /// `turnUpdatesOnForObjectInstance` / `turnUpdatesOffForObjectInstance`.
    pub fn update_advice(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
        on: bool,
    ) {
        let advised = self.updates_advised.entry(object).or_default();
        if on {
            advised.extend_from(attributes);
        } else {
            *advised = advised.difference(attributes);
        }
        if advised.is_empty() {
            self.updates_advised.remove(&object);
        }
    }
}
