//! Object instances, names, discovery and message routing.
//!
//! A federate learns about an object through `discoverObjectInstance` at
//! the nearest class in the object's lineage it subscribes to. Discovery
//! happens at registration, at subscription time for objects that already
//! exist, and lazily before the first reflection a subscriber is owed.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use hla_core::default_object_name;
use hla_proto::{
    AdvisorySwitches, AttributeHandle, AttributeHandleSet, AttributeRegions, AttributeValues,
    Callback, ErrorKind, FederateHandle, Handle, InteractionClassHandle, LogicalTime, MessageInfo,
    MessageRetractionHandle, ObjectClassHandle, ObjectInstanceHandle, OrderType, ParameterValues,
    RegionHandleSet, RtiError, TransportationType,
};
use tracing::{debug, trace};

use super::{Federation, time::Stamp};

/// Who holds an attribute instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// A joined federate.
    Federate(FederateHandle),
    /// Nobody; any publisher may acquire it.
    Unowned,
    /// The RTI itself.
    Rti,
}

#[derive(Debug, Clone)]
pub(super) struct PendingAcquisition {
    pub federate: FederateHandle,
    pub tag: Bytes,
}

#[derive(Debug, Clone)]
pub(super) struct AttributeState {
    pub owner: Owner,
    pub divesting: bool,
    pub acquirer: Option<PendingAcquisition>,
}

#[derive(Debug, Clone)]
pub(super) struct ObjectInstance {
    pub class: ObjectClassHandle,
    pub name: String,
    pub registrant: FederateHandle,
    pub attributes: BTreeMap<AttributeHandle, AttributeState>,
    pub update_regions: BTreeMap<AttributeHandle, RegionHandleSet>,
}

impl ObjectInstance {
    pub fn owner(&self, attribute: AttributeHandle) -> Option<Owner> {
        self.attributes.get(&attribute).map(|s| s.owner)
    }

    /// Regions the values of `attributes` are sent into.
    fn sent_regions(&self, attributes: impl Iterator<Item = AttributeHandle>) -> RegionHandleSet {
        let mut regions = RegionHandleSet::new();
        for attribute in attributes {
            if let Some(set) = self.update_regions.get(&attribute) {
                regions.extend_from(set);
            }
        }
        regions
    }
}

/// An outgoing attribute update.
struct Update<'a, T: LogicalTime> {
    producer: FederateHandle,
    object: ObjectInstanceHandle,
    values: &'a AttributeValues,
    tag: &'a Bytes,
    time: Option<T>,
    stamp: Option<Stamp<T>>,
}

fn info<T: LogicalTime>(
    producer: FederateHandle,
    time: Option<T>,
    stamp: Option<Stamp<T>>,
    sent_regions: RegionHandleSet,
) -> MessageInfo<T> {
    MessageInfo {
        order: if stamp.is_some() { OrderType::Timestamp } else { OrderType::Receive },
        transportation: TransportationType::Reliable,
        time,
        retraction: stamp.map(|s| s.retraction),
        producer,
        sent_regions,
    }
}

impl<T: LogicalTime> Federation<T> {
    pub(super) fn instance(&self, object: ObjectInstanceHandle) -> Result<&ObjectInstance, RtiError> {
        self.objects
            .get(&object)
            .ok_or_else(|| RtiError::new(ErrorKind::ObjectInstanceNotKnown, object.to_string()))
    }

    /// The class `federate` knows `object` as.
    pub(super) fn check_known(
        &self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
    ) -> Result<ObjectClassHandle, RtiError> {
        self.record(federate)?
            .known
            .get(&object)
            .copied()
            .ok_or_else(|| RtiError::new(ErrorKind::ObjectInstanceNotKnown, object.to_string()))
    }

    pub(super) fn object_instance_handle(
        &self,
        federate: FederateHandle,
        name: &str,
    ) -> Result<ObjectInstanceHandle, RtiError> {
        let known = &self.record(federate)?.known;
        self.objects
            .iter()
            .find(|(handle, o)| o.name == name && known.contains_key(handle))
            .map(|(handle, _)| *handle)
            .ok_or_else(|| RtiError::new(ErrorKind::ObjectInstanceNotKnown, name))
    }

    pub(super) fn reserve_object_instance_name(
        &mut self,
        federate: FederateHandle,
        name: &str,
    ) -> Result<(), RtiError> {
        if name.is_empty() || name.starts_with("HLA") {
            return Err(RtiError::new(ErrorKind::IllegalName, name));
        }
        let taken = self.reserved_names.contains_key(name) || self.objects.values().any(|o| o.name == name);
        if taken {
            debug!(%federate, name, "name reservation failed");
            self.send(federate, Callback::ObjectInstanceNameReservationFailed { name: name.into() });
        } else {
            self.reserved_names.insert(name.to_string(), federate);
            self.send(federate, Callback::ObjectInstanceNameReservationSucceeded { name: name.into() });
        }
        Ok(())
    }

    pub(super) fn release_object_instance_name(
        &mut self,
        federate: FederateHandle,
        name: &str,
    ) -> Result<(), RtiError> {
        if self.reserved_names.get(name) != Some(&federate) {
            return Err(RtiError::new(ErrorKind::ObjectInstanceNameNotReserved, name));
        }
        self.reserved_names.remove(name);
        Ok(())
    }

    pub(super) fn register_object_instance(
        &mut self,
        federate: FederateHandle,
        class: ObjectClassHandle,
        name: Option<&str>,
        regions: &[AttributeRegions],
    ) -> Result<ObjectInstanceHandle, RtiError> {
        let info = self.model.object_class(class)?;
        let published = self
            .record(federate)?
            .declarations
            .published
            .get(&class)
            .cloned()
            .ok_or_else(|| RtiError::new(ErrorKind::ObjectClassNotPublished, class.to_string()))?;
        if let Some(name) = name {
            if self.reserved_names.get(name) != Some(&federate) {
                return Err(RtiError::new(ErrorKind::ObjectInstanceNameNotReserved, name));
            }
            if self.objects.values().any(|o| o.name == name) {
                return Err(RtiError::new(ErrorKind::ObjectInstanceNameInUse, name));
            }
        }
        for association in regions {
            self.model.check_attributes(class, association.attributes.iter())?;
            self.check_regions_owned(federate, &association.regions)?;
        }

        let attributes = info
            .attributes
            .values()
            .map(|a| {
                let owner = if info.rti_owned.contains(*a) {
                    Owner::Rti
                } else if published.contains(*a) {
                    Owner::Federate(federate)
                } else {
                    Owner::Unowned
                };
                (*a, AttributeState { owner, divesting: false, acquirer: None })
            })
            .collect();
        let mut update_regions: BTreeMap<AttributeHandle, RegionHandleSet> = BTreeMap::new();
        for association in regions {
            for attribute in &association.attributes {
                update_regions.entry(attribute).or_default().extend_from(&association.regions);
            }
        }

        self.next_object += 1;
        let object = ObjectInstanceHandle::from_raw(self.next_object);
        let name = match name {
            Some(name) => {
                self.reserved_names.remove(name);
                name.to_string()
            },
            None => default_object_name(object),
        };
        debug!(%federate, %object, %class, %name, "object registered");
        self.objects.insert(
            object,
            ObjectInstance { class, name, registrant: federate, attributes, update_regions },
        );
        self.record_mut(federate)?.known.insert(object, class);

        for other in self.others(federate) {
            self.discover_if_subscribed(other, object);
        }
        Ok(object)
    }

    /// Nearest class in `class`'s lineage `federate` subscribes to.
    fn discovery_class(&self, federate: FederateHandle, class: ObjectClassHandle) -> Option<ObjectClassHandle> {
        let declarations = &self.federates.get(&federate)?.declarations;
        self.model
            .object_lineage(class)
            .into_iter()
            .find(|c| declarations.subscribed.get(c).is_some_and(|s| !s.is_empty()))
    }

    /// Make `object` known to `federate` if a subscription covers it.
    /// Returns the class it is known as.
    pub(super) fn discover_if_subscribed(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
    ) -> Option<ObjectClassHandle> {
        if let Some(class) = self.federates.get(&federate)?.known.get(&object) {
            return Some(*class);
        }
        let instance = self.objects.get(&object)?;
        let class = self.discovery_class(federate, instance.class)?;
        let name = instance.name.clone();
        let producer = instance.registrant;
        let in_scope = self.federates.get(&federate).and_then(|r| {
            r.advisory
                .contains(AdvisorySwitches::ATTRIBUTE_SCOPE)
                .then(|| r.declarations.subscribed.get(&class).map(|s| s.all_attributes()))
                .flatten()
        });

        self.federates.get_mut(&federate)?.known.insert(object, class);
        trace!(%federate, %object, %class, "object discovered");
        self.send(federate, Callback::DiscoverObjectInstance { object, class, name, producer });
        if let Some(attributes) = in_scope.filter(|a| !a.is_empty()) {
            self.send(federate, Callback::AttributesInScope { object, attributes });
        }
        Some(class)
    }

    /// Discover every existing object a new subscription of `federate`
    /// covers.
    pub(super) fn discover_existing(&mut self, federate: FederateHandle) {
        let handles: Vec<_> = self.objects.keys().copied().collect();
        for object in handles {
            self.discover_if_subscribed(federate, object);
        }
    }

    pub(super) fn update_attribute_values(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        values: &AttributeValues,
        tag: &Bytes,
        time: Option<T>,
    ) -> Result<Option<MessageRetractionHandle>, RtiError> {
        self.check_known(federate, object)?;
        let instance = self.instance(object)?;
        self.model.check_attributes(instance.class, values.handles())?;
        if let Some(attribute) =
            values.handles().find(|a| instance.owner(*a) != Some(Owner::Federate(federate)))
        {
            return Err(RtiError::new(
                ErrorKind::AttributeNotOwned,
                format!("{attribute} of {object}"),
            ));
        }
        let stamp = self.stamp(federate, time)?;

        let update = Update { producer: federate, object, values, tag, time, stamp };
        for receiver in self.others(federate) {
            let Some(known_class) = self.discover_if_subscribed(receiver, object) else {
                continue;
            };
            if let Some(callback) = self.reflection(receiver, known_class, &update) {
                self.deliver(receiver, callback, stamp);
            }
        }
        Ok(stamp.map(|s| s.retraction))
    }

    /// The part of an update `receiver` subscribes to, if any.
    fn reflection(
        &self,
        receiver: FederateHandle,
        known_class: ObjectClassHandle,
        update: &Update<'_, T>,
    ) -> Option<Callback<T>> {
        let instance = self.objects.get(&update.object)?;
        let subscription =
            self.federates.get(&receiver)?.declarations.subscribed.get(&known_class)?;
        let unregioned = RegionHandleSet::new();
        let filtered = update.values.filtered(|a| {
            let sent = instance.update_regions.get(&a).unwrap_or(&unregioned);
            subscription.accepts(a, sent, |mine, theirs| self.overlaps(mine, theirs))
        });
        if filtered.is_empty() {
            return None;
        }
        let sent_regions = instance.sent_regions(filtered.handles());
        Some(Callback::ReflectAttributeValues {
            object: update.object,
            values: filtered,
            tag: update.tag.clone(),
            info: info(update.producer, update.time, update.stamp, sent_regions),
        })
    }

    pub(super) fn send_interaction(
        &mut self,
        federate: FederateHandle,
        class: InteractionClassHandle,
        parameters: &ParameterValues,
        tag: &Bytes,
        time: Option<T>,
        regions: &RegionHandleSet,
    ) -> Result<Option<MessageRetractionHandle>, RtiError> {
        self.model.interaction_class(class)?;
        if !self.record(federate)?.declarations.published_interactions.contains(&class) {
            return Err(RtiError::new(ErrorKind::InteractionClassNotPublished, class.to_string()));
        }
        if let Some(parameter) = parameters.handles().find(|p| !self.model.has_parameter(class, *p)) {
            return Err(RtiError::new(
                ErrorKind::InteractionParameterNotDefined,
                format!("{parameter} on {class}"),
            ));
        }
        self.check_regions_owned(federate, regions)?;
        let stamp = self.stamp(federate, time)?;

        let lineage = self.model.interaction_lineage(class);
        let mut receptions = Vec::new();
        for receiver in self.others(federate) {
            let Some(record) = self.federates.get(&receiver) else { continue };
            let Some(received_as) = lineage.iter().copied().find(|c| {
                record
                    .declarations
                    .subscribed_interactions
                    .get(c)
                    .is_some_and(|s| s.accepts(regions, |mine, theirs| self.overlaps(mine, theirs)))
            }) else {
                continue;
            };
            let parameters = parameters.filtered(|p| self.model.has_parameter(received_as, p));
            receptions.push((
                receiver,
                Callback::ReceiveInteraction {
                    class: received_as,
                    parameters,
                    tag: tag.clone(),
                    info: info(federate, time, stamp, regions.clone()),
                },
            ));
        }
        for (receiver, callback) in receptions {
            self.deliver(receiver, callback, stamp);
        }
        Ok(stamp.map(|s| s.retraction))
    }

    /// The registrant, or a federate owning every attribute it publishes
    /// for the object's class, may delete the object.
    pub(super) fn can_delete(&self, federate: FederateHandle, object: ObjectInstanceHandle) -> bool {
        let Some(instance) = self.objects.get(&object) else { return false };
        if instance.registrant == federate {
            return true;
        }
        let Some(published) = self
            .federates
            .get(&federate)
            .and_then(|r| r.declarations.published.get(&instance.class))
        else {
            return false;
        };
        published.iter().all(|a| instance.owner(a) == Some(Owner::Federate(federate)))
    }

    pub(super) fn deletable_by(&self, federate: FederateHandle) -> Vec<ObjectInstanceHandle> {
        self.objects.keys().copied().filter(|o| self.can_delete(federate, *o)).collect()
    }

    pub(super) fn delete_object_instance(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        tag: &Bytes,
        time: Option<T>,
    ) -> Result<Option<MessageRetractionHandle>, RtiError> {
        self.check_known(federate, object)?;
        if !self.can_delete(federate, object) {
            return Err(RtiError::new(ErrorKind::DeletePrivilegeNotHeld, object.to_string()));
        }
        let stamp = self.stamp(federate, time)?;
        self.remove_object(federate, object, tag, time, stamp);
        Ok(stamp.map(|s| s.retraction))
    }

    /// Delete `object` everywhere, telling every other federate that knows
    /// it.
    pub(super) fn remove_object(
        &mut self,
        producer: FederateHandle,
        object: ObjectInstanceHandle,
        tag: &Bytes,
        time: Option<T>,
        stamp: Option<Stamp<T>>,
    ) {
        let Some(instance) = self.objects.remove(&object) else { return };
        debug!(%producer, %object, name = %instance.name, "object deleted");
        let mut receivers = Vec::new();
        for record in self.federates.values_mut() {
            record.advice.updates.remove(&object);
            if record.known.remove(&object).is_some() && record.handle != producer {
                receivers.push(record.handle);
            }
        }
        for receiver in receivers {
            let callback = Callback::RemoveObjectInstance {
                object,
                tag: tag.clone(),
                info: info(producer, time, stamp, RegionHandleSet::new()),
            };
            self.deliver(receiver, callback, stamp);
        }
    }

    pub(super) fn local_delete_object_instance(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
    ) -> Result<(), RtiError> {
        self.check_known(federate, object)?;
        let instance = self.instance(object)?;
        if instance.attributes.values().any(|s| s.owner == Owner::Federate(federate)) {
            return Err(RtiError::new(ErrorKind::FederateOwnsAttributes, object.to_string()));
        }
        let record = self.record_mut(federate)?;
        record.known.remove(&object);
        record.advice.updates.remove(&object);
        Ok(())
    }

    pub(super) fn request_object_attribute_value_update(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
        tag: &Bytes,
    ) -> Result<(), RtiError> {
        self.check_known(federate, object)?;
        let class = self.instance(object)?.class;
        self.model.check_attributes(class, attributes.iter())?;
        self.solicit_updates(federate, object, attributes, tag);
        Ok(())
    }

    pub(super) fn request_class_attribute_value_update(
        &mut self,
        federate: FederateHandle,
        class: ObjectClassHandle,
        attributes: &AttributeHandleSet,
        tag: &Bytes,
        regions: &RegionHandleSet,
    ) -> Result<(), RtiError> {
        self.model.check_attributes(class, attributes.iter())?;
        self.check_regions_owned(federate, regions)?;
        let classes: BTreeSet<_> = self.model.object_subclasses(class).into_iter().collect();
        let objects: Vec<_> = self
            .objects
            .iter()
            .filter(|(_, o)| classes.contains(&o.class))
            .filter(|(_, o)| {
                regions.is_empty()
                    || attributes.iter().any(|a| {
                        o.update_regions.get(&a).is_none_or(|sent| sent.is_empty() || self.overlaps(regions, sent))
                    })
            })
            .map(|(h, _)| *h)
            .collect();
        for object in objects {
            self.solicit_updates(federate, object, attributes, tag);
        }
        Ok(())
    }

    /// Ask the owners of `attributes` (other than `requester`) to provide
    /// fresh values.
    fn solicit_updates(
        &mut self,
        requester: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
        tag: &Bytes,
    ) {
        let Some(instance) = self.objects.get(&object) else { return };
        let mut by_owner: BTreeMap<FederateHandle, AttributeHandleSet> = BTreeMap::new();
        for attribute in attributes {
            if let Some(Owner::Federate(owner)) = instance.owner(attribute)
                && owner != requester
            {
                by_owner.entry(owner).or_default().add(attribute);
            }
        }
        for (owner, attributes) in by_owner {
            self.send(owner, Callback::ProvideAttributeValueUpdate { object, attributes, tag: tag.clone() });
        }
    }
}
