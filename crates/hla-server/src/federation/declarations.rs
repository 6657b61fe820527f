//! Publications, subscriptions and the advisories derived from them.

use std::collections::{BTreeMap, BTreeSet};

use hla_proto::{
    AdvisorySwitches, AttributeHandle, AttributeHandleSet, Callback, ErrorKind, FederateHandle,
    InteractionClassHandle, LogicalTime, ObjectClassHandle, ObjectInstanceHandle, RegionHandle,
    RegionHandleSet, RtiError,
};
use tracing::trace;

use super::{Federation, Owner};

/// Attributes subscribed for one class, unregioned or per region.
#[derive(Debug, Clone, Default)]
pub(super) struct ClassSubscription {
    pub attributes: AttributeHandleSet,
    pub regioned: BTreeMap<AttributeHandle, RegionHandleSet>,
    pub passive: bool,
}

impl ClassSubscription {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.regioned.is_empty()
    }

    pub fn all_attributes(&self) -> AttributeHandleSet {
        let mut all = self.attributes.clone();
        all.extend(self.regioned.keys().copied());
        all
    }

    /// An update of `attribute` sent into `sent` reaches this subscriber.
    /// Unregioned updates reach every subscriber of the attribute.
    pub fn accepts(
        &self,
        attribute: AttributeHandle,
        sent: &RegionHandleSet,
        overlaps: impl Fn(&RegionHandleSet, &RegionHandleSet) -> bool,
    ) -> bool {
        if self.attributes.contains(attribute) {
            return true;
        }
        self.regioned
            .get(&attribute)
            .is_some_and(|mine| sent.is_empty() || overlaps(mine, sent))
    }

    fn uses_region(&self, region: RegionHandle) -> bool {
        self.regioned.values().any(|set| set.contains(region))
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct InteractionSubscription {
    pub unregioned: bool,
    pub regions: RegionHandleSet,
    pub passive: bool,
}

impl InteractionSubscription {
    fn is_empty(&self) -> bool {
        !self.unregioned && self.regions.is_empty()
    }

    pub fn accepts(
        &self,
        sent: &RegionHandleSet,
        overlaps: impl Fn(&RegionHandleSet, &RegionHandleSet) -> bool,
    ) -> bool {
        self.unregioned
            || (!self.regions.is_empty() && (sent.is_empty() || overlaps(&self.regions, sent)))
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct Declarations {
    pub published: BTreeMap<ObjectClassHandle, AttributeHandleSet>,
    pub published_interactions: BTreeSet<InteractionClassHandle>,
    pub subscribed: BTreeMap<ObjectClassHandle, ClassSubscription>,
    pub subscribed_interactions: BTreeMap<InteractionClassHandle, InteractionSubscription>,
}

impl Declarations {
    pub fn uses_region(&self, region: RegionHandle) -> bool {
        self.subscribed.values().any(|s| s.uses_region(region))
            || self.subscribed_interactions.values().any(|s| s.regions.contains(region))
    }

    fn actively_subscribes(&self, class: ObjectClassHandle) -> bool {
        self.subscribed.get(&class).is_some_and(|s| !s.passive && !s.is_empty())
    }

    fn actively_subscribes_attribute(&self, class: ObjectClassHandle, attribute: AttributeHandle) -> bool {
        self.subscribed
            .get(&class)
            .is_some_and(|s| !s.passive && s.all_attributes().contains(attribute))
    }

    fn actively_subscribes_interaction(&self, class: InteractionClassHandle) -> bool {
        self.subscribed_interactions.get(&class).is_some_and(|s| !s.passive && !s.is_empty())
    }
}

/// Advisories last sent to a federate.
#[derive(Debug, Clone, Default)]
pub(super) struct Advice {
    pub registration: BTreeSet<ObjectClassHandle>,
    pub interactions: BTreeSet<InteractionClassHandle>,
    pub updates: BTreeMap<ObjectInstanceHandle, AttributeHandleSet>,
}

impl<T: LogicalTime> Federation<T> {
    pub(super) fn publish_object_class_attributes(
        &mut self,
        federate: FederateHandle,
        class: ObjectClassHandle,
        attributes: &AttributeHandleSet,
    ) -> Result<(), RtiError> {
        let info = self.model.object_class(class)?;
        self.model.check_attributes(class, attributes.iter())?;
        if let Some(attribute) = attributes.iter().find(|a| info.rti_owned.contains(*a)) {
            return Err(RtiError::new(
                ErrorKind::AttributeNotDefined,
                format!("{attribute} of {} is owned by the RTI", info.name),
            ));
        }
        let published = &mut self.record_mut(federate)?.declarations.published;
        if attributes.is_empty() {
            published.remove(&class);
        } else {
            published.insert(class, attributes.clone());
        }
        Ok(())
    }

    /// `unpublishObjectClass` (`attributes` is `None`) or
    /// `unpublishObjectClassAttributes`.
    pub(super) fn unpublish_object_class(
        &mut self,
        federate: FederateHandle,
        class: ObjectClassHandle,
        attributes: Option<&AttributeHandleSet>,
    ) -> Result<(), RtiError> {
        self.model.object_class(class)?;
        if let Some(attributes) = attributes {
            self.model.check_attributes(class, attributes.iter())?;
        }
        let published = &mut self.record_mut(federate)?.declarations.published;
        match attributes {
            None => {
                published.remove(&class);
            },
            Some(attributes) => {
                if let Some(current) = published.get_mut(&class) {
                    *current = current.difference(attributes);
                    if current.is_empty() {
                        published.remove(&class);
                    }
                }
            },
        }
        Ok(())
    }

    pub(super) fn publish_interaction_class(
        &mut self,
        federate: FederateHandle,
        class: InteractionClassHandle,
        publish: bool,
    ) -> Result<(), RtiError> {
        self.model.interaction_class(class)?;
        let published = &mut self.record_mut(federate)?.declarations.published_interactions;
        if publish {
            published.insert(class);
        } else {
            published.remove(&class);
        }
        Ok(())
    }

    pub(super) fn subscribe_object_class_attributes(
        &mut self,
        federate: FederateHandle,
        class: ObjectClassHandle,
        attributes: &AttributeHandleSet,
        passive: bool,
        regions: &RegionHandleSet,
    ) -> Result<(), RtiError> {
        self.model.check_attributes(class, attributes.iter())?;
        self.check_regions_owned(federate, regions)?;

        let subscribed = &mut self.record_mut(federate)?.declarations.subscribed;
        let subscription = subscribed.entry(class).or_default();
        if regions.is_empty() {
            subscription.attributes = attributes.clone();
        } else {
            for attribute in attributes {
                subscription.regioned.entry(attribute).or_default().extend_from(regions);
            }
        }
        subscription.passive = passive;
        if subscription.is_empty() {
            subscribed.remove(&class);
        } else {
            trace!(%federate, %class, passive, "object class subscribed");
            self.discover_existing(federate);
        }
        Ok(())
    }

    /// Drop a whole subscription (`attributes` is `None`), some attributes
    /// of it, or some regions of those attributes.
    pub(super) fn unsubscribe_object_class(
        &mut self,
        federate: FederateHandle,
        class: ObjectClassHandle,
        attributes: Option<&AttributeHandleSet>,
        regions: Option<&RegionHandleSet>,
    ) -> Result<(), RtiError> {
        self.model.object_class(class)?;
        if let Some(attributes) = attributes {
            self.model.check_attributes(class, attributes.iter())?;
        }
        if let Some(regions) = regions {
            self.check_regions_owned(federate, regions)?;
        }

        let record = self.record_mut(federate)?;
        let Some(subscription) = record.declarations.subscribed.get_mut(&class) else {
            return Ok(());
        };
        let before = subscription.all_attributes();
        match (attributes, regions) {
            (None, _) => {
                subscription.attributes.clear();
                subscription.regioned.clear();
            },
            (Some(attributes), None) => {
                subscription.attributes = subscription.attributes.difference(attributes);
                subscription.regioned.retain(|a, _| !attributes.contains(*a));
            },
            (Some(attributes), Some(regions)) => {
                for attribute in attributes {
                    if let Some(set) = subscription.regioned.get_mut(&attribute) {
                        *set = set.difference(regions);
                    }
                }
                subscription.regioned.retain(|_, set| !set.is_empty());
            },
        }
        let removed = before.difference(&subscription.all_attributes());
        if subscription.is_empty() {
            record.declarations.subscribed.remove(&class);
        }

        if removed.is_empty() || !record.advisory.contains(AdvisorySwitches::ATTRIBUTE_SCOPE) {
            return Ok(());
        }
        let objects: Vec<_> =
            record.known.iter().filter(|(_, c)| **c == class).map(|(o, _)| *o).collect();
        for object in objects {
            self.send(
                federate,
                Callback::AttributesOutOfScope { object, attributes: removed.clone() },
            );
        }
        Ok(())
    }

    pub(super) fn subscribe_interaction_class(
        &mut self,
        federate: FederateHandle,
        class: InteractionClassHandle,
        passive: bool,
        regions: &RegionHandleSet,
    ) -> Result<(), RtiError> {
        self.model.interaction_class(class)?;
        self.check_regions_owned(federate, regions)?;
        let subscription = self
            .record_mut(federate)?
            .declarations
            .subscribed_interactions
            .entry(class)
            .or_default();
        if regions.is_empty() {
            subscription.unregioned = true;
        } else {
            subscription.regions.extend_from(regions);
        }
        subscription.passive = passive;
        Ok(())
    }

    pub(super) fn unsubscribe_interaction_class(
        &mut self,
        federate: FederateHandle,
        class: InteractionClassHandle,
        regions: Option<&RegionHandleSet>,
    ) -> Result<(), RtiError> {
        self.model.interaction_class(class)?;
        if let Some(regions) = regions {
            self.check_regions_owned(federate, regions)?;
        }
        let subscribed = &mut self.record_mut(federate)?.declarations.subscribed_interactions;
        match regions {
            None => {
                subscribed.remove(&class);
            },
            Some(regions) => {
                if let Some(subscription) = subscribed.get_mut(&class) {
                    subscription.regions = subscription.regions.difference(regions);
                    if subscription.is_empty() {
                        subscribed.remove(&class);
                    }
                }
            },
        }
        Ok(())
    }

    /// Bring every federate's advisories in line with the current
    /// declarations and ownership, sending only the differences.
    pub(super) fn recompute_advice(&mut self) {
        let handles: Vec<_> = self.federates.keys().copied().collect();
        for federate in handles {
            let wanted = self.wanted_advice(federate);
            let Some(record) = self.federates.get_mut(&federate) else { continue };
            let switches = record.advisory;
            let advice = &mut record.advice;
            let mut callbacks = Vec::new();

            if switches.contains(AdvisorySwitches::OBJECT_CLASS_RELEVANCE) {
                for class in wanted.registration.difference(&advice.registration) {
                    callbacks.push(Callback::StartRegistrationForObjectClass { class: *class });
                }
                for class in advice.registration.difference(&wanted.registration) {
                    callbacks.push(Callback::StopRegistrationForObjectClass { class: *class });
                }
                advice.registration = wanted.registration;
            } else {
                advice.registration.clear();
            }

            if switches.contains(AdvisorySwitches::INTERACTION_RELEVANCE) {
                for class in wanted.interactions.difference(&advice.interactions) {
                    callbacks.push(Callback::TurnInteractionsOn { class: *class });
                }
                for class in advice.interactions.difference(&wanted.interactions) {
                    callbacks.push(Callback::TurnInteractionsOff { class: *class });
                }
                advice.interactions = wanted.interactions;
            } else {
                advice.interactions.clear();
            }

            if switches.contains(AdvisorySwitches::ATTRIBUTE_RELEVANCE) {
                let empty = AttributeHandleSet::new();
                for (object, want) in &wanted.updates {
                    let have = advice.updates.get(object).unwrap_or(&empty);
                    let on = want.difference(have);
                    let off = have.difference(want);
                    if !on.is_empty() {
                        callbacks.push(Callback::TurnUpdatesOnForObjectInstance { object: *object, attributes: on });
                    }
                    if !off.is_empty() {
                        callbacks.push(Callback::TurnUpdatesOffForObjectInstance { object: *object, attributes: off });
                    }
                }
                for (object, have) in &advice.updates {
                    if !wanted.updates.contains_key(object) {
                        callbacks.push(Callback::TurnUpdatesOffForObjectInstance {
                            object: *object,
                            attributes: have.clone(),
                        });
                    }
                }
                advice.updates = wanted.updates;
            } else {
                advice.updates.clear();
            }

            for callback in callbacks {
                self.send(federate, callback);
            }
        }
    }

    fn wanted_advice(&self, federate: FederateHandle) -> Advice {
        let Some(record) = self.federates.get(&federate) else { return Advice::default() };
        let others: Vec<_> = self.federates.values().filter(|r| r.handle != federate).collect();

        let registration = record
            .declarations
            .published
            .keys()
            .copied()
            .filter(|class| {
                self.model
                    .object_lineage(*class)
                    .iter()
                    .any(|c| others.iter().any(|o| o.declarations.actively_subscribes(*c)))
            })
            .collect();

        let interactions = record
            .declarations
            .published_interactions
            .iter()
            .copied()
            .filter(|class| {
                self.model.interaction_lineage(*class).iter().any(|c| {
                    others.iter().any(|o| o.declarations.actively_subscribes_interaction(*c))
                })
            })
            .collect();

        let mut updates = BTreeMap::new();
        for (object, instance) in &self.objects {
            let lineage = self.model.object_lineage(instance.class);
            let wanted: AttributeHandleSet = instance
                .attributes
                .iter()
                .filter(|(_, state)| state.owner == Owner::Federate(federate))
                .map(|(a, _)| *a)
                .filter(|a| {
                    lineage.iter().any(|c| {
                        others.iter().any(|o| o.declarations.actively_subscribes_attribute(*c, *a))
                    })
                })
                .collect();
            if !wanted.is_empty() {
                updates.insert(*object, wanted);
            }
        }

        Advice { registration, interactions, updates }
    }
}
