//! Attribute ownership transfer.
//!
//! Each attribute instance has exactly one owner at a time (a federate,
//! nobody, or the RTI) and at most one pending acquirer. A transfer
//! completes the moment both sides have agreed: an acquisition meets a
//! divesting or unowned attribute, or a release meets a pending
//! acquisition.

use std::collections::BTreeMap;

use bytes::Bytes;
use hla_proto::{
    AttributeHandle, AttributeHandleSet, Callback, ErrorKind, FederateHandle, LogicalTime,
    ObjectInstanceHandle, RtiError,
};
use tracing::debug;

use super::{
    Federation, Owner,
    objects::{AttributeState, PendingAcquisition},
};

fn err(kind: ErrorKind, object: ObjectInstanceHandle, attribute: AttributeHandle) -> RtiError {
    RtiError::new(kind, format!("{attribute} of {object}"))
}

impl<T: LogicalTime> Federation<T> {
    fn check_owned(
        &self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.check_known(federate, object)?;
        let instance = self.instance(object)?;
        self.model.check_attributes(instance.class, attributes.iter())?;
        match attributes.iter().find(|a| instance.owner(*a) != Some(Owner::Federate(federate))) {
            Some(attribute) => Err(err(ErrorKind::AttributeNotOwned, object, attribute)),
            None => Ok(()),
        }
    }

    fn check_divesting(
        &self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.check_owned(federate, object, attributes)?;
        let instance = self.instance(object)?;
        match attributes.iter().find(|a| !instance.attributes.get(a).is_some_and(|s| s.divesting)) {
            Some(attribute) => Err(err(ErrorKind::AttributeDivestitureWasNotRequested, object, attribute)),
            None => Ok(()),
        }
    }

    fn state_mut(&mut self, object: ObjectInstanceHandle, attribute: AttributeHandle) -> Option<&mut AttributeState> {
        self.objects.get_mut(&object)?.attributes.get_mut(&attribute)
    }

    /// Hand each attribute to its pending acquirer, or leave it unowned.
    /// Returns the attributes that changed hands.
    fn transfer_or_release(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> AttributeHandleSet {
        let mut granted: BTreeMap<(FederateHandle, Bytes), AttributeHandleSet> = BTreeMap::new();
        let mut transferred = AttributeHandleSet::new();
        for attribute in attributes {
            let Some(state) = self.state_mut(object, attribute) else { continue };
            state.divesting = false;
            match state.acquirer.take() {
                Some(PendingAcquisition { federate, tag }) => {
                    state.owner = Owner::Federate(federate);
                    granted.entry((federate, tag)).or_default().add(attribute);
                    transferred.add(attribute);
                },
                None => state.owner = Owner::Unowned,
            }
        }
        for ((federate, tag), attributes) in granted {
            debug!(%object, %federate, count = attributes.len(), "ownership transferred");
            self.send(federate, Callback::AttributeOwnershipAcquisitionNotification { object, attributes, tag });
        }
        transferred
    }

    fn with_acquirer(&self, object: ObjectInstanceHandle, attributes: &AttributeHandleSet) -> AttributeHandleSet {
        self.objects.get(&object).map_or_else(AttributeHandleSet::new, |instance| {
            attributes
                .iter()
                .filter(|a| instance.attributes.get(a).is_some_and(|s| s.acquirer.is_some()))
                .collect()
        })
    }

    pub(super) fn unconditional_divestiture(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.check_owned(federate, object, attributes)?;
        self.transfer_or_release(object, attributes);
        Ok(())
    }

    pub(super) fn negotiated_divestiture(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
        tag: &Bytes,
    ) -> Result<(), RtiError> {
        self.check_owned(federate, object, attributes)?;
        let instance = self.instance(object)?;
        if let Some(attribute) = attributes.iter().find(|a| instance.attributes.get(a).is_some_and(|s| s.divesting)) {
            return Err(err(ErrorKind::AttributeAlreadyBeingDivested, object, attribute));
        }

        let immediate = self.with_acquirer(object, attributes);
        let pending = attributes.difference(&immediate);
        if !immediate.is_empty() {
            self.transfer_or_release(object, &immediate);
            self.send(
                federate,
                Callback::AttributeOwnershipDivestitureNotification { object, attributes: immediate },
            );
        }
        if pending.is_empty() {
            return Ok(());
        }
        for attribute in &pending {
            if let Some(state) = self.state_mut(object, attribute) {
                state.divesting = true;
            }
        }

        let mut requests = Vec::new();
        for (handle, record) in &self.federates {
            if *handle == federate {
                continue;
            }
            let Some(class) = record.known.get(&object) else { continue };
            let Some(published) = record.declarations.published.get(class) else { continue };
            let wanted = pending.intersection(published);
            if !wanted.is_empty() {
                requests.push((*handle, wanted));
            }
        }
        for (candidate, attributes) in requests {
            self.send(
                candidate,
                Callback::RequestAttributeOwnershipAssumption { object, attributes, tag: tag.clone() },
            );
        }
        Ok(())
    }

    pub(super) fn confirm_divestiture(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.check_divesting(federate, object, attributes)?;
        self.transfer_or_release(object, attributes);
        Ok(())
    }

    /// Give up the attributes someone is waiting for and keep the rest.
    /// Serves both divestiture-if-wanted and release responses.
    pub(super) fn release_to_acquirers(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> Result<AttributeHandleSet, RtiError> {
        self.check_owned(federate, object, attributes)?;
        let wanted = self.with_acquirer(object, attributes);
        Ok(self.transfer_or_release(object, &wanted))
    }

    pub(super) fn cancel_negotiated_divestiture(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.check_divesting(federate, object, attributes)?;
        for attribute in attributes {
            if let Some(state) = self.state_mut(object, attribute) {
                state.divesting = false;
            }
        }
        Ok(())
    }

    /// `attributeOwnershipAcquisition` with a tag, or
    /// `attributeOwnershipAcquisitionIfAvailable` without one.
    pub(super) fn acquisition(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
        tag: Option<&Bytes>,
    ) -> Result<(), RtiError> {
        let known_class = self.check_known(federate, object)?;
        let instance = self.instance(object)?;
        self.model.check_attributes(instance.class, attributes.iter())?;
        let published = self
            .record(federate)?
            .declarations
            .published
            .get(&known_class)
            .ok_or_else(|| RtiError::new(ErrorKind::ObjectClassNotPublished, known_class.to_string()))?;
        if let Some(attribute) = attributes.iter().find(|a| !published.contains(*a)) {
            return Err(err(ErrorKind::AttributeNotPublished, object, attribute));
        }
        for attribute in attributes {
            let Some(state) = instance.attributes.get(&attribute) else { continue };
            if state.owner == Owner::Federate(federate) {
                return Err(err(ErrorKind::FederateOwnsAttributes, object, attribute));
            }
            if state.acquirer.as_ref().is_some_and(|p| p.federate == federate) {
                return Err(err(ErrorKind::AttributeAlreadyBeingAcquired, object, attribute));
            }
        }

        let mut acquired = AttributeHandleSet::new();
        let mut unavailable = AttributeHandleSet::new();
        let mut divested: BTreeMap<FederateHandle, AttributeHandleSet> = BTreeMap::new();
        let mut release_requests: BTreeMap<FederateHandle, AttributeHandleSet> = BTreeMap::new();
        for attribute in attributes {
            let Some(state) = self.state_mut(object, attribute) else { continue };
            let contested = state.acquirer.is_some();
            let current = state.owner;
            match current {
                Owner::Unowned if !contested => {
                    state.owner = Owner::Federate(federate);
                    acquired.add(attribute);
                },
                Owner::Federate(owner) if state.divesting && !contested => {
                    state.owner = Owner::Federate(federate);
                    state.divesting = false;
                    acquired.add(attribute);
                    divested.entry(owner).or_default().add(attribute);
                },
                Owner::Federate(owner) if !contested => match tag {
                    Some(tag) => {
                        state.acquirer = Some(PendingAcquisition { federate, tag: tag.clone() });
                        release_requests.entry(owner).or_default().add(attribute);
                    },
                    None => {
                        unavailable.add(attribute);
                    },
                },
                _ => {
                    unavailable.add(attribute);
                },
            }
        }

        debug!(
            %federate,
            %object,
            acquired = acquired.len(),
            pending = release_requests.values().map(AttributeHandleSet::len).sum::<usize>(),
            unavailable = unavailable.len(),
            "ownership acquisition"
        );
        for (owner, attributes) in divested {
            self.send(owner, Callback::AttributeOwnershipDivestitureNotification { object, attributes });
        }
        if !acquired.is_empty() {
            self.send(
                federate,
                Callback::AttributeOwnershipAcquisitionNotification {
                    object,
                    attributes: acquired,
                    tag: tag.cloned().unwrap_or_default(),
                },
            );
        }
        if !unavailable.is_empty() {
            self.send(federate, Callback::AttributeOwnershipUnavailable { object, attributes: unavailable });
        }
        for (owner, attributes) in release_requests {
            self.send(
                owner,
                Callback::RequestAttributeOwnershipRelease {
                    object,
                    attributes,
                    tag: tag.cloned().unwrap_or_default(),
                },
            );
        }
        Ok(())
    }

    /// The owner refuses to release: every waiting acquirer is told the
    /// attributes are unavailable.
    pub(super) fn release_denied(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.check_owned(federate, object, attributes)?;
        let mut refused: BTreeMap<FederateHandle, AttributeHandleSet> = BTreeMap::new();
        for attribute in attributes {
            if let Some(pending) = self.state_mut(object, attribute).and_then(|s| s.acquirer.take()) {
                refused.entry(pending.federate).or_default().add(attribute);
            }
        }
        for (acquirer, attributes) in refused {
            self.send(acquirer, Callback::AttributeOwnershipUnavailable { object, attributes });
        }
        Ok(())
    }

    pub(super) fn cancel_acquisition(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.check_known(federate, object)?;
        let instance = self.instance(object)?;
        self.model.check_attributes(instance.class, attributes.iter())?;
        for attribute in attributes {
            let Some(state) = instance.attributes.get(&attribute) else { continue };
            if state.owner == Owner::Federate(federate) {
                return Err(err(ErrorKind::AttributeAlreadyOwned, object, attribute));
            }
            if !state.acquirer.as_ref().is_some_and(|p| p.federate == federate) {
                return Err(err(ErrorKind::AttributeAcquisitionWasNotRequested, object, attribute));
            }
        }
        for attribute in attributes {
            if let Some(state) = self.state_mut(object, attribute) {
                state.acquirer = None;
            }
        }
        self.send(
            federate,
            Callback::ConfirmAttributeOwnershipAcquisitionCancellation { object, attributes: attributes.clone() },
        );
        Ok(())
    }

    pub(super) fn query_attribute_ownership(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attribute: AttributeHandle,
    ) -> Result<(), RtiError> {
        self.check_known(federate, object)?;
        let instance = self.instance(object)?;
        self.model.check_attributes(instance.class, std::iter::once(attribute))?;
        let callback = match instance.owner(attribute) {
            Some(Owner::Federate(owner)) => Callback::InformAttributeOwnership { object, attribute, owner },
            Some(Owner::Rti) => Callback::AttributeIsOwnedByRti { object, attribute },
            Some(Owner::Unowned) | None => Callback::AttributeIsNotOwned { object, attribute },
        };
        self.send(federate, callback);
        Ok(())
    }

    /// Every object `federate` owns attributes of, with those attributes.
    pub(super) fn owned_by(&self, federate: FederateHandle) -> Vec<(ObjectInstanceHandle, AttributeHandleSet)> {
        self.objects
            .iter()
            .filter_map(|(object, instance)| {
                let owned: AttributeHandleSet = instance
                    .attributes
                    .iter()
                    .filter(|(_, s)| s.owner == Owner::Federate(federate))
                    .map(|(a, _)| *a)
                    .collect();
                (!owned.is_empty()).then_some((*object, owned))
            })
            .collect()
    }

    pub(super) fn has_pending_acquisitions(&self, federate: FederateHandle) -> bool {
        self.objects.values().any(|o| {
            o.attributes.values().any(|s| s.acquirer.as_ref().is_some_and(|p| p.federate == federate))
        })
    }

    /// Withdraw `federate`'s pending acquisitions without telling anyone.
    pub(super) fn drop_acquisitions(&mut self, federate: FederateHandle) {
        for instance in self.objects.values_mut() {
            for state in instance.attributes.values_mut() {
                if state.acquirer.as_ref().is_some_and(|p| p.federate == federate) {
                    state.acquirer = None;
                }
            }
        }
    }

    pub(super) fn divest_everything(&mut self, federate: FederateHandle) {
        for (object, attributes) in self.owned_by(federate) {
            self.transfer_or_release(object, &attributes);
        }
    }
}
