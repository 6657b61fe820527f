//! Attribute ownership from one federate's point of view.
//!
//! For every `(object, attribute)` the federate knows about it tracks
//! whether it owns the attribute and which transfer, if any, it has in
//! flight:
//!
//! ```text
//!            negotiated divestiture              acquisition
//! Owned ─────────────────────────▶ Owned+Divesting        NotOwned ─────▶ NotOwned+Acquiring
//!   ▲   ◀──────── cancel ─────────                          ▲   ◀─ unavailable / cancelled ─┘
//!   │                                                       │
//!   └──────────── acquisitionNotification ──────────────────┘
//!   ────────────── divestitureNotification / unconditional ─▶
//! ```
//!
//! At most one transfer is in flight per attribute. Overlapping requests
//! are rejected, never queued.

use std::collections::BTreeMap;

use hla_proto::{
    AttributeHandle, AttributeHandleSet, ErrorKind, ObjectInstanceHandle, RtiError,
};
use tracing::debug;

/// Local ownership state of one attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeOwnership {
    /// This federate owns the attribute.
    pub owned: bool,
    /// A negotiated divestiture is pending.
    pub divesting: bool,
    /// An acquisition is pending.
    pub acquiring: bool,
}

/// Ownership bookkeeping for every known object.
#[derive(Debug, Clone, Default)]
pub struct OwnershipTable {
    objects: BTreeMap<ObjectInstanceHandle, BTreeMap<AttributeHandle, AttributeOwnership>>,
}

fn err(kind: ErrorKind, object: ObjectInstanceHandle, attribute: AttributeHandle) -> RtiError {
    RtiError::new(kind, format!("{attribute} of {object}"))
}

impl OwnershipTable {
    /// State of one attribute (default if never seen).
    pub fn state(&self, object: ObjectInstanceHandle, attribute: AttributeHandle) -> AttributeOwnership {
        self.objects
            .get(&object)
            .and_then(|attrs| attrs.get(&attribute))
            .copied()
            .unwrap_or_default()
    }

    /// `isAttributeOwnedByFederate`.
    pub fn is_owned(&self, object: ObjectInstanceHandle, attribute: AttributeHandle) -> bool {
        self.state(object, attribute).owned
    }

    /// Attributes of `object` owned by this federate.
    pub fn owned_attributes(&self, object: ObjectInstanceHandle) -> AttributeHandleSet {
        self.objects
            .get(&object)
            .map(|attrs| attrs.iter().filter(|(_, s)| s.owned).map(|(a, _)| *a).collect())
            .unwrap_or_default()
    }

    /// Every object with owned attributes, with those attributes.
    pub fn owned(&self) -> impl Iterator<Item = (ObjectInstanceHandle, AttributeHandleSet)> + '_ {
        self.objects
            .keys()
            .map(|object| (*object, self.owned_attributes(*object)))
            .filter(|(_, attributes)| !attributes.is_empty())
    }

    /// True if this federate owns any attribute of any object.
    pub fn owns_any(&self) -> bool {
        self.objects.values().any(|attrs| attrs.values().any(|s| s.owned))
    }

    /// True if this federate owns any attribute of `object`.
    pub fn owns_any_of(&self, object: ObjectInstanceHandle) -> bool {
        self.objects.get(&object).is_some_and(|attrs| attrs.values().any(|s| s.owned))
    }

    fn each(
        &self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
        mut check: impl FnMut(AttributeHandle, AttributeOwnership) -> Result<(), RtiError>,
    ) -> Result<(), RtiError> {
        attributes.iter().try_for_each(|a| check(a, self.state(object, a)))
    }

    fn update(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
        mut change: impl FnMut(&mut AttributeOwnership),
    ) {
        let entry = self.objects.entry(object).or_default();
        for attribute in attributes {
            change(entry.entry(attribute).or_default());
        }
    }

    /// Every attribute must be owned (updates, release responses,
    /// unconditional divestiture, divestiture-if-wanted).
    pub fn check_owned(
        &self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.each(object, attributes, |a, s| {
            if s.owned { Ok(()) } else { Err(err(ErrorKind::AttributeNotOwned, object, a)) }
        })
    }

    /// Validate `negotiatedAttributeOwnershipDivestiture`.
    pub fn check_negotiated_divestiture(
        &self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.check_owned(object, attributes)?;
        self.each(object, attributes, |a, s| {
            if s.divesting {
                Err(err(ErrorKind::AttributeAlreadyBeingDivested, object, a))
            } else {
                Ok(())
            }
        })
    }

    /// Validate `cancelNegotiatedAttributeOwnershipDivestiture` and
    /// `confirmDivestiture`.
    pub fn check_divesting(
        &self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.check_owned(object, attributes)?;
        self.each(object, attributes, |a, s| {
            if s.divesting {
                Ok(())
            } else {
                Err(err(ErrorKind::AttributeDivestitureWasNotRequested, object, a))
            }
        })
    }

    /// Validate `attributeOwnershipAcquisition[IfAvailable]`.
    pub fn check_acquisition(
        &self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.each(object, attributes, |a, s| {
            if s.owned {
                Err(err(ErrorKind::FederateOwnsAttributes, object, a))
            } else if s.acquiring {
                Err(err(ErrorKind::AttributeAlreadyBeingAcquired, object, a))
            } else {
                Ok(())
            }
        })
    }

    /// Validate `cancelAttributeOwnershipAcquisition`.
    pub fn check_cancel_acquisition(
        &self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) -> Result<(), RtiError> {
        self.each(object, attributes, |a, s| {
            if s.owned {
                Err(err(ErrorKind::AttributeAlreadyOwned, object, a))
            } else if !s.acquiring {
                Err(err(ErrorKind::AttributeAcquisitionWasNotRequested, object, a))
            } else {
                Ok(())
            }
        })
    }

    /// Record the attributes this federate owns after registering `object`.
    pub fn registered(&mut self, object: ObjectInstanceHandle, owned: &AttributeHandleSet) {
        self.update(object, owned, |s| s.owned = true);
    }

    /// Forget everything about `object`.
    pub fn forget(&mut self, object: ObjectInstanceHandle) {
        self.objects.remove(&object);
    }

    /// Ownership released (unconditional divestiture, release response,
    /// divestiture-if-wanted, `attributeOwnershipDivestitureNotification`).
    pub fn released(&mut self, object: ObjectInstanceHandle, attributes: &AttributeHandleSet) {
        debug!(%object, count = attributes.len(), "attributes released");
        self.update(object, attributes, |s| *s = AttributeOwnership::default());
    }

    /// `attributeOwnershipAcquisitionNotification`.
    pub fn acquired(&mut self, object: ObjectInstanceHandle, attributes: &AttributeHandleSet) {
        debug!(%object, count = attributes.len(), "attributes acquired");
        self.update(object, attributes, |s| {
            *s = AttributeOwnership { owned: true, divesting: false, acquiring: false };
        });
    }

    /// Record a forwarded negotiated divestiture.
    pub fn divesting(&mut self, object: ObjectInstanceHandle, attributes: &AttributeHandleSet) {
        self.update(object, attributes, |s| s.divesting = true);
    }

    /// Record a forwarded cancellation of a negotiated divestiture.
    pub fn divestiture_cancelled(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) {
        self.update(object, attributes, |s| s.divesting = false);
    }

    /// Record a forwarded acquisition request.
    pub fn acquiring(&mut self, object: ObjectInstanceHandle, attributes: &AttributeHandleSet) {
        self.update(object, attributes, |s| s.acquiring = true);
    }

    /// `attributeOwnershipUnavailable` or
    /// `confirmAttributeOwnershipAcquisitionCancellation`.
    pub fn acquisition_ended(
        &mut self,
        object: ObjectInstanceHandle,
        attributes: &AttributeHandleSet,
    ) {
        self.update(object, attributes, |s| s.acquiring = false);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hla_proto::Handle;

    use super::*;

    fn o() -> ObjectInstanceHandle {
        ObjectInstanceHandle::from_raw(1)
    }

    fn attrs(raw: &[u32]) -> AttributeHandleSet {
        raw.iter().map(|r| AttributeHandle::from_raw(*r)).collect()
    }

    #[test]
    fn divest_requires_ownership() {
        let table = OwnershipTable::default();
        assert_eq!(
            table.check_owned(o(), &attrs(&[1])).unwrap_err().kind,
            ErrorKind::AttributeNotOwned
        );
    }

    #[test]
    fn negotiated_divestiture_cannot_overlap() {
        let mut table = OwnershipTable::default();
        table.registered(o(), &attrs(&[1, 2]));
        table.check_negotiated_divestiture(o(), &attrs(&[1])).unwrap();
        table.divesting(o(), &attrs(&[1]));
        assert_eq!(
            table.check_negotiated_divestiture(o(), &attrs(&[1, 2])).unwrap_err().kind,
            ErrorKind::AttributeAlreadyBeingDivested
        );
        assert_eq!(
            table.check_divesting(o(), &attrs(&[2])).unwrap_err().kind,
            ErrorKind::AttributeDivestitureWasNotRequested
        );
        table.divestiture_cancelled(o(), &attrs(&[1]));
        assert!(!table.state(o(), AttributeHandle::from_raw(1)).divesting);
    }

    #[test]
    fn acquisition_lifecycle() {
        let mut table = OwnershipTable::default();
        let a = attrs(&[3]);
        assert_eq!(
            table.check_cancel_acquisition(o(), &a).unwrap_err().kind,
            ErrorKind::AttributeAcquisitionWasNotRequested
        );
        table.check_acquisition(o(), &a).unwrap();
        table.acquiring(o(), &a);
        assert_eq!(
            table.check_acquisition(o(), &a).unwrap_err().kind,
            ErrorKind::AttributeAlreadyBeingAcquired
        );
        table.acquired(o(), &a);
        assert!(table.is_owned(o(), AttributeHandle::from_raw(3)));
        assert_eq!(
            table.check_acquisition(o(), &a).unwrap_err().kind,
            ErrorKind::FederateOwnsAttributes
        );
        assert_eq!(
            table.check_cancel_acquisition(o(), &a).unwrap_err().kind,
            ErrorKind::AttributeAlreadyOwned
        );
    }

    #[test]
    fn release_clears_transfer_flags() {
        let mut table = OwnershipTable::default();
        let a = attrs(&[1]);
        table.registered(o(), &a);
        table.divesting(o(), &a);
        table.released(o(), &a);
        assert_eq!(table.state(o(), AttributeHandle::from_raw(1)), AttributeOwnership::default());
        assert!(!table.owns_any());
    }

    #[test]
    fn owned_skips_pending_and_released_attributes() {
        let mut table = OwnershipTable::default();
        table.registered(o(), &attrs(&[1, 2]));
        table.released(o(), &attrs(&[2]));
        table.acquiring(ObjectInstanceHandle::from_raw(2), &attrs(&[5]));
        assert_eq!(table.owned_attributes(o()), attrs(&[1]));
        assert_eq!(table.owned().collect::<Vec<_>>(), vec![(o(), attrs(&[1]))]);
    }
}
