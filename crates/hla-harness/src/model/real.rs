//! Real federates driven by model operations.
//!
//! Mirrors [`ModelWorld`](super::ModelWorld): the same federates share one
//! registered object over the in-process RTI, every call is followed by a
//! full pump, and rejections are mapped back to [`OperationError`]s.

use std::iter;

use hla_proto::{
    AttributeHandle, AttributeHandleSet, Float64Time, FomModule, ObjectInstanceHandle, RtiError,
};
use hla_server::Owner;
use tracing::debug;

use super::{
    operation::{Operation, OperationError, OperationResult, OwnershipAction},
    world::ObservableState,
};
use crate::scenario::SimFederation;

/// Attributes of the shared object, in model order.
pub const OWNED_ATTRIBUTES: [&str; 2] = ["position", "speed"];

const FEDERATION: &str = "ownership";

fn fom() -> FomModule {
    FomModule::new(FEDERATION).object_class("Vehicle", None, &OWNED_ATTRIBUTES)
}

/// The real system behind a [`ModelWorld`](super::ModelWorld).
pub struct RealWorld {
    federation: SimFederation<Float64Time>,
    object: ObjectInstanceHandle,
    attributes: Vec<AttributeHandle>,
}

impl RealWorld {
    /// Join `num_federates` federates; all publish and subscribe every
    /// attribute and federate 0 registers the shared object.
    pub fn new(num_federates: usize, seed: u64) -> Result<Self, RtiError> {
        let mut federation = SimFederation::new(FEDERATION, vec![fom()], seed);
        for i in 0..num_federates.max(1) {
            federation.join(&format!("fed{i}"))?;
        }

        let registrar = federation[0].rti();
        let class = registrar.get_object_class_handle("Vehicle")?;
        let attributes = OWNED_ATTRIBUTES
            .iter()
            .map(|name| registrar.get_attribute_handle(class, name))
            .collect::<Result<Vec<_>, _>>()?;
        let all: AttributeHandleSet = attributes.iter().copied().collect();
        for federate in federation.federates() {
            federate.rti().publish_object_class_attributes(class, all.clone())?;
            federate.rti().subscribe_object_class_attributes(class, all.clone())?;
        }
        let object = federation[0].rti().register_object_instance(class)?;
        federation.pump()?;
        federation.clear_callbacks();

        Ok(Self { federation, object, attributes })
    }

    /// The underlying federation.
    pub fn federation(&self) -> &SimFederation<Float64Time> {
        &self.federation
    }

    /// Federate and attribute index `op` resolves to.
    pub fn target(&self, op: &Operation) -> (usize, usize) {
        (
            usize::from(op.federate) % self.federation.len(),
            usize::from(op.attribute) % self.attributes.len(),
        )
    }

    /// Issue `op`, deliver every callback it caused and report the outcome.
    /// Rejections the model does not know about are returned as errors.
    pub fn apply(&self, op: &Operation) -> Result<OperationResult, RtiError> {
        let (federate, attribute) = self.target(op);
        let rti = self.federation[federate].rti();
        let object = self.object;
        let set: AttributeHandleSet = iter::once(self.attributes[attribute]).collect();

        let result = match op.action {
            OwnershipAction::UnconditionalDivest => {
                rti.unconditional_attribute_ownership_divestiture(object, set)
            },
            OwnershipAction::NegotiatedDivest => {
                rti.negotiated_attribute_ownership_divestiture(object, set, "model")
            },
            OwnershipAction::ConfirmDivestiture => rti.confirm_divestiture(object, set, "model"),
            OwnershipAction::CancelNegotiatedDivestiture => {
                rti.cancel_negotiated_attribute_ownership_divestiture(object, set)
            },
            OwnershipAction::DivestIfWanted => {
                rti.attribute_ownership_divestiture_if_wanted(object, set).map(drop)
            },
            OwnershipAction::Acquire => rti.attribute_ownership_acquisition(object, set, "model"),
            OwnershipAction::AcquireIfAvailable => {
                rti.attribute_ownership_acquisition_if_available(object, set)
            },
            OwnershipAction::ReleaseResponse => {
                rti.attribute_ownership_release_response(object, set).map(drop)
            },
            OwnershipAction::ReleaseDenied => rti.attribute_ownership_release_denied(object, set),
            OwnershipAction::CancelAcquisition => {
                rti.cancel_attribute_ownership_acquisition(object, set)
            },
        };
        self.federation.pump()?;

        match result {
            Ok(()) => Ok(OperationResult::Ok),
            Err(err) => {
                debug!(?op, %err, "operation rejected");
                OperationError::from_kind(err.kind).map(OperationResult::Error).ok_or(err)
            },
        }
    }

    fn index_of(&self, owner: Option<Owner>) -> Option<usize> {
        match owner {
            Some(Owner::Federate(handle)) => {
                self.federation.federates().iter().position(|f| f.handle() == handle)
            },
            _ => None,
        }
    }

    /// Owners according to the RTI. Fails if any federate's local view
    /// disagrees with the RTI.
    pub fn observable_state(&self) -> Result<ObservableState, RtiError> {
        let mut owners = Vec::with_capacity(self.attributes.len());
        for &attribute in &self.attributes {
            let owner = self
                .federation
                .rti()
                .with_federation(FEDERATION, |f| f.owner(self.object, attribute))?;
            let owner = self.index_of(owner);
            for (index, federate) in self.federation.federates().iter().enumerate() {
                let local = federate.rti().is_attribute_owned_by_federate(self.object, attribute)?;
                if local != (owner == Some(index)) {
                    return Err(RtiError::internal(format!(
                        "{} thinks it {} {attribute}, RTI says {owner:?}",
                        federate.name(),
                        if local { "owns" } else { "does not own" },
                    )));
                }
            }
            owners.push(owner);
        }
        Ok(ObservableState { owners })
    }
}
